/*!
 * Utility functions and helpers for GridLink.
 *
 * Timeouts, retry loops and background tasks shared by the adapter crates.
 */
use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::Error;

/// Run a future with a timeout
///
/// The future is dropped when the timeout is reached, releasing anything it
/// holds, e.g. a lock guard acquired inside it.
///
/// # Arguments
///
/// * `duration` - The timeout duration
/// * `future` - The future to run
///
/// # Returns
///
/// The result of the future, or [`Error::Timeout`] converted into the error
/// type of the future if the timeout is reached
pub async fn with_timeout<F, T, E>(duration: Duration, future: F) -> std::result::Result<T, E>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: From<Error>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(format!(
            "Operation timed out after {:?}",
            duration
        ))
        .into()),
    }
}

/// Run an operation, retrying it while the error is retryable.
///
/// The factory is called once for the first attempt and once for each retry,
/// with `delay` between attempts. Errors for which `should_retry` returns
/// `false` are returned immediately.
///
/// # Arguments
///
/// * `retries` - The number of retries after the first attempt
/// * `delay` - The pause between two attempts
/// * `should_retry` - Decides whether an error is worth another attempt
/// * `future_factory` - Creates the future for one attempt; receives the attempt number
///
/// # Returns
///
/// The first successful result, or the last error
pub async fn with_retry_when<F, Fut, T, E, P>(
    retries: usize,
    delay: Duration,
    should_retry: P,
    mut future_factory: F,
) -> std::result::Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        match future_factory(attempt).await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("Succeeded after {} retries", attempt);
                }
                return Ok(result);
            }
            Err(e) if attempt < retries && should_retry(&e) => {
                warn!("Attempt {} failed: {}, retrying in {:?}", attempt + 1, e, delay);
                attempt += 1;
                sleep(delay).await;
            }
            Err(e) => {
                if attempt > 0 {
                    warn!(
                        "Giving up after {} attempts in {:?}: {}",
                        attempt + 1,
                        start.elapsed(),
                        e
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Create a task that runs in the background and logs any errors
///
/// # Arguments
///
/// * `name` - A name for the task (for logging)
/// * `fut` - The future to run
pub fn spawn_and_log<F, T, E>(name: &str, fut: F) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let task_name = name.to_string();
    tokio::spawn(async move {
        match fut.await {
            Ok(_) => {
                debug!("Task '{}' completed successfully", task_name);
            }
            Err(e) => {
                warn!("Task '{}' failed: {}", task_name, e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_with_timeout_blocking() {
        let result = tokio_test::block_on(with_timeout(Duration::from_secs(1), async {
            Ok::<_, Error>("done")
        }));
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_with_timeout_failure() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, Error>(42)
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[derive(Debug)]
    enum WrappedError {
        Core(Error),
    }

    impl From<Error> for WrappedError {
        fn from(e: Error) -> Self {
            WrappedError::Core(e)
        }
    }

    #[tokio::test]
    async fn test_with_timeout_converts_error() {
        let result: std::result::Result<(), WrappedError> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(WrappedError::Core(Error::Timeout(_)))));
    }

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = with_retry_when(3, Duration::from_millis(1), |_: &Error| true, move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Error>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_retries() {
        let result = with_retry_when(3, Duration::from_millis(1), |_: &Error| true, |attempt| async move {
            if attempt < 2 {
                Err(Error::other("Intentional failure"))
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_retry_all_failures() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result: Result<()> = with_retry_when(2, Duration::from_millis(1), |_: &Error| true, move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::other("Intentional failure")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3); // Initial + 2 retries
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result: Result<()> = with_retry_when(
            5,
            Duration::from_millis(1),
            |e: &Error| matches!(e, Error::Timeout(_)),
            move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::config("bad value")) }
            },
        )
        .await;

        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spawn_and_log() {
        let handle = spawn_and_log("failing", async { Err::<(), _>(Error::other("boom")) });
        assert!(handle.await.is_ok());
    }
}

/*!
 * Retried execution of device commands.
 *
 * A [`DeviceFunction`] is one unit of work against a device session. The
 * [`RetryCommandExecutor`] runs it while holding the device lock, so work for
 * the same device never interleaves, and retries it when the connection
 * fails. Waiting for the lock and the work itself share one per-attempt
 * timeout; the lock is released before waiting for the next attempt.
 */
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn, Instrument};

use gridlink_core::config::ConnectionConfig;
use gridlink_core::logging::operation_span;
use gridlink_core::utils::{with_retry_when, with_timeout};
use gridlink_devices::{ConnectionParams, DeviceClient};

use crate::connection::{DeviceConnectionService, DeviceSession};
use crate::error::{Error, Result};

/// A unit of work executed against a locked device session
#[async_trait]
pub trait DeviceFunction: Send + Sync {
    /// Result of the work
    type Output: Send;

    /// Name used in logs
    fn name(&self) -> &str;

    /// Do the work
    async fn apply(&self, client: &dyn DeviceClient, session: &mut DeviceSession) -> Result<Self::Output>;
}

/// Runs device functions with per-device serialization and connection retries
#[derive(Debug)]
pub struct RetryCommandExecutor {
    connections: Arc<DeviceConnectionService>,
    max_retries: usize,
    retry_delay: Duration,
    operation_timeout: Duration,
}

impl RetryCommandExecutor {
    /// Create an executor using the retry policy of `config`
    pub fn new(connections: Arc<DeviceConnectionService>, config: &ConnectionConfig) -> Self {
        Self::with_policy(
            connections,
            config.max_retries,
            config.retry_delay(),
            config.operation_timeout(),
        )
    }

    /// Create an executor with an explicit retry policy
    pub fn with_policy(
        connections: Arc<DeviceConnectionService>,
        max_retries: usize,
        retry_delay: Duration,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            connections,
            max_retries,
            retry_delay,
            operation_timeout,
        }
    }

    /// Execute `function` against the device described by `params`.
    ///
    /// Connection errors are retried up to the configured number of times and
    /// end in [`Error::ConnectionFailure`]; any other error is returned as is.
    pub async fn execute<F: DeviceFunction>(&self, params: &ConnectionParams, function: &F) -> Result<F::Output> {
        let span = operation_span(function.name(), params.device_identification.as_str());
        let result = with_retry_when(
            self.max_retries,
            self.retry_delay,
            Error::is_connection_error,
            move |attempt| self.attempt(params, function, attempt),
        )
        .instrument(span)
        .await;

        match result {
            Err(e) if e.is_connection_error() => Err(Error::connection_failure(format!(
                "{} failed for {} after {} attempts: {}",
                function.name(),
                params.device_identification,
                self.max_retries + 1,
                e
            ))),
            other => other,
        }
    }

    async fn attempt<F: DeviceFunction>(
        &self,
        params: &ConnectionParams,
        function: &F,
        attempt: usize,
    ) -> Result<F::Output> {
        debug!(
            "Attempt {} of {} for {}",
            attempt + 1,
            function.name(),
            params.device_identification
        );
        let connection = self.connections.get_or_connect(params).await?;
        let client = self.connections.client().as_ref();
        let started = Instant::now();

        // Waiting for the lock counts against the attempt; timing out here
        // does not invalidate the connection
        let mut session = with_timeout(self.operation_timeout, async {
            Ok::<_, Error>(connection.lock().await)
        })
        .await?;
        let remaining = self.operation_timeout.saturating_sub(started.elapsed());
        let result = with_timeout(remaining, function.apply(client, &mut session)).await;
        drop(session);

        if let Err(e) = &result {
            if e.is_connection_error() {
                warn!(
                    "Connection to {} failed during {}: {}",
                    params.device_identification,
                    function.name(),
                    e
                );
                self.connections.invalidate(&connection).await;
            }
        }
        result
    }
}

/*!
 * Sequence number tracking per device session.
 */
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tracker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceStatus {
    /// No first new sequence number is known; every report is accepted
    AwaitingFirstReport,
    /// Reports older than the first new sequence number are stale
    Active,
}

/// The smallest sequence number considered new in the current session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceState {
    first_new_sq_num: Option<u32>,
}

impl SequenceState {
    /// Create a tracker awaiting its first initialization
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the first new sequence number announced for the session.
    ///
    /// Within a session the value never decreases; a lower value is ignored.
    pub fn initialize(&mut self, sq_num: u32) {
        match self.first_new_sq_num {
            Some(current) if current >= sq_num => {
                debug!(
                    "Keeping first new sequence number {} (announced {})",
                    current, sq_num
                );
            }
            _ => self.first_new_sq_num = Some(sq_num),
        }
    }

    /// Forget the session state, e.g. on reconnect
    pub fn reset(&mut self) {
        self.first_new_sq_num = None;
    }

    /// The first new sequence number, once initialized
    pub fn first_new_sq_num(&self) -> Option<u32> {
        self.first_new_sq_num
    }

    /// Current tracker state
    pub fn state(&self) -> SequenceStatus {
        match self.first_new_sq_num {
            Some(_) => SequenceStatus::Active,
            None => SequenceStatus::AwaitingFirstReport,
        }
    }

    /// Whether a report with `sq_num` carries already seen data
    pub fn is_stale(&self, sq_num: Option<u32>) -> bool {
        matches!((sq_num, self.first_new_sq_num), (Some(sq), Some(first)) if sq < first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_awaiting_first_report_accepts_everything() {
        let state = SequenceState::new();
        assert_eq!(state.state(), SequenceStatus::AwaitingFirstReport);
        assert!(!state.is_stale(Some(0)));
        assert!(!state.is_stale(None));
    }

    #[test]
    fn test_stale_gating() {
        let mut state = SequenceState::new();
        state.initialize(5);
        assert_eq!(state.state(), SequenceStatus::Active);
        assert!(state.is_stale(Some(3)));
        assert!(state.is_stale(Some(4)));
        assert!(!state.is_stale(Some(5)));
        assert!(!state.is_stale(Some(10)));
        assert!(!state.is_stale(None));
    }

    #[test]
    fn test_monotonic_within_session() {
        let mut state = SequenceState::new();
        state.initialize(10);
        state.initialize(7);
        assert_eq!(state.first_new_sq_num(), Some(10));
        state.initialize(12);
        assert_eq!(state.first_new_sq_num(), Some(12));
    }

    #[test]
    fn test_reset() {
        let mut state = SequenceState::new();
        state.initialize(10);
        state.reset();
        assert_eq!(state.state(), SequenceStatus::AwaitingFirstReport);
        state.initialize(2);
        assert_eq!(state.first_new_sq_num(), Some(2));
    }
}

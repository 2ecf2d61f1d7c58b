use std::time::Duration;

use crate::config::PollingConfig;
use crate::error::BotError;

/// What the loop does after a failed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Abandon the cycle, sleep, try again
    Retry(Duration),
    /// Stop the loop
    Fatal,
}

/// Fixed-backoff retry for transient collaborator failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    pub fn from_config(config: &PollingConfig) -> Self {
        Self::new(config.error_backoff())
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn classify(&self, error: &BotError) -> Disposition {
        match error {
            BotError::Transient { .. } | BotError::SwapRejected { .. } => {
                Disposition::Retry(self.backoff)
            }
            BotError::Config(_) | BotError::Invariant(_) => Disposition::Fatal,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PollingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorKind;
    use crate::models::TradeDirection;

    #[test]
    fn test_transient_errors_retry_after_backoff() {
        let policy = RetryPolicy::default();

        for kind in [
            CollaboratorKind::Price,
            CollaboratorKind::Balance,
            CollaboratorKind::Swap,
        ] {
            assert_eq!(
                policy.classify(&BotError::transient(kind, "boom")),
                Disposition::Retry(Duration::from_secs(60))
            );
        }

        let rejected = BotError::SwapRejected {
            direction: TradeDirection::Sell,
            message: "insufficient".to_string(),
        };
        assert_eq!(
            policy.classify(&rejected),
            Disposition::Retry(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_config_and_invariant_errors_are_fatal() {
        let policy = RetryPolicy::new(Duration::from_millis(5));

        assert_eq!(
            policy.classify(&BotError::Config("no pool".to_string())),
            Disposition::Fatal
        );
        assert_eq!(
            policy.classify(&BotError::Invariant("window".to_string())),
            Disposition::Fatal
        );
    }
}

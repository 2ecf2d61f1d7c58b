use std::fmt;

use thiserror::Error;

use crate::models::TradeDirection;

/// Which external collaborator raised a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaboratorKind {
    Price,
    Balance,
    Swap,
}

impl fmt::Display for CollaboratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollaboratorKind::Price => "price",
            CollaboratorKind::Balance => "balance",
            CollaboratorKind::Swap => "swap",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BotError {
    /// Bad or unresolvable configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O failure of a price, balance or swap collaborator. Retryable.
    #[error("Transient {kind} failure: {message}")]
    Transient {
        kind: CollaboratorKind,
        message: String,
    },

    /// The swap executor answered but reported the swap as failed. Retryable.
    #[error("Swap {direction} rejected: {message}")]
    SwapRejected {
        direction: TradeDirection,
        message: String,
    },

    /// Something the gates should have prevented happened anyway.
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl BotError {
    pub fn transient(kind: CollaboratorKind, err: impl fmt::Display) -> Self {
        BotError::Transient {
            kind,
            message: err.to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BotError::Transient { .. } | BotError::SwapRejected { .. }
        )
    }
}

impl From<config::ConfigError> for BotError {
    fn from(err: config::ConfigError) -> Self {
        BotError::Config(err.to_string())
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::Config(err.to_string())
    }
}

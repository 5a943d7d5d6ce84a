//! Crate-wide error type.
//!
//! Only configuration problems are fatal. Link failures are recovered by the
//! publisher through the offline queue and never reach the caller of
//! `publish_point`, but they still flow through this type when a link is
//! closed or driven directly.

use thiserror::Error;

use crate::link::LinkError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("invalid sample: {0}")]
    InvalidSample(String),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key,
            reason: reason.into(),
        }
    }

    /// Whether this error must abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::InvalidSetting { .. })
    }
}

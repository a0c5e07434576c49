use moveecho_core::{PublishError, SubscribeError};
use thiserror::Error;

/// Failures of the location source
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Location permission not granted")]
    PermissionDenied,

    #[error("Location provider unavailable: {0}")]
    Unavailable(String),

    #[error("Location updates already requested")]
    AlreadySubscribed,
}

/// Failures of the preference store
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("Failed to access preferences at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid preferences file: {0}")]
    Format(#[from] serde_yaml::Error),
}

/// Failures of the foreground host
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Foreground host error: {0}")]
pub struct HostError(pub String);

/// Session-level failures
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Preference(#[from] PreferenceError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Subscribe(#[from] SubscribeError),
}

pub type Result<T> = std::result::Result<T, TrackingError>;

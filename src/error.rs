use thiserror::Error;

/// Custom error types for chatvault
#[derive(Error, Debug)]
pub enum ChatVaultError {
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[cfg(feature = "reqwest")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Capture observer is already installed")]
    AlreadyInstalled,
}

impl ChatVaultError {
    /// Create an invalid configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ChatVaultError::Json(_) => "json",
            ChatVaultError::Watch(_) => "watch",
            #[cfg(feature = "reqwest")]
            ChatVaultError::Http(_) => "http",
            ChatVaultError::InvalidConfig { .. } => "config",
            ChatVaultError::AlreadyInstalled => "capture",
        }
    }
}

/// Result type alias for chatvault
pub type Result<T> = std::result::Result<T, ChatVaultError>;

use thiserror::Error;

/// Core error types for Portcullis operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid path template '{template}': {message}")]
    InvalidPathTemplate { template: String, message: String },

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidPathTemplate error
    pub fn invalid_path_template(
        template: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidPathTemplate {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Create a new InvalidMethod error
    pub fn invalid_method(method: impl Into<String>) -> Self {
        Self::InvalidMethod(method.into())
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidMethod(_) | Self::JsonError(_))
    }

    /// Check if this error is a server error (5xx category)
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::InvalidPathTemplate { .. }
        )
    }
}

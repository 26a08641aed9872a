//! Error types for playsync-core

use thiserror::Error;

/// Result type alias using playsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in playsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed runtime configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed field mapping definition
    #[error("Invalid field mapping: {0}")]
    Mapping(String),

    /// A format template referenced a field the record does not have
    #[error("Template '{template}' references missing field '{field}'")]
    MissingTemplateField { template: String, field: String },

    /// A record value could not be converted to its wire type
    #[error("Invalid value for field '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Connection, TLS or timeout failure before a response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx response from a remote API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A 2xx response body that could not be understood
    #[error("Decode error: {0}")]
    Decode(String),

    /// More than one remote entity shares the same title
    #[error("{count} remote entities are titled '{name}'")]
    DuplicateRemote { name: String, count: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// HTTP status if this is an API error.
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure happened below the application layer and may
    /// succeed when repeated. API responses are never transient.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        let message = error.to_string().replace('\n', " ");
        if error.is_timeout() || error.is_connect() || error.is_request() {
            Self::Transport(message)
        } else if error.is_decode() {
            Self::Decode(message)
        } else if let Some(status) = error.status() {
            Self::api(status.as_u16(), message)
        } else {
            Self::Transport(message)
        }
    }
}

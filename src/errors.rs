//! Error handling for the voting terminal

use serde::{Deserialize, Serialize};

/// Result type alias for the voting terminal
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the voting terminal
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Citizen lookup miss
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Duplicate registration (the citizen already voted)
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Rejected authority credential
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Any other non-2xx response or transport failure
    #[error("Server error: {message}")]
    ServerError {
        status: Option<u16>,
        message: String,
    },

    /// Locally detected problems, never sent to the server
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Event not accepted in the current session state
    #[error("Invalid transition: {event} in state {state}")]
    InvalidTransition { state: String, event: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Coarse classification used by notices and screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Unauthorized,
    ServerError,
    Validation,
    Internal,
}

impl Error {
    /// Create a new not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a new conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a new unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a new server error
    pub fn server(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new invalid transition error
    pub fn invalid_transition(state: impl Into<String>, event: impl Into<String>) -> Self {
        Self::InvalidTransition {
            state: state.into(),
            event: event.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classify the error for display
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::InvalidTransition { .. }
            | Self::Config { .. }
            | Self::Serialization(_)
            | Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Message suitable for an inline alert, without the variant prefix
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { message }
            | Self::Conflict { message }
            | Self::Unauthorized { message }
            | Self::ServerError { message, .. }
            | Self::Validation { message }
            | Self::Config { message }
            | Self::Internal { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        let status = value.status().map(|status| status.as_u16());
        let message = if value.is_timeout() {
            "El servidor no respondió a tiempo.".to_string()
        } else {
            value.to_string()
        };
        Self::ServerError { status, message }
    }
}

/// Convenience macro for local validation failures
#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::Error::validation($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::validation(format!($fmt, $($arg)*))
    };
}

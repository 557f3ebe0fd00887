//! Error types for the funnel.

/// Message shown for any failure that has no more specific wording.
pub const GENERIC_FAILURE_MESSAGE: &str = "Registration failed. Please try again.";

/// Message shown when the email is already registered.
pub const DUPLICATE_EMAIL_MESSAGE: &str =
    "Email already registered. Please use a different email address.";

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Funnel error: {0}")]
    Funnel(#[from] FunnelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Durable slot storage errors. Never surfaced to the user.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to open storage: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),
}

/// Failures of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    /// Missing field or token. No network call was made.
    #[error("{0}")]
    Validation(String),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("{reason}")]
    Registration { reason: String },

    /// Registration succeeded but sign-in returned no usable redirect.
    #[error("{reason}")]
    SignIn { reason: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl SubmissionError {
    /// Stable identifier used in analytics and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::DuplicateEmail => "duplicate_email",
            Self::Registration { .. } => "registration",
            Self::SignIn { .. } => "sign_in",
            Self::Transport(_) => "transport",
        }
    }

    /// Text shown to the user in the transient notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::DuplicateEmail => DUPLICATE_EMAIL_MESSAGE.to_string(),
            Self::Registration { reason } | Self::SignIn { reason } if !reason.is_empty() => {
                reason.clone()
            }
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Errors returned by funnel actions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FunnelError {
    #[error("Action {action} is not available on the {screen} screen")]
    InvalidAction { action: String, screen: String },

    #[error("{0}")]
    Validation(String),

    #[error("A submission is already in progress")]
    Busy,

    #[error("Submission failed: {0}")]
    Submission(#[from] SubmissionError),
}

impl FunnelError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAction { .. } => "invalid_action",
            Self::Validation(_) => "validation",
            Self::Busy => "busy",
            Self::Submission(e) => e.kind(),
        }
    }

    pub(crate) fn invalid(action: &str, screen: impl std::fmt::Display) -> Self {
        Self::InvalidAction {
            action: action.to_string(),
            screen: screen.to_string(),
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_email_has_specific_message() {
        assert_eq!(
            SubmissionError::DuplicateEmail.user_message(),
            DUPLICATE_EMAIL_MESSAGE
        );
        assert_eq!(SubmissionError::DuplicateEmail.kind(), "duplicate_email");
    }

    #[test]
    fn empty_reason_falls_back_to_generic_message() {
        let err = SubmissionError::Registration {
            reason: String::new(),
        };
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);

        let err = SubmissionError::Transport("connection reset".into());
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn server_reason_is_shown() {
        let err = SubmissionError::Registration {
            reason: "Invalid captcha".into(),
        };
        assert_eq!(err.user_message(), "Invalid captcha");
        assert_eq!(err.kind(), "registration");
    }

    #[test]
    fn funnel_error_kind_delegates_to_submission() {
        let err = FunnelError::from(SubmissionError::SignIn {
            reason: String::new(),
        });
        assert_eq!(err.kind(), "sign_in");
        assert_eq!(FunnelError::Busy.kind(), "busy");
    }
}

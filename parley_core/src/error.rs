use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, ChatError>;

/// Coarse classification of a [`ChatError`], stable enough to match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    UpstreamAuth,
    UpstreamTransient,
    UpstreamMalformedResponse,
    UpstreamRejected,
    EmptyInput,
    Busy,
    SessionNotFound,
}

/// Everything a chat turn can fail with.
///
/// Remote failures are classified once, where the HTTP response is seen, so
/// callers never inspect transport errors themselves.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{service} rejected the credential: {message}")]
    UpstreamAuth {
        service: &'static str,
        message: String,
    },

    #[error("{service} is temporarily unavailable: {message}")]
    UpstreamTransient {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned a malformed response: {message}")]
    UpstreamMalformedResponse {
        service: &'static str,
        message: String,
    },

    #[error("{service} rejected the request (HTTP {status}): {message}")]
    UpstreamRejected {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Message is empty")]
    EmptyInput,

    #[error("Session {0} is already processing a message")]
    Busy(Uuid),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),
}

impl ChatError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::UpstreamAuth { .. } => ErrorKind::UpstreamAuth,
            Self::UpstreamTransient { .. } => ErrorKind::UpstreamTransient,
            Self::UpstreamMalformedResponse { .. } => ErrorKind::UpstreamMalformedResponse,
            Self::UpstreamRejected { .. } => ErrorKind::UpstreamRejected,
            Self::EmptyInput => ErrorKind::EmptyInput,
            Self::Busy(_) => ErrorKind::Busy,
            Self::SessionNotFound(_) => ErrorKind::SessionNotFound,
        }
    }

    /// Whether sending the same request again may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamTransient { .. })
    }

    pub fn transient(service: &'static str, message: impl Into<String>) -> Self {
        Self::UpstreamTransient {
            service,
            message: message.into(),
        }
    }

    pub fn malformed(service: &'static str, message: impl Into<String>) -> Self {
        Self::UpstreamMalformedResponse {
            service,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status returned by a remote service.
    pub fn from_status(service: &'static str, status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::UpstreamAuth { service, message },
            408 | 409 | 425 | 429 | 500..=599 => Self::UpstreamTransient { service, message },
            _ => Self::UpstreamRejected {
                service,
                status,
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(
            ChatError::from_status("openai", 401, "bad key").kind(),
            ErrorKind::UpstreamAuth
        );
        assert_eq!(
            ChatError::from_status("openai", 403, "forbidden").kind(),
            ErrorKind::UpstreamAuth
        );
        assert_eq!(
            ChatError::from_status("openai", 429, "slow down").kind(),
            ErrorKind::UpstreamTransient
        );
        assert_eq!(
            ChatError::from_status("openai", 503, "overloaded").kind(),
            ErrorKind::UpstreamTransient
        );
        assert_eq!(
            ChatError::from_status("openai", 404, "no such model").kind(),
            ErrorKind::UpstreamRejected
        );
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(ChatError::transient("openai", "timeout").is_retryable());
        assert!(!ChatError::malformed("openai", "not json").is_retryable());
        assert!(!ChatError::from_status("openai", 401, "bad key").is_retryable());
        assert!(!ChatError::EmptyInput.is_retryable());
    }

    #[test]
    fn display_names_the_service() {
        let err = ChatError::from_status("serpapi", 401, "Invalid API key");
        assert_eq!(
            err.to_string(),
            "serpapi rejected the credential: Invalid API key"
        );
    }
}

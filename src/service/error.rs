//! Errors returned by a channel service

use crate::core::error_handling::ContextualError;
use crate::registry::ForeignHandle;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("{operation} failed: {message}")]
    CallFailed {
        operation: &'static str,
        message: String,
    },

    #[error("unknown channel handle {0}")]
    UnknownHandle(ForeignHandle),

    #[error("service is not attached to a notification queue")]
    NotAttached,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal service error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn call_failed(operation: &'static str, message: impl Into<String>) -> Self {
        ServiceError::CallFailed {
            operation,
            message: message.into(),
        }
    }
}

impl ContextualError for ServiceError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ServiceError::InvalidRequest(_))
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ServiceError::InvalidRequest(message) => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ServiceError::call_failed("array_get", "channel disconnected");
        assert_eq!(err.to_string(), "array_get failed: channel disconnected");
        assert!(!err.is_user_actionable());

        let err = ServiceError::InvalidRequest("count is zero".into());
        assert_eq!(err.user_message(), Some("count is zero"));
        assert_eq!(
            ServiceError::UnknownHandle(ForeignHandle(4)).to_string(),
            "unknown channel handle #4"
        );
    }
}

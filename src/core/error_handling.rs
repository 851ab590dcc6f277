//! Error reporting helpers shared by the library's error types

/// Errors that know whether their message is meant for an operator.
///
/// Configuration mistakes are actionable and carry their own message.
/// Failures inside the service collaborator are not, and are logged under
/// a generic context with the detail at debug level.
///
/// When `is_user_actionable()` is `true`, `user_message()` must be `Some`.
pub trait ContextualError: std::error::Error {
    fn is_user_actionable(&self) -> bool;

    fn user_message(&self) -> Option<&str>;
}

/// Log `error` at error level, preferring its own message when it is
/// actionable and falling back to `operation_context` otherwise.
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message().filter(|_| error.is_user_actionable()) {
        Some(user_msg) => log::error!("{}: {}", operation_context, user_msg),
        None => log::error!("{} failed", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}

/// Render an error for the diagnostic sink, choosing the same message that
/// [`log_error_with_context`] would log.
pub fn describe_error<E: ContextualError>(error: &E, operation_context: &str) -> String {
    match error.user_message().filter(|_| error.is_user_actionable()) {
        Some(user_msg) => format!("{}: {}", operation_context, user_msg),
        None => format!("{}: {}", operation_context, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    enum ProbeError {
        #[error("{0}")]
        Setting(String),
        #[error("socket closed")]
        Io,
    }

    impl ContextualError for ProbeError {
        fn is_user_actionable(&self) -> bool {
            matches!(self, ProbeError::Setting(_))
        }

        fn user_message(&self) -> Option<&str> {
            match self {
                ProbeError::Setting(msg) => Some(msg),
                ProbeError::Io => None,
            }
        }
    }

    #[test]
    fn test_actionable_error_uses_own_message() {
        let error = ProbeError::Setting("priority must be below 100".to_string());
        assert!(error.is_user_actionable());
        assert_eq!(
            describe_error(&error, "config"),
            "config: priority must be below 100"
        );
        log_error_with_context(&error, "config");
    }

    #[test]
    fn test_system_error_falls_back_to_display() {
        let error = ProbeError::Io;
        assert!(!error.is_user_actionable());
        assert_eq!(error.user_message(), None);
        assert_eq!(describe_error(&error, "create"), "create: socket closed");
    }
}

use crate::core::error_handling::ContextualError;
use crate::service::ServiceError;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("A client context is already active in this process")]
    AlreadyActive,

    #[error("Channel service could not be attached: {0}")]
    Attach(#[from] ServiceError),
}

impl ContextualError for ContextError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ContextError::AlreadyActive)
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ContextError::AlreadyActive => {
                Some("finalise the existing context before initialising another")
            }
            ContextError::Attach(_) => None,
        }
    }
}

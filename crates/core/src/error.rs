use crate::reconciliation::ChangeSetError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Asset {0} has already been scanned in this session")]
    Duplicate(String),

    #[error("Cannot {action} a session that is {from}")]
    InvalidTransition {
        action: &'static str,
        from: crate::session::SessionStatus,
    },

    #[error(transparent)]
    ChangeSet(#[from] ChangeSetError),
}

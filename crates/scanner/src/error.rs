use opname_client::ApiError;
use opname_core::error::CoreError;
use opname_core::reconciliation::ChangeSetError;
use opname_store::StoreError;

/// Errors from the scanning workflow.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Validation, duplicate, lifecycle or change-set error from the domain.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A remote call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The local state file could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No opname session is in progress")]
    NoActiveSession,
}

impl From<ChangeSetError> for ScanError {
    fn from(err: ChangeSetError) -> Self {
        Self::Core(err.into())
    }
}

impl ScanError {
    /// Whether the user can fix this by editing input, as opposed to a
    /// remote or local failure.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Core(_) | Self::NoActiveSession)
    }
}

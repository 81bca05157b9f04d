use thiserror::Error;

/// Unified error type for git-promote operations
#[derive(Error, Debug)]
pub enum PromoteError {
    #[error("Version format error: {0}")]
    Format(String),

    #[error("Remote unreachable: {0}")]
    RemoteUnreachable(String),

    #[error("Timed out after {millis}ms while {operation}")]
    Timeout { operation: String, millis: u64 },

    #[error("Branch not found on remote: {0}")]
    BranchNotFound(String),

    #[error("No version tag in the tip commit of '{branch}': {first_line:?}")]
    VersionNotFound { branch: String, first_line: String },

    #[error("Illegal base version {base}: current dev version is {current}")]
    IllegalTransition { base: String, current: String },

    #[error("Promotion aborted during {stage}, remote left unchanged: {reason}")]
    MutationAborted { stage: String, reason: String },

    #[error(
        "Push to '{branch}' could not be verified (expected {expected}): {reason}. \
         The remote may already hold the new commit; inspect it before retrying"
    )]
    MutationPartial {
        branch: String,
        expected: String,
        reason: String,
    },

    #[error("Refusing to release {candidate}: main already carries {current}")]
    ReleaseRegression { candidate: String, current: String },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in git-promote
pub type Result<T> = std::result::Result<T, PromoteError>;

impl PromoteError {
    /// Create a version format error with context
    pub fn format(msg: impl Into<String>) -> Self {
        PromoteError::Format(msg.into())
    }

    /// Create a remote transport error with context
    pub fn unreachable(msg: impl Into<String>) -> Self {
        PromoteError::RemoteUnreachable(msg.into())
    }

    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        PromoteError::Config(msg.into())
    }

    /// Create a precondition error with context
    pub fn precondition(msg: impl Into<String>) -> Self {
        PromoteError::Precondition(msg.into())
    }

    /// Create an aborted-mutation error for the named protocol stage
    pub fn aborted(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        PromoteError::MutationAborted {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Errors worth a second attempt: transport failures and expired deadlines.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PromoteError::RemoteUnreachable(_) | PromoteError::Timeout { .. }
        )
    }

    /// The one class an operator must inspect by hand.
    pub fn is_partial(&self) -> bool {
        matches!(self, PromoteError::MutationPartial { .. })
    }
}

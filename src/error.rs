use thiserror::Error;

/// A single failed call inside a bulk membership operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberFailure {
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Credentials rejected or endpoint unreachable during admin login.
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("User profile component not found")]
    ProfileNotFound,

    #[error("Malformed user profile configuration: {0}")]
    MalformedConfig(String),

    #[error("Remote call failed with status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{} membership call(s) failed: {}", .0.len(), join_ids(.0))]
    Aggregate(Vec<MemberFailure>),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DirectoryError {
    /// True for a remote 404, which lookups translate into an absent result.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::Remote { status: 404, .. })
    }

    /// Ids that failed, when this is an aggregate membership error.
    pub fn failed_ids(&self) -> Vec<&str> {
        match self {
            DirectoryError::Aggregate(failures) => {
                failures.iter().map(|f| f.user_id.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn join_ids(failures: &[MemberFailure]) -> String {
    failures
        .iter()
        .map(|f| f.user_id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

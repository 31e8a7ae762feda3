use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpsError {
    #[error("Tenant not found")]
    TenantNotFound(i64),

    #[error("Tag not found")]
    TagNotFound(i64),

    #[error("Mapping not found")]
    MappingNotFound(i64),

    #[error("Task not found")]
    TaskNotFound(i64),

    #[error("Agent '{0}' not found")]
    AgentNotFound(String),

    #[error("Workbench {0} not found")]
    WorkbenchNotFound(i64),

    #[error("Agent '{0}' already exists")]
    AgentExists(String),

    #[error("Workbench '{0}' already exists")]
    WorkbenchExists(String),

    #[error("Role must be one of: Assessor, Reviewer, Team Lead, Viewer (got '{0}')")]
    InvalidRole(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl OpsError {
    /// True for the "resource does not exist" family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OpsError::TenantNotFound(_)
                | OpsError::TagNotFound(_)
                | OpsError::MappingNotFound(_)
                | OpsError::TaskNotFound(_)
                | OpsError::AgentNotFound(_)
                | OpsError::WorkbenchNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OpsError>;

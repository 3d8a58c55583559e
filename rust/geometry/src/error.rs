use ifc_mend_model::StepId;
use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during geometry reconstruction
#[derive(Error, Debug)]
pub enum Error {
    #[error("Triangulation failed: {0}")]
    Triangulation(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid sweep parameters: {0}")]
    InvalidSweep(String),

    #[error("Boolean operation failed: {0}")]
    Boolean(String),

    #[error("Solid failed validation: {0}")]
    InvalidSolid(String),

    #[error("Entity {id} has malformed attribute '{name}'")]
    MalformedAttribute { id: StepId, name: &'static str },

    #[error("Entity {id} is not a {expected}")]
    WrongKind { id: StepId, expected: &'static str },

    #[error("Unsupported schema feature: {0}")]
    UnsupportedSchema(&'static str),

    #[error("Model error: {0}")]
    Model(#[from] ifc_mend_model::Error),
}

impl Error {
    pub fn malformed(id: StepId, name: &'static str) -> Self {
        Self::MalformedAttribute { id, name }
    }
}

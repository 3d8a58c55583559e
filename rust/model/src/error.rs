use crate::entity::StepId;
use thiserror::Error;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading the entity graph
#[derive(Error, Debug)]
pub enum Error {
    #[error("No entity with id {0}")]
    UnknownEntity(StepId),

    #[error("Entity {id} is missing required attribute '{name}'")]
    MissingAttribute { id: StepId, name: String },

    #[error("Attribute '{name}' on {id} is not a {expected}")]
    AttributeType {
        id: StepId,
        name: String,
        expected: &'static str,
    },

    #[error("Unit scale factor {0} is not a positive finite number")]
    InvalidUnitScale(f64),
}

impl Error {
    pub fn missing(id: StepId, name: &str) -> Self {
        Self::MissingAttribute {
            id,
            name: name.to_string(),
        }
    }

    pub fn attribute_type(id: StepId, name: &str, expected: &'static str) -> Self {
        Self::AttributeType {
            id,
            name: name.to_string(),
            expected,
        }
    }
}

use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    InvalidId { kind: &'static str, value: String },
    InvalidPosition { latitude: String, longitude: String },
    InvalidRole(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidId { kind, value } => {
                write!(f, "invalid {kind} id: {value:?}")
            }
            ModelError::InvalidPosition {
                latitude,
                longitude,
            } => write!(f, "invalid position: ({latitude}, {longitude})"),
            ModelError::InvalidRole(raw) => write!(f, "invalid role: {raw:?}"),
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;

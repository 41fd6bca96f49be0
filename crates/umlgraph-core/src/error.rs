use std::path::PathBuf;

use thiserror::Error;

use crate::validate::ValidationReport;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("not initialized: run 'umlgraph init'")]
    NotInitialized,

    #[error("invalid extraction data:\n{0}")]
    Invalid(ValidationReport),

    #[error("malformed extraction data: {0}")]
    Malformed(String),

    #[error("unsupported input format '{0}': expected .json, .yaml or .yml")]
    UnsupportedFormat(String),

    #[error("graph store unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("graph store rejected write for schema block '{block}': {reason}")]
    Backend { block: String, reason: String },

    #[error("graph store error: {0}")]
    Store(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("invalid reconcile policy '{0}': expected 'merge' or 'replace'")]
    InvalidPolicy(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    /// True for failures raised before anything was written.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            GraphError::Invalid(_)
                | GraphError::Malformed(_)
                | GraphError::UnsupportedFormat(_)
                | GraphError::Yaml(_)
                | GraphError::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

use thiserror::Error;

/// Failures surfaced by the editing engine. A rejected connection is not an
/// error; see [`crate::GraphStore::add_edge`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// Malformed import payload. The current graph is left untouched.
    #[error("invalid graph document: {0}")]
    Format(String),

    #[error("node '{0}' not found")]
    NodeNotFound(String),

    #[error("edge '{0}' not found")]
    EdgeNotFound(String),

    #[error("control point '{point}' not found on edge '{edge}'")]
    ControlPointNotFound { edge: String, point: String },
}

impl GraphError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GraphError::NodeNotFound(_)
                | GraphError::EdgeNotFound(_)
                | GraphError::ControlPointNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Format(err.to_string())
    }
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;

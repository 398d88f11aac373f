use serde::{Deserialize, Serialize};

use crate::*;

/// A connect gesture before it becomes an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: String,
    pub source_handle: Side,
    pub target: String,
    pub target_handle: Side,
}

/// Decides whether `connection` may become an edge: no self-loops and at most
/// one edge per unordered node pair, whatever the handles.
pub fn is_valid_connection(edges: &[Edge], connection: &Connection) -> bool {
    if connection.source == connection.target {
        return false;
    }

    !edges
        .iter()
        .any(|edge| edge.joins(&connection.source, &connection.target))
}

use std::collections::HashMap;

use crate::*;

/// Nodes moving together in one drag, with where each started.
#[derive(Debug, Clone, PartialEq)]
pub struct DragGesture {
    pub ids: Vec<String>,
    origins: HashMap<String, Point>,
}

impl DragGesture {
    pub fn origin(&self, id: &str) -> Option<Point> {
        self.origins.get(id).copied()
    }

    /// Target positions for every dragged node when `lead` is at `to`. The
    /// others keep their offset from `lead`.
    pub fn positions_for(&self, lead: &str, to: Point) -> Option<Vec<(String, Point)>> {
        let start = self.origin(lead)?;
        let (dx, dy) = (to.x - start.x, to.y - start.y);
        Some(
            self.ids
                .iter()
                .filter_map(|id| self.origin(id).map(|origin| (id.clone(), origin.offset(dx, dy))))
                .collect(),
        )
    }
}

/// Selection flags live on the nodes and edges themselves so they round-trip
/// through snapshots; this type only adds the in-flight drag.
#[derive(Debug, Clone, Default)]
pub struct SelectionManager {
    drag: Option<DragGesture>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_all(&self, store: &mut GraphStore) -> GraphChange {
        store.set_all_selected(true)
    }

    pub fn deselect_all(&self, store: &mut GraphStore) -> GraphChange {
        store.set_all_selected(false)
    }

    /// Selects one node. Without `additive` everything else is deselected.
    pub fn select_node(&self, store: &mut GraphStore, id: &str, additive: bool) -> GraphResult<GraphChange> {
        if !store.graph().contains_node(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }
        let cleared = if additive {
            GraphChange::Unchanged
        } else {
            store.set_all_selected(false)
        };
        let selected = store.set_node_selected(id, true)?;
        Ok(if cleared.is_change() || selected.is_change() {
            GraphChange::SelectionChanged
        } else {
            GraphChange::Unchanged
        })
    }

    pub fn select_edge(&self, store: &mut GraphStore, id: &str, additive: bool) -> GraphResult<GraphChange> {
        if store.graph().edge(id).is_none() {
            return Err(GraphError::EdgeNotFound(id.to_string()));
        }
        let cleared = if additive {
            GraphChange::Unchanged
        } else {
            store.set_all_selected(false)
        };
        let selected = store.set_edge_selected(id, true)?;
        Ok(if cleared.is_change() || selected.is_change() {
            GraphChange::SelectionChanged
        } else {
            GraphChange::Unchanged
        })
    }

    /// Starts a drag of `ids`, or of the current node selection when `ids` is
    /// empty. Replaces any gesture already in flight.
    pub fn begin_drag(&mut self, graph: &Graph, ids: &[String]) -> GraphResult<&DragGesture> {
        let ids = if ids.is_empty() {
            graph.selected_node_ids()
        } else {
            ids.to_vec()
        };

        let mut origins = HashMap::with_capacity(ids.len());
        for id in &ids {
            let node = graph
                .node(id)
                .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
            origins.insert(id.clone(), node.position);
        }

        Ok(&*self.drag.insert(DragGesture { ids, origins }))
    }

    pub fn drag(&self) -> Option<&DragGesture> {
        self.drag.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn finish_drag(&mut self) -> Option<DragGesture> {
        self.drag.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_all_then_deselect_all() {
        let mut store = GraphStore::default();
        let a = store.add_node(ShapeKind::Circle, Point::new(0.0, 0.0), None);
        let b = store.add_node(ShapeKind::Hexagon, Point::new(300.0, 0.0), None);
        store
            .add_edge(&Connection {
                source: a.id.clone(),
                source_handle: Side::Bottom,
                target: b.id.clone(),
                target_handle: Side::Top,
            })
            .unwrap();

        let selection = SelectionManager::new();
        assert_eq!(selection.select_all(&mut store), GraphChange::SelectionChanged);
        assert!(store.graph().nodes.iter().all(|node| node.selected));
        assert!(store.graph().edges.iter().all(|edge| edge.selected));
        assert_eq!(selection.select_all(&mut store), GraphChange::Unchanged);

        selection.deselect_all(&mut store);
        assert!(store.graph().nodes.iter().all(|node| !node.selected));
        assert!(store.graph().edges.iter().all(|edge| !edge.selected));
    }

    #[test]
    fn select_node_replaces_or_extends() {
        let mut store = GraphStore::default();
        let a = store.add_node(ShapeKind::Circle, Point::default(), None);
        let b = store.add_node(ShapeKind::Circle, Point::default(), None);
        let selection = SelectionManager::new();

        selection.select_node(&mut store, &a.id, false).unwrap();
        assert_eq!(store.graph().selected_node_ids(), vec![a.id.clone()]);

        selection.select_node(&mut store, &b.id, true).unwrap();
        assert_eq!(store.graph().selected_node_ids(), vec![a.id.clone(), b.id.clone()]);

        assert!(selection.select_node(&mut store, "nope", false).is_err());
    }

    #[test]
    fn drag_defaults_to_selection_and_keeps_offsets() {
        let mut store = GraphStore::default();
        let a = store.add_node(ShapeKind::Circle, Point::new(0.0, 0.0), None);
        let b = store.add_node(ShapeKind::Circle, Point::new(100.0, 50.0), None);
        let mut selection = SelectionManager::new();
        selection.select_all(&mut store);

        let gesture = selection.begin_drag(store.graph(), &[]).unwrap().clone();
        assert_eq!(gesture.ids.len(), 2);

        let moved = gesture.positions_for(&a.id, Point::new(10.0, 20.0)).unwrap();
        assert_eq!(moved[0], (a.id.clone(), Point::new(10.0, 20.0)));
        assert_eq!(moved[1], (b.id.clone(), Point::new(110.0, 70.0)));
        assert!(gesture.positions_for("other", Point::default()).is_none());

        assert!(selection.is_dragging());
        selection.finish_drag();
        assert!(!selection.is_dragging());
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::*;

/// Everything a renderer needs to paint one edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeGeometry {
    pub id: String,
    /// SVG path data.
    pub path: String,
    pub commands: Vec<PathCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub label_anchor: Point,
    pub handles: Vec<ControlPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStatus {
    pub can_undo: bool,
    pub can_redo: bool,
    pub undo_depth: usize,
    pub redo_depth: usize,
}

/// One open editor: the graph plus its undo history, drag state and handle
/// identities. Every history-worthy operation snapshots the graph as it was
/// before the operation, and only when the operation changed something.
#[derive(Debug, Clone)]
pub struct EditorSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    config: EditorConfig,
    store: GraphStore,
    history: HistoryManager,
    selection: SelectionManager,
    geometry: GeometryEngine,
    handle_slots: HashMap<String, HandleSlots>,
    /// Edge whose handle is being dragged; its snapshot is already taken.
    handle_drag: Option<String>,
    /// Undo depth right after the open gesture took its snapshot.
    gesture_depth: Option<usize>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditorSession {
    pub fn new(config: EditorConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            last_activity_at: now,
            store: GraphStore::new(config.cascade_direction),
            history: HistoryManager::with_limit(config.history_limit),
            selection: SelectionManager::new(),
            geometry: GeometryEngine::new(config.min_handle_spacing),
            handle_slots: HashMap::new(),
            handle_drag: None,
            gesture_depth: None,
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        self.store.graph()
    }

    pub fn history_status(&self) -> HistoryStatus {
        HistoryStatus {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            undo_depth: self.history.undo_count(),
            redo_depth: self.history.redo_count(),
        }
    }

    fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    /// Runs `mutation` as one undoable step, after committing any open gesture.
    fn record<F>(&mut self, action: &'static str, mutation: F) -> GraphResult<GraphChange>
    where
        F: FnOnce(&mut GraphStore) -> GraphResult<GraphChange>,
    {
        self.settle_gestures();
        let before = self.store.graph().clone();
        let change = mutation(&mut self.store)?;
        if change.is_change() {
            self.history.take_snapshot(&before);
            self.forget_removed_edges();
            self.touch();
            debug!(action, undo_depth = self.history.undo_count(), "snapshot taken");
        }
        Ok(change)
    }

    fn forget_removed_edges(&mut self) {
        let graph = self.store.graph();
        self.handle_slots.retain(|id, _| graph.edge(id).is_some());
    }

    pub fn add_node(&mut self, shape: ShapeKind, position: Point, size: Option<Size>) -> Node {
        self.settle_gestures();
        self.history.take_snapshot(self.store.graph());
        let node = self.store.add_node(shape, position, size);
        self.touch();
        debug!(node = %node.id, shape = shape.as_str(), "node added");
        node
    }

    pub fn update_node_color(&mut self, id: &str, color: &str) -> GraphResult<GraphChange> {
        self.record("recolor", |store| store.update_node_color(id, color))
    }

    pub fn update_node_contents(&mut self, id: &str, contents: &str) -> GraphResult<GraphChange> {
        self.record("retitle", |store| store.update_node_contents(id, contents))
    }

    pub fn update_node_geometry(&mut self, id: &str, geometry: NodeGeometry) -> GraphResult<GraphChange> {
        self.record("node geometry", |store| store.update_node_geometry(id, geometry))
    }

    pub fn delete_node(&mut self, id: &str) -> GraphResult<GraphChange> {
        self.settle_gestures();
        let change = self.record("delete node", |store| store.delete_node(id))?;
        if let GraphChange::NodesRemoved { nodes, edges } = &change {
            info!(node = id, removed_nodes = nodes.len(), removed_edges = edges.len(), "node deleted");
        }
        Ok(change)
    }

    /// `Ok(None)` when the connection is rejected; no undo step is recorded.
    pub fn add_edge(&mut self, connection: &Connection) -> GraphResult<Option<Edge>> {
        self.settle_gestures();
        let before = self.store.graph().clone();
        match self.store.add_edge(connection)? {
            Some(edge) => {
                self.history.take_snapshot(&before);
                self.touch();
                debug!(edge = %edge.id, "edge added");
                Ok(Some(edge))
            }
            None => {
                debug!(
                    source = %connection.source,
                    target = %connection.target,
                    "connection rejected"
                );
                Ok(None)
            }
        }
    }

    pub fn reconnect_edge(&mut self, id: &str, connection: &Connection) -> GraphResult<GraphChange> {
        self.record("reconnect", |store| store.reconnect_edge(id, connection))
    }

    pub fn delete_edge(&mut self, id: &str) -> GraphResult<GraphChange> {
        self.settle_gestures();
        self.record("delete edge", |store| store.delete_edge(id))
    }

    pub fn set_edge_routing_algorithm(
        &mut self,
        id: &str,
        algorithm: RoutingAlgorithm,
    ) -> GraphResult<GraphChange> {
        self.record("routing", |store| store.set_edge_routing_algorithm(id, algorithm))
    }

    pub fn set_edge_line_style(&mut self, id: &str, style: LineStyle) -> GraphResult<GraphChange> {
        self.record("line style", |store| store.set_edge_line_style(id, style))
    }

    pub fn set_edge_label(&mut self, id: &str, label: &str) -> GraphResult<GraphChange> {
        self.record("label", |store| store.set_edge_label(id, label))
    }

    pub fn set_edge_label_position(&mut self, id: &str, position: f32) -> GraphResult<GraphChange> {
        self.record("label position", |store| store.set_edge_label_position(id, position))
    }

    pub fn remove_control_point(&mut self, edge_id: &str, point_id: &str) -> GraphResult<GraphChange> {
        self.record("remove point", |store| store.remove_edge_point(edge_id, point_id))
    }

    /// Path, label anchor and handles of one edge. Handle identifiers stay
    /// stable between calls (see [`HandleSlots`]).
    pub fn edge_geometry(&mut self, edge_id: &str) -> GraphResult<EdgeGeometry> {
        let graph = self.store.graph();
        let edge = graph
            .edge(edge_id)
            .ok_or_else(|| GraphError::EdgeNotFound(edge_id.to_string()))?;
        let source = graph
            .node(&edge.source)
            .ok_or_else(|| GraphError::NodeNotFound(edge.source.clone()))?;
        let target = graph
            .node(&edge.target)
            .ok_or_else(|| GraphError::NodeNotFound(edge.target.clone()))?;

        let input = PathInput::new(
            source.handle_position(edge.source_handle),
            target.handle_position(edge.target_handle),
            &edge.points,
        )
        .with_sides(edge.source_handle, edge.target_handle);

        let descriptor = self.geometry.compute_path(&input, edge.algorithm);
        let slots = self.handle_slots.entry(edge.id.clone()).or_default();
        let handles = self.geometry.compute_handles(&input, edge.algorithm, slots);
        let label_anchor = descriptor
            .point_at(edge.label_position.unwrap_or(DEFAULT_LABEL_POSITION))
            .unwrap_or(input.source);

        Ok(EdgeGeometry {
            id: edge.id.clone(),
            path: descriptor.to_svg(),
            commands: descriptor.commands,
            label: edge.label.clone(),
            label_anchor,
            handles,
        })
    }

    /// Starts dragging a handle of `edge_id`: one snapshot for the whole drag.
    pub fn begin_handle_drag(&mut self, edge_id: &str, handle_id: &str) -> GraphResult<ControlPoint> {
        self.settle_gestures();
        let handle = self.find_handle(edge_id, handle_id)?;
        self.history.take_snapshot(self.store.graph());
        self.gesture_depth = Some(self.history.undo_count());
        self.handle_drag = Some(edge_id.to_string());
        debug!(edge = edge_id, handle = handle_id, "handle drag started");
        Ok(handle)
    }

    /// Moves a handle. Inside a handle drag of the same edge this extends the
    /// gesture; otherwise any open gesture is committed and the move is an
    /// undoable step of its own.
    pub fn drag_handle(&mut self, edge_id: &str, handle_id: &str, to: Point) -> GraphResult<GraphChange> {
        let handle = self.find_handle(edge_id, handle_id)?;
        if self.handle_drag.as_deref() == Some(edge_id) {
            self.touch();
            return self.store.drag_edge_handle(edge_id, &handle, to);
        }
        self.record("handle drag", |store| store.drag_edge_handle(edge_id, &handle, to))
    }

    pub fn end_handle_drag(&mut self) {
        if self.handle_drag.take().is_some() {
            self.drop_empty_snapshot();
        }
    }

    fn find_handle(&mut self, edge_id: &str, handle_id: &str) -> GraphResult<ControlPoint> {
        let edge = self
            .store
            .graph()
            .edge(edge_id)
            .ok_or_else(|| GraphError::EdgeNotFound(edge_id.to_string()))?;
        if let Some(point) = edge.points.iter().find(|point| point.id == handle_id) {
            return Ok(point.clone());
        }

        self.edge_geometry(edge_id)?
            .handles
            .into_iter()
            .find(|handle| handle.id == handle_id)
            .ok_or_else(|| GraphError::ControlPointNotFound {
                edge: edge_id.to_string(),
                point: handle_id.to_string(),
            })
    }

    /// Starts moving `ids` (or the current selection when empty). The
    /// snapshot is taken here, before any position changes.
    pub fn begin_drag(&mut self, ids: &[String]) -> GraphResult<()> {
        self.settle_gestures();
        let count = self.selection.begin_drag(self.store.graph(), ids)?.ids.len();
        self.history.take_snapshot(self.store.graph());
        self.gesture_depth = Some(self.history.undo_count());
        debug!(nodes = count, "drag started");
        Ok(())
    }

    /// Moves `lead` to `position` and every other dragged node by the same
    /// delta. Returns the alignment guides for `lead`; with `snap` the move
    /// is first adjusted onto them.
    pub fn drag_to(&mut self, lead: &str, position: Point, snap: bool) -> GraphResult<HelperLines> {
        let in_gesture = self
            .selection
            .drag()
            .is_some_and(|gesture| gesture.origin(lead).is_some());
        if !in_gesture {
            self.begin_drag(&[lead.to_string()])?;
        }

        let graph = self.store.graph();
        let node = graph
            .node(lead)
            .ok_or_else(|| GraphError::NodeNotFound(lead.to_string()))?;
        let size = node.size;

        let Some(gesture) = self.selection.drag() else {
            return Ok(HelperLines::default());
        };
        let still: Vec<Node> = graph
            .nodes
            .iter()
            .filter(|node| gesture.origin(&node.id).is_none())
            .cloned()
            .collect();

        let lines = compute_helper_lines(lead, position, size, &still, self.config.helper_line_tolerance);
        let position = if snap { lines.snap(position, size) } else { position };

        let moves = gesture.positions_for(lead, position).unwrap_or_default();
        for (id, to) in moves {
            self.store.update_node_geometry(&id, NodeGeometry::Position(to))?;
        }
        self.touch();
        Ok(lines)
    }

    /// Commits the drag in flight. A drag that moved nothing leaves no undo
    /// step behind.
    pub fn end_drag(&mut self) -> bool {
        if self.selection.finish_drag().is_none() {
            return false;
        }
        self.drop_empty_snapshot();
        true
    }

    /// Abandons the drag in flight and puts every node back where it started.
    pub fn cancel_drag(&mut self) -> bool {
        if self.selection.finish_drag().is_none() {
            return false;
        }
        if let Some(before) = self.pop_gesture_snapshot() {
            *self.store.graph_mut() = before;
        }
        info!("drag cancelled");
        true
    }

    pub fn is_dragging(&self) -> bool {
        self.selection.is_dragging() || self.handle_drag.is_some()
    }

    /// The snapshot taken when the open gesture began, if it is still the
    /// newest one.
    fn pop_gesture_snapshot(&mut self) -> Option<Graph> {
        let depth = self.gesture_depth.take()?;
        if depth != self.history.undo_count() {
            return None;
        }
        self.history.pop_snapshot()
    }

    fn drop_empty_snapshot(&mut self) {
        if let Some(before) = self.pop_gesture_snapshot() {
            if &before != self.store.graph() {
                self.history.take_snapshot(&before);
            }
        }
    }

    /// Finishes whichever gesture is still open so the next action starts
    /// from a committed state.
    fn settle_gestures(&mut self) {
        self.end_drag();
        self.end_handle_drag();
    }

    pub fn select_all(&mut self) -> GraphChange {
        self.selection.select_all(&mut self.store)
    }

    pub fn deselect_all(&mut self) -> GraphChange {
        self.selection.deselect_all(&mut self.store)
    }

    pub fn select_node(&mut self, id: &str, additive: bool) -> GraphResult<GraphChange> {
        self.selection.select_node(&mut self.store, id, additive)
    }

    pub fn select_edge(&mut self, id: &str, additive: bool) -> GraphResult<GraphChange> {
        self.selection.select_edge(&mut self.store, id, additive)
    }

    pub fn undo(&mut self) -> bool {
        self.settle_gestures();
        let undone = self.history.undo(self.store.graph_mut());
        if undone {
            self.forget_removed_edges();
            self.touch();
            info!(undo_depth = self.history.undo_count(), "undo");
        }
        undone
    }

    pub fn redo(&mut self) -> bool {
        self.settle_gestures();
        let redone = self.history.redo(self.store.graph_mut());
        if redone {
            self.forget_removed_edges();
            self.touch();
            info!(redo_depth = self.history.redo_count(), "redo");
        }
        redone
    }

    /// Replaces the whole graph in one undoable step. Nothing changes when
    /// the graph is rejected.
    pub fn replace_graph(&mut self, graph: Graph) -> GraphResult<GraphChange> {
        self.settle_gestures();
        let result = self.record("replace graph", |store| store.replace_graph(graph));
        match &result {
            Ok(_) => info!(
                nodes = self.store.graph().nodes.len(),
                edges = self.store.graph().edges.len(),
                "graph replaced"
            ),
            Err(err) => warn!(error = %err, "graph replacement rejected"),
        }
        result
    }

    pub fn import_json(&mut self, json: &str) -> GraphResult<GraphChange> {
        match parse_graph(json) {
            Ok(graph) => self.replace_graph(graph),
            Err(err) => {
                warn!(error = %err, "import rejected");
                Err(err)
            }
        }
    }

    pub fn export_json(&self) -> GraphResult<String> {
        export_graph(self.store.graph())
    }
}

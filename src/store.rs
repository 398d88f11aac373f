use chrono::Utc;
use std::collections::{HashSet, VecDeque};

use crate::*;

/// What a mutation did. Returned by every [`GraphStore`] mutation so the
/// caller can decide whether the action is worth an undo step.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphChange {
    Unchanged,
    NodeAdded(String),
    NodeUpdated(String),
    NodesRemoved {
        nodes: Vec<String>,
        edges: Vec<String>,
    },
    EdgeAdded(String),
    EdgeUpdated(String),
    EdgeRemoved(String),
    SelectionChanged,
    Replaced,
}

impl GraphChange {
    pub fn is_change(&self) -> bool {
        !matches!(self, GraphChange::Unchanged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeGeometry {
    Position(Point),
    Size(Size),
}

/// Owner of the canonical node and edge collections. Every mutation keeps the
/// graph free of self-loops, duplicate node pairs and dangling edges.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    graph: Graph,
    cascade: CascadeDirection,
    last_node_id: i64,
}

impl GraphStore {
    pub fn new(cascade: CascadeDirection) -> Self {
        Self {
            graph: Graph::new(),
            cascade,
            last_node_id: 0,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    pub fn cascade_direction(&self) -> CascadeDirection {
        self.cascade
    }

    pub fn set_cascade_direction(&mut self, cascade: CascadeDirection) {
        self.cascade = cascade;
    }

    /// Direct access for snapshot restoration only.
    pub(crate) fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn add_node(&mut self, shape: ShapeKind, position: Point, size: Option<Size>) -> Node {
        let size = match size {
            Some(size) if !shape.is_fixed() && size.width > 0.0 && size.height > 0.0 => size,
            _ => shape.default_size(),
        };

        let node = Node {
            id: self.next_node_id(),
            shape,
            position,
            size,
            color: DEFAULT_NODE_COLOR.to_string(),
            contents: String::new(),
            selected: true,
        };

        for existing in &mut self.graph.nodes {
            existing.selected = false;
        }
        self.graph.nodes.push(node.clone());
        node
    }

    pub fn update_node_color(&mut self, id: &str, color: &str) -> GraphResult<GraphChange> {
        let node = self.node_mut(id)?;
        if node.color == color {
            return Ok(GraphChange::Unchanged);
        }
        node.color = color.to_string();
        Ok(GraphChange::NodeUpdated(id.to_string()))
    }

    /// Capsule contents are fixed; editing them is a no-op.
    pub fn update_node_contents(&mut self, id: &str, contents: &str) -> GraphResult<GraphChange> {
        let node = self.node_mut(id)?;
        if node.shape.is_fixed() || node.contents == contents {
            return Ok(GraphChange::Unchanged);
        }
        node.contents = contents.to_string();
        Ok(GraphChange::NodeUpdated(id.to_string()))
    }

    pub fn update_node_geometry(&mut self, id: &str, geometry: NodeGeometry) -> GraphResult<GraphChange> {
        let node = self.node_mut(id)?;
        match geometry {
            NodeGeometry::Position(position) => {
                if node.position == position {
                    return Ok(GraphChange::Unchanged);
                }
                node.position = position;
            }
            NodeGeometry::Size(size) => {
                if node.shape.is_fixed() || node.size == size {
                    return Ok(GraphChange::Unchanged);
                }
                if !(size.width > 0.0 && size.height > 0.0) {
                    return Ok(GraphChange::Unchanged);
                }
                node.size = size;
            }
        }
        Ok(GraphChange::NodeUpdated(id.to_string()))
    }

    /// Removes `id` together with the nodes selected by the cascade policy and
    /// every edge touching any of them, in one step.
    pub fn delete_node(&mut self, id: &str) -> GraphResult<GraphChange> {
        if !self.graph.contains_node(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }

        let doomed: HashSet<String> = self.cascade_targets(id).into_iter().collect();

        let mut removed_edges = Vec::new();
        self.graph.edges.retain(|edge| {
            let keep = !doomed.contains(&edge.source) && !doomed.contains(&edge.target);
            if !keep {
                removed_edges.push(edge.id.clone());
            }
            keep
        });

        let mut removed_nodes = Vec::new();
        self.graph.nodes.retain(|node| {
            let keep = !doomed.contains(&node.id);
            if !keep {
                removed_nodes.push(node.id.clone());
            }
            keep
        });

        Ok(GraphChange::NodesRemoved {
            nodes: removed_nodes,
            edges: removed_edges,
        })
    }

    /// `id` followed by every node the cascade policy reaches from it, in
    /// breadth-first order.
    pub fn cascade_targets(&self, id: &str) -> Vec<String> {
        let mut order = vec![id.to_string()];
        if self.cascade == CascadeDirection::None {
            return order;
        }

        let mut visited: HashSet<String> = HashSet::from([id.to_string()]);
        let mut queue: VecDeque<String> = VecDeque::from([id.to_string()]);

        while let Some(current) = queue.pop_front() {
            for edge in &self.graph.edges {
                let next = match self.cascade {
                    CascadeDirection::Ancestors if edge.target == current => &edge.source,
                    CascadeDirection::Descendants if edge.source == current => &edge.target,
                    _ => continue,
                };
                if visited.insert(next.clone()) {
                    order.push(next.clone());
                    queue.push_back(next.clone());
                }
            }
        }

        order
    }

    /// Creates an edge for `connection`. Returns `Ok(None)` when the connection
    /// is rejected (self-loop or already-connected pair).
    pub fn add_edge(&mut self, connection: &Connection) -> GraphResult<Option<Edge>> {
        self.ensure_endpoints(connection)?;
        if !is_valid_connection(&self.graph.edges, connection) {
            return Ok(None);
        }

        let edge = Edge {
            id: self.next_edge_id(connection),
            source: connection.source.clone(),
            source_handle: connection.source_handle,
            target: connection.target.clone(),
            target_handle: connection.target_handle,
            algorithm: RoutingAlgorithm::default(),
            points: Vec::new(),
            line_style: LineStyle::default(),
            label: None,
            label_position: None,
            stroke_width: DEFAULT_STROKE_WIDTH,
            selected: true,
        };
        self.graph.edges.push(edge.clone());
        Ok(Some(edge))
    }

    /// Moves an existing edge onto new endpoints. The edge keeps its id and
    /// control points; a connection the validator rejects leaves it untouched.
    pub fn reconnect_edge(&mut self, id: &str, connection: &Connection) -> GraphResult<GraphChange> {
        self.ensure_endpoints(connection)?;
        let Some(index) = self.graph.edges.iter().position(|edge| edge.id == id) else {
            return Err(GraphError::EdgeNotFound(id.to_string()));
        };

        let others: Vec<Edge> = self
            .graph
            .edges
            .iter()
            .filter(|edge| edge.id != id)
            .cloned()
            .collect();
        if !is_valid_connection(&others, connection) {
            return Ok(GraphChange::Unchanged);
        }

        let edge = &mut self.graph.edges[index];
        if edge.source == connection.source
            && edge.target == connection.target
            && edge.source_handle == connection.source_handle
            && edge.target_handle == connection.target_handle
        {
            return Ok(GraphChange::Unchanged);
        }
        edge.source = connection.source.clone();
        edge.source_handle = connection.source_handle;
        edge.target = connection.target.clone();
        edge.target_handle = connection.target_handle;
        Ok(GraphChange::EdgeUpdated(id.to_string()))
    }

    pub fn delete_edge(&mut self, id: &str) -> GraphResult<GraphChange> {
        let before = self.graph.edges.len();
        self.graph.edges.retain(|edge| edge.id != id);
        if before == self.graph.edges.len() {
            return Err(GraphError::EdgeNotFound(id.to_string()));
        }
        Ok(GraphChange::EdgeRemoved(id.to_string()))
    }

    pub fn set_edge_routing_algorithm(
        &mut self,
        id: &str,
        algorithm: RoutingAlgorithm,
    ) -> GraphResult<GraphChange> {
        let edge = self.edge_mut(id)?;
        if edge.algorithm == algorithm {
            return Ok(GraphChange::Unchanged);
        }
        edge.algorithm = algorithm;
        Ok(GraphChange::EdgeUpdated(id.to_string()))
    }

    pub fn set_edge_line_style(&mut self, id: &str, style: LineStyle) -> GraphResult<GraphChange> {
        let edge = self.edge_mut(id)?;
        if edge.line_style == style {
            return Ok(GraphChange::Unchanged);
        }
        edge.line_style = style;
        Ok(GraphChange::EdgeUpdated(id.to_string()))
    }

    /// An empty label clears it.
    pub fn set_edge_label(&mut self, id: &str, label: &str) -> GraphResult<GraphChange> {
        let edge = self.edge_mut(id)?;
        let label = Some(label.to_string()).filter(|text| !text.is_empty());
        if edge.label == label {
            return Ok(GraphChange::Unchanged);
        }
        edge.label = label;
        Ok(GraphChange::EdgeUpdated(id.to_string()))
    }

    pub fn set_edge_label_position(&mut self, id: &str, position: f32) -> GraphResult<GraphChange> {
        let edge = self.edge_mut(id)?;
        if !position.is_finite() {
            return Ok(GraphChange::Unchanged);
        }
        let position = Some(position.clamp(0.0, 1.0));
        if edge.label_position == position {
            return Ok(GraphChange::Unchanged);
        }
        edge.label_position = position;
        Ok(GraphChange::EdgeUpdated(id.to_string()))
    }

    /// Drags one of the edge's handles; see [`drag_handle`].
    pub fn drag_edge_handle(
        &mut self,
        id: &str,
        handle: &ControlPoint,
        to: Point,
    ) -> GraphResult<GraphChange> {
        let edge = self.edge_mut(id)?;
        if !drag_handle(&mut edge.points, handle, to) {
            return Err(GraphError::ControlPointNotFound {
                edge: id.to_string(),
                point: handle.id.clone(),
            });
        }
        Ok(GraphChange::EdgeUpdated(id.to_string()))
    }

    pub fn remove_edge_point(&mut self, id: &str, point_id: &str) -> GraphResult<GraphChange> {
        let edge = self.edge_mut(id)?;
        if !remove_control_point(&mut edge.points, point_id) {
            return Err(GraphError::ControlPointNotFound {
                edge: id.to_string(),
                point: point_id.to_string(),
            });
        }
        Ok(GraphChange::EdgeUpdated(id.to_string()))
    }

    pub fn set_all_selected(&mut self, selected: bool) -> GraphChange {
        let mut changed = false;
        for node in &mut self.graph.nodes {
            changed |= node.selected != selected;
            node.selected = selected;
        }
        for edge in &mut self.graph.edges {
            changed |= edge.selected != selected;
            edge.selected = selected;
        }
        if changed {
            GraphChange::SelectionChanged
        } else {
            GraphChange::Unchanged
        }
    }

    pub fn set_node_selected(&mut self, id: &str, selected: bool) -> GraphResult<GraphChange> {
        let node = self.node_mut(id)?;
        if node.selected == selected {
            return Ok(GraphChange::Unchanged);
        }
        node.selected = selected;
        Ok(GraphChange::SelectionChanged)
    }

    pub fn set_edge_selected(&mut self, id: &str, selected: bool) -> GraphResult<GraphChange> {
        let edge = self.edge_mut(id)?;
        if edge.selected == selected {
            return Ok(GraphChange::Unchanged);
        }
        edge.selected = selected;
        Ok(GraphChange::SelectionChanged)
    }

    /// Installs `graph` wholesale. The payload is checked first; on any
    /// violation the current graph is kept and a format error is returned.
    pub fn replace_graph(&mut self, graph: Graph) -> GraphResult<GraphChange> {
        validate_graph(&graph)?;

        let highest = graph
            .nodes
            .iter()
            .filter_map(|node| node.id.parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        self.last_node_id = self.last_node_id.max(highest);
        self.graph = graph;
        Ok(GraphChange::Replaced)
    }

    fn node_mut(&mut self, id: &str) -> GraphResult<&mut Node> {
        self.graph
            .node_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    fn edge_mut(&mut self, id: &str) -> GraphResult<&mut Edge> {
        self.graph
            .edge_mut(id)
            .ok_or_else(|| GraphError::EdgeNotFound(id.to_string()))
    }

    fn ensure_endpoints(&self, connection: &Connection) -> GraphResult<()> {
        for id in [&connection.source, &connection.target] {
            if !self.graph.contains_node(id) {
                return Err(GraphError::NodeNotFound(id.clone()));
            }
        }
        Ok(())
    }

    /// Creation time in milliseconds, bumped past every id handed out or
    /// imported so far.
    fn next_node_id(&mut self) -> String {
        let mut candidate = Utc::now().timestamp_millis().max(self.last_node_id + 1);
        while self.graph.contains_node(&candidate.to_string()) {
            candidate += 1;
        }
        self.last_node_id = candidate;
        candidate.to_string()
    }

    fn next_edge_id(&self, connection: &Connection) -> String {
        let base = edge_identifier(
            &connection.source,
            connection.source_handle,
            &connection.target,
            connection.target_handle,
        );
        if self.graph.edge(&base).is_none() {
            return base;
        }
        let mut suffix = 1;
        loop {
            let candidate = format!("{base}-{suffix}");
            if self.graph.edge(&candidate).is_none() {
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// Checks the structural invariants of a whole graph.
pub fn validate_graph(graph: &Graph) -> GraphResult<()> {
    let mut node_ids = HashSet::new();
    for node in &graph.nodes {
        if !node_ids.insert(node.id.as_str()) {
            return Err(GraphError::Format(format!("duplicate node id '{}'", node.id)));
        }
    }

    let mut edge_ids = HashSet::new();
    let mut pairs = HashSet::new();
    for edge in &graph.edges {
        if !edge_ids.insert(edge.id.as_str()) {
            return Err(GraphError::Format(format!("duplicate edge id '{}'", edge.id)));
        }
        for endpoint in [&edge.source, &edge.target] {
            if !node_ids.contains(endpoint.as_str()) {
                return Err(GraphError::Format(format!(
                    "edge '{}' references missing node '{}'",
                    edge.id, endpoint
                )));
            }
        }
        if edge.source == edge.target {
            return Err(GraphError::Format(format!(
                "edge '{}' connects node '{}' to itself",
                edge.id, edge.source
            )));
        }
        let pair = if edge.source < edge.target {
            (edge.source.as_str(), edge.target.as_str())
        } else {
            (edge.target.as_str(), edge.source.as_str())
        };
        if !pairs.insert(pair) {
            return Err(GraphError::Format(format!(
                "edge '{}' duplicates the connection between '{}' and '{}'",
                edge.id, pair.0, pair.1
            )));
        }
        let mut point_ids = HashSet::new();
        for point in &edge.points {
            if !point_ids.insert(point.id.as_str()) {
                return Err(GraphError::Format(format!(
                    "edge '{}' has duplicate control point id '{}'",
                    edge.id, point.id
                )));
            }
        }
    }

    Ok(())
}

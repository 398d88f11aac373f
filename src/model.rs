use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::*;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point {
            x: (self.x + other.x) * 0.5,
            y: (self.y + other.y) * 0.5,
        }
    }

    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    pub fn offset(self, dx: f32, dy: f32) -> Point {
        Point {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

/// Axis-aligned box in diagram coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Bounds {
    pub fn center_x(&self) -> f32 {
        (self.left + self.right) * 0.5
    }

    pub fn center_y(&self) -> f32 {
        (self.top + self.bottom) * 0.5
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    /// Functional goal.
    Circle,
    /// Logical AND operator.
    Capsule,
    /// Task.
    Hexagon,
    /// Soft goal.
    RoundRectangle,
}

impl ShapeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Circle => "circle",
            ShapeKind::Capsule => "capsule",
            ShapeKind::Hexagon => "hexagon",
            ShapeKind::RoundRectangle => "round-rectangle",
        }
    }

    pub fn default_size(self) -> Size {
        match self {
            ShapeKind::Circle => Size {
                width: DEFAULT_NODE_WIDTH,
                height: CIRCLE_NODE_HEIGHT,
            },
            ShapeKind::Capsule => Size {
                width: CAPSULE_WIDTH,
                height: CAPSULE_HEIGHT,
            },
            ShapeKind::Hexagon | ShapeKind::RoundRectangle => Size {
                width: DEFAULT_NODE_WIDTH,
                height: DEFAULT_NODE_HEIGHT,
            },
        }
    }

    /// Capsules carry fixed AND semantics: no label edits, no resizing.
    pub fn is_fixed(self) -> bool {
        matches!(self, ShapeKind::Capsule)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Right => "right",
            Side::Bottom => "bottom",
            Side::Left => "left",
        }
    }

    /// Unit vector pointing away from the node through this side.
    pub fn outward(self) -> Point {
        match self {
            Side::Top => Point::new(0.0, -1.0),
            Side::Right => Point::new(1.0, 0.0),
            Side::Bottom => Point::new(0.0, 1.0),
            Side::Left => Point::new(-1.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoutingAlgorithm {
    #[serde(rename = "linear")]
    Linear,
    #[default]
    #[serde(rename = "bezier-catmull-rom")]
    CatmullRomBezier,
    #[serde(rename = "straight")]
    Straight,
}

impl RoutingAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            RoutingAlgorithm::Linear => "linear",
            RoutingAlgorithm::CatmullRomBezier => "bezier-catmull-rom",
            RoutingAlgorithm::Straight => "straight",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LineStyle {
    #[default]
    Solid,
    Dotted,
    AnimatedDotted,
}

impl LineStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            LineStyle::Solid => "solid",
            LineStyle::Dotted => "dotted",
            LineStyle::AnimatedDotted => "animatedDotted",
        }
    }
}

/// An intermediate point of an edge. Persisted points are `active`; handles
/// synthesized by the geometry engine are not until the user drags them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ControlPoint {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub shape: ShapeKind,
    pub position: Point,
    pub size: Size,
    pub color: String,
    pub contents: String,
    pub selected: bool,
}

impl Node {
    pub fn bounds(&self) -> Bounds {
        bounds_at(self.position, self.size)
    }

    /// Live anchor of an edge attached to `side`: the midpoint of that side.
    pub fn handle_position(&self, side: Side) -> Point {
        let b = self.bounds();
        match side {
            Side::Top => Point::new(b.center_x(), b.top),
            Side::Right => Point::new(b.right, b.center_y()),
            Side::Bottom => Point::new(b.center_x(), b.bottom),
            Side::Left => Point::new(b.left, b.center_y()),
        }
    }
}

pub fn bounds_at(position: Point, size: Size) -> Bounds {
    Bounds {
        left: position.x,
        top: position.y,
        right: position.x + size.width,
        bottom: position.y + size.height,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub source_handle: Side,
    pub target: String,
    pub target_handle: Side,
    pub algorithm: RoutingAlgorithm,
    pub points: Vec<ControlPoint>,
    pub line_style: LineStyle,
    pub label: Option<String>,
    pub label_position: Option<f32>,
    pub stroke_width: f32,
    pub selected: bool,
}

impl Edge {
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    /// True when this edge joins `a` and `b` in either direction.
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

pub fn edge_identifier(source: &str, source_handle: Side, target: &str, target_handle: Side) -> String {
    format!(
        "{source}-{}-{target}-{}",
        source_handle.as_str(),
        target_handle.as_str()
    )
}

/// The single source of truth: ordered nodes and edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|edge| edge.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Edges whose source or target does not name a node in this graph.
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        let ids: HashSet<&str> = self.nodes.iter().map(|node| node.id.as_str()).collect();
        self.edges
            .iter()
            .filter(|edge| !ids.contains(edge.source.as_str()) || !ids.contains(edge.target.as_str()))
            .collect()
    }

    pub fn selected_node_ids(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|node| node.selected)
            .map(|node| node.id.clone())
            .collect()
    }
}

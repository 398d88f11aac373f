//! Interchange format shared with external collaborators (generators, viewers).
//!
//! Import is all-or-nothing: a payload that fails to parse or violates a
//! structural invariant is rejected before anything reaches the graph.

use serde::{Deserialize, Serialize};

use crate::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: String,
    #[serde(rename = "type", default = "node_record_type")]
    pub record_type: String,
    pub position: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<NodeStyle>,
    pub data: NodeData,
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeStyle {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(rename = "type")]
    pub shape: ShapeKind,
    #[serde(default)]
    pub contents: String,
    #[serde(default = "default_color")]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    pub id: String,
    #[serde(rename = "type", default = "edge_record_type")]
    pub record_type: String,
    pub source: String,
    pub source_handle: Side,
    pub target: String,
    pub target_handle: Side,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<EdgeStyle>,
    #[serde(default)]
    pub data: EdgeData,
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    pub stroke_width: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<RoutingAlgorithm>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<ControlPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<LineStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_position: Option<f32>,
}

fn node_record_type() -> String {
    NODE_RECORD_TYPE.to_string()
}

fn edge_record_type() -> String {
    EDGE_RECORD_TYPE.to_string()
}

fn default_color() -> String {
    DEFAULT_NODE_COLOR.to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl GraphDocument {
    pub fn from_graph(graph: &Graph) -> Self {
        Self {
            nodes: graph.nodes.iter().map(NodeRecord::from_node).collect(),
            edges: graph.edges.iter().map(EdgeRecord::from_edge).collect(),
        }
    }

    pub fn into_graph(self) -> GraphResult<Graph> {
        let nodes = self
            .nodes
            .into_iter()
            .map(NodeRecord::into_node)
            .collect::<GraphResult<Vec<_>>>()?;
        let edges = self
            .edges
            .into_iter()
            .map(EdgeRecord::into_edge)
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(Graph { nodes, edges })
    }
}

impl NodeRecord {
    pub fn from_node(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            record_type: node_record_type(),
            position: node.position,
            style: Some(NodeStyle {
                width: node.size.width,
                height: node.size.height,
            }),
            data: NodeData {
                shape: node.shape,
                contents: node.contents.clone(),
                color: node.color.clone(),
            },
            selected: node.selected,
        }
    }

    fn into_node(self) -> GraphResult<Node> {
        if self.record_type != NODE_RECORD_TYPE {
            return Err(GraphError::Format(format!(
                "node '{}' has unsupported type '{}'",
                self.id, self.record_type
            )));
        }

        let shape = self.data.shape;
        let size = match self.style {
            _ if shape.is_fixed() => shape.default_size(),
            Some(style) if style.width > 0.0 && style.height > 0.0 => Size {
                width: style.width,
                height: style.height,
            },
            Some(style) => {
                return Err(GraphError::Format(format!(
                    "node '{}' has invalid size {}x{}",
                    self.id, style.width, style.height
                )));
            }
            None => shape.default_size(),
        };

        Ok(Node {
            id: self.id,
            shape,
            position: self.position,
            size,
            color: self.data.color,
            contents: self.data.contents,
            selected: self.selected,
        })
    }
}

impl EdgeRecord {
    pub fn from_edge(edge: &Edge) -> Self {
        Self {
            id: edge.id.clone(),
            record_type: edge_record_type(),
            source: edge.source.clone(),
            source_handle: edge.source_handle,
            target: edge.target.clone(),
            target_handle: edge.target_handle,
            style: Some(EdgeStyle {
                stroke_width: edge.stroke_width,
            }),
            data: EdgeData {
                algorithm: Some(edge.algorithm),
                points: edge.points.clone(),
                animation: Some(edge.line_style),
                title: edge.label.clone(),
                label_position: edge.label_position,
            },
            selected: edge.selected,
        }
    }

    fn into_edge(self) -> GraphResult<Edge> {
        if self.record_type != EDGE_RECORD_TYPE {
            return Err(GraphError::Format(format!(
                "edge '{}' has unsupported type '{}'",
                self.id, self.record_type
            )));
        }

        let mut points = self.data.points;
        for point in &mut points {
            point.active = true;
        }
        relink_points(&mut points);

        Ok(Edge {
            id: self.id,
            source: self.source,
            source_handle: self.source_handle,
            target: self.target,
            target_handle: self.target_handle,
            algorithm: self.data.algorithm.unwrap_or_default(),
            points,
            line_style: self.data.animation.unwrap_or_default(),
            label: self.data.title.filter(|title| !title.is_empty()),
            label_position: self
                .data
                .label_position
                .filter(|t| t.is_finite())
                .map(|t| t.clamp(0.0, 1.0)),
            stroke_width: self
                .style
                .map(|style| style.stroke_width)
                .unwrap_or(DEFAULT_STROKE_WIDTH),
            selected: self.selected,
        })
    }
}

/// Parses and checks an import payload without touching any live graph.
pub fn parse_graph(json: &str) -> GraphResult<Graph> {
    let document: GraphDocument = serde_json::from_str(json)?;
    let graph = document.into_graph()?;
    validate_graph(&graph)?;
    Ok(graph)
}

pub fn export_graph(graph: &Graph) -> GraphResult<String> {
    Ok(serde_json::to_string_pretty(&GraphDocument::from_graph(graph))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn sample() -> Value {
        json!({
            "nodes": [
                {
                    "id": "1",
                    "type": "shape",
                    "position": { "x": 0.0, "y": 0.0 },
                    "style": { "width": 200.0, "height": 70.0 },
                    "data": { "type": "circle", "contents": "Deliver orders", "color": "#438D57" }
                },
                {
                    "id": "2",
                    "type": "shape",
                    "position": { "x": 80.0, "y": 200.0 },
                    "data": { "type": "capsule", "contents": "" }
                }
            ],
            "edges": [
                {
                    "id": "e1",
                    "type": "editable-edge",
                    "source": "2",
                    "sourceHandle": "top",
                    "target": "1",
                    "targetHandle": "bottom",
                    "style": { "strokeWidth": 2.0 },
                    "data": {
                        "algorithm": "linear",
                        "points": [{ "x": 100.0, "y": 150.0, "id": "p1" }],
                        "animation": "dotted",
                        "title": "AND"
                    }
                }
            ]
        })
    }

    #[test]
    fn parses_the_interchange_format() {
        let graph = parse_graph(&sample().to_string()).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[1].size, ShapeKind::Capsule.default_size());
        assert_eq!(graph.nodes[1].color, DEFAULT_NODE_COLOR);

        let edge = &graph.edges[0];
        assert_eq!(edge.algorithm, RoutingAlgorithm::Linear);
        assert_eq!(edge.line_style, LineStyle::Dotted);
        assert_eq!(edge.label.as_deref(), Some("AND"));
        assert_eq!(edge.points.len(), 1);
        assert!(edge.points[0].active);
    }

    #[test]
    fn edge_data_defaults_when_absent() {
        let mut payload = sample();
        payload["edges"][0].as_object_mut().unwrap().remove("data");
        let graph = parse_graph(&payload.to_string()).unwrap();
        let edge = &graph.edges[0];
        assert_eq!(edge.algorithm, RoutingAlgorithm::CatmullRomBezier);
        assert_eq!(edge.line_style, LineStyle::Solid);
        assert!(edge.points.is_empty());
    }

    #[test]
    fn missing_top_level_keys_are_format_errors() {
        for key in ["nodes", "edges"] {
            let mut payload = sample();
            payload.as_object_mut().unwrap().remove(key);
            assert!(matches!(
                parse_graph(&payload.to_string()),
                Err(GraphError::Format(_))
            ));
        }
        assert!(matches!(parse_graph("not json"), Err(GraphError::Format(_))));
    }

    #[test]
    fn unknown_record_types_are_rejected() {
        let mut payload = sample();
        payload["nodes"][0]["type"] = json!("image");
        assert!(matches!(
            parse_graph(&payload.to_string()),
            Err(GraphError::Format(_))
        ));
    }

    #[test]
    fn dangling_edges_are_rejected() {
        let payload = json!({
            "nodes": [],
            "edges": [{
                "id": "e", "source": "x", "sourceHandle": "bottom",
                "target": "y", "targetHandle": "top"
            }]
        });
        assert!(matches!(
            parse_graph(&payload.to_string()),
            Err(GraphError::Format(_))
        ));
    }

    #[test]
    fn export_uses_the_same_structure() {
        let graph = parse_graph(&sample().to_string()).unwrap();
        let exported: Value = serde_json::from_str(&export_graph(&graph).unwrap()).unwrap();

        assert_eq!(exported["nodes"][0]["type"], "shape");
        assert_eq!(exported["nodes"][0]["style"]["height"], 70.0);
        assert_eq!(exported["nodes"][0]["data"]["type"], "circle");
        assert_eq!(exported["edges"][0]["type"], "editable-edge");
        assert_eq!(exported["edges"][0]["sourceHandle"], "top");
        assert_eq!(exported["edges"][0]["style"]["strokeWidth"], 2.0);
        assert_eq!(exported["edges"][0]["data"]["algorithm"], "linear");
        assert_eq!(exported["edges"][0]["data"]["points"][0]["id"], "p1");

        let reparsed = parse_graph(&exported.to_string()).unwrap();
        assert_eq!(reparsed, graph);
    }
}

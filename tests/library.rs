use anyhow::Result;
use goalgraph::*;

const FIXTURE: &str = include_str!("../fixtures/order-fulfillment.json");

fn control(id: &str, x: f32, y: f32) -> ControlPoint {
    ControlPoint {
        id: id.to_string(),
        x,
        y,
        prev: None,
        active: true,
    }
}

#[test]
fn linear_path_visits_every_point_in_order() {
    let points = vec![control("p", 10.0, 0.0)];
    let input = PathInput::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0), &points);
    let path = GeometryEngine::default().compute_path(&input, RoutingAlgorithm::Linear);

    assert_eq!(path.to_svg(), "M0,0 L10,0 L10,10");
    assert_eq!(
        path.vertices(),
        vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)]
    );
}

#[test]
fn catmull_rom_interpolates_control_points() {
    let points = vec![control("p", 10.0, 0.0)];
    let input = PathInput::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0), &points);
    let path = GeometryEngine::default().compute_path(&input, RoutingAlgorithm::CatmullRomBezier);

    assert!(path.vertices().contains(&Point::new(10.0, 0.0)));
    assert!(path.to_svg().contains('C'));
}

#[test]
fn delete_leaves_no_edge_to_removed_nodes() -> Result<()> {
    let mut store = GraphStore::new(CascadeDirection::Ancestors);
    store.replace_graph(parse_graph(FIXTURE)?)?;

    let GraphChange::NodesRemoved { nodes, .. } = store.delete_node("1718000000001")? else {
        panic!("node should have been removed");
    };

    // The AND capsule's ancestors are the two sub-goals feeding it.
    assert_eq!(nodes.len(), 3);
    let graph = store.graph();
    for edge in &graph.edges {
        for removed in &nodes {
            assert!(!edge.touches(removed));
        }
    }
    assert!(graph.dangling_edges().is_empty());
    assert_eq!(graph.nodes.len(), 1);
    Ok(())
}

#[test]
fn connection_validity_rules() {
    let mut store = GraphStore::default();
    let a = store.add_node(ShapeKind::Circle, Point::default(), None);
    let b = store.add_node(ShapeKind::Circle, Point::new(0.0, 200.0), None);
    let edge = |source: &str, target: &str| Connection {
        source: source.to_string(),
        source_handle: Side::Bottom,
        target: target.to_string(),
        target_handle: Side::Top,
    };

    assert!(!is_valid_connection(&store.graph().edges, &edge(&a.id, &a.id)));
    assert!(is_valid_connection(&store.graph().edges, &edge(&a.id, &b.id)));
    store.add_edge(&edge(&a.id, &b.id)).unwrap();
    assert!(!is_valid_connection(&store.graph().edges, &edge(&a.id, &b.id)));
    assert!(!is_valid_connection(&store.graph().edges, &edge(&b.id, &a.id)));
}

#[test]
fn undo_restores_exact_graph_including_selection() -> Result<()> {
    let mut session = EditorSession::default();
    session.import_json(FIXTURE)?;
    session.select_all();
    let start = session.graph().clone();

    session.update_node_color("1718000000000", "#000000")?;
    session.set_edge_label("pick-to-and", "and")?;
    session.remove_control_point("pick-to-and", "bend")?;
    session.delete_node("1718000000000")?;
    let end = session.graph().clone();

    for _ in 0..4 {
        assert!(session.undo());
    }
    assert_eq!(session.graph(), &start);

    for _ in 0..4 {
        assert!(session.redo());
    }
    assert_eq!(session.graph(), &end);
    Ok(())
}

#[test]
fn activating_a_handle_keeps_other_handle_ids() -> Result<()> {
    let mut session = EditorSession::default();
    session.import_json(FIXTURE)?;
    let edge_id = "delivery-to-and";

    let first = session.edge_geometry(edge_id)?.handles;
    let second = session.edge_geometry(edge_id)?.handles;
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);

    let handle = &first[0];
    session.begin_handle_drag(edge_id, &handle.id)?;
    session.drag_handle(edge_id, &handle.id, Point::new(560.0, 240.0))?;
    session.end_handle_drag();

    let points = &session.graph().edge(edge_id).expect("edge exists").points;
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].id, handle.id);

    let after = session.edge_geometry(edge_id)?.handles;
    let again = session.edge_geometry(edge_id)?.handles;
    assert_eq!(after, again);
    assert!(after.iter().any(|h| h.id == handle.id && h.active));
    Ok(())
}

#[test]
fn dangling_import_is_rejected_and_graph_kept() -> Result<()> {
    let mut session = EditorSession::default();
    session.import_json(FIXTURE)?;
    let before = session.graph().clone();

    let payload = r#"{"nodes":[],"edges":[{"id":"e","source":"x","sourceHandle":"bottom","target":"y","targetHandle":"top"}]}"#;
    let err = session.import_json(payload).unwrap_err();
    assert!(matches!(err, GraphError::Format(_)));
    assert_eq!(session.graph(), &before);
    Ok(())
}

#[test]
fn helper_line_reports_top_alignment_within_tolerance() {
    let size = Size {
        width: 200.0,
        height: 100.0,
    };
    let other = Node {
        id: "other".to_string(),
        shape: ShapeKind::Hexagon,
        position: Point::new(0.0, 50.0),
        size,
        color: DEFAULT_NODE_COLOR.to_string(),
        contents: String::new(),
        selected: false,
    };
    let nodes = vec![other];

    let near = compute_helper_lines("dragged", Point::new(600.0, 53.0), size, &nodes, 5.0);
    assert_eq!(near.horizontal, Some(50.0));

    let far = compute_helper_lines("dragged", Point::new(600.0, 80.0), size, &nodes, 5.0);
    assert_eq!(far.horizontal, None);
}

#[test]
fn exported_document_reimports_identically() -> Result<()> {
    let graph = parse_graph(FIXTURE)?;
    let exported = export_graph(&graph)?;
    assert_eq!(parse_graph(&exported)?, graph);
    Ok(())
}

#[test]
fn nodes_created_with_bad_sizes_still_reimport() -> Result<()> {
    let mut session = EditorSession::default();
    let node = session.add_node(
        ShapeKind::Hexagon,
        Point::new(10.0, 10.0),
        Some(Size { width: 0.0, height: -5.0 }),
    );
    assert_eq!(node.size, ShapeKind::Hexagon.default_size());

    let mut other = EditorSession::default();
    other.import_json(&session.export_json()?)?;
    assert_eq!(other.graph(), session.graph());
    Ok(())
}

#[test]
fn import_rejects_repeated_point_ids_on_one_edge() -> Result<()> {
    let mut document: serde_json::Value = serde_json::from_str(FIXTURE)?;
    document["edges"][1]["data"]["points"] = serde_json::json!([
        { "id": "p", "x": 150.0, "y": 250.0 },
        { "id": "p", "x": 250.0, "y": 200.0 }
    ]);

    let mut session = EditorSession::default();
    session.import_json(FIXTURE)?;
    let before = session.graph().clone();

    let err = session.import_json(&document.to_string());
    assert!(matches!(err, Err(GraphError::Format(_))));
    assert_eq!(session.graph(), &before);
    Ok(())
}

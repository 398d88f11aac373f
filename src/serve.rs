use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower::ServiceExt;
use tower::service_fn;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, info};

use crate::*;

/// Arguments for running the goalgraph editing API
#[derive(Debug, Clone, Parser)]
#[command(name = "goalgraph serve", about = "Serve an in-memory goal model over HTTP.")]
pub struct ServeArgs {
    /// Graph document to load at startup. Starts empty when omitted.
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5151)]
    pub port: u16,

    /// Directory with a built web UI to serve next to the API.
    #[arg(long = "ui")]
    pub ui: Option<PathBuf>,

    /// What a node deletion takes along: ancestors, descendants or none.
    #[arg(long = "cascade", value_parser = parse_cascade)]
    pub cascade: Option<CascadeDirection>,

    /// Maximum number of undo steps kept.
    #[arg(long = "history-limit")]
    pub history_limit: Option<usize>,
}

fn parse_cascade(value: &str) -> Result<CascadeDirection, String> {
    value.parse()
}

struct ServeState {
    session: Mutex<EditorSession>,
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

#[derive(Debug, Deserialize)]
struct CreateNodeRequest {
    shape: ShapeKind,
    position: Point,
    #[serde(default)]
    size: Option<Size>,
}

#[derive(Debug, Deserialize, Default)]
struct NodePatch {
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    contents: Option<String>,
    #[serde(default)]
    position: Option<Point>,
    #[serde(default)]
    size: Option<Size>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct EdgePatch {
    #[serde(default)]
    algorithm: Option<RoutingAlgorithm>,
    #[serde(default)]
    animation: Option<LineStyle>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    label_position: Option<f32>,
    #[serde(default)]
    connection: Option<Connection>,
}

#[derive(Debug, Serialize)]
struct RemovedPayload {
    nodes: Vec<String>,
    edges: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DragStartRequest {
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DragMoveRequest {
    id: String,
    position: Point,
    #[serde(default)]
    snap: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryPayload {
    applied: bool,
    #[serde(flatten)]
    status: HistoryStatus,
}

/// The API router over `session`, without static files or CORS.
pub fn router(session: EditorSession) -> Router {
    let state = Arc::new(ServeState {
        session: Mutex::new(session),
    });

    Router::new()
        .route("/api/graph", get(get_graph).put(put_graph))
        .route("/api/nodes", post(create_node))
        .route("/api/nodes/:id", delete(delete_node).patch(patch_node))
        .route("/api/edges", post(create_edge))
        .route("/api/edges/:id", delete(delete_edge).patch(patch_edge))
        .route("/api/edges/:id/geometry", get(get_edge_geometry))
        .route("/api/edges/:id/handles/:handle", put(move_handle))
        .route("/api/edges/:id/handles/:handle/drag", post(begin_handle_drag))
        .route("/api/edges/:id/points/:point", delete(delete_point))
        .route("/api/drag/start", post(drag_start))
        .route("/api/drag/move", post(drag_move))
        .route("/api/drag/end", post(drag_end))
        .route("/api/drag/cancel", post(drag_cancel))
        .route("/api/selection/all", post(select_all))
        .route("/api/selection", delete(deselect_all))
        .route("/api/history", get(get_history))
        .route("/api/history/undo", post(undo))
        .route("/api/history/redo", post(redo))
        .with_state(state)
}

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = EditorConfig::from_env();
    if let Some(cascade) = args.cascade {
        config.cascade_direction = cascade;
    }
    if args.history_limit.is_some() {
        config.history_limit = args.history_limit.filter(|limit| *limit > 0);
    }

    let mut session = EditorSession::new(config);
    if let Some(input) = &args.input {
        let json = fs::read_to_string(input)
            .with_context(|| format!("failed to read '{}'", input.display()))?;
        session
            .import_json(&json)
            .with_context(|| format!("failed to load graph from '{}'", input.display()))?;
    }
    info!(
        session = %session.id,
        nodes = session.graph().nodes.len(),
        edges = session.graph().edges.len(),
        "session ready"
    );

    let mut app = router(session);

    if let Some(root) = args.ui.clone() {
        let static_dir = ServeDir::new(root.clone())
            .append_index_html_on_directories(true)
            .fallback(ServeFile::new(root.join("index.html")));

        let static_service = service_fn(move |req| {
            let svc = static_dir.clone();
            async move {
                match svc.oneshot(req).await {
                    Ok(response) => Ok(response.map(axum::body::Body::new)),
                    Err(error) => {
                        let message = format!("Static file error: {error}");
                        Ok((StatusCode::INTERNAL_SERVER_ERROR, message).into_response())
                    }
                }
            }
        });

        app = app.fallback_service(static_service);
    }

    let app = app.layer(CorsLayer::permissive());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP server to {addr}"))?;

    println!("goalgraph server listening on http://{addr}");
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

fn graph_error(err: GraphError) -> (StatusCode, String) {
    let status = match &err {
        GraphError::Format(_) => StatusCode::BAD_REQUEST,
        err if err.is_not_found() => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn rejected_connection(connection: &Connection) -> (StatusCode, String) {
    (
        StatusCode::CONFLICT,
        format!(
            "cannot connect '{}' to '{}': self-loop or nodes already connected",
            connection.source, connection.target
        ),
    )
}

async fn get_graph(State(state): State<Arc<ServeState>>) -> Json<GraphDocument> {
    let session = state.session.lock().await;
    Json(GraphDocument::from_graph(session.graph()))
}

async fn put_graph(
    State(state): State<Arc<ServeState>>,
    body: String,
) -> ApiResult<Json<GraphDocument>> {
    let mut session = state.session.lock().await;
    session.import_json(&body).map_err(graph_error)?;
    Ok(Json(GraphDocument::from_graph(session.graph())))
}

async fn create_node(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<CreateNodeRequest>,
) -> (StatusCode, Json<NodeRecord>) {
    let mut session = state.session.lock().await;
    let node = session.add_node(request.shape, request.position, request.size);
    (StatusCode::CREATED, Json(NodeRecord::from_node(&node)))
}

async fn patch_node(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<String>,
    Json(patch): Json<NodePatch>,
) -> ApiResult<Json<NodeRecord>> {
    let mut session = state.session.lock().await;
    if let Some(color) = &patch.color {
        session.update_node_color(&id, color).map_err(graph_error)?;
    }
    if let Some(contents) = &patch.contents {
        session.update_node_contents(&id, contents).map_err(graph_error)?;
    }
    if let Some(position) = patch.position {
        session
            .update_node_geometry(&id, NodeGeometry::Position(position))
            .map_err(graph_error)?;
    }
    if let Some(size) = patch.size {
        session
            .update_node_geometry(&id, NodeGeometry::Size(size))
            .map_err(graph_error)?;
    }

    let node = session
        .graph()
        .node(&id)
        .ok_or_else(|| graph_error(GraphError::NodeNotFound(id.clone())))?;
    Ok(Json(NodeRecord::from_node(node)))
}

async fn delete_node(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<RemovedPayload>> {
    let mut session = state.session.lock().await;
    match session.delete_node(&id).map_err(graph_error)? {
        GraphChange::NodesRemoved { nodes, edges } => Ok(Json(RemovedPayload { nodes, edges })),
        _ => Ok(Json(RemovedPayload {
            nodes: Vec::new(),
            edges: Vec::new(),
        })),
    }
}

async fn create_edge(
    State(state): State<Arc<ServeState>>,
    Json(connection): Json<Connection>,
) -> ApiResult<(StatusCode, Json<EdgeRecord>)> {
    let mut session = state.session.lock().await;
    match session.add_edge(&connection).map_err(graph_error)? {
        Some(edge) => Ok((StatusCode::CREATED, Json(EdgeRecord::from_edge(&edge)))),
        None => Err(rejected_connection(&connection)),
    }
}

async fn patch_edge(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<String>,
    Json(patch): Json<EdgePatch>,
) -> ApiResult<Json<EdgeRecord>> {
    let mut session = state.session.lock().await;
    if let Some(connection) = &patch.connection {
        let change = session.reconnect_edge(&id, connection).map_err(graph_error)?;
        // Unchanged means either rejected or already joining these nodes.
        let already_joined = session
            .graph()
            .edge(&id)
            .is_some_and(|edge| edge.source == connection.source && edge.target == connection.target);
        if !change.is_change() && !already_joined {
            return Err(rejected_connection(connection));
        }
    }
    if let Some(algorithm) = patch.algorithm {
        session
            .set_edge_routing_algorithm(&id, algorithm)
            .map_err(graph_error)?;
    }
    if let Some(style) = patch.animation {
        session.set_edge_line_style(&id, style).map_err(graph_error)?;
    }
    if let Some(title) = &patch.title {
        session.set_edge_label(&id, title).map_err(graph_error)?;
    }
    if let Some(position) = patch.label_position {
        session
            .set_edge_label_position(&id, position)
            .map_err(graph_error)?;
    }

    let edge = session
        .graph()
        .edge(&id)
        .ok_or_else(|| graph_error(GraphError::EdgeNotFound(id.clone())))?;
    Ok(Json(EdgeRecord::from_edge(edge)))
}

async fn delete_edge(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<StatusCode> {
    let mut session = state.session.lock().await;
    session.delete_edge(&id).map_err(graph_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_edge_geometry(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<EdgeGeometry>> {
    let mut session = state.session.lock().await;
    session.edge_geometry(&id).map(Json).map_err(graph_error)
}

async fn begin_handle_drag(
    State(state): State<Arc<ServeState>>,
    AxumPath((id, handle)): AxumPath<(String, String)>,
) -> ApiResult<Json<ControlPoint>> {
    let mut session = state.session.lock().await;
    session
        .begin_handle_drag(&id, &handle)
        .map(Json)
        .map_err(graph_error)
}

async fn move_handle(
    State(state): State<Arc<ServeState>>,
    AxumPath((id, handle)): AxumPath<(String, String)>,
    Json(to): Json<Point>,
) -> ApiResult<Json<EdgeGeometry>> {
    let mut session = state.session.lock().await;
    session.drag_handle(&id, &handle, to).map_err(graph_error)?;
    session.edge_geometry(&id).map(Json).map_err(graph_error)
}

async fn delete_point(
    State(state): State<Arc<ServeState>>,
    AxumPath((id, point)): AxumPath<(String, String)>,
) -> ApiResult<StatusCode> {
    let mut session = state.session.lock().await;
    session
        .remove_control_point(&id, &point)
        .map_err(graph_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn drag_start(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<DragStartRequest>,
) -> ApiResult<StatusCode> {
    let mut session = state.session.lock().await;
    session.begin_drag(&request.ids).map_err(graph_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn drag_move(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<DragMoveRequest>,
) -> ApiResult<Json<HelperLines>> {
    let mut session = state.session.lock().await;
    session
        .drag_to(&request.id, request.position, request.snap)
        .map(Json)
        .map_err(graph_error)
}

async fn drag_end(State(state): State<Arc<ServeState>>) -> StatusCode {
    let mut session = state.session.lock().await;
    session.end_drag();
    session.end_handle_drag();
    StatusCode::NO_CONTENT
}

async fn drag_cancel(State(state): State<Arc<ServeState>>) -> StatusCode {
    let mut session = state.session.lock().await;
    if session.cancel_drag() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::CONFLICT
    }
}

async fn select_all(State(state): State<Arc<ServeState>>) -> StatusCode {
    state.session.lock().await.select_all();
    StatusCode::NO_CONTENT
}

async fn deselect_all(State(state): State<Arc<ServeState>>) -> StatusCode {
    state.session.lock().await.deselect_all();
    StatusCode::NO_CONTENT
}

async fn get_history(State(state): State<Arc<ServeState>>) -> Json<HistoryStatus> {
    Json(state.session.lock().await.history_status())
}

async fn undo(State(state): State<Arc<ServeState>>) -> Json<HistoryPayload> {
    let mut session = state.session.lock().await;
    let applied = session.undo();
    debug!(applied, "undo requested");
    Json(HistoryPayload {
        applied,
        status: session.history_status(),
    })
}

async fn redo(State(state): State<Arc<ServeState>>) -> Json<HistoryPayload> {
    let mut session = state.session.lock().await;
    let applied = session.redo();
    debug!(applied, "redo requested");
    Json(HistoryPayload {
        applied,
        status: session.history_status(),
    })
}

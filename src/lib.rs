pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod helper_lines;
pub mod history;
pub mod model;
pub mod selection;
#[cfg(feature = "server")]
pub mod serve;
pub mod session;
pub mod store;
pub mod validate;

pub use config::*;
pub use document::*;
pub use error::*;
pub use geometry::*;
pub use helper_lines::*;
pub use history::*;
pub use model::*;
pub use selection::*;
#[cfg(feature = "server")]
pub use serve::*;
pub use session::*;
pub use store::*;
pub use validate::*;

pub const DEFAULT_NODE_COLOR: &str = "#438D57";
pub const DEFAULT_NODE_WIDTH: f32 = 200.0;
pub const DEFAULT_NODE_HEIGHT: f32 = 100.0;
pub const CIRCLE_NODE_HEIGHT: f32 = 70.0;
pub const CAPSULE_WIDTH: f32 = 40.0;
pub const CAPSULE_HEIGHT: f32 = 20.0;
pub const DEFAULT_STROKE_WIDTH: f32 = 2.0;
pub const DEFAULT_LABEL_POSITION: f32 = 0.5;
pub const DEFAULT_HELPER_LINE_TOLERANCE: f32 = 5.0;
pub const DEFAULT_MIN_HANDLE_SPACING: f32 = 20.0;
pub const CURVE_FLATTEN_STEPS: usize = 16;
pub const NODE_RECORD_TYPE: &str = "shape";
pub const EDGE_RECORD_TYPE: &str = "editable-edge";

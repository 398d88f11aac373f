use serde::Serialize;

use crate::*;

/// Alignment guides for a node being dragged. Never stored in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct HelperLines {
    /// y coordinate of a horizontal guide.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<f32>,
    /// x coordinate of a vertical guide.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical: Option<f32>,
}

impl HelperLines {
    pub fn is_empty(&self) -> bool {
        self.horizontal.is_none() && self.vertical.is_none()
    }

    /// Shifts `position` so that whichever edge or center of the box lies
    /// closest to each guide lands exactly on it.
    pub fn snap(&self, position: Point, size: Size) -> Point {
        let mut snapped = position;
        if let Some(y) = self.horizontal {
            let offsets = [0.0, size.height * 0.5, size.height];
            snapped.y = y - closest_offset(position.y, &offsets, y);
        }
        if let Some(x) = self.vertical {
            let offsets = [0.0, size.width * 0.5, size.width];
            snapped.x = x - closest_offset(position.x, &offsets, x);
        }
        snapped
    }
}

fn closest_offset(origin: f32, offsets: &[f32; 3], guide: f32) -> f32 {
    let mut best = offsets[0];
    for &offset in &offsets[1..] {
        if (origin + offset - guide).abs() < (origin + best - guide).abs() {
            best = offset;
        }
    }
    best
}

/// Compares the dragged box's top/center/bottom against every other node's
/// top/center/bottom, and likewise left/center/right. The first node (in
/// graph order) within `tolerance` wins on each axis.
pub fn compute_helper_lines(
    dragged_id: &str,
    position: Point,
    size: Size,
    nodes: &[Node],
    tolerance: f32,
) -> HelperLines {
    let dragged = bounds_at(position, size);
    let dragged_rows = [dragged.top, dragged.center_y(), dragged.bottom];
    let dragged_columns = [dragged.left, dragged.center_x(), dragged.right];

    let mut lines = HelperLines::default();

    for node in nodes.iter().filter(|node| node.id != dragged_id) {
        let other = node.bounds();

        if lines.horizontal.is_none() {
            let rows = [other.top, other.center_y(), other.bottom];
            lines.horizontal = first_within(&dragged_rows, &rows, tolerance);
        }
        if lines.vertical.is_none() {
            let columns = [other.left, other.center_x(), other.right];
            lines.vertical = first_within(&dragged_columns, &columns, tolerance);
        }

        if lines.horizontal.is_some() && lines.vertical.is_some() {
            break;
        }
    }

    lines
}

fn first_within(dragged: &[f32; 3], candidates: &[f32; 3], tolerance: f32) -> Option<f32> {
    dragged
        .iter()
        .zip(candidates)
        .find(|(value, candidate)| (*value - *candidate).abs() <= tolerance)
        .map(|(_, candidate)| *candidate)
}

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as FmtWrite;
use uuid::Uuid;

use crate::*;

/// Everything needed to route one edge: the live anchors derived from the
/// connected nodes, the sides they sit on, and the persisted control points.
#[derive(Debug, Clone)]
pub struct PathInput<'a> {
    pub source: Point,
    pub source_side: Option<Side>,
    pub target: Point,
    pub target_side: Option<Side>,
    pub points: &'a [ControlPoint],
}

impl<'a> PathInput<'a> {
    pub fn new(source: Point, target: Point, points: &'a [ControlPoint]) -> Self {
        Self {
            source,
            source_side: None,
            target,
            target_side: None,
            points,
        }
    }

    pub fn with_sides(mut self, source_side: Side, target_side: Side) -> Self {
        self.source_side = Some(source_side);
        self.target_side = Some(target_side);
        self
    }

    /// Source anchor, control points, target anchor.
    pub fn anchors(&self) -> Vec<Point> {
        let mut anchors = Vec::with_capacity(self.points.len() + 2);
        anchors.push(self.source);
        anchors.extend(self.points.iter().map(ControlPoint::position));
        anchors.push(self.target);
        anchors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PathCommand {
    MoveTo { to: Point },
    LineTo { to: Point },
    CubicTo { c1: Point, c2: Point, to: Point },
}

impl PathCommand {
    pub fn end(&self) -> Point {
        match self {
            PathCommand::MoveTo { to } | PathCommand::LineTo { to } => *to,
            PathCommand::CubicTo { to, .. } => *to,
        }
    }
}

/// A drawable path: a move followed by line and cubic segments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathDescriptor {
    pub commands: Vec<PathCommand>,
}

impl PathDescriptor {
    /// SVG path data (`d` attribute).
    pub fn to_svg(&self) -> String {
        let mut d = String::new();
        for command in &self.commands {
            if !d.is_empty() {
                d.push(' ');
            }
            // Writing into a String cannot fail.
            let _ = match command {
                PathCommand::MoveTo { to } => write!(d, "M{},{}", to.x, to.y),
                PathCommand::LineTo { to } => write!(d, "L{},{}", to.x, to.y),
                PathCommand::CubicTo { c1, c2, to } => write!(
                    d,
                    "C{},{} {},{} {},{}",
                    c1.x, c1.y, c2.x, c2.y, to.x, to.y
                ),
            };
        }
        d
    }

    /// The points the path actually passes through, in order.
    pub fn vertices(&self) -> Vec<Point> {
        self.commands.iter().map(PathCommand::end).collect()
    }

    /// Polyline approximation with `steps` samples per cubic segment.
    pub fn flatten(&self, steps: usize) -> Vec<Point> {
        let steps = steps.max(1);
        let mut polyline = Vec::new();
        let mut cursor = Point::default();

        for command in &self.commands {
            match *command {
                PathCommand::MoveTo { to } | PathCommand::LineTo { to } => {
                    polyline.push(to);
                    cursor = to;
                }
                PathCommand::CubicTo { c1, c2, to } => {
                    for step in 1..=steps {
                        let t = step as f32 / steps as f32;
                        polyline.push(cubic_point(cursor, c1, c2, to, t));
                    }
                    cursor = to;
                }
            }
        }

        polyline
    }

    pub fn length(&self) -> f32 {
        self.flatten(CURVE_FLATTEN_STEPS)
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum()
    }

    /// Point at fraction `t` (clamped to `[0, 1]`) of the drawn length.
    pub fn point_at(&self, t: f32) -> Option<Point> {
        let polyline = self.flatten(CURVE_FLATTEN_STEPS);
        let first = *polyline.first()?;

        let total: f32 = polyline
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum();
        if total <= f32::EPSILON {
            return Some(first);
        }

        let mut remaining = total * t.clamp(0.0, 1.0);
        for pair in polyline.windows(2) {
            let segment = pair[0].distance(pair[1]);
            if remaining <= segment {
                if segment <= f32::EPSILON {
                    return Some(pair[1]);
                }
                return Some(pair[0].lerp(pair[1], remaining / segment));
            }
            remaining -= segment;
        }

        polyline.last().copied()
    }
}

/// Turns an edge's anchors and control points into a path and into the set of
/// draggable handles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryEngine {
    /// Consecutive path points closer than this get no insertion handle.
    pub min_handle_spacing: f32,
}

impl Default for GeometryEngine {
    fn default() -> Self {
        Self {
            min_handle_spacing: DEFAULT_MIN_HANDLE_SPACING,
        }
    }
}

impl GeometryEngine {
    pub fn new(min_handle_spacing: f32) -> Self {
        Self { min_handle_spacing }
    }

    pub fn compute_path(&self, input: &PathInput<'_>, algorithm: RoutingAlgorithm) -> PathDescriptor {
        let anchors = input.anchors();
        let mut commands = vec![PathCommand::MoveTo { to: input.source }];

        match algorithm {
            RoutingAlgorithm::Linear => {
                commands.extend(anchors[1..].iter().map(|&to| PathCommand::LineTo { to }));
            }
            RoutingAlgorithm::Straight => {
                commands.push(PathCommand::LineTo { to: input.target });
            }
            RoutingAlgorithm::CatmullRomBezier => {
                let start = input.source_side.map(Side::outward);
                let end = input.target_side.map(Side::outward);
                commands.extend(
                    catmull_rom_segments(&anchors, start, end)
                        .into_iter()
                        .map(|(c1, c2, to)| PathCommand::CubicTo { c1, c2, to }),
                );
            }
        }

        PathDescriptor { commands }
    }

    /// Handles in path order. Persisted points come back unchanged; synthesized
    /// insertion handles get their identifiers from `slots`.
    pub fn compute_handles(
        &self,
        input: &PathInput<'_>,
        algorithm: RoutingAlgorithm,
        slots: &mut HandleSlots,
    ) -> Vec<ControlPoint> {
        slots.assign(self.raw_handles(input, algorithm))
    }

    fn raw_handles(&self, input: &PathInput<'_>, algorithm: RoutingAlgorithm) -> Vec<ControlPoint> {
        match algorithm {
            RoutingAlgorithm::Linear | RoutingAlgorithm::Straight => input.points.to_vec(),
            RoutingAlgorithm::CatmullRomBezier => {
                let anchors = input.anchors();
                let start = input.source_side.map(Side::outward);
                let end = input.target_side.map(Side::outward);
                let segments = catmull_rom_segments(&anchors, start, end);

                let mut handles = Vec::with_capacity(input.points.len() * 2 + 1);
                for (idx, (c1, c2, to)) in segments.into_iter().enumerate() {
                    let from = anchors[idx];
                    let preceding = idx.checked_sub(1).map(|i| &input.points[i]);
                    if let Some(point) = preceding {
                        handles.push(point.clone());
                    }

                    if from.distance(to) > self.min_handle_spacing {
                        let middle = cubic_point(from, c1, c2, to, 0.5);
                        handles.push(ControlPoint {
                            id: String::new(),
                            x: middle.x,
                            y: middle.y,
                            prev: preceding.map(|point| point.id.clone()),
                            active: false,
                        });
                    }
                }
                handles
            }
        }
    }
}

/// Cubic segments `(c1, c2, end)` of a uniform Catmull-Rom spline through
/// `points`. `start_dir`/`end_dir` are the outward normals of the anchor sides;
/// when present the curve leaves and enters perpendicular to those sides.
pub fn catmull_rom_segments(
    points: &[Point],
    start_dir: Option<Point>,
    end_dir: Option<Point>,
) -> Vec<(Point, Point, Point)> {
    let n = points.len();
    if n < 2 {
        return Vec::new();
    }

    let tangent = |i: usize| -> Point {
        if i == 0 {
            let span = points[0].distance(points[1]);
            match start_dir {
                Some(dir) => Point::new(dir.x * span, dir.y * span),
                None => Point::new(points[1].x - points[0].x, points[1].y - points[0].y),
            }
        } else if i == n - 1 {
            let span = points[n - 2].distance(points[n - 1]);
            match end_dir {
                // Arriving means travelling against the target side's outward normal.
                Some(dir) => Point::new(-dir.x * span, -dir.y * span),
                None => Point::new(
                    points[n - 1].x - points[n - 2].x,
                    points[n - 1].y - points[n - 2].y,
                ),
            }
        } else {
            Point::new(
                (points[i + 1].x - points[i - 1].x) * 0.5,
                (points[i + 1].y - points[i - 1].y) * 0.5,
            )
        }
    };

    (0..n - 1)
        .map(|i| {
            let t1 = tangent(i);
            let t2 = tangent(i + 1);
            let c1 = points[i].offset(t1.x / 3.0, t1.y / 3.0);
            let c2 = points[i + 1].offset(-t2.x / 3.0, -t2.y / 3.0);
            (c1, c2, points[i + 1])
        })
        .collect()
}

pub fn cubic_point(p0: Point, c1: Point, c2: Point, p3: Point, t: f32) -> Point {
    let u = 1.0 - t;
    let a = u * u * u;
    let b = 3.0 * u * u * t;
    let c = 3.0 * u * t * t;
    let d = t * t * t;
    Point {
        x: a * p0.x + b * c1.x + c * c2.x + d * p3.x,
        y: a * p0.y + b * c1.y + c * c2.y + d * p3.y,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    id: String,
    prev: Option<String>,
    active: bool,
}

/// Identifiers of the handles produced by the previous computation for one
/// edge. Synthesized handles keep their identifier positionally while the
/// handle count is unchanged; when it changes, identifiers are carried over by
/// preceding point and only genuinely new handles are minted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandleSlots {
    slots: Vec<Slot>,
}

impl HandleSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.slots.iter().map(|slot| slot.id.as_str()).collect()
    }

    pub fn assign(&mut self, handles: Vec<ControlPoint>) -> Vec<ControlPoint> {
        let active_ids: HashSet<String> = handles
            .iter()
            .filter(|handle| handle.active)
            .map(|handle| handle.id.clone())
            .collect();

        let assigned: Vec<ControlPoint> = if self.slots.len() == handles.len() {
            handles
                .into_iter()
                .zip(self.slots.iter())
                .map(|(mut handle, slot)| {
                    if !handle.active {
                        handle.id = if !slot.active && !active_ids.contains(&slot.id) {
                            slot.id.clone()
                        } else {
                            mint_handle_id()
                        };
                    }
                    handle
                })
                .collect()
        } else {
            let mut by_prev: HashMap<Option<String>, String> = self
                .slots
                .iter()
                .filter(|slot| !slot.active)
                .map(|slot| (slot.prev.clone(), slot.id.clone()))
                .collect();

            handles
                .into_iter()
                .map(|mut handle| {
                    if !handle.active {
                        handle.id = by_prev
                            .remove(&handle.prev)
                            .filter(|id| !active_ids.contains(id))
                            .unwrap_or_else(mint_handle_id);
                    }
                    handle
                })
                .collect()
        };

        self.slots = assigned
            .iter()
            .map(|handle| Slot {
                id: handle.id.clone(),
                prev: handle.prev.clone(),
                active: handle.active,
            })
            .collect();

        assigned
    }
}

fn mint_handle_id() -> String {
    Uuid::new_v4().to_string()
}

/// Applies a handle drag to the persisted points. An inactive handle is first
/// inserted right after the point it follows (or first, when it follows the
/// source anchor). Returns `false` when the handle cannot be placed.
pub fn drag_handle(points: &mut Vec<ControlPoint>, handle: &ControlPoint, to: Point) -> bool {
    if handle.active {
        let Some(point) = points.iter_mut().find(|point| point.id == handle.id) else {
            return false;
        };
        point.x = to.x;
        point.y = to.y;
        return true;
    }

    if points.iter().any(|point| point.id == handle.id) {
        // Already activated by an earlier frame of the same drag.
        return drag_handle(
            points,
            &ControlPoint {
                active: true,
                ..handle.clone()
            },
            to,
        );
    }

    let index = match &handle.prev {
        None => 0,
        Some(prev) => match points.iter().position(|point| &point.id == prev) {
            Some(idx) => idx + 1,
            None => return false,
        },
    };

    points.insert(
        index,
        ControlPoint {
            id: handle.id.clone(),
            x: to.x,
            y: to.y,
            prev: handle.prev.clone(),
            active: true,
        },
    );
    relink_points(points);
    true
}

pub fn remove_control_point(points: &mut Vec<ControlPoint>, point_id: &str) -> bool {
    let before = points.len();
    points.retain(|point| point.id != point_id);
    if points.len() == before {
        return false;
    }
    relink_points(points);
    true
}

/// Rewrites every `prev` reference to name the point before it.
pub fn relink_points(points: &mut [ControlPoint]) {
    let mut prev: Option<String> = None;
    for point in points.iter_mut() {
        point.prev = prev.clone();
        prev = Some(point.id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(id: &str, x: f32, y: f32) -> ControlPoint {
        ControlPoint {
            id: id.to_string(),
            x,
            y,
            prev: None,
            active: true,
        }
    }

    fn close(a: Point, b: Point) -> bool {
        a.distance(b) < 1e-3
    }

    #[test]
    fn linear_path_visits_every_point_without_smoothing() {
        let points = vec![active("p", 10.0, 0.0)];
        let input = PathInput::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0), &points);
        let path = GeometryEngine::default().compute_path(&input, RoutingAlgorithm::Linear);

        assert_eq!(path.to_svg(), "M0,0 L10,0 L10,10");
        assert!(
            path.commands
                .iter()
                .all(|cmd| !matches!(cmd, PathCommand::CubicTo { .. }))
        );
    }

    #[test]
    fn catmull_rom_interpolates_control_points() {
        let points = vec![active("p", 10.0, 0.0)];
        let input = PathInput::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0), &points);
        let path = GeometryEngine::default().compute_path(&input, RoutingAlgorithm::CatmullRomBezier);

        let vertices = path.vertices();
        assert_eq!(vertices.len(), 3);
        assert!(close(vertices[1], Point::new(10.0, 0.0)));

        let PathCommand::CubicTo { c1, c2, to } = path.commands[1] else {
            panic!("expected a cubic segment");
        };
        assert!(close(cubic_point(Point::new(0.0, 0.0), c1, c2, to, 1.0), Point::new(10.0, 0.0)));
    }

    #[test]
    fn catmull_rom_tangent_is_continuous_at_interior_points() {
        let points = vec![active("p", 50.0, 20.0)];
        let input = PathInput::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0), &points);
        let path = GeometryEngine::default().compute_path(&input, RoutingAlgorithm::CatmullRomBezier);

        let (PathCommand::CubicTo { c2: incoming, .. }, PathCommand::CubicTo { c1: outgoing, .. }) =
            (path.commands[1], path.commands[2])
        else {
            panic!("expected cubic segments");
        };
        let joint = Point::new(50.0, 20.0);
        let before = Point::new(joint.x - incoming.x, joint.y - incoming.y);
        let after = Point::new(outgoing.x - joint.x, outgoing.y - joint.y);
        assert!((before.x - after.x).abs() < 1e-3 && (before.y - after.y).abs() < 1e-3);
    }

    #[test]
    fn side_hints_force_perpendicular_departure_and_arrival() {
        let input = PathInput::new(Point::new(0.0, 0.0), Point::new(100.0, 100.0), &[])
            .with_sides(Side::Bottom, Side::Top);
        let path = GeometryEngine::default().compute_path(&input, RoutingAlgorithm::CatmullRomBezier);

        let PathCommand::CubicTo { c1, c2, .. } = path.commands[1] else {
            panic!("expected a cubic segment");
        };
        assert_eq!(c1.x, 0.0);
        assert!(c1.y > 0.0);
        assert_eq!(c2.x, 100.0);
        assert!(c2.y < 100.0);
    }

    #[test]
    fn straight_draws_direct_line_but_keeps_points_as_handles() {
        let points = vec![active("p", 10.0, 0.0), active("q", 20.0, 5.0)];
        let input = PathInput::new(Point::new(0.0, 0.0), Point::new(30.0, 30.0), &points);
        let engine = GeometryEngine::default();

        let path = engine.compute_path(&input, RoutingAlgorithm::Straight);
        assert_eq!(path.to_svg(), "M0,0 L30,30");

        let handles = engine.compute_handles(&input, RoutingAlgorithm::Straight, &mut HandleSlots::new());
        assert_eq!(handles, points);
    }

    #[test]
    fn linear_handles_are_the_points_themselves() {
        let points = vec![active("p", 100.0, 0.0)];
        let input = PathInput::new(Point::new(0.0, 0.0), Point::new(100.0, 100.0), &points);
        let handles =
            GeometryEngine::default().compute_handles(&input, RoutingAlgorithm::Linear, &mut HandleSlots::new());
        assert_eq!(handles, points);
    }

    #[test]
    fn catmull_rom_adds_midpoint_handles_between_distant_points() {
        let points = vec![active("p", 100.0, 0.0)];
        let input = PathInput::new(Point::new(0.0, 0.0), Point::new(100.0, 100.0), &points);
        let handles = GeometryEngine::default().compute_handles(
            &input,
            RoutingAlgorithm::CatmullRomBezier,
            &mut HandleSlots::new(),
        );

        assert_eq!(handles.len(), 3);
        assert!(!handles[0].active && handles[0].prev.is_none());
        assert!(handles[1].active && handles[1].id == "p");
        assert!(!handles[2].active && handles[2].prev.as_deref() == Some("p"));
        assert!(!handles[0].id.is_empty() && handles[0].id != handles[2].id);
    }

    #[test]
    fn close_points_get_no_insertion_handle() {
        let input = PathInput::new(Point::new(0.0, 0.0), Point::new(5.0, 5.0), &[]);
        let handles = GeometryEngine::new(20.0).compute_handles(
            &input,
            RoutingAlgorithm::CatmullRomBezier,
            &mut HandleSlots::new(),
        );
        assert!(handles.is_empty());
    }

    #[test]
    fn synthesized_ids_survive_recomputation_with_same_count() {
        let engine = GeometryEngine::default();
        let mut slots = HandleSlots::new();
        let first = engine.compute_handles(
            &PathInput::new(Point::new(0.0, 0.0), Point::new(200.0, 0.0), &[]),
            RoutingAlgorithm::CatmullRomBezier,
            &mut slots,
        );
        // Source node moved: the midpoint moves, its identity does not.
        let second = engine.compute_handles(
            &PathInput::new(Point::new(40.0, 10.0), Point::new(200.0, 0.0), &[]),
            RoutingAlgorithm::CatmullRomBezier,
            &mut slots,
        );

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, second[0].id);
        assert_ne!(first[0].x, second[0].x);
    }

    #[test]
    fn activating_a_handle_inserts_one_point_and_keeps_other_ids() {
        let engine = GeometryEngine::default();
        let mut slots = HandleSlots::new();
        let mut points = vec![active("a", 100.0, 0.0), active("b", 200.0, 0.0)];
        relink_points(&mut points);

        let source = Point::new(0.0, 0.0);
        let target = Point::new(300.0, 0.0);
        let before = engine.compute_handles(
            &PathInput::new(source, target, &points),
            RoutingAlgorithm::CatmullRomBezier,
            &mut slots,
        );
        // [mid(src,a), a, mid(a,b), b, mid(b,tgt)]
        assert_eq!(before.len(), 5);
        let grabbed = before[2].clone();
        assert!(!grabbed.active);

        assert!(drag_handle(&mut points, &grabbed, Point::new(150.0, 40.0)));
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].id, grabbed.id);
        assert_eq!(points[1].prev.as_deref(), Some("a"));
        assert_eq!(points[2].prev.as_deref(), Some(grabbed.id.as_str()));

        let after = engine.compute_handles(
            &PathInput::new(source, target, &points),
            RoutingAlgorithm::CatmullRomBezier,
            &mut slots,
        );
        let after_ids: Vec<&str> = after.iter().map(|h| h.id.as_str()).collect();
        for (idx, handle) in before.iter().enumerate() {
            if idx != 2 {
                assert!(after_ids.contains(&handle.id.as_str()), "lost id of handle {idx}");
            }
        }
        assert!(after_ids.contains(&grabbed.id.as_str()));
        let unique: HashSet<&str> = after_ids.iter().copied().collect();
        assert_eq!(unique.len(), after_ids.len());
    }

    #[test]
    fn dragging_an_active_handle_only_moves_it() {
        let mut points = vec![active("a", 1.0, 1.0)];
        let handle = points[0].clone();
        assert!(drag_handle(&mut points, &handle, Point::new(7.0, 8.0)));
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].position(), Point::new(7.0, 8.0));
    }

    #[test]
    fn dropping_onto_another_handle_does_not_merge() {
        let mut points = vec![active("a", 1.0, 1.0), active("b", 5.0, 5.0)];
        let handle = points[1].clone();
        assert!(drag_handle(&mut points, &handle, Point::new(1.0, 1.0)));
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn removing_a_point_relinks_the_rest() {
        let mut points = vec![active("a", 0.0, 0.0), active("b", 1.0, 0.0), active("c", 2.0, 0.0)];
        relink_points(&mut points);
        assert!(remove_control_point(&mut points, "b"));
        assert_eq!(points[1].prev.as_deref(), Some("a"));
        assert!(!remove_control_point(&mut points, "missing"));
    }

    #[test]
    fn point_at_walks_the_drawn_path() {
        let input = PathInput::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0), &[]);
        let path = GeometryEngine::default().compute_path(&input, RoutingAlgorithm::Straight);
        let middle = path.point_at(0.5).expect("path has points");
        assert!(close(middle, Point::new(50.0, 0.0)));
        assert!((path.length() - 100.0).abs() < 1e-3);
    }
}

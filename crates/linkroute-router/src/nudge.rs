//! Separation of overlapping parallel segments.
//!
//! Two connectors that share a channel end up drawn on top of each other.
//! This pass pushes one of them sideways by the ideal nudging distance, as
//! long as the shifted path stays clear of every obstacle.

use std::collections::{BTreeMap, BTreeSet};

use kurbo::{Point, Rect};

use crate::geometry::{EPSILON, segment_enters_rect};
use crate::router::ConnRef;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Horizontal,
    Vertical,
}

fn axis_of(a: Point, b: Point) -> Option<Axis> {
    if (a.y - b.y).abs() < EPSILON && (a.x - b.x).abs() >= EPSILON {
        Some(Axis::Horizontal)
    } else if (a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() >= EPSILON {
        Some(Axis::Vertical)
    } else {
        None
    }
}

/// Length of the shared run of two collinear segments, zero if they do not share one.
fn shared_run(a: (Point, Point), b: (Point, Point)) -> f64 {
    let (Some(axis_a), Some(axis_b)) = (axis_of(a.0, a.1), axis_of(b.0, b.1)) else {
        return 0.0;
    };
    if axis_a != axis_b {
        return 0.0;
    }
    let (offset_a, offset_b, span_a, span_b) = match axis_a {
        Axis::Horizontal => (a.0.y, b.0.y, (a.0.x, a.1.x), (b.0.x, b.1.x)),
        Axis::Vertical => (a.0.x, b.0.x, (a.0.y, a.1.y), (b.0.y, b.1.y)),
    };
    if (offset_a - offset_b).abs() >= EPSILON {
        return 0.0;
    }
    let lo = span_a.0.min(span_a.1).max(span_b.0.min(span_b.1));
    let hi = span_a.0.max(span_a.1).min(span_b.0.max(span_b.1));
    (hi - lo).max(0.0)
}

/// Indices of segments that may move: neither end touches an attach or stub point.
fn movable_segments(path: &[Point]) -> std::ops::Range<usize> {
    if path.len() < 6 {
        return 0..0;
    }
    2..path.len() - 3
}

fn shifted(path: &[Point], segment: usize, delta: f64) -> Option<Vec<Point>> {
    let axis = axis_of(path[segment], path[segment + 1])?;
    let mut out = path.to_vec();
    for p in &mut out[segment..=segment + 1] {
        match axis {
            Axis::Horizontal => p.y += delta,
            Axis::Vertical => p.x += delta,
        }
    }
    Some(out)
}

fn clear_around(path: &[Point], segment: usize, obstacles: &[Rect]) -> bool {
    (segment - 1..=segment + 1).all(|i| {
        obstacles
            .iter()
            .all(|r| !segment_enters_rect(path[i], path[i + 1], *r))
    })
}

/// Whether `segment` would share a run with a connector other than `owner`.
fn lands_on_other(routes: &BTreeMap<ConnRef, Vec<Point>>, owner: ConnRef, segment: (Point, Point)) -> bool {
    routes
        .iter()
        .filter(|(id, _)| **id != owner)
        .any(|(_, path)| path.windows(2).any(|w| shared_run((w[0], w[1]), segment) > EPSILON))
}

/// Separate overlapping segments of different connectors.
///
/// Returns the connectors whose routes were changed.
pub(crate) fn separate(
    routes: &mut BTreeMap<ConnRef, Vec<Point>>,
    obstacles: &[Rect],
    distance: f64,
) -> BTreeSet<ConnRef> {
    let mut changed = BTreeSet::new();
    if distance <= 0.0 {
        return changed;
    }
    let ids: Vec<ConnRef> = routes.keys().copied().collect();
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            let segments_a: Vec<(Point, Point)> = routes[&a].windows(2).map(|w| (w[0], w[1])).collect();
            let path_b = routes[&b].clone();
            for j in movable_segments(&path_b) {
                let seg_b = (path_b[j], path_b[j + 1]);
                if !segments_a.iter().any(|&seg_a| shared_run(seg_a, seg_b) > EPSILON) {
                    continue;
                }
                let candidate = [distance, -distance].into_iter().find_map(|delta| {
                    shifted(&routes[&b], j, delta)
                        .filter(|p| clear_around(p, j, obstacles))
                        .filter(|p| !lands_on_other(routes, b, (p[j], p[j + 1])))
                });
                match candidate {
                    Some(path) => {
                        log::debug!("nudged connector {:?} segment {} apart from {:?}", b, j, a);
                        routes.insert(b, path);
                        changed.insert(b);
                    }
                    None => {
                        log::debug!("no room to nudge connector {:?} segment {}", b, j);
                    }
                }
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(points: &[(f64, f64)]) -> Vec<Point> {
        points.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn test_shared_run() {
        let a = (Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let b = (Point::new(50.0, 0.0), Point::new(150.0, 0.0));
        assert!((shared_run(a, b) - 50.0).abs() < EPSILON);
        let c = (Point::new(50.0, 5.0), Point::new(150.0, 5.0));
        assert_eq!(shared_run(a, c), 0.0);
    }

    #[test]
    fn test_overlapping_channel_is_separated() {
        let shared = path(&[
            (0.0, 0.0),
            (0.0, -20.0),
            (50.0, -20.0),
            (50.0, -100.0),
            (250.0, -100.0),
            (250.0, -20.0),
            (300.0, -20.0),
            (300.0, 0.0),
        ]);
        let mut routes = BTreeMap::new();
        routes.insert(ConnRef::from_raw(1), shared.clone());
        routes.insert(ConnRef::from_raw(2), shared.clone());

        let changed = separate(&mut routes, &[], 10.0);
        assert!(changed.contains(&ConnRef::from_raw(2)));
        let moved = &routes[&ConnRef::from_raw(2)];
        assert_eq!(moved.first(), shared.first());
        assert_eq!(moved.last(), shared.last());
        assert_ne!(moved, &shared);
    }

    #[test]
    fn test_nudge_skips_a_third_connectors_channel() {
        let shared = path(&[
            (0.0, 0.0),
            (0.0, -20.0),
            (50.0, -20.0),
            (50.0, -100.0),
            (250.0, -100.0),
            (250.0, -20.0),
            (300.0, -20.0),
            (300.0, 0.0),
        ]);
        // A third route already runs one nudge below the shared channel.
        let below = path(&[(60.0, -90.0), (240.0, -90.0)]);
        let mut routes = BTreeMap::new();
        routes.insert(ConnRef::from_raw(1), shared.clone());
        routes.insert(ConnRef::from_raw(2), shared.clone());
        routes.insert(ConnRef::from_raw(3), below.clone());

        let changed = separate(&mut routes, &[], 10.0);
        assert!(changed.contains(&ConnRef::from_raw(2)));
        let moved = &routes[&ConnRef::from_raw(2)];
        // The first choice would land on the third route, so it goes the other way.
        assert_eq!(moved[3].y, -110.0);
        assert_eq!(moved[4].y, -110.0);
        assert_eq!(routes[&ConnRef::from_raw(3)], below);
    }

    #[test]
    fn test_short_paths_are_left_alone() {
        let straight = path(&[(0.0, 0.0), (100.0, 0.0)]);
        let mut routes = BTreeMap::new();
        routes.insert(ConnRef::from_raw(1), straight.clone());
        routes.insert(ConnRef::from_raw(2), straight.clone());
        assert!(separate(&mut routes, &[], 10.0).is_empty());
    }
}

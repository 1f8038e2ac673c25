//! Snapping for the grid and for dragged connection ends.

use kurbo::{Point, Rect};

use crate::diagram::Diagram;
use crate::shapes::{ConnectionEnd, Endpoint, Shape};
use crate::validation::{CellRef, can_connect};

/// Grid size for snapping shape positions.
pub const GRID_SIZE: f64 = 10.0;

/// How far a dragged connection end reaches for a port or shape.
pub const LINK_SNAP_RADIUS: f64 = 30.0;

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid_size: f64) -> Point {
    Point::new(
        (point.x / grid_size).round() * grid_size,
        (point.y / grid_size).round() * grid_size,
    )
}

/// Where a dragged connection end snapped to.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSnap {
    /// Endpoint to bind the dragged end to.
    pub endpoint: Endpoint,
    /// Point the end is drawn at.
    pub point: Point,
}

/// Closest point on the boundary of `rect`.
fn nearest_on_boundary(rect: Rect, p: Point) -> Point {
    let clamped = Point::new(p.x.clamp(rect.x0, rect.x1), p.y.clamp(rect.y0, rect.y1));
    if clamped != p {
        return clamped;
    }
    // Inside: push out through the nearest side.
    let candidates = [
        (p.x - rect.x0, Point::new(rect.x0, p.y)),
        (rect.x1 - p.x, Point::new(rect.x1, p.y)),
        (p.y - rect.y0, Point::new(p.x, rect.y0)),
        (rect.y1 - p.y, Point::new(p.x, rect.y1)),
    ];
    candidates
        .into_iter()
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, q)| q)
        .unwrap_or(p)
}

fn snap_candidates(shape: &Shape, point: Point) -> Vec<(Option<&str>, Point)> {
    if shape.has_ports() {
        shape
            .ports
            .iter()
            .filter_map(|port| Some((Some(port.id.as_str()), shape.port_position(&port.id)?)))
            .collect()
    } else {
        vec![(None, nearest_on_boundary(shape.bounds(), point))]
    }
}

/// Find the nearest valid place within `radius` to drop the `end` side of a
/// connection whose other side is `fixed`.
///
/// Ports are candidates on ported shapes, the nearest boundary point on
/// portless ones. Candidates the connection rules reject are skipped.
pub fn snap_link_end(
    diagram: &Diagram,
    fixed: &Endpoint,
    point: Point,
    end: ConnectionEnd,
    radius: f64,
) -> Option<LinkSnap> {
    let fixed_cell = fixed
        .shape_id()
        .and_then(|id| diagram.shape(id))
        .map(|shape| (shape, fixed.port_id().cloned()));

    let mut best: Option<(f64, LinkSnap)> = None;
    for shape in diagram.shapes_ordered() {
        for (port, at) in snap_candidates(shape, point) {
            let distance = at.distance(point);
            if distance > radius || best.as_ref().is_some_and(|(d, _)| distance >= *d) {
                continue;
            }
            let port = port.map(str::to_string);
            let allowed = match &fixed_cell {
                Some((fixed_shape, fixed_port)) => {
                    let (source, source_port, target, target_port) = match end {
                        ConnectionEnd::Target => (*fixed_shape, fixed_port.as_ref(), shape, port.as_ref()),
                        ConnectionEnd::Source => (shape, port.as_ref(), *fixed_shape, fixed_port.as_ref()),
                    };
                    can_connect(
                        CellRef::Shape(source),
                        source_port,
                        CellRef::Shape(target),
                        target_port,
                        end,
                    )
                }
                // Free fixed end: only the dropped-on shape's own rule applies.
                None => port.is_some() || !shape.has_ports(),
            };
            if !allowed {
                continue;
            }
            let endpoint = match port {
                Some(port) => Endpoint::port(shape.id(), port),
                None => Endpoint::shape(shape.id()),
            };
            best = Some((distance, LinkSnap { endpoint, point: at }));
        }
    }
    best.map(|(_, snap)| snap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Port, PortGroup};

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(Point::new(14.0, 16.0), GRID_SIZE), Point::new(10.0, 20.0));
        assert_eq!(snap_to_grid(Point::new(-4.0, 5.0), GRID_SIZE), Point::new(0.0, 10.0));
    }

    #[test]
    fn test_nearest_on_boundary() {
        let r = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(nearest_on_boundary(r, Point::new(120.0, 50.0)), Point::new(100.0, 50.0));
        assert_eq!(nearest_on_boundary(r, Point::new(50.0, 10.0)), Point::new(50.0, 0.0));
    }

    #[test]
    fn test_snaps_to_nearest_port() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(Shape::new(Point::new(0.0, 0.0), 100.0, 100.0));
        let b = diagram.add_shape(Shape::new(Point::new(300.0, 0.0), 100.0, 100.0).with_ports([
            Port::new("port1", PortGroup::Top),
            Port::new("port4", PortGroup::Left),
        ]));

        let snap = snap_link_end(
            &diagram,
            &Endpoint::shape(a),
            Point::new(290.0, 45.0),
            ConnectionEnd::Target,
            LINK_SNAP_RADIUS,
        )
        .unwrap();
        assert_eq!(snap.endpoint, Endpoint::port(b, "port4"));
        assert_eq!(snap.point, Point::new(300.0, 50.0));
    }

    #[test]
    fn test_snaps_to_portless_boundary() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(Shape::new(Point::new(0.0, 0.0), 100.0, 100.0));
        let b = diagram.add_shape(Shape::new(Point::new(300.0, 0.0), 100.0, 100.0));
        let snap = snap_link_end(
            &diagram,
            &Endpoint::shape(a),
            Point::new(280.0, 30.0),
            ConnectionEnd::Target,
            LINK_SNAP_RADIUS,
        )
        .unwrap();
        assert_eq!(snap.endpoint, Endpoint::shape(b));
        assert_eq!(snap.point, Point::new(300.0, 30.0));
    }

    #[test]
    fn test_nothing_in_reach() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(Shape::new(Point::new(0.0, 0.0), 100.0, 100.0));
        diagram.add_shape(Shape::new(Point::new(300.0, 0.0), 100.0, 100.0));
        assert!(snap_link_end(
            &diagram,
            &Endpoint::shape(a),
            Point::new(200.0, 50.0),
            ConnectionEnd::Target,
            LINK_SNAP_RADIUS,
        )
        .is_none());
    }

    #[test]
    fn test_own_shape_is_not_a_target() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(Shape::new(Point::new(0.0, 0.0), 100.0, 100.0));
        assert!(snap_link_end(
            &diagram,
            &Endpoint::shape(a),
            Point::new(110.0, 50.0),
            ConnectionEnd::Target,
            LINK_SNAP_RADIUS,
        )
        .is_none());
    }
}

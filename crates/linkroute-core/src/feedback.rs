//! Writes computed routes back onto diagram connections.

use kurbo::Point;

use crate::diagram::Diagram;
use crate::shapes::ConnectionId;

/// Copies engine polylines into connection vertices.
pub struct RouteFeedbackWriter;

impl RouteFeedbackWriter {
    /// Set the connection's vertices to the interior points of `route`.
    ///
    /// The first and last points are the endpoint anchors and are not
    /// stored; endpoint bindings are untouched. Returns `false` if the
    /// connection is gone.
    pub fn apply(diagram: &mut Diagram, connection: ConnectionId, route: &[Point]) -> bool {
        let vertices = match route.len() {
            0..=2 => Vec::new(),
            n => route[1..n - 1].to_vec(),
        };
        if diagram.set_vertices(connection, vertices) {
            true
        } else {
            log::debug!("Dropping route for removed connection {}", connection);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Endpoint, Shape};

    #[test]
    fn test_apply_is_idempotent() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(Shape::new(Point::new(0.0, 0.0), 100.0, 100.0));
        let b = diagram.add_shape(Shape::new(Point::new(300.0, 300.0), 100.0, 100.0));
        let conn = diagram.connect(Endpoint::shape(a), Endpoint::shape(b));
        let route = [
            Point::new(100.0, 50.0),
            Point::new(200.0, 50.0),
            Point::new(200.0, 350.0),
            Point::new(300.0, 350.0),
        ];

        assert!(RouteFeedbackWriter::apply(&mut diagram, conn, &route));
        let once = diagram.connection(conn).unwrap().clone();
        assert!(RouteFeedbackWriter::apply(&mut diagram, conn, &route));
        let twice = diagram.connection(conn).unwrap().clone();

        assert_eq!(once, twice);
        assert_eq!(once.vertices, vec![Point::new(200.0, 50.0), Point::new(200.0, 350.0)]);
        assert_eq!(once.source, Endpoint::shape(a));
        assert_eq!(once.target, Endpoint::shape(b));
    }

    #[test]
    fn test_straight_route_has_no_vertices() {
        let mut diagram = Diagram::new();
        let conn = diagram.connect(Endpoint::Point(Point::ZERO), Endpoint::Point(Point::new(10.0, 0.0)));
        diagram.set_vertices(conn, vec![Point::new(5.0, 5.0)]);
        assert!(RouteFeedbackWriter::apply(&mut diagram, conn, &[Point::ZERO, Point::new(10.0, 0.0)]));
        assert!(diagram.connection(conn).unwrap().vertices.is_empty());
    }

    #[test]
    fn test_missing_connection() {
        let mut diagram = Diagram::new();
        assert!(!RouteFeedbackWriter::apply(&mut diagram, uuid::Uuid::new_v4(), &[Point::ZERO]));
    }
}

//! Which connections must go when the things they are bound to go.
//!
//! The router applies these against the live diagram while it drains events,
//! so cascade deletions land in the same update cycle.

use crate::diagram::Diagram;
use crate::shapes::{Connection, ConnectionId, Endpoint, ShapeId};

/// Connections with an end bound to `shape`.
pub fn dependent_connections(diagram: &Diagram, shape: ShapeId) -> Vec<ConnectionId> {
    diagram
        .connections_ordered()
        .filter(|c| c.touches_shape(shape))
        .map(Connection::id)
        .collect()
}

/// Connections with an end bound to `port` on `shape`.
pub fn port_dependent_connections(diagram: &Diagram, shape: ShapeId, port: &str) -> Vec<ConnectionId> {
    diagram
        .connections_ordered()
        .filter(|c| c.touches_port(shape, port))
        .map(Connection::id)
        .collect()
}

/// Whether an endpoint names a shape or port the diagram does not have.
pub fn is_unresolved(diagram: &Diagram, endpoint: &Endpoint) -> bool {
    match endpoint {
        Endpoint::Point(p) => !(p.x.is_finite() && p.y.is_finite()),
        Endpoint::Shape { shape, port } => match diagram.shape(*shape) {
            None => true,
            Some(shape) => port.as_ref().is_some_and(|p| shape.port(p).is_none()),
        },
    }
}

/// Whether either end of a connection is unresolved.
pub fn has_unresolved_endpoint(diagram: &Diagram, connection: &Connection) -> bool {
    connection.endpoints().iter().any(|e| is_unresolved(diagram, e))
}

/// Connections bound to `shape` that no longer resolve.
pub fn orphaned_connections(diagram: &Diagram, shape: ShapeId) -> Vec<ConnectionId> {
    diagram
        .connections_ordered()
        .filter(|c| c.touches_shape(shape) && has_unresolved_endpoint(diagram, c))
        .map(Connection::id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Port, PortGroup, Shape};
    use kurbo::Point;

    fn ported(x: f64) -> Shape {
        Shape::new(Point::new(x, 0.0), 100.0, 100.0).with_ports([
            Port::new("port1", PortGroup::Top),
            Port::new("port4", PortGroup::Left),
        ])
    }

    #[test]
    fn test_dependents_of_shape() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(ported(0.0));
        let b = diagram.add_shape(ported(300.0));
        let c = diagram.add_shape(ported(600.0));
        let ab = diagram.connect(Endpoint::port(a, "port1"), Endpoint::port(b, "port4"));
        let bc = diagram.connect(Endpoint::port(b, "port1"), Endpoint::port(c, "port4"));

        assert_eq!(dependent_connections(&diagram, a), vec![ab]);
        assert_eq!(dependent_connections(&diagram, b), vec![ab, bc]);
        assert_eq!(port_dependent_connections(&diagram, b, "port4"), vec![ab]);
    }

    #[test]
    fn test_removed_port_orphans_connection() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(ported(0.0));
        let b = diagram.add_shape(ported(300.0));
        let ab = diagram.connect(Endpoint::port(a, "port1"), Endpoint::port(b, "port4"));
        assert!(orphaned_connections(&diagram, b).is_empty());

        diagram.remove_port(b, "port4");
        assert_eq!(orphaned_connections(&diagram, b), vec![ab]);
        assert!(has_unresolved_endpoint(&diagram, diagram.connection(ab).unwrap()));
    }

    #[test]
    fn test_missing_shape_is_unresolved() {
        let diagram = Diagram::new();
        assert!(is_unresolved(&diagram, &Endpoint::shape(uuid::Uuid::new_v4())));
        assert!(!is_unresolved(&diagram, &Endpoint::Point(Point::new(1.0, 2.0))));
    }
}

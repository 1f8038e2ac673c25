//! Rules for whether a connection end may be dropped on a cell.

use crate::shapes::{Connection, ConnectionEnd, PortId, Shape};

/// A diagram cell a connection end is dragged over.
#[derive(Debug, Clone, Copy)]
pub enum CellRef<'a> {
    Shape(&'a Shape),
    Connection(&'a Connection),
}

impl<'a> CellRef<'a> {
    fn shape(self) -> Option<&'a Shape> {
        match self {
            CellRef::Shape(shape) => Some(shape),
            CellRef::Connection(_) => None,
        }
    }
}

/// Decide whether a connection between these cells is allowed while the
/// `end` side is being dragged.
///
/// Connections never attach to connections or to the port they start from.
/// A port under the dragged end is always acceptable. Otherwise the cells
/// must differ and the dragged end's shape must have no ports, since ported
/// shapes only accept connections on a port.
pub fn can_connect(
    source: CellRef<'_>,
    source_port: Option<&PortId>,
    target: CellRef<'_>,
    target_port: Option<&PortId>,
    end: ConnectionEnd,
) -> bool {
    let (Some(source), Some(target)) = (source.shape(), target.shape()) else {
        return false;
    };
    let same_shape = source.id() == target.id();
    if same_shape && source_port.is_some() && source_port == target_port {
        return false;
    }
    let (end_shape, end_port) = match end {
        ConnectionEnd::Source => (source, source_port),
        ConnectionEnd::Target => (target, target_port),
    };
    if end_port.is_some() {
        return true;
    }
    if same_shape {
        return false;
    }
    !end_shape.has_ports()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Endpoint, Port, PortGroup};
    use kurbo::Point;

    fn plain() -> Shape {
        Shape::new(Point::ZERO, 100.0, 100.0)
    }

    fn ported() -> Shape {
        Shape::new(Point::new(300.0, 0.0), 100.0, 100.0).with_ports([
            Port::new("port1", PortGroup::Top),
            Port::new("port4", PortGroup::Left),
        ])
    }

    #[test]
    fn test_connections_are_never_endpoints() {
        let a = plain();
        let link = Connection::new(Endpoint::shape(a.id()), Endpoint::Point(Point::ZERO));
        assert!(!can_connect(
            CellRef::Shape(&a),
            None,
            CellRef::Connection(&link),
            None,
            ConnectionEnd::Target
        ));
        assert!(!can_connect(
            CellRef::Connection(&link),
            None,
            CellRef::Shape(&a),
            None,
            ConnectionEnd::Source
        ));
    }

    #[test]
    fn test_same_port_rejected() {
        let b = ported();
        let port = "port1".to_string();
        assert!(!can_connect(
            CellRef::Shape(&b),
            Some(&port),
            CellRef::Shape(&b),
            Some(&port),
            ConnectionEnd::Target
        ));
    }

    #[test]
    fn test_port_on_dragged_end_accepted() {
        let a = plain();
        let b = ported();
        let p1 = "port1".to_string();
        let p4 = "port4".to_string();
        assert!(can_connect(
            CellRef::Shape(&a),
            None,
            CellRef::Shape(&b),
            Some(&p4),
            ConnectionEnd::Target
        ));
        // Different ports on the same shape are fine.
        assert!(can_connect(
            CellRef::Shape(&b),
            Some(&p1),
            CellRef::Shape(&b),
            Some(&p4),
            ConnectionEnd::Target
        ));
    }

    #[test]
    fn test_self_loop_without_port_rejected() {
        let a = plain();
        assert!(!can_connect(
            CellRef::Shape(&a),
            None,
            CellRef::Shape(&a),
            None,
            ConnectionEnd::Target
        ));
    }

    #[test]
    fn test_portless_end_needs_portless_shape() {
        let a = plain();
        let b = ported();
        let c = Shape::new(Point::new(600.0, 0.0), 100.0, 100.0);
        assert!(can_connect(
            CellRef::Shape(&a),
            None,
            CellRef::Shape(&c),
            None,
            ConnectionEnd::Target
        ));
        assert!(!can_connect(
            CellRef::Shape(&a),
            None,
            CellRef::Shape(&b),
            None,
            ConnectionEnd::Target
        ));
        // Only the dragged end's shape matters.
        assert!(can_connect(
            CellRef::Shape(&b),
            None,
            CellRef::Shape(&a),
            None,
            ConnectionEnd::Target
        ));
        assert!(!can_connect(
            CellRef::Shape(&b),
            None,
            CellRef::Shape(&a),
            None,
            ConnectionEnd::Source
        ));
    }
}

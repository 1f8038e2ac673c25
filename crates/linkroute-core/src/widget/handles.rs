//! Handle definitions for shape and connection tools.

use kurbo::{Point, Size, Vec2};

use super::state::WidgetState;
use crate::shapes::Shape;

/// Smallest width or height the resize tool produces.
pub const MIN_RESIZE: f64 = 10.0;

/// A tool handle on a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Handle {
    /// The kind of handle (determines behavior).
    pub kind: HandleKind,
    /// Position relative to the shape's top-left corner.
    pub offset: Vec2,
    /// Visual shape of the handle.
    pub shape: HandleShape,
}

/// The kind of handle - determines what it does when used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Drag to resize the shape from its bottom-right corner.
    Resize,
    /// Click to delete the shape.
    Remove,
    /// Drag to start a connection from a portless shape.
    Connect,
    /// Click to delete a connection.
    LinkRemove,
    /// Drag to reconnect a connection's target.
    TargetArrowhead,
}

/// Visual shape of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandleShape {
    #[default]
    Square,
    Circle,
    Arrowhead,
}

impl Handle {
    /// Create a new handle.
    pub fn new(kind: HandleKind, offset: Vec2) -> Self {
        Self {
            kind,
            offset,
            shape: HandleShape::default(),
        }
    }

    /// Set the handle shape.
    pub fn with_shape(mut self, shape: HandleShape) -> Self {
        self.shape = shape;
        self
    }

    /// Position in world coordinates for a shape at `origin`.
    pub fn position(&self, origin: Point) -> Point {
        origin + self.offset
    }
}

/// Tools shown on a shape.
pub fn tools_for(shape: &Shape) -> Vec<Handle> {
    let Size { width, height } = shape.size;
    let mut handles = vec![
        Handle::new(HandleKind::Resize, Vec2::new(width, height)),
        Handle::new(HandleKind::Remove, Vec2::new(-10.0, -10.0)).with_shape(HandleShape::Circle),
    ];
    if !shape.has_ports() {
        handles.push(
            Handle::new(HandleKind::Connect, Vec2::new(width + 10.0, height - 20.0))
                .with_shape(HandleShape::Circle),
        );
    }
    handles
}

/// Tools shown on a connection in the given state.
pub fn link_tools_for(state: WidgetState) -> Vec<HandleKind> {
    if state.shows_link_tools() {
        vec![HandleKind::LinkRemove, HandleKind::TargetArrowhead]
    } else {
        Vec::new()
    }
}

/// Size a shape takes when its resize handle is dropped at `local`, given
/// relative to the shape's top-left corner.
///
/// Each dimension is rounded to an even number and kept at least
/// [`MIN_RESIZE`].
pub fn resize_from_handle(local: Point) -> Size {
    let snap = |v: f64| ((v / 2.0).round() * 2.0).max(MIN_RESIZE);
    Size::new(snap(local.x), snap(local.y))
}

/// Hit test the tools of a shape at a world point.
pub fn hit_test_handle(shape: &Shape, point: Point, tolerance: f64) -> Option<HandleKind> {
    tools_for(shape)
        .into_iter()
        .find(|h| h.position(shape.position).distance(point) <= tolerance)
        .map(|h| h.kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Port, PortGroup};

    #[test]
    fn test_portless_shape_gets_connect_tool() {
        let shape = Shape::new(Point::new(100.0, 400.0), 100.0, 100.0);
        let tools = tools_for(&shape);
        let kinds: Vec<HandleKind> = tools.iter().map(|h| h.kind).collect();
        assert_eq!(kinds, vec![HandleKind::Resize, HandleKind::Remove, HandleKind::Connect]);
        assert_eq!(tools[0].offset, Vec2::new(100.0, 100.0));
        assert_eq!(tools[1].offset, Vec2::new(-10.0, -10.0));
        assert_eq!(tools[2].offset, Vec2::new(110.0, 80.0));
        assert_eq!(tools[2].position(shape.position), Point::new(210.0, 480.0));
    }

    #[test]
    fn test_ported_shape_has_no_connect_tool() {
        let shape = Shape::new(Point::ZERO, 100.0, 100.0).with_ports([Port::new("port1", PortGroup::Top)]);
        assert!(tools_for(&shape).iter().all(|h| h.kind != HandleKind::Connect));
        assert_eq!(tools_for(&shape).len(), 2);
    }

    #[test]
    fn test_link_tools_follow_state() {
        assert!(link_tools_for(WidgetState::Normal).is_empty());
        assert_eq!(
            link_tools_for(WidgetState::Hovered),
            vec![HandleKind::LinkRemove, HandleKind::TargetArrowhead]
        );
        assert_eq!(link_tools_for(WidgetState::Active).len(), 2);
    }

    #[test]
    fn test_resize_rounds_to_even() {
        assert_eq!(resize_from_handle(Point::new(101.0, 57.4)), Size::new(102.0, 58.0));
        assert_eq!(resize_from_handle(Point::new(3.0, -40.0)), Size::new(10.0, 10.0));
    }

    #[test]
    fn test_hit_test_handle() {
        let shape = Shape::new(Point::new(100.0, 100.0), 100.0, 100.0);
        assert_eq!(hit_test_handle(&shape, Point::new(201.0, 199.0), 4.0), Some(HandleKind::Resize));
        assert_eq!(hit_test_handle(&shape, Point::new(90.0, 90.0), 4.0), Some(HandleKind::Remove));
        assert_eq!(hit_test_handle(&shape, Point::new(150.0, 150.0), 4.0), None);
    }
}

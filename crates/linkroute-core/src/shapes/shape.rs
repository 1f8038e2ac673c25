//! Shape: a rectangular node that connections are routed around.

use super::port::{Port, PortGroup, layout_fraction};
use super::ShapeId;
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A rectangular shape with an ordered list of ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub(crate) id: ShapeId,
    /// Top-left corner position.
    pub position: Point,
    /// Width and height.
    pub size: Size,
    /// Ports, in declaration order.
    #[serde(default)]
    pub ports: Vec<Port>,
}

impl Shape {
    /// Default width and height of shapes created interactively.
    pub const DEFAULT_SIZE: f64 = 100.0;

    /// Create a new shape without ports.
    pub fn new(position: Point, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            size: Size::new(width, height),
            ports: Vec::new(),
        }
    }

    /// Create a default-sized shape centered on a point.
    pub fn centered_at(center: Point) -> Self {
        let half = Self::DEFAULT_SIZE / 2.0;
        Self::new(
            Point::new(center.x - half, center.y - half),
            Self::DEFAULT_SIZE,
            Self::DEFAULT_SIZE,
        )
    }

    /// Add ports to the shape.
    pub fn with_ports(mut self, ports: impl IntoIterator<Item = Port>) -> Self {
        self.ports.extend(ports);
        self
    }

    /// Get the unique identifier.
    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// Get the bounding box in world coordinates.
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    /// Replace position and size from a rectangle.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.position = bounds.origin();
        self.size = bounds.size();
    }

    /// Whether the shape exposes any ports.
    pub fn has_ports(&self) -> bool {
        !self.ports.is_empty()
    }

    /// Look up a port by id.
    pub fn port(&self, id: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.id == id)
    }

    /// Anchor of a port as fractions of the shape's size, with its group.
    pub fn port_anchor(&self, id: &str) -> Option<(f64, f64, PortGroup)> {
        layout_fraction(&self.ports, id)
    }

    /// Absolute position of a port.
    pub fn port_position(&self, id: &str) -> Option<Point> {
        let (fx, fy, _) = self.port_anchor(id)?;
        Some(Point::new(
            self.position.x + self.size.width * fx,
            self.position.y + self.size.height * fy,
        ))
    }

    /// Check if a point hits the shape.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.bounds().inflate(tolerance, tolerance).contains(point)
    }

    /// Point on the boundary where a line from the center toward `toward` exits.
    pub fn boundary_point(&self, toward: Point) -> Point {
        let bounds = self.bounds();
        let center = bounds.center();
        let d = toward - center;
        if d.x.abs() < f64::EPSILON && d.y.abs() < f64::EPSILON {
            return center;
        }
        let half_w = bounds.width() / 2.0;
        let half_h = bounds.height() / 2.0;
        let tx = if d.x.abs() > f64::EPSILON { half_w / d.x.abs() } else { f64::INFINITY };
        let ty = if d.y.abs() > f64::EPSILON { half_h / d.y.abs() } else { f64::INFINITY };
        center + d * tx.min(ty)
    }

    /// Clone this shape under a new identifier.
    ///
    /// Port ids are kept since they are only unique within a shape.
    pub fn duplicate(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }
}

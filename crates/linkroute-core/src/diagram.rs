//! Diagram document: shapes, ports and connections, plus the change outbox.

use crate::events::DiagramEvent;
use crate::shapes::{Connection, ConnectionEnd, ConnectionId, Endpoint, Port, Shape, ShapeId};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A diagram containing shapes and the connections between them.
///
/// All edits go through methods that record a [`DiagramEvent`]; the router
/// drains them with [`Diagram::drain_events`] once per update cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagram {
    /// Unique document identifier.
    pub id: String,
    /// Document name.
    pub name: String,
    shapes: HashMap<ShapeId, Shape>,
    /// Z-order of shapes (back to front).
    z_order: Vec<ShapeId>,
    connections: HashMap<ConnectionId, Connection>,
    /// Insertion order of connections.
    connection_order: Vec<ConnectionId>,
    /// Pending change events.
    #[serde(skip)]
    events: Vec<DiagramEvent>,
}

impl Default for Diagram {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagram {
    /// Create a new empty diagram.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: "Untitled".to_string(),
            shapes: HashMap::new(),
            z_order: Vec::new(),
            connections: HashMap::new(),
            connection_order: Vec::new(),
            events: Vec::new(),
        }
    }

    // --- Shapes ---

    /// Add a shape to the diagram.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        let id = shape.id();
        if self.shapes.contains_key(&id) {
            self.remove_shape(id);
        }
        self.z_order.push(id);
        self.events.push(DiagramEvent::ShapeAdded(shape.clone()));
        self.shapes.insert(id, shape);
        id
    }

    /// Add a default-sized shape centered on a point.
    pub fn add_shape_at(&mut self, center: Point) -> ShapeId {
        self.add_shape(Shape::centered_at(center))
    }

    /// Clone a shape under a new id, offset by `offset`.
    pub fn duplicate_shape(&mut self, id: ShapeId, offset: Vec2) -> Option<ShapeId> {
        let mut copy = self.shapes.get(&id)?.duplicate();
        copy.position += offset;
        Some(self.add_shape(copy))
    }

    /// Remove a shape.
    ///
    /// Connections bound to it are left in place; removing them is the
    /// router's cascade policy.
    pub fn remove_shape(&mut self, id: ShapeId) -> Option<Shape> {
        let shape = self.shapes.remove(&id)?;
        self.z_order.retain(|&shape_id| shape_id != id);
        self.events.push(DiagramEvent::ShapeRemoved(id));
        Some(shape)
    }

    /// Move and/or resize a shape.
    pub fn set_bounds(&mut self, id: ShapeId, bounds: Rect) -> bool {
        let Some(shape) = self.shapes.get_mut(&id) else {
            return false;
        };
        shape.set_bounds(bounds);
        self.events.push(DiagramEvent::GeometryChanged { shape: id, bounds });
        true
    }

    /// Move a shape by a delta.
    pub fn translate_shape(&mut self, id: ShapeId, delta: Vec2) -> bool {
        let Some(bounds) = self.shapes.get(&id).map(Shape::bounds) else {
            return false;
        };
        self.set_bounds(id, bounds + delta)
    }

    /// Resize a shape keeping its top-left corner.
    pub fn resize_shape(&mut self, id: ShapeId, width: f64, height: f64) -> bool {
        let Some(position) = self.shapes.get(&id).map(|s| s.position) else {
            return false;
        };
        self.set_bounds(
            id,
            Rect::from_origin_size(position, (width, height)),
        )
    }

    /// Add a port to a shape. Returns `false` if the shape is missing or the
    /// port id is taken.
    pub fn add_port(&mut self, id: ShapeId, port: Port) -> bool {
        let Some(shape) = self.shapes.get_mut(&id) else {
            return false;
        };
        if shape.port(&port.id).is_some() {
            return false;
        }
        shape.ports.push(port.clone());
        self.events.push(DiagramEvent::PortSetChanged {
            shape: id,
            added: vec![port],
            removed: Vec::new(),
        });
        true
    }

    /// Remove a port from a shape.
    pub fn remove_port(&mut self, id: ShapeId, port: &str) -> Option<Port> {
        let shape = self.shapes.get_mut(&id)?;
        let index = shape.ports.iter().position(|p| p.id == port)?;
        let removed = shape.ports.remove(index);
        self.events.push(DiagramEvent::PortSetChanged {
            shape: id,
            added: Vec::new(),
            removed: vec![removed.id.clone()],
        });
        Some(removed)
    }

    /// Get a shape by ID.
    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    /// Get shapes in z-order (back to front).
    pub fn shapes_ordered(&self) -> impl Iterator<Item = &Shape> {
        self.z_order.iter().filter_map(|id| self.shapes.get(id))
    }

    /// Find shapes at a point, front to back.
    pub fn shapes_at_point(&self, point: Point, tolerance: f64) -> Vec<ShapeId> {
        self.z_order
            .iter()
            .rev()
            .filter_map(|&id| {
                self.shapes
                    .get(&id)
                    .filter(|s| s.hit_test(point, tolerance))
                    .map(|_| id)
            })
            .collect()
    }

    // --- Connections ---

    /// Add a connection.
    pub fn add_connection(&mut self, connection: Connection) -> ConnectionId {
        let id = connection.id();
        if self.connections.contains_key(&id) {
            self.remove_connection(id);
        }
        self.connection_order.push(id);
        self.events.push(DiagramEvent::ConnectionAdded(connection.clone()));
        self.connections.insert(id, connection);
        id
    }

    /// Connect two endpoints.
    pub fn connect(&mut self, source: Endpoint, target: Endpoint) -> ConnectionId {
        self.add_connection(Connection::new(source, target))
    }

    /// Remove a connection.
    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        self.connection_order.retain(|&conn_id| conn_id != id);
        self.events.push(DiagramEvent::ConnectionRemoved(id));
        Some(connection)
    }

    /// Reconnect one end of a connection.
    pub fn set_endpoint(&mut self, id: ConnectionId, end: ConnectionEnd, endpoint: Endpoint) -> bool {
        let Some(connection) = self.connections.get_mut(&id) else {
            return false;
        };
        *connection.endpoint_mut(end) = endpoint.clone();
        self.events.push(DiagramEvent::EndpointChanged {
            connection: id,
            end,
            endpoint,
        });
        true
    }

    /// Replace the intermediate route points of a connection.
    ///
    /// This is route output, not an edit, so no event is recorded.
    pub fn set_vertices(&mut self, id: ConnectionId, vertices: Vec<Point>) -> bool {
        match self.connections.get_mut(&id) {
            Some(connection) => {
                connection.vertices = vertices;
                true
            }
            None => false,
        }
    }

    /// Get a connection by ID.
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Get connections in insertion order.
    pub fn connections_ordered(&self) -> impl Iterator<Item = &Connection> {
        self.connection_order
            .iter()
            .filter_map(|id| self.connections.get(id))
    }

    /// Resolve an endpoint to a point: the port position, the boundary point
    /// of a bare shape facing `toward`, or the free point.
    pub fn endpoint_position(&self, endpoint: &Endpoint, toward: Point) -> Option<Point> {
        match endpoint {
            Endpoint::Point(p) => Some(*p),
            Endpoint::Shape { shape, port } => {
                let shape = self.shapes.get(shape)?;
                match port {
                    Some(port) => shape.port_position(port),
                    None => Some(shape.boundary_point(toward)),
                }
            }
        }
    }

    /// Full drawn path of a connection: source anchor, vertices, target anchor.
    pub fn connection_path(&self, id: ConnectionId) -> Option<Vec<Point>> {
        let connection = self.connections.get(&id)?;
        let center = |e: &Endpoint| match e {
            Endpoint::Point(p) => Some(*p),
            Endpoint::Shape { shape, .. } => self.shapes.get(shape).map(|s| s.bounds().center()),
        };
        let first_toward = match connection.vertices.first() {
            Some(p) => *p,
            None => center(&connection.target)?,
        };
        let last_toward = match connection.vertices.last() {
            Some(p) => *p,
            None => center(&connection.source)?,
        };
        let mut path = Vec::with_capacity(connection.vertices.len() + 2);
        path.push(self.endpoint_position(&connection.source, first_toward)?);
        path.extend(connection.vertices.iter().copied());
        path.push(self.endpoint_position(&connection.target, last_toward)?);
        Some(path)
    }

    // --- Events ---

    /// Take all pending change events, oldest first.
    pub fn drain_events(&mut self) -> Vec<DiagramEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether there are undrained change events.
    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    // --- Whole document ---

    /// Get the bounding box of all shapes.
    pub fn bounds(&self) -> Option<Rect> {
        let mut result: Option<Rect> = None;
        for shape in self.shapes.values() {
            let bounds = shape.bounds();
            result = Some(match result {
                Some(r) => r.union(bounds),
                None => bounds,
            });
        }
        result
    }

    /// Number of shapes.
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Number of connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Check if the diagram is empty.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty() && self.connections.is_empty()
    }

    /// Serialize the diagram to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a diagram from JSON. The outbox starts empty.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

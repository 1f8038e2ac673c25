//! Connection: a routed link between two endpoints.

use super::{ConnectionId, PortId, ShapeId};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionEnd {
    Source,
    Target,
}

impl ConnectionEnd {
    /// The other end.
    pub fn opposite(self) -> Self {
        match self {
            ConnectionEnd::Source => ConnectionEnd::Target,
            ConnectionEnd::Target => ConnectionEnd::Source,
        }
    }
}

/// One end of a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// Bound to a shape, optionally at a specific port.
    Shape {
        shape: ShapeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<PortId>,
    },
    /// A free point.
    Point(Point),
}

impl Endpoint {
    /// Bind to a shape's boundary.
    pub fn shape(shape: ShapeId) -> Self {
        Endpoint::Shape { shape, port: None }
    }

    /// Bind to a specific port of a shape.
    pub fn port(shape: ShapeId, port: impl Into<PortId>) -> Self {
        Endpoint::Shape {
            shape,
            port: Some(port.into()),
        }
    }

    /// The referenced shape, if any.
    pub fn shape_id(&self) -> Option<ShapeId> {
        match self {
            Endpoint::Shape { shape, .. } => Some(*shape),
            Endpoint::Point(_) => None,
        }
    }

    /// The referenced port, if any.
    pub fn port_id(&self) -> Option<&PortId> {
        match self {
            Endpoint::Shape { port, .. } => port.as_ref(),
            Endpoint::Point(_) => None,
        }
    }

    /// Whether this endpoint is bound to `shape`.
    pub fn references_shape(&self, shape: ShapeId) -> bool {
        self.shape_id() == Some(shape)
    }

    /// Whether this endpoint is bound to `port` on `shape`.
    pub fn references_port(&self, shape: ShapeId, port: &str) -> bool {
        self.references_shape(shape) && self.port_id().is_some_and(|p| p == port)
    }
}

/// A connection between two endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub(crate) id: ConnectionId,
    /// Source endpoint.
    pub source: Endpoint,
    /// Target endpoint.
    pub target: Endpoint,
    /// Intermediate route points, written by the router.
    #[serde(default)]
    pub vertices: Vec<Point>,
}

impl Connection {
    /// Create a new connection.
    pub fn new(source: Endpoint, target: Endpoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            target,
            vertices: Vec::new(),
        }
    }

    /// Get the unique identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get one endpoint.
    pub fn endpoint(&self, end: ConnectionEnd) -> &Endpoint {
        match end {
            ConnectionEnd::Source => &self.source,
            ConnectionEnd::Target => &self.target,
        }
    }

    /// Get one endpoint mutably.
    pub fn endpoint_mut(&mut self, end: ConnectionEnd) -> &mut Endpoint {
        match end {
            ConnectionEnd::Source => &mut self.source,
            ConnectionEnd::Target => &mut self.target,
        }
    }

    /// Both endpoints.
    pub fn endpoints(&self) -> [&Endpoint; 2] {
        [&self.source, &self.target]
    }

    /// Whether either end is bound to `shape`.
    pub fn touches_shape(&self, shape: ShapeId) -> bool {
        self.endpoints().iter().any(|e| e.references_shape(shape))
    }

    /// Whether either end is bound to `port` on `shape`.
    pub fn touches_port(&self, shape: ShapeId, port: &str) -> bool {
        self.endpoints().iter().any(|e| e.references_port(shape, port))
    }
}

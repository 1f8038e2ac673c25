//! Diagram entities: shapes, their ports, and the connections between them.

mod connection;
mod port;
mod shape;

pub use connection::{Connection, ConnectionEnd, Endpoint};
pub use port::{Port, PortGroup, PortId};
pub use shape::Shape;

use uuid::Uuid;

/// Unique identifier for shapes.
pub type ShapeId = Uuid;

/// Unique identifier for connections.
pub type ConnectionId = Uuid;

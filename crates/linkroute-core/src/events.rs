//! Change events emitted by the diagram.
//!
//! Every mutation of a [`Diagram`](crate::Diagram) appends one event to its
//! outbox. Events carry snapshots rather than references so they can be
//! replayed after the diagram has moved on.

use std::collections::HashSet;

use kurbo::Rect;

pub use crate::shapes::ConnectionEnd;
use crate::shapes::{Connection, ConnectionId, Endpoint, Port, PortId, Shape, ShapeId};

/// A change to the diagram.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagramEvent {
    /// A shape was added.
    ShapeAdded(Shape),
    /// A shape was removed.
    ShapeRemoved(ShapeId),
    /// A shape was moved or resized.
    GeometryChanged { shape: ShapeId, bounds: Rect },
    /// Ports were added to or removed from a shape.
    PortSetChanged {
        shape: ShapeId,
        added: Vec<Port>,
        removed: Vec<PortId>,
    },
    /// A connection was added.
    ConnectionAdded(Connection),
    /// A connection was removed.
    ConnectionRemoved(ConnectionId),
    /// One end of a connection was reconnected.
    EndpointChanged {
        connection: ConnectionId,
        end: ConnectionEnd,
        endpoint: Endpoint,
    },
}

/// Drop geometry changes that a later change to the same shape overrides.
///
/// Only the last move/resize of each shape in the batch is kept, at its
/// original position in the sequence.
pub fn coalesce(events: Vec<DiagramEvent>) -> Vec<DiagramEvent> {
    let mut seen: HashSet<ShapeId> = HashSet::new();
    let mut kept: Vec<DiagramEvent> = events
        .into_iter()
        .rev()
        .filter(|event| match event {
            DiagramEvent::GeometryChanged { shape, .. } => seen.insert(*shape),
            _ => true,
        })
        .collect();
    kept.reverse();
    kept
}

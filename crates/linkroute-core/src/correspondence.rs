//! Bidirectional mapping between diagram entities and engine handles.

use std::collections::HashMap;

use crate::engine::{ConnRefHandle, ObstacleHandle, PinHandle};
use crate::shapes::{ConnectionId, PortId, ShapeId};

/// Diagram identifier ↔ engine handle, for obstacles, pins and connections.
///
/// Each live entity maps to at most one handle and every handle maps back to
/// exactly one entity.
#[derive(Debug, Default, Clone)]
pub struct CorrespondenceTable {
    obstacles: HashMap<ShapeId, ObstacleHandle>,
    obstacle_owners: HashMap<ObstacleHandle, ShapeId>,
    pins: HashMap<(ShapeId, PortId), PinHandle>,
    pin_owners: HashMap<PinHandle, (ShapeId, PortId)>,
    connections: HashMap<ConnectionId, ConnRefHandle>,
    connection_owners: HashMap<ConnRefHandle, ConnectionId>,
}

impl CorrespondenceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Obstacles ---

    /// Record a shape's obstacle. Returns the handle it replaced, if any.
    pub fn bind_obstacle(&mut self, shape: ShapeId, handle: ObstacleHandle) -> Option<ObstacleHandle> {
        let old = self.obstacles.insert(shape, handle);
        if let Some(old) = old {
            self.obstacle_owners.remove(&old);
        }
        self.obstacle_owners.insert(handle, shape);
        old
    }

    /// Forget a shape's obstacle.
    pub fn unbind_obstacle(&mut self, shape: ShapeId) -> Option<ObstacleHandle> {
        let handle = self.obstacles.remove(&shape)?;
        self.obstacle_owners.remove(&handle);
        Some(handle)
    }

    /// The obstacle of a shape.
    pub fn obstacle(&self, shape: ShapeId) -> Option<ObstacleHandle> {
        self.obstacles.get(&shape).copied()
    }

    /// The shape owning an obstacle.
    pub fn shape_of(&self, handle: ObstacleHandle) -> Option<ShapeId> {
        self.obstacle_owners.get(&handle).copied()
    }

    // --- Pins ---

    /// Record a port's pin. Returns the handle it replaced, if any.
    pub fn bind_pin(&mut self, shape: ShapeId, port: PortId, handle: PinHandle) -> Option<PinHandle> {
        let key = (shape, port);
        let old = self.pins.insert(key.clone(), handle);
        if let Some(old) = old {
            self.pin_owners.remove(&old);
        }
        self.pin_owners.insert(handle, key);
        old
    }

    /// Forget a port's pin.
    pub fn unbind_pin(&mut self, shape: ShapeId, port: &str) -> Option<PinHandle> {
        let handle = self.pins.remove(&(shape, port.to_string()))?;
        self.pin_owners.remove(&handle);
        Some(handle)
    }

    /// The pin of a port.
    pub fn pin(&self, shape: ShapeId, port: &str) -> Option<PinHandle> {
        self.pins.get(&(shape, port.to_string())).copied()
    }

    /// The port owning a pin.
    pub fn port_of(&self, handle: PinHandle) -> Option<&(ShapeId, PortId)> {
        self.pin_owners.get(&handle)
    }

    /// All pins of a shape, keyed by port.
    pub fn pins_of(&self, shape: ShapeId) -> Vec<(PortId, PinHandle)> {
        let mut pins: Vec<(PortId, PinHandle)> = self
            .pins
            .iter()
            .filter(|((owner, _), _)| *owner == shape)
            .map(|((_, port), &handle)| (port.clone(), handle))
            .collect();
        pins.sort_by_key(|(_, handle)| *handle);
        pins
    }

    // --- Connections ---

    /// Record a connection's ConnRef. Returns the handle it replaced, if any.
    pub fn bind_connection(&mut self, connection: ConnectionId, handle: ConnRefHandle) -> Option<ConnRefHandle> {
        let old = self.connections.insert(connection, handle);
        if let Some(old) = old {
            self.connection_owners.remove(&old);
        }
        self.connection_owners.insert(handle, connection);
        old
    }

    /// Forget a connection's ConnRef.
    pub fn unbind_connection(&mut self, connection: ConnectionId) -> Option<ConnRefHandle> {
        let handle = self.connections.remove(&connection)?;
        self.connection_owners.remove(&handle);
        Some(handle)
    }

    /// The ConnRef of a connection.
    pub fn connection(&self, connection: ConnectionId) -> Option<ConnRefHandle> {
        self.connections.get(&connection).copied()
    }

    /// The connection owning a ConnRef.
    pub fn connection_of(&self, handle: ConnRefHandle) -> Option<ConnectionId> {
        self.connection_owners.get(&handle).copied()
    }

    /// All registered connections and their handles.
    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, ConnRefHandle)> + '_ {
        self.connections.iter().map(|(&id, &handle)| (id, handle))
    }

    // --- Whole table ---

    /// Number of registered obstacles.
    pub fn obstacle_count(&self) -> usize {
        self.obstacles.len()
    }

    /// Number of registered pins.
    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty() && self.pins.is_empty() && self.connections.is_empty()
    }

    /// Remove every entry, returning the handles in release order:
    /// connections, then pins, then obstacles.
    pub fn clear(&mut self) -> (Vec<ConnRefHandle>, Vec<PinHandle>, Vec<ObstacleHandle>) {
        let mut connections: Vec<ConnRefHandle> = self.connection_owners.drain().map(|(h, _)| h).collect();
        let mut pins: Vec<PinHandle> = self.pin_owners.drain().map(|(h, _)| h).collect();
        let mut obstacles: Vec<ObstacleHandle> = self.obstacle_owners.drain().map(|(h, _)| h).collect();
        self.connections.clear();
        self.pins.clear();
        self.obstacles.clear();
        connections.sort();
        pins.sort();
        obstacles.sort();
        (connections, pins, obstacles)
    }

    /// Check that both directions of every map agree.
    pub fn is_consistent(&self) -> bool {
        self.obstacles.len() == self.obstacle_owners.len()
            && self.pins.len() == self.pin_owners.len()
            && self.connections.len() == self.connection_owners.len()
            && self
                .obstacles
                .iter()
                .all(|(id, h)| self.obstacle_owners.get(h) == Some(id))
            && self.pins.iter().all(|(key, h)| self.pin_owners.get(h) == Some(key))
            && self
                .connections
                .iter()
                .all(|(id, h)| self.connection_owners.get(h) == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_obstacle_round_trip() {
        let mut table = CorrespondenceTable::new();
        let shape = Uuid::new_v4();
        let handle = ObstacleHandle::from_raw(1);
        assert!(table.bind_obstacle(shape, handle).is_none());
        assert_eq!(table.obstacle(shape), Some(handle));
        assert_eq!(table.shape_of(handle), Some(shape));
        assert_eq!(table.unbind_obstacle(shape), Some(handle));
        assert!(table.shape_of(handle).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_rebind_drops_old_reverse_entry() {
        let mut table = CorrespondenceTable::new();
        let conn = Uuid::new_v4();
        table.bind_connection(conn, ConnRefHandle::from_raw(1));
        let old = table.bind_connection(conn, ConnRefHandle::from_raw(2));
        assert_eq!(old, Some(ConnRefHandle::from_raw(1)));
        assert!(table.connection_of(ConnRefHandle::from_raw(1)).is_none());
        assert_eq!(table.connection_of(ConnRefHandle::from_raw(2)), Some(conn));
        assert!(table.is_consistent());
    }

    #[test]
    fn test_pins_are_scoped_by_shape() {
        let mut table = CorrespondenceTable::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        table.bind_pin(a, "port1".into(), PinHandle::from_raw(1));
        table.bind_pin(b, "port1".into(), PinHandle::from_raw(2));
        table.bind_pin(a, "port2".into(), PinHandle::from_raw(3));

        assert_eq!(table.pin(a, "port1"), Some(PinHandle::from_raw(1)));
        assert_eq!(table.pin(b, "port1"), Some(PinHandle::from_raw(2)));
        assert_eq!(
            table.pins_of(a),
            vec![
                ("port1".to_string(), PinHandle::from_raw(1)),
                ("port2".to_string(), PinHandle::from_raw(3)),
            ]
        );
        assert_eq!(table.port_of(PinHandle::from_raw(2)), Some(&(b, "port1".to_string())));
    }

    #[test]
    fn test_clear_returns_everything() {
        let mut table = CorrespondenceTable::new();
        let shape = Uuid::new_v4();
        table.bind_obstacle(shape, ObstacleHandle::from_raw(1));
        table.bind_pin(shape, "p".into(), PinHandle::from_raw(2));
        table.bind_connection(Uuid::new_v4(), ConnRefHandle::from_raw(3));

        let (conns, pins, obstacles) = table.clear();
        assert_eq!(conns.len() + pins.len() + obstacles.len(), 3);
        assert!(table.is_empty());
        assert!(table.is_consistent());
    }
}

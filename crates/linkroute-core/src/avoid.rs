//! Synchronization between the diagram and the geometry engine.
//!
//! [`AvoidRouter`] drains the diagram's change events once per update cycle,
//! keeps the engine's obstacles, pins and connectors in step with the
//! diagram, and writes recomputed routes back. Events that arrive while the
//! engine is still loading are queued and replayed in order once it is ready.

use std::collections::{HashMap, HashSet};

use kurbo::Rect;

use crate::cascade;
use crate::config::RoutingOptions;
use crate::correspondence::CorrespondenceTable;
use crate::diagram::Diagram;
use crate::engine::{
    BoxFuture, ConnRefHandle, EngineEndpoint, EngineError, EngineResult, GeometryEngine, PinAnchor,
};
use crate::events::{DiagramEvent, coalesce};
use crate::feedback::RouteFeedbackWriter;
use crate::shapes::{Connection, ConnectionId, Endpoint, Port, PortId, Shape, ShapeId};

/// Outcome of one update cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Cycle counter, incremented on every cycle.
    pub generation: u64,
    /// Whether a recompute pass ran.
    pub recomputed: bool,
    /// Size of the dirty set handed to the recompute pass.
    pub dirty: usize,
    /// Connections whose vertices were rewritten.
    pub updated: Vec<ConnectionId>,
    /// Connections deleted by the cascade policy.
    pub deleted: Vec<ConnectionId>,
    /// Shapes whose geometry the engine rejected.
    pub unroutable: Vec<ShapeId>,
    /// Events waiting for the engine to finish loading.
    pub queued: usize,
}

impl CycleReport {
    fn mark_unroutable(&mut self, shape: ShapeId) {
        if !self.unroutable.contains(&shape) {
            self.unroutable.push(shape);
        }
    }
}

/// Last registered state of a shape.
#[derive(Debug, Clone)]
struct ShapeMirror {
    shape: Shape,
    /// Whether the shape currently has an obstacle in the engine.
    routable: bool,
}

/// Keeps a [`GeometryEngine`] synchronized with a [`Diagram`].
pub struct AvoidRouter<E: GeometryEngine> {
    options: RoutingOptions,
    /// `None` while loading.
    engine: Option<E>,
    /// Events received before the engine was ready, in arrival order.
    queue: Vec<DiagramEvent>,
    table: CorrespondenceTable,
    shapes: HashMap<ShapeId, ShapeMirror>,
    connections: HashMap<ConnectionId, Connection>,
    /// Known connections that cannot be registered yet.
    parked: HashSet<ConnectionId>,
    /// Connections to reroute in the next pass.
    dirty: HashSet<ConnectionId>,
    generation: u64,
    passes: usize,
}

impl<E: GeometryEngine> AvoidRouter<E> {
    /// Create a router waiting for its engine.
    pub fn new(options: RoutingOptions) -> Self {
        Self {
            options,
            engine: None,
            queue: Vec::new(),
            table: CorrespondenceTable::new(),
            shapes: HashMap::new(),
            connections: HashMap::new(),
            parked: HashSet::new(),
            dirty: HashSet::new(),
            generation: 0,
            passes: 0,
        }
    }

    /// Start loading the engine.
    ///
    /// The caller drives the future and passes the engine to
    /// [`AvoidRouter::engine_ready`].
    pub fn initialize(&self) -> BoxFuture<'static, EngineResult<E>> {
        log::debug!("Loading geometry engine with {:?}", self.options);
        E::load(self.options)
    }

    /// Install the loaded engine, replay queued events and route.
    pub fn engine_ready(&mut self, engine: E, diagram: &mut Diagram) -> CycleReport {
        let queued = std::mem::take(&mut self.queue);
        log::info!("Geometry engine ready, replaying {} queued events", queued.len());
        self.engine = Some(engine);
        let mut replayed = CycleReport::default();
        for event in queued {
            self.apply(event, &mut replayed);
        }
        let mut report = self.process_cycle(diagram);
        for shape in replayed.unroutable {
            report.mark_unroutable(shape);
        }
        report
    }

    /// Enqueue every entity already in `diagram` as if it had just been added.
    ///
    /// Use this for diagrams whose outbox is empty, such as ones loaded from
    /// JSON. Entities the router already knows are skipped.
    pub fn attach(&mut self, diagram: &Diagram) {
        let shapes: Vec<DiagramEvent> = diagram
            .shapes_ordered()
            .map(|s| DiagramEvent::ShapeAdded(s.clone()))
            .collect();
        let connections: Vec<DiagramEvent> = diagram
            .connections_ordered()
            .map(|c| DiagramEvent::ConnectionAdded(c.clone()))
            .collect();
        log::debug!(
            "Attaching {} shapes and {} connections",
            shapes.len(),
            connections.len()
        );
        let mut report = CycleReport::default();
        for event in shapes.into_iter().chain(connections) {
            self.dispatch(event, &mut report);
        }
    }

    /// Run one update cycle.
    ///
    /// Drains the diagram's events (including deletions this cycle causes),
    /// updates the engine or queues the events, then runs at most one
    /// recompute pass and writes the new routes back.
    pub fn process_cycle(&mut self, diagram: &mut Diagram) -> CycleReport {
        self.generation += 1;
        let mut report = CycleReport {
            generation: self.generation,
            ..CycleReport::default()
        };

        loop {
            let events = diagram.drain_events();
            if events.is_empty() {
                break;
            }
            let events = coalesce(events);
            for event in &events {
                self.enforce_cascade(diagram, event, &mut report);
            }
            for event in events {
                self.dispatch(event, &mut report);
            }
        }

        if self.engine.is_some() {
            self.flush(diagram, &mut report);
        }
        report.queued = self.queue.len();
        report
    }

    /// Mark every registered connection for rerouting.
    pub fn route_all(&mut self) {
        let all: Vec<ConnectionId> = self.table.connections().map(|(id, _)| id).collect();
        self.dirty.extend(all);
    }

    /// Release every engine handle and forget all state.
    ///
    /// Returns the number of handles released.
    pub fn teardown(&mut self) -> usize {
        let (connections, pins, obstacles) = self.table.clear();
        let mut released = 0;
        if let Some(engine) = self.engine.as_mut() {
            for handle in connections {
                released += release(engine.unregister_connection(handle));
            }
            for handle in pins {
                released += release(engine.unregister_pin(handle));
            }
            for handle in obstacles {
                released += release(engine.unregister_obstacle(handle));
            }
        }
        self.queue.clear();
        self.shapes.clear();
        self.connections.clear();
        self.parked.clear();
        self.dirty.clear();
        log::info!("Router torn down, {} handles released", released);
        released
    }

    // --- Accessors ---

    /// The routing options.
    pub fn options(&self) -> &RoutingOptions {
        &self.options
    }

    /// The engine, once loaded.
    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    /// Whether the engine has loaded.
    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    /// The entity ↔ handle table.
    pub fn table(&self) -> &CorrespondenceTable {
        &self.table
    }

    /// Number of events waiting for the engine.
    pub fn queued_events(&self) -> usize {
        self.queue.len()
    }

    /// Number of recompute passes run so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Current cycle counter.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a connection is known but not registered.
    pub fn is_parked(&self, connection: ConnectionId) -> bool {
        self.parked.contains(&connection)
    }

    /// Whether a shape has an obstacle in the engine.
    pub fn is_routable(&self, shape: ShapeId) -> bool {
        self.shapes.get(&shape).is_some_and(|m| m.routable)
    }

    // --- Cascade policy ---

    /// Delete connections the event leaves dangling, against the live diagram.
    fn enforce_cascade(&mut self, diagram: &mut Diagram, event: &DiagramEvent, report: &mut CycleReport) {
        let doomed: Vec<ConnectionId> = match event {
            DiagramEvent::ShapeRemoved(shape) if diagram.shape(*shape).is_none() => {
                cascade::dependent_connections(diagram, *shape)
            }
            DiagramEvent::PortSetChanged { shape, removed, .. } if !removed.is_empty() => {
                cascade::orphaned_connections(diagram, *shape)
            }
            DiagramEvent::ConnectionAdded(connection) => {
                self.unresolved(diagram, connection.id())
            }
            DiagramEvent::EndpointChanged { connection, .. } => self.unresolved(diagram, *connection),
            _ => Vec::new(),
        };
        for id in doomed {
            if diagram.remove_connection(id).is_some() {
                log::debug!("Cascade deleted connection {}", id);
                report.deleted.push(id);
            }
        }
    }

    fn unresolved(&self, diagram: &Diagram, connection: ConnectionId) -> Vec<ConnectionId> {
        match diagram.connection(connection) {
            Some(c) if cascade::has_unresolved_endpoint(diagram, c) => {
                log::warn!("Connection {} has an unresolved endpoint", connection);
                vec![connection]
            }
            _ => Vec::new(),
        }
    }

    // --- Engine side ---

    fn dispatch(&mut self, event: DiagramEvent, report: &mut CycleReport) {
        if self.engine.is_some() {
            self.apply(event, report);
        } else {
            self.queue.push(event);
        }
    }

    fn apply(&mut self, event: DiagramEvent, report: &mut CycleReport) {
        log::debug!("Applying {:?}", event);
        match event {
            DiagramEvent::ShapeAdded(shape) => self.shape_added(shape, report),
            DiagramEvent::ShapeRemoved(id) => self.shape_removed(id),
            DiagramEvent::GeometryChanged { shape, bounds } => self.geometry_changed(shape, bounds, report),
            DiagramEvent::PortSetChanged { shape, added, removed } => {
                self.port_set_changed(shape, added, removed, report)
            }
            DiagramEvent::ConnectionAdded(connection) => {
                let id = connection.id();
                if self.connections.contains_key(&id) {
                    log::debug!("Connection {} already known", id);
                    return;
                }
                self.connections.insert(id, connection);
                self.register_connection(id);
            }
            DiagramEvent::ConnectionRemoved(id) => {
                self.connections.remove(&id);
                self.parked.remove(&id);
                self.dirty.remove(&id);
                self.unregister_connection(id);
            }
            DiagramEvent::EndpointChanged {
                connection,
                end,
                endpoint,
            } => {
                let Some(mirror) = self.connections.get_mut(&connection) else {
                    log::debug!("Endpoint change for unknown connection {}", connection);
                    return;
                };
                *mirror.endpoint_mut(end) = endpoint;
                self.unregister_connection(connection);
                self.register_connection(connection);
            }
        }
    }

    fn shape_added(&mut self, shape: Shape, report: &mut CycleReport) {
        let id = shape.id();
        if self.shapes.contains_key(&id) {
            log::debug!("Shape {} already known", id);
            return;
        }
        self.shapes.insert(
            id,
            ShapeMirror {
                shape,
                routable: false,
            },
        );
        if self.register_shape(id, report) {
            self.retry_parked(id);
        }
    }

    fn shape_removed(&mut self, id: ShapeId) {
        self.release_shape(id);
        self.shapes.remove(&id);
    }

    fn geometry_changed(&mut self, id: ShapeId, bounds: Rect, report: &mut CycleReport) {
        let Some(mirror) = self.shapes.get_mut(&id) else {
            log::debug!("Geometry change for unknown shape {}", id);
            return;
        };
        let previous = mirror.shape.bounds();
        mirror.shape.set_bounds(bounds);

        if !mirror.routable {
            if self.register_shape(id, report) {
                log::info!("Shape {} is routable again", id);
                self.retry_parked(id);
            }
            return;
        }

        let (Some(engine), Some(obstacle)) = (self.engine.as_mut(), self.table.obstacle(id)) else {
            return;
        };
        match engine.update_obstacle(obstacle, bounds) {
            Ok(()) => {
                let affected = engine.affected_by(obstacle, Some(previous));
                self.mark_bound_to(id);
                self.mark_affected(affected);
            }
            Err(EngineError::InvalidGeometry(msg)) => {
                log::warn!("Shape {} has invalid geometry, parking its connections: {}", id, msg);
                self.release_shape(id);
                report.mark_unroutable(id);
            }
            Err(err) => log::warn!("Failed to update obstacle for shape {}: {}", id, err),
        }
    }

    fn port_set_changed(&mut self, id: ShapeId, added: Vec<Port>, removed: Vec<PortId>, report: &mut CycleReport) {
        let Some(mirror) = self.shapes.get_mut(&id) else {
            log::debug!("Port change for unknown shape {}", id);
            return;
        };
        mirror.shape.ports.retain(|p| !removed.contains(&p.id));
        for port in added {
            if mirror.shape.port(&port.id).is_none() {
                mirror.shape.ports.push(port);
            }
        }
        if !mirror.routable {
            return;
        }
        let shape = mirror.shape.clone();
        let (Some(engine), Some(obstacle)) = (self.engine.as_mut(), self.table.obstacle(id)) else {
            return;
        };

        // Connections on removed ports are parked until their removal arrives.
        for port in &removed {
            let users: Vec<ConnectionId> = self
                .connections
                .values()
                .filter(|c| c.touches_port(id, port))
                .map(Connection::id)
                .collect();
            for conn in users {
                if let Some(handle) = self.table.unbind_connection(conn) {
                    release(engine.unregister_connection(handle));
                }
                self.dirty.remove(&conn);
                self.parked.insert(conn);
            }
            if let Some(pin) = self.table.unbind_pin(id, port) {
                release(engine.unregister_pin(pin));
            }
        }

        // Register new pins and re-anchor the ones whose slot moved.
        for port in &shape.ports {
            let Some(anchor) = anchor_of(&shape, &port.id) else {
                continue;
            };
            let result = match self.table.pin(id, &port.id) {
                Some(pin) => engine.update_pin(pin, anchor),
                None => engine.register_pin(obstacle, anchor).map(|pin| {
                    self.table.bind_pin(id, port.id.clone(), pin);
                }),
            };
            if let Err(err) = result {
                log::warn!("Port {} of shape {} cannot be registered: {}", port.id, id, err);
                self.release_shape(id);
                report.mark_unroutable(id);
                return;
            }
        }
        self.mark_bound_to(id);
        self.retry_parked(id);
    }

    /// Register a shape's obstacle and pins. Returns `false` if the engine
    /// rejected them, leaving the shape unroutable.
    fn register_shape(&mut self, id: ShapeId, report: &mut CycleReport) -> bool {
        let (Some(engine), Some(mirror)) = (self.engine.as_mut(), self.shapes.get_mut(&id)) else {
            return false;
        };
        let obstacle = match engine.register_obstacle(mirror.shape.bounds(), self.options.shape_buffer_distance) {
            Ok(obstacle) => obstacle,
            Err(err) => {
                log::warn!("Shape {} cannot be routed around: {}", id, err);
                mirror.routable = false;
                report.mark_unroutable(id);
                return false;
            }
        };
        self.table.bind_obstacle(id, obstacle);
        for port in &mirror.shape.ports {
            let registered = anchor_of(&mirror.shape, &port.id)
                .ok_or_else(|| EngineError::InvalidGeometry(format!("port {} has no anchor", port.id)))
                .and_then(|anchor| engine.register_pin(obstacle, anchor));
            match registered {
                Ok(pin) => {
                    self.table.bind_pin(id, port.id.clone(), pin);
                }
                Err(err) => {
                    log::warn!("Port {} of shape {} cannot be registered: {}", port.id, id, err);
                    self.release_shape(id);
                    report.mark_unroutable(id);
                    return false;
                }
            }
        }
        mirror.routable = true;
        let affected = engine.affected_by(obstacle, None);
        log::debug!("Registered shape {} as {:?}", id, obstacle);
        self.mark_affected(affected);
        true
    }

    /// Deregister a shape's connections, pins and obstacle, in that order.
    /// Its connections stay known and are parked.
    fn release_shape(&mut self, id: ShapeId) {
        if let Some(mirror) = self.shapes.get_mut(&id) {
            mirror.routable = false;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let bound: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.touches_shape(id))
            .map(Connection::id)
            .collect();
        for conn in bound {
            if let Some(handle) = self.table.unbind_connection(conn) {
                release(engine.unregister_connection(handle));
            }
            self.dirty.remove(&conn);
            self.parked.insert(conn);
        }
        for (port, pin) in self.table.pins_of(id) {
            self.table.unbind_pin(id, &port);
            release(engine.unregister_pin(pin));
        }
        if let Some(obstacle) = self.table.unbind_obstacle(id) {
            let affected = engine.affected_by(obstacle, None);
            release(engine.unregister_obstacle(obstacle));
            self.mark_affected(affected);
        }
    }

    fn resolve(&self, endpoint: &Endpoint) -> Option<EngineEndpoint> {
        match endpoint {
            Endpoint::Point(p) => Some(EngineEndpoint::Point(*p)),
            Endpoint::Shape { shape, port } => {
                if !self.is_routable(*shape) {
                    return None;
                }
                match port {
                    Some(port) => self.table.pin(*shape, port).map(EngineEndpoint::Pin),
                    None => self.table.obstacle(*shape).map(EngineEndpoint::Obstacle),
                }
            }
        }
    }

    /// Register a known connection, or park it if an end does not resolve.
    fn register_connection(&mut self, id: ConnectionId) {
        let Some(connection) = self.connections.get(&id) else {
            return;
        };
        let ends = (self.resolve(&connection.source), self.resolve(&connection.target));
        let (Some(engine), (Some(source), Some(target))) = (self.engine.as_mut(), ends) else {
            log::debug!("Parking connection {}", id);
            self.parked.insert(id);
            return;
        };
        match engine.register_connection(source, target) {
            Ok(handle) => {
                self.table.bind_connection(id, handle);
                self.parked.remove(&id);
                self.dirty.insert(id);
            }
            Err(err) => {
                log::warn!("Connection {} cannot be registered: {}", id, err);
                self.parked.insert(id);
            }
        }
    }

    fn unregister_connection(&mut self, id: ConnectionId) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if let Some(handle) = self.table.unbind_connection(id) {
            release(engine.unregister_connection(handle));
        }
    }

    fn retry_parked(&mut self, shape: ShapeId) {
        let waiting: Vec<ConnectionId> = self
            .parked
            .iter()
            .filter(|id| self.connections.get(*id).is_some_and(|c| c.touches_shape(shape)))
            .copied()
            .collect();
        for id in waiting {
            self.register_connection(id);
        }
    }

    fn mark_bound_to(&mut self, shape: ShapeId) {
        for (id, _) in self.table.connections() {
            if self.connections.get(&id).is_some_and(|c| c.touches_shape(shape)) {
                self.dirty.insert(id);
            }
        }
    }

    /// Mark the engine's affected set dirty, or everything when it has none.
    fn mark_affected(&mut self, affected: Option<Vec<ConnRefHandle>>) {
        match affected {
            Some(handles) => {
                for handle in handles {
                    if let Some(id) = self.table.connection_of(handle) {
                        self.dirty.insert(id);
                    }
                }
            }
            None => self.route_all(),
        }
    }

    /// Run one recompute pass over the dirty set and write the results back.
    fn flush(&mut self, diagram: &mut Diagram, report: &mut CycleReport) {
        let dirty = std::mem::take(&mut self.dirty);
        report.dirty = dirty.len();
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if dirty.is_empty() {
            return;
        }
        for id in &dirty {
            if let Some(handle) = self.table.connection(*id) {
                if let Err(err) = engine.request_route(handle) {
                    log::warn!("Failed to request route for {}: {}", id, err);
                }
            }
        }
        let routes = engine.recompute();
        self.passes += 1;
        report.recomputed = true;

        let mut updated: Vec<ConnectionId> = routes
            .into_iter()
            .filter_map(|(handle, route)| {
                let id = self.table.connection_of(handle)?;
                RouteFeedbackWriter::apply(diagram, id, &route).then_some(id)
            })
            .collect();
        updated.sort();
        log::debug!(
            "Cycle {}: {} dirty, {} routes updated",
            report.generation,
            report.dirty,
            updated.len()
        );
        report.updated = updated;
    }
}

fn anchor_of(shape: &Shape, port: &str) -> Option<PinAnchor> {
    let (x_fraction, y_fraction, group) = shape.port_anchor(port)?;
    Some(PinAnchor {
        x_fraction,
        y_fraction,
        group,
    })
}

/// Count a deregistration, logging failures.
fn release(result: EngineResult<()>) -> usize {
    match result {
        Ok(()) => 1,
        Err(err) => {
            log::warn!("Failed to release engine handle: {}", err);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ObstacleHandle, PinHandle, RouteMap};
    use crate::shapes::PortGroup;
    use kurbo::{Point, Vec2};
    use linkroute_router::is_valid_rect;

    /// Engine double that records calls and has no affected-set query.
    #[derive(Debug, Default)]
    struct RecordingEngine {
        next: u64,
        calls: Vec<String>,
        obstacles: HashMap<ObstacleHandle, Rect>,
        pins: HashSet<PinHandle>,
        connections: HashSet<ConnRefHandle>,
        requested: Vec<ConnRefHandle>,
        recomputes: usize,
        /// Pins accepted before `register_pin` starts failing.
        pin_budget: Option<usize>,
    }

    impl RecordingEngine {
        fn next(&mut self) -> u64 {
            self.next += 1;
            self.next
        }
    }

    impl GeometryEngine for RecordingEngine {
        fn load(_options: RoutingOptions) -> BoxFuture<'static, EngineResult<Self>> {
            Box::pin(async { Ok(RecordingEngine::default()) })
        }

        fn register_obstacle(&mut self, bounds: Rect, _buffer: f64) -> EngineResult<ObstacleHandle> {
            if !is_valid_rect(bounds) {
                return Err(EngineError::InvalidGeometry(format!("{:?}", bounds)));
            }
            let handle = ObstacleHandle::from_raw(self.next());
            self.obstacles.insert(handle, bounds);
            self.calls.push("register_obstacle".into());
            Ok(handle)
        }

        fn update_obstacle(&mut self, handle: ObstacleHandle, bounds: Rect) -> EngineResult<()> {
            if !is_valid_rect(bounds) {
                return Err(EngineError::InvalidGeometry(format!("{:?}", bounds)));
            }
            self.obstacles.insert(handle, bounds);
            self.calls.push(format!("update_obstacle {}", bounds.x0));
            Ok(())
        }

        fn unregister_obstacle(&mut self, handle: ObstacleHandle) -> EngineResult<()> {
            self.obstacles.remove(&handle);
            self.calls.push("unregister_obstacle".into());
            Ok(())
        }

        fn register_pin(&mut self, _obstacle: ObstacleHandle, _anchor: PinAnchor) -> EngineResult<PinHandle> {
            if let Some(budget) = self.pin_budget.as_mut() {
                if *budget == 0 {
                    return Err(EngineError::InvalidGeometry("pin rejected".into()));
                }
                *budget -= 1;
            }
            let handle = PinHandle::from_raw(self.next());
            self.pins.insert(handle);
            self.calls.push("register_pin".into());
            Ok(handle)
        }

        fn update_pin(&mut self, _handle: PinHandle, _anchor: PinAnchor) -> EngineResult<()> {
            Ok(())
        }

        fn unregister_pin(&mut self, handle: PinHandle) -> EngineResult<()> {
            self.pins.remove(&handle);
            self.calls.push("unregister_pin".into());
            Ok(())
        }

        fn register_connection(
            &mut self,
            _source: EngineEndpoint,
            _target: EngineEndpoint,
        ) -> EngineResult<ConnRefHandle> {
            let handle = ConnRefHandle::from_raw(self.next());
            self.connections.insert(handle);
            self.calls.push("register_connection".into());
            Ok(handle)
        }

        fn unregister_connection(&mut self, handle: ConnRefHandle) -> EngineResult<()> {
            self.connections.remove(&handle);
            self.calls.push("unregister_connection".into());
            Ok(())
        }

        fn request_route(&mut self, handle: ConnRefHandle) -> EngineResult<()> {
            self.requested.push(handle);
            Ok(())
        }

        fn recompute(&mut self) -> RouteMap {
            self.recomputes += 1;
            std::mem::take(&mut self.requested)
                .into_iter()
                .map(|h| {
                    let route = vec![Point::ZERO, Point::new(5.0, 0.0), Point::new(5.0, 5.0)];
                    (h, route)
                })
                .collect()
        }
    }

    fn ready(diagram: &mut Diagram) -> AvoidRouter<RecordingEngine> {
        let mut router = AvoidRouter::new(RoutingOptions::default());
        let engine = pollster::block_on(router.initialize()).unwrap();
        router.engine_ready(engine, diagram);
        router
    }

    fn square(x: f64, y: f64) -> Shape {
        Shape::new(Point::new(x, y), 100.0, 100.0)
    }

    #[test]
    fn test_events_queue_until_ready() {
        let mut diagram = Diagram::new();
        let mut router: AvoidRouter<RecordingEngine> = AvoidRouter::new(RoutingOptions::default());

        let a = diagram.add_shape(square(0.0, 0.0));
        let b = diagram.add_shape(square(300.0, 0.0));
        let conn = diagram.connect(Endpoint::shape(a), Endpoint::shape(b));
        let report = router.process_cycle(&mut diagram);
        assert_eq!(report.queued, 3);
        assert!(!report.recomputed);
        assert!(router.table().is_empty());

        let engine = pollster::block_on(router.initialize()).unwrap();
        let report = router.engine_ready(engine, &mut diagram);
        assert!(report.recomputed);
        assert_eq!(report.updated, vec![conn]);
        assert_eq!(router.queued_events(), 0);
        assert_eq!(
            router.engine().unwrap().calls,
            vec!["register_obstacle", "register_obstacle", "register_connection"]
        );
        assert_eq!(diagram.connection(conn).unwrap().vertices, vec![Point::new(5.0, 0.0)]);
    }

    #[test]
    fn test_no_affected_set_reroutes_everything() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(square(0.0, 0.0));
        let b = diagram.add_shape(square(300.0, 0.0));
        let c = diagram.add_shape(square(0.0, 300.0));
        let d = diagram.add_shape(square(300.0, 300.0));
        let far = diagram.add_shape(square(900.0, 900.0));
        diagram.connect(Endpoint::shape(a), Endpoint::shape(b));
        diagram.connect(Endpoint::shape(c), Endpoint::shape(d));
        let mut router = ready(&mut diagram);

        diagram.translate_shape(far, Vec2::new(10.0, 0.0));
        let report = router.process_cycle(&mut diagram);
        assert_eq!(report.dirty, 2);
        assert_eq!(report.updated.len(), 2);
    }

    #[test]
    fn test_geometry_changes_coalesce_into_one_pass() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(square(0.0, 0.0));
        let b = diagram.add_shape(square(300.0, 0.0));
        diagram.connect(Endpoint::shape(a), Endpoint::shape(b));
        let mut router = ready(&mut diagram);
        let passes = router.passes();

        for x in 1..=5 {
            diagram.set_bounds(a, Rect::new(x as f64, 0.0, x as f64 + 100.0, 100.0));
        }
        let report = router.process_cycle(&mut diagram);
        assert!(report.recomputed);
        assert_eq!(router.passes(), passes + 1);
        let updates: Vec<&String> = router
            .engine()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.starts_with("update_obstacle"))
            .collect();
        assert_eq!(updates, vec!["update_obstacle 5"]);
    }

    #[test]
    fn test_empty_cycle_skips_recompute() {
        let mut diagram = Diagram::new();
        let mut router = ready(&mut diagram);
        let report = router.process_cycle(&mut diagram);
        assert!(!report.recomputed);
        assert_eq!(router.engine().unwrap().recomputes, 0);
        assert_eq!(report.generation, router.generation());
    }

    #[test]
    fn test_cascade_runs_while_loading() {
        let mut diagram = Diagram::new();
        let mut router: AvoidRouter<RecordingEngine> = AvoidRouter::new(RoutingOptions::default());
        let a = diagram.add_shape(square(0.0, 0.0));
        let b = diagram.add_shape(square(300.0, 0.0));
        let conn = diagram.connect(Endpoint::shape(a), Endpoint::shape(b));
        router.process_cycle(&mut diagram);

        diagram.remove_shape(a);
        let report = router.process_cycle(&mut diagram);
        assert_eq!(report.deleted, vec![conn]);
        assert!(diagram.connection(conn).is_none());

        let engine = pollster::block_on(router.initialize()).unwrap();
        router.engine_ready(engine, &mut diagram);
        let engine = router.engine().unwrap();
        assert_eq!(engine.obstacles.len(), 1);
        assert!(engine.connections.is_empty());
        assert_eq!(router.table().connection_count(), 0);
    }

    #[test]
    fn test_unresolved_port_is_deleted() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(square(0.0, 0.0).with_ports([Port::new("port1", PortGroup::Top)]));
        let b = diagram.add_shape(square(300.0, 0.0));
        let mut router = ready(&mut diagram);

        let conn = diagram.connect(Endpoint::port(a, "nope"), Endpoint::shape(b));
        let report = router.process_cycle(&mut diagram);
        assert_eq!(report.deleted, vec![conn]);
        assert!(router.engine().unwrap().connections.is_empty());
        assert!(!router.is_parked(conn));
    }

    #[test]
    fn test_invalid_geometry_parks_and_recovers() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(square(0.0, 0.0));
        let b = diagram.add_shape(square(300.0, 0.0));
        let conn = diagram.connect(Endpoint::shape(a), Endpoint::shape(b));
        let mut router = ready(&mut diagram);

        diagram.set_bounds(a, Rect::new(0.0, 0.0, 0.0, 100.0));
        let report = router.process_cycle(&mut diagram);
        assert_eq!(report.unroutable, vec![a]);
        assert!(router.is_parked(conn));
        assert!(!router.is_routable(a));
        assert!(router.table().obstacle(a).is_none());
        assert!(diagram.connection(conn).is_some());

        diagram.set_bounds(a, Rect::new(0.0, 0.0, 100.0, 100.0));
        let report = router.process_cycle(&mut diagram);
        assert!(report.unroutable.is_empty());
        assert!(!router.is_parked(conn));
        assert!(router.table().connection(conn).is_some());
        assert!(report.updated.contains(&conn));
    }

    #[test]
    fn test_port_set_changes_track_pins() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(square(0.0, 0.0));
        let mut router = ready(&mut diagram);

        diagram.add_port(a, Port::new("p1", PortGroup::Top));
        diagram.add_port(a, Port::new("p2", PortGroup::Top));
        router.process_cycle(&mut diagram);
        assert_eq!(router.table().pins_of(a).len(), 2);
        assert_eq!(router.engine().unwrap().pins.len(), 2);

        diagram.remove_port(a, "p1");
        router.process_cycle(&mut diagram);
        assert_eq!(router.table().pins_of(a).len(), 1);
        assert_eq!(router.engine().unwrap().pins.len(), 1);
    }

    #[test]
    fn test_rejected_new_pin_makes_shape_unroutable() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(square(0.0, 0.0).with_ports([Port::new("p1", PortGroup::Top)]));
        let b = diagram.add_shape(square(300.0, 0.0));
        let mut router: AvoidRouter<RecordingEngine> = AvoidRouter::new(RoutingOptions::default());
        let mut engine = pollster::block_on(router.initialize()).unwrap();
        engine.pin_budget = Some(1);
        router.engine_ready(engine, &mut diagram);
        assert_eq!(router.table().pins_of(a).len(), 1);

        diagram.add_port(a, Port::new("p2", PortGroup::Top));
        let conn = diagram.connect(Endpoint::port(a, "p2"), Endpoint::shape(b));
        let report = router.process_cycle(&mut diagram);

        assert_eq!(report.unroutable, vec![a]);
        assert!(!router.is_routable(a));
        assert!(router.is_parked(conn));
        assert!(router.table().pins_of(a).is_empty());
        assert!(router.table().obstacle(a).is_none());
        let engine = router.engine().unwrap();
        assert!(engine.pins.is_empty());
        assert_eq!(engine.obstacles.len(), 1);
        assert!(engine.connections.is_empty());
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(square(0.0, 0.0).with_ports([Port::new("p", PortGroup::Right)]));
        let b = diagram.add_shape(square(300.0, 0.0));
        diagram.connect(Endpoint::port(a, "p"), Endpoint::shape(b));
        let mut router = ready(&mut diagram);

        assert_eq!(router.teardown(), 4);
        assert!(router.table().is_empty());
        let engine = router.engine().unwrap();
        assert!(engine.obstacles.is_empty());
        assert!(engine.pins.is_empty());
        assert!(engine.connections.is_empty());
    }

    #[test]
    fn test_attach_existing_diagram() {
        let mut diagram = Diagram::new();
        let a = diagram.add_shape(square(0.0, 0.0));
        let b = diagram.add_shape(square(300.0, 0.0));
        diagram.connect(Endpoint::shape(a), Endpoint::shape(b));
        let json = diagram.to_json().unwrap();
        let mut loaded = Diagram::from_json(&json).unwrap();

        let mut router: AvoidRouter<RecordingEngine> = AvoidRouter::new(RoutingOptions::default());
        router.attach(&loaded);
        assert_eq!(router.queued_events(), 3);
        let engine = pollster::block_on(router.initialize()).unwrap();
        let report = router.engine_ready(engine, &mut loaded);
        assert_eq!(report.updated.len(), 1);
        assert_eq!(router.table().obstacle_count(), 2);
    }
}

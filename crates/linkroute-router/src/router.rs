//! Router registry: obstacles, pins and connectors.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use kurbo::{Point, Rect};
use thiserror::Error;

use crate::geometry::{Side, is_valid_rect, path_touches_rect};
use crate::nudge;
use crate::visibility::{self, Exit};

/// Router errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouterError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("Unknown shape: {0:?}")]
    UnknownShape(ShapeRef),
    #[error("Unknown pin: {0:?}")]
    UnknownPin(PinRef),
    #[error("Unknown connector: {0:?}")]
    UnknownConnector(ConnRef),
    #[error("Invalid router options: {0}")]
    InvalidOptions(String),
}

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Rebuild a handle from its raw value.
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw value of this handle.
            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

handle!(
    /// A registered obstacle.
    ShapeRef
);
handle!(
    /// A connection pin anchored to an obstacle.
    PinRef
);
handle!(
    /// A registered connector.
    ConnRef
);

/// Tuning options for the router.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouterOptions {
    /// Default distance obstacles are inflated by.
    pub shape_buffer_distance: f64,
    /// Separation enforced between parallel segments of different connectors.
    pub ideal_nudging_distance: f64,
    /// Minimum straight run out of a pin before the first bend.
    pub port_overflow: f64,
    /// Cost of one bend, in layout units of length.
    pub segment_penalty: f64,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            shape_buffer_distance: 20.0,
            ideal_nudging_distance: 10.0,
            port_overflow: 10.0,
            segment_penalty: 50.0,
        }
    }
}

impl RouterOptions {
    /// Reject negative or non-finite values.
    pub fn validate(&self) -> RouterResult<()> {
        let fields = [
            ("shape_buffer_distance", self.shape_buffer_distance),
            ("ideal_nudging_distance", self.ideal_nudging_distance),
            ("port_overflow", self.port_overflow),
            ("segment_penalty", self.segment_penalty),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(RouterError::InvalidOptions(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Where a pin sits on its obstacle, relative to the obstacle's bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinPlacement {
    /// 0.0 = left edge, 1.0 = right edge.
    pub x_fraction: f64,
    /// 0.0 = top edge, 1.0 = bottom edge.
    pub y_fraction: f64,
    /// Side the route leaves through.
    pub side: Side,
}

impl PinPlacement {
    /// Create a new placement.
    pub fn new(x_fraction: f64, y_fraction: f64, side: Side) -> Self {
        Self {
            x_fraction,
            y_fraction,
            side,
        }
    }

    /// The absolute attach point on `bounds`.
    pub fn attach_point(&self, bounds: Rect) -> Point {
        Point::new(
            bounds.x0 + bounds.width() * self.x_fraction,
            bounds.y0 + bounds.height() * self.y_fraction,
        )
    }

    fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.x_fraction) && (0.0..=1.0).contains(&self.y_fraction)
    }
}

/// One end of a connector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnEnd {
    /// Bound to a specific pin.
    Pin(PinRef),
    /// Bound to an obstacle, leaving through whichever side routes best.
    Shape(ShapeRef),
    /// A free-floating point.
    Point(Point),
}

#[derive(Debug, Clone)]
struct Obstacle {
    bounds: Rect,
    buffer: f64,
}

impl Obstacle {
    fn inflated(&self) -> Rect {
        self.bounds.inflate(self.buffer, self.buffer)
    }
}

#[derive(Debug, Clone)]
struct Pin {
    shape: ShapeRef,
    placement: PinPlacement,
}

#[derive(Debug, Clone)]
struct Connector {
    source: ConnEnd,
    target: ConnEnd,
    route: Vec<Point>,
}

impl Connector {
    fn ends(&self) -> [ConnEnd; 2] {
        [self.source, self.target]
    }
}

/// The routing engine.
#[derive(Debug, Clone)]
pub struct Router {
    options: RouterOptions,
    next_id: u64,
    shapes: BTreeMap<ShapeRef, Obstacle>,
    pins: BTreeMap<PinRef, Pin>,
    connectors: BTreeMap<ConnRef, Connector>,
    /// Connectors waiting for the next transaction.
    invalid: BTreeSet<ConnRef>,
    /// Number of transactions that did routing work.
    passes: usize,
}

impl Router {
    /// Create a router with the given options.
    pub fn new(options: RouterOptions) -> RouterResult<Self> {
        options.validate()?;
        Ok(Self {
            options,
            next_id: 1,
            shapes: BTreeMap::new(),
            pins: BTreeMap::new(),
            connectors: BTreeMap::new(),
            invalid: BTreeSet::new(),
            passes: 0,
        })
    }

    /// Load a router asynchronously.
    ///
    /// The returned future owns everything it needs, so it can be stored and
    /// polled later by whatever drives the host's event loop.
    pub fn load(options: RouterOptions) -> impl Future<Output = RouterResult<Router>> + 'static {
        async move {
            let router = Router::new(options)?;
            log::info!("Router loaded with {:?}", options);
            Ok(router)
        }
    }

    /// The router options.
    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // --- Shapes ---

    /// Register an obstacle inflated by `buffer`.
    pub fn add_shape(&mut self, bounds: Rect, buffer: f64) -> RouterResult<ShapeRef> {
        if !is_valid_rect(bounds) {
            return Err(RouterError::InvalidGeometry(format!(
                "obstacle bounds must be finite with positive size, got {:?}",
                bounds
            )));
        }
        if !buffer.is_finite() || buffer < 0.0 {
            return Err(RouterError::InvalidGeometry(format!(
                "buffer distance must be non-negative, got {}",
                buffer
            )));
        }
        let id = ShapeRef(self.next());
        self.shapes.insert(id, Obstacle { bounds, buffer });
        let affected = self.affected_by(id, None)?;
        self.invalid.extend(affected);
        Ok(id)
    }

    /// Move or resize an obstacle. Connectors it affects are invalidated.
    pub fn move_shape(&mut self, id: ShapeRef, bounds: Rect) -> RouterResult<()> {
        if !is_valid_rect(bounds) {
            return Err(RouterError::InvalidGeometry(format!(
                "obstacle bounds must be finite with positive size, got {:?}",
                bounds
            )));
        }
        let obstacle = self
            .shapes
            .get_mut(&id)
            .ok_or(RouterError::UnknownShape(id))?;
        let previous = std::mem::replace(&mut obstacle.bounds, bounds);
        let affected = self.affected_by(id, Some(previous))?;
        self.invalid.extend(affected);
        Ok(())
    }

    /// Remove an obstacle together with its pins.
    ///
    /// Connectors still bound to it keep their last attach point as a free end.
    pub fn remove_shape(&mut self, id: ShapeRef) -> RouterResult<()> {
        let affected = self.affected_by(id, None)?;
        let pins: Vec<PinRef> = self.pins_on(id);
        for pin in pins {
            self.remove_pin(pin)?;
        }
        self.detach_ends(|end| *end == ConnEnd::Shape(id));
        self.shapes.remove(&id);
        self.invalid
            .extend(affected.into_iter().filter(|c| self.connectors.contains_key(c)));
        Ok(())
    }

    /// Current (uninflated) bounds of an obstacle.
    pub fn shape_bounds(&self, id: ShapeRef) -> Option<Rect> {
        self.shapes.get(&id).map(|o| o.bounds)
    }

    /// Bounds of an obstacle including its buffer.
    pub fn inflated_bounds(&self, id: ShapeRef) -> Option<Rect> {
        self.shapes.get(&id).map(Obstacle::inflated)
    }

    /// Pins anchored to an obstacle.
    pub fn pins_on(&self, id: ShapeRef) -> Vec<PinRef> {
        self.pins
            .iter()
            .filter(|(_, pin)| pin.shape == id)
            .map(|(&pin_id, _)| pin_id)
            .collect()
    }

    // --- Pins ---

    /// Anchor a pin to an obstacle.
    pub fn add_pin(&mut self, shape: ShapeRef, placement: PinPlacement) -> RouterResult<PinRef> {
        if !self.shapes.contains_key(&shape) {
            return Err(RouterError::UnknownShape(shape));
        }
        if !placement.is_valid() {
            return Err(RouterError::InvalidGeometry(format!(
                "pin placement must lie within the shape, got {:?}",
                placement
            )));
        }
        let id = PinRef(self.next());
        self.pins.insert(id, Pin { shape, placement });
        Ok(id)
    }

    /// Re-anchor a pin. Connectors using it are invalidated.
    pub fn move_pin(&mut self, id: PinRef, placement: PinPlacement) -> RouterResult<()> {
        if !placement.is_valid() {
            return Err(RouterError::InvalidGeometry(format!(
                "pin placement must lie within the shape, got {:?}",
                placement
            )));
        }
        let pin = self.pins.get_mut(&id).ok_or(RouterError::UnknownPin(id))?;
        if pin.placement == placement {
            return Ok(());
        }
        pin.placement = placement;
        let users = self.connectors_using(|end| *end == ConnEnd::Pin(id));
        self.invalid.extend(users);
        Ok(())
    }

    /// Remove a pin. Connectors still bound to it keep its last position as a free end.
    pub fn remove_pin(&mut self, id: PinRef) -> RouterResult<()> {
        if !self.pins.contains_key(&id) {
            return Err(RouterError::UnknownPin(id));
        }
        self.detach_ends(|end| *end == ConnEnd::Pin(id));
        self.pins.remove(&id);
        Ok(())
    }

    /// Absolute position of a pin.
    pub fn pin_position(&self, id: PinRef) -> Option<Point> {
        let pin = self.pins.get(&id)?;
        let bounds = self.shapes.get(&pin.shape)?.bounds;
        Some(pin.placement.attach_point(bounds))
    }

    // --- Connectors ---

    /// Register a connector. It is routed by the next transaction.
    pub fn add_connector(&mut self, source: ConnEnd, target: ConnEnd) -> RouterResult<ConnRef> {
        self.check_end(source)?;
        self.check_end(target)?;
        let id = ConnRef(self.next());
        self.connectors.insert(
            id,
            Connector {
                source,
                target,
                route: Vec::new(),
            },
        );
        self.invalid.insert(id);
        Ok(id)
    }

    /// Remove a connector.
    pub fn remove_connector(&mut self, id: ConnRef) -> RouterResult<()> {
        self.connectors
            .remove(&id)
            .ok_or(RouterError::UnknownConnector(id))?;
        self.invalid.remove(&id);
        Ok(())
    }

    /// Ask for a connector to be rerouted by the next transaction.
    pub fn invalidate(&mut self, id: ConnRef) -> RouterResult<()> {
        if !self.connectors.contains_key(&id) {
            return Err(RouterError::UnknownConnector(id));
        }
        self.invalid.insert(id);
        Ok(())
    }

    /// Last computed route of a connector.
    ///
    /// Empty when no route avoiding every shape body exists.
    pub fn route(&self, id: ConnRef) -> Option<&[Point]> {
        self.connectors.get(&id).map(|c| c.route.as_slice())
    }

    /// Connectors whose route depends on an obstacle.
    ///
    /// These are the connectors bound to the obstacle or its pins, plus every
    /// connector whose current route touches the obstacle's inflated bounds,
    /// now or at `previous` bounds.
    pub fn affected_by(&self, id: ShapeRef, previous: Option<Rect>) -> RouterResult<Vec<ConnRef>> {
        let obstacle = self.shapes.get(&id).ok_or(RouterError::UnknownShape(id))?;
        let current = obstacle.inflated();
        let before = previous.map(|r| r.inflate(obstacle.buffer, obstacle.buffer));
        let pins: BTreeSet<PinRef> = self.pins_on(id).into_iter().collect();
        Ok(self
            .connectors
            .iter()
            .filter(|(_, c)| {
                let bound = c.ends().iter().any(|end| match end {
                    ConnEnd::Shape(s) => *s == id,
                    ConnEnd::Pin(p) => pins.contains(p),
                    ConnEnd::Point(_) => false,
                });
                bound
                    || path_touches_rect(&c.route, current)
                    || before.is_some_and(|r| path_touches_rect(&c.route, r))
            })
            .map(|(&conn_id, _)| conn_id)
            .collect())
    }

    /// Number of registered obstacles.
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Number of registered pins.
    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    /// Number of registered connectors.
    pub fn connector_count(&self) -> usize {
        self.connectors.len()
    }

    /// Number of transactions that did routing work.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Whether any connector is waiting for a route.
    pub fn has_pending(&self) -> bool {
        !self.invalid.is_empty()
    }

    /// Route every invalidated connector in one pass.
    ///
    /// Returns the routes that changed, including connectors moved by the
    /// nudging step.
    pub fn process_transaction(&mut self) -> BTreeMap<ConnRef, Vec<Point>> {
        if self.invalid.is_empty() {
            return BTreeMap::new();
        }
        self.passes += 1;
        let invalid = std::mem::take(&mut self.invalid);
        let obstacles: Vec<Rect> = self.shapes.values().map(Obstacle::inflated).collect();
        let bodies: Vec<Rect> = self.shapes.values().map(|o| o.bounds).collect();

        let mut routes: BTreeMap<ConnRef, Vec<Point>> = self
            .connectors
            .iter()
            .map(|(&id, c)| (id, c.route.clone()))
            .collect();
        for &id in &invalid {
            let Some(connector) = self.connectors.get(&id) else {
                continue;
            };
            let path = self.compute_route(connector, &obstacles, &bodies).unwrap_or_else(|| {
                log::warn!("No obstacle-free route for connector {:?}, leaving it unrouted", id);
                Vec::new()
            });
            routes.insert(id, path);
        }

        let nudged = nudge::separate(&mut routes, &obstacles, self.options.ideal_nudging_distance);

        let mut changed = BTreeMap::new();
        for (id, path) in routes {
            let Some(connector) = self.connectors.get_mut(&id) else {
                continue;
            };
            if invalid.contains(&id) || connector.route != path {
                changed.insert(id, path.clone());
                connector.route = path;
            }
        }
        log::debug!(
            "Routing pass {}: {} invalidated, {} nudged, {} changed",
            self.passes,
            invalid.len(),
            nudged.len(),
            changed.len()
        );
        changed
    }

    /// Route around the inflated obstacles, or around the bare bodies with
    /// shortened stubs when a neighbour crowds an end.
    fn compute_route(&self, connector: &Connector, obstacles: &[Rect], bodies: &[Rect]) -> Option<Vec<Point>> {
        let sources = self.exits(connector.source);
        let targets = self.exits(connector.target);
        let penalty = self.options.segment_penalty;
        if let Some(path) = visibility::route(&sources, &targets, obstacles, penalty) {
            return Some(path);
        }
        let fit = |exits: Vec<Exit>, own: Option<Rect>| -> Vec<Exit> {
            exits.into_iter().map(|e| e.shortened(own, bodies)).collect()
        };
        let sources = fit(sources, self.end_bounds(connector.source));
        let targets = fit(targets, self.end_bounds(connector.target));
        let path = visibility::route(&sources, &targets, bodies, penalty)?;
        log::debug!("Routed through buffer zones with {} points", path.len());
        Some(path)
    }

    /// Body of the obstacle an end is attached to.
    fn end_bounds(&self, end: ConnEnd) -> Option<Rect> {
        let shape = match end {
            ConnEnd::Shape(id) => id,
            ConnEnd::Pin(id) => self.pins.get(&id)?.shape,
            ConnEnd::Point(_) => return None,
        };
        self.shapes.get(&shape).map(|o| o.bounds)
    }

    fn exits(&self, end: ConnEnd) -> Vec<Exit> {
        match end {
            ConnEnd::Point(p) => vec![Exit::free(p)],
            ConnEnd::Shape(id) => {
                let Some(obstacle) = self.shapes.get(&id) else {
                    return Vec::new();
                };
                Side::ALL
                    .iter()
                    .map(|&side| {
                        let attach = side.midpoint(obstacle.bounds);
                        Exit {
                            attach,
                            stub: attach + side.normal() * obstacle.buffer,
                            outward: Some(side),
                        }
                    })
                    .collect()
            }
            ConnEnd::Pin(id) => {
                let Some(pin) = self.pins.get(&id) else {
                    return Vec::new();
                };
                let Some(obstacle) = self.shapes.get(&pin.shape) else {
                    return Vec::new();
                };
                let attach = pin.placement.attach_point(obstacle.bounds);
                let run = obstacle.buffer.max(self.options.port_overflow);
                vec![Exit {
                    attach,
                    stub: attach + pin.placement.side.normal() * run,
                    outward: Some(pin.placement.side),
                }]
            }
        }
    }

    fn check_end(&self, end: ConnEnd) -> RouterResult<()> {
        match end {
            ConnEnd::Pin(id) if !self.pins.contains_key(&id) => Err(RouterError::UnknownPin(id)),
            ConnEnd::Shape(id) if !self.shapes.contains_key(&id) => {
                Err(RouterError::UnknownShape(id))
            }
            ConnEnd::Point(p) if !(p.x.is_finite() && p.y.is_finite()) => Err(
                RouterError::InvalidGeometry(format!("free end must be finite, got {:?}", p)),
            ),
            _ => Ok(()),
        }
    }

    fn connectors_using(&self, matches: impl Fn(&ConnEnd) -> bool) -> Vec<ConnRef> {
        self.connectors
            .iter()
            .filter(|(_, c)| c.ends().iter().any(&matches))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Turn matching ends into free points at their current attach position.
    fn detach_ends(&mut self, matches: impl Fn(&ConnEnd) -> bool) {
        let users = self.connectors_using(&matches);
        for id in users {
            let Some(connector) = self.connectors.get(&id) else {
                continue;
            };
            let (source, target) = (connector.source, connector.target);
            let source = self.freeze(source, &matches);
            let target = self.freeze(target, &matches);
            if let Some(connector) = self.connectors.get_mut(&id) {
                connector.source = source;
                connector.target = target;
            }
            log::debug!("Connector {:?} lost its attachment and now ends freely", id);
            self.invalid.insert(id);
        }
    }

    fn freeze(&self, end: ConnEnd, matches: &impl Fn(&ConnEnd) -> bool) -> ConnEnd {
        if !matches(&end) {
            return end;
        }
        let point = match end {
            ConnEnd::Pin(id) => self.pin_position(id),
            ConnEnd::Shape(id) => self.shapes.get(&id).map(|o| o.bounds.center()),
            ConnEnd::Point(p) => Some(p),
        };
        ConnEnd::Point(point.unwrap_or(Point::ZERO))
    }
}

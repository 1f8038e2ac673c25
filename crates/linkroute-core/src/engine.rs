//! Geometry engine abstraction.
//!
//! The synchronization layer talks to the router only through
//! [`GeometryEngine`], using opaque handles. [`linkroute_router::Router`] is
//! the reference implementation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use kurbo::{Point, Rect};
use linkroute_router::{ConnEnd, ConnRef, PinPlacement, PinRef, Router, RouterError, ShapeRef};
use thiserror::Error;

use crate::config::RoutingOptions;
use crate::shapes::PortGroup;

/// Engine errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Engine is not ready")]
    NotReady,
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("Unknown handle: {0}")]
    UnknownHandle(String),
    #[error("Engine failed to load: {0}")]
    Load(String),
}

impl From<RouterError> for EngineError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::InvalidGeometry(msg) => EngineError::InvalidGeometry(msg),
            RouterError::UnknownShape(_)
            | RouterError::UnknownPin(_)
            | RouterError::UnknownConnector(_) => EngineError::UnknownHandle(err.to_string()),
            RouterError::InvalidOptions(msg) => EngineError::Load(msg),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Recomputed routes keyed by connection handle.
pub type RouteMap = HashMap<ConnRefHandle, Vec<Point>>;

macro_rules! engine_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Wrap an engine-issued token.
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// The engine-issued token.
            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

engine_handle!(
    /// An obstacle registered in the engine.
    ObstacleHandle
);
engine_handle!(
    /// A pin registered in the engine.
    PinHandle
);
engine_handle!(
    /// A routed connection registered in the engine.
    ConnRefHandle
);

/// Where a pin sits on its obstacle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinAnchor {
    /// Fraction of the obstacle width from its left edge.
    pub x_fraction: f64,
    /// Fraction of the obstacle height from its top edge.
    pub y_fraction: f64,
    /// Side the route leaves through.
    pub group: PortGroup,
}

/// One end of a connection, resolved to engine handles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEndpoint {
    /// A port pin.
    Pin(PinHandle),
    /// Anywhere on a portless shape's boundary.
    Obstacle(ObstacleHandle),
    /// A free point.
    Point(Point),
}

/// A geometry routing engine.
///
/// Every method except [`GeometryEngine::load`] requires a loaded engine, so
/// callers hold an engine value only once loading has completed.
pub trait GeometryEngine {
    /// Load the engine. Resolves once it can accept registrations.
    fn load(options: RoutingOptions) -> BoxFuture<'static, EngineResult<Self>>
    where
        Self: Sized;

    /// Register an obstacle inflated by `buffer`.
    fn register_obstacle(&mut self, bounds: Rect, buffer: f64) -> EngineResult<ObstacleHandle>;

    /// Move or resize an obstacle in place.
    fn update_obstacle(&mut self, handle: ObstacleHandle, bounds: Rect) -> EngineResult<()>;

    /// Remove an obstacle.
    fn unregister_obstacle(&mut self, handle: ObstacleHandle) -> EngineResult<()>;

    /// Anchor a pin to an obstacle.
    fn register_pin(&mut self, obstacle: ObstacleHandle, anchor: PinAnchor) -> EngineResult<PinHandle>;

    /// Re-anchor a pin.
    fn update_pin(&mut self, handle: PinHandle, anchor: PinAnchor) -> EngineResult<()>;

    /// Remove a pin.
    fn unregister_pin(&mut self, handle: PinHandle) -> EngineResult<()>;

    /// Register a connection between two endpoints.
    fn register_connection(
        &mut self,
        source: EngineEndpoint,
        target: EngineEndpoint,
    ) -> EngineResult<ConnRefHandle>;

    /// Remove a connection.
    fn unregister_connection(&mut self, handle: ConnRefHandle) -> EngineResult<()>;

    /// Ask for a connection to be rerouted by the next recompute.
    fn request_route(&mut self, handle: ConnRefHandle) -> EngineResult<()>;

    /// Connections whose route depends on an obstacle, given its bounds
    /// before the last update.
    ///
    /// `None` means the engine cannot tell, and every connection must be
    /// rerouted.
    fn affected_by(&self, _obstacle: ObstacleHandle, _previous: Option<Rect>) -> Option<Vec<ConnRefHandle>> {
        None
    }

    /// Route every requested connection in one pass.
    fn recompute(&mut self) -> RouteMap;
}

fn placement(anchor: PinAnchor) -> PinPlacement {
    PinPlacement::new(anchor.x_fraction, anchor.y_fraction, anchor.group.side())
}

fn conn_end(endpoint: EngineEndpoint) -> ConnEnd {
    match endpoint {
        EngineEndpoint::Pin(pin) => ConnEnd::Pin(PinRef::from_raw(pin.raw())),
        EngineEndpoint::Obstacle(obstacle) => ConnEnd::Shape(ShapeRef::from_raw(obstacle.raw())),
        EngineEndpoint::Point(point) => ConnEnd::Point(point),
    }
}

impl GeometryEngine for Router {
    fn load(options: RoutingOptions) -> BoxFuture<'static, EngineResult<Self>> {
        let options = options.to_router_options();
        Box::pin(async move { Ok(Router::load(options).await?) })
    }

    fn register_obstacle(&mut self, bounds: Rect, buffer: f64) -> EngineResult<ObstacleHandle> {
        let shape = self.add_shape(bounds, buffer)?;
        Ok(ObstacleHandle::from_raw(shape.raw()))
    }

    fn update_obstacle(&mut self, handle: ObstacleHandle, bounds: Rect) -> EngineResult<()> {
        Ok(self.move_shape(ShapeRef::from_raw(handle.raw()), bounds)?)
    }

    fn unregister_obstacle(&mut self, handle: ObstacleHandle) -> EngineResult<()> {
        Ok(self.remove_shape(ShapeRef::from_raw(handle.raw()))?)
    }

    fn register_pin(&mut self, obstacle: ObstacleHandle, anchor: PinAnchor) -> EngineResult<PinHandle> {
        let pin = self.add_pin(ShapeRef::from_raw(obstacle.raw()), placement(anchor))?;
        Ok(PinHandle::from_raw(pin.raw()))
    }

    fn update_pin(&mut self, handle: PinHandle, anchor: PinAnchor) -> EngineResult<()> {
        Ok(self.move_pin(PinRef::from_raw(handle.raw()), placement(anchor))?)
    }

    fn unregister_pin(&mut self, handle: PinHandle) -> EngineResult<()> {
        Ok(self.remove_pin(PinRef::from_raw(handle.raw()))?)
    }

    fn register_connection(
        &mut self,
        source: EngineEndpoint,
        target: EngineEndpoint,
    ) -> EngineResult<ConnRefHandle> {
        let conn = self.add_connector(conn_end(source), conn_end(target))?;
        Ok(ConnRefHandle::from_raw(conn.raw()))
    }

    fn unregister_connection(&mut self, handle: ConnRefHandle) -> EngineResult<()> {
        Ok(self.remove_connector(ConnRef::from_raw(handle.raw()))?)
    }

    fn request_route(&mut self, handle: ConnRefHandle) -> EngineResult<()> {
        Ok(self.invalidate(ConnRef::from_raw(handle.raw()))?)
    }

    fn affected_by(&self, obstacle: ObstacleHandle, previous: Option<Rect>) -> Option<Vec<ConnRefHandle>> {
        match Router::affected_by(self, ShapeRef::from_raw(obstacle.raw()), previous) {
            Ok(conns) => Some(
                conns
                    .into_iter()
                    .map(|c| ConnRefHandle::from_raw(c.raw()))
                    .collect(),
            ),
            Err(err) => {
                log::warn!("Affected-set query failed, rerouting everything: {}", err);
                None
            }
        }
    }

    fn recompute(&mut self) -> RouteMap {
        self.process_transaction()
            .into_iter()
            .map(|(conn, route)| (ConnRefHandle::from_raw(conn.raw()), route))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rejects_bad_options() {
        let options = RoutingOptions {
            port_overflow: f64::NAN,
            ..RoutingOptions::default()
        };
        let result = pollster::block_on(<Router as GeometryEngine>::load(options));
        assert!(matches!(result, Err(EngineError::Load(_))));
    }

    #[test]
    fn test_router_through_trait() {
        let mut engine = pollster::block_on(<Router as GeometryEngine>::load(RoutingOptions::default())).unwrap();
        let a = engine
            .register_obstacle(Rect::new(0.0, 0.0, 100.0, 100.0), 20.0)
            .unwrap();
        let b = engine
            .register_obstacle(Rect::new(300.0, 0.0, 400.0, 100.0), 20.0)
            .unwrap();
        let pin = engine
            .register_pin(
                a,
                PinAnchor {
                    x_fraction: 1.0,
                    y_fraction: 0.5,
                    group: PortGroup::Right,
                },
            )
            .unwrap();
        let conn = engine
            .register_connection(EngineEndpoint::Pin(pin), EngineEndpoint::Obstacle(b))
            .unwrap();

        let routes = engine.recompute();
        let route = &routes[&conn];
        assert_eq!(route.first(), Some(&Point::new(100.0, 50.0)));
        assert_eq!(route.last(), Some(&Point::new(300.0, 50.0)));

        let affected = GeometryEngine::affected_by(&engine, b, None).unwrap();
        assert_eq!(affected, vec![conn]);
        assert!(engine.recompute().is_empty());
    }

    #[test]
    fn test_invalid_geometry_maps_to_engine_error() {
        let mut engine = Router::new(Default::default()).unwrap();
        let err = engine
            .register_obstacle(Rect::new(0.0, 0.0, f64::NAN, 10.0), 20.0)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidGeometry(_)));

        let err = engine
            .unregister_obstacle(ObstacleHandle::from_raw(42))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownHandle(_)));
    }
}

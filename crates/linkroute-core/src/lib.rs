//! LinkRoute Core Library
//!
//! Diagram model and the machinery that keeps an obstacle-avoiding router in
//! step with it: entity correspondence, event synchronization, route feedback,
//! connection validation and interactive tool policy.

pub mod avoid;
pub mod cascade;
pub mod config;
pub mod correspondence;
pub mod diagram;
pub mod engine;
pub mod events;
pub mod feedback;
pub mod shapes;
pub mod snap;
pub mod validation;
pub mod widget;

pub use avoid::{AvoidRouter, CycleReport};
pub use config::{ConfigError, RoutingOptions};
pub use correspondence::CorrespondenceTable;
pub use diagram::Diagram;
pub use engine::{
    BoxFuture, ConnRefHandle, EngineEndpoint, EngineError, EngineResult, GeometryEngine,
    ObstacleHandle, PinAnchor, PinHandle, RouteMap,
};
pub use events::{ConnectionEnd, DiagramEvent};
pub use feedback::RouteFeedbackWriter;
pub use shapes::{Connection, ConnectionId, Endpoint, Port, PortGroup, PortId, Shape, ShapeId};
pub use snap::{GRID_SIZE, LINK_SNAP_RADIUS, LinkSnap, snap_link_end, snap_to_grid};
pub use validation::{CellRef, can_connect};
pub use widget::{
    Handle, HandleKind, HandleShape, WidgetManager, WidgetState, hit_test_handle, link_tools_for,
    resize_from_handle, tools_for,
};

//! LinkRoute Router
//!
//! Orthogonal connector routing around rectangular obstacles.
//!
//! The router keeps its own registry of obstacles ("shapes"), connection pins
//! anchored to those shapes, and connectors between pins, shapes or free
//! points. Edits only invalidate the connectors they affect; routes are
//! recomputed in one pass by [`Router::process_transaction`].

mod geometry;
mod nudge;
mod router;
mod visibility;

pub use geometry::{Side, is_valid_rect, path_enters_rect, segment_enters_rect};
pub use router::{
    ConnEnd, ConnRef, PinPlacement, PinRef, Router, RouterError, RouterOptions, RouterResult,
    ShapeRef,
};

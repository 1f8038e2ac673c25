//! Interactive tools attached to shapes and connections.
//!
//! Shapes get resize and remove tools, plus a connect tool when they have no
//! ports. Connections get remove and target-arrowhead tools while the pointer
//! is over them, and an "active" highlight while pressed.
//!
//! Shapes remain pure data. Widgets wrap cells with UI state.

mod handles;
mod manager;
mod state;

pub use handles::{
    Handle, HandleKind, HandleShape, MIN_RESIZE, hit_test_handle, link_tools_for, resize_from_handle,
    tools_for,
};
pub use manager::WidgetManager;
pub use state::WidgetState;

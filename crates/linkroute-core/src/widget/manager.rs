//! Widget manager for tracking UI state of shapes and connections.

use std::collections::{HashMap, HashSet};

use kurbo::Point;
use uuid::Uuid;

use super::handles::{Handle, HandleKind, hit_test_handle, link_tools_for, tools_for};
use super::state::WidgetState;
use crate::shapes::{ConnectionId, Shape};

/// Manages UI state for the cells of a diagram.
///
/// Shape and connection ids share one space (both are UUIDs), so a single
/// map covers both.
#[derive(Debug, Clone, Default)]
pub struct WidgetManager {
    /// UI state for each cell.
    states: HashMap<Uuid, WidgetState>,
    /// Currently selected cells.
    selected: HashSet<Uuid>,
    /// Cell under the pointer.
    hovered: Option<Uuid>,
    /// Connection the pointer is pressed on.
    active_link: Option<ConnectionId>,
}

impl WidgetManager {
    /// Create a new widget manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the state of a cell.
    pub fn state(&self, id: Uuid) -> WidgetState {
        self.states.get(&id).copied().unwrap_or_default()
    }

    /// Set the state of a cell.
    pub fn set_state(&mut self, id: Uuid, state: WidgetState) {
        if state.is_selected() {
            self.selected.insert(id);
        } else {
            self.selected.remove(&id);
        }
        if state.is_active() {
            self.active_link = Some(id);
        } else if self.active_link == Some(id) {
            self.active_link = None;
        }
        if state == WidgetState::Normal {
            self.states.remove(&id);
        } else {
            self.states.insert(id, state);
        }
    }

    /// Get the hovered cell (if any).
    pub fn hovered(&self) -> Option<Uuid> {
        self.hovered
    }

    /// Set the hovered cell.
    pub fn set_hovered(&mut self, id: Option<Uuid>) {
        if let Some(old_id) = self.hovered {
            if Some(old_id) != id && self.state(old_id) == WidgetState::Hovered {
                self.set_state(old_id, WidgetState::Normal);
            }
        }
        if let Some(new_id) = id {
            if self.state(new_id) == WidgetState::Normal {
                self.set_state(new_id, WidgetState::Hovered);
            }
        }
        self.hovered = id;
    }

    /// Select a single cell (clears other selections).
    pub fn select(&mut self, id: Uuid) {
        self.clear_selection();
        self.set_state(id, WidgetState::Selected);
    }

    /// Check if a cell is selected.
    pub fn is_selected(&self, id: Uuid) -> bool {
        self.selected.contains(&id)
    }

    /// Get all selected cell IDs.
    pub fn selected(&self) -> &HashSet<Uuid> {
        &self.selected
    }

    /// Clear all selections.
    pub fn clear_selection(&mut self) {
        let selected: Vec<Uuid> = self.selected.iter().copied().collect();
        for id in selected {
            self.set_state(id, WidgetState::Normal);
        }
    }

    /// Pointer pressed on a connection: highlight it as active.
    pub fn press_link(&mut self, id: ConnectionId) {
        if let Some(old) = self.active_link.filter(|&old| old != id) {
            self.set_state(old, WidgetState::Normal);
        }
        self.set_state(id, WidgetState::Active);
    }

    /// Pointer released: drop the active highlight.
    pub fn release_link(&mut self) {
        if let Some(id) = self.active_link.take() {
            let state = if self.hovered == Some(id) {
                WidgetState::Hovered
            } else {
                WidgetState::Normal
            };
            self.set_state(id, state);
        }
    }

    /// Connection currently highlighted as active.
    pub fn active_link(&self) -> Option<ConnectionId> {
        self.active_link
    }

    /// Forget a removed cell.
    pub fn remove(&mut self, id: Uuid) {
        self.states.remove(&id);
        self.selected.remove(&id);
        if self.hovered == Some(id) {
            self.hovered = None;
        }
        if self.active_link == Some(id) {
            self.active_link = None;
        }
    }

    /// Tools to show on a shape.
    pub fn get_handles(&self, shape: &Shape) -> Vec<Handle> {
        tools_for(shape)
    }

    /// Tools to show on a connection.
    pub fn link_tools(&self, id: ConnectionId) -> Vec<HandleKind> {
        link_tools_for(self.state(id))
    }

    /// Which tool of a shape is under the pointer.
    pub fn handle_at(&self, shape: &Shape, point: Point, tolerance: f64) -> Option<HandleKind> {
        hit_test_handle(shape, point, tolerance)
    }
}

//! Widget state definitions.

/// The UI state of a shape or connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WidgetState {
    /// No interaction.
    #[default]
    Normal,
    /// Pointer is over the cell.
    Hovered,
    /// Cell is selected.
    Selected,
    /// Pointer is pressed on the cell (connections only).
    Active,
}

impl WidgetState {
    /// Check if the cell is selected.
    pub fn is_selected(self) -> bool {
        matches!(self, Self::Selected)
    }

    /// Whether a connection in this state shows its tools.
    pub fn shows_link_tools(self) -> bool {
        !matches!(self, Self::Normal)
    }

    /// Whether a connection in this state gets the active highlight.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

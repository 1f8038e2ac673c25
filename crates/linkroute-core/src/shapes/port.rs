//! Ports: named attachment points on a shape's boundary.

use linkroute_router::Side;
use serde::{Deserialize, Serialize};

/// Port identifier, unique within its owning shape.
pub type PortId = String;

/// The side of the shape a port group is laid out along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortGroup {
    Top,
    Right,
    Bottom,
    Left,
}

impl PortGroup {
    /// The side routes leave through.
    pub fn side(self) -> Side {
        match self {
            PortGroup::Top => Side::Top,
            PortGroup::Right => Side::Right,
            PortGroup::Bottom => Side::Bottom,
            PortGroup::Left => Side::Left,
        }
    }

    /// Position of the `index`-th of `count` ports in this group, as fractions
    /// of the shape's width and height.
    ///
    /// Ports are spread evenly, each centered in its own slot along the side.
    pub fn fraction(self, index: usize, count: usize) -> (f64, f64) {
        let along = (index as f64 + 0.5) / count.max(1) as f64;
        match self {
            PortGroup::Top => (along, 0.0),
            PortGroup::Right => (1.0, along),
            PortGroup::Bottom => (along, 1.0),
            PortGroup::Left => (0.0, along),
        }
    }
}

/// A port on a shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Identifier, unique within the owning shape.
    pub id: PortId,
    /// Group the port is laid out in.
    pub group: PortGroup,
}

impl Port {
    /// Create a new port.
    pub fn new(id: impl Into<PortId>, group: PortGroup) -> Self {
        Self {
            id: id.into(),
            group,
        }
    }
}

/// Fractional anchor of the port `id` given the ordered port list of a shape.
pub(crate) fn layout_fraction(ports: &[Port], id: &str) -> Option<(f64, f64, PortGroup)> {
    let port = ports.iter().find(|p| p.id == id)?;
    let siblings: Vec<&Port> = ports.iter().filter(|p| p.group == port.group).collect();
    let index = siblings.iter().position(|p| p.id == id)?;
    let (fx, fy) = port.group.fraction(index, siblings.len());
    Some((fx, fy, port.group))
}

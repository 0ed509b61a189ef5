//! Component categories and their fixed execution order.

use std::fmt;

/// The part of the terrestrial water cycle a component simulates.
///
/// Categories execute in a fixed topological order within one supermesh
/// tick ([`Category::ORDER`]) because one category's outbound transfers
/// become another's inbound transfers within the same tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Processes at the interface with the atmosphere (canopy, snow).
    Surfacelayer,
    /// Processes in the soil column and groundwater.
    Subsurface,
    /// Processes in rivers, lakes, and other open water bodies.
    Openwater,
}

impl Category {
    /// Execution order within one supermesh tick.
    pub const ORDER: [Category; 3] = [
        Category::Surfacelayer,
        Category::Subsurface,
        Category::Openwater,
    ];

    /// Lowercase name used in file names and log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Surfacelayer => "surfacelayer",
            Self::Subsurface => "subsurface",
            Self::Openwater => "openwater",
        }
    }

    /// Stable single-byte tag used in dump file headers.
    pub fn code(self) -> u8 {
        match self {
            Self::Surfacelayer => 0,
            Self::Subsurface => 1,
            Self::Openwater => 2,
        }
    }

    /// Inverse of [`code()`](Category::code).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Surfacelayer),
            1 => Some(Self::Subsurface),
            2 => Some(Self::Openwater),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

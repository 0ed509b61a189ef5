//! The spatial shape consumed from the spatial-domain collaborator.

use std::fmt;

use smallvec::SmallVec;

use crate::error::ConfigError;

/// The fixed shape of a component's spatial grid.
///
/// The engine never interprets coordinates, projections, or lateral
/// connectivity; all per-cell arrays are flat `Vec<f64>` buffers in
/// canonical cell order and the shape is carried as metadata only.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpaceShape {
    dims: SmallVec<[usize; 2]>,
}

impl SpaceShape {
    /// Create a shape from its dimension extents.
    ///
    /// Rejects an empty dimension list and zero-extent dimensions.
    pub fn new(dims: &[usize]) -> Result<Self, ConfigError> {
        if dims.is_empty() {
            return Err(ConfigError::InvalidShape {
                reason: "shape needs at least one dimension".into(),
            });
        }
        if let Some(pos) = dims.iter().position(|&d| d == 0) {
            return Err(ConfigError::InvalidShape {
                reason: format!("dimension {pos} has zero extent"),
            });
        }
        Ok(Self {
            dims: SmallVec::from_slice(dims),
        })
    }

    /// The dimension extents, outermost first.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of grid cells (product of all extents).
    pub fn cell_count(&self) -> usize {
        self.dims.iter().product()
    }
}

impl fmt::Display for SpaceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, ")")
    }
}

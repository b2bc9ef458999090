//! Tensor shapes and axis arithmetic.

use anyhow::{bail, Result};

/// Logical dimensions of a tensor, outermost axis first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Builds a shape from its dimension extents.
    ///
    /// Panics when `dims` is empty so every tensor carries at least one axis.
    pub fn new<D: Into<Vec<usize>>>(dims: D) -> Self {
        let dims = dims.into();
        assert!(!dims.is_empty(), "tensor shapes need at least one dimension");
        Shape { dims }
    }

    /// The dimension extents as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the extent of a single axis, rejecting out-of-range indices.
    pub fn size(&self, dim: usize) -> Result<usize> {
        match self.dims.get(dim) {
            Some(&size) => Ok(size),
            None => bail!("dimension {} out of range for rank {}", dim, self.rank()),
        }
    }

    /// Product of all dimension extents.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }
}

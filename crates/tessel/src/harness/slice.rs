//! Equal-group subtensor extraction.

use anyhow::{ensure, Context, Result};

use crate::tensor::Tensor;

/// Splits `tensor` into `groups` equal parts along `dim` and returns part
/// `group` as a contiguous tensor.
///
/// An absent tensor passes through untouched so optional inputs (a bias that
/// was never supplied, a cache not populated yet) can be sliced
/// unconditionally. The group width is `size(dim) / groups` using integer
/// division; divisibility is the caller's contract and any remainder rows
/// are simply never addressed by a valid `group` index.
pub fn subtensor(
    tensor: Option<&Tensor>,
    dim: usize,
    groups: usize,
    group: usize,
) -> Result<Option<Tensor>> {
    let tensor = match tensor {
        Some(tensor) => tensor,
        None => return Ok(None),
    };
    ensure!(groups > 0, "group count must be positive");
    let size = tensor.size(dim)?;
    let width = size / groups;
    let slice = tensor.narrow(dim, width * group, width).with_context(|| {
        format!(
            "extracting group {} of {} along dimension {}",
            group, groups, dim
        )
    })?;
    Ok(Some(slice.contiguous()))
}

//! Host tensor support for the harness.
//!
//! The harness needs very little from a tensor: shape inspection, an
//! absolute-max reduction, narrowing along one dimension, and contiguity
//! materialization. [`Tensor`] provides exactly that surface over shared
//! host storage.

mod dtype;
mod host_tensor;
mod shape;

pub use dtype::DType;
pub use host_tensor::{Tensor, TensorData};
pub use shape::Shape;

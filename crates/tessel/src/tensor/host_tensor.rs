//! Strided host tensor over shared storage.

use std::sync::Arc;

use anyhow::{ensure, Result};
use rand::Rng;

use super::{dtype::DType, shape::Shape};

/// Shared element storage backing one or more tensor views.
#[derive(Debug, Clone)]
pub enum TensorData {
    F32(Arc<[f32]>),
    I32(Arc<[i32]>),
}

/// Host tensor: a strided view over reference-counted storage.
///
/// Cloning is cheap. [`Tensor::narrow`] produces views into the same storage
/// without copying; [`Tensor::contiguous`] materializes a row-major copy only
/// when the view is actually strided.
#[derive(Debug, Clone)]
pub struct Tensor {
    data: TensorData,
    shape: Shape,
    strides: Vec<usize>,
    offset: usize,
}

impl Tensor {
    /// Builds an `F32` tensor over owned values, checking the length against
    /// the shape.
    pub fn from_vec(shape: Shape, data: Vec<f32>) -> Result<Self> {
        ensure!(
            data.len() == shape.num_elements(),
            "value count {} does not match shape {:?}",
            data.len(),
            shape.dims()
        );
        let strides = row_major_strides(shape.dims());
        Ok(Tensor {
            data: TensorData::F32(Arc::from(data)),
            shape,
            strides,
            offset: 0,
        })
    }

    /// Builds an `I32` tensor, checking the value count against the shape.
    pub fn from_i32(shape: Shape, data: Vec<i32>) -> Result<Self> {
        ensure!(
            data.len() == shape.num_elements(),
            "value count {} does not match shape {:?}",
            data.len(),
            shape.dims()
        );
        let strides = row_major_strides(shape.dims());
        Ok(Tensor {
            data: TensorData::I32(Arc::from(data)),
            shape,
            strides,
            offset: 0,
        })
    }

    /// An all-zero `F32` tensor of the given shape.
    pub fn zeros(shape: Shape) -> Self {
        let len = shape.num_elements();
        let strides = row_major_strides(shape.dims());
        Tensor {
            data: TensorData::F32(Arc::from(vec![0.0; len])),
            shape,
            strides,
            offset: 0,
        }
    }

    /// Draws `N(0, std^2)` samples from `rng` via the Box-Muller transform.
    pub fn randn(shape: Shape, std: f32, rng: &mut impl Rng) -> Self {
        let len = shape.num_elements();
        let mut values = Vec::with_capacity(len);
        while values.len() < len {
            // Clamp the first uniform away from zero so the log stays finite.
            let uniform = rng.gen::<f32>().max(f32::MIN_POSITIVE);
            let radius = (-2.0 * uniform.ln()).sqrt();
            let angle = std::f32::consts::TAU * rng.gen::<f32>();
            values.push(std * radius * angle.cos());
            if values.len() < len {
                values.push(std * radius * angle.sin());
            }
        }
        let strides = row_major_strides(shape.dims());
        Tensor {
            data: TensorData::F32(Arc::from(values)),
            shape,
            strides,
            offset: 0,
        }
    }

    /// The logical shape of this view.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Scalar dtype of the backing storage.
    pub fn dtype(&self) -> DType {
        match self.data {
            TensorData::F32(_) => DType::F32,
            TensorData::I32(_) => DType::I32,
        }
    }

    /// Returns the extent of a single axis.
    pub fn size(&self, dim: usize) -> Result<usize> {
        self.shape.size(dim)
    }

    /// Returns the total number of elements addressed by this view.
    pub fn num_elements(&self) -> usize {
        self.shape.num_elements()
    }

    /// Reports whether the view addresses zero elements.
    pub fn is_empty(&self) -> bool {
        self.num_elements() == 0
    }

    /// Maximum absolute element value, `0.0` for an empty tensor.
    pub fn max_abs(&self) -> f64 {
        let mut max = 0.0f64;
        match &self.data {
            TensorData::F32(values) => self.for_each_storage_index(|index| {
                let v = (values[index] as f64).abs();
                if v > max {
                    max = v;
                }
            }),
            TensorData::I32(values) => self.for_each_storage_index(|index| {
                let v = (values[index] as f64).abs();
                if v > max {
                    max = v;
                }
            }),
        }
        max
    }

    /// Restricts the view to `[start, start + length)` along `dim` without
    /// copying. The result shares storage with `self`.
    pub fn narrow(&self, dim: usize, start: usize, length: usize) -> Result<Tensor> {
        let size = self.size(dim)?;
        let end = start.checked_add(length);
        ensure!(
            end.map_or(false, |end| end <= size),
            "narrow range [{}, {}+{}) exceeds dimension {} of size {}",
            start,
            start,
            length,
            dim,
            size
        );
        let mut dims = self.shape.dims().to_vec();
        dims[dim] = length;
        Ok(Tensor {
            data: self.data.clone(),
            shape: Shape::new(dims),
            strides: self.strides.clone(),
            offset: self.offset + start * self.strides[dim],
        })
    }

    /// Reports whether elements are laid out row-major in storage (the view
    /// may still start at a nonzero offset).
    pub fn is_contiguous(&self) -> bool {
        self.strides == row_major_strides(self.shape.dims())
    }

    /// Returns a tensor with row-major element order: `self` unchanged when
    /// already contiguous, otherwise a materialized copy.
    pub fn contiguous(&self) -> Tensor {
        if self.is_contiguous() {
            return self.clone();
        }
        let shape = self.shape.clone();
        let strides = row_major_strides(shape.dims());
        let data = match &self.data {
            TensorData::F32(values) => {
                let mut out = Vec::with_capacity(self.num_elements());
                self.for_each_storage_index(|index| out.push(values[index]));
                TensorData::F32(Arc::from(out))
            }
            TensorData::I32(values) => {
                let mut out = Vec::with_capacity(self.num_elements());
                self.for_each_storage_index(|index| out.push(values[index]));
                TensorData::I32(Arc::from(out))
            }
        };
        Tensor {
            data,
            shape,
            strides,
            offset: 0,
        }
    }

    /// Copies the `f32` elements out in row-major order; panics when the
    /// payload holds a different dtype.
    pub fn to_vec(&self) -> Vec<f32> {
        match &self.data {
            TensorData::F32(values) => {
                if self.is_contiguous() {
                    values[self.offset..self.offset + self.num_elements()].to_vec()
                } else {
                    let mut out = Vec::with_capacity(self.num_elements());
                    self.for_each_storage_index(|index| out.push(values[index]));
                    out
                }
            }
            TensorData::I32(_) => panic!("tensor data is not stored as f32"),
        }
    }

    /// `i32` counterpart of [`Tensor::to_vec`].
    pub fn to_vec_i32(&self) -> Vec<i32> {
        match &self.data {
            TensorData::I32(values) => {
                if self.is_contiguous() {
                    values[self.offset..self.offset + self.num_elements()].to_vec()
                } else {
                    let mut out = Vec::with_capacity(self.num_elements());
                    self.for_each_storage_index(|index| out.push(values[index]));
                    out
                }
            }
            TensorData::F32(_) => panic!("tensor data is not stored as i32"),
        }
    }

    /// Visits the storage index of every element in row-major logical order.
    fn for_each_storage_index(&self, mut f: impl FnMut(usize)) {
        let dims = self.shape.dims();
        if dims.iter().any(|&d| d == 0) {
            return;
        }
        let mut index = vec![0usize; dims.len()];
        'element: loop {
            let storage = self.offset
                + index
                    .iter()
                    .zip(&self.strides)
                    .map(|(i, s)| i * s)
                    .sum::<usize>();
            f(storage);
            let mut d = dims.len();
            while d > 0 {
                d -= 1;
                index[d] += 1;
                if index[d] < dims[d] {
                    continue 'element;
                }
                index[d] = 0;
            }
            return;
        }
    }
}

/// Row-major strides for the given dimensions (innermost stride 1).
fn row_major_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![0usize; dims.len()];
    let mut acc = 1usize;
    for d in (0..dims.len()).rev() {
        strides[d] = acc;
        acc *= dims[d].max(1);
    }
    strides
}

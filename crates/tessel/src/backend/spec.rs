//! Traits and value types the harness uses to talk to kernel backends.
//!
//! The harness never owns a compiler or a device; it drives whatever
//! implements these seams. Keeping the surface this narrow is what lets the
//! whole harness run against in-process fakes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tensor::Tensor;

/// Errors surfaced by backend implementations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// The caller violated the contract of a backend operation.
    #[error("backend spec violation: {0}")]
    SpecViolation(String),
    /// The backend does not provide the requested kernel or capability.
    #[error("backend does not implement {op}: {reason}")]
    Unimplemented { op: String, reason: String },
    /// The backend failed while executing a supported operation.
    #[error("backend execution failed: {message}")]
    Execution { message: String },
}

impl BackendError {
    pub fn spec_violation(message: impl Into<String>) -> Self {
        BackendError::SpecViolation(message.into())
    }

    pub fn unimplemented(op: impl Into<String>, reason: impl Into<String>) -> Self {
        BackendError::Unimplemented {
            op: op.into(),
            reason: reason.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        BackendError::Execution {
            message: message.into(),
        }
    }
}

/// Convenient alias for backend-fallible operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Mapping and tuning parameters applied when compiling a kernel for a
/// target device.
///
/// The harness never interprets these; it forwards them to
/// [`CompilationUnit::compile`], where they become part of the compiled
/// artifact's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingOptions {
    /// Loop tile extents, outermost first. Empty means untiled.
    pub tile_sizes: Vec<usize>,
    /// Threads per block along x/y/z.
    pub block_dims: [u32; 3],
    /// Blocks per grid along x/y/z.
    pub grid_dims: [u32; 3],
    /// Innermost-loop unroll factor, if any.
    pub unroll: Option<u32>,
}

impl MappingOptions {
    /// One thread block, untiled, no unrolling.
    pub fn naive() -> Self {
        MappingOptions {
            tile_sizes: Vec::new(),
            block_dims: [1, 1, 1],
            grid_dims: [1, 1, 1],
            unroll: None,
        }
    }
}

impl Default for MappingOptions {
    fn default() -> Self {
        MappingOptions::naive()
    }
}

/// One kernel-definition and compilation scope.
///
/// A unit accumulates textual kernel definitions and compiles named entries
/// into runnable handles. The benchmark runner opens a fresh unit per kernel
/// it measures so no definition or cache state leaks between runs.
pub trait CompilationUnit {
    /// Opaque compiled-kernel artifact. Created once per
    /// [`compile`](CompilationUnit::compile) call, reused serially across
    /// runs, and never explicitly released.
    type KernelHandle: Clone + Send + Sync + 'static;

    /// Registers the kernel definitions contained in `source`.
    fn define(&mut self, source: &str) -> BackendResult<()>;

    /// Compiles the named kernel for the given inputs and mapping options.
    fn compile(
        &mut self,
        name: &str,
        inputs: &[Tensor],
        options: &MappingOptions,
    ) -> BackendResult<Self::KernelHandle>;

    /// Runs the kernel with per-launch validation. The first run sizes and
    /// materializes `outputs`; later runs reuse the vector.
    fn run(
        &mut self,
        handle: &Self::KernelHandle,
        inputs: &[Tensor],
        outputs: &mut Vec<Tensor>,
    ) -> BackendResult<()>;

    /// Same as [`run`](CompilationUnit::run), additionally reporting the
    /// kernel-only elapsed time.
    fn run_timed(
        &mut self,
        handle: &Self::KernelHandle,
        inputs: &[Tensor],
        outputs: &mut Vec<Tensor>,
    ) -> BackendResult<Duration>;

    /// Runs without per-launch validation. Callers must have pushed the same
    /// inputs through a checked run first.
    fn unchecked_run(
        &mut self,
        handle: &Self::KernelHandle,
        inputs: &[Tensor],
        outputs: &mut Vec<Tensor>,
    ) -> BackendResult<()>;
}

/// Host-side view of the device execution stream.
pub trait DeviceRuntime {
    /// Blocks until all device work issued so far has completed.
    ///
    /// An error is the device reporting an asynchronous failure; callers
    /// treat it as fatal to the operation in progress.
    fn synchronize(&self) -> BackendResult<()>;
}

/// A kernel backend the harness can verify and benchmark.
pub trait KernelBackend {
    type Unit: CompilationUnit;
    type Device: DeviceRuntime;

    /// Stable name, used to key seeds and label reports.
    fn name(&self) -> &str;

    /// Opens a fresh compilation scope.
    fn new_compilation_unit(&self) -> Self::Unit;

    /// The device runtime executing this backend's kernels.
    fn device(&self) -> &Self::Device;
}

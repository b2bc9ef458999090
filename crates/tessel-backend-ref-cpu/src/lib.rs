pub mod cpu;
pub mod kernels;

pub use cpu::{CpuBackend, CpuCompilationUnit, CpuDevice, CpuKernel};
pub use kernels::{KernelBody, KernelSpec};

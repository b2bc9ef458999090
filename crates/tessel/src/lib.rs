pub mod backend;
mod env;
pub mod harness;
pub mod tensor;

pub use backend::spec::{
    BackendError, BackendResult, CompilationUnit, DeviceRuntime, KernelBackend, MappingOptions,
};
pub use harness::bench::{benchmark_kernel_options, BenchmarkFlags};
pub use harness::precision::{check_rtol, PrecisionError, RtolBudget, RtolOverrides};
pub use harness::seed::SeedRegistry;
pub use harness::slice::subtensor;
pub use tensor::{DType, Shape, Tensor};

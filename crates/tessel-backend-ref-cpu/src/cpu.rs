//! In-process reference backend interpreting the built-in kernel catalog.
//!
//! `define` only scans definition sources for kernel names; `compile`
//! resolves those names against the catalog and freezes the input signature.
//! Everything executes synchronously on the host, which is exactly what
//! makes this backend useful for exercising the harness without a device.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tessel::backend::spec::{
    BackendError, BackendResult, CompilationUnit, DeviceRuntime, KernelBackend, MappingOptions,
};
use tessel::tensor::{DType, Shape, Tensor};

use crate::kernels::{self, KernelBody, KernelSpec};

/// Reference backend compiling catalog kernels to host evaluators.
#[derive(Debug, Default, Clone)]
pub struct CpuBackend {
    device: CpuDevice,
}

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend::default()
    }
}

impl KernelBackend for CpuBackend {
    type Unit = CpuCompilationUnit;
    type Device = CpuDevice;

    fn name(&self) -> &str {
        "ref-cpu"
    }

    fn new_compilation_unit(&self) -> CpuCompilationUnit {
        CpuCompilationUnit::new()
    }

    fn device(&self) -> &CpuDevice {
        &self.device
    }
}

/// Host execution is synchronous, so the barrier is trivially satisfied.
#[derive(Debug, Default, Clone)]
pub struct CpuDevice;

impl DeviceRuntime for CpuDevice {
    fn synchronize(&self) -> BackendResult<()> {
        Ok(())
    }
}

/// Compiled artifact: the catalog entry plus the signature it was frozen
/// for.
#[derive(Debug)]
pub struct CpuKernel {
    spec: KernelSpec,
    input_shapes: Vec<Shape>,
    input_dtypes: Vec<DType>,
    options: MappingOptions,
}

impl CpuKernel {
    /// Catalog entry this kernel was compiled from.
    pub fn spec(&self) -> &KernelSpec {
        &self.spec
    }

    /// Mapping options the kernel was compiled with.
    pub fn options(&self) -> &MappingOptions {
        &self.options
    }
}

/// One definition + compilation scope over the built-in catalog.
#[derive(Debug, Default)]
pub struct CpuCompilationUnit {
    defined: HashSet<String>,
    compiled: HashMap<u64, Arc<CpuKernel>>,
}

impl CpuCompilationUnit {
    pub fn new() -> Self {
        CpuCompilationUnit::default()
    }

    fn validate_launch(&self, kernel: &CpuKernel, inputs: &[Tensor]) -> BackendResult<()> {
        if inputs.len() != kernel.input_shapes.len() {
            return Err(BackendError::spec_violation(format!(
                "kernel {} was compiled for {} inputs, got {}",
                kernel.spec.name,
                kernel.input_shapes.len(),
                inputs.len()
            )));
        }
        for (index, (input, expected)) in inputs.iter().zip(&kernel.input_shapes).enumerate() {
            if input.shape() != expected {
                return Err(BackendError::spec_violation(format!(
                    "kernel {} input {} has shape {:?}, compiled for {:?}",
                    kernel.spec.name,
                    index,
                    input.shape().dims(),
                    expected.dims()
                )));
            }
            if input.dtype() != kernel.input_dtypes[index] {
                return Err(BackendError::spec_violation(format!(
                    "kernel {} input {} has dtype {}, compiled for {}",
                    kernel.spec.name,
                    index,
                    input.dtype(),
                    kernel.input_dtypes[index]
                )));
            }
        }
        Ok(())
    }
}

impl CompilationUnit for CpuCompilationUnit {
    type KernelHandle = Arc<CpuKernel>;

    fn define(&mut self, source: &str) -> BackendResult<()> {
        let names = parse_definition_names(source);
        if names.is_empty() {
            return Err(BackendError::spec_violation(
                "kernel source defines no kernels",
            ));
        }
        self.defined.extend(names);
        Ok(())
    }

    fn compile(
        &mut self,
        name: &str,
        inputs: &[Tensor],
        options: &MappingOptions,
    ) -> BackendResult<Arc<CpuKernel>> {
        if !self.defined.contains(name) {
            return Err(BackendError::spec_violation(format!(
                "kernel {} has not been defined in this compilation unit",
                name
            )));
        }
        let spec = kernels::lookup(name).ok_or_else(|| {
            BackendError::unimplemented(
                format!("compile {}", name),
                "no built-in evaluator for this kernel",
            )
        })?;
        validate_signature(&spec, inputs)?;

        let fingerprint = kernel_fingerprint(name, inputs, options);
        if let Some(kernel) = self.compiled.get(&fingerprint) {
            return Ok(kernel.clone());
        }
        let kernel = Arc::new(CpuKernel {
            input_shapes: inputs.iter().map(|input| input.shape().clone()).collect(),
            input_dtypes: inputs.iter().map(|input| input.dtype()).collect(),
            options: options.clone(),
            spec,
        });
        self.compiled.insert(fingerprint, kernel.clone());
        Ok(kernel)
    }

    fn run(
        &mut self,
        handle: &Arc<CpuKernel>,
        inputs: &[Tensor],
        outputs: &mut Vec<Tensor>,
    ) -> BackendResult<()> {
        self.validate_launch(handle, inputs)?;
        evaluate(handle, inputs, outputs)
    }

    fn run_timed(
        &mut self,
        handle: &Arc<CpuKernel>,
        inputs: &[Tensor],
        outputs: &mut Vec<Tensor>,
    ) -> BackendResult<Duration> {
        self.validate_launch(handle, inputs)?;
        let start = Instant::now();
        evaluate(handle, inputs, outputs)?;
        Ok(start.elapsed())
    }

    fn unchecked_run(
        &mut self,
        handle: &Arc<CpuKernel>,
        inputs: &[Tensor],
        outputs: &mut Vec<Tensor>,
    ) -> BackendResult<()> {
        evaluate(handle, inputs, outputs)
    }
}

/// Extracts the kernel names declared by `def <name>(` headers.
fn parse_definition_names(source: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in source.lines() {
        if let Some(rest) = line.trim_start().strip_prefix("def ") {
            let name: String = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if !name.is_empty() {
                names.push(name);
            }
        }
    }
    names
}

fn validate_signature(spec: &KernelSpec, inputs: &[Tensor]) -> BackendResult<()> {
    if inputs.len() != spec.arity {
        return Err(BackendError::spec_violation(format!(
            "kernel {} expects {} inputs, got {}",
            spec.name,
            spec.arity,
            inputs.len()
        )));
    }
    for (index, input) in inputs.iter().enumerate() {
        if input.dtype() != DType::F32 {
            return Err(BackendError::spec_violation(format!(
                "kernel {} input {} must be f32, got {}",
                spec.name,
                index,
                input.dtype()
            )));
        }
    }
    match spec.body {
        KernelBody::Add | KernelBody::Mul => {
            if inputs[0].shape() != inputs[1].shape() {
                return Err(BackendError::spec_violation(format!(
                    "kernel {} requires matching input shapes, got {:?} and {:?}",
                    spec.name,
                    inputs[0].shape().dims(),
                    inputs[1].shape().dims()
                )));
            }
        }
        KernelBody::Saxpy => {
            if inputs[0].num_elements() != 1 {
                return Err(BackendError::spec_violation(format!(
                    "kernel {} input 0 must hold a single scalar, got {:?}",
                    spec.name,
                    inputs[0].shape().dims()
                )));
            }
            if inputs[1].shape() != inputs[2].shape() {
                return Err(BackendError::spec_violation(format!(
                    "kernel {} requires matching X/Y shapes, got {:?} and {:?}",
                    spec.name,
                    inputs[1].shape().dims(),
                    inputs[2].shape().dims()
                )));
            }
        }
    }
    Ok(())
}

/// Identity of a compiled kernel: name, input signature, mapping options.
fn kernel_fingerprint(name: &str, inputs: &[Tensor], options: &MappingOptions) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    for input in inputs {
        input.shape().dims().hash(&mut hasher);
        input.dtype().hash(&mut hasher);
    }
    options.hash(&mut hasher);
    hasher.finish()
}

fn evaluate(
    kernel: &CpuKernel,
    inputs: &[Tensor],
    outputs: &mut Vec<Tensor>,
) -> BackendResult<()> {
    let result = match kernel.spec.body {
        KernelBody::Add => elementwise_binary(&inputs[0], &inputs[1], |a, b| a + b)?,
        KernelBody::Mul => elementwise_binary(&inputs[0], &inputs[1], |a, b| a * b)?,
        KernelBody::Saxpy => {
            let alpha = inputs[0].to_vec()[0];
            elementwise_binary(&inputs[1], &inputs[2], move |x, y| alpha * x + y)?
        }
    };
    if outputs.is_empty() {
        outputs.push(result);
    } else {
        outputs[0] = result;
    }
    Ok(())
}

fn elementwise_binary(
    a: &Tensor,
    b: &Tensor,
    op: impl Fn(f32, f32) -> f32,
) -> BackendResult<Tensor> {
    let lhs = a.to_vec();
    let rhs = b.to_vec();
    let values: Vec<f32> = lhs.iter().zip(&rhs).map(|(x, y)| op(*x, *y)).collect();
    Tensor::from_vec(a.shape().clone(), values)
        .map_err(|err| BackendError::execution(err.to_string()))
}

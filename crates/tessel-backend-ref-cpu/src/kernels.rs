//! Built-in kernel catalog for the reference backend.
//!
//! Each entry pairs a textual kernel definition with a host evaluator. The
//! catalog is what `compile` resolves names against; defining a kernel whose
//! name has no entry here compiles to nothing on this backend.

use serde::{Deserialize, Serialize};

/// Definition source for the elementwise addition kernel.
pub const ADD_SOURCE: &str = include_str!("kernels/add.tc");
/// Definition source for the elementwise multiplication kernel.
pub const MUL_SOURCE: &str = include_str!("kernels/mul.tc");
/// Definition source for the scaled vector addition kernel.
pub const SAXPY_SOURCE: &str = include_str!("kernels/saxpy.tc");

/// Host evaluator backing a catalog kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelBody {
    /// `C(i) = A(i) + B(i)`
    Add,
    /// `C(i) = A(i) * B(i)`
    Mul,
    /// `Z(i) = alpha(0) * X(i) + Y(i)`
    Saxpy,
}

/// One entry of the built-in catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Kernel name as declared in its definition source.
    pub name: String,
    /// The textual definition shipped with the backend.
    pub source: String,
    /// Evaluator executing the kernel on the host.
    pub body: KernelBody,
    /// Number of input tensors the kernel consumes.
    pub arity: usize,
}

impl KernelSpec {
    fn new(name: &str, source: &str, body: KernelBody, arity: usize) -> Self {
        KernelSpec {
            name: name.to_string(),
            source: source.to_string(),
            body,
            arity,
        }
    }
}

/// Every kernel this backend can compile.
pub fn builtin_kernels() -> Vec<KernelSpec> {
    vec![
        KernelSpec::new("add", ADD_SOURCE, KernelBody::Add, 2),
        KernelSpec::new("mul", MUL_SOURCE, KernelBody::Mul, 2),
        KernelSpec::new("saxpy", SAXPY_SOURCE, KernelBody::Saxpy, 3),
    ]
}

/// Resolves a catalog entry by kernel name.
pub fn lookup(name: &str) -> Option<KernelSpec> {
    builtin_kernels().into_iter().find(|spec| spec.name == name)
}

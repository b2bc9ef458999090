//! Relative-tolerance verification of kernel outputs.

use std::collections::HashMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::env;
use crate::tensor::Tensor;

/// Environment variable naming a JSON file of per-kernel budget overrides.
pub const RTOL_OVERRIDES_ENV: &str = "TESSEL_RTOL_OVERRIDES";

/// Error budget for a relative-tolerance comparison.
///
/// Floating-point error accumulates with the number of operations feeding
/// each output element, so the budget scales a machine epsilon by an
/// operation count instead of applying one fixed threshold to every kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RtolBudget {
    /// Estimated reductions contributing to each output value.
    pub n_operations: f64,
    /// Base epsilon of the element type being compared.
    pub machine_precision: f64,
}

impl Default for RtolBudget {
    fn default() -> Self {
        RtolBudget {
            n_operations: 1.0,
            machine_precision: f32::EPSILON as f64,
        }
    }
}

impl RtolBudget {
    /// Default machine precision scaled for a kernel performing
    /// `n_operations` accumulations per output element.
    pub fn with_operations(n_operations: f64) -> Self {
        RtolBudget {
            n_operations,
            ..RtolBudget::default()
        }
    }
}

/// Raised when a difference tensor exceeds the scaled error budget.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "error at relative precision: {machine_precision}, #operations: {n_operations}, \
     max value: {max_value}, max diff: {max_diff}, random seed: {seed}"
)]
pub struct PrecisionError {
    pub machine_precision: f64,
    pub n_operations: f64,
    pub max_value: f64,
    pub max_diff: f64,
    /// Seed that generated the inputs, for reproducing the failure.
    pub seed: u64,
}

/// Checks a difference tensor against the input magnitudes scaled by the
/// budget.
///
/// `max_value` is the largest absolute element across `inputs`; the check
/// fails when the largest absolute element of `diff` reaches
/// `n_operations * machine_precision * max_value`. Equality fails: the
/// budget is an exclusive upper bound on acceptable error. With no inputs
/// there is nothing to scale the tolerance against, so the bound collapses
/// to zero and any nonzero difference fails.
///
/// `seed` is carried into the failure payload untouched; callers read it
/// from the registry that seeded their input generation.
pub fn check_rtol(
    diff: &Tensor,
    inputs: &[Tensor],
    budget: RtolBudget,
    seed: u64,
) -> Result<(), PrecisionError> {
    let mut max_value = 0.0f64;
    for tensor in inputs {
        max_value = tensor.max_abs().max(max_value);
    }
    let max_diff = diff.max_abs();
    if max_diff >= budget.n_operations * budget.machine_precision * max_value {
        return Err(PrecisionError {
            machine_precision: budget.machine_precision,
            n_operations: budget.n_operations,
            max_value,
            max_diff,
            seed,
        });
    }
    Ok(())
}

/// Per-kernel overrides of the default budget.
///
/// Deserialized from a JSON object keyed by kernel name, e.g.
/// `{"conv2d": {"n_operations": 128.0, "machine_precision": 1.2e-7}}`.
/// Kernels without an entry fall back to [`RtolBudget::default`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RtolOverrides {
    kernels: HashMap<String, RtolBudget>,
}

impl RtolOverrides {
    /// Parses an override table from a JSON document.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Loads the table named by `TESSEL_RTOL_OVERRIDES`, or the empty table
    /// when the variable is unset.
    pub fn from_env() -> anyhow::Result<Self> {
        match env::env_path(RTOL_OVERRIDES_ENV) {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading rtol overrides from {}", path))?;
                Self::from_json_str(&text)
                    .with_context(|| format!("parsing rtol overrides from {}", path))
            }
            None => Ok(RtolOverrides::default()),
        }
    }

    /// Registers or replaces the budget for one kernel.
    pub fn insert(&mut self, kernel: impl Into<String>, budget: RtolBudget) {
        self.kernels.insert(kernel.into(), budget);
    }

    /// Budget for `kernel`, falling back to the default.
    pub fn budget_for(&self, kernel: &str) -> RtolBudget {
        self.kernels.get(kernel).copied().unwrap_or_default()
    }
}

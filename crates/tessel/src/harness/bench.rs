//! Kernel benchmarking: compile, warm up, measure, report.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::backend::spec::{
    BackendError, BackendResult, CompilationUnit, DeviceRuntime, KernelBackend, MappingOptions,
};
use crate::env;
use crate::tensor::Tensor;

/// Environment variable overriding the warm-up run count.
pub const BENCHMARK_WARMUP_ENV: &str = "TESSEL_BENCHMARK_WARMUP";
/// Environment variable overriding the timed iteration count.
pub const BENCHMARK_ITERATIONS_ENV: &str = "TESSEL_BENCHMARK_ITERATIONS";

const DEFAULT_WARMUP: u32 = 10;
const DEFAULT_ITERATIONS: u32 = 100;

/// Iteration counts driving a benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkFlags {
    /// Total untimed runs before measuring. The first run always happens to
    /// materialize outputs, so `0` and `1` are equivalent.
    pub warmup: u32,
    /// Timed iterations contributing samples to the report.
    pub iterations: u32,
}

impl Default for BenchmarkFlags {
    fn default() -> Self {
        BenchmarkFlags {
            warmup: DEFAULT_WARMUP,
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl BenchmarkFlags {
    /// Reads the process-wide flags, falling back to the defaults for unset,
    /// blank, or unparseable values.
    pub fn from_env() -> Self {
        BenchmarkFlags {
            warmup: env::env_u32(BENCHMARK_WARMUP_ENV, DEFAULT_WARMUP),
            iterations: env::env_u32(BENCHMARK_ITERATIONS_ENV, DEFAULT_ITERATIONS),
        }
    }
}

/// Index of the sample reported for `fraction` over `count` sorted samples.
///
/// Nearest-rank position `ceil(fraction * count)`, clamped to the last valid
/// index so small sample counts never read out of bounds.
pub fn percentile_index(fraction: f64, count: usize) -> usize {
    debug_assert!(count > 0, "percentile over zero samples");
    let rank = (fraction * count as f64).ceil() as usize;
    rank.min(count - 1)
}

const RULE: &str = "---------------------------------------------------------";

/// Renders one report block: a titled banner and the five summary latencies
/// in microseconds. `sorted` must be ascending and non-empty.
pub fn format_stats_block(title: &str, sorted: &[Duration], iterations: u32) -> String {
    let count = sorted.len();
    let mut block = String::new();
    block.push('\n');
    block.push_str(RULE);
    block.push('\n');
    block.push_str(&format!("{:^width$}\n", title, width = RULE.len()));
    block.push_str(&format!(
        "{:^width$}\n",
        format!("{} ITERATIONS", iterations),
        width = RULE.len()
    ));
    block.push_str(RULE);
    block.push('\n');
    block.push_str(&format!(
        "Min: {}us, p50: {}us, p90: {}us, p99: {}us, Max: {}us\n",
        sorted[0].as_micros(),
        sorted[percentile_index(0.5, count)].as_micros(),
        sorted[percentile_index(0.9, count)].as_micros(),
        sorted[percentile_index(0.99, count)].as_micros(),
        sorted[count - 1].as_micros(),
    ));
    block.push_str(RULE);
    block.push('\n');
    block
}

/// Compiles `kernel_name` from `source` on `backend` and reports its latency
/// under `flags`.
///
/// One fresh compilation unit serves the whole run. After an initial untimed
/// run (which materializes the outputs) and `warmup - 1` further untimed
/// runs, each timed iteration records two samples: the kernel-only time
/// reported by the backend's timed run, and a wall-clock time around an
/// unchecked run, each bracketed by a device barrier so the measurements do
/// not overlap in-flight work. Both sequences are printed as
/// `Min/p50/p90/p99/Max` blocks on standard output.
///
/// Compilation and synchronization failures abort the run with no partial
/// report.
pub fn benchmark_kernel_options<B: KernelBackend>(
    backend: &B,
    source: &str,
    kernel_name: &str,
    inputs: &[Tensor],
    options: &MappingOptions,
    flags: BenchmarkFlags,
) -> BackendResult<()> {
    if flags.iterations == 0 {
        return Err(BackendError::spec_violation(
            "benchmark_iterations must be at least 1",
        ));
    }

    let mut unit = backend.new_compilation_unit();
    unit.define(source)?;
    let handle = unit.compile(kernel_name, inputs, options)?;

    let mut outputs = Vec::new();
    unit.run(&handle, inputs, &mut outputs)?;
    for _ in 1..flags.warmup {
        unit.run(&handle, inputs, &mut outputs)?;
    }

    let device = backend.device();
    let mut kernel_times = Vec::with_capacity(flags.iterations as usize);
    let mut total_times = Vec::with_capacity(flags.iterations as usize);
    for _ in 0..flags.iterations {
        kernel_times.push(unit.run_timed(&handle, inputs, &mut outputs)?);
        device.synchronize()?;
        let start = Instant::now();
        unit.unchecked_run(&handle, inputs, &mut outputs)?;
        device.synchronize()?;
        total_times.push(start.elapsed());
    }

    kernel_times.sort();
    total_times.sort();
    print!(
        "{}",
        format_stats_block("KERNEL STATS", &kernel_times, flags.iterations)
    );
    print!(
        "{}",
        format_stats_block("TOTAL STATS", &total_times, flags.iterations)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_indices_for_ten_samples() {
        assert_eq!(percentile_index(0.5, 10), 5);
        assert_eq!(percentile_index(0.9, 10), 9);
        assert_eq!(percentile_index(0.99, 10), 9);
    }

    #[test]
    fn percentile_indices_clamp_for_tiny_sample_counts() {
        assert_eq!(percentile_index(0.5, 1), 0);
        assert_eq!(percentile_index(0.99, 1), 0);
        assert_eq!(percentile_index(0.5, 3), 2);
        assert_eq!(percentile_index(0.9, 3), 2);
    }

    #[test]
    fn single_sample_report_collapses_every_statistic() {
        let samples = [Duration::from_micros(37)];
        let block = format_stats_block("KERNEL STATS", &samples, 1);
        assert!(block.contains("KERNEL STATS"));
        assert!(block.contains("1 ITERATIONS"));
        assert!(block.contains("Min: 37us, p50: 37us, p90: 37us, p99: 37us, Max: 37us"));
    }

    #[test]
    fn sorted_samples_report_expected_percentiles() {
        let samples: Vec<Duration> = (1..=10).map(Duration::from_micros).collect();
        let block = format_stats_block("TOTAL STATS", &samples, 10);
        assert!(block.contains("Min: 1us, p50: 6us, p90: 10us, p99: 10us, Max: 10us"));
    }

    #[test]
    fn flags_fall_back_to_defaults_and_honor_the_environment() {
        std::env::remove_var(BENCHMARK_WARMUP_ENV);
        std::env::remove_var(BENCHMARK_ITERATIONS_ENV);
        assert_eq!(BenchmarkFlags::from_env(), BenchmarkFlags::default());

        std::env::set_var(BENCHMARK_WARMUP_ENV, " 3 ");
        std::env::set_var(BENCHMARK_ITERATIONS_ENV, "not-a-number");
        let flags = BenchmarkFlags::from_env();
        assert_eq!(flags.warmup, 3);
        assert_eq!(flags.iterations, DEFAULT_ITERATIONS);

        std::env::remove_var(BENCHMARK_WARMUP_ENV);
        std::env::remove_var(BENCHMARK_ITERATIONS_ENV);
    }
}

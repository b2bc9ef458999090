//! End-to-end verification flow: seeded inputs, a real kernel run, and
//! relative-tolerance checking of the result.

use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use tessel::harness::precision::RTOL_OVERRIDES_ENV;
use tessel::tensor::{Shape, Tensor};
use tessel::{
    check_rtol, subtensor, CompilationUnit, KernelBackend, MappingOptions, RtolBudget,
    RtolOverrides, SeedRegistry,
};
use tessel_backend_ref_cpu::{kernels, CpuBackend};

fn elementwise(a: &Tensor, b: &Tensor, op: impl Fn(f32, f32) -> f32) -> Tensor {
    let lhs = a.to_vec();
    let rhs = b.to_vec();
    let values: Vec<f32> = lhs.iter().zip(&rhs).map(|(x, y)| op(*x, *y)).collect();
    Tensor::from_vec(a.shape().clone(), values).expect("matching shapes")
}

fn run_kernel(backend: &CpuBackend, source: &str, name: &str, inputs: &[Tensor]) -> Tensor {
    let mut unit = backend.new_compilation_unit();
    unit.define(source).expect("define");
    let handle = unit
        .compile(name, inputs, &MappingOptions::naive())
        .expect("compile");
    let mut outputs = Vec::new();
    unit.run(&handle, inputs, &mut outputs).expect("run");
    outputs.remove(0)
}

#[test]
fn kernel_output_matches_the_host_reference() {
    let backend = CpuBackend::new();
    let mut seeds = SeedRegistry::new();
    seeds.set_seed(backend.name(), 1234);
    let a = Tensor::randn(Shape::new(vec![32]), 1.0, seeds.rng_mut(backend.name()));
    let b = Tensor::randn(Shape::new(vec![32]), 1.0, seeds.rng_mut(backend.name()));
    let inputs = vec![a.clone(), b.clone()];

    let output = run_kernel(&backend, kernels::ADD_SOURCE, "add", &inputs);

    let expected = elementwise(&a, &b, |x, y| x + y);
    let diff = elementwise(&output, &expected, |x, y| x - y);
    check_rtol(&diff, &inputs, RtolBudget::default(), seeds.seed(backend.name()))
        .expect("reference backend is exact");
}

#[test]
fn corrupted_outputs_fail_and_carry_the_generating_seed() {
    let backend = CpuBackend::new();
    let mut seeds = SeedRegistry::new();
    seeds.set_seed(backend.name(), 99);
    let a = Tensor::randn(Shape::new(vec![16]), 1.0, seeds.rng_mut(backend.name()));
    let b = Tensor::randn(Shape::new(vec![16]), 1.0, seeds.rng_mut(backend.name()));
    let inputs = vec![a.clone(), b.clone()];

    let output = run_kernel(&backend, kernels::ADD_SOURCE, "add", &inputs);
    let expected = elementwise(&a, &b, |x, y| x + y);

    let mut values = output.to_vec();
    values[7] += 1e-3;
    let corrupted = Tensor::from_vec(expected.shape().clone(), values).expect("same shape");

    let diff = elementwise(&corrupted, &expected, |x, y| x - y);
    let err = check_rtol(&diff, &inputs, RtolBudget::default(), seeds.seed(backend.name()))
        .expect_err("corrupted output");
    assert_eq!(err.seed, 99);
    assert!(err.max_diff > 0.0);
    assert!(err.to_string().contains("random seed: 99"));
}

#[test]
fn grouped_outputs_verify_against_grouped_references() {
    let backend = CpuBackend::new();
    let mut seeds = SeedRegistry::new();
    seeds.set_seed(backend.name(), 7);
    let a = Tensor::randn(Shape::new(vec![4, 8]), 1.0, seeds.rng_mut(backend.name()));
    let b = Tensor::randn(Shape::new(vec![4, 8]), 1.0, seeds.rng_mut(backend.name()));

    let output = run_kernel(
        &backend,
        kernels::MUL_SOURCE,
        "mul",
        &[a.clone(), b.clone()],
    );

    for group in 0..2 {
        let out_part = subtensor(Some(&output), 0, 2, group)
            .expect("split output")
            .expect("tensor present");
        let a_part = subtensor(Some(&a), 0, 2, group)
            .expect("split lhs")
            .expect("tensor present");
        let b_part = subtensor(Some(&b), 0, 2, group)
            .expect("split rhs")
            .expect("tensor present");

        let expected = elementwise(&a_part, &b_part, |x, y| x * y);
        let diff = elementwise(&out_part, &expected, |x, y| x - y);
        check_rtol(
            &diff,
            &[a_part, b_part],
            RtolBudget::default(),
            seeds.seed(backend.name()),
        )
        .expect("group matches its reference");
    }
}

#[test]
fn override_table_loads_from_the_environment() {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_millis();
    let path = std::env::temp_dir().join(format!("tessel_rtol_overrides_{}.json", timestamp));
    fs::write(
        &path,
        r#"{"mul": {"n_operations": 16.0, "machine_precision": 1.2e-7}}"#,
    )
    .expect("write overrides");

    std::env::set_var(RTOL_OVERRIDES_ENV, &path);
    let overrides = RtolOverrides::from_env().expect("load overrides");
    std::env::remove_var(RTOL_OVERRIDES_ENV);
    fs::remove_file(&path).expect("cleanup");

    assert_eq!(overrides.budget_for("mul").n_operations, 16.0);
    assert_eq!(overrides.budget_for("add"), RtolBudget::default());
}

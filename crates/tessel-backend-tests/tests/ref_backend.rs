//! The reference backend driven end to end through the harness.

use rand::Rng;
use tessel::tensor::{Shape, Tensor};
use tessel::{
    benchmark_kernel_options, check_rtol, BackendError, BenchmarkFlags, CompilationUnit,
    KernelBackend, MappingOptions, RtolBudget, SeedRegistry,
};
use tessel_backend_ref_cpu::{kernels, CpuBackend};

#[test]
fn add_kernel_benchmarks_end_to_end() {
    let backend = CpuBackend::new();
    let inputs = vec![
        Tensor::from_vec(Shape::new(vec![64]), vec![1.0; 64]).expect("lhs"),
        Tensor::from_vec(Shape::new(vec![64]), vec![2.0; 64]).expect("rhs"),
    ];
    benchmark_kernel_options(
        &backend,
        kernels::ADD_SOURCE,
        "add",
        &inputs,
        &MappingOptions::naive(),
        BenchmarkFlags {
            warmup: 2,
            iterations: 5,
        },
    )
    .expect("benchmark over the reference backend");
}

#[test]
fn saxpy_matches_the_host_reference_for_a_random_alpha() {
    let backend = CpuBackend::new();
    let mut seeds = SeedRegistry::new();
    seeds.set_seed(backend.name(), 2024);
    let alpha = seeds.rng_mut(backend.name()).gen_range(0.5f32..2.0);
    let x = Tensor::randn(Shape::new(vec![24]), 1.0, seeds.rng_mut(backend.name()));
    let y = Tensor::randn(Shape::new(vec![24]), 1.0, seeds.rng_mut(backend.name()));
    let inputs = vec![
        Tensor::from_vec(Shape::new(vec![1]), vec![alpha]).expect("alpha"),
        x.clone(),
        y.clone(),
    ];

    let mut unit = backend.new_compilation_unit();
    unit.define(kernels::SAXPY_SOURCE).expect("define");
    let handle = unit
        .compile("saxpy", &inputs, &MappingOptions::naive())
        .expect("compile");
    let mut outputs = Vec::new();
    unit.run(&handle, &inputs, &mut outputs).expect("run");

    let xs = x.to_vec();
    let ys = y.to_vec();
    let expected: Vec<f32> = xs.iter().zip(&ys).map(|(x, y)| alpha * x + y).collect();
    let produced = outputs[0].to_vec();
    let diff: Vec<f32> = produced.iter().zip(&expected).map(|(a, b)| a - b).collect();
    let diff = Tensor::from_vec(Shape::new(vec![24]), diff).expect("diff");
    check_rtol(
        &diff,
        &inputs,
        RtolBudget::with_operations(2.0),
        seeds.seed(backend.name()),
    )
    .expect("saxpy matches the host computation");
}

#[test]
fn tuned_mapping_options_do_not_change_reference_results() {
    let backend = CpuBackend::new();
    let inputs = vec![
        Tensor::from_vec(Shape::new(vec![12]), (0..12).map(|v| v as f32).collect())
            .expect("lhs"),
        Tensor::from_vec(Shape::new(vec![12]), (12..24).map(|v| v as f32).collect())
            .expect("rhs"),
    ];
    let tuned_options = MappingOptions {
        tile_sizes: vec![8],
        block_dims: [32, 1, 1],
        grid_dims: [2, 1, 1],
        unroll: Some(2),
    };

    let mut unit = backend.new_compilation_unit();
    unit.define(kernels::ADD_SOURCE).expect("define");
    let naive = unit
        .compile("add", &inputs, &MappingOptions::naive())
        .expect("naive compile");
    let tuned = unit
        .compile("add", &inputs, &tuned_options)
        .expect("tuned compile");

    let mut naive_outputs = Vec::new();
    unit.run(&naive, &inputs, &mut naive_outputs).expect("naive run");
    let mut tuned_outputs = Vec::new();
    unit.run(&tuned, &inputs, &mut tuned_outputs).expect("tuned run");
    assert_eq!(naive_outputs[0].to_vec(), tuned_outputs[0].to_vec());
}

#[test]
fn benchmark_propagates_unimplemented_kernels() {
    let backend = CpuBackend::new();
    let source = "def gemv(float(M,N) A, float(N) X) -> (Y) { Y(i) +=! A(i, j) * X(j) }";
    let inputs = vec![
        Tensor::zeros(Shape::new(vec![4, 3])),
        Tensor::zeros(Shape::new(vec![3])),
    ];
    let err = benchmark_kernel_options(
        &backend,
        source,
        "gemv",
        &inputs,
        &MappingOptions::naive(),
        BenchmarkFlags {
            warmup: 1,
            iterations: 1,
        },
    )
    .expect_err("no evaluator for gemv");
    assert!(matches!(err, BackendError::Unimplemented { .. }));
}

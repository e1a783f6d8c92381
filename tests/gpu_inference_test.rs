//! GPU execution compared against host results.
//!
//! Every test returns early when no hardware adapter is present.

use framework_bench::compare::{Tolerance, compare_results};
use framework_bench::device::Backend;
use framework_bench::errors::ExecutionError;
use framework_bench::jit::JitFunction;
use framework_bench::models::ModelFamily;
use framework_bench::registry::DataType;
use framework_bench::tensor::{ElementType, Tensor};

fn gpu_backend() -> Option<Backend> {
    match Backend::bind("gpu") {
        Ok(backend) => Some(backend),
        Err(ExecutionError::DeviceUnavailable { message, .. }) => {
            eprintln!("skipping GPU test: {}", message);
            None
        }
        Err(e) => panic!("unexpected bind error: {}", e),
    }
}

fn ramp(shape: Vec<usize>, dtype: ElementType) -> Tensor {
    let len: usize = shape.iter().product();
    let data = (0..len).map(|i| ((i * 7) % 13) as f32 / 13.0).collect();
    Tensor::new(shape, dtype, data).unwrap()
}

fn assert_gpu_matches_cpu(family: ModelFamily, data_type: DataType, inputs: Vec<Tensor>, tolerance: Tolerance) {
    let Some(backend) = gpu_backend() else {
        return;
    };
    let model = family.build(data_type);
    let expected = model.forward(&inputs).unwrap();

    let device_inputs = backend.transfer(&inputs, data_type);
    let mut jit = JitFunction::new(&model, backend);
    for _ in 0..2 {
        let output = jit.call(&device_inputs).unwrap().block_until_ready().unwrap();
        let report = compare_results(&output, &expected[0], tolerance);
        assert!(
            report.passed(),
            "{} {}: {} of {} elements differ, max error {}",
            family.name(),
            data_type,
            report.mismatched_elements,
            report.total_elements,
            report.max_abs_error
        );
    }
    assert_eq!(jit.compilations(), 1);
}

#[test]
fn test_resnet_fp32() {
    assert_gpu_matches_cpu(
        ModelFamily::Resnet50,
        DataType::Fp32,
        vec![ramp(vec![2, 5, 5, 3], ElementType::F32)],
        Tolerance::new(1e-4, 1e-4),
    );
}

#[test]
fn test_bert_fp32() {
    assert_gpu_matches_cpu(
        ModelFamily::BertLarge,
        DataType::Fp32,
        vec![ramp(vec![1, 12], ElementType::F32)],
        Tolerance::new(1e-4, 1e-4),
    );
}

#[test]
fn test_t5_fp16() {
    assert_gpu_matches_cpu(
        ModelFamily::T5Large,
        DataType::Fp16,
        vec![
            ramp(vec![1, 6], ElementType::F16),
            ramp(vec![1, 4], ElementType::F16),
        ],
        Tolerance::new(2e-2, 2e-2),
    );
}

#[test]
fn test_bert_bf16() {
    assert_gpu_matches_cpu(
        ModelFamily::BertLarge,
        DataType::Bf16,
        vec![ramp(vec![2, 5], ElementType::Bf16)],
        Tolerance::new(1e-1, 1e-1),
    );
}

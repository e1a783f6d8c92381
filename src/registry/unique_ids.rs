//! Model identifiers of the built-in model suite.
//!
//! A benchmark id is a model id followed by a batch suffix, e.g.
//! `RESNET50-fp32-JAX-batch8`.

pub const MODEL_RESNET50_FP32_JAX: &str = "RESNET50-fp32-JAX";
pub const MODEL_RESNET50_FP16_JAX: &str = "RESNET50-fp16-JAX";
pub const MODEL_RESNET50_BF16_JAX: &str = "RESNET50-bf16-JAX";

pub const MODEL_BERT_LARGE_FP32_JAX: &str = "BERT_LARGE-fp32-JAX";
pub const MODEL_BERT_LARGE_FP16_JAX: &str = "BERT_LARGE-fp16-JAX";
pub const MODEL_BERT_LARGE_BF16_JAX: &str = "BERT_LARGE-bf16-JAX";

pub const MODEL_T5_LARGE_FP32_JAX: &str = "T5_LARGE-fp32-JAX";
pub const MODEL_T5_LARGE_FP16_JAX: &str = "T5_LARGE-fp16-JAX";
pub const MODEL_T5_LARGE_BF16_JAX: &str = "T5_LARGE-bf16-JAX";

/// Builds the benchmark id for a model id and batch size.
pub fn benchmark_id(model_id: &str, batch_size: usize) -> String {
    format!("{}-batch{}", model_id, batch_size)
}

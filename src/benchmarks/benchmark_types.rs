//! Benchmark definitions, requests, metrics, and result records.

use super::performance_metrics::summarize;
use crate::compare::Tolerance;
use crate::models::ModelFamily;
use crate::registry::{DataType, Framework, ModelDefinition};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Compiler reported for every framework-level benchmark.
pub const COMPILER: &str = "xla";

/// Static description of one benchmark run, written alongside its metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkDefinition {
    pub benchmark_id: String,
    pub benchmark_name: String,
    pub framework: Framework,
    pub data_type: DataType,
    pub batch_size: usize,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub compiler: String,
    pub device: String,
    pub tags: Vec<String>,
}

impl BenchmarkDefinition {
    pub fn from_definition(definition: &ModelDefinition, device: &str) -> Self {
        let tags = definition
            .meta_model
            .tags
            .iter()
            .chain(&definition.tags)
            .cloned()
            .collect();

        Self {
            benchmark_id: definition.id.clone(),
            benchmark_name: definition.name.clone(),
            framework: definition.meta_model.framework,
            data_type: definition.meta_model.data_type,
            batch_size: definition.input_batch_size,
            inputs: definition.inputs.tensor_dimensions.clone(),
            outputs: definition.outputs.tensor_dimensions.clone(),
            compiler: COMPILER.to_string(),
            device: device.to_string(),
            tags,
        }
    }
}

/// Everything the runner needs for one (model, precision, device) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRequest {
    pub model_name: String,
    pub family: ModelFamily,
    pub data_type: DataType,
    pub device: String,
    pub inputs: Vec<Tensor>,
    pub expected_outputs: Vec<Tensor>,
    pub warmup_iterations: usize,
    pub benchmark_iterations: usize,
    pub tolerance: Tolerance,
}

/// Framework-level metrics of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkMetrics {
    pub min_warmup_latency_ms: Option<f64>,
    pub max_warmup_latency_ms: Option<f64>,
    pub mean_warmup_latency_ms: Option<f64>,
    pub median_warmup_latency_ms: Option<f64>,
    pub stddev_warmup_latency_ms: Option<f64>,
    pub warmup_iterations: usize,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
    pub mean_latency_ms: Option<f64>,
    pub median_latency_ms: Option<f64>,
    pub stddev_latency_ms: Option<f64>,
    pub benchmark_iterations: usize,
    /// First warmup latency in seconds; includes JIT compilation.
    pub compile_time_s: Option<f64>,
    pub input_data_transfer_ms: f64,
    pub output_mismatches: usize,
}

impl FrameworkMetrics {
    pub fn from_samples(
        warmup_latencies: &[f64],
        latencies: &[f64],
        input_data_transfer_ms: f64,
        output_mismatches: usize,
    ) -> Self {
        let warmup = summarize(warmup_latencies);
        let measured = summarize(latencies);

        Self {
            min_warmup_latency_ms: warmup.min,
            max_warmup_latency_ms: warmup.max,
            mean_warmup_latency_ms: warmup.mean,
            median_warmup_latency_ms: warmup.median,
            stddev_warmup_latency_ms: warmup.stddev,
            warmup_iterations: warmup_latencies.len(),
            min_latency_ms: measured.min,
            max_latency_ms: measured.max,
            mean_latency_ms: measured.mean,
            median_latency_ms: measured.median,
            stddev_latency_ms: measured.stddev,
            benchmark_iterations: latencies.len(),
            compile_time_s: warmup_latencies.first().map(|ms| ms / 1000.0),
            input_data_transfer_ms,
            output_mismatches,
        }
    }
}

/// Key-value store the runner commits into. Holds either nothing or every
/// [`FrameworkMetrics`] field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSink {
    values: Map<String, Value>,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits all fields in one step.
    pub fn commit(&mut self, metrics: &FrameworkMetrics) -> serde_json::Result<()> {
        if let Value::Object(fields) = serde_json::to_value(metrics)? {
            self.values.extend(fields);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    /// Reads the committed metrics back, if any.
    pub fn metrics(&self) -> Option<FrameworkMetrics> {
        if self.is_empty() {
            return None;
        }
        serde_json::from_value(Value::Object(self.values.clone())).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetrics {
    pub framework_level: Map<String, Value>,
}

/// One entry of the results file's `benchmarks` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub definition: BenchmarkDefinition,
    pub metrics: RecordMetrics,
}

impl BenchmarkRecord {
    pub fn new(definition: BenchmarkDefinition, sink: MetricsSink) -> Self {
        Self {
            definition,
            metrics: RecordMetrics {
                framework_level: sink.into_map(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelDefinitionTable;

    #[test]
    fn test_definition_tags_put_meta_model_first() {
        let table = ModelDefinitionTable::builtin();
        let model = table.get("BERT_LARGE-bf16-JAX-batch8").unwrap();
        let definition = BenchmarkDefinition::from_definition(model, "cpu");

        assert_eq!(definition.compiler, "xla");
        assert_eq!(definition.device, "cpu");
        assert_eq!(definition.batch_size, 8);
        assert_eq!(definition.tags, vec!["transformer-encoder", "batch-8"]);
        assert_eq!(definition.inputs, vec!["8x384xbf16"]);
    }

    #[test]
    fn test_metrics_from_samples() {
        let metrics = FrameworkMetrics::from_samples(&[1500.0, 10.0], &[5.0, 7.0, 6.0], 0.5, 0);
        assert_eq!(metrics.compile_time_s, Some(1.5));
        assert_eq!(metrics.warmup_iterations, 2);
        assert_eq!(metrics.benchmark_iterations, 3);
        assert_eq!(metrics.median_latency_ms, Some(6.0));
        assert_eq!(metrics.min_warmup_latency_ms, Some(10.0));
    }

    #[test]
    fn test_no_warmup_means_no_compile_time() {
        let metrics = FrameworkMetrics::from_samples(&[], &[1.0], 0.0, 0);
        assert_eq!(metrics.compile_time_s, None);
        assert_eq!(metrics.mean_warmup_latency_ms, None);
    }

    #[test]
    fn test_sink_commits_every_field() {
        let metrics = FrameworkMetrics::from_samples(&[2.0], &[1.0, 3.0], 0.25, 1);
        let mut sink = MetricsSink::new();
        assert!(sink.is_empty());

        sink.commit(&metrics).unwrap();
        assert_eq!(sink.as_map().len(), 15);
        assert_eq!(sink.get("stddev_warmup_latency_ms"), Some(&Value::Null));
        assert_eq!(sink.get("benchmark_iterations"), Some(&Value::from(2)));
        let read_back = sink.metrics().unwrap();
        assert_eq!(read_back.output_mismatches, 1);
        assert_eq!(read_back.compile_time_s, metrics.compile_time_s);
    }

    #[test]
    fn test_failed_run_record_has_empty_framework_level() {
        let table = ModelDefinitionTable::builtin();
        let model = table.get("T5_LARGE-fp32-JAX-batch1").unwrap();
        let record = BenchmarkRecord::new(
            BenchmarkDefinition::from_definition(model, "gpu"),
            MetricsSink::new(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["metrics"]["framework_level"], serde_json::json!({}));
        assert_eq!(json["definition"]["compiler"], "xla");
    }
}

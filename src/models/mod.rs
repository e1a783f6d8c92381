//! Proxy model families executed by the benchmark runner.
//!
//! Each family reproduces the input/output contract of the named network with
//! a small graph of dense, attention, pooling, and residual ops. Weights are
//! deterministic per family so cached expected outputs stay valid across runs.

pub mod bert_large;
pub mod graph;
pub mod resnet50;
pub mod t5_large;

pub use graph::{Graph, GraphBuilder, LayerSpec, Op, ValueId};

use crate::device::cpu::{self, CpuExecutable};
use crate::errors::ExecutionResult;
use crate::registry::DataType;
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Closed set of supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelFamily {
    Resnet50,
    BertLarge,
    T5Large,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::Resnet50,
        ModelFamily::BertLarge,
        ModelFamily::T5Large,
    ];

    /// Display name used in logs and the run banner.
    pub fn name(self) -> &'static str {
        match self {
            ModelFamily::Resnet50 => "RESNET50",
            ModelFamily::BertLarge => "BERT_LARGE",
            ModelFamily::T5Large => "T5_LARGE",
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ModelFamily::Resnet50 => "cnn",
            ModelFamily::BertLarge => "transformer-encoder",
            ModelFamily::T5Large => "transformer-encoder-decoder",
        }
    }

    pub fn builtin_batch_sizes(self) -> &'static [usize] {
        match self {
            ModelFamily::Resnet50 => &[1, 8, 64, 128],
            ModelFamily::BertLarge => &[1, 8, 32],
            ModelFamily::T5Large => &[1, 16, 32],
        }
    }

    pub fn input_shapes(self, batch_size: usize) -> Vec<Vec<usize>> {
        match self {
            ModelFamily::Resnet50 => resnet50::input_shapes(batch_size),
            ModelFamily::BertLarge => bert_large::input_shapes(batch_size),
            ModelFamily::T5Large => t5_large::input_shapes(batch_size),
        }
    }

    pub fn output_shapes(self, batch_size: usize) -> Vec<Vec<usize>> {
        match self {
            ModelFamily::Resnet50 => resnet50::output_shapes(batch_size),
            ModelFamily::BertLarge => bert_large::output_shapes(batch_size),
            ModelFamily::T5Large => t5_large::output_shapes(batch_size),
        }
    }

    fn graph(self) -> Graph {
        match self {
            ModelFamily::Resnet50 => resnet50::graph(),
            ModelFamily::BertLarge => bert_large::graph(),
            ModelFamily::T5Large => t5_large::graph(),
        }
    }

    fn seed(self) -> u64 {
        match self {
            ModelFamily::Resnet50 => 0x5245_534e,
            ModelFamily::BertLarge => 0x4245_5254,
            ModelFamily::T5Large => 0x5435_4c47,
        }
    }

    /// Instantiates the family at the requested precision.
    pub fn build(self, data_type: DataType) -> Model {
        let graph = self.graph();
        let layers = graph
            .layers
            .iter()
            .enumerate()
            .map(|(index, spec)| DenseLayer::generate(*spec, self.seed() + index as u64, data_type))
            .collect();

        Model {
            family: self,
            data_type,
            graph,
            layers,
        }
    }
}

/// Parameters of one dense layer.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    pub in_features: usize,
    pub out_features: usize,
    /// Row-major `[in_features][out_features]`.
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl DenseLayer {
    /// Xavier-uniform weights and small biases from a fixed seed.
    fn generate(spec: LayerSpec, seed: u64, data_type: DataType) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let scale = 1.0 / (spec.in_features as f32).sqrt();

        let mut weights: Vec<f32> = (0..spec.in_features * spec.out_features)
            .map(|_| rng.gen_range(-scale..scale))
            .collect();
        let mut bias: Vec<f32> = (0..spec.out_features)
            .map(|_| rng.gen_range(-0.01..0.01))
            .collect();
        data_type.round_slice(&mut weights);
        data_type.round_slice(&mut bias);

        Self {
            in_features: spec.in_features,
            out_features: spec.out_features,
            weights,
            bias,
        }
    }
}

/// A model instantiated for one precision.
#[derive(Debug, Clone)]
pub struct Model {
    pub family: ModelFamily,
    pub data_type: DataType,
    pub graph: Graph,
    pub layers: Vec<DenseLayer>,
}

impl Model {
    pub fn name(&self) -> &'static str {
        self.family.name()
    }

    /// Eager host execution: compiles for the given input shapes and runs once.
    pub fn forward(&self, inputs: &[Tensor]) -> ExecutionResult<Vec<Tensor>> {
        let shapes: Vec<Vec<usize>> = inputs.iter().map(|t| t.shape.clone()).collect();
        let mut executable = CpuExecutable::compile(self, &shapes)?;
        let host: Vec<Tensor> = inputs.iter().map(|t| cpu::transfer(t, self.data_type)).collect();
        let host: Vec<&Tensor> = host.iter().collect();
        Ok(vec![executable.run(&host)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::ElementType;

    #[test]
    fn test_build_is_deterministic() {
        let a = ModelFamily::BertLarge.build(DataType::Fp32);
        let b = ModelFamily::BertLarge.build(DataType::Fp32);
        assert_eq!(a.layers, b.layers);
    }

    #[test]
    fn test_reduced_precision_weights_are_rounded() {
        let model = ModelFamily::Resnet50.build(DataType::Bf16);
        for layer in &model.layers {
            for &w in &layer.weights {
                assert_eq!(DataType::Bf16.round(w), w);
            }
        }
    }

    #[test]
    fn test_graph_output_matches_declared_output_shape() {
        for family in ModelFamily::ALL {
            let model = family.build(DataType::Fp32);
            let inputs = family.input_shapes(2);
            let shapes = model.graph.infer_shapes(family.name(), &inputs).unwrap();
            assert_eq!(vec![shapes[model.graph.output].clone()], family.output_shapes(2));
        }
    }

    #[test]
    fn test_forward_on_small_image() {
        let model = ModelFamily::Resnet50.build(DataType::Fp32);
        let image = Tensor::filled(vec![1, 4, 4, 3], ElementType::F32, 0.5);
        let outputs = model.forward(&[image]).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].shape, vec![1, resnet50::NUM_CLASSES]);
        assert!(outputs[0].data.iter().all(|v| v.is_finite()));
    }
}

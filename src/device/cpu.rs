//! Host execution of model graphs.

use crate::errors::{ExecutionError, ExecutionResult};
use crate::models::{DenseLayer, Model, Op};
use crate::registry::DataType;
use crate::tensor::{ElementType, Tensor};

/// A graph specialized to fixed input shapes with preallocated value buffers.
pub struct CpuExecutable<'m> {
    model: &'m Model,
    shapes: Vec<Vec<usize>>,
    values: Vec<Vec<f32>>,
    scores: Vec<f32>,
}

impl<'m> CpuExecutable<'m> {
    pub fn compile(model: &'m Model, input_shapes: &[Vec<usize>]) -> ExecutionResult<Self> {
        let shapes = model.graph.infer_shapes(model.name(), input_shapes)?;
        let values = shapes
            .iter()
            .map(|shape| vec![0.0f32; shape.iter().product()])
            .collect();
        let max_kv = model
            .graph
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Attention { context, .. } => Some(shapes[*context][1]),
                _ => None,
            })
            .max()
            .unwrap_or(0);

        Ok(Self {
            model,
            shapes,
            values,
            scores: vec![0.0; max_kv],
        })
    }

    /// Runs on inputs already rounded to the model precision by [`transfer`].
    pub fn run(&mut self, inputs: &[&Tensor]) -> ExecutionResult<Tensor> {
        let graph = &self.model.graph;
        for (index, input) in inputs.iter().enumerate() {
            if input.shape != self.shapes[index] {
                return Err(ExecutionError::ShapeMismatch {
                    model: self.model.name().to_string(),
                    expected: format!("{:?}", self.shapes[index]),
                    actual: input.shape.clone(),
                });
            }
            self.values[index].copy_from_slice(&input.data);
        }

        let data_type = self.model.data_type;
        for op in &graph.ops {
            match *op {
                Op::Unsqueeze { src, dst } => {
                    let mut out = std::mem::take(&mut self.values[dst]);
                    out.copy_from_slice(&self.values[src]);
                    self.values[dst] = out;
                }
                Op::Dense {
                    src,
                    dst,
                    layer,
                    activation,
                } => {
                    let mut out = std::mem::take(&mut self.values[dst]);
                    dense(&self.values[src], &self.model.layers[layer], &mut out);
                    if let Some(activation) = activation {
                        activation.apply_in_place(&mut out);
                    }
                    data_type.round_slice(&mut out);
                    self.values[dst] = out;
                }
                Op::Add { lhs, rhs, dst } => {
                    let mut out = std::mem::take(&mut self.values[dst]);
                    for ((o, a), b) in out.iter_mut().zip(&self.values[lhs]).zip(&self.values[rhs]) {
                        *o = data_type.round(a + b);
                    }
                    self.values[dst] = out;
                }
                Op::MeanPool { src, dst } => {
                    let shape = &self.shapes[src];
                    let channels = shape[shape.len() - 1];
                    let window: usize = shape[1..shape.len() - 1].iter().product();
                    let mut out = std::mem::take(&mut self.values[dst]);
                    mean_pool(&self.values[src], shape[0], window, channels, &mut out);
                    data_type.round_slice(&mut out);
                    self.values[dst] = out;
                }
                Op::Attention {
                    query,
                    context,
                    dst,
                } => {
                    let q_shape = &self.shapes[query];
                    let dims = AttentionDims {
                        batch: q_shape[0],
                        q_len: q_shape[1],
                        kv_len: self.shapes[context][1],
                        dim: q_shape[2],
                    };
                    let mut out = std::mem::take(&mut self.values[dst]);
                    attention(
                        &self.values[query],
                        &self.values[context],
                        dims,
                        &mut self.scores,
                        &mut out,
                    );
                    data_type.round_slice(&mut out);
                    self.values[dst] = out;
                }
            }
        }

        let output = graph.output;
        Ok(Tensor {
            shape: self.shapes[output].clone(),
            dtype: ElementType::from(data_type),
            data: self.values[output].clone(),
        })
    }
}

/// `out = x @ W + b` for every row of `x`.
fn dense(x: &[f32], layer: &DenseLayer, out: &mut [f32]) {
    let (n_in, n_out) = (layer.in_features, layer.out_features);
    for (row, out_row) in x.chunks_exact(n_in).zip(out.chunks_exact_mut(n_out)) {
        out_row.copy_from_slice(&layer.bias);
        for (i, &xi) in row.iter().enumerate() {
            let weights = &layer.weights[i * n_out..(i + 1) * n_out];
            for (o, &w) in out_row.iter_mut().zip(weights) {
                *o += xi * w;
            }
        }
    }
}

fn mean_pool(x: &[f32], batch: usize, window: usize, channels: usize, out: &mut [f32]) {
    for b in 0..batch {
        let out_row = &mut out[b * channels..(b + 1) * channels];
        out_row.fill(0.0);
        let start = b * window * channels;
        for pixel in x[start..start + window * channels].chunks_exact(channels) {
            for (o, &v) in out_row.iter_mut().zip(pixel) {
                *o += v;
            }
        }
        let scale = 1.0 / window as f32;
        for o in out_row.iter_mut() {
            *o *= scale;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct AttentionDims {
    batch: usize,
    q_len: usize,
    kv_len: usize,
    dim: usize,
}

fn attention(q: &[f32], ctx: &[f32], dims: AttentionDims, scores: &mut [f32], out: &mut [f32]) {
    let AttentionDims {
        batch,
        q_len,
        kv_len,
        dim,
    } = dims;
    let scale = 1.0 / (dim as f32).sqrt();
    let scores = &mut scores[..kv_len];

    for b in 0..batch {
        let keys = &ctx[b * kv_len * dim..(b + 1) * kv_len * dim];
        for i in 0..q_len {
            let offset = (b * q_len + i) * dim;
            let query = &q[offset..offset + dim];
            for (score, key) in scores.iter_mut().zip(keys.chunks_exact(dim)) {
                *score = query.iter().zip(key).map(|(a, k)| a * k).sum::<f32>() * scale;
            }
            softmax_in_place(scores);

            let out_row = &mut out[offset..offset + dim];
            out_row.fill(0.0);
            for (&p, value) in scores.iter().zip(keys.chunks_exact(dim)) {
                for (o, &v) in out_row.iter_mut().zip(value) {
                    *o += p * v;
                }
            }
        }
    }
}

fn softmax_in_place(values: &mut [f32]) {
    let max_val = values.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let mut sum = 0.0f32;
    for val in values.iter_mut() {
        *val = (*val - max_val).exp();
        sum += *val;
    }
    for val in values.iter_mut() {
        *val /= sum;
    }
}

/// Rounds a host tensor to the precision it is being transferred at.
pub fn transfer(tensor: &Tensor, data_type: DataType) -> Tensor {
    let mut data = tensor.data.clone();
    data_type.round_slice(&mut data);
    Tensor {
        shape: tensor.shape.clone(),
        dtype: ElementType::from(data_type),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELTA: f32 = 1e-6;

    fn layer(weights: Vec<f32>, bias: Vec<f32>, n_in: usize, n_out: usize) -> DenseLayer {
        DenseLayer {
            in_features: n_in,
            out_features: n_out,
            weights,
            bias,
        }
    }

    #[test]
    fn test_dense_rows() {
        // W = [[1, 2], [3, 4], [5, 6]] as [in=3][out=2]
        let l = layer(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![0.5, -0.5], 3, 2);
        let x = vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        let mut out = vec![0.0; 4];
        dense(&x, &l, &mut out);
        assert_eq!(out, vec![6.5, 7.5, 3.5, 3.5]);
    }

    #[test]
    fn test_mean_pool() {
        // batch 1, window 2, channels 2
        let x = vec![1.0, 10.0, 3.0, 30.0];
        let mut out = vec![0.0; 2];
        mean_pool(&x, 1, 2, 2, &mut out);
        assert_eq!(out, vec![2.0, 20.0]);
    }

    #[test]
    fn test_attention_with_identical_keys_averages_values() {
        let dims = AttentionDims {
            batch: 1,
            q_len: 1,
            kv_len: 2,
            dim: 2,
        };
        let q = vec![0.0, 0.0];
        let ctx = vec![1.0, 2.0, 3.0, 4.0];
        let mut scores = vec![0.0; 2];
        let mut out = vec![0.0; 2];
        attention(&q, &ctx, dims, &mut scores, &mut out);
        assert!((out[0] - 2.0).abs() < DELTA);
        assert!((out[1] - 3.0).abs() < DELTA);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let mut values = vec![1.0, 2.0, 3.0];
        softmax_in_place(&mut values);
        let sum: f32 = values.iter().sum();
        assert!((sum - 1.0).abs() < DELTA);
        assert!(values[2] > values[1] && values[1] > values[0]);
    }

    #[test]
    fn test_transfer_rounds_to_precision() {
        let tensor = Tensor::new(vec![1], ElementType::F32, vec![1.0 + 1.0 / 4096.0]).unwrap();
        let moved = transfer(&tensor, DataType::Fp16);
        assert_eq!(moved.data, vec![1.0]);
        assert_eq!(moved.dtype, ElementType::F16);
    }
}

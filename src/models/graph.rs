//! Value graph executed by the device backends.
//!
//! Values are numbered registers. Registers `0..num_inputs` hold the model
//! inputs; every op writes exactly one new register.

use crate::activation::Activation;
use crate::errors::{ExecutionError, ExecutionResult};

pub type ValueId = usize;

/// One graph operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Appends a trailing dimension of size 1.
    Unsqueeze { src: ValueId, dst: ValueId },
    /// `dst = activation(src @ W + b)` over the last dimension.
    Dense {
        src: ValueId,
        dst: ValueId,
        layer: usize,
        activation: Option<Activation>,
    },
    /// Element-wise sum of two equally shaped values.
    Add {
        lhs: ValueId,
        rhs: ValueId,
        dst: ValueId,
    },
    /// Averages every dimension between the first and the last.
    MeanPool { src: ValueId, dst: ValueId },
    /// Scaled dot-product attention; keys and values are both `context`.
    Attention {
        query: ValueId,
        context: ValueId,
        dst: ValueId,
    },
}

/// Shape of one dense layer's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSpec {
    pub in_features: usize,
    pub out_features: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    pub num_inputs: usize,
    pub num_values: usize,
    pub ops: Vec<Op>,
    pub output: ValueId,
    pub layers: Vec<LayerSpec>,
}

impl Graph {
    /// Computes the shape of every value for concrete input shapes.
    pub fn infer_shapes(
        &self,
        model: &str,
        inputs: &[Vec<usize>],
    ) -> ExecutionResult<Vec<Vec<usize>>> {
        if inputs.len() != self.num_inputs {
            return Err(ExecutionError::InvalidInput {
                message: format!(
                    "{} expects {} inputs, got {}",
                    model,
                    self.num_inputs,
                    inputs.len()
                ),
            });
        }

        let mismatch = |expected: String, actual: &[usize]| ExecutionError::ShapeMismatch {
            model: model.to_string(),
            expected,
            actual: actual.to_vec(),
        };

        let mut shapes: Vec<Vec<usize>> = vec![Vec::new(); self.num_values];
        shapes[..inputs.len()].clone_from_slice(inputs);

        for op in &self.ops {
            match *op {
                Op::Unsqueeze { src, dst } => {
                    let mut shape = shapes[src].clone();
                    shape.push(1);
                    shapes[dst] = shape;
                }
                Op::Dense { src, dst, layer, .. } => {
                    let spec = self.layers[layer];
                    let shape = &shapes[src];
                    if shape.last() != Some(&spec.in_features) {
                        return Err(mismatch(
                            format!("[..., {}]", spec.in_features),
                            shape,
                        ));
                    }
                    let mut out = shape.clone();
                    if let Some(last) = out.last_mut() {
                        *last = spec.out_features;
                    }
                    shapes[dst] = out;
                }
                Op::Add { lhs, rhs, dst } => {
                    if shapes[lhs] != shapes[rhs] {
                        return Err(mismatch(format!("{:?}", shapes[lhs]), &shapes[rhs]));
                    }
                    shapes[dst] = shapes[lhs].clone();
                }
                Op::MeanPool { src, dst } => {
                    let shape = &shapes[src];
                    if shape.len() < 3 {
                        return Err(mismatch("rank >= 3".to_string(), shape));
                    }
                    shapes[dst] = vec![shape[0], shape[shape.len() - 1]];
                }
                Op::Attention {
                    query,
                    context,
                    dst,
                } => {
                    let (q, c) = (&shapes[query], &shapes[context]);
                    if q.len() != 3 {
                        return Err(mismatch("[batch, seq, dim]".to_string(), q));
                    }
                    if c.len() != 3 || c[0] != q[0] || c[2] != q[2] {
                        return Err(mismatch(format!("[{}, seq, {}]", q[0], q[2]), c));
                    }
                    shapes[dst] = q.clone();
                }
            }
        }

        if shapes.iter().flatten().any(|&dim| dim == 0) {
            return Err(ExecutionError::InvalidInput {
                message: format!("{} received a zero-sized dimension", model),
            });
        }

        Ok(shapes)
    }
}

/// Incremental graph construction used by the model families.
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new(num_inputs: usize) -> Self {
        Self {
            graph: Graph {
                num_inputs,
                num_values: num_inputs,
                ops: Vec::new(),
                output: 0,
                layers: Vec::new(),
            },
        }
    }

    pub fn input(&self, index: usize) -> ValueId {
        assert!(index < self.graph.num_inputs, "input index out of range");
        index
    }

    fn next_value(&mut self) -> ValueId {
        let id = self.graph.num_values;
        self.graph.num_values += 1;
        id
    }

    pub fn unsqueeze(&mut self, src: ValueId) -> ValueId {
        let dst = self.next_value();
        self.graph.ops.push(Op::Unsqueeze { src, dst });
        dst
    }

    pub fn dense(
        &mut self,
        src: ValueId,
        in_features: usize,
        out_features: usize,
        activation: Option<Activation>,
    ) -> ValueId {
        let layer = self.graph.layers.len();
        self.graph.layers.push(LayerSpec {
            in_features,
            out_features,
        });
        let dst = self.next_value();
        self.graph.ops.push(Op::Dense {
            src,
            dst,
            layer,
            activation,
        });
        dst
    }

    pub fn add(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        let dst = self.next_value();
        self.graph.ops.push(Op::Add { lhs, rhs, dst });
        dst
    }

    pub fn mean_pool(&mut self, src: ValueId) -> ValueId {
        let dst = self.next_value();
        self.graph.ops.push(Op::MeanPool { src, dst });
        dst
    }

    pub fn attention(&mut self, query: ValueId, context: ValueId) -> ValueId {
        let dst = self.next_value();
        self.graph.ops.push(Op::Attention {
            query,
            context,
            dst,
        });
        dst
    }

    pub fn finish(mut self, output: ValueId) -> Graph {
        self.graph.output = output;
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_graph() -> Graph {
        let mut builder = GraphBuilder::new(1);
        let x = builder.input(0);
        let h = builder.dense(x, 3, 4, Some(Activation::Relu));
        let r = builder.dense(h, 4, 4, None);
        let s = builder.add(h, r);
        let p = builder.mean_pool(s);
        builder.finish(p)
    }

    #[test]
    fn test_builder_numbers_values_sequentially() {
        let graph = small_graph();
        assert_eq!(graph.num_values, 5);
        assert_eq!(graph.output, 4);
        assert_eq!(graph.layers.len(), 2);
    }

    #[test]
    fn test_infer_shapes() {
        let graph = small_graph();
        let shapes = graph.infer_shapes("small", &[vec![2, 5, 5, 3]]).unwrap();
        assert_eq!(shapes[1], vec![2, 5, 5, 4]);
        assert_eq!(shapes[4], vec![2, 4]);
    }

    #[test]
    fn test_infer_shapes_rejects_wrong_feature_dim() {
        let graph = small_graph();
        let result = graph.infer_shapes("small", &[vec![2, 5, 5, 7]]);
        assert!(matches!(result, Err(ExecutionError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_infer_shapes_rejects_wrong_input_count() {
        let graph = small_graph();
        let result = graph.infer_shapes("small", &[]);
        assert!(matches!(result, Err(ExecutionError::InvalidInput { .. })));
    }

    #[test]
    fn test_attention_shapes() {
        let mut builder = GraphBuilder::new(2);
        let (q, c) = (builder.input(0), builder.input(1));
        let out = builder.attention(q, c);
        let graph = builder.finish(out);

        let shapes = graph
            .infer_shapes("attn", &[vec![2, 3, 8], vec![2, 5, 8]])
            .unwrap();
        assert_eq!(shapes[out], vec![2, 3, 8]);

        let result = graph.infer_shapes("attn", &[vec![2, 3, 8], vec![2, 5, 4]]);
        assert!(matches!(result, Err(ExecutionError::ShapeMismatch { .. })));
    }
}

//! BERT-Large proxy: token embedding, one self-attention encoder block, output projection.

use super::graph::{Graph, GraphBuilder};
use crate::activation::Activation;

pub const SEQUENCE_LENGTH: usize = 384;
pub const HIDDEN: usize = 256;
pub const OUTPUT_HIDDEN: usize = 1024;

pub fn graph() -> Graph {
    let mut builder = GraphBuilder::new(1);
    let tokens = builder.input(0);

    let features = builder.unsqueeze(tokens);
    let embedded = builder.dense(features, 1, HIDDEN, Some(Activation::Gelu));
    let query = builder.dense(embedded, HIDDEN, HIDDEN, None);
    let attended = builder.attention(query, embedded);
    let x = builder.add(embedded, attended);
    let ffn = builder.dense(x, HIDDEN, HIDDEN, Some(Activation::Gelu));
    let x = builder.add(x, ffn);
    let hidden_states = builder.dense(x, HIDDEN, OUTPUT_HIDDEN, Some(Activation::Tanh));

    builder.finish(hidden_states)
}

pub fn input_shapes(batch_size: usize) -> Vec<Vec<usize>> {
    vec![vec![batch_size, SEQUENCE_LENGTH]]
}

pub fn output_shapes(batch_size: usize) -> Vec<Vec<usize>> {
    vec![vec![batch_size, SEQUENCE_LENGTH, OUTPUT_HIDDEN]]
}

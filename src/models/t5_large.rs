//! T5-Large proxy: encoder self-attention, decoder cross-attention, output projection.
//!
//! Takes two inputs, encoder tokens and decoder tokens.

use super::graph::{Graph, GraphBuilder};
use crate::activation::Activation;

pub const SEQUENCE_LENGTH: usize = 512;
pub const HIDDEN: usize = 256;
pub const OUTPUT_HIDDEN: usize = 1024;

pub fn graph() -> Graph {
    let mut builder = GraphBuilder::new(2);
    let encoder_tokens = builder.input(0);
    let decoder_tokens = builder.input(1);

    let enc = builder.unsqueeze(encoder_tokens);
    let enc = builder.dense(enc, 1, HIDDEN, Some(Activation::Gelu));
    let enc_attended = builder.attention(enc, enc);
    let encoded = builder.add(enc, enc_attended);

    let dec = builder.unsqueeze(decoder_tokens);
    let dec = builder.dense(dec, 1, HIDDEN, Some(Activation::Gelu));
    let cross = builder.attention(dec, encoded);
    let x = builder.add(dec, cross);
    let ffn = builder.dense(x, HIDDEN, HIDDEN, Some(Activation::Relu));
    let x = builder.add(x, ffn);
    let hidden_states = builder.dense(x, HIDDEN, OUTPUT_HIDDEN, None);

    builder.finish(hidden_states)
}

pub fn input_shapes(batch_size: usize) -> Vec<Vec<usize>> {
    vec![
        vec![batch_size, SEQUENCE_LENGTH],
        vec![batch_size, SEQUENCE_LENGTH],
    ]
}

pub fn output_shapes(batch_size: usize) -> Vec<Vec<usize>> {
    vec![vec![batch_size, SEQUENCE_LENGTH, OUTPUT_HIDDEN]]
}

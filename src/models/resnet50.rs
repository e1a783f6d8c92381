//! ResNet50 proxy: 1x1 stem, two residual blocks, global average pool, classifier.

use super::graph::{Graph, GraphBuilder};
use crate::activation::Activation;

pub const IMAGE_SIZE: usize = 224;
pub const CHANNELS: usize = 3;
pub const STEM_WIDTH: usize = 64;
pub const NUM_CLASSES: usize = 1000;

pub fn graph() -> Graph {
    let mut builder = GraphBuilder::new(1);
    let image = builder.input(0);

    let stem = builder.dense(image, CHANNELS, STEM_WIDTH, Some(Activation::Relu));
    let mut x = stem;
    for _ in 0..2 {
        let branch = builder.dense(x, STEM_WIDTH, STEM_WIDTH, Some(Activation::Relu));
        x = builder.add(x, branch);
    }
    let pooled = builder.mean_pool(x);
    let logits = builder.dense(pooled, STEM_WIDTH, NUM_CLASSES, None);

    builder.finish(logits)
}

pub fn input_shapes(batch_size: usize) -> Vec<Vec<usize>> {
    vec![vec![batch_size, IMAGE_SIZE, IMAGE_SIZE, CHANNELS]]
}

pub fn output_shapes(batch_size: usize) -> Vec<Vec<usize>> {
    vec![vec![batch_size, NUM_CLASSES]]
}

//! WGSL sources for the GPU backend.
//!
//! Every kernel is a standalone module with a `main` entry point, one thread
//! per output element, and a 2D dispatch folded into a linear index so large
//! tensors stay within the per-dimension workgroup limit.

use crate::registry::DataType;

/// Threads per workgroup for every kernel.
pub const WORKGROUP_SIZE: u32 = 64;

/// Kernels used by the GPU executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    Dense,
    Add,
    MeanPool,
    AttentionScores,
    SoftmaxRows,
    AttentionOutput,
}

impl Kernel {
    pub const ALL: [Kernel; 6] = [
        Kernel::Dense,
        Kernel::Add,
        Kernel::MeanPool,
        Kernel::AttentionScores,
        Kernel::SoftmaxRows,
        Kernel::AttentionOutput,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Kernel::Dense => "dense",
            Kernel::Add => "add",
            Kernel::MeanPool => "mean_pool",
            Kernel::AttentionScores => "attention_scores",
            Kernel::SoftmaxRows => "softmax_rows",
            Kernel::AttentionOutput => "attention_output",
        }
    }

    fn body(self) -> &'static str {
        match self {
            Kernel::Dense => DENSE,
            Kernel::Add => ADD,
            Kernel::MeanPool => MEAN_POOL,
            Kernel::AttentionScores => ATTENTION_SCORES,
            Kernel::SoftmaxRows => SOFTMAX_ROWS,
            Kernel::AttentionOutput => ATTENTION_OUTPUT,
        }
    }
}

fn precision_id(data_type: DataType) -> u32 {
    match data_type {
        DataType::Fp32 => 0,
        DataType::Fp16 => 1,
        DataType::Bf16 => 2,
    }
}

/// Full WGSL source of one kernel specialized to a precision.
pub fn kernel_wgsl(kernel: Kernel, data_type: DataType) -> String {
    format!(
        r#"// {label} kernel
const WORKGROUP_SIZE: u32 = {workgroup_size}u;
const PRECISION: u32 = {precision}u;

struct Params {{
    a: u32,
    b: u32,
    c: u32,
    d: u32,
}}

{common}
{body}"#,
        label = kernel.label(),
        workgroup_size = WORKGROUP_SIZE,
        precision = precision_id(data_type),
        common = COMMON,
        body = kernel.body(),
    )
}

const COMMON: &str = r#"
fn quantize(x: f32) -> f32 {
    if (PRECISION == 1u) {
        return unpack2x16float(pack2x16float(vec2<f32>(x, 0.0))).x;
    }
    if (PRECISION == 2u) {
        let bits = bitcast<u32>(x);
        let rounded = bits + 0x7FFFu + ((bits >> 16u) & 1u);
        return bitcast<f32>(rounded & 0xFFFF0000u);
    }
    return x;
}

fn activate(x: f32, kind: u32) -> f32 {
    if (kind == 1u) {
        return max(x, 0.0);
    }
    if (kind == 2u) {
        return 0.5 * x * (1.0 + tanh(0.7978846 * (x + 0.044715 * x * x * x)));
    }
    if (kind == 3u) {
        return tanh(x);
    }
    if (kind == 4u) {
        return 1.0 / (1.0 + exp(-x));
    }
    return x;
}

fn linear_index(gid: vec3<u32>, nwg: vec3<u32>) -> u32 {
    return gid.y * nwg.x * WORKGROUP_SIZE + gid.x;
}
"#;

// params: a = rows, b = in_features, c = out_features, d = activation
const DENSE: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<f32>;
@group(0) @binding(1) var<storage, read> weights: array<f32>;
@group(0) @binding(2) var<storage, read> bias: array<f32>;
@group(0) @binding(3) var<storage, read_write> dst: array<f32>;
@group(0) @binding(4) var<uniform> params: Params;

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let idx = linear_index(gid, nwg);
    if (idx >= params.a * params.c) {
        return;
    }
    let row = idx / params.c;
    let col = idx % params.c;
    var acc = bias[col];
    for (var i = 0u; i < params.b; i = i + 1u) {
        acc = acc + src[row * params.b + i] * weights[i * params.c + col];
    }
    dst[idx] = quantize(activate(acc, params.d));
}
"#;

// params: a = length
const ADD: &str = r#"
@group(0) @binding(0) var<storage, read> lhs: array<f32>;
@group(0) @binding(1) var<storage, read> rhs: array<f32>;
@group(0) @binding(2) var<storage, read_write> dst: array<f32>;
@group(0) @binding(3) var<uniform> params: Params;

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let idx = linear_index(gid, nwg);
    if (idx >= params.a) {
        return;
    }
    dst[idx] = quantize(lhs[idx] + rhs[idx]);
}
"#;

// params: a = batch, b = window, c = channels
const MEAN_POOL: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<f32>;
@group(0) @binding(2) var<uniform> params: Params;

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let idx = linear_index(gid, nwg);
    if (idx >= params.a * params.c) {
        return;
    }
    let batch = idx / params.c;
    let channel = idx % params.c;
    let base = batch * params.b * params.c;
    var acc = 0.0;
    for (var p = 0u; p < params.b; p = p + 1u) {
        acc = acc + src[base + p * params.c + channel];
    }
    dst[idx] = quantize(acc / f32(params.b));
}
"#;

// params: a = batch, b = q_len, c = kv_len, d = dim
const ATTENTION_SCORES: &str = r#"
@group(0) @binding(0) var<storage, read> query: array<f32>;
@group(0) @binding(1) var<storage, read> ctx: array<f32>;
@group(0) @binding(2) var<storage, read_write> scores: array<f32>;
@group(0) @binding(3) var<uniform> params: Params;

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let idx = linear_index(gid, nwg);
    if (idx >= params.a * params.b * params.c) {
        return;
    }
    let batch = idx / (params.b * params.c);
    let i = (idx / params.c) % params.b;
    let j = idx % params.c;
    let q_base = (batch * params.b + i) * params.d;
    let k_base = (batch * params.c + j) * params.d;
    var acc = 0.0;
    for (var k = 0u; k < params.d; k = k + 1u) {
        acc = acc + query[q_base + k] * ctx[k_base + k];
    }
    scores[idx] = acc / sqrt(f32(params.d));
}
"#;

// params: a = rows, b = row length
const SOFTMAX_ROWS: &str = r#"
@group(0) @binding(0) var<storage, read_write> scores: array<f32>;
@group(0) @binding(1) var<uniform> params: Params;

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let row = linear_index(gid, nwg);
    if (row >= params.a) {
        return;
    }
    let base = row * params.b;
    var max_val = scores[base];
    for (var j = 1u; j < params.b; j = j + 1u) {
        max_val = max(max_val, scores[base + j]);
    }
    var sum = 0.0;
    for (var j = 0u; j < params.b; j = j + 1u) {
        let e = exp(scores[base + j] - max_val);
        scores[base + j] = e;
        sum = sum + e;
    }
    for (var j = 0u; j < params.b; j = j + 1u) {
        scores[base + j] = scores[base + j] / sum;
    }
}
"#;

// params: a = batch, b = q_len, c = kv_len, d = dim
const ATTENTION_OUTPUT: &str = r#"
@group(0) @binding(0) var<storage, read> scores: array<f32>;
@group(0) @binding(1) var<storage, read> ctx: array<f32>;
@group(0) @binding(2) var<storage, read_write> dst: array<f32>;
@group(0) @binding(3) var<uniform> params: Params;

@compute @workgroup_size(WORKGROUP_SIZE)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let idx = linear_index(gid, nwg);
    if (idx >= params.a * params.b * params.d) {
        return;
    }
    let batch = idx / (params.b * params.d);
    let i = (idx / params.d) % params.b;
    let channel = idx % params.d;
    let s_base = (batch * params.b + i) * params.c;
    var acc = 0.0;
    for (var j = 0u; j < params.c; j = j + 1u) {
        acc = acc + scores[s_base + j] * ctx[(batch * params.c + j) * params.d + channel];
    }
    dst[idx] = quantize(acc);
}
"#;

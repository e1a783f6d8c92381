//! Activation functions applied by dense layers.
//!
//! The CPU backend evaluates these directly; the GPU backend selects the same
//! function in WGSL through [`Activation::gpu_id`].

/// Element-wise activation. `None` on a layer means identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Rectified Linear Unit: f(x) = max(0, x).
    Relu,
    /// Gaussian Error Linear Unit, tanh approximation:
    ///
    /// ```text
    /// 0.5 * x * (1 + tanh(sqrt(2/pi) * (x + 0.044715 * x^3)))
    /// ```
    Gelu,
    /// Hyperbolic tangent.
    Tanh,
    /// Logistic sigmoid: f(x) = 1 / (1 + exp(-x)).
    Sigmoid,
}

const SQRT_2_OVER_PI: f32 = 0.797_884_6;

/// Activation ids matching the WGSL `activate` function.
pub mod gpu_ids {
    pub const NONE: u32 = 0x00;
    pub const RELU: u32 = 0x01;
    pub const GELU: u32 = 0x02;
    pub const TANH: u32 = 0x03;
    pub const SIGMOID: u32 = 0x04;
}

impl Activation {
    pub fn apply_single(self, x: f32) -> f32 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Gelu => 0.5 * x * (1.0 + (SQRT_2_OVER_PI * (x + 0.044715 * x * x * x)).tanh()),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }

    pub fn apply_in_place(self, values: &mut [f32]) {
        for value in values.iter_mut() {
            *value = self.apply_single(*value);
        }
    }

    /// Id passed to the GPU kernels for an optional activation.
    pub fn gpu_id(activation: Option<Activation>) -> u32 {
        match activation {
            None => gpu_ids::NONE,
            Some(Activation::Relu) => gpu_ids::RELU,
            Some(Activation::Gelu) => gpu_ids::GELU,
            Some(Activation::Tanh) => gpu_ids::TANH,
            Some(Activation::Sigmoid) => gpu_ids::SIGMOID,
        }
    }
}

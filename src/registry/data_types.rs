//! Framework and precision identifiers shared by model definitions.

use half::{bf16, f16};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric precision a model is built and executed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Fp32,
    Fp16,
    Bf16,
}

impl DataType {
    pub const ALL: [DataType; 3] = [DataType::Fp32, DataType::Fp16, DataType::Bf16];

    /// Rounds an f32 to the nearest value representable at this precision.
    pub fn round(self, value: f32) -> f32 {
        match self {
            DataType::Fp32 => value,
            DataType::Fp16 => f16::from_f32(value).to_f32(),
            DataType::Bf16 => bf16::from_f32(value).to_f32(),
        }
    }

    /// Rounds every value of a slice in place.
    pub fn round_slice(self, values: &mut [f32]) {
        if self == DataType::Fp32 {
            return;
        }
        for value in values.iter_mut() {
            *value = self.round(*value);
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Fp32 => "FP32",
            DataType::Fp16 => "FP16",
            DataType::Bf16 => "BF16",
        };
        write!(f, "{}", name)
    }
}

/// Framework a model definition was authored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Framework {
    Jax,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framework::Jax => write!(f, "JAX"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fp32_round_is_identity() {
        assert_eq!(DataType::Fp32.round(0.1), 0.1);
    }

    #[test]
    fn test_reduced_precision_rounding() {
        // 1 + 2^-12 is below f16 and bf16 resolution at 1.0
        let value = 1.0 + 1.0 / 4096.0;
        assert_eq!(DataType::Fp16.round(value), 1.0);
        assert_eq!(DataType::Bf16.round(value), 1.0);
        // f16 resolves 2^-10 near 1.0, bf16 only 2^-7
        let value = 1.0 + 1.0 / 512.0;
        assert_eq!(DataType::Fp16.round(value), value);
        assert_eq!(DataType::Bf16.round(value), 1.0);
    }

    #[test]
    fn test_display_and_serde_names_agree() {
        for data_type in DataType::ALL {
            let json = serde_json::to_string(&data_type).unwrap();
            assert_eq!(json, format!("\"{}\"", data_type));
        }
    }
}

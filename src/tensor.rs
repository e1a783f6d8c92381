//! Host tensors and tensor dimension strings.

use crate::errors::{ArtifactError, ArtifactResult};
use crate::registry::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type named in a dimension string. Values are always held as f32
/// on the host, rounded to the element type's precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    F32,
    F16,
    Bf16,
}

impl ElementType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "f32" => Some(ElementType::F32),
            "f16" => Some(ElementType::F16),
            "bf16" => Some(ElementType::Bf16),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::F32 => "f32",
            ElementType::F16 => "f16",
            ElementType::Bf16 => "bf16",
        }
    }

    pub fn data_type(self) -> DataType {
        match self {
            ElementType::F32 => DataType::Fp32,
            ElementType::F16 => DataType::Fp16,
            ElementType::Bf16 => DataType::Bf16,
        }
    }
}

impl From<DataType> for ElementType {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::Fp32 => ElementType::F32,
            DataType::Fp16 => ElementType::F16,
            DataType::Bf16 => ElementType::Bf16,
        }
    }
}

/// A parsed dimension string such as `1x224x224x3xf32`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorShape {
    pub dims: Vec<usize>,
    pub element_type: ElementType,
}

impl TensorShape {
    pub fn new(dims: Vec<usize>, element_type: ElementType) -> Self {
        Self { dims, element_type }
    }

    pub fn parse(dimensions: &str) -> ArtifactResult<Self> {
        let invalid = |message: &str| ArtifactError::InvalidDimensions {
            dimensions: dimensions.to_string(),
            message: message.to_string(),
        };

        let (dims, element) = dimensions
            .rsplit_once('x')
            .ok_or_else(|| invalid("expected <dim>x...x<element type>"))?;
        let element_type =
            ElementType::parse(element).ok_or_else(|| invalid("unknown element type"))?;
        let dims = dims
            .split('x')
            .map(|dim| dim.parse::<usize>().map_err(|_| invalid("non-numeric dimension")))
            .collect::<ArtifactResult<Vec<_>>>()?;

        Ok(Self { dims, element_type })
    }

    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for dim in &self.dims {
            write!(f, "{}x", dim)?;
        }
        write!(f, "{}", self.element_type.name())
    }
}

/// Dense row-major host tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub dtype: ElementType,
    pub data: Vec<f32>,
}

impl Tensor {
    /// Creates a tensor, rounding `data` to the precision of `dtype`.
    ///
    /// Returns `None` when the data length does not match the shape.
    pub fn new(shape: Vec<usize>, dtype: ElementType, mut data: Vec<f32>) -> Option<Self> {
        if shape.iter().product::<usize>() != data.len() {
            return None;
        }
        dtype.data_type().round_slice(&mut data);
        Some(Self { shape, dtype, data })
    }

    pub fn filled(shape: Vec<usize>, dtype: ElementType, value: f32) -> Self {
        let len = shape.iter().product();
        let value = dtype.data_type().round(value);
        Self {
            shape,
            dtype,
            data: vec![value; len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn max_abs(&self) -> f32 {
        self.data.iter().fold(0.0f32, |acc, v| acc.max(v.abs()))
    }
}

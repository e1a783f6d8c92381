//! Model definitions and the immutable table they are looked up in.

use super::data_types::{DataType, Framework};
use super::unique_ids;
use crate::errors::{ArtifactResult, HarnessError, HarnessResult};
use crate::models::ModelFamily;
use crate::tensor::{ElementType, TensorShape};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Cached tensors of one side (inputs or outputs) of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    /// Directory name of the tensors inside the artifact cache.
    pub artifact_id: String,
    /// One entry per tensor, e.g. `"1x224x224x3xf32"`.
    pub tensor_dimensions: Vec<String>,
}

impl TensorSpec {
    /// Parses every dimension string.
    pub fn shapes(&self) -> ArtifactResult<Vec<TensorShape>> {
        self.tensor_dimensions
            .iter()
            .map(|dimensions| TensorShape::parse(dimensions))
            .collect()
    }
}

/// Properties shared by every batch size of one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaModel {
    pub framework: Framework,
    pub data_type: DataType,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One benchmarkable model variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub id: String,
    pub name: String,
    pub meta_model: MetaModel,
    pub input_batch_size: usize,
    pub inputs: TensorSpec,
    pub outputs: TensorSpec,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DefinitionsFile {
    definitions: Vec<ModelDefinition>,
}

/// Immutable `id -> definition` table, built once at process start.
#[derive(Debug, Clone)]
pub struct ModelDefinitionTable {
    definitions: BTreeMap<String, ModelDefinition>,
}

impl ModelDefinitionTable {
    pub fn from_definitions(definitions: Vec<ModelDefinition>) -> Self {
        Self {
            definitions: definitions
                .into_iter()
                .map(|definition| (definition.id.clone(), definition))
                .collect(),
        }
    }

    /// Loads a table from a JSON file of the form `{"definitions": [...]}`.
    pub fn from_json_file(path: &Path) -> HarnessResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| HarnessError::Definitions {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let file: DefinitionsFile =
            serde_json::from_str(&content).map_err(|e| HarnessError::Definitions {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::from_definitions(file.definitions))
    }

    /// The built-in JAX model suite.
    pub fn builtin() -> Self {
        let mut definitions = Vec::new();
        for (family, model_ids) in builtin_model_ids() {
            for (data_type, model_id) in DataType::ALL.into_iter().zip(model_ids) {
                for &batch_size in family.builtin_batch_sizes() {
                    definitions.push(builtin_definition(family, data_type, model_id, batch_size));
                }
            }
        }
        Self::from_definitions(definitions)
    }

    pub fn get(&self, id: &str) -> Option<&ModelDefinition> {
        self.definitions.get(id)
    }

    /// All known ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Model ids per family, ordered like [`DataType::ALL`].
pub(crate) fn builtin_model_ids() -> [(ModelFamily, [&'static str; 3]); 3] {
    [
        (
            ModelFamily::Resnet50,
            [
                unique_ids::MODEL_RESNET50_FP32_JAX,
                unique_ids::MODEL_RESNET50_FP16_JAX,
                unique_ids::MODEL_RESNET50_BF16_JAX,
            ],
        ),
        (
            ModelFamily::BertLarge,
            [
                unique_ids::MODEL_BERT_LARGE_FP32_JAX,
                unique_ids::MODEL_BERT_LARGE_FP16_JAX,
                unique_ids::MODEL_BERT_LARGE_BF16_JAX,
            ],
        ),
        (
            ModelFamily::T5Large,
            [
                unique_ids::MODEL_T5_LARGE_FP32_JAX,
                unique_ids::MODEL_T5_LARGE_FP16_JAX,
                unique_ids::MODEL_T5_LARGE_BF16_JAX,
            ],
        ),
    ]
}

fn builtin_definition(
    family: ModelFamily,
    data_type: DataType,
    model_id: &str,
    batch_size: usize,
) -> ModelDefinition {
    let id = unique_ids::benchmark_id(model_id, batch_size);
    let element_type = ElementType::from(data_type);
    let dimensions = |shapes: Vec<Vec<usize>>| -> Vec<String> {
        shapes
            .into_iter()
            .map(|dims| TensorShape::new(dims, element_type).to_string())
            .collect()
    };

    ModelDefinition {
        name: format!("{}_{}_JAX_BATCH{}", family.name(), data_type, batch_size),
        meta_model: MetaModel {
            framework: Framework::Jax,
            data_type,
            tags: vec![family.tag().to_string()],
        },
        input_batch_size: batch_size,
        inputs: TensorSpec {
            artifact_id: format!("{}-inputs", id),
            tensor_dimensions: dimensions(family.input_shapes(batch_size)),
        },
        outputs: TensorSpec {
            artifact_id: format!("{}-outputs", id),
            tensor_dimensions: dimensions(family.output_shapes(batch_size)),
        },
        tags: vec![format!("batch-{}", batch_size)],
        id,
    }
}

//! Benchmark identifier resolution.

use super::model_definitions::{ModelDefinition, ModelDefinitionTable, builtin_model_ids};
use crate::errors::{LookupError, LookupResult};
use crate::models::ModelFamily;

/// Immutable mapping from model-id prefixes to the family that runs them.
#[derive(Debug, Clone)]
pub struct FamilyTable {
    entries: Vec<(Vec<String>, ModelFamily)>,
}

impl FamilyTable {
    pub fn new(entries: Vec<(Vec<String>, ModelFamily)>) -> Self {
        Self { entries }
    }

    /// Every family this crate can execute, keyed by its built-in model ids.
    pub fn supported() -> Self {
        Self::new(
            builtin_model_ids()
                .into_iter()
                .map(|(family, ids)| (ids.iter().map(|id| id.to_string()).collect(), family))
                .collect(),
        )
    }

    /// Returns the first family with a model id that prefixes `benchmark_id`.
    pub fn family_for(&self, benchmark_id: &str) -> Option<ModelFamily> {
        self.entries
            .iter()
            .find(|(model_ids, _)| {
                model_ids
                    .iter()
                    .any(|model_id| benchmark_id.starts_with(model_id.as_str()))
            })
            .map(|(_, family)| *family)
    }
}

/// A resolved benchmark: family display name, family, and definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBenchmark {
    pub model_name: &'static str,
    pub family: ModelFamily,
    pub definition: ModelDefinition,
}

/// Resolves benchmark ids against injected definition and family tables.
#[derive(Debug, Clone)]
pub struct BenchmarkLookup {
    definitions: ModelDefinitionTable,
    families: FamilyTable,
}

impl BenchmarkLookup {
    pub fn new(definitions: ModelDefinitionTable, families: FamilyTable) -> Self {
        Self {
            definitions,
            families,
        }
    }

    pub fn definitions(&self) -> &ModelDefinitionTable {
        &self.definitions
    }

    pub fn lookup(&self, benchmark_id: &str) -> LookupResult<ResolvedBenchmark> {
        let definition =
            self.definitions
                .get(benchmark_id)
                .ok_or_else(|| LookupError::UnknownBenchmark {
                    id: benchmark_id.to_string(),
                    known: self.definitions.ids(),
                })?;

        let family =
            self.families
                .family_for(benchmark_id)
                .ok_or_else(|| LookupError::UnsupportedModel {
                    id: benchmark_id.to_string(),
                })?;

        Ok(ResolvedBenchmark {
            model_name: family.name(),
            family,
            definition: definition.clone(),
        })
    }
}

impl Default for BenchmarkLookup {
    fn default() -> Self {
        Self::new(ModelDefinitionTable::builtin(), FamilyTable::supported())
    }
}

//! Model registry: definitions, identifiers, and benchmark lookup.

pub mod data_types;
pub mod lookup;
pub mod model_definitions;
pub mod unique_ids;

pub use data_types::{DataType, Framework};
pub use lookup::{BenchmarkLookup, FamilyTable, ResolvedBenchmark};
pub use model_definitions::{MetaModel, ModelDefinition, ModelDefinitionTable, TensorSpec};

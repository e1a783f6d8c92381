//! Benchmark id resolution against built-in and injected tables.

use framework_bench::errors::LookupError;
use framework_bench::models::ModelFamily;
use framework_bench::registry::unique_ids::{self, benchmark_id};
use framework_bench::registry::{
    BenchmarkLookup, DataType, FamilyTable, Framework, MetaModel, ModelDefinition,
    ModelDefinitionTable, TensorSpec,
};

fn definition(id: &str) -> ModelDefinition {
    ModelDefinition {
        id: id.to_string(),
        name: id.to_uppercase(),
        meta_model: MetaModel {
            framework: Framework::Jax,
            data_type: DataType::Fp32,
            tags: vec![],
        },
        input_batch_size: 1,
        inputs: TensorSpec {
            artifact_id: format!("{}-inputs", id),
            tensor_dimensions: vec!["1x8xf32".to_string()],
        },
        outputs: TensorSpec {
            artifact_id: format!("{}-outputs", id),
            tensor_dimensions: vec!["1x8x1024xf32".to_string()],
        },
        tags: vec![],
    }
}

#[test]
fn test_lookup_resolves_every_builtin_id() {
    let lookup = BenchmarkLookup::default();
    for id in lookup.definitions().ids() {
        let resolved = lookup.lookup(&id).unwrap();
        assert_eq!(resolved.definition.id, id);
        assert_eq!(resolved.model_name, resolved.family.name());
    }
}

#[test]
fn test_lookup_maps_prefix_to_family() {
    let lookup = BenchmarkLookup::default();

    let id = benchmark_id(unique_ids::MODEL_T5_LARGE_BF16_JAX, 16);
    let resolved = lookup.lookup(&id).unwrap();
    assert_eq!(resolved.model_name, "T5_LARGE");
    assert_eq!(resolved.family, ModelFamily::T5Large);
    assert_eq!(resolved.definition.meta_model.data_type, DataType::Bf16);
    assert_eq!(resolved.definition.inputs.tensor_dimensions.len(), 2);
}

#[test]
fn test_lookup_is_deterministic() {
    let lookup = BenchmarkLookup::default();
    let id = benchmark_id(unique_ids::MODEL_RESNET50_FP16_JAX, 64);
    assert_eq!(lookup.lookup(&id).unwrap(), lookup.lookup(&id).unwrap());
}

#[test]
fn test_unknown_id_lists_known_ids() {
    let lookup = BenchmarkLookup::default();
    let err = lookup.lookup("NOT-A-MODEL").unwrap_err();

    match &err {
        LookupError::UnknownBenchmark { id, known } => {
            assert_eq!(id, "NOT-A-MODEL");
            assert_eq!(known.len(), lookup.definitions().len());
        }
        other => panic!("unexpected error {:?}", other),
    }

    let message = err.to_string();
    assert!(message.starts_with("Id NOT-A-MODEL does not exist in model suite."));
    assert!(message.contains("\n  RESNET50-fp32-JAX-batch1"));
}

#[test]
fn test_registered_id_without_family_is_unsupported() {
    let table = ModelDefinitionTable::from_definitions(vec![definition("MOBILENET-fp32-JAX-batch1")]);
    let lookup = BenchmarkLookup::new(table, FamilyTable::supported());

    let err = lookup.lookup("MOBILENET-fp32-JAX-batch1").unwrap_err();
    assert!(matches!(err, LookupError::UnsupportedModel { .. }));

    let unknown = lookup.lookup("missing").unwrap_err();
    assert_ne!(err.to_string(), unknown.to_string());
    assert!(err.to_string().contains("not supported"));
}

#[test]
fn test_injected_family_table() {
    let id = "CUSTOM-fp32-JAX-batch1";
    let table = ModelDefinitionTable::from_definitions(vec![definition(id)]);
    let families = FamilyTable::new(vec![(vec!["CUSTOM-".to_string()], ModelFamily::BertLarge)]);
    let lookup = BenchmarkLookup::new(table, families);

    let resolved = lookup.lookup(id).unwrap();
    assert_eq!(resolved.family, ModelFamily::BertLarge);
    assert_eq!(resolved.model_name, "BERT_LARGE");
}

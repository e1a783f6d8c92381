//! On-disk cache of model input and expected-output tensors.
//!
//! Layout: `<cache_dir>/<artifact_id>/<index>.json`, one tensor per file.

use crate::errors::{ArtifactError, ArtifactResult};
use crate::registry::TensorSpec;
use crate::tensor::{Tensor, TensorShape};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};

pub fn artifact_dir(spec: &TensorSpec, cache_dir: &Path) -> PathBuf {
    cache_dir.join(&spec.artifact_id)
}

fn tensor_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{}.json", index))
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn check_shape(
    spec: &TensorSpec,
    index: usize,
    expected: &TensorShape,
    tensor: &Tensor,
) -> ArtifactResult<()> {
    if tensor.shape != expected.dims || tensor.len() != expected.num_elements() {
        return Err(ArtifactError::ShapeMismatch {
            artifact_id: spec.artifact_id.clone(),
            index,
            expected: expected.dims.clone(),
            actual: tensor.shape.clone(),
        });
    }
    Ok(())
}

/// Loads every tensor named by `spec` from the cache, in order.
pub fn retrieve_model_data(spec: &TensorSpec, cache_dir: &Path) -> ArtifactResult<Vec<Tensor>> {
    let shapes = spec.shapes()?;
    let dir = artifact_dir(spec, cache_dir);

    let found = fs::read_dir(&dir)
        .map_err(io_error(&dir))?
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
        .count();
    if found != shapes.len() {
        return Err(ArtifactError::CountMismatch {
            artifact_id: spec.artifact_id.clone(),
            expected: shapes.len(),
            found,
        });
    }

    let mut tensors = Vec::with_capacity(shapes.len());
    for (index, shape) in shapes.iter().enumerate() {
        let path = tensor_path(&dir, index);
        let content = fs::read_to_string(&path).map_err(io_error(&path))?;
        let mut tensor: Tensor =
            serde_json::from_str(&content).map_err(|source| ArtifactError::Parse {
                path: path.clone(),
                source,
            })?;
        check_shape(spec, index, shape, &tensor)?;

        if tensor.dtype != shape.element_type {
            debug!(
                "Converting {} tensor {} from {} to {}",
                spec.artifact_id,
                index,
                tensor.dtype.name(),
                shape.element_type.name()
            );
            tensor.dtype = shape.element_type;
            shape.element_type.data_type().round_slice(&mut tensor.data);
        }
        tensors.push(tensor);
    }

    debug!("Retrieved {} tensors from {}", tensors.len(), dir.display());
    Ok(tensors)
}

/// Writes `tensors` into the cache slot of `spec`, replacing earlier contents.
pub fn store_model_data(
    spec: &TensorSpec,
    cache_dir: &Path,
    tensors: &[Tensor],
) -> ArtifactResult<PathBuf> {
    let shapes = spec.shapes()?;
    if tensors.len() != shapes.len() {
        return Err(ArtifactError::CountMismatch {
            artifact_id: spec.artifact_id.clone(),
            expected: shapes.len(),
            found: tensors.len(),
        });
    }
    for (index, (shape, tensor)) in shapes.iter().zip(tensors).enumerate() {
        check_shape(spec, index, shape, tensor)?;
    }

    let dir = artifact_dir(spec, cache_dir);
    if dir.exists() {
        fs::remove_dir_all(&dir).map_err(io_error(&dir))?;
    }
    fs::create_dir_all(&dir).map_err(io_error(&dir))?;

    for (index, tensor) in tensors.iter().enumerate() {
        let path = tensor_path(&dir, index);
        let json = serde_json::to_string(tensor).map_err(|source| ArtifactError::Parse {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(io_error(&path))?;
    }

    info!("Stored {} tensors in {}", tensors.len(), dir.display());
    Ok(dir)
}

/// Deterministic inputs in `[0, 1)` for every tensor of `spec`.
pub fn generate_inputs(spec: &TensorSpec, seed: u64) -> ArtifactResult<Vec<Tensor>> {
    let mut rng = StdRng::seed_from_u64(seed);
    spec.shapes()?
        .into_iter()
        .map(|shape| {
            let data = (0..shape.num_elements())
                .map(|_| rng.gen_range(0.0f32..1.0))
                .collect();
            let dims = shape.dims.clone();
            Tensor::new(shape.dims, shape.element_type, data).ok_or_else(|| {
                ArtifactError::ShapeMismatch {
                    artifact_id: spec.artifact_id.clone(),
                    index: 0,
                    expected: dims.clone(),
                    actual: dims,
                }
            })
        })
        .collect()
}

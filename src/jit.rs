//! Just-in-time wrapper around a model's forward function.
//!
//! The first call with a given input-shape signature compiles an executable
//! for the bound device; later calls with the same signature reuse it.

use crate::device::cpu::CpuExecutable;
use crate::device::gpu::{GpuExecutable, GpuTensor};
use crate::device::{Backend, DeviceTensor, PendingOutput};
use crate::errors::{ExecutionError, ExecutionResult};
use crate::models::Model;
use crate::tensor::Tensor;
use log::debug;
use std::collections::HashMap;

type ShapeSignature = Vec<Vec<usize>>;

enum Executable<'m> {
    Cpu(CpuExecutable<'m>),
    Gpu(GpuExecutable),
}

pub struct JitFunction<'m> {
    model: &'m Model,
    backend: Backend,
    cache: HashMap<ShapeSignature, Executable<'m>>,
    compilations: usize,
}

impl<'m> JitFunction<'m> {
    pub fn new(model: &'m Model, backend: Backend) -> Self {
        Self {
            model,
            backend,
            cache: HashMap::new(),
            compilations: 0,
        }
    }

    /// Number of executables compiled so far.
    pub fn compilations(&self) -> usize {
        self.compilations
    }

    /// Dispatches one forward call. Device work may still be in flight when
    /// this returns.
    pub fn call(&mut self, inputs: &[DeviceTensor]) -> ExecutionResult<PendingOutput> {
        let signature: ShapeSignature = inputs.iter().map(|t| t.shape().to_vec()).collect();

        if !self.cache.contains_key(&signature) {
            let executable = self.compile(&signature)?;
            debug!(
                "Compiled {} for input shapes {:?}",
                self.model.name(),
                signature
            );
            self.compilations += 1;
            self.cache.insert(signature.clone(), executable);
        }

        let executable = self
            .cache
            .get_mut(&signature)
            .ok_or_else(|| ExecutionError::Compilation {
                message: "executable missing from cache".to_string(),
            })?;

        match executable {
            Executable::Cpu(executable) => {
                let host = host_inputs(inputs)?;
                Ok(PendingOutput::Ready(executable.run(&host)?))
            }
            Executable::Gpu(executable) => {
                let device = gpu_inputs(inputs)?;
                Ok(PendingOutput::Gpu(executable.run(&device)?))
            }
        }
    }

    fn compile(&self, signature: &[Vec<usize>]) -> ExecutionResult<Executable<'m>> {
        match &self.backend {
            Backend::Cpu => Ok(Executable::Cpu(CpuExecutable::compile(self.model, signature)?)),
            Backend::Gpu(context) => Ok(Executable::Gpu(GpuExecutable::compile(
                context.clone(),
                self.model,
                signature,
            )?)),
        }
    }
}

fn host_inputs(inputs: &[DeviceTensor]) -> ExecutionResult<Vec<&Tensor>> {
    inputs
        .iter()
        .map(|input| match input {
            DeviceTensor::Host(tensor) => Ok(tensor),
            DeviceTensor::Gpu(_) => Err(ExecutionError::InvalidInput {
                message: "GPU tensor passed to a CPU executable".to_string(),
            }),
        })
        .collect()
}

fn gpu_inputs(inputs: &[DeviceTensor]) -> ExecutionResult<Vec<&GpuTensor>> {
    inputs
        .iter()
        .map(|input| match input {
            DeviceTensor::Gpu(tensor) => Ok(tensor),
            DeviceTensor::Host(_) => Err(ExecutionError::InvalidInput {
                message: "host tensor passed to a GPU executable".to_string(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelFamily;
    use crate::registry::DataType;
    use crate::tensor::ElementType;

    fn tokens(batch: usize, len: usize) -> Tensor {
        let data = (0..batch * len).map(|i| (i % 7) as f32).collect();
        Tensor::new(vec![batch, len], ElementType::F32, data).unwrap()
    }

    #[test]
    fn test_compiles_once_per_shape_signature() {
        let model = ModelFamily::BertLarge.build(DataType::Fp32);
        let backend = Backend::Cpu;
        let mut jit = JitFunction::new(&model, backend.clone());

        let small = backend.transfer(&[tokens(1, 6)], DataType::Fp32);
        let large = backend.transfer(&[tokens(2, 6)], DataType::Fp32);

        jit.call(&small).unwrap().block_until_ready().unwrap();
        jit.call(&small).unwrap().block_until_ready().unwrap();
        assert_eq!(jit.compilations(), 1);

        jit.call(&large).unwrap().block_until_ready().unwrap();
        assert_eq!(jit.compilations(), 2);
    }

    #[test]
    fn test_jit_matches_eager_forward() {
        let model = ModelFamily::BertLarge.build(DataType::Fp16);
        let input = tokens(1, 5);
        let eager = model.forward(std::slice::from_ref(&input)).unwrap();

        let backend = Backend::Cpu;
        let mut jit = JitFunction::new(&model, backend.clone());
        let device_inputs = backend.transfer(&[input], DataType::Fp16);
        let output = jit.call(&device_inputs).unwrap().block_until_ready().unwrap();
        assert_eq!(output.data, eager[0].data);
    }

    #[test]
    fn test_host_inputs_are_borrowed() {
        let inputs = Backend::Cpu.transfer(&[tokens(1, 3), tokens(1, 2)], DataType::Fp32);
        let host = host_inputs(&inputs).unwrap();
        for (borrowed, input) in host.iter().zip(&inputs) {
            match input {
                DeviceTensor::Host(tensor) => assert!(std::ptr::eq(*borrowed, tensor)),
                DeviceTensor::Gpu(_) => unreachable!(),
            }
        }
    }

    #[test]
    fn test_rounding_happens_once_at_transfer() {
        let model = ModelFamily::T5Large.build(DataType::Bf16);
        let source = Tensor::new(vec![1, 4], ElementType::F32, vec![0.1, 1.0 / 3.0, 0.7, 2.9]).unwrap();
        let target = Tensor::new(vec![1, 3], ElementType::F32, vec![0.3, 0.6, 1.1]).unwrap();
        let eager = model.forward(&[source.clone(), target.clone()]).unwrap();

        let backend = Backend::Cpu;
        let device_inputs = backend.transfer(&[source, target], DataType::Bf16);
        let mut jit = JitFunction::new(&model, backend);
        let output = jit.call(&device_inputs).unwrap().block_until_ready().unwrap();
        assert_eq!(output.data, eager[0].data);
    }
}

//! Device binding, host-to-device transfer, and asynchronous results.

pub mod cpu;
pub mod gpu;
pub mod shaders;

use crate::errors::{ExecutionError, ExecutionResult};
use crate::registry::DataType;
use crate::tensor::Tensor;
use gpu::{GpuContext, GpuPending, GpuTensor};
use log::info;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Devices a benchmark can be pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Gpu,
}

impl Device {
    pub fn name(self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Gpu => "gpu",
        }
    }
}

impl FromStr for Device {
    type Err = ExecutionError;

    fn from_str(device: &str) -> ExecutionResult<Self> {
        match device {
            "cpu" => Ok(Device::Cpu),
            "gpu" => Ok(Device::Gpu),
            other => Err(ExecutionError::UnsupportedDevice {
                device: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An exclusively bound execution device.
#[derive(Clone)]
pub enum Backend {
    Cpu,
    Gpu(Arc<GpuContext>),
}

impl Backend {
    /// Binds to `device`. A missing GPU is an error, never a CPU fallback.
    pub fn bind(device: &str) -> ExecutionResult<Self> {
        let backend = match device.parse::<Device>()? {
            Device::Cpu => Backend::Cpu,
            Device::Gpu => Backend::Gpu(GpuContext::acquire()?),
        };
        info!("Bound to device {}", backend.device());
        Ok(backend)
    }

    pub fn device(&self) -> Device {
        match self {
            Backend::Cpu => Device::Cpu,
            Backend::Gpu(_) => Device::Gpu,
        }
    }

    /// Moves host tensors into device memory at `data_type` precision.
    pub fn transfer(&self, tensors: &[Tensor], data_type: DataType) -> Vec<DeviceTensor> {
        tensors
            .iter()
            .map(|tensor| match self {
                Backend::Cpu => DeviceTensor::Host(cpu::transfer(tensor, data_type)),
                Backend::Gpu(context) => DeviceTensor::Gpu(context.upload(tensor, data_type)),
            })
            .collect()
    }
}

/// A tensor resident on a bound device.
pub enum DeviceTensor {
    Host(Tensor),
    Gpu(GpuTensor),
}

impl DeviceTensor {
    pub fn shape(&self) -> &[usize] {
        match self {
            DeviceTensor::Host(tensor) => &tensor.shape,
            DeviceTensor::Gpu(tensor) => &tensor.shape,
        }
    }
}

/// Output of a dispatched call. Nothing is guaranteed to have executed until
/// [`PendingOutput::block_until_ready`] returns.
pub enum PendingOutput {
    Ready(Tensor),
    Gpu(GpuPending),
}

impl PendingOutput {
    pub fn block_until_ready(self) -> ExecutionResult<Tensor> {
        match self {
            PendingOutput::Ready(tensor) => Ok(tensor),
            PendingOutput::Gpu(pending) => pending.block_until_ready(),
        }
    }
}

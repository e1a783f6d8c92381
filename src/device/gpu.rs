//! wgpu execution of model graphs.

use super::shaders::{Kernel, WORKGROUP_SIZE, kernel_wgsl};
use crate::activation::Activation;
use crate::errors::{ExecutionError, ExecutionResult};
use crate::models::{Model, Op};
use crate::registry::DataType;
use crate::tensor::{ElementType, Tensor};
use log::{debug, info};
use pollster::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, mpsc};
use wgpu::util::DeviceExt;

const F32_BYTES: u64 = std::mem::size_of::<f32>() as u64;

/// Uniform block shared by every kernel; field meaning is per kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct KernelParams {
    a: u32,
    b: u32,
    c: u32,
    d: u32,
}

/// An acquired hardware adapter with its device and queue.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Binds to a hardware GPU. Software adapters are rejected so a `gpu`
    /// run never silently executes on the CPU.
    pub fn acquire() -> ExecutionResult<Arc<Self>> {
        let unavailable = |message: String| ExecutionError::DeviceUnavailable {
            device: "gpu".to_string(),
            message,
        };

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .block_on()
            .ok_or_else(|| unavailable("no adapter found".to_string()))?;

        let adapter_info = adapter.get_info();
        if adapter_info.device_type == wgpu::DeviceType::Cpu {
            return Err(unavailable(format!(
                "only a software adapter is present ({})",
                adapter_info.name
            )));
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("framework-bench"),
                    required_limits: adapter.limits(),
                    ..Default::default()
                },
                None,
            )
            .block_on()
            .map_err(|e| unavailable(e.to_string()))?;

        info!(
            "Bound GPU adapter '{}' ({:?})",
            adapter_info.name, adapter_info.backend
        );

        Ok(Arc::new(Self { device, queue }))
    }

    /// Uploads a tensor into a storage buffer and waits for the upload.
    pub fn upload(&self, tensor: &Tensor, data_type: DataType) -> GpuTensor {
        let mut data = tensor.data.clone();
        data_type.round_slice(&mut data);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("input"),
                contents: bytemuck::cast_slice(&data),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            });
        self.queue.submit(std::iter::empty());
        let _ = self.device.poll(wgpu::Maintain::Wait);

        GpuTensor {
            buffer,
            shape: tensor.shape.clone(),
        }
    }
}

/// A tensor resident in GPU memory.
pub struct GpuTensor {
    pub buffer: wgpu::Buffer,
    pub shape: Vec<usize>,
}

enum Step {
    Copy {
        src: usize,
        dst: usize,
        bytes: u64,
    },
    Dispatch {
        kernel: Kernel,
        bind_group: wgpu::BindGroup,
        workgroups: (u32, u32),
    },
}

/// A graph compiled to pipelines, buffers, and a fixed dispatch sequence.
pub struct GpuExecutable {
    context: Arc<GpuContext>,
    data_type: DataType,
    shapes: Vec<Vec<usize>>,
    num_inputs: usize,
    output: usize,
    values: Vec<wgpu::Buffer>,
    pipelines: HashMap<Kernel, wgpu::ComputePipeline>,
    steps: Vec<Step>,
}

impl GpuExecutable {
    pub fn compile(
        context: Arc<GpuContext>,
        model: &Model,
        input_shapes: &[Vec<usize>],
    ) -> ExecutionResult<Self> {
        let shapes = model.graph.infer_shapes(model.name(), input_shapes)?;
        let device = &context.device;
        let limits = device.limits();
        let max_binding = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);

        let check_size = |bytes: u64, what: &str| -> ExecutionResult<()> {
            if bytes > max_binding {
                return Err(ExecutionError::Compilation {
                    message: format!(
                        "{} needs {} bytes, device binding limit is {}",
                        what, bytes, max_binding
                    ),
                });
            }
            Ok(())
        };

        let mut values = Vec::with_capacity(shapes.len());
        for (index, shape) in shapes.iter().enumerate() {
            let bytes = shape.iter().product::<usize>() as u64 * F32_BYTES;
            check_size(bytes, &format!("value {}", index))?;
            values.push(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("value"),
                size: bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        let pipelines = create_pipelines(device, model.data_type);

        let layer_buffers: Vec<(wgpu::Buffer, wgpu::Buffer)> = model
            .layers
            .iter()
            .map(|layer| {
                let weights = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("weights"),
                    contents: bytemuck::cast_slice(&layer.weights),
                    usage: wgpu::BufferUsages::STORAGE,
                });
                let bias = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("bias"),
                    contents: bytemuck::cast_slice(&layer.bias),
                    usage: wgpu::BufferUsages::STORAGE,
                });
                (weights, bias)
            })
            .collect();

        let max_groups = limits.max_compute_workgroups_per_dimension;
        let mut builder = StepBuilder {
            device,
            pipelines: &pipelines,
            max_groups,
            steps: Vec::new(),
        };

        for op in &model.graph.ops {
            match *op {
                Op::Unsqueeze { src, dst } => builder.steps.push(Step::Copy {
                    src,
                    dst,
                    bytes: shapes[src].iter().product::<usize>() as u64 * F32_BYTES,
                }),
                Op::Dense {
                    src,
                    dst,
                    layer,
                    activation,
                } => {
                    let spec = &model.layers[layer];
                    let rows = shapes[src].iter().product::<usize>() / spec.in_features;
                    let (weights, bias) = &layer_buffers[layer];
                    builder.dispatch(
                        Kernel::Dense,
                        &[&values[src], weights, bias, &values[dst]],
                        params(
                            rows,
                            spec.in_features,
                            spec.out_features,
                            Activation::gpu_id(activation),
                        ),
                        rows * spec.out_features,
                    )?;
                }
                Op::Add { lhs, rhs, dst } => {
                    let len = shapes[dst].iter().product::<usize>();
                    builder.dispatch(
                        Kernel::Add,
                        &[&values[lhs], &values[rhs], &values[dst]],
                        params(len, 0, 0, 0),
                        len,
                    )?;
                }
                Op::MeanPool { src, dst } => {
                    let shape = &shapes[src];
                    let channels = shape[shape.len() - 1];
                    let window = shape[1..shape.len() - 1].iter().product::<usize>();
                    builder.dispatch(
                        Kernel::MeanPool,
                        &[&values[src], &values[dst]],
                        params(shape[0], window, channels, 0),
                        shape[0] * channels,
                    )?;
                }
                Op::Attention {
                    query,
                    context: ctx,
                    dst,
                } => {
                    let (batch, q_len, dim) = (shapes[query][0], shapes[query][1], shapes[query][2]);
                    let kv_len = shapes[ctx][1];
                    let score_count = batch * q_len * kv_len;
                    check_size(score_count as u64 * F32_BYTES, "attention scores")?;
                    let scores = device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some("attention scores"),
                        size: score_count as u64 * F32_BYTES,
                        usage: wgpu::BufferUsages::STORAGE,
                        mapped_at_creation: false,
                    });
                    let attention_params = params(batch, q_len, kv_len, dim as u32);

                    builder.dispatch(
                        Kernel::AttentionScores,
                        &[&values[query], &values[ctx], &scores],
                        attention_params,
                        score_count,
                    )?;
                    builder.dispatch(
                        Kernel::SoftmaxRows,
                        &[&scores],
                        params(batch * q_len, kv_len, 0, 0),
                        batch * q_len,
                    )?;
                    builder.dispatch(
                        Kernel::AttentionOutput,
                        &[&scores, &values[ctx], &values[dst]],
                        attention_params,
                        batch * q_len * dim,
                    )?;
                }
            }
        }

        let steps = builder.steps;
        debug!(
            "Compiled {} for {:?}: {} steps",
            model.name(),
            input_shapes,
            steps.len()
        );

        Ok(Self {
            data_type: model.data_type,
            num_inputs: model.graph.num_inputs,
            output: model.graph.output,
            shapes,
            values,
            pipelines,
            steps,
            context,
        })
    }

    /// Enqueues one execution. The returned handle must be synchronized with
    /// [`GpuPending::block_until_ready`] before the results exist on the host.
    pub fn run(&mut self, inputs: &[&GpuTensor]) -> ExecutionResult<GpuPending> {
        if inputs.len() != self.num_inputs {
            return Err(ExecutionError::InvalidInput {
                message: format!("expected {} inputs, got {}", self.num_inputs, inputs.len()),
            });
        }

        let device = &self.context.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("forward"),
        });

        for (index, input) in inputs.iter().enumerate() {
            if input.shape != self.shapes[index] {
                return Err(ExecutionError::InvalidInput {
                    message: format!(
                        "input {} has shape {:?}, executable was compiled for {:?}",
                        index, input.shape, self.shapes[index]
                    ),
                });
            }
            let bytes = self.shapes[index].iter().product::<usize>() as u64 * F32_BYTES;
            encoder.copy_buffer_to_buffer(&input.buffer, 0, &self.values[index], 0, bytes);
        }

        for step in &self.steps {
            match step {
                Step::Copy { src, dst, bytes } => {
                    encoder.copy_buffer_to_buffer(&self.values[*src], 0, &self.values[*dst], 0, *bytes);
                }
                Step::Dispatch {
                    kernel,
                    bind_group,
                    workgroups,
                } => {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some(kernel.label()),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(&self.pipelines[kernel]);
                    pass.set_bind_group(0, bind_group, &[]);
                    pass.dispatch_workgroups(workgroups.0, workgroups.1, 1);
                }
            }
        }

        let output_shape = self.shapes[self.output].clone();
        let bytes = output_shape.iter().product::<usize>() as u64 * F32_BYTES;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size: bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        encoder.copy_buffer_to_buffer(&self.values[self.output], 0, &staging, 0, bytes);
        self.context.queue.submit(Some(encoder.finish()));

        Ok(GpuPending {
            context: Arc::clone(&self.context),
            staging,
            shape: output_shape,
            data_type: self.data_type,
        })
    }
}

/// Submitted work whose output has not been read back yet.
pub struct GpuPending {
    context: Arc<GpuContext>,
    staging: wgpu::Buffer,
    shape: Vec<usize>,
    data_type: DataType,
}

impl GpuPending {
    /// Waits for all submitted device work and copies the output to the host.
    pub fn block_until_ready(self) -> ExecutionResult<Tensor> {
        let slice = self.staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.context.device.poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|e| ExecutionError::Gpu {
                message: format!("readback callback dropped: {}", e),
            })?
            .map_err(|e| ExecutionError::Gpu {
                message: format!("readback failed: {}", e),
            })?;

        let data: Vec<f32> = {
            let mapped = slice.get_mapped_range();
            bytemuck::cast_slice(&mapped).to_vec()
        };
        self.staging.unmap();

        Ok(Tensor {
            shape: self.shape,
            dtype: ElementType::from(self.data_type),
            data,
        })
    }
}

struct StepBuilder<'a> {
    device: &'a wgpu::Device,
    pipelines: &'a HashMap<Kernel, wgpu::ComputePipeline>,
    max_groups: u32,
    steps: Vec<Step>,
}

impl StepBuilder<'_> {
    fn dispatch(
        &mut self,
        kernel: Kernel,
        buffers: &[&wgpu::Buffer],
        kernel_params: KernelParams,
        threads: usize,
    ) -> ExecutionResult<()> {
        let workgroups = workgroup_grid(threads, self.max_groups)?;
        let uniform = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("params"),
                contents: bytemuck::bytes_of(&kernel_params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: buffers.len() as u32,
            resource: uniform.as_entire_binding(),
        });

        let layout = self.pipelines[&kernel].get_bind_group_layout(0);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.label()),
            layout: &layout,
            entries: &entries,
        });

        self.steps.push(Step::Dispatch {
            kernel,
            bind_group,
            workgroups,
        });
        Ok(())
    }
}

fn create_pipelines(
    device: &wgpu::Device,
    data_type: DataType,
) -> HashMap<Kernel, wgpu::ComputePipeline> {
    Kernel::ALL
        .into_iter()
        .map(|kernel| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(kernel.label()),
                source: wgpu::ShaderSource::Wgsl(kernel_wgsl(kernel, data_type).into()),
            });
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(kernel.label()),
                layout: None,
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });
            (kernel, pipeline)
        })
        .collect()
}

fn params(a: usize, b: usize, c: usize, d: u32) -> KernelParams {
    KernelParams {
        a: a as u32,
        b: b as u32,
        c: c as u32,
        d,
    }
}

/// Splits a thread count into an `(x, y)` workgroup grid within `max_groups`
/// per dimension.
fn workgroup_grid(threads: usize, max_groups: u32) -> ExecutionResult<(u32, u32)> {
    let groups = threads.div_ceil(WORKGROUP_SIZE as usize).max(1);
    let x = groups.min(max_groups as usize);
    let y = groups.div_ceil(x);
    if y > max_groups as usize || threads > u32::MAX as usize {
        return Err(ExecutionError::Compilation {
            message: format!("{} threads exceed the dispatch grid", threads),
        });
    }
    Ok((x as u32, y as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_grid_single_row() {
        assert_eq!(workgroup_grid(1, 65535).unwrap(), (1, 1));
        assert_eq!(workgroup_grid(64, 65535).unwrap(), (1, 1));
        assert_eq!(workgroup_grid(65, 65535).unwrap(), (2, 1));
    }

    #[test]
    fn test_workgroup_grid_folds_into_second_dimension() {
        let threads = 64 * 65535 * 3 + 1;
        let (x, y) = workgroup_grid(threads, 65535).unwrap();
        assert_eq!(x, 65535);
        assert_eq!(y, 4);
        assert!((x as usize) * (y as usize) * 64 >= threads);
    }

    #[test]
    fn test_workgroup_grid_rejects_oversized_dispatch() {
        let result = workgroup_grid(64 * 4 * 4 + 1, 4);
        assert!(matches!(result, Err(ExecutionError::Compilation { .. })));
    }

    #[test]
    fn test_kernel_params_layout() {
        assert_eq!(std::mem::size_of::<KernelParams>(), 16);
    }
}

use crate::context::GpuContext;
use crate::params::KernelParams;
use anyhow::{Context as _, ensure};
use centroid_scan::layout::{SLOTS_PER_GROUP, WORKGROUP_SIZE, group_count, next_epoch};
use centroid_scan::{DispatchError, PixelGrid, RunParams};
use glam::Vec4;
use std::borrow::Cow;
use wgpu::util::DeviceExt;

pub(crate) const SHADER_SOURCE: &str = include_str!("../shaders/centroid_update.wgsl");
const ENTRY_POINT: &str = "main_cs";

/// The centroid update kernel and every buffer it binds.
///
/// Buffers live as long as the kernel: the pixel texture and the assignment
/// are inputs, the centroid table and the convergence vector persist across
/// dispatches, and the flag and aggregate stores are per-dispatch scratch
/// told apart by an epoch that advances with every dispatch.
pub struct CentroidKernel {
    context: GpuContext,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    params_buffer: wgpu::Buffer,
    assignment_buffer: wgpu::Buffer,
    centroid_buffer: wgpu::Buffer,
    convergence_buffer: wgpu::Buffer,
    run: RunParams,
    count: u32,
    pixel_count: u32,
    groups: u32,
    epoch: u32,
}

impl CentroidKernel {
    pub fn new(
        context: GpuContext,
        pixels: &PixelGrid,
        assignment: &[u32],
        centroids: &[Vec4],
        run: &RunParams,
    ) -> anyhow::Result<Self> {
        run.validate()?;
        ensure!(
            run.workgroup_size == WORKGROUP_SIZE,
            "the WGSL kernel is compiled for {WORKGROUP_SIZE} lanes, not {}",
            run.workgroup_size
        );
        ensure!(!pixels.is_empty(), "cannot cluster an empty image");
        if centroids.is_empty() {
            return Err(DispatchError::NoCentroids.into());
        }
        check_assignment(assignment, pixels.len())?;

        let count = u32::try_from(centroids.len()).context("too many centroids")?;
        let pixel_count = u32::try_from(pixels.len()).context("image too large")?;
        let groups = group_count(pixels.len(), WORKGROUP_SIZE, run.sequencing_factor);
        let max_groups = context.device.limits().max_compute_workgroups_per_dimension;
        ensure!(
            groups <= max_groups,
            "{groups} workgroups exceed the device limit of {max_groups}, raise `sequencing_factor`"
        );

        let device = &context.device;
        let (width, height) = pixels.dimensions();
        let texture = device.create_texture_with_data(
            &context.queue,
            &wgpu::TextureDescriptor {
                label: Some("Pixels"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba32Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            pixels.as_bytes(),
        );
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let storage = |label, contents: &[u8], extra| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::STORAGE | extra,
            })
        };
        let assignment_buffer = storage(
            "Assignment",
            bytemuck::cast_slice(assignment),
            wgpu::BufferUsages::COPY_DST,
        );
        let centroid_buffer = storage(
            "Centroids",
            bytemuck::cast_slice(centroids),
            wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        );
        let aggregate_buffer = storage(
            "Aggregates",
            &vec![0; groups as usize * SLOTS_PER_GROUP * 4],
            wgpu::BufferUsages::empty(),
        );
        let flag_buffer = storage(
            "Flags",
            &vec![0; groups as usize * 4],
            wgpu::BufferUsages::empty(),
        );
        let convergence_buffer = storage(
            "Convergence",
            &vec![0; (count as usize + 1) * 4],
            wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        );
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Params"),
            contents: bytemuck::bytes_of(&KernelParams::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let buffer_entry = |binding, ty| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let read_write = wgpu::BufferBindingType::Storage { read_only: false };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Centroid Update Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                buffer_entry(1, wgpu::BufferBindingType::Storage { read_only: true }),
                buffer_entry(2, read_write),
                buffer_entry(3, read_write),
                buffer_entry(4, read_write),
                buffer_entry(5, read_write),
                buffer_entry(6, wgpu::BufferBindingType::Uniform),
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Centroid Update Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: assignment_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: centroid_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: aggregate_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: flag_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: convergence_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("centroid_update.wgsl"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(SHADER_SOURCE)),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Centroid Update Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Centroid Update Pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some(ENTRY_POINT),
            compilation_options: Default::default(),
            cache: None,
        });

        tracing::debug!(width, height, count, groups, "centroid kernel created");
        Ok(Self {
            context,
            pipeline,
            bind_group,
            params_buffer,
            assignment_buffer,
            centroid_buffer,
            convergence_buffer,
            run: run.clone(),
            count,
            pixel_count,
            groups,
            epoch: 0,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Workgroups per dispatch.
    pub fn groups(&self) -> u32 {
        self.groups
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Replaces the assignment consumed by the following dispatches.
    pub fn set_assignment(&self, assignment: &[u32]) -> anyhow::Result<()> {
        check_assignment(assignment, self.pixel_count as usize)?;
        self.context
            .queue
            .write_buffer(&self.assignment_buffer, 0, bytemuck::cast_slice(assignment));
        Ok(())
    }

    /// Zeroes the convergence vector, trailing slot included.
    pub fn begin_iteration(&self) {
        let zeros = vec![0u32; self.count as usize + 1];
        self.context
            .queue
            .write_buffer(&self.convergence_buffer, 0, bytemuck::cast_slice(&zeros));
    }

    /// Submits one dispatch computing the centroid of `cluster`.
    pub fn dispatch(&mut self, cluster: u32) -> anyhow::Result<()> {
        if cluster >= self.count {
            return Err(DispatchError::ClusterOutOfRange {
                cluster,
                count: self.count,
            }
            .into());
        }
        self.epoch = next_epoch(self.epoch);
        let params = KernelParams::new(&self.run, cluster, self.count, self.epoch, self.pixel_count);
        let queue = &self.context.queue;
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Centroid Update Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Centroid Update Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(self.groups, 1, 1);
        }
        queue.submit(Some(encoder.finish()));
        tracing::debug!(cluster, epoch = self.epoch, groups = self.groups, "dispatch submitted");
        Ok(())
    }

    /// One dispatch per cluster in increasing order; the last one closes the
    /// round.
    pub fn run_round(&mut self) -> anyhow::Result<()> {
        for cluster in 0..self.count {
            self.dispatch(cluster)?;
        }
        Ok(())
    }

    pub fn read_centroids(&self) -> anyhow::Result<Vec<Vec4>> {
        let bytes = self
            .context
            .read_buffer(&self.centroid_buffer, self.centroid_buffer.size())
            .context("reading centroids")?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Per-cluster convergence slots followed by the trailing count.
    pub fn read_convergence(&self) -> anyhow::Result<Vec<u32>> {
        let bytes = self
            .context
            .read_buffer(&self.convergence_buffer, self.convergence_buffer.size())
            .context("reading convergence")?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    pub fn is_converged(&self) -> anyhow::Result<bool> {
        let slots = self.read_convergence()?;
        Ok(slots.last().is_some_and(|&converged| converged >= self.count))
    }
}

fn check_assignment(assignment: &[u32], pixels: usize) -> Result<(), DispatchError> {
    if assignment.len() != pixels {
        return Err(DispatchError::AssignmentLength {
            assignment: assignment.len(),
            pixels,
        });
    }
    Ok(())
}

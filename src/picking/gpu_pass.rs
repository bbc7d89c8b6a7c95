//! The wgpu implementation of the ID pass.
//!
//! Renders every [`DrawItem`] into two `Rgba8Unorm` colour targets (prim ID,
//! instance index) and a `Depth32Float` target, then copies all three into
//! mapped staging buffers. Per-draw data lives in one uniform buffer indexed
//! by dynamic offset.

use std::ops::Range;
use std::sync::mpsc;

use wgpu::util::DeviceExt;

use super::id_buffer::IdBuffer;
use super::{DrawItem, IdPass, PickError};
use crate::camera::CameraMatrices;
use crate::gpu::{ContextError, GpuContext};

const ID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Per-draw uniforms: the model-view-projection matrix and the two IDs.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawUniforms {
    mvp: [[f32; 4]; 4],
    ids: [u32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct IdVertex {
    position: [f32; 3],
}

impl IdVertex {
    const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<IdVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        }],
    };
}

struct IdTargets {
    size: (u32, u32),
    prim: wgpu::Texture,
    instance: wgpu::Texture,
    depth: wgpu::Texture,
}

pub struct GpuIdPass {
    gpu: GpuContext,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    targets: Option<IdTargets>,
    pub clear_depth: f32,
}

impl GpuIdPass {
    pub fn new(gpu: GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ID Pass Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/id_pass.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ID Pass Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<DrawUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ID Pass Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let id_target = Some(wgpu::ColorTargetState {
            format: ID_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        });

        // Both faces are pickable.
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("ID Pass Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[IdVertex::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[id_target.clone(), id_target],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            gpu,
            pipeline,
            bind_group_layout,
            targets: None,
            clear_depth: 1.0,
        }
    }

    /// Creates a pass on a fresh headless context.
    pub fn headless() -> Result<Self, ContextError> {
        Ok(Self::new(GpuContext::headless()?))
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    fn create_target(
        &self,
        label: &str,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> wgpu::Texture {
        self.gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    fn ensure_targets(&mut self, width: u32, height: u32) {
        if self.targets.as_ref().is_some_and(|t| t.size == (width, height)) {
            return;
        }
        let targets = IdTargets {
            size: (width, height),
            prim: self.create_target("ID Prim Target", ID_FORMAT, width, height),
            instance: self.create_target("ID Instance Target", ID_FORMAT, width, height),
            depth: self.create_target("ID Depth Target", DEPTH_FORMAT, width, height),
        };
        self.targets = Some(targets);
    }

    /// Copies one 4-byte-per-texel plane into a tightly packed vector.
    fn read_plane(
        &self,
        texture: &wgpu::Texture,
        aspect: wgpu::TextureAspect,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, PickError> {
        let device = &self.gpu.device;
        let unpadded = width * 4;
        let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ID Readback Buffer"),
            size: (padded * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ID Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| PickError::Readback(e.to_string()))?;
        rx.recv()
            .map_err(|e| PickError::Readback(e.to_string()))?
            .map_err(|e| PickError::Readback(e.to_string()))?;

        let mut packed = Vec::with_capacity((unpadded * height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks_exact(padded as usize) {
                packed.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        staging.unmap();
        Ok(packed)
    }
}

fn align_to(size: u64, alignment: u64) -> u64 {
    size.div_ceil(alignment) * alignment
}

impl IdPass for GpuIdPass {
    fn render(
        &mut self,
        items: &[DrawItem],
        camera: &CameraMatrices,
        width: u32,
        height: u32,
    ) -> Result<IdBuffer, PickError> {
        if width == 0 || height == 0 {
            return Err(PickError::EmptyTarget { width, height });
        }
        self.ensure_targets(width, height);

        let uniform_size = std::mem::size_of::<DrawUniforms>();
        let stride = align_to(uniform_size as u64, self.gpu.uniform_alignment());
        let view_projection = camera.view_projection();

        // Expand every item to a flat triangle list, one draw range per item.
        let mut vertices: Vec<IdVertex> = Vec::new();
        let mut ranges: Vec<Range<u32>> = Vec::with_capacity(items.len());
        let mut uniform_bytes = vec![0u8; stride as usize * items.len().max(1)];
        for (i, item) in items.iter().enumerate() {
            let start = vertices.len() as u32;
            for tri in item.triangles.iter() {
                if tri.iter().all(|&v| (v as usize) < item.points.len()) {
                    vertices.extend(tri.iter().map(|&v| IdVertex {
                        position: item.points[v as usize].to_array(),
                    }));
                }
            }
            ranges.push(start..vertices.len() as u32);

            let uniforms = DrawUniforms {
                mvp: (view_projection * item.transform).to_cols_array_2d(),
                ids: [item.prim_id, item.instance_index, 0, 0],
            };
            let offset = i * stride as usize;
            uniform_bytes[offset..offset + uniform_size]
                .copy_from_slice(bytemuck::bytes_of(&uniforms));
        }

        let device = &self.gpu.device;
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ID Pass Uniforms"),
            contents: &uniform_bytes,
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ID Pass Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(uniform_size as u64),
                }),
            }],
        });
        let vertex_buffer = (!vertices.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("ID Pass Vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        let Some(targets) = self.targets.as_ref() else {
            return Err(PickError::Readback("ID targets missing".to_string()));
        };
        let prim_view = targets.prim.create_view(&wgpu::TextureViewDescriptor::default());
        let instance_view = targets.instance.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = targets.depth.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ID Pass Encoder"),
        });
        {
            let clear = wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ID Pass"),
                color_attachments: &[
                    Some(wgpu::RenderPassColorAttachment {
                        view: &prim_view,
                        resolve_target: None,
                        ops: clear,
                        depth_slice: None,
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: &instance_view,
                        resolve_target: None,
                        ops: clear,
                        depth_slice: None,
                    }),
                ],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(vertex_buffer) = &vertex_buffer {
                pass.set_pipeline(&self.pipeline);
                pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                for (i, range) in ranges.iter().enumerate() {
                    if range.is_empty() {
                        continue;
                    }
                    pass.set_bind_group(0, &bind_group, &[(i as u64 * stride) as u32]);
                    pass.draw(range.clone(), 0..1);
                }
            }
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let prim_bytes = self.read_plane(&targets.prim, wgpu::TextureAspect::All, width, height)?;
        let instance_bytes =
            self.read_plane(&targets.instance, wgpu::TextureAspect::All, width, height)?;
        let depth_bytes =
            self.read_plane(&targets.depth, wgpu::TextureAspect::DepthOnly, width, height)?;

        let texels = |bytes: Vec<u8>| -> Vec<[u8; 4]> {
            bytes
                .chunks_exact(4)
                .map(|c| [c[0], c[1], c[2], c[3]])
                .collect()
        };
        let depths: Vec<f32> = depth_bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        IdBuffer::from_planes(
            width,
            height,
            self.clear_depth,
            texels(prim_bytes),
            texels(instance_bytes),
            depths,
        )
    }
}

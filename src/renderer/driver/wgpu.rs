use std::collections::HashMap;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::error::RendererError;
use crate::renderer::framebuffer::{AttachmentFormat, FramebufferSpec, EMPTY_OWNER};
use crate::renderer::handle::{HandleRegistry, RenderId};
use crate::renderer::vertex::{LineVertex, MeshVertex, QuadVertex};

use super::{
    BufferId, DrawDesc, Driver, FramebufferId, ShaderId, TextureId, VertexKind, MAX_TEXTURE_UNITS,
};

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

const PREMULTIPLIED_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
};

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct GpuBuffer {
    /// Uploads snapshot into a fresh buffer so draws recorded earlier
    /// in the pass keep the contents they were issued with.
    current: Arc<wgpu::Buffer>,
    byte_capacity: u64,
}

struct GpuShader {
    module: wgpu::ShaderModule,
}

struct ColorAttachment {
    tag: AttachmentFormat,
    format: wgpu::TextureFormat,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct GpuFramebuffer {
    spec: FramebufferSpec,
    width: u32,
    height: u32,
    colors: Vec<ColorAttachment>,
    depth: Option<(wgpu::TextureView, wgpu::TextureFormat)>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    shader: ShaderId,
    kind: VertexKind,
    color_formats: Vec<wgpu::TextureFormat>,
    depth_format: Option<wgpu::TextureFormat>,
    samples: u32,
}

struct RecordedDraw {
    key: PipelineKey,
    camera: Arc<wgpu::BindGroup>,
    textures: wgpu::BindGroup,
    vertices: Arc<wgpu::Buffer>,
    indices: Option<Arc<wgpu::Buffer>>,
    count: u32,
}

struct PassRecording {
    target: FramebufferId,
    clear_color: Option<[f32; 4]>,
    camera: Option<Arc<wgpu::BindGroup>>,
    commands: Vec<RecordedDraw>,
}

/// Production driver over wgpu. Draws are recorded during the pass
/// and replayed into one render pass at `end_pass`; vertex uploads
/// and the per-pass camera snapshot into their own buffers so the
/// replay sees the state each draw was issued with.
pub struct WgpuDriver {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: HashMap<TextureId, GpuTexture>,
    buffers: HashMap<BufferId, GpuBuffer>,
    shaders: HashMap<ShaderId, GpuShader>,
    framebuffers: HashMap<FramebufferId, GpuFramebuffer>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    camera_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    bound: [Option<TextureId>; MAX_TEXTURE_UNITS],
    default_texture: Option<TextureId>,
    pass: Option<PassRecording>,
    registry: HandleRegistry,
}

impl WgpuDriver {
    /// Acquires an adapter and device without a surface; the crate
    /// renders into off-screen framebuffer targets only.
    pub fn new() -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .expect("Failed to find adapter");

        log::info!("Using adapter: {:?}", adapter.get_info());

        let required_features = wgpu::Features::TEXTURE_BINDING_ARRAY
            | wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING;

        let limits = wgpu::Limits {
            max_binding_array_elements_per_shader_stage: 64,
            ..wgpu::Limits::default()
        };

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Device"),
            required_features,
            required_limits: limits,
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .expect("Failed to create device");

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("CameraBindLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SlotTexturesBindLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: NonZeroU32::new(MAX_TEXTURE_UNITS as u32),
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("BatchPipelineLayout"),
            bind_group_layouts: &[&camera_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("SlotSampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device,
            queue,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            shaders: HashMap::new(),
            framebuffers: HashMap::new(),
            pipelines: HashMap::new(),
            camera_layout,
            texture_layout,
            pipeline_layout,
            sampler,
            bound: [None; MAX_TEXTURE_UNITS],
            default_texture: None,
            pass: None,
            registry: HandleRegistry::new(),
        }
    }

    fn build_attachments(
        device: &wgpu::Device,
        spec: &FramebufferSpec,
        width: u32,
        height: u32,
    ) -> (
        Vec<ColorAttachment>,
        Option<(wgpu::TextureView, wgpu::TextureFormat)>,
    ) {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };

        let mut colors = Vec::new();
        let mut depth = None;

        for attachment in &spec.attachments {
            match attachment {
                AttachmentFormat::Rgba8 => {
                    let format = wgpu::TextureFormat::Rgba8Unorm;
                    let texture = device.create_texture(&wgpu::TextureDescriptor {
                        label: Some("ColorAttachment"),
                        size,
                        mip_level_count: 1,
                        sample_count: spec.samples,
                        dimension: wgpu::TextureDimension::D2,
                        format,
                        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                            | wgpu::TextureUsages::TEXTURE_BINDING,
                        view_formats: &[],
                    });
                    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                    colors.push(ColorAttachment {
                        tag: AttachmentFormat::Rgba8,
                        format,
                        texture,
                        view,
                    });
                }
                AttachmentFormat::ObjectId => {
                    let format = wgpu::TextureFormat::R32Sint;
                    let texture = device.create_texture(&wgpu::TextureDescriptor {
                        label: Some("ObjectIdAttachment"),
                        size,
                        mip_level_count: 1,
                        sample_count: spec.samples,
                        dimension: wgpu::TextureDimension::D2,
                        format,
                        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                            | wgpu::TextureUsages::COPY_SRC,
                        view_formats: &[],
                    });
                    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                    colors.push(ColorAttachment {
                        tag: AttachmentFormat::ObjectId,
                        format,
                        texture,
                        view,
                    });
                }
                AttachmentFormat::DepthStencil => {
                    let format = wgpu::TextureFormat::Depth24PlusStencil8;
                    let texture = device.create_texture(&wgpu::TextureDescriptor {
                        label: Some("DepthStencilAttachment"),
                        size,
                        mip_level_count: 1,
                        sample_count: spec.samples,
                        dimension: wgpu::TextureDimension::D2,
                        format,
                        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                        view_formats: &[],
                    });
                    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                    depth = Some((view, format));
                }
            }
        }

        (colors, depth)
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey) {
        if self.pipelines.contains_key(key) {
            return;
        }

        let shader = self
            .shaders
            .get(&key.shader)
            .expect("unknown shader handle");

        let buffers = [match key.kind {
            VertexKind::Quad => QuadVertex::layout(),
            VertexKind::Line => LineVertex::layout(),
            VertexKind::Mesh => MeshVertex::layout(),
        }];

        let targets: Vec<Option<wgpu::ColorTargetState>> = key
            .color_formats
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: if format == wgpu::TextureFormat::Rgba8Unorm {
                        Some(PREMULTIPLIED_BLEND)
                    } else {
                        None
                    },
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let topology = match key.kind {
            VertexKind::Line => wgpu::PrimitiveTopology::LineList,
            _ => wgpu::PrimitiveTopology::TriangleList,
        };

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("BatchPipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader.module,
                    entry_point: Some("vs_main"),
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader.module,
                    entry_point: Some("fs_main"),
                    targets: &targets,
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    ..Default::default()
                },
                depth_stencil: key.depth_format.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: key.samples,
                    ..Default::default()
                },
                multiview: None,
                cache: None,
            });

        self.pipelines.insert(key.clone(), pipeline);
    }
}

impl Default for WgpuDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for WgpuDriver {
    fn create_texture_rgba8(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
        label: &str,
    ) -> TextureId {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = TextureId(RenderId::allocate());
        self.textures.insert(
            id,
            GpuTexture {
                _texture: texture,
                view,
            },
        );
        self.registry.register(id.0, "texture");
        if self.default_texture.is_none() {
            self.default_texture = Some(id);
        }
        id
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.registry.release(texture.0);
    }

    fn create_shader(&mut self, label: &str, source: &str) -> Result<ShaderId, RendererError> {
        // Validation errors (WGSL parse and type failures included)
        // surface through the error scope instead of aborting.
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RendererError::ShaderCompile {
                path: PathBuf::from(label),
                message: error.to_string(),
            });
        }

        let id = ShaderId(RenderId::allocate());
        self.shaders.insert(id, GpuShader { module });
        self.registry.register(id.0, "shader");
        Ok(id)
    }

    fn destroy_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
        self.pipelines.retain(|key, _| key.shader != shader);
        self.registry.release(shader.0);
    }

    fn create_vertex_buffer(&mut self, byte_capacity: u64, label: &str) -> BufferId {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: byte_capacity,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = BufferId(RenderId::allocate());
        self.buffers.insert(
            id,
            GpuBuffer {
                current: Arc::new(buffer),
                byte_capacity,
            },
        );
        id
    }

    fn create_index_buffer(&mut self, indices: &[u32], label: &str) -> BufferId {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let id = BufferId(RenderId::allocate());
        self.buffers.insert(
            id,
            GpuBuffer {
                current: Arc::new(buffer),
                byte_capacity: (indices.len() * 4) as u64,
            },
        );
        id
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn upload_vertices(&mut self, buffer: BufferId, bytes: &[u8]) {
        let record = self.buffers.get_mut(&buffer).expect("unknown buffer handle");
        debug_assert!(
            bytes.len() as u64 <= record.byte_capacity,
            "upload exceeds buffer capacity"
        );
        // Snapshot into a fresh buffer so earlier recorded draws keep
        // the vertices they were issued with.
        record.current = Arc::new(self.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("VertexUpload"),
                contents: bytes,
                usage: wgpu::BufferUsages::VERTEX,
            },
        ));
    }

    fn create_framebuffer(
        &mut self,
        spec: &FramebufferSpec,
    ) -> Result<FramebufferId, RendererError> {
        spec.validate()?;
        let (colors, depth) = Self::build_attachments(&self.device, spec, spec.width, spec.height);
        let id = FramebufferId(RenderId::allocate());
        self.framebuffers.insert(
            id,
            GpuFramebuffer {
                spec: spec.clone(),
                width: spec.width,
                height: spec.height,
                colors,
                depth,
            },
        );
        self.registry.register(id.0, "framebuffer");
        Ok(id)
    }

    fn resize_framebuffer(&mut self, framebuffer: FramebufferId, width: u32, height: u32) {
        let target = self
            .framebuffers
            .get_mut(&framebuffer)
            .expect("unknown framebuffer handle");
        log::info!(
            "resizing framebuffer {}x{} -> {width}x{height}",
            target.width,
            target.height
        );
        let (colors, depth) = Self::build_attachments(&self.device, &target.spec, width, height);
        target.colors = colors;
        target.depth = depth;
        target.width = width;
        target.height = height;
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
        self.registry.release(framebuffer.0);
    }

    fn clear_attachment(&mut self, framebuffer: FramebufferId, attachment: usize, value: i32) {
        let target = self
            .framebuffers
            .get(&framebuffer)
            .expect("unknown framebuffer handle");
        let color = target
            .colors
            .get(attachment)
            .expect("color attachment index out of range");

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("ClearAttachment"),
            });
        {
            let value = value as f64;
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ClearAttachmentPass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: value,
                            g: value,
                            b: value,
                            a: value,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn read_pixel(
        &mut self,
        framebuffer: FramebufferId,
        attachment: usize,
        x: u32,
        y: u32,
    ) -> i32 {
        let target = self
            .framebuffers
            .get(&framebuffer)
            .expect("unknown framebuffer handle");
        debug_assert!(
            x < target.width && y < target.height,
            "read_pixel at ({x},{y}) outside {}x{}",
            target.width,
            target.height
        );
        let color = target
            .colors
            .get(attachment)
            .expect("color attachment index out of range");

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("PixelReadback"),
            size: 4,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("PixelReadbackEncoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &color.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: None,
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        // Intentionally synchronous; callers only invoke this on
        // explicit user interaction.
        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());

        match rx.recv() {
            Ok(Ok(())) => {
                let data = slice.get_mapped_range();
                let value = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                drop(data);
                staging.unmap();
                value
            }
            _ => {
                log::warn!("pixel readback failed; returning empty sentinel");
                EMPTY_OWNER
            }
        }
    }

    fn begin_pass(&mut self, target: FramebufferId, clear_color: Option<[f32; 4]>) {
        debug_assert!(self.pass.is_none(), "begin_pass while a pass is open");
        self.registry.assert_live(target.0, "begin_pass");
        self.bound = [None; MAX_TEXTURE_UNITS];
        self.pass = Some(PassRecording {
            target,
            clear_color,
            camera: None,
            commands: Vec::new(),
        });
    }

    fn set_view_projection(&mut self, view_proj: Mat4) {
        let uniform = CameraUniform {
            view_proj: view_proj.to_cols_array_2d(),
        };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("CameraBuffer"),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("CameraBindGroup"),
            layout: &self.camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        let pass = self
            .pass
            .as_mut()
            .expect("set_view_projection outside a pass");
        pass.camera = Some(Arc::new(group));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.registry.assert_live(texture.0, "bind_texture");
        self.bound[unit as usize] = Some(texture);
    }

    fn draw(&mut self, desc: &DrawDesc) {
        let (key, camera) = {
            let pass = self.pass.as_ref().expect("draw outside begin_pass");
            let target = self
                .framebuffers
                .get(&pass.target)
                .expect("unknown framebuffer handle");
            let key = PipelineKey {
                shader: desc.shader,
                kind: desc.kind,
                color_formats: target.colors.iter().map(|c| c.format).collect(),
                depth_format: target.depth.as_ref().map(|(_, format)| *format),
                samples: target.spec.samples,
            };
            let camera = pass
                .camera
                .clone()
                .expect("draw before set_view_projection");
            (key, camera)
        };

        let fallback = self
            .bound
            .iter()
            .flatten()
            .next()
            .copied()
            .or(self.default_texture)
            .expect("draw with no texture ever created");
        let views: Vec<&wgpu::TextureView> = (0..MAX_TEXTURE_UNITS)
            .map(|unit| {
                let id = self.bound[unit].unwrap_or(fallback);
                &self
                    .textures
                    .get(&id)
                    .expect("unknown texture handle")
                    .view
            })
            .collect();
        let textures = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SlotTexturesBindGroup"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureViewArray(&views),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let vertices = self
            .buffers
            .get(&desc.vertices)
            .expect("unknown vertex buffer handle")
            .current
            .clone();
        let indices = desc.indices.map(|id| {
            self.buffers
                .get(&id)
                .expect("unknown index buffer handle")
                .current
                .clone()
        });

        let pass = self.pass.as_mut().expect("draw outside begin_pass");
        pass.commands.push(RecordedDraw {
            key,
            camera,
            textures,
            vertices,
            indices,
            count: desc.count,
        });
    }

    fn end_pass(&mut self) {
        let Some(pass) = self.pass.take() else {
            debug_assert!(false, "end_pass without begin_pass");
            return;
        };

        for command in &pass.commands {
            self.ensure_pipeline(&command.key);
        }

        let target = self
            .framebuffers
            .get(&pass.target)
            .expect("unknown framebuffer handle");

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("SceneEncoder"),
            });
        {
            let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = target
                .colors
                .iter()
                .enumerate()
                .map(|(index, color)| {
                    // The object-id attachment is cleared explicitly
                    // through clear_attachment, never by the pass.
                    let load = match (index, pass.clear_color, color.tag) {
                        (_, _, AttachmentFormat::ObjectId) => wgpu::LoadOp::Load,
                        (0, Some(c), _) => wgpu::LoadOp::Clear(wgpu::Color {
                            r: c[0] as f64,
                            g: c[1] as f64,
                            b: c[2] as f64,
                            a: c[3] as f64,
                        }),
                        _ => wgpu::LoadOp::Load,
                    };
                    Some(wgpu::RenderPassColorAttachment {
                        view: &color.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load,
                            store: wgpu::StoreOp::Store,
                        },
                    })
                })
                .collect();

            let depth_stencil_attachment =
                target
                    .depth
                    .as_ref()
                    .map(|(view, _)| wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: if pass.clear_color.is_some() {
                                wgpu::LoadOp::Clear(1.0)
                            } else {
                                wgpu::LoadOp::Load
                            },
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: Some(wgpu::Operations {
                            load: if pass.clear_color.is_some() {
                                wgpu::LoadOp::Clear(0)
                            } else {
                                wgpu::LoadOp::Load
                            },
                            store: wgpu::StoreOp::Store,
                        }),
                    });

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ScenePass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for command in &pass.commands {
                let pipeline = self
                    .pipelines
                    .get(&command.key)
                    .expect("pipeline prepared above");
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, command.camera.as_ref(), &[]);
                rpass.set_bind_group(1, &command.textures, &[]);
                rpass.set_vertex_buffer(0, command.vertices.slice(..));
                match &command.indices {
                    Some(indices) => {
                        rpass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                        rpass.draw_indexed(0..command.count, 0, 0..1);
                    }
                    None => rpass.draw(0..command.count, 0..1),
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn report_leaks(&self) -> usize {
        self.registry.report_leaks()
    }

    fn as_any(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

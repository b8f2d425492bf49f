//! [`GpuDriver`] and [`WindowSurface`] on top of `wgpu`.
//!
//! wgpu has no global binding state, so [`WgpuDriver`] keeps the tables a
//! classic context would (data buffers per stage slot, two vertex attribute
//! slots, texture unit 0, active pipeline, bound frame target) and turns them
//! into a bind group and vertex buffer bindings when a draw is recorded.
//! Commands accumulate in one encoder until [`GpuDriver::submit`].
//!
//! Frame targets are plain textures in the surface format. [`WgpuWindow`]
//! copies the finished one into the swapchain image and presents it.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::naga::ShaderStage;
use winit::window::Window;

use crate::driver::{
    BufferLock, CompileOutcome, DataBufferId, DriverResult, ErrorCode, Filter, FrameTargetId,
    GpuDriver, LockedBuffer, PipelineId, Primitive, SamplerId, ShaderId, ShaderKind, ShaderLog,
    ShaderLogId, SubmitId, TextureId, VertexArray, VertexBufferId, Viewport,
};
use crate::error::{NovaError, Result};
use crate::surface::{BlitRequest, SurfaceHandle, WindowSurface};

const SPIRV_MAGIC: u32 = 0x0723_0203;
const UNIFORM_ALIGNMENT: u64 = 16;
const ATTRIB_SLOTS: usize = 2;

const VERTEX_PARAMS_BINDING: u32 = 0;
const FRAGMENT_PARAMS_BINDING: u32 = 1;
const PALETTE_TEXTURE_BINDING: u32 = 2;
const PALETTE_SAMPLER_BINDING: u32 = 3;

struct FrameTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// State shared between the driver and the window: the device, and the frame
/// targets the window blits from.
struct Shared {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    frame_targets: RefCell<HashMap<FrameTargetId, FrameTexture>>,
}

/// Opens the adapter, device and window surface.
pub fn open(window: Arc<Window>, vsync: bool) -> Result<(WgpuDriver, WgpuWindow)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    });

    let window_handle = window
        .window_handle()
        .map_err(|err| init_error("failed to acquire window handle", err))?;
    let display_handle = window
        .display_handle()
        .map_err(|err| init_error("failed to acquire display handle", err))?;

    // The surface is dropped before the window: `WgpuWindow` declares it first.
    let surface = unsafe {
        instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
            raw_display_handle: display_handle.as_raw(),
            raw_window_handle: window_handle.as_raw(),
        })
    }
    .map_err(|err| init_error("failed to create rendering surface", err))?;

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
    }))
    .map_err(|err| init_error("failed to find a suitable GPU adapter", err))?;

    let info = adapter.get_info();
    tracing::debug!(
        name = %info.name,
        backend = ?info.backend,
        device_type = ?info.device_type,
        "selected GPU adapter"
    );

    let limits = adapter.limits();
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("fractalnova device"),
        required_features: wgpu::Features::empty(),
        required_limits: limits.clone(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::default(),
    }))
    .map_err(|err| init_error("failed to create GPU device", err))?;

    let caps = surface.get_capabilities(&adapter);
    if !caps.usages.contains(wgpu::TextureUsages::COPY_DST) {
        return Err(NovaError::Initialization(
            "surface does not accept copies; cannot present frame targets".to_string(),
        ));
    }
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .ok_or_else(|| NovaError::Initialization("surface reports no formats".to_string()))?;
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);

    let size = window.inner_size();
    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: present_mode_for(&caps, vsync, wgpu::PresentMode::Fifo),
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &config);
    tracing::debug!(?format, present_mode = ?config.present_mode, "configured surface");

    let shared = Rc::new(Shared {
        device,
        queue,
        format,
        frame_targets: RefCell::new(HashMap::new()),
    });
    let driver = WgpuDriver::new(Rc::clone(&shared), limits.max_texture_dimension_2d);
    let surface = WgpuWindow {
        surface,
        window,
        shared,
        config,
        caps,
    };
    Ok((driver, surface))
}

fn init_error(context: &str, err: impl std::fmt::Display) -> NovaError {
    NovaError::Initialization(format!("{context}: {err}"))
}

/// With vsync prefer Fifo; without, prefer Immediate then Mailbox.
fn present_mode_for(
    caps: &wgpu::SurfaceCapabilities,
    vsync: bool,
    current: wgpu::PresentMode,
) -> wgpu::PresentMode {
    let supports = |mode: wgpu::PresentMode| caps.present_modes.contains(&mode);
    if vsync {
        if supports(wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            current
        }
    } else {
        [wgpu::PresentMode::Immediate, wgpu::PresentMode::Mailbox]
            .into_iter()
            .find(|mode| supports(*mode))
            .unwrap_or(current)
    }
}

struct DataBuffer {
    buffer: wgpu::Buffer,
    size: u64,
}

struct VertexBuffer {
    buffer: wgpu::Buffer,
    size: u64,
    arrays: Vec<Option<VertexArray>>,
}

struct PaletteTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct Sampler {
    sampler: wgpu::Sampler,
}

type AttribLayouts = [VertexArray; ATTRIB_SLOTS];

struct Pipeline {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    compiled: Option<(AttribLayouts, wgpu::RenderPipeline)>,
}

/// Layout the pipeline is linked against before any vertex arrays are bound:
/// interleaved vec2 position and vec2 texcoord.
const DEFAULT_ATTRIBS: AttribLayouts = [
    VertexArray {
        element_count: 2,
        stride: 16,
        offset: 0,
        count: 4,
    },
    VertexArray {
        element_count: 2,
        stride: 16,
        offset: 8,
        count: 4,
    },
];

pub struct WgpuDriver {
    shared: Rc<Shared>,
    max_texture_dimension: u32,
    next_id: u32,
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    shaders: HashMap<ShaderId, (ShaderKind, wgpu::ShaderModule)>,
    logs: HashSet<ShaderLogId>,
    data_buffers: HashMap<DataBufferId, DataBuffer>,
    vertex_buffers: HashMap<VertexBufferId, VertexBuffer>,
    textures: HashMap<TextureId, PaletteTexture>,
    samplers: HashMap<SamplerId, Sampler>,
    pipelines: HashMap<PipelineId, Pipeline>,
    submissions: HashMap<SubmitId, wgpu::SubmissionIndex>,
    data_bindings: HashMap<(ShaderKind, u32), DataBufferId>,
    attribs: [Option<(VertexBufferId, u32)>; ATTRIB_SLOTS],
    texture_unit: Option<(TextureId, SamplerId)>,
    active_pipeline: Option<PipelineId>,
    frame_target: Option<FrameTargetId>,
    viewport: Viewport,
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuDriver {
    fn new(shared: Rc<Shared>, max_texture_dimension: u32) -> Self {
        let device = &shared.device;
        let uniform_entry = |binding, visibility| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fractal parameter layout"),
            entries: &[
                uniform_entry(VERTEX_PARAMS_BINDING, wgpu::ShaderStages::VERTEX),
                uniform_entry(FRAGMENT_PARAMS_BINDING, wgpu::ShaderStages::FRAGMENT),
                wgpu::BindGroupLayoutEntry {
                    binding: PALETTE_TEXTURE_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: PALETTE_SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("fractal pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        Self {
            shared,
            max_texture_dimension,
            next_id: 1,
            layout,
            pipeline_layout,
            shaders: HashMap::new(),
            logs: HashSet::new(),
            data_buffers: HashMap::new(),
            vertex_buffers: HashMap::new(),
            textures: HashMap::new(),
            samplers: HashMap::new(),
            pipelines: HashMap::new(),
            submissions: HashMap::new(),
            data_bindings: HashMap::new(),
            attribs: [None; ATTRIB_SLOTS],
            texture_unit: None,
            active_pipeline: None,
            frame_target: None,
            viewport: Viewport::default(),
            encoder: None,
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn device(&self) -> &wgpu::Device {
        &self.shared.device
    }

    /// Runs `create` inside a validation error scope.
    fn scoped<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        let device = self.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(device);
        let error = pollster::block_on(device.pop_error_scope());
        (value, error)
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.shared.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("fractalnova frame encoder"),
            })
        })
    }

    fn frame_view(&self) -> DriverResult<wgpu::TextureView> {
        let target = self.frame_target.ok_or(ErrorCode::NotBound)?;
        self.shared
            .frame_targets
            .borrow()
            .get(&target)
            .map(|frame| frame.view.clone())
            .ok_or(ErrorCode::NotBound)
    }

    fn bound_attribs(&self) -> DriverResult<([wgpu::Buffer; ATTRIB_SLOTS], AttribLayouts)> {
        let mut buffers = Vec::with_capacity(ATTRIB_SLOTS);
        let mut layouts = DEFAULT_ATTRIBS;
        for (slot, binding) in self.attribs.iter().enumerate() {
            let (id, array) = binding.ok_or(ErrorCode::NotBound)?;
            let entry = self.vertex_buffers.get(&id).ok_or(ErrorCode::NotBound)?;
            layouts[slot] = entry
                .arrays
                .get(array as usize)
                .copied()
                .flatten()
                .ok_or(ErrorCode::NotBound)?;
            buffers.push(entry.buffer.clone());
        }
        let buffers: [wgpu::Buffer; ATTRIB_SLOTS] =
            buffers.try_into().map_err(|_| ErrorCode::NotBound)?;
        Ok((buffers, layouts))
    }

    fn link(
        &self,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
        attribs: &AttribLayouts,
    ) -> DriverResult<wgpu::RenderPipeline> {
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = attribs
            .iter()
            .enumerate()
            .map(|(location, array)| {
                Ok([wgpu::VertexAttribute {
                    format: float_format(array.element_count)?,
                    offset: u64::from(array.offset),
                    shader_location: location as u32,
                }])
            })
            .collect::<DriverResult<_>>()?;
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = attribs
            .iter()
            .zip(&attributes)
            .map(|(array, attributes)| wgpu::VertexBufferLayout {
                array_stride: u64::from(array.stride),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let (pipeline, error) = self.scoped(|device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("fractal pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some("main"),
                    buffers: &buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.shared.format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            })
        });
        match error {
            Some(err) => {
                tracing::error!(error = %err, "pipeline link failed");
                Err(ErrorCode::LinkFailed)
            }
            None => Ok(pipeline),
        }
    }

    /// Returns the active pipeline, relinking it when the bound vertex layout
    /// differs from the one it was built for.
    fn active_render_pipeline(&mut self, attribs: &AttribLayouts) -> DriverResult<wgpu::RenderPipeline> {
        let id = self.active_pipeline.ok_or(ErrorCode::NotBound)?;
        let entry = self.pipelines.get(&id).ok_or(ErrorCode::NotBound)?;
        if let Some((layouts, pipeline)) = &entry.compiled {
            if layouts == attribs {
                return Ok(pipeline.clone());
            }
        }

        let pipeline = self.link(&entry.vertex, &entry.fragment, attribs)?;
        if let Some(entry) = self.pipelines.get_mut(&id) {
            entry.compiled = Some((*attribs, pipeline.clone()));
        }
        Ok(pipeline)
    }

    fn bind_group(&self) -> DriverResult<wgpu::BindGroup> {
        let data = |kind| {
            self.data_bindings
                .get(&(kind, 0))
                .and_then(|id| self.data_buffers.get(id))
                .ok_or(ErrorCode::NotBound)
        };
        let vertex = data(ShaderKind::Vertex)?;
        let fragment = data(ShaderKind::Fragment)?;
        let (texture, sampler) = self.texture_unit.ok_or(ErrorCode::NotBound)?;
        let texture = self.textures.get(&texture).ok_or(ErrorCode::NotBound)?;
        let sampler = self.samplers.get(&sampler).ok_or(ErrorCode::NotBound)?;

        Ok(self.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("fractal parameters"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: VERTEX_PARAMS_BINDING,
                    resource: vertex.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: FRAGMENT_PARAMS_BINDING,
                    resource: fragment.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: PALETTE_TEXTURE_BINDING,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: PALETTE_SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&sampler.sampler),
                },
            ],
        }))
    }

    fn write_buffer(&self, buffer: &wgpu::Buffer, capacity: u64, bytes: &[u8], offset: u64) -> DriverResult<()> {
        let end = offset.checked_add(bytes.len() as u64).ok_or(ErrorCode::InvalidParameter)?;
        if end > capacity || bytes.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(ErrorCode::InvalidParameter);
        }
        self.shared.queue.write_buffer(buffer, offset, bytes);
        Ok(())
    }
}

fn float_format(element_count: u32) -> DriverResult<wgpu::VertexFormat> {
    match element_count {
        1 => Ok(wgpu::VertexFormat::Float32),
        2 => Ok(wgpu::VertexFormat::Float32x2),
        3 => Ok(wgpu::VertexFormat::Float32x3),
        4 => Ok(wgpu::VertexFormat::Float32x4),
        _ => Err(ErrorCode::InvalidParameter),
    }
}

fn filter_mode(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    }
}

fn naga_stage(kind: ShaderKind) -> ShaderStage {
    match kind {
        ShaderKind::Vertex => ShaderStage::Vertex,
        ShaderKind::Fragment => ShaderStage::Fragment,
    }
}

fn is_spirv(bytes: &[u8]) -> bool {
    bytes
        .get(..4)
        .and_then(|head| head.try_into().ok())
        .is_some_and(|head: [u8; 4]| u32::from_le_bytes(head) == SPIRV_MAGIC)
}

impl GpuDriver for WgpuDriver {
    fn compile_shader(&mut self, kind: ShaderKind, path: &Path) -> CompileOutcome {
        let fail = |driver: &mut Self, code: ErrorCode, text: String| {
            let id = ShaderLogId(driver.next_id());
            driver.logs.insert(id);
            CompileOutcome {
                shader: Err(code),
                log: Some(ShaderLog { id, text }),
            }
        };

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                let code = if err.kind() == std::io::ErrorKind::NotFound {
                    ErrorCode::FileNotFound
                } else {
                    ErrorCode::InvalidParameter
                };
                return fail(self, code, format!("{}: {err}", path.display()));
            }
        };

        let source = if is_spirv(&bytes) {
            wgpu::util::make_spirv(&bytes)
        } else {
            match std::str::from_utf8(&bytes) {
                Ok(text) => wgpu::ShaderSource::Glsl {
                    shader: Cow::Owned(text.to_owned()),
                    stage: naga_stage(kind),
                    defines: &[],
                },
                Err(err) => {
                    return fail(
                        self,
                        ErrorCode::CompileFailed,
                        format!("{}: neither SPIR-V nor UTF-8 GLSL: {err}", path.display()),
                    )
                }
            }
        };

        let label = path.display().to_string();
        let (module, error) = self.scoped(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source,
            })
        });
        if let Some(err) = error {
            return fail(self, ErrorCode::CompileFailed, err.to_string());
        }

        let id = ShaderId(self.next_id());
        self.shaders.insert(id, (kind, module));
        CompileOutcome {
            shader: Ok(id),
            log: None,
        }
    }

    fn destroy_shader_log(&mut self, log: ShaderLogId) {
        self.logs.remove(&log);
    }

    fn destroy_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
    }

    fn create_data_buffer(&mut self, size: u64) -> DriverResult<DataBufferId> {
        if size == 0 {
            return Err(ErrorCode::InvalidParameter);
        }
        let buffer = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("shader parameters"),
            size: size.next_multiple_of(UNIFORM_ALIGNMENT),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = DataBufferId(self.next_id());
        self.data_buffers.insert(id, DataBuffer { buffer, size });
        Ok(id)
    }

    fn set_data_buffer(
        &mut self,
        buffer: DataBufferId,
        offset: u64,
        size: u64,
        shader: ShaderId,
    ) -> DriverResult<()> {
        let entry = self
            .data_buffers
            .get(&buffer)
            .ok_or(ErrorCode::InvalidParameter)?;
        if !self.shaders.contains_key(&shader) || offset + size > entry.size {
            return Err(ErrorCode::InvalidParameter);
        }
        Ok(())
    }

    fn bind_shader_data_buffer(
        &mut self,
        kind: ShaderKind,
        slot: u32,
        buffer: Option<DataBufferId>,
    ) -> DriverResult<()> {
        match buffer {
            Some(buffer) => {
                if !self.data_buffers.contains_key(&buffer) {
                    return Err(ErrorCode::InvalidParameter);
                }
                self.data_bindings.insert((kind, slot), buffer);
            }
            None => {
                self.data_bindings.remove(&(kind, slot));
            }
        }
        Ok(())
    }

    fn lock_data_buffer(&mut self, buffer: DataBufferId) -> DriverResult<BufferLock> {
        let entry = self
            .data_buffers
            .get(&buffer)
            .ok_or(ErrorCode::InvalidParameter)?;
        Ok(BufferLock {
            buffer: LockedBuffer::Data(buffer),
            bytes: vec![0; entry.size as usize],
        })
    }

    fn destroy_data_buffer(&mut self, buffer: DataBufferId) {
        if let Some(entry) = self.data_buffers.remove(&buffer) {
            entry.buffer.destroy();
        }
    }

    fn create_vertex_buffer(&mut self, size: u64, arrays: u32) -> DriverResult<VertexBufferId> {
        if size == 0 || size % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(ErrorCode::InvalidParameter);
        }
        let buffer = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("vertex buffer"),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = VertexBufferId(self.next_id());
        self.vertex_buffers.insert(
            id,
            VertexBuffer {
                buffer,
                size,
                arrays: vec![None; arrays as usize],
            },
        );
        Ok(id)
    }

    fn set_vertex_array(
        &mut self,
        buffer: VertexBufferId,
        array: u32,
        layout: VertexArray,
    ) -> DriverResult<()> {
        float_format(layout.element_count)?;
        let entry = self
            .vertex_buffers
            .get_mut(&buffer)
            .ok_or(ErrorCode::InvalidParameter)?;
        let last = u64::from(layout.offset)
            + u64::from(layout.stride) * u64::from(layout.count.saturating_sub(1))
            + u64::from(layout.element_count) * 4;
        if last > entry.size {
            return Err(ErrorCode::InvalidParameter);
        }
        let slot = entry
            .arrays
            .get_mut(array as usize)
            .ok_or(ErrorCode::InvalidParameter)?;
        *slot = Some(layout);
        Ok(())
    }

    fn lock_vertex_buffer(&mut self, buffer: VertexBufferId) -> DriverResult<BufferLock> {
        let entry = self
            .vertex_buffers
            .get(&buffer)
            .ok_or(ErrorCode::InvalidParameter)?;
        Ok(BufferLock {
            buffer: LockedBuffer::Vertex(buffer),
            bytes: vec![0; entry.size as usize],
        })
    }

    fn bind_vertex_attrib_array(
        &mut self,
        attrib: u32,
        source: Option<(VertexBufferId, u32)>,
    ) -> DriverResult<()> {
        if let Some((buffer, _)) = source {
            if !self.vertex_buffers.contains_key(&buffer) {
                return Err(ErrorCode::InvalidParameter);
            }
        }
        let slot = self
            .attribs
            .get_mut(attrib as usize)
            .ok_or(ErrorCode::InvalidParameter)?;
        *slot = source;
        Ok(())
    }

    fn destroy_vertex_buffer(&mut self, buffer: VertexBufferId) {
        if let Some(entry) = self.vertex_buffers.remove(&buffer) {
            entry.buffer.destroy();
        }
    }

    fn unlock_buffer(&mut self, lock: BufferLock, offset: u64, size: u64) -> DriverResult<()> {
        let start = offset as usize;
        let end = start
            .checked_add(size as usize)
            .ok_or(ErrorCode::InvalidParameter)?;
        let bytes = lock.bytes.get(start..end).ok_or(ErrorCode::InvalidParameter)?;
        match lock.buffer {
            LockedBuffer::Data(id) => {
                let entry = self.data_buffers.get(&id).ok_or(ErrorCode::InvalidParameter)?;
                self.write_buffer(&entry.buffer, entry.size, bytes, offset)
            }
            LockedBuffer::Vertex(id) => {
                let entry = self
                    .vertex_buffers
                    .get(&id)
                    .ok_or(ErrorCode::InvalidParameter)?;
                self.write_buffer(&entry.buffer, entry.size, bytes, offset)
            }
        }
    }

    fn create_texture(&mut self, width: u32, height: u32) -> DriverResult<TextureId> {
        if width == 0
            || height == 0
            || width > self.max_texture_dimension
            || height > self.max_texture_dimension
        {
            return Err(ErrorCode::InvalidParameter);
        }
        let texture = self.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("palette texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = TextureId(self.next_id());
        self.textures.insert(
            id,
            PaletteTexture {
                texture,
                view,
                width,
                height,
            },
        );
        Ok(id)
    }

    fn update_texture_image(&mut self, texture: TextureId, pixels: &[u8]) -> DriverResult<()> {
        let entry = self
            .textures
            .get(&texture)
            .ok_or(ErrorCode::InvalidParameter)?;
        let expected = entry.width as usize * entry.height as usize * 4;
        if pixels.len() != expected {
            return Err(ErrorCode::InvalidParameter);
        }
        self.shared.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(entry.width * 4),
                rows_per_image: Some(entry.height),
            },
            wgpu::Extent3d {
                width: entry.width,
                height: entry.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
    }

    fn create_sampler(&mut self) -> DriverResult<SamplerId> {
        let sampler = make_sampler(self.device(), Filter::Nearest, Filter::Nearest);
        let id = SamplerId(self.next_id());
        self.samplers.insert(id, Sampler { sampler });
        Ok(id)
    }

    fn set_sampler_filter(
        &mut self,
        sampler: SamplerId,
        min: Filter,
        mag: Filter,
    ) -> DriverResult<()> {
        // wgpu samplers are immutable; swap in a new one under the same handle.
        let replacement = make_sampler(&self.shared.device, min, mag);
        let entry = self
            .samplers
            .get_mut(&sampler)
            .ok_or(ErrorCode::InvalidParameter)?;
        entry.sampler = replacement;
        Ok(())
    }

    fn destroy_sampler(&mut self, sampler: SamplerId) {
        self.samplers.remove(&sampler);
    }

    fn bind_texture(
        &mut self,
        unit: u32,
        binding: Option<(TextureId, SamplerId)>,
    ) -> DriverResult<()> {
        if unit != 0 {
            return Err(ErrorCode::Unsupported);
        }
        if let Some((texture, sampler)) = binding {
            if !self.textures.contains_key(&texture) || !self.samplers.contains_key(&sampler) {
                return Err(ErrorCode::InvalidParameter);
            }
        }
        self.texture_unit = binding;
        Ok(())
    }

    fn create_pipeline(&mut self, vertex: ShaderId, fragment: ShaderId) -> DriverResult<PipelineId> {
        let module = |id: ShaderId, expected: ShaderKind| match self.shaders.get(&id) {
            Some((kind, module)) if *kind == expected => Ok(module.clone()),
            _ => Err(ErrorCode::InvalidParameter),
        };
        let vertex = module(vertex, ShaderKind::Vertex)?;
        let fragment = module(fragment, ShaderKind::Fragment)?;

        let attribs = self.bound_attribs().map_or(DEFAULT_ATTRIBS, |(_, layouts)| layouts);
        let pipeline = self.link(&vertex, &fragment, &attribs)?;

        let id = PipelineId(self.next_id());
        self.pipelines.insert(
            id,
            Pipeline {
                vertex,
                fragment,
                compiled: Some((attribs, pipeline)),
            },
        );
        Ok(id)
    }

    fn set_pipeline(&mut self, pipeline: Option<PipelineId>) -> DriverResult<()> {
        if let Some(id) = pipeline {
            if !self.pipelines.contains_key(&id) {
                return Err(ErrorCode::InvalidParameter);
            }
        }
        self.active_pipeline = pipeline;
        Ok(())
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineId) {
        self.pipelines.remove(&pipeline);
    }

    fn create_frame_target(&mut self, width: u32, height: u32) -> DriverResult<FrameTargetId> {
        if width == 0
            || height == 0
            || width > self.max_texture_dimension
            || height > self.max_texture_dimension
        {
            return Err(ErrorCode::InvalidParameter);
        }
        let texture = self.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("frame target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.shared.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = FrameTargetId(self.next_id());
        self.shared
            .frame_targets
            .borrow_mut()
            .insert(id, FrameTexture { texture, view });
        Ok(id)
    }

    fn bind_frame_target(&mut self, target: Option<FrameTargetId>) -> DriverResult<()> {
        if let Some(id) = target {
            if !self.shared.frame_targets.borrow().contains_key(&id) {
                return Err(ErrorCode::InvalidParameter);
            }
        }
        self.frame_target = target;
        Ok(())
    }

    fn destroy_frame_target(&mut self, target: FrameTargetId) {
        if let Some(frame) = self.shared.frame_targets.borrow_mut().remove(&target) {
            frame.texture.destroy();
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) -> DriverResult<()> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(ErrorCode::InvalidParameter);
        }
        self.viewport = viewport;
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) -> DriverResult<()> {
        let view = self.frame_view()?;
        let [r, g, b, a] = color.map(f64::from);
        let encoder = self.encoder();
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear frame target"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        Ok(())
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) -> DriverResult<()> {
        let Primitive::TriangleStrip = primitive;
        let view = self.frame_view()?;
        let (buffers, attribs) = self.bound_attribs()?;
        let pipeline = self.active_render_pipeline(&attribs)?;
        let bind_group = self.bind_group()?;
        let viewport = self.viewport;

        let encoder = self.encoder();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("fractal pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_viewport(
            viewport.x as f32,
            viewport.y as f32,
            viewport.width as f32,
            viewport.height as f32,
            0.0,
            1.0,
        );
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        for (slot, buffer) in buffers.iter().enumerate() {
            pass.set_vertex_buffer(slot as u32, buffer.slice(..));
        }
        pass.draw(first..first + count, 0..1);
        Ok(())
    }

    fn submit(&mut self) -> DriverResult<SubmitId> {
        let encoder = self.encoder.take().unwrap_or_else(|| {
            self.shared
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("fractalnova empty frame"),
                })
        });
        let index = self.shared.queue.submit(Some(encoder.finish()));
        let id = SubmitId(self.next_id());
        self.submissions.insert(id, index);
        Ok(id)
    }

    fn wait_done(&mut self, submit: SubmitId) -> DriverResult<()> {
        let index = self
            .submissions
            .remove(&submit)
            .ok_or(ErrorCode::InvalidParameter)?;
        self.shared
            .device
            .poll(wgpu::PollType::WaitForSubmissionIndex(index))
            .map(|_| ())
            .map_err(|err| {
                tracing::error!(error = %err, "waiting for GPU completion failed");
                ErrorCode::DeviceLost
            })
    }
}

fn make_sampler(device: &wgpu::Device, min: Filter, mag: Filter) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("palette sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter_mode(mag),
        min_filter: filter_mode(min),
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// The winit window plus its swapchain.
pub struct WgpuWindow {
    surface: wgpu::Surface<'static>,
    window: Arc<Window>,
    shared: Rc<Shared>,
    config: wgpu::SurfaceConfiguration,
    caps: wgpu::SurfaceCapabilities,
}

impl WgpuWindow {
    fn reconfigure(&mut self) {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.shared.device, &self.config);
    }

    fn acquire(&mut self) -> Result<Option<wgpu::SurfaceTexture>> {
        let size = self.window.inner_size();
        if (size.width, size.height) != (self.config.width, self.config.height) {
            self.reconfigure();
        }

        match self.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.reconfigure();
                self.surface
                    .get_current_texture()
                    .map(Some)
                    .map_err(|err| NovaError::Window(format!("failed to acquire frame: {err}")))
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!("surface timeout; skipping frame");
                Ok(None)
            }
            Err(err) => Err(NovaError::Window(format!("failed to acquire frame: {err}"))),
        }
    }
}

impl WindowSurface for WgpuWindow {
    fn client_size(&self) -> Result<(u32, u32)> {
        let size = self.window.inner_size();
        Ok((size.width, size.height))
    }

    fn native_surface(&self) -> SurfaceHandle {
        SurfaceHandle(u64::from(self.window.id()))
    }

    fn set_vsync(&mut self, enabled: bool) -> Result<()> {
        let target_mode = present_mode_for(&self.caps, enabled, self.config.present_mode);
        if target_mode != self.config.present_mode {
            self.config.present_mode = target_mode;
            self.surface.configure(&self.shared.device, &self.config);
            tracing::debug!(
                ?target_mode,
                vsync_enabled = enabled,
                "reconfigured surface present mode"
            );
        }
        Ok(())
    }

    fn wait_for_refresh(&self) {
        // Fifo presentation blocks in `get_current_texture` until the next
        // refresh, which `blit_frame_target` calls before copying.
        tracing::trace!(present_mode = ?self.config.present_mode, "refresh wait");
    }

    fn blit_frame_target(&mut self, request: BlitRequest) -> Result<()> {
        let Some(frame) = self.acquire()? else {
            return Ok(());
        };

        let target = frame.texture.size();
        let width = request
            .width
            .min(target.width.saturating_sub(request.dest_x));
        let height = request
            .height
            .min(target.height.saturating_sub(request.dest_y));
        if width == 0 || height == 0 {
            frame.present();
            return Ok(());
        }

        let targets = self.shared.frame_targets.borrow();
        let source = targets.get(&request.source).ok_or_else(|| {
            NovaError::Window(format!("{} is not a live frame target", request.source))
        })?;

        let mut encoder =
            self.shared
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("blit frame target"),
                });
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &source.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &frame.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: request.dest_x,
                    y: request.dest_y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.shared.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_spirv_magic() {
        assert!(is_spirv(&[0x03, 0x02, 0x23, 0x07, 0x00]));
        assert!(!is_spirv(b"#version 450"));
        assert!(!is_spirv(&[0x03, 0x02]));
    }

    #[test]
    fn shipped_shaders_parse_and_validate() {
        use wgpu::naga::front::glsl::{Frontend, Options};
        use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../shaders");
        for family in ["mandelbrot", "julia"] {
            for kind in [ShaderKind::Vertex, ShaderKind::Fragment] {
                let name = format!("{family}.{}", kind.extension());
                let source = std::fs::read_to_string(dir.join(&name)).expect("shader source");
                let module = Frontend::default()
                    .parse(&Options::from(naga_stage(kind)), &source)
                    .unwrap_or_else(|err| panic!("{name}: {err:?}"));
                Validator::new(ValidationFlags::all(), Capabilities::empty())
                    .validate(&module)
                    .unwrap_or_else(|err| panic!("{name}: {err:?}"));
            }
        }
    }

    #[test]
    fn maps_element_counts_to_float_formats() {
        assert_eq!(float_format(2), Ok(wgpu::VertexFormat::Float32x2));
        assert_eq!(float_format(4), Ok(wgpu::VertexFormat::Float32x4));
        assert_eq!(float_format(0), Err(ErrorCode::InvalidParameter));
    }
}

//! Recording driver and window used by tests and `--dry-run`.
//!
//! [`RecordingDriver`] hands out handles from a counter, keeps the same binding
//! tables a real context would, and appends every call to a shared
//! [`CallLog`]. Misuse that a real driver would punish (destroying a shader a
//! live pipeline still links, destroying a bound object, destroying twice) is
//! collected as a violation instead of crashing, so tests can assert on it.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{
    BufferLock, CompileOutcome, DataBufferId, DriverResult, ErrorCode, Filter, FrameTargetId,
    GpuDriver, LockedBuffer, PipelineId, Primitive, SamplerId, ShaderId, ShaderKind, ShaderLog,
    ShaderLogId, SubmitId, TextureId, VertexArray, VertexBufferId, Viewport,
};
use crate::error::{NovaError, Result};
use crate::surface::{BlitRequest, SurfaceHandle, WindowSurface};

/// One recorded driver or window call.
#[derive(Clone, Debug, PartialEq)]
pub enum DriverCall {
    CompileShader { kind: ShaderKind, path: PathBuf },
    DestroyShaderLog(ShaderLogId),
    DestroyShader(ShaderId),
    CreateDataBuffer { size: u64 },
    SetDataBuffer { buffer: DataBufferId, size: u64, shader: ShaderId },
    BindShaderDataBuffer { kind: ShaderKind, slot: u32, buffer: Option<DataBufferId> },
    LockDataBuffer(DataBufferId),
    DestroyDataBuffer(DataBufferId),
    CreateVertexBuffer { size: u64, arrays: u32 },
    SetVertexArray { buffer: VertexBufferId, array: u32, layout: VertexArray },
    LockVertexBuffer(VertexBufferId),
    BindVertexAttribArray { attrib: u32, source: Option<(VertexBufferId, u32)> },
    DestroyVertexBuffer(VertexBufferId),
    UnlockBuffer { buffer: LockedBuffer, bytes: Vec<u8> },
    CreateTexture { width: u32, height: u32 },
    UpdateTextureImage { texture: TextureId, len: usize },
    DestroyTexture(TextureId),
    CreateSampler,
    SetSamplerFilter { sampler: SamplerId, min: Filter, mag: Filter },
    DestroySampler(SamplerId),
    BindTexture { unit: u32, binding: Option<(TextureId, SamplerId)> },
    CreatePipeline { vertex: ShaderId, fragment: ShaderId },
    SetPipeline(Option<PipelineId>),
    DestroyPipeline(PipelineId),
    CreateFrameTarget { width: u32, height: u32 },
    BindFrameTarget(Option<FrameTargetId>),
    DestroyFrameTarget(FrameTargetId),
    SetViewport(Viewport),
    Clear([f32; 4]),
    DrawArrays { primitive: Primitive, first: u32, count: u32 },
    Submit,
    WaitDone(SubmitId),
    SetVsync(bool),
    WaitForRefresh,
    Blit(BlitRequest),
}

/// Discriminant of [`DriverCall`], used for counting and arming failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
    CompileShader,
    DestroyShaderLog,
    DestroyShader,
    CreateDataBuffer,
    SetDataBuffer,
    BindShaderDataBuffer,
    LockDataBuffer,
    DestroyDataBuffer,
    CreateVertexBuffer,
    SetVertexArray,
    LockVertexBuffer,
    BindVertexAttribArray,
    DestroyVertexBuffer,
    UnlockBuffer,
    CreateTexture,
    UpdateTextureImage,
    DestroyTexture,
    CreateSampler,
    SetSamplerFilter,
    DestroySampler,
    BindTexture,
    CreatePipeline,
    SetPipeline,
    DestroyPipeline,
    CreateFrameTarget,
    BindFrameTarget,
    DestroyFrameTarget,
    SetViewport,
    Clear,
    DrawArrays,
    Submit,
    WaitDone,
    SetVsync,
    WaitForRefresh,
    Blit,
}

impl DriverCall {
    pub fn kind(&self) -> CallKind {
        match self {
            DriverCall::CompileShader { .. } => CallKind::CompileShader,
            DriverCall::DestroyShaderLog(_) => CallKind::DestroyShaderLog,
            DriverCall::DestroyShader(_) => CallKind::DestroyShader,
            DriverCall::CreateDataBuffer { .. } => CallKind::CreateDataBuffer,
            DriverCall::SetDataBuffer { .. } => CallKind::SetDataBuffer,
            DriverCall::BindShaderDataBuffer { .. } => CallKind::BindShaderDataBuffer,
            DriverCall::LockDataBuffer(_) => CallKind::LockDataBuffer,
            DriverCall::DestroyDataBuffer(_) => CallKind::DestroyDataBuffer,
            DriverCall::CreateVertexBuffer { .. } => CallKind::CreateVertexBuffer,
            DriverCall::SetVertexArray { .. } => CallKind::SetVertexArray,
            DriverCall::LockVertexBuffer(_) => CallKind::LockVertexBuffer,
            DriverCall::BindVertexAttribArray { .. } => CallKind::BindVertexAttribArray,
            DriverCall::DestroyVertexBuffer(_) => CallKind::DestroyVertexBuffer,
            DriverCall::UnlockBuffer { .. } => CallKind::UnlockBuffer,
            DriverCall::CreateTexture { .. } => CallKind::CreateTexture,
            DriverCall::UpdateTextureImage { .. } => CallKind::UpdateTextureImage,
            DriverCall::DestroyTexture(_) => CallKind::DestroyTexture,
            DriverCall::CreateSampler => CallKind::CreateSampler,
            DriverCall::SetSamplerFilter { .. } => CallKind::SetSamplerFilter,
            DriverCall::DestroySampler(_) => CallKind::DestroySampler,
            DriverCall::BindTexture { .. } => CallKind::BindTexture,
            DriverCall::CreatePipeline { .. } => CallKind::CreatePipeline,
            DriverCall::SetPipeline(_) => CallKind::SetPipeline,
            DriverCall::DestroyPipeline(_) => CallKind::DestroyPipeline,
            DriverCall::CreateFrameTarget { .. } => CallKind::CreateFrameTarget,
            DriverCall::BindFrameTarget(_) => CallKind::BindFrameTarget,
            DriverCall::DestroyFrameTarget(_) => CallKind::DestroyFrameTarget,
            DriverCall::SetViewport(_) => CallKind::SetViewport,
            DriverCall::Clear(_) => CallKind::Clear,
            DriverCall::DrawArrays { .. } => CallKind::DrawArrays,
            DriverCall::Submit => CallKind::Submit,
            DriverCall::WaitDone(_) => CallKind::WaitDone,
            DriverCall::SetVsync(_) => CallKind::SetVsync,
            DriverCall::WaitForRefresh => CallKind::WaitForRefresh,
            DriverCall::Blit(_) => CallKind::Blit,
        }
    }
}

/// Objects the recording driver currently considers alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LiveObject {
    Shader(ShaderId),
    ShaderLog(ShaderLogId),
    DataBuffer(DataBufferId),
    VertexBuffer(VertexBufferId),
    Texture(TextureId),
    Sampler(SamplerId),
    Pipeline(PipelineId),
    FrameTarget(FrameTargetId),
}

#[derive(Default)]
struct LogState {
    calls: Vec<DriverCall>,
    live: BTreeSet<LiveObject>,
    violations: Vec<String>,
}

/// Shared view of everything a [`RecordingDriver`] and [`RecordingSurface`] saw.
#[derive(Clone, Default)]
pub struct CallLog {
    state: Rc<RefCell<LogState>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.borrow().calls.clone()
    }

    pub fn kinds(&self) -> Vec<CallKind> {
        self.state.borrow().calls.iter().map(DriverCall::kind).collect()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| call.kind() == kind)
            .count()
    }

    /// Index of the first call of `kind`, if any.
    pub fn position(&self, kind: CallKind) -> Option<usize> {
        self.state
            .borrow()
            .calls
            .iter()
            .position(|call| call.kind() == kind)
    }

    /// Index of the last call of `kind`, if any.
    pub fn last_position(&self, kind: CallKind) -> Option<usize> {
        self.state
            .borrow()
            .calls
            .iter()
            .rposition(|call| call.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the recorded calls but keeps live objects and violations.
    pub fn clear(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn live_objects(&self) -> Vec<LiveObject> {
        self.state.borrow().live.iter().copied().collect()
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    fn push(&self, call: DriverCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn insert_live(&self, object: LiveObject) {
        self.state.borrow_mut().live.insert(object);
    }

    fn remove_live(&self, object: LiveObject) {
        let mut state = self.state.borrow_mut();
        if !state.live.remove(&object) {
            state
                .violations
                .push(format!("destroyed {object:?} which is not alive"));
        }
    }

    fn violation(&self, message: String) {
        self.state.borrow_mut().violations.push(message);
    }
}

/// Fake [`GpuDriver`] that records calls instead of rendering.
pub struct RecordingDriver {
    log: CallLog,
    next_id: u32,
    verify_assets: bool,
    failures: HashMap<CallKind, ErrorCode>,
    data_sizes: HashMap<DataBufferId, u64>,
    vertex_sizes: HashMap<VertexBufferId, u64>,
    pipelines: HashMap<PipelineId, (ShaderId, ShaderId)>,
    active_pipeline: Option<PipelineId>,
    data_bindings: HashMap<(ShaderKind, u32), DataBufferId>,
    attrib_bindings: HashMap<u32, (VertexBufferId, u32)>,
    texture_units: HashMap<u32, (TextureId, SamplerId)>,
    frame_target: Option<FrameTargetId>,
}

impl RecordingDriver {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            next_id: 1,
            verify_assets: false,
            failures: HashMap::new(),
            data_sizes: HashMap::new(),
            vertex_sizes: HashMap::new(),
            pipelines: HashMap::new(),
            active_pipeline: None,
            data_bindings: HashMap::new(),
            attrib_bindings: HashMap::new(),
            texture_units: HashMap::new(),
            frame_target: None,
        }
    }

    /// Makes `compile_shader` fail with [`ErrorCode::FileNotFound`] for
    /// assets that do not exist on disk.
    pub fn verifying_assets(mut self, verify: bool) -> Self {
        self.verify_assets = verify;
        self
    }

    /// Every subsequent call of `kind` fails with `code`.
    pub fn fail_on(mut self, kind: CallKind, code: ErrorCode) -> Self {
        self.failures.insert(kind, code);
        self
    }

    fn next<T>(&mut self, make: impl FnOnce(u32) -> T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        make(id)
    }

    fn record(&self, call: DriverCall) -> DriverResult<()> {
        let kind = call.kind();
        self.log.push(call);
        match self.failures.get(&kind) {
            Some(code) => Err(*code),
            None => Ok(()),
        }
    }

    fn lock(&self, buffer: LockedBuffer, size: Option<u64>) -> DriverResult<BufferLock> {
        let size = size.ok_or(ErrorCode::InvalidParameter)?;
        Ok(BufferLock {
            buffer,
            bytes: vec![0; size as usize],
        })
    }
}

impl GpuDriver for RecordingDriver {
    fn compile_shader(&mut self, kind: ShaderKind, path: &Path) -> CompileOutcome {
        let recorded = self.record(DriverCall::CompileShader {
            kind,
            path: path.to_path_buf(),
        });
        let log_id = self.next(ShaderLogId);
        self.log.insert_live(LiveObject::ShaderLog(log_id));

        let missing = self.verify_assets && !path.exists();
        let shader = match recorded {
            Err(code) => Err(code),
            Ok(()) if missing => Err(ErrorCode::FileNotFound),
            Ok(()) => {
                let id = self.next(ShaderId);
                self.log.insert_live(LiveObject::Shader(id));
                Ok(id)
            }
        };
        let text = match &shader {
            Ok(_) => format!("{}: compiled {kind} shader", path.display()),
            Err(code) => format!("{}: {code}", path.display()),
        };
        CompileOutcome {
            shader,
            log: Some(ShaderLog { id: log_id, text }),
        }
    }

    fn destroy_shader_log(&mut self, log: ShaderLogId) {
        let _ = self.record(DriverCall::DestroyShaderLog(log));
        self.log.remove_live(LiveObject::ShaderLog(log));
    }

    fn destroy_shader(&mut self, shader: ShaderId) {
        let _ = self.record(DriverCall::DestroyShader(shader));
        let linked = self
            .pipelines
            .iter()
            .find(|(_, (vertex, fragment))| *vertex == shader || *fragment == shader)
            .map(|(pipeline, _)| *pipeline);
        if let Some(pipeline) = linked {
            self.log.violation(format!(
                "destroyed {shader} while {pipeline} still links it"
            ));
        }
        self.log.remove_live(LiveObject::Shader(shader));
    }

    fn create_data_buffer(&mut self, size: u64) -> DriverResult<DataBufferId> {
        self.record(DriverCall::CreateDataBuffer { size })?;
        let id = self.next(DataBufferId);
        self.data_sizes.insert(id, size);
        self.log.insert_live(LiveObject::DataBuffer(id));
        Ok(id)
    }

    fn set_data_buffer(
        &mut self,
        buffer: DataBufferId,
        _offset: u64,
        size: u64,
        shader: ShaderId,
    ) -> DriverResult<()> {
        self.record(DriverCall::SetDataBuffer {
            buffer,
            size,
            shader,
        })
    }

    fn bind_shader_data_buffer(
        &mut self,
        kind: ShaderKind,
        slot: u32,
        buffer: Option<DataBufferId>,
    ) -> DriverResult<()> {
        self.record(DriverCall::BindShaderDataBuffer { kind, slot, buffer })?;
        match buffer {
            Some(buffer) => {
                if let Some(previous) = self.data_bindings.insert((kind, slot), buffer) {
                    if previous != buffer {
                        self.log.violation(format!(
                            "bound {buffer} over {previous} at {kind} slot {slot}"
                        ));
                    }
                }
            }
            None => {
                self.data_bindings.remove(&(kind, slot));
            }
        }
        Ok(())
    }

    fn lock_data_buffer(&mut self, buffer: DataBufferId) -> DriverResult<BufferLock> {
        self.record(DriverCall::LockDataBuffer(buffer))?;
        self.lock(
            LockedBuffer::Data(buffer),
            self.data_sizes.get(&buffer).copied(),
        )
    }

    fn destroy_data_buffer(&mut self, buffer: DataBufferId) {
        let _ = self.record(DriverCall::DestroyDataBuffer(buffer));
        if self.data_bindings.values().any(|bound| *bound == buffer) {
            self.log
                .violation(format!("destroyed {buffer} while still bound"));
        }
        self.data_sizes.remove(&buffer);
        self.log.remove_live(LiveObject::DataBuffer(buffer));
    }

    fn create_vertex_buffer(&mut self, size: u64, arrays: u32) -> DriverResult<VertexBufferId> {
        self.record(DriverCall::CreateVertexBuffer { size, arrays })?;
        let id = self.next(VertexBufferId);
        self.vertex_sizes.insert(id, size);
        self.log.insert_live(LiveObject::VertexBuffer(id));
        Ok(id)
    }

    fn set_vertex_array(
        &mut self,
        buffer: VertexBufferId,
        array: u32,
        layout: VertexArray,
    ) -> DriverResult<()> {
        self.record(DriverCall::SetVertexArray {
            buffer,
            array,
            layout,
        })
    }

    fn lock_vertex_buffer(&mut self, buffer: VertexBufferId) -> DriverResult<BufferLock> {
        self.record(DriverCall::LockVertexBuffer(buffer))?;
        self.lock(
            LockedBuffer::Vertex(buffer),
            self.vertex_sizes.get(&buffer).copied(),
        )
    }

    fn bind_vertex_attrib_array(
        &mut self,
        attrib: u32,
        source: Option<(VertexBufferId, u32)>,
    ) -> DriverResult<()> {
        self.record(DriverCall::BindVertexAttribArray { attrib, source })?;
        match source {
            Some(source) => {
                if let Some(previous) = self.attrib_bindings.insert(attrib, source) {
                    if previous != source {
                        self.log.violation(format!(
                            "bound {} array {} over {} array {} at attribute {attrib}",
                            source.0, source.1, previous.0, previous.1
                        ));
                    }
                }
            }
            None => {
                self.attrib_bindings.remove(&attrib);
            }
        }
        Ok(())
    }

    fn destroy_vertex_buffer(&mut self, buffer: VertexBufferId) {
        let _ = self.record(DriverCall::DestroyVertexBuffer(buffer));
        if self
            .attrib_bindings
            .values()
            .any(|(bound, _)| *bound == buffer)
        {
            self.log
                .violation(format!("destroyed {buffer} while an attribute still reads it"));
        }
        self.vertex_sizes.remove(&buffer);
        self.log.remove_live(LiveObject::VertexBuffer(buffer));
    }

    fn unlock_buffer(&mut self, lock: BufferLock, offset: u64, size: u64) -> DriverResult<()> {
        let start = offset as usize;
        let end = start.saturating_add(size as usize).min(lock.bytes.len());
        let bytes = lock.bytes.get(start..end).unwrap_or_default().to_vec();
        self.record(DriverCall::UnlockBuffer {
            buffer: lock.buffer,
            bytes,
        })
    }

    fn create_texture(&mut self, width: u32, height: u32) -> DriverResult<TextureId> {
        self.record(DriverCall::CreateTexture { width, height })?;
        let id = self.next(TextureId);
        self.log.insert_live(LiveObject::Texture(id));
        Ok(id)
    }

    fn update_texture_image(&mut self, texture: TextureId, pixels: &[u8]) -> DriverResult<()> {
        self.record(DriverCall::UpdateTextureImage {
            texture,
            len: pixels.len(),
        })
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        let _ = self.record(DriverCall::DestroyTexture(texture));
        if self.texture_units.values().any(|(bound, _)| *bound == texture) {
            self.log
                .violation(format!("destroyed {texture} while still bound"));
        }
        self.log.remove_live(LiveObject::Texture(texture));
    }

    fn create_sampler(&mut self) -> DriverResult<SamplerId> {
        self.record(DriverCall::CreateSampler)?;
        let id = self.next(SamplerId);
        self.log.insert_live(LiveObject::Sampler(id));
        Ok(id)
    }

    fn set_sampler_filter(
        &mut self,
        sampler: SamplerId,
        min: Filter,
        mag: Filter,
    ) -> DriverResult<()> {
        self.record(DriverCall::SetSamplerFilter { sampler, min, mag })
    }

    fn destroy_sampler(&mut self, sampler: SamplerId) {
        let _ = self.record(DriverCall::DestroySampler(sampler));
        if self.texture_units.values().any(|(_, bound)| *bound == sampler) {
            self.log
                .violation(format!("destroyed {sampler} while still bound"));
        }
        self.log.remove_live(LiveObject::Sampler(sampler));
    }

    fn bind_texture(
        &mut self,
        unit: u32,
        binding: Option<(TextureId, SamplerId)>,
    ) -> DriverResult<()> {
        self.record(DriverCall::BindTexture { unit, binding })?;
        match binding {
            Some(binding) => {
                if let Some(previous) = self.texture_units.insert(unit, binding) {
                    if previous != binding {
                        self.log.violation(format!(
                            "bound {} over {} at texture unit {unit}",
                            binding.0, previous.0
                        ));
                    }
                }
            }
            None => {
                self.texture_units.remove(&unit);
            }
        }
        Ok(())
    }

    fn create_pipeline(&mut self, vertex: ShaderId, fragment: ShaderId) -> DriverResult<PipelineId> {
        self.record(DriverCall::CreatePipeline { vertex, fragment })?;
        let id = self.next(PipelineId);
        self.pipelines.insert(id, (vertex, fragment));
        self.log.insert_live(LiveObject::Pipeline(id));
        Ok(id)
    }

    fn set_pipeline(&mut self, pipeline: Option<PipelineId>) -> DriverResult<()> {
        self.record(DriverCall::SetPipeline(pipeline))?;
        if let (Some(current), Some(next)) = (self.active_pipeline, pipeline) {
            if current != next {
                self.log
                    .violation(format!("set {next} while {current} is still active"));
            }
        }
        self.active_pipeline = pipeline;
        Ok(())
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineId) {
        let _ = self.record(DriverCall::DestroyPipeline(pipeline));
        if self.active_pipeline == Some(pipeline) {
            self.log
                .violation(format!("destroyed {pipeline} while still active"));
        }
        self.pipelines.remove(&pipeline);
        self.log.remove_live(LiveObject::Pipeline(pipeline));
    }

    fn create_frame_target(&mut self, width: u32, height: u32) -> DriverResult<FrameTargetId> {
        self.record(DriverCall::CreateFrameTarget { width, height })?;
        let id = self.next(FrameTargetId);
        self.log.insert_live(LiveObject::FrameTarget(id));
        Ok(id)
    }

    fn bind_frame_target(&mut self, target: Option<FrameTargetId>) -> DriverResult<()> {
        self.record(DriverCall::BindFrameTarget(target))?;
        if let (Some(current), Some(next)) = (self.frame_target, target) {
            if current != next {
                self.log
                    .violation(format!("bound {next} while {current} is still bound"));
            }
        }
        self.frame_target = target;
        Ok(())
    }

    fn destroy_frame_target(&mut self, target: FrameTargetId) {
        let _ = self.record(DriverCall::DestroyFrameTarget(target));
        if self.frame_target == Some(target) {
            self.log
                .violation(format!("destroyed {target} while still bound"));
        }
        self.log.remove_live(LiveObject::FrameTarget(target));
    }

    fn set_viewport(&mut self, viewport: Viewport) -> DriverResult<()> {
        self.record(DriverCall::SetViewport(viewport))
    }

    fn clear(&mut self, color: [f32; 4]) -> DriverResult<()> {
        self.record(DriverCall::Clear(color))?;
        if self.frame_target.is_none() {
            return Err(ErrorCode::NotBound);
        }
        Ok(())
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) -> DriverResult<()> {
        self.record(DriverCall::DrawArrays {
            primitive,
            first,
            count,
        })?;
        if self.active_pipeline.is_none() || self.frame_target.is_none() {
            return Err(ErrorCode::NotBound);
        }
        Ok(())
    }

    fn submit(&mut self) -> DriverResult<SubmitId> {
        self.record(DriverCall::Submit)?;
        Ok(self.next(SubmitId))
    }

    fn wait_done(&mut self, submit: SubmitId) -> DriverResult<()> {
        self.record(DriverCall::WaitDone(submit))
    }
}

/// Fake window whose client area can be resized from a test.
pub struct RecordingSurface {
    log: CallLog,
    size: Cell<(u32, u32)>,
    origin: (u32, u32),
}

impl RecordingSurface {
    pub fn new(log: CallLog, width: u32, height: u32) -> Self {
        Self {
            log,
            size: Cell::new((width, height)),
            origin: (0, 0),
        }
    }

    pub fn with_origin(mut self, x: u32, y: u32) -> Self {
        self.origin = (x, y);
        self
    }

    pub fn set_client_size(&self, width: u32, height: u32) {
        self.size.set((width, height));
    }
}

impl WindowSurface for RecordingSurface {
    fn client_size(&self) -> Result<(u32, u32)> {
        Ok(self.size.get())
    }

    fn client_origin(&self) -> (u32, u32) {
        self.origin
    }

    fn native_surface(&self) -> SurfaceHandle {
        SurfaceHandle(0)
    }

    fn set_vsync(&mut self, enabled: bool) -> Result<()> {
        self.log.push(DriverCall::SetVsync(enabled));
        Ok(())
    }

    fn wait_for_refresh(&self) {
        self.log.push(DriverCall::WaitForRefresh);
    }

    fn blit_frame_target(&mut self, request: BlitRequest) -> Result<()> {
        self.log.push(DriverCall::Blit(request));
        if request.width == 0 || request.height == 0 {
            return Err(NovaError::Window("empty blit rectangle".to_string()));
        }
        Ok(())
    }
}

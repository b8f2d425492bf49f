//! Handle-based GPU driver interface.
//!
//! The resource layer in [`crate::gpu`] never talks to a graphics API directly.
//! It issues calls against [`GpuDriver`], a stateful context in the style of a
//! classic 3D driver: objects are referenced through small `Copy` handles,
//! bindings live in per-context tables (data buffers per shader stage slot,
//! vertex attribute slots, texture units, the active pipeline, the bound frame
//! target), and every fallible call reports a driver [`ErrorCode`].
//!
//! Two drivers ship with the crate:
//! - [`crate::backend::wgpu::WgpuDriver`] renders for real on `wgpu`.
//! - [`recording::RecordingDriver`] allocates handles from a counter and logs
//!   each call, which is what the tests and `--dry-run` use.

pub mod recording;

use std::fmt;
use std::path::Path;

use thiserror::Error;

macro_rules! driver_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

driver_handle!(
    /// Compiled shader module.
    ShaderId
);
driver_handle!(
    /// Compiler log that must be released with [`GpuDriver::destroy_shader_log`].
    ShaderLogId
);
driver_handle!(
    /// Host-writable shader parameter buffer.
    DataBufferId
);
driver_handle!(VertexBufferId);
driver_handle!(TextureId);
driver_handle!(SamplerId);
driver_handle!(
    /// Linked vertex + fragment pipeline.
    PipelineId
);
driver_handle!(
    /// Off-screen color buffer that draw calls render into.
    FrameTargetId
);
driver_handle!(SubmitId);

/// Status codes reported by a driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum ErrorCode {
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("file not found")]
    FileNotFound,
    #[error("shader compilation failed")]
    CompileFailed,
    #[error("shader pipeline link failed")]
    LinkFailed,
    #[error("required object is not bound")]
    NotBound,
    #[error("device lost")]
    DeviceLost,
    #[error("operation not supported")]
    Unsupported,
    #[error("presentation surface error")]
    Surface,
}

pub type DriverResult<T> = Result<T, ErrorCode>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl ShaderKind {
    /// File extension used by shader assets of this kind.
    pub fn extension(self) -> &'static str {
        match self {
            ShaderKind::Vertex => "vert",
            ShaderKind::Fragment => "frag",
        }
    }
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderKind::Vertex => f.write_str("vertex"),
            ShaderKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// Compiler log text plus the handle that releases it.
#[derive(Clone, Debug)]
pub struct ShaderLog {
    pub id: ShaderLogId,
    pub text: String,
}

/// Result of [`GpuDriver::compile_shader`].
///
/// A log may be returned on success and on failure alike; whoever receives it
/// owns it.
#[derive(Debug)]
pub struct CompileOutcome {
    pub shader: DriverResult<ShaderId>,
    pub log: Option<ShaderLog>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockedBuffer {
    Data(DataBufferId),
    Vertex(VertexBufferId),
}

/// Host image of a locked buffer.
///
/// `bytes` always spans the whole buffer. Nothing reaches the GPU until the
/// lock is handed back through [`GpuDriver::unlock_buffer`].
#[derive(Debug)]
pub struct BufferLock {
    pub buffer: LockedBuffer,
    pub bytes: Vec<u8>,
}

/// Layout of one float attribute stream inside a vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexArray {
    pub element_count: u32,
    pub stride: u32,
    pub offset: u32,
    pub count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Topology of a draw. The full-screen quad is the only geometry, so strips
/// are all the driver has to support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    TriangleStrip,
}

/// Viewport rectangle in frame-target pixels, origin at the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Stateful GPU context.
///
/// Implementations are single-threaded and assume the caller destroys objects
/// in dependency order: pipelines before the shaders they link, unbinding
/// before destroying anything that is still bound.
pub trait GpuDriver {
    /// Human readable description of a driver status code.
    fn error_string(&self, code: ErrorCode) -> String {
        code.to_string()
    }

    fn compile_shader(&mut self, kind: ShaderKind, path: &Path) -> CompileOutcome;
    fn destroy_shader_log(&mut self, log: ShaderLogId);
    fn destroy_shader(&mut self, shader: ShaderId);

    fn create_data_buffer(&mut self, size: u64) -> DriverResult<DataBufferId>;
    /// Associates `size` bytes of `buffer` with the parameter block of `shader`.
    fn set_data_buffer(
        &mut self,
        buffer: DataBufferId,
        offset: u64,
        size: u64,
        shader: ShaderId,
    ) -> DriverResult<()>;
    fn bind_shader_data_buffer(
        &mut self,
        kind: ShaderKind,
        slot: u32,
        buffer: Option<DataBufferId>,
    ) -> DriverResult<()>;
    fn lock_data_buffer(&mut self, buffer: DataBufferId) -> DriverResult<BufferLock>;
    fn destroy_data_buffer(&mut self, buffer: DataBufferId);

    fn create_vertex_buffer(&mut self, size: u64, arrays: u32) -> DriverResult<VertexBufferId>;
    fn set_vertex_array(
        &mut self,
        buffer: VertexBufferId,
        array: u32,
        layout: VertexArray,
    ) -> DriverResult<()>;
    fn lock_vertex_buffer(&mut self, buffer: VertexBufferId) -> DriverResult<BufferLock>;
    /// Feeds vertex attribute `attrib` from array `source.1` of buffer `source.0`.
    fn bind_vertex_attrib_array(
        &mut self,
        attrib: u32,
        source: Option<(VertexBufferId, u32)>,
    ) -> DriverResult<()>;
    fn destroy_vertex_buffer(&mut self, buffer: VertexBufferId);

    /// Flushes `size` bytes starting at `offset` and releases the lock.
    fn unlock_buffer(&mut self, lock: BufferLock, offset: u64, size: u64) -> DriverResult<()>;

    /// Creates an RGBA8 texture without mipmaps for static use.
    fn create_texture(&mut self, width: u32, height: u32) -> DriverResult<TextureId>;
    fn update_texture_image(&mut self, texture: TextureId, pixels: &[u8]) -> DriverResult<()>;
    fn destroy_texture(&mut self, texture: TextureId);

    fn create_sampler(&mut self) -> DriverResult<SamplerId>;
    fn set_sampler_filter(&mut self, sampler: SamplerId, min: Filter, mag: Filter)
        -> DriverResult<()>;
    fn destroy_sampler(&mut self, sampler: SamplerId);
    fn bind_texture(&mut self, unit: u32, binding: Option<(TextureId, SamplerId)>)
        -> DriverResult<()>;

    fn create_pipeline(&mut self, vertex: ShaderId, fragment: ShaderId) -> DriverResult<PipelineId>;
    fn set_pipeline(&mut self, pipeline: Option<PipelineId>) -> DriverResult<()>;
    fn destroy_pipeline(&mut self, pipeline: PipelineId);

    fn create_frame_target(&mut self, width: u32, height: u32) -> DriverResult<FrameTargetId>;
    fn bind_frame_target(&mut self, target: Option<FrameTargetId>) -> DriverResult<()>;
    fn destroy_frame_target(&mut self, target: FrameTargetId);

    fn set_viewport(&mut self, viewport: Viewport) -> DriverResult<()>;
    fn clear(&mut self, color: [f32; 4]) -> DriverResult<()>;
    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) -> DriverResult<()>;

    /// Queues everything recorded since the previous submit.
    fn submit(&mut self) -> DriverResult<SubmitId>;
    /// Blocks until `submit` has finished executing.
    fn wait_done(&mut self, submit: SubmitId) -> DriverResult<()>;
}

/// Handles whose lifetime ends with a driver destroy call.
pub trait DriverObject: Copy + fmt::Debug {
    fn destroy(self, driver: &mut dyn GpuDriver);
}

macro_rules! driver_object {
    ($handle:ty, $method:ident) => {
        impl DriverObject for $handle {
            fn destroy(self, driver: &mut dyn GpuDriver) {
                driver.$method(self);
            }
        }
    };
}

driver_object!(ShaderId, destroy_shader);
driver_object!(DataBufferId, destroy_data_buffer);
driver_object!(VertexBufferId, destroy_vertex_buffer);
driver_object!(TextureId, destroy_texture);
driver_object!(SamplerId, destroy_sampler);
driver_object!(PipelineId, destroy_pipeline);
driver_object!(FrameTargetId, destroy_frame_target);

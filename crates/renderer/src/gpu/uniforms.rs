use std::mem::size_of;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};

use crate::driver::{DataBufferId, ShaderId, ShaderKind};
use crate::error::{NovaError, Result};
use crate::types::Vertex;

use super::session::{GpuSession, Owned};

/// Vertex stage parameter block. Must match `VertexParams` in the `.vert`
/// assets byte for byte.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VertexShaderParams {
    pub angle: f32,
    pub zoom: f32,
    pub point: Vertex,
}

/// Fragment stage parameter block. Must match `FragmentParams` in the `.frag`
/// assets byte for byte.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FragmentShaderParams {
    pub iterations: i32,
    pub complex: Vertex,
}

const _: () = assert!(size_of::<VertexShaderParams>() == 16);
const _: () = assert!(size_of::<FragmentShaderParams>() == 12);

/// Size of the parameter block consumed by a shader stage.
pub fn params_size(kind: ShaderKind) -> u64 {
    match kind {
        ShaderKind::Vertex => size_of::<VertexShaderParams>() as u64,
        ShaderKind::Fragment => size_of::<FragmentShaderParams>() as u64,
    }
}

/// Host-writable parameter buffer bound to slot 0 of one shader stage.
pub struct UniformBuffer {
    buffer: Owned<DataBufferId>,
    kind: ShaderKind,
    slot: u32,
    size: u64,
    bound: bool,
}

impl UniformBuffer {
    pub fn create(
        session: &Rc<GpuSession>,
        kind: ShaderKind,
        size: u64,
        owner: ShaderId,
    ) -> Result<Self> {
        let created = session.driver().create_data_buffer(size);
        let buffer = Owned::new(
            session,
            session.check_alloc(created, "failed to create data buffer object")?,
        );

        let attached = session
            .driver()
            .set_data_buffer(buffer.handle(), 0, size, owner);
        session.check(attached, "failed to set data buffer object")?;

        let mut uniforms = Self {
            buffer,
            kind,
            slot: 0,
            size,
            bound: false,
        };
        let bound = session
            .driver()
            .bind_shader_data_buffer(kind, uniforms.slot, Some(uniforms.buffer.handle()));
        session.check(bound, "failed to bind data buffer object")?;
        uniforms.bound = true;

        tracing::debug!(
            buffer = %uniforms.buffer.handle(),
            stage = %kind,
            size,
            "created shader data buffer"
        );
        Ok(uniforms)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn handle(&self) -> DataBufferId {
        self.buffer.handle()
    }

    /// Locks the whole buffer, lets `writer` fill it, and flushes it back.
    pub fn update(&self, writer: impl FnOnce(&mut [u8])) -> Result<()> {
        let session = self.buffer.session();
        let locked = session.driver().lock_data_buffer(self.buffer.handle());
        let mut lock = session.check(locked, "failed to lock data buffer object")?;

        let size = self.size as usize;
        let bytes = lock
            .bytes
            .get_mut(..size)
            .ok_or_else(|| NovaError::DriverOperation {
                context: "failed to lock data buffer object".to_string(),
                message: format!("lock spans fewer than {size} bytes"),
            })?;
        writer(bytes);

        let unlocked = session.driver().unlock_buffer(lock, 0, self.size);
        session.check(unlocked, "failed to unlock data buffer object")
    }

    /// Overwrites the buffer with `value`, which must be exactly buffer sized.
    pub fn write<T: Pod>(&self, value: &T) -> Result<()> {
        let bytes = bytemuck::bytes_of(value);
        if bytes.len() as u64 != self.size {
            return Err(NovaError::DriverOperation {
                context: format!("failed to write {} parameters", self.kind),
                message: format!(
                    "value is {} bytes, buffer holds {}",
                    bytes.len(),
                    self.size
                ),
            });
        }
        tracing::trace!(stage = %self.kind, ?bytes, "writing shader parameters");
        self.update(|target| target.copy_from_slice(bytes))
    }
}

impl Drop for UniformBuffer {
    fn drop(&mut self) {
        if self.bound {
            let session = self.buffer.session();
            let unbound = session
                .driver()
                .bind_shader_data_buffer(self.kind, self.slot, None);
            session.warn_on_error(unbound, "unbind data buffer object");
        }
    }
}

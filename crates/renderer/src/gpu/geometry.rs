use std::mem::{offset_of, size_of};
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};

use crate::driver::{VertexArray, VertexBufferId};
use crate::error::{NovaError, Result};

use super::session::{GpuSession, Owned};

/// Interleaved position and texture coordinate.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub x: f32,
    pub y: f32,
    pub s: f32,
    pub t: f32,
}

/// Full-viewport quad drawn as a triangle strip. Texture coordinates follow
/// the positions, so `s` runs from -1 at the left edge to +1 at the right.
pub const QUAD: [QuadVertex; 4] = [
    QuadVertex { x: -1.0, y: -1.0, s: -1.0, t: -1.0 },
    QuadVertex { x: 1.0, y: -1.0, s: 1.0, t: -1.0 },
    QuadVertex { x: -1.0, y: 1.0, s: -1.0, t: 1.0 },
    QuadVertex { x: 1.0, y: 1.0, s: 1.0, t: 1.0 },
];

pub const POSITION_ATTRIB: u32 = 0;
pub const TEXCOORD_ATTRIB: u32 = 1;

const STRIDE: u32 = size_of::<QuadVertex>() as u32;
const BUFFER_SIZE: u64 = size_of::<[QuadVertex; 4]>() as u64;

/// Static vertex buffer holding [`QUAD`], fed to attribute slots 0 and 1.
pub struct GeometryBuffer {
    buffer: Owned<VertexBufferId>,
    bound: [bool; 2],
}

impl GeometryBuffer {
    pub fn create(session: &Rc<GpuSession>) -> Result<Self> {
        let created = session.driver().create_vertex_buffer(BUFFER_SIZE, 2);
        let buffer = Owned::new(
            session,
            session.check_alloc(created, "failed to create vertex buffer object")?,
        );
        let id = buffer.handle();

        let arrays = [
            (POSITION_ATTRIB, offset_of!(QuadVertex, x) as u32),
            (TEXCOORD_ATTRIB, offset_of!(QuadVertex, s) as u32),
        ];
        for (array, offset) in arrays {
            let layout = VertexArray {
                element_count: 2,
                stride: STRIDE,
                offset,
                count: QUAD.len() as u32,
            };
            let result = session.driver().set_vertex_array(id, array, layout);
            session.check(result, "failed to set vertex array")?;
        }

        let locked = session.driver().lock_vertex_buffer(id);
        let mut lock = session.check(locked, "failed to lock vertex buffer object")?;
        let source = bytemuck::bytes_of(&QUAD);
        lock.bytes
            .get_mut(..source.len())
            .ok_or_else(|| NovaError::DriverOperation {
                context: "failed to lock vertex buffer object".to_string(),
                message: format!("lock spans fewer than {} bytes", source.len()),
            })?
            .copy_from_slice(source);
        let unlocked = session.driver().unlock_buffer(lock, 0, BUFFER_SIZE);
        session.check(unlocked, "failed to unlock vertex buffer object")?;

        let mut geometry = Self {
            buffer,
            bound: [false; 2],
        };
        for attrib in [POSITION_ATTRIB, TEXCOORD_ATTRIB] {
            let result = session
                .driver()
                .bind_vertex_attrib_array(attrib, Some((id, attrib)));
            session.check(result, "failed to bind vertex attribute array")?;
            geometry.bound[attrib as usize] = true;
        }

        tracing::debug!(buffer = %id, "created quad vertex buffer");
        Ok(geometry)
    }

    pub fn vertex_count(&self) -> u32 {
        QUAD.len() as u32
    }

    pub fn handle(&self) -> VertexBufferId {
        self.buffer.handle()
    }
}

impl Drop for GeometryBuffer {
    fn drop(&mut self) {
        let session = self.buffer.session();
        for (attrib, bound) in self.bound.iter().enumerate() {
            if *bound {
                let result = session.driver().bind_vertex_attrib_array(attrib as u32, None);
                session.warn_on_error(result, "unbind vertex attribute array");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::recording::{CallKind, CallLog, DriverCall, RecordingDriver};
    use crate::driver::{ErrorCode, LockedBuffer};

    #[test]
    fn uploads_quad_and_binds_both_attributes() {
        let log = CallLog::new();
        let session = GpuSession::open(Box::new(RecordingDriver::new(log.clone())));
        let geometry = GeometryBuffer::create(&session).expect("geometry");
        let id = geometry.handle();

        let calls = log.calls();
        assert!(calls.contains(&DriverCall::CreateVertexBuffer { size: 64, arrays: 2 }));
        assert!(calls.contains(&DriverCall::SetVertexArray {
            buffer: id,
            array: 1,
            layout: VertexArray {
                element_count: 2,
                stride: 16,
                offset: 8,
                count: 4,
            },
        }));
        assert!(calls.contains(&DriverCall::UnlockBuffer {
            buffer: LockedBuffer::Vertex(id),
            bytes: bytemuck::bytes_of(&QUAD).to_vec(),
        }));
        assert!(calls.contains(&DriverCall::BindVertexAttribArray {
            attrib: 0,
            source: Some((id, 0)),
        }));
        assert!(calls.contains(&DriverCall::BindVertexAttribArray {
            attrib: 1,
            source: Some((id, 1)),
        }));
        assert_eq!(geometry.vertex_count(), 4);
    }

    #[test]
    fn drop_unbinds_attributes_first() {
        let log = CallLog::new();
        let session = GpuSession::open(Box::new(RecordingDriver::new(log.clone())));
        let geometry = GeometryBuffer::create(&session).expect("geometry");
        let id = geometry.handle();
        log.clear();
        drop(geometry);

        assert_eq!(
            log.calls(),
            vec![
                DriverCall::BindVertexAttribArray { attrib: 0, source: None },
                DriverCall::BindVertexAttribArray { attrib: 1, source: None },
                DriverCall::DestroyVertexBuffer(id),
            ]
        );
        assert!(log.violations().is_empty());
    }

    #[test]
    fn lock_failure_releases_buffer() {
        let log = CallLog::new();
        let driver = RecordingDriver::new(log.clone())
            .fail_on(CallKind::LockVertexBuffer, ErrorCode::OutOfMemory);
        let session = GpuSession::open(Box::new(driver));

        assert!(GeometryBuffer::create(&session).is_err());
        assert_eq!(log.count(CallKind::DestroyVertexBuffer), 1);
        assert!(log.live_objects().is_empty());
    }
}

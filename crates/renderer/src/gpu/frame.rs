use std::rc::Rc;

use crate::driver::FrameTargetId;
use crate::error::Result;

use super::session::{GpuSession, Owned};

/// Off-screen color buffer the context renders into.
pub struct FrameTarget {
    target: Owned<FrameTargetId>,
    width: u32,
    height: u32,
    bound: bool,
}

impl FrameTarget {
    pub fn create(session: &Rc<GpuSession>, width: u32, height: u32) -> Result<Self> {
        let created = session.driver().create_frame_target(width, height);
        let target = Owned::new(
            session,
            session.check_alloc(created, "failed to allocate frame target")?,
        );
        tracing::debug!(target = %target.handle(), width, height, "allocated frame target");
        Ok(Self {
            target,
            width,
            height,
            bound: false,
        })
    }

    /// Makes this the active color target.
    pub fn bind(&mut self) -> Result<()> {
        let session = self.target.session();
        let result = session.driver().bind_frame_target(Some(self.target.handle()));
        session.check(result, "failed to bind frame target")?;
        self.bound = true;
        Ok(())
    }

    /// Whether a `width` x `height` frame fits the current allocation.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        width <= self.width && height <= self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn handle(&self) -> FrameTargetId {
        self.target.handle()
    }
}

impl Drop for FrameTarget {
    fn drop(&mut self) {
        if self.bound {
            let session = self.target.session();
            let result = session.driver().bind_frame_target(None);
            session.warn_on_error(result, "unbind frame target");
        }
    }
}

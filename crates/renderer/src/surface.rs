//! Window-side collaborator of the render context.
//!
//! The context never touches the window system. It asks a [`WindowSurface`] for
//! the client size, optionally waits for the display refresh, and hands it a
//! [`BlitRequest`] once the frame target holds a finished frame.

use crate::driver::FrameTargetId;
use crate::error::Result;

/// Opaque identifier of the visible surface a frame is blitted onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Pixel transfer from the frame target onto the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlitRequest {
    pub source: FrameTargetId,
    pub surface: SurfaceHandle,
    pub dest_x: u32,
    pub dest_y: u32,
    pub width: u32,
    pub height: u32,
}

pub trait WindowSurface {
    /// Current client area in physical pixels.
    fn client_size(&self) -> Result<(u32, u32)>;

    /// Offset of the client area inside the surface, e.g. window borders.
    fn client_origin(&self) -> (u32, u32) {
        (0, 0)
    }

    fn native_surface(&self) -> SurfaceHandle;

    fn set_vsync(&mut self, enabled: bool) -> Result<()>;

    /// Blocks until the next vertical refresh.
    fn wait_for_refresh(&self);

    fn blit_frame_target(&mut self, request: BlitRequest) -> Result<()>;
}

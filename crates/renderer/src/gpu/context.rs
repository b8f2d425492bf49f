use std::path::PathBuf;
use std::rc::Rc;

use crate::driver::{GpuDriver, Primitive, Viewport};
use crate::error::{NovaError, Result};
use crate::palette::ColorPalette;
use crate::surface::{BlitRequest, WindowSurface};
use crate::types::{
    clamp_iterations, FractalKind, PaletteKind, Vertex, DEFAULT_PALETTE_SIZE, MIN_ITERATIONS,
};

use super::frame::FrameTarget;
use super::geometry::GeometryBuffer;
use super::program::RenderProgram;
use super::session::GpuSession;
use super::texture::Texture;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Settings the render context starts with.
#[derive(Clone, Debug)]
pub struct ContextConfig {
    pub iterations: i32,
    pub vsync: bool,
    pub texture_filtering: bool,
    pub palette_size: u32,
    pub shader_dir: PathBuf,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            iterations: MIN_ITERATIONS,
            vsync: false,
            texture_filtering: true,
            palette_size: DEFAULT_PALETTE_SIZE,
            shader_dir: PathBuf::from("shaders"),
        }
    }
}

/// Owns every GPU object of the application and runs the per-frame cycle.
///
/// The frame loop calls the setters, then [`clear`](Self::clear),
/// [`draw`](Self::draw) and [`swap_buffers`](Self::swap_buffers). Programs and
/// palettes are swapped on demand; asking for the current one again is free.
pub struct RenderContext<W: WindowSurface> {
    // Teardown order: everything holding a session reference drops before
    // `session` itself.
    program: Option<RenderProgram>,
    texture: Option<Texture>,
    geometry: GeometryBuffer,
    frame: Option<FrameTarget>,
    session: Rc<GpuSession>,
    window: W,
    fractal: Option<FractalKind>,
    palette: Option<PaletteKind>,
    size: (u32, u32),
    iterations: i32,
    zoom: f32,
    vsync: bool,
    texture_filtering: bool,
    palette_size: u32,
    shader_dir: PathBuf,
}

impl<W: WindowSurface> RenderContext<W> {
    pub fn new(mut window: W, driver: Box<dyn GpuDriver>, config: ContextConfig) -> Result<Self> {
        let session = GpuSession::open(driver);
        let geometry = GeometryBuffer::create(&session)?;
        window.set_vsync(config.vsync)?;

        let mut context = Self {
            program: None,
            texture: None,
            geometry,
            frame: None,
            session,
            window,
            fractal: None,
            palette: None,
            size: (0, 0),
            iterations: clamp_iterations(config.iterations),
            zoom: 1.0,
            vsync: config.vsync,
            texture_filtering: config.texture_filtering,
            palette_size: config.palette_size,
            shader_dir: config.shader_dir,
        };
        context.resize()?;

        tracing::debug!(
            iterations = context.iterations,
            vsync = context.vsync,
            shader_dir = %context.shader_dir.display(),
            "render context ready"
        );
        Ok(context)
    }

    /// Matches the frame target and viewport to the window's client area.
    ///
    /// The frame target only grows: a smaller window keeps rendering into the
    /// top-left part of the existing allocation.
    pub fn resize(&mut self) -> Result<()> {
        let (width, height) = self.window.client_size()?;
        let (width, height) = (width.max(1), height.max(1));

        let fits = self
            .frame
            .as_ref()
            .is_some_and(|frame| frame.fits(width, height));
        if !fits {
            let (alloc_w, alloc_h) = self
                .frame
                .as_ref()
                .map_or((width, height), |frame| {
                    (frame.width().max(width), frame.height().max(height))
                });
            self.frame = None;
            self.frame = Some(FrameTarget::create(&self.session, alloc_w, alloc_h)?);
        }

        if let Some(frame) = self.frame.as_mut() {
            frame.bind()?;
        }

        let viewport = Viewport {
            x: 0,
            y: 0,
            width,
            height,
        };
        let result = self.session.driver().set_viewport(viewport);
        self.session.check(result, "failed to set viewport")?;

        if self.size != (width, height) {
            tracing::debug!(width, height, "resized render context");
        }
        self.size = (width, height);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        let result = self.session.driver().clear(CLEAR_COLOR);
        self.session.check(result, "failed to clear")
    }

    pub fn draw(&mut self) -> Result<()> {
        let program = self.program.as_mut().ok_or(NovaError::NoActiveProgram)?;
        program.update_vertex_uniforms()?;
        program.update_fragment_uniforms()?;

        let count = self.geometry.vertex_count();
        let result = self
            .session
            .driver()
            .draw_arrays(Primitive::TriangleStrip, 0, count);
        self.session.check(result, "failed to draw")
    }

    /// Submits the frame, waits for it, then blits it onto the window.
    ///
    /// With vsync on, the refresh wait happens before the blit.
    pub fn swap_buffers(&mut self) -> Result<()> {
        let submitted = self.session.driver().submit();
        let submit = self.session.check(submitted, "failed to submit")?;
        let waited = self.session.driver().wait_done(submit);
        self.session.check(waited, "failed to wait for completion")?;

        if self.vsync {
            self.window.wait_for_refresh();
        }

        let frame = self.frame.as_ref().ok_or_else(|| {
            NovaError::DriverOperation {
                context: "failed to swap buffers".to_string(),
                message: "no frame target allocated".to_string(),
            }
        })?;
        let (dest_x, dest_y) = self.window.client_origin();
        let request = BlitRequest {
            source: frame.handle(),
            surface: self.window.native_surface(),
            dest_x,
            dest_y,
            width: self.size.0.min(frame.width()),
            height: self.size.1.min(frame.height()),
        };
        self.window.blit_frame_target(request)
    }

    /// Switches to `fractal`, rebuilding the program only when it changes.
    pub fn use_program(&mut self, fractal: FractalKind) -> Result<()> {
        if self.fractal == Some(fractal) {
            return Ok(());
        }

        // The old pipeline must be gone before a new one takes its slot.
        self.program = None;
        self.fractal = None;
        let program = RenderProgram::new(
            &self.session,
            &self.shader_dir,
            fractal,
            self.iterations,
            self.zoom,
        )?;
        self.program = Some(program);
        self.fractal = Some(fractal);
        tracing::info!(%fractal, "selected fractal");
        Ok(())
    }

    /// Switches to `palette`, rebuilding the texture only when it changes.
    pub fn use_palette(&mut self, palette: PaletteKind) -> Result<()> {
        if self.palette == Some(palette) {
            return Ok(());
        }

        self.texture = None;
        self.palette = None;
        let colors = ColorPalette::preset(palette, self.palette_size).colors()?;
        let texture = Texture::create(&self.session, &colors, self.texture_filtering)?;
        self.texture = Some(texture);
        self.palette = Some(palette);
        tracing::info!(%palette, colors = colors.len(), "selected palette");
        Ok(())
    }

    /// Per-frame pan delta in complex-plane units.
    pub fn set_position(&mut self, dx: f32, dy: f32) {
        if let Some(program) = self.program.as_mut() {
            program.set_position(Vertex::new(dx, dy));
        }
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom;
        if let Some(program) = self.program.as_mut() {
            program.set_zoom(zoom);
        }
    }

    pub fn set_complex(&mut self, complex: Vertex) {
        if let Some(program) = self.program.as_mut() {
            program.set_complex(complex);
        }
    }

    pub fn set_iterations(&mut self, iterations: i32) {
        self.iterations = clamp_iterations(iterations);
        if let Some(program) = self.program.as_mut() {
            program.set_iterations(self.iterations);
        }
    }

    /// Discards the accumulated pan of the active program.
    pub fn reset(&mut self) {
        if let Some(program) = self.program.as_mut() {
            program.reset();
        }
    }

    pub fn set_vsync(&mut self, enabled: bool) -> Result<()> {
        self.window.set_vsync(enabled)?;
        self.vsync = enabled;
        Ok(())
    }

    /// Applies to the current palette and to every palette selected later.
    pub fn set_texture_filtering(&mut self, enabled: bool) -> Result<()> {
        self.texture_filtering = enabled;
        match self.texture.as_mut() {
            Some(texture) => texture.set_filtering(enabled),
            None => Ok(()),
        }
    }

    pub fn fractal(&self) -> Option<FractalKind> {
        self.fractal
    }

    pub fn palette(&self) -> Option<PaletteKind> {
        self.palette
    }

    pub fn iterations(&self) -> i32 {
        self.iterations
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn vsync(&self) -> bool {
        self.vsync
    }

    pub fn texture_filtering(&self) -> bool {
        self.texture_filtering
    }

    /// Client size seen by the last [`resize`](Self::resize).
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Pan offset the active program resolved on its last draw.
    pub fn resolved_point(&self) -> Option<Vertex> {
        self.program.as_ref().map(RenderProgram::resolved_point)
    }

    pub fn window(&self) -> &W {
        &self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::recording::{
        CallKind, CallLog, DriverCall, RecordingDriver, RecordingSurface,
    };
    use crate::driver::Filter;

    fn context(log: &CallLog, config: ContextConfig) -> RenderContext<RecordingSurface> {
        RenderContext::new(
            RecordingSurface::new(log.clone(), 640, 480),
            Box::new(RecordingDriver::new(log.clone())),
            config,
        )
        .expect("context")
    }

    #[test]
    fn draw_without_program_fails() {
        let log = CallLog::new();
        let mut context = context(&log, ContextConfig::default());
        assert!(matches!(context.draw(), Err(NovaError::NoActiveProgram)));
        assert_eq!(log.count(CallKind::DrawArrays), 0);
    }

    #[test]
    fn iterations_are_clamped_on_construction_and_update() {
        let log = CallLog::new();
        let mut context = context(
            &log,
            ContextConfig {
                iterations: 5,
                ..ContextConfig::default()
            },
        );
        assert_eq!(context.iterations(), MIN_ITERATIONS);
        context.set_iterations(99_999);
        assert_eq!(context.iterations(), 1000);
    }

    #[test]
    fn vsync_waits_for_refresh_before_blit() {
        let log = CallLog::new();
        let mut context = context(
            &log,
            ContextConfig {
                vsync: true,
                ..ContextConfig::default()
            },
        );
        context.use_program(FractalKind::Mandelbrot).unwrap();
        context.draw().unwrap();
        context.swap_buffers().unwrap();

        let wait = log.position(CallKind::WaitForRefresh).expect("refresh wait");
        let blit = log.position(CallKind::Blit).expect("blit");
        assert!(log.position(CallKind::WaitDone).unwrap() < wait);
        assert!(wait < blit);
    }

    #[test]
    fn no_refresh_wait_without_vsync() {
        let log = CallLog::new();
        let mut context = context(&log, ContextConfig::default());
        context.use_program(FractalKind::Mandelbrot).unwrap();
        context.draw().unwrap();
        context.swap_buffers().unwrap();
        assert_eq!(log.count(CallKind::WaitForRefresh), 0);

        context.set_vsync(true).unwrap();
        context.swap_buffers().unwrap();
        assert_eq!(log.count(CallKind::WaitForRefresh), 1);
    }

    #[test]
    fn blit_is_offset_by_client_origin() {
        let log = CallLog::new();
        let window = RecordingSurface::new(log.clone(), 320, 200).with_origin(4, 22);
        let mut context = RenderContext::new(
            window,
            Box::new(RecordingDriver::new(log.clone())),
            ContextConfig::default(),
        )
        .unwrap();
        context.clear().unwrap();
        context.swap_buffers().unwrap();

        let blit = log
            .calls()
            .into_iter()
            .find_map(|call| match call {
                DriverCall::Blit(request) => Some(request),
                _ => None,
            })
            .unwrap();
        assert_eq!((blit.dest_x, blit.dest_y), (4, 22));
        assert_eq!((blit.width, blit.height), (320, 200));
    }

    #[test]
    fn failed_program_switch_leaves_no_program() {
        let log = CallLog::new();
        let mut context = RenderContext::new(
            RecordingSurface::new(log.clone(), 100, 100),
            Box::new(RecordingDriver::new(log.clone()).verifying_assets(true)),
            ContextConfig {
                shader_dir: PathBuf::from("/nonexistent"),
                ..ContextConfig::default()
            },
        )
        .unwrap();

        let err = context.use_program(FractalKind::Julia3).err().unwrap();
        assert!(matches!(err, NovaError::ShaderCompile { .. }));
        assert_eq!(context.fractal(), None);
        assert!(matches!(context.draw(), Err(NovaError::NoActiveProgram)));

        // A failed switch is not memoized; asking again retries the compile.
        assert!(context.use_program(FractalKind::Julia3).is_err());
        assert_eq!(log.count(CallKind::CompileShader), 2);
    }

    #[test]
    fn filtering_choice_carries_over_to_new_palettes() {
        let log = CallLog::new();
        let mut context = context(&log, ContextConfig::default());
        context.use_palette(PaletteKind::Red).unwrap();
        context.set_texture_filtering(false).unwrap();
        log.clear();

        context.use_palette(PaletteKind::Blue).unwrap();
        let filters: Vec<_> = log
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                DriverCall::SetSamplerFilter { min, mag, .. } => Some((min, mag)),
                _ => None,
            })
            .collect();
        assert_eq!(filters, vec![(Filter::Nearest, Filter::Nearest)]);
        assert!(!context.texture_filtering());
    }
}

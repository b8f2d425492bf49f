//! Frame loop shared by the winit window and the dry-run backend.
//!
//! Input handlers only touch [`ViewState`]. [`FrameLoop::frame`] folds that
//! state into the [`RenderContext`] at most once per [`EVENT_PERIOD`] and then
//! renders one frame.

use std::time::{Duration, Instant};

use crate::error::Result;
use crate::gpu::{ContextConfig, RenderContext};
use crate::surface::WindowSurface;
use crate::types::{
    clamp_iterations, FractalKind, PaletteKind, RendererConfig, Vertex, MAX_ITERATIONS,
    MIN_ITERATIONS,
};

/// How often input is applied to the render context.
pub const EVENT_PERIOD: Duration = Duration::from_micros(16_667);
pub const ZOOM_STEP: f32 = 1.01;
pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 100_000.0;
pub const ITERATION_STEP: i32 = 100;
pub const APP_NAME: &str = "FractalNova";

const STATS_PERIOD: Duration = Duration::from_secs(1);

/// Something the user asked for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    Quit,
    ResetView,
    ToggleVsync,
    ToggleFiltering,
    SelectFractal(FractalKind),
    SelectPalette(PaletteKind),
    /// Positive steps zoom in.
    Zoom(f32),
    /// Iteration count change in units of [`ITERATION_STEP`].
    Iterations(i32),
}

impl Action {
    /// Whether holding the key down should keep applying the action.
    pub fn repeats(self) -> bool {
        matches!(self, Action::Zoom(_) | Action::Iterations(_))
    }
}

/// What the user currently wants to see.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    pub fractal: FractalKind,
    pub palette: PaletteKind,
    pub zoom: f32,
    pub iterations: i32,
    pub vsync: bool,
    pub texture_filtering: bool,
    pan: Vertex,
    fast_zoom: bool,
    reset: bool,
    resized: bool,
}

impl ViewState {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            fractal: config.fractal,
            palette: config.palette,
            zoom: MIN_ZOOM,
            iterations: clamp_iterations(config.iterations),
            vsync: config.vsync,
            texture_filtering: config.texture_filtering,
            pan: Vertex::ZERO,
            fast_zoom: false,
            reset: false,
            resized: false,
        }
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::Quit => {}
            Action::ResetView => {
                self.zoom = MIN_ZOOM;
                self.pan = Vertex::ZERO;
                self.reset = true;
            }
            Action::ToggleVsync => self.vsync = !self.vsync,
            Action::ToggleFiltering => self.texture_filtering = !self.texture_filtering,
            Action::SelectFractal(fractal) => self.fractal = fractal,
            Action::SelectPalette(palette) => self.palette = palette,
            Action::Zoom(steps) => self.zoom_steps(steps),
            Action::Iterations(steps) => {
                self.iterations = (self.iterations + steps * ITERATION_STEP)
                    .clamp(MIN_ITERATIONS, MAX_ITERATIONS);
            }
        }
    }

    /// Zooms by [`ZOOM_STEP`] per step, twice the factor in fast mode.
    pub fn zoom_steps(&mut self, steps: f32) {
        let factor = if self.fast_zoom {
            2.0 * ZOOM_STEP
        } else {
            ZOOM_STEP
        };
        let zoomed = self.zoom * factor.powf(steps);
        if zoomed > MAX_ZOOM {
            tracing::debug!("cannot zoom closer");
        } else if zoomed < MIN_ZOOM {
            tracing::debug!("cannot zoom further");
        }
        self.zoom = zoomed.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Adds a drag of `(dx, dy)` in window-normalised units.
    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan = self.pan + Vertex::new(dx / self.zoom, dy / self.zoom);
    }

    pub fn set_fast_zoom(&mut self, enabled: bool) {
        self.fast_zoom = enabled;
    }

    pub fn request_resize(&mut self) {
        self.resized = true;
    }

    /// Pan accumulated since the last call.
    pub fn take_pan(&mut self) -> Vertex {
        std::mem::replace(&mut self.pan, Vertex::ZERO)
    }
}

impl From<&RendererConfig> for ContextConfig {
    fn from(config: &RendererConfig) -> Self {
        Self {
            iterations: config.iterations,
            vsync: config.vsync,
            texture_filtering: config.texture_filtering,
            palette_size: config.palette_size,
            shader_dir: config.shader_dir.clone(),
        }
    }
}

/// Drives a [`RenderContext`] one frame at a time.
pub struct FrameLoop<W: WindowSurface> {
    context: RenderContext<W>,
    view: ViewState,
    lazy_clear: bool,
    last_sync: Option<Instant>,
    stats_since: Instant,
    stats_frames: u32,
    total_frames: u64,
}

impl<W: WindowSurface> FrameLoop<W> {
    pub fn new(context: RenderContext<W>, view: ViewState, lazy_clear: bool, now: Instant) -> Self {
        Self {
            context,
            view,
            lazy_clear,
            last_sync: None,
            stats_since: now,
            stats_frames: 0,
            total_frames: 0,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn context(&self) -> &RenderContext<W> {
        &self.context
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Renders one frame. Returns a new window title once per second.
    pub fn frame(&mut self, now: Instant) -> Result<Option<String>> {
        let due = self
            .last_sync
            .map_or(true, |last| now.saturating_duration_since(last) >= EVENT_PERIOD);
        if due {
            self.sync()?;
            self.last_sync = Some(now);
        }

        let elapsed = now.saturating_duration_since(self.stats_since);
        let stats_due = elapsed >= STATS_PERIOD;

        if !self.lazy_clear || stats_due || self.total_frames == 0 {
            self.context.clear()?;
        }
        self.context.draw()?;
        self.context.swap_buffers()?;
        self.context.set_position(0.0, 0.0);

        self.total_frames += 1;
        self.stats_frames += 1;

        if !stats_due {
            return Ok(None);
        }
        let fps = f64::from(self.stats_frames) / elapsed.as_secs_f64();
        self.stats_since = now;
        self.stats_frames = 0;
        tracing::debug!(fps, zoom = self.view.zoom, "frame statistics");
        Ok(Some(format!(
            "{APP_NAME}: FPS {fps:.2}, zoom {:.1}",
            self.view.zoom
        )))
    }

    /// Applies the pending view state to the context.
    fn sync(&mut self) -> Result<()> {
        let view = &mut self.view;
        let context = &mut self.context;

        if std::mem::take(&mut view.resized) {
            context.resize()?;
        }
        if std::mem::take(&mut view.reset) {
            context.reset();
        }

        context.use_program(view.fractal)?;
        context.use_palette(view.palette)?;
        context.set_complex(view.fractal.complex());

        if view.vsync != context.vsync() {
            context.set_vsync(view.vsync)?;
            tracing::info!(vsync = view.vsync, "vsync toggled");
        }
        if view.texture_filtering != context.texture_filtering() {
            context.set_texture_filtering(view.texture_filtering)?;
            tracing::info!(filtering = view.texture_filtering, "texture filtering toggled");
        }

        context.set_zoom(view.zoom);
        let pan = view.take_pan();
        context.set_position(pan.x, pan.y);
        context.set_iterations(view.iterations);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::recording::{CallKind, CallLog, RecordingDriver, RecordingSurface};

    fn frame_loop(config: &RendererConfig) -> (FrameLoop<RecordingSurface>, CallLog, Instant) {
        let log = CallLog::new();
        let surface = RecordingSurface::new(log.clone(), 320, 200);
        let context = RenderContext::new(
            surface,
            Box::new(RecordingDriver::new(log.clone())),
            ContextConfig::from(config),
        )
        .expect("context");
        let start = Instant::now();
        let view = ViewState::new(config);
        (FrameLoop::new(context, view, config.lazy_clear, start), log, start)
    }

    #[test]
    fn zoom_is_clamped_to_range() {
        let mut view = ViewState::new(&RendererConfig::default());
        view.apply(Action::Zoom(-10.0));
        assert_eq!(view.zoom, MIN_ZOOM);

        view.apply(Action::Zoom(10_000.0));
        assert_eq!(view.zoom, MAX_ZOOM);
    }

    #[test]
    fn fast_zoom_doubles_the_factor() {
        let mut view = ViewState::new(&RendererConfig::default());
        view.apply(Action::Zoom(1.0));
        assert!((view.zoom - ZOOM_STEP).abs() < 1e-6);

        view.apply(Action::ResetView);
        view.set_fast_zoom(true);
        view.apply(Action::Zoom(1.0));
        assert!((view.zoom - 2.0 * ZOOM_STEP).abs() < 1e-6);
    }

    #[test]
    fn iteration_steps_stay_in_range() {
        let mut view = ViewState::new(&RendererConfig::default());
        view.apply(Action::Iterations(-1));
        assert_eq!(view.iterations, MIN_ITERATIONS);
        view.apply(Action::Iterations(3));
        assert_eq!(view.iterations, 400);
        view.apply(Action::Iterations(20));
        assert_eq!(view.iterations, MAX_ITERATIONS);
    }

    #[test]
    fn pan_is_scaled_by_zoom_and_consumed_once() {
        let mut view = ViewState::new(&RendererConfig::default());
        view.zoom = 4.0;
        view.pan_by(0.5, -1.0);
        assert_eq!(view.take_pan(), Vertex::new(0.125, -0.25));
        assert_eq!(view.take_pan(), Vertex::ZERO);
    }

    #[test]
    fn first_frame_selects_program_and_palette() {
        let config = RendererConfig {
            fractal: FractalKind::Julia3,
            ..RendererConfig::default()
        };
        let (mut frames, log, start) = frame_loop(&config);
        frames.frame(start).expect("frame");

        assert_eq!(frames.context().fractal(), Some(FractalKind::Julia3));
        assert_eq!(frames.context().palette(), Some(PaletteKind::Rainbow));
        assert_eq!(log.count(CallKind::DrawArrays), 1);
        assert_eq!(log.count(CallKind::Blit), 1);
    }

    #[test]
    fn input_is_applied_once_per_event_period() {
        let (mut frames, log, start) = frame_loop(&RendererConfig::default());
        frames.frame(start).expect("frame");

        frames.view_mut().apply(Action::SelectFractal(FractalKind::Julia1));
        frames
            .frame(start + EVENT_PERIOD / 2)
            .expect("frame inside period");
        assert_eq!(frames.context().fractal(), Some(FractalKind::Mandelbrot));

        frames.frame(start + EVENT_PERIOD).expect("frame after period");
        assert_eq!(frames.context().fractal(), Some(FractalKind::Julia1));
        assert_eq!(log.count(CallKind::CreatePipeline), 2);
    }

    #[test]
    fn lazy_clear_clears_first_frame_and_once_per_second() {
        let config = RendererConfig {
            lazy_clear: true,
            ..RendererConfig::default()
        };
        let (mut frames, log, start) = frame_loop(&config);
        for n in 0..10 {
            frames.frame(start + EVENT_PERIOD * n).expect("frame");
        }
        assert_eq!(log.count(CallKind::Clear), 1);

        let title = frames
            .frame(start + Duration::from_secs(1))
            .expect("frame");
        assert_eq!(log.count(CallKind::Clear), 2);
        assert!(title.is_some_and(|title| title.contains("zoom 1.0")));
    }

    #[test]
    fn eager_clear_runs_every_frame() {
        let (mut frames, log, start) = frame_loop(&RendererConfig::default());
        for n in 0..3 {
            frames.frame(start + EVENT_PERIOD * n).expect("frame");
        }
        assert_eq!(log.count(CallKind::Clear), 3);
        assert_eq!(frames.total_frames(), 3);
    }

    #[test]
    fn reset_clears_accumulated_pan() {
        let (mut frames, _log, start) = frame_loop(&RendererConfig::default());
        frames.view_mut().pan_by(0.25, 0.0);
        frames.frame(start).expect("frame");
        assert_eq!(frames.context().resolved_point(), Some(Vertex::new(0.25, 0.0)));

        frames.view_mut().apply(Action::ResetView);
        frames.frame(start + EVENT_PERIOD).expect("frame");
        assert_eq!(frames.context().resolved_point(), Some(Vertex::ZERO));
    }

    #[test]
    fn toggles_reach_the_context() {
        let (mut frames, log, start) = frame_loop(&RendererConfig::default());
        frames.frame(start).expect("frame");
        frames.view_mut().apply(Action::ToggleVsync);
        frames.view_mut().apply(Action::ToggleFiltering);
        frames.frame(start + EVENT_PERIOD).expect("frame");

        assert!(frames.context().vsync());
        assert!(!frames.context().texture_filtering());
        assert_eq!(log.count(CallKind::WaitForRefresh), 1);
    }
}

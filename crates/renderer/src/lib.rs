//! Renderer crate for FractalNova, an interactive Mandelbrot/Julia explorer.
//!
//! The flow from the command line to the GPU:
//!
//! ```text
//!   CLI / fractalnova
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ winit event loop ──▶ FrameLoop::frame()
//!                                               │
//!                                               ▼
//!                         RenderContext (use_program, use_palette, draw, swap_buffers)
//!                                               │
//!                                               ▼
//!                                 GpuSession ──▶ dyn GpuDriver
//! ```
//!
//! [`RenderContext`] owns every GPU object and talks to the graphics API only
//! through the handle-based [`GpuDriver`] trait. The window backend drives it
//! on `wgpu`; `--dry-run` swaps in [`RecordingDriver`] and returns the call
//! trace instead of opening a window.

mod app;
pub mod backend;
pub mod driver;
mod error;
pub mod gpu;
pub mod palette;
pub mod surface;
pub mod types;
mod window;

use std::time::Instant;

use anyhow::{Context, Result};

pub use app::{Action, FrameLoop, ViewState, EVENT_PERIOD};
pub use driver::recording::{CallKind, CallLog, DriverCall, RecordingDriver, RecordingSurface};
pub use driver::{ErrorCode, GpuDriver};
pub use error::NovaError;
pub use gpu::{ContextConfig, RenderContext};
pub use palette::{ColorEntry, ColorPalette, WeightedAnchor};
pub use surface::{BlitRequest, SurfaceHandle, WindowSurface};
pub use types::{
    FractalKind, PaletteKind, RenderBackend, RendererConfig, Vertex, DEFAULT_PALETTE_SIZE,
    MAX_ITERATIONS, MAX_PALETTE_SIZE, MIN_ITERATIONS,
};

/// What a finished [`Renderer::run`] produced.
#[derive(Debug)]
pub enum RunReport {
    /// The window was closed.
    Closed,
    /// Driver and window calls of a dry run, teardown included.
    DryRun {
        frames: u32,
        calls: Vec<DriverCall>,
        violations: Vec<String>,
    },
}

/// Entry point that owns the configuration and picks the backend.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Runs until the window closes, or for the configured number of dry-run
    /// frames.
    pub fn run(&mut self) -> Result<RunReport> {
        match self.config.backend {
            RenderBackend::Window => {
                window::run_window(&self.config)?;
                Ok(RunReport::Closed)
            }
            RenderBackend::DryRun { frames } => self.dry_run(frames),
        }
    }

    /// Renders `frames` frames against the recording driver, spaced one event
    /// period apart.
    fn dry_run(&self, frames: u32) -> Result<RunReport> {
        let log = CallLog::new();
        let driver = RecordingDriver::new(log.clone()).verifying_assets(true);
        let (width, height) = self.config.window_size;
        let surface = RecordingSurface::new(log.clone(), width, height);

        let context = RenderContext::new(surface, Box::new(driver), ContextConfig::from(&self.config))
            .context("failed to create render context")?;
        let start = Instant::now();
        let mut frame_loop = FrameLoop::new(
            context,
            ViewState::new(&self.config),
            self.config.lazy_clear,
            start,
        );

        for frame in 0..frames {
            let now = start + EVENT_PERIOD * frame;
            frame_loop.frame(now).map_err(|err| {
                if let Some(log) = err.compile_log() {
                    tracing::error!("shader log:\n{log}");
                }
                anyhow::Error::new(err).context(format!("dry-run frame {frame} failed"))
            })?;
        }
        drop(frame_loop);

        let violations = log.violations();
        for violation in &violations {
            tracing::warn!(%violation, "driver misuse");
        }
        tracing::info!(frames, calls = log.len(), "dry run finished");

        Ok(RunReport::DryRun {
            frames,
            calls: log.calls(),
            violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn shader_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["mandelbrot.vert", "mandelbrot.frag", "julia.vert", "julia.frag"] {
            fs::write(dir.path().join(name), "#version 450\n").expect("write shader");
        }
        dir
    }

    #[test]
    fn dry_run_records_frames_and_teardown() {
        let dir = shader_dir();
        let mut renderer = Renderer::new(RendererConfig {
            shader_dir: dir.path().to_path_buf(),
            backend: RenderBackend::DryRun { frames: 3 },
            ..RendererConfig::default()
        });

        let RunReport::DryRun {
            frames,
            calls,
            violations,
        } = renderer.run().expect("dry run")
        else {
            panic!("expected a dry-run report");
        };

        assert_eq!(frames, 3);
        assert!(violations.is_empty(), "{violations:?}");
        let count = |kind| calls.iter().filter(|call| call.kind() == kind).count();
        assert_eq!(count(CallKind::DrawArrays), 3);
        assert_eq!(count(CallKind::Blit), 3);
        assert_eq!(count(CallKind::CreatePipeline), 1);
        assert_eq!(count(CallKind::DestroyPipeline), 1);
        assert_eq!(count(CallKind::DestroyFrameTarget), 1);
    }

    #[test]
    fn dry_run_fails_without_shader_assets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut renderer = Renderer::new(RendererConfig {
            shader_dir: dir.path().join("missing"),
            backend: RenderBackend::DryRun { frames: 1 },
            ..RendererConfig::default()
        });

        let err = renderer.run().expect_err("missing shaders");
        assert!(format!("{err:#}").contains("mandelbrot.vert"), "{err:#}");
    }
}

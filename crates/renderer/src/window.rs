use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use tracing::{error, info};

use crate::app::{Action, FrameLoop, ViewState, APP_NAME};
use crate::backend;
use crate::gpu::{ContextConfig, RenderContext};
use crate::types::{FractalKind, PaletteKind, RendererConfig};

/// Pixels of smooth scrolling that count as one zoom step.
const PIXELS_PER_ZOOM_STEP: f64 = 20.0;

/// Opens the window and renders until it is closed or a frame fails.
pub(crate) fn run_window(config: &RendererConfig) -> Result<()> {
    let event_loop = EventLoopBuilder::new()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let (width, height) = config.window_size;
    let window = WindowBuilder::new()
        .with_title(APP_NAME)
        .with_inner_size(PhysicalSize::new(width, height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let (driver, surface) = backend::wgpu::open(Arc::clone(&window), config.vsync)
        .context("failed to initialise GPU")?;
    let context = RenderContext::new(surface, Box::new(driver), ContextConfig::from(config))
        .context("failed to create render context")?;
    let mut frames = FrameLoop::new(
        context,
        ViewState::new(config),
        config.lazy_clear,
        Instant::now(),
    );
    let mut mouse = MouseState::default();
    let mut failure = None;

    info!(
        fractal = %config.fractal,
        palette = %config.palette,
        width,
        height,
        "window open"
    );

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                elwt.exit();
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                frames.view_mut().set_fast_zoom(modifiers.state().shift_key());
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                match action_for_key(&event.logical_key) {
                    Some(Action::Quit) => elwt.exit(),
                    Some(action) if !event.repeat || action.repeats() => {
                        frames.view_mut().apply(action);
                    }
                    _ => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some((dx, dy)) = mouse.handle_cursor_moved(position) {
                    let size = window.inner_size();
                    frames.view_mut().pan_by(
                        dx / size.width.max(1) as f32,
                        dy / size.height.max(1) as f32,
                    );
                }
            }
            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                if button == MouseButton::Left {
                    mouse.handle_button(button_state);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                frames.view_mut().zoom_steps(wheel_steps(delta));
            }
            WindowEvent::Resized(_) => {
                frames.view_mut().request_resize();
            }
            WindowEvent::RedrawRequested => match frames.frame(Instant::now()) {
                Ok(Some(title)) => window.set_title(&title),
                Ok(None) => {}
                Err(err) => {
                    error!(error = %err, "rendering failed");
                    if let Some(log) = err.compile_log() {
                        error!("shader log:\n{log}");
                    }
                    failure = Some(err);
                    elwt.exit();
                }
            },
            _ => {}
        },
        Event::AboutToWait => {
            elwt.set_control_flow(ControlFlow::Poll);
            window.request_redraw();
        }
        _ => {}
    });

    info!(frames = frames.total_frames(), "window closed");
    drop(frames);

    if let Some(err) = failure {
        return Err(err.into());
    }
    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

/// Maps a pressed key to an action.
pub(crate) fn action_for_key(key: &Key) -> Option<Action> {
    match key {
        Key::Named(NamedKey::Escape) => Some(Action::Quit),
        Key::Named(NamedKey::PageUp) => Some(Action::Iterations(1)),
        Key::Named(NamedKey::PageDown) => Some(Action::Iterations(-1)),
        Key::Named(named) => palette_for_key(*named).map(Action::SelectPalette),
        Key::Character(text) => {
            let mut chars = text.chars();
            let ch = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            action_for_char(ch)
        }
        _ => None,
    }
}

fn action_for_char(ch: char) -> Option<Action> {
    match ch.to_ascii_lowercase() {
        '+' | '=' => Some(Action::Zoom(1.0)),
        '-' | '_' => Some(Action::Zoom(-1.0)),
        'r' => Some(Action::ResetView),
        'v' => Some(Action::ToggleVsync),
        'f' => Some(Action::ToggleFiltering),
        'm' => Some(Action::SelectFractal(FractalKind::Mandelbrot)),
        '0' => FractalKind::julia(10).map(Action::SelectFractal),
        digit @ '1'..='9' => digit
            .to_digit(10)
            .and_then(FractalKind::julia)
            .map(Action::SelectFractal),
        _ => None,
    }
}

fn palette_for_key(key: NamedKey) -> Option<PaletteKind> {
    let index = match key {
        NamedKey::F1 => 0,
        NamedKey::F2 => 1,
        NamedKey::F3 => 2,
        NamedKey::F4 => 3,
        NamedKey::F5 => 4,
        NamedKey::F6 => 5,
        NamedKey::F7 => 6,
        _ => return None,
    };
    PaletteKind::ALL.get(index).copied()
}

fn wheel_steps(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(position) => (position.y / PIXELS_PER_ZOOM_STEP) as f32,
    }
}

/// Tracks left-button drags.
#[derive(Default)]
struct MouseState {
    position: Option<PhysicalPosition<f64>>,
    is_pressed: bool,
}

impl MouseState {
    /// Records the new cursor position and returns the drag delta in pixels.
    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) -> Option<(f32, f32)> {
        let previous = self.position.replace(position);
        if !self.is_pressed {
            return None;
        }
        previous.map(|previous| {
            (
                (position.x - previous.x) as f32,
                (position.y - previous.y) as f32,
            )
        })
    }

    fn handle_button(&mut self, state: ElementState) {
        self.is_pressed = state == ElementState::Pressed;
    }
}

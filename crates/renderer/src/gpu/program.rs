use std::path::Path;
use std::rc::Rc;

use crate::driver::{PipelineId, ShaderKind};
use crate::error::Result;
use crate::types::{FractalKind, Vertex};

use super::session::{GpuSession, Owned};
use super::shader::ShaderStage;
use super::uniforms::{FragmentShaderParams, VertexShaderParams};

/// Linked shader pair for one fractal plus the parameters it is drawn with.
///
/// The position set each frame is a delta. [`update_vertex_uniforms`] adds it
/// to the point resolved on the previous frame, so panning accumulates until
/// [`reset`] clears it.
///
/// [`update_vertex_uniforms`]: RenderProgram::update_vertex_uniforms
/// [`reset`]: RenderProgram::reset
pub struct RenderProgram {
    // Field order is teardown order: the pipeline goes before the shaders it links.
    pipeline: Owned<PipelineId>,
    vertex: ShaderStage,
    fragment: ShaderStage,
    fractal: FractalKind,
    active: bool,
    position: Vertex,
    resolved: Vertex,
    zoom: f32,
    complex: Vertex,
    iterations: i32,
}

impl RenderProgram {
    /// Compiles `<family>.vert` / `<family>.frag` from `shader_dir`, links them
    /// and makes the pipeline active.
    pub fn new(
        session: &Rc<GpuSession>,
        shader_dir: &Path,
        fractal: FractalKind,
        iterations: i32,
        zoom: f32,
    ) -> Result<Self> {
        let family = fractal.family();
        let vertex = ShaderStage::compile(
            session,
            ShaderKind::Vertex,
            &shader_dir.join(format!("{family}.{}", ShaderKind::Vertex.extension())),
        )?;
        let fragment = ShaderStage::compile(
            session,
            ShaderKind::Fragment,
            &shader_dir.join(format!("{family}.{}", ShaderKind::Fragment.extension())),
        )?;

        let linked = session
            .driver()
            .create_pipeline(vertex.handle(), fragment.handle());
        let pipeline = Owned::new(
            session,
            session.check_link(linked, "failed to create shader pipeline")?,
        );

        let mut program = Self {
            pipeline,
            vertex,
            fragment,
            fractal,
            active: false,
            position: Vertex::ZERO,
            resolved: Vertex::ZERO,
            zoom,
            complex: fractal.complex(),
            iterations,
        };
        let result = session
            .driver()
            .set_pipeline(Some(program.pipeline.handle()));
        session.check(result, "failed to set shader pipeline")?;
        program.active = true;

        tracing::debug!(
            %fractal,
            pipeline = %program.pipeline.handle(),
            "created render program"
        );
        Ok(program)
    }

    pub fn fractal(&self) -> FractalKind {
        self.fractal
    }

    pub fn set_position(&mut self, position: Vertex) {
        self.position = position;
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom;
    }

    pub fn set_complex(&mut self, complex: Vertex) {
        self.complex = complex;
    }

    pub fn set_iterations(&mut self, iterations: i32) {
        self.iterations = iterations;
    }

    /// Forgets the accumulated pan.
    pub fn reset(&mut self) {
        self.resolved = Vertex::ZERO;
    }

    /// Pan offset written by the last vertex uniform update.
    pub fn resolved_point(&self) -> Vertex {
        self.resolved
    }

    pub fn update_vertex_uniforms(&mut self) -> Result<()> {
        let point = self.position + self.resolved;
        self.vertex.uniforms().write(&VertexShaderParams {
            angle: 0.0,
            zoom: self.zoom,
            point,
        })?;
        self.resolved = point;
        Ok(())
    }

    pub fn update_fragment_uniforms(&self) -> Result<()> {
        self.fragment.uniforms().write(&FragmentShaderParams {
            iterations: self.iterations,
            complex: self.complex,
        })
    }
}

impl Drop for RenderProgram {
    fn drop(&mut self) {
        if self.active {
            let session = self.pipeline.session();
            let result = session.driver().set_pipeline(None);
            session.warn_on_error(result, "unset shader pipeline");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::recording::{CallKind, CallLog, DriverCall, RecordingDriver};
    use crate::driver::{ErrorCode, LockedBuffer};

    fn program(log: &CallLog) -> RenderProgram {
        let session = GpuSession::open(Box::new(RecordingDriver::new(log.clone())));
        RenderProgram::new(&session, Path::new("shaders"), FractalKind::Julia1, 100, 1.0)
            .expect("program")
    }

    fn last_vertex_params(log: &CallLog) -> VertexShaderParams {
        log.calls()
            .into_iter()
            .rev()
            .find_map(|call| match call {
                DriverCall::UnlockBuffer {
                    buffer: LockedBuffer::Data(_),
                    bytes,
                } if bytes.len() == 16 => Some(bytemuck::pod_read_unaligned(&bytes)),
                _ => None,
            })
            .expect("vertex parameters written")
    }

    #[test]
    fn compiles_family_assets_and_activates_pipeline() {
        let log = CallLog::new();
        let program = program(&log);

        let compiled: Vec<_> = log
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                DriverCall::CompileShader { path, .. } => Some(path),
                _ => None,
            })
            .collect();
        assert_eq!(
            compiled,
            vec![
                Path::new("shaders/julia.vert").to_path_buf(),
                Path::new("shaders/julia.frag").to_path_buf(),
            ]
        );
        assert_eq!(log.count(CallKind::CreatePipeline), 1);
        assert!(log
            .calls()
            .contains(&DriverCall::SetPipeline(Some(program.pipeline.handle()))));
    }

    #[test]
    fn pan_accumulates_until_reset() {
        let log = CallLog::new();
        let mut program = program(&log);

        program.set_position(Vertex::new(0.25, 0.0));
        program.update_vertex_uniforms().unwrap();
        program.set_position(Vertex::new(0.25, -0.5));
        program.update_vertex_uniforms().unwrap();
        assert_eq!(program.resolved_point(), Vertex::new(0.5, -0.5));
        assert_eq!(last_vertex_params(&log).point, Vertex::new(0.5, -0.5));

        program.reset();
        program.set_position(Vertex::new(0.125, 0.125));
        program.update_vertex_uniforms().unwrap();
        assert_eq!(last_vertex_params(&log).point, Vertex::new(0.125, 0.125));
    }

    #[test]
    fn vertex_block_carries_zoom_and_zero_angle() {
        let log = CallLog::new();
        let mut program = program(&log);
        program.set_zoom(3.5);
        program.update_vertex_uniforms().unwrap();

        let params = last_vertex_params(&log);
        assert_eq!(params.angle, 0.0);
        assert_eq!(params.zoom, 3.5);
    }

    #[test]
    fn fragment_block_carries_iterations_and_complex() {
        let log = CallLog::new();
        let mut program = program(&log);
        program.set_iterations(400);
        program.set_complex(Vertex::new(0.3, 0.5));
        program.update_fragment_uniforms().unwrap();

        let written = log
            .calls()
            .into_iter()
            .find_map(|call| match call {
                DriverCall::UnlockBuffer { bytes, .. } if bytes.len() == 12 => {
                    Some(bytemuck::pod_read_unaligned::<FragmentShaderParams>(&bytes))
                }
                _ => None,
            })
            .expect("fragment parameters written");
        assert_eq!(written.iterations, 400);
        assert_eq!(written.complex, Vertex::new(0.3, 0.5));
    }

    #[test]
    fn teardown_destroys_pipeline_before_shaders() {
        let log = CallLog::new();
        drop(program(&log));

        let unset = log.last_position(CallKind::SetPipeline).unwrap();
        let pipeline = log.position(CallKind::DestroyPipeline).unwrap();
        let first_shader = log.position(CallKind::DestroyShader).unwrap();
        assert!(unset < pipeline);
        assert!(pipeline < first_shader);
        assert!(log.violations().is_empty());
        assert!(log.live_objects().is_empty());
    }

    #[test]
    fn link_failure_unwinds_compiled_shaders() {
        let log = CallLog::new();
        let driver =
            RecordingDriver::new(log.clone()).fail_on(CallKind::CreatePipeline, ErrorCode::LinkFailed);
        let session = GpuSession::open(Box::new(driver));

        let err = RenderProgram::new(&session, Path::new("shaders"), FractalKind::Mandelbrot, 100, 1.0)
            .err()
            .expect("link failure");
        assert!(matches!(err, crate::error::NovaError::PipelineLink { .. }));
        assert_eq!(log.count(CallKind::DestroyShader), 2);
        assert!(log.live_objects().is_empty());
        assert!(log.violations().is_empty());
    }
}

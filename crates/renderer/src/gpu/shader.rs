use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::driver::{ShaderId, ShaderKind};
use crate::error::{NovaError, Result};

use super::session::{GpuSession, Owned};
use super::uniforms::{params_size, UniformBuffer};

/// A compiled shader and the parameter buffer it reads.
pub struct ShaderStage {
    // Declared first so the buffer is unbound and released before the shader.
    uniforms: UniformBuffer,
    shader: Owned<ShaderId>,
    kind: ShaderKind,
    path: PathBuf,
}

impl ShaderStage {
    /// Compiles the asset at `path` and attaches a parameter buffer sized for
    /// `kind`.
    pub fn compile(session: &Rc<GpuSession>, kind: ShaderKind, path: &Path) -> Result<Self> {
        let outcome = session.driver().compile_shader(kind, path);

        let log = outcome.log.map(|log| {
            session.driver().destroy_shader_log(log.id);
            log.text
        });
        if let Some(text) = log.as_deref().filter(|text| !text.is_empty()) {
            tracing::debug!(path = %path.display(), stage = %kind, "compiler log: {text}");
        }

        let shader = match outcome.shader {
            Ok(id) => Owned::new(session, id),
            Err(code) => {
                return Err(NovaError::ShaderCompile {
                    path: path.display().to_string(),
                    message: session.error_string(code),
                    log,
                })
            }
        };

        let uniforms = UniformBuffer::create(session, kind, params_size(kind), shader.handle())?;
        tracing::debug!(
            shader = %shader.handle(),
            stage = %kind,
            path = %path.display(),
            "compiled shader"
        );

        Ok(Self {
            uniforms,
            shader,
            kind,
            path: path.to_path_buf(),
        })
    }

    pub fn handle(&self) -> ShaderId {
        self.shader.handle()
    }

    pub fn uniforms(&self) -> &UniformBuffer {
        &self.uniforms
    }

    pub fn kind(&self) -> ShaderKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::recording::{CallKind, CallLog, DriverCall, RecordingDriver};
    use crate::driver::ErrorCode;

    #[test]
    fn compile_releases_log_and_sizes_buffer() {
        let log = CallLog::new();
        let session = GpuSession::open(Box::new(RecordingDriver::new(log.clone())));
        let stage = ShaderStage::compile(&session, ShaderKind::Fragment, Path::new("julia.frag"))
            .expect("shader");

        assert_eq!(stage.uniforms().size(), 12);
        assert_eq!(log.count(CallKind::DestroyShaderLog), 1);
        assert!(log
            .calls()
            .contains(&DriverCall::CreateDataBuffer { size: 12 }));
    }

    #[test]
    fn compile_failure_carries_path_and_log() {
        let log = CallLog::new();
        let driver = RecordingDriver::new(log.clone())
            .fail_on(CallKind::CompileShader, ErrorCode::CompileFailed);
        let session = GpuSession::open(Box::new(driver));

        let err = ShaderStage::compile(&session, ShaderKind::Vertex, Path::new("broken.vert"))
            .err()
            .expect("compile failure");
        match &err {
            NovaError::ShaderCompile { path, message, .. } => {
                assert_eq!(path, "broken.vert");
                assert_eq!(message, "shader compilation failed");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.compile_log().is_some());
        assert_eq!(log.count(CallKind::DestroyShaderLog), 1);
        assert!(log.live_objects().is_empty());
    }

    #[test]
    fn missing_asset_is_reported_as_compile_error() {
        let log = CallLog::new();
        let driver = RecordingDriver::new(log.clone()).verifying_assets(true);
        let session = GpuSession::open(Box::new(driver));

        let err = ShaderStage::compile(
            &session,
            ShaderKind::Vertex,
            Path::new("/nonexistent/mandelbrot.vert"),
        )
        .err()
        .expect("missing asset");
        assert!(matches!(err, NovaError::ShaderCompile { .. }));
        assert!(err.to_string().contains("file not found"));
        assert!(log.live_objects().is_empty());
    }

    #[test]
    fn drop_releases_buffer_before_shader() {
        let log = CallLog::new();
        let session = GpuSession::open(Box::new(RecordingDriver::new(log.clone())));
        let stage = ShaderStage::compile(&session, ShaderKind::Vertex, Path::new("a.vert"))
            .expect("shader");
        drop(stage);

        let buffer = log.position(CallKind::DestroyDataBuffer).expect("buffer destroyed");
        let shader = log.position(CallKind::DestroyShader).expect("shader destroyed");
        assert!(buffer < shader);
        assert!(log.live_objects().is_empty());
        assert!(log.violations().is_empty());
    }
}

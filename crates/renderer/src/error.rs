use thiserror::Error;

/// Failures raised by the GPU resource layer.
///
/// Every driver status passes through [`GpuSession`](crate::gpu::GpuSession)
/// before it becomes one of these, so the message always carries both the
/// operation that failed and the driver's own description of the code.
#[derive(Debug, Error)]
pub enum NovaError {
    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("failed to compile shader {path}: {message}")]
    ShaderCompile {
        path: String,
        message: String,
        log: Option<String>,
    },

    #[error("{context}: {message}")]
    PipelineLink { context: String, message: String },

    #[error("{context}: {message}")]
    ResourceAllocation { context: String, message: String },

    #[error("invalid palette: {0}")]
    InvalidPalette(String),

    #[error("{context}: {message}")]
    DriverOperation { context: String, message: String },

    #[error("no shader program is active; select a fractal before drawing")]
    NoActiveProgram,

    #[error("window: {0}")]
    Window(String),
}

impl NovaError {
    /// Compile log captured from the driver, if the failure produced one.
    pub fn compile_log(&self) -> Option<&str> {
        match self {
            NovaError::ShaderCompile { log, .. } => log.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T, E = NovaError> = std::result::Result<T, E>;

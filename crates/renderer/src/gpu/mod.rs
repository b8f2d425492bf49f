//! GPU resource layer.
//!
//! Every type here owns driver objects through [`session::Owned`] guards and
//! releases them in field order when dropped:
//! - `session` holds the single driver context and funnels every driver status
//!   into a [`NovaError`](crate::NovaError).
//! - `uniforms` defines the shader parameter blocks and the buffer they are
//!   written through.
//! - `shader` compiles one stage and attaches its parameter buffer.
//! - `geometry` uploads the full-screen quad.
//! - `texture` turns a palette gradient into the lookup texture.
//! - `program` links a vertex/fragment pair and tracks pan, zoom, complex
//!   constant and iteration count.
//! - `frame` is the grow-only off-screen color target.
//! - `context` glues everything together and exposes [`RenderContext`].

mod context;
mod frame;
mod geometry;
mod program;
mod session;
mod shader;
mod texture;
mod uniforms;

pub use context::{ContextConfig, RenderContext};
pub use frame::FrameTarget;
pub use geometry::{GeometryBuffer, QuadVertex, QUAD};
pub use program::RenderProgram;
pub use session::{GpuSession, Owned};
pub use shader::ShaderStage;
pub use texture::{Texture, PALETTE_UNIT};
pub use uniforms::{params_size, FragmentShaderParams, UniformBuffer, VertexShaderParams};

//! Seam to the native ISF rendering engine.
//!
//! Shader compilation, GLSL execution, and GPU state live entirely behind
//! [`IsfEngine`]; this workspace only drives the calls. Implementations are
//! provided by bindings crates that link the actual engine. Both operations
//! block for their full duration, and no thread-safety is assumed beyond a
//! single serialized owner: the engine's GPU context is thread-affine, so
//! the facade funnels every call through the one instance it owns.

use crate::pool::PooledBuffer;
use crate::value::ResolvedInputs;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine rejected the shader; carries the engine's diagnostic text.
    #[error("shader compilation failed: {0}")]
    Compile(String),
    /// The engine failed mid-render (GPU or driver fault).
    #[error("render pass failed: {0}")]
    Render(String),
    /// No engine can run in this environment.
    #[error("rendering engine unavailable: {0}")]
    Unavailable(String),
}

/// Blocking interface to a native ISF engine instance.
///
/// Implementations may cache compiled state between calls with equal
/// sources; callers must not rely on it.
pub trait IsfEngine: Send {
    /// Compiles the shader and validates it against the ISF contract
    /// without rendering.
    fn compile_and_validate(&mut self, source: &str) -> Result<(), EngineError>;

    /// Renders one frame into `target`, which is sized to the requested
    /// output already. On success every pixel of `target` has been written.
    fn render(
        &mut self,
        source: &str,
        inputs: &ResolvedInputs,
        time_code: f32,
        target: &mut PooledBuffer,
    ) -> Result<(), EngineError>;
}

pub type BoxedEngine = Box<dyn IsfEngine>;

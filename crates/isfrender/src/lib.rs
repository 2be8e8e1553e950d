//! Core rendering library: coercion, caching, pooling, fallback, and the
//! facade that ties them to a native ISF engine.
//!
//! The overall flow is:
//!
//! ```text
//!   caller / batchrun / service
//!          │ shader source + time code + FrameParams
//!          ▼
//!   Renderer ──▶ value coercion ──▶ RenderCache (lookup)
//!          │                              │ miss
//!          │              ┌───────────────┴──────────────┐
//!          ▼              ▼                              ▼
//!   BufferPool ──▶ IsfEngine (native render)    fallback gradient
//!          │              └───────────────┬──────────────┘
//!          ▼                              ▼
//!      released                 RenderCache (store) ──▶ caller
//! ```
//!
//! Shader compilation and GPU execution stay behind the [`engine::IsfEngine`]
//! seam; this crate never interprets GLSL. Without an attached engine every
//! request still produces an image via the deterministic fallback gradient.

pub mod cache;
pub mod engine;
pub mod fallback;
pub mod frame;
pub mod platform;
pub mod pool;
pub mod render;
pub mod service;
pub mod value;

pub use cache::{CacheEntry, CacheKey, CacheLimits, Provenance, RenderCache};
pub use engine::{BoxedEngine, EngineError, IsfEngine};
pub use frame::{EncodeFormat, Frame, FrameError};
pub use platform::{EngineAvailability, PlatformInfo};
pub use pool::{BufferPool, PooledBuffer};
pub use render::{
    FrameParams, RenderError, RenderedFrame, Renderer, RendererOptions, ValidationReport,
};
pub use service::{
    describe_error, RenderMetadata, RenderShaderRequest, RenderShaderResponse, ServiceLimits,
    ShaderInfo, ShaderInfoRequest, ShaderInfoResponse, ShaderInputInfo, ShaderService,
    ValidateShaderRequest, ValidateShaderResponse,
};
pub use value::{coerce, infer, CoerceError, RawValue, ResolvedInputs, TypedValue};

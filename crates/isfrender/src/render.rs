//! The rendering facade: coercion, cache, engine, fallback, in that order.
//!
//! ```text
//!   caller ──▶ Renderer::render_frame
//!                  │ coerce inputs (declared kinds from the ISF header)
//!                  ▼
//!              cache lookup ── hit ──▶ cached frame
//!                  │ miss
//!                  ▼
//!       engine ready? ──yes──▶ native render ──ok──▶ store + return
//!                  │                  └─err─▶ fallback frame (not cached)
//!                  └──no───▶ fallback frame ──▶ store + return
//! ```
//!
//! The renderer owns the engine, the buffer pool, and the cache exclusively
//! and exposes `&mut self` operations, so a miss→render→store sequence can
//! never interleave with another for the same key. Callers that share a
//! renderer across threads wrap it in their own lock, which serializes whole
//! calls and keeps the engine's thread-affine context on one owner.

use std::collections::BTreeMap;
use std::sync::Arc;

use isfdoc::{Fingerprint, InputKind, IsfDoc};
use thiserror::Error;

use crate::cache::{CacheKey, CacheLimits, Provenance, RenderCache};
use crate::engine::{BoxedEngine, EngineError, IsfEngine};
use crate::fallback;
use crate::frame::Frame;
use crate::platform::{EngineAvailability, PlatformInfo};
use crate::pool::BufferPool;
use crate::value::{self, RawValue, ResolvedInputs};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    InvalidInput(#[from] value::CoerceError),
}

/// Tunables fixed at renderer construction.
#[derive(Debug, Clone)]
pub struct RendererOptions {
    /// Requests beyond this edge length are clamped, with a warning, never
    /// rejected.
    pub max_texture_size: u32,
    pub cache: CacheLimits,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            max_texture_size: 4096,
            cache: CacheLimits::default(),
        }
    }
}

/// Per-call parameters besides the shader source and time code.
#[derive(Debug, Clone, Default)]
pub struct FrameParams {
    pub width: u32,
    pub height: u32,
    pub inputs: BTreeMap<String, RawValue>,
}

impl FrameParams {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            inputs: BTreeMap::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: RawValue) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }
}

/// Outcome of one render call. A frame is always present; when the engine
/// failed, `engine_error` carries the structured failure alongside the
/// fallback pixels that stand in for it.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub frame: Arc<Frame>,
    pub provenance: Provenance,
    pub cache_hit: bool,
    pub engine_error: Option<EngineError>,
    pub warnings: Vec<String>,
}

/// Result of validating a shader without rendering it.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

enum EngineSlot {
    Ready(BoxedEngine),
    Offline { reason: String },
}

pub struct Renderer {
    engine: EngineSlot,
    cache: RenderCache,
    pool: BufferPool,
    options: RendererOptions,
}

impl Renderer {
    /// Builds a renderer around an engine instance supplied by a bindings
    /// crate. The engine is owned exclusively from here on.
    pub fn with_engine(engine: BoxedEngine, options: RendererOptions) -> Self {
        Self::build(EngineSlot::Ready(engine), options)
    }

    /// Builds a renderer that serves only fallback frames, recording why.
    pub fn fallback_only(reason: impl Into<String>, options: RendererOptions) -> Self {
        let reason = reason.into();
        tracing::warn!(%reason, "rendering engine unavailable, using placeholder renderer");
        Self::build(EngineSlot::Offline { reason }, options)
    }

    /// Probes the platform and builds accordingly. No engine backend is
    /// linked into this workspace itself, so without a display the probe
    /// reason is reported and in any case rendering degrades to fallback
    /// until a backend is attached via [`Renderer::with_engine`].
    pub fn detect(options: RendererOptions) -> Self {
        match PlatformInfo::probe().engine_availability() {
            EngineAvailability::Available => {
                Self::fallback_only("no engine backend linked into this build", options)
            }
            EngineAvailability::Unavailable { reason } => Self::fallback_only(reason, options),
        }
    }

    fn build(engine: EngineSlot, options: RendererOptions) -> Self {
        Self {
            engine,
            cache: RenderCache::new(options.cache),
            pool: BufferPool::new(),
            options,
        }
    }

    pub fn engine_available(&self) -> bool {
        matches!(self.engine, EngineSlot::Ready(_))
    }

    /// Reason rendering is degraded, when it is.
    pub fn offline_reason(&self) -> Option<&str> {
        match &self.engine {
            EngineSlot::Ready(_) => None,
            EngineSlot::Offline { reason } => Some(reason),
        }
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Renders one frame of `source` at `time_code`.
    ///
    /// Only input coercion failures surface as `Err`; engine failures
    /// degrade to a fallback frame with the error attached, so every other
    /// request yields an image.
    pub fn render_frame(
        &mut self,
        source: &str,
        time_code: f32,
        params: &FrameParams,
    ) -> Result<RenderedFrame, RenderError> {
        let mut warnings = Vec::new();
        let (width, height) = self.clamp_size(params.width, params.height, &mut warnings);
        let time_code = if time_code.is_finite() {
            time_code
        } else {
            warnings.push("non-finite time code replaced with 0.0".to_string());
            0.0
        };

        let doc = match IsfDoc::parse(source) {
            Ok(doc) => Some(doc),
            Err(err) => {
                tracing::warn!(error = %err, "shader metadata unusable, treating source as plain GLSL");
                warnings.push(err.to_string());
                None
            }
        };
        let shader = doc
            .as_ref()
            .map(IsfDoc::fingerprint)
            .unwrap_or_else(|| Fingerprint::of_source(source));

        let inputs = resolve_inputs(doc.as_ref(), &params.inputs, &mut warnings)?;
        let key = CacheKey::derive(shader, &inputs, time_code, width, height);

        if let Some(entry) = self.cache.get(&key) {
            tracing::debug!(%key, "cache hit, skipping engine");
            return Ok(RenderedFrame {
                frame: entry.frame(),
                provenance: entry.provenance(),
                cache_hit: true,
                engine_error: None,
                warnings,
            });
        }

        match &mut self.engine {
            EngineSlot::Ready(engine) => {
                match run_engine(
                    engine.as_mut(),
                    &mut self.pool,
                    source,
                    &inputs,
                    time_code,
                    width,
                    height,
                ) {
                    Ok(frame) => {
                        let frame = Arc::new(frame);
                        self.cache.put(key, Arc::clone(&frame), Provenance::Engine);
                        Ok(RenderedFrame {
                            frame,
                            provenance: Provenance::Engine,
                            cache_hit: false,
                            engine_error: None,
                            warnings,
                        })
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "engine failed, serving fallback frame");
                        warnings.push(err.to_string());
                        // Transient failure: the fallback stands in for this
                        // response but is not cached, so an identical retry
                        // can reach a recovered engine.
                        Ok(RenderedFrame {
                            frame: Arc::new(fallback::generate(width, height, time_code)),
                            provenance: Provenance::Fallback,
                            cache_hit: false,
                            engine_error: Some(err),
                            warnings,
                        })
                    }
                }
            }
            EngineSlot::Offline { .. } => {
                let frame = Arc::new(fallback::generate(width, height, time_code));
                // The mode cannot change within a session and the gradient
                // is deterministic, so caching is safe here.
                self.cache.put(key, Arc::clone(&frame), Provenance::Fallback);
                Ok(RenderedFrame {
                    frame,
                    provenance: Provenance::Fallback,
                    cache_hit: false,
                    engine_error: None,
                    warnings,
                })
            }
        }
    }

    /// Validates a shader without producing a frame: structural checks
    /// always, an engine compile when one is attached.
    pub fn validate(&mut self, source: &str) -> ValidationReport {
        let mut report = ValidationReport::default();
        match IsfDoc::parse(source) {
            Ok(doc) => {
                let lint = doc.lint();
                report.errors.extend(lint.errors);
                report.warnings.extend(lint.warnings);
            }
            Err(err) => report.errors.push(err.to_string()),
        }

        match &mut self.engine {
            EngineSlot::Ready(engine) if report.errors.is_empty() => {
                if let Err(err) = engine.compile_and_validate(source) {
                    report.errors.push(err.to_string());
                }
            }
            EngineSlot::Ready(_) => {}
            EngineSlot::Offline { .. } => {
                report
                    .warnings
                    .push("engine unavailable; structural checks only".to_string());
            }
        }

        report.valid = report.errors.is_empty();
        report
    }

    fn clamp_size(&self, width: u32, height: u32, warnings: &mut Vec<String>) -> (u32, u32) {
        let max = self.options.max_texture_size.max(1);
        let mut clamp_axis = |label: &str, value: u32| {
            let clamped = value.clamp(1, max);
            if clamped != value {
                tracing::warn!(axis = label, requested = value, max, "clamping render size");
                warnings.push(format!(
                    "requested {label} {value} clamped to {clamped} (max texture size {max})"
                ));
            }
            clamped
        };
        (clamp_axis("width", width), clamp_axis("height", height))
    }
}

/// Coerces raw inputs against the shader's declarations. Declared inputs
/// coerce strictly; undeclared ones are inferred from shape and skipped
/// (with a warning) when no kind fits, the way the engine itself ignores
/// inputs a shader never asked for.
fn resolve_inputs(
    doc: Option<&IsfDoc>,
    raw_inputs: &BTreeMap<String, RawValue>,
    warnings: &mut Vec<String>,
) -> Result<ResolvedInputs, RenderError> {
    let declared: BTreeMap<&str, InputKind> = doc
        .map(|doc| doc.declared_inputs().collect())
        .unwrap_or_default();

    let mut resolved = ResolvedInputs::new();
    for (name, raw) in raw_inputs {
        match declared.get(name.as_str()) {
            Some(kind) => {
                let typed = value::coerce(name, raw, *kind)?;
                resolved.insert(name.clone(), typed);
            }
            None => match value::infer(name, raw) {
                Ok(typed) => {
                    resolved.insert(name.clone(), typed);
                }
                Err(err) => {
                    tracing::warn!(input = %name, error = %err, "ignoring undeclared input");
                    warnings.push(err.to_string());
                }
            },
        }
    }
    Ok(resolved)
}

/// One native render pass through the pooled target buffer. The buffer is
/// returned to the pool on every path, success or not.
fn run_engine(
    engine: &mut dyn IsfEngine,
    pool: &mut BufferPool,
    source: &str,
    inputs: &ResolvedInputs,
    time_code: f32,
    width: u32,
    height: u32,
) -> Result<Frame, EngineError> {
    engine.compile_and_validate(source)?;

    let mut target = pool.acquire(width, height);
    let outcome = engine.render(source, inputs, time_code, &mut target);
    let frame = match outcome {
        Ok(()) => {
            pool.mark_initialized(&mut target);
            Ok(Frame::from_parts(width, height, target.pixels().to_vec()))
        }
        Err(err) => Err(err),
    };
    pool.release(target);
    frame
}

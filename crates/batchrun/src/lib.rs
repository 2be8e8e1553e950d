//! Sequential batch rendering driven by a [`BatchConfig`].
//!
//! One [`Renderer`] — and therefore one engine context, one buffer pool, and
//! one cache — is reused across every job and frame, in request order. A
//! frame that fails never aborts the batch: the failure is recorded, the
//! remaining frames run, and the report's summary counts both sides.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use batchconfig::{BatchConfig, Defaults, OutputFormat, ShaderJob};
use isfrender::{EncodeFormat, FrameParams, RawValue, RenderedFrame, Renderer};

/// What happened to one requested frame.
#[derive(Debug, Clone)]
pub enum FrameOutcome {
    /// The engine produced the frame (or the cache already held it).
    Rendered { output: PathBuf, cache_hit: bool },
    /// The engine failed; a placeholder image was written instead.
    Fallback { output: PathBuf, error: String },
    /// No image could be produced or written for this frame.
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub shader: String,
    pub frame_index: usize,
    pub time_code: f32,
    pub outcome: FrameOutcome,
}

/// Aggregate result of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub frames: Vec<FrameRecord>,
}

impl BatchReport {
    pub fn successful(&self) -> usize {
        self.frames
            .iter()
            .filter(|record| matches!(record.outcome, FrameOutcome::Rendered { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.frames.len() - self.successful()
    }

    /// Human-readable aggregate line for logs and clients.
    pub fn summary(&self) -> String {
        let successful = self.successful();
        let failed = self.failed();
        if failed == 0 {
            format!("Successfully rendered {successful} frames")
        } else {
            format!(
                "Completed rendering with {successful} successful frames and {failed} failed frames"
            )
        }
    }
}

/// Renders every job in the config through one shared renderer.
pub fn run_batch(renderer: &mut Renderer, config: &BatchConfig) -> BatchReport {
    let mut report = BatchReport::default();
    for job in &config.shaders {
        run_job(renderer, &config.defaults, job, &mut report);
    }
    tracing::info!(
        successful = report.successful(),
        failed = report.failed(),
        "{}",
        report.summary()
    );
    report
}

fn run_job(renderer: &mut Renderer, defaults: &Defaults, job: &ShaderJob, report: &mut BatchReport) {
    let source = match fs::read_to_string(&job.input) {
        Ok(source) => source,
        Err(err) => {
            let error = if err.kind() == std::io::ErrorKind::NotFound {
                format!("shader file not found: {}", job.input)
            } else {
                format!("failed to read shader '{}': {err}", job.input)
            };
            tracing::warn!(shader = %job.input, %error, "skipping job");
            for (frame_index, &time_code) in job.times.iter().enumerate() {
                report.frames.push(FrameRecord {
                    shader: job.input.clone(),
                    frame_index,
                    time_code,
                    outcome: FrameOutcome::Failed {
                        error: error.clone(),
                    },
                });
            }
            return;
        }
    };

    let params = FrameParams {
        width: job.resolved_width(defaults),
        height: job.resolved_height(defaults),
        inputs: job
            .inputs
            .iter()
            .flatten()
            .map(|(name, value)| (name.clone(), RawValue::from(value)))
            .collect(),
    };
    let quality = job.resolved_quality(defaults);

    for (frame_index, &time_code) in job.times.iter().enumerate() {
        let output = PathBuf::from(format_output_path(&job.output, frame_index, time_code));
        let outcome = match renderer.render_frame(&source, time_code, &params) {
            Ok(rendered) => {
                match write_frame(&rendered, &output, defaults.output_format, quality) {
                    Ok(()) => match rendered.engine_error {
                        Some(err) => {
                            tracing::warn!(
                                shader = %job.input,
                                time_code,
                                error = %err,
                                "frame degraded to placeholder"
                            );
                            FrameOutcome::Fallback {
                                output,
                                error: err.to_string(),
                            }
                        }
                        None => FrameOutcome::Rendered {
                            output,
                            cache_hit: rendered.cache_hit,
                        },
                    },
                    Err(err) => FrameOutcome::Failed {
                        error: format!("{err:#}"),
                    },
                }
            }
            Err(err) => {
                tracing::warn!(shader = %job.input, time_code, error = %err, "frame failed");
                FrameOutcome::Failed {
                    error: err.to_string(),
                }
            }
        };
        report.frames.push(FrameRecord {
            shader: job.input.clone(),
            frame_index,
            time_code,
            outcome,
        });
    }
}

fn write_frame(
    rendered: &RenderedFrame,
    output: &Path,
    default_format: OutputFormat,
    quality: u8,
) -> Result<()> {
    let format = match output.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => EncodeFormat::Png,
        Some(ext) if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") => {
            EncodeFormat::Jpeg { quality }
        }
        _ => match default_format {
            OutputFormat::Png => EncodeFormat::Png,
            OutputFormat::Jpeg => EncodeFormat::Jpeg { quality },
        },
    };

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
    }
    let bytes = rendered
        .frame
        .encode(format)
        .with_context(|| format!("encoding frame for {}", output.display()))?;
    fs::write(output, bytes).with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

/// Expands the frame number and time code into an output path template.
///
/// Recognized placeholders: `%04d` (zero-padded frame number), `%d` (frame
/// number), `%.3f` and `%f` (time code with millisecond precision). A
/// template without placeholders names a single file that later frames
/// overwrite.
pub fn format_output_path(template: &str, frame_number: usize, time_code: f32) -> String {
    template
        .replace("%04d", &format!("{frame_number:04}"))
        .replace("%d", &frame_number.to_string())
        .replace("%.3f", &format!("{time_code:.3}"))
        .replace("%f", &format!("{time_code:.3}"))
}

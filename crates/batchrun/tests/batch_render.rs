use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use batchconfig::BatchConfig;
use batchrun::{run_batch, FrameOutcome};
use isfrender::{
    EngineError, IsfEngine, PooledBuffer, Renderer, RendererOptions, ResolvedInputs,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Engine double: compiles anything that does not contain the marker token,
/// fills frames with a solid value, and counts render passes.
struct ScriptedEngine {
    renders: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let renders = Arc::new(AtomicUsize::new(0));
        (
            Self {
                renders: Arc::clone(&renders),
            },
            renders,
        )
    }
}

impl IsfEngine for ScriptedEngine {
    fn compile_and_validate(&mut self, source: &str) -> Result<(), EngineError> {
        if source.contains("bad_token") {
            return Err(EngineError::Compile(
                "syntax error: unexpected identifier 'bad_token'".into(),
            ));
        }
        Ok(())
    }

    fn render(
        &mut self,
        _source: &str,
        _inputs: &ResolvedInputs,
        _time_code: f32,
        target: &mut PooledBuffer,
    ) -> Result<(), EngineError> {
        self.renders.fetch_add(1, Ordering::Relaxed);
        target.pixels_mut().fill(200);
        Ok(())
    }
}

const GOOD_SHADER: &str = r#"/*{
    "DESCRIPTION": "solid",
    "INPUTS": [{"NAME": "speed", "TYPE": "float"}]
}*/
void main() {
    gl_FragColor = vec4(vec3(sin(TIME)), 1.0);
}
"#;

const BAD_SHADER: &str = "void main() { bad_token; }\n";

fn write_shader(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write shader");
    path.to_string_lossy().into_owned()
}

#[test]
fn batch_with_one_broken_shader_reports_partial_success() {
    init_tracing();
    let temp = tempfile::tempdir().unwrap();
    let shaders = temp.path().join("shaders");
    fs::create_dir_all(&shaders).unwrap();
    let out = temp.path().join("out");

    let good_a = write_shader(&shaders, "a.fs", GOOD_SHADER);
    let good_b = write_shader(&shaders, "b.fs", GOOD_SHADER.replace("solid", "other").as_str());
    let bad = write_shader(&shaders, "c.fs", BAD_SHADER);

    let config = BatchConfig::from_toml_str(&format!(
        r#"
[defaults]
width = 16
height = 16

[[shaders]]
input = "{good_a}"
output = "{out}/a_%d.png"
times = [0.0]

[[shaders]]
input = "{good_b}"
output = "{out}/b_%d.png"
times = [0.0]

[[shaders]]
input = "{bad}"
output = "{out}/c_%d.png"
times = [0.0]
"#,
        out = out.display(),
    ))
    .expect("valid config");

    let (engine, _) = ScriptedEngine::new();
    let mut renderer = Renderer::with_engine(Box::new(engine), RendererOptions::default());
    let report = run_batch(&mut renderer, &config);

    assert_eq!(report.successful(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(
        report.summary(),
        "Completed rendering with 2 successful frames and 1 failed frames"
    );

    // The broken shader still produced a placeholder image on disk.
    let fallback_record = report
        .frames
        .iter()
        .find(|record| record.shader.ends_with("c.fs"))
        .expect("record for broken shader");
    match &fallback_record.outcome {
        FrameOutcome::Fallback { output, error } => {
            assert!(output.exists(), "placeholder frame written");
            assert!(error.contains("syntax error"));
        }
        other => panic!("expected fallback outcome, got {other:?}"),
    }

    let decoded = image::open(out.join("a_0.png")).expect("decode rendered frame");
    assert_eq!(decoded.width(), 16);
    assert_eq!(decoded.height(), 16);
}

#[test]
fn repeated_frames_reuse_cache_and_buffers() {
    init_tracing();
    let temp = tempfile::tempdir().unwrap();
    let shader = write_shader(temp.path(), "wave.fs", GOOD_SHADER);
    let out = temp.path().join("out");

    let config = BatchConfig::from_toml_str(&format!(
        r#"
[defaults]
width = 8
height = 8

[[shaders]]
input = "{shader}"
output = "{out}/wave_%04d.png"
times = [0.5, 0.5, 1.0]

[shaders.inputs]
speed = 2.0
"#,
        out = out.display(),
    ))
    .unwrap();

    let (engine, renders) = ScriptedEngine::new();
    let mut renderer = Renderer::with_engine(Box::new(engine), RendererOptions::default());
    let report = run_batch(&mut renderer, &config);

    assert_eq!(report.successful(), 3);
    assert_eq!(
        renders.load(Ordering::Relaxed),
        2,
        "identical frame must come from the cache"
    );
    let cache_hits = report
        .frames
        .iter()
        .filter(|record| {
            matches!(
                record.outcome,
                FrameOutcome::Rendered {
                    cache_hit: true,
                    ..
                }
            )
        })
        .count();
    assert_eq!(cache_hits, 1);
    assert!(out.join("wave_0000.png").exists());
    assert!(out.join("wave_0001.png").exists());
    assert!(out.join("wave_0002.png").exists());
}

#[test]
fn missing_shader_files_fail_their_frames_without_aborting() {
    init_tracing();
    let temp = tempfile::tempdir().unwrap();
    let good = write_shader(temp.path(), "ok.fs", GOOD_SHADER);
    let out = temp.path().join("out");

    let config = BatchConfig::from_toml_str(&format!(
        r#"
[[shaders]]
input = "{missing}"
output = "{out}/gone_%d.png"
times = [0.0, 1.0]

[[shaders]]
input = "{good}"
output = "{out}/ok_%d.png"
times = [0.0]
width = 8
height = 8
"#,
        missing = temp.path().join("nope.fs").display(),
        out = out.display(),
    ))
    .unwrap();

    let (engine, _) = ScriptedEngine::new();
    let mut renderer = Renderer::with_engine(Box::new(engine), RendererOptions::default());
    let report = run_batch(&mut renderer, &config);

    assert_eq!(report.failed(), 2);
    assert_eq!(report.successful(), 1);
    assert!(report.frames.iter().take(2).all(|record| matches!(
        &record.outcome,
        FrameOutcome::Failed { error } if error.contains("not found")
    )));
    assert!(out.join("ok_0.png").exists());
}

#[test]
fn headless_renderer_still_completes_a_batch() {
    init_tracing();
    let temp = tempfile::tempdir().unwrap();
    let shader = write_shader(temp.path(), "wave.fs", GOOD_SHADER);
    let out = temp.path().join("out");

    let config = BatchConfig::from_toml_str(&format!(
        r#"
[[shaders]]
input = "{shader}"
output = "{out}/wave_%f.png"
times = "0-1:0.5"
width = 8
height = 8

[shaders.inputs]
speed = "1.5"
center = "0.25,0.75"
"#,
        out = out.display(),
    ))
    .unwrap();

    let mut renderer = Renderer::fallback_only("no display", RendererOptions::default());
    let report = run_batch(&mut renderer, &config);

    // Placeholder frames count as rendered: the engine being offline is a
    // session mode, not a per-frame failure.
    assert_eq!(report.successful(), 3);
    assert_eq!(report.summary(), "Successfully rendered 3 frames");
    assert!(out.join("wave_0.500.png").exists());
}

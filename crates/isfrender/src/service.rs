//! Synchronous operation surface for assistant-facing clients.
//!
//! [`ShaderService`] exposes the three operations a protocol transport
//! (MCP, HTTP, anything JSON-shaped) wraps: render, validate, and inspect.
//! Every call returns a response value with `success`/`message`/`errors`
//! fields instead of propagating errors across the transport boundary, and
//! error texts are rewritten into natural language a non-expert client can
//! act on.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use isfdoc::IsfDoc;

use crate::cache::Provenance;
use crate::frame::EncodeFormat;
use crate::render::{FrameParams, Renderer};
use crate::value::RawValue;

/// Guard rails applied to incoming requests.
#[derive(Debug, Clone, Copy)]
pub struct ServiceLimits {
    pub max_frames_per_request: usize,
}

impl Default for ServiceLimits {
    fn default() -> Self {
        Self {
            max_frames_per_request: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderShaderRequest {
    pub shader_content: String,
    pub time_codes: Vec<f32>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default)]
    pub inputs: BTreeMap<String, serde_json::Value>,
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_quality() -> u8 {
    95
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderShaderResponse {
    pub success: bool,
    pub message: String,
    /// Base64-encoded PNG, one entry per requested time code.
    #[serde(default)]
    pub rendered_frames: Vec<String>,
    pub metadata: RenderMetadata,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub shader_info: Option<ShaderInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderMetadata {
    pub time_codes: Vec<f32>,
    pub dimensions: String,
    pub quality: u8,
    pub frame_count: usize,
    pub cache_hits: usize,
    pub fallback_frames: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateShaderRequest {
    pub shader_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateShaderResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub shader_info: Option<ShaderInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderInfoRequest {
    pub shader_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderInfoResponse {
    pub success: bool,
    pub message: String,
    pub shader_info: Option<ShaderInfo>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Everything knowable about a shader without rendering it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderInfo {
    pub name: Option<String>,
    pub description: Option<String>,
    pub credit: Option<String>,
    pub categories: Vec<String>,
    pub inputs: Vec<ShaderInputInfo>,
    pub bytes: usize,
    pub lines: usize,
    pub uses_time: bool,
    pub uses_rendersize: bool,
    pub engine_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderInputInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub label: Option<String>,
}

pub struct ShaderService {
    renderer: Renderer,
    limits: ServiceLimits,
}

impl ShaderService {
    pub fn new(renderer: Renderer) -> Self {
        Self::with_limits(renderer, ServiceLimits::default())
    }

    pub fn with_limits(renderer: Renderer, limits: ServiceLimits) -> Self {
        Self { renderer, limits }
    }

    pub fn render_shader(&mut self, request: &RenderShaderRequest) -> RenderShaderResponse {
        let mut metadata = RenderMetadata {
            time_codes: request.time_codes.clone(),
            dimensions: format!("{}x{}", request.width, request.height),
            quality: request.quality,
            ..RenderMetadata::default()
        };

        if request.time_codes.is_empty() {
            return render_failure("no time codes requested", metadata, None);
        }
        if request.time_codes.len() > self.limits.max_frames_per_request {
            let message = format!(
                "request asks for {} frames but at most {} are allowed per call",
                request.time_codes.len(),
                self.limits.max_frames_per_request
            );
            return render_failure(&message, metadata, None);
        }

        let info = self.inspect(&request.shader_content);
        let lint_errors = match IsfDoc::parse(&request.shader_content) {
            Ok(doc) => doc.lint().errors,
            Err(err) => vec![err.to_string()],
        };
        if !lint_errors.is_empty() {
            let mut response = render_failure("Invalid shader content", metadata, info);
            response.errors = lint_errors.iter().map(|e| describe_error(e)).collect();
            return response;
        }

        let params = FrameParams {
            width: request.width,
            height: request.height,
            inputs: request
                .inputs
                .iter()
                .map(|(name, value)| (name.clone(), RawValue::from(value)))
                .collect(),
        };

        let mut rendered_frames = Vec::with_capacity(request.time_codes.len());
        let mut warnings = Vec::new();
        for &time_code in &request.time_codes {
            let rendered = match self.renderer.render_frame(
                &request.shader_content,
                time_code,
                &params,
            ) {
                Ok(rendered) => rendered,
                Err(err) => {
                    let mut response = render_failure(
                        &format!("Error rendering shader: {err}"),
                        metadata.clone(),
                        info.clone(),
                    );
                    response.errors = vec![describe_error(&err.to_string())];
                    return response;
                }
            };

            if rendered.cache_hit {
                metadata.cache_hits += 1;
            }
            if rendered.provenance == Provenance::Fallback {
                metadata.fallback_frames += 1;
            }
            warnings.extend(rendered.warnings.iter().cloned());
            if let Some(err) = &rendered.engine_error {
                warnings.push(describe_error(&err.to_string()));
            }

            match rendered.frame.encode(EncodeFormat::Png) {
                Ok(bytes) => rendered_frames.push(BASE64.encode(bytes)),
                Err(err) => {
                    let mut response = render_failure(
                        &format!("Error encoding frame: {err}"),
                        metadata.clone(),
                        info.clone(),
                    );
                    response.errors = vec![describe_error(&err.to_string())];
                    return response;
                }
            }
        }

        metadata.frame_count = rendered_frames.len();
        warnings.dedup();
        RenderShaderResponse {
            success: true,
            message: format!("Successfully rendered {} frames", rendered_frames.len()),
            rendered_frames,
            metadata,
            warnings,
            errors: Vec::new(),
            shader_info: info,
        }
    }

    pub fn validate_shader(&mut self, request: &ValidateShaderRequest) -> ValidateShaderResponse {
        let report = self.renderer.validate(&request.shader_content);
        ValidateShaderResponse {
            success: report.valid,
            message: "Shader validation completed".to_string(),
            errors: report.errors.iter().map(|e| describe_error(e)).collect(),
            warnings: report.warnings,
            shader_info: self.inspect(&request.shader_content),
        }
    }

    pub fn get_shader_info(&self, request: &ShaderInfoRequest) -> ShaderInfoResponse {
        match IsfDoc::parse(&request.shader_content) {
            Ok(_) => ShaderInfoResponse {
                success: true,
                message: "Shader information extracted successfully".to_string(),
                shader_info: self.inspect(&request.shader_content),
                errors: Vec::new(),
            },
            Err(err) => ShaderInfoResponse {
                success: false,
                message: format!("Error extracting shader info: {err}"),
                shader_info: None,
                errors: vec![describe_error(&err.to_string())],
            },
        }
    }

    /// Read access to the renderer, mostly for cache statistics.
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    fn inspect(&self, source: &str) -> Option<ShaderInfo> {
        let doc = IsfDoc::parse(source).ok()?;
        let summary = doc.summary();
        let meta = doc.metadata();
        Some(ShaderInfo {
            name: meta.and_then(|m| m.name.clone()),
            description: meta.and_then(|m| m.description.clone()),
            credit: meta.and_then(|m| m.credit.clone()),
            categories: meta.map(|m| m.categories.clone()).unwrap_or_default(),
            inputs: meta
                .map(|m| {
                    m.inputs
                        .iter()
                        .map(|input| ShaderInputInfo {
                            name: input.name.clone(),
                            type_name: input.type_name.clone(),
                            label: input.label.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            bytes: summary.bytes,
            lines: summary.lines,
            uses_time: summary.uses_time,
            uses_rendersize: summary.uses_rendersize,
            engine_available: self.renderer.engine_available(),
        })
    }
}

fn render_failure(
    message: &str,
    metadata: RenderMetadata,
    shader_info: Option<ShaderInfo>,
) -> RenderShaderResponse {
    RenderShaderResponse {
        success: false,
        message: message.to_string(),
        rendered_frames: Vec::new(),
        metadata,
        warnings: Vec::new(),
        errors: vec![message.to_string()],
        shader_info,
    }
}

/// Rewrites an error into a natural-language description, pattern-matched
/// on the diagnostic text the way assistant clients expect.
pub fn describe_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("main") && lower.contains("function") {
        return "The shader is missing a main function. ISF shaders require a 'void main()' \
                function to define the fragment shader entry point."
            .to_string();
    }
    if lower.contains("syntax") {
        return format!(
            "The shader contains syntax errors: {error}. Please check the GLSL syntax and ensure \
             all brackets, semicolons, and function calls are properly formatted."
        );
    }
    if lower.contains("uniform") && lower.contains("not found") {
        return format!(
            "The shader references a uniform variable that is not defined: {error}. Make sure \
             all uniform variables are properly declared."
        );
    }
    if lower.contains("texture") && lower.contains("not found") {
        return format!(
            "The shader references a texture that is not available: {error}. Ensure all texture \
             inputs are properly defined in the ISF metadata."
        );
    }
    if lower.contains("compil") {
        return format!(
            "The shader failed to compile: {error}. This usually indicates syntax errors, \
             undefined variables, or unsupported GLSL features."
        );
    }
    if lower.contains("file") && lower.contains("not found") {
        return format!(
            "File not found: {error}. Please check that the file path is correct and the file \
             exists."
        );
    }
    if lower.contains("unavailable") {
        return format!(
            "The rendering engine is not available: {error}. Frames are produced by the \
             placeholder renderer until an engine is attached."
        );
    }
    if lower.contains("memory") {
        return format!(
            "Memory allocation error: {error}. The requested render size may be too large for \
             available system memory."
        );
    }
    format!("An error occurred: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RendererOptions;
    use base64::Engine as _;

    const ANIMATED: &str = r#"/*{
        "DESCRIPTION": "Animated wave",
        "CREDIT": "demo",
        "INPUTS": [{"NAME": "speed", "TYPE": "float"}]
    }*/
    void main() {
        vec2 uv = gl_FragCoord.xy / RENDERSIZE.xy;
        gl_FragColor = vec4(vec3(sin(TIME)), 1.0);
    }"#;

    fn service() -> ShaderService {
        ShaderService::new(Renderer::fallback_only(
            "test environment",
            RendererOptions::default(),
        ))
    }

    fn render_request(time_codes: Vec<f32>) -> RenderShaderRequest {
        RenderShaderRequest {
            shader_content: ANIMATED.to_string(),
            time_codes,
            width: 32,
            height: 32,
            quality: 95,
            inputs: BTreeMap::new(),
        }
    }

    #[test]
    fn renders_frames_as_base64_png() {
        let mut service = service();
        let response = service.render_shader(&render_request(vec![0.0, 0.5]));
        assert!(response.success, "errors: {:?}", response.errors);
        assert_eq!(response.rendered_frames.len(), 2);
        assert_eq!(response.metadata.frame_count, 2);
        assert_eq!(response.metadata.fallback_frames, 2);

        let bytes = BASE64
            .decode(&response.rendered_frames[0])
            .expect("valid base64");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn repeated_time_codes_hit_the_cache() {
        let mut service = service();
        let response = service.render_shader(&render_request(vec![1.0, 1.0]));
        assert!(response.success);
        assert_eq!(response.metadata.cache_hits, 1);
    }

    #[test]
    fn frame_limit_is_enforced() {
        let mut service = service();
        let response = service.render_shader(&render_request((0..11).map(|i| i as f32).collect()));
        assert!(!response.success);
        assert!(response.message.contains("at most 10"));
        assert!(response.rendered_frames.is_empty());
    }

    #[test]
    fn empty_shader_fails_before_rendering() {
        let mut service = service();
        let mut request = render_request(vec![0.0]);
        request.shader_content = "   ".to_string();
        let response = service.render_shader(&request);
        assert!(!response.success);
        assert_eq!(response.message, "Invalid shader content");
    }

    #[test]
    fn validate_reports_structural_warnings() {
        let mut service = service();
        let response = service.validate_shader(&ValidateShaderRequest {
            shader_content: "void main() { gl_FragColor = vec4(1.0); }".to_string(),
        });
        assert!(response.success);
        assert!(response
            .warnings
            .iter()
            .any(|w| w.contains("structural checks only")));
    }

    #[test]
    fn shader_info_includes_declared_inputs() {
        let service = service();
        let response = service.get_shader_info(&ShaderInfoRequest {
            shader_content: ANIMATED.to_string(),
        });
        assert!(response.success);
        let info = response.shader_info.expect("info present");
        assert_eq!(info.description.as_deref(), Some("Animated wave"));
        assert_eq!(info.inputs.len(), 1);
        assert_eq!(info.inputs[0].type_name, "float");
        assert!(info.uses_time);
        assert!(!info.engine_available);
    }

    #[test]
    fn malformed_header_yields_structured_failure() {
        let service = service();
        let response = service.get_shader_info(&ShaderInfoRequest {
            shader_content: "/*{ nope }*/ void main() {}".to_string(),
        });
        assert!(!response.success);
        assert!(!response.errors.is_empty());
    }

    #[test]
    fn describe_error_rewrites_known_patterns() {
        assert!(describe_error("no main function declared").contains("void main()"));
        assert!(describe_error("syntax error near ';'").contains("GLSL syntax"));
        assert!(describe_error("rendering engine unavailable: headless").contains("placeholder"));
        assert!(describe_error("something odd").starts_with("An error occurred"));
    }
}

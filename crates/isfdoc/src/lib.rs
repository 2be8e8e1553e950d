//! ISF document handling: metadata extraction, declared-input discovery, and
//! content fingerprinting.
//!
//! An [`IsfDoc`] owns a shader source and whatever could be learned about it
//! without an engine: the parsed `/*{ ... }*/` JSON header (when present), a
//! content [`Fingerprint`] used as the shader's identity in render caches,
//! and lightweight structural checks ([`IsfDoc::lint`]) for callers that need
//! to vet a shader before handing it to a rendering backend.

mod fingerprint;
mod metadata;

pub use fingerprint::{Fingerprint, FingerprintWriter};
pub use metadata::{InputKind, IsfInput, IsfMetadata};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocError {
    #[error("invalid ISF metadata header: {0}")]
    Header(#[source] serde_json::Error),
}

/// A shader source plus everything derivable from it offline.
#[derive(Debug, Clone)]
pub struct IsfDoc {
    source: String,
    metadata: Option<IsfMetadata>,
    fingerprint: Fingerprint,
}

impl IsfDoc {
    /// Parses a shader source. A missing metadata header is not an error
    /// (plain GLSL fragments are accepted and report no declared inputs); a
    /// header that is present but malformed JSON is.
    pub fn parse(source: &str) -> Result<Self, DocError> {
        let metadata = match extract_header(source) {
            Some(body) => Some(serde_json::from_str(body).map_err(DocError::Header)?),
            None => None,
        };
        Ok(Self {
            source: source.to_string(),
            metadata,
            fingerprint: Fingerprint::of_source(source),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn metadata(&self) -> Option<&IsfMetadata> {
        self.metadata.as_ref()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Declared inputs whose type this workspace can coerce values for.
    /// Inputs with unsupported ISF types (events, audio) are logged and
    /// skipped.
    pub fn declared_inputs(&self) -> impl Iterator<Item = (&str, InputKind)> {
        self.metadata
            .iter()
            .flat_map(|meta| meta.inputs.iter())
            .filter_map(|input| match input.kind() {
                Some(kind) => Some((input.name.as_str(), kind)),
                None => {
                    tracing::warn!(
                        name = %input.name,
                        declared = %input.type_name,
                        "skipping input with unsupported ISF type"
                    );
                    None
                }
            })
    }

    /// Engine-free shader facts used by info reporting.
    pub fn summary(&self) -> DocSummary {
        let upper = self.source.to_uppercase();
        DocSummary {
            bytes: self.source.len(),
            lines: self.source.lines().count(),
            uses_time: upper.contains("TIME"),
            uses_rendersize: upper.contains("RENDERSIZE"),
        }
    }

    /// Structural checks that do not require compiling the shader.
    pub fn lint(&self) -> LintReport {
        let mut report = LintReport::default();
        if self.source.trim().is_empty() {
            report.errors.push("shader source is empty".to_string());
            return report;
        }
        if !self.source.contains("main") {
            report
                .errors
                .push("shader has no main function; ISF fragments must define void main()".to_string());
        }
        let summary = self.summary();
        if !summary.uses_time {
            report
                .warnings
                .push("no TIME uniform referenced; shader may not animate".to_string());
        }
        if !summary.uses_rendersize {
            report
                .warnings
                .push("no RENDERSIZE uniform referenced; shader may not scale with output size".to_string());
        }
        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocSummary {
    pub bytes: usize,
    pub lines: usize,
    pub uses_time: bool,
    pub uses_rendersize: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LintReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Locates the body of the leading `/*{ ... }*/` block, excluding the
/// comment markers themselves.
fn extract_header(source: &str) -> Option<&str> {
    let open = source.find("/*")?;
    let rest = &source[open + 2..];
    let body_end = rest.find("*/")?;
    let body = rest[..body_end].trim();
    if body.starts_with('{') && body.ends_with('}') {
        Some(body)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANIMATED: &str = r#"/*{
    "DESCRIPTION": "Animated wave",
    "CREDIT": "demo",
    "CATEGORIES": ["Animation"],
    "INPUTS": [
        {"NAME": "speed", "TYPE": "float"},
        {"NAME": "tint", "TYPE": "color"}
    ]
}*/

void main() {
    vec2 uv = gl_FragCoord.xy / RENDERSIZE.xy;
    float wave = sin(uv.x * 10.0 + TIME * 2.0) * 0.5 + 0.5;
    gl_FragColor = vec4(vec3(wave), 1.0);
}"#;

    #[test]
    fn parses_header_and_inputs() {
        let doc = IsfDoc::parse(ANIMATED).expect("parse doc");
        let meta = doc.metadata().expect("metadata present");
        assert_eq!(meta.description.as_deref(), Some("Animated wave"));
        assert_eq!(meta.categories, vec!["Animation".to_string()]);
        let inputs: Vec<_> = doc.declared_inputs().collect();
        assert_eq!(
            inputs,
            vec![("speed", InputKind::Float), ("tint", InputKind::Color)]
        );
    }

    #[test]
    fn headerless_glsl_is_accepted() {
        let doc = IsfDoc::parse("void main() { gl_FragColor = vec4(1.0); }").expect("parse doc");
        assert!(doc.metadata().is_none());
        assert_eq!(doc.declared_inputs().count(), 0);
    }

    #[test]
    fn malformed_header_is_rejected() {
        let err = IsfDoc::parse("/*{ not json }*/ void main() {}").unwrap_err();
        assert!(matches!(err, DocError::Header(_)));
    }

    #[test]
    fn summary_reports_uniform_usage() {
        let doc = IsfDoc::parse(ANIMATED).unwrap();
        let summary = doc.summary();
        assert!(summary.uses_time);
        assert!(summary.uses_rendersize);
        assert_eq!(summary.lines, ANIMATED.lines().count());
    }

    #[test]
    fn lint_flags_empty_and_mainless_sources() {
        let empty = IsfDoc::parse("   ").unwrap();
        assert!(!empty.lint().is_clean());

        let mainless = IsfDoc::parse("float f() { return 1.0; }").unwrap();
        let report = mainless.lint();
        assert!(report.errors.iter().any(|e| e.contains("main")));
    }

    #[test]
    fn lint_warns_about_static_shaders() {
        let doc = IsfDoc::parse("void main() { gl_FragColor = vec4(1.0); }").unwrap();
        let report = doc.lint();
        assert!(report.is_clean());
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = IsfDoc::parse(ANIMATED).unwrap();
        let b = IsfDoc::parse(ANIMATED).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}

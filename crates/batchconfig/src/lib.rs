use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer, SeqAccess};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    Missing(PathBuf),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A batch of shader render jobs plus the defaults they fall back to.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub shaders: Vec<ShaderJob>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_max_texture_size")]
    pub max_texture_size: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            quality: default_quality(),
            output_format: OutputFormat::default(),
            max_texture_size: default_max_texture_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One shader to render at a list of time codes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShaderJob {
    /// Path to the ISF shader source.
    pub input: String,
    /// Output path template; `%d`, `%04d`, and `%f` expand per frame.
    pub output: String,
    #[serde(deserialize_with = "deserialize_times")]
    pub times: Vec<f32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub quality: Option<u8>,
    #[serde(default)]
    pub inputs: Option<BTreeMap<String, toml::Value>>,
}

impl ShaderJob {
    pub fn resolved_width(&self, defaults: &Defaults) -> u32 {
        self.width.unwrap_or(defaults.width)
    }

    pub fn resolved_height(&self, defaults: &Defaults) -> u32 {
        self.height.unwrap_or(defaults.height)
    }

    pub fn resolved_quality(&self, defaults: &Defaults) -> u8 {
        self.quality.unwrap_or(defaults.quality)
    }
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

fn default_max_texture_size() -> u32 {
    4096
}

/// Accepts time codes as a numeric array, a range string like `"0-3:0.5"`
/// (also `"0:3:0.5"`), a comma list like `"0,1,2"`, or a single number in a
/// string.
fn deserialize_times<'de, D>(deserializer: D) -> Result<Vec<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Vec<f32>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a list of time codes or a time range string")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            #[derive(Deserialize)]
            #[serde(untagged)]
            enum Code {
                Int(i64),
                Float(f64),
            }

            let mut times = Vec::new();
            while let Some(value) = seq.next_element::<Code>()? {
                times.push(match value {
                    Code::Int(v) => v as f32,
                    Code::Float(v) => v as f32,
                });
            }
            Ok(times)
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_time_range(v).map_err(E::custom)
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![v as f32])
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![v as f32])
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Expands a time range expression into explicit time codes.
///
/// Supported forms: `"0,1,2,3"`, `"0-3:0.5"`, `"0:3:0.5"`, `"1.5"`.
pub fn parse_time_range(raw: &str) -> Result<Vec<f32>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("time range must not be empty".to_string());
    }

    if trimmed.contains(',') {
        return trimmed
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<f32>()
                    .map_err(|_| format!("invalid time code '{}'", part.trim()))
            })
            .collect();
    }

    if let Some((range, step)) = trimmed.rsplit_once(':') {
        let step: f32 = step
            .trim()
            .parse()
            .map_err(|_| format!("invalid step '{}'", step.trim()))?;
        if step <= 0.0 {
            return Err("step must be greater than zero".to_string());
        }
        let (start, end) = range
            .split_once(['-', ':'])
            .ok_or_else(|| format!("invalid time range '{trimmed}'; expected start-end:step"))?;
        let start: f32 = start
            .trim()
            .parse()
            .map_err(|_| format!("invalid range start '{}'", start.trim()))?;
        let end: f32 = end
            .trim()
            .parse()
            .map_err(|_| format!("invalid range end '{}'", end.trim()))?;
        if end < start {
            return Err("range end must not precede range start".to_string());
        }

        let mut times = Vec::new();
        let mut index = 0u32;
        loop {
            let current = start + step * index as f32;
            // Tolerate accumulated float error at the closed upper bound.
            if current > end + step * 1e-4 {
                break;
            }
            times.push(current.min(end));
            index += 1;
        }
        return Ok(times);
    }

    trimmed
        .parse::<f32>()
        .map(|value| vec![value])
        .map_err(|_| format!("invalid time range format: {trimmed}"))
}

impl BatchConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: BatchConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_dimensions("defaults", self.defaults.width, self.defaults.height)?;
        validate_quality("defaults", self.defaults.quality)?;
        if self.defaults.max_texture_size == 0 {
            return Err(ConfigError::Invalid(
                "defaults.max_texture_size must be at least 1".into(),
            ));
        }

        for (index, job) in self.shaders.iter().enumerate() {
            let label = if job.input.trim().is_empty() {
                format!("shader #{index}")
            } else {
                format!("shader '{}'", job.input)
            };

            if job.input.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{label} must name an input shader file"
                )));
            }
            if job.output.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{label} must name an output path"
                )));
            }
            if job.times.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{label} must list at least one time code"
                )));
            }
            if job.times.iter().any(|t| !t.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "{label} contains a non-finite time code"
                )));
            }
            validate_dimensions(&label, job.width.unwrap_or(1), job.height.unwrap_or(1))?;
            if let Some(quality) = job.quality {
                validate_quality(&label, quality)?;
            }
        }

        Ok(())
    }
}

fn validate_dimensions(label: &str, width: u32, height: u32) -> Result<(), ConfigError> {
    if width == 0 || height == 0 {
        return Err(ConfigError::Invalid(format!(
            "{label} dimensions must be at least 1x1"
        )));
    }
    Ok(())
}

fn validate_quality(label: &str, quality: u8) -> Result<(), ConfigError> {
    if !(1..=100).contains(&quality) {
        return Err(ConfigError::Invalid(format!(
            "{label} quality must be between 1 and 100"
        )));
    }
    Ok(())
}

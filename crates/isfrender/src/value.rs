//! Typed shader input values and coercion from loosely structured sources.
//!
//! Configuration files, service requests, and ad-hoc callers all hand us
//! values as whatever their serialization produced: strings, numbers, short
//! arrays. [`coerce`] turns such a [`RawValue`] into the [`TypedValue`] an
//! ISF input declares, with one explicit branch per declared kind; nothing is
//! guessed when a declaration exists. [`infer`] covers inputs a shader never
//! declared, mirroring how values shaped like booleans, numbers, points, or
//! colors are obviously one of those.
//!
//! Coercion is pure: no I/O, no engine access. Image references in
//! particular are accepted as paths without touching the filesystem; a bad
//! path surfaces later as a single engine error.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use isfdoc::{FingerprintWriter, InputKind};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CoerceError {
    #[error("invalid value for input '{name}': {raw} cannot be coerced to {expected}")]
    InvalidInput {
        name: String,
        raw: String,
        expected: InputKind,
    },
    #[error("cannot infer a value kind for input '{name}' from {raw}")]
    UnknownKind { name: String, raw: String },
}

/// A value exactly as it arrived from an external source, before any kind is
/// assigned.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<RawValue>),
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    fn as_f32(&self) -> Option<f32> {
        let value = match self {
            Self::Int(v) => *v as f32,
            Self::Float(v) => *v as f32,
            Self::Text(raw) => raw.trim().parse::<f32>().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&toml::Value> for RawValue {
    fn from(value: &toml::Value) -> Self {
        match value {
            toml::Value::Boolean(v) => Self::Bool(*v),
            toml::Value::Integer(v) => Self::Int(*v),
            toml::Value::Float(v) => Self::Float(*v),
            toml::Value::String(v) => Self::Text(v.clone()),
            toml::Value::Datetime(v) => Self::Text(v.to_string()),
            toml::Value::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            toml::Value::Table(_) => Self::Text(value.to_string()),
        }
    }
}

impl From<&serde_json::Value> for RawValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(v) => Self::Bool(*v),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(v) => Self::Int(v),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(v) => Self::Text(v.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            serde_json::Value::Null | serde_json::Value::Object(_) => Self::Text(value.to_string()),
        }
    }
}

/// A value carrying exactly one ISF kind, ready for the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Point2d { x: f32, y: f32 },
    Color { r: f32, g: f32, b: f32, a: f32 },
    ImageRef(PathBuf),
}

/// Resolved inputs in stable name order, as consumed by the engine seam and
/// cache key derivation.
pub type ResolvedInputs = BTreeMap<String, TypedValue>;

impl TypedValue {
    pub fn kind(&self) -> InputKind {
        match self {
            Self::Bool(_) => InputKind::Bool,
            Self::Int(_) => InputKind::Long,
            Self::Float(_) => InputKind::Float,
            Self::Point2d { .. } => InputKind::Point2d,
            Self::Color { .. } => InputKind::Color,
            Self::ImageRef(_) => InputKind::Image,
        }
    }

    /// Serializes the value back into the raw shape coercion accepts; used
    /// by callers that round-trip inputs through configuration.
    pub fn to_raw(&self) -> RawValue {
        match self {
            Self::Bool(v) => RawValue::Bool(*v),
            Self::Int(v) => RawValue::Int(*v),
            Self::Float(v) => RawValue::Float(f64::from(*v)),
            Self::Point2d { x, y } => RawValue::List(vec![
                RawValue::Float(f64::from(*x)),
                RawValue::Float(f64::from(*y)),
            ]),
            Self::Color { r, g, b, a } => RawValue::List(vec![
                RawValue::Float(f64::from(*r)),
                RawValue::Float(f64::from(*g)),
                RawValue::Float(f64::from(*b)),
                RawValue::Float(f64::from(*a)),
            ]),
            Self::ImageRef(path) => RawValue::Text(path.to_string_lossy().into_owned()),
        }
    }

    /// Feeds the value into a fingerprint with a variant tag so differently
    /// typed values never alias.
    pub(crate) fn write_fingerprint(&self, writer: &mut FingerprintWriter) {
        match self {
            Self::Bool(v) => {
                writer.write_u8(0);
                writer.write_u8(u8::from(*v));
            }
            Self::Int(v) => {
                writer.write_u8(1);
                writer.write_u64(*v as u64);
            }
            Self::Float(v) => {
                writer.write_u8(2);
                writer.write_f32(*v);
            }
            Self::Point2d { x, y } => {
                writer.write_u8(3);
                writer.write_f32(*x);
                writer.write_f32(*y);
            }
            Self::Color { r, g, b, a } => {
                writer.write_u8(4);
                writer.write_f32(*r);
                writer.write_f32(*g);
                writer.write_f32(*b);
                writer.write_f32(*a);
            }
            Self::ImageRef(path) => {
                writer.write_u8(5);
                writer.write_str(&path.to_string_lossy());
            }
        }
    }
}

/// Coerces a raw value into the declared kind, or reports why it cannot be.
pub fn coerce(name: &str, raw: &RawValue, kind: InputKind) -> Result<TypedValue, CoerceError> {
    let invalid = || CoerceError::InvalidInput {
        name: name.to_string(),
        raw: raw.to_string(),
        expected: kind,
    };

    match kind {
        InputKind::Bool => match raw {
            RawValue::Bool(v) => Ok(TypedValue::Bool(*v)),
            RawValue::Text(text) => parse_bool(text).map(TypedValue::Bool).ok_or_else(invalid),
            _ => Err(invalid()),
        },
        InputKind::Long => match raw {
            RawValue::Int(v) => Ok(TypedValue::Int(*v)),
            RawValue::Text(text) => text
                .trim()
                .parse::<i64>()
                .map(TypedValue::Int)
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        InputKind::Float => raw.as_f32().map(TypedValue::Float).ok_or_else(invalid),
        InputKind::Point2d => {
            let components = numeric_components(raw).ok_or_else(invalid)?;
            match components.as_slice() {
                [x, y] => Ok(TypedValue::Point2d { x: *x, y: *y }),
                _ => Err(invalid()),
            }
        }
        InputKind::Color => {
            let components = numeric_components(raw).ok_or_else(invalid)?;
            match components.as_slice() {
                [r, g, b, a] => Ok(TypedValue::Color {
                    r: *r,
                    g: *g,
                    b: *b,
                    a: *a,
                }),
                _ => Err(invalid()),
            }
        }
        InputKind::Image => match raw {
            RawValue::Text(path) if !path.trim().is_empty() => {
                Ok(TypedValue::ImageRef(PathBuf::from(path.trim())))
            }
            _ => Err(invalid()),
        },
    }
}

/// Assigns a kind to a value no shader declaration covers. Shapes that map
/// onto exactly one kind are accepted; everything else is refused rather
/// than guessed.
pub fn infer(name: &str, raw: &RawValue) -> Result<TypedValue, CoerceError> {
    let unknown = || CoerceError::UnknownKind {
        name: name.to_string(),
        raw: raw.to_string(),
    };

    match raw {
        RawValue::Bool(v) => Ok(TypedValue::Bool(*v)),
        RawValue::Int(v) => Ok(TypedValue::Int(*v)),
        RawValue::Float(_) => raw.as_f32().map(TypedValue::Float).ok_or_else(unknown),
        RawValue::List(items) => {
            let components: Option<Vec<f32>> = items.iter().map(RawValue::as_f32).collect();
            match components.as_deref() {
                Some([x, y]) => Ok(TypedValue::Point2d { x: *x, y: *y }),
                Some([r, g, b, a]) => Ok(TypedValue::Color {
                    r: *r,
                    g: *g,
                    b: *b,
                    a: *a,
                }),
                _ => Err(unknown()),
            }
        }
        RawValue::Text(text) => {
            if let Some(v) = parse_bool(text) {
                return Ok(TypedValue::Bool(v));
            }
            if let Ok(v) = text.trim().parse::<i64>() {
                return Ok(TypedValue::Int(v));
            }
            match raw.as_f32() {
                Some(v) => Ok(TypedValue::Float(v)),
                None => Err(unknown()),
            }
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Some(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Extracts the finite numeric components of a sequence, or of a string
/// splitting on commas (preferred) or whitespace.
fn numeric_components(raw: &RawValue) -> Option<Vec<f32>> {
    match raw {
        RawValue::List(items) => items.iter().map(RawValue::as_f32).collect(),
        RawValue::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            let parts: Vec<&str> = if trimmed.contains(',') {
                trimmed.split(',').map(str::trim).collect()
            } else {
                trimmed.split_whitespace().collect()
            };
            parts
                .iter()
                .map(|part| {
                    let value = part.parse::<f32>().ok()?;
                    value.is_finite().then_some(value)
                })
                .collect()
        }
        _ => None,
    }
}

//! Serde model for the JSON metadata block that leads an ISF source.
//!
//! ISF documents open with a `/*{ ... }*/` comment whose body is a JSON
//! object describing the shader and its declared inputs. Only the fields this
//! workspace consumes are modelled; unknown keys are ignored so newer ISF
//! revisions keep parsing.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Value kinds an ISF shader can declare for an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Bool,
    Long,
    Float,
    #[serde(rename = "point2D")]
    Point2d,
    Color,
    Image,
}

impl InputKind {
    /// Maps an ISF `TYPE` string to a kind this workspace can coerce values
    /// for. Returns `None` for declared-but-unsupported kinds such as
    /// `event` or `audioFFT`.
    pub fn from_isf(raw: &str) -> Option<Self> {
        match raw {
            "bool" => Some(Self::Bool),
            "long" => Some(Self::Long),
            "float" => Some(Self::Float),
            "point2D" => Some(Self::Point2d),
            "color" => Some(Self::Color),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Long => "long",
            Self::Float => "float",
            Self::Point2d => "point2D",
            Self::Color => "color",
            Self::Image => "image",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IsfMetadata {
    #[serde(default, rename = "NAME")]
    pub name: Option<String>,
    #[serde(default, rename = "DESCRIPTION")]
    pub description: Option<String>,
    #[serde(default, rename = "CREDIT")]
    pub credit: Option<String>,
    #[serde(
        default,
        rename = "ISFVSN",
        deserialize_with = "deserialize_version_opt"
    )]
    pub isf_version: Option<String>,
    #[serde(default, rename = "CATEGORIES")]
    pub categories: Vec<String>,
    #[serde(default, rename = "INPUTS")]
    pub inputs: Vec<IsfInput>,
}

/// One declared input from the metadata `INPUTS` array.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IsfInput {
    #[serde(rename = "NAME")]
    pub name: String,
    /// Raw `TYPE` string as written in the header.
    #[serde(rename = "TYPE")]
    pub type_name: String,
    #[serde(default, rename = "LABEL")]
    pub label: Option<String>,
    #[serde(default, rename = "DEFAULT")]
    pub default: Option<serde_json::Value>,
}

impl IsfInput {
    /// The coercible kind for this input, if the declared type is supported.
    pub fn kind(&self) -> Option<InputKind> {
        InputKind::from_isf(&self.type_name)
    }
}

// Shaders in the wild write ISFVSN both as a string ("2") and as a number (2).
fn deserialize_version_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("an ISF version as a string or number")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(v.to_string()))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(v.to_string()))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

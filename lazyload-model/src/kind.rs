use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// What a resource is once placed into the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ResourceKind {
    #[default]
    Executable,
    Style,
}

impl ResourceKind {
    /// Classifies a resource by the extension of its resolved uri.
    pub fn from_uri(uri: &str) -> Self {
        let path = uri.split(['?', '#']).next().unwrap_or(uri);
        match path.rsplit_once('.') {
            Some((_, ext)) if ext.eq_ignore_ascii_case("css") => Self::Style,
            _ => Self::Executable,
        }
    }

    /// Style resources are applied by the host as-is and never scanned.
    pub fn is_parseable(self) -> bool {
        matches!(self, Self::Executable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executable => "executable",
            Self::Style => "style",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "executable" | "script" | "js" => Ok(Self::Executable),
            "style" | "css" => Ok(Self::Style),
            other => Err(ModelError::UnknownKind(other.to_string())),
        }
    }
}

/// Destination handed to the placement sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PlacementTarget {
    #[default]
    Head,
    Body,
}

impl PlacementTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for PlacementTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlacementTarget {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "head" => Ok(Self::Head),
            "body" => Ok(Self::Body),
            other => Err(ModelError::UnknownTarget(other.to_string())),
        }
    }
}

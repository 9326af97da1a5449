//! Compiler kinds and their settings records

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::infra::{PortalError, Result};

/// Supported compilers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerKind {
    Func,
    Fift,
    Tact,
    Tolk,
}

impl CompilerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilerKind::Func => "func",
            CompilerKind::Fift => "fift",
            CompilerKind::Tact => "tact",
            CompilerKind::Tolk => "tolk",
        }
    }
}

impl fmt::Display for CompilerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CompilerKind {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "func" => Ok(CompilerKind::Func),
            "fift" => Ok(CompilerKind::Fift),
            "tact" => Ok(CompilerKind::Tact),
            "tolk" => Ok(CompilerKind::Tolk),
            other => Err(PortalError::Decode(format!("unknown compiler: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuncSettings {
    pub func_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_line: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiftSettings {
    pub fift_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_line: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TactSettings {
    pub tact_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TolkSettings {
    pub tolk_version: String,
}

/// Compiler choice together with its compiler-specific settings.
///
/// On the wire the kind and the settings travel as two sibling fields
/// (`compiler`, `compilerSettings`); see [`CompilerSettings::from_parts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerSettings {
    Func(FuncSettings),
    Fift(FiftSettings),
    Tact(TactSettings),
    Tolk(TolkSettings),
}

impl CompilerSettings {
    pub fn kind(&self) -> CompilerKind {
        match self {
            CompilerSettings::Func(_) => CompilerKind::Func,
            CompilerSettings::Fift(_) => CompilerKind::Fift,
            CompilerSettings::Tact(_) => CompilerKind::Tact,
            CompilerSettings::Tolk(_) => CompilerKind::Tolk,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            CompilerSettings::Func(s) => &s.func_version,
            CompilerSettings::Fift(s) => &s.fift_version,
            CompilerSettings::Tact(s) => &s.tact_version,
            CompilerSettings::Tolk(s) => &s.tolk_version,
        }
    }

    /// Command line used by func/fift builds
    pub fn command_line(&self) -> Option<&str> {
        match self {
            CompilerSettings::Func(s) => s.command_line.as_deref(),
            CompilerSettings::Fift(s) => s.command_line.as_deref(),
            _ => None,
        }
    }

    /// Version string as shown to users.
    pub fn display_version(&self) -> String {
        match self {
            CompilerSettings::Tolk(s) => drop_patch_version_zero(&s.tolk_version),
            other => other.version().to_string(),
        }
    }

    /// Release page for the compiler version.
    pub fn version_link(&self) -> String {
        match self {
            CompilerSettings::Func(s) => func_version_link(&s.func_version),
            CompilerSettings::Fift(s) => fift_version_link(&s.fift_version),
            CompilerSettings::Tact(s) => tact_version_link(&s.tact_version),
            CompilerSettings::Tolk(s) => tolk_version_link(&s.tolk_version),
        }
    }

    pub fn from_parts(kind: CompilerKind, settings: serde_json::Value) -> Result<Self> {
        Ok(match kind {
            CompilerKind::Func => CompilerSettings::Func(serde_json::from_value(settings)?),
            CompilerKind::Fift => CompilerSettings::Fift(serde_json::from_value(settings)?),
            CompilerKind::Tact => CompilerSettings::Tact(serde_json::from_value(settings)?),
            CompilerKind::Tolk => CompilerSettings::Tolk(serde_json::from_value(settings)?),
        })
    }

    pub fn settings_json(&self) -> serde_json::Value {
        let value = match self {
            CompilerSettings::Func(s) => serde_json::to_value(s),
            CompilerSettings::Fift(s) => serde_json::to_value(s),
            CompilerSettings::Tact(s) => serde_json::to_value(s),
            CompilerSettings::Tolk(s) => serde_json::to_value(s),
        };
        // plain string records always serialize
        value.unwrap_or(serde_json::Value::Null)
    }
}

/// Compiler versions the verifier backends currently accept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCompilerConfig {
    #[serde(default)]
    pub func_versions: Vec<String>,
    #[serde(default)]
    pub tact_versions: Vec<String>,
    #[serde(default)]
    pub tolk_versions: Vec<String>,
}

impl RemoteCompilerConfig {
    /// Fift ships with the func toolchain and shares its version list.
    pub fn versions_for(&self, kind: CompilerKind) -> &[String] {
        match kind {
            CompilerKind::Func | CompilerKind::Fift => &self.func_versions,
            CompilerKind::Tact => &self.tact_versions,
            CompilerKind::Tolk => &self.tolk_versions,
        }
    }

    pub fn supports(&self, settings: &CompilerSettings) -> bool {
        self.versions_for(settings.kind())
            .iter()
            .any(|v| v == settings.version())
    }
}

pub fn func_version_link(version: &str) -> String {
    format!("https://github.com/ton-blockchain/ton/tree/func-{version}")
}

pub fn fift_version_link(version: &str) -> String {
    format!("https://github.com/ton-blockchain/ton/tree/fift-{version}")
}

pub fn tact_version_link(version: &str) -> String {
    format!("https://github.com/tact-lang/tact/releases/tag/v{version}")
}

pub fn tolk_version_link(version: &str) -> String {
    format!(
        "https://github.com/ton-blockchain/tolk-js/releases/tag/v{}",
        drop_patch_version_zero(version)
    )
}

/// `0.6.0` → `0.6`; anything else is returned unchanged.
pub fn drop_patch_version_zero(version: &str) -> String {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() == 3 && parts[2] == "0" {
        format!("{}.{}", parts[0], parts[1])
    } else {
        version.to_string()
    }
}

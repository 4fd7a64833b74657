//! Build targets, scripting backends and platform-module contributions.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{InvokeError, Result};

/// Player platform a compilation is built for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TargetPlatform {
    StandaloneWindows,
    StandaloneWindows64,
    StandaloneOsx,
    StandaloneLinux64,
    /// Universal Windows store player.
    WsaPlayer,
    Ios,
    Tvos,
    Android,
    WebGl,
}

impl TargetPlatform {
    pub const ALL: [TargetPlatform; 9] = [
        TargetPlatform::StandaloneWindows,
        TargetPlatform::StandaloneWindows64,
        TargetPlatform::StandaloneOsx,
        TargetPlatform::StandaloneLinux64,
        TargetPlatform::WsaPlayer,
        TargetPlatform::Ios,
        TargetPlatform::Tvos,
        TargetPlatform::Android,
        TargetPlatform::WebGl,
    ];

    /// Get the target identifier as a string.
    pub fn name(&self) -> &'static str {
        match self {
            TargetPlatform::StandaloneWindows => "standalone_windows",
            TargetPlatform::StandaloneWindows64 => "standalone_windows64",
            TargetPlatform::StandaloneOsx => "standalone_osx",
            TargetPlatform::StandaloneLinux64 => "standalone_linux64",
            TargetPlatform::WsaPlayer => "wsa_player",
            TargetPlatform::Ios => "ios",
            TargetPlatform::Tvos => "tvos",
            TargetPlatform::Android => "android",
            TargetPlatform::WebGl => "web_gl",
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetPlatform {
    type Err = InvokeError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase();
        TargetPlatform::ALL
            .into_iter()
            .find(|t| t.name() == needle)
            .ok_or_else(|| InvokeError::Config(format!("unknown target platform: {s}")))
    }
}

/// Runtime execution strategy selected for a build target.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScriptingBackend {
    #[default]
    Mono,
    Il2cpp,
    /// Managed interop backend, only valid for [`TargetPlatform::WsaPlayer`].
    WinRtDotNet,
}

impl ScriptingBackend {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptingBackend::Mono => "mono",
            ScriptingBackend::Il2cpp => "il2cpp",
            ScriptingBackend::WinRtDotNet => "win_rt_dot_net",
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            ScriptingBackend::WinRtDotNet => BackendKind::Interop,
            ScriptingBackend::Mono | ScriptingBackend::Il2cpp => BackendKind::Standard,
        }
    }
}

impl fmt::Display for ScriptingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScriptingBackend {
    type Err = InvokeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mono" => Ok(ScriptingBackend::Mono),
            "il2cpp" => Ok(ScriptingBackend::Il2cpp),
            "win_rt_dot_net" | "winrt" => Ok(ScriptingBackend::WinRtDotNet),
            other => Err(InvokeError::Config(format!(
                "unknown scripting backend: {other}"
            ))),
        }
    }
}

/// Coarse backend classification used by the debug/optimize policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Standard,
    Interop,
}

/// Reject backend/target combinations the compiler cannot build.
///
/// Runs before any filesystem or process access.
pub fn validate_backend(target: TargetPlatform, backend: ScriptingBackend) -> Result<()> {
    if backend == ScriptingBackend::WinRtDotNet && target != TargetPlatform::WsaPlayer {
        return Err(InvokeError::InvalidConfiguration(format!(
            "cannot build for the {backend} scripting backend for target {target}"
        )));
    }
    Ok(())
}

/// Files and symbols a platform support module adds to a compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlatformContribution {
    /// Class libraries, only passed to the compiler for the interop backend.
    pub class_libraries: Vec<PathBuf>,
    pub assembly_references: Vec<PathBuf>,
    /// Windows metadata (`.winmd`) references.
    pub metadata_references: Vec<PathBuf>,
    pub defines: BTreeSet<String>,
    pub source_files: Vec<PathBuf>,
}

/// Capability value passed into argument building.
///
/// `None` means no platform module applies; it contributes nothing and is
/// never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PlatformSupport {
    #[default]
    None,
    Module(PlatformContribution),
}

impl PlatformSupport {
    pub fn contribution(&self) -> Option<&PlatformContribution> {
        match self {
            PlatformSupport::None => None,
            PlatformSupport::Module(c) => Some(c),
        }
    }

    /// Class libraries that apply for `target` under `backend`.
    ///
    /// Empty for standard backends. For the interop backend the target must
    /// be the universal Windows player.
    pub fn class_libraries(
        &self,
        target: TargetPlatform,
        backend: ScriptingBackend,
    ) -> Result<&[PathBuf]> {
        if backend.kind() != BackendKind::Interop {
            return Ok(&[]);
        }
        validate_backend(target, backend)?;
        Ok(self
            .contribution()
            .map(|c| c.class_libraries.as_slice())
            .unwrap_or(&[]))
    }
}

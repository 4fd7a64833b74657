//! Invoker configuration: TOML file plus environment overrides.
//!
//! ```toml
//! install_root = "/Applications/Editor.app/Contents"
//! workspace = "/home/dev/Game"
//! response_file_dir = "Temp"
//! cleanup_response_files = true
//!
//! [host]
//! os = "macos"
//! version = "10.13.6"
//!
//! [updater]
//! command = ["/opt/editor/ScriptUpdater", "--auto"]
//! on_failure = "continue"
//!
//! [platforms.wsa_player]
//! lock_file = "UWP/project.lock.json"
//! metadata_references = ["Windows.winmd"]
//! defines = ["NETFX_CORE"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{InvokeError, Result};
use crate::host::{HostInfo, HostOs};
use crate::nuget::resolve_lock_file;
use crate::platform::{
    BackendKind, PlatformContribution, PlatformSupport, ScriptingBackend, TargetPlatform,
};
use crate::response_file::CUSTOM_RESPONSE_FILE;
use crate::updater::{ApiUpdater, CommandUpdater, SkipUpdater, UpdaterFailurePolicy};

pub const ENV_INSTALL_ROOT: &str = "CSC_INVOKE_INSTALL_ROOT";
pub const ENV_WORKSPACE: &str = "CSC_INVOKE_WORKSPACE";
pub const ENV_OS_VERSION: &str = "CSC_INVOKE_OS_VERSION";

/// Default config file name looked up in the working directory.
pub const CONFIG_FILE: &str = "csc-invoke.toml";

/// Host facts that replace detection when set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostOverride {
    pub os: Option<HostOs>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Updater executable and leading arguments. Empty disables the hook.
    pub command: Vec<String>,
    pub on_failure: UpdaterFailurePolicy,
}

/// Platform support module for one target.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlatformModuleConfig {
    /// NuGet lock file supplying class libraries for the interop backend,
    /// relative to the workspace.
    pub lock_file: Option<PathBuf>,
    #[serde(flatten)]
    pub contribution: PlatformContribution,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InvokerConfig {
    /// Contents root of the host application installation.
    pub install_root: PathBuf,
    /// Project directory; the compiler's working directory.
    pub workspace: PathBuf,
    /// Where response files are written. Relative paths resolve against
    /// the workspace.
    pub response_file_dir: PathBuf,
    /// User override file, relative to the workspace.
    pub custom_response_file: PathBuf,
    /// Delete the response file once [`compile`](crate::invoker::CompilerInvoker::compile)
    /// is done with it, or when the compiler fails to start. Off by default;
    /// a running compiler's response file is never deleted by `launch`.
    pub cleanup_response_files: bool,
    pub host: HostOverride,
    pub updater: UpdaterConfig,
    /// Platform modules keyed by target name (e.g. `wsa_player`).
    pub platforms: BTreeMap<String, PlatformModuleConfig>,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            install_root: PathBuf::from("."),
            workspace: PathBuf::from("."),
            response_file_dir: PathBuf::from("Temp"),
            custom_response_file: PathBuf::from(CUSTOM_RESPONSE_FILE),
            cleanup_response_files: false,
            host: HostOverride::default(),
            updater: UpdaterConfig::default(),
            platforms: BTreeMap::new(),
        }
    }
}

impl InvokerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| InvokeError::Config(e.to_string()))
    }

    /// Load a TOML config file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            InvokeError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Ok(Self::from_toml_str(&text)?.with_env_overrides())
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup(ENV_INSTALL_ROOT) {
            self.install_root = PathBuf::from(root);
        }
        if let Some(workspace) = lookup(ENV_WORKSPACE) {
            self.workspace = PathBuf::from(workspace);
        }
        if let Some(version) = lookup(ENV_OS_VERSION) {
            self.host.version = Some(version);
        }
        self
    }

    /// Host facts: overrides first, detection for the rest.
    pub fn host_info(&self) -> HostInfo {
        let os = self.host.os.unwrap_or_else(HostOs::current);
        let version = match (&self.host.version, os) {
            (Some(v), _) => Some(v.clone()),
            (None, os) if os == HostOs::current() => HostInfo::detect().version,
            (None, _) => None,
        };
        HostInfo::new(os, version)
    }

    pub fn response_dir(&self) -> PathBuf {
        self.workspace.join(&self.response_file_dir)
    }

    pub fn custom_response_path(&self) -> PathBuf {
        self.workspace.join(&self.custom_response_file)
    }

    /// Platform support for `target`, with lock-file class libraries
    /// resolved when the backend needs them.
    pub fn platform_support(
        &self,
        target: TargetPlatform,
        backend: ScriptingBackend,
    ) -> Result<PlatformSupport> {
        let Some(module) = self.platforms.get(target.name()) else {
            return Ok(PlatformSupport::None);
        };

        let mut contribution = module.contribution.clone();
        if backend.kind() == BackendKind::Interop {
            if let Some(lock_file) = &module.lock_file {
                let libs = resolve_lock_file(&self.workspace.join(lock_file))?;
                contribution.class_libraries.extend(libs);
            }
        }
        Ok(PlatformSupport::Module(contribution))
    }

    /// Updater described by the config, or [`SkipUpdater`] when none is set.
    pub fn build_updater(&self) -> Result<Arc<dyn ApiUpdater>> {
        if self.updater.command.is_empty() {
            return Ok(Arc::new(SkipUpdater));
        }
        let updater =
            CommandUpdater::new(self.updater.command.clone())?.with_working_dir(&self.workspace);
        Ok(Arc::new(updater))
    }
}

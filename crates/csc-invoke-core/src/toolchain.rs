//! Compiler toolchain selection.
//!
//! Selection happens in two steps: [`ToolchainKind::for_host`] picks the
//! variant from host facts alone, then [`Installation::locate`] resolves the
//! fixed executable paths beneath the host application and checks they exist.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{InvokeError, Result};
use crate::host::{HostInfo, HostOs, OsVersion};
use crate::platform::{validate_backend, ScriptingBackend, TargetPlatform};

/// Oldest secondary-host OS release that runs the modern compiler runtime.
pub const MIN_MODERN_MACOS: OsVersion = OsVersion::new(10, 12, 0);

/// How the compiler is executed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ToolchainKind {
    /// Self-contained cross-platform compiler, executed directly.
    Modern,
    /// Framework-hosted compiler run through the managed-runtime launcher.
    Legacy,
}

impl ToolchainKind {
    /// Pick the toolchain variant for `host`.
    pub fn for_host(host: &HostInfo) -> Self {
        match host.os {
            HostOs::Windows => ToolchainKind::Modern,
            HostOs::MacOs => match host.version.as_deref() {
                None => ToolchainKind::Modern,
                Some(text) => match OsVersion::parse(text) {
                    Some(version) if version >= MIN_MODERN_MACOS => ToolchainKind::Modern,
                    Some(_) => ToolchainKind::Legacy,
                    None => {
                        warn!(version = %text, "Unparseable host OS version, using legacy compiler");
                        ToolchainKind::Legacy
                    }
                },
            },
            HostOs::Linux => ToolchainKind::Legacy,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolchainKind::Modern => "modern",
            ToolchainKind::Legacy => "legacy",
        }
    }
}

impl fmt::Display for ToolchainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Concrete compiler executable plus its execution mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolchainSelection {
    pub kind: ToolchainKind,
    pub executable: PathBuf,
    /// Managed-runtime launcher; present only for [`ToolchainKind::Legacy`].
    pub launcher: Option<PathBuf>,
}

/// Contents root of the host application installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Installation {
    root: PathBuf,
}

impl Installation {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the compiler executable for `kind`, whether or not it exists.
    pub fn compiler_path(&self, kind: ToolchainKind, os: HostOs) -> PathBuf {
        let tools = self.root.join("Tools");
        match (kind, os) {
            (ToolchainKind::Modern, HostOs::Windows) => tools.join("Roslyn").join("csc.exe"),
            (ToolchainKind::Modern, _) => tools.join("Roslyn").join("csc"),
            (ToolchainKind::Legacy, _) => tools.join("RoslynNet46").join("csc.exe"),
        }
    }

    /// Path of the managed-runtime launcher used by the legacy compiler.
    pub fn launcher_path(&self, os: HostOs) -> PathBuf {
        self.root
            .join("MonoBleedingEdge")
            .join("bin")
            .join(format!("mono{}", os.exe_suffix()))
    }

    /// Resolve and verify the executables for `kind`.
    pub fn locate(&self, kind: ToolchainKind, os: HostOs) -> Result<ToolchainSelection> {
        let executable = self.compiler_path(kind, os);
        require_file(&executable)?;

        let launcher = match kind {
            ToolchainKind::Modern => None,
            ToolchainKind::Legacy => {
                let launcher = self.launcher_path(os);
                require_file(&launcher)?;
                Some(launcher)
            }
        };

        Ok(ToolchainSelection {
            kind,
            executable,
            launcher,
        })
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(InvokeError::ToolchainNotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Select the compiler toolchain for a target on the given host.
///
/// Backend/target validation runs before anything touches the filesystem.
pub fn select_toolchain(
    installation: &Installation,
    target: TargetPlatform,
    backend: ScriptingBackend,
    host: &HostInfo,
) -> Result<ToolchainSelection> {
    validate_backend(target, backend)?;
    let kind = ToolchainKind::for_host(host);
    installation.locate(kind, host.os)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(os: HostOs, version: Option<&str>) -> HostInfo {
        HostInfo::new(os, version.map(str::to_string))
    }

    #[test]
    fn test_windows_always_modern() {
        for version in [None, Some("6.1"), Some("garbage"), Some("10.0.19045")] {
            assert_eq!(
                ToolchainKind::for_host(&host(HostOs::Windows, version)),
                ToolchainKind::Modern
            );
        }
    }

    #[test]
    fn test_macos_threshold() {
        let cases = [
            ("Mac OS X 10.11.6", ToolchainKind::Legacy),
            ("10.9", ToolchainKind::Legacy),
            ("10.12", ToolchainKind::Modern),
            ("Mac OS X 10.12.1", ToolchainKind::Modern),
            ("macOS 11.2", ToolchainKind::Modern),
            ("14.0", ToolchainKind::Modern),
        ];
        for (version, expected) in cases {
            assert_eq!(
                ToolchainKind::for_host(&host(HostOs::MacOs, Some(version))),
                expected,
                "version {version}"
            );
        }
    }

    #[test]
    fn test_macos_unknown_version_is_modern() {
        assert_eq!(
            ToolchainKind::for_host(&host(HostOs::MacOs, None)),
            ToolchainKind::Modern
        );
    }

    #[test]
    fn test_macos_unparseable_version_is_legacy() {
        assert_eq!(
            ToolchainKind::for_host(&host(HostOs::MacOs, Some("Mac OS X"))),
            ToolchainKind::Legacy
        );
    }

    #[test]
    fn test_linux_is_legacy() {
        assert_eq!(
            ToolchainKind::for_host(&host(HostOs::Linux, Some("6.1"))),
            ToolchainKind::Legacy
        );
    }

    #[test]
    fn test_compiler_paths() {
        let install = Installation::new("/opt/editor");
        assert_eq!(
            install.compiler_path(ToolchainKind::Modern, HostOs::Windows),
            Path::new("/opt/editor/Tools/Roslyn/csc.exe")
        );
        assert_eq!(
            install.compiler_path(ToolchainKind::Modern, HostOs::MacOs),
            Path::new("/opt/editor/Tools/Roslyn/csc")
        );
        assert_eq!(
            install.compiler_path(ToolchainKind::Legacy, HostOs::Linux),
            Path::new("/opt/editor/Tools/RoslynNet46/csc.exe")
        );
        assert_eq!(
            install.launcher_path(HostOs::Windows),
            Path::new("/opt/editor/MonoBleedingEdge/bin/mono.exe")
        );
    }

    #[test]
    fn test_locate_missing_compiler_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let install = Installation::new(dir.path());
        let err = install
            .locate(ToolchainKind::Modern, HostOs::MacOs)
            .unwrap_err();
        match err {
            InvokeError::ToolchainNotFound { path } => {
                assert_eq!(path, dir.path().join("Tools").join("Roslyn").join("csc"));
            }
            other => panic!("expected ToolchainNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_locate_legacy_requires_launcher() {
        let dir = tempfile::tempdir().unwrap();
        let install = Installation::new(dir.path());
        let csc = install.compiler_path(ToolchainKind::Legacy, HostOs::Linux);
        std::fs::create_dir_all(csc.parent().unwrap()).unwrap();
        std::fs::write(&csc, b"").unwrap();

        let err = install
            .locate(ToolchainKind::Legacy, HostOs::Linux)
            .unwrap_err();
        match err {
            InvokeError::ToolchainNotFound { path } => {
                assert_eq!(path, install.launcher_path(HostOs::Linux));
            }
            other => panic!("expected ToolchainNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_select_rejects_interop_backend_before_filesystem() {
        let install = Installation::new("/definitely/not/an/installation");
        let err = select_toolchain(
            &install,
            TargetPlatform::Android,
            ScriptingBackend::WinRtDotNet,
            &host(HostOs::Windows, None),
        )
        .unwrap_err();
        assert!(matches!(err, InvokeError::InvalidConfiguration(_)));
    }
}

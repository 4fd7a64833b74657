//! Compiler invocation: request in, running process out.
//!
//! One invocation runs strictly in sequence: select toolchain, build
//! arguments, write the response file, run the API updater, spawn. The
//! invoker keeps no state between invocations, so concurrent invocations
//! only share the filesystem, and every one gets its own response file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::process::Command;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::arguments::{build_arguments, ArgumentSet};
use crate::config::InvokerConfig;
use crate::error::{InvokeError, Result};
use crate::host::HostInfo;
use crate::obs::{
    emit_compiler_exited, emit_compiler_started, emit_response_file_retained,
    emit_response_file_written,
    emit_toolchain_selected, emit_updater_finished, emit_updater_ignored_failure,
    invocation_span,
};
use crate::platform::validate_backend;
use crate::process::{CompilerOutput, ProcessHandle};
use crate::request::CompileRequest;
use crate::response_file::{read_custom_response_file, ResponseFile};
use crate::toolchain::{select_toolchain, Installation, ToolchainKind, ToolchainSelection};
use crate::updater::{ApiUpdater, UpdaterFailurePolicy};

/// Lets the modern compiler reuse a resident server process across builds.
pub const SHARED_COMPILATION_FLAG: &str = "/shared";

/// Where and how a launch touches the filesystem.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Working directory of the compiler.
    pub workspace: PathBuf,
    /// Directory receiving the response file.
    pub response_dir: PathBuf,
    /// Optional user override whose lines are appended to the arguments.
    pub custom_response_file: Option<PathBuf>,
    pub updater_policy: UpdaterFailurePolicy,
    /// Remove the response file when the compiler fails to start.
    pub cleanup_response_file: bool,
}

/// Program and arguments for the compiler process.
pub fn command_line(
    toolchain: &ToolchainSelection,
    arguments: &ArgumentSet,
    response_file: &ResponseFile,
) -> (PathBuf, Vec<OsString>) {
    let mut args: Vec<OsString> = Vec::new();
    let program = match (toolchain.kind, &toolchain.launcher) {
        (ToolchainKind::Legacy, Some(launcher)) => {
            args.push(toolchain.executable.clone().into_os_string());
            args.extend(arguments.prefix().iter().map(OsString::from));
            launcher.clone()
        }
        _ => {
            args.extend(arguments.prefix().iter().map(OsString::from));
            args.push(OsString::from(SHARED_COMPILATION_FLAG));
            toolchain.executable.clone()
        }
    };
    args.push(OsString::from(response_file.argument()));
    (program, args)
}

/// Write the response file, run the updater and start the compiler.
pub async fn launch(
    arguments: &ArgumentSet,
    toolchain: &ToolchainSelection,
    options: &LaunchOptions,
    updater: &dyn ApiUpdater,
) -> Result<ProcessHandle> {
    let arguments = match &options.custom_response_file {
        Some(path) => match read_custom_response_file(path)? {
            Some(lines) => {
                debug!(path = %path.display(), lines = lines.len(), "Appending custom response file");
                arguments.with_appended(lines)
            }
            None => arguments.clone(),
        },
        None => arguments.clone(),
    };

    let response_dir = std::path::absolute(&options.response_dir)?;
    let response_file = ResponseFile::write(&response_dir, &arguments)?;
    emit_response_file_written(response_file.path(), arguments.len(), &arguments.digest());

    let spawned = async {
        match updater.update(response_file.path()).await {
            Ok(outcome) => emit_updater_finished(updater.name(), outcome),
            Err(e) => match options.updater_policy {
                UpdaterFailurePolicy::Abort => return Err(e),
                UpdaterFailurePolicy::Continue => {
                    emit_updater_ignored_failure(updater.name(), &e)
                }
            },
        }

        let (program, args) = command_line(toolchain, &arguments, &response_file);
        let mut command = Command::new(program);
        command.args(args).current_dir(&options.workspace);
        ProcessHandle::spawn(command, response_file.clone())
    }
    .await;

    match spawned {
        Ok(handle) => {
            emit_compiler_started(handle.id(), handle.response_file().path());
            Ok(handle)
        }
        Err(e) => {
            discard_response_file(&response_file, options.cleanup_response_file);
            Err(e)
        }
    }
}

/// Dispose of a response file whose compiler never started.
fn discard_response_file(response_file: &ResponseFile, cleanup: bool) {
    if !cleanup {
        emit_response_file_retained(response_file.path());
        return;
    }
    if let Err(e) = response_file.remove() {
        warn!(path = %response_file.path().display(), error = %e, "Failed to remove response file");
    }
}

/// A started invocation.
#[derive(Debug)]
pub struct Launched {
    pub invocation_id: String,
    pub toolchain: ToolchainSelection,
    /// Generated arguments, before any custom response-file lines.
    pub arguments: ArgumentSet,
    pub handle: ProcessHandle,
}

/// Translates compile requests into running compiler processes.
pub struct CompilerInvoker {
    installation: Installation,
    host: HostInfo,
    config: InvokerConfig,
    updater: Arc<dyn ApiUpdater>,
}

impl CompilerInvoker {
    /// Create an invoker. Relative install and workspace paths are resolved
    /// against the current directory.
    pub fn new(config: InvokerConfig, updater: Arc<dyn ApiUpdater>) -> Result<Self> {
        let mut config = config;
        config.install_root = std::path::absolute(&config.install_root)?;
        config.workspace = std::path::absolute(&config.workspace)?;
        let host = config.host_info();
        Ok(Self {
            installation: Installation::new(&config.install_root),
            host,
            config,
            updater,
        })
    }

    /// Create an invoker whose updater is described by the config.
    pub fn from_config(config: InvokerConfig) -> Result<Self> {
        let updater = config.build_updater()?;
        Self::new(config, updater)
    }

    pub fn with_host(mut self, host: HostInfo) -> Self {
        self.host = host;
        self
    }

    pub fn host(&self) -> &HostInfo {
        &self.host
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    pub fn select_toolchain(&self, request: &CompileRequest) -> Result<ToolchainSelection> {
        select_toolchain(
            &self.installation,
            request.target(),
            request.backend(),
            &self.host,
        )
    }

    pub fn build_arguments(&self, request: &CompileRequest) -> Result<ArgumentSet> {
        validate_backend(request.target(), request.backend())?;
        let platform = self
            .config
            .platform_support(request.target(), request.backend())?;
        build_arguments(request, &platform, self.host.os)
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            workspace: self.config.workspace.clone(),
            response_dir: self.config.response_dir(),
            custom_response_file: Some(self.config.custom_response_path()),
            updater_policy: self.config.updater.on_failure,
            cleanup_response_file: self.config.cleanup_response_files,
        }
    }

    /// Start the compiler for `request` and return without waiting.
    pub async fn launch(&self, request: &CompileRequest) -> Result<Launched> {
        let invocation_id = Uuid::new_v4().to_string();
        let span = invocation_span(&invocation_id);

        async {
            let toolchain = self.select_toolchain(request)?;
            emit_toolchain_selected(&toolchain);

            let arguments = self.build_arguments(request)?;
            let handle = launch(
                &arguments,
                &toolchain,
                &self.launch_options(),
                self.updater.as_ref(),
            )
            .await?;

            Ok::<_, InvokeError>(Launched {
                invocation_id: invocation_id.clone(),
                toolchain,
                arguments,
                handle,
            })
        }
        .instrument(span)
        .await
    }

    /// Launch, wait for exit and collect output.
    ///
    /// Removes the response file afterwards, whether or not waiting succeeded,
    /// only when the config asks for it.
    pub async fn compile(&self, request: &CompileRequest) -> Result<CompilerOutput> {
        let launched = self.launch(request).await?;
        let span = invocation_span(&launched.invocation_id);
        let response_file = launched.handle.response_file().clone();

        async move {
            let waited = launched.handle.wait().await;
            let removed = if self.config.cleanup_response_files {
                response_file.remove()
            } else {
                Ok(())
            };
            let output = waited?;
            removed?;
            emit_compiler_exited(output.exit_code, output.duration_ms, output.stdout_lines.len());
            Ok::<_, InvokeError>(output)
        }
        .instrument(span)
        .await
    }

    pub fn installation_root(&self) -> &Path {
        self.installation.root()
    }
}

impl std::fmt::Debug for CompilerInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerInvoker")
            .field("installation", &self.installation)
            .field("host", &self.host)
            .field("updater", &self.updater.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostOs;
    use crate::platform::{ScriptingBackend, TargetPlatform};
    use crate::updater::SkipUpdater;

    fn args() -> ArgumentSet {
        let req = CompileRequest::builder("out.dll", TargetPlatform::StandaloneOsx)
            .source("A.cs")
            .build();
        build_arguments(&req, &crate::platform::PlatformSupport::None, HostOs::MacOs).unwrap()
    }

    #[test]
    fn test_command_line_modern() {
        let dir = tempfile::tempdir().unwrap();
        let rsp = ResponseFile::write(dir.path(), &args()).unwrap();
        let toolchain = ToolchainSelection {
            kind: ToolchainKind::Modern,
            executable: PathBuf::from("/editor/Tools/Roslyn/csc"),
            launcher: None,
        };

        let (program, argv) = command_line(&toolchain, &args(), &rsp);
        assert_eq!(program, PathBuf::from("/editor/Tools/Roslyn/csc"));
        assert_eq!(
            argv,
            vec![
                OsString::from("/noconfig"),
                OsString::from("/shared"),
                OsString::from(rsp.argument()),
            ]
        );
    }

    #[test]
    fn test_command_line_legacy_runs_through_launcher() {
        let dir = tempfile::tempdir().unwrap();
        let rsp = ResponseFile::write(dir.path(), &args()).unwrap();
        let toolchain = ToolchainSelection {
            kind: ToolchainKind::Legacy,
            executable: PathBuf::from("/editor/Tools/RoslynNet46/csc.exe"),
            launcher: Some(PathBuf::from("/editor/MonoBleedingEdge/bin/mono")),
        };

        let (program, argv) = command_line(&toolchain, &args(), &rsp);
        assert_eq!(program, PathBuf::from("/editor/MonoBleedingEdge/bin/mono"));
        assert_eq!(
            argv,
            vec![
                OsString::from("/editor/Tools/RoslynNet46/csc.exe"),
                OsString::from("/noconfig"),
                OsString::from(rsp.argument()),
            ]
        );
    }

    #[tokio::test]
    async fn test_launch_rejects_backend_mismatch_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let config = InvokerConfig {
            install_root: dir.path().join("missing-install"),
            workspace: dir.path().to_path_buf(),
            ..Default::default()
        };
        let invoker = CompilerInvoker::new(config, Arc::new(SkipUpdater))
            .unwrap()
            .with_host(HostInfo::new(HostOs::Windows, None));

        let req = CompileRequest::builder("out.dll", TargetPlatform::StandaloneWindows64)
            .backend(ScriptingBackend::WinRtDotNet)
            .build();
        let err = invoker.launch(&req).await.unwrap_err();
        assert!(matches!(err, InvokeError::InvalidConfiguration(_)));
        assert!(!dir.path().join("Temp").exists());
    }

    #[tokio::test]
    async fn test_launch_missing_toolchain_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = InvokerConfig {
            install_root: dir.path().join("install"),
            workspace: dir.path().to_path_buf(),
            ..Default::default()
        };
        let invoker = CompilerInvoker::new(config, Arc::new(SkipUpdater))
            .unwrap()
            .with_host(HostInfo::new(HostOs::MacOs, Some("10.15".into())));

        let req = CompileRequest::builder("out.dll", TargetPlatform::StandaloneOsx).build();
        match invoker.launch(&req).await.unwrap_err() {
            InvokeError::ToolchainNotFound { path } => {
                assert_eq!(path, dir.path().join("install/Tools/Roslyn/csc"));
            }
            other => panic!("expected ToolchainNotFound, got {:?}", other),
        }
        assert!(!dir.path().join("Temp").exists());
    }
}

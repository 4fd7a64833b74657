//! Structured observability hooks for the invocation lifecycle.
//!
//! This module provides:
//! - An invocation-scoped tracing span via [`invocation_span`]
//! - Emission functions for each lifecycle step: toolchain selection,
//!   response file, updater, compiler start and exit
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).

use std::path::Path;

use tracing::{info, warn};

use crate::toolchain::ToolchainSelection;
use crate::updater::UpdaterOutcome;

/// Span tagging everything logged during one invocation.
///
/// Attach with `tracing::Instrument` so the invocation future stays `Send`.
///
/// # Example
///
/// ```ignore
/// async { /* ... */ }.instrument(invocation_span("3f0c..."))
/// ```
pub fn invocation_span(invocation_id: &str) -> tracing::Span {
    tracing::info_span!("csc.invocation", invocation_id = %invocation_id)
}

pub fn emit_toolchain_selected(selection: &ToolchainSelection) {
    info!(
        event = "toolchain.selected",
        kind = %selection.kind,
        executable = %selection.executable.display(),
        launcher = ?selection.launcher,
    );
}

pub fn emit_response_file_written(path: &Path, argument_count: usize, digest: &str) {
    info!(
        event = "response_file.written",
        path = %path.display(),
        argument_count = argument_count,
        digest = %digest,
    );
}

/// Emit event: a response file outlived a failed launch and stays on disk.
pub fn emit_response_file_retained(path: &Path) {
    warn!(
        event = "response_file.retained",
        path = %path.display(),
        "Compiler did not start; response file left for inspection"
    );
}

/// Emit event: updater finished, or failed under the continue policy.
pub fn emit_updater_finished(updater: &str, outcome: UpdaterOutcome) {
    info!(event = "updater.finished", updater = %updater, outcome = ?outcome);
}

pub fn emit_updater_ignored_failure(updater: &str, error: &dyn std::fmt::Display) {
    warn!(event = "updater.failed", updater = %updater, error = %error, "Continuing compilation");
}

pub fn emit_compiler_started(pid: Option<u32>, response_file: &Path) {
    info!(
        event = "compiler.started",
        pid = ?pid,
        response_file = %response_file.display(),
    );
}

/// Emit event: compiler exited with the given code.
pub fn emit_compiler_exited(exit_code: i32, duration_ms: u64, stdout_lines: usize) {
    info!(
        event = "compiler.exited",
        exit_code = exit_code,
        duration_ms = duration_ms,
        stdout_lines = stdout_lines,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::ToolchainKind;
    use std::path::PathBuf;

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        let _span = invocation_span("test-invocation").entered();
        emit_toolchain_selected(&ToolchainSelection {
            kind: ToolchainKind::Modern,
            executable: PathBuf::from("csc"),
            launcher: None,
        });
        emit_response_file_written(Path::new("a.rsp"), 3, "abc");
        emit_response_file_retained(Path::new("a.rsp"));
        emit_updater_finished("skip", UpdaterOutcome::Skipped);
        emit_updater_ignored_failure("updater", &"boom");
        emit_compiler_started(Some(42), Path::new("a.rsp"));
        emit_compiler_exited(0, 10, 2);
    }
}

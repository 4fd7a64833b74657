//! Running compiler processes and their captured output.
//!
//! The diagnostic stream is the compiler's stdout, read line by line in
//! order. stderr is captured on a separate task and only surfaces in the
//! final [`CompilerOutput`]; it is never interleaved with stdout lines.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, Split};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{InvokeError, Result};
use crate::response_file::ResponseFile;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Outcome of a finished compiler process.
///
/// A non-zero exit code is data for the caller's diagnostic layer, not an
/// error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompilerOutput {
    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Whether the process exited successfully.
    pub success: bool,

    /// Every stdout line, in order, including lines already streamed.
    pub stdout_lines: Vec<String>,

    /// Captured stderr.
    pub stderr: String,

    /// Wall-clock time from spawn to exit, in milliseconds.
    pub duration_ms: u64,

    pub started_at: DateTime<Utc>,

    /// Response file the compiler read its arguments from.
    pub response_file: PathBuf,
}

impl CompilerOutput {
    /// Whether the compiler passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

/// Handle to a running compiler.
pub struct ProcessHandle {
    child: Child,
    stdout: Option<Split<BufReader<ChildStdout>>>,
    stderr: Option<JoinHandle<std::io::Result<String>>>,
    lines: Vec<String>,
    response_file: ResponseFile,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl ProcessHandle {
    /// Spawn `command` with piped output and no console window.
    pub(crate) fn spawn(mut command: Command, response_file: ResponseFile) -> Result<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        hide_window(&mut command);

        let started_at = Utc::now();
        let started = Instant::now();
        let mut child = command.spawn()?;

        let stdout = child
            .stdout
            .take()
            .map(|out| BufReader::new(out).split(b'\n'));
        let stderr = child.stderr.take().map(|mut err| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                err.read_to_end(&mut buf).await?;
                Ok(String::from_utf8_lossy(&buf).into_owned())
            })
        });

        Ok(Self {
            child,
            stdout,
            stderr,
            lines: Vec::new(),
            response_file,
            started,
            started_at,
        })
    }

    /// OS process id, while the process is running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn response_file(&self) -> &ResponseFile {
        &self.response_file
    }

    /// Next stdout line, or `None` at end of stream.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let Some(reader) = self.stdout.as_mut() else {
            return Ok(None);
        };
        match reader.next_segment().await? {
            Some(bytes) => {
                let line = String::from_utf8_lossy(&bytes)
                    .trim_end_matches('\r')
                    .to_string();
                self.lines.push(line.clone());
                Ok(Some(line))
            }
            None => {
                self.stdout = None;
                Ok(None)
            }
        }
    }

    /// Stdout as an ordered stream of lines. Ends after the first error.
    pub fn lines(&mut self) -> impl Stream<Item = Result<String>> + '_ {
        stream::unfold(Some(self), |state| async move {
            let handle = state?;
            match handle.next_line().await {
                Ok(Some(line)) => Some((Ok(line), Some(handle))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Terminate the compiler.
    pub async fn kill(&mut self) -> Result<()> {
        self.child.kill().await?;
        Ok(())
    }

    /// Drain remaining output and wait for exit.
    pub async fn wait(mut self) -> Result<CompilerOutput> {
        while self.next_line().await?.is_some() {}

        let status = self.child.wait().await?;
        let duration_ms = self.started.elapsed().as_millis() as u64;

        let stderr = match self.stderr.take() {
            Some(task) => task
                .await
                .map_err(|e| InvokeError::Io(std::io::Error::other(e)))??,
            None => String::new(),
        };
        if !stderr.is_empty() {
            debug!(stderr = %stderr.trim_end(), "Compiler stderr");
        }

        Ok(CompilerOutput {
            exit_code: status.code().unwrap_or(-1),
            success: status.success(),
            stdout_lines: self.lines,
            stderr,
            duration_ms,
            started_at: self.started_at,
            response_file: self.response_file.path().to_path_buf(),
        })
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.child.id())
            .field("response_file", &self.response_file)
            .field("lines_read", &self.lines.len())
            .finish()
    }
}

#[cfg(windows)]
fn hide_window(command: &mut Command) {
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_window(_command: &mut Command) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn rsp(dir: &std::path::Path) -> ResponseFile {
        let args = crate::arguments::build_arguments(
            &crate::request::CompileRequest::builder(
                "out.dll",
                crate::platform::TargetPlatform::StandaloneLinux64,
            )
            .build(),
            &crate::platform::PlatformSupport::None,
            crate::host::HostOs::Linux,
        )
        .unwrap();
        ResponseFile::write(dir, &args).unwrap()
    }

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn test_wait_collects_stdout_and_stderr_separately() {
        let dir = tempfile::tempdir().unwrap();
        let handle = ProcessHandle::spawn(
            sh("echo one; echo oops >&2; printf 'two\\r\\n'"),
            rsp(dir.path()),
        )
        .unwrap();

        let out = handle.wait().await.unwrap();
        assert!(out.passed());
        assert_eq!(out.stdout_lines, vec!["one", "two"]);
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_streamed_lines_kept_in_final_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle =
            ProcessHandle::spawn(sh("echo a; echo b; echo c"), rsp(dir.path())).unwrap();

        assert_eq!(handle.next_line().await.unwrap().as_deref(), Some("a"));
        let out = handle.wait().await.unwrap();
        assert_eq!(out.stdout_lines, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_line_stream_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle =
            ProcessHandle::spawn(sh("for i in 1 2 3 4 5; do echo $i; done"), rsp(dir.path()))
                .unwrap();

        let lines: Vec<String> = handle
            .lines()
            .map(|l| l.unwrap())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(lines, vec!["1", "2", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_data() {
        let dir = tempfile::tempdir().unwrap();
        let handle = ProcessHandle::spawn(sh("echo error CS0103; exit 1"), rsp(dir.path())).unwrap();

        let out = handle.wait().await.unwrap();
        assert!(!out.passed());
        assert_eq!(out.exit_code, 1);
        assert_eq!(out.stdout_lines, vec!["error CS0103"]);
    }

    #[tokio::test]
    async fn test_kill() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = ProcessHandle::spawn(sh("exec sleep 30"), rsp(dir.path())).unwrap();
        assert!(handle.id().is_some());

        handle.kill().await.unwrap();
        let out = handle.wait().await.unwrap();
        assert!(!out.success);
    }
}

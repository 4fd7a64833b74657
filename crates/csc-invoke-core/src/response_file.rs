//! Response files: argument lists handed to the compiler via `@path`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::Builder;

use crate::arguments::ArgumentSet;
use crate::error::{InvokeError, Result};

/// Default location of the user-supplied override file, relative to the workspace.
pub const CUSTOM_RESPONSE_FILE: &str = "Assets/csc.rsp";

/// A response file written for one invocation.
///
/// Not removed on drop; the caller decides when the artifact goes away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFile {
    path: PathBuf,
}

impl ResponseFile {
    /// Write `args` into a new, uniquely named file inside `dir`.
    ///
    /// Creates `dir` if needed. Names never collide between invocations,
    /// including invocations running in parallel.
    pub fn write(dir: &Path, args: &ArgumentSet) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut file = Builder::new()
            .prefix("csc-")
            .suffix(".rsp")
            .tempfile_in(dir)?;
        file.write_all(args.response_file_body().as_bytes())?;
        file.flush()?;

        let (_, path) = file.keep().map_err(|e| InvokeError::Io(e.error))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `@path` token that points the compiler at this file.
    pub fn argument(&self) -> String {
        format!("@{}", self.path.display())
    }

    /// Delete the file. Missing files are not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read the user override file, if present.
///
/// Returns each non-blank line verbatim, minus trailing line endings.
pub fn read_custom_response_file(path: &Path) -> Result<Option<Vec<String>>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let lines = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();
    Ok(Some(lines))
}

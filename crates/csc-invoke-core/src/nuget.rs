//! Class-library resolution from a NuGet `project.lock.json`.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{InvokeError, Result};

/// Placeholder asset NuGet uses for "no compile-time assets".
const EMPTY_ASSET: &str = "_._";

/// Resolve the compile-time assemblies listed in a lock file.
///
/// Takes the first target section, every `package` entry in it and every
/// `compile` asset other than the `_._` placeholder, in file order. Assets
/// are rooted at the first `packageFolders` entry as written (NuGet lists
/// the user package folder before any fallback folders), falling back to
/// `~/.nuget/packages`.
pub fn resolve_lock_file(path: &Path) -> Result<Vec<PathBuf>> {
    let text = std::fs::read_to_string(path).map_err(|e| lock_error(path, e))?;
    let lock: Value = serde_json::from_str(&text).map_err(|e| lock_error(path, e))?;

    let package_root = match lock
        .get("packageFolders")
        .and_then(Value::as_object)
        .and_then(|folders| folders.keys().next())
    {
        Some(folder) => PathBuf::from(folder),
        None => default_package_root().ok_or_else(|| {
            lock_error(path, "no packageFolders entry and no home directory")
        })?,
    };

    let target = lock
        .get("targets")
        .and_then(Value::as_object)
        .and_then(|targets| targets.values().next())
        .and_then(Value::as_object)
        .ok_or_else(|| lock_error(path, "lock file has no targets"))?;

    let mut libraries = Vec::new();
    for (package, entry) in target {
        if entry.get("type").and_then(Value::as_str) != Some("package") {
            continue;
        }
        let Some((name, version)) = package.split_once('/') else {
            return Err(lock_error(path, format!("malformed package key: {package}")));
        };
        let Some(compile) = entry.get("compile").and_then(Value::as_object) else {
            continue;
        };
        let package_dir = package_root.join(name.to_lowercase()).join(version);
        for asset in compile.keys() {
            if asset.ends_with(EMPTY_ASSET) {
                continue;
            }
            libraries.push(package_dir.join(asset));
        }
    }

    debug!(lock_file = %path.display(), count = libraries.len(), "Resolved class libraries");
    Ok(libraries)
}

fn default_package_root() -> Option<PathBuf> {
    std::env::var_os("NUGET_PACKAGES")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("USERPROFILE")
                .or_else(|| std::env::var_os("HOME"))
                .map(|home| PathBuf::from(home).join(".nuget").join("packages"))
        })
}

fn lock_error(path: &Path, reason: impl std::fmt::Display) -> InvokeError {
    InvokeError::LockFile {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

//! Host operating system identification.

use std::cmp::Ordering;
use std::fmt;
use std::process::Command;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InvokeError;

/// Operating system the editor host runs on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HostOs {
    /// Primary desktop host.
    Windows,
    /// Secondary desktop host.
    #[serde(rename = "macos")]
    MacOs,
    Linux,
}

impl HostOs {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            HostOs::Windows
        } else if cfg!(target_os = "macos") {
            HostOs::MacOs
        } else {
            HostOs::Linux
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HostOs::Windows => "windows",
            HostOs::MacOs => "macos",
            HostOs::Linux => "linux",
        }
    }

    /// Path separator the compiler expects in source-file arguments.
    pub fn path_separator(&self) -> char {
        match self {
            HostOs::Windows => '\\',
            HostOs::MacOs | HostOs::Linux => '/',
        }
    }

    /// File name suffix for native executables.
    pub fn exe_suffix(&self) -> &'static str {
        match self {
            HostOs::Windows => ".exe",
            HostOs::MacOs | HostOs::Linux => "",
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HostOs {
    type Err = InvokeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "windows" | "win" => Ok(HostOs::Windows),
            "macos" | "osx" | "mac" => Ok(HostOs::MacOs),
            "linux" => Ok(HostOs::Linux),
            other => Err(InvokeError::Config(format!("unknown host os: {other}"))),
        }
    }
}

static VERSION_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").ok());

/// Numeric OS version, compared component-wise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl OsVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the first `major.minor[.patch]` run in free-form OS text.
    ///
    /// Accepts `10.12`, `10.11.6`, `Mac OS X 10.11.6` and `macOS 13.2.1`.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = VERSION_PATTERN.as_ref()?.captures(text)?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let minor = caps.get(2)?.as_str().parse().ok()?;
        let patch = match caps.get(3) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        Some(Self::new(major, minor, patch))
    }
}

impl PartialOrd for OsVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OsVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Host OS plus the version text reported by the system, when known.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostInfo {
    pub os: HostOs,
    pub version: Option<String>,
}

impl HostInfo {
    pub fn new(os: HostOs, version: Option<String>) -> Self {
        Self { os, version }
    }

    /// Identify the running host.
    ///
    /// The version is only probed on macOS, where toolchain selection
    /// depends on it.
    pub fn detect() -> Self {
        let os = HostOs::current();
        let version = match os {
            HostOs::MacOs => probe_macos_version(),
            HostOs::Windows | HostOs::Linux => None,
        };
        debug!(host_os = %os, version = ?version, "Detected host");
        Self { os, version }
    }

    pub fn parsed_version(&self) -> Option<OsVersion> {
        self.version.as_deref().and_then(OsVersion::parse)
    }
}

fn probe_macos_version() -> Option<String> {
    let output = Command::new("sw_vers")
        .arg("-productVersion")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_versions() {
        assert_eq!(OsVersion::parse("10.12"), Some(OsVersion::new(10, 12, 0)));
        assert_eq!(OsVersion::parse("10.11.6"), Some(OsVersion::new(10, 11, 6)));
    }

    #[test]
    fn test_parse_versions_embedded_in_os_text() {
        assert_eq!(
            OsVersion::parse("Mac OS X 10.11.6"),
            Some(OsVersion::new(10, 11, 6))
        );
        assert_eq!(
            OsVersion::parse("macOS 13.2.1 (22D68)"),
            Some(OsVersion::new(13, 2, 1))
        );
    }

    #[test]
    fn test_parse_rejects_text_without_version() {
        assert_eq!(OsVersion::parse("Mac OS X"), None);
        assert_eq!(OsVersion::parse(""), None);
        assert_eq!(OsVersion::parse("13"), None);
    }

    #[test]
    fn test_version_ordering_is_numeric() {
        assert!(OsVersion::new(10, 12, 0) > OsVersion::new(10, 11, 6));
        assert!(OsVersion::new(10, 9, 0) < OsVersion::new(10, 12, 0));
        assert!(OsVersion::new(11, 0, 0) > OsVersion::new(10, 15, 7));
    }

    #[test]
    fn test_host_os_from_str() {
        assert_eq!("Windows".parse::<HostOs>().unwrap(), HostOs::Windows);
        assert_eq!("osx".parse::<HostOs>().unwrap(), HostOs::MacOs);
        assert_eq!("linux".parse::<HostOs>().unwrap(), HostOs::Linux);
        assert!("beos".parse::<HostOs>().is_err());
    }

    #[test]
    fn test_path_separators() {
        assert_eq!(HostOs::Windows.path_separator(), '\\');
        assert_eq!(HostOs::MacOs.path_separator(), '/');
        assert_eq!(HostOs::Linux.path_separator(), '/');
    }

    #[test]
    fn test_detect_matches_compile_target() {
        let host = HostInfo::detect();
        assert_eq!(host.os, HostOs::current());
    }
}

//! Debug-information and optimization policy.
//!
//! A fixed 2×2 table indexed by (development mode × backend kind). Each cell
//! is reachable and testable on its own; nothing here is inferred.

use crate::platform::BackendKind;

/// Debug information format passed via `/debug:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugFormat {
    Portable,
    Full,
}

impl DebugFormat {
    pub fn flag(&self) -> &'static str {
        match self {
            DebugFormat::Portable => "/debug:portable",
            DebugFormat::Full => "/debug:full",
        }
    }
}

/// One cell of the policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugPolicy {
    pub debug: DebugFormat,
    pub optimize: bool,
}

impl DebugPolicy {
    pub fn optimize_flag(&self) -> &'static str {
        if self.optimize {
            "/optimize+"
        } else {
            "/optimize-"
        }
    }

    /// Debug flag followed by optimize flag.
    pub fn flags(&self) -> [&'static str; 2] {
        [self.debug.flag(), self.optimize_flag()]
    }
}

const fn cell(debug: DebugFormat, optimize: bool) -> DebugPolicy {
    DebugPolicy { debug, optimize }
}

/// Rows: release, development. Columns: standard, interop.
const POLICY_TABLE: [[DebugPolicy; 2]; 2] = [
    [
        cell(DebugFormat::Portable, true),
        cell(DebugFormat::Full, true),
    ],
    [
        cell(DebugFormat::Portable, false),
        cell(DebugFormat::Full, false),
    ],
];

/// Look up the policy cell for a build.
pub fn debug_policy(development: bool, backend: BackendKind) -> DebugPolicy {
    let row = usize::from(development);
    let col = match backend {
        BackendKind::Standard => 0,
        BackendKind::Interop => 1,
    };
    POLICY_TABLE[row][col]
}

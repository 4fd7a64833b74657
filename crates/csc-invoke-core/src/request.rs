//! Compile request: everything a single compiler invocation needs to know.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::platform::{ScriptingBackend, TargetPlatform};

/// Immutable description of one assembly compilation.
///
/// `sources` and `references` keep their input order. `defines` has set
/// semantics and is kept sorted so equal sets serialize identically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompileRequest {
    sources: Vec<PathBuf>,
    #[serde(default)]
    references: Vec<PathBuf>,
    #[serde(default)]
    defines: BTreeSet<String>,
    output: PathBuf,
    #[serde(default)]
    allow_unsafe: bool,
    #[serde(default)]
    development: bool,
    target: TargetPlatform,
    #[serde(default)]
    backend: ScriptingBackend,
}

impl CompileRequest {
    pub fn builder(output: impl Into<PathBuf>, target: TargetPlatform) -> CompileRequestBuilder {
        CompileRequestBuilder::new(output, target)
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn references(&self) -> &[PathBuf] {
        &self.references
    }

    pub fn defines(&self) -> &BTreeSet<String> {
        &self.defines
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn allow_unsafe(&self) -> bool {
        self.allow_unsafe
    }

    pub fn development(&self) -> bool {
        self.development
    }

    pub fn target(&self) -> TargetPlatform {
        self.target
    }

    pub fn backend(&self) -> ScriptingBackend {
        self.backend
    }
}

/// Fluent constructor for [`CompileRequest`].
#[derive(Debug, Clone)]
pub struct CompileRequestBuilder {
    request: CompileRequest,
}

impl CompileRequestBuilder {
    pub fn new(output: impl Into<PathBuf>, target: TargetPlatform) -> Self {
        Self {
            request: CompileRequest {
                sources: Vec::new(),
                references: Vec::new(),
                defines: BTreeSet::new(),
                output: output.into(),
                allow_unsafe: false,
                development: false,
                target,
                backend: ScriptingBackend::default(),
            },
        }
    }

    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.request.sources.push(path.into());
        self
    }

    pub fn sources<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.request.sources.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.request.references.push(path.into());
        self
    }

    pub fn references<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.request
            .references
            .extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn define(mut self, symbol: impl Into<String>) -> Self {
        self.request.defines.insert(symbol.into());
        self
    }

    pub fn defines<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request
            .defines
            .extend(symbols.into_iter().map(Into::into));
        self
    }

    pub fn allow_unsafe(mut self, allow: bool) -> Self {
        self.request.allow_unsafe = allow;
        self
    }

    pub fn development(mut self, development: bool) -> Self {
        self.request.development = development;
        self
    }

    pub fn backend(mut self, backend: ScriptingBackend) -> Self {
        self.request.backend = backend;
        self
    }

    pub fn build(self) -> CompileRequest {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_source_order() {
        let req = CompileRequest::builder("out.dll", TargetPlatform::StandaloneOsx)
            .source("b.cs")
            .source("a.cs")
            .sources(["c.cs", "a.cs"])
            .build();
        let names: Vec<_> = req.sources().iter().map(|p| p.to_str().unwrap()).collect();
        assert_eq!(names, vec!["b.cs", "a.cs", "c.cs", "a.cs"]);
    }

    #[test]
    fn test_builder_deduplicates_defines() {
        let req = CompileRequest::builder("out.dll", TargetPlatform::StandaloneOsx)
            .defines(["DEBUG", "TRACE", "DEBUG"])
            .define("TRACE")
            .build();
        assert_eq!(req.defines().len(), 2);
    }

    #[test]
    fn test_defaults() {
        let req = CompileRequest::builder("out.dll", TargetPlatform::Android).build();
        assert!(!req.allow_unsafe());
        assert!(!req.development());
        assert_eq!(req.backend(), ScriptingBackend::Mono);
        assert_eq!(req.output(), Path::new("out.dll"));
    }

    #[test]
    fn test_deserialize_with_duplicate_defines() {
        let json = r#"{
            "sources": ["Assets/A.cs", "Assets/B.cs"],
            "defines": ["UNITY", "UNITY", "DEBUG"],
            "output": "Library/Assembly.dll",
            "target": "wsa_player",
            "backend": "win_rt_dot_net",
            "development": true
        }"#;
        let req: CompileRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.defines().len(), 2);
        assert_eq!(req.target(), TargetPlatform::WsaPlayer);
        assert_eq!(req.backend(), ScriptingBackend::WinRtDotNet);
        assert!(req.development());
        assert!(req.references().is_empty());
    }
}

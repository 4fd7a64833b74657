//! Deterministic compiler argument assembly.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::host::HostOs;
use crate::platform::PlatformSupport;
use crate::policy::debug_policy;
use crate::request::CompileRequest;

/// Disables the compiler's implicit default response file. Command line only.
pub const NO_CONFIG_FLAG: &str = "/noconfig";

const GLOBAL_SWITCHES: [&str; 3] = ["/nostdlib+", "/preferreduilang:en-US", "/langversion:latest"];

/// Ordered compiler tokens for one invocation.
///
/// `prefix` tokens go on the command line; `arguments` form the response-file
/// body. Order within `arguments` is: global switches, references, defines,
/// source files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArgumentSet {
    prefix: Vec<String>,
    arguments: Vec<String>,
}

impl ArgumentSet {
    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Copy of this set with `extra` appended after the generated arguments.
    pub fn with_appended<I, S>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        next.arguments.extend(extra.into_iter().map(Into::into));
        next
    }

    /// Response-file body: one argument per line.
    pub fn response_file_body(&self) -> String {
        let mut body = String::new();
        for arg in &self.arguments {
            body.push_str(arg);
            body.push('\n');
        }
        body
    }

    /// SHA-256 hex digest over prefix and arguments, in order.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for token in self.prefix.iter().chain(self.arguments.iter()) {
            hasher.update(token.as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}

/// Build the argument set for `request`.
///
/// Pure: identical inputs always produce identical output.
pub fn build_arguments(
    request: &CompileRequest,
    platform: &PlatformSupport,
    host: HostOs,
) -> Result<ArgumentSet> {
    let mut args = vec![
        "/target:library".to_string(),
        "/nowarn:0169".to_string(),
        format!("/out:{}", quote_path(request.output())),
    ];

    if request.allow_unsafe() {
        args.push("/unsafe".to_string());
    }

    let policy = debug_policy(request.development(), request.backend().kind());
    args.extend(policy.flags().iter().map(|f| f.to_string()));
    args.extend(GLOBAL_SWITCHES.iter().map(|f| f.to_string()));

    let contribution = platform.contribution();
    let class_libraries = platform.class_libraries(request.target(), request.backend())?;

    // References
    let platform_refs = contribution
        .map(|c| {
            c.assembly_references
                .iter()
                .chain(c.metadata_references.iter())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    for reference in class_libraries
        .iter()
        .chain(platform_refs)
        .chain(request.references().iter())
    {
        args.push(format!("/reference:{}", quote_path(reference)));
    }

    // Defines
    let mut defines: BTreeSet<&str> = request.defines().iter().map(String::as_str).collect();
    if let Some(c) = contribution {
        defines.extend(c.defines.iter().map(String::as_str));
    }
    args.extend(defines.into_iter().map(|d| format!("/define:{d}")));

    // Sources
    let extra_sources = contribution
        .map(|c| c.source_files.as_slice())
        .unwrap_or(&[]);
    for source in extra_sources.iter().chain(request.sources().iter()) {
        args.push(quote_arg(&normalize_separators(
            &source.to_string_lossy(),
            host,
        )));
    }

    Ok(ArgumentSet {
        prefix: vec![NO_CONFIG_FLAG.to_string()],
        arguments: args,
    })
}

/// Rewrite path separators to the form the host's compiler expects.
pub fn normalize_separators(path: &str, host: HostOs) -> String {
    match host.path_separator() {
        '\\' => path.replace('/', "\\"),
        _ => path.replace('\\', "/"),
    }
}

fn quote_path(path: &Path) -> String {
    quote_arg(&path.to_string_lossy())
}

/// Quote a token for the compiler's response-file tokenizer.
///
/// Tokens with whitespace or double quotes are wrapped in double quotes with
/// embedded quotes escaped. An empty token becomes `""`.
pub fn quote_arg(token: &str) -> String {
    if token.is_empty() {
        return "\"\"".to_string();
    }
    if !token.chars().any(|c| c.is_whitespace() || c == '"') {
        return token.to_string();
    }
    format!("\"{}\"", token.replace('"', "\\\""))
}

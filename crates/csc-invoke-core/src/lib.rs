//! csc-invoke core library
//!
//! Turns a compile request into a running C# compiler process: selects the
//! toolchain for the host, builds a deterministic argument list, writes it to
//! a response file, runs the API updater hook and spawns the compiler.

pub mod arguments;
pub mod config;
pub mod error;
pub mod host;
pub mod invoker;
pub mod nuget;
pub mod obs;
pub mod platform;
pub mod policy;
pub mod process;
pub mod request;
pub mod response_file;
pub mod telemetry;
pub mod toolchain;
pub mod updater;

pub use arguments::{build_arguments, normalize_separators, quote_arg, ArgumentSet, NO_CONFIG_FLAG};
pub use config::{HostOverride, InvokerConfig, PlatformModuleConfig, UpdaterConfig, CONFIG_FILE};
pub use error::{InvokeError, Result};
pub use host::{HostInfo, HostOs, OsVersion};
pub use invoker::{command_line, launch, CompilerInvoker, LaunchOptions, Launched};
pub use nuget::resolve_lock_file;
pub use platform::{
    validate_backend, BackendKind, PlatformContribution, PlatformSupport, ScriptingBackend,
    TargetPlatform,
};
pub use policy::{debug_policy, DebugFormat, DebugPolicy};
pub use process::{CompilerOutput, ProcessHandle};
pub use request::{CompileRequest, CompileRequestBuilder};
pub use response_file::{read_custom_response_file, ResponseFile, CUSTOM_RESPONSE_FILE};
pub use telemetry::init_tracing;
pub use toolchain::{select_toolchain, Installation, ToolchainKind, ToolchainSelection};
pub use updater::{ApiUpdater, CommandUpdater, SkipUpdater, UpdaterFailurePolicy, UpdaterOutcome};

/// Crate version, reported by `csc-invoke --version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

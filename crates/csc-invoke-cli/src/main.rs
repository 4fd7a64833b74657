//! csc-invoke - run the external C# compiler for a compile request
//!
//! ## Commands
//!
//! - `compile`: Build arguments, launch the compiler and stream its output
//! - `args`: Print the arguments a request would produce
//! - `toolchain`: Show which compiler a target/host combination selects
//! - `host`: Show the detected host

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use csc_invoke_core::{
    CompileRequest, CompilerInvoker, HostInfo, HostOs, InvokerConfig, ScriptingBackend,
    TargetPlatform, CONFIG_FILE,
};

#[derive(Parser)]
#[command(name = "csc-invoke")]
#[command(author = "Stevedores Org")]
#[command(version = csc_invoke_core::VERSION)]
#[command(about = "Invoke the C# compiler with a deterministic response file", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and JSON command output
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ./csc-invoke.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a request and stream compiler output to stdout
    Compile {
        /// Compile request file (JSON or TOML)
        #[arg(short, long)]
        request: PathBuf,

        /// Delete the response file after the compiler exits
        #[arg(long)]
        cleanup_response_file: bool,
    },

    /// Print the compiler arguments for a request without running it
    Args {
        /// Compile request file (JSON or TOML)
        #[arg(short, long)]
        request: PathBuf,
    },

    /// Show the toolchain selected for a target on a host
    Toolchain {
        /// Build target (e.g. standalone_osx, wsa_player)
        #[arg(short, long)]
        target: TargetPlatform,

        /// Scripting backend
        #[arg(short, long, default_value = "mono")]
        backend: ScriptingBackend,

        /// Host OS (default: detected)
        #[arg(long)]
        host_os: Option<HostOs>,

        /// Host OS version (default: detected)
        #[arg(long)]
        os_version: Option<String>,
    },

    /// Show the detected host
    Host,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    csc_invoke_core::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Compile {
            request,
            cleanup_response_file,
        } => cmd_compile(config, &request, cleanup_response_file).await,
        Commands::Args { request } => {
            cmd_args(config, &request, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Toolchain {
            target,
            backend,
            host_os,
            os_version,
        } => {
            cmd_toolchain(config, target, backend, host_os, os_version, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Host => {
            cmd_host(&config, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Explicit config path, else `csc-invoke.toml` in the working directory,
/// else defaults. Environment overrides apply in every case.
fn load_config(path: Option<&Path>) -> Result<InvokerConfig> {
    if let Some(path) = path {
        return InvokerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    let default = Path::new(CONFIG_FILE);
    if default.is_file() {
        return InvokerConfig::load(default)
            .with_context(|| format!("Failed to load config {}", default.display()));
    }
    Ok(InvokerConfig::default().with_env_overrides())
}

/// Read a compile request; `.toml` files are TOML, everything else JSON.
fn load_request(path: &Path) -> Result<CompileRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request {}", path.display()))?;
    let request = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&text)
            .with_context(|| format!("Invalid TOML request {}", path.display()))?,
        _ => serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON request {}", path.display()))?,
    };
    Ok(request)
}

fn print_output<T: Serialize>(value: &T, json: bool, plain: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        plain(value);
    }
    Ok(())
}

async fn cmd_compile(
    mut config: InvokerConfig,
    request_path: &Path,
    cleanup_response_file: bool,
) -> Result<ExitCode> {
    let request = load_request(request_path)?;
    config.cleanup_response_files |= cleanup_response_file;
    let cleanup = config.cleanup_response_files;

    let invoker = CompilerInvoker::from_config(config).context("Failed to set up compiler invoker")?;
    let mut launched = invoker
        .launch(&request)
        .await
        .context("Failed to launch compiler")?;

    while let Some(line) = launched.handle.next_line().await? {
        println!("{line}");
    }

    let response_file = launched.handle.response_file().clone();
    let waited = launched.handle.wait().await;
    let removed = if cleanup {
        response_file.remove()
    } else {
        Ok(())
    };
    let output = waited.context("Failed waiting for compiler")?;
    removed.context("Failed to remove response file")?;

    if !output.stderr.is_empty() {
        eprintln!("{}", output.stderr.trim_end());
    }
    info!(
        exit_code = output.exit_code,
        duration_ms = output.duration_ms,
        toolchain = %launched.toolchain.kind,
        "Compilation {}",
        if output.passed() { "succeeded" } else { "failed" }
    );

    Ok(ExitCode::from(exit_status(output.exit_code)))
}

/// Compiler exit code as a process exit status. Codes outside 0..=255
/// (signals, Windows NTSTATUS values) become 1.
fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

#[derive(Serialize)]
struct ArgsReport {
    prefix: Vec<String>,
    arguments: Vec<String>,
    digest: String,
}

fn cmd_args(config: InvokerConfig, request_path: &Path, json: bool) -> Result<()> {
    let request = load_request(request_path)?;
    let invoker = CompilerInvoker::from_config(config)?;
    let args = invoker
        .build_arguments(&request)
        .context("Failed to build compiler arguments")?;

    let report = ArgsReport {
        prefix: args.prefix().to_vec(),
        arguments: args.arguments().to_vec(),
        digest: args.digest(),
    };
    print_output(&report, json, |r| {
        println!("# command line: {}", r.prefix.join(" "));
        println!("# digest: {}", r.digest);
        for arg in &r.arguments {
            println!("{arg}");
        }
    })
}

fn cmd_toolchain(
    config: InvokerConfig,
    target: TargetPlatform,
    backend: ScriptingBackend,
    host_os: Option<HostOs>,
    os_version: Option<String>,
    json: bool,
) -> Result<()> {
    let mut invoker = CompilerInvoker::from_config(config)?;
    if host_os.is_some() || os_version.is_some() {
        let detected = invoker.host().clone();
        let os = host_os.unwrap_or(detected.os);
        let version = os_version.or(if os == detected.os {
            detected.version
        } else {
            None
        });
        invoker = invoker.with_host(HostInfo::new(os, version));
    }

    let request = CompileRequest::builder("out.dll", target)
        .backend(backend)
        .build();
    let selection = invoker
        .select_toolchain(&request)
        .context("Toolchain selection failed")?;

    print_output(&selection, json, |s| {
        println!("Kind:       {}", s.kind);
        println!("Executable: {}", s.executable.display());
        if let Some(launcher) = &s.launcher {
            println!("Launcher:   {}", launcher.display());
        }
    })
}

fn cmd_host(config: &InvokerConfig, json: bool) -> Result<()> {
    let host = config.host_info();
    print_output(&host, json, |h| {
        println!("OS:      {}", h.os);
        println!("Version: {}", h.version.as_deref().unwrap_or("unknown"));
        match h.parsed_version() {
            Some(v) => println!("Parsed:  {v}"),
            None => println!("Parsed:  -"),
        }
    })
}

//! Log setup for the csc-invoke binary.
//!
//! Stdout belongs to the compiler: `csc-invoke compile` forwards each
//! diagnostic line there in order, and callers parse it as the compiler's
//! own output. Every log line therefore goes to stderr, whatever the format.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `level` when set. With `json`, each event is one
/// JSON object per line, which keeps the `csc.invocation` span fields
/// (`invocation_id`) attached to compiler lifecycle events. A second call
/// leaves the first subscriber in place.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let json_layer = json.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
    });
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .ok();
}

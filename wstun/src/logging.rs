//! Tracing setup (§10): an `EnvFilter` wrapped in a `reload::Layer` so the
//! level can be changed at runtime, plus a JSON/human formatter toggle. A
//! process-wide `OnceLock` holds the reload closure so anything in the
//! binary can retarget the filter later without re-initializing the whole
//! subscriber.

use std::sync::OnceLock;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter};

type LogReloader = Box<dyn Fn(&str) + Send + Sync>;

static LOG_RELOADER: OnceLock<LogReloader> = OnceLock::new();

/// Initializes the global tracing subscriber. Must be called exactly once,
/// before any other `tracing` call — both the `server` and `client`
/// subcommands call this immediately after parsing their args.
pub fn init(log_level: &str, log_json: bool) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, reload_handle) = reload::Layer::new(filter);

    let _ = LOG_RELOADER.set(Box::new(move |level: &str| {
        if let Ok(new_filter) = EnvFilter::try_new(level) {
            let _ = reload_handle.modify(|f| *f = new_filter);
        }
    }));

    if log_json {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Retargets the log level without restarting the process. Nothing in this
/// binary calls this yet — it exists so a future SIGHUP/admin-API handler
/// has a reload point to call into.
#[allow(dead_code)]
pub fn set_level(level: &str) {
    if let Some(reloader) = LOG_RELOADER.get() {
        reloader(level);
    }
}

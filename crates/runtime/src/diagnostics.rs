//! Logging setup and on-demand diagnostics
//!
//! The runtime logs through `tracing`. Nothing is printed unless a
//! subscriber is installed; `init_logging` installs a stderr subscriber
//! whose filter comes from `SN_LOG` (same syntax as `RUST_LOG`):
//!
//! ```bash
//! SN_LOG=debug ./program              # arena lifecycle, file tracking
//! SN_LOG=sn_core=trace ./program      # every block and array growth
//! ```
//!
//! Generated code calls `rt_runtime_init`, which calls `init_logging`.
//! Embedders that already own a subscriber simply never call it.

use sn_core::memory_snapshot;
use std::fmt::Write as _;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "SN_LOG";

/// Filter used when `SN_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "warn";

static LOGGING_INIT: Once = Once::new();

/// Install the stderr subscriber
///
/// Safe to call multiple times (idempotent). If another global subscriber
/// is already installed, that one is kept.
pub fn init_logging() {
    LOGGING_INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init();
    });
}

/// Current memory counters, one per line
pub fn format_diagnostics() -> String {
    let snap = memory_snapshot();
    let mut out = String::new();
    let _ = writeln!(out, "=== Sindarin Runtime Diagnostics ===");
    let _ = writeln!(
        out,
        "Arenas: {} live ({} created, {} destroyed)",
        snap.live_arenas(),
        snap.arenas_created,
        snap.arenas_destroyed
    );
    let _ = writeln!(out, "Bytes handed out: {}", snap.bytes_allocated);
    let _ = writeln!(
        out,
        "Block bytes: {} reserved, {} peak",
        snap.reserved_bytes, snap.peak_reserved_bytes
    );
    let _ = writeln!(
        out,
        "Files: {} tracked, {} closed by arena teardown",
        snap.files_tracked, snap.files_auto_closed
    );
    out
}

/// Dump diagnostics to stderr
pub fn dump_diagnostics() {
    eprint!("{}", format_diagnostics());
}

/// Dump diagnostics to stderr (callable from generated code)
#[unsafe(no_mangle)]
pub extern "C" fn rt_dump_diagnostics() {
    dump_diagnostics();
}

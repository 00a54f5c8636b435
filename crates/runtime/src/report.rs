//! At-exit report for compiled Sindarin programs
//!
//! Dumps memory KPIs when the program finishes, controlled by `SN_REPORT`:
//! - Unset or `0` → no report, zero cost
//! - `1` → human-readable to stderr
//! - `json` → JSON to stderr
//! - `json:/path` → JSON to file
//!
//! ## Feature Flag
//!
//! JSON output needs the `report-json` feature (enabled by default). Without
//! it, JSON requests fall back to the human format.

use sn_core::{MemorySnapshot, memory_snapshot};
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

/// Environment variable selecting the report
pub const REPORT_ENV: &str = "SN_REPORT";

// =============================================================================
// Report Configuration (parsed from SN_REPORT env var)
// =============================================================================

/// Output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportFormat {
    Human,
    Json,
}

/// Output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDestination {
    Stderr,
    File(String),
}

/// Parsed report configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub format: ReportFormat,
    pub destination: ReportDestination,
}

impl ReportConfig {
    /// Parse from the SN_REPORT environment variable
    pub fn from_env() -> Option<Self> {
        let val = std::env::var(REPORT_ENV).ok()?;
        let config = Self::parse(&val);
        if config.is_none() && !val.is_empty() && val != "0" {
            tracing::warn!(value = %val, "SN_REPORT not recognized, ignoring");
        }
        config
    }

    /// Parse a setting; `None` means "no report"
    pub fn parse(val: &str) -> Option<Self> {
        match val {
            "" | "0" => None,
            "1" => Some(ReportConfig {
                format: ReportFormat::Human,
                destination: ReportDestination::Stderr,
            }),
            "json" => Some(ReportConfig {
                format: ReportFormat::Json,
                destination: ReportDestination::Stderr,
            }),
            s => {
                let path = s.strip_prefix("json:")?;
                if path.is_empty() {
                    return None;
                }
                Some(ReportConfig {
                    format: ReportFormat::Json,
                    destination: ReportDestination::File(path.to_string()),
                })
            }
        }
    }
}

static REPORT_CONFIG: OnceLock<Option<ReportConfig>> = OnceLock::new();

fn get_report_config() -> &'static Option<ReportConfig> {
    REPORT_CONFIG.get_or_init(ReportConfig::from_env)
}

static START: OnceLock<Instant> = OnceLock::new();

/// Start the wall clock the report measures against
pub(crate) fn mark_start() {
    START.get_or_init(Instant::now);
}

// =============================================================================
// Report Data
// =============================================================================

/// Collected metrics for the report
#[derive(Debug)]
pub struct ReportData {
    pub wall_clock_ms: u64,
    pub memory: MemorySnapshot,
}

fn collect_report_data() -> ReportData {
    let wall_clock_ms = START
        .get()
        .map(|start| start.elapsed().as_millis() as u64)
        .unwrap_or(0);

    ReportData {
        wall_clock_ms,
        memory: memory_snapshot(),
    }
}

// =============================================================================
// Formatting
// =============================================================================

fn format_human(data: &ReportData) -> String {
    let m = &data.memory;
    let mut out = String::new();
    out.push_str("=== SN REPORT ===\n");
    out.push_str(&format!("Wall clock:       {} ms\n", data.wall_clock_ms));
    out.push_str(&format!("Arenas created:   {}\n", m.arenas_created));
    out.push_str(&format!("Arenas destroyed: {}\n", m.arenas_destroyed));
    out.push_str(&format!("Arenas live:      {}\n", m.live_arenas()));
    out.push_str(&format!("Bytes allocated:  {}\n", m.bytes_allocated));
    out.push_str(&format!("Blocks reserved:  {} bytes\n", m.reserved_bytes));
    out.push_str(&format!(
        "Blocks peak:      {} bytes\n",
        m.peak_reserved_bytes
    ));
    out.push_str(&format!("Files tracked:    {}\n", m.files_tracked));
    out.push_str(&format!("Files auto-closed: {}\n", m.files_auto_closed));
    out.push_str("=================\n");
    out
}

#[cfg(feature = "report-json")]
fn format_json(data: &ReportData) -> String {
    let m = &data.memory;
    let fields = [
        ("wall_clock_ms", data.wall_clock_ms),
        ("arenas_created", m.arenas_created),
        ("arenas_destroyed", m.arenas_destroyed),
        ("arenas_live", m.live_arenas()),
        ("bytes_allocated", m.bytes_allocated),
        ("reserved_bytes", m.reserved_bytes),
        ("peak_reserved_bytes", m.peak_reserved_bytes),
        ("files_tracked", m.files_tracked),
        ("files_auto_closed", m.files_auto_closed),
    ];

    let mut map = serde_json::Map::new();
    for (key, value) in fields {
        map.insert(key.into(), serde_json::Value::Number(value.into()));
    }

    let obj = serde_json::Value::Object(map);
    serde_json::to_string(&obj).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(not(feature = "report-json"))]
fn format_json(data: &ReportData) -> String {
    tracing::warn!("SN_REPORT=json requires the 'report-json' feature, using human format");
    format_human(data)
}

fn render(config: &ReportConfig, data: &ReportData) -> String {
    match config.format {
        ReportFormat::Human => format_human(data),
        ReportFormat::Json => format_json(data),
    }
}

// =============================================================================
// Emit
// =============================================================================

fn write_report(config: &ReportConfig, output: &str) {
    match &config.destination {
        ReportDestination::Stderr => {
            let _ = std::io::stderr().write_all(output.as_bytes());
        }
        ReportDestination::File(path) => {
            if let Ok(mut f) = std::fs::File::create(path) {
                let _ = f.write_all(output.as_bytes());
            } else {
                tracing::warn!(path = %path, "could not write report, using stderr");
                let _ = std::io::stderr().write_all(output.as_bytes());
            }
        }
    }
}

/// Write the report if `SN_REPORT` asks for one
pub fn emit_report() {
    let Some(config) = get_report_config() else {
        return;
    };
    let data = collect_report_data();
    write_report(config, &render(config, &data));
}

// =============================================================================
// FFI Entry Points
// =============================================================================

/// At-exit report, called from generated main before returning
#[unsafe(no_mangle)]
pub extern "C" fn rt_report() {
    emit_report();
}

// =============================================================================
// Tests
// =============================================================================

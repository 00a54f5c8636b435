//! Arena configuration
//!
//! The default block size can be tuned per process without recompiling
//! generated code:
//!
//! - `SN_ARENA_BLOCK_SIZE` - block size in bytes. Accepts a plain number or
//!   a `k`/`m` suffix (`64k`, `1m`). Unset, zero or unparseable values fall
//!   back to [`DEFAULT_BLOCK_SIZE`].

use std::sync::OnceLock;

/// Block size used when nothing else is configured (64 KiB)
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Environment variable holding the default block size
pub const BLOCK_SIZE_ENV: &str = "SN_ARENA_BLOCK_SIZE";

/// Arena configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Minimum size of every block an arena chains
    pub default_block_size: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            default_block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl ArenaConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let Ok(val) = std::env::var(BLOCK_SIZE_ENV) else {
            return Self::default();
        };
        match parse_size(&val).filter(|&v| v > 0) {
            Some(default_block_size) => Self { default_block_size },
            None => {
                tracing::warn!(
                    value = %val,
                    "SN_ARENA_BLOCK_SIZE is not a positive size, using the default"
                );
                Self::default()
            }
        }
    }

    /// Process-wide configuration, read from the environment once
    pub fn global() -> &'static ArenaConfig {
        static CONFIG: OnceLock<ArenaConfig> = OnceLock::new();
        CONFIG.get_or_init(ArenaConfig::from_env)
    }

    /// Resolve a requested block size, mapping 0 to the configured default
    pub fn block_size_or_default(&self, requested: usize) -> usize {
        if requested == 0 {
            self.default_block_size
        } else {
            requested
        }
    }
}

fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim().to_ascii_lowercase();
    let (digits, multiplier) = if let Some(n) = raw.strip_suffix('k') {
        (n, 1024)
    } else if let Some(n) = raw.strip_suffix('m') {
        (n, 1024 * 1024)
    } else {
        (raw.as_str(), 1)
    };
    digits.trim().parse::<usize>().ok()?.checked_mul(multiplier)
}

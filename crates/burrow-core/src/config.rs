//! Tunnel configuration.
//!
//! Defaults can be overridden from the environment:
//!
//! | variable | field |
//! |---|---|
//! | `BURROW_WRITE_BUFFER_LOW_WATER_MARK` | `watermarks.low` |
//! | `BURROW_WRITE_BUFFER_HIGH_WATER_MARK` | `watermarks.high` |

use crate::Watermarks;

pub const LOW_WATER_MARK_ENV: &str = "BURROW_WRITE_BUFFER_LOW_WATER_MARK";
pub const HIGH_WATER_MARK_ENV: &str = "BURROW_WRITE_BUFFER_HIGH_WATER_MARK";

/// Per-server tunnel settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TunnelConfig {
    /// Outbound queue watermarks for every accepted channel.
    pub watermarks: Watermarks,
}

impl TunnelConfig {
    /// Defaults, overridden by any valid environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults, overridden by whatever `lookup` returns for each variable.
    ///
    /// Values that do not parse as `u32` are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Watermarks::default();
        let read = |key: &str, default: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(default)
        };
        let watermarks = Watermarks::new(
            read(LOW_WATER_MARK_ENV, defaults.low),
            read(HIGH_WATER_MARK_ENV, defaults.high),
        );

        if !watermarks.is_ordered() {
            tracing::warn!(
                low = watermarks.low,
                high = watermarks.high,
                "low water mark exceeds high water mark; writability will oscillate"
            );
        }
        Self { watermarks }
    }

    pub fn with_watermarks(mut self, watermarks: Watermarks) -> Self {
        self.watermarks = watermarks;
        self
    }
}

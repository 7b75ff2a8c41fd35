//! Merge rules: built-in defaults sit underneath every other source.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with the built-in defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("store.base_url", "http://localhost:8080/admin")?
        .set_default("store.timeout_ms", 10_000_u64)?
        .set_default("refresh.interval_secs", 30_u64)?
        .set_default("refresh.max_retries", 3_u64)?
        .set_default("refresh.base_delay_ms", 1_000_u64)?
        .set_default("refresh.refresh_after_dispatch", true)
}

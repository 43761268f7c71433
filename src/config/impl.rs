use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

use super::StaticConfig;

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks. Falls back to defaults when `init_config()`
/// has not been called yet.
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get_or_init(|| ArcSwap::from_pointee(StaticConfig::default()))
        .load_full()
}

/// Initialize the global configuration
///
/// Loads configuration from "config.toml" in the current directory.
/// If the file doesn't exist, uses in-memory defaults.
///
/// # Examples
/// ```no_run
/// use smsrelay::config::init_config;
/// init_config();
/// ```
pub fn init_config() {
    CONFIG.get_or_init(|| ArcSwap::from_pointee(StaticConfig::load()));
}

/// Replace the global configuration
///
/// Used by `--config <path>` and by tests that need a specific setup.
pub fn set_config(config: StaticConfig) {
    match CONFIG.get() {
        Some(current) => current.store(Arc::new(config)),
        None => {
            if let Err(rejected) = CONFIG.set(ArcSwap::from_pointee(config)) {
                // 并发初始化：另一个线程抢先，直接覆盖
                if let Some(current) = CONFIG.get() {
                    current.store(rejected.load_full());
                }
            }
        }
    }
}

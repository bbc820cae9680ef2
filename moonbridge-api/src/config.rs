//! API 层配置
//!
//! 包含执行配置 RunConfig 和全局单例（供 CLI 使用）

use std::path::Path;

use moonbridge_config::BridgeConfig;
use once_cell::sync::OnceCell;

use crate::error::BridgeError;

/// Execution configuration
#[derive(Clone, Default)]
pub struct RunConfig {
    /// State configuration (libraries, host library, debug checks)
    pub bridge: BridgeConfig,
    /// Print the values returned by the chunk
    pub show_returns: bool,
    /// Run a full collection after execution
    pub collect_after_run: bool,
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("show_returns", &self.show_returns)
            .field("collect_after_run", &self.collect_after_run)
            .field("bridge", &self.bridge)
            .finish()
    }
}

impl RunConfig {
    pub fn with_bridge(bridge: BridgeConfig) -> Self {
        Self {
            bridge,
            ..Self::default()
        }
    }
}

/// Parse a bridge configuration from JSON text (missing fields use defaults)
pub fn parse_bridge_config(text: &str) -> Result<BridgeConfig, BridgeError> {
    serde_json::from_str(text).map_err(|e| BridgeError::Config(e.to_string()))
}

/// Read a bridge configuration from a JSON file
pub fn load_bridge_config(path: &Path) -> Result<BridgeConfig, BridgeError> {
    let text = std::fs::read_to_string(path).map_err(|e| BridgeError::io(path, &e))?;
    parse_bridge_config(&text)
}

// Global config singleton for CLI convenience
static GLOBAL_CONFIG: OnceCell<RunConfig> = OnceCell::new();

/// Initialize global configuration (must be called once before any operation)
///
/// # Panics
/// If config is already initialized
pub fn init(config: RunConfig) {
    GLOBAL_CONFIG
        .set(config)
        .expect("Config already initialized");
}

/// Get global config reference
///
/// # Panics
/// If config is not initialized
pub fn config() -> &'static RunConfig {
    GLOBAL_CONFIG.get().expect("Config not initialized")
}

/// Check if config is initialized
pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}

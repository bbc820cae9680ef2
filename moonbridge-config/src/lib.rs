//! Moonbridge Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Moonbridge crates.

use serde::{Deserialize, Serialize};

/// Standard libraries the engine may open in a new state
///
/// The base library is always present; `debug` is deliberately absent because it
/// can break the bridge's ownership invariants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdLibrary {
    Coroutine,
    Table,
    Io,
    Os,
    String,
    Utf8,
    Math,
    Package,
}

impl StdLibrary {
    /// Every library the bridge knows how to open
    pub const ALL: [StdLibrary; 8] = [
        StdLibrary::Coroutine,
        StdLibrary::Table,
        StdLibrary::Io,
        StdLibrary::Os,
        StdLibrary::String,
        StdLibrary::Utf8,
        StdLibrary::Math,
        StdLibrary::Package,
    ];

    /// Get the library's global name
    pub fn as_str(&self) -> &'static str {
        match self {
            StdLibrary::Coroutine => "coroutine",
            StdLibrary::Table => "table",
            StdLibrary::Io => "io",
            StdLibrary::Os => "os",
            StdLibrary::String => "string",
            StdLibrary::Utf8 => "utf8",
            StdLibrary::Math => "math",
            StdLibrary::Package => "package",
        }
    }
}

/// Configuration for the embedded engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Libraries opened when a state is created
    pub libraries: Vec<StdLibrary>,
    /// Chunk name used by `execute` when no explicit name is given
    pub chunk_name: String,
}

/// Configuration for the script-side host library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostLibConfig {
    /// Whether the host library is installed into new states
    pub enabled: bool,
    /// Global table name holding `connect`, `meta`, `new_object`...
    pub namespace: String,
    /// Whether the global `each` iterator helper is installed
    pub install_each: bool,
}

/// Debug aids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Verify bridge stack balance after every top-level `execute`
    pub check_stack: bool,
}

/// Top-level bridge configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub engine: EngineConfig,
    pub host_lib: HostLibConfig,
    pub debug: DebugConfig,
}

/// Bridge subsystem enum for subsystem-specific log targets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Subsystem {
    State,
    Value,
    Native,
    Reflect,
    Coroutine,
    Registry,
}

impl Subsystem {
    /// All subsystems, in log-target registration order
    pub const ALL: [Subsystem; 6] = [
        Subsystem::State,
        Subsystem::Value,
        Subsystem::Native,
        Subsystem::Reflect,
        Subsystem::Coroutine,
        Subsystem::Registry,
    ];

    /// Get the string name of the subsystem
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::State => "state",
            Subsystem::Value => "value",
            Subsystem::Native => "native",
            Subsystem::Reflect => "reflect",
            Subsystem::Coroutine => "coroutine",
            Subsystem::Registry => "registry",
        }
    }

    /// Get the log target name for this subsystem
    pub fn target(&self) -> String {
        format!("moonbridge::{}", self.as_str())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            libraries: StdLibrary::ALL.to_vec(),
            chunk_name: "chunk".to_string(),
        }
    }
}

impl Default for HostLibConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "host".to_string(),
            install_each: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self { check_stack: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_engine_config() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.libraries.len(), StdLibrary::ALL.len());
        assert_eq!(cfg.chunk_name, "chunk");
    }

    #[test]
    fn test_default_host_lib_config() {
        let cfg = HostLibConfig::default();
        assert!(cfg.enabled);
        assert_eq!(cfg.namespace, "host");
        assert!(cfg.install_each);
    }

    #[test]
    fn test_subsystem_as_str() {
        assert_eq!(Subsystem::State.as_str(), "state");
        assert_eq!(Subsystem::Reflect.target(), "moonbridge::reflect");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: BridgeConfig =
            serde_json::from_str(r#"{ "host_lib": { "namespace": "qt" } }"#).unwrap();
        assert_eq!(cfg.host_lib.namespace, "qt");
        assert!(cfg.host_lib.enabled);
        assert!(cfg.debug.check_stack);
        assert_eq!(cfg.engine, EngineConfig::default());
    }

    #[test]
    fn test_library_names_serialize_snake_case() {
        let json = serde_json::to_string(&vec![StdLibrary::Utf8, StdLibrary::Coroutine]).unwrap();
        assert_eq!(json, r#"["utf8","coroutine"]"#);
    }
}

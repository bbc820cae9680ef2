//! Moonbridge API - Execution entry points
//!
//! Provides a unified execution interface, including:
//! - State construction from a run configuration
//! - Script execution from source or file
//! - Unified error handling (BridgeError) and structured reports
//!
//! For CLI convenience, this crate provides a global singleton API.
//! For library use, prefer the explicit `run(source, &config)` API.

use std::path::Path;

use tracing::{debug, info, instrument};

pub mod config;
pub use config::{
    config as get_config, init as init_config, is_initialized, load_bridge_config,
    parse_bridge_config, RunConfig,
};

pub mod error;
pub mod types;
pub use error::{BridgeError, ErrorReport};
pub use types::ExecuteOutput;

// Re-export config and core types
pub use moonbridge_config;
pub use moonbridge_config::{BridgeConfig, DebugConfig, EngineConfig, HostLibConfig, StdLibrary, Subsystem};
pub use moonbridge_core;
pub use moonbridge_core::{ErrorKind, ScriptError, State, Value};

/// Create a state from the run configuration
pub fn create_state(config: &RunConfig) -> Result<State, BridgeError> {
    Ok(State::with_config(config.bridge.clone())?)
}

/// Execute with explicit configuration
///
/// This is the recommended API for library users.
pub fn run(source: &str, config: &RunConfig) -> Result<ExecuteOutput, BridgeError> {
    let state = create_state(config)?;
    let chunk_name = config.bridge.engine.chunk_name.clone();
    run_in(state, &chunk_name, source, config)
}

/// Read and execute a script file; the chunk is named after the path
pub fn run_file(path: &Path, config: &RunConfig) -> Result<ExecuteOutput, BridgeError> {
    let source = std::fs::read_to_string(path).map_err(|e| BridgeError::io(path, &e))?;
    let state = create_state(config)?;
    run_in(state, &format!("@{}", path.display()), &source, config)
}

/// Execute in an existing state
#[instrument(target = "moonbridge::state", skip(state, source, config), fields(len = source.len()))]
pub fn run_in(
    state: State,
    chunk_name: &str,
    source: &str,
    config: &RunConfig,
) -> Result<ExecuteOutput, BridgeError> {
    info!(target: "moonbridge::state", chunk = chunk_name, "Starting execution");

    let values = state.execute_named(chunk_name, source)?;

    if config.collect_after_run {
        state.collect_garbage()?;
    }
    if config.bridge.debug.check_stack {
        state.check_stack_balance()?;
    }

    debug!(
        target: "moonbridge::state",
        returned = values.len(),
        live_handles = state.live_handles(),
        "execution completed"
    );
    info!(target: "moonbridge::state", "Execution completed");
    Ok(ExecuteOutput { state, values })
}

// ==================== Legacy API (using global config) ====================

/// Compile and run (uses global config)
///
/// # Panics
/// If global config is not initialized
pub fn execute(source: &str) -> Result<ExecuteOutput, BridgeError> {
    run(source, get_config())
}

/// Quick run with default config (auto-initializes if needed)
pub fn quick_run(source: &str) -> Result<ExecuteOutput, BridgeError> {
    if !is_initialized() {
        init_config(RunConfig::default());
    }
    execute(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_explicit_config() {
        let config = RunConfig::default();
        let output = run("return 40 + 2, 'done'", &config).unwrap();
        assert_eq!(output.values, vec![Value::Integer(42), Value::from("done")]);
        assert_eq!(output.display_values(), vec!["42", "done"]);
    }

    #[test]
    fn test_run_keeps_state() {
        let output = run("counter = 10", &RunConfig::default()).unwrap();
        assert_eq!(output.state.get("counter").unwrap(), Value::Integer(10));
    }

    #[test]
    fn test_run_reports_script_error() {
        let err = run("local x = nil\nreturn x.field", &RunConfig::default()).unwrap_err();
        assert_eq!(err.phase(), "runtime");
        assert_eq!(err.kind(), Some(ErrorKind::EngineRuntime));
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_run_reports_syntax_error() {
        let err = run("return +", &RunConfig::default()).unwrap_err();
        assert_eq!(err.phase(), "syntax");
        assert_eq!(err.to_report().line, Some(1));
    }

    #[test]
    fn test_run_missing_file() {
        let err = run_file(Path::new("/nonexistent/script.lua"), &RunConfig::default()).unwrap_err();
        assert!(matches!(err, BridgeError::Io { .. }));
    }

    #[test]
    fn test_quick_run() {
        let output = quick_run("return 42").unwrap();
        assert_eq!(output.values, vec![Value::Integer(42)]);
    }
}

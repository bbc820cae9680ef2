//! Moonbridge CLI - Command line interface
//!
//! Runs a Lua script (file or inline) against a bridge state.

use clap::Parser;
use std::path::PathBuf;
use std::process;

mod config;
mod logging;
mod report;

use moonbridge_api::{
    init_config, load_bridge_config, run, run_file, BridgeConfig, BridgeError, ExecuteOutput, RunConfig,
};
use tracing::{debug, info};

use crate::config::{parse_target_level, LogConfig};
use crate::logging::LogFormat;
use crate::report::{print_error_json, print_error_with_source};

#[derive(Parser)]
#[command(
    name = "moonbridge",
    about = "Run Lua scripts against the Moonbridge native-object bridge",
    version
)]
struct Cli {
    /// Script file to execute
    #[arg(value_name = "SCRIPT", required_unless_present = "eval", conflicts_with = "eval")]
    script: Option<PathBuf>,

    /// Execute an inline chunk instead of a file
    #[arg(short, long, value_name = "CODE")]
    eval: Option<String>,

    /// Bridge configuration file (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value = "compact")]
    log_format: LogFormat,

    /// Per-subsystem log level, e.g. `--log reflect=trace`
    #[arg(long = "log", value_name = "SUBSYSTEM=LEVEL", value_parser = parse_target_level)]
    log_levels: Vec<(moonbridge_api::Subsystem, tracing::Level)>,

    /// Print the values returned by the chunk
    #[arg(long)]
    show_returns: bool,

    /// Run a full garbage collection after execution
    #[arg(long)]
    gc: bool,

    /// Report errors as JSON on stderr
    #[arg(long)]
    json_errors: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_verbosity(cli.verbose);
    for (subsystem, level) in &cli.log_levels {
        log_config.set(*subsystem, *level);
    }
    logging::init(&log_config, cli.log_format);

    let bridge = match &cli.config {
        Some(path) => match load_bridge_config(path) {
            Ok(bridge) => bridge,
            Err(e) => fail(&cli, &e, None),
        },
        None => BridgeConfig::default(),
    };

    let run_config = RunConfig {
        bridge,
        show_returns: cli.show_returns,
        collect_after_run: cli.gc,
    };
    debug!(target: "moonbridge::cli", config = ?run_config, "configuration resolved");

    // Initialize API config (global singleton for convenience)
    init_config(run_config.clone());

    let (result, source) = match &cli.script {
        Some(path) => {
            info!(target: "moonbridge::cli", script = %path.display(), "running script");
            // 仅用于错误上下文，读取失败由 run_file 报告
            (run_file(path, &run_config), std::fs::read_to_string(path).ok())
        }
        None => {
            let code = cli.eval.clone().unwrap_or_default();
            (run(&code, &run_config), Some(code))
        }
    };

    match result {
        Ok(output) => handle_output(&output, &run_config),
        Err(e) => fail(&cli, &e, source.as_deref()),
    }
}

fn handle_output(output: &ExecuteOutput, run_config: &RunConfig) {
    if run_config.show_returns {
        for value in output.display_values() {
            println!("{}", value);
        }
    }
    debug!(target: "moonbridge::cli", live_handles = output.state.live_handles(), "done");
}

fn fail(cli: &Cli, e: &BridgeError, source: Option<&str>) -> ! {
    if cli.json_errors {
        print_error_json(e);
    } else {
        print_error_with_source(e, source);
    }
    process::exit(1);
}

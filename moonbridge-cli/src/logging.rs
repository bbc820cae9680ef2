//! CLI 日志系统初始化
//!
//! 基于 `tracing-subscriber` 实现按子系统的日志控制。

use std::io;

use moonbridge_config::Subsystem;
use tracing_subscriber::{filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::config::LogConfig;

/// 日志输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// 彩色格式化（开发使用）
    Pretty,
    /// 紧凑格式
    Compact,
    /// JSON 格式（工具集成）
    Json,
}

/// 按子系统构建过滤目标
pub fn build_targets(log_config: &LogConfig) -> Targets {
    Subsystem::ALL.into_iter().fold(
        Targets::new()
            .with_default(log_config.global)
            .with_target("moonbridge::cli", log_config.global),
        |targets, subsystem| targets.with_target(subsystem.target(), log_config.level_for(subsystem)),
    )
}

/// 使用指定格式和日志配置初始化日志系统（输出到 stderr）
pub fn init(log_config: &LogConfig, format: LogFormat) {
    let layer = create_format_layer(format, io::stderr).with_filter(build_targets(log_config));
    tracing_subscriber::registry().with(layer).init();
}

/// Create formatter layer based on format
fn create_format_layer<W, F>(format: LogFormat, make_writer: F) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>
where
    W: io::Write + Send + Sync + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(make_writer)
            .boxed(),
    }
}

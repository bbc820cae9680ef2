//! API 错误类型
//!
//! 提供统一的错误类型和结构化错误报告。

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

pub use moonbridge_core::{ErrorKind, ScriptError};

/// Moonbridge 错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// 脚本执行或桥接操作失败
    #[error("{0}")]
    Script(#[from] ScriptError),

    /// 配置解析失败
    #[error("Config error: {0}")]
    Config(String),

    /// 读取脚本或配置文件失败
    #[error("IO error: {path}: {message}")]
    Io { path: String, message: String },
}

impl BridgeError {
    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        BridgeError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// 获取错误阶段名称
    pub fn phase(&self) -> &'static str {
        match self {
            BridgeError::Script(e) => match e.tag() {
                Some(tag) if tag.starts_with("engine.syntax") => "syntax",
                _ => "runtime",
            },
            BridgeError::Config(_) => "config",
            BridgeError::Io { .. } => "io",
        }
    }

    /// 引擎错误消息中的行号（`name:LINE: message`）
    pub fn line(&self) -> Option<usize> {
        match self {
            BridgeError::Script(e) => line_of(e.message()),
            _ => None,
        }
    }

    /// 错误种类（桥接错误种类或阶段名）
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            BridgeError::Script(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// 转换为结构化错误报告
    ///
    /// CLI 可以直接打印，上层应用可以序列化为 JSON。
    pub fn to_report(&self) -> ErrorReport {
        match self {
            BridgeError::Script(e) => ErrorReport {
                phase: self.phase(),
                line: self.line(),
                error_kind: e.kind().as_str().to_string(),
                tag: e.tag().map(str::to_string),
                message: e.message().to_string(),
            },
            BridgeError::Config(msg) => ErrorReport {
                phase: "config",
                line: None,
                error_kind: "ConfigError".to_string(),
                tag: None,
                message: msg.clone(),
            },
            BridgeError::Io { path, message } => ErrorReport {
                phase: "io",
                line: None,
                error_kind: "IoError".to_string(),
                tag: None,
                message: format!("{}: {}", path, message),
            },
        }
    }
}

/// 第一个全数字的 `:` 分段
fn line_of(message: &str) -> Option<usize> {
    message
        .split(':')
        .skip(1)
        .find(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|part| part.parse().ok())
}

/// 结构化错误报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    /// 错误阶段: syntax, runtime, config, io
    pub phase: &'static str,
    /// 错误行号（1-based，如果有）
    pub line: Option<usize>,
    /// 错误类型（可用于程序化处理）
    pub error_kind: String,
    /// `<subsystem>.<operation>` 标签
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// 人类可读的错误消息
    pub message: String,
}

impl std::fmt::Display for ErrorReport {
    /// 默认的 CLI 友好格式
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "[line {}] {} error ({}): {}", line, self.phase, self.error_kind, self.message),
            None => write!(f, "[{}] {} error ({}): {}", self.phase, self.phase, self.error_kind, self.message),
        }
    }
}

impl ErrorReport {
    /// 转换为 JSON 格式（Web API 使用）
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// 简洁格式（适合终端）
    pub fn to_short(&self) -> String {
        match &self.tag {
            Some(tag) => format!("{}: {}: {}", self.phase, tag, self.message),
            None => format!("{}: {}", self.phase, self.message),
        }
    }
}

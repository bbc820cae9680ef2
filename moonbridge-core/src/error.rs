//! 桥接层错误类型
//!
//! 所有跨越桥接边界的失败都归一为 [`ScriptError`]：一个错误种类、
//! 人类可读的消息和可选的 `<子系统>.<操作>` 标签。
//!
//! 原生代码产生的错误在进入引擎时包装为 `mlua::Error::external`，
//! 从引擎返回时再沿着回调错误链还原，因此种类与标签在脚本边界两侧保持不变。

use std::fmt;

use thiserror::Error;

/// 错误种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 值的种类不支持该操作（索引数字、调用表格等）
    TypeMismatch,
    /// 原生对象或宿主对象上不存在该成员
    AttributeNotFound,
    /// 对象不可调用
    NotCallable,
    /// 成员不可赋值（方法名、只读属性）
    NotAssignable,
    /// 信号与槽的签名不兼容
    SignatureMismatch,
    /// 未知的信号、槽或类型名
    NameNotFound,
    /// 点分路径经过了非表格的中间值
    PathTypeMismatch,
    /// 恢复已结束的协程
    CoroutineDead,
    /// 引擎内部抛出的编译或运行时错误
    EngineRuntime,
    /// 宿主对象已被销毁
    ObjectDestroyed,
    /// 所属 State 已关闭
    StateClosed,
    /// 桥接栈未回到入口深度
    StackImbalance,
}

impl ErrorKind {
    /// 种类名称（用于报告与日志）
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::AttributeNotFound => "AttributeNotFound",
            ErrorKind::NotCallable => "NotCallable",
            ErrorKind::NotAssignable => "NotAssignable",
            ErrorKind::SignatureMismatch => "SignatureMismatch",
            ErrorKind::NameNotFound => "NameNotFound",
            ErrorKind::PathTypeMismatch => "PathTypeMismatch",
            ErrorKind::CoroutineDead => "CoroutineDead",
            ErrorKind::EngineRuntime => "EngineRuntime",
            ErrorKind::ObjectDestroyed => "ObjectDestroyed",
            ErrorKind::StateClosed => "StateClosed",
            ErrorKind::StackImbalance => "StackImbalance",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 桥接层唯一的错误载体
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", render(.tag, .message))]
pub struct ScriptError {
    kind: ErrorKind,
    message: String,
    tag: Option<String>,
}

fn render(tag: &Option<String>, message: &str) -> String {
    match tag {
        Some(tag) => format!("{}: {}", tag, message),
        None => message.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, ScriptError>;

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            tag: None,
        }
    }

    /// 附加 `<子系统>.<操作>` 标签，已有标签时保留原标签
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        if self.tag.is_none() {
            self.tag = Some(tag.into());
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    // ===== 常用构造 =====

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    pub fn attribute_not_found(key: &str, type_name: &str) -> Self {
        Self::new(
            ErrorKind::AttributeNotFound,
            format!("no member `{}` in `{}`", key, type_name),
        )
    }

    pub fn not_callable(type_name: &str) -> Self {
        Self::new(
            ErrorKind::NotCallable,
            format!("`{}` value is not callable", type_name),
        )
    }

    pub fn name_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NameNotFound, message)
    }

    pub fn state_closed() -> Self {
        Self::new(ErrorKind::StateClosed, "the owning state has been closed")
    }
}

/// 原生错误进入引擎：包装为外部错误，脚本可以用 `pcall` 捕获
impl From<ScriptError> for mlua::Error {
    fn from(err: ScriptError) -> Self {
        mlua::Error::external(err)
    }
}

/// 引擎错误返回原生侧：优先还原被包装的桥接错误
impl From<mlua::Error> for ScriptError {
    fn from(err: mlua::Error) -> Self {
        if let Some(inner) = find_script_error(&err) {
            return inner.clone();
        }
        match &err {
            mlua::Error::SyntaxError { message, .. } => {
                ScriptError::new(ErrorKind::EngineRuntime, message.clone()).with_tag("engine.syntax")
            }
            mlua::Error::RuntimeError(message) => {
                ScriptError::new(ErrorKind::EngineRuntime, message.clone()).with_tag("engine.runtime")
            }
            other => {
                ScriptError::new(ErrorKind::EngineRuntime, other.to_string()).with_tag("engine.runtime")
            }
        }
    }
}

fn find_script_error(err: &mlua::Error) -> Option<&ScriptError> {
    match err {
        mlua::Error::CallbackError { cause, .. } => find_script_error(cause),
        mlua::Error::WithContext { cause, .. } => find_script_error(cause),
        mlua::Error::ExternalError(inner) => inner.downcast_ref::<ScriptError>(),
        _ => None,
    }
}

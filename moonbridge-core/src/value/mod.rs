//! 桥接值类型
//!
//! [`Value`] 统一了脚本标量与由 [`Handle`] 支撑的引擎对象。克隆一个
//! 句柄型值只增加引用计数，不会复制引擎状态。
//!
//! 相等性遵循引擎的原始相等：标量按值比较（`Integer(2) == Number(2.0)`），
//! 表格、函数、协程与 userdata 按对象身份比较。

mod convert;
mod iter;
mod ops;

use std::fmt;

use crate::coerce;
use crate::handle::{Handle, HandleKind};

pub use iter::{Entry, TableIter};
pub(crate) use convert::{from_engine, from_engine_multi, to_engine, to_engine_multi};

/// 值的种类（Integer 与 Number 同属 number）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Nil,
    Boolean,
    Number,
    String,
    Table,
    Function,
    Thread,
    UserData,
}

impl ValueKind {
    /// 引擎 `type()` 返回的名字
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Nil => "nil",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Table => "table",
            ValueKind::Function => "function",
            ValueKind::Thread => "thread",
            ValueKind::UserData => "userdata",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 桥接值
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    /// 引擎字符串（非 UTF-8 字节按有损方式转换）
    String(String),
    Table(Handle),
    Function(Handle),
    Thread(Handle),
    UserData(Handle),
}

impl Value {
    // ==================== 类型检查 ====================

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) | Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Table(_) => ValueKind::Table,
            Value::Function(_) => ValueKind::Function,
            Value::Thread(_) => ValueKind::Thread,
            Value::UserData(_) => ValueKind::UserData,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().as_str()
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    #[inline]
    pub fn is_table(&self) -> bool {
        matches!(self, Value::Table(_))
    }

    #[inline]
    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// 句柄型值的句柄
    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Value::Table(h) | Value::Function(h) | Value::Thread(h) | Value::UserData(h) => Some(h),
            _ => None,
        }
    }

    pub(crate) fn from_handle(handle: Handle) -> Value {
        match handle.kind() {
            HandleKind::Table => Value::Table(handle),
            HandleKind::Function => Value::Function(handle),
            HandleKind::Thread => Value::Thread(handle),
            HandleKind::UserData => Value::UserData(handle),
        }
    }

    /// 引擎真值：只有 nil 与 false 为假
    pub fn to_boolean(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }
}

// ==================== 相等性 ====================

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Integer(i), Value::Number(f)) | (Value::Number(f), Value::Integer(i)) => {
                coerce::int_float_eq(*i, *f)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b))
            | (Value::Function(a), Value::Function(b))
            | (Value::Thread(a), Value::Thread(b))
            | (Value::UserData(a), Value::UserData(b)) => a.same_object(b),
            _ => false,
        }
    }
}

// ==================== 显示 ====================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{}", coerce::format_float(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Table(h) | Value::Function(h) | Value::Thread(h) | Value::UserData(h) => {
                write!(f, "{:?}", h)
            }
        }
    }
}

// ==================== 从 Rust 值构造 ====================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Nil)
    }
}

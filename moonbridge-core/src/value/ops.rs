//! Value 上的引擎操作：索引、赋值、调用、长度与标量转换
//!
//! 返回约定：
//! - 表格：经由元方法（`__index` / `__newindex` / `__call`）
//! - 原生 userdata：委托给 [`NativeObject`](crate::native::NativeObject)
//! - 其他 userdata：交给引擎自身处理
//! - 不支持的种类：`TypeMismatch`，消息中包含操作名与实际种类

use mlua::{MultiValue, Table, Value as LuaValue};

use super::{from_engine, from_engine_multi, to_engine, to_engine_multi, Value};
use crate::coerce;
use crate::error::{ErrorKind, Result, ScriptError};
use crate::handle::Handle;
use crate::native::{assign, native_of, Operation};
use crate::stack::StackFrame;
use crate::state::{State, StateInner};

fn unsupported(op: &str, value: &Value) -> ScriptError {
    ScriptError::type_mismatch(format!("cannot {} a {} value", op, value.type_name()))
        .with_tag(format!("value.{}", op))
}

pub(crate) fn engine_table(handle: &Handle, inner: &StateInner) -> Result<Table> {
    match handle.engine_value(inner)? {
        LuaValue::Table(t) => Ok(t),
        other => Err(ScriptError::type_mismatch(format!(
            "expected table, found {}",
            other.type_name()
        ))),
    }
}

impl Value {
    // ==================== 索引 ====================

    /// 读取 `self[key]`
    pub fn index(&self, key: impl Into<Value>) -> Result<Value> {
        let key = key.into();
        match self {
            Value::Table(h) => {
                let inner = h.state()?;
                let _frame = StackFrame::enter(&inner, "index");
                let table = engine_table(h, &inner)?;
                let value: LuaValue = table.get(to_engine(&inner, &key)?)?;
                Ok(from_engine(&inner, value)?)
            }
            Value::UserData(h) => {
                let (inner, ud) = h.resolve()?;
                let _frame = StackFrame::enter(&inner, "index");
                match native_of(&ud) {
                    Some(obj) => obj.index(&State::from_inner(inner.clone()), &key),
                    None => {
                        let value = inner.engine_index(ud, to_engine(&inner, &key)?)?;
                        Ok(from_engine(&inner, value)?)
                    }
                }
            }
            other => Err(unsupported("index", other)),
        }
    }

    /// 写入 `self[key] = value`
    pub fn set_index(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        match self {
            Value::Table(h) => {
                let inner = h.state()?;
                let _frame = StackFrame::enter(&inner, "set_index");
                let table = engine_table(h, &inner)?;
                table.set(to_engine(&inner, &key)?, to_engine(&inner, &value)?)?;
                Ok(())
            }
            Value::UserData(h) => {
                let (inner, ud) = h.resolve()?;
                let _frame = StackFrame::enter(&inner, "set_index");
                match native_of(&ud) {
                    Some(obj) => assign(obj.as_ref(), &State::from_inner(inner.clone()), &key, value),
                    None => {
                        let k = to_engine(&inner, &key)?;
                        let v = to_engine(&inner, &value)?;
                        inner.engine_new_index(ud, k, v)?;
                        Ok(())
                    }
                }
            }
            other => Err(unsupported("assign into", other)),
        }
    }

    // ==================== 调用 ====================

    /// 调用函数、可调用表格、原生对象；对协程调用即恢复执行
    pub fn call(&self, args: &[Value]) -> Result<Vec<Value>> {
        match self {
            Value::Function(h) => {
                let (inner, f) = h.resolve()?;
                let _frame = StackFrame::enter(&inner, "call");
                let LuaValue::Function(f) = f else {
                    return Err(unsupported("call", self));
                };
                let ret: MultiValue = f.call(to_engine_multi(&inner, args)?)?;
                Ok(from_engine_multi(&inner, ret)?)
            }
            Value::Thread(h) => crate::coroutine::resume(h, args),
            Value::UserData(h) => {
                let (inner, ud) = h.resolve()?;
                let _frame = StackFrame::enter(&inner, "call");
                match native_of(&ud) {
                    Some(obj) => obj.call(&State::from_inner(inner.clone()), args.to_vec()),
                    None => {
                        let ret = inner.engine_call(ud, to_engine_multi(&inner, args)?)?;
                        Ok(from_engine_multi(&inner, ret)?)
                    }
                }
            }
            Value::Table(h) => {
                let inner = h.state()?;
                let _frame = StackFrame::enter(&inner, "call");
                let table = engine_table(h, &inner)?;
                let callable = match table.metatable() {
                    Some(mt) => !mt.raw_get::<LuaValue>("__call")?.is_nil(),
                    None => false,
                };
                if !callable {
                    return Err(unsupported("call", self));
                }
                let ret = inner.engine_call(LuaValue::Table(table), to_engine_multi(&inner, args)?)?;
                Ok(from_engine_multi(&inner, ret)?)
            }
            other => Err(unsupported("call", other)),
        }
    }

    // ==================== 长度 ====================

    /// 表格的原始序列长度、字符串的字节数、原生对象的 `length`
    pub fn len(&self) -> Result<usize> {
        match self {
            Value::String(s) => Ok(s.len()),
            Value::Table(h) => {
                let inner = h.state()?;
                let _frame = StackFrame::enter(&inner, "len");
                Ok(engine_table(h, &inner)?.raw_len())
            }
            Value::UserData(h) => {
                let (inner, ud) = h.resolve()?;
                let _frame = StackFrame::enter(&inner, "len");
                match native_of(&ud) {
                    Some(obj) if obj.supports(Operation::Length) => {
                        obj.length(&State::from_inner(inner.clone()))
                    }
                    _ => Err(unsupported("measure", self)),
                }
            }
            other => Err(unsupported("measure", other)),
        }
    }

    /// 表格没有任何条目（不只是序列部分）
    pub fn is_empty(&self) -> Result<bool> {
        match self {
            Value::String(s) => Ok(s.is_empty()),
            Value::Table(h) => {
                let inner = h.state()?;
                let _frame = StackFrame::enter(&inner, "is_empty");
                let table = engine_table(h, &inner)?;
                let mut pairs = table.pairs::<LuaValue, LuaValue>();
                match pairs.next() {
                    None => Ok(true),
                    Some(entry) => entry.map(|_| false).map_err(ScriptError::from),
                }
            }
            _ => Ok(self.len()? == 0),
        }
    }

    /// 平移序列 `[start, #t]`：
    /// - `count < 0`：删除从 `start` 开始的 `-count` 个元素，尾部前移（超出部分忽略）
    /// - `count > 0`：在 `start` 处插入 `count` 个 `fill`，尾部后移
    pub fn table_shift(&self, start: i64, count: i64, fill: impl Into<Value>) -> Result<()> {
        let Value::Table(h) = self else {
            return Err(unsupported("shift", self));
        };
        let inner = h.state()?;
        let _frame = StackFrame::enter(&inner, "table_shift");
        let table = engine_table(h, &inner)?;
        let len = table.raw_len() as i64;
        if start < 1 || start > len + 1 {
            return Err(ScriptError::type_mismatch(format!(
                "shift start {} out of range 1..={}",
                start,
                len + 1
            ))
            .with_tag("value.shift"));
        }

        if count < 0 {
            // 删除数量不超过 start 之后的元素数
            let n = count.checked_neg().unwrap_or(i64::MAX).min(len - start + 1);
            for i in start..=len {
                let moved: LuaValue = if i + n <= len {
                    table.raw_get(i + n)?
                } else {
                    LuaValue::Nil
                };
                table.raw_set(i, moved)?;
            }
        } else if count > 0 {
            let (Some(_), Some(end)) = (len.checked_add(count), start.checked_add(count)) else {
                return Err(ScriptError::type_mismatch(format!(
                    "shift count {} overflows the sequence of length {}",
                    count, len
                ))
                .with_tag("value.shift"));
            };
            for i in (start..=len).rev() {
                let moved: LuaValue = table.raw_get(i)?;
                table.raw_set(i + count, moved)?;
            }
            let fill = to_engine(&inner, &fill.into())?;
            for i in start..end {
                table.raw_set(i, fill.clone())?;
            }
        }
        Ok(())
    }

    // ==================== 标量转换 ====================

    /// 转换为整数（数字字符串、无小数部分的浮点数可转换）
    pub fn to_integer(&self) -> Result<i64> {
        let converted = match self {
            Value::Integer(i) => Some(*i),
            Value::Number(n) => coerce::float_to_integer(*n),
            Value::String(s) => coerce::str_to_integer(s),
            _ => None,
        };
        converted.ok_or_else(|| self.conversion_error("integer"))
    }

    /// 转换为浮点数
    pub fn to_number(&self) -> Result<f64> {
        let converted = match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            Value::String(s) => coerce::str_to_number(s),
            _ => None,
        };
        converted.ok_or_else(|| self.conversion_error("number"))
    }

    /// 转换为字符串（只接受字符串与数字，与引擎的隐式转换一致）
    pub fn to_lua_string(&self) -> Result<String> {
        match self {
            Value::String(s) => Ok(s.clone()),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Number(n) => Ok(coerce::format_float(*n)),
            _ => Err(self.conversion_error("string")),
        }
    }

    fn conversion_error(&self, target: &str) -> ScriptError {
        ScriptError::new(
            ErrorKind::TypeMismatch,
            format!("cannot convert {} value `{}` to {}", self.type_name(), self, target),
        )
        .with_tag("value.convert")
    }
}

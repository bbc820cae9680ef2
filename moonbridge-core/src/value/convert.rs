//! Value 与引擎值之间的转换

use std::rc::Rc;

use mlua::{FromLua, IntoLua, Lua, MultiValue, Value as LuaValue};

use super::Value;
use crate::error::ScriptError;
use crate::handle::{Handle, HandleKind};
use crate::state::StateInner;

/// 引擎值 -> Value（句柄型值会分配注册表锚点）
pub(crate) fn from_engine(inner: &Rc<StateInner>, value: LuaValue) -> mlua::Result<Value> {
    let v = match value {
        LuaValue::Nil => Value::Nil,
        LuaValue::Boolean(b) => Value::Boolean(b),
        LuaValue::Integer(i) => Value::Integer(i),
        LuaValue::Number(n) => Value::Number(n),
        LuaValue::String(s) => Value::String(s.to_string_lossy().to_string()),
        v @ LuaValue::Table(_) => Value::Table(Handle::anchor(inner, HandleKind::Table, v)?),
        v @ LuaValue::Function(_) => Value::Function(Handle::anchor(inner, HandleKind::Function, v)?),
        v @ LuaValue::Thread(_) => Value::Thread(Handle::anchor(inner, HandleKind::Thread, v)?),
        v @ (LuaValue::UserData(_) | LuaValue::LightUserData(_)) => {
            Value::UserData(Handle::anchor(inner, HandleKind::UserData, v)?)
        }
        other => {
            return Err(ScriptError::type_mismatch(format!(
                "unsupported engine value of type `{}`",
                other.type_name()
            ))
            .into())
        }
    };
    Ok(v)
}

/// Value -> 引擎值
pub(crate) fn to_engine(inner: &Rc<StateInner>, value: &Value) -> mlua::Result<LuaValue> {
    let v = match value {
        Value::Nil => LuaValue::Nil,
        Value::Boolean(b) => LuaValue::Boolean(*b),
        Value::Integer(i) => LuaValue::Integer(*i),
        Value::Number(n) => LuaValue::Number(*n),
        Value::String(s) => LuaValue::String(inner.lua.create_string(s)?),
        Value::Table(h) | Value::Function(h) | Value::Thread(h) | Value::UserData(h) => {
            if !h.is_valid() {
                return Err(ScriptError::state_closed().into());
            }
            if !h.belongs_to(inner) {
                return Err(ScriptError::type_mismatch(format!(
                    "{} value belongs to another state",
                    h.kind().as_str()
                ))
                .into());
            }
            h.engine_value(inner)?
        }
    };
    Ok(v)
}

pub(crate) fn from_engine_multi(inner: &Rc<StateInner>, values: MultiValue) -> mlua::Result<Vec<Value>> {
    values.into_iter().map(|v| from_engine(inner, v)).collect()
}

pub(crate) fn to_engine_multi(inner: &Rc<StateInner>, values: &[Value]) -> mlua::Result<MultiValue> {
    values
        .iter()
        .map(|v| to_engine(inner, v))
        .collect::<mlua::Result<MultiValue>>()
}

// 回调参数与返回值直接使用 Value

impl FromLua for Value {
    fn from_lua(value: LuaValue, lua: &Lua) -> mlua::Result<Self> {
        let inner = StateInner::from_lua(lua)?;
        from_engine(&inner, value)
    }
}

impl IntoLua for Value {
    fn into_lua(self, lua: &Lua) -> mlua::Result<LuaValue> {
        let inner = StateInner::from_lua(lua)?;
        to_engine(&inner, &self)
    }
}

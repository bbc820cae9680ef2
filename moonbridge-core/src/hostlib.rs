//! 脚本侧宿主库
//!
//! 安装在配置的命名空间下（默认 `host`）：
//! - `host.meta.<Type>`：已注册类型的类型对象，调用即构造
//! - `host.new_object(meta | name, ... [, parent])`
//! - `host.connect(obj, signal, fn)` / `host.connect(obj, signal, obj2, slot)`
//! - `host.connect_slots_by_name(obj)`
//! - `host.disconnect(obj, signal [, fn | obj2, slot])`
//! - `host.meta_type(name | id)`、`host.type(v)`
//!
//! 以及全局 `each(t)`：表格按 `next` 遍历，宿主对象按属性遍历。

use std::rc::Rc;

use mlua::{Function, Value as LuaValue};
use tracing::debug;

use crate::error::{ErrorKind, Result, ScriptError};
use crate::native::{NativeObject, Operation};
use crate::reflect::{self, HostRef, MetaTypeObject, Ownership};
use crate::registry::{self, NativeFn};
use crate::state::State;
use crate::value::Value;

const EACH: &str = r#"
local property_names = ...
return function(t)
  if type(t) == "table" then
    return next, t, nil
  end
  local names = property_names(t)
  local i = 0
  return function()
    i = i + 1
    local name = names[i]
    if name ~= nil then
      return name, t[name]
    end
  end
end
"#;

const FUNCTIONS: [(&str, NativeFn); 6] = [
    ("new_object", new_object),
    ("connect", connect),
    ("connect_slots_by_name", connect_slots_by_name),
    ("disconnect", disconnect),
    ("meta_type", meta_type),
    ("type", type_of),
];

pub(crate) fn install(state: &State) -> Result<()> {
    let config = state.config().host_lib.clone();
    let namespace = config.namespace;

    state.set(&format!("{}.meta", namespace), state.wrap_native(MetaNamespace)?)?;
    for (name, f) in FUNCTIONS {
        state.register_function(&format!("{}.{}", namespace, name), f)?;
    }

    if config.install_each {
        let names = state.create_function(property_names)?;
        let lua = &state.inner().lua;
        let factory: Function = lua.load(EACH).set_name("=each").into_function()?;
        let each: LuaValue = factory.call(state.to_engine(&names)?)?;
        lua.globals().set("each", each)?;
    }

    debug!(
        target: "moonbridge::registry",
        namespace = %namespace,
        each = config.install_each,
        "host library installed"
    );
    Ok(())
}

// ==================== host.meta ====================

/// `host.meta`：按类型名惰性查找注册表
struct MetaNamespace;

impl NativeObject for MetaNamespace {
    fn type_name(&self) -> &str {
        "MetaNamespace"
    }

    fn index(&self, state: &State, key: &Value) -> Result<Value> {
        let Value::String(name) = key else {
            return Err(ScriptError::attribute_not_found(&key.to_string(), self.type_name()));
        };
        let entry = registry::lookup_type(name).ok_or_else(|| {
            ScriptError::name_not_found(format!("no registered type `{}`", name)).with_tag("host.meta")
        })?;
        state.wrap_native(MetaTypeObject::new(entry.meta, entry.creator))
    }

    fn new_index(&self, _state: &State, key: &Value, _value: Value) -> Result<bool> {
        Err(ScriptError::new(
            ErrorKind::NotAssignable,
            format!("cannot assign `{}` in the type namespace", key),
        )
        .with_tag("host.meta"))
    }

    fn length(&self, _state: &State) -> Result<usize> {
        Ok(registry::registered_types().len())
    }

    fn to_display_string(&self) -> String {
        "MetaNamespace".to_string()
    }

    fn supports(&self, op: Operation) -> bool {
        op == Operation::Length
    }
}

// ==================== 参数辅助 ====================

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn host_arg(args: &[Value], index: usize, func: &str) -> Result<HostRef> {
    let value = arg(args, index);
    value.to_host_object().ok_or_else(|| {
        ScriptError::type_mismatch(format!(
            "bad argument #{} to `{}` (host object expected, got {})",
            index + 1,
            func,
            value.type_name()
        ))
        .with_tag(format!("host.{}", func))
    })
}

fn string_arg(args: &[Value], index: usize, func: &str) -> Result<String> {
    match arg(args, index) {
        Value::String(s) => Ok(s),
        other => Err(ScriptError::type_mismatch(format!(
            "bad argument #{} to `{}` (string expected, got {})",
            index + 1,
            func,
            other.type_name()
        ))
        .with_tag(format!("host.{}", func))),
    }
}

// ==================== 函数 ====================

fn new_object(state: &State, args: Vec<Value>) -> Result<Vec<Value>> {
    let (target, rest) = match args.split_first() {
        Some((first, rest)) => (first.clone(), rest),
        None => (Value::Nil, &[][..]),
    };
    let object = resolve_type(&target).and_then(|meta| {
        let (ctor_args, parent) = split_parent(&meta, rest);
        let object = meta.construct(state, ctor_args, Ownership::Script)?;
        if let (Some(parent), Some(child)) = (parent, object.to_host_object()) {
            reflect::set_parent(&child, Some(&parent))?;
        }
        Ok(object)
    });
    Ok(vec![object.map_err(|e| e.with_tag("host.new_object"))?])
}

fn resolve_type(target: &Value) -> Result<Rc<MetaTypeObject>> {
    if let Some(meta) = target.to_native::<MetaTypeObject>() {
        return Ok(meta);
    }
    match target {
        Value::String(name) => registry::lookup_type(name)
            .map(|entry| Rc::new(MetaTypeObject::new(entry.meta, entry.creator)))
            .ok_or_else(|| ScriptError::name_not_found(format!("no registered type `{}`", name))),
        other => Err(ScriptError::type_mismatch(format!(
            "bad argument #1 to `new_object` (type expected, got {})",
            other.type_name()
        ))),
    }
}

/// 没有构造函数接受全部参数时，末尾的宿主对象作为父对象
fn split_parent<'a>(meta: &MetaTypeObject, args: &'a [Value]) -> (&'a [Value], Option<HostRef>) {
    if meta.accepts(args) {
        return (args, None);
    }
    match args.split_last() {
        Some((last, rest)) => match last.to_host_object() {
            Some(parent) => (rest, Some(parent)),
            None => (args, None),
        },
        None => (args, None),
    }
}

fn connect(state: &State, args: Vec<Value>) -> Result<Vec<Value>> {
    let source = host_arg(&args, 0, "connect")?;
    let signal = string_arg(&args, 1, "connect")?;
    let result = match args.len() {
        3 => reflect::connect(state, &source, &signal, arg(&args, 2)),
        4 => {
            let target = host_arg(&args, 2, "connect")?;
            let slot = string_arg(&args, 3, "connect")?;
            reflect::connect_slot(&source, &signal, &target, &slot)
        }
        n => Err(ScriptError::type_mismatch(format!(
            "`connect` expects 3 or 4 arguments, got {}",
            n
        ))),
    };
    result.map_err(|e| e.with_tag("host.connect"))?;
    Ok(Vec::new())
}

fn disconnect(_state: &State, args: Vec<Value>) -> Result<Vec<Value>> {
    let source = host_arg(&args, 0, "disconnect")?;
    let signal = string_arg(&args, 1, "disconnect")?;
    let result = match args.len() {
        2 => reflect::disconnect(&source, &signal, None),
        3 => reflect::disconnect(&source, &signal, Some(&args[2])),
        4 => {
            let target = host_arg(&args, 2, "disconnect")?;
            let slot = string_arg(&args, 3, "disconnect")?;
            reflect::disconnect_slot(&source, &signal, &target, &slot)
        }
        n => Err(ScriptError::type_mismatch(format!(
            "`disconnect` expects 2 to 4 arguments, got {}",
            n
        ))),
    };
    let removed = result.map_err(|e| e.with_tag("host.disconnect"))?;
    Ok(vec![Value::Boolean(removed)])
}

/// 返回建立的连接数
fn connect_slots_by_name(_state: &State, args: Vec<Value>) -> Result<Vec<Value>> {
    let target = host_arg(&args, 0, "connect_slots_by_name")?;
    let connected = reflect::connect_slots_by_name(&target).map_err(|e| e.with_tag("host.connect_slots_by_name"))?;
    Ok(vec![Value::Integer(connected as i64)])
}

/// 类型名 -> 编号，编号 -> 类型名
fn meta_type(_state: &State, args: Vec<Value>) -> Result<Vec<Value>> {
    let value = arg(&args, 0);
    let found = match &value {
        Value::String(name) => registry::type_id(name).map(|id| Value::Integer(id as i64)),
        Value::Integer(id) => usize::try_from(*id)
            .ok()
            .and_then(registry::lookup_type_id)
            .map(|entry| Value::from(entry.meta.class_name())),
        other => {
            return Err(ScriptError::type_mismatch(format!(
                "bad argument #1 to `meta_type` (string or integer expected, got {})",
                other.type_name()
            ))
            .with_tag("host.meta_type"))
        }
    };
    let found = found.ok_or_else(|| {
        ScriptError::name_not_found(format!("no registered type `{}`", value)).with_tag("host.meta_type")
    })?;
    Ok(vec![found])
}

/// 原生对象返回其类型名，其余返回引擎类型名
fn type_of(_state: &State, args: Vec<Value>) -> Result<Vec<Value>> {
    let value = arg(&args, 0);
    let name = match value.to_native_object() {
        Some(obj) => obj.type_name().to_string(),
        None => value.type_name().to_string(),
    };
    Ok(vec![Value::from(name)])
}

/// `each` 对宿主对象的遍历顺序：属性名，派生类在前
fn property_names(state: &State, args: Vec<Value>) -> Result<Vec<Value>> {
    let value = arg(&args, 0);
    let object = value.to_host_object().ok_or_else(|| {
        ScriptError::type_mismatch(format!("cannot iterate a {} value", value.type_name()))
            .with_tag("host.each")
    })?;
    let meta = object.meta_object();
    Ok(vec![state.new_sequence(meta.property_names())?])
}

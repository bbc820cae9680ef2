//! 宿主对象的脚本包装
//!
//! [`ObjectWrapper`] 通过组合持有宿主对象，并以委托方式实现
//! [`NativeObject`]：属性读取、方法绑定、属性赋值都由实时的类型描述驱动。
//!
//! 同一宿主实例最多只有一个"拥有者"包装，其余包装都是观察者；
//! 同一 State 内包装被缓存，存活期间重复包装得到同一个 userdata。
//! 以 `Ownership::Script` 创建的拥有者包装被引擎回收时销毁宿主对象。

use std::ffi::c_void;
use std::rc::Rc;
use std::sync::Arc;

use mlua::{LightUserData, Table, Value as LuaValue};
use tracing::{debug, trace};

use super::marshal::{self, describe_args};
use super::meta::{HostValue, MetaObject, MethodKind};
use super::object::{parent_of, HostRef};
use super::signal;
use crate::error::{ErrorKind, Result, ScriptError};
use crate::native::{native_of, NativeObject, Operation, Operator};
use crate::stack::StackFrame;
use crate::state::State;
use crate::value::{from_engine, to_engine, Value};

/// 包装对宿主对象生命周期的所有权
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// 原生侧负责销毁
    Native,
    /// 脚本回收拥有者包装时销毁对象
    Script,
}

pub struct ObjectWrapper {
    object: HostRef,
    meta: Arc<MetaObject>,
    owning: bool,
    ownership: Ownership,
}

impl ObjectWrapper {
    pub(crate) fn new(object: HostRef, ownership: Ownership) -> Self {
        let meta = object.meta_object();
        let owning = object.core().claim_owner();
        trace!(
            target: "moonbridge::reflect",
            class = meta.class_name(),
            owning,
            ownership = ?ownership,
            "wrap host object"
        );
        ObjectWrapper {
            object,
            meta,
            owning,
            ownership,
        }
    }

    pub fn object(&self) -> &HostRef {
        &self.object
    }

    pub fn is_owning(&self) -> bool {
        self.owning
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    fn ensure_alive(&self) -> Result<()> {
        self.object.core().ensure_alive(self.meta.class_name())
    }
}

impl Drop for ObjectWrapper {
    fn drop(&mut self) {
        if !self.owning {
            return;
        }
        self.object.core().release_owner();
        if parent_of(&self.object).is_some() {
            trace!(target: "moonbridge::reflect", class = self.meta.class_name(), "owner collected, object kept by parent");
            return;
        }
        if self.ownership == Ownership::Script && !self.object.core().is_destroyed() {
            debug!(target: "moonbridge::reflect", class = self.meta.class_name(), "script owner collected, destroying object");
            signal::destroy(&self.object);
        }
    }
}

fn member_key(key: &Value, class_name: &str) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        other => Err(ScriptError::attribute_not_found(&other.to_string(), class_name)),
    }
}

impl NativeObject for ObjectWrapper {
    fn type_name(&self) -> &str {
        self.meta.class_name()
    }

    fn lineage(&self) -> Vec<String> {
        self.meta
            .lineage()
            .skip(1)
            .map(|m| m.class_name().to_string())
            .collect()
    }

    fn index(&self, state: &State, key: &Value) -> Result<Value> {
        let name = member_key(key, self.meta.class_name())?;
        self.ensure_alive()?;

        if let Some(prop) = self.meta.property(&name) {
            let value = prop.read(&self.object)?;
            return marshal::to_value(state, value);
        }
        if !self.meta.methods_named(&name).is_empty() {
            return state.wrap_native(BoundMethod {
                object: self.object.clone(),
                meta: self.meta.clone(),
                name,
            });
        }
        Err(ScriptError::attribute_not_found(&name, self.meta.class_name()))
    }

    fn new_index(&self, _state: &State, key: &Value, value: Value) -> Result<bool> {
        let name = member_key(key, self.meta.class_name())?;
        self.ensure_alive()?;

        if let Some(prop) = self.meta.property(&name) {
            let Some(setter) = prop.setter() else {
                return Err(ScriptError::new(
                    ErrorKind::NotAssignable,
                    format!("property `{}` of `{}` is read-only", name, self.meta.class_name()),
                ));
            };
            let host_value = marshal::from_value(prop.ty, &value)?;
            setter(&self.object, host_value)?;
            return Ok(true);
        }
        if !self.meta.methods_named(&name).is_empty() {
            return Err(ScriptError::new(
                ErrorKind::NotAssignable,
                format!("cannot assign to method `{}` of `{}`", name, self.meta.class_name()),
            ));
        }
        Ok(false)
    }

    fn operate(&self, _state: &State, op: Operator, lhs: &Value, rhs: &Value) -> Result<Value> {
        match op {
            Operator::Eq => {
                let same = match (lhs.to_host_object(), rhs.to_host_object()) {
                    (Some(a), Some(b)) => Rc::ptr_eq(&a, &b),
                    _ => false,
                };
                Ok(Value::Boolean(same))
            }
            _ => Err(ScriptError::type_mismatch(format!(
                "operator `{}` is not supported by `{}`",
                op.as_str(),
                self.meta.class_name()
            ))),
        }
    }

    fn to_display_string(&self) -> String {
        let name = self.object.core().object_name();
        if name.is_empty() {
            format!("{}: {:p}", self.meta.class_name(), Rc::as_ptr(&self.object) as *const ())
        } else {
            format!("{}: {}", self.meta.class_name(), name)
        }
    }

    fn supports(&self, op: Operation) -> bool {
        op == Operation::Compare
    }
}

/// 绑定到某个宿主对象的方法（同名的所有重载）
pub struct BoundMethod {
    object: HostRef,
    meta: Arc<MetaObject>,
    name: String,
}

impl NativeObject for BoundMethod {
    fn type_name(&self) -> &str {
        "BoundMethod"
    }

    fn call(&self, state: &State, mut args: Vec<Value>) -> Result<Vec<Value>> {
        self.object.core().ensure_alive(self.meta.class_name())?;

        // `obj:foo(x)` 会把对象本身作为第一个参数
        let is_self = args
            .first()
            .and_then(Value::to_host_object)
            .map_or(false, |first| Rc::ptr_eq(&first, &self.object));
        if is_self {
            args.remove(0);
        }

        let candidates = self.meta.methods_named(&self.name);
        let method = marshal::select_overload(candidates.iter().copied(), &args).ok_or_else(|| {
            ScriptError::type_mismatch(format!(
                "no overload of `{}::{}` accepts ({})",
                self.meta.class_name(),
                self.name,
                describe_args(&args)
            ))
        })?;

        let host_args = marshal::marshal_args(&method.params, &args)?;
        trace!(target: "moonbridge::reflect", method = %method.signature(), "invoke");

        if method.kind == MethodKind::Signal {
            self.object.core().emit(&self.object, &method.signature(), &host_args)?;
            return Ok(Vec::new());
        }
        let invoker = method.invoker().ok_or_else(|| {
            ScriptError::not_callable(&method.signature())
        })?;
        let ret = invoker(&self.object, host_args)?;
        if matches!(ret, HostValue::Void) {
            return Ok(Vec::new());
        }
        Ok(vec![marshal::to_value(state, ret)?])
    }

    fn to_display_string(&self) -> String {
        format!("{}::{}", self.meta.class_name(), self.name)
    }

    fn supports(&self, op: Operation) -> bool {
        op == Operation::Call
    }
}

fn object_address(object: &HostRef) -> *const () {
    Rc::as_ptr(object) as *const ()
}

impl State {
    /// 包装宿主对象
    ///
    /// 同一 State 中一个宿主实例在包装存活期间只对应一个 userdata，
    /// 因此 `rawequal` 与表键都保持一致；所有权由第一次包装决定。
    /// 实例已被其他 State 的包装拥有时，新包装只是观察者。
    pub fn wrap_object(&self, object: HostRef, ownership: Ownership) -> Result<Value> {
        let inner = self.inner();
        let _frame = StackFrame::enter(inner, "wrap_object");
        let cache: Table = inner.lua.registry_value(&inner.wrappers)?;
        let key = LightUserData(object_address(&object) as *mut c_void);

        if let cached @ LuaValue::UserData(_) = cache.raw_get::<LuaValue>(key)? {
            let same = native_of(&cached)
                .and_then(|obj| obj.as_any_rc().downcast::<ObjectWrapper>().ok())
                .map_or(false, |w| object_address(&w.object) == object_address(&object));
            if same {
                trace!(target: "moonbridge::reflect", "reuse cached wrapper");
                return Ok(from_engine(inner, cached)?);
            }
        }

        let value = self.wrap_native(ObjectWrapper::new(object, ownership))?;
        cache.raw_set(key, to_engine(inner, &value)?)?;
        Ok(value)
    }
}

impl Value {
    /// 取出被包装的宿主对象
    pub fn to_host_object(&self) -> Option<HostRef> {
        let obj = self.to_native_object()?;
        obj.as_any_rc()
            .downcast::<ObjectWrapper>()
            .ok()
            .map(|w| w.object.clone())
    }
}

//! 可调用的类型对象
//!
//! 已注册的宿主类型以 [`MetaTypeObject`] 的形式交给脚本：调用它即构造实例。

use std::sync::Arc;

use tracing::debug;

use super::marshal::{self, describe_args};
use super::meta::MetaObject;
use super::wrapper::Ownership;
use crate::error::{Result, ScriptError};
use crate::native::{NativeObject, NativeType, Operation};
use crate::registry::{self, Creator};
use crate::state::State;
use crate::value::Value;

pub struct MetaTypeObject {
    meta: Arc<MetaObject>,
    creator: Option<Creator>,
}

impl NativeType for MetaTypeObject {
    const TYPE_NAME: &'static str = "MetaType";
}

impl MetaTypeObject {
    pub fn new(meta: Arc<MetaObject>, creator: Option<Creator>) -> Self {
        MetaTypeObject { meta, creator }
    }

    pub fn meta(&self) -> &Arc<MetaObject> {
        &self.meta
    }

    /// 参数能否选中某个构造函数
    pub fn accepts(&self, args: &[Value]) -> bool {
        (self.creator.is_some() && args.is_empty())
            || marshal::select_overload(self.meta.constructors().iter(), args).is_some()
    }

    /// 选择构造函数并包装新实例
    pub fn construct(&self, state: &State, args: &[Value], ownership: Ownership) -> Result<Value> {
        let object = if let (Some(creator), true) = (&self.creator, args.is_empty()) {
            creator()
        } else {
            let ctor = marshal::select_overload(self.meta.constructors().iter(), args).ok_or_else(|| {
                ScriptError::type_mismatch(format!(
                    "no constructor of `{}` accepts ({})",
                    self.meta.class_name(),
                    describe_args(args)
                ))
                .with_tag("reflect.construct")
            })?;
            ctor.create(marshal::marshal_args(&ctor.params, args)?)?
        };
        debug!(
            target: "moonbridge::reflect",
            class = self.meta.class_name(),
            args = args.len(),
            "constructed host object"
        );
        state.wrap_object(object, ownership)
    }
}

impl NativeObject for MetaTypeObject {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn index(&self, _state: &State, key: &Value) -> Result<Value> {
        match key {
            Value::String(k) if k == "className" => Ok(Value::from(self.meta.class_name())),
            Value::String(k) if k == "superClass" => Ok(self
                .meta
                .superclass()
                .map(|s| Value::from(s.class_name()))
                .unwrap_or(Value::Nil)),
            Value::String(k) if k == "typeId" => Ok(registry::type_id(self.meta.class_name())
                .map(|id| Value::Integer(id as i64))
                .unwrap_or(Value::Nil)),
            other => Err(ScriptError::attribute_not_found(&other.to_string(), Self::TYPE_NAME)),
        }
    }

    fn call(&self, state: &State, args: Vec<Value>) -> Result<Vec<Value>> {
        Ok(vec![self.construct(state, &args, Ownership::Script)?])
    }

    fn to_display_string(&self) -> String {
        format!("MetaType: {}", self.meta.class_name())
    }

    fn supports(&self, op: Operation) -> bool {
        op == Operation::Call
    }
}

impl State {
    /// 按类型名构造已注册的宿主类型
    pub fn construct(&self, type_name: &str, args: &[Value], ownership: Ownership) -> Result<Value> {
        let entry = registry::lookup_type(type_name).ok_or_else(|| {
            ScriptError::name_not_found(format!("no registered type `{}`", type_name))
                .with_tag("reflect.construct")
        })?;
        MetaTypeObject::new(entry.meta, entry.creator).construct(self, args, ownership)
    }

    /// 已注册类型的类型对象
    pub fn meta_type(&self, type_name: &str) -> Result<Value> {
        let entry = registry::lookup_type(type_name).ok_or_else(|| {
            ScriptError::name_not_found(format!("no registered type `{}`", type_name))
                .with_tag("reflect.meta")
        })?;
        self.wrap_native(MetaTypeObject::new(entry.meta, entry.creator))
    }
}

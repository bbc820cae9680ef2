//! 测试辅助工具
//!
//! 提供端到端测试共用的宿主类型、原生类型与 State 构造

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use once_cell::sync::Lazy;

use moonbridge_core::reflect::{self, downcast_host, HostRef, HostType, HostValue, MetaObject, Object, ObjectCore};
use moonbridge_core::{
    ErrorKind, HostObject, NativeObject, NativeType, Operation, Operator, ScriptError, State, Value,
};

/// 创建 State，并确保测试类型与函数已注册
pub fn new_state() -> State {
    register_all();
    State::new().expect("state creation failed")
}

pub fn register_all() {
    moonbridge_core::register_type(MyObject::static_meta(), Some(Arc::new(|| Rc::new(MyObject::new(0)) as HostRef)));
    moonbridge_core::register_type(Sink::static_meta(), None);
    moonbridge_core::register_function("test.fail", fail_with_bad_value);
    moonbridge_core::register_function("test.vec2", make_vec2);
}

fn fail_with_bad_value(_state: &State, _args: Vec<Value>) -> moonbridge_core::Result<Vec<Value>> {
    Err(ScriptError::type_mismatch("bad value!"))
}

fn make_vec2(state: &State, args: Vec<Value>) -> moonbridge_core::Result<Vec<Value>> {
    let x = args.first().cloned().unwrap_or_default().to_number()?;
    let y = args.get(1).cloned().unwrap_or_default().to_number()?;
    Ok(vec![state.wrap_native(Vec2 { x, y })?])
}

// ===== 宿主类型 MyObject =====

/// 带构造函数、重载方法、信号与槽的宿主类型
#[derive(Default)]
pub struct MyObject {
    core: ObjectCore,
    value: Cell<i64>,
    label: RefCell<String>,
}

static MY_OBJECT_META: Lazy<Arc<MetaObject>> = Lazy::new(|| {
    MetaObject::builder("Test::MyObject")
        .inherits(Object::static_meta())
        .property("value", HostType::Int, |obj| Ok(HostValue::Int(my(obj)?.value.get())))
        .property_rw(
            "label",
            HostType::String,
            |obj| Ok(HostValue::String(my(obj)?.label.borrow().clone())),
            |obj, value| {
                *my(obj)?.label.borrow_mut() = value.as_str().unwrap_or_default().to_string();
                Ok(())
            },
        )
        .signal("valueChanged", &[HostType::Int])
        .slot("setValue", &[HostType::Int], |obj, args| {
            let v = args.first().and_then(HostValue::as_int).unwrap_or_default();
            let this = my(obj)?;
            if this.value.replace(v) != v {
                reflect::emit(obj, "valueChanged", vec![HostValue::Int(v)])?;
            }
            Ok(HostValue::Void)
        })
        .method("foo", &[HostType::Double], HostType::Double, |_, args| {
            let x = args.first().and_then(HostValue::as_double).unwrap_or_default();
            Ok(HostValue::Double(x * 42.0))
        })
        .method("foo", &[HostType::String, HostType::Int], HostType::String, |_, args| {
            let s = args.first().and_then(HostValue::as_str).unwrap_or_default();
            let n = args.get(1).and_then(HostValue::as_int).unwrap_or_default();
            Ok(HostValue::String(s.repeat(n.max(0) as usize)))
        })
        .constructor(&[HostType::Int, HostType::Object], |args| {
            let v = args.first().and_then(HostValue::as_int).unwrap_or_default();
            Ok(Rc::new(MyObject::new(v)) as HostRef)
        })
        .build()
});

fn my(obj: &HostRef) -> moonbridge_core::Result<&MyObject> {
    downcast_host::<MyObject>(obj).ok_or_else(|| ScriptError::type_mismatch("not a MyObject"))
}

impl MyObject {
    pub fn new(value: i64) -> Self {
        MyObject {
            value: Cell::new(value),
            ..Default::default()
        }
    }

    pub fn value(&self) -> i64 {
        self.value.get()
    }

    pub fn static_meta() -> Arc<MetaObject> {
        MY_OBJECT_META.clone()
    }
}

impl HostObject for MyObject {
    fn meta_object(&self) -> Arc<MetaObject> {
        Self::static_meta()
    }

    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

// ===== 宿主类型 Sink =====

/// 只有槽的接收方
#[derive(Default)]
pub struct Sink {
    core: ObjectCore,
    received: RefCell<Vec<i64>>,
    pings: Cell<usize>,
}

static SINK_META: Lazy<Arc<MetaObject>> = Lazy::new(|| {
    MetaObject::builder("Test::Sink")
        .inherits(Object::static_meta())
        .slot("record", &[HostType::Int], |obj, args| {
            let v = args.first().and_then(HostValue::as_int).unwrap_or_default();
            sink(obj)?.received.borrow_mut().push(v);
            Ok(HostValue::Void)
        })
        .slot("ping", &[], |obj, _| {
            let this = sink(obj)?;
            this.pings.set(this.pings.get() + 1);
            Ok(HostValue::Void)
        })
        .slot("rename", &[HostType::String], |obj, args| {
            let name = args.first().and_then(HostValue::as_str).unwrap_or_default();
            obj.core().set_object_name(name);
            Ok(HostValue::Void)
        })
        .slot("on_source_valueChanged", &[HostType::Int], |obj, args| {
            let v = args.first().and_then(HostValue::as_int).unwrap_or_default();
            sink(obj)?.received.borrow_mut().push(v);
            Ok(HostValue::Void)
        })
        .slot("on_ghost_destroyed", &[], |obj, _| {
            let this = sink(obj)?;
            this.pings.set(this.pings.get() + 1);
            Ok(HostValue::Void)
        })
        .build()
});

fn sink(obj: &HostRef) -> moonbridge_core::Result<&Sink> {
    downcast_host::<Sink>(obj).ok_or_else(|| ScriptError::type_mismatch("not a Sink"))
}

impl Sink {
    pub fn received(&self) -> Vec<i64> {
        self.received.borrow().clone()
    }

    pub fn pings(&self) -> usize {
        self.pings.get()
    }

    pub fn static_meta() -> Arc<MetaObject> {
        SINK_META.clone()
    }
}

impl HostObject for Sink {
    fn meta_object(&self) -> Arc<MetaObject> {
        Self::static_meta()
    }

    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

// ===== 原生类型 Vec2 =====

/// 支持运算符与长度的原生对象
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl NativeType for Vec2 {
    const TYPE_NAME: &'static str = "Vec2";
}

fn as_vec2(value: &Value) -> Option<(f64, f64)> {
    value.to_native::<Vec2>().map(|v| (v.x, v.y))
}

impl NativeObject for Vec2 {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn lineage(&self) -> Vec<String> {
        vec!["Shape".to_string()]
    }

    fn index(&self, _state: &State, key: &Value) -> moonbridge_core::Result<Value> {
        match key {
            Value::String(k) if k == "x" => Ok(Value::Number(self.x)),
            Value::String(k) if k == "y" => Ok(Value::Number(self.y)),
            other => Err(ScriptError::attribute_not_found(&other.to_string(), Self::TYPE_NAME)),
        }
    }

    fn operate(&self, state: &State, op: Operator, lhs: &Value, rhs: &Value) -> moonbridge_core::Result<Value> {
        match (op, as_vec2(lhs), as_vec2(rhs)) {
            (Operator::Add, Some(a), Some(b)) => state.wrap_native(Vec2 { x: a.0 + b.0, y: a.1 + b.1 }),
            (Operator::Eq, Some(a), Some(b)) => Ok(Value::Boolean(a == b)),
            _ => Err(ScriptError::new(
                ErrorKind::TypeMismatch,
                format!("operator `{}` is not supported by `Vec2`", op.as_str()),
            )),
        }
    }

    fn length(&self, _state: &State) -> moonbridge_core::Result<usize> {
        Ok(2)
    }

    fn to_display_string(&self) -> String {
        format!("Vec2({}, {})", self.x, self.y)
    }

    fn supports(&self, op: Operation) -> bool {
        matches!(op, Operation::Arithmetic | Operation::Compare | Operation::Length)
    }
}

/// 只接受 `count` 键赋值的原生对象
#[derive(Default)]
pub struct Counter {
    pub count: Cell<i64>,
}

impl NativeType for Counter {
    const TYPE_NAME: &'static str = "Counter";
}

impl NativeObject for Counter {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn index(&self, _state: &State, key: &Value) -> moonbridge_core::Result<Value> {
        match key {
            Value::String(k) if k == "count" => Ok(Value::Integer(self.count.get())),
            other => Err(ScriptError::attribute_not_found(&other.to_string(), Self::TYPE_NAME)),
        }
    }

    fn new_index(&self, _state: &State, key: &Value, value: Value) -> moonbridge_core::Result<bool> {
        match key {
            Value::String(k) if k == "count" => {
                self.count.set(value.to_integer()?);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

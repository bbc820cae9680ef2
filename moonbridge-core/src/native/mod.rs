//! 原生对象协议
//!
//! 任意 Rust 类型实现 [`NativeObject`] 后即可作为不透明 userdata 交给脚本。
//! 引擎对该 userdata 的索引、赋值、调用、运算都回到这里的方法；
//! 没有覆盖的能力返回明确的错误种类，而不是静默失败。
//!
//! 对象由 `Rc` 共享：原生持有者与引擎回收器都是释放方，谁最后释放谁析构。

mod cell;

use std::any::Any;
use std::rc::Rc;

use crate::error::{ErrorKind, Result, ScriptError};
use crate::state::State;
use crate::value::Value;

pub(crate) use cell::{native_of, NativeCell};

/// 共享的原生对象引用
pub type NativeRef = Rc<dyn NativeObject>;

/// 引擎运算符
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    IDiv,
    Unm,
    Concat,
    Eq,
    Lt,
    Le,
}

/// 原生对象可声明支持的能力
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Compare,
    Concat,
    Arithmetic,
    Call,
    Length,
}

impl Operator {
    pub fn operation(&self) -> Operation {
        match self {
            Operator::Eq | Operator::Lt | Operator::Le => Operation::Compare,
            Operator::Concat => Operation::Concat,
            _ => Operation::Arithmetic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Add => "add",
            Operator::Sub => "sub",
            Operator::Mul => "mul",
            Operator::Div => "div",
            Operator::Mod => "mod",
            Operator::Pow => "pow",
            Operator::IDiv => "idiv",
            Operator::Unm => "unm",
            Operator::Concat => "concat",
            Operator::Eq => "eq",
            Operator::Lt => "lt",
            Operator::Le => "le",
        }
    }
}

/// `Rc<dyn Trait>` 到具体类型的向下转换支持
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// 静态类型名，用于受检的向下转换
pub trait NativeType {
    const TYPE_NAME: &'static str;
}

/// 原生对象能力接口
pub trait NativeObject: AsAny {
    /// 类型名（同一类型的所有实例相同）
    fn type_name(&self) -> &str;

    /// 祖先类型名，最近的在前
    fn lineage(&self) -> Vec<String> {
        Vec::new()
    }

    fn index(&self, _state: &State, key: &Value) -> Result<Value> {
        Err(ScriptError::attribute_not_found(&key.to_string(), self.type_name()))
    }

    /// 处理赋值时返回 `Ok(true)`；`Ok(false)` 表示不接受该键
    fn new_index(&self, _state: &State, _key: &Value, _value: Value) -> Result<bool> {
        Ok(false)
    }

    fn call(&self, _state: &State, _args: Vec<Value>) -> Result<Vec<Value>> {
        Err(ScriptError::not_callable(self.type_name()))
    }

    /// 二元/一元运算；`lhs` 与 `rhs` 中至少一个是本对象
    fn operate(&self, _state: &State, op: Operator, _lhs: &Value, _rhs: &Value) -> Result<Value> {
        Err(ScriptError::new(
            ErrorKind::TypeMismatch,
            format!("operator `{}` is not supported by `{}`", op.as_str(), self.type_name()),
        ))
    }

    fn length(&self, _state: &State) -> Result<usize> {
        Err(ScriptError::type_mismatch(format!(
            "`{}` has no length",
            self.type_name()
        )))
    }

    fn to_display_string(&self) -> String {
        self.type_name().to_string()
    }

    fn supports(&self, _op: Operation) -> bool {
        false
    }

    /// 是否是 `name` 类型或其后代
    fn is_a(&self, name: &str) -> bool {
        self.type_name() == name || self.lineage().iter().any(|n| n == name)
    }
}

/// 对原生对象赋值，未处理的键报告 `AttributeNotFound`
pub(crate) fn assign(obj: &dyn NativeObject, state: &State, key: &Value, value: Value) -> Result<()> {
    if obj.new_index(state, key, value)? {
        Ok(())
    } else {
        Err(ScriptError::attribute_not_found(&key.to_string(), obj.type_name()).with_tag("native.new_index"))
    }
}

// ==================== 向下转换 ====================

impl Value {
    /// 取出原生对象（非原生 userdata 返回 None）
    pub fn to_native_object(&self) -> Option<NativeRef> {
        let Value::UserData(h) = self else {
            return None;
        };
        let (_, ud) = h.resolve().ok()?;
        native_of(&ud)
    }

    /// 受检向下转换：类型名或祖先名匹配且具体类型一致时返回对象，否则 None
    pub fn to_native<T: NativeObject + NativeType>(&self) -> Option<Rc<T>> {
        let obj = self.to_native_object()?;
        if !obj.is_a(T::TYPE_NAME) {
            return None;
        }
        obj.as_any_rc().downcast::<T>().ok()
    }

    pub fn native_is_a(&self, name: &str) -> bool {
        self.to_native_object().map(|o| o.is_a(name)).unwrap_or(false)
    }
}

//! 原生对象在引擎中的 userdata 外壳

use mlua::{Lua, MetaMethod, UserData, UserDataMethods, Value as LuaValue, Variadic};
use tracing::trace;

use super::{assign, NativeRef, Operation, Operator};
use crate::error::ScriptError;
use crate::state::State;
use crate::value::Value;

/// 持有原生对象的 userdata；被引擎回收时释放它持有的那一份引用
pub(crate) struct NativeCell(pub(crate) NativeRef);

/// 引擎值是否是原生对象 userdata
pub(crate) fn native_of(value: &LuaValue) -> Option<NativeRef> {
    match value {
        LuaValue::UserData(ud) => ud.borrow::<NativeCell>().ok().map(|cell| cell.0.clone()),
        _ => None,
    }
}

const OPERATORS: [(MetaMethod, Operator); 12] = [
    (MetaMethod::Add, Operator::Add),
    (MetaMethod::Sub, Operator::Sub),
    (MetaMethod::Mul, Operator::Mul),
    (MetaMethod::Div, Operator::Div),
    (MetaMethod::Mod, Operator::Mod),
    (MetaMethod::Pow, Operator::Pow),
    (MetaMethod::IDiv, Operator::IDiv),
    (MetaMethod::Unm, Operator::Unm),
    (MetaMethod::Concat, Operator::Concat),
    (MetaMethod::Eq, Operator::Eq),
    (MetaMethod::Lt, Operator::Lt),
    (MetaMethod::Le, Operator::Le),
];

fn dispatch_operator(lua: &Lua, op: Operator, lhs: Value, rhs: Value) -> mlua::Result<Value> {
    let state = State::from_lua(lua)?;
    let obj = lhs
        .to_native_object()
        .or_else(|| rhs.to_native_object())
        .ok_or_else(|| ScriptError::type_mismatch("operator dispatched without a native operand"))?;
    trace!(target: "moonbridge::native", type_name = obj.type_name(), op = op.as_str(), "operator");
    if !obj.supports(op.operation()) {
        return Err(ScriptError::type_mismatch(format!(
            "operator `{}` is not supported by `{}`",
            op.as_str(),
            obj.type_name()
        ))
        .into());
    }
    Ok(obj.operate(&state, op, &lhs, &rhs)?)
}

impl UserData for NativeCell {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| {
            let state = State::from_lua(lua)?;
            Ok(this.0.index(&state, &key)?)
        });

        methods.add_meta_method(MetaMethod::NewIndex, |lua, this, (key, value): (Value, Value)| {
            let state = State::from_lua(lua)?;
            Ok(assign(this.0.as_ref(), &state, &key, value)?)
        });

        methods.add_meta_method(MetaMethod::Call, |lua, this, args: Variadic<Value>| {
            let state = State::from_lua(lua)?;
            let ret = this.0.call(&state, args.into_iter().collect())?;
            Ok(ret.into_iter().collect::<Variadic<Value>>())
        });

        methods.add_meta_method(MetaMethod::Len, |lua, this, ()| {
            if !this.0.supports(Operation::Length) {
                return Err(ScriptError::type_mismatch(format!(
                    "`{}` has no length",
                    this.0.type_name()
                ))
                .into());
            }
            let state = State::from_lua(lua)?;
            Ok(this.0.length(&state)?)
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(this.0.to_display_string())
        });

        for (meta, op) in OPERATORS {
            methods.add_meta_function(meta, move |lua, (lhs, rhs): (Value, Value)| {
                dispatch_operator(lua, op, lhs, rhs)
            });
        }
    }
}

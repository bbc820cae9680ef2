//! Value 与 HostValue 之间的编组，以及重载选择

use tracing::trace;

use super::meta::{HostType, HostValue, Invokable};
use super::wrapper::Ownership;
use crate::coerce;
use crate::error::{Result, ScriptError};
use crate::state::State;
use crate::value::Value;

/// 参数值能否编组为声明的宿主类型（与 [`from_value`] 的成败一致）
pub fn accepts(ty: HostType, value: &Value) -> bool {
    match ty {
        HostType::Void => false,
        HostType::Bool => matches!(value, Value::Boolean(_) | Value::Nil),
        HostType::Int => value.to_integer().is_ok(),
        HostType::Double => value.to_number().is_ok(),
        HostType::String => value.to_lua_string().is_ok(),
        HostType::Object => value.is_nil() || value.to_host_object().is_some(),
        HostType::Native => value.is_nil() || value.to_native_object().is_some(),
        HostType::List => value.is_table(),
        HostType::Variant => true,
    }
}

/// 不需要字符串与数字互转即可接受
fn accepts_exact(ty: HostType, value: &Value) -> bool {
    match (ty, value) {
        (HostType::Int | HostType::Double, Value::String(_)) => false,
        (HostType::String, Value::Integer(_) | Value::Number(_)) => false,
        _ => accepts(ty, value),
    }
}

/// Value -> HostValue
pub fn from_value(ty: HostType, value: &Value) -> Result<HostValue> {
    let converted = match ty {
        HostType::Void => HostValue::Void,
        HostType::Bool => match value {
            Value::Boolean(b) => HostValue::Bool(*b),
            Value::Nil => HostValue::Bool(false),
            other => {
                return Err(ScriptError::type_mismatch(format!(
                    "expected boolean, found {}",
                    other.type_name()
                )))
            }
        },
        HostType::Int => HostValue::Int(value.to_integer()?),
        HostType::Double => HostValue::Double(value.to_number()?),
        HostType::String => HostValue::String(value.to_lua_string()?),
        HostType::Object => {
            if value.is_nil() {
                HostValue::Object(None)
            } else {
                let obj = value.to_host_object().ok_or_else(|| {
                    ScriptError::type_mismatch(format!(
                        "expected host object, found {}",
                        value.type_name()
                    ))
                })?;
                HostValue::Object(Some(obj))
            }
        }
        HostType::Native => {
            if value.is_nil() {
                HostValue::Native(None)
            } else {
                let obj = value.to_native_object().ok_or_else(|| {
                    ScriptError::type_mismatch(format!(
                        "expected native object, found {}",
                        value.type_name()
                    ))
                })?;
                HostValue::Native(Some(obj))
            }
        }
        HostType::List => {
            if !value.is_table() {
                return Err(ScriptError::type_mismatch(format!(
                    "expected table, found {}",
                    value.type_name()
                )));
            }
            let len = value.len()?;
            let mut items = Vec::with_capacity(len);
            for i in 1..=len {
                items.push(HostValue::Variant(value.index(i as i64)?));
            }
            HostValue::List(items)
        }
        HostType::Variant => HostValue::Variant(value.clone()),
    };
    Ok(converted)
}

/// HostValue -> Value；返回的宿主对象以观察者包装交给脚本
pub fn to_value(state: &State, value: HostValue) -> Result<Value> {
    let converted = match value {
        HostValue::Void => Value::Nil,
        HostValue::Bool(b) => Value::Boolean(b),
        HostValue::Int(i) => Value::Integer(i),
        HostValue::Double(d) => Value::Number(d),
        HostValue::String(s) => Value::String(s),
        HostValue::Object(Some(obj)) => state.wrap_object(obj, Ownership::Native)?,
        HostValue::Object(None) | HostValue::Native(None) => Value::Nil,
        HostValue::Native(Some(obj)) => state.wrap_native_ref(obj)?,
        HostValue::List(items) => {
            let table = state.new_table()?;
            for (i, item) in items.into_iter().enumerate() {
                table.set_index(i as i64 + 1, to_value(state, item)?)?;
            }
            table
        }
        HostValue::Variant(v) => v,
    };
    Ok(converted)
}

/// 按参数列表编组
pub fn marshal_args(params: &[HostType], args: &[Value]) -> Result<Vec<HostValue>> {
    params
        .iter()
        .zip(args)
        .map(|(ty, v)| from_value(*ty, v))
        .collect()
}

/// 选择重载：参数个数相同的候选中，先找无需字符串/数字互转的第一个，
/// 再找经转换可接受的第一个
pub fn select_overload<'a, T: Invokable>(
    candidates: impl IntoIterator<Item = &'a T>,
    args: &[Value],
) -> Option<&'a T>
where
    T: 'a,
{
    let candidates: Vec<&'a T> = candidates
        .into_iter()
        .filter(|c| c.params().len() == args.len())
        .collect();
    let matching = |check: fn(HostType, &Value) -> bool| {
        candidates
            .iter()
            .copied()
            .find(|c| c.params().iter().zip(args).all(|(ty, v)| check(*ty, v)))
    };
    let chosen = matching(accepts_exact).or_else(|| matching(accepts));
    trace!(target: "moonbridge::reflect", args = args.len(), found = chosen.is_some(), "overload resolution");
    chosen
}

/// 错误消息中使用的实参类型列表
pub(crate) fn describe_args(args: &[Value]) -> String {
    args.iter().map(Value::type_name).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::meta::MetaObject;

    #[test]
    fn test_accepts() {
        assert!(accepts(HostType::Double, &Value::Integer(2)));
        assert!(accepts(HostType::Int, &Value::Number(2.0)));
        assert!(!accepts(HostType::Int, &Value::Number(2.5)));
        assert!(accepts(HostType::Object, &Value::Nil));
        assert!(!accepts(HostType::Object, &Value::Integer(1)));
        assert!(accepts(HostType::String, &Value::Integer(1)));
        assert!(!accepts(HostType::List, &Value::Nil));
        assert!(accepts(HostType::Variant, &Value::Nil));
        assert!(accepts(HostType::Int, &Value::from("12")));
        assert!(accepts(HostType::Double, &Value::from("0x1p4")));
        assert!(!accepts(HostType::Int, &Value::from("1.5")));
        assert!(!accepts(HostType::Bool, &Value::Integer(0)));
    }

    #[test]
    fn test_accepts_agrees_with_from_value() {
        let values = [
            Value::Nil,
            Value::Boolean(true),
            Value::Integer(3),
            Value::Number(2.5),
            Value::from("7"),
            Value::from("abc"),
        ];
        let types = [HostType::Bool, HostType::Int, HostType::Double, HostType::String, HostType::Object];
        for ty in types {
            for v in &values {
                assert_eq!(accepts(ty, v), from_value(ty, v).is_ok(), "{:?} <- {:?}", ty, v);
            }
        }
    }

    #[test]
    fn test_from_value_scalars() {
        assert_eq!(from_value(HostType::Double, &Value::Integer(2)).unwrap().as_double(), Some(2.0));
        assert_eq!(from_value(HostType::Int, &Value::from("7")).unwrap().as_int(), Some(7));
        assert_eq!(from_value(HostType::Bool, &Value::Nil).unwrap().as_bool(), Some(false));
        assert!(from_value(HostType::Int, &Value::Boolean(true)).is_err());
    }

    #[test]
    fn test_select_overload_prefers_declaration_order() {
        let meta = MetaObject::builder("T")
            .method("f", &[HostType::Int], HostType::Int, |_, _| Ok(HostValue::Int(1)))
            .method("f", &[HostType::Double], HostType::Int, |_, _| Ok(HostValue::Int(2)))
            .method("f", &[HostType::String, HostType::Int], HostType::Int, |_, _| Ok(HostValue::Int(3)))
            .build();
        let fs = meta.methods_named("f");

        let m = select_overload(fs.iter().copied(), &[Value::Integer(1)]).unwrap();
        assert_eq!(m.signature(), "f(int)");

        let m = select_overload(fs.iter().copied(), &[Value::Number(1.5)]).unwrap();
        assert_eq!(m.signature(), "f(double)");

        let m = select_overload(fs.iter().copied(), &[Value::from("a"), Value::Integer(1)]).unwrap();
        assert_eq!(m.signature(), "f(string,int)");

        let m = select_overload(fs.iter().copied(), &[Value::from("4")]).unwrap();
        assert_eq!(m.signature(), "f(int)");

        let m = select_overload(fs.iter().copied(), &[Value::Integer(4), Value::Integer(1)]).unwrap();
        assert_eq!(m.signature(), "f(string,int)");

        assert!(select_overload(fs.iter().copied(), &[]).is_none());
    }
}

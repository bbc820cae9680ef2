//! 信号与槽
//!
//! 连接有两种接收方：
//! - 脚本可调用值：发射时参数编组为 Value，以 `(sender, args...)` 调用
//! - 宿主槽：宿主到宿主直接投递，不经过 Value；槽的参数列表必须是
//!   信号参数列表的前缀（`variant` 参数接受任意类型）
//!
//! 信号可以用名字或规范化签名指定。

use std::rc::{Rc, Weak};

use tracing::{debug, instrument, warn};

use super::marshal;
use super::meta::{HostType, HostValue, MethodDef};
use super::object::{self, ConnectionId, HostObject, HostRef, ReceiverKey};
use super::wrapper::Ownership;
use crate::error::{ErrorKind, Result, ScriptError};
use crate::state::{State, StateInner};
use crate::value::Value;

fn find_signal<'a>(meta: &'a super::MetaObject, signal: &str) -> Result<&'a MethodDef> {
    meta.signal(signal).ok_or_else(|| {
        ScriptError::name_not_found(format!(
            "no signal `{}` in `{}`",
            signal,
            meta.class_name()
        ))
    })
}

fn is_callable(value: &Value) -> bool {
    matches!(value, Value::Function(_) | Value::Table(_) | Value::UserData(_))
}

/// 槽参数是否是信号参数的兼容前缀
pub fn is_compatible(signal: &[HostType], slot: &[HostType]) -> bool {
    slot.len() <= signal.len()
        && slot
            .iter()
            .zip(signal)
            .all(|(s, g)| s == g || *s == HostType::Variant)
}

/// 把信号连接到脚本可调用值
#[instrument(target = "moonbridge::reflect", skip(state, source, callable))]
pub fn connect(state: &State, source: &HostRef, signal: &str, callable: Value) -> Result<ConnectionId> {
    let meta = source.meta_object();
    let def = find_signal(&meta, signal)?;
    if !is_callable(&callable) {
        return Err(ScriptError::new(
            ErrorKind::NotCallable,
            format!("cannot connect `{}` to a {} value", def.signature(), callable.type_name()),
        ));
    }
    source.core().ensure_alive(meta.class_name())?;

    let weak_state: Weak<StateInner> = Rc::downgrade(state.inner());
    let receiver = callable.clone();
    let deliver = Rc::new(move |sender: &HostRef, args: &[HostValue]| -> Result<()> {
        let inner = weak_state.upgrade().ok_or_else(ScriptError::state_closed)?;
        let state = State::from_inner(inner);
        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(state.wrap_object(sender.clone(), Ownership::Native)?);
        for arg in args {
            call_args.push(marshal::to_value(&state, arg.clone())?);
        }
        receiver.call(&call_args)?;
        Ok(())
    });

    let id = source
        .core()
        .add_connection(def.signature(), ReceiverKey::Script(callable), deliver);
    debug!(target: "moonbridge::reflect", signal = %def.signature(), "connected script receiver");
    Ok(id)
}

/// 把信号连接到另一个宿主对象的槽
#[instrument(target = "moonbridge::reflect", skip(source, target))]
pub fn connect_slot(source: &HostRef, signal: &str, target: &HostRef, slot: &str) -> Result<ConnectionId> {
    let source_meta = source.meta_object();
    let target_meta = target.meta_object();
    let signal_def = find_signal(&source_meta, signal)?;
    let slot_def = target_meta.slot(slot).ok_or_else(|| {
        ScriptError::name_not_found(format!(
            "no slot `{}` in `{}`",
            slot,
            target_meta.class_name()
        ))
    })?;
    if !is_compatible(&signal_def.params, &slot_def.params) {
        return Err(ScriptError::new(
            ErrorKind::SignatureMismatch,
            format!(
                "slot `{}` is not compatible with signal `{}`",
                slot_def.signature(),
                signal_def.signature()
            ),
        ));
    }
    let Some(invoker) = slot_def.invoker().cloned() else {
        return Err(ScriptError::not_callable(&slot_def.signature()));
    };
    source.core().ensure_alive(source_meta.class_name())?;
    target.core().ensure_alive(target_meta.class_name())?;

    let arity = slot_def.params.len();
    let weak_target: Weak<dyn HostObject> = Rc::downgrade(target);
    let deliver = Rc::new(move |_sender: &HostRef, args: &[HostValue]| -> Result<()> {
        // 目标已释放或销毁时静默跳过
        let Some(target) = weak_target.upgrade() else {
            return Ok(());
        };
        if target.core().is_destroyed() {
            return Ok(());
        }
        invoker(&target, args[..arity.min(args.len())].to_vec())?;
        Ok(())
    });

    let key = ReceiverKey::Slot {
        target: target_identity(target),
        slot: slot_def.signature(),
    };
    let id = source.core().add_connection(signal_def.signature(), key, deliver);
    debug!(target: "moonbridge::reflect", signal = %signal_def.signature(), slot = %slot_def.signature(), "connected host slot");
    Ok(id)
}

/// 断开脚本接收方；`callable` 为 None 时断开该信号的全部连接。返回是否有连接被移除
pub fn disconnect(source: &HostRef, signal: &str, callable: Option<&Value>) -> Result<bool> {
    let meta = source.meta_object();
    let def = find_signal(&meta, signal)?;
    let key = callable.map(|c| ReceiverKey::Script(c.clone()));
    let removed = source.core().remove_connections(&def.signature(), key.as_ref());
    debug!(target: "moonbridge::reflect", signal = %def.signature(), removed, "disconnect");
    Ok(removed > 0)
}

/// 断开某个宿主槽
pub fn disconnect_slot(source: &HostRef, signal: &str, target: &HostRef, slot: &str) -> Result<bool> {
    let source_meta = source.meta_object();
    let target_meta = target.meta_object();
    let signal_def = find_signal(&source_meta, signal)?;
    let slot_def = target_meta.slot(slot).ok_or_else(|| {
        ScriptError::name_not_found(format!(
            "no slot `{}` in `{}`",
            slot,
            target_meta.class_name()
        ))
    })?;
    let key = ReceiverKey::Slot {
        target: target_identity(target),
        slot: slot_def.signature(),
    };
    let removed = source
        .core()
        .remove_connections(&signal_def.signature(), Some(&key));
    Ok(removed > 0)
}

/// 从原生侧发射信号
pub fn emit(source: &HostRef, signal: &str, args: Vec<HostValue>) -> Result<()> {
    let meta = source.meta_object();
    let def = find_signal(&meta, signal)?;
    source.core().ensure_alive(meta.class_name())?;
    if args.len() != def.params.len() {
        return Err(ScriptError::type_mismatch(format!(
            "signal `{}` expects {} argument(s), got {}",
            def.signature(),
            def.params.len(),
            args.len()
        )));
    }
    source.core().emit(source, &def.signature(), &args)
}

fn descendants(obj: &HostRef, out: &mut Vec<HostRef>) {
    for child in object::children_of(obj) {
        out.push(child.clone());
        descendants(&child, out);
    }
}

/// 按 `on_<对象名>_<信号名>` 命名约定，把具名后代的信号连接到 `target` 的槽
///
/// 返回建立的连接数；找不到对应信号的槽只记录日志。
#[instrument(target = "moonbridge::reflect", skip(target))]
pub fn connect_slots_by_name(target: &HostRef) -> Result<usize> {
    let meta = target.meta_object();
    target.core().ensure_alive(meta.class_name())?;
    let mut children = Vec::new();
    descendants(target, &mut children);

    let mut connected = 0;
    for slot in meta.slots() {
        let Some(rest) = slot.name.strip_prefix("on_") else {
            continue;
        };
        let matched = children.iter().find_map(|child| {
            let name = child.core().object_name();
            if name.is_empty() {
                return None;
            }
            let signal_name = rest.strip_prefix(name.as_str())?.strip_prefix('_')?;
            let child_meta = child.meta_object();
            let signal = child_meta.signal(signal_name)?;
            is_compatible(&signal.params, &slot.params).then(|| (child.clone(), signal.signature()))
        });
        match matched {
            Some((child, signal)) => {
                connect_slot(&child, &signal, target, &slot.signature())?;
                connected += 1;
            }
            None => warn!(target: "moonbridge::reflect", slot = %slot.signature(), "no matching signal for slot"),
        }
    }
    debug!(target: "moonbridge::reflect", connected, "connected slots by name");
    Ok(connected)
}

/// 发射 `destroyed()` 后销毁对象，再依次销毁其子对象
pub fn destroy(source: &HostRef) {
    if source.core().is_destroyed() {
        return;
    }
    if source.meta_object().signal("destroyed()").is_some() {
        // 接收方失败已在 emit 中记录
        let _ = source.core().emit(source, "destroyed()", &[]);
    }
    source.core().destroy();
    object::detach(source);
    for child in source.core().take_children() {
        destroy(&child);
    }
}

fn target_identity(target: &HostRef) -> usize {
    Rc::as_ptr(target) as *const () as usize
}

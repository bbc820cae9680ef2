//! 协程桥接
//!
//! 协程以 `Value::Thread` 的形式出现，调用它即恢复执行：
//! 调用参数成为 `yield` 的返回值（首次恢复时成为函数参数），
//! `yield` 的参数或函数的最终返回值成为调用结果。
//!
//! 协程结束（正常返回或抛出错误）后进入 `Dead`，再次恢复返回 `CoroutineDead`。
//! 原生函数不能在调用中途挂起；它调用的协程若挂起，挂起的值作为普通返回值交给它。

use std::rc::Rc;

use mlua::{MultiValue, Table, Thread, ThreadStatus, Value as LuaValue};
use tracing::{debug, instrument};

use crate::error::{ErrorKind, Result, ScriptError};
use crate::handle::Handle;
use crate::stack::StackFrame;
use crate::state::{State, StateInner};
use crate::value::{from_engine, from_engine_multi, to_engine_multi, Value};

/// 协程状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadState {
    /// 已创建，尚未恢复过
    SuspendedFresh,
    /// 在 `yield` 处挂起
    SuspendedYielded,
    /// 正在执行
    Running,
    /// 已结束，不可再恢复
    Dead,
}

impl ThreadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadState::SuspendedFresh => "suspended",
            ThreadState::SuspendedYielded => "yielded",
            ThreadState::Running => "running",
            ThreadState::Dead => "dead",
        }
    }
}

fn engine_thread(handle: &Handle) -> Result<(Rc<StateInner>, Thread)> {
    let (inner, value) = handle.resolve()?;
    match value {
        LuaValue::Thread(thread) => Ok((inner, thread)),
        other => Err(ScriptError::type_mismatch(format!(
            "expected thread, found {}",
            other.type_name()
        ))),
    }
}

fn resumed_table(inner: &StateInner) -> mlua::Result<Table> {
    inner.lua.registry_value::<Table>(&inner.resumed)
}

fn state_of(inner: &StateInner, thread: &Thread) -> Result<ThreadState> {
    let state = match thread.status() {
        ThreadStatus::Resumable => {
            let resumed: Option<bool> = resumed_table(inner)?.raw_get(thread.clone())?;
            if resumed.unwrap_or(false) {
                ThreadState::SuspendedYielded
            } else {
                ThreadState::SuspendedFresh
            }
        }
        ThreadStatus::Running => ThreadState::Running,
        _ => ThreadState::Dead,
    };
    Ok(state)
}

/// 恢复协程
#[instrument(target = "moonbridge::coroutine", skip(handle, args), fields(thread = handle.identity(), args = args.len()))]
pub(crate) fn resume(handle: &Handle, args: &[Value]) -> Result<Vec<Value>> {
    let (inner, thread) = engine_thread(handle)?;
    let _frame = StackFrame::enter(&inner, "resume");

    match state_of(&inner, &thread)? {
        ThreadState::Dead => {
            return Err(ScriptError::new(ErrorKind::CoroutineDead, "cannot resume dead coroutine")
                .with_tag("coroutine.resume"))
        }
        ThreadState::Running => {
            return Err(ScriptError::new(
                ErrorKind::EngineRuntime,
                "cannot resume non-suspended coroutine",
            )
            .with_tag("coroutine.resume"))
        }
        ThreadState::SuspendedFresh | ThreadState::SuspendedYielded => {}
    }
    resumed_table(&inner)?.raw_set(thread.clone(), true)?;

    let args = to_engine_multi(&inner, args)?;
    match thread.resume::<MultiValue>(args) {
        Ok(ret) => {
            let values = from_engine_multi(&inner, ret)?;
            debug!(
                target: "moonbridge::coroutine",
                returned = values.len(),
                state = state_of(&inner, &thread)?.as_str(),
                "resume completed"
            );
            Ok(values)
        }
        Err(e) => {
            let err = ScriptError::from(e);
            debug!(target: "moonbridge::coroutine", kind = %err.kind(), error = %err, "coroutine failed");
            Err(err)
        }
    }
}

impl State {
    /// 由函数创建协程（初始为 `SuspendedFresh`）
    pub fn new_thread(&self, function: &Value) -> Result<Value> {
        let Value::Function(h) = function else {
            return Err(ScriptError::type_mismatch(format!(
                "cannot create a coroutine from a {} value",
                function.type_name()
            ))
            .with_tag("coroutine.create"));
        };
        let inner = self.inner();
        if !h.belongs_to(inner) {
            return Err(ScriptError::type_mismatch("function belongs to another state")
                .with_tag("coroutine.create"));
        }
        let _frame = StackFrame::enter(inner, "new_thread");
        let LuaValue::Function(f) = h.engine_value(inner)? else {
            return Err(ScriptError::type_mismatch("expected function").with_tag("coroutine.create"));
        };
        let thread = inner.lua.create_thread(f)?;
        debug!(target: "moonbridge::coroutine", "thread created");
        Ok(from_engine(inner, LuaValue::Thread(thread))?)
    }
}

impl Value {
    /// 协程状态（非协程值返回 `TypeMismatch`）
    pub fn thread_state(&self) -> Result<ThreadState> {
        let Value::Thread(h) = self else {
            return Err(ScriptError::type_mismatch(format!(
                "{} value is not a coroutine",
                self.type_name()
            )));
        };
        let (inner, thread) = engine_thread(h)?;
        state_of(&inner, &thread)
    }

    /// 协程是否已结束
    pub fn is_dead(&self) -> bool {
        matches!(self.thread_state(), Ok(ThreadState::Dead))
    }
}

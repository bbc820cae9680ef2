//! 引擎对象句柄
//!
//! [`Handle`] 拥有引擎注册表中的一个锚点，指向一个表格、函数、协程或 userdata。
//! 克隆句柄只增加引用计数；最后一个克隆被释放时注册表槽位随之释放，
//! 引擎随后可以独立回收该对象。
//!
//! 句柄只对创建它的 State 有效。State 关闭后所有残留句柄的操作都返回
//! `StateClosed`。

use std::fmt;
use std::rc::{Rc, Weak};

use mlua::{RegistryKey, Value as LuaValue};
use tracing::trace;

use crate::error::{Result, ScriptError};
use crate::state::StateInner;

/// 句柄指向的引擎对象种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Table,
    Function,
    Thread,
    UserData,
}

impl HandleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleKind::Table => "table",
            HandleKind::Function => "function",
            HandleKind::Thread => "thread",
            HandleKind::UserData => "userdata",
        }
    }
}

struct Slot {
    key: RegistryKey,
    kind: HandleKind,
    /// 锚定时的对象地址（锚定期间对象不会移动）
    ptr: usize,
    state: Weak<StateInner>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(inner) = self.state.upgrade() {
            inner.live_handles.set(inner.live_handles.get().saturating_sub(1));
            trace!(target: "moonbridge::value", kind = self.kind.as_str(), ptr = self.ptr, "release handle");
        }
    }
}

/// 引用计数的注册表锚点
#[derive(Clone)]
pub struct Handle(Rc<Slot>);

impl Handle {
    /// 为引擎值分配注册表槽位
    pub(crate) fn anchor(
        inner: &Rc<StateInner>,
        kind: HandleKind,
        value: LuaValue,
    ) -> mlua::Result<Handle> {
        let ptr = value.to_pointer() as usize;
        let key = inner.lua.create_registry_value(value)?;
        inner.live_handles.set(inner.live_handles.get() + 1);
        trace!(target: "moonbridge::value", kind = kind.as_str(), ptr, "anchor handle");
        Ok(Handle(Rc::new(Slot {
            key,
            kind,
            ptr,
            state: Rc::downgrade(inner),
        })))
    }

    pub fn kind(&self) -> HandleKind {
        self.0.kind
    }

    /// 对象地址，同一引擎对象的所有句柄相同
    pub fn identity(&self) -> usize {
        self.0.ptr
    }

    /// 两个句柄是否指向同一个引擎对象
    pub fn same_object(&self, other: &Handle) -> bool {
        self.0.ptr == other.0.ptr && Weak::ptr_eq(&self.0.state, &other.0.state)
    }

    /// 所属 State 是否仍然存活
    pub fn is_valid(&self) -> bool {
        self.0.state.strong_count() > 0
    }

    pub(crate) fn state(&self) -> Result<Rc<StateInner>> {
        self.0.state.upgrade().ok_or_else(ScriptError::state_closed)
    }

    pub(crate) fn belongs_to(&self, inner: &Rc<StateInner>) -> bool {
        std::ptr::eq(self.0.state.as_ptr(), Rc::as_ptr(inner))
    }

    /// 从注册表取出引擎值
    pub(crate) fn engine_value(&self, inner: &StateInner) -> mlua::Result<LuaValue> {
        inner.lua.registry_value::<LuaValue>(&self.0.key)
    }

    /// 取出所属 State 与引擎值
    pub(crate) fn resolve(&self) -> Result<(Rc<StateInner>, LuaValue)> {
        let inner = self.state()?;
        let value = self.engine_value(&inner)?;
        Ok((inner, value))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: 0x{:x}", self.0.kind.as_str(), self.0.ptr)
    }
}

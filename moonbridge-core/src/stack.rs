//! 桥接栈帧
//!
//! 每个进入引擎的公开操作都持有一个 [`StackFrame`]，离开作用域时（包括
//! `?` 提前返回）自动出栈。`State::check_stack_balance` 依据这里的深度判断
//! 桥接栈是否回到入口状态。

use tracing::trace;

use crate::state::StateInner;

pub(crate) struct StackFrame<'a> {
    inner: &'a StateInner,
    op: &'static str,
}

impl<'a> StackFrame<'a> {
    pub(crate) fn enter(inner: &'a StateInner, op: &'static str) -> Self {
        let depth = inner.depth.get() + 1;
        inner.depth.set(depth);
        trace!(target: "moonbridge::state", op, depth, "enter frame");
        StackFrame { inner, op }
    }
}

impl Drop for StackFrame<'_> {
    fn drop(&mut self) {
        let depth = self.inner.depth.get().saturating_sub(1);
        self.inner.depth.set(depth);
        trace!(target: "moonbridge::state", op = self.op, depth, "leave frame");
    }
}

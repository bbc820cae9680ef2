//! 表格遍历
//!
//! 遍历在创建时对表格做原始快照（不经过 `__index` / `__pairs`），
//! 因此带拦截元方法的表格也能安全遍历。遍历期间修改表格的结果不作保证。

use mlua::Value as LuaValue;

use super::ops::engine_table;
use super::{from_engine, Value};
use crate::error::{Result, ScriptError};
use crate::stack::StackFrame;

/// 一个表格条目
#[derive(Clone, Debug)]
pub struct Entry {
    table: Value,
    key: Value,
    value: Value,
}

impl Entry {
    pub fn key(&self) -> &Value {
        &self.key
    }

    /// 快照时的值
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// 写回该键：键仍存在时直接覆盖，已被移除时经由 `__newindex`
    pub fn set(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.table.set_index(self.key.clone(), value.clone())?;
        self.value = value;
        Ok(())
    }
}

/// 表格条目迭代器
#[derive(Debug)]
pub struct TableIter {
    entries: std::vec::IntoIter<Entry>,
}

impl Iterator for TableIter {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for TableIter {}

impl Value {
    /// 遍历表格的 (键, 值) 条目
    pub fn iter(&self) -> Result<TableIter> {
        let Value::Table(h) = self else {
            return Err(ScriptError::type_mismatch(format!(
                "cannot iterate a {} value",
                self.type_name()
            ))
            .with_tag("value.iter"));
        };
        let inner = h.state()?;
        let _frame = StackFrame::enter(&inner, "iter");
        let table = engine_table(h, &inner)?;

        let mut entries = Vec::new();
        for pair in table.pairs::<LuaValue, LuaValue>() {
            let (key, value) = pair?;
            entries.push(Entry {
                table: self.clone(),
                key: from_engine(&inner, key)?,
                value: from_engine(&inner, value)?,
            });
        }
        Ok(TableIter {
            entries: entries.into_iter(),
        })
    }
}

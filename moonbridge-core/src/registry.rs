//! 进程级注册表
//!
//! 两张表都是惰性初始化、只增不删的：
//! - 类型表：类名 -> 类型描述 + 默认创建函数，类名中的 `:` 规范化为 `_`
//! - 函数表：点分路径 -> 原生函数，此后创建的每个 State 都会安装
//!
//! 注册表可以从任意线程写入；State 本身仍是单线程的。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::error::Result;
use crate::reflect::{HostRef, MetaObject};
use crate::state::State;
use crate::value::Value;

/// 原生函数指针类型
pub type NativeFn = fn(&State, Vec<Value>) -> Result<Vec<Value>>;

/// 无参默认创建函数
pub type Creator = Arc<dyn Fn() -> HostRef + Send + Sync>;

/// 类型表条目
#[derive(Clone)]
pub struct TypeEntry {
    pub id: usize,
    pub meta: Arc<MetaObject>,
    pub creator: Option<Creator>,
}

#[derive(Default)]
struct TypeTable {
    entries: Vec<TypeEntry>,
    by_name: HashMap<String, usize>,
}

static TYPES: Lazy<RwLock<TypeTable>> = Lazy::new(|| RwLock::new(TypeTable::default()));
static FUNCTIONS: Lazy<RwLock<Vec<(String, NativeFn)>>> = Lazy::new(|| RwLock::new(Vec::new()));

/// `Foo::Bar` -> `Foo__Bar`
pub fn normalize_type_name(name: &str) -> String {
    name.replace(':', "_")
}

/// 注册宿主类型，返回类型编号；同名类型已注册时返回已有编号
pub fn register_type(meta: Arc<MetaObject>, creator: Option<Creator>) -> usize {
    let name = normalize_type_name(meta.class_name());
    let mut table = TYPES.write().unwrap_or_else(|e| e.into_inner());
    if let Some(&id) = table.by_name.get(&name) {
        debug!(target: "moonbridge::registry", name = %name, id, "type already registered");
        return id;
    }
    let id = table.entries.len();
    table.entries.push(TypeEntry { id, meta, creator });
    table.by_name.insert(name.clone(), id);
    debug!(target: "moonbridge::registry", name = %name, id, "register type");
    id
}

/// 按类名查找（接受未规范化的类名）
pub fn lookup_type(name: &str) -> Option<TypeEntry> {
    let table = TYPES.read().unwrap_or_else(|e| e.into_inner());
    let id = *table.by_name.get(&normalize_type_name(name))?;
    table.entries.get(id).cloned()
}

pub fn lookup_type_id(id: usize) -> Option<TypeEntry> {
    let table = TYPES.read().unwrap_or_else(|e| e.into_inner());
    table.entries.get(id).cloned()
}

pub fn type_id(name: &str) -> Option<usize> {
    lookup_type(name).map(|e| e.id)
}

/// 已注册的规范化类名，按注册顺序
pub fn registered_types() -> Vec<String> {
    let table = TYPES.read().unwrap_or_else(|e| e.into_inner());
    table
        .entries
        .iter()
        .map(|e| normalize_type_name(e.meta.class_name()))
        .collect()
}

/// 注册原生函数，安装到此后创建的每个 State 的 `path` 处
pub fn register_function(path: &str, f: NativeFn) {
    let mut functions = FUNCTIONS.write().unwrap_or_else(|e| e.into_inner());
    if functions.iter().any(|(p, _)| p == path) {
        warn!(target: "moonbridge::registry", path, "function already registered, keeping the first");
        return;
    }
    functions.push((path.to_string(), f));
    debug!(target: "moonbridge::registry", path, "register function");
}

pub(crate) fn functions() -> Vec<(String, NativeFn)> {
    FUNCTIONS.read().unwrap_or_else(|e| e.into_inner()).clone()
}

//! State：一个引擎实例及其桥接簿记
//!
//! `State` 是廉价克隆的共享句柄。它负责：
//! - 执行源码（编译或运行失败统一为 [`ScriptError`]）
//! - 点分全局路径的读写
//! - 注册表锚点与桥接栈深度的簿记
//! - 创建表格、协程，包装原生对象与宿主对象
//!
//! State 不是 `Send`：所有值、句柄与回调都在同一线程上运行。

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use mlua::{Function, Lua, LuaOptions, MultiValue, RegistryKey, StdLib, Value as LuaValue};
use tracing::{debug, info, instrument, warn};

use moonbridge_config::{BridgeConfig, StdLibrary};

use crate::error::{ErrorKind, Result, ScriptError};
use crate::native::{NativeCell, NativeObject, NativeRef};
use crate::registry::{self, NativeFn};
use crate::stack::StackFrame;
use crate::value::{from_engine, from_engine_multi, to_engine, Value};

/// 存放在引擎 app data 中，回调借此找回所属 State
pub(crate) struct StateLink(Weak<StateInner>);

const HELPERS: &str = r#"
return function(o, k) return o[k] end,
       function(o, k, v) o[k] = v end,
       function(f, ...) return f(...) end
"#;

pub(crate) struct StateInner {
    pub(crate) config: BridgeConfig,
    /// 桥接栈深度
    pub(crate) depth: Cell<usize>,
    /// 存活的注册表锚点数
    pub(crate) live_handles: Cell<usize>,
    index_fn: RegistryKey,
    new_index_fn: RegistryKey,
    call_fn: RegistryKey,
    /// 经桥接恢复过的协程（弱键表）
    pub(crate) resumed: RegistryKey,
    /// 宿主对象地址 -> 包装 userdata（弱值表）
    pub(crate) wrappers: RegistryKey,
    /// 最后析构：注册表锚点先于引擎释放
    pub(crate) lua: Lua,
}

impl StateInner {
    pub(crate) fn from_lua(lua: &Lua) -> mlua::Result<Rc<StateInner>> {
        lua.app_data_ref::<StateLink>()
            .and_then(|link| link.0.upgrade())
            .ok_or_else(|| ScriptError::state_closed().into())
    }

    pub(crate) fn engine_index(&self, obj: LuaValue, key: LuaValue) -> mlua::Result<LuaValue> {
        let f: Function = self.lua.registry_value(&self.index_fn)?;
        f.call((obj, key))
    }

    pub(crate) fn engine_new_index(&self, obj: LuaValue, key: LuaValue, value: LuaValue) -> mlua::Result<()> {
        let f: Function = self.lua.registry_value(&self.new_index_fn)?;
        f.call((obj, key, value))
    }

    pub(crate) fn engine_call(&self, callable: LuaValue, args: MultiValue) -> mlua::Result<MultiValue> {
        let f: Function = self.lua.registry_value(&self.call_fn)?;
        let mut all = MultiValue::new();
        all.push_back(callable);
        all.extend(args);
        f.call(all)
    }
}

/// 引擎实例
#[derive(Clone)]
pub struct State {
    inner: Rc<StateInner>,
}

fn weak_table(lua: &Lua, mode: &str) -> mlua::Result<mlua::Table> {
    let table = lua.create_table()?;
    let meta = lua.create_table()?;
    meta.set("__mode", mode)?;
    table.set_metatable(Some(meta));
    Ok(table)
}

fn std_libs(libraries: &[StdLibrary]) -> StdLib {
    libraries.iter().fold(StdLib::NONE, |acc, lib| {
        acc | match lib {
            StdLibrary::Coroutine => StdLib::COROUTINE,
            StdLibrary::Table => StdLib::TABLE,
            StdLibrary::Io => StdLib::IO,
            StdLibrary::Os => StdLib::OS,
            StdLibrary::String => StdLib::STRING,
            StdLibrary::Utf8 => StdLib::UTF8,
            StdLibrary::Math => StdLib::MATH,
            StdLibrary::Package => StdLib::PACKAGE,
        }
    })
}

impl State {
    // ==================== 构造 ====================

    /// 使用默认配置创建
    pub fn new() -> Result<State> {
        Self::with_config(BridgeConfig::default())
    }

    #[instrument(target = "moonbridge::state", skip(config), fields(libs = config.engine.libraries.len()))]
    pub fn with_config(config: BridgeConfig) -> Result<State> {
        let lua = Lua::new_with(std_libs(&config.engine.libraries), LuaOptions::default())?;

        let (index_f, new_index_f, call_f): (Function, Function, Function) =
            lua.load(HELPERS).set_name("=moonbridge").call(())?;
        let index_fn = lua.create_registry_value(index_f)?;
        let new_index_fn = lua.create_registry_value(new_index_f)?;
        let call_fn = lua.create_registry_value(call_f)?;

        let resumed = lua.create_registry_value(weak_table(&lua, "k")?)?;
        let wrappers = lua.create_registry_value(weak_table(&lua, "v")?)?;

        let inner = Rc::new(StateInner {
            config,
            depth: Cell::new(0),
            live_handles: Cell::new(0),
            index_fn,
            new_index_fn,
            call_fn,
            resumed,
            wrappers,
            lua,
        });
        inner.lua.set_app_data(StateLink(Rc::downgrade(&inner)));

        let state = State { inner };

        let functions = registry::functions();
        for (path, f) in &functions {
            state.register_function(path, *f)?;
        }
        if state.inner.config.host_lib.enabled {
            crate::hostlib::install(&state)?;
        }

        info!(
            target: "moonbridge::state",
            functions = functions.len(),
            host_lib = state.inner.config.host_lib.enabled,
            "state created"
        );
        Ok(state)
    }

    pub(crate) fn from_inner(inner: Rc<StateInner>) -> State {
        State { inner }
    }

    /// 回调中找回所属 State
    pub(crate) fn from_lua(lua: &Lua) -> mlua::Result<State> {
        StateInner::from_lua(lua).map(State::from_inner)
    }

    pub(crate) fn inner(&self) -> &Rc<StateInner> {
        &self.inner
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    // ==================== 执行 ====================

    /// 执行源码，返回块的返回值
    pub fn execute(&self, source: &str) -> Result<Vec<Value>> {
        let name = self.inner.config.engine.chunk_name.clone();
        self.execute_named(&name, source)
    }

    #[instrument(target = "moonbridge::state", skip(self, source), fields(len = source.len()))]
    pub fn execute_named(&self, name: &str, source: &str) -> Result<Vec<Value>> {
        let entry_depth = self.inner.depth.get();
        let result = {
            let _frame = StackFrame::enter(&self.inner, "execute");
            self.inner
                .lua
                .load(source)
                .set_name(name)
                .call::<MultiValue>(())
                .map_err(ScriptError::from)
                .and_then(|ret| Ok(from_engine_multi(&self.inner, ret)?))
        };

        match &result {
            Ok(values) => debug!(target: "moonbridge::state", returned = values.len(), "execution completed"),
            Err(e) => debug!(target: "moonbridge::state", kind = %e.kind(), error = %e, "execution failed"),
        }

        if self.inner.config.debug.check_stack && self.inner.depth.get() != entry_depth {
            let err = ScriptError::new(
                ErrorKind::StackImbalance,
                format!(
                    "bridge depth {} after execute, expected {}",
                    self.inner.depth.get(),
                    entry_depth
                ),
            )
            .with_tag("state.execute");
            warn!(target: "moonbridge::state", error = %err, "stack imbalance after execute");
            return Err(err);
        }
        result
    }

    // ==================== 全局路径 ====================

    /// 全局表
    pub fn globals(&self) -> Result<Value> {
        let _frame = StackFrame::enter(&self.inner, "globals");
        Ok(from_engine(&self.inner, LuaValue::Table(self.inner.lua.globals()))?)
    }

    /// 读取点分路径 `a.b.c`（经由元方法，原生对象也可作为中间值）
    pub fn get(&self, path: &str) -> Result<Value> {
        let _frame = StackFrame::enter(&self.inner, "get");
        let segments = split_path(path)?;
        let mut current = self.globals()?;
        for (i, segment) in segments.iter().enumerate() {
            if !is_indexable(&current) {
                return Err(path_mismatch(path, &segments[..i], &current).with_tag("state.get"));
            }
            current = current.index(*segment)?;
        }
        Ok(current)
    }

    /// 写入点分路径，缺失的中间表格会被创建
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let _frame = StackFrame::enter(&self.inner, "set");
        let segments = split_path(path)?;
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return Err(ScriptError::name_not_found("empty path").with_tag("state.set")),
        };

        let mut current = self.globals()?;
        for (i, segment) in parents.iter().enumerate() {
            let mut next = current.index(*segment)?;
            if next.is_nil() {
                next = self.new_table()?;
                current.set_index(*segment, next.clone())?;
            } else if !is_indexable(&next) {
                return Err(path_mismatch(path, &segments[..=i], &next).with_tag("state.set"));
            }
            current = next;
        }
        current.set_index(*last, value)
    }

    // ==================== 栈簿记 ====================

    /// 没有打开的桥接帧时返回 Ok
    ///
    /// 引擎的值栈由 mlua 自行维护，这里只统计桥接帧；帧随作用域关闭，
    /// 因此在公开操作之外深度总是 0。在桥接回调内部调用（外层操作的
    /// 帧仍打开）或帧泄漏时返回 `StackImbalance`。
    pub fn check_stack_balance(&self) -> Result<()> {
        match self.inner.depth.get() {
            0 => Ok(()),
            depth => Err(ScriptError::new(
                ErrorKind::StackImbalance,
                format!("{} bridge frame(s) still open", depth),
            )
            .with_tag("state.stack")),
        }
    }

    pub fn stack_depth(&self) -> usize {
        self.inner.depth.get()
    }

    /// 存活的注册表锚点数
    pub fn live_handles(&self) -> usize {
        self.inner.live_handles.get()
    }

    /// 执行一次完整的垃圾回收
    pub fn collect_garbage(&self) -> Result<()> {
        let _frame = StackFrame::enter(&self.inner, "collect_garbage");
        // 已释放的句柄只是排队，先真正移出注册表
        self.inner.lua.expire_registry_values();
        self.inner.lua.gc_collect()?;
        // 两轮：第一轮运行终结器，第二轮回收终结器释放的对象
        self.inner.lua.gc_collect()?;
        Ok(())
    }

    // ==================== 值工厂 ====================

    pub fn new_table(&self) -> Result<Value> {
        let _frame = StackFrame::enter(&self.inner, "new_table");
        let table = self.inner.lua.create_table()?;
        Ok(from_engine(&self.inner, LuaValue::Table(table))?)
    }

    /// 由 Rust 值序列构造序列表格
    pub fn new_sequence<I, V>(&self, items: I) -> Result<Value>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let table = self.new_table()?;
        for (i, item) in items.into_iter().enumerate() {
            table.set_index(i as i64 + 1, item)?;
        }
        Ok(table)
    }

    /// 把原生对象包装为 userdata
    pub fn wrap_native<T: NativeObject>(&self, obj: T) -> Result<Value> {
        self.wrap_native_ref(Rc::new(obj))
    }

    pub fn wrap_native_ref(&self, obj: NativeRef) -> Result<Value> {
        let _frame = StackFrame::enter(&self.inner, "wrap_native");
        debug!(target: "moonbridge::native", type_name = obj.type_name(), "wrap native object");
        let ud = self.inner.lua.create_userdata(NativeCell(obj))?;
        Ok(from_engine(&self.inner, LuaValue::UserData(ud))?)
    }

    /// 把原生函数包装为脚本函数值
    pub fn create_function(&self, f: NativeFn) -> Result<Value> {
        let _frame = StackFrame::enter(&self.inner, "create_function");
        let function = self.inner.lua.create_function(move |lua, args: mlua::Variadic<Value>| {
            let state = State::from_lua(lua)?;
            let ret = f(&state, args.into_iter().collect())?;
            Ok(ret.into_iter().collect::<mlua::Variadic<Value>>())
        })?;
        Ok(from_engine(&self.inner, LuaValue::Function(function))?)
    }

    /// 注册原生函数到点分路径
    pub fn register_function(&self, path: &str, f: NativeFn) -> Result<()> {
        let value = self.create_function(f)?;
        debug!(target: "moonbridge::registry", path, "install function");
        self.set(path, value)
    }

    /// 把 Value 转为引擎值（供宿主库内部使用）
    pub(crate) fn to_engine(&self, value: &Value) -> Result<LuaValue> {
        Ok(to_engine(&self.inner, value)?)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("depth", &self.inner.depth.get())
            .field("live_handles", &self.inner.live_handles.get())
            .field("config", &self.inner.config)
            .finish()
    }
}

fn split_path(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ScriptError::name_not_found(format!("malformed path `{}`", path)));
    }
    Ok(segments)
}

fn is_indexable(value: &Value) -> bool {
    matches!(value, Value::Table(_) | Value::UserData(_))
}

fn path_mismatch(path: &str, prefix: &[&str], found: &Value) -> ScriptError {
    ScriptError::new(
        ErrorKind::PathTypeMismatch,
        format!(
            "`{}` is a {} value while resolving `{}`",
            prefix.join("."),
            found.type_name(),
            path
        ),
    )
}

//! State 测试
//!
//! 点分路径、执行错误、栈平衡、配置与注册

mod common;
use common::new_state;
use moonbridge_core::{BridgeConfig, ErrorKind, State, StdLibrary, Value};

// ===== 路径测试 =====

#[test]
fn test_path_through_number_fails() {
    let state = new_state();
    state.execute("t = { a = 1, c = 5 }").unwrap();

    let err = state.get("t.c.d").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PathTypeMismatch);
    assert_eq!(err.tag(), Some("state.get"));
    state.check_stack_balance().unwrap();

    let err = state.set("t.c.d", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PathTypeMismatch);
    assert_eq!(err.tag(), Some("state.set"));
    state.check_stack_balance().unwrap();
    assert_eq!(state.stack_depth(), 0);
}

#[test]
fn test_set_creates_intermediate_tables() {
    let state = new_state();
    state.set("config.window.width", 640).unwrap();
    assert_eq!(
        state.execute("return config.window.width").unwrap(),
        vec![Value::Integer(640)]
    );
    assert!(state.get("config.window").unwrap().is_table());
}

#[test]
fn test_get_missing_paths() {
    let state = new_state();
    assert_eq!(state.get("undefined_global").unwrap(), Value::Nil);

    let err = state.get("undefined_global.x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PathTypeMismatch);

    let err = state.get("a..b").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NameNotFound);
    let err = state.set("", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NameNotFound);
}

#[test]
fn test_path_through_native_object() {
    let state = new_state();
    state.execute("v = test.vec2(3, 4)").unwrap();
    assert_eq!(state.get("v.x").unwrap(), Value::Number(3.0));
    assert_eq!(state.get("v.z").unwrap_err().kind(), ErrorKind::AttributeNotFound);
}

// ===== 执行错误测试 =====

#[test]
fn test_syntax_error() {
    let state = new_state();
    let err = state.execute("return +").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineRuntime);
    assert_eq!(err.tag(), Some("engine.syntax"));
    state.check_stack_balance().unwrap();
}

#[test]
fn test_runtime_error() {
    let state = new_state();
    let err = state.execute("error('boom')").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineRuntime);
    assert!(err.message().contains("boom"));
    state.check_stack_balance().unwrap();
}

#[test]
fn test_native_error_keeps_kind() {
    let state = new_state();
    let err = state.execute("test.fail()").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(err.message(), "bad value!");

    let ret = state
        .execute("local ok, err = pcall(test.fail) return ok, tostring(err)")
        .unwrap();
    assert_eq!(ret[0], Value::Boolean(false));
    assert!(ret[1].to_lua_string().unwrap().contains("bad value!"));
}

#[test]
fn test_execute_named_chunk() {
    let state = new_state();
    let err = state.execute_named("=setup", "error('named')").unwrap_err();
    assert!(err.message().contains("setup"));
}

// ===== 簿记测试 =====

#[test]
fn test_live_handles_released() {
    let state = new_state();
    let before = state.live_handles();
    {
        let t = state.new_table().unwrap();
        let _copy = t.clone();
        let _f = state.execute("return function() end").unwrap();
        assert_eq!(state.live_handles(), before + 2);
    }
    assert_eq!(state.live_handles(), before);
}

#[test]
fn test_value_outlives_state() {
    let state = new_state();
    let t = state.new_table().unwrap();
    drop(state);

    let handle = t.as_handle().unwrap();
    assert!(!handle.is_valid());
    assert_eq!(t.index("x").unwrap_err().kind(), ErrorKind::StateClosed);
}

#[test]
fn test_value_from_another_state() {
    let a = new_state();
    let b = new_state();
    let t = a.new_table().unwrap();
    let err = b.set("t", t).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

// ===== 注册与配置测试 =====

fn add(_state: &State, args: Vec<Value>) -> moonbridge_core::Result<Vec<Value>> {
    let sum = args.iter().map(Value::to_number).sum::<moonbridge_core::Result<f64>>()?;
    Ok(vec![Value::Number(sum)])
}

#[test]
fn test_register_function_on_state() {
    let state = new_state();
    state.register_function("util.add", add).unwrap();
    assert_eq!(
        state.execute("return util.add(1, 2, 3.5)").unwrap(),
        vec![Value::Number(6.5)]
    );
    let err = state.execute("return util.add({})").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

fn frame_report(state: &State, _args: Vec<Value>) -> moonbridge_core::Result<Vec<Value>> {
    Ok(vec![
        Value::Integer(state.stack_depth() as i64),
        Value::Boolean(state.check_stack_balance().is_ok()),
    ])
}

#[test]
fn test_stack_balance_inside_callback() {
    let state = new_state();
    state.register_function("util.frames", frame_report).unwrap();
    let ret = state.execute("return util.frames()").unwrap();
    let Value::Integer(depth) = ret[0] else {
        panic!("depth should be an integer, got {:?}", ret[0]);
    };
    assert!(depth >= 1);
    assert_eq!(ret[1], Value::Boolean(false));

    let err = state.execute("local ok = select(2, util.frames()) assert(ok)").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineRuntime);

    assert_eq!(state.stack_depth(), 0);
    state.check_stack_balance().unwrap();
}

#[test]
fn test_host_type_function() {
    let state = new_state();
    let ret = state
        .execute("return host.type(1), host.type('s'), host.type({}), host.type(test.vec2(0, 0))")
        .unwrap();
    assert_eq!(
        ret,
        vec![
            Value::from("number"),
            Value::from("string"),
            Value::from("table"),
            Value::from("Vec2"),
        ]
    );
}

#[test]
fn test_host_library_disabled() {
    let mut config = BridgeConfig::default();
    config.host_lib.enabled = false;
    let state = State::with_config(config).unwrap();
    assert_eq!(state.get("host").unwrap(), Value::Nil);
    assert_eq!(state.get("each").unwrap(), Value::Nil);
}

#[test]
fn test_custom_namespace_without_each() {
    common::register_all();
    let mut config = BridgeConfig::default();
    config.host_lib.namespace = "qt".to_string();
    config.host_lib.install_each = false;
    let state = State::with_config(config).unwrap();
    assert!(state.get("qt.meta").unwrap().len().unwrap() > 0);
    assert_eq!(state.get("host").unwrap(), Value::Nil);
    assert_eq!(state.get("each").unwrap(), Value::Nil);
}

#[test]
fn test_restricted_libraries() {
    let mut config = BridgeConfig::default();
    config.engine.libraries = vec![StdLibrary::Math];
    let state = State::with_config(config).unwrap();
    assert_eq!(state.get("coroutine").unwrap(), Value::Nil);
    assert!(state.get("math.floor").unwrap().is_function());
}

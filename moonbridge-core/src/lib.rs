//! Moonbridge Core - Lua <-> native object bridge (pure logic, no IO)
//!
//! Contains the value/handle layer, the native object protocol, reflective
//! dispatch over host type descriptors, coroutine bridging and the state that
//! ties them to one engine instance.
//!
//! Configuration is passed explicitly via parameters, not via global state.
//! The only process-wide data are the append-only type and function registries.

pub mod coerce;
pub mod coroutine;
pub mod error;
pub mod handle;
mod hostlib;
pub mod native;
pub mod reflect;
pub mod registry;
mod stack;
pub mod state;
pub mod value;

// Re-export common types
pub use coroutine::ThreadState;
pub use error::{ErrorKind, Result, ScriptError};
pub use handle::{Handle, HandleKind};
pub use native::{NativeObject, NativeRef, NativeType, Operation, Operator};
pub use reflect::{
    HostObject, HostRef, HostType, HostValue, MetaObject, MethodKind, Object, ObjectCore,
    Ownership,
};
pub use registry::{register_function, register_type, NativeFn};
pub use state::State;
pub use value::{Entry, TableIter, Value, ValueKind};

// Re-export config types from moonbridge-config
pub use moonbridge_config::{BridgeConfig, StdLibrary, Subsystem};

//! 反射分派
//!
//! 把宿主对象的运行时类型描述（属性、方法、信号/槽、构造函数）
//! 映射为脚本可访问的成员。
//!
//! - `meta`: 类型描述与构建器
//! - `object`: 宿主对象接口、对象核心、对象树、根类 `Object`
//! - `marshal`: Value <-> HostValue 编组与重载选择
//! - `wrapper`: 对象包装与绑定方法
//! - `signal`: 信号连接与发射
//! - `metatype`: 可调用的类型对象

pub mod marshal;
pub mod meta;
pub mod metatype;
pub mod object;
pub mod signal;
pub mod wrapper;

pub use meta::{
    normalize_signature, parse_signature, Constructor, Getter, HostType, HostValue, Invoker,
    MetaObject, MetaObjectBuilder, MethodDef, MethodKind, PropertyDef,
};
pub use metatype::MetaTypeObject;
pub use object::{
    children_of, downcast_host, find_child, parent_of, set_parent, ConnectionId, HostObject, HostRef, Object,
    ObjectCore,
};
pub use signal::{connect, connect_slot, connect_slots_by_name, destroy, disconnect, disconnect_slot, emit};
pub use wrapper::{BoundMethod, ObjectWrapper, Ownership};

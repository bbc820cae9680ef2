//! 宿主对象与对象核心
//!
//! 每个宿主对象都内嵌一个 [`ObjectCore`]，保存对象名、信号连接表、
//! 父子关系、销毁标记以及"拥有者包装"的占用标记。
//!
//! 父对象强引用子对象，子对象弱引用父对象；销毁父对象会连带销毁子对象。

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use super::meta::{HostType, HostValue, MetaObject};
use crate::error::{ErrorKind, Result, ScriptError};
use crate::native::AsAny;
use crate::value::Value;

/// 共享的宿主对象引用
pub type HostRef = Rc<dyn HostObject>;

/// 宿主对象接口
pub trait HostObject: AsAny {
    /// 运行时类型描述
    fn meta_object(&self) -> Arc<MetaObject>;

    fn core(&self) -> &ObjectCore;
}

/// 向下转换为具体宿主类型
pub fn downcast_host<T: HostObject>(obj: &HostRef) -> Option<&T> {
    (**obj).as_any().downcast_ref::<T>()
}

/// 连接编号
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

/// 接收方标识，用于按接收方断开连接
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ReceiverKey {
    Script(Value),
    Slot { target: usize, slot: String },
}

pub(crate) type Delivery = Rc<dyn Fn(&HostRef, &[HostValue]) -> Result<()>>;

struct Connection {
    id: ConnectionId,
    /// 信号规范化签名
    signal: String,
    key: ReceiverKey,
    deliver: Delivery,
}

/// 对象核心状态
#[derive(Default)]
pub struct ObjectCore {
    name: RefCell<String>,
    connections: RefCell<Vec<Connection>>,
    next_id: Cell<u64>,
    parent: RefCell<Option<Weak<dyn HostObject>>>,
    children: RefCell<Vec<HostRef>>,
    destroyed: Cell<bool>,
    owner_claimed: Cell<bool>,
}

impl ObjectCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        let core = Self::default();
        *core.name.borrow_mut() = name.into();
        core
    }

    pub fn object_name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn set_object_name(&self, name: impl Into<String>) {
        *self.name.borrow_mut() = name.into();
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub(crate) fn ensure_alive(&self, class_name: &str) -> Result<()> {
        if self.destroyed.get() {
            return Err(ScriptError::new(
                ErrorKind::ObjectDestroyed,
                format!("`{}` object has been destroyed", class_name),
            ));
        }
        Ok(())
    }

    /// 销毁对象：断开所有连接，后续访问返回 `ObjectDestroyed`
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        let dropped = std::mem::take(&mut *self.connections.borrow_mut());
        debug!(target: "moonbridge::reflect", connections = dropped.len(), "object destroyed");
    }

    /// 取出全部子对象并清除它们的父链接
    pub(crate) fn take_children(&self) -> Vec<HostRef> {
        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in &children {
            child.core().parent.borrow_mut().take();
        }
        children
    }

    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    // ===== 拥有者包装 =====

    /// 占用拥有者位置，已被占用时返回 false
    pub(crate) fn claim_owner(&self) -> bool {
        !self.owner_claimed.replace(true)
    }

    pub(crate) fn release_owner(&self) {
        self.owner_claimed.set(false);
    }

    pub fn has_owner(&self) -> bool {
        self.owner_claimed.get()
    }

    // ===== 连接表 =====

    pub(crate) fn add_connection(&self, signal: String, key: ReceiverKey, deliver: Delivery) -> ConnectionId {
        let id = ConnectionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.connections.borrow_mut().push(Connection {
            id,
            signal,
            key,
            deliver,
        });
        id
    }

    /// 移除匹配的连接；`key` 为 None 时移除该信号的全部连接
    pub(crate) fn remove_connections(&self, signal: &str, key: Option<&ReceiverKey>) -> usize {
        let mut connections = self.connections.borrow_mut();
        let before = connections.len();
        connections.retain(|c| !(c.signal == signal && key.map_or(true, |k| &c.key == k)));
        before - connections.len()
    }

    pub fn disconnect_id(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.borrow_mut();
        let before = connections.len();
        connections.retain(|c| c.id != id);
        before != connections.len()
    }

    pub fn connection_count(&self, signal: &str) -> usize {
        self.connections
            .borrow()
            .iter()
            .filter(|c| c.signal == signal)
            .count()
    }

    /// 依次投递给该信号的所有接收方；失败会记录日志，返回第一个错误
    pub(crate) fn emit(&self, sender: &HostRef, signal: &str, args: &[HostValue]) -> Result<()> {
        // 先复制投递列表再释放借用：接收方可能修改连接表
        let receivers: Vec<Delivery> = self
            .connections
            .borrow()
            .iter()
            .filter(|c| c.signal == signal)
            .map(|c| c.deliver.clone())
            .collect();

        debug!(target: "moonbridge::reflect", signal, receivers = receivers.len(), "emit");
        let mut first_error = None;
        for deliver in receivers {
            if let Err(e) = deliver(sender, args) {
                warn!(target: "moonbridge::reflect", signal, error = %e, "receiver failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for ObjectCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCore")
            .field("name", &*self.name.borrow())
            .field("connections", &self.connections.borrow().len())
            .field("children", &self.children.borrow().len())
            .field("destroyed", &self.destroyed.get())
            .field("owned", &self.owner_claimed.get())
            .finish()
    }
}

// ==================== 对象树 ====================

fn same_object(a: &HostRef, b: &HostRef) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

/// 父对象（已释放或未设置时为 None）
pub fn parent_of(obj: &HostRef) -> Option<HostRef> {
    obj.core().parent.borrow().as_ref().and_then(Weak::upgrade)
}

/// 直接子对象，按加入顺序
pub fn children_of(obj: &HostRef) -> Vec<HostRef> {
    obj.core().children.borrow().clone()
}

/// 深度优先查找名为 `name` 的后代
pub fn find_child(obj: &HostRef, name: &str) -> Option<HostRef> {
    children_of(obj).into_iter().find_map(|child| {
        if child.core().object_name() == name {
            Some(child)
        } else {
            find_child(&child, name)
        }
    })
}

/// 从父对象的子列表中移除
pub(crate) fn detach(child: &HostRef) {
    let old = child.core().parent.borrow_mut().take();
    if let Some(old) = old.and_then(|w| w.upgrade()) {
        old.core().children.borrow_mut().retain(|c| !same_object(c, child));
    }
}

/// 设置或清除父对象
///
/// 会形成环或涉及已销毁对象时返回 `TypeMismatch`。
pub fn set_parent(child: &HostRef, parent: Option<&HostRef>) -> Result<()> {
    let class_name = child.meta_object().class_name().to_string();
    child.core().ensure_alive(&class_name)?;
    if let Some(parent) = parent {
        parent.core().ensure_alive(parent.meta_object().class_name())?;
        let cyclic = std::iter::successors(Some(parent.clone()), parent_of).any(|p| same_object(&p, child));
        if cyclic {
            return Err(ScriptError::type_mismatch(format!(
                "`{}` object cannot become its own ancestor",
                class_name
            ))
            .with_tag("reflect.parent"));
        }
    }

    detach(child);
    *child.core().parent.borrow_mut() = parent.map(Rc::downgrade);
    if let Some(parent) = parent {
        parent.core().children.borrow_mut().push(child.clone());
    }
    debug!(target: "moonbridge::reflect", class = %class_name, parented = parent.is_some(), "parent changed");
    Ok(())
}

// ==================== 基类 Object ====================

/// 所有宿主类型的根类：提供 `objectName`、`parent` 属性，
/// `findChild` 方法与 `destroyed` 信号
#[derive(Debug, Default)]
pub struct Object {
    core: ObjectCore,
}

static OBJECT_META: Lazy<Arc<MetaObject>> = Lazy::new(|| {
    MetaObject::builder("Object")
        .property_rw(
            "objectName",
            HostType::String,
            |obj| Ok(HostValue::String(obj.core().object_name())),
            |obj, value| {
                let name = value.as_str().map(str::to_string).unwrap_or_default();
                obj.core().set_object_name(name);
                Ok(())
            },
        )
        .property_rw(
            "parent",
            HostType::Object,
            |obj| Ok(HostValue::Object(parent_of(obj))),
            |obj, value| set_parent(obj, value.as_object()),
        )
        .method("findChild", &[HostType::String], HostType::Object, |obj, args| {
            let name = args.first().and_then(HostValue::as_str).unwrap_or_default();
            Ok(HostValue::Object(find_child(obj, name)))
        })
        .signal("destroyed", &[])
        .constructor(&[], |_| Ok(Rc::new(Object::new()) as HostRef))
        .constructor(&[HostType::String], |args| {
            let name = args.first().and_then(HostValue::as_str).unwrap_or_default();
            Ok(Rc::new(Object::named(name)) as HostRef)
        })
        .build()
});

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Object {
            core: ObjectCore::with_name(name),
        }
    }

    /// 根类描述，宿主类型通过 `inherits(Object::static_meta())` 继承它
    pub fn static_meta() -> Arc<MetaObject> {
        OBJECT_META.clone()
    }
}

impl HostObject for Object {
    fn meta_object(&self) -> Arc<MetaObject> {
        Object::static_meta()
    }

    fn core(&self) -> &ObjectCore {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_name_property() {
        let obj: HostRef = Rc::new(Object::named("root"));
        let meta = obj.meta_object();
        let prop = meta.property("objectName").unwrap();
        assert_eq!(prop.read(&obj).unwrap().as_str(), Some("root"));

        let setter = prop.setter().unwrap();
        setter(&obj, HostValue::String("renamed".into())).unwrap();
        assert_eq!(obj.core().object_name(), "renamed");
    }

    #[test]
    fn test_find_child_searches_descendants() {
        let root: HostRef = Rc::new(Object::named("root"));
        let mid: HostRef = Rc::new(Object::named("mid"));
        let leaf: HostRef = Rc::new(Object::named("leaf"));
        set_parent(&mid, Some(&root)).unwrap();
        set_parent(&leaf, Some(&mid)).unwrap();

        assert!(find_child(&root, "leaf").is_some_and(|c| same_object(&c, &leaf)));
        assert!(find_child(&root, "root").is_none());
        assert_eq!(root.core().child_count(), 1);

        set_parent(&leaf, Some(&root)).unwrap();
        assert_eq!(mid.core().child_count(), 0);
        assert_eq!(root.core().child_count(), 2);
    }

    #[test]
    fn test_owner_claim_is_exclusive() {
        let core = ObjectCore::new();
        assert!(core.claim_owner());
        assert!(!core.claim_owner());
        core.release_owner();
        assert!(core.claim_owner());
    }

    #[test]
    fn test_emit_reports_first_error_and_reaches_all() {
        let obj: HostRef = Rc::new(Object::new());
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        obj.core().add_connection(
            "destroyed()".into(),
            ReceiverKey::Slot { target: 1, slot: "a()".into() },
            Rc::new(move |_, _| {
                h.set(h.get() + 1);
                Err(ScriptError::type_mismatch("first"))
            }),
        );
        let h = hits.clone();
        obj.core().add_connection(
            "destroyed()".into(),
            ReceiverKey::Slot { target: 2, slot: "b()".into() },
            Rc::new(move |_, _| {
                h.set(h.get() + 1);
                Ok(())
            }),
        );

        let err = obj.core().emit(&obj, "destroyed()", &[]).unwrap_err();
        assert_eq!(err.message(), "first");
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_destroy_clears_connections() {
        let obj: HostRef = Rc::new(Object::new());
        obj.core().add_connection(
            "destroyed()".into(),
            ReceiverKey::Slot { target: 1, slot: "a()".into() },
            Rc::new(|_, _| Ok(())),
        );
        assert_eq!(obj.core().connection_count("destroyed()"), 1);
        obj.core().destroy();
        assert!(obj.core().is_destroyed());
        assert_eq!(obj.core().connection_count("destroyed()"), 0);
        assert_eq!(
            obj.core().ensure_alive("Object").unwrap_err().kind(),
            ErrorKind::ObjectDestroyed
        );
    }

    #[test]
    fn test_downcast_host() {
        let obj: HostRef = Rc::new(Object::named("x"));
        assert!(downcast_host::<Object>(&obj).is_some());
    }
}

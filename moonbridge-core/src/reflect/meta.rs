//! 宿主类型描述
//!
//! [`MetaObject`] 是宿主类型在运行时的反射描述：属性、方法/槽/信号、
//! 可调用的构造函数以及父类链。描述一经构建即不可变，可以在进程范围内共享。

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::native::NativeRef;
use crate::value::Value;

use super::object::HostRef;

/// 宿主侧的参数/返回值类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    Void,
    Bool,
    Int,
    Double,
    String,
    /// 宿主对象引用（可为空）
    Object,
    /// 原生对象引用（可为空）
    Native,
    List,
    /// 任意桥接值，原样传递
    Variant,
}

impl HostType {
    /// 出现在签名中的名字
    pub fn name(&self) -> &'static str {
        match self {
            HostType::Void => "void",
            HostType::Bool => "bool",
            HostType::Int => "int",
            HostType::Double => "double",
            HostType::String => "string",
            HostType::Object => "object",
            HostType::Native => "native",
            HostType::List => "list",
            HostType::Variant => "variant",
        }
    }

    pub fn from_name(name: &str) -> Option<HostType> {
        let ty = match name.trim() {
            "void" => HostType::Void,
            "bool" => HostType::Bool,
            "int" => HostType::Int,
            "double" => HostType::Double,
            "string" => HostType::String,
            "object" => HostType::Object,
            "native" => HostType::Native,
            "list" => HostType::List,
            "variant" => HostType::Variant,
            _ => return None,
        };
        Some(ty)
    }
}

/// 宿主侧的值
#[derive(Clone)]
pub enum HostValue {
    Void,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Object(Option<HostRef>),
    Native(Option<NativeRef>),
    List(Vec<HostValue>),
    Variant(Value),
}

impl HostValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// 整数也可读作浮点
    pub fn as_double(&self) -> Option<f64> {
        match self {
            HostValue::Double(d) => Some(*d),
            HostValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostRef> {
        match self {
            HostValue::Object(Some(o)) => Some(o),
            _ => None,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Void => write!(f, "Void"),
            HostValue::Bool(b) => write!(f, "Bool({})", b),
            HostValue::Int(i) => write!(f, "Int({})", i),
            HostValue::Double(d) => write!(f, "Double({})", d),
            HostValue::String(s) => write!(f, "String({:?})", s),
            HostValue::Object(Some(o)) => write!(f, "Object({})", o.meta_object().class_name()),
            HostValue::Object(None) => write!(f, "Object(null)"),
            HostValue::Native(Some(n)) => write!(f, "Native({})", n.type_name()),
            HostValue::Native(None) => write!(f, "Native(null)"),
            HostValue::List(items) => f.debug_tuple("List").field(items).finish(),
            HostValue::Variant(v) => write!(f, "Variant({:?})", v),
        }
    }
}

pub type Getter = Arc<dyn Fn(&HostRef) -> Result<HostValue> + Send + Sync>;
pub type Setter = Arc<dyn Fn(&HostRef, HostValue) -> Result<()> + Send + Sync>;
pub type Invoker = Arc<dyn Fn(&HostRef, Vec<HostValue>) -> Result<HostValue> + Send + Sync>;
pub type Constructor = Arc<dyn Fn(Vec<HostValue>) -> Result<HostRef> + Send + Sync>;

/// 属性描述
pub struct PropertyDef {
    pub name: String,
    pub ty: HostType,
    getter: Getter,
    setter: Option<Setter>,
}

impl PropertyDef {
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn read(&self, obj: &HostRef) -> Result<HostValue> {
        (self.getter)(obj)
    }

    /// 只读属性返回 None
    pub fn setter(&self) -> Option<&Setter> {
        self.setter.as_ref()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Slot,
    Signal,
}

/// 方法/槽/信号描述
pub struct MethodDef {
    pub name: String,
    pub kind: MethodKind,
    pub params: Vec<HostType>,
    pub ret: HostType,
    /// 信号没有调用体
    invoker: Option<Invoker>,
}

impl MethodDef {
    /// 规范化签名 `name(t1,t2)`
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(HostType::name).collect();
        format!("{}({})", self.name, params.join(","))
    }

    pub fn invoker(&self) -> Option<&Invoker> {
        self.invoker.as_ref()
    }
}

/// 可调用的构造函数
pub struct ConstructorDef {
    pub params: Vec<HostType>,
    create: Constructor,
}

impl ConstructorDef {
    pub fn create(&self, args: Vec<HostValue>) -> Result<HostRef> {
        (self.create)(args)
    }
}

/// 声明了参数类型列表的可调用成员（用于重载选择）
pub trait Invokable {
    fn params(&self) -> &[HostType];
}

impl Invokable for MethodDef {
    fn params(&self) -> &[HostType] {
        &self.params
    }
}

impl Invokable for ConstructorDef {
    fn params(&self) -> &[HostType] {
        &self.params
    }
}

/// 宿主类型描述
pub struct MetaObject {
    class_name: String,
    superclass: Option<Arc<MetaObject>>,
    properties: Vec<PropertyDef>,
    methods: Vec<MethodDef>,
    constructors: Vec<ConstructorDef>,
}

impl MetaObject {
    pub fn builder(class_name: impl Into<String>) -> MetaObjectBuilder {
        MetaObjectBuilder {
            meta: MetaObject {
                class_name: class_name.into(),
                superclass: None,
                properties: Vec::new(),
                methods: Vec::new(),
                constructors: Vec::new(),
            },
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn superclass(&self) -> Option<&Arc<MetaObject>> {
        self.superclass.as_ref()
    }

    /// 自身与所有祖先，派生类在前
    pub fn lineage(&self) -> impl Iterator<Item = &MetaObject> {
        std::iter::successors(Some(self), |m| m.superclass.as_deref())
    }

    /// 是否是 `name` 类或其后代
    pub fn inherits(&self, name: &str) -> bool {
        self.lineage().any(|m| m.class_name == name)
    }

    /// 查找属性（派生类优先）
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.lineage()
            .find_map(|m| m.properties.iter().find(|p| p.name == name))
    }

    /// 所有同名方法（派生类在前，同一类内按声明顺序）
    pub fn methods_named(&self, name: &str) -> Vec<&MethodDef> {
        self.lineage()
            .flat_map(|m| m.methods.iter().filter(move |d| d.name == name))
            .collect()
    }

    /// 按名字或规范化签名查找
    pub fn find_method(&self, name_or_signature: &str, kind: Option<MethodKind>) -> Option<&MethodDef> {
        let wanted = normalize_signature(name_or_signature);
        let by_signature = wanted.contains('(');
        self.lineage().find_map(|m| {
            m.methods.iter().find(|d| {
                kind.map_or(true, |k| d.kind == k)
                    && if by_signature {
                        d.signature() == wanted
                    } else {
                        d.name == wanted
                    }
            })
        })
    }

    pub fn signal(&self, name_or_signature: &str) -> Option<&MethodDef> {
        self.find_method(name_or_signature, Some(MethodKind::Signal))
    }

    /// 槽与普通方法都可以作为连接目标
    pub fn slot(&self, name_or_signature: &str) -> Option<&MethodDef> {
        self.find_method(name_or_signature, Some(MethodKind::Slot))
            .or_else(|| self.find_method(name_or_signature, Some(MethodKind::Method)))
    }

    /// 所有槽（派生类在前）
    pub fn slots(&self) -> Vec<&MethodDef> {
        self.lineage()
            .flat_map(|m| m.methods.iter().filter(|d| d.kind == MethodKind::Slot))
            .collect()
    }

    /// 本类声明的构造函数（不继承）
    pub fn constructors(&self) -> &[ConstructorDef] {
        &self.constructors
    }

    /// 所有可见属性名（派生类在前）
    pub fn property_names(&self) -> Vec<&str> {
        self.lineage()
            .flat_map(|m| m.properties.iter().map(|p| p.name.as_str()))
            .collect()
    }

    pub fn member_count(&self) -> usize {
        self.lineage().map(|m| m.properties.len() + m.methods.len()).sum()
    }
}

impl fmt::Debug for MetaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaObject")
            .field("class_name", &self.class_name)
            .field("superclass", &self.superclass.as_ref().map(|s| s.class_name()))
            .field("properties", &self.properties.iter().map(|p| &p.name).collect::<Vec<_>>())
            .field("methods", &self.methods.iter().map(|m| m.signature()).collect::<Vec<_>>())
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

/// 去掉签名中的空白：`foo( int, double )` -> `foo(int,double)`
pub fn normalize_signature(signature: &str) -> String {
    signature.chars().filter(|c| !c.is_whitespace()).collect()
}

/// 解析 `name(t1,t2)` 为名字与参数类型；未知类型名返回 None
pub fn parse_signature(signature: &str) -> Option<(String, Vec<HostType>)> {
    let sig = normalize_signature(signature);
    let (name, rest) = sig.split_once('(')?;
    let params = rest.strip_suffix(')')?;
    let types = if params.is_empty() {
        Vec::new()
    } else {
        params
            .split(',')
            .map(HostType::from_name)
            .collect::<Option<Vec<_>>>()?
    };
    Some((name.to_string(), types))
}

// ==================== 构建器 ====================

pub struct MetaObjectBuilder {
    meta: MetaObject,
}

impl MetaObjectBuilder {
    pub fn inherits(mut self, superclass: Arc<MetaObject>) -> Self {
        self.meta.superclass = Some(superclass);
        self
    }

    pub fn property<G>(mut self, name: &str, ty: HostType, getter: G) -> Self
    where
        G: Fn(&HostRef) -> Result<HostValue> + Send + Sync + 'static,
    {
        self.meta.properties.push(PropertyDef {
            name: name.to_string(),
            ty,
            getter: Arc::new(getter),
            setter: None,
        });
        self
    }

    pub fn property_rw<G, S>(mut self, name: &str, ty: HostType, getter: G, setter: S) -> Self
    where
        G: Fn(&HostRef) -> Result<HostValue> + Send + Sync + 'static,
        S: Fn(&HostRef, HostValue) -> Result<()> + Send + Sync + 'static,
    {
        self.meta.properties.push(PropertyDef {
            name: name.to_string(),
            ty,
            getter: Arc::new(getter),
            setter: Some(Arc::new(setter)),
        });
        self
    }

    pub fn method<F>(self, name: &str, params: &[HostType], ret: HostType, invoker: F) -> Self
    where
        F: Fn(&HostRef, Vec<HostValue>) -> Result<HostValue> + Send + Sync + 'static,
    {
        self.member(name, MethodKind::Method, params, ret, Some(Arc::new(invoker)))
    }

    pub fn slot<F>(self, name: &str, params: &[HostType], invoker: F) -> Self
    where
        F: Fn(&HostRef, Vec<HostValue>) -> Result<HostValue> + Send + Sync + 'static,
    {
        self.member(name, MethodKind::Slot, params, HostType::Void, Some(Arc::new(invoker)))
    }

    pub fn signal(self, name: &str, params: &[HostType]) -> Self {
        self.member(name, MethodKind::Signal, params, HostType::Void, None)
    }

    pub fn constructor<F>(mut self, params: &[HostType], create: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> Result<HostRef> + Send + Sync + 'static,
    {
        self.meta.constructors.push(ConstructorDef {
            params: params.to_vec(),
            create: Arc::new(create),
        });
        self
    }

    fn member(
        mut self,
        name: &str,
        kind: MethodKind,
        params: &[HostType],
        ret: HostType,
        invoker: Option<Invoker>,
    ) -> Self {
        self.meta.methods.push(MethodDef {
            name: name.to_string(),
            kind,
            params: params.to_vec(),
            ret,
            invoker,
        });
        self
    }

    pub fn build(self) -> Arc<MetaObject> {
        Arc::new(self.meta)
    }
}

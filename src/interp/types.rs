use crate::ast::{ClassDecl, MethodDecl, TypeRef};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

pub(crate) type EnvRef = Rc<RefCell<Environment>>;
pub type ObjRef = Rc<RefCell<Instance>>;
pub(crate) type ListRef = Rc<RefCell<Vec<Value>>>;

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Char(char),
    Str(Rc<str>),
    Array(ListRef),
    /// `java.util.List` and friends.
    List(ListRef),
    /// Iterator over a `List`, as returned by `list.iterator()`.
    ListIter(Rc<RefCell<ListCursor>>),
    Object(ObjRef),
    /// An exception instance that has not been thrown yet.
    Exception(Rc<str>),
}

#[derive(Debug)]
pub struct ListCursor {
    pub(crate) items: ListRef,
    pub(crate) pos: usize,
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub(crate) fn type_name(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Bool(_) => "boolean".into(),
            Value::Int(_) => "int".into(),
            Value::Char(_) => "char".into(),
            Value::Str(_) => "String".into(),
            Value::Array(_) => "array".into(),
            Value::List(_) => "java.util.List".into(),
            Value::ListIter(_) => "java.util.Iterator".into(),
            Value::Object(obj) => obj.borrow().class.decl.name.clone(),
            Value::Exception(class) => class.to_string(),
        }
    }

    /// Zero value of a field or array slot of type `ty`.
    pub(crate) fn default_for(ty: &TypeRef) -> Value {
        match ty.name() {
            Some("boolean") => Value::Bool(false),
            Some("char") => Value::Char('\0'),
            Some("byte" | "short" | "int" | "long") => Value::Int(0),
            _ => Value::Null,
        }
    }
}

/// `==` semantics: primitives and strings by value, everything else by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Char(b)) | (Value::Char(b), Value::Int(a)) => {
                *a == i64::from(u32::from(*b))
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) | (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b)
            }
            (Value::ListIter(a), Value::ListIter(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Exception(a), Value::Exception(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) | Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::ListIter(_) => f.write_str("java.util.Iterator"),
            Value::Object(obj) => {
                write!(f, "{}@{:p}", obj.borrow().class.decl.name, Rc::as_ptr(obj))
            }
            Value::Exception(class) => f.write_str(class),
        }
    }
}

/// A class as seen at run time: its declaration plus what it closed over.
pub struct ClassInfo {
    pub(crate) decl: Rc<ClassDecl>,
    /// The environment the declaration was executed in.
    pub(crate) captured: EnvRef,
    /// Enclosing instance for local and inner classes.
    pub(crate) outer_this: Option<ObjRef>,
}

impl ClassInfo {
    pub(crate) fn method(&self, name: &str, arity: usize) -> Option<&MethodDecl> {
        self.decl
            .methods
            .iter()
            .find(|m| m.name == name && m.params.len() == arity && !m.is_constructor())
    }

    pub(crate) fn constructor(&self, arity: usize) -> Option<&MethodDecl> {
        self.decl
            .methods
            .iter()
            .find(|m| m.is_constructor() && m.params.len() == arity)
    }
}

pub struct Instance {
    pub(crate) class: Rc<ClassInfo>,
    pub(crate) fields: FxHashMap<String, Value>,
}

// Environments and instances point at each other; print names only.
impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("name", &self.decl.name)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<_> = self.fields.keys().collect();
        fields.sort();
        f.debug_struct("Instance")
            .field("class", &self.class.decl.name)
            .field("fields", &fields)
            .finish()
    }
}

impl Instance {
    pub fn class_name(&self) -> &str {
        &self.class.decl.name
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Environment {
    pub(crate) vars: FxHashMap<String, Value>,
    pub(crate) classes: FxHashMap<String, Rc<ClassInfo>>,
    pub(crate) parent: Option<EnvRef>,
}

impl Environment {
    pub fn new(parent: Option<EnvRef>) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            vars: FxHashMap::default(),
            classes: FxHashMap::default(),
            parent,
        }))
    }

    pub fn declare(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    /// Assigns to the nearest declaration; false when there is none.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.vars.get_mut(name) {
            *slot = value;
            true
        } else if let Some(parent) = &self.parent {
            parent.borrow_mut().set(name, value)
        } else {
            false
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.get(name) {
            Some(value.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().get(name)
        } else {
            None
        }
    }

    pub(crate) fn class(&self, name: &str) -> Option<Rc<ClassInfo>> {
        if let Some(class) = self.classes.get(name) {
            Some(class.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().class(name)
        } else {
            None
        }
    }
}

/// Where the code being executed stands.
#[derive(Clone)]
pub(crate) struct Frame {
    pub(crate) env: EnvRef,
    pub(crate) this: Option<ObjRef>,
}

impl Frame {
    pub(crate) fn nested(&self) -> Frame {
        Frame {
            env: Environment::new(Some(self.env.clone())),
            this: self.this.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Completion {
    Normal,
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("uncaught {class}")]
    Thrown { class: String },
    #[error("cannot find symbol '{0}'")]
    UnknownName(String),
    #[error("no method {name}/{arity} on {owner}")]
    UnknownMethod {
        owner: String,
        name: String,
        arity: usize,
    },
    #[error("cannot find class '{0}'")]
    UnknownClass(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("step budget of {0} exhausted")]
    StepLimit(u64),
    #[error("yield() executed directly; the method was not lowered")]
    UnloweredYield,
}

impl RuntimeError {
    pub(crate) fn thrown(class: &str) -> Self {
        RuntimeError::Thrown {
            class: class.to_string(),
        }
    }

    pub(crate) fn mismatch(what: impl Into<String>) -> Self {
        RuntimeError::TypeMismatch(what.into())
    }
}

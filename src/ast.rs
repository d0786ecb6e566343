//! AST node types for the Java subset handed over by the front end.
//! Each node represents a syntactic element the lowering engine can see
//! inside a method body or emit into a synthesized class.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub const DUMMY: Span = Span { start: 0, end: 0 };

    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Modifiers: u16 {
        const PUBLIC = 1 << 0;
        const PROTECTED = 1 << 1;
        const PRIVATE = 1 << 2;
        const STATIC = 1 << 3;
        const FINAL = 1 << 4;
        const ABSTRACT = 1 << 5;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    Named { name: String, args: Vec<TypeRef> },
    Array(Box<TypeRef>),
}

const PRIMITIVES: [(&str, &str); 8] = [
    ("boolean", "Boolean"),
    ("byte", "Byte"),
    ("char", "Character"),
    ("short", "Short"),
    ("int", "Integer"),
    ("long", "Long"),
    ("float", "Float"),
    ("double", "Double"),
];

impl TypeRef {
    pub fn simple(name: &str) -> Self {
        TypeRef::Named {
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: &str, args: Vec<TypeRef>) -> Self {
        TypeRef::Named {
            name: name.to_string(),
            args,
        }
    }

    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    /// The written name without type arguments, `None` for arrays.
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { name, .. } => Some(name),
            TypeRef::Array(_) => None,
        }
    }

    /// Last segment of a possibly qualified name.
    pub fn simple_name(&self) -> Option<&str> {
        self.name().map(|n| n.rsplit('.').next().unwrap_or(n))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeRef::Named { name, args } if args.is_empty()
            && PRIMITIVES.iter().any(|(p, _)| p == name))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Named { name, .. } if name == "void")
    }

    /// Type arguments must be reference types, so `int` becomes `Integer`.
    pub fn boxed(self) -> TypeRef {
        match &self {
            TypeRef::Named { name, args } if args.is_empty() => PRIMITIVES
                .iter()
                .find(|(p, _)| p == name)
                .map_or(self.clone(), |(_, boxed)| TypeRef::simple(boxed)),
            _ => self,
        }
    }

    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array(inner) => Some(inner),
            TypeRef::Named { .. } => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeRef::Array(inner) => write!(f, "{inner}[]"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Char(char),
    Str(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    BitNot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    LShift,
    RShift,
    BitAnd,
    BitOr,
    BitXor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
}

impl AssignOp {
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::AddAssign => Some(BinaryOp::Add),
            AssignOp::SubAssign => Some(BinaryOp::Sub),
            AssignOp::MulAssign => Some(BinaryOp::Mul),
            AssignOp::DivAssign => Some(BinaryOp::Div),
            AssignOp::RemAssign => Some(BinaryOp::Rem),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub receiver: Option<Box<Expression>>,
    pub name: String,
    pub args: Vec<Expression>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Literal),
    Name(String),
    This,
    Super,
    QualifiedThis(String),
    Field(Box<Expression>, String),
    Call(MethodCall),
    New(TypeRef, Vec<Expression>),
    NewArray(TypeRef, Vec<Expression>, Option<Vec<Expression>>), // element type, dims, initializer
    ArrayInit(Vec<Expression>),
    Index(Box<Expression>, Box<Expression>),
    Unary(UnaryOp, Box<Expression>),
    Update(UpdateOp, bool, Box<Expression>), // op, prefix, operand
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    Logical(LogicalOp, Box<Expression>, Box<Expression>),
    Assign(AssignOp, Box<Expression>, Box<Expression>),
    Conditional(Box<Expression>, Box<Expression>, Box<Expression>),
    Cast(TypeRef, Box<Expression>),
    InstanceOf(Box<Expression>, TypeRef),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Empty,
    Expression(Expression),
    Block(Vec<Statement>),
    Local(LocalDecl),
    LocalClass(ClassDecl),
    If(IfStatement),
    While(WhileStatement),
    DoWhile(DoWhileStatement),
    For(ForStatement),
    ForEach(ForEachStatement),
    Switch(SwitchStatement),
    Labeled(String, Box<Statement>),
    Break(Option<String>),
    Continue(Option<String>),
    Return(Option<Expression>),
    Throw(Expression),
    Try(TryStatement),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalDecl {
    pub ty: TypeRef,
    pub name: String,
    #[serde(default)]
    pub init: Option<Expression>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Box<Statement>,
    #[serde(default)]
    pub alternate: Option<Box<Statement>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Box<Statement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoWhileStatement {
    pub body: Box<Statement>,
    pub test: Expression,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    #[serde(default)]
    pub init: Vec<Statement>,
    #[serde(default)]
    pub test: Option<Expression>,
    #[serde(default)]
    pub update: Vec<Expression>,
    pub body: Box<Statement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForEachStatement {
    pub var: LocalDecl,
    pub iterable: Expression,
    pub body: Box<Statement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwitchStatement {
    pub selector: Expression,
    pub cases: Vec<SwitchCase>,
}

/// One `case` label with the statements that follow it. `label: None` is
/// `default`. Consecutive labels are consecutive cases with empty bodies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub label: Option<Expression>,
    #[serde(default)]
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TryStatement {
    pub block: Vec<Statement>,
    #[serde(default)]
    pub catches: Vec<CatchClause>,
    #[serde(default)]
    pub finally: Option<Vec<Statement>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    pub ty: TypeRef,
    pub name: String,
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub ty: TypeRef,
    pub name: String,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    #[serde(default)]
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub name: String,
    #[serde(default)]
    pub init: Option<Expression>,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub generated: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    #[serde(default)]
    pub modifiers: Modifiers,
    pub name: String,
    /// `None` marks a constructor.
    pub return_type: Option<TypeRef>,
    #[serde(default)]
    pub params: Vec<Param>,
    /// `None` for abstract and interface methods.
    pub body: Option<Vec<Statement>>,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub generated: bool,
}

impl MethodDecl {
    pub fn is_constructor(&self) -> bool {
        self.return_type.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    #[serde(default)]
    pub modifiers: Modifiers,
    pub name: String,
    #[serde(default)]
    pub implements: Vec<TypeRef>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub types: Vec<ClassDecl>,
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub generated: bool,
}

impl ClassDecl {
    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn method_mut(&mut self, name: &str) -> Option<&mut MethodDecl> {
        self.methods.iter_mut().find(|m| m.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }
}

//! AST construction service.
//!
//! A small fluent vocabulary for building the nodes the synthesizer emits
//! (and the nodes tests feed in). Free functions cover expressions and
//! simple statements; builders cover declarations and the compound
//! statements that have optional parts.

use crate::ast::*;

pub fn name(n: &str) -> Expression {
    Expression::Name(n.to_string())
}

pub fn int(v: i64) -> Expression {
    Expression::Literal(Literal::Int(v))
}

pub fn bool_lit(v: bool) -> Expression {
    Expression::Literal(Literal::Bool(v))
}

pub fn str_lit(v: &str) -> Expression {
    Expression::Literal(Literal::Str(v.to_string()))
}

pub fn null() -> Expression {
    Expression::Literal(Literal::Null)
}

pub fn field(target: Expression, name: &str) -> Expression {
    Expression::Field(Box::new(target), name.to_string())
}

/// Unqualified method invocation, `name(args)`.
pub fn call(name: &str, args: Vec<Expression>) -> Expression {
    Expression::Call(MethodCall {
        receiver: None,
        name: name.to_string(),
        args,
    })
}

pub fn method_call(receiver: Expression, name: &str, args: Vec<Expression>) -> Expression {
    Expression::Call(MethodCall {
        receiver: Some(Box::new(receiver)),
        name: name.to_string(),
        args,
    })
}

pub fn new_instance(ty: TypeRef, args: Vec<Expression>) -> Expression {
    Expression::New(ty, args)
}

pub fn new_array(element: TypeRef, items: Vec<Expression>) -> Expression {
    Expression::NewArray(element, Vec::new(), Some(items))
}

pub fn assign(target: Expression, value: Expression) -> Expression {
    Expression::Assign(AssignOp::Assign, Box::new(target), Box::new(value))
}

pub fn compound_assign(op: AssignOp, target: Expression, value: Expression) -> Expression {
    Expression::Assign(op, Box::new(target), Box::new(value))
}

pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary(op, Box::new(left), Box::new(right))
}

pub fn logical(op: LogicalOp, left: Expression, right: Expression) -> Expression {
    Expression::Logical(op, Box::new(left), Box::new(right))
}

pub fn not(e: Expression) -> Expression {
    Expression::Unary(UnaryOp::Not, Box::new(e))
}

pub fn post_inc(e: Expression) -> Expression {
    Expression::Update(UpdateOp::Increment, false, Box::new(e))
}

pub fn post_dec(e: Expression) -> Expression {
    Expression::Update(UpdateOp::Decrement, false, Box::new(e))
}

pub fn cast(ty: TypeRef, e: Expression) -> Expression {
    Expression::Cast(ty, Box::new(e))
}

pub fn index(array: Expression, at: Expression) -> Expression {
    Expression::Index(Box::new(array), Box::new(at))
}

pub fn expr_stmt(e: Expression) -> Statement {
    Statement::Expression(e)
}

pub fn assign_stmt(target: Expression, value: Expression) -> Statement {
    Statement::Expression(assign(target, value))
}

pub fn block(stmts: Vec<Statement>) -> Statement {
    Statement::Block(stmts)
}

pub fn return_stmt(e: Option<Expression>) -> Statement {
    Statement::Return(e)
}

/// `throw new <ty>();`
pub fn throw_new(ty: TypeRef) -> Statement {
    Statement::Throw(new_instance(ty, Vec::new()))
}

/// The suspension marker, `yield(value);`.
pub fn yield_value(value: Expression) -> Statement {
    expr_stmt(call("yield", vec![value]))
}

pub fn if_stmt(test: Expression, consequent: Statement) -> Statement {
    Statement::If(IfStatement {
        test,
        consequent: Box::new(consequent),
        alternate: None,
    })
}

pub fn if_else(test: Expression, consequent: Statement, alternate: Statement) -> Statement {
    Statement::If(IfStatement {
        test,
        consequent: Box::new(consequent),
        alternate: Some(Box::new(alternate)),
    })
}

pub fn while_stmt(test: Expression, body: Statement) -> Statement {
    Statement::While(WhileStatement {
        test,
        body: Box::new(body),
    })
}

pub fn do_while(body: Statement, test: Expression) -> Statement {
    Statement::DoWhile(DoWhileStatement {
        body: Box::new(body),
        test,
    })
}

pub fn for_each(var: LocalDecl, iterable: Expression, body: Statement) -> Statement {
    Statement::ForEach(ForEachStatement {
        var,
        iterable,
        body: Box::new(body),
    })
}

pub fn labeled(label: &str, body: Statement) -> Statement {
    Statement::Labeled(label.to_string(), Box::new(body))
}

pub fn break_stmt(label: Option<&str>) -> Statement {
    Statement::Break(label.map(str::to_string))
}

pub fn continue_stmt(label: Option<&str>) -> Statement {
    Statement::Continue(label.map(str::to_string))
}

pub fn try_finally(block: Vec<Statement>, finally: Vec<Statement>) -> Statement {
    Statement::Try(TryStatement {
        block,
        catches: Vec::new(),
        finally: Some(finally),
    })
}

pub fn param(ty: TypeRef, name: &str) -> Param {
    Param {
        ty,
        name: name.to_string(),
        is_final: true,
        span: Span::DUMMY,
    }
}

pub struct LocalBuilder {
    decl: LocalDecl,
}

pub fn local(ty: TypeRef, name: &str) -> LocalBuilder {
    LocalBuilder {
        decl: LocalDecl {
            ty,
            name: name.to_string(),
            init: None,
            is_final: false,
            span: Span::DUMMY,
        },
    }
}

impl LocalBuilder {
    pub fn init(mut self, e: Expression) -> Self {
        self.decl.init = Some(e);
        self
    }

    pub fn final_(mut self) -> Self {
        self.decl.is_final = true;
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.decl.span = span;
        self
    }

    pub fn decl(self) -> LocalDecl {
        self.decl
    }

    pub fn stmt(self) -> Statement {
        Statement::Local(self.decl)
    }
}

#[derive(Default)]
pub struct ForBuilder {
    init: Vec<Statement>,
    test: Option<Expression>,
    update: Vec<Expression>,
}

pub fn for_loop() -> ForBuilder {
    ForBuilder::default()
}

impl ForBuilder {
    pub fn init(mut self, stmt: Statement) -> Self {
        self.init.push(stmt);
        self
    }

    pub fn test(mut self, e: Expression) -> Self {
        self.test = Some(e);
        self
    }

    pub fn update(mut self, e: Expression) -> Self {
        self.update.push(e);
        self
    }

    pub fn body(self, body: Statement) -> Statement {
        Statement::For(ForStatement {
            init: self.init,
            test: self.test,
            update: self.update,
            body: Box::new(body),
        })
    }
}

pub struct SwitchBuilder {
    selector: Expression,
    cases: Vec<SwitchCase>,
}

pub fn switch(selector: Expression) -> SwitchBuilder {
    SwitchBuilder {
        selector,
        cases: Vec::new(),
    }
}

impl SwitchBuilder {
    pub fn case(mut self, label: Expression, body: Vec<Statement>) -> Self {
        self.cases.push(SwitchCase {
            label: Some(label),
            body,
        });
        self
    }

    pub fn default(mut self, body: Vec<Statement>) -> Self {
        self.cases.push(SwitchCase { label: None, body });
        self
    }

    pub fn build(self) -> Statement {
        Statement::Switch(SwitchStatement {
            selector: self.selector,
            cases: self.cases,
        })
    }
}

pub struct FieldBuilder {
    decl: FieldDecl,
}

pub fn field_decl(ty: TypeRef, name: &str) -> FieldBuilder {
    FieldBuilder {
        decl: FieldDecl {
            modifiers: Modifiers::empty(),
            ty,
            name: name.to_string(),
            init: None,
            span: Span::DUMMY,
            generated: false,
        },
    }
}

impl FieldBuilder {
    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.decl.modifiers = modifiers;
        self
    }

    pub fn init(mut self, e: Expression) -> Self {
        self.decl.init = Some(e);
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.decl.span = span;
        self
    }

    pub fn build(self) -> FieldDecl {
        self.decl
    }
}

pub struct MethodBuilder {
    decl: MethodDecl,
}

pub fn method(name: &str) -> MethodBuilder {
    MethodBuilder {
        decl: MethodDecl {
            modifiers: Modifiers::empty(),
            name: name.to_string(),
            return_type: Some(TypeRef::simple("void")),
            params: Vec::new(),
            body: None,
            span: Span::DUMMY,
            generated: false,
        },
    }
}

pub fn constructor(class_name: &str) -> MethodBuilder {
    let mut builder = method(class_name);
    builder.decl.return_type = None;
    builder
}

impl MethodBuilder {
    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.decl.modifiers = modifiers;
        self
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.decl.return_type = Some(ty);
        self
    }

    pub fn param(mut self, p: Param) -> Self {
        self.decl.params.push(p);
        self
    }

    pub fn body(mut self, stmts: Vec<Statement>) -> Self {
        self.decl.body = Some(stmts);
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.decl.span = span;
        self
    }

    pub fn build(self) -> MethodDecl {
        self.decl
    }
}

pub struct ClassBuilder {
    decl: ClassDecl,
}

pub fn class(name: &str) -> ClassBuilder {
    ClassBuilder {
        decl: ClassDecl {
            modifiers: Modifiers::empty(),
            name: name.to_string(),
            implements: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            types: Vec::new(),
            span: Span::DUMMY,
            generated: false,
        },
    }
}

impl ClassBuilder {
    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.decl.modifiers = modifiers;
        self
    }

    pub fn implements(mut self, ty: TypeRef) -> Self {
        self.decl.implements.push(ty);
        self
    }

    pub fn field(mut self, f: FieldDecl) -> Self {
        self.decl.fields.push(f);
        self
    }

    pub fn method(mut self, m: MethodDecl) -> Self {
        self.decl.methods.push(m);
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.decl.span = span;
        self
    }

    pub fn build(self) -> ClassDecl {
        self.decl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_builder_keeps_clause_order() {
        let stmt = for_loop()
            .init(local(TypeRef::simple("int"), "i").init(int(0)).stmt())
            .test(binary(BinaryOp::Lt, name("i"), int(3)))
            .update(post_inc(name("i")))
            .body(block(vec![]));
        let Statement::For(f) = stmt else {
            panic!("expected a for statement");
        };
        assert_eq!(f.init.len(), 1);
        assert!(f.test.is_some());
        assert_eq!(f.update, vec![post_inc(name("i"))]);
    }

    #[test]
    fn constructors_have_no_return_type() {
        assert!(constructor("Foo").build().is_constructor());
        assert!(!method("foo").build().is_constructor());
    }
}

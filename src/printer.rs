//! Java source rendering for the AST, used to show what lowering produced.

use crate::ast::*;

const INDENT: &str = "    ";

// Binding strength, loosest first.
const ASSIGN: u8 = 1;
const CONDITIONAL: u8 = 2;
const UNARY: u8 = 13;
const POSTFIX: u8 = 14;
const PRIMARY: u8 = 15;

fn binary_precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::BitOr => 5,
        BinaryOp::BitXor => 6,
        BinaryOp::BitAnd => 7,
        BinaryOp::Eq | BinaryOp::NotEq => 8,
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => 9,
        BinaryOp::LShift | BinaryOp::RShift => 10,
        BinaryOp::Add | BinaryOp::Sub => 11,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 12,
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Gt => ">",
        BinaryOp::LtEq => "<=",
        BinaryOp::GtEq => ">=",
        BinaryOp::LShift => "<<",
        BinaryOp::RShift => ">>",
        BinaryOp::BitAnd => "&",
        BinaryOp::BitOr => "|",
        BinaryOp::BitXor => "^",
    }
}

fn assign_symbol(op: AssignOp) -> &'static str {
    match op {
        AssignOp::Assign => "=",
        AssignOp::AddAssign => "+=",
        AssignOp::SubAssign => "-=",
        AssignOp::MulAssign => "*=",
        AssignOp::DivAssign => "/=",
        AssignOp::RemAssign => "%=",
    }
}

fn precedence(expr: &Expression) -> u8 {
    match expr {
        Expression::Assign(..) => ASSIGN,
        Expression::Conditional(..) => CONDITIONAL,
        Expression::Logical(LogicalOp::Or, ..) => 3,
        Expression::Logical(LogicalOp::And, ..) => 4,
        Expression::Binary(op, ..) => binary_precedence(*op),
        Expression::InstanceOf(..) => 9,
        Expression::Unary(..) | Expression::Cast(..) | Expression::Update(_, true, _) => UNARY,
        Expression::Update(_, false, _) => POSTFIX,
        _ => PRIMARY,
    }
}

fn escape(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\\' => out.push_str("\\\\"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

fn modifiers(m: Modifiers) -> String {
    let mut out = String::new();
    for (flag, word) in [
        (Modifiers::PUBLIC, "public"),
        (Modifiers::PROTECTED, "protected"),
        (Modifiers::PRIVATE, "private"),
        (Modifiers::ABSTRACT, "abstract"),
        (Modifiers::STATIC, "static"),
        (Modifiers::FINAL, "final"),
    ] {
        if m.contains(flag) {
            out.push_str(word);
            out.push(' ');
        }
    }
    out
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn write(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn class(&mut self, decl: &ClassDecl) {
        self.write(&modifiers(decl.modifiers));
        self.write("class ");
        self.write(&decl.name);
        for (i, ty) in decl.implements.iter().enumerate() {
            self.write(if i == 0 { " implements " } else { ", " });
            self.write(&ty.to_string());
        }
        self.write(" {");
        self.depth += 1;
        for field in &decl.fields {
            self.newline();
            self.field(field);
        }
        for method in &decl.methods {
            self.newline();
            self.method(method);
        }
        for ty in &decl.types {
            self.newline();
            self.class(ty);
        }
        self.depth -= 1;
        self.newline();
        self.write("}");
    }

    fn field(&mut self, field: &FieldDecl) {
        self.write(&modifiers(field.modifiers));
        self.write(&format!("{} {}", field.ty, field.name));
        if let Some(init) = &field.init {
            self.write(" = ");
            self.expression(init, ASSIGN);
        }
        self.write(";");
    }

    fn method(&mut self, m: &MethodDecl) {
        self.write(&modifiers(m.modifiers));
        if let Some(ty) = &m.return_type {
            self.write(&ty.to_string());
            self.write(" ");
        }
        self.write(&m.name);
        self.write("(");
        for (i, p) in m.params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            if p.is_final {
                self.write("final ");
            }
            self.write(&format!("{} {}", p.ty, p.name));
        }
        self.write(")");
        match &m.body {
            Some(body) => {
                self.write(" ");
                self.block(body);
            }
            None => self.write(";"),
        }
    }

    fn block(&mut self, stmts: &[Statement]) {
        if stmts.is_empty() {
            self.write("{}");
            return;
        }
        self.write("{");
        self.depth += 1;
        for stmt in stmts {
            self.newline();
            self.statement(stmt);
        }
        self.depth -= 1;
        self.newline();
        self.write("}");
    }

    /// The body of a compound statement, written after its header.
    fn clause(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Block(stmts) => {
                self.write(" ");
                self.block(stmts);
            }
            _ => {
                self.depth += 1;
                self.newline();
                self.statement(stmt);
                self.depth -= 1;
            }
        }
    }

    fn local(&mut self, decl: &LocalDecl) {
        if decl.is_final {
            self.write("final ");
        }
        self.write(&format!("{} {}", decl.ty, decl.name));
        if let Some(init) = &decl.init {
            self.write(" = ");
            self.expression(init, ASSIGN);
        }
    }

    fn statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Empty => self.write(";"),
            Statement::Expression(e) => {
                self.expression(e, ASSIGN);
                self.write(";");
            }
            Statement::Block(stmts) => self.block(stmts),
            Statement::Local(decl) => {
                self.local(decl);
                self.write(";");
            }
            Statement::LocalClass(decl) => self.class(decl),
            Statement::If(s) => {
                self.write("if (");
                self.expression(&s.test, ASSIGN);
                self.write(")");
                self.clause(&s.consequent);
                if let Some(alt) = &s.alternate {
                    if matches!(*s.consequent, Statement::Block(_)) {
                        self.write(" else");
                    } else {
                        self.newline();
                        self.write("else");
                    }
                    if matches!(**alt, Statement::If(_)) {
                        self.write(" ");
                        self.statement(alt);
                    } else {
                        self.clause(alt);
                    }
                }
            }
            Statement::While(w) => {
                self.write("while (");
                self.expression(&w.test, ASSIGN);
                self.write(")");
                self.clause(&w.body);
            }
            Statement::DoWhile(dw) => {
                self.write("do");
                self.clause(&dw.body);
                if matches!(*dw.body, Statement::Block(_)) {
                    self.write(" ");
                } else {
                    self.newline();
                }
                self.write("while (");
                self.expression(&dw.test, ASSIGN);
                self.write(");");
            }
            Statement::For(f) => {
                self.write("for (");
                for (i, init) in f.init.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    match init {
                        Statement::Local(decl) => self.local(decl),
                        Statement::Expression(e) => self.expression(e, ASSIGN),
                        other => self.statement(other),
                    }
                }
                self.write(";");
                if let Some(test) = &f.test {
                    self.write(" ");
                    self.expression(test, ASSIGN);
                }
                self.write(";");
                for (i, update) in f.update.iter().enumerate() {
                    self.write(if i == 0 { " " } else { ", " });
                    self.expression(update, ASSIGN);
                }
                self.write(")");
                self.clause(&f.body);
            }
            Statement::ForEach(fe) => {
                self.write("for (");
                self.local(&LocalDecl {
                    init: None,
                    ..fe.var.clone()
                });
                self.write(" : ");
                self.expression(&fe.iterable, ASSIGN);
                self.write(")");
                self.clause(&fe.body);
            }
            Statement::Switch(s) => {
                self.write("switch (");
                self.expression(&s.selector, ASSIGN);
                self.write(") {");
                self.depth += 1;
                for case in &s.cases {
                    self.newline();
                    match &case.label {
                        Some(label) => {
                            self.write("case ");
                            self.expression(label, ASSIGN);
                            self.write(":");
                        }
                        None => self.write("default:"),
                    }
                    self.depth += 1;
                    for stmt in &case.body {
                        self.newline();
                        self.statement(stmt);
                    }
                    self.depth -= 1;
                }
                self.depth -= 1;
                self.newline();
                self.write("}");
            }
            Statement::Labeled(label, inner) => {
                self.write(label);
                self.write(":");
                self.newline();
                self.statement(inner);
            }
            Statement::Break(label) => self.jump("break", label.as_deref()),
            Statement::Continue(label) => self.jump("continue", label.as_deref()),
            Statement::Return(e) => {
                self.write("return");
                if let Some(e) = e {
                    self.write(" ");
                    self.expression(e, ASSIGN);
                }
                self.write(";");
            }
            Statement::Throw(e) => {
                self.write("throw ");
                self.expression(e, ASSIGN);
                self.write(";");
            }
            Statement::Try(t) => {
                self.write("try ");
                self.block(&t.block);
                for catch in &t.catches {
                    self.write(&format!(" catch ({} {}) ", catch.ty, catch.name));
                    self.block(&catch.body);
                }
                if let Some(finally) = &t.finally {
                    self.write(" finally ");
                    self.block(finally);
                }
            }
        }
    }

    fn jump(&mut self, keyword: &str, label: Option<&str>) {
        self.write(keyword);
        if let Some(label) = label {
            self.write(" ");
            self.write(label);
        }
        self.write(";");
    }

    fn arguments(&mut self, args: &[Expression]) {
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.expression(arg, ASSIGN);
        }
    }

    /// Writes `expr`, parenthesized when it binds looser than `min`.
    fn expression(&mut self, expr: &Expression, min: u8) {
        let own = precedence(expr);
        let parens = own < min;
        if parens {
            self.write("(");
        }
        match expr {
            Expression::Literal(lit) => self.literal(lit),
            Expression::Name(n) => self.write(n),
            Expression::This => self.write("this"),
            Expression::Super => self.write("super"),
            Expression::QualifiedThis(class) => {
                self.write(class);
                self.write(".this");
            }
            Expression::Field(target, field) => {
                self.expression(target, POSTFIX);
                self.write(".");
                self.write(field);
            }
            Expression::Call(call) => {
                if let Some(receiver) = &call.receiver {
                    self.expression(receiver, POSTFIX);
                    self.write(".");
                }
                self.write(&call.name);
                self.write("(");
                self.arguments(&call.args);
                self.write(")");
            }
            Expression::New(ty, args) => {
                self.write(&format!("new {ty}("));
                self.arguments(args);
                self.write(")");
            }
            Expression::NewArray(element, dims, init) => {
                self.write(&format!("new {element}"));
                for dim in dims {
                    self.write("[");
                    self.expression(dim, ASSIGN);
                    self.write("]");
                }
                if let Some(items) = init {
                    self.write("[] {");
                    self.arguments(items);
                    self.write("}");
                }
            }
            Expression::ArrayInit(items) => {
                self.write("{");
                self.arguments(items);
                self.write("}");
            }
            Expression::Index(array, at) => {
                self.expression(array, POSTFIX);
                self.write("[");
                self.expression(at, ASSIGN);
                self.write("]");
            }
            Expression::Unary(op, operand) => {
                self.write(match op {
                    UnaryOp::Minus => "-",
                    UnaryOp::Plus => "+",
                    UnaryOp::Not => "!",
                    UnaryOp::BitNot => "~",
                });
                // `- -x` must not print as `--x`
                let signed = match &**operand {
                    Expression::Unary(UnaryOp::Minus | UnaryOp::Plus, _) => true,
                    Expression::Update(_, prefix, _) => *prefix,
                    _ => false,
                };
                self.expression(operand, if signed { PRIMARY } else { UNARY });
            }
            Expression::Update(op, prefix, operand) => {
                let symbol = match op {
                    UpdateOp::Increment => "++",
                    UpdateOp::Decrement => "--",
                };
                if *prefix {
                    self.write(symbol);
                    self.expression(operand, UNARY);
                } else {
                    self.expression(operand, POSTFIX);
                    self.write(symbol);
                }
            }
            Expression::Binary(op, left, right) => {
                self.expression(left, own);
                self.write(&format!(" {} ", binary_symbol(*op)));
                self.expression(right, own + 1);
            }
            Expression::Logical(op, left, right) => {
                self.expression(left, own);
                self.write(match op {
                    LogicalOp::And => " && ",
                    LogicalOp::Or => " || ",
                });
                self.expression(right, own + 1);
            }
            Expression::Assign(op, target, value) => {
                self.expression(target, POSTFIX);
                self.write(&format!(" {} ", assign_symbol(*op)));
                self.expression(value, ASSIGN);
            }
            Expression::Conditional(test, then, otherwise) => {
                self.expression(test, CONDITIONAL + 1);
                self.write(" ? ");
                self.expression(then, ASSIGN);
                self.write(" : ");
                self.expression(otherwise, CONDITIONAL);
            }
            Expression::Cast(ty, operand) => {
                self.write(&format!("({ty}) "));
                self.expression(operand, UNARY);
            }
            Expression::InstanceOf(operand, ty) => {
                self.expression(operand, own);
                self.write(&format!(" instanceof {ty}"));
            }
        }
        if parens {
            self.write(")");
        }
    }

    fn literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Null => self.write("null"),
            Literal::Bool(b) => self.write(if *b { "true" } else { "false" }),
            Literal::Int(n) if i32::try_from(*n).is_err() => self.write(&format!("{n}L")),
            Literal::Int(n) => self.write(&n.to_string()),
            Literal::Char(c) => self.write(&format!("'{}'", escape(&c.to_string(), '\''))),
            Literal::Str(s) => self.write(&format!("\"{}\"", escape(s, '"'))),
        }
    }
}

pub fn print_class(decl: &ClassDecl) -> String {
    let mut p = Printer::default();
    p.class(decl);
    p.out.push('\n');
    p.out
}

pub fn print_method(m: &MethodDecl) -> String {
    let mut p = Printer::default();
    p.method(m);
    p.out.push('\n');
    p.out
}

pub fn print_statement(stmt: &Statement) -> String {
    let mut p = Printer::default();
    p.statement(stmt);
    p.out
}

pub fn print_expression(expr: &Expression) -> String {
    let mut p = Printer::default();
    p.expression(expr, ASSIGN);
    p.out
}

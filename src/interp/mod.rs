//! Reference evaluator for the Java subset.
//!
//! Tree-walking, single-threaded, no static typing. It runs enough of the
//! language to execute a class before and after lowering and compare what
//! the generator methods produce: local classes with captured variables,
//! the usual statements, strings, arrays, lists and a handful of library
//! calls.

use crate::ast::*;
use std::cell::RefCell;
use std::rc::Rc;

mod types;
pub use types::*;

mod eval;
mod exec;

const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

pub struct Interpreter {
    global_env: EnvRef,
    main: Rc<ClassInfo>,
    output: Vec<String>,
    steps: u64,
    step_limit: u64,
}

impl Interpreter {
    /// Loads `class` and its nested types.
    pub fn new(class: &ClassDecl) -> Self {
        let global = Environment::new(None);
        let main = Self::register(&global, class);
        Self {
            global_env: global,
            main,
            output: Vec::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    fn register(env: &EnvRef, class: &ClassDecl) -> Rc<ClassInfo> {
        let info = Rc::new(ClassInfo {
            decl: Rc::new(class.clone()),
            captured: env.clone(),
            outer_this: None,
        });
        env.borrow_mut()
            .classes
            .insert(class.name.clone(), info.clone());
        for nested in &class.types {
            Self::register(env, nested);
        }
        info
    }

    /// Bounds the number of statements executed, so a broken state machine
    /// fails instead of spinning.
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    /// Lines printed with `System.out.println`.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// A fresh instance of the loaded class.
    pub fn instantiate(&mut self) -> Result<Value, RuntimeError> {
        let main = self.main.clone();
        self.construct(&main, Vec::new())
    }

    /// Calls `method` on a fresh instance of the loaded class.
    pub fn call(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let receiver = self.instantiate()?;
        self.invoke(&receiver, method, args)
    }

    pub fn invoke(
        &mut self,
        receiver: &Value,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        self.call_method(receiver, method, args)
    }

    /// `source` itself when it is an iterator, otherwise `source.iterator()`.
    pub fn iterator(&mut self, source: &Value) -> Result<Value, RuntimeError> {
        if self.responds_to(source, "hasNext", 0) {
            Ok(source.clone())
        } else {
            self.call_method(source, "iterator", Vec::new())
        }
    }

    /// Pulls up to `limit` values out of an iterator, or out of a fresh
    /// iterator when given an `Iterable`.
    pub fn drain(&mut self, source: &Value, limit: usize) -> Result<Vec<Value>, RuntimeError> {
        let iterator = self.iterator(source)?;
        let mut items = Vec::new();
        while items.len() < limit {
            let more = self.call_method(&iterator, "hasNext", Vec::new())?;
            if !self.truthy(&more)? {
                break;
            }
            items.push(self.call_method(&iterator, "next", Vec::new())?);
        }
        Ok(items)
    }

    fn responds_to(&self, value: &Value, method: &str, arity: usize) -> bool {
        match value {
            Value::Object(obj) => obj.borrow().class.method(method, arity).is_some(),
            Value::ListIter(_) => matches!(method, "hasNext" | "next"),
            _ => false,
        }
    }

    fn tick(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(RuntimeError::StepLimit(self.step_limit));
        }
        Ok(())
    }

    pub(crate) fn truthy(&self, value: &Value) -> Result<bool, RuntimeError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(RuntimeError::mismatch(format!(
                "expected boolean, found {}",
                other.type_name()
            ))),
        }
    }

    fn new_instance(&mut self, class: &Rc<ClassInfo>) -> Result<ObjRef, RuntimeError> {
        let obj = Rc::new(RefCell::new(Instance {
            class: class.clone(),
            fields: Default::default(),
        }));
        let frame = Frame {
            env: Environment::new(Some(class.captured.clone())),
            this: Some(obj.clone()),
        };
        for field in &class.decl.fields {
            let value = match &field.init {
                Some(init) => self.eval(init, &frame)?,
                None => Value::default_for(&field.ty),
            };
            obj.borrow_mut().fields.insert(field.name.clone(), value);
        }
        Ok(obj)
    }

    pub(crate) fn construct(
        &mut self,
        class: &Rc<ClassInfo>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let obj = self.new_instance(class)?;
        if let Some(ctor) = class.constructor(args.len()) {
            self.run_method(&obj, ctor, args)?;
        } else if !args.is_empty() {
            return Err(RuntimeError::UnknownMethod {
                owner: class.decl.name.clone(),
                name: "<init>".into(),
                arity: args.len(),
            });
        }
        Ok(Value::Object(obj))
    }

    pub(crate) fn run_method(
        &mut self,
        obj: &ObjRef,
        method: &MethodDecl,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let frame = Frame {
            env: Environment::new(None),
            this: Some(obj.clone()),
        };
        for (param, arg) in method.params.iter().zip(args) {
            frame.env.borrow_mut().declare(&param.name, arg);
        }
        let Some(body) = &method.body else {
            return Err(RuntimeError::UnknownMethod {
                owner: obj.borrow().class_name().to_string(),
                name: method.name.clone(),
                arity: method.params.len(),
            });
        };
        match self.exec_statements(body, &frame)? {
            Completion::Return(value) => Ok(value),
            Completion::Normal | Completion::Break(_) | Completion::Continue(_) => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;

    fn run(body: Vec<Statement>) -> Interpreter {
        let decl = class("Demo")
            .method(method("main").body(body).build())
            .build();
        let mut interp = Interpreter::new(&decl);
        interp.call("main", Vec::new()).unwrap();
        interp
    }

    fn println(e: Expression) -> Statement {
        expr_stmt(method_call(name("System.out"), "println", vec![e]))
    }

    #[test]
    fn runs_loops_and_prints() {
        let interp = run(vec![
            for_loop()
                .init(local(TypeRef::simple("int"), "i").init(int(0)).stmt())
                .test(binary(BinaryOp::Lt, name("i"), int(3)))
                .update(post_inc(name("i")))
                .body(println(binary(BinaryOp::Add, str_lit("i="), name("i")))),
        ]);
        assert_eq!(interp.output(), ["i=0", "i=1", "i=2"]);
    }

    #[test]
    fn labeled_continue_skips_to_the_outer_loop() {
        let int_ty = TypeRef::simple("int");
        let interp = run(vec![labeled(
            "outer",
            for_loop()
                .init(local(int_ty.clone(), "i").init(int(0)).stmt())
                .test(binary(BinaryOp::Lt, name("i"), int(2)))
                .update(post_inc(name("i")))
                .body(
                    for_loop()
                        .init(local(int_ty, "j").init(int(0)).stmt())
                        .test(binary(BinaryOp::Lt, name("j"), int(5)))
                        .update(post_inc(name("j")))
                        .body(block(vec![
                            if_stmt(
                                binary(BinaryOp::Eq, name("j"), int(1)),
                                continue_stmt(Some("outer")),
                            ),
                            println(binary(BinaryOp::Add, name("i"), name("j"))),
                        ])),
                ),
        )]);
        assert_eq!(interp.output(), ["0", "1"]);
    }

    #[test]
    fn local_classes_capture_variables() {
        let counter = class("Counter")
            .method(
                method("get")
                    .returns(TypeRef::simple("int"))
                    .body(vec![return_stmt(Some(binary(BinaryOp::Add, name("base"), int(1))))])
                    .build(),
            )
            .build();
        let interp = run(vec![
            local(TypeRef::simple("int"), "base")
                .init(int(41))
                .final_()
                .stmt(),
            Statement::LocalClass(counter),
            println(method_call(
                new_instance(TypeRef::simple("Counter"), vec![]),
                "get",
                vec![],
            )),
        ]);
        assert_eq!(interp.output(), ["42"]);
    }

    #[test]
    fn catches_thrown_exceptions() {
        let interp = run(vec![
            Statement::Try(TryStatement {
                block: vec![expr_stmt(binary(BinaryOp::Div, int(1), int(0)))],
                catches: vec![CatchClause {
                    ty: TypeRef::simple("ArithmeticException"),
                    name: "e".into(),
                    body: vec![println(str_lit("caught"))],
                }],
                finally: Some(vec![println(str_lit("finally"))]),
            }),
        ]);
        assert_eq!(interp.output(), ["caught", "finally"]);
    }

    #[test]
    fn runaway_loops_hit_the_step_limit() {
        let decl = class("Demo")
            .method(
                method("spin")
                    .body(vec![while_stmt(bool_lit(true), Statement::Empty)])
                    .build(),
            )
            .build();
        let mut interp = Interpreter::new(&decl).with_step_limit(100);
        assert_eq!(
            interp.call("spin", vec![]),
            Err(RuntimeError::StepLimit(100))
        );
    }

    #[test]
    fn drains_a_list_iterator() {
        let decl = class("Demo")
            .method(
                method("items")
                    .returns(TypeRef::simple("java.util.Iterator"))
                    .body(vec![return_stmt(Some(method_call(
                        method_call(name("java.util.Arrays"), "asList", vec![int(1), int(2)]),
                        "iterator",
                        vec![],
                    )))])
                    .build(),
            )
            .build();
        let mut interp = Interpreter::new(&decl);
        let it = interp.call("items", vec![]).unwrap();
        assert_eq!(
            interp.drain(&it, 10).unwrap(),
            vec![Value::Int(1), Value::Int(2)]
        );
    }
}

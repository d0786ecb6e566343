use jyield::ast::*;
use jyield::builder::*;
use jyield::diagnostics::Diagnostics;
use jyield::interp::{Interpreter, RuntimeError, Value};
use jyield::lower::{Anchor, Outcome, lower_method, process_class};
use jyield::printer::print_method;
use pretty_assertions::assert_eq;

fn int_ty() -> TypeRef {
    TypeRef::simple("int")
}

fn iterator_of(element: &str) -> TypeRef {
    TypeRef::generic("java.util.Iterator", vec![TypeRef::simple(element)])
}

fn generator(name: &str, body: Vec<Statement>) -> MethodDecl {
    method(name)
        .returns(iterator_of("Integer"))
        .body(body)
        .build()
}

fn println(e: Expression) -> Statement {
    expr_stmt(method_call(name("System.out"), "println", vec![e]))
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Int).collect()
}

/// Lowers every method of `decl`, asserting nothing was rejected.
fn lowered(mut decl: ClassDecl) -> ClassDecl {
    let mut sink = Diagnostics::new();
    let outcomes = process_class(&mut decl, &Anchor::default(), &mut sink);
    assert!(
        sink.is_empty(),
        "unexpected diagnostics: {:?}",
        sink.iter().collect::<Vec<_>>()
    );
    assert!(outcomes.iter().all(|o| !matches!(o, Outcome::Rejected(_))));
    decl
}

/// A lowered class `Gen` whose only method is `gen()`.
fn single(body: Vec<Statement>) -> ClassDecl {
    lowered(class("Gen").method(generator("gen", body)).build())
}

fn step(interp: &mut Interpreter, it: &Value, method: &str) -> Result<Value, RuntimeError> {
    interp.invoke(it, method, Vec::new())
}

fn run_generator(decl: &ClassDecl, method: &str, args: Vec<Value>) -> (Vec<Value>, Vec<String>) {
    let mut interp = Interpreter::new(decl);
    let it = interp.call(method, args).unwrap();
    let values = interp.drain(&it, 100).unwrap();
    (values, interp.output().to_vec())
}

fn sequence(body: Vec<Statement>) -> Vec<Value> {
    run_generator(&single(body), "gen", Vec::new()).0
}

fn counting_loop(var: &str, bound: i64, body: Statement) -> Statement {
    for_loop()
        .init(local(int_ty(), var).init(int(0)).stmt())
        .test(binary(BinaryOp::Lt, name(var), int(bound)))
        .update(post_inc(name(var)))
        .body(body)
}

#[test]
fn straight_line_yields_then_exhausts() {
    let decl = single(vec![yield_value(int(1)), yield_value(int(2))]);
    let mut interp = Interpreter::new(&decl);
    let it = interp.call("gen", vec![]).unwrap();

    assert_eq!(step(&mut interp, &it, "next"), Ok(Value::Int(1)));
    assert_eq!(step(&mut interp, &it, "hasNext"), Ok(Value::Bool(true)));
    assert_eq!(step(&mut interp, &it, "next"), Ok(Value::Int(2)));
    assert_eq!(step(&mut interp, &it, "hasNext"), Ok(Value::Bool(false)));
    assert_eq!(step(&mut interp, &it, "hasNext"), Ok(Value::Bool(false)));
    assert_eq!(
        step(&mut interp, &it, "next"),
        Err(RuntimeError::Thrown {
            class: "java.util.NoSuchElementException".into(),
        })
    );
}

#[test]
fn for_loop_counter_survives_suspension() {
    let mut m = generator("count", vec![counting_loop("i", 3, yield_value(name("i")))]);
    let mut sink = Diagnostics::new();
    let Outcome::Lowered(info) = lower_method(&mut m, &Anchor::default(), &mut sink) else {
        panic!("expected the method to be lowered");
    };
    assert_eq!(info.captured, vec!["i".to_string()]);

    let decl = class("Gen").method(m).build();
    assert_eq!(run_generator(&decl, "count", vec![]).0, ints(&[0, 1, 2]));
}

#[test]
fn labeled_break_leaves_the_outer_loop() {
    let tens = binary(BinaryOp::Mul, name("i"), int(10));
    let inner = counting_loop(
        "j",
        3,
        block(vec![
            yield_value(binary(BinaryOp::Add, tens, name("j"))),
            if_stmt(
                logical(
                    LogicalOp::And,
                    binary(BinaryOp::Eq, name("i"), int(1)),
                    binary(BinaryOp::Eq, name("j"), int(1)),
                ),
                break_stmt(Some("outer")),
            ),
        ]),
    );
    let body = vec![
        labeled("outer", counting_loop("i", 3, block(vec![inner]))),
        yield_value(int(99)),
    ];
    assert_eq!(sequence(body), ints(&[0, 1, 2, 10, 11, 99]));
}

#[test]
fn switch_falls_through_adjacent_cases() {
    let dispatch = switch(name("i"))
        .case(int(0), vec![yield_value(int(100))])
        .case(int(1), vec![yield_value(int(101)), break_stmt(None)])
        .default(vec![yield_value(int(102))])
        .build();
    let body = vec![counting_loop("i", 3, block(vec![dispatch]))];
    assert_eq!(sequence(body), ints(&[100, 101, 101, 102]));
}

#[test]
fn empty_case_label_shares_the_next_body() {
    let dispatch = switch(name("i"))
        .case(int(0), vec![])
        .case(int(1), vec![yield_value(int(7))])
        .build();
    let body = vec![counting_loop("i", 2, block(vec![dispatch]))];
    assert_eq!(sequence(body), ints(&[7, 7]));
}

#[test]
fn switch_without_default_skips_unmatched_values() {
    let dispatch = switch(name("i"))
        .case(int(1), vec![yield_value(int(1))])
        .build();
    let body = vec![
        counting_loop("i", 3, block(vec![dispatch])),
        yield_value(int(9)),
    ];
    assert_eq!(sequence(body), ints(&[1, 9]));
}

#[test]
fn do_while_continue_rechecks_the_condition() {
    let second = binary(BinaryOp::Eq, name("i"), int(2));
    let body = vec![
        local(int_ty(), "i").init(int(0)).stmt(),
        do_while(
            block(vec![
                expr_stmt(post_inc(name("i"))),
                if_stmt(second, continue_stmt(None)),
                yield_value(name("i")),
            ]),
            binary(BinaryOp::Lt, name("i"), int(4)),
        ),
    ];
    assert_eq!(sequence(body), ints(&[1, 3, 4]));
}

#[test]
fn while_true_with_break() {
    let body = vec![
        local(int_ty(), "i").init(int(0)).stmt(),
        while_stmt(
            bool_lit(true),
            block(vec![
                if_stmt(binary(BinaryOp::Eq, name("i"), int(3)), break_stmt(None)),
                yield_value(name("i")),
                expr_stmt(post_inc(name("i"))),
            ]),
        ),
    ];
    assert_eq!(sequence(body), ints(&[0, 1, 2]));
}

#[test]
fn if_else_branches_both_suspend() {
    let parity = binary(BinaryOp::Rem, name("i"), int(2));
    let negated = Expression::Unary(UnaryOp::Minus, Box::new(name("i")));
    let body = vec![counting_loop(
        "i",
        4,
        block(vec![if_else(
            binary(BinaryOp::Eq, parity, int(0)),
            yield_value(name("i")),
            block(vec![yield_value(negated)]),
        )]),
    )];
    assert_eq!(sequence(body), ints(&[0, -1, 2, -3]));
}

#[test]
fn locals_keep_their_values_across_resumptions() {
    let body = vec![
        local(int_ty(), "total").init(int(0)).stmt(),
        counting_loop(
            "i",
            4,
            block(vec![
                expr_stmt(compound_assign(AssignOp::AddAssign, name("total"), name("i"))),
                yield_value(name("total")),
            ]),
        ),
    ];
    assert_eq!(sequence(body), ints(&[0, 1, 3, 6]));
}

#[test]
fn foreach_over_a_list_promotes_the_element() {
    let words = method_call(
        name("java.util.Arrays"),
        "asList",
        vec![str_lit("a"), str_lit("b")],
    );
    let m = method("shout")
        .returns(iterator_of("String"))
        .body(vec![for_each(
            local(TypeRef::simple("String"), "s").decl(),
            words,
            block(vec![yield_value(binary(BinaryOp::Add, name("s"), str_lit("!")))]),
        )])
        .build();
    let decl = lowered(class("Gen").method(m).build());
    assert_eq!(
        run_generator(&decl, "shout", vec![]).0,
        vec![Value::str("a!"), Value::str("b!")]
    );
}

#[test]
fn side_effects_run_once_and_in_order() {
    let decl = single(vec![
        println(str_lit("a")),
        yield_value(int(1)),
        println(str_lit("b")),
        yield_value(int(2)),
        println(str_lit("c")),
    ]);
    let mut interp = Interpreter::new(&decl);
    let it = interp.call("gen", vec![]).unwrap();

    assert!(interp.output().is_empty());
    assert_eq!(step(&mut interp, &it, "hasNext"), Ok(Value::Bool(true)));
    assert_eq!(step(&mut interp, &it, "hasNext"), Ok(Value::Bool(true)));
    assert_eq!(interp.output(), ["a"]);
    assert_eq!(interp.drain(&it, 10).unwrap(), ints(&[1, 2]));
    assert_eq!(interp.output(), ["a", "b", "c"]);
}

#[test]
fn final_parameters_are_captured_not_promoted() {
    let loop_to_n = for_loop()
        .init(local(int_ty(), "i").init(int(0)).stmt())
        .test(binary(BinaryOp::Lt, name("i"), name("n")))
        .update(post_inc(name("i")))
        .body(yield_value(name("i")));
    let mut m = method("upTo")
        .returns(iterator_of("Integer"))
        .param(param(int_ty(), "n"))
        .body(vec![loop_to_n])
        .build();

    let mut sink = Diagnostics::new();
    let Outcome::Lowered(info) = lower_method(&mut m, &Anchor::default(), &mut sink) else {
        panic!("expected the method to be lowered");
    };
    assert!(!info.captured.contains(&"n".to_string()));

    let decl = class("Gen").method(m).build();
    let (values, _) = run_generator(&decl, "upTo", vec![Value::Int(3)]);
    assert_eq!(values, ints(&[0, 1, 2]));
}

#[test]
fn outer_fields_are_shared_with_the_enclosing_instance() {
    let body = vec![
        yield_value(binary(BinaryOp::Add, name("base"), int(1))),
        assign_stmt(name("base"), binary(BinaryOp::Add, name("base"), int(10))),
        yield_value(field(Expression::QualifiedThis("Gen".into()), "base")),
    ];
    let outer = class("Gen")
        .field(field_decl(int_ty(), "base").init(int(100)).build())
        .method(generator("gen", body))
        .build();
    let decl = lowered(outer);
    assert_eq!(run_generator(&decl, "gen", vec![]).0, ints(&[101, 110]));
}

#[test]
fn iterable_form_hands_out_fresh_iterators() {
    let m = method("twice")
        .returns(TypeRef::generic("java.lang.Iterable", vec![TypeRef::simple("Integer")]))
        .body(vec![yield_value(int(1)), yield_value(int(2))])
        .build();
    let decl = lowered(class("Gen").method(m).build());
    let mut interp = Interpreter::new(&decl);
    let iterable = interp.call("twice", vec![]).unwrap();

    let first = step(&mut interp, &iterable, "iterator").unwrap();
    let second = step(&mut interp, &iterable, "iterator").unwrap();
    assert_ne!(first, second);
    assert_eq!(interp.drain(&first, 10).unwrap(), ints(&[1, 2]));
    assert_eq!(interp.drain(&second, 10).unwrap(), ints(&[1, 2]));
}

#[test]
fn remove_is_unsupported() {
    let decl = single(vec![yield_value(int(1))]);
    let mut interp = Interpreter::new(&decl);
    let it = interp.call("gen", vec![]).unwrap();
    assert_eq!(
        step(&mut interp, &it, "remove"),
        Err(RuntimeError::Thrown {
            class: "java.lang.UnsupportedOperationException".into(),
        })
    );
}

#[test]
fn methods_without_yield_run_unchanged() {
    let plain = method("answer")
        .returns(int_ty())
        .body(vec![return_stmt(Some(int(42)))])
        .build();
    let original = class("Gen").method(plain).build();
    let decl = lowered(original.clone());
    assert_eq!(decl, original);
    let answer = Interpreter::new(&decl).call("answer", vec![]);
    assert_eq!(answer, Ok(Value::Int(42)));
}

#[test]
fn unlowered_generators_do_not_run() {
    let gen_method = generator("gen", vec![yield_value(int(1))]);
    let decl = class("Gen").method(gen_method).build();
    let result = Interpreter::new(&decl).call("gen", vec![]);
    assert_eq!(result, Err(RuntimeError::UnloweredYield));
}

fn rejected(m: MethodDecl) -> Vec<String> {
    let original = m.clone();
    let mut m = m;
    let mut sink = Diagnostics::new();
    let outcome = lower_method(&mut m, &Anchor::default(), &mut sink);
    assert!(
        matches!(outcome, Outcome::Rejected(n) if n > 0),
        "got {outcome:?}"
    );
    assert_eq!(m, original);
    sink.errors().map(|d| d.message.clone()).collect()
}

#[test]
fn return_alongside_yield_is_rejected() {
    let errors = rejected(generator("gen", vec![yield_value(int(1)), return_stmt(None)]));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("return"));
}

#[test]
fn non_final_parameters_are_rejected() {
    let m = method("gen")
        .returns(iterator_of("Integer"))
        .param(Param {
            is_final: false,
            ..param(int_ty(), "n")
        })
        .body(vec![yield_value(name("n"))])
        .build();
    let errors = rejected(m);
    assert!(errors[0].contains("'n' must be final"));
}

#[test]
fn unqualified_this_is_rejected() {
    let errors = rejected(generator("gen", vec![yield_value(field(Expression::This, "base"))]));
    assert!(errors.iter().any(|e| e.contains("'this'")));
}

#[test]
fn conflicting_promoted_types_are_rejected() {
    let m = method("gen")
        .returns(iterator_of("Object"))
        .body(vec![
            block(vec![
                local(int_ty(), "x").init(int(1)).stmt(),
                yield_value(name("x")),
            ]),
            block(vec![
                local(TypeRef::simple("String"), "x")
                    .init(str_lit("a"))
                    .stmt(),
                yield_value(name("x")),
            ]),
        ])
        .build();
    let errors = rejected(m);
    assert!(errors.iter().any(|e| e.contains("'x'")));
}

#[test]
fn yield_inside_try_is_rejected() {
    let errors = rejected(generator("gen", vec![try_finally(vec![yield_value(int(1))], vec![])]));
    assert!(errors[0].contains("try"));
}

#[test]
fn break_from_try_to_a_suspending_loop_is_rejected() {
    let body = vec![while_stmt(
        bool_lit(true),
        block(vec![
            yield_value(int(1)),
            try_finally(vec![break_stmt(None)], vec![]),
        ]),
    )];
    let errors = rejected(generator("gen", body));
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0],
        "break/continue out of try in a method with yield()"
    );
}

#[test]
fn lowered_method_prints_as_a_local_class() {
    let mut m = generator("count", vec![counting_loop("i", 3, yield_value(name("i")))]);
    lower_method(&mut m, &Anchor::default(), &mut Diagnostics::new());
    let source = print_method(&m);
    assert!(source.contains("final class $YielderCount implements java.util.Iterator<Integer>"));
    assert!(source.contains("switch ($state)"));
    assert!(source.contains("private int i;"));
    assert!(source.trim_end().ends_with("return new $YielderCount();\n}"));
}

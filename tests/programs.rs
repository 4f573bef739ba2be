//! End-to-end programs through the public API

#![expect(clippy::unwrap_used)] // test code OK

use pretty_assertions::assert_eq;
use storexp::ast::Value;
use storexp::scheme::{ParseConfig, parse_scheme_program};
use storexp::syntax::{CExp, Exp, Program, parse_program};
use storexp::{Env, Error, ParseErrorKind, Session};

fn run(source: &str) -> Result<Value, Error> {
    Session::new().eval_parse(source)
}

#[test]
fn global_mutation_through_closure() {
    let mut session = Session::new();
    let result = session
        .eval_parse(
            "(define x 5)
             (define y (lambda (z) (set! x (+ x z)) x))
             (y 3)",
        )
        .unwrap();
    assert_eq!(result, Value::Number(8));
    assert_eq!(session.eval_parse("x").unwrap(), Value::Number(8));
}

#[test]
fn closures_sharing_a_frame_see_each_others_writes() {
    let source = "
        (define account
          (let ((balance 100))
            (list (lambda (amount) (set! balance (- balance amount)) balance)
                  (lambda () balance))))
        (define withdraw (car account))
        (define balance-of (car (cdr account)))
        (withdraw 30)
        (withdraw 20)
        (balance-of)";
    assert_eq!(run(source).unwrap(), Value::Number(50));
}

#[test]
fn mutual_recursion_between_top_level_definitions() {
    let source = "
        (define even? (lambda (n) (if (= n 0) #t (odd? (- n 1)))))
        (define odd? (lambda (n) (if (= n 0) #f (even? (- n 1)))))
        (list (even? 12) (odd? 12) (odd? 9))";
    assert_eq!(
        run(source).unwrap(),
        Value::List(vec![
            Value::Bool(true),
            Value::Bool(false),
            Value::Bool(true)
        ])
    );
}

#[test]
fn only_false_is_false() {
    assert_eq!(run("(if 0 \"a\" \"b\")").unwrap(), Value::String("a".into()));
    assert_eq!(run("(if \"\" 1 2)").unwrap(), Value::Number(1));
    assert_eq!(run("(if '() 1 2)").unwrap(), Value::Number(1));
    assert_eq!(run("(if #f 1 2)").unwrap(), Value::Number(2));
}

#[test]
fn innermost_binding_wins() {
    let source = "(let ((x 1)) (let ((x 2)) (let ((y x)) (list x y))))";
    assert_eq!(
        run(source).unwrap(),
        Value::List(vec![Value::Number(2), Value::Number(2)])
    );
}

#[test]
fn empty_program_fails() {
    assert_eq!(run(""), Err(Error::EmptyProgram));
    assert_eq!(
        Session::new().eval_program(&Program::default()),
        Err(Error::EmptyProgram)
    );
    assert_eq!(run("(let ((x 1)))"), Err(Error::EmptyProgram));
    assert_eq!(run("((lambda (x)) 1)"), Err(Error::EmptyProgram));
    assert_eq!(
        run("(define nothing (lambda ())) (nothing)"),
        Err(Error::EmptyProgram)
    );
}

#[test]
fn error_kinds() {
    assert_eq!(run("nope"), Err(Error::UnboundVariable("nope".into())));
    assert_eq!(run("(1 2)"), Err(Error::BadProcedure("1".into())));
    assert_eq!(
        run("(define f (lambda (a b) a)) (f 1)"),
        Err(Error::arity_error(2, 1))
    );
    match run("(define") {
        Err(Error::ParseError(err)) => assert_eq!(err.kind, ParseErrorKind::Incomplete),
        other => panic!("expected incomplete input, got {other:?}"),
    }
    match run("(lambda (x x) x)") {
        Err(Error::ParseError(err)) => assert_eq!(err.kind, ParseErrorKind::InvalidForm),
        other => panic!("expected invalid form, got {other:?}"),
    }
}

#[test]
fn redefinition_keeps_first_binding() {
    let mut session = Session::new();
    session.eval_parse("(define x 1) (define x 2)").unwrap();
    assert_eq!(session.eval_parse("x").unwrap(), Value::Number(1));

    // Both cells exist; only the first is reachable by name
    assert_eq!(session.store().len(), 2);
    assert_eq!(session.store().read(1).unwrap(), Value::Number(2));
    assert_eq!(session.global_env().len(), 2);
}

#[test]
fn sessions_are_isolated() {
    let mut first = Session::new();
    let mut second = Session::new();

    first.eval_parse("(define shared 1)").unwrap();
    assert_eq!(
        second.eval_parse("shared"),
        Err(Error::UnboundVariable("shared".into()))
    );
    assert!(second.store().is_empty());

    second.eval_parse("(define shared 2)").unwrap();
    assert_eq!(first.eval_parse("shared").unwrap(), Value::Number(1));
    assert_eq!(second.eval_parse("shared").unwrap(), Value::Number(2));
}

#[test]
fn state_persists_across_calls_and_errors() {
    let mut session = Session::new();
    session.eval_parse("(define n 0)").unwrap();
    session.eval_parse("(define bump (lambda () (set! n (+ n 1)) n))").unwrap();

    // The set! before the failure has already happened
    assert!(session.eval_parse("(bump) (car '())").is_err());
    assert_eq!(session.eval_parse("(bump)").unwrap(), Value::Number(2));
}

#[test]
fn programs_with_comments() {
    let source = "
        ; running total
        (define total 0)
        (define add! (lambda (n) (set! total (+ total n)) total)) ; returns the new total
        (add! 4)
        (add! 6)";
    let config = ParseConfig {
        handle_comments: true,
    };
    assert_eq!(
        Session::new()
            .eval_parse_with_config(source, config)
            .unwrap(),
        Value::Number(10)
    );
    assert!(Session::new().eval_parse(source).is_err());
}

#[test]
fn staged_pipeline() {
    let data = parse_scheme_program("(define k 3) (* k k)", ParseConfig::default()).unwrap();
    let program = parse_program(&data).unwrap();
    assert!(matches!(program.exps[0], Exp::Define { ref var, .. } if var == "k"));
    assert!(matches!(program.exps[1], Exp::Expr(CExp::App { .. })));

    let mut session = Session::new();
    assert_eq!(session.eval_program(&program).unwrap(), Value::Number(9));
    assert_eq!(
        session
            .eval_sequence(&program.exps[1..], &Env::Global)
            .unwrap(),
        Value::Number(9)
    );
}

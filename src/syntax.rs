//! Expression tree consumed by the evaluator, and its construction from data.
//!
//! The reader ([`crate::scheme`]) turns text into nested [`Value`] data; this module
//! gives that data meaning. Sequence elements ([`Exp`]) are `define`, `set!` or a
//! compound expression ([`CExp`]). Because `define` and `set!` only exist as
//! sequence elements, they cannot appear in an operand, a test or a binding value.

use crate::ast::{NumberType, Value};
use crate::builtinops::{BuiltinOp, find_scheme_op};
use crate::{Error, ParseError, ParseErrorKind};
use std::rc::Rc;

/// Names with special meaning; they can be neither referenced nor bound.
pub const SPECIAL_FORMS: [&str; 6] = ["define", "set!", "if", "lambda", "let", "quote"];

/// Element of a body or program sequence
#[derive(Debug, Clone, PartialEq)]
pub enum Exp {
    /// `(define var val)`, always binds in the global environment
    Define { var: String, val: CExp },
    /// `(set! var val)`
    Set { var: String, val: CExp },
    Expr(CExp),
}

/// Compound expression
#[derive(Debug, Clone, PartialEq)]
pub enum CExp {
    Num(NumberType),
    Bool(bool),
    Str(String),
    PrimOp(&'static BuiltinOp),
    VarRef(String),
    /// Quoted datum
    Lit(Value),
    If {
        test: Box<CExp>,
        then: Box<CExp>,
        alt: Box<CExp>,
    },
    /// `(lambda (params...) body...)`
    Proc {
        params: Rc<[String]>,
        body: Rc<[Exp]>,
    },
    Let {
        bindings: Vec<Binding>,
        body: Rc<[Exp]>,
    },
    App {
        rator: Box<CExp>,
        rands: Vec<CExp>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub var: String,
    pub val: CExp,
}

/// Sequence of top-level forms
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub exps: Vec<Exp>,
}

fn invalid_form(message: impl Into<String>) -> Error {
    Error::ParseError(ParseError::from_message(
        ParseErrorKind::InvalidForm,
        message,
    ))
}

/// Convert a sequence of top-level data into a program
pub fn parse_program(data: &[Value]) -> Result<Program, Error> {
    let exps = data.iter().map(parse_exp).collect::<Result<_, _>>()?;
    Ok(Program { exps })
}

/// Convert one datum into a sequence element
pub fn parse_exp(datum: &Value) -> Result<Exp, Error> {
    match datum {
        Value::List(elements) => match elements.as_slice() {
            [Value::Symbol(head), rest @ ..] if head == "define" => {
                let (var, val) = parse_binding_form("define", rest, datum)?;
                Ok(Exp::Define { var, val })
            }
            [Value::Symbol(head), rest @ ..] if head == "set!" => {
                let (var, val) = parse_binding_form("set!", rest, datum)?;
                Ok(Exp::Set { var, val })
            }
            _ => parse_cexp(datum).map(Exp::Expr),
        },
        _ => parse_cexp(datum).map(Exp::Expr),
    }
}

/// `(define var val)` and `(set! var val)` share their shape
fn parse_binding_form(
    form: &str,
    args: &[Value],
    datum: &Value,
) -> Result<(String, CExp), Error> {
    match args {
        [Value::Symbol(var), val] => {
            check_bindable(var)?;
            Ok((var.clone(), parse_cexp(val)?))
        }
        [_, _] => Err(invalid_form(format!("{form} requires a symbol: {datum}"))),
        _ => Err(Error::arity_error_with_expr(2, args.len(), format!("{datum}"))),
    }
}

/// Convert one datum into a compound expression
pub fn parse_cexp(datum: &Value) -> Result<CExp, Error> {
    match datum {
        Value::Number(n) => Ok(CExp::Num(*n)),
        Value::Bool(b) => Ok(CExp::Bool(*b)),
        Value::String(s) => Ok(CExp::Str(s.clone())),
        Value::Symbol(name) => parse_symbol(name),
        Value::List(elements) => parse_compound(elements, datum),
        Value::Primitive(op) => Ok(CExp::PrimOp(*op)),
        Value::Closure(_) | Value::Unspecified => {
            Err(invalid_form(format!("Unexpected datum: {datum}")))
        }
    }
}

fn parse_symbol(name: &str) -> Result<CExp, Error> {
    if SPECIAL_FORMS.contains(&name) {
        return Err(invalid_form(format!(
            "Special form '{name}' cannot be used as a variable"
        )));
    }
    Ok(match find_scheme_op(name) {
        Some(op) => CExp::PrimOp(op),
        None => CExp::VarRef(name.to_owned()),
    })
}

fn parse_compound(elements: &[Value], datum: &Value) -> Result<CExp, Error> {
    match elements {
        [] => Err(invalid_form("Cannot evaluate empty list")),
        [Value::Symbol(head), args @ ..] => match head.as_str() {
            "if" => parse_if(args, datum),
            "lambda" => parse_lambda(args, datum),
            "let" => parse_let(args, datum),
            "quote" => match args {
                [content] => Ok(CExp::Lit(content.clone())),
                _ => Err(Error::arity_error_with_expr(1, args.len(), format!("{datum}"))),
            },
            "define" | "set!" => Err(invalid_form(format!(
                "{head} is only allowed as an element of a body or program: {datum}"
            ))),
            _ => parse_app(elements),
        },
        _ => parse_app(elements),
    }
}

fn parse_if(args: &[Value], datum: &Value) -> Result<CExp, Error> {
    match args {
        [test, then, alt] => Ok(CExp::If {
            test: Box::new(parse_cexp(test)?),
            then: Box::new(parse_cexp(then)?),
            alt: Box::new(parse_cexp(alt)?),
        }),
        _ => Err(Error::arity_error_with_expr(3, args.len(), format!("{datum}"))),
    }
}

fn parse_lambda(args: &[Value], datum: &Value) -> Result<CExp, Error> {
    match args {
        [Value::List(param_list), body @ ..] => {
            let mut params = Vec::with_capacity(param_list.len());
            for param in param_list {
                match param {
                    Value::Symbol(name) => {
                        check_bindable(name)?;
                        if params.contains(name) {
                            return Err(invalid_form(format!(
                                "Duplicate parameter name: {name}"
                            )));
                        }
                        params.push(name.clone());
                    }
                    _ => {
                        return Err(invalid_form(format!(
                            "Lambda parameters must be symbols: {datum}"
                        )));
                    }
                }
            }

            // Only fixed-arity lambdas: (lambda args body) and dotted rest
            // parameters are not part of the language.
            Ok(CExp::Proc {
                params: params.into(),
                body: parse_body(body)?,
            })
        }
        [] => Err(Error::arity_error_with_expr(2, 0, format!("{datum}"))),
        _ => Err(invalid_form(format!(
            "Lambda parameters must be a list: {datum}"
        ))),
    }
}

fn parse_let(args: &[Value], datum: &Value) -> Result<CExp, Error> {
    match args {
        [Value::List(binding_list), body @ ..] => {
            let mut bindings: Vec<Binding> = Vec::with_capacity(binding_list.len());
            for binding in binding_list {
                match binding {
                    Value::List(pair) => match pair.as_slice() {
                        [Value::Symbol(var), val] => {
                            check_bindable(var)?;
                            if bindings.iter().any(|b| &b.var == var) {
                                return Err(invalid_form(format!(
                                    "Duplicate let binding: {var}"
                                )));
                            }
                            bindings.push(Binding {
                                var: var.clone(),
                                val: parse_cexp(val)?,
                            });
                        }
                        _ => {
                            return Err(invalid_form(format!(
                                "Let binding must be (name value): {binding}"
                            )));
                        }
                    },
                    _ => {
                        return Err(invalid_form(format!(
                            "Let binding must be (name value): {binding}"
                        )));
                    }
                }
            }
            Ok(CExp::Let {
                bindings,
                body: parse_body(body)?,
            })
        }
        [] => Err(Error::arity_error_with_expr(2, 0, format!("{datum}"))),
        _ => Err(invalid_form(format!("Let bindings must be a list: {datum}"))),
    }
}

/// An empty body is accepted; evaluating it fails with [`Error::EmptyProgram`]
fn parse_body(body: &[Value]) -> Result<Rc<[Exp]>, Error> {
    body.iter().map(parse_exp).collect()
}

fn parse_app(elements: &[Value]) -> Result<CExp, Error> {
    match elements {
        [rator, rands @ ..] => Ok(CExp::App {
            rator: Box::new(parse_cexp(rator)?),
            rands: rands.iter().map(parse_cexp).collect::<Result<_, _>>()?,
        }),
        [] => Err(invalid_form("Cannot evaluate empty list")),
    }
}

/// Primitive and special form names always denote themselves, so binding them is rejected
fn check_bindable(name: &str) -> Result<(), Error> {
    if SPECIAL_FORMS.contains(&name) {
        return Err(invalid_form(format!("Cannot bind special form name: {name}")));
    }
    if find_scheme_op(name).is_some() {
        return Err(invalid_form(format!("Cannot rebind primitive: {name}")));
    }
    Ok(())
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};
    use pretty_assertions::assert_eq;

    fn var(name: &str) -> CExp {
        CExp::VarRef(name.to_owned())
    }

    fn prim(name: &str) -> CExp {
        CExp::PrimOp(find_scheme_op(name).unwrap())
    }

    #[test]
    fn test_atoms() {
        let cases = vec![
            (val(42), CExp::Num(42)),
            (val(true), CExp::Bool(true)),
            (val("s"), CExp::Str("s".into())),
            (sym("x"), var("x")),
            (sym("+"), prim("+")),
            (val(vec![sym("quote"), sym("a")]), CExp::Lit(sym("a"))),
            (val(vec![sym("quote"), nil()]), CExp::Lit(nil())),
        ];
        for (datum, expected) in cases {
            assert_eq!(parse_cexp(&datum).unwrap(), expected, "datum {datum}");
        }
    }

    #[test]
    fn test_compound_forms() {
        let datum = val(vec![sym("if"), sym("x"), val(1), val(2)]);
        assert_eq!(
            parse_cexp(&datum).unwrap(),
            CExp::If {
                test: Box::new(var("x")),
                then: Box::new(CExp::Num(1)),
                alt: Box::new(CExp::Num(2)),
            }
        );

        let datum = val(vec![sym("f"), val(1), sym("y")]);
        assert_eq!(
            parse_cexp(&datum).unwrap(),
            CExp::App {
                rator: Box::new(var("f")),
                rands: vec![CExp::Num(1), var("y")],
            }
        );

        let datum = val(vec![
            sym("let"),
            val(vec![val(vec![sym("a"), val(1)])]),
            val(vec![sym("set!"), sym("a"), val(2)]),
            sym("a"),
        ]);
        let CExp::Let { bindings, body } = parse_cexp(&datum).unwrap() else {
            panic!("expected let");
        };
        assert_eq!(
            bindings,
            vec![Binding {
                var: "a".into(),
                val: CExp::Num(1)
            }]
        );
        assert_eq!(
            body.to_vec(),
            vec![
                Exp::Set {
                    var: "a".into(),
                    val: CExp::Num(2)
                },
                Exp::Expr(var("a")),
            ]
        );
    }

    #[test]
    fn test_lambda_body_is_a_sequence() {
        let datum = val(vec![
            sym("lambda"),
            val(vec![sym("z")]),
            val(vec![sym("define"), sym("g"), sym("z")]),
            sym("z"),
        ]);
        let CExp::Proc { params, body } = parse_cexp(&datum).unwrap() else {
            panic!("expected lambda");
        };
        assert_eq!(params.to_vec(), vec!["z".to_owned()]);
        assert_eq!(body.len(), 2);
        assert!(matches!(body[0], Exp::Define { .. }));
    }

    #[test]
    fn test_empty_bodies_are_accepted() {
        let datum = val(vec![sym("lambda"), val(vec![sym("x")])]);
        let CExp::Proc { body, .. } = parse_cexp(&datum).unwrap() else {
            panic!("expected lambda");
        };
        assert!(body.is_empty());

        let datum = val(vec![sym("let"), val(vec![val(vec![sym("a"), val(1)])])]);
        let CExp::Let { bindings, body } = parse_cexp(&datum).unwrap() else {
            panic!("expected let");
        };
        assert_eq!(bindings.len(), 1);
        assert!(body.is_empty());
    }

    #[test]
    fn test_top_level_forms() {
        let program = parse_program(&[
            val(vec![sym("define"), sym("x"), val(5)]),
            val(vec![sym("set!"), sym("x"), val(6)]),
            sym("x"),
        ])
        .unwrap();
        assert_eq!(
            program.exps,
            vec![
                Exp::Define {
                    var: "x".into(),
                    val: CExp::Num(5)
                },
                Exp::Set {
                    var: "x".into(),
                    val: CExp::Num(6)
                },
                Exp::Expr(var("x")),
            ]
        );
        assert_eq!(parse_program(&[]).unwrap(), Program::default());
    }

    #[test]
    fn test_invalid_forms() {
        let cases = vec![
            (nil(), "empty list"),
            (val(vec![sym("if"), val(true), val(1)]), "ArityError"),
            (val(vec![sym("quote")]), "ArityError"),
            (val(vec![sym("lambda"), sym("args"), val(1)]), "must be a list"),
            (
                val(vec![sym("lambda"), val(vec![sym("x"), sym("x")]), sym("x")]),
                "Duplicate parameter",
            ),
            (
                val(vec![sym("lambda"), val(vec![val(1)]), val(1)]),
                "must be symbols",
            ),
            (
                val(vec![sym("let"), val(vec![sym("a")]), val(1)]),
                "(name value)",
            ),
            (
                val(vec![
                    sym("let"),
                    val(vec![val(vec![sym("a"), val(1)]), val(vec![sym("a"), val(2)])]),
                    sym("a"),
                ]),
                "Duplicate let binding",
            ),
            // set! and define are rejected in expression position
            (
                val(vec![sym("+"), val(vec![sym("set!"), sym("x"), val(1)])]),
                "only allowed",
            ),
            (
                val(vec![sym("if"), val(vec![sym("define"), sym("x"), val(1)]), val(1), val(2)]),
                "only allowed",
            ),
            (sym("lambda"), "cannot be used as a variable"),
            (
                val(vec![sym("lambda"), val(vec![sym("car")]), sym("car")]),
                "Cannot rebind primitive",
            ),
        ];

        for (datum, expected) in cases {
            let err = parse_cexp(&datum).unwrap_err();
            let msg = format!("{err}");
            assert!(
                msg.contains(expected),
                "{datum}: error should contain '{expected}', got: {msg}"
            );
        }
    }

    #[test]
    fn test_invalid_top_level_forms() {
        let cases = vec![
            (val(vec![sym("define"), val(1), val(2)]), "requires a symbol"),
            (val(vec![sym("define"), sym("x")]), "ArityError"),
            (val(vec![sym("set!"), sym("x"), val(1), val(2)]), "ArityError"),
            (val(vec![sym("define"), sym("if"), val(1)]), "special form"),
            (val(vec![sym("define"), sym("+"), val(1)]), "Cannot rebind primitive"),
        ];

        for (datum, expected) in cases {
            let err = parse_exp(&datum).unwrap_err();
            let msg = format!("{err}");
            assert!(
                msg.contains(expected),
                "{datum}: error should contain '{expected}', got: {msg}"
            );
        }
    }
}

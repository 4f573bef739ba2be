//! This module defines the runtime [`Value`] type shared by the reader, the evaluator
//! and the store. Values cover self-evaluating literals (numbers, strings, booleans),
//! literal data produced by `quote` (symbols and lists), references to primitive
//! operations, closures and the unspecified result of `define`/`set!`.
//! Helper functions such as [`val`], [`sym`], and [`nil`] make building data in
//! tests concise, and `Display` renders values the way the REPL prints them.

use crate::Error;
use crate::builtinops::BuiltinOp;
use crate::evaluator::Env;
use crate::syntax::Exp;
use std::rc::Rc;

/// Type alias for number values in interpreter
pub(crate) type NumberType = i64;

/// Allowed non-alphanumeric characters in Scheme symbol names
/// Most represent mathematical symbols or predicates ("?"), "!" marks mutators such as `set!`
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$";

/// Check if a string is a valid symbol name
/// Valid: non-empty, no leading digit, no "-digit" prefix, alphanumeric + SYMBOL_SPECIAL_CHARS
pub(crate) fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        None => false,
        Some(first_char) => {
            if first_char.is_ascii_digit() {
                return false;
            }

            if first_char == '-'
                && let Some(second_char) = chars.next()
                && second_char.is_ascii_digit()
            {
                return false;
            }

            name.chars()
                .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
        }
    }
}

/// Runtime value of the interpreter
///
/// The same type doubles as the datum produced by the reader: source text is read
/// into nested `List`/`Symbol`/literal values before [`crate::syntax`] turns it
/// into an expression tree.
#[derive(Clone)]
pub enum Value {
    /// Numbers (integers only)
    Number(NumberType),
    /// Symbols (only produced by quoted data)
    Symbol(String),
    /// String literals
    String(String),
    /// Boolean values
    Bool(bool),
    /// Proper lists; the empty list represents nil
    List(Vec<Value>),
    /// Reference to a primitive operation, uninterpreted until applied
    Primitive(&'static BuiltinOp),
    /// User-defined procedure
    Closure(Closure),
    /// Result of forms evaluated for effect (`define`, `set!`)
    /// These values never equal themselves or any other value
    Unspecified,
}

/// Runtime representation of a `lambda`
///
/// Parameters and body are shared with the expression tree they came from, so
/// creating a closure never copies the body. `env` is the environment at the point
/// of creation, not at the point of call.
#[derive(Clone)]
pub struct Closure {
    pub params: Rc<[String]>,
    pub body: Rc<[Exp]>,
    pub env: Env,
}

impl Closure {
    pub(crate) fn new(params: Rc<[String]>, body: Rc<[Exp]>, env: Env) -> Self {
        Closure { params, body, env }
    }
}

/// Closures compare by identity: same code, same captured environment.
impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.params, &other.params)
            && Rc::ptr_eq(&self.body, &other.body)
            && self.env == other.env
    }
}

impl std::fmt::Debug for Closure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Captured environment omitted
        write!(f, "Closure(params={:?}, body={:?})", self.params, self.body)
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::String(s) => write!(f, "String(\"{s}\")"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::Primitive(op) => write!(f, "Primitive({})", op.scheme_id),
            Value::Closure(closure) => write!(f, "{closure:?}"),
            Value::Unspecified => write!(f, "Unspecified"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(|x| x.into()).collect())
    }
}

impl TryFrom<Value> for NumberType {
    type Error = Error;

    fn try_from(value: Value) -> Result<NumberType, Error> {
        if let Value::Number(n) = value {
            Ok(n)
        } else {
            Err(Error::TypeError(format!("expected number, got {value}")))
        }
    }
}

///   Helper function for creating symbols - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating empty lists (nil) - follows Lisp/Scheme conventions
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::List(vec![])
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Value::Primitive(op) => write!(f, "#<primitive:{}>", op.scheme_id),
            Value::Closure(_) => write!(f, "#<procedure>"),
            Value::Unspecified => write!(f, "#<unspecified>"),
        }
    }
}

impl Value {
    /// Check if a value represents nil (empty list)
    pub(crate) fn is_nil(&self) -> bool {
        matches!(self, Value::List(list) if list.is_empty())
    }

    /// Every value except `#f` counts as true in a conditional
    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub(crate) fn is_procedure(&self) -> bool {
        matches!(self, Value::Primitive(_) | Value::Closure(_))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Primitive(a), Value::Primitive(b)) => a.scheme_id == b.scheme_id,
            (Value::Closure(a), Value::Closure(b)) => a == b,
            (Value::Unspecified, _) | (_, Value::Unspecified) => false,
            _ => false,
        }
    }
}

//! Built-in primitive operations.
//!
//! Primitives are applied by the evaluator to already-evaluated arguments; they never
//! see the store or the environment. Names in this registry always denote the
//! primitive (the syntax layer turns them into primitive references and refuses to
//! rebind them).
//!
//! ```scheme
//! (+ 1 2 3)            ; arithmetic
//! (cons 1 '(2 3))      ; list construction
//! (eq? 'a 'a)          ; identity
//! ```
//!
//! ## Error Handling
//!
//! - **Type Safety**: Operations reject incorrect types (e.g., `(+ 1 "a")` errors)
//! - **Overflow Detection**: Arithmetic operations detect and report overflow
//! - **Arity Checking**: Argument counts are validated before the operation runs
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** following the signature `fn(args: &[Value]) -> Result<Value, Error>`
//! 2. **Add to BUILTIN_OPS** with its Scheme identifier and arity
//! 3. **Add tests** covering edge cases and error conditions

use crate::Error;
use crate::ast::{NumberType, Value};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Canonical builtin function signature
pub(crate) type BuiltinFn = fn(&[Value]) -> Result<Value, Error>;

/// Number of arguments an operation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub fn validate(&self, arg_count: usize) -> Result<(), Error> {
        match *self {
            Arity::Exact(expected) if arg_count != expected => {
                Err(Error::arity_error(expected, arg_count))
            }
            Arity::AtLeast(min) if arg_count < min => Err(Error::arity_error(min, arg_count)),
            _ => Ok(()),
        }
    }
}

/// Definition of a built-in operation
pub struct BuiltinOp {
    /// The Scheme identifier for this operation
    pub scheme_id: &'static str,
    func: BuiltinFn,
    /// Expected number of arguments
    pub arity: Arity,
}

impl std::fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BuiltinOp({}, {:?})", self.scheme_id, self.arity)
    }
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        // scheme_id uniquely identifies an operation
        self.scheme_id == other.scheme_id
    }
}

impl BuiltinOp {
    /// Validate arity and run the operation
    pub fn apply(&self, args: &[Value]) -> Result<Value, Error> {
        self.arity.validate(args.len())?;
        (self.func)(args)
    }
}

/// Apply a primitive to evaluated arguments
pub fn apply_primitive(op: &BuiltinOp, args: &[Value]) -> Result<Value, Error> {
    tracing::trace!(op = op.scheme_id, argc = args.len(), "apply primitive");
    op.apply(args)
}

//
// Argument helpers
//

fn numbers(op: &str, args: &[Value]) -> Result<Vec<NumberType>, Error> {
    args.iter()
        .map(|arg| {
            NumberType::try_from(arg.clone())
                .map_err(|_| Error::TypeError(format!("{op} requires numbers, got {arg}")))
        })
        .collect()
}

fn list_arg<'a>(op: &str, arg: &'a Value) -> Result<&'a [Value], Error> {
    match arg {
        Value::List(elements) => Ok(elements),
        other => Err(Error::TypeError(format!("{op} requires a list, got {other}"))),
    }
}

fn string_arg<'a>(op: &str, arg: &'a Value) -> Result<&'a str, Error> {
    match arg {
        Value::String(s) => Ok(s),
        other => Err(Error::TypeError(format!(
            "{op} requires strings, got {other}"
        ))),
    }
}

//
// Builtin Function Implementations
//

fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    let mut sum: NumberType = 0;
    for n in numbers("+", args)? {
        sum = sum
            .checked_add(n)
            .ok_or_else(|| Error::EvalError("Integer overflow in addition".into()))?;
    }
    Ok(Value::Number(sum))
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    let nums = numbers("-", args)?;
    let (first, rest) = match nums.split_first() {
        Some(split) => split,
        None => return Err(Error::arity_error(1, 0)),
    };

    if rest.is_empty() {
        return first
            .checked_neg()
            .map(Value::Number)
            .ok_or_else(|| Error::EvalError("Integer overflow in negation".into()));
    }

    let mut result = *first;
    for n in rest {
        result = result
            .checked_sub(*n)
            .ok_or_else(|| Error::EvalError("Integer overflow in subtraction".into()))?;
    }
    Ok(Value::Number(result))
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    let mut product: NumberType = 1;
    for n in numbers("*", args)? {
        product = product
            .checked_mul(n)
            .ok_or_else(|| Error::EvalError("Integer overflow in multiplication".into()))?;
    }
    Ok(Value::Number(product))
}

/// Integer division, truncating toward zero
fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    let nums = numbers("/", args)?;
    let (first, rest) = match nums.split_first() {
        Some(split) => split,
        None => return Err(Error::arity_error(2, 0)),
    };

    let mut result = *first;
    for n in rest {
        if *n == 0 {
            return Err(Error::EvalError("Division by zero".into()));
        }
        result = result
            .checked_div(*n)
            .ok_or_else(|| Error::EvalError("Integer overflow in division".into()))?;
    }
    Ok(Value::Number(result))
}

// Macro to generate chained numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            let nums = numbers($op_str, args)?;
            Ok(Value::Bool(nums.windows(2).all(|pair| pair[0] $op pair[1])))
        }
    };
}

numeric_comparison!(builtin_eq, ==, "=");
numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_gt, >, ">");
numeric_comparison!(builtin_le, <=, "<=");
numeric_comparison!(builtin_ge, >=, ">=");

fn builtin_not(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(args, [Value::Bool(false)])))
}

/// Last argument if every argument is true, otherwise #f
fn builtin_and(args: &[Value]) -> Result<Value, Error> {
    match args.iter().find(|arg| !arg.is_true()) {
        Some(falsy) => Ok(falsy.clone()),
        None => Ok(args.last().cloned().unwrap_or(Value::Bool(true))),
    }
}

/// First true argument, otherwise #f
fn builtin_or(args: &[Value]) -> Result<Value, Error> {
    Ok(args
        .iter()
        .find(|arg| arg.is_true())
        .cloned()
        .unwrap_or(Value::Bool(false)))
}

/// Identity on procedures, value comparison on atoms and the empty list
fn builtin_eq_p(args: &[Value]) -> Result<Value, Error> {
    let result = match args {
        [Value::List(a), Value::List(b)] => a.is_empty() && b.is_empty(),
        [a, b] => a == b,
        _ => return Err(Error::arity_error(2, args.len())),
    };
    Ok(Value::Bool(result))
}

/// Structural equality
fn builtin_equal(args: &[Value]) -> Result<Value, Error> {
    match args {
        [a, b] => Ok(Value::Bool(a == b)),
        _ => Err(Error::arity_error(2, args.len())),
    }
}

fn builtin_string_eq(args: &[Value]) -> Result<Value, Error> {
    let strings = args
        .iter()
        .map(|arg| string_arg("string=?", arg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Bool(strings.windows(2).all(|pair| pair[0] == pair[1])))
}

fn builtin_string_append(args: &[Value]) -> Result<Value, Error> {
    let mut result = String::new();
    for arg in args {
        result.push_str(string_arg("string-append", arg)?);
    }
    Ok(Value::String(result))
}

fn builtin_car(args: &[Value]) -> Result<Value, Error> {
    match list_arg("car", &args[0])?.first() {
        Some(first) => Ok(first.clone()),
        None => Err(Error::EvalError("car of empty list".into())),
    }
}

fn builtin_cdr(args: &[Value]) -> Result<Value, Error> {
    match list_arg("cdr", &args[0])?.split_first() {
        Some((_, rest)) => Ok(Value::List(rest.to_vec())),
        None => Err(Error::EvalError("cdr of empty list".into())),
    }
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    match args {
        [first, Value::List(tail)] => {
            let mut new_list = Vec::with_capacity(tail.len() + 1);
            new_list.push(first.clone());
            new_list.extend_from_slice(tail);
            Ok(Value::List(new_list))
        }
        // Only proper lists are representable, so the tail must be a list
        [_, other] => Err(Error::TypeError(format!(
            "cons requires a list as second argument, got {other}"
        ))),
        _ => Err(Error::arity_error(2, args.len())),
    }
}

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::List(args.to_vec()))
}

macro_rules! predicate {
    ($name:ident, $pattern:pat) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            Ok(Value::Bool(matches!(args, [$pattern])))
        }
    };
}

predicate!(builtin_number_p, Value::Number(_));
predicate!(builtin_boolean_p, Value::Bool(_));
predicate!(builtin_string_p, Value::String(_));
predicate!(builtin_symbol_p, Value::Symbol(_));
predicate!(builtin_list_p, Value::List(_));

fn builtin_null(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0].is_nil()))
}

fn builtin_pair_p(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(&args[0], Value::List(l) if !l.is_empty())))
}

fn builtin_procedure_p(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0].is_procedure()))
}

fn builtin_error(args: &[Value]) -> Result<Value, Error> {
    let parts: Vec<String> = args
        .iter()
        .map(|value| match value {
            Value::String(s) => s.clone(),
            _ => format!("{value}"),
        })
        .collect();

    let message = if parts.is_empty() {
        "Error".to_string()
    } else {
        parts.join(" ")
    };

    Err(Error::EvalError(message))
}

/// Global registry of all built-in operations.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn op(scheme_id: &'static str, arity: Arity, func: BuiltinFn) -> BuiltinOp {
        BuiltinOp {
            scheme_id,
            func,
            arity,
        }
    }

    vec![
        // Arithmetic operations
        op("+", Arity::Any, builtin_add),
        op("-", Arity::AtLeast(1), builtin_sub),
        op("*", Arity::Any, builtin_mul),
        op("/", Arity::AtLeast(2), builtin_div),
        // Comparison operations
        op("=", Arity::AtLeast(2), builtin_eq),
        op("<", Arity::AtLeast(2), builtin_lt),
        op(">", Arity::AtLeast(2), builtin_gt),
        op("<=", Arity::AtLeast(2), builtin_le),
        op(">=", Arity::AtLeast(2), builtin_ge),
        // Logical operations (arguments are already evaluated, so no short-circuit)
        op("not", Arity::Exact(1), builtin_not),
        op("and", Arity::Any, builtin_and),
        op("or", Arity::Any, builtin_or),
        // Equality
        op("eq?", Arity::Exact(2), builtin_eq_p),
        op("equal?", Arity::Exact(2), builtin_equal),
        op("string=?", Arity::AtLeast(2), builtin_string_eq),
        // List operations
        op("cons", Arity::Exact(2), builtin_cons),
        op("car", Arity::Exact(1), builtin_car),
        op("cdr", Arity::Exact(1), builtin_cdr),
        op("list", Arity::Any, builtin_list),
        // Type predicates
        op("null?", Arity::Exact(1), builtin_null),
        op("pair?", Arity::Exact(1), builtin_pair_p),
        op("list?", Arity::Exact(1), builtin_list_p),
        op("number?", Arity::Exact(1), builtin_number_p),
        op("boolean?", Arity::Exact(1), builtin_boolean_p),
        op("string?", Arity::Exact(1), builtin_string_p),
        op("symbol?", Arity::Exact(1), builtin_symbol_p),
        op("procedure?", Arity::Exact(1), builtin_procedure_p),
        // String operations
        op("string-append", Arity::Any, builtin_string_append),
        // Error handling
        op("error", Arity::Any, builtin_error),
    ]
});

/// Lazy static map from scheme_id to BuiltinOp (private - use find_scheme_op)
static BUILTIN_SCHEME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.scheme_id, op)).collect()
});

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by its Scheme identifier
pub fn find_scheme_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_SCHEME.get(id).copied()
}

//! Evaluation over an explicit store.
//!
//! A [`Session`] owns the [`Store`] and the [`GlobalEnv`]. Environments map names
//! to addresses, so every variable access goes through the store: `set!` writes
//! the cell a name resolves to, and every closure that resolves the same name to
//! the same cell sees the change.

mod environment;
mod store;

pub use environment::{Env, GlobalEnv};
pub use store::{Address, Store};

use crate::ast::{Closure, Value};
use crate::builtinops::apply_primitive;
use crate::syntax::{CExp, Exp, Program};
use crate::{Error, MAX_EVAL_DEPTH};
use std::rc::Rc;

#[cfg(feature = "scheme")]
use crate::scheme::{ParseConfig, parse_scheme_program};

/// Evaluator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Nested evaluations allowed before failing with a depth error
    pub max_eval_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_eval_depth: MAX_EVAL_DEPTH,
        }
    }
}

/// One interpreter instance: a store, a global environment and its settings.
///
/// Sessions share nothing. Definitions and cells live as long as the session.
#[derive(Debug, Default)]
pub struct Session {
    store: Store,
    global_env: GlobalEnv,
    config: SessionConfig,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Session {
            config,
            ..Session::default()
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn global_env(&self) -> &GlobalEnv {
        &self.global_env
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Evaluate a top-level program against the global environment
    #[tracing::instrument(level = "debug", skip_all, fields(forms = program.exps.len()))]
    pub fn eval_program(&mut self, program: &Program) -> Result<Value, Error> {
        self.eval_sequence_at(&program.exps, &Env::Global, 0)
    }

    /// Read, convert and evaluate source text as a program
    #[cfg(feature = "scheme")]
    pub fn eval_parse(&mut self, input: &str) -> Result<Value, Error> {
        self.eval_parse_with_config(input, ParseConfig::default())
    }

    #[cfg(feature = "scheme")]
    pub fn eval_parse_with_config(
        &mut self,
        input: &str,
        config: ParseConfig,
    ) -> Result<Value, Error> {
        let data = parse_scheme_program(input, config)?;
        let program = crate::syntax::parse_program(&data)?;
        self.eval_program(&program)
    }

    /// Evaluate a body or program sequence in `env`.
    ///
    /// The value of the last form is the result; a trailing `define` or `set!`
    /// yields [`Value::Unspecified`]. After a `define`, the rest of the sequence
    /// is evaluated in the global environment.
    pub fn eval_sequence(&mut self, exps: &[Exp], env: &Env) -> Result<Value, Error> {
        self.eval_sequence_at(exps, env, 0)
    }

    /// Evaluate a single compound expression in `env`
    pub fn eval(&mut self, exp: &CExp, env: &Env) -> Result<Value, Error> {
        self.eval_with_depth_tracking(exp, env, 0)
    }

    fn check_depth(&self, depth: usize) -> Result<(), Error> {
        if depth >= self.config.max_eval_depth {
            return Err(Error::EvalError(format!(
                "Evaluation depth limit exceeded (max: {})",
                self.config.max_eval_depth
            )));
        }
        Ok(())
    }

    fn eval_sequence_at(&mut self, exps: &[Exp], env: &Env, depth: usize) -> Result<Value, Error> {
        self.check_depth(depth)?;
        if exps.is_empty() {
            return Err(Error::EmptyProgram);
        }

        let mut env = env.clone();
        let mut result = Value::Unspecified;
        for exp in exps {
            result = match exp {
                Exp::Define { var, val } => {
                    self.eval_define(var, val, depth)?;
                    env = Env::Global;
                    Value::Unspecified
                }
                Exp::Set { var, val } => {
                    self.eval_set(var, val, &env, depth)?;
                    Value::Unspecified
                }
                Exp::Expr(cexp) => self.eval_with_depth_tracking(cexp, &env, depth + 1)?,
            };
        }
        Ok(result)
    }

    /// The value is computed before anything is allocated, so a failing
    /// definition leaves no trace in the store or the global environment.
    fn eval_define(&mut self, var: &str, val: &CExp, depth: usize) -> Result<(), Error> {
        let value = self.eval_with_depth_tracking(val, &Env::Global, depth + 1)?;
        let address = self.store.allocate(value);
        self.global_env.define(var, address);
        tracing::debug!(name = var, address, "define");
        Ok(())
    }

    fn eval_set(&mut self, var: &str, val: &CExp, env: &Env, depth: usize) -> Result<(), Error> {
        let address = env.lookup(&self.global_env, var)?;
        let value = self.eval_with_depth_tracking(val, env, depth + 1)?;
        tracing::trace!(name = var, address, %value, "set!");
        self.store.write(address, value);
        Ok(())
    }

    fn eval_with_depth_tracking(
        &mut self,
        exp: &CExp,
        env: &Env,
        depth: usize,
    ) -> Result<Value, Error> {
        self.check_depth(depth)?;
        match exp {
            CExp::Num(n) => Ok(Value::Number(*n)),
            CExp::Bool(b) => Ok(Value::Bool(*b)),
            CExp::Str(s) => Ok(Value::String(s.clone())),
            CExp::Lit(datum) => Ok(datum.clone()),
            CExp::PrimOp(op) => Ok(Value::Primitive(*op)),

            CExp::VarRef(name) => {
                let address = env.lookup(&self.global_env, name)?;
                self.store.read(address)
            }

            CExp::If { test, then, alt } => {
                if self.eval_with_depth_tracking(test, env, depth + 1)?.is_true() {
                    self.eval_with_depth_tracking(then, env, depth + 1)
                } else {
                    self.eval_with_depth_tracking(alt, env, depth + 1)
                }
            }

            CExp::Proc { params, body } => Ok(Value::Closure(Closure::new(
                Rc::clone(params),
                Rc::clone(body),
                env.clone(),
            ))),

            CExp::Let { bindings, body } => {
                // Binding values see the enclosing environment, never each other
                let values = bindings
                    .iter()
                    .map(|binding| self.eval_with_depth_tracking(&binding.val, env, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                let addresses = self.store.allocate_many(values);
                let vars = bindings.iter().map(|binding| binding.var.clone()).collect();
                let frame = Env::extend(vars, addresses.collect(), env);
                self.eval_sequence_at(body, &frame, depth + 1)
            }

            CExp::App { rator, rands } => {
                let procedure = self.eval_with_depth_tracking(rator, env, depth + 1)?;
                let args = rands
                    .iter()
                    .map(|rand| self.eval_with_depth_tracking(rand, env, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                self.apply(procedure, args, depth)
            }
        }
    }

    fn apply(&mut self, procedure: Value, args: Vec<Value>, depth: usize) -> Result<Value, Error> {
        match procedure {
            Value::Primitive(op) => apply_primitive(op, &args),
            Value::Closure(closure) => {
                if closure.params.len() != args.len() {
                    return Err(Error::arity_error(closure.params.len(), args.len()));
                }
                let addresses = self.store.allocate_many(args);
                tracing::trace!(?addresses, "apply closure");
                let frame = Env::extend(closure.params.to_vec(), addresses.collect(), &closure.env);
                self.eval_sequence_at(&closure.body, &frame, depth + 1)
            }
            other => Err(Error::BadProcedure(format!("{other}"))),
        }
    }
}

use super::store::Address;
use crate::Error;
use std::rc::Rc;

/// Top-level name table of a session
///
/// Bindings are appended in definition order and never removed. Lookup returns the
/// *first* binding for a name, so redefining a name appends an entry that stays
/// hidden behind the first one.
#[derive(Debug, Default)]
pub struct GlobalEnv {
    vars: Vec<String>,
    addresses: Vec<Address>,
}

impl GlobalEnv {
    pub fn new() -> Self {
        GlobalEnv::default()
    }

    /// Append a binding. Existing bindings for `name` are left in place.
    pub fn define(&mut self, name: &str, address: Address) {
        if self.vars.iter().any(|var| var == name) {
            tracing::debug!(name, address, "redefinition is shadowed by the first binding");
        }
        self.vars.push(name.to_owned());
        self.addresses.push(address);
    }

    pub fn lookup(&self, name: &str) -> Result<Address, Error> {
        self.vars
            .iter()
            .position(|var| var == name)
            .map(|index| self.addresses[index])
            .ok_or_else(|| Error::UnboundVariable(name.to_owned()))
    }

    /// All bindings in definition order, including shadowed redefinitions
    pub fn bindings(&self) -> impl Iterator<Item = (&str, Address)> {
        self.vars
            .iter()
            .map(String::as_str)
            .zip(self.addresses.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// One link of the environment chain, created by `let` and closure application
#[derive(Debug)]
pub struct ExtEnv {
    vars: Vec<String>,
    addresses: Vec<Address>,
    next: Env,
}

/// Environment a form is evaluated in
///
/// `Global` refers to the session's [`GlobalEnv`], which keeps growing after a
/// closure captures it; that is what lets top-level definitions refer to names
/// defined later. Frames are shared between every closure created inside them.
#[derive(Debug, Clone, Default)]
pub enum Env {
    #[default]
    Global,
    Extended(Rc<ExtEnv>),
}

impl Env {
    /// Build a new frame binding `vars[i]` to `addresses[i]` on top of `next`.
    ///
    /// # Panics
    ///
    /// Panics if `vars` and `addresses` differ in length.
    pub fn extend(vars: Vec<String>, addresses: Vec<Address>, next: &Env) -> Env {
        assert_eq!(
            vars.len(),
            addresses.len(),
            "frame names and addresses must line up"
        );
        Env::Extended(Rc::new(ExtEnv {
            vars,
            addresses,
            next: next.clone(),
        }))
    }

    /// Resolve `name` to an address, innermost frame first.
    pub fn lookup(&self, global: &GlobalEnv, name: &str) -> Result<Address, Error> {
        let mut env = self;
        loop {
            match env {
                Env::Global => return global.lookup(name),
                Env::Extended(frame) => {
                    if let Some(index) = frame.vars.iter().position(|var| var == name) {
                        return Ok(frame.addresses[index]);
                    }
                    env = &frame.next;
                }
            }
        }
    }
}

/// Frames compare by identity
impl PartialEq for Env {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Env::Global, Env::Global) => true,
            (Env::Extended(a), Env::Extended(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

//! Fluent declaration front end
//!
//! The Rust rendition of the `Class 'Name' : from {...} { ... }` syntax:
//! an ordered [`ClassBody`] builder plus a [`ClassDecl`] handle produced by
//! [`Registry::declare`]. Both only assemble arguments; all validation
//! happens in [`Registry::define`].

use crate::error::{Error, UsageError};
use crate::modifiers::RawKey;
use crate::registry::Registry;
use crate::value::{Function, Value};

/// An ordered class body: annotated field keys mapped to default values.
#[derive(Default)]
pub struct ClassBody {
    entries: Vec<(RawKey, Value)>,
}

impl ClassBody {
    /// Empty body.
    pub fn new() -> Self {
        ClassBody::default()
    }

    /// Add a string-keyed field. The key may carry a modifier prefix, e.g.
    /// `"private_const__count"`.
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.entries.push((RawKey::from(key), value.into()));
        self
    }

    /// Add a numeric-keyed (array-like) field.
    pub fn index(mut self, index: i64, value: impl Into<Value>) -> Self {
        self.entries.push((RawKey::Index(index), value.into()));
        self
    }

    /// Add a function-valued field. Unless the key carries `nonmethod`, it
    /// becomes a method of the class being defined.
    pub fn method(
        mut self,
        key: &str,
        f: impl Fn(&[Value]) -> Result<Value, Error> + 'static,
    ) -> Self {
        self.entries
            .push((RawKey::from(key), Value::Function(Function::new(f))));
        self
    }

    /// Declare the constructor as inheriting: it calls every direct
    /// parent's constructor in reverse declared order, forwarding all
    /// arguments. `class_name` must be the name of the class being defined.
    pub fn inherit_constructor(self, class_name: &str) -> Self {
        self.set(class_name, "inherit")
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&RawKey, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

/// An in-flight class declaration.
#[must_use = "a declaration does nothing until `body` or `define` is called"]
pub struct ClassDecl<'r> {
    registry: &'r Registry,
    name: String,
    parents: Vec<String>,
}

impl<'r> ClassDecl<'r> {
    pub(crate) fn new(registry: &'r Registry, name: &str) -> Self {
        ClassDecl {
            registry,
            name: name.to_string(),
            parents: Vec::new(),
        }
    }

    /// Set the direct parents, in priority order (first wins on conflicting
    /// concrete defaults).
    pub fn from<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents = parents.into_iter().map(Into::into).collect();
        self
    }

    /// Register the class with the given body.
    pub fn body(self, body: ClassBody) -> Result<(), Error> {
        let parents: Vec<&str> = self.parents.iter().map(String::as_str).collect();
        self.registry.define(&self.name, &parents, body)
    }

    /// Register the class with an empty body.
    pub fn define(self) -> Result<(), Error> {
        self.body(ClassBody::new())
    }
}

/// Call a value that is expected to be callable, reporting a usage error
/// otherwise. Convenience for hosts holding plain `Value`s.
pub fn call_value(value: &Value, args: &[Value]) -> Result<Value, Error> {
    match value {
        Value::Function(_) | Value::Super(_) => value.call(args),
        _ => Err(UsageError::NotCallable.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DefineError;

    #[test]
    fn fluent_declaration_registers() {
        let reg = Registry::new();
        reg.declare("Animal")
            .body(ClassBody::new().set("name", "unnamed"))
            .unwrap();
        reg.declare("Cat").from(["Animal"]).define().unwrap();
        assert!(reg.is_defined("Cat"));
        assert!(reg.is_subtype("Cat", "Animal"));
    }

    #[test]
    fn body_preserves_declaration_order() {
        // Duplicate detection depends on seeing entries in declared order;
        // the first occurrence is the one reported as duplicated.
        let reg = Registry::new();
        let err = reg
            .declare("A")
            .body(ClassBody::new().set("x", 1.0).set("x", 2.0))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Define(DefineError::DuplicateField(name)) if name == "x"
        ));
    }
}

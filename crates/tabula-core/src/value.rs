//! Dynamic value model
//!
//! Everything a field can hold is a [`Value`]. Tables are shared mutable
//! cells (`Rc<RefCell<Table>>`); whether a table default is deep-copied or
//! shared per instance is decided by the field's `reference` modifier, not by
//! the value itself. The two absence sentinels (`HardNil`/`SoftNil`) are
//! first-class values so they can sit anywhere a default goes; they resolve
//! to [`Value::Nil`] when an instance is materialized.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{Error, UsageError};
use crate::instance::{Instance, ScopeGuard};
use crate::schema::Super;

/// Key of a table slot: integer or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    /// Array-like integer key.
    Int(i64),
    /// String key.
    Str(Rc<str>),
}

impl From<i64> for TableKey {
    fn from(index: i64) -> Self {
        TableKey::Int(index)
    }
}

impl From<&str> for TableKey {
    fn from(name: &str) -> Self {
        TableKey::Str(Rc::from(name))
    }
}

/// An untyped associative table.
#[derive(Debug, Default)]
pub struct Table {
    entries: FxHashMap<TableKey, Value>,
}

/// Shared handle to a [`Table`].
pub type TableRef = Rc<RefCell<Table>>;

impl Table {
    /// Create an empty table.
    pub fn new() -> Self {
        Table {
            entries: FxHashMap::default(),
        }
    }

    /// Wrap this table in a shared handle.
    pub fn into_ref(self) -> TableRef {
        Rc::new(RefCell::new(self))
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read a slot, `Nil` when absent.
    pub fn get(&self, key: impl Into<TableKey>) -> Value {
        self.entries
            .get(&key.into())
            .cloned()
            .unwrap_or(Value::Nil)
    }

    /// Write a slot.
    pub fn set(&mut self, key: impl Into<TableKey>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Iterate over all slots.
    pub fn iter(&self) -> impl Iterator<Item = (&TableKey, &Value)> {
        self.entries.iter()
    }
}

/// Signature shared by methods, constructors, factories and plain functions.
pub type RawFn = dyn Fn(&[Value]) -> Result<Value, Error>;

/// A callable value.
///
/// A function declared as a method in a class body carries the name of its
/// declaring class; invoking it raises the receiver's effective scope to
/// `private-of-<declaring-class>` for the duration of the call. The receiver
/// is always `args[0]`.
#[derive(Clone)]
pub struct Function {
    f: Rc<RawFn>,
    declared_in: Option<Rc<str>>,
}

impl Function {
    /// Create a plain (non-method) function value.
    pub fn new(f: impl Fn(&[Value]) -> Result<Value, Error> + 'static) -> Self {
        Function {
            f: Rc::new(f),
            declared_in: None,
        }
    }

    /// Tag this function as a method of `class`.
    pub(crate) fn into_method(self, class: Rc<str>) -> Self {
        Function {
            f: self.f,
            declared_in: Some(class),
        }
    }

    /// True when this function was declared as a method.
    pub fn is_method(&self) -> bool {
        self.declared_in.is_some()
    }

    /// Name of the declaring class, for methods.
    pub fn declaring_class(&self) -> Option<&str> {
        self.declared_in.as_deref()
    }

    /// Invoke the function.
    ///
    /// For a method, `args[0]` must be the receiver instance; the receiver's
    /// previous scope is restored on every exit path, including errors.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, Error> {
        let _guard = match &self.declared_in {
            Some(class) => match args.first() {
                Some(Value::Instance(receiver)) => {
                    Some(ScopeGuard::enter(receiver, class.clone()))
                }
                _ => return Err(UsageError::MissingReceiver.into()),
            },
            None => None,
        };
        (self.f)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.declared_in {
            Some(class) => write!(f, "<method of {class}>"),
            None => write!(f, "<function>"),
        }
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absence.
    Nil,
    /// Default-value sentinel: always yields absence and always wins the
    /// inheritance merge.
    HardNil,
    /// Default-value sentinel: yields absence only when no higher-priority
    /// source supplies a concrete value.
    SoftNil,
    /// Boolean.
    Bool(bool),
    /// Double-precision number.
    Number(f64),
    /// Immutable string.
    Str(Rc<str>),
    /// Shared mutable table.
    Table(TableRef),
    /// Callable function or method.
    Function(Function),
    /// Class instance.
    Instance(Instance),
    /// Super record wired onto child instances, one per direct parent.
    Super(Rc<Super>),
}

impl Value {
    /// Build a string value.
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    /// Build a function value.
    pub fn function(f: impl Fn(&[Value]) -> Result<Value, Error> + 'static) -> Value {
        Value::Function(Function::new(f))
    }

    /// True for [`Value::Nil`].
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Numeric payload, if any.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Table handle, if any.
    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Instance payload, if any.
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Instance(i) => Some(i),
            _ => None,
        }
    }

    /// Function payload, if any.
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Call this value: functions are invoked, super records run the
    /// parent's constructor. Anything else is a usage error.
    pub fn call(&self, args: &[Value]) -> Result<Value, Error> {
        match self {
            Value::Function(f) => f.invoke(args),
            Value::Super(s) => s.construct(args),
            _ => Err(UsageError::NotCallable.into()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::HardNil, Value::HardNil) => true,
            (Value::SoftNil, Value::SoftNil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(&a.f, &b.f),
            (Value::Instance(a), Value::Instance(b)) => a.ptr_eq(b),
            (Value::Super(a), Value::Super(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s.as_str()))
    }
}

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Value::Table(t.into_ref())
    }
}

impl From<TableRef> for Value {
    fn from(t: TableRef) -> Self {
        Value::Table(t)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Instance> for Value {
    fn from(i: Instance) -> Self {
        Value::Instance(i)
    }
}

/// Deep-copy a value.
///
/// Tables are cloned recursively with an identity map over the source
/// handles, so self-referential structures copy without recursing forever
/// and aliasing inside the source is preserved in the copy. Every other
/// value kind (including instances and functions) is shared as-is.
pub fn deep_copy(value: &Value) -> Value {
    let mut seen: FxHashMap<usize, TableRef> = FxHashMap::default();
    copy_value(value, &mut seen)
}

fn copy_value(value: &Value, seen: &mut FxHashMap<usize, TableRef>) -> Value {
    match value {
        Value::Table(source) => {
            let identity = Rc::as_ptr(source) as usize;
            if let Some(existing) = seen.get(&identity) {
                return Value::Table(existing.clone());
            }
            let copy = Table::new().into_ref();
            seen.insert(identity, copy.clone());
            for (key, slot) in source.borrow().iter() {
                let copied = copy_value(slot, seen);
                copy.borrow_mut().set(key.clone(), copied);
            }
            Value::Table(copy)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_get_set() {
        let mut t = Table::new();
        t.set("x", 1.0);
        t.set(2, "two");
        assert_eq!(t.get("x"), Value::Number(1.0));
        assert_eq!(t.get(2), Value::str("two"));
        assert_eq!(t.get("missing"), Value::Nil);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn deep_copy_detaches_tables() {
        let mut inner = Table::new();
        inner.set("n", 1.0);
        let mut outer = Table::new();
        outer.set("inner", inner);
        let original = Value::from(outer);

        let copy = deep_copy(&original);
        let copy_inner = copy.as_table().unwrap().borrow().get("inner");
        copy_inner.as_table().unwrap().borrow_mut().set("n", 2.0);

        let original_inner = original.as_table().unwrap().borrow().get("inner");
        let n = original_inner.as_table().unwrap().borrow().get("n");
        assert_eq!(n, Value::Number(1.0));
    }

    #[test]
    fn deep_copy_handles_cycles() {
        let t = Table::new().into_ref();
        t.borrow_mut().set("me", t.clone());
        let copy = deep_copy(&Value::Table(t.clone()));

        let copy_table = copy.as_table().unwrap();
        let inner = copy_table.borrow().get("me");
        // The copy must be self-referential and detached from the source.
        assert!(Rc::ptr_eq(copy_table, inner.as_table().unwrap()));
        assert!(!Rc::ptr_eq(copy_table, &t));
    }

    #[test]
    fn deep_copy_preserves_internal_aliasing() {
        let shared = Table::new().into_ref();
        let mut outer = Table::new();
        outer.set("a", shared.clone());
        outer.set("b", shared);
        let copy = deep_copy(&Value::from(outer));

        let copy_table = copy.as_table().unwrap().borrow();
        let a = copy_table.get("a");
        let b = copy_table.get("b");
        assert!(Rc::ptr_eq(a.as_table().unwrap(), b.as_table().unwrap()));
    }

    #[test]
    fn plain_function_invokes_without_receiver() {
        let f = Function::new(|args| Ok(args.first().cloned().unwrap_or(Value::Nil)));
        assert!(!f.is_method());
        assert_eq!(f.invoke(&[Value::Number(7.0)]).unwrap(), Value::Number(7.0));
    }

    #[test]
    fn non_callable_value_errors() {
        let err = Value::Number(1.0).call(&[]).unwrap_err();
        assert_eq!(err.to_string(), "value is not callable");
    }

    #[test]
    fn sentinel_equality_is_per_kind() {
        assert_eq!(Value::HardNil, Value::HardNil);
        assert_ne!(Value::HardNil, Value::SoftNil);
        assert_ne!(Value::HardNil, Value::Nil);
    }
}

//! Instances and the access-control intercept
//!
//! An [`Instance`] owns its field storage and a transient scope marker.
//! Every read and write funnels through the gate in [`Instance::get`] and
//! [`Instance::set`], which checks the field's declared visibility against
//! the instance's current effective scope. The scope is raised to
//! `private-of-<class>` while a method declared in `<class>` runs, and
//! restored by a drop guard on every exit path.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{AccessError, Error, UsageError};
use crate::modifiers::FieldKey;
use crate::registry::{AccessMode, Config, UndefinedPolicy};
use crate::schema::{ClassDef, FieldDef, Visibility};
use crate::value::Value;

/// The effective visibility scope of an instance at a point in time.
///
/// `Public` outside any method; `Private(class)` while a method declared in
/// `class` is on the call stack for this instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// No method of this instance is in flight.
    Public,
    /// A method declared in the named class is in flight.
    Private(Rc<str>),
}

impl Scope {
    fn label(&self) -> &'static str {
        match self {
            Scope::Public => "public",
            Scope::Private(_) => "private",
        }
    }
}

struct InstanceInner {
    class: Rc<ClassDef>,
    config: Config,
    storage: RefCell<FxHashMap<FieldKey, Value>>,
    scope: RefCell<Scope>,
}

/// A live object: shared definition, exclusively owned storage and scope.
#[derive(Clone)]
pub struct Instance(Rc<InstanceInner>);

impl Instance {
    pub(crate) fn new(class: Rc<ClassDef>, config: Config) -> Self {
        Instance(Rc::new(InstanceInner {
            class,
            config,
            storage: RefCell::new(FxHashMap::default()),
            scope: RefCell::new(Scope::Public),
        }))
    }

    /// Name of this instance's class.
    pub fn class_name(&self) -> &str {
        self.0.class.name()
    }

    /// This instance's class definition.
    pub fn class(&self) -> &Rc<ClassDef> {
        &self.0.class
    }

    /// True when this instance's class is `ancestor` or inherits from it.
    pub fn is_a(&self, ancestor: &str) -> bool {
        self.class_name() == ancestor || self.0.class.composed_of(ancestor)
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Current effective scope.
    pub fn scope(&self) -> Scope {
        self.0.scope.borrow().clone()
    }

    /// Read a field through the access gate.
    ///
    /// Numeric keys always succeed. Undefined string keys follow the
    /// registry's configured policy. In optimized mode the gate is bypassed
    /// entirely.
    pub fn get(&self, key: impl Into<FieldKey>) -> Result<Value, Error> {
        let key = key.into();
        if matches!(key, FieldKey::Index(_)) || self.0.config.access == AccessMode::Optimized {
            return Ok(self.raw_get(&key));
        }
        match self.0.class.field(&key) {
            Some(def) => {
                self.check_visibility(def)?;
                Ok(self.raw_get(&key))
            }
            None => match self.0.config.undefined {
                UndefinedPolicy::Strict => {
                    Err(AccessError::Undefined(key.to_string()).into())
                }
                UndefinedPolicy::PermissiveRead => Ok(Value::Nil),
                UndefinedPolicy::Relaxed => Ok(self.raw_get(&key)),
            },
        }
    }

    /// Write a field through the access gate.
    ///
    /// Beyond the visibility check, writes reject constant fields; a
    /// method-valued field reports its own distinct error.
    pub fn set(&self, key: impl Into<FieldKey>, value: impl Into<Value>) -> Result<(), Error> {
        let key = key.into();
        let value = value.into();
        if matches!(key, FieldKey::Index(_)) || self.0.config.access == AccessMode::Optimized {
            self.raw_set(key, value);
            return Ok(());
        }
        match self.0.class.field(&key) {
            Some(def) => {
                self.check_visibility(def)?;
                if def.constant {
                    let err = if def.is_method {
                        AccessError::MethodWrite(key.to_string())
                    } else {
                        AccessError::ConstantWrite(key.to_string())
                    };
                    return Err(err.into());
                }
                self.raw_set(key, value);
                Ok(())
            }
            None => match self.0.config.undefined {
                UndefinedPolicy::Relaxed => {
                    // Implicitly defines the field on this instance only.
                    self.raw_set(key, value);
                    Ok(())
                }
                _ => Err(AccessError::Undefined(key.to_string()).into()),
            },
        }
    }

    /// Invoke the named field as a method, prepending this instance as the
    /// receiver. The lookup itself goes through the access gate, so a
    /// protected or private method stays unreachable from outside.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, Error> {
        let callee = self.get(name)?;
        if !matches!(callee, Value::Function(_) | Value::Super(_)) {
            return Err(UsageError::NotCallable.into());
        }
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(Value::Instance(self.clone()));
        full.extend_from_slice(args);
        callee.call(&full)
    }

    /// Dispatch a native operator hook declared with the `operator`
    /// modifier, e.g. `apply_operator("add", ...)` calls `__add`.
    pub fn apply_operator(&self, op: &str, args: &[Value]) -> Result<Value, Error> {
        self.call(&format!("__{op}"), args)
    }

    fn check_visibility(&self, def: &FieldDef) -> Result<(), Error> {
        let scope = self.0.scope.borrow();
        let permitted = match &def.visibility {
            Visibility::Public => true,
            Visibility::Protected => *scope != Scope::Public,
            Visibility::Private(owner) => {
                matches!(&*scope, Scope::Private(current) if current == owner)
            }
        };
        if permitted {
            Ok(())
        } else {
            Err(AccessError::ScopeViolation {
                field: def.name.to_string(),
                required: def.visibility.label(),
                actual: scope.label(),
            }
            .into())
        }
    }

    pub(crate) fn raw_get(&self, key: &FieldKey) -> Value {
        self.0
            .storage
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    pub(crate) fn raw_set(&self, key: FieldKey, value: Value) {
        self.0.storage.borrow_mut().insert(key, value);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class_name())
            .field("scope", &*self.0.scope.borrow())
            .finish_non_exhaustive()
    }
}

/// Restores the previous scope of an instance when dropped.
///
/// Installed around every method invocation; dropping on error exits keeps
/// the push/pop discipline strict even when a method fails partway through.
pub(crate) struct ScopeGuard {
    instance: Instance,
    previous: Scope,
}

impl ScopeGuard {
    pub(crate) fn enter(instance: &Instance, class: Rc<str>) -> Self {
        let previous = instance.0.scope.replace(Scope::Private(class));
        ScopeGuard {
            instance: instance.clone(),
            previous,
        }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        *self.instance.0.scope.borrow_mut() = self.previous.clone();
    }
}

/// Extract the receiver from a method's argument slice.
///
/// Methods receive the instance as `args[0]`; this is the ergonomic accessor
/// for method bodies written as closures.
pub fn receiver(args: &[Value]) -> Result<&Instance, Error> {
    match args.first() {
        Some(Value::Instance(instance)) => Ok(instance),
        _ => Err(UsageError::MissingReceiver.into()),
    }
}

/// Positional argument accessor for method bodies; `Nil` when absent.
/// Index 0 is the receiver, so the first real argument is `arg(args, 1)`.
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Nil)
}

//! Class schemas
//!
//! A [`ClassDef`] is the merged, registered shape of one class: its field
//! definitions, its direct parents in declared priority order, and the
//! transitive composition set used for subtype checks. Definitions are
//! created exactly once by the registry and immutable from then on; many
//! instances share one definition through `Rc`.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, UsageError};
use crate::modifiers::FieldKey;
use crate::value::{Function, Value};

/// Visibility of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Accessible from any scope.
    Public,
    /// Accessible from any method scope (not just the declaring class's).
    Protected,
    /// Accessible only while the owning class's method scope is active.
    Private(Rc<str>),
}

impl Visibility {
    /// Label used in diagnostics. Private never exposes its owner.
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private(_) => "private",
        }
    }
}

/// One field of a class's merged schema.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field key, unique within the merged schema.
    pub name: FieldKey,
    /// Declared visibility.
    pub visibility: Visibility,
    /// Default value; may be one of the absence sentinels.
    pub default: Value,
    /// Rejects writes after construction.
    pub constant: bool,
    /// Default is shared across instances instead of deep-copied.
    pub shared_reference: bool,
    /// Default is a class name or zero-arg factory, resolved per instance.
    pub lazy_instance: bool,
    /// Default is a method (function not marked `nonmethod`).
    pub is_method: bool,
}

/// The merged, registered definition of one class.
#[derive(Debug)]
pub struct ClassDef {
    pub(crate) name: Rc<str>,
    pub(crate) fields: FxHashMap<FieldKey, FieldDef>,
    pub(crate) composition: FxHashSet<Rc<str>>,
    pub(crate) parents: Vec<Rc<str>>,
}

impl ClassDef {
    /// Class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up one field definition.
    pub fn field(&self, key: &FieldKey) -> Option<&FieldDef> {
        self.fields.get(key)
    }

    /// Iterate over all field definitions of the merged schema.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values()
    }

    /// Direct parents in declared (priority) order.
    pub fn parents(&self) -> &[Rc<str>] {
        &self.parents
    }

    /// True when `ancestor` appears anywhere in the inheritance composition.
    pub fn composed_of(&self, ancestor: &str) -> bool {
        self.composition.contains(ancestor)
    }
}

/// Callable super record for one direct parent.
///
/// Each child instance carries one of these per direct parent, as a
/// protected, constant, shared-reference field named after the parent.
/// Calling it runs the parent's constructor with `(child, ...args)`; the
/// parent's constant methods stay reachable by name.
#[derive(Debug)]
pub struct Super {
    parent: Rc<ClassDef>,
}

impl Super {
    pub(crate) fn new(parent: Rc<ClassDef>) -> Self {
        Super { parent }
    }

    /// Name of the parent class this record refers to.
    pub fn class_name(&self) -> &str {
        &self.parent.name
    }

    /// Run the parent's constructor. `args[0]` must be the child instance.
    ///
    /// The parent's constructor is its field named like the parent itself;
    /// a parent without one cannot be super-constructed.
    pub fn construct(&self, args: &[Value]) -> Result<Value, Error> {
        let ctor_key = FieldKey::Name(self.parent.name.clone());
        match self.parent.fields.get(&ctor_key) {
            Some(def) => match &def.default {
                Value::Function(ctor) => ctor.invoke(args),
                _ => Err(UsageError::NoConstructor(self.parent.name.to_string()).into()),
            },
            None => Err(UsageError::NoConstructor(self.parent.name.to_string()).into()),
        }
    }

    /// Look up one of the parent's constant methods by name.
    pub fn method(&self, name: &str) -> Option<Function> {
        let def = self.parent.fields.get(&FieldKey::from(name))?;
        if !def.is_method || !def.constant {
            return None;
        }
        match &def.default {
            Value::Function(f) => Some(f.clone()),
            _ => None,
        }
    }
}

//! Class definition registry and instance runtime
//!
//! The [`Registry`] is an explicit, injectable object: a host creates one
//! (or several, for isolation) at startup, fixes its [`Config`], and defines
//! classes into it. Registration is additive-only; definitions are never
//! unregistered or mutated afterwards. The library is single-threaded and
//! synchronous; overlapping definitions from reentrant callers are out of
//! contract.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::declare::{ClassBody, ClassDecl};
use crate::error::{DefineError, Error, UsageError};
use crate::instance::Instance;
use crate::modifiers::{self, Access, FieldKey};
use crate::schema::{ClassDef, FieldDef, Super, Visibility};
use crate::value::{deep_copy, Function, Value};

/// How the gate treats fields that have no definition in the schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UndefinedPolicy {
    /// Reads and writes of undefined fields both fail.
    #[default]
    Strict,
    /// Undefined reads yield `Nil`; undefined writes still fail.
    PermissiveRead,
    /// Reads and writes both succeed; a write implicitly defines the field
    /// on that one instance.
    Relaxed,
}

/// Whether field accesses are checked at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessMode {
    /// Every access goes through the visibility/constancy gate.
    #[default]
    Checked,
    /// Direct storage access, no enforcement. A strict superset of the
    /// checked mode: any program that passes checked behaves identically
    /// here.
    Optimized,
}

/// Registry-wide configuration, read once at construction.
///
/// The toggles shape the generated intercepts, so they must be fixed before
/// any class is defined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    /// Undefined-field policy.
    pub undefined: UndefinedPolicy,
    /// Checked vs optimized access.
    pub access: AccessMode,
}

/// Either side of a subtype check: a class name or a live instance.
#[derive(Debug, Clone, Copy)]
pub enum TypeRef<'a> {
    /// Refer to a class by registered name.
    Name(&'a str),
    /// Refer to an instance's class.
    Instance(&'a Instance),
}

impl<'a> From<&'a str> for TypeRef<'a> {
    fn from(name: &'a str) -> Self {
        TypeRef::Name(name)
    }
}

impl<'a> From<&'a Instance> for TypeRef<'a> {
    fn from(instance: &'a Instance) -> Self {
        TypeRef::Instance(instance)
    }
}

#[derive(Clone)]
enum Entry {
    Class(Rc<ClassDef>),
    /// Non-inheritable pseudo-class wrapping a foreign constructor.
    Adapter(Function),
}

/// Process-lifetime store of class definitions plus the instantiation
/// surface.
pub struct Registry {
    entries: RefCell<FxHashMap<Rc<str>, Entry>>,
    config: Config,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry with the default configuration (strict, checked).
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Registry with an explicit configuration.
    pub fn with_config(config: Config) -> Self {
        Registry {
            entries: RefCell::new(FxHashMap::default()),
            config,
        }
    }

    /// The configuration this registry was built with.
    pub fn config(&self) -> Config {
        self.config
    }

    /// Start a fluent class declaration: `registry.declare("Name")
    /// .from(["Parent"]).body(...)`.
    pub fn declare<'r>(&'r self, name: &str) -> ClassDecl<'r> {
        ClassDecl::new(self, name)
    }

    /// True when `name` is registered (class or adapter).
    pub fn is_defined(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    /// Fetch a registered class definition.
    pub fn class_def(&self, name: &str) -> Option<Rc<ClassDef>> {
        match self.entries.borrow().get(name) {
            Some(Entry::Class(def)) => Some(def.clone()),
            _ => None,
        }
    }

    /// Register a class.
    ///
    /// Parents are merged in reverse declared order, so the first-listed
    /// parent overlays last and wins conflicting concrete defaults. The
    /// class's own body is decoded and overlaid on the merged schema. A
    /// failed definition leaves the registry without the class.
    pub fn define(&self, name: &str, parents: &[&str], body: ClassBody) -> Result<(), Error> {
        let parent_defs = self.resolve_parents(name, parents)?;
        let class_name: Rc<str> = Rc::from(name);

        let mut fields: FxHashMap<FieldKey, FieldDef> = FxHashMap::default();
        let mut composition: FxHashSet<Rc<str>> = FxHashSet::default();

        for parent in parent_defs.iter().rev() {
            composition.insert(parent.name.clone());
            composition.extend(parent.composition.iter().cloned());
            for def in parent.fields.values() {
                merge_parent_field(&mut fields, def)?;
            }
        }

        // Super records: one protected, constant, shared-reference field per
        // direct parent, named after it. Replaces the parent's inherited
        // constructor slot of the same name.
        for parent in &parent_defs {
            let key = FieldKey::Name(parent.name.clone());
            fields.insert(
                key.clone(),
                FieldDef {
                    name: key,
                    visibility: Visibility::Protected,
                    default: Value::Super(Rc::new(Super::new(parent.clone()))),
                    constant: true,
                    shared_reference: true,
                    lazy_instance: false,
                    is_method: false,
                },
            );
        }

        let mut seen = FxHashSet::default();
        for (raw, value) in body.entries() {
            let (key, mods) = modifiers::decode(raw)?;
            if !seen.insert(key.clone()) {
                return Err(DefineError::DuplicateField(key.to_string()).into());
            }
            if let FieldKey::Name(bare) = &key {
                if composition.contains(bare) {
                    return Err(DefineError::ReservedName(bare.to_string()).into());
                }
                if **bare == *class_name {
                    let def =
                        build_constructor(&class_name, value, &parent_defs)?;
                    fields.insert(key, def);
                    continue;
                }
            }
            let def = overlay_body_field(&class_name, &fields, key, value, mods)?;
            fields.insert(def.name.clone(), def);
        }

        let def = ClassDef {
            name: class_name.clone(),
            fields,
            composition,
            parents: parent_defs.iter().map(|p| p.name.clone()).collect(),
        };
        self.entries
            .borrow_mut()
            .insert(class_name, Entry::Class(Rc::new(def)));
        Ok(())
    }

    /// Register a non-inheritable pseudo-class whose instantiation just
    /// invokes `factory`. Lets foreign constructors participate in the
    /// [`Registry::instantiate`] surface.
    pub fn define_adapter(
        &self,
        name: &str,
        factory: impl Fn(&[Value]) -> Result<Value, Error> + 'static,
    ) -> Result<(), Error> {
        let mut entries = self.entries.borrow_mut();
        if entries.contains_key(name) {
            return Err(DefineError::DuplicateClass(name.to_string()).into());
        }
        entries.insert(Rc::from(name), Entry::Adapter(Function::new(factory)));
        Ok(())
    }

    /// Materialize a fresh instance of `name`.
    ///
    /// Storage is populated from the schema defaults (sentinels resolve to
    /// `Nil`, tables deep-copy unless shared, `instance` fields resolve per
    /// instance), the scope starts public, and the constructor runs iff the
    /// class declares one. For adapters the factory's value is returned
    /// as-is.
    pub fn instantiate(&self, name: &str, args: &[Value]) -> Result<Value, Error> {
        let entry = self.entries.borrow().get(name).cloned();
        match entry {
            None => Err(UsageError::UnknownClass(name.to_string()).into()),
            Some(Entry::Adapter(factory)) => factory.invoke(args),
            Some(Entry::Class(class)) => {
                let instance = Instance::new(class, self.config);
                self.fill_storage(&instance)?;
                self.run_constructor(&instance, args)?;
                Ok(Value::Instance(instance))
            }
        }
    }

    /// Re-populate an instance's storage from its schema defaults, exactly
    /// as instantiation does, then re-run the constructor. Fields outside
    /// the schema (possible under the relaxed policy) are left untouched.
    pub fn reset(&self, instance: &Instance, args: &[Value]) -> Result<(), Error> {
        self.fill_storage(instance)?;
        self.run_constructor(instance, args)
    }

    /// Subtype check over the composition set. Accepts names or instances
    /// on both sides; an unregistered child name is never a subtype.
    pub fn is_subtype<'a>(
        &self,
        child: impl Into<TypeRef<'a>>,
        parent: impl Into<TypeRef<'a>>,
    ) -> bool {
        let child_def = match child.into() {
            TypeRef::Name(n) => self.class_def(n),
            TypeRef::Instance(i) => Some(i.class().clone()),
        };
        let parent_name = match parent.into() {
            TypeRef::Name(n) => n.to_string(),
            TypeRef::Instance(i) => i.class_name().to_string(),
        };
        match child_def {
            Some(def) => def.name() == parent_name || def.composed_of(&parent_name),
            None => false,
        }
    }

    /// Name of an instance's class.
    pub fn class_name<'a>(&self, instance: &'a Instance) -> &'a str {
        instance.class_name()
    }

    fn resolve_parents(
        &self,
        name: &str,
        parents: &[&str],
    ) -> Result<Vec<Rc<ClassDef>>, Error> {
        let entries = self.entries.borrow();
        if entries.contains_key(name) {
            return Err(DefineError::DuplicateClass(name.to_string()).into());
        }
        let mut defs = Vec::with_capacity(parents.len());
        for parent in parents {
            match entries.get(*parent) {
                Some(Entry::Class(def)) => defs.push(def.clone()),
                Some(Entry::Adapter(_)) => {
                    return Err(DefineError::NotInheritable(parent.to_string()).into())
                }
                None => return Err(DefineError::UnknownParent(parent.to_string()).into()),
            }
        }
        Ok(defs)
    }

    fn fill_storage(&self, instance: &Instance) -> Result<(), Error> {
        let class = instance.class().clone();
        for def in class.fields() {
            let value = self.resolve_default(def)?;
            instance.raw_set(def.name.clone(), value);
        }
        Ok(())
    }

    fn resolve_default(&self, def: &FieldDef) -> Result<Value, Error> {
        if def.lazy_instance {
            return match &def.default {
                Value::Str(class_name) => self.instantiate(class_name, &[]),
                Value::Function(factory) => factory.invoke(&[]),
                _ => Err(DefineError::InvalidInstanceDefault(def.name.to_string()).into()),
            };
        }
        Ok(match &def.default {
            Value::HardNil | Value::SoftNil => Value::Nil,
            Value::Table(_) if !def.shared_reference => deep_copy(&def.default),
            other => other.clone(),
        })
    }

    fn run_constructor(&self, instance: &Instance, args: &[Value]) -> Result<(), Error> {
        let key = FieldKey::Name(Rc::from(instance.class_name()));
        if let Value::Function(ctor) = instance.raw_get(&key) {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(Value::Instance(instance.clone()));
            full.extend_from_slice(args);
            ctor.invoke(&full)?;
        }
        // No field named like the class means no constructor runs. That is
        // documented behavior, not an oversight.
        Ok(())
    }
}

/// Overlay one inherited field onto the schema being merged.
///
/// Defaults follow the sentinel rules: hard absence wins the parent merge
/// unconditionally, soft absence loses to anything already placed, and
/// between two concrete values the later-processed (earlier-declared) parent
/// wins.
fn merge_parent_field(
    fields: &mut FxHashMap<FieldKey, FieldDef>,
    incoming: &FieldDef,
) -> Result<(), Error> {
    let existing = match fields.get_mut(&incoming.name) {
        None => {
            fields.insert(incoming.name.clone(), incoming.clone());
            return Ok(());
        }
        Some(existing) => existing,
    };

    if existing.visibility != incoming.visibility {
        let err = match (&existing.visibility, &incoming.visibility) {
            (Visibility::Private(_), Visibility::Private(_)) => {
                DefineError::PrivateCollision(incoming.name.to_string())
            }
            _ => DefineError::VisibilityConflict(incoming.name.to_string()),
        };
        return Err(err.into());
    }
    if existing.constant != incoming.constant {
        return Err(DefineError::ConstancyConflict(incoming.name.to_string()).into());
    }

    if matches!(existing.default, Value::HardNil) {
        // Hard absence already placed; nothing dislodges it.
    } else if matches!(incoming.default, Value::SoftNil) {
        // Soft absence loses to whatever is already there.
    } else {
        *existing = incoming.clone();
    }
    Ok(())
}

fn build_constructor(
    class_name: &Rc<str>,
    value: &Value,
    parents: &[Rc<ClassDef>],
) -> Result<FieldDef, Error> {
    let ctor = match value {
        Value::Function(f) => f.clone().into_method(class_name.clone()),
        Value::Str(s) if &**s == "inherit" => {
            // Synthetic constructor: call every direct parent's constructor
            // in reverse declared order, forwarding all arguments.
            let supers: Vec<Super> = parents
                .iter()
                .rev()
                .map(|p| Super::new(p.clone()))
                .collect();
            Function::new(move |args| {
                for sup in &supers {
                    sup.construct(args)?;
                }
                Ok(Value::Nil)
            })
            .into_method(class_name.clone())
        }
        _ => return Err(DefineError::MalformedConstructor(class_name.to_string()).into()),
    };
    Ok(FieldDef {
        name: FieldKey::Name(class_name.clone()),
        visibility: Visibility::Public,
        default: Value::Function(ctor),
        constant: true,
        shared_reference: false,
        lazy_instance: false,
        is_method: true,
    })
}

/// Overlay one own-body field onto the merged schema.
fn overlay_body_field(
    class_name: &Rc<str>,
    fields: &FxHashMap<FieldKey, FieldDef>,
    key: FieldKey,
    value: &Value,
    mods: modifiers::FieldModifiers,
) -> Result<FieldDef, Error> {
    let existing = fields.get(&key);

    let requested = mods.access.map(|access| match access {
        Access::Public => Visibility::Public,
        Access::Protected => Visibility::Protected,
        Access::Private => Visibility::Private(class_name.clone()),
    });
    let visibility = match (existing, requested) {
        (Some(old), Some(req)) if req != old.visibility => {
            let err = match (&old.visibility, &req) {
                (Visibility::Private(_), Visibility::Private(_)) => {
                    DefineError::PrivateCollision(key.to_string())
                }
                _ => DefineError::VisibilityConflict(key.to_string()),
            };
            return Err(err.into());
        }
        (Some(old), _) => old.visibility.clone(),
        (None, Some(req)) => req,
        (None, None) => Visibility::Public,
    };

    let is_function = matches!(value, Value::Function(_));
    let is_method = is_function && !mods.nonmethod && !mods.lazy_instance;
    // Methods are implicitly constant.
    let declared_const = if mods.constant || is_method {
        Some(true)
    } else {
        None
    };
    let constant = match (existing, declared_const) {
        (Some(old), Some(c)) if c != old.constant => {
            return Err(DefineError::ConstancyConflict(key.to_string()).into())
        }
        (Some(old), _) => old.constant,
        (None, declared) => declared.unwrap_or(false),
    };

    if mods.lazy_instance && !matches!(value, Value::Str(_) | Value::Function(_)) {
        return Err(DefineError::InvalidInstanceDefault(key.to_string()).into());
    }

    // A body-level soft absence still loses to any default already placed by
    // the composition; everything else is an explicit redeclaration and
    // replaces the inherited default outright.
    let keeps_inherited_default = matches!(value, Value::SoftNil)
        && existing.is_some_and(|old| !matches!(old.default, Value::SoftNil));

    let (default, lazy_instance, is_method) = if keeps_inherited_default {
        let old = match existing {
            Some(old) => old,
            None => return Err(DefineError::InvalidKey(key.to_string()).into()),
        };
        (old.default.clone(), old.lazy_instance, old.is_method)
    } else {
        let default = match value {
            Value::Function(f) if is_method => {
                Value::Function(f.clone().into_method(class_name.clone()))
            }
            other => other.clone(),
        };
        (default, mods.lazy_instance, is_method)
    };

    // The reference attribute persists once set by any source.
    let shared_reference =
        mods.shared_reference || existing.is_some_and(|old| old.shared_reference);

    Ok(FieldDef {
        name: key,
        visibility,
        default,
        constant,
        shared_reference,
        lazy_instance,
        is_method,
    })
}

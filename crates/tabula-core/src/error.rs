//! Error taxonomy
//!
//! Every failure is a synchronous, fatal-to-the-operation value. Nothing is
//! retried or recovered internally; callers decide whether to catch or
//! report. The three enums mirror the three phases a violation can occur in:
//! class definition, field access, and call-surface usage.

/// Errors raised while a class definition is being registered.
#[derive(Debug, thiserror::Error)]
pub enum DefineError {
    /// A class with this name is already registered.
    #[error("class `{0}` is already defined")]
    DuplicateClass(String),

    /// A listed parent has not been registered.
    #[error("parent class `{0}` is not defined")]
    UnknownParent(String),

    /// A listed parent is an external adapter, which cannot be inherited.
    #[error("class `{0}` cannot be inherited from")]
    NotInheritable(String),

    /// A field key decoded to an empty name.
    #[error("invalid field key `{0}`")]
    InvalidKey(String),

    /// The modifier prefix contained a token outside the known set.
    #[error("unknown modifier `{0}` in field key `{1}`")]
    UnknownModifier(String, String),

    /// More than one of `public`/`protected`/`private` on a single field.
    #[error("multiple access modifiers in field key `{0}`")]
    MultipleAccessModifiers(String),

    /// Two sources declare the same field with different access levels.
    #[error("conflicting access level for field `{0}`")]
    VisibilityConflict(String),

    /// Two different classes both own a private field of the same bare name.
    #[error("ambiguous private field `{0}`: owned by more than one class")]
    PrivateCollision(String),

    /// Two sources declare the same field with different constancy.
    #[error("conflicting constancy for field `{0}`")]
    ConstancyConflict(String),

    /// The same field appears twice in one class body.
    #[error("duplicate field `{0}` in class body")]
    DuplicateField(String),

    /// A body field shadows a name reserved by the inheritance composition.
    #[error("field `{0}` shadows an inherited class name")]
    ReservedName(String),

    /// A field named after the class is neither a function nor `"inherit"`.
    #[error("malformed constructor for class `{0}`")]
    MalformedConstructor(String),

    /// An `instance` field default is not a class name or factory function.
    #[error("field `{0}`: `instance` default must be a class name or a factory function")]
    InvalidInstanceDefault(String),
}

/// Errors raised by the access-control gate on a field read or write.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// The field has no definition and the configured policy forbids it.
    #[error("undefined variable `{0}`")]
    Undefined(String),

    /// The current scope does not satisfy the field's visibility.
    ///
    /// `private-of-<class>` is reported as plain `private`; the owning class
    /// is never part of the message.
    #[error("cannot access field `{field}`: {required} scope required (current scope is {actual})")]
    ScopeViolation {
        /// Field that was accessed.
        field: String,
        /// Visibility the field demands.
        required: &'static str,
        /// Effective scope at the access site.
        actual: &'static str,
    },

    /// Write to a field declared constant.
    #[error("attempt to overwrite constant field `{0}`")]
    ConstantWrite(String),

    /// Write to a method-valued field not marked `nonmethod`.
    #[error("attempt to overwrite method `{0}`")]
    MethodWrite(String),
}

/// Errors raised by misuse of the call surface.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    /// Instantiation of a name with no registered definition.
    #[error("class `{0}` is not defined")]
    UnknownClass(String),

    /// Super-constructor call on a parent that declares no constructor.
    #[error("class `{0}` has no constructor")]
    NoConstructor(String),

    /// A method was invoked without an instance receiver.
    #[error("method called without a receiver")]
    MissingReceiver,

    /// A non-function, non-super value was called.
    #[error("value is not callable")]
    NotCallable,
}

/// Umbrella error for every fallible operation in the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Definition-time failure.
    #[error(transparent)]
    Define(#[from] DefineError),

    /// Access-control failure.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Call-surface misuse.
    #[error(transparent)]
    Usage(#[from] UsageError),
}

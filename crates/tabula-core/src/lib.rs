//! Tabula: a class-based object model over untyped tables
//!
//! Tabula layers fields, methods, single/multiple inheritance, constructors,
//! access control, constant fields, reference vs value defaults and operator
//! hooks on top of a dynamic table value model. Two layers:
//!
//! - the **class definition registry** parses annotated class bodies into
//!   per-class schemas, merges inheritance with explicit conflict detection,
//!   and stores the result keyed by class name;
//! - the **instance runtime** materializes instances from those schemas and
//!   gates every field read/write/call against the declared visibility and
//!   the instance's current effective scope.
//!
//! # Example
//! ```ignore
//! use tabula_core::{arg, receiver, ClassBody, Registry, Value};
//!
//! let reg = Registry::new();
//! reg.declare("Point")
//!     .body(
//!         ClassBody::new()
//!             .set("x", 0.0)
//!             .set("y", 0.0)
//!             .method("Point", |args| {
//!                 let this = receiver(args)?;
//!                 this.set("x", arg(args, 1))?;
//!                 this.set("y", arg(args, 2))?;
//!                 Ok(Value::Nil)
//!             }),
//!     )
//!     .unwrap();
//! let p = reg.instantiate("Point", &[1.0.into(), 2.0.into()]).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![allow(ambiguous_wide_pointer_comparisons)]

pub mod declare;
pub mod error;
pub mod instance;
pub mod modifiers;
pub mod registry;
pub mod schema;
pub mod value;

pub use declare::{call_value, ClassBody, ClassDecl};
pub use error::{AccessError, DefineError, Error, UsageError};
pub use instance::{arg, receiver, Instance, Scope};
pub use modifiers::{Access, FieldKey, FieldModifiers, RawKey};
pub use registry::{AccessMode, Config, Registry, TypeRef, UndefinedPolicy};
pub use schema::{ClassDef, FieldDef, Super, Visibility};
pub use value::{deep_copy, Function, Table, TableKey, TableRef, Value};

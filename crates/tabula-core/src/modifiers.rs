//! Annotation decoder
//!
//! Field names in a class body carry their modifiers inline, as a prefix
//! block terminated by a run of two-or-more underscores:
//! `public_instance__name`, `private_const__count`, `operator__add`.
//! This module tokenizes that micro-syntax into a structured
//! [`FieldModifiers`] set; the inheritance merge and the access gate only
//! ever consume the structured result.
//!
//! Numeric keys pass through untouched: array-like fields are exempt from
//! the whole access-control system.

use std::fmt;
use std::rc::Rc;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::error::DefineError;

/// A raw, undecoded class-body key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RawKey {
    /// Numeric key: no modifiers, always public, implicitly defined.
    Index(i64),
    /// String key, possibly carrying a modifier prefix.
    Name(String),
}

impl From<i64> for RawKey {
    fn from(index: i64) -> Self {
        RawKey::Index(index)
    }
}

impl From<&str> for RawKey {
    fn from(name: &str) -> Self {
        RawKey::Name(name.to_string())
    }
}

impl fmt::Display for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawKey::Index(i) => write!(f, "{i}"),
            RawKey::Name(n) => write!(f, "{n}"),
        }
    }
}

/// A decoded field key, as stored in schemas and instance storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// Numeric key.
    Index(i64),
    /// Bare field name, modifiers stripped.
    Name(Rc<str>),
}

impl From<i64> for FieldKey {
    fn from(index: i64) -> Self {
        FieldKey::Index(index)
    }
}

impl From<&str> for FieldKey {
    fn from(name: &str) -> Self {
        FieldKey::Name(Rc::from(name))
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Index(i) => write!(f, "{i}"),
            FieldKey::Name(n) => write!(f, "{n}"),
        }
    }
}

/// Requested access level, before an owning class is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Readable and writable from anywhere.
    Public,
    /// Reachable from any method scope.
    Protected,
    /// Reachable only from methods of the owning class.
    Private,
}

/// The structured modifier set decoded from one field key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldModifiers {
    /// Explicit access level, if any token was present.
    pub access: Option<Access>,
    /// `const`: the field rejects writes after construction.
    pub constant: bool,
    /// `reference`: the default is shared across instances, never deep-copied.
    pub shared_reference: bool,
    /// `instance`: the default is a class name or zero-arg factory, resolved
    /// fresh per instance at construction time.
    pub lazy_instance: bool,
    /// `nonmethod`: a function default is plain data, not a method.
    pub nonmethod: bool,
    /// `operator`: the field declares a native operator-overload hook.
    pub operator: bool,
}

#[derive(Debug, Clone, Copy)]
enum Token {
    Public,
    Protected,
    Private,
    Const,
    Reference,
    Instance,
    Nonmethod,
    Operator,
}

static TOKENS: Lazy<FxHashMap<&'static str, Token>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("public", Token::Public);
    map.insert("protected", Token::Protected);
    map.insert("private", Token::Private);
    map.insert("const", Token::Const);
    map.insert("reference", Token::Reference);
    map.insert("instance", Token::Instance);
    map.insert("nonmethod", Token::Nonmethod);
    map.insert("operator", Token::Operator);
    map
});

/// Decode one raw class-body key into its field key and modifier set.
pub fn decode(raw: &RawKey) -> Result<(FieldKey, FieldModifiers), DefineError> {
    let name = match raw {
        RawKey::Index(i) => return Ok((FieldKey::Index(*i), FieldModifiers::default())),
        RawKey::Name(n) => n.as_str(),
    };

    let (prefix, rest) = match name.find("__") {
        // A leading underscore run belongs to the name itself.
        Some(0) | None => ("", name),
        Some(pos) => (&name[..pos], name[pos..].trim_start_matches('_')),
    };

    if prefix.is_empty() {
        if rest.is_empty() {
            return Err(DefineError::InvalidKey(raw.to_string()));
        }
        return Ok((FieldKey::Name(Rc::from(rest)), FieldModifiers::default()));
    }
    if rest.is_empty() {
        return Err(DefineError::InvalidKey(raw.to_string()));
    }

    let mut mods = FieldModifiers::default();
    for token in prefix.split('_') {
        let known = TOKENS
            .get(token)
            .ok_or_else(|| DefineError::UnknownModifier(token.to_string(), raw.to_string()))?;
        match known {
            Token::Public => set_access(&mut mods, Access::Public, raw)?,
            Token::Protected => set_access(&mut mods, Access::Protected, raw)?,
            Token::Private => set_access(&mut mods, Access::Private, raw)?,
            Token::Const => mods.constant = true,
            Token::Reference => mods.shared_reference = true,
            Token::Instance => mods.lazy_instance = true,
            Token::Nonmethod => mods.nonmethod = true,
            Token::Operator => mods.operator = true,
        }
    }

    // Operator hooks are stored under their native double-underscore name.
    let key = if mods.operator {
        FieldKey::Name(Rc::from(format!("__{rest}").as_str()))
    } else {
        FieldKey::Name(Rc::from(rest))
    };
    Ok((key, mods))
}

fn set_access(
    mods: &mut FieldModifiers,
    access: Access,
    raw: &RawKey,
) -> Result<(), DefineError> {
    if mods.access.is_some() {
        return Err(DefineError::MultipleAccessModifiers(raw.to_string()));
    }
    mods.access = Some(access);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_name(key: &str) -> (FieldKey, FieldModifiers) {
        decode(&RawKey::from(key)).unwrap()
    }

    #[test]
    fn bare_name_has_no_modifiers() {
        let (key, mods) = decode_name("velocity");
        assert_eq!(key, FieldKey::from("velocity"));
        assert_eq!(mods, FieldModifiers::default());
    }

    #[test]
    fn single_underscores_belong_to_the_name() {
        let (key, mods) = decode_name("max_speed");
        assert_eq!(key, FieldKey::from("max_speed"));
        assert_eq!(mods, FieldModifiers::default());
    }

    #[test]
    fn prefix_block_decodes() {
        let (key, mods) = decode_name("public_instance__engine");
        assert_eq!(key, FieldKey::from("engine"));
        assert_eq!(mods.access, Some(Access::Public));
        assert!(mods.lazy_instance);
        assert!(!mods.constant);
    }

    #[test]
    fn const_private_combination() {
        let (key, mods) = decode_name("private_const__count");
        assert_eq!(key, FieldKey::from("count"));
        assert_eq!(mods.access, Some(Access::Private));
        assert!(mods.constant);
    }

    #[test]
    fn long_underscore_runs_terminate_the_prefix() {
        let (key, mods) = decode_name("protected____hp");
        assert_eq!(key, FieldKey::from("hp"));
        assert_eq!(mods.access, Some(Access::Protected));
    }

    #[test]
    fn operator_renames_to_native_hook() {
        let (key, mods) = decode_name("operator__add");
        assert_eq!(key, FieldKey::from("__add"));
        assert!(mods.operator);
    }

    #[test]
    fn numeric_keys_pass_through() {
        let (key, mods) = decode(&RawKey::Index(3)).unwrap();
        assert_eq!(key, FieldKey::Index(3));
        assert_eq!(mods, FieldModifiers::default());
    }

    #[test]
    fn unknown_token_is_an_error() {
        let err = decode(&RawKey::from("publik__x")).unwrap_err();
        assert!(matches!(err, DefineError::UnknownModifier(token, _) if token == "publik"));
    }

    #[test]
    fn two_access_tokens_are_an_error() {
        let err = decode(&RawKey::from("public_private__x")).unwrap_err();
        assert!(matches!(err, DefineError::MultipleAccessModifiers(_)));
    }

    #[test]
    fn empty_name_after_prefix_is_invalid() {
        let err = decode(&RawKey::from("public__")).unwrap_err();
        assert!(matches!(err, DefineError::InvalidKey(_)));
    }

    #[test]
    fn leading_underscores_stay_in_the_name() {
        let (key, mods) = decode_name("__tostring");
        assert_eq!(key, FieldKey::from("__tostring"));
        assert_eq!(mods, FieldModifiers::default());
    }
}

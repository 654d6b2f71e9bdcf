//! Identifier types and their syntactic rules.
//!
//! `Id` backs forms, groups, and fields; `OptionId` backs field options and
//! table columns. Both are thin newtypes over `String` so that call sites
//! can't accidentally hand a free-form label where a validated identifier
//! is required.

use std::fmt;

/// `[a-z][a-z0-9_]*` — used for form/group/field identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Id(String);

/// Same syntax as `Id`, unique only within its parent field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct OptionId(String);

fn is_valid_id_str(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl Id {
    pub fn new(s: impl Into<String>) -> Result<Self, String> {
        let s = s.into();
        if is_valid_id_str(&s) {
            Ok(Id(s))
        } else {
            Err(format!("invalid id: {:?} (expected [a-z][a-z0-9_]*)", s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl OptionId {
    pub fn new(s: impl Into<String>) -> Result<Self, String> {
        let s = s.into();
        if is_valid_id_str(&s) {
            Ok(OptionId(s))
        } else {
            Err(format!(
                "invalid option id: {:?} (expected [a-z][a-z0-9_]*)",
                s
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `"<fieldId>.<optionId>"`, used by patches and validation issues.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedOptionRef {
    pub field_id: Id,
    pub option_id: OptionId,
}

impl fmt::Display for QualifiedOptionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.field_id, self.option_id)
    }
}

/// `"<fieldId>.<columnId>"`, used by the `table` field kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedColumnRef {
    pub field_id: Id,
    pub column_id: Id,
}

impl fmt::Display for QualifiedColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.field_id, self.column_id)
    }
}

/// Role names: `[a-z0-9_-]+`, with `*` explicitly reserved (never valid).
pub fn is_valid_role_name(s: &str) -> bool {
    if s.is_empty() || s == "*" {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids() {
        assert!(Id::new("name").is_ok());
        assert!(Id::new("field_1").is_ok());
        assert!(Id::new("a").is_ok());
    }

    #[test]
    fn invalid_ids() {
        assert!(Id::new("").is_err());
        assert!(Id::new("Name").is_err());
        assert!(Id::new("1field").is_err());
        assert!(Id::new("has-dash").is_err());
    }

    #[test]
    fn qualified_refs_display() {
        let r = QualifiedOptionRef {
            field_id: Id::new("tasks").unwrap(),
            option_id: OptionId::new("a").unwrap(),
        };
        assert_eq!(r.to_string(), "tasks.a");
    }

    #[test]
    fn role_name_rules() {
        assert!(is_valid_role_name("agent"));
        assert!(is_valid_role_name("user-1"));
        assert!(!is_valid_role_name("*"));
        assert!(!is_valid_role_name(""));
        assert!(!is_valid_role_name("Has Space"));
    }
}

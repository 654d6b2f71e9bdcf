//! The engine's closed error hierarchy (§7).
//!
//! Every error kind is a plain enum with a hand-written `Display` — the
//! engine never reaches for `thiserror`. Each carries enough structured
//! context (field id, expected/received shape) that a caller doesn't need
//! to string-match the message.

use std::fmt;

pub const SPEC_VERSION: &str = "MF/0.1";
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Raised by the preprocessor and parser (L0–L2).
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnclosedTag {
        tag: String,
        line: usize,
    },
    UnknownTag {
        tag: String,
        line: usize,
    },
    LegacyFieldTag {
        tag: String,
        line: usize,
    },
    MissingAttribute {
        tag: String,
        attribute: String,
        line: usize,
    },
    UnknownAttribute {
        tag: String,
        attribute: String,
        line: usize,
    },
    DuplicateId {
        id: String,
        line: usize,
    },
    UnresolvedRef {
        reference: String,
        tag: String,
        line: usize,
    },
    DuplicateDocumentation {
        reference: String,
        tag: String,
        line: usize,
    },
    InvalidValue {
        field: String,
        reason: String,
        line: usize,
    },
    InvalidFrontmatter {
        reason: String,
    },
    FenceRequired {
        field: String,
        line: usize,
    },
    DuplicateOptionId {
        field: String,
        option: String,
        line: usize,
    },
    Other {
        source: Option<String>,
        line: Option<usize>,
        column: Option<usize>,
        cause: String,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnclosedTag { tag, line } => {
                write!(f, "unclosed tag '{}' (opened at line {})", tag, line)
            }
            ParseError::UnknownTag { tag, line } => {
                write!(f, "unknown tag '{}' at line {}", tag, line)
            }
            ParseError::LegacyFieldTag { tag, line } => write!(
                f,
                "legacy field tag '{}' at line {} — migrate to {{% field kind=\"...\" %}}",
                tag, line
            ),
            ParseError::MissingAttribute {
                tag,
                attribute,
                line,
            } => write!(
                f,
                "tag '{}' at line {} is missing required attribute '{}'",
                tag, line, attribute
            ),
            ParseError::UnknownAttribute {
                tag,
                attribute,
                line,
            } => write!(
                f,
                "tag '{}' at line {} has unknown attribute '{}'",
                tag, line, attribute
            ),
            ParseError::DuplicateId { id, line } => {
                write!(f, "duplicate id '{}' at line {}", id, line)
            }
            ParseError::UnresolvedRef {
                reference,
                tag,
                line,
            } => write!(
                f,
                "{} at line {} references unknown id '{}'",
                tag, line, reference
            ),
            ParseError::DuplicateDocumentation {
                reference,
                tag,
                line,
            } => write!(
                f,
                "duplicate {} block for '{}' at line {}",
                tag, reference, line
            ),
            ParseError::InvalidValue {
                field,
                reason,
                line,
            } => write!(
                f,
                "invalid value for field '{}' at line {}: {}",
                field, line, reason
            ),
            ParseError::InvalidFrontmatter { reason } => {
                write!(f, "invalid frontmatter: {}", reason)
            }
            ParseError::FenceRequired { field, line } => write!(
                f,
                "value fence for field '{}' at line {} contains '{{%' and must be marked process=false",
                field, line
            ),
            ParseError::DuplicateOptionId {
                field,
                option,
                line,
            } => write!(
                f,
                "duplicate option id '{}' in field '{}' at line {}",
                option, field, line
            ),
            ParseError::Other {
                source,
                line,
                column,
                cause,
            } => {
                write!(f, "parse error")?;
                if let Some(s) = source {
                    write!(f, " in {}", s)?;
                }
                if let Some(l) = line {
                    write!(f, " at line {}", l)?;
                    if let Some(c) = column {
                        write!(f, ", column {}", c)?;
                    }
                }
                write!(f, ": {}", cause)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Raised per-patch by the applicator (L5).
#[derive(Debug, Clone, PartialEq)]
pub struct PatchError {
    pub patch_index: usize,
    pub field_id: String,
    pub patch_operation: String,
    pub kind: PatchErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchErrorKind {
    UnknownField,
    UnknownOption,
    KindMismatch { expected: String, received: String },
    BadShape,
    ConstraintViolation,
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "patch #{} ({} on '{}'): {}",
            self.patch_index, self.patch_operation, self.field_id, self.message
        )
    }
}

impl std::error::Error for PatchError {}

/// Batch wrapper raised when a caller asks the applicator to treat any
/// rejection as fatal (the applicator itself always returns `ApplyResult`;
/// this type exists for callers who want an all-or-nothing `Result`).
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub issues: Vec<PatchError>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} patch(es) rejected:", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Raised by the harness, value coercion, and exports (L7/L8/L9) for
/// caller-supplied configuration problems.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub option: String,
    pub expected_type: String,
    pub received_value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config option '{}' expected {}, got '{}'",
            self.option, self.expected_type, self.received_value
        )
    }
}

impl std::error::Error for ConfigError {}

/// Raised by the value-coercion layer (L8) for one `InputContext` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CoerceError {
    pub field_id: String,
    pub kind: CoerceErrorKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoerceErrorKind {
    UnknownField,
    Impossible { from: String, to: String },
    ConstraintViolation(String),
}

impl fmt::Display for CoerceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CoerceErrorKind::UnknownField => {
                write!(f, "unknown field id '{}'", self.field_id)
            }
            CoerceErrorKind::Impossible { from, to } => write!(
                f,
                "cannot coerce field '{}' from {} to {}",
                self.field_id, from, to
            ),
            CoerceErrorKind::ConstraintViolation(msg) => write!(
                f,
                "value for field '{}' violates a constraint: {}",
                self.field_id, msg
            ),
        }
    }
}

impl std::error::Error for CoerceError {}

/// Opaquely forwarded from an agent adapter; the engine never constructs
/// one itself, only propagates it out of `Agent::generate_patches`.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmError {
    pub provider: String,
    pub model: String,
    pub status_code: Option<u16>,
    pub retryable: bool,
    pub message: String,
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} error (retryable={}): {}",
            self.provider, self.model, self.retryable, self.message
        )?;
        if let Some(code) = self.status_code {
            write!(f, " [status {}]", code)?;
        }
        Ok(())
    }
}

impl std::error::Error for LlmError {}

/// Raised when a patch batch or harness run is aborted.
#[derive(Debug, Clone, PartialEq)]
pub struct AbortError {
    pub reason: String,
    pub field_id: Option<String>,
}

impl fmt::Display for AbortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aborted: {}", self.reason)?;
        if let Some(id) = &self.field_id {
            write!(f, " (from field '{}')", id)?;
        }
        Ok(())
    }
}

impl std::error::Error for AbortError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let e = ParseError::DuplicateId {
            id: "x".into(),
            line: 12,
        };
        assert_eq!(e.to_string(), "duplicate id 'x' at line 12");
    }

    #[test]
    fn patch_error_display() {
        let e = PatchError {
            patch_index: 2,
            field_id: "age".into(),
            patch_operation: "set_number".into(),
            kind: PatchErrorKind::ConstraintViolation,
            message: "value 200 exceeds max 150".into(),
        };
        assert_eq!(
            e.to_string(),
            "patch #2 (set_number on 'age'): value 200 exceeds max 150"
        );
    }
}

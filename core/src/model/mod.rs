//! The in-memory data model shared by every layer (spec §3).

pub mod field;
pub mod form;
pub mod value;

pub use field::{ApprovalMode, CheckboxMode, ColumnType, Field, FieldCommon, FieldKind, OptionDef};
pub use form::{
    DocTag, DocumentationBlock, FieldEntry, FieldGroup, FormDef, FormMetadata, HarnessHints,
    IdEntry, IdKind, ParsedForm, RunMode, Stats, SyntaxStyle,
};
pub use value::{CheckboxState, FieldState, FieldValue, ValueMeta};

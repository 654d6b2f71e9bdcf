//! `markform-core` — the Markform form engine: parser, canonical
//! serializer, validator, patch applicator, inspector, and agent fill
//! harness (see `SPEC_FULL.md` at the workspace root).

pub mod coerce_input;
pub mod defaults;
pub mod error;
pub mod export;
pub mod harness;
pub mod ids;
pub mod inspect;
pub mod markdoc;
pub mod model;
pub mod parse;
pub mod patch;
pub mod preprocess;
pub mod serialize;
pub mod validate;

pub use coerce_input::{coerce_input, InputContext};
pub use error::{
    AbortError, CoerceError, CoerceErrorKind, ConfigError, LlmError, ParseError, PatchError,
    PatchErrorKind, ValidationError, ENGINE_VERSION, SPEC_VERSION,
};
pub use export::{form_schema, render_report, values_map};
pub use harness::{
    fill_form, Agent, CancelToken, FillConfig, FillMode, FillResult, FillStatus, MockAgent,
    Session, TurnProgress,
};
pub use ids::{Id, OptionId, QualifiedColumnRef, QualifiedOptionRef};
pub use inspect::{
    filter_by_roles, inspect_issues, inspect_issues_with, progress_by_role, structure_summary,
    InspectIssue, IssueCode, IssueScope, IssueSeverity, Priority, ProgressSummary, StructureSummary,
};
pub use model::*;
pub use parse::parse_form;
pub use patch::{apply_patches, ApplyResult, ApplyStatus, Patch, PatchWarning};
pub use serialize::serialize_form;
pub use validate::{
    validate_entry, validate_form, validate_form_with_hooks, HookRegistry, ValidatorHook,
    Violation, ViolationCode,
};

//! L5 — patch operations, shape coercion, and the best-effort applicator
//! (spec §4.5, §6.2).

mod apply;
pub(crate) mod coerce;
mod ops;

pub use apply::{apply_patches, ApplyResult, ApplyStatus, PatchWarning};
pub use ops::Patch;

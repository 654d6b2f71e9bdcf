//! The fill harness's one-operation agent contract (spec §4.7, §4.11).

use crate::error::LlmError;
use crate::inspect::InspectIssue;
use crate::model::ParsedForm;
use crate::patch::Patch;

/// Implemented by whatever drives patch generation for a turn — an LLM
/// call, a scripted test double, a human-in-the-loop prompt. The engine
/// never looks past the returned patch list.
///
/// Synchronous: the engine itself has no async runtime dependency. A
/// caller that needs to await a real model call wraps this trait from
/// outside the crate (e.g. `tokio::task::block_in_place`).
pub trait Agent {
    fn generate_patches(
        &mut self,
        form: &ParsedForm,
        issues: &[InspectIssue],
        max_patches: usize,
    ) -> Result<Vec<Patch>, LlmError>;
}

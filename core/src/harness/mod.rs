//! L7 — bounded agent fill loop (spec §4.7, §5, §4.11).
//!
//! Drives an [`Agent`] through the inspect → filter → ask → apply cycle
//! one turn at a time. `ParsedForm` stays logically immutable across the
//! run: each turn's applicator call produces a fresh form, never mutates
//! the caller's copy in place.

mod agent;
pub mod mock;
mod session;

pub use agent::Agent;
pub use mock::MockAgent;
pub use session::{PatchRecord, Session, TurnRecord};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::defaults;
use crate::error::LlmError;
use crate::ids::Id;
use crate::inspect::{inspect_issues_with, InspectIssue};
use crate::model::ParsedForm;
use crate::patch::{apply_patches, ApplyStatus, Patch, PatchWarning};

/// Lock-free cooperative cancellation, checked between turns and
/// immediately before dispatching to the agent (spec §5: mid-turn
/// cancellation is unsupported since a patch batch applies atomically).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Only surface fields inspect flags as missing or invalid.
    Continue,
    /// Also surface already-answered fields, so the agent may revise them.
    Overwrite,
}

#[derive(Debug, Clone)]
pub struct FillConfig {
    pub max_turns: u32,
    pub max_issues_per_turn: usize,
    pub max_fields_per_turn: usize,
    pub max_groups_per_turn: usize,
    pub max_patches_per_turn: usize,
    pub target_roles: HashSet<String>,
    pub fill_mode: FillMode,
    pub cancel: CancelToken,
}

impl Default for FillConfig {
    fn default() -> Self {
        FillConfig {
            max_turns: defaults::DEFAULT_MAX_TURNS,
            max_issues_per_turn: defaults::DEFAULT_MAX_ISSUES_PER_TURN,
            max_fields_per_turn: defaults::DEFAULT_MAX_FIELDS_PER_TURN,
            max_groups_per_turn: defaults::DEFAULT_MAX_GROUPS_PER_TURN,
            max_patches_per_turn: defaults::DEFAULT_MAX_PATCHES_PER_TURN,
            target_roles: defaults::DEFAULT_ROLES.iter().map(|s| s.to_string()).collect(),
            fill_mode: FillMode::Continue,
            cancel: CancelToken::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillStatus {
    Ok,
    MaxTurns,
    Cancelled,
    Aborted,
    Error,
}

#[derive(Debug, Clone)]
pub struct TurnProgress {
    pub turn_number: u32,
    pub issues: Vec<InspectIssue>,
    pub patches: Vec<Patch>,
    pub applied_count: usize,
    pub rejected_count: usize,
    pub warnings: Vec<String>,
    pub token_counts: Option<(u32, u32)>,
}

#[derive(Debug, Clone)]
pub struct FillResult {
    pub status: FillStatus,
    pub new_form: ParsedForm,
    pub turns: Vec<TurnProgress>,
    pub warnings: Vec<PatchWarning>,
    pub session: Session,
}

/// Run the bounded fill loop to completion (spec §4.7's nine-step
/// per-turn algorithm, repeated until a stop condition fires).
pub fn fill_form(form: &ParsedForm, agent: &mut dyn Agent, config: &FillConfig) -> FillResult {
    let mut working = form.clone();
    let mut turns = Vec::new();
    let mut warnings = Vec::new();
    let mut session = Session::new();
    let mut status = FillStatus::Ok;

    for turn_number in 1..=config.max_turns {
        if config.cancel.is_cancelled() {
            status = FillStatus::Cancelled;
            break;
        }

        let all_issues = inspect_issues_with(&working, config.fill_mode == FillMode::Overwrite);
        if all_issues.is_empty() {
            break;
        }

        let scoped = scope_to_roles(&working, all_issues, &config.target_roles);
        let unblocked: Vec<InspectIssue> = scoped.into_iter().filter(|i| i.blocked_by.is_none()).collect();
        if unblocked.is_empty() {
            break;
        }

        let reduced = reduce_to_caps(&working, unblocked, config.max_fields_per_turn, config.max_groups_per_turn);
        let mut issues = reduced;
        issues.truncate(config.max_issues_per_turn);

        if config.cancel.is_cancelled() {
            status = FillStatus::Cancelled;
            break;
        }

        let patches = match agent.generate_patches(&working, &issues, config.max_patches_per_turn) {
            Ok(mut p) => {
                p.truncate(config.max_patches_per_turn);
                p
            }
            Err(err) => {
                tracing::debug!(turn = turn_number, error = %err, "agent call failed");
                status = FillStatus::Error;
                break;
            }
        };

        let abort_requested = patches.iter().any(|p| matches!(p, Patch::AbortForm { .. }));

        let result = apply_patches(&working, &patches);
        tracing::debug!(turn = turn_number, status = ?result.status, "harness turn applied");

        let progress = TurnProgress {
            turn_number,
            issues: issues.clone(),
            patches: patches.clone(),
            applied_count: result.applied_patches.len(),
            rejected_count: result.rejected_patches.len(),
            warnings: result.warnings.iter().map(|w| w.message.clone()).collect(),
            token_counts: None,
        };
        session.record(&progress);
        warnings.extend(result.warnings.clone());
        turns.push(progress);

        working = result.new_form;

        if abort_requested && matches!(result.status, ApplyStatus::Applied | ApplyStatus::Partial) {
            status = FillStatus::Aborted;
            break;
        }
    }

    if status == FillStatus::Ok && turns.len() as u32 >= config.max_turns {
        let remaining = inspect_issues_with(&working, config.fill_mode == FillMode::Overwrite);
        let remaining = scope_to_roles(&working, remaining, &config.target_roles);
        if remaining.iter().any(|i| i.blocked_by.is_none()) {
            status = FillStatus::MaxTurns;
        }
    }

    FillResult { status, new_form: working, turns, warnings, session }
}

fn scope_to_roles(form: &ParsedForm, issues: Vec<InspectIssue>, target_roles: &HashSet<String>) -> Vec<InspectIssue> {
    if target_roles.is_empty() {
        return issues;
    }
    crate::inspect::filter_by_roles(form, issues, target_roles)
}

fn group_of(form: &ParsedForm, field_id: &Id) -> Option<Id> {
    form.forms
        .iter()
        .flat_map(|fd| &fd.groups)
        .find(|g| g.fields.iter().any(|e| e.field.id() == field_id))
        .map(|g| g.id.clone())
}

/// Walk issues in order, keeping one only while doing so would not push
/// the running field/group count past its cap (spec §4.7 step 3).
fn reduce_to_caps(
    form: &ParsedForm,
    issues: Vec<InspectIssue>,
    max_fields: usize,
    max_groups: usize,
) -> Vec<InspectIssue> {
    let mut seen_fields: HashSet<Id> = HashSet::new();
    let mut seen_groups: HashSet<Id> = HashSet::new();
    let mut out = Vec::new();

    for issue in issues {
        let field_id = issue.reference.clone();
        let group_id = group_of(form, &field_id);

        let is_new_field = !seen_fields.contains(&field_id);
        let is_new_group = group_id.as_ref().map(|g| !seen_groups.contains(g)).unwrap_or(false);

        let would_exceed_fields = is_new_field && seen_fields.len() >= max_fields;
        let would_exceed_groups = is_new_group && seen_groups.len() >= max_groups;
        if would_exceed_fields || would_exceed_groups {
            continue;
        }

        seen_fields.insert(field_id);
        if let Some(g) = group_id {
            seen_groups.insert(g);
        }
        out.push(issue);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Id;
    use crate::parse::parse_form;

    fn sample() -> ParsedForm {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="name" label="Name" required=true %}
{% /field %}
{% /group %}
{% /form %}
"#;
        parse_form(input).unwrap()
    }

    #[test]
    fn fill_loop_converges_when_agent_answers_everything() {
        let form = sample();
        let mut agent = MockAgent::with_batches(vec![vec![Patch::SetString {
            field_id: Id::new("name").unwrap(),
            value: Some("Ada".into()),
        }]]);
        let config = FillConfig::default();
        let result = fill_form(&form, &mut agent, &config);
        assert_eq!(result.status, FillStatus::Ok);
        assert_eq!(result.turns.len(), 1);
        assert!(result.new_form.field(&Id::new("name").unwrap()).unwrap().value.state().is_answered());
    }

    #[test]
    fn fill_loop_stops_at_max_turns_when_agent_never_answers() {
        let form = sample();
        let mut agent = MockAgent::new();
        let config = FillConfig { max_turns: 2, ..FillConfig::default() };
        let result = fill_form(&form, &mut agent, &config);
        assert_eq!(result.status, FillStatus::MaxTurns);
        assert_eq!(result.turns.len(), 2);
    }

    #[test]
    fn cancellation_stops_the_loop() {
        let form = sample();
        let mut agent = MockAgent::new();
        let config = FillConfig::default();
        config.cancel.cancel();
        let result = fill_form(&form, &mut agent, &config);
        assert_eq!(result.status, FillStatus::Cancelled);
        assert!(result.turns.is_empty());
    }

    fn answered_sample() -> ParsedForm {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="name" label="Name" required=true %}
```value
Ada
```
{% /field %}
{% /group %}
{% /form %}
"#;
        parse_form(input).unwrap()
    }

    #[test]
    fn continue_mode_ignores_already_answered_fields() {
        let form = answered_sample();
        let mut agent = MockAgent::new();
        let config = FillConfig { max_turns: 1, fill_mode: FillMode::Continue, ..FillConfig::default() };
        let result = fill_form(&form, &mut agent, &config);
        assert_eq!(result.status, FillStatus::Ok);
        assert!(result.turns.is_empty());
    }

    #[test]
    fn overwrite_mode_resurfaces_answered_fields_as_revision_candidates() {
        let form = answered_sample();
        let mut agent = MockAgent::new();
        let config = FillConfig { max_turns: 1, fill_mode: FillMode::Overwrite, ..FillConfig::default() };
        let result = fill_form(&form, &mut agent, &config);
        assert_eq!(result.turns.len(), 1);
        let issues = &result.turns[0].issues;
        assert!(issues
            .iter()
            .any(|i| i.reference.as_str() == "name" && i.code == crate::inspect::IssueCode::RevisionCandidate));
    }
}

//! L6 — inspector (spec §4.6).
//!
//! Read-only over a `ParsedForm`: tallies structure and per-role progress,
//! and produces a priority-ordered `InspectIssue` list that `harness`
//! (L7) feeds to an agent turn by turn. Grounded on the teacher's
//! diagnosis stage, which likewise turns a snapshot of state into a
//! scored, ordered list of actionable items rather than a boolean.

use std::collections::{HashMap, HashSet};

use crate::ids::Id;
use crate::model::{CheckboxMode, CheckboxState, Field, FieldEntry, FieldState, OptionDef, ParsedForm};
use crate::validate::validate_entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueScope {
    Form,
    Group,
    Field,
    Option,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCode {
    RequiredMissing,
    ValidationError,
    OptionalMissing,
    /// An already-answered field surfaced only under `fillMode=overwrite`
    /// (§4.7), so an agent may revise it. Contributes nothing to the
    /// form's total issue score.
    RevisionCandidate,
}

impl IssueCode {
    /// Score contribution per field §4.6 ("required field missing = 3,
    /// validation error = 2, optional missing = 1").
    fn score(&self) -> u32 {
        match self {
            IssueCode::RequiredMissing => 3,
            IssueCode::ValidationError => 2,
            IssueCode::OptionalMissing => 1,
            IssueCode::RevisionCandidate => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    P1,
    P2,
    P3,
    P4,
    P5,
}

impl Priority {
    /// Total-score-to-tier thresholds (§4.6: "≥5 / ≥4 / ≥3 / ≥2 / ≥1").
    fn from_total_score(score: u32) -> Priority {
        if score >= 5 {
            Priority::P1
        } else if score >= 4 {
            Priority::P2
        } else if score >= 3 {
            Priority::P3
        } else if score >= 2 {
            Priority::P4
        } else {
            Priority::P5
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InspectIssue {
    pub scope: IssueScope,
    pub reference: Id,
    pub severity: IssueSeverity,
    pub code: IssueCode,
    pub priority: Priority,
    pub blocked_by: Option<Id>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructureSummary {
    pub group_count: usize,
    pub field_count: usize,
    pub option_count: usize,
    pub table_column_count: usize,
    pub required_count: usize,
    pub completed_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub role: String,
    pub field_count: usize,
    pub required_count: usize,
    pub completed_count: usize,
}

pub fn structure_summary(form: &ParsedForm) -> StructureSummary {
    let mut s = StructureSummary::default();
    for fd in &form.forms {
        s.group_count += fd.groups.len();
        for g in &fd.groups {
            for entry in &g.fields {
                s.field_count += 1;
                if let Some(options) = entry.field.options() {
                    s.option_count += options.len();
                }
                if let Field::Table { column_ids, .. } = &entry.field {
                    s.table_column_count += column_ids.len();
                }
                if entry.field.is_effectively_required() {
                    s.required_count += 1;
                }
                if is_resolved(entry) {
                    s.completed_count += 1;
                }
            }
        }
    }
    s
}

pub fn progress_by_role(form: &ParsedForm) -> Vec<ProgressSummary> {
    let mut by_role: HashMap<String, ProgressSummary> = HashMap::new();
    for entry in form.fields() {
        let role = entry.field.common().role.clone();
        let p = by_role.entry(role.clone()).or_insert_with(|| ProgressSummary {
            role,
            field_count: 0,
            required_count: 0,
            completed_count: 0,
        });
        p.field_count += 1;
        if entry.field.is_effectively_required() {
            p.required_count += 1;
        }
        if is_resolved(entry) {
            p.completed_count += 1;
        }
    }
    let mut out: Vec<ProgressSummary> = by_role.into_values().collect();
    out.sort_by(|a, b| a.role.cmp(&b.role));
    out
}

/// Whether an entry is accounted for in progress tallies: answered, or
/// explicitly skipped/aborted. Unanswered is the only "missing" state.
fn is_resolved(entry: &FieldEntry) -> bool {
    entry.value.state() != FieldState::Unanswered
}

fn is_checkboxes_complete(
    options: &[OptionDef],
    mode: CheckboxMode,
    min_done: Option<u32>,
    value: &HashMap<crate::ids::OptionId, CheckboxState>,
) -> bool {
    match mode {
        CheckboxMode::All => options
            .iter()
            .all(|o| value.get(&o.id).copied().unwrap_or(CheckboxState::default_for_mode(mode)) == CheckboxState::Done),
        CheckboxMode::Any => {
            let done = options
                .iter()
                .filter(|o| value.get(&o.id).copied().unwrap_or(CheckboxState::default_for_mode(mode)) == CheckboxState::Done)
                .count() as u32;
            done >= min_done.unwrap_or(0).max(1)
        }
        CheckboxMode::Explicit => options
            .iter()
            .all(|o| value.get(&o.id).copied().unwrap_or(CheckboxState::default_for_mode(mode)) != CheckboxState::Unfilled),
    }
}

fn entry_is_complete(entry: &FieldEntry) -> bool {
    match (&entry.field, &entry.value) {
        (
            Field::Checkboxes { options, mode, min_done, .. },
            crate::model::FieldValue::Checkboxes { value, .. },
        ) => is_checkboxes_complete(options, *mode, *min_done, value),
        _ => is_resolved(entry),
    }
}

/// `inspect_issues` under `fillMode=continue`: only fields inspect flags as
/// missing or invalid are surfaced.
pub fn inspect_issues(form: &ParsedForm) -> Vec<InspectIssue> {
    inspect_issues_with(form, false)
}

/// Compute the full issue list for a form: deterministic validation
/// failures plus required/optional-missing completeness gaps, in
/// `orderIndex` order, with blocking checkpoints applied and every
/// issue's priority set from the form's total score (§4.6). When
/// `include_answered` is set (`fillMode=overwrite`, §4.7), every
/// already-answered field is also surfaced as a `RevisionCandidate` so an
/// agent may revise it.
pub fn inspect_issues_with(form: &ParsedForm, include_answered: bool) -> Vec<InspectIssue> {
    let mut raw = Vec::new();

    for id in form.order_index() {
        let Some(entry) = form.field(id) else { continue };
        for violation in validate_entry(entry) {
            raw.push((
                id.clone(),
                IssueScope::Field,
                IssueSeverity::Error,
                IssueCode::ValidationError,
                violation.message,
            ));
        }
        if !entry_is_complete(entry) {
            if entry.field.is_effectively_required() {
                raw.push((
                    id.clone(),
                    IssueScope::Field,
                    IssueSeverity::Error,
                    IssueCode::RequiredMissing,
                    format!("required field '{}' is unanswered", id),
                ));
            } else if entry.value.state() == FieldState::Unanswered {
                raw.push((
                    id.clone(),
                    IssueScope::Field,
                    IssueSeverity::Warning,
                    IssueCode::OptionalMissing,
                    format!("optional field '{}' is unanswered", id),
                ));
            }
        } else if include_answered {
            raw.push((
                id.clone(),
                IssueScope::Field,
                IssueSeverity::Warning,
                IssueCode::RevisionCandidate,
                format!("field '{}' is answered and may be revised", id),
            ));
        }
    }

    let total_score: u32 = raw.iter().map(|(_, _, _, code, _)| code.score()).sum();
    let priority = Priority::from_total_score(total_score);

    let checkpoints = blocking_checkpoints(form);

    raw.into_iter()
        .map(|(reference, scope, severity, code, message)| {
            let ref_order = order_of(form, &reference).unwrap_or(0);
            // latest checkpoint strictly before this field's position
            let blocked_by = checkpoints
                .iter()
                .filter(|(cp_id, cp_order)| cp_id != &reference && *cp_order < ref_order)
                .max_by_key(|(_, cp_order)| *cp_order)
                .map(|(cp_id, _)| cp_id.clone());
            InspectIssue { scope, reference, severity, code, priority, blocked_by, message }
        })
        .collect()
}

fn order_of(form: &ParsedForm, id: &Id) -> Option<usize> {
    form.order_index().iter().position(|x| x == id)
}

/// Checkboxes fields with `approvalMode=blocking`, `required=true`, and
/// not yet complete — each paired with its position in `orderIndex`.
fn blocking_checkpoints(form: &ParsedForm) -> Vec<(Id, usize)> {
    let mut out = Vec::new();
    for (pos, id) in form.order_index().iter().enumerate() {
        let Some(entry) = form.field(id) else { continue };
        if let Field::Checkboxes { common, approval_mode, .. } = &entry.field {
            if common.required
                && *approval_mode == crate::model::ApprovalMode::Blocking
                && !entry_is_complete(entry)
            {
                out.push((id.clone(), pos));
            }
        }
    }
    out
}

/// Role filtering (§4.6): keep only issues whose field's role is in
/// `target_roles`, plus any blocking checkpoint that gates a kept issue
/// even if the checkpoint's own role falls outside the set.
pub fn filter_by_roles(form: &ParsedForm, issues: Vec<InspectIssue>, target_roles: &HashSet<String>) -> Vec<InspectIssue> {
    let role_of = |id: &Id| form.field(id).map(|e| e.field.common().role.clone());

    let kept: Vec<InspectIssue> = issues
        .into_iter()
        .filter(|issue| match role_of(&issue.reference) {
            Some(role) => target_roles.contains(&role),
            None => true,
        })
        .collect();

    let needed_checkpoints: HashSet<Id> = kept.iter().filter_map(|i| i.blocked_by.clone()).collect();

    let mut out = kept;
    for cp in needed_checkpoints {
        if !out.iter().any(|i| i.reference == cp) {
            if let Some(entry) = form.field(&cp) {
                out.push(InspectIssue {
                    scope: IssueScope::Field,
                    reference: cp.clone(),
                    severity: IssueSeverity::Error,
                    code: IssueCode::RequiredMissing,
                    priority: Priority::P1,
                    blocked_by: None,
                    message: format!("blocking checkpoint '{}' is not yet complete", entry.field.id()),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_form;

    fn sample() -> ParsedForm {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="name" label="Name" required=true %}
{% /field %}
{% field kind="checkboxes" id="gate" label="Gate" mode="all" required=true approvalMode="blocking" %}
- [ ] a: A
{% /field %}
{% field kind="string" id="after" label="After" %}
{% /field %}
{% /group %}
{% /form %}
"#;
        parse_form(input).unwrap()
    }

    #[test]
    fn required_missing_field_is_an_issue() {
        let form = sample();
        let issues = inspect_issues(&form);
        assert!(issues.iter().any(|i| i.reference.as_str() == "name" && i.code == IssueCode::RequiredMissing));
    }

    #[test]
    fn field_after_incomplete_blocking_checkpoint_is_blocked() {
        let form = sample();
        let issues = inspect_issues(&form);
        let after = issues.iter().find(|i| i.reference.as_str() == "after");
        if let Some(after) = after {
            assert_eq!(after.blocked_by.as_ref().map(|id| id.as_str()), Some("gate"));
        }
    }

    #[test]
    fn structure_summary_counts_fields_and_required() {
        let form = sample();
        let s = structure_summary(&form);
        assert_eq!(s.field_count, 3);
        assert_eq!(s.required_count, 2);
    }

    #[test]
    fn include_answered_surfaces_revision_candidates_for_answered_fields() {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="name" label="Name" %}
```value
Ada
```
{% /field %}
{% /group %}
{% /form %}
"#;
        let form = parse_form(input).unwrap();
        assert!(inspect_issues(&form).is_empty());
        let with_answered = inspect_issues_with(&form, true);
        assert!(with_answered
            .iter()
            .any(|i| i.reference.as_str() == "name" && i.code == IssueCode::RevisionCandidate));
    }
}

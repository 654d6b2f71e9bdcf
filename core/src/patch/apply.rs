//! L5 — best-effort patch applicator (spec §4.5).
//!
//! Applies a `Patch` batch to a *working copy* of a `ParsedForm` in array
//! order. A structural problem (unknown field/option, shape that cannot be
//! coerced) rejects the patch before it touches the working copy; a
//! semantic problem (fails a `validate` check) rejects it after a trial
//! mutation, rolling back just that field. Earlier patches in the same
//! batch are never undone — this mirrors the teacher's convergence
//! executor, which applies a batch of planner actions one at a time and
//! keeps whatever already succeeded when a later one fails.

use crate::error::{PatchError, PatchErrorKind};
use crate::ids::Id;
use crate::model::{CheckboxState, Field, FieldEntry, FieldKind, FieldValue, ParsedForm, ValueMeta};
use crate::validate::{validate_entry, ViolationCode};

use super::coerce;
use super::ops::Patch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    Applied,
    Partial,
    Rejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchWarning {
    pub patch_index: usize,
    pub field_id: Id,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyResult {
    pub status: ApplyStatus,
    pub new_form: ParsedForm,
    pub applied_patches: Vec<usize>,
    pub rejected_patches: Vec<PatchError>,
    pub warnings: Vec<PatchWarning>,
}

pub fn apply_patches(form: &ParsedForm, patches: &[Patch]) -> ApplyResult {
    tracing::debug!(count = patches.len(), "applying patch batch");
    let mut working = form.clone();
    let mut applied = Vec::new();
    let mut rejected = Vec::new();
    let mut warnings = Vec::new();

    for (index, patch) in patches.iter().enumerate() {
        match apply_one(&mut working, index, patch, &mut warnings) {
            Ok(()) => applied.push(index),
            Err(err) => rejected.push(err),
        }
    }

    let status = if rejected.is_empty() {
        ApplyStatus::Applied
    } else if applied.is_empty() {
        ApplyStatus::Rejected
    } else {
        ApplyStatus::Partial
    };

    tracing::debug!(?status, applied = applied.len(), rejected = rejected.len(), "patch batch applied");
    ApplyResult { status, new_form: working, applied_patches: applied, rejected_patches: rejected, warnings }
}

fn reject(
    index: usize,
    field_id: &str,
    patch: &Patch,
    kind: PatchErrorKind,
    message: impl Into<String>,
) -> PatchError {
    PatchError {
        patch_index: index,
        field_id: field_id.to_string(),
        patch_operation: patch.operation_name().to_string(),
        kind,
        message: message.into(),
    }
}

fn apply_one(
    working: &mut ParsedForm,
    index: usize,
    patch: &Patch,
    warnings: &mut Vec<PatchWarning>,
) -> Result<(), PatchError> {
    if let Patch::AbortForm { .. } = patch {
        return Ok(());
    }

    let field_id = patch.field_id().expect("non-abort patches always name a field").clone();
    let Some(entry) = working.field_mut(&field_id) else {
        return Err(reject(index, field_id.as_str(), patch, PatchErrorKind::UnknownField, "no such field"));
    };

    let before = entry.clone();
    match mutate(entry, index, patch, warnings) {
        Ok(()) => {
            let violations = validate_entry(entry);
            if let Some(v) = violations.into_iter().find(|v| is_hard_violation(v.code)) {
                *entry = before;
                Err(reject(index, field_id.as_str(), patch, PatchErrorKind::ConstraintViolation, v.message))
            } else {
                Ok(())
            }
        }
        Err(err) => {
            *entry = before;
            Err(err)
        }
    }
}

/// Whether a validation violation is a deterministic invariant the
/// applicator must reject-and-roll-back (§4.5 step 3), as opposed to a
/// completion check (§4.4) — progress not yet reached, not a malformed
/// value. Completion checks are left for `inspect_issues` so an agent can
/// approach a minimum incrementally across turns without every
/// intermediate patch bouncing.
fn is_hard_violation(code: ViolationCode) -> bool {
    !matches!(
        code,
        ViolationCode::MinDone | ViolationCode::MinItems | ViolationCode::MinSelections | ViolationCode::MinRows
    )
}

fn mutate(
    entry: &mut FieldEntry,
    index: usize,
    patch: &Patch,
    warnings: &mut Vec<PatchWarning>,
) -> Result<(), PatchError> {
    let field_id = entry.field.id().clone();
    let mut warn = |message: String| {
        warnings.push(PatchWarning { patch_index: index, field_id: field_id.clone(), message });
    };

    let kind = entry.field.kind();

    match patch {
        Patch::SetString { value, .. } => match kind {
            FieldKind::String | FieldKind::Url | FieldKind::Date => {
                set_scalar_string(&mut entry.value, value.clone());
                Ok(())
            }
            FieldKind::StringList => {
                let FieldValue::StringList { meta, value: list } = &mut entry.value else { unreachable!() };
                match value {
                    Some(s) => {
                        warn(format!("coerced string '{}' into a one-item string_list", s));
                        *list = coerce::string_to_list(s);
                        *meta = ValueMeta::answered();
                    }
                    None => {
                        list.clear();
                        *meta = ValueMeta::unanswered();
                    }
                }
                Ok(())
            }
            FieldKind::UrlList => {
                let FieldValue::UrlList { meta, value: list } = &mut entry.value else { unreachable!() };
                match value {
                    Some(s) => match coerce::string_to_url_list(s) {
                        Some(items) => {
                            warn(format!("coerced string '{}' into a one-item url_list", s));
                            *list = items;
                            *meta = ValueMeta::answered();
                            Ok(())
                        }
                        None => Err(kind_mismatch(index, patch, &field_id, "url_list", "non-url string")),
                    },
                    None => {
                        list.clear();
                        *meta = ValueMeta::unanswered();
                        Ok(())
                    }
                }
            }
            other => Err(kind_mismatch(index, patch, &field_id, "string|url|date", other.as_str())),
        },

        Patch::SetNumber { value, .. } => match kind {
            FieldKind::Number => {
                let FieldValue::Number { meta, value: v } = &mut entry.value else { unreachable!() };
                *v = *value;
                *meta = if value.is_some() { ValueMeta::answered() } else { ValueMeta::unanswered() };
                Ok(())
            }
            FieldKind::Year => {
                let FieldValue::Year { meta, value: v } = &mut entry.value else { unreachable!() };
                match value {
                    Some(n) if n.fract() == 0.0 => {
                        *v = Some(*n as i32);
                        *meta = ValueMeta::answered();
                        Ok(())
                    }
                    Some(n) => Err(bad_shape(index, patch, &field_id, format!("{} is not a whole year", n))),
                    None => {
                        *v = None;
                        *meta = ValueMeta::unanswered();
                        Ok(())
                    }
                }
            }
            other => Err(kind_mismatch(index, patch, &field_id, "number|year", other.as_str())),
        },

        Patch::SetStringList { value, .. } => match &mut entry.value {
            FieldValue::StringList { meta, value: list } => {
                *list = value.clone();
                *meta = if list.is_empty() { ValueMeta::unanswered() } else { ValueMeta::answered() };
                Ok(())
            }
            _ => Err(kind_mismatch(index, patch, &field_id, "string_list", entry.field.kind().as_str())),
        },

        Patch::SetUrlList { value, .. } => match &mut entry.value {
            FieldValue::UrlList { meta, value: list } => {
                *list = value.clone();
                *meta = if list.is_empty() { ValueMeta::unanswered() } else { ValueMeta::answered() };
                Ok(())
            }
            _ => Err(kind_mismatch(index, patch, &field_id, "url_list", entry.field.kind().as_str())),
        },

        Patch::SetSingleSelect { value, .. } => {
            let options = entry.field.options().map(|o| o.to_vec()).unwrap_or_default();
            match &mut entry.value {
                FieldValue::SingleSelect { meta, value: v } => {
                    if let Some(opt) = value {
                        if !options.iter().any(|o| &o.id == opt) {
                            return Err(unknown_option(index, patch, &field_id, opt.as_str()));
                        }
                    }
                    *v = value.clone();
                    *meta = if value.is_some() { ValueMeta::answered() } else { ValueMeta::unanswered() };
                    Ok(())
                }
                FieldValue::MultiSelect { meta, value: list } => {
                    let Some(opt) = value else {
                        list.clear();
                        *meta = ValueMeta::unanswered();
                        return Ok(());
                    };
                    if !options.iter().any(|o| &o.id == opt) {
                        return Err(unknown_option(index, patch, &field_id, opt.as_str()));
                    }
                    warn(format!("coerced single option '{}' into a one-item multi_select", opt));
                    *list = coerce::option_to_multi(opt.clone());
                    *meta = ValueMeta::answered();
                    Ok(())
                }
                _ => Err(kind_mismatch(index, patch, &field_id, "single_select", entry.field.kind().as_str())),
            }
        }

        Patch::SetMultiSelect { value, .. } => {
            let options = entry.field.options().map(|o| o.to_vec()).unwrap_or_default();
            for opt in value {
                if !options.iter().any(|o| &o.id == opt) {
                    return Err(unknown_option(index, patch, &field_id, opt.as_str()));
                }
            }
            match kind {
                FieldKind::MultiSelect => {
                    let FieldValue::MultiSelect { meta, value: list } = &mut entry.value else { unreachable!() };
                    *list = value.clone();
                    *meta = if list.is_empty() { ValueMeta::unanswered() } else { ValueMeta::answered() };
                    Ok(())
                }
                FieldKind::Checkboxes => {
                    let Field::Checkboxes { mode, .. } = &entry.field else { unreachable!() };
                    let mode = *mode;
                    let FieldValue::Checkboxes { meta, value: map } = &mut entry.value else { unreachable!() };
                    warn(format!("coerced option list into a checkboxes map ({} done)", value.len()));
                    let coerced = coerce::options_to_checkboxes_map(value, mode);
                    for (k, v) in coerced {
                        map.insert(k, v);
                    }
                    *meta = if map.is_empty() { ValueMeta::unanswered() } else { ValueMeta::answered() };
                    Ok(())
                }
                other => Err(kind_mismatch(index, patch, &field_id, "multi_select", other.as_str())),
            }
        }

        Patch::SetCheckboxes { value, .. } => {
            let (options, mode) = match &entry.field {
                Field::Checkboxes { options, mode, .. } => (options.clone(), *mode),
                other => return Err(kind_mismatch(index, patch, &field_id, "checkboxes", other.kind().as_str())),
            };
            for opt in value.keys() {
                if !options.iter().any(|o| &o.id == opt) {
                    return Err(unknown_option(index, patch, &field_id, opt.as_str()));
                }
            }
            for state in value.values() {
                if !state.valid_for_mode(mode) {
                    return Err(bad_shape(index, patch, &field_id, format!("state '{}' is not valid for mode", state.as_str())));
                }
            }
            if let FieldValue::Checkboxes { meta, value: map } = &mut entry.value {
                for (k, v) in value {
                    map.insert(k.clone(), *v);
                }
                *meta = if map.is_empty() { ValueMeta::unanswered() } else { ValueMeta::answered() };
            }
            Ok(())
        }

        Patch::SetTable { value, .. } => {
            let column_ids: Vec<String> = match &entry.field {
                Field::Table { column_ids, .. } => column_ids.iter().map(|c| c.to_string()).collect(),
                other => return Err(kind_mismatch(index, patch, &field_id, "table", other.kind().as_str())),
            };
            for row in value {
                for key in row.keys() {
                    if !column_ids.contains(key) {
                        return Err(bad_shape(index, patch, &field_id, format!("unknown column '{}'", key)));
                    }
                }
            }
            if let FieldValue::Table { meta, rows } = &mut entry.value {
                *rows = value.clone();
                *meta = if rows.is_empty() { ValueMeta::unanswered() } else { ValueMeta::answered() };
            }
            Ok(())
        }

        Patch::ClearField { .. } => {
            entry.value = FieldValue::empty_for(&entry.field);
            Ok(())
        }

        Patch::SkipField { reason, .. } => {
            entry.value = FieldValue::empty_for(&entry.field);
            *entry.value.meta_mut() = ValueMeta::skipped(Some(reason.clone()));
            Ok(())
        }

        Patch::AbortForm { .. } => unreachable!("handled by caller"),
    }
}

fn set_scalar_string(value: &mut FieldValue, new_value: Option<String>) {
    match value {
        FieldValue::String { meta, value } | FieldValue::Url { meta, value } | FieldValue::Date { meta, value } => {
            *meta = if new_value.is_some() { ValueMeta::answered() } else { ValueMeta::unanswered() };
            *value = new_value;
        }
        _ => unreachable!("caller already matched a scalar-string kind"),
    }
}

fn kind_mismatch(index: usize, patch: &Patch, field_id: &Id, expected: &str, received: &str) -> PatchError {
    reject(
        index,
        field_id.as_str(),
        patch,
        PatchErrorKind::KindMismatch { expected: expected.to_string(), received: received.to_string() },
        format!("expected a {} field, found {}", expected, received),
    )
}

fn unknown_option(index: usize, patch: &Patch, field_id: &Id, option: &str) -> PatchError {
    reject(index, field_id.as_str(), patch, PatchErrorKind::UnknownOption, format!("no such option '{}'", option))
}

fn bad_shape(index: usize, patch: &Patch, field_id: &Id, message: impl Into<String>) -> PatchError {
    reject(index, field_id.as_str(), patch, PatchErrorKind::BadShape, message)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::parse::parse_form;

    fn sample() -> ParsedForm {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="name" label="Name" %}
{% /field %}
{% field kind="checkboxes" id="steps" label="Steps" mode="all" minDone=2 %}
- [ ] a: A
- [ ] b: B
- [ ] c: C
{% /field %}
{% /group %}
{% /form %}
"#;
        parse_form(input).unwrap()
    }

    #[test]
    fn applies_simple_set_string() {
        let form = sample();
        let id = Id::new("name").unwrap();
        let patches = vec![Patch::SetString { field_id: id.clone(), value: Some("Ada".into()) }];
        let result = apply_patches(&form, &patches);
        assert_eq!(result.status, ApplyStatus::Applied);
        assert_eq!(result.applied_patches, vec![0]);
        let entry = result.new_form.field(&id).unwrap();
        assert_eq!(entry.value, FieldValue::String { meta: ValueMeta::answered(), value: Some("Ada".into()) });
    }

    #[test]
    fn rejects_unknown_field_without_touching_others() {
        let form = sample();
        let bogus = Id::new("nope").unwrap();
        let name = Id::new("name").unwrap();
        let patches = vec![
            Patch::SetString { field_id: bogus, value: Some("x".into()) },
            Patch::SetString { field_id: name.clone(), value: Some("Ada".into()) },
        ];
        let result = apply_patches(&form, &patches);
        assert_eq!(result.status, ApplyStatus::Partial);
        assert_eq!(result.applied_patches, vec![1]);
        assert_eq!(result.rejected_patches.len(), 1);
        assert_eq!(result.rejected_patches[0].kind, PatchErrorKind::UnknownField);
    }

    #[test]
    fn checkboxes_min_done_allows_incremental_progress() {
        let form = sample();
        let id = Id::new("steps").unwrap();
        let mut map = HashMap::new();
        map.insert(crate::ids::OptionId::new("a").unwrap(), CheckboxState::Done);
        let patches = vec![Patch::SetCheckboxes { field_id: id.clone(), value: map }];
        let result = apply_patches(&form, &patches);
        assert_eq!(result.status, ApplyStatus::Applied);
        let entry = result.new_form.field(&id).unwrap();
        let FieldValue::Checkboxes { value, .. } = &entry.value else { panic!("expected checkboxes") };
        assert_eq!(value.get(&crate::ids::OptionId::new("a").unwrap()), Some(&CheckboxState::Done));
    }

    #[test]
    fn pattern_violation_is_still_rejected() {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="code" label="Code" pattern="^[A-Z]+$" %}
{% /field %}
{% /group %}
{% /form %}
"#;
        let form = parse_form(input).unwrap();
        let id = Id::new("code").unwrap();
        let patches = vec![Patch::SetString { field_id: id, value: Some("lowercase".into()) }];
        let result = apply_patches(&form, &patches);
        assert_eq!(result.status, ApplyStatus::Rejected);
        assert_eq!(result.rejected_patches[0].kind, PatchErrorKind::ConstraintViolation);
    }
}

//! L4 — semantic validation (spec §4.5).
//!
//! Pure, deterministic checks over an already-typed [`ParsedForm`]: pattern,
//! length/range, selection-count, and checkbox-mode-completion constraints
//! that [`crate::parse`] deliberately leaves unchecked (it only does the
//! type coercion a typed field's storage demands). [`crate::patch::apply`]
//! rejects a patch whose resulting value fails one of these; [`crate::inspect`]
//! surfaces the remainder as `InspectIssue`s.
//!
//! Skipped and aborted fields are exempt from every check here — a skip is
//! an explicit "this does not apply", not a malformed answer.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::ids::Id;
use crate::model::{ColumnType, Field, FieldEntry, FieldGroup, FieldState, FieldValue, ParsedForm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationCode {
    Pattern,
    MinLength,
    MaxLength,
    Min,
    Max,
    MinItems,
    MaxItems,
    UniqueItems,
    ItemPattern,
    MinSelections,
    MaxSelections,
    MinDone,
    MinRows,
    MaxRows,
    MalformedUrl,
    MalformedDate,
    MalformedColumnValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub field_id: Id,
    pub code: ViolationCode,
    pub message: String,
}

fn violation(field_id: &Id, code: ViolationCode, message: impl Into<String>) -> Violation {
    Violation { field_id: field_id.clone(), code, message: message.into() }
}

/// Run every check over every field in the document.
pub fn validate_form(form: &ParsedForm) -> Vec<Violation> {
    form.fields().flat_map(validate_entry).collect()
}

/// A named, pluggable validator a group may declare via its `validators`
/// attribute (§4.4). The engine treats a hook as opaque: given the group
/// that declared it and the whole form for cross-field context, it
/// returns whatever violations it finds. Hooks must be pure and
/// side-effect-free.
pub trait ValidatorHook {
    fn check(&self, scope: &FieldGroup, form: &ParsedForm) -> Vec<Violation>;
}

impl<F> ValidatorHook for F
where
    F: Fn(&FieldGroup, &ParsedForm) -> Vec<Violation>,
{
    fn check(&self, scope: &FieldGroup, form: &ParsedForm) -> Vec<Violation> {
        self(scope, form)
    }
}

/// Host-side table mapping a hook name to its implementation. A group
/// may name a hook no host has registered; that name is skipped rather
/// than treated as an error, since a form can circulate among hosts that
/// register different subsets of hooks.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Box<dyn ValidatorHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        HookRegistry::default()
    }

    pub fn register(&mut self, name: impl Into<String>, hook: impl ValidatorHook + 'static) {
        self.hooks.insert(name.into(), Box::new(hook));
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("HookRegistry").field("names", &names).finish()
    }
}

/// [`validate_form`] plus every group's declared hook validators,
/// assembled into one flat list (§4.4).
pub fn validate_form_with_hooks(form: &ParsedForm, hooks: &HookRegistry) -> Vec<Violation> {
    let mut out = validate_form(form);
    for fd in &form.forms {
        for group in &fd.groups {
            for name in &group.hook_names {
                if let Some(hook) = hooks.hooks.get(name) {
                    out.extend(hook.check(group, form));
                }
            }
        }
    }
    out
}

/// Run every check for a single field. Exported separately so
/// `patch::apply` can re-check just the field a patch touched.
pub fn validate_entry(entry: &FieldEntry) -> Vec<Violation> {
    if matches!(entry.value.state(), FieldState::Skipped | FieldState::Aborted | FieldState::Unanswered) {
        return Vec::new();
    }
    let id = entry.field.id().clone();
    match (&entry.field, &entry.value) {
        (Field::String { min_length, max_length, pattern, .. }, FieldValue::String { value: Some(v), .. }) => {
            check_string_shape(&id, v, *min_length, *max_length, pattern.as_deref())
        }
        (Field::Number { min, max, integer, .. }, FieldValue::Number { value: Some(v), .. }) => {
            check_number(&id, *v, *min, *max, *integer)
        }
        (Field::Url { .. }, FieldValue::Url { value: Some(v), .. }) => check_url(&id, v),
        (Field::Date { min, max, .. }, FieldValue::Date { value: Some(v), .. }) => {
            check_date(&id, v, min.as_deref(), max.as_deref())
        }
        (Field::Year { min, max, .. }, FieldValue::Year { value: Some(v), .. }) => check_year(&id, *v, *min, *max),
        (
            Field::StringList { min_items, max_items, unique_items, item_pattern, .. },
            FieldValue::StringList { value, .. },
        ) => check_list(&id, value, *min_items, *max_items, *unique_items, item_pattern.as_deref(), false),
        (Field::UrlList { min_items, max_items, unique_items, .. }, FieldValue::UrlList { value, .. }) => {
            check_list(&id, value, *min_items, *max_items, *unique_items, None, true)
        }
        (Field::MultiSelect { min_selections, max_selections, .. }, FieldValue::MultiSelect { value, .. }) => {
            check_selection_count(&id, value.len(), *min_selections, *max_selections)
        }
        (Field::Checkboxes { mode, min_done, .. }, FieldValue::Checkboxes { value, .. }) => {
            check_checkboxes(&id, value, *mode, *min_done)
        }
        (Field::Table { column_types, min_rows, max_rows, column_ids, .. }, FieldValue::Table { rows, .. }) => {
            check_table(&id, rows, column_ids, column_types, *min_rows, *max_rows)
        }
        _ => Vec::new(),
    }
}

fn check_string_shape(
    id: &Id,
    value: &str,
    min_length: Option<u32>,
    max_length: Option<u32>,
    pattern: Option<&str>,
) -> Vec<Violation> {
    let mut out = Vec::new();
    let len = value.chars().count() as u32;
    if let Some(min) = min_length {
        if len < min {
            out.push(violation(id, ViolationCode::MinLength, format!("length {} is below minLength {}", len, min)));
        }
    }
    if let Some(max) = max_length {
        if len > max {
            out.push(violation(id, ViolationCode::MaxLength, format!("length {} exceeds maxLength {}", len, max)));
        }
    }
    if let Some(pat) = pattern {
        match compile_pattern(pat) {
            Some(re) if !re.is_match(value) => {
                out.push(violation(id, ViolationCode::Pattern, format!("'{}' does not match pattern '{}'", value, pat)))
            }
            _ => {}
        }
    }
    out
}

fn check_number(id: &Id, value: f64, min: Option<f64>, max: Option<f64>, integer: bool) -> Vec<Violation> {
    let mut out = Vec::new();
    if let Some(min) = min {
        if value < min {
            out.push(violation(id, ViolationCode::Min, format!("{} is below min {}", value, min)));
        }
    }
    if let Some(max) = max {
        if value > max {
            out.push(violation(id, ViolationCode::Max, format!("{} exceeds max {}", value, max)));
        }
    }
    if integer && value.fract() != 0.0 {
        out.push(violation(id, ViolationCode::Pattern, format!("{} is not an integer", value)));
    }
    out
}

fn check_url(id: &Id, value: &str) -> Vec<Violation> {
    if is_url_shaped(value) {
        Vec::new()
    } else {
        vec![violation(id, ViolationCode::MalformedUrl, format!("'{}' is not a well-formed URL", value))]
    }
}

pub(crate) fn is_url_shaped(value: &str) -> bool {
    match value.split_once("://") {
        Some((scheme, rest)) => !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') && !rest.is_empty(),
        None => false,
    }
}

fn date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap())
}

fn check_date(id: &Id, value: &str, min: Option<&str>, max: Option<&str>) -> Vec<Violation> {
    let mut out = Vec::new();
    if !date_pattern().is_match(value) {
        out.push(violation(id, ViolationCode::MalformedDate, format!("'{}' is not an ISO-8601 date (YYYY-MM-DD)", value)));
        return out;
    }
    if let Some(min) = min {
        if value < min {
            out.push(violation(id, ViolationCode::Min, format!("{} is before min {}", value, min)));
        }
    }
    if let Some(max) = max {
        if value > max {
            out.push(violation(id, ViolationCode::Max, format!("{} is after max {}", value, max)));
        }
    }
    out
}

fn check_year(id: &Id, value: i32, min: Option<i32>, max: Option<i32>) -> Vec<Violation> {
    let mut out = Vec::new();
    let lower = min.unwrap_or(crate::defaults::YEAR_MIN);
    let upper = max.unwrap_or(crate::defaults::YEAR_MAX);
    if value < lower {
        out.push(violation(id, ViolationCode::Min, format!("{} is below min {}", value, lower)));
    }
    if value > upper {
        out.push(violation(id, ViolationCode::Max, format!("{} exceeds max {}", value, upper)));
    }
    out
}

fn check_list(
    id: &Id,
    items: &[String],
    min_items: Option<u32>,
    max_items: Option<u32>,
    unique_items: bool,
    item_pattern: Option<&str>,
    as_urls: bool,
) -> Vec<Violation> {
    let mut out = Vec::new();
    let len = items.len() as u32;
    if let Some(min) = min_items {
        if len < min {
            out.push(violation(id, ViolationCode::MinItems, format!("{} item(s) is below minItems {}", len, min)));
        }
    }
    if let Some(max) = max_items {
        if len > max {
            out.push(violation(id, ViolationCode::MaxItems, format!("{} item(s) exceeds maxItems {}", len, max)));
        }
    }
    if unique_items {
        let mut seen = std::collections::HashSet::new();
        for item in items {
            if !seen.insert(item) {
                out.push(violation(id, ViolationCode::UniqueItems, format!("duplicate item '{}'", item)));
            }
        }
    }
    if let Some(pat) = item_pattern {
        if let Some(re) = compile_pattern(pat) {
            for item in items {
                if !re.is_match(item) {
                    out.push(violation(id, ViolationCode::ItemPattern, format!("'{}' does not match itemPattern '{}'", item, pat)));
                }
            }
        }
    }
    if as_urls {
        for item in items {
            if !is_url_shaped(item) {
                out.push(violation(id, ViolationCode::MalformedUrl, format!("'{}' is not a well-formed URL", item)));
            }
        }
    }
    out
}

fn check_selection_count(id: &Id, count: usize, min: Option<u32>, max: Option<u32>) -> Vec<Violation> {
    let mut out = Vec::new();
    if let Some(min) = min {
        if (count as u32) < min {
            out.push(violation(id, ViolationCode::MinSelections, format!("{} selection(s) is below minSelections {}", count, min)));
        }
    }
    if let Some(max) = max {
        if (count as u32) > max {
            out.push(violation(id, ViolationCode::MaxSelections, format!("{} selection(s) exceeds maxSelections {}", count, max)));
        }
    }
    out
}

fn check_checkboxes(
    id: &Id,
    value: &std::collections::HashMap<crate::ids::OptionId, crate::model::CheckboxState>,
    mode: crate::model::CheckboxMode,
    min_done: Option<u32>,
) -> Vec<Violation> {
    let Some(min) = min_done else { return Vec::new() };
    let done = value.values().filter(|s| **s == crate::model::CheckboxState::done_for_mode(mode)).count() as u32;
    if done < min {
        vec![violation(id, ViolationCode::MinDone, format!("{} done out of minDone {}", done, min))]
    } else {
        Vec::new()
    }
}

fn check_table(
    id: &Id,
    rows: &[std::collections::HashMap<String, String>],
    column_ids: &[Id],
    column_types: &[ColumnType],
    min_rows: Option<u32>,
    max_rows: Option<u32>,
) -> Vec<Violation> {
    let mut out = Vec::new();
    let len = rows.len() as u32;
    if let Some(min) = min_rows {
        if len < min {
            out.push(violation(id, ViolationCode::MinRows, format!("{} row(s) is below minRows {}", len, min)));
        }
    }
    if let Some(max) = max_rows {
        if len > max {
            out.push(violation(id, ViolationCode::MaxRows, format!("{} row(s) exceeds maxRows {}", len, max)));
        }
    }
    for (row_idx, row) in rows.iter().enumerate() {
        for (cid, ctype) in column_ids.iter().zip(column_types.iter()) {
            let Some(cell) = row.get(cid.as_str()) else { continue };
            if cell.is_empty() {
                continue;
            }
            let ok = match ctype {
                ColumnType::String => true,
                ColumnType::Number => cell.parse::<f64>().is_ok(),
                ColumnType::Url => is_url_shaped(cell),
                ColumnType::Date => date_pattern().is_match(cell),
                ColumnType::Year => cell.parse::<i32>().is_ok(),
            };
            if !ok {
                out.push(violation(
                    id,
                    ViolationCode::MalformedColumnValue,
                    format!("row {} column '{}': '{}' is not a valid {}", row_idx, cid, cell, ctype.as_str()),
                ));
            }
        }
    }
    out
}

fn compile_pattern(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_form;

    #[test]
    fn string_length_and_pattern_checks() {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="code" label="Code" minLength=3 maxLength=5 pattern="^[A-Z]+$" %}
```value
ab
```
{% /field %}
{% /group %}
{% /form %}
"#;
        let form = parse_form(input).unwrap();
        let violations = validate_form(&form);
        assert!(violations.iter().any(|v| v.code == ViolationCode::MinLength));
        assert!(violations.iter().any(|v| v.code == ViolationCode::Pattern));
    }

    #[test]
    fn number_range_check() {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="number" id="age" label="Age" min=0 max=120 %}
```value
200
```
{% /field %}
{% /group %}
{% /form %}
"#;
        let form = parse_form(input).unwrap();
        let violations = validate_form(&form);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ViolationCode::Max);
    }

    #[test]
    fn skipped_field_is_exempt() {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="number" id="age" label="Age" min=0 max=120 %}
```value
%SKIP%: not applicable
```
{% /field %}
{% /group %}
{% /form %}
"#;
        let form = parse_form(input).unwrap();
        assert!(validate_form(&form).is_empty());
    }

    #[test]
    fn checkboxes_min_done() {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="checkboxes" id="steps" label="Steps" minDone=2 %}
- [x] a: A
- [ ] b: B
{% /field %}
{% /group %}
{% /form %}
"#;
        let form = parse_form(input).unwrap();
        let violations = validate_form(&form);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ViolationCode::MinDone);
    }

    fn hook_sample() -> ParsedForm {
        let input = r#"{% form id="main" %}
{% group id="g" validators="no_placeholders" %}
{% field kind="string" id="name" label="Name" %}
```value
TBD
```
{% /field %}
{% /group %}
{% /form %}
"#;
        parse_form(input).unwrap()
    }

    #[test]
    fn registered_hook_contributes_violations() {
        let form = hook_sample();
        let mut hooks = HookRegistry::new();
        hooks.register("no_placeholders", |scope: &FieldGroup, _form: &ParsedForm| {
            scope
                .fields
                .iter()
                .filter(|e| matches!(&e.value, FieldValue::String { value: Some(v), .. } if v == "TBD"))
                .map(|e| violation(e.field.id(), ViolationCode::Pattern, "placeholder value left unfilled"))
                .collect()
        });
        let violations = validate_form_with_hooks(&form, &hooks);
        assert!(violations.iter().any(|v| v.message.contains("placeholder")));
    }

    #[test]
    fn unregistered_hook_name_is_skipped() {
        let form = hook_sample();
        let hooks = HookRegistry::new();
        let violations = validate_form_with_hooks(&form, &hooks);
        assert!(violations.is_empty());
    }
}

//! L8 — external value coercion (spec §4.8).
//!
//! Turns a loosely-typed `InputContext` (the shape an LLM tool-call or a
//! CLI `--set` flag naturally produces — JSON scalars, arrays, objects)
//! into the engine's closed `Patch` vocabulary, applying the same
//! normalization table the applicator uses for patch-level shape
//! mismatches (`crate::patch::coerce`). Unlike the applicator, there is no
//! working copy to roll back: a raw value either coerces or it doesn't,
//! and a `CoerceError` is reported per field rather than per patch index.

use std::collections::HashMap;

use serde_json::Value as RawValue;

use crate::error::{CoerceError, CoerceErrorKind};
use crate::ids::{Id, OptionId};
use crate::model::{Field, ParsedForm};
use crate::patch::coerce as shape;
use crate::patch::Patch;

pub type InputContext = HashMap<String, RawValue>;

/// Coerce every entry of `input` into a `Patch` against `form`'s current
/// field definitions. Entries that fail are reported as `CoerceError`s
/// rather than aborting the whole batch — callers decide whether to
/// surface or discard them (spec §4.8).
pub fn coerce_input(form: &ParsedForm, input: &InputContext) -> (Vec<Patch>, Vec<CoerceError>) {
    let mut patches = Vec::new();
    let mut errors = Vec::new();

    for (field_id_str, raw) in input {
        match coerce_one(form, field_id_str, raw) {
            Ok(patch) => patches.push(patch),
            Err(err) => errors.push(err),
        }
    }

    (patches, errors)
}

fn type_name(raw: &RawValue) -> &'static str {
    match raw {
        RawValue::Null => "null",
        RawValue::Bool(_) => "boolean",
        RawValue::Number(_) => "number",
        RawValue::String(_) => "string",
        RawValue::Array(_) => "array",
        RawValue::Object(_) => "object",
    }
}

fn impossible(field_id: &str, raw: &RawValue, to: &str) -> CoerceError {
    CoerceError {
        field_id: field_id.to_string(),
        kind: CoerceErrorKind::Impossible { from: type_name(raw).to_string(), to: to.to_string() },
    }
}

fn coerce_one(form: &ParsedForm, field_id_str: &str, raw: &RawValue) -> Result<Patch, CoerceError> {
    let Ok(field_id) = Id::new(field_id_str) else {
        return Err(CoerceError { field_id: field_id_str.to_string(), kind: CoerceErrorKind::UnknownField });
    };
    let Some(entry) = form.field(&field_id) else {
        return Err(CoerceError { field_id: field_id_str.to_string(), kind: CoerceErrorKind::UnknownField });
    };

    match &entry.field {
        Field::String { .. } | Field::Url { .. } | Field::Date { .. } => match raw {
            RawValue::Null => Ok(Patch::SetString { field_id, value: None }),
            RawValue::String(s) => Ok(Patch::SetString { field_id, value: Some(s.clone()) }),
            other => Err(impossible(field_id_str, other, entry.field.kind().as_str())),
        },

        Field::Number { .. } => match raw {
            RawValue::Null => Ok(Patch::SetNumber { field_id, value: None }),
            RawValue::Number(n) => n
                .as_f64()
                .map(|v| Patch::SetNumber { field_id: field_id.clone(), value: Some(v) })
                .ok_or_else(|| impossible(field_id_str, raw, "number")),
            other => Err(impossible(field_id_str, other, "number")),
        },

        Field::Year { .. } => match raw {
            RawValue::Null => Ok(Patch::SetNumber { field_id, value: None }),
            RawValue::Number(n) => n
                .as_f64()
                .map(|v| Patch::SetNumber { field_id: field_id.clone(), value: Some(v) })
                .ok_or_else(|| impossible(field_id_str, raw, "year")),
            other => Err(impossible(field_id_str, other, "year")),
        },

        Field::StringList { .. } => match raw {
            RawValue::Array(items) => strings_of(items)
                .map(|value| Patch::SetStringList { field_id: field_id.clone(), value })
                .ok_or_else(|| impossible(field_id_str, raw, "string_list")),
            RawValue::String(s) => Ok(Patch::SetStringList { field_id, value: shape::string_to_list(s) }),
            other => Err(impossible(field_id_str, other, "string_list")),
        },

        Field::UrlList { .. } => match raw {
            RawValue::Array(items) => strings_of(items)
                .map(|value| Patch::SetUrlList { field_id: field_id.clone(), value })
                .ok_or_else(|| impossible(field_id_str, raw, "url_list")),
            RawValue::String(s) => shape::string_to_url_list(s)
                .map(|value| Patch::SetUrlList { field_id: field_id.clone(), value })
                .ok_or_else(|| impossible(field_id_str, raw, "url_list")),
            other => Err(impossible(field_id_str, other, "url_list")),
        },

        Field::SingleSelect { .. } => match raw {
            RawValue::Null => Ok(Patch::SetSingleSelect { field_id, value: None }),
            RawValue::String(s) => option_id(s)
                .map(|o| Patch::SetSingleSelect { field_id: field_id.clone(), value: Some(o) })
                .ok_or_else(|| impossible(field_id_str, raw, "single_select")),
            other => Err(impossible(field_id_str, other, "single_select")),
        },

        Field::MultiSelect { .. } => match raw {
            RawValue::Array(items) => option_ids(items)
                .map(|value| Patch::SetMultiSelect { field_id: field_id.clone(), value })
                .ok_or_else(|| impossible(field_id_str, raw, "multi_select")),
            RawValue::String(s) => option_id(s)
                .map(|o| Patch::SetMultiSelect { field_id: field_id.clone(), value: shape::option_to_multi(o) })
                .ok_or_else(|| impossible(field_id_str, raw, "multi_select")),
            other => Err(impossible(field_id_str, other, "multi_select")),
        },

        Field::Checkboxes { options, mode, .. } => match raw {
            RawValue::Object(map) => {
                let mut value = HashMap::new();
                for (k, v) in map {
                    let (Some(opt), Some(flag)) = (option_id(k), v.as_bool()) else {
                        return Err(impossible(field_id_str, raw, "checkboxes"));
                    };
                    value.insert(opt, shape::bool_to_checkbox_state(flag, *mode));
                }
                Ok(Patch::SetCheckboxes { field_id, value })
            }
            RawValue::Array(items) => option_ids(items)
                .map(|opts| Patch::SetCheckboxes {
                    field_id: field_id.clone(),
                    value: shape::options_to_checkboxes_map(&opts, *mode),
                })
                .ok_or_else(|| impossible(field_id_str, raw, "checkboxes")),
            RawValue::Bool(flag) if options.len() == 1 => {
                let mut value = HashMap::new();
                value.insert(options[0].id.clone(), shape::bool_to_checkbox_state(*flag, *mode));
                Ok(Patch::SetCheckboxes { field_id, value })
            }
            other => Err(impossible(field_id_str, other, "checkboxes")),
        },

        Field::Table { .. } => match raw {
            RawValue::Array(items) => {
                let mut rows = Vec::new();
                for item in items {
                    let RawValue::Object(map) = item else {
                        return Err(impossible(field_id_str, raw, "table"));
                    };
                    let row = map.iter().map(|(k, v)| (k.clone(), scalar_to_string(v))).collect();
                    rows.push(row);
                }
                Ok(Patch::SetTable { field_id, value: rows })
            }
            other => Err(impossible(field_id_str, other, "table")),
        },
    }
}

fn strings_of(items: &[RawValue]) -> Option<Vec<String>> {
    items.iter().map(|v| v.as_str().map(str::to_string)).collect()
}

fn option_id(s: &str) -> Option<OptionId> {
    OptionId::new(s).ok()
}

fn option_ids(items: &[RawValue]) -> Option<Vec<OptionId>> {
    items.iter().map(|v| v.as_str().and_then(option_id)).collect()
}

fn scalar_to_string(v: &RawValue) -> String {
    match v {
        RawValue::String(s) => s.clone(),
        RawValue::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_form;
    use serde_json::json;

    fn sample() -> ParsedForm {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="name" label="Name" %}
{% /field %}
{% field kind="string_list" id="tags" label="Tags" %}
{% /field %}
{% /group %}
{% /form %}
"#;
        parse_form(input).unwrap()
    }

    #[test]
    fn coerces_string_value() {
        let form = sample();
        let mut ctx = InputContext::new();
        ctx.insert("name".into(), json!("Ada"));
        let (patches, errors) = coerce_input(&form, &ctx);
        assert!(errors.is_empty());
        assert_eq!(patches, vec![Patch::SetString { field_id: Id::new("name").unwrap(), value: Some("Ada".into()) }]);
    }

    #[test]
    fn promotes_single_string_into_string_list() {
        let form = sample();
        let mut ctx = InputContext::new();
        ctx.insert("tags".into(), json!("solo"));
        let (patches, errors) = coerce_input(&form, &ctx);
        assert!(errors.is_empty());
        assert_eq!(
            patches,
            vec![Patch::SetStringList { field_id: Id::new("tags").unwrap(), value: vec!["solo".to_string()] }]
        );
    }

    #[test]
    fn unknown_field_is_reported() {
        let form = sample();
        let mut ctx = InputContext::new();
        ctx.insert("nope".into(), json!("x"));
        let (patches, errors) = coerce_input(&form, &ctx);
        assert!(patches.is_empty());
        assert_eq!(errors[0].kind, CoerceErrorKind::UnknownField);
    }
}

//! JSON Schema projection (spec §4.9): one property per field, plus a
//! `x-markform` extension carrying metadata that has no standard JSON
//! Schema equivalent (role, kind, checkbox mode, blocking approval, ...).

use serde_json::{json, Value};

use crate::model::{ColumnType, Field, ParsedForm};

pub fn form_schema(form: &ParsedForm) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for entry in form.fields() {
        let id = entry.field.id().to_string();
        properties.insert(id.clone(), field_schema(&entry.field));
        if entry.field.is_effectively_required() {
            required.push(Value::String(id));
        }
    }

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "title": form.metadata.title,
        "properties": Value::Object(properties),
        "required": required,
        "x-markform": {
            "specVersion": form.metadata.spec_version,
            "runMode": form.metadata.run_mode.as_str(),
            "roles": form.metadata.roles,
        },
    })
}

fn field_schema(field: &Field) -> Value {
    let common = field.common();
    let markform_meta = |extra: Value| {
        let mut obj = json!({
            "kind": field.kind().as_str(),
            "role": common.role,
            "report": common.report,
        });
        if let Value::Object(extra) = extra {
            obj.as_object_mut().unwrap().extend(extra);
        }
        obj
    };

    match field {
        Field::String { min_length, max_length, pattern, .. } => {
            let mut s = json!({ "type": "string" });
            set_opt(&mut s, "minLength", *min_length);
            set_opt(&mut s, "maxLength", *max_length);
            if let Some(p) = pattern {
                s["pattern"] = json!(p);
            }
            s["x-markform"] = markform_meta(json!({}));
            s
        }
        Field::Number { min, max, integer, .. } => {
            let mut s = json!({ "type": if *integer { "integer" } else { "number" } });
            set_opt(&mut s, "minimum", *min);
            set_opt(&mut s, "maximum", *max);
            s["x-markform"] = markform_meta(json!({}));
            s
        }
        Field::StringList { min_items, max_items, unique_items, item_pattern, .. } => {
            let mut items = json!({ "type": "string" });
            if let Some(p) = item_pattern {
                items["pattern"] = json!(p);
            }
            let mut s = json!({ "type": "array", "items": items, "uniqueItems": unique_items });
            set_opt(&mut s, "minItems", *min_items);
            set_opt(&mut s, "maxItems", *max_items);
            s["x-markform"] = markform_meta(json!({}));
            s
        }
        Field::Url { .. } => {
            let mut s = json!({ "type": "string", "format": "uri" });
            s["x-markform"] = markform_meta(json!({}));
            s
        }
        Field::UrlList { min_items, max_items, unique_items, .. } => {
            let mut s = json!({
                "type": "array",
                "items": { "type": "string", "format": "uri" },
                "uniqueItems": unique_items,
            });
            set_opt(&mut s, "minItems", *min_items);
            set_opt(&mut s, "maxItems", *max_items);
            s["x-markform"] = markform_meta(json!({}));
            s
        }
        Field::SingleSelect { options, .. } => {
            let mut s = json!({ "type": "string", "enum": options.iter().map(|o| o.id.as_str()).collect::<Vec<_>>() });
            s["x-markform"] = markform_meta(json!({ "options": option_labels(options) }));
            s
        }
        Field::MultiSelect { options, min_selections, max_selections, .. } => {
            let mut s = json!({
                "type": "array",
                "items": { "type": "string", "enum": options.iter().map(|o| o.id.as_str()).collect::<Vec<_>>() },
            });
            set_opt(&mut s, "minItems", *min_selections);
            set_opt(&mut s, "maxItems", *max_selections);
            s["x-markform"] = markform_meta(json!({ "options": option_labels(options) }));
            s
        }
        Field::Checkboxes { options, mode, approval_mode, min_done, .. } => {
            let per_option = json!({ "type": "string", "enum": checkbox_states_for_mode(*mode) });
            let properties: serde_json::Map<String, Value> =
                options.iter().map(|o| (o.id.as_str().to_string(), per_option.clone())).collect();
            let mut s = json!({ "type": "object", "properties": properties });
            s["x-markform"] = markform_meta(json!({
                "options": option_labels(options),
                "mode": mode_str(*mode),
                "approvalMode": approval_mode_str(*approval_mode),
                "minDone": min_done,
            }));
            s
        }
        Field::Date { min, max, .. } => {
            let mut s = json!({ "type": "string", "format": "date" });
            if let Some(v) = min {
                s["x-markform-min"] = json!(v);
            }
            if let Some(v) = max {
                s["x-markform-max"] = json!(v);
            }
            s["x-markform"] = markform_meta(json!({}));
            s
        }
        Field::Year { min, max, .. } => {
            let mut s = json!({ "type": "integer" });
            set_opt(&mut s, "minimum", *min);
            set_opt(&mut s, "maximum", *max);
            s["x-markform"] = markform_meta(json!({}));
            s
        }
        Field::Table { column_ids, column_labels, column_types, min_rows, max_rows, .. } => {
            let row_properties: serde_json::Map<String, Value> = column_ids
                .iter()
                .zip(column_types.iter())
                .map(|(id, ty)| (id.to_string(), column_type_schema(*ty)))
                .collect();
            let mut s = json!({
                "type": "array",
                "items": { "type": "object", "properties": row_properties },
            });
            set_opt(&mut s, "minItems", *min_rows);
            set_opt(&mut s, "maxItems", *max_rows);
            s["x-markform"] = markform_meta(json!({ "columnLabels": column_labels }));
            s
        }
    }
}

fn checkbox_states_for_mode(mode: crate::model::CheckboxMode) -> Vec<&'static str> {
    use crate::model::CheckboxState::*;
    [Todo, Done, Na, Yes, No, Unfilled, Incomplete, Active]
        .into_iter()
        .filter(|s| s.valid_for_mode(mode))
        .map(|s| s.as_str())
        .collect()
}

fn column_type_schema(ty: ColumnType) -> Value {
    match ty {
        ColumnType::String => json!({ "type": "string" }),
        ColumnType::Number => json!({ "type": "number" }),
        ColumnType::Url => json!({ "type": "string", "format": "uri" }),
        ColumnType::Date => json!({ "type": "string", "format": "date" }),
        ColumnType::Year => json!({ "type": "integer" }),
    }
}

fn option_labels(options: &[crate::model::OptionDef]) -> Value {
    json!(options.iter().map(|o| (o.id.as_str().to_string(), o.label.clone())).collect::<std::collections::HashMap<_, _>>())
}

fn mode_str(mode: crate::model::CheckboxMode) -> &'static str {
    match mode {
        crate::model::CheckboxMode::All => "all",
        crate::model::CheckboxMode::Any => "any",
        crate::model::CheckboxMode::Explicit => "explicit",
    }
}

fn approval_mode_str(mode: crate::model::ApprovalMode) -> &'static str {
    match mode {
        crate::model::ApprovalMode::None => "none",
        crate::model::ApprovalMode::Blocking => "blocking",
    }
}

fn set_opt<T: Into<Value>>(target: &mut Value, key: &str, value: Option<T>) {
    if let Some(v) = value {
        target[key] = v.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_form;

    #[test]
    fn required_string_field_appears_in_required_list() {
        let form = parse_form(
            "{% form id=\"main\" %}\n{% group id=\"g\" %}\n{% field kind=\"string\" id=\"name\" label=\"Name\" required=true %}\n{% /field %}\n{% /group %}\n{% /form %}\n",
        )
        .unwrap();
        let schema = form_schema(&form);
        assert_eq!(schema["required"], json!(["name"]));
        assert_eq!(schema["properties"]["name"]["type"], json!("string"));
    }
}

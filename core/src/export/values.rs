//! Values-map projection (spec §4.9): `ParsedForm` reduced to
//! `{ fieldId -> typed value | {state, reason} }`.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::model::{Field, FieldState, FieldValue, ParsedForm};

pub fn values_map(form: &ParsedForm) -> HashMap<String, Value> {
    form.fields().map(|entry| (entry.field.id().to_string(), field_value_json(&entry.field, &entry.value))).collect()
}

fn field_value_json(field: &Field, value: &FieldValue) -> Value {
    let meta = value.meta();
    if meta.state != FieldState::Answered {
        let state = match meta.state {
            FieldState::Skipped => "skipped",
            FieldState::Aborted => "aborted",
            FieldState::Unanswered => "unanswered",
            FieldState::Answered => unreachable!(),
        };
        return json!({ "state": state, "reason": meta.skip_reason });
    }

    match (field, value) {
        (Field::String { .. } | Field::Url { .. } | Field::Date { .. }, _) => match value {
            FieldValue::String { value, .. } | FieldValue::Url { value, .. } | FieldValue::Date { value, .. } => json!(value),
            _ => Value::Null,
        },
        (Field::Number { .. }, FieldValue::Number { value, .. }) => json!(value),
        (Field::Year { .. }, FieldValue::Year { value, .. }) => json!(value),
        (Field::StringList { .. }, FieldValue::StringList { value, .. }) => json!(value),
        (Field::UrlList { .. }, FieldValue::UrlList { value, .. }) => json!(value),
        (Field::SingleSelect { .. }, FieldValue::SingleSelect { value, .. }) => json!(value.as_ref().map(|o| o.as_str().to_string())),
        (Field::MultiSelect { .. }, FieldValue::MultiSelect { value, .. }) => {
            json!(value.iter().map(|o| o.as_str().to_string()).collect::<Vec<_>>())
        }
        (Field::Checkboxes { .. }, FieldValue::Checkboxes { value, .. }) => {
            let map: HashMap<String, &'static str> = value.iter().map(|(k, v)| (k.as_str().to_string(), v.as_str())).collect();
            json!(map)
        }
        (Field::Table { .. }, FieldValue::Table { rows, .. }) => json!(rows),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_form;

    #[test]
    fn unanswered_field_reports_state() {
        let form = parse_form(
            "{% form id=\"main\" %}\n{% group id=\"g\" %}\n{% field kind=\"string\" id=\"name\" label=\"Name\" %}\n{% /field %}\n{% /group %}\n{% /form %}\n",
        )
        .unwrap();
        let values = values_map(&form);
        assert_eq!(values["name"], json!({ "state": "unanswered", "reason": null }));
    }
}

//! Report-mode markdown (spec §4.9): a readable rendering that inlines
//! values and drops anything marked `report=false`.

use crate::ids::Id;
use crate::model::{Field, FieldState, FieldValue, FormDef, ParsedForm};

pub fn render_report(form: &ParsedForm) -> String {
    let mut out = String::new();
    if let Some(title) = &form.metadata.title {
        out.push_str(&format!("# {}\n\n", title));
    }
    for fd in &form.forms {
        out.push_str(&render_form_def(form, fd));
    }
    out.trim_end().to_string() + "\n"
}

fn render_form_def(form: &ParsedForm, fd: &FormDef) -> String {
    let mut out = String::new();
    for group in &fd.groups {
        if !group.report {
            continue;
        }
        out.push_str(&format!("## {}\n\n", group.title));
        for doc in docs_for(form, &group.id) {
            out.push_str(&doc);
            out.push_str("\n\n");
        }
        for entry in &group.fields {
            if !entry.field.common().report {
                continue;
            }
            out.push_str(&format!("**{}**: {}\n\n", entry.field.common().label, render_value(&entry.field, &entry.value)));
            for doc in docs_for(form, entry.field.id()) {
                out.push_str(&doc);
                out.push_str("\n\n");
            }
        }
    }
    out
}

fn docs_for(form: &ParsedForm, id: &Id) -> Vec<String> {
    form.documentation.iter().filter(|d| &d.reference == id).map(|d| d.body_markdown.clone()).collect()
}

fn render_value(field: &Field, value: &FieldValue) -> String {
    let meta = value.meta();
    match meta.state {
        FieldState::Unanswered => return "_unanswered_".to_string(),
        FieldState::Skipped => {
            return match &meta.skip_reason {
                Some(r) => format!("_skipped: {}_", r),
                None => "_skipped_".to_string(),
            }
        }
        FieldState::Aborted => {
            return match &meta.skip_reason {
                Some(r) => format!("_aborted: {}_", r),
                None => "_aborted_".to_string(),
            }
        }
        FieldState::Answered => {}
    }

    match (field, value) {
        (Field::String { .. } | Field::Url { .. } | Field::Date { .. }, _) => match value {
            FieldValue::String { value: Some(v), .. } | FieldValue::Url { value: Some(v), .. } | FieldValue::Date { value: Some(v), .. } => v.clone(),
            _ => String::new(),
        },
        (Field::Number { .. }, FieldValue::Number { value: Some(v), .. }) => v.to_string(),
        (Field::Year { .. }, FieldValue::Year { value: Some(v), .. }) => v.to_string(),
        (Field::StringList { .. }, FieldValue::StringList { value, .. }) => value.join(", "),
        (Field::UrlList { .. }, FieldValue::UrlList { value, .. }) => value.join(", "),
        (Field::SingleSelect { options, .. }, FieldValue::SingleSelect { value: Some(o), .. }) => {
            options.iter().find(|opt| &opt.id == o).map(|opt| opt.label.clone()).unwrap_or_else(|| o.to_string())
        }
        (Field::MultiSelect { options, .. }, FieldValue::MultiSelect { value, .. }) => value
            .iter()
            .map(|o| options.iter().find(|opt| &opt.id == o).map(|opt| opt.label.clone()).unwrap_or_else(|| o.to_string()))
            .collect::<Vec<_>>()
            .join(", "),
        (Field::Checkboxes { options, mode, .. }, FieldValue::Checkboxes { value, .. }) => options
            .iter()
            .map(|opt| {
                let state = value.get(&opt.id).copied().unwrap_or(crate::model::CheckboxState::default_for_mode(*mode));
                format!("{} ({})", opt.label, state.as_str())
            })
            .collect::<Vec<_>>()
            .join(", "),
        (Field::Table { column_ids, column_labels, .. }, FieldValue::Table { rows, .. }) => {
            if rows.is_empty() {
                return "_(empty)_".to_string();
            }
            let header = column_labels
                .clone()
                .unwrap_or_else(|| column_ids.iter().map(|c| c.to_string()).collect())
                .join(" | ");
            let body = rows
                .iter()
                .map(|row| {
                    column_ids.iter().map(|c| row.get(c.as_str()).cloned().unwrap_or_default()).collect::<Vec<_>>().join(" | ")
                })
                .collect::<Vec<_>>()
                .join("; ");
            format!("{} — {}", header, body)
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_form;

    #[test]
    fn omits_groups_and_fields_marked_not_reported() {
        let input = r#"{% form id="main" %}
{% group id="hidden" report=false %}
{% field kind="string" id="secret" label="Secret" %}
{% /field %}
{% /group %}
{% group id="visible" %}
{% field kind="string" id="name" label="Name" %}
```value
Ada
```
{% /field %}
{% field kind="string" id="quiet" label="Quiet" report=false %}
{% /field %}
{% /group %}
{% /form %}
"#;
        let form = parse_form(input).unwrap();
        let rendered = render_report(&form);
        assert!(!rendered.contains("Secret"));
        assert!(!rendered.contains("Quiet"));
        assert!(rendered.contains("Name"));
        assert!(rendered.contains("Ada"));
    }
}

//! L3 — canonical serializer (spec §4.4).
//!
//! Produces deterministic Markdoc text from a [`ParsedForm`]: fixed
//! attribute order, defaults omitted, and a "smart fence" rule for value
//! blocks (pick the shortest all-backtick fence at least one character
//! longer than the longest backtick run already in the content, so the
//! fence can never be confused with the content). `syntax_style` controls
//! whether the legacy HTML-comment form is emitted instead — round-tripping
//! a document written in that style back to the same style is the
//! characterization test for this module (spec §8, round-trip law).
//!
//! Grounded on the teacher's `data/config/layout_expr.rs`, which pairs a
//! recursive-descent parser with a matching serializer and a battery of
//! parse-then-serialize round-trip tests — the same shape this module and
//! its tests take.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::defaults::{ABORT_SENTINEL, DEFAULT_ROLE, SKIP_SENTINEL};
use crate::ids::Id;
use crate::model::{
    CheckboxMode, CheckboxState, DocTag, DocumentationBlock, Field, FieldEntry, FieldGroup,
    FieldValue, FormDef, OptionDef, ParsedForm, RunMode, SyntaxStyle, ValueMeta,
};

/// Serialize a whole document: frontmatter plus body, in the document's own
/// recorded [`SyntaxStyle`].
pub fn serialize_form(form: &ParsedForm) -> String {
    let mut out = String::new();
    out.push_str(&serialize_frontmatter(form));
    out.push_str("\n---\n\n");

    let mut blocks = Vec::new();
    for fd in &form.forms {
        blocks.push(serialize_form_tag(fd, form));
    }
    out.push_str(&blocks.join("\n\n"));
    out.push('\n');

    match form.syntax_style {
        SyntaxStyle::Markdoc => out,
        SyntaxStyle::HtmlComment => to_html_comment_style(&out),
    }
}

fn serialize_frontmatter(form: &ParsedForm) -> String {
    let mut map = serde_yaml::Mapping::new();
    let m = &form.metadata;
    map.insert("spec".into(), m.spec_version.clone().into());
    if let Some(title) = &m.title {
        map.insert("title".into(), title.clone().into());
    }
    if let Some(desc) = &m.description {
        map.insert("description".into(), desc.clone().into());
    }
    if m.roles != crate::defaults::DEFAULT_ROLES.iter().map(|s| s.to_string()).collect::<Vec<_>>() {
        map.insert(
            "roles".into(),
            serde_yaml::Value::Sequence(m.roles.iter().map(|r| r.clone().into()).collect()),
        );
    }
    if !m.role_instructions.is_empty() {
        let mut rmap = serde_yaml::Mapping::new();
        let mut keys: Vec<&String> = m.role_instructions.keys().collect();
        keys.sort();
        for k in keys {
            rmap.insert(k.clone().into(), m.role_instructions[k].clone().into());
        }
        map.insert("role_instructions".into(), serde_yaml::Value::Mapping(rmap));
    }
    if m.run_mode != RunMode::Fill {
        map.insert("run_mode".into(), m.run_mode.as_str().into());
    }
    let h = &m.harness;
    if h.max_turns.is_some()
        || h.max_issues_per_turn.is_some()
        || h.max_fields_per_turn.is_some()
        || h.max_groups_per_turn.is_some()
        || h.max_patches_per_turn.is_some()
    {
        let mut hmap = serde_yaml::Mapping::new();
        if let Some(v) = h.max_turns {
            hmap.insert("max_turns".into(), (v as u64).into());
        }
        if let Some(v) = h.max_issues_per_turn {
            hmap.insert("max_issues_per_turn".into(), (v as u64).into());
        }
        if let Some(v) = h.max_fields_per_turn {
            hmap.insert("max_fields_per_turn".into(), (v as u64).into());
        }
        if let Some(v) = h.max_groups_per_turn {
            hmap.insert("max_groups_per_turn".into(), (v as u64).into());
        }
        if let Some(v) = h.max_patches_per_turn {
            hmap.insert("max_patches_per_turn".into(), (v as u64).into());
        }
        map.insert("harness".into(), serde_yaml::Value::Mapping(hmap));
    }
    let yaml = serde_yaml::to_string(&serde_yaml::Value::Mapping(map)).unwrap_or_default();
    format!("---\n{}", yaml.trim_end())
}

fn serialize_form_tag(fd: &FormDef, form: &ParsedForm) -> String {
    let mut body = String::new();
    let groups: Vec<String> = fd.groups.iter().map(|g| serialize_group_tag(g, form)).collect();
    body.push_str(&groups.join("\n\n"));
    let docs = docs_for(form, &fd.id);
    if !docs.is_empty() {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str(&docs.join("\n\n"));
    }
    wrap_tag("form", &[Attr::quoted("id", fd.id.to_string())], &body)
}

fn serialize_group_tag(g: &FieldGroup, form: &ParsedForm) -> String {
    let mut body = String::new();
    let fields: Vec<String> = g.fields.iter().map(|e| serialize_field_tag(e, form)).collect();
    body.push_str(&fields.join("\n\n"));
    let docs = docs_for(form, &g.id);
    if !docs.is_empty() {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str(&docs.join("\n\n"));
    }
    let mut attrs = vec![Attr::quoted("id", g.id.to_string())];
    if g.title != g.id.to_string() {
        attrs.push(Attr::quoted("title", g.title.clone()));
    }
    if !g.report {
        attrs.push(Attr::raw("report", "false".to_string()));
    }
    if !g.hook_names.is_empty() {
        attrs.push(Attr::quoted("validators", g.hook_names.join(",")));
    }
    wrap_tag("group", &attrs, &body)
}

fn docs_for(form: &ParsedForm, id: &Id) -> Vec<String> {
    form.documentation
        .iter()
        .filter(|d| &d.reference == id)
        .map(serialize_doc_tag)
        .collect()
}

fn serialize_doc_tag(doc: &DocumentationBlock) -> String {
    wrap_tag(
        doc.tag.as_str(),
        &[Attr::quoted("ref", doc.reference.to_string())],
        &doc.body_markdown,
    )
}

/// An attribute value as it must round-trip through the L1 lexer: `Quoted`
/// values always come back as `AttrValue::Str`, `Raw` values (bare
/// booleans/numbers) come back as `AttrValue::Bool`/`AttrValue::Num` — the
/// two are not interchangeable (quoting `true` makes it the string `"true"`,
/// which `Tag::attr_bool` will not see).
enum AttrOut {
    Quoted(String),
    Raw(String),
}

struct Attr {
    key: &'static str,
    value: AttrOut,
}

impl Attr {
    fn quoted(key: &'static str, value: String) -> Self {
        Attr { key, value: AttrOut::Quoted(value) }
    }

    fn raw(key: &'static str, value: String) -> Self {
        Attr { key, value: AttrOut::Raw(value) }
    }
}

fn wrap_tag(name: &str, attrs: &[Attr], body: &str) -> String {
    let mut head = format!("{{% {}", name);
    for attr in attrs {
        match &attr.value {
            AttrOut::Quoted(v) => {
                let _ = write!(head, " {}=\"{}\"", attr.key, v);
            }
            AttrOut::Raw(v) => {
                let _ = write!(head, " {}={}", attr.key, v);
            }
        }
    }
    head.push_str(" %}");
    if body.is_empty() {
        format!("{}\n{{% /{} %}}", head, name)
    } else {
        format!("{}\n{}\n{{% /{} %}}", head, body, name)
    }
}

// ---------------------------------------------------------------------
// Field serialization
// ---------------------------------------------------------------------

fn serialize_field_tag(entry: &FieldEntry, form: &ParsedForm) -> String {
    let common = entry.field.common();
    let mut attrs = Vec::new();
    attrs.push(Attr::quoted("kind", entry.field.kind().as_str().to_string()));
    attrs.push(Attr::quoted("id", common.id.to_string()));
    attrs.push(Attr::quoted("label", common.label.clone()));
    if common.role != DEFAULT_ROLE {
        attrs.push(Attr::quoted("role", common.role.clone()));
    }
    if common.required {
        attrs.push(Attr::raw("required", "true".to_string()));
    }
    if !common.report {
        attrs.push(Attr::raw("report", "false".to_string()));
    }
    attrs.extend(kind_specific_attrs(&entry.field));

    let mut body = field_body(entry);
    let docs = docs_joined(docs_for(form, &common.id));
    if let Some(d) = docs {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str(&d);
    }

    wrap_tag("field", &attrs, &body)
}

fn docs_joined(docs: Vec<String>) -> Option<String> {
    if docs.is_empty() {
        None
    } else {
        Some(docs.join("\n\n"))
    }
}

fn num_str(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn kind_specific_attrs(field: &Field) -> Vec<Attr> {
    let mut out = Vec::new();
    match field {
        Field::String { min_length, max_length, pattern, .. } => {
            if let Some(v) = min_length {
                out.push(Attr::raw("minLength", v.to_string()));
            }
            if let Some(v) = max_length {
                out.push(Attr::raw("maxLength", v.to_string()));
            }
            if let Some(v) = pattern {
                out.push(Attr::quoted("pattern", v.clone()));
            }
        }
        Field::Number { min, max, integer, .. } => {
            if let Some(v) = min {
                out.push(Attr::raw("min", num_str(*v)));
            }
            if let Some(v) = max {
                out.push(Attr::raw("max", num_str(*v)));
            }
            if *integer {
                out.push(Attr::raw("integer", "true".to_string()));
            }
        }
        Field::StringList { min_items, max_items, unique_items, item_pattern, .. } => {
            if let Some(v) = min_items {
                out.push(Attr::raw("minItems", v.to_string()));
            }
            if let Some(v) = max_items {
                out.push(Attr::raw("maxItems", v.to_string()));
            }
            if *unique_items {
                out.push(Attr::raw("uniqueItems", "true".to_string()));
            }
            if let Some(v) = item_pattern {
                out.push(Attr::quoted("itemPattern", v.clone()));
            }
        }
        Field::Url { .. } => {}
        Field::UrlList { min_items, max_items, unique_items, .. } => {
            if let Some(v) = min_items {
                out.push(Attr::raw("minItems", v.to_string()));
            }
            if let Some(v) = max_items {
                out.push(Attr::raw("maxItems", v.to_string()));
            }
            if *unique_items {
                out.push(Attr::raw("uniqueItems", "true".to_string()));
            }
        }
        Field::SingleSelect { .. } => {}
        Field::MultiSelect { min_selections, max_selections, .. } => {
            if let Some(v) = min_selections {
                out.push(Attr::raw("minSelections", v.to_string()));
            }
            if let Some(v) = max_selections {
                out.push(Attr::raw("maxSelections", v.to_string()));
            }
        }
        Field::Checkboxes { mode, approval_mode, min_done, .. } => {
            if *mode != CheckboxMode::All {
                out.push(Attr::quoted("mode", mode_str(*mode).to_string()));
            }
            if *approval_mode == crate::model::ApprovalMode::Blocking {
                out.push(Attr::quoted("approvalMode", "blocking".to_string()));
            }
            if let Some(v) = min_done {
                out.push(Attr::raw("minDone", v.to_string()));
            }
        }
        Field::Date { min, max, .. } => {
            if let Some(v) = min {
                out.push(Attr::quoted("min", v.clone()));
            }
            if let Some(v) = max {
                out.push(Attr::quoted("max", v.clone()));
            }
        }
        Field::Year { min, max, .. } => {
            if let Some(v) = min {
                out.push(Attr::raw("min", v.to_string()));
            }
            if let Some(v) = max {
                out.push(Attr::raw("max", v.to_string()));
            }
        }
        Field::Table { column_ids, column_labels, column_types, min_rows, max_rows, .. } => {
            out.push(Attr::quoted(
                "columnIds",
                column_ids.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(","),
            ));
            if let Some(labels) = column_labels {
                out.push(Attr::quoted("columnLabels", labels.join(",")));
            }
            out.push(Attr::quoted(
                "columnTypes",
                column_types.iter().map(|t| t.as_str().to_string()).collect::<Vec<_>>().join(","),
            ));
            if let Some(v) = min_rows {
                out.push(Attr::raw("minRows", v.to_string()));
            }
            if let Some(v) = max_rows {
                out.push(Attr::raw("maxRows", v.to_string()));
            }
        }
    }
    out
}

fn mode_str(mode: CheckboxMode) -> &'static str {
    match mode {
        CheckboxMode::All => "all",
        CheckboxMode::Any => "any",
        CheckboxMode::Explicit => "explicit",
    }
}

fn sentinel_text(sentinel: &str, reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!("{}: {}", sentinel, r),
        None => sentinel.to_string(),
    }
}

fn field_body(entry: &FieldEntry) -> String {
    match &entry.value {
        FieldValue::String { meta, value } | FieldValue::Url { meta, value } | FieldValue::Date { meta, value } => {
            scalar_body(meta, value.as_deref())
        }
        FieldValue::Number { meta, value } => scalar_body(meta, (*value).map(num_str).as_deref()),
        FieldValue::Year { meta, value } => scalar_body(meta, (*value).map(|v| v.to_string()).as_deref()),
        FieldValue::StringList { meta, value } | FieldValue::UrlList { meta, value } => list_body(meta, value),
        FieldValue::SingleSelect { meta, value } => {
            let options = entry.field.options().unwrap_or(&[]);
            checklist_body(options, meta, |o| if Some(o) == value.as_ref() { 'x' } else { ' ' })
        }
        FieldValue::MultiSelect { meta, value } => {
            let options = entry.field.options().unwrap_or(&[]);
            checklist_body(options, meta, |o| if value.contains(o) { 'x' } else { ' ' })
        }
        FieldValue::Checkboxes { meta, value } => {
            let (options, mode) = match &entry.field {
                Field::Checkboxes { options, mode, .. } => (options.as_slice(), *mode),
                _ => (&[][..], CheckboxMode::All),
            };
            checklist_body(options, meta, |o| {
                let state = value.get(o).copied().unwrap_or(CheckboxState::default_for_mode(mode));
                mark_for_state(state)
            })
        }
        FieldValue::Table { meta, rows } => {
            let (column_ids, column_labels) = match &entry.field {
                Field::Table { column_ids, column_labels, .. } => (column_ids.as_slice(), column_labels.clone()),
                _ => (&[][..], None),
            };
            table_body(column_ids, &column_labels, rows, meta)
        }
    }
}

fn scalar_body(meta: &ValueMeta, value: Option<&str>) -> String {
    let content = match meta.state {
        crate::model::FieldState::Skipped => Some(sentinel_text(SKIP_SENTINEL, &meta.skip_reason)),
        crate::model::FieldState::Aborted => Some(sentinel_text(ABORT_SENTINEL, &meta.skip_reason)),
        crate::model::FieldState::Answered => value.map(|v| v.to_string()),
        crate::model::FieldState::Unanswered => None,
    };
    match content {
        Some(c) => {
            let fence = choose_fence(&c);
            format!("{}value\n{}\n{}", fence, c, fence)
        }
        None => String::new(),
    }
}

fn list_body(meta: &ValueMeta, items: &[String]) -> String {
    match meta.state {
        crate::model::FieldState::Skipped => sentinel_text(SKIP_SENTINEL, &meta.skip_reason),
        crate::model::FieldState::Aborted => sentinel_text(ABORT_SENTINEL, &meta.skip_reason),
        _ => items.iter().map(|i| format!("- {}", i)).collect::<Vec<_>>().join("\n"),
    }
}

fn checklist_body(options: &[OptionDef], meta: &ValueMeta, mark: impl Fn(&crate::ids::OptionId) -> char) -> String {
    let mut lines: Vec<String> = options
        .iter()
        .map(|o| format!("- [{}] {}: {}", mark(&o.id), o.id, o.label))
        .collect();
    match meta.state {
        crate::model::FieldState::Skipped => lines.push(sentinel_text(SKIP_SENTINEL, &meta.skip_reason)),
        crate::model::FieldState::Aborted => lines.push(sentinel_text(ABORT_SENTINEL, &meta.skip_reason)),
        _ => {}
    }
    lines.join("\n")
}

fn mark_for_state(state: CheckboxState) -> char {
    match state {
        CheckboxState::Todo | CheckboxState::Unfilled => ' ',
        CheckboxState::Done | CheckboxState::Yes => 'x',
        CheckboxState::Na => '-',
        CheckboxState::No => 'n',
        CheckboxState::Incomplete | CheckboxState::Active => ' ',
    }
}

fn table_body(
    column_ids: &[Id],
    column_labels: &Option<Vec<String>>,
    rows: &[HashMap<String, String>],
    meta: &ValueMeta,
) -> String {
    match meta.state {
        crate::model::FieldState::Skipped => return sentinel_text(SKIP_SENTINEL, &meta.skip_reason),
        crate::model::FieldState::Aborted => return sentinel_text(ABORT_SENTINEL, &meta.skip_reason),
        _ => {}
    }
    let headers: Vec<String> = match column_labels {
        Some(labels) => labels.clone(),
        None => column_ids.iter().map(|c| c.to_string()).collect(),
    };
    let mut out = String::new();
    let _ = write!(out, "| {} |", headers.join(" | "));
    out.push('\n');
    let _ = write!(out, "| {} |", vec!["---"; headers.len()].join(" | "));
    for row in rows {
        out.push('\n');
        let cells: Vec<String> = column_ids.iter().map(|c| row.get(c.as_str()).cloned().unwrap_or_default()).collect();
        let _ = write!(out, "| {} |", cells.join(" | "));
    }
    out
}

fn choose_fence(content: &str) -> String {
    let mut max_run = 0usize;
    let mut cur = 0usize;
    for c in content.chars() {
        if c == '`' {
            cur += 1;
            max_run = max_run.max(cur);
        } else {
            cur = 0;
        }
    }
    "`".repeat(std::cmp::max(3, max_run + 1))
}

// ---------------------------------------------------------------------
// Legacy HTML-comment style
// ---------------------------------------------------------------------

/// Rewrite Markdoc braces back to `<!-- f:... -->` syntax for documents that
/// were originally written that way (the inverse of `preprocess`, applied
/// only to whole tag lines — this function is only ever handed output this
/// module itself produced, so every tag is alone on its line).
fn to_html_comment_style(markdoc: &str) -> String {
    let mut out = String::new();
    for line in markdoc.split('\n') {
        let trimmed = line.trim();
        if let Some(rewritten) = rewrite_tag_line(trimmed) {
            let indent = &line[..line.len() - line.trim_start().len()];
            out.push_str(indent);
            out.push_str(&rewritten);
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out.pop();
    out
}

fn rewrite_tag_line(trimmed: &str) -> Option<String> {
    let inner = trimmed.strip_prefix("{%")?.strip_suffix("%}")?;
    let inner = inner.trim();
    if let Some(name) = inner.strip_prefix('/') {
        Some(format!("<!-- /f:{} -->", name.trim()))
    } else if let Some(body) = inner.strip_suffix('/') {
        let body = body.trim_end();
        let (name, attrs) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
        if attrs.trim().is_empty() {
            Some(format!("<!-- f:{} /-->", name))
        } else {
            Some(format!("<!-- f:{} {} /-->", name, attrs.trim()))
        }
    } else if inner.starts_with('#') {
        Some(format!("<!-- {} -->", inner))
    } else if inner.starts_with('.') {
        Some(format!("<!-- {} -->", inner))
    } else {
        let (name, attrs) = inner.split_once(char::is_whitespace).unwrap_or((inner, ""));
        if attrs.trim().is_empty() {
            Some(format!("<!-- f:{} -->", name))
        } else {
            Some(format!("<!-- f:{} {} -->", name, attrs.trim()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_form;

    #[test]
    fn round_trips_simple_form() {
        let input = r#"---
title: Demo
---
{% form id="main" %}
{% group id="basics" title="Basics" %}
{% field kind="string" id="name" label="Name" required=true %}
```value
Ada Lovelace
```
{% /field %}
{% /group %}
{% /form %}
"#;
        let form = parse_form(input).unwrap();
        let out = serialize_form(&form);
        let reparsed = parse_form(&out).unwrap();
        assert_eq!(form, reparsed);
    }

    #[test]
    fn smart_fence_grows_past_embedded_backticks() {
        let fence = choose_fence("has ``` three backticks");
        assert_eq!(fence, "````");
    }

    #[test]
    fn html_comment_style_round_trips() {
        let input = "<!-- f:field kind=\"string\" id=\"x\" label=\"X\" -->\n```value\nhi\n```\n<!-- /f:field -->";
        let (markdoc, style) = crate::preprocess::preprocess(input);
        assert_eq!(style, SyntaxStyle::HtmlComment);
        let back = to_html_comment_style(&markdoc);
        let (roundtrip_markdoc, _) = crate::preprocess::preprocess(&back);
        assert_eq!(roundtrip_markdoc, markdoc);
    }

    #[test]
    fn checkbox_serializes_sparse_map_with_defaults() {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="checkboxes" id="steps" label="Steps" %}
- [ ] a: A
- [x] b: B
{% /field %}
{% /group %}
{% /form %}
"#;
        let form = parse_form(input).unwrap();
        let out = serialize_form(&form);
        assert!(out.contains("- [ ] a: A"));
        assert!(out.contains("- [x] b: B"));
    }
}

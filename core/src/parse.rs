//! L2 — form parser (spec §4.2–§4.3).
//!
//! Walks the L1 tag tree produced by [`crate::markdoc`] into a
//! [`ParsedForm`]. This layer owns tag recognition (`form`, `group`,
//! `field`, `description`, `instructions`, `documentation` — nothing
//! else), attribute-to-struct mapping per field kind, and raw value
//! extraction. It deliberately does *not* enforce content constraints
//! (pattern, min/max, uniqueness) — those are semantic checks that belong
//! to [`crate::validate`]; this layer only does the type coercion a typed
//! field demands (a `number`/`year` value must parse, everything else is
//! stored as text). Mirrors the teacher's `skill/parse.rs`: a frontmatter
//! pass, a body pass, and a typed document assembled from both.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::defaults::{ABORT_SENTINEL, DEFAULT_ROLE, SKIP_SENTINEL};
use crate::error::ParseError;
use crate::ids::{is_valid_role_name, Id, OptionId};
use crate::markdoc::{self, Node, Tag};
use crate::model::{
    ApprovalMode, CheckboxMode, CheckboxState, ColumnType, DocTag, DocumentationBlock, Field,
    FieldCommon, FieldEntry, FieldGroup, FieldKind, FieldState, FieldValue, FormDef, FormMetadata,
    HarnessHints, OptionDef, ParsedForm, RunMode, SyntaxStyle, ValueMeta,
};
use crate::preprocess;

/// Parse a complete Markform document: YAML frontmatter plus a Markdoc (or
/// HTML-comment-syntax) body.
pub fn parse_form(input: &str) -> Result<ParsedForm, ParseError> {
    tracing::debug!(bytes = input.len(), "parsing markform document");
    let (yaml, body) = split_frontmatter(input)?;
    let metadata = match yaml {
        Some(y) => {
            let raw: FrontmatterRaw = serde_yaml::from_str(y)
                .map_err(|e| ParseError::InvalidFrontmatter { reason: e.to_string() })?;
            build_metadata(raw)?
        }
        None => FormMetadata::default(),
    };

    let (markdoc_text, syntax_style) = preprocess::preprocess(body);
    let nodes = markdoc::parse(&markdoc_text)?;

    let mut forms = Vec::new();
    let mut documentation = Vec::new();
    for node in &nodes {
        let tag = match node {
            Node::Text(_) => continue,
            Node::Tag(tag) => tag,
        };
        reject_legacy_field_tag(tag)?;
        match tag.name.as_str() {
            "form" => forms.push(parse_form_tag(tag, &mut documentation)?),
            "description" | "instructions" | "documentation" => {
                documentation.push(parse_doc_tag(tag, None)?)
            }
            other => {
                return Err(ParseError::UnknownTag {
                    tag: other.to_string(),
                    line: tag.line,
                })
            }
        }
    }

    if forms.is_empty() {
        return Err(ParseError::Other {
            source: None,
            line: None,
            column: None,
            cause: "document contains no {% form %} block".to_string(),
        });
    }

    ParsedForm::new(metadata, forms, documentation, syntax_style)
}

// ---------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------

fn split_frontmatter(input: &str) -> Result<(Option<&str>, &str), ParseError> {
    let Some(rest) = input.strip_prefix("---\n") else {
        return Ok((None, input));
    };
    if let Some(end) = rest.find("\n---\n") {
        return Ok((Some(&rest[..end]), &rest[end + 5..]));
    }
    if let Some(end) = rest.find("\n---") {
        if rest[end + 4..].trim().is_empty() {
            return Ok((Some(&rest[..end]), ""));
        }
    }
    Err(ParseError::InvalidFrontmatter {
        reason: "unterminated frontmatter fence (expected a closing '---' line)".to_string(),
    })
}

/// Wire shape is snake_case (spec §4.2): `spec, title, description, roles,
/// role_instructions, run_mode, harness`.
#[derive(Debug, Default, serde::Deserialize)]
struct FrontmatterRaw {
    spec: Option<String>,
    title: Option<String>,
    description: Option<String>,
    roles: Option<Vec<String>>,
    role_instructions: Option<HashMap<String, String>>,
    run_mode: Option<String>,
    harness: Option<HarnessRaw>,
}

/// Wire shape is snake_case (spec §6.1): `max_turns, max_issues_per_turn, ...`.
#[derive(Debug, Default, serde::Deserialize)]
struct HarnessRaw {
    max_turns: Option<u32>,
    max_issues_per_turn: Option<usize>,
    max_fields_per_turn: Option<usize>,
    max_groups_per_turn: Option<usize>,
    max_patches_per_turn: Option<usize>,
}

fn build_metadata(raw: FrontmatterRaw) -> Result<FormMetadata, ParseError> {
    let run_mode = match &raw.run_mode {
        Some(s) => RunMode::parse(s).ok_or_else(|| ParseError::InvalidFrontmatter {
            reason: format!("unknown runMode '{}'", s),
        })?,
        None => RunMode::Fill,
    };
    let roles = raw
        .roles
        .unwrap_or_else(|| crate::defaults::DEFAULT_ROLES.iter().map(|s| s.to_string()).collect());
    for role in &roles {
        if !is_valid_role_name(role) {
            return Err(ParseError::InvalidFrontmatter {
                reason: format!("invalid role name '{}'", role),
            });
        }
    }
    Ok(FormMetadata {
        spec_version: raw.spec.unwrap_or_else(|| crate::error::SPEC_VERSION.to_string()),
        title: raw.title,
        description: raw.description,
        roles,
        role_instructions: raw.role_instructions.unwrap_or_default(),
        run_mode,
        harness: raw.harness.map(harness_from_raw).unwrap_or_default(),
    })
}

fn harness_from_raw(raw: HarnessRaw) -> HarnessHints {
    HarnessHints {
        max_turns: raw.max_turns,
        max_issues_per_turn: raw.max_issues_per_turn,
        max_fields_per_turn: raw.max_fields_per_turn,
        max_groups_per_turn: raw.max_groups_per_turn,
        max_patches_per_turn: raw.max_patches_per_turn,
    }
}

// ---------------------------------------------------------------------
// Tag-tree walk
// ---------------------------------------------------------------------

fn reject_legacy_field_tag(tag: &Tag) -> Result<(), ParseError> {
    if FieldKind::parse(&tag.name).is_some() {
        return Err(ParseError::LegacyFieldTag {
            tag: tag.name.clone(),
            line: tag.line,
        });
    }
    Ok(())
}

fn parse_form_tag(tag: &Tag, docs: &mut Vec<DocumentationBlock>) -> Result<FormDef, ParseError> {
    let id = required_id_attr(tag, "id")?;
    let mut groups = Vec::new();
    for child in &tag.children {
        let child_tag = match child {
            Node::Text(_) => continue,
            Node::Tag(t) => t,
        };
        reject_legacy_field_tag(child_tag)?;
        match child_tag.name.as_str() {
            "group" => groups.push(parse_group_tag(child_tag, docs)?),
            "description" | "instructions" | "documentation" => {
                docs.push(parse_doc_tag(child_tag, Some(id.clone()))?)
            }
            other => {
                return Err(ParseError::UnknownTag {
                    tag: other.to_string(),
                    line: child_tag.line,
                })
            }
        }
    }
    Ok(FormDef { id, groups })
}

fn parse_group_tag(tag: &Tag, docs: &mut Vec<DocumentationBlock>) -> Result<FieldGroup, ParseError> {
    let id = required_id_attr(tag, "id")?;
    let title = tag
        .attr_str("title")
        .map(|s| s.to_string())
        .unwrap_or_else(|| id.to_string());
    let report = tag.attr_bool("report").unwrap_or(true);
    let hook_names = split_csv(tag.attr_str("validators").unwrap_or(""));
    let mut fields = Vec::new();
    for child in &tag.children {
        let child_tag = match child {
            Node::Text(_) => continue,
            Node::Tag(t) => t,
        };
        reject_legacy_field_tag(child_tag)?;
        match child_tag.name.as_str() {
            "field" => fields.push(parse_field_tag(child_tag)?),
            "description" | "instructions" | "documentation" => {
                docs.push(parse_doc_tag(child_tag, Some(id.clone()))?)
            }
            other => {
                return Err(ParseError::UnknownTag {
                    tag: other.to_string(),
                    line: child_tag.line,
                })
            }
        }
    }
    Ok(FieldGroup { id, title, fields, report, hook_names })
}

fn parse_doc_tag(tag: &Tag, default_ref: Option<Id>) -> Result<DocumentationBlock, ParseError> {
    let doc_tag = DocTag::parse(&tag.name).expect("caller only dispatches recognized doc tags");
    let reference = match tag.attr_str("ref") {
        Some(r) => parse_id(r, tag.line)?,
        None => default_ref.ok_or_else(|| ParseError::MissingAttribute {
            tag: tag.name.clone(),
            attribute: "ref".to_string(),
            line: tag.line,
        })?,
    };
    Ok(DocumentationBlock {
        tag: doc_tag,
        reference,
        body_markdown: tag.text_content().trim().to_string(),
    })
}

// ---------------------------------------------------------------------
// Field parsing
// ---------------------------------------------------------------------

fn parse_field_tag(tag: &Tag) -> Result<FieldEntry, ParseError> {
    let kind_str = tag.attr_str("kind").ok_or_else(|| ParseError::MissingAttribute {
        tag: "field".to_string(),
        attribute: "kind".to_string(),
        line: tag.line,
    })?;
    let id = required_id_attr(tag, "id")?;
    let kind = FieldKind::parse(kind_str).ok_or_else(|| ParseError::InvalidValue {
        field: id.to_string(),
        reason: format!("unknown field kind '{}'", kind_str),
        line: tag.line,
    })?;
    let label = tag.attr_str("label").ok_or_else(|| ParseError::MissingAttribute {
        tag: "field".to_string(),
        attribute: "label".to_string(),
        line: tag.line,
    })?;
    let role = match tag.attr_str("role") {
        Some(r) => {
            if !is_valid_role_name(r) {
                return Err(ParseError::InvalidValue {
                    field: id.to_string(),
                    reason: format!("invalid role name '{}'", r),
                    line: tag.line,
                });
            }
            r.to_string()
        }
        None => DEFAULT_ROLE.to_string(),
    };
    let required = tag.attr_bool("required").unwrap_or(false);
    let report = tag.attr_bool("report").unwrap_or(true);
    let common = FieldCommon {
        id: id.clone(),
        label: label.to_string(),
        role,
        required,
        report,
    };

    let body = tag.text_content();
    let line = tag.line;

    let (field, value) = match kind {
        FieldKind::String => {
            let (meta, raw) = scalar_value(&body);
            (
                Field::String {
                    common,
                    min_length: num_attr_u32(tag, "minLength"),
                    max_length: num_attr_u32(tag, "maxLength"),
                    pattern: tag.attr_str("pattern").map(|s| s.to_string()),
                },
                FieldValue::String { meta, value: raw },
            )
        }
        FieldKind::Number => {
            let (meta, raw) = scalar_value(&body);
            let value = parse_numeric(raw, &id, line)?;
            (
                Field::Number {
                    common,
                    min: num_attr_f64(tag, "min"),
                    max: num_attr_f64(tag, "max"),
                    integer: tag.attr_bool("integer").unwrap_or(false),
                },
                FieldValue::Number { meta, value },
            )
        }
        FieldKind::Url => {
            let (meta, raw) = scalar_value(&body);
            (Field::Url { common }, FieldValue::Url { meta, value: raw })
        }
        FieldKind::Date => {
            let (meta, raw) = scalar_value(&body);
            (
                Field::Date {
                    common,
                    min: tag.attr_str("min").map(|s| s.to_string()),
                    max: tag.attr_str("max").map(|s| s.to_string()),
                },
                FieldValue::Date { meta, value: raw },
            )
        }
        FieldKind::Year => {
            let (meta, raw) = scalar_value(&body);
            let value = parse_year(raw, &id, line)?;
            (
                Field::Year {
                    common,
                    min: num_attr_i32(tag, "min"),
                    max: num_attr_i32(tag, "max"),
                },
                FieldValue::Year { meta, value },
            )
        }
        FieldKind::StringList => {
            let (meta, items) = list_value(&body);
            (
                Field::StringList {
                    common,
                    min_items: num_attr_u32(tag, "minItems"),
                    max_items: num_attr_u32(tag, "maxItems"),
                    unique_items: tag.attr_bool("uniqueItems").unwrap_or(false),
                    item_pattern: tag.attr_str("itemPattern").map(|s| s.to_string()),
                },
                FieldValue::StringList { meta, value: items },
            )
        }
        FieldKind::UrlList => {
            let (meta, items) = list_value(&body);
            (
                Field::UrlList {
                    common,
                    min_items: num_attr_u32(tag, "minItems"),
                    max_items: num_attr_u32(tag, "maxItems"),
                    unique_items: tag.attr_bool("uniqueItems").unwrap_or(false),
                },
                FieldValue::UrlList { meta, value: items },
            )
        }
        FieldKind::SingleSelect => {
            let (options, marks, sentinel) = parse_checklist(&body, id.as_str())?;
            let selected: Vec<&OptionId> = marks
                .iter()
                .filter(|(_, m)| *m == 'x' || *m == 'X')
                .map(|(o, _)| o)
                .collect();
            for (_, m) in &marks {
                if !matches!(m, ' ' | 'x' | 'X') {
                    return Err(ParseError::InvalidValue {
                        field: id.to_string(),
                        reason: format!("unsupported checkbox marker '{}' for single_select", m),
                        line,
                    });
                }
            }
            if selected.len() > 1 {
                return Err(ParseError::InvalidValue {
                    field: id.to_string(),
                    reason: "more than one option selected for single_select".to_string(),
                    line,
                });
            }
            let meta = match sentinel {
                Some((state, reason)) => ValueMeta { state, skip_reason: reason },
                None if selected.is_empty() => ValueMeta::unanswered(),
                None => ValueMeta::answered(),
            };
            let value = if sentinel.is_some() { None } else { selected.first().map(|o| (*o).clone()) };
            (
                Field::SingleSelect { common, options },
                FieldValue::SingleSelect { meta, value },
            )
        }
        FieldKind::MultiSelect => {
            let (options, marks, sentinel) = parse_checklist(&body, id.as_str())?;
            for (_, m) in &marks {
                if !matches!(m, ' ' | 'x' | 'X') {
                    return Err(ParseError::InvalidValue {
                        field: id.to_string(),
                        reason: format!("unsupported checkbox marker '{}' for multi_select", m),
                        line,
                    });
                }
            }
            let selected: Vec<OptionId> = marks
                .iter()
                .filter(|(_, m)| *m == 'x' || *m == 'X')
                .map(|(o, _)| o.clone())
                .collect();
            let meta = match sentinel {
                Some((state, reason)) => ValueMeta { state, skip_reason: reason },
                None if selected.is_empty() => ValueMeta::unanswered(),
                None => ValueMeta::answered(),
            };
            let value = if sentinel.is_some() { Vec::new() } else { selected };
            (
                Field::MultiSelect {
                    common,
                    options,
                    min_selections: num_attr_u32(tag, "minSelections"),
                    max_selections: num_attr_u32(tag, "maxSelections"),
                },
                FieldValue::MultiSelect { meta, value },
            )
        }
        FieldKind::Checkboxes => {
            let mode = match tag.attr_str("mode") {
                Some("all") | None => CheckboxMode::All,
                Some("any") => CheckboxMode::Any,
                Some("explicit") => CheckboxMode::Explicit,
                Some(other) => {
                    return Err(ParseError::InvalidValue {
                        field: id.to_string(),
                        reason: format!("unknown checkboxes mode '{}'", other),
                        line,
                    })
                }
            };
            let approval_mode = match tag.attr_str("approvalMode") {
                Some("blocking") => ApprovalMode::Blocking,
                Some("none") | None => ApprovalMode::None,
                Some(other) => {
                    return Err(ParseError::InvalidValue {
                        field: id.to_string(),
                        reason: format!("unknown approvalMode '{}'", other),
                        line,
                    })
                }
            };
            let (options, marks, sentinel) = parse_checklist(&body, id.as_str())?;
            let mut value = HashMap::new();
            for (oid, mark) in &marks {
                let state = checkbox_state_for_mark(*mark, mode).ok_or_else(|| ParseError::InvalidValue {
                    field: id.to_string(),
                    reason: format!("unsupported checkbox marker '{}' for mode {:?}", mark, mode),
                    line,
                })?;
                if state != CheckboxState::default_for_mode(mode) {
                    value.insert(oid.clone(), state);
                }
            }
            let meta = match sentinel {
                Some((state, reason)) => ValueMeta { state, skip_reason: reason },
                None if value.is_empty() => ValueMeta::unanswered(),
                None => ValueMeta::answered(),
            };
            if sentinel.is_some() {
                value.clear();
            }
            (
                Field::Checkboxes {
                    common,
                    options,
                    mode,
                    approval_mode,
                    min_done: num_attr_u32(tag, "minDone"),
                },
                FieldValue::Checkboxes { meta, value },
            )
        }
        FieldKind::Table => {
            let column_ids: Vec<Id> = split_csv(tag.attr_str("columnIds").unwrap_or(""))
                .into_iter()
                .map(|s| parse_id(&s, line))
                .collect::<Result<_, _>>()?;
            if column_ids.is_empty() {
                return Err(ParseError::MissingAttribute {
                    tag: "field".to_string(),
                    attribute: "columnIds".to_string(),
                    line,
                });
            }
            let column_labels = tag.attr_str("columnLabels").map(|s| split_csv(s));
            let column_types_raw = split_csv(tag.attr_str("columnTypes").unwrap_or(""));
            let column_types: Vec<ColumnType> = if column_types_raw.is_empty() {
                vec![ColumnType::String; column_ids.len()]
            } else {
                column_types_raw
                    .iter()
                    .map(|s| {
                        ColumnType::parse(s).ok_or_else(|| ParseError::InvalidValue {
                            field: id.to_string(),
                            reason: format!("unknown column type '{}'", s),
                            line,
                        })
                    })
                    .collect::<Result<_, _>>()?
            };
            let (meta, rows) = table_value(&body, &column_ids);
            (
                Field::Table {
                    common,
                    column_ids,
                    column_labels,
                    column_types,
                    min_rows: num_attr_u32(tag, "minRows"),
                    max_rows: num_attr_u32(tag, "maxRows"),
                },
                FieldValue::Table { meta, rows },
            )
        }
    };

    Ok(FieldEntry { field, value })
}

fn checkbox_state_for_mark(mark: char, mode: CheckboxMode) -> Option<CheckboxState> {
    match (mode, mark) {
        (CheckboxMode::All | CheckboxMode::Any, ' ') => Some(CheckboxState::Todo),
        (CheckboxMode::All | CheckboxMode::Any, 'x' | 'X') => Some(CheckboxState::Done),
        (CheckboxMode::All | CheckboxMode::Any, '-') => Some(CheckboxState::Na),
        (CheckboxMode::Explicit, ' ') => Some(CheckboxState::Unfilled),
        (CheckboxMode::Explicit, 'x' | 'X') => Some(CheckboxState::Yes),
        (CheckboxMode::Explicit, 'n' | 'N') => Some(CheckboxState::No),
        _ => None,
    }
}

// ---------------------------------------------------------------------
// Value extraction
// ---------------------------------------------------------------------

fn value_fence_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```value[ \t]*\r?\n(.*?)\r?\n?```").unwrap())
}

fn extract_value_fence(body: &str) -> Option<String> {
    value_fence_pattern().captures(body).map(|c| c[1].to_string())
}

fn parse_sentinel(text: &str) -> Option<(FieldState, Option<String>)> {
    let t = text.trim();
    for (sentinel, state) in [
        (SKIP_SENTINEL, FieldState::Skipped),
        (ABORT_SENTINEL, FieldState::Aborted),
    ] {
        let Some(rest) = t.strip_prefix(sentinel) else { continue };
        let rest = rest.trim_start();
        if rest.is_empty() {
            return Some((state, None));
        }
        if let Some(reason) = rest.strip_prefix(':') {
            let reason = reason.trim().to_string();
            return Some((state, if reason.is_empty() { None } else { Some(reason) }));
        }
    }
    None
}

fn scalar_value(body: &str) -> (ValueMeta, Option<String>) {
    match extract_value_fence(body) {
        None => (ValueMeta::unanswered(), None),
        Some(raw) => match parse_sentinel(&raw) {
            Some((state, reason)) => (ValueMeta { state, skip_reason: reason }, None),
            None => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    (ValueMeta::unanswered(), None)
                } else {
                    (ValueMeta::answered(), Some(trimmed.to_string()))
                }
            }
        },
    }
}

fn parse_numeric(raw: Option<String>, field_id: &Id, line: usize) -> Result<Option<f64>, ParseError> {
    match raw {
        None => Ok(None),
        Some(s) => s.parse::<f64>().map(Some).map_err(|_| ParseError::InvalidValue {
            field: field_id.to_string(),
            reason: format!("'{}' is not a valid number", s),
            line,
        }),
    }
}

fn parse_year(raw: Option<String>, field_id: &Id, line: usize) -> Result<Option<i32>, ParseError> {
    match raw {
        None => Ok(None),
        Some(s) => s.parse::<i32>().map(Some).map_err(|_| ParseError::InvalidValue {
            field: field_id.to_string(),
            reason: format!("'{}' is not a valid year", s),
            line,
        }),
    }
}

fn list_value(body: &str) -> (ValueMeta, Vec<String>) {
    let lines: Vec<&str> = body.lines().map(|l| l.trim()).filter(|l| !l.is_empty()).collect();
    if lines.len() == 1 {
        if let Some((state, reason)) = parse_sentinel(lines[0]) {
            return (ValueMeta { state, skip_reason: reason }, Vec::new());
        }
    }
    let items: Vec<String> = lines
        .iter()
        .filter_map(|l| l.strip_prefix('-'))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        (ValueMeta::unanswered(), Vec::new())
    } else {
        (ValueMeta::answered(), items)
    }
}

fn checklist_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^-\s*\[(.)\]\s*([a-z][a-z0-9_]*)\s*:\s*(.+?)\s*$").unwrap())
}

type Marks = Vec<(OptionId, char)>;

fn parse_checklist(
    body: &str,
    field_id: &str,
) -> Result<(Vec<OptionDef>, Marks, Option<(FieldState, Option<String>)>), ParseError> {
    let mut options = Vec::new();
    let mut marks = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for cap in checklist_pattern().captures_iter(body) {
        let mark = cap[1].chars().next().unwrap_or(' ');
        let oid = OptionId::new(&cap[2]).map_err(|e| ParseError::Other {
            source: None,
            line: None,
            column: None,
            cause: e,
        })?;
        let label = cap[3].to_string();
        if !seen.insert(oid.clone()) {
            return Err(ParseError::DuplicateOptionId {
                field: field_id.to_string(),
                option: oid.to_string(),
                line: 0,
            });
        }
        options.push(OptionDef { id: oid.clone(), label });
        marks.push((oid, mark));
    }
    let sentinel = body
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !checklist_pattern().is_match(l))
        .find_map(parse_sentinel);
    Ok((options, marks, sentinel))
}

fn table_value(body: &str, column_ids: &[Id]) -> (ValueMeta, Vec<HashMap<String, String>>) {
    let lines: Vec<&str> = body.lines().map(|l| l.trim()).filter(|l| !l.is_empty()).collect();
    if lines.len() == 1 {
        if let Some((state, reason)) = parse_sentinel(lines[0]) {
            return (ValueMeta { state, skip_reason: reason }, Vec::new());
        }
    }
    let table_lines: Vec<&str> = lines.into_iter().filter(|l| l.starts_with('|')).collect();
    if table_lines.len() < 2 {
        return (ValueMeta::unanswered(), Vec::new());
    }
    let mut rows = Vec::new();
    for line in &table_lines[2..] {
        let cells: Vec<String> = line.trim_matches('|').split('|').map(|c| c.trim().to_string()).collect();
        let mut row = HashMap::new();
        for (cid, cell) in column_ids.iter().zip(cells.into_iter()) {
            row.insert(cid.to_string(), cell);
        }
        rows.push(row);
    }
    let meta = if rows.is_empty() { ValueMeta::unanswered() } else { ValueMeta::answered() };
    (meta, rows)
}

// ---------------------------------------------------------------------
// Attribute helpers
// ---------------------------------------------------------------------

fn required_id_attr(tag: &Tag, key: &str) -> Result<Id, ParseError> {
    let raw = tag.attr_str(key).ok_or_else(|| ParseError::MissingAttribute {
        tag: tag.name.clone(),
        attribute: key.to_string(),
        line: tag.line,
    })?;
    parse_id(raw, tag.line)
}

fn parse_id(raw: &str, line: usize) -> Result<Id, ParseError> {
    Id::new(raw).map_err(|e| ParseError::Other {
        source: None,
        line: Some(line),
        column: None,
        cause: e,
    })
}

fn num_attr_u32(tag: &Tag, key: &str) -> Option<u32> {
    tag.attr_num(key).map(|n| n as u32)
}

fn num_attr_i32(tag: &Tag, key: &str) -> Option<i32> {
    tag.attr_num(key).map(|n| n as i32)
}

fn num_attr_f64(tag: &Tag, key: &str) -> Option<f64> {
    tag.attr_num(key)
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = r#"---
title: Demo
roles: [user, agent]
---
{% form id="main" %}
{% group id="basics" title="Basics" %}
{% field kind="string" id="name" label="Name" required=true %}
```value
Ada Lovelace
```
{% /field %}
{% field kind="single_select" id="priority" label="Priority" %}
- [x] high: High
- [ ] medium: Medium
- [ ] low: Low
{% /field %}
{% /group %}
{% /form %}
"#;

    #[test]
    fn parses_simple_form() {
        let form = parse_form(SIMPLE).unwrap();
        assert_eq!(form.metadata.title.as_deref(), Some("Demo"));
        let name = form.field(&Id::new("name").unwrap()).unwrap();
        assert_eq!(name.value.state(), FieldState::Answered);
        match &name.value {
            FieldValue::String { value, .. } => assert_eq!(value.as_deref(), Some("Ada Lovelace")),
            _ => panic!("wrong kind"),
        }
        let priority = form.field(&Id::new("priority").unwrap()).unwrap();
        match &priority.value {
            FieldValue::SingleSelect { value, .. } => {
                assert_eq!(value.as_ref().unwrap().as_str(), "high")
            }
            _ => panic!("wrong kind"),
        }
    }

    #[test]
    fn skip_sentinel_on_scalar_field() {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="x" label="X" %}
```value
%SKIP%: not applicable
```
{% /field %}
{% /group %}
{% /form %}
"#;
        let form = parse_form(input).unwrap();
        let entry = form.field(&Id::new("x").unwrap()).unwrap();
        assert_eq!(entry.value.state(), FieldState::Skipped);
        assert_eq!(entry.value.meta().skip_reason.as_deref(), Some("not applicable"));
    }

    #[test]
    fn legacy_field_tag_is_rejected() {
        let input = "{% form id=\"main\" %}{% string id=\"x\" label=\"X\" %}{% /string %}{% /form %}";
        let err = parse_form(input).unwrap_err();
        assert!(matches!(err, ParseError::LegacyFieldTag { .. }));
    }

    #[test]
    fn documentation_ref_defaults_to_enclosing_id() {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="x" label="X" %}
{% /field %}
{% instructions %}
Ask nicely.
{% /instructions %}
{% /group %}
{% /form %}
"#;
        let form = parse_form(input).unwrap();
        let doc = form.documentation_for(&Id::new("g").unwrap(), DocTag::Instructions).unwrap();
        assert_eq!(doc.body_markdown, "Ask nicely.");
    }

    #[test]
    fn table_field_parses_rows() {
        let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="table" id="tasks" label="Tasks" columnIds="task,owner" columnTypes="string,string" %}
| task | owner |
| --- | --- |
| write docs | ada |
{% /field %}
{% /group %}
{% /form %}
"#;
        let form = parse_form(input).unwrap();
        let entry = form.field(&Id::new("tasks").unwrap()).unwrap();
        match &entry.value {
            FieldValue::Table { rows, .. } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].get("owner").map(|s| s.as_str()), Some("ada"));
            }
            _ => panic!("wrong kind"),
        }
    }
}

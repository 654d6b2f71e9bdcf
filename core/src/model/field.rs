//! Field definitions — the closed 11-kind union (spec §3).

use crate::ids::{Id, OptionId};

/// Attributes shared by every field kind.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCommon {
    pub id: Id,
    pub label: String,
    /// Defaults to `"agent"` (Glossary).
    pub role: String,
    pub required: bool,
    /// Defaults to `true`; governs report-mode export (§4.9).
    pub report: bool,
}

impl FieldCommon {
    pub fn new(id: Id, label: impl Into<String>) -> Self {
        FieldCommon {
            id,
            label: label.into(),
            role: crate::defaults::DEFAULT_ROLE.to_string(),
            required: false,
            report: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionDef {
    pub id: OptionId,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckboxMode {
    All,
    Any,
    Explicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    None,
    Blocking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Number,
    Url,
    Date,
    Year,
}

impl ColumnType {
    pub fn parse(s: &str) -> Option<ColumnType> {
        match s {
            "string" => Some(ColumnType::String),
            "number" => Some(ColumnType::Number),
            "url" => Some(ColumnType::Url),
            "date" => Some(ColumnType::Date),
            "year" => Some(ColumnType::Year),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Url => "url",
            ColumnType::Date => "date",
            ColumnType::Year => "year",
        }
    }
}

/// The field kind tag, independent of any particular field's attributes —
/// used for patch-target kind checks and export schema mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    StringList,
    Url,
    UrlList,
    SingleSelect,
    MultiSelect,
    Checkboxes,
    Date,
    Year,
    Table,
}

impl FieldKind {
    pub fn parse(s: &str) -> Option<FieldKind> {
        match s {
            "string" => Some(FieldKind::String),
            "number" => Some(FieldKind::Number),
            "string_list" => Some(FieldKind::StringList),
            "url" => Some(FieldKind::Url),
            "url_list" => Some(FieldKind::UrlList),
            "single_select" => Some(FieldKind::SingleSelect),
            "multi_select" => Some(FieldKind::MultiSelect),
            "checkboxes" => Some(FieldKind::Checkboxes),
            "date" => Some(FieldKind::Date),
            "year" => Some(FieldKind::Year),
            "table" => Some(FieldKind::Table),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::StringList => "string_list",
            FieldKind::Url => "url",
            FieldKind::UrlList => "url_list",
            FieldKind::SingleSelect => "single_select",
            FieldKind::MultiSelect => "multi_select",
            FieldKind::Checkboxes => "checkboxes",
            FieldKind::Date => "date",
            FieldKind::Year => "year",
            FieldKind::Table => "table",
        }
    }
}

/// The closed field union. Each variant embeds `FieldCommon` plus its own
/// kind-specific constraints (spec §3, "Field kinds").
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    String {
        common: FieldCommon,
        min_length: Option<u32>,
        max_length: Option<u32>,
        pattern: Option<String>,
    },
    Number {
        common: FieldCommon,
        min: Option<f64>,
        max: Option<f64>,
        integer: bool,
    },
    StringList {
        common: FieldCommon,
        min_items: Option<u32>,
        max_items: Option<u32>,
        unique_items: bool,
        item_pattern: Option<String>,
    },
    Url {
        common: FieldCommon,
    },
    UrlList {
        common: FieldCommon,
        min_items: Option<u32>,
        max_items: Option<u32>,
        unique_items: bool,
    },
    SingleSelect {
        common: FieldCommon,
        options: Vec<OptionDef>,
    },
    MultiSelect {
        common: FieldCommon,
        options: Vec<OptionDef>,
        min_selections: Option<u32>,
        max_selections: Option<u32>,
    },
    Checkboxes {
        common: FieldCommon,
        options: Vec<OptionDef>,
        mode: CheckboxMode,
        approval_mode: ApprovalMode,
        min_done: Option<u32>,
    },
    Date {
        common: FieldCommon,
        min: Option<String>,
        max: Option<String>,
    },
    Year {
        common: FieldCommon,
        min: Option<i32>,
        max: Option<i32>,
    },
    Table {
        common: FieldCommon,
        column_ids: Vec<Id>,
        column_labels: Option<Vec<String>>,
        column_types: Vec<ColumnType>,
        min_rows: Option<u32>,
        max_rows: Option<u32>,
    },
}

impl Field {
    pub fn common(&self) -> &FieldCommon {
        match self {
            Field::String { common, .. }
            | Field::Number { common, .. }
            | Field::StringList { common, .. }
            | Field::Url { common, .. }
            | Field::UrlList { common, .. }
            | Field::SingleSelect { common, .. }
            | Field::MultiSelect { common, .. }
            | Field::Checkboxes { common, .. }
            | Field::Date { common, .. }
            | Field::Year { common, .. }
            | Field::Table { common, .. } => common,
        }
    }

    pub fn common_mut(&mut self) -> &mut FieldCommon {
        match self {
            Field::String { common, .. }
            | Field::Number { common, .. }
            | Field::StringList { common, .. }
            | Field::Url { common, .. }
            | Field::UrlList { common, .. }
            | Field::SingleSelect { common, .. }
            | Field::MultiSelect { common, .. }
            | Field::Checkboxes { common, .. }
            | Field::Date { common, .. }
            | Field::Year { common, .. }
            | Field::Table { common, .. } => common,
        }
    }

    pub fn id(&self) -> &Id {
        &self.common().id
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::String { .. } => FieldKind::String,
            Field::Number { .. } => FieldKind::Number,
            Field::StringList { .. } => FieldKind::StringList,
            Field::Url { .. } => FieldKind::Url,
            Field::UrlList { .. } => FieldKind::UrlList,
            Field::SingleSelect { .. } => FieldKind::SingleSelect,
            Field::MultiSelect { .. } => FieldKind::MultiSelect,
            Field::Checkboxes { .. } => FieldKind::Checkboxes,
            Field::Date { .. } => FieldKind::Date,
            Field::Year { .. } => FieldKind::Year,
            Field::Table { .. } => FieldKind::Table,
        }
    }

    pub fn options(&self) -> Option<&[OptionDef]> {
        match self {
            Field::SingleSelect { options, .. }
            | Field::MultiSelect { options, .. }
            | Field::Checkboxes { options, .. } => Some(options),
            _ => None,
        }
    }

    /// Whether positive min constraints make this field "effectively
    /// required" for progress tallies, per the Open Question resolved in
    /// SPEC_FULL.md §9: implicit-required for list/selection minimums.
    pub fn is_effectively_required(&self) -> bool {
        if self.common().required {
            return true;
        }
        match self {
            Field::StringList { min_items, .. } | Field::UrlList { min_items, .. } => {
                min_items.unwrap_or(0) > 0
            }
            Field::MultiSelect { min_selections, .. } => min_selections.unwrap_or(0) > 0,
            Field::Table { min_rows, .. } => min_rows.unwrap_or(0) > 0,
            _ => false,
        }
    }
}

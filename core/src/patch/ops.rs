//! The closed patch operation set (spec §4.5, §6.2).

use std::collections::HashMap;

use crate::ids::{Id, OptionId};
use crate::model::CheckboxState;

#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    SetString { field_id: Id, value: Option<String> },
    SetNumber { field_id: Id, value: Option<f64> },
    SetStringList { field_id: Id, value: Vec<String> },
    SetUrlList { field_id: Id, value: Vec<String> },
    SetSingleSelect { field_id: Id, value: Option<OptionId> },
    SetMultiSelect { field_id: Id, value: Vec<OptionId> },
    SetCheckboxes { field_id: Id, value: HashMap<OptionId, CheckboxState> },
    SetTable { field_id: Id, value: Vec<HashMap<String, String>> },
    ClearField { field_id: Id },
    SkipField { field_id: Id, reason: String },
    AbortForm { reason: String },
}

impl Patch {
    pub fn field_id(&self) -> Option<&Id> {
        match self {
            Patch::SetString { field_id, .. }
            | Patch::SetNumber { field_id, .. }
            | Patch::SetStringList { field_id, .. }
            | Patch::SetUrlList { field_id, .. }
            | Patch::SetSingleSelect { field_id, .. }
            | Patch::SetMultiSelect { field_id, .. }
            | Patch::SetCheckboxes { field_id, .. }
            | Patch::SetTable { field_id, .. }
            | Patch::ClearField { field_id }
            | Patch::SkipField { field_id, .. } => Some(field_id),
            Patch::AbortForm { .. } => None,
        }
    }

    pub fn operation_name(&self) -> &'static str {
        match self {
            Patch::SetString { .. } => "set_string",
            Patch::SetNumber { .. } => "set_number",
            Patch::SetStringList { .. } => "set_string_list",
            Patch::SetUrlList { .. } => "set_url_list",
            Patch::SetSingleSelect { .. } => "set_single_select",
            Patch::SetMultiSelect { .. } => "set_multi_select",
            Patch::SetCheckboxes { .. } => "set_checkboxes",
            Patch::SetTable { .. } => "set_table",
            Patch::ClearField { .. } => "clear_field",
            Patch::SkipField { .. } => "skip_field",
            Patch::AbortForm { .. } => "abort_form",
        }
    }
}

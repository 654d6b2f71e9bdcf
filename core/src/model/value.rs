//! Field values — the closed union that parallels `Field` (spec §3).

use std::collections::HashMap;

use crate::ids::OptionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    Answered,
    Skipped,
    Aborted,
    Unanswered,
}

impl FieldState {
    pub fn is_answered(&self) -> bool {
        matches!(self, FieldState::Answered)
    }
}

/// Per-mode checkbox vocabulary (spec §3, "Checkbox state vocabulary").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckboxState {
    Todo,
    Done,
    Na,
    Yes,
    No,
    Unfilled,
    Incomplete,
    Active,
}

impl CheckboxState {
    pub fn parse(s: &str) -> Option<CheckboxState> {
        match s {
            "todo" => Some(CheckboxState::Todo),
            "done" => Some(CheckboxState::Done),
            "na" => Some(CheckboxState::Na),
            "yes" => Some(CheckboxState::Yes),
            "no" => Some(CheckboxState::No),
            "unfilled" => Some(CheckboxState::Unfilled),
            "incomplete" => Some(CheckboxState::Incomplete),
            "active" => Some(CheckboxState::Active),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckboxState::Todo => "todo",
            CheckboxState::Done => "done",
            CheckboxState::Na => "na",
            CheckboxState::Yes => "yes",
            CheckboxState::No => "no",
            CheckboxState::Unfilled => "unfilled",
            CheckboxState::Incomplete => "incomplete",
            CheckboxState::Active => "active",
        }
    }

    /// Whether this state is legal for the given mode (used by both the
    /// parser, to reject garbage input, and the coercion layer).
    pub fn valid_for_mode(&self, mode: crate::model::field::CheckboxMode) -> bool {
        use crate::model::field::CheckboxMode::*;
        match mode {
            All | Any => matches!(self, CheckboxState::Todo | CheckboxState::Done | CheckboxState::Na),
            Explicit => matches!(self, CheckboxState::Yes | CheckboxState::No | CheckboxState::Unfilled),
        }
    }

    /// The "unanswered" state for a given mode, used when initializing a
    /// field's value and by array-to-map coercion defaults.
    pub fn default_for_mode(mode: crate::model::field::CheckboxMode) -> CheckboxState {
        use crate::model::field::CheckboxMode::*;
        match mode {
            All | Any => CheckboxState::Todo,
            Explicit => CheckboxState::Unfilled,
        }
    }

    /// The "done" state for a given mode — used by boolean coercion.
    pub fn done_for_mode(mode: crate::model::field::CheckboxMode) -> CheckboxState {
        use crate::model::field::CheckboxMode::*;
        match mode {
            All | Any => CheckboxState::Done,
            Explicit => CheckboxState::Yes,
        }
    }

    /// The "not done" state for a given mode — used by boolean coercion.
    pub fn not_done_for_mode(mode: crate::model::field::CheckboxMode) -> CheckboxState {
        use crate::model::field::CheckboxMode::*;
        match mode {
            All | Any => CheckboxState::Todo,
            Explicit => CheckboxState::No,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueMeta {
    pub state: FieldState,
    pub skip_reason: Option<String>,
}

impl ValueMeta {
    pub fn unanswered() -> Self {
        ValueMeta {
            state: FieldState::Unanswered,
            skip_reason: None,
        }
    }

    pub fn answered() -> Self {
        ValueMeta {
            state: FieldState::Answered,
            skip_reason: None,
        }
    }

    pub fn skipped(reason: Option<String>) -> Self {
        ValueMeta {
            state: FieldState::Skipped,
            skip_reason: reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String {
        meta: ValueMeta,
        value: Option<String>,
    },
    Number {
        meta: ValueMeta,
        value: Option<f64>,
    },
    StringList {
        meta: ValueMeta,
        value: Vec<String>,
    },
    Url {
        meta: ValueMeta,
        value: Option<String>,
    },
    UrlList {
        meta: ValueMeta,
        value: Vec<String>,
    },
    SingleSelect {
        meta: ValueMeta,
        value: Option<OptionId>,
    },
    MultiSelect {
        meta: ValueMeta,
        value: Vec<OptionId>,
    },
    Checkboxes {
        meta: ValueMeta,
        value: HashMap<OptionId, CheckboxState>,
    },
    Date {
        meta: ValueMeta,
        value: Option<String>,
    },
    Year {
        meta: ValueMeta,
        value: Option<i32>,
    },
    Table {
        meta: ValueMeta,
        rows: Vec<HashMap<String, String>>,
    },
}

impl FieldValue {
    pub fn meta(&self) -> &ValueMeta {
        match self {
            FieldValue::String { meta, .. }
            | FieldValue::Number { meta, .. }
            | FieldValue::StringList { meta, .. }
            | FieldValue::Url { meta, .. }
            | FieldValue::UrlList { meta, .. }
            | FieldValue::SingleSelect { meta, .. }
            | FieldValue::MultiSelect { meta, .. }
            | FieldValue::Checkboxes { meta, .. }
            | FieldValue::Date { meta, .. }
            | FieldValue::Year { meta, .. }
            | FieldValue::Table { meta, .. } => meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ValueMeta {
        match self {
            FieldValue::String { meta, .. }
            | FieldValue::Number { meta, .. }
            | FieldValue::StringList { meta, .. }
            | FieldValue::Url { meta, .. }
            | FieldValue::UrlList { meta, .. }
            | FieldValue::SingleSelect { meta, .. }
            | FieldValue::MultiSelect { meta, .. }
            | FieldValue::Checkboxes { meta, .. }
            | FieldValue::Date { meta, .. }
            | FieldValue::Year { meta, .. }
            | FieldValue::Table { meta, .. } => meta,
        }
    }

    pub fn state(&self) -> FieldState {
        self.meta().state
    }

    /// Build the empty/unanswered value for a given field definition —
    /// used both at parse time (no value block present) and by
    /// `clear_field`.
    pub fn empty_for(field: &crate::model::field::Field) -> FieldValue {
        use crate::model::field::Field::*;
        let meta = ValueMeta::unanswered();
        match field {
            String { .. } => FieldValue::String { meta, value: None },
            Number { .. } => FieldValue::Number { meta, value: None },
            StringList { .. } => FieldValue::StringList {
                meta,
                value: Vec::new(),
            },
            Url { .. } => FieldValue::Url { meta, value: None },
            UrlList { .. } => FieldValue::UrlList {
                meta,
                value: Vec::new(),
            },
            SingleSelect { .. } => FieldValue::SingleSelect { meta, value: None },
            MultiSelect { .. } => FieldValue::MultiSelect {
                meta,
                value: Vec::new(),
            },
            Checkboxes { .. } => FieldValue::Checkboxes {
                meta,
                value: HashMap::new(),
            },
            Date { .. } => FieldValue::Date { meta, value: None },
            Year { .. } => FieldValue::Year { meta, value: None },
            Table { .. } => FieldValue::Table {
                meta,
                rows: Vec::new(),
            },
        }
    }

    /// Whether the payload is empty/sentinel, required by the invariant
    /// `state != answered => payload empty or sentinel` (spec §3).
    pub fn payload_is_empty(&self) -> bool {
        match self {
            FieldValue::String { value, .. } | FieldValue::Url { value, .. } | FieldValue::Date { value, .. } => {
                value.is_none()
            }
            FieldValue::Number { value, .. } => value.is_none(),
            FieldValue::Year { value, .. } => value.is_none(),
            FieldValue::StringList { value, .. } | FieldValue::UrlList { value, .. } => value.is_empty(),
            FieldValue::SingleSelect { value, .. } => value.is_none(),
            FieldValue::MultiSelect { value, .. } => value.is_empty(),
            FieldValue::Checkboxes { value, .. } => value.is_empty(),
            FieldValue::Table { rows, .. } => rows.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::field::CheckboxMode;

    #[test]
    fn checkbox_state_mode_validity() {
        assert!(CheckboxState::Done.valid_for_mode(CheckboxMode::All));
        assert!(!CheckboxState::Yes.valid_for_mode(CheckboxMode::All));
        assert!(CheckboxState::Unfilled.valid_for_mode(CheckboxMode::Explicit));
        assert!(!CheckboxState::Todo.valid_for_mode(CheckboxMode::Explicit));
    }

    #[test]
    fn empty_value_payload_is_empty() {
        let meta = ValueMeta::unanswered();
        let v = FieldValue::StringList {
            meta,
            value: vec![],
        };
        assert!(v.payload_is_empty());
    }
}

//! Best-effort shape normalization shared by the applicator and the
//! external value-coercion layer (spec §4.5 coercion table, §4.8).
//!
//! Each function here turns a "close enough" shape into the exact shape a
//! field's typed storage needs, or returns `None` when the shape genuinely
//! cannot be salvaged (the caller then rejects the patch/input instead).

use std::collections::HashMap;

use crate::ids::OptionId;
use crate::model::{CheckboxMode, CheckboxState};
use crate::validate::is_url_shaped;

pub fn string_to_list(value: &str) -> Vec<String> {
    vec![value.to_string()]
}

pub fn string_to_url_list(value: &str) -> Option<Vec<String>> {
    is_url_shaped(value).then(|| vec![value.to_string()])
}

pub fn option_to_multi(option: OptionId) -> Vec<OptionId> {
    vec![option]
}

pub fn bool_to_checkbox_state(flag: bool, mode: CheckboxMode) -> CheckboxState {
    if flag {
        CheckboxState::done_for_mode(mode)
    } else {
        CheckboxState::not_done_for_mode(mode)
    }
}

/// `OptionId[] -> map<OptionId, state>`: every named option becomes "done"
/// for the field's mode; unnamed options are left out of the map (the
/// applicator fills them in as their mode default when merging).
pub fn options_to_checkboxes_map(options: &[OptionId], mode: CheckboxMode) -> HashMap<OptionId, CheckboxState> {
    options.iter().cloned().map(|o| (o, CheckboxState::done_for_mode(mode))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_promotes_to_single_item_list() {
        assert_eq!(string_to_list("hello"), vec!["hello".to_string()]);
    }

    #[test]
    fn non_url_string_does_not_promote_to_url_list() {
        assert_eq!(string_to_url_list("not a url"), None);
        assert_eq!(string_to_url_list("https://example.com"), Some(vec!["https://example.com".to_string()]));
    }

    #[test]
    fn bool_maps_to_checkbox_state_per_mode() {
        assert_eq!(bool_to_checkbox_state(true, CheckboxMode::All), CheckboxState::Done);
        assert_eq!(bool_to_checkbox_state(false, CheckboxMode::All), CheckboxState::Todo);
        assert_eq!(bool_to_checkbox_state(true, CheckboxMode::Explicit), CheckboxState::Yes);
        assert_eq!(bool_to_checkbox_state(false, CheckboxMode::Explicit), CheckboxState::No);
    }
}

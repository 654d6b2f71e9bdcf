//! Append-only YAML session transcript (spec §4.7).
//!
//! Each turn is flattened into a plain, `serde`-friendly record — the
//! transcript is a golden-test artifact, not a live data structure, so it
//! favors simple strings over re-serializing the engine's internal enums.

use serde::{Deserialize, Serialize};

use super::TurnProgress;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchRecord {
    pub operation: String,
    pub field_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn_number: u32,
    pub issue_count: usize,
    pub patches: Vec<PatchRecord>,
    pub applied_count: usize,
    pub rejected_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Session {
    pub turns: Vec<TurnRecord>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn record(&mut self, turn: &TurnProgress) {
        let patches = turn
            .patches
            .iter()
            .map(|p| PatchRecord { operation: p.operation_name().to_string(), field_id: p.field_id().map(|id| id.to_string()) })
            .collect();
        self.turns.push(TurnRecord {
            turn_number: turn.turn_number,
            issue_count: turn.issues.len(),
            patches,
            applied_count: turn.applied_count,
            rejected_count: turn.rejected_count,
            warnings: turn.warnings.clone(),
            input_tokens: turn.token_counts.map(|(input, _)| input),
            output_tokens: turn.token_counts.map(|(_, output)| output),
        });
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Id;
    use crate::patch::Patch;

    #[test]
    fn records_and_serializes_a_turn() {
        let mut session = Session::new();
        session.record(&TurnProgress {
            turn_number: 1,
            issues: vec![],
            patches: vec![Patch::ClearField { field_id: Id::new("a").unwrap() }],
            applied_count: 1,
            rejected_count: 0,
            warnings: vec![],
            token_counts: None,
        });
        let yaml = session.to_yaml().unwrap();
        assert!(yaml.contains("turn_number: 1"));
        assert!(yaml.contains("clear_field"));
    }
}

//! A scripted test double for [`Agent`], grounded in the teacher's
//! `infrastructure::mock::MockRunner` (a trait-object stand-in used
//! identically in tests instead of the real runner).

use std::collections::VecDeque;

use crate::error::LlmError;
use crate::inspect::InspectIssue;
use crate::model::ParsedForm;
use crate::patch::Patch;

use super::agent::Agent;

/// Replays a fixed queue of patch batches, one per call, ignoring the
/// form/issues it is given. Once the queue is empty it returns an empty
/// batch rather than erroring, so a harness run converges naturally when
/// the script runs out of scripted turns.
#[derive(Debug, Default)]
pub struct MockAgent {
    batches: VecDeque<Vec<Patch>>,
}

impl MockAgent {
    pub fn new() -> Self {
        MockAgent { batches: VecDeque::new() }
    }

    pub fn with_batches(batches: Vec<Vec<Patch>>) -> Self {
        MockAgent { batches: batches.into() }
    }

    pub fn push_batch(&mut self, patches: Vec<Patch>) {
        self.batches.push_back(patches);
    }
}

impl Agent for MockAgent {
    fn generate_patches(
        &mut self,
        _form: &ParsedForm,
        _issues: &[InspectIssue],
        max_patches: usize,
    ) -> Result<Vec<Patch>, LlmError> {
        let mut batch = self.batches.pop_front().unwrap_or_default();
        batch.truncate(max_patches);
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Id;

    #[test]
    fn replays_queued_batches_in_order() {
        let mut agent = MockAgent::with_batches(vec![
            vec![Patch::ClearField { field_id: Id::new("a").unwrap() }],
            vec![Patch::ClearField { field_id: Id::new("b").unwrap() }],
        ]);
        let form = crate::parse::parse_form(
            "{% form id=\"main\" %}\n{% group id=\"g\" %}\n{% field kind=\"string\" id=\"a\" label=\"A\" %}\n{% /field %}\n{% /group %}\n{% /form %}\n",
        )
        .unwrap();
        let first = agent.generate_patches(&form, &[], 10).unwrap();
        assert_eq!(first, vec![Patch::ClearField { field_id: Id::new("a").unwrap() }]);
        let second = agent.generate_patches(&form, &[], 10).unwrap();
        assert_eq!(second, vec![Patch::ClearField { field_id: Id::new("b").unwrap() }]);
        let third = agent.generate_patches(&form, &[], 10).unwrap();
        assert!(third.is_empty());
    }

    #[test]
    fn truncates_to_max_patches() {
        let mut agent = MockAgent::with_batches(vec![vec![
            Patch::ClearField { field_id: Id::new("a").unwrap() },
            Patch::ClearField { field_id: Id::new("b").unwrap() },
        ]]);
        let form = crate::parse::parse_form(
            "{% form id=\"main\" %}\n{% group id=\"g\" %}\n{% field kind=\"string\" id=\"a\" label=\"A\" %}\n{% /field %}\n{% /group %}\n{% /form %}\n",
        )
        .unwrap();
        let batch = agent.generate_patches(&form, &[], 1).unwrap();
        assert_eq!(batch.len(), 1);
    }
}

//! End-to-end scenarios exercising parse, patch, inspect, coercion,
//! and the fill harness together, the way a real form would hit them.

use std::collections::HashMap;

use markform_core::harness::{fill_form, FillConfig, FillStatus, MockAgent};
use markform_core::{
    apply_patches, filter_by_roles, inspect_issues, parse_form, serialize_form, ApplyStatus,
    CheckboxState, Id, OptionId, Patch,
};

fn id(s: &str) -> Id {
    Id::new(s).unwrap()
}

fn opt(s: &str) -> OptionId {
    OptionId::new(s).unwrap()
}

#[test]
fn basic_fill_answers_a_single_required_field() {
    let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="name" label="Name" required=true %}
{% /field %}
{% /group %}
{% /form %}
"#;
    let form = parse_form(input).unwrap();
    let patches = vec![Patch::SetString { field_id: id("name"), value: Some("Alice".into()) }];
    let result = apply_patches(&form, &patches);

    assert_eq!(result.status, ApplyStatus::Applied);
    let entry = result.new_form.field(&id("name")).unwrap();
    assert!(entry.value.state().is_answered());

    let progress = markform_core::progress_by_role(&result.new_form);
    let total_complete: usize = progress.iter().map(|p| p.completed_count).sum();
    let total_fields: usize = progress.iter().map(|p| p.field_count).sum();
    assert_eq!((total_complete, total_fields), (1, 1));

    let rendered = serialize_form(&result.new_form);
    assert!(rendered.contains("```value\nAlice\n```"));
}

#[test]
fn best_effort_batch_applies_what_it_can_and_reports_the_rest() {
    let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="name" label="Name" pattern="^[A-Z].*" %}
{% /field %}
{% field kind="number" id="age" label="Age" %}
{% /field %}
{% /group %}
{% /form %}
"#;
    let form = parse_form(input).unwrap();
    let patches = vec![
        Patch::SetString { field_id: id("name"), value: Some("alice".into()) },
        Patch::SetNumber { field_id: id("age"), value: Some(30.0) },
    ];
    let result = apply_patches(&form, &patches);

    assert_eq!(result.status, ApplyStatus::Partial);
    assert_eq!(result.applied_patches, vec![1]);
    assert_eq!(result.rejected_patches.len(), 1);
    assert_eq!(result.rejected_patches[0].patch_index, 0);
    assert!(result.rejected_patches[0].message.contains("pattern"));

    let age = result.new_form.field(&id("age")).unwrap();
    assert!(age.value.state().is_answered());
    let name = result.new_form.field(&id("name")).unwrap();
    assert!(!name.value.state().is_answered());
}

#[test]
fn checkbox_array_coerces_into_a_sparse_done_map_with_a_warning() {
    let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="checkboxes" id="tasks" label="Tasks" mode="all" %}
- [ ] a: A
- [ ] b: B
- [ ] c: C
{% /field %}
{% /group %}
{% /form %}
"#;
    let form = parse_form(input).unwrap();
    let patches = vec![Patch::SetMultiSelect { field_id: id("tasks"), value: vec![opt("a"), opt("c")] }];
    let result = apply_patches(&form, &patches);

    assert_eq!(result.status, ApplyStatus::Applied);
    assert_eq!(result.warnings.len(), 1);

    let entry = result.new_form.field(&id("tasks")).unwrap();
    let markform_core::FieldValue::Checkboxes { value, .. } = &entry.value else { panic!("expected checkboxes") };
    assert_eq!(value.get(&opt("a")), Some(&CheckboxState::Done));
    assert_eq!(value.get(&opt("c")), Some(&CheckboxState::Done));
    assert_ne!(value.get(&opt("b")).copied().unwrap_or(CheckboxState::Todo), CheckboxState::Done);
}

#[test]
fn blocking_checkpoint_gates_every_later_agent_field() {
    let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="checkboxes" id="approval" label="Approval" mode="all" required=true approvalMode="blocking" role="user" %}
- [ ] ok: Looks good
{% /field %}
{% field kind="string" id="summary" label="Summary" role="agent" %}
{% /field %}
{% field kind="string" id="next_steps" label="Next steps" role="agent" %}
{% /field %}
{% field kind="string" id="followup" label="Followup" role="agent" %}
{% /field %}
{% /group %}
{% /form %}
"#;
    let form = parse_form(input).unwrap();
    let issues = inspect_issues(&form);

    let agent_roles: std::collections::HashSet<String> = ["agent".to_string()].into_iter().collect();
    let scoped = filter_by_roles(&form, issues, &agent_roles);

    let unblocked: Vec<_> = scoped.iter().filter(|i| i.blocked_by.is_none()).collect();
    assert_eq!(unblocked.len(), 1);
    assert_eq!(unblocked[0].reference.as_str(), "approval");

    for later in ["summary", "next_steps", "followup"] {
        if let Some(issue) = scoped.iter().find(|i| i.reference.as_str() == later) {
            assert_eq!(issue.blocked_by.as_ref().map(|b| b.as_str()), Some("approval"));
        }
    }
}

#[test]
fn harness_stops_at_max_turns_when_the_agent_never_answers() {
    let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="name" label="Name" required=true %}
{% /field %}
{% /group %}
{% /form %}
"#;
    let form = parse_form(input).unwrap();
    let mut agent = MockAgent::new();
    let config = FillConfig { max_turns: 2, ..FillConfig::default() };
    let result = fill_form(&form, &mut agent, &config);

    assert_eq!(result.status, FillStatus::MaxTurns);
    assert_eq!(result.turns.len(), 2);
    assert_eq!(serialize_form(&result.new_form), serialize_form(&form));
}

#[test]
fn html_comment_syntax_round_trips_through_parse_and_serialize() {
    let input = "<!-- f:form id=\"main\" -->\n\
<!-- f:group id=\"g\" -->\n\
<!-- f:field kind=\"string\" id=\"x\" label=\"X\" -->\n\
```value\n\
hi\n\
```\n\
<!-- /f:field -->\n\
<!-- /f:group -->\n\
<!-- /f:form -->\n";

    let form = parse_form(input).unwrap();
    assert_eq!(form.syntax_style, markform_core::SyntaxStyle::HtmlComment);

    let rendered = serialize_form(&form);
    assert!(rendered.contains("<!-- f:field"));
    assert!(!rendered.contains("{% field"));

    let reparsed = parse_form(&rendered).unwrap();
    assert_eq!(reparsed.field(&id("x")).unwrap().value, form.field(&id("x")).unwrap().value);
}

#[test]
fn coercion_reports_but_does_not_crash_on_unknown_fields() {
    let input = r#"{% form id="main" %}
{% group id="g" %}
{% field kind="string" id="name" label="Name" %}
{% /field %}
{% /group %}
{% /form %}
"#;
    let form = parse_form(input).unwrap();
    let mut ctx = HashMap::new();
    ctx.insert("name".to_string(), serde_json::json!("Ada"));
    ctx.insert("ghost".to_string(), serde_json::json!("x"));
    let (patches, errors) = markform_core::coerce_input(&form, &ctx);

    assert_eq!(patches.len(), 1);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field_id, "ghost");
}

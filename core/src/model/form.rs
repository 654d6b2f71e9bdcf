//! The `ParsedForm` aggregate and its owned substructures (spec §3).
//!
//! `ParsedForm` is a pure ownership tree: `forms -> groups -> fields`.
//! Everything that needs to refer across the tree (documentation blocks,
//! patches, validation issues) does so through a string `Id`, resolved via
//! `idIndex`. There are no back-pointers (Design Notes, §9).

use std::collections::HashMap;

use crate::error::ParseError;
use crate::ids::{Id, OptionId};
use crate::model::field::{Field, FieldKind};
use crate::model::value::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxStyle {
    Markdoc,
    HtmlComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Interactive,
    Fill,
    Research,
}

impl RunMode {
    pub fn parse(s: &str) -> Option<RunMode> {
        match s {
            "interactive" => Some(RunMode::Interactive),
            "fill" => Some(RunMode::Fill),
            "research" => Some(RunMode::Research),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Interactive => "interactive",
            RunMode::Fill => "fill",
            RunMode::Research => "research",
        }
    }
}

/// `harness:` hints from frontmatter — all optional, the harness falls
/// back to `defaults.rs` for anything unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarnessHints {
    pub max_turns: Option<u32>,
    pub max_issues_per_turn: Option<usize>,
    pub max_fields_per_turn: Option<usize>,
    pub max_groups_per_turn: Option<usize>,
    pub max_patches_per_turn: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormMetadata {
    pub spec_version: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub roles: Vec<String>,
    pub role_instructions: HashMap<String, String>,
    pub run_mode: RunMode,
    pub harness: HarnessHints,
}

impl Default for FormMetadata {
    fn default() -> Self {
        FormMetadata {
            spec_version: crate::error::SPEC_VERSION.to_string(),
            title: None,
            description: None,
            roles: crate::defaults::DEFAULT_ROLES.iter().map(|s| s.to_string()).collect(),
            role_instructions: HashMap::new(),
            run_mode: RunMode::Fill,
            harness: HarnessHints::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum DocTag {
    Description,
    Instructions,
    Documentation,
}

impl DocTag {
    pub fn parse(s: &str) -> Option<DocTag> {
        match s {
            "description" => Some(DocTag::Description),
            "instructions" => Some(DocTag::Instructions),
            "documentation" => Some(DocTag::Documentation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocTag::Description => "description",
            DocTag::Instructions => "instructions",
            DocTag::Documentation => "documentation",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentationBlock {
    pub tag: DocTag,
    pub reference: Id,
    pub body_markdown: String,
}

/// One field plus its current value, owned by the enclosing group.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub field: Field,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldGroup {
    pub id: Id,
    pub title: String,
    pub fields: Vec<FieldEntry>,
    /// Defaults to `true`; governs report-mode export (§4.9).
    pub report: bool,
    /// Names of external hook validators declared for this group (§4.4).
    /// The engine treats each as opaque; a name with no matching
    /// registration is silently skipped.
    pub hook_names: Vec<String>,
}

impl FieldGroup {
    pub fn field(&self, id: &Id) -> Option<&FieldEntry> {
        self.fields.iter().find(|e| e.field.id() == id)
    }

    pub fn field_mut(&mut self, id: &Id) -> Option<&mut FieldEntry> {
        self.fields.iter_mut().find(|e| e.field.id() == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormDef {
    pub id: Id,
    pub groups: Vec<FieldGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Form,
    Group,
    Field,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdEntry {
    pub kind: IdKind,
    /// `[formId]`, `[formId, groupId]`, or `[formId, groupId, fieldId]`.
    pub path: Vec<String>,
}

/// The top-level aggregate. Exclusively owns every substructure (spec §3,
/// "Ownership"). Logically immutable: patch application and harness turns
/// produce a new value rather than mutating a shared one in place (§5).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedForm {
    pub metadata: FormMetadata,
    pub forms: Vec<FormDef>,
    pub documentation: Vec<DocumentationBlock>,
    pub syntax_style: SyntaxStyle,
    pub raw_frontmatter_order: Vec<String>,

    id_index: HashMap<String, IdEntry>,
    option_index: HashMap<String, (Id, OptionId)>,
    column_index: HashMap<String, (Id, Id, FieldKind)>,
    order_index: Vec<Id>,
}

impl ParsedForm {
    /// Construct from already-validated parts and build all indices. The
    /// parser is the only normal caller; the patch applicator instead
    /// clones an existing `ParsedForm` and calls `rebuild_indices`.
    pub fn new(
        metadata: FormMetadata,
        forms: Vec<FormDef>,
        documentation: Vec<DocumentationBlock>,
        syntax_style: SyntaxStyle,
    ) -> Result<Self, ParseError> {
        let mut form = ParsedForm {
            metadata,
            forms,
            documentation,
            syntax_style,
            raw_frontmatter_order: Vec::new(),
            id_index: HashMap::new(),
            option_index: HashMap::new(),
            column_index: HashMap::new(),
            order_index: Vec::new(),
        };
        form.rebuild_indices()?;
        Ok(form)
    }

    /// Rebuild `idIndex`/`optionIndex`/`columnIndex`/`orderIndex` from the
    /// current tree, and re-check the identifier-uniqueness and
    /// ref-resolution invariants. Called by the parser at construction and
    /// by the patch applicator after every batch (§3, "Indices owned by
    /// ParsedForm").
    pub fn rebuild_indices(&mut self) -> Result<(), ParseError> {
        let mut id_index = HashMap::new();
        let mut option_index = HashMap::new();
        let mut column_index = HashMap::new();
        let mut order_index = Vec::new();

        for form in &self.forms {
            insert_id(&mut id_index, form.id.as_str(), IdKind::Form, vec![form.id.to_string()])?;

            for group in &form.groups {
                insert_id(
                    &mut id_index,
                    group.id.as_str(),
                    IdKind::Group,
                    vec![form.id.to_string(), group.id.to_string()],
                )?;

                for entry in &group.fields {
                    let fid = entry.field.id();
                    insert_id(
                        &mut id_index,
                        fid.as_str(),
                        IdKind::Field,
                        vec![form.id.to_string(), group.id.to_string(), fid.to_string()],
                    )?;
                    order_index.push(fid.clone());

                    if let Some(options) = entry.field.options() {
                        let mut seen = std::collections::HashSet::new();
                        for opt in options {
                            if !seen.insert(opt.id.clone()) {
                                return Err(ParseError::DuplicateOptionId {
                                    field: fid.to_string(),
                                    option: opt.id.to_string(),
                                    line: 0,
                                });
                            }
                            option_index.insert(
                                format!("{}.{}", fid, opt.id),
                                (fid.clone(), opt.id.clone()),
                            );
                        }
                    }

                    if let Field::Table { column_ids, column_types, .. } = &entry.field {
                        for (cid, ctype) in column_ids.iter().zip(column_types.iter()) {
                            column_index.insert(
                                format!("{}.{}", fid, cid),
                                (fid.clone(), cid.clone(), entry.field.kind()),
                            );
                            let _ = ctype;
                        }
                    }
                }
            }
        }

        for doc in &self.documentation {
            if !id_index.contains_key(doc.reference.as_str()) {
                return Err(ParseError::UnresolvedRef {
                    reference: doc.reference.to_string(),
                    tag: doc.tag.as_str().to_string(),
                    line: 0,
                });
            }
        }
        let mut seen_doc = std::collections::HashSet::new();
        for doc in &self.documentation {
            let key = (doc.reference.clone(), doc.tag.as_str());
            if !seen_doc.insert(key) {
                return Err(ParseError::DuplicateDocumentation {
                    reference: doc.reference.to_string(),
                    tag: doc.tag.as_str().to_string(),
                    line: 0,
                });
            }
        }

        self.id_index = id_index;
        self.option_index = option_index;
        self.column_index = column_index;
        self.order_index = order_index;
        Ok(())
    }

    pub fn primary_form(&self) -> &FormDef {
        &self.forms[0]
    }

    pub fn primary_form_mut(&mut self) -> &mut FormDef {
        &mut self.forms[0]
    }

    pub fn order_index(&self) -> &[Id] {
        &self.order_index
    }

    pub fn id_index(&self) -> &HashMap<String, IdEntry> {
        &self.id_index
    }

    pub fn option_index(&self) -> &HashMap<String, (Id, OptionId)> {
        &self.option_index
    }

    pub fn resolve_option(&self, field_id: &str, option_id: &str) -> Option<(Id, OptionId)> {
        self.option_index
            .get(&format!("{}.{}", field_id, option_id))
            .cloned()
    }

    pub fn field(&self, id: &Id) -> Option<&FieldEntry> {
        self.forms.iter().flat_map(|f| &f.groups).find_map(|g| g.field(id))
    }

    pub fn field_mut(&mut self, id: &Id) -> Option<&mut FieldEntry> {
        self.forms
            .iter_mut()
            .flat_map(|f| &mut f.groups)
            .find_map(|g| g.field_mut(id))
    }

    pub fn group(&self, id: &Id) -> Option<&FieldGroup> {
        self.forms.iter().flat_map(|f| &f.groups).find(|g| &g.id == id)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldEntry> {
        self.forms.iter().flat_map(|f| &f.groups).flat_map(|g| &g.fields)
    }

    pub fn fields_mut(&mut self) -> impl Iterator<Item = &mut FieldEntry> {
        self.forms.iter_mut().flat_map(|f| &mut f.groups).flat_map(|g| &mut g.fields)
    }

    pub fn documentation_for(&self, id: &Id, tag: DocTag) -> Option<&DocumentationBlock> {
        self.documentation
            .iter()
            .find(|d| &d.reference == id && d.tag == tag)
    }

    /// Cheap structural counts reused by both the inspector (§4.6) and
    /// exports (§4.9) so neither re-implements the traversal.
    pub fn stats(&self) -> Stats {
        let mut s = Stats::default();
        for form in &self.forms {
            s.groups += form.groups.len();
            for group in &form.groups {
                s.fields += group.fields.len();
                for entry in &group.fields {
                    if entry.field.is_effectively_required() {
                        s.required += 1;
                        if entry.value.state().is_answered() {
                            s.completed += 1;
                        }
                    }
                    if let Some(opts) = entry.field.options() {
                        s.options += opts.len();
                    }
                    if let Field::Table { column_ids, .. } = &entry.field {
                        s.table_columns += column_ids.len();
                    }
                }
            }
        }
        s
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub groups: usize,
    pub fields: usize,
    pub options: usize,
    pub table_columns: usize,
    pub required: usize,
    pub completed: usize,
}

fn insert_id(
    index: &mut HashMap<String, IdEntry>,
    id: &str,
    kind: IdKind,
    path: Vec<String>,
) -> Result<(), ParseError> {
    if index.contains_key(id) {
        return Err(ParseError::DuplicateId {
            id: id.to_string(),
            line: 0,
        });
    }
    index.insert(id.to_string(), IdEntry { kind, path });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::field::FieldCommon;
    use crate::model::value::FieldValue;

    fn mk_form() -> ParsedForm {
        let field = Field::String {
            common: FieldCommon::new(Id::new("name").unwrap(), "Name"),
            min_length: None,
            max_length: None,
            pattern: None,
        };
        let value = FieldValue::empty_for(&field);
        let group = FieldGroup {
            id: Id::new("basics").unwrap(),
            title: "Basics".into(),
            fields: vec![FieldEntry { field, value }],
            report: true,
            hook_names: Vec::new(),
        };
        let form_def = FormDef {
            id: Id::new("main").unwrap(),
            groups: vec![group],
        };
        ParsedForm::new(
            FormMetadata::default(),
            vec![form_def],
            vec![],
            SyntaxStyle::Markdoc,
        )
        .unwrap()
    }

    #[test]
    fn builds_order_index() {
        let form = mk_form();
        assert_eq!(form.order_index().len(), 1);
        assert_eq!(form.order_index()[0].as_str(), "name");
    }

    #[test]
    fn duplicate_id_rejected() {
        let field1 = Field::String {
            common: FieldCommon::new(Id::new("dup").unwrap(), "A"),
            min_length: None,
            max_length: None,
            pattern: None,
        };
        let value1 = FieldValue::empty_for(&field1);
        let field2 = Field::Number {
            common: FieldCommon::new(Id::new("dup").unwrap(), "B"),
            min: None,
            max: None,
            integer: false,
        };
        let value2 = FieldValue::empty_for(&field2);
        let group = FieldGroup {
            id: Id::new("g").unwrap(),
            title: "G".into(),
            fields: vec![
                FieldEntry { field: field1, value: value1 },
                FieldEntry { field: field2, value: value2 },
            ],
            report: true,
            hook_names: Vec::new(),
        };
        let form_def = FormDef {
            id: Id::new("main").unwrap(),
            groups: vec![group],
        };
        let result = ParsedForm::new(FormMetadata::default(), vec![form_def], vec![], SyntaxStyle::Markdoc);
        assert!(result.is_err());
    }

    #[test]
    fn unresolved_doc_ref_rejected() {
        let form_def = FormDef {
            id: Id::new("main").unwrap(),
            groups: vec![],
        };
        let doc = DocumentationBlock {
            tag: DocTag::Description,
            reference: Id::new("ghost").unwrap(),
            body_markdown: "x".into(),
        };
        let result = ParsedForm::new(FormMetadata::default(), vec![form_def], vec![doc], SyntaxStyle::Markdoc);
        assert!(result.is_err());
    }
}

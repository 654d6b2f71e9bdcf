//! `markform` — a thin demo binary exercising the engine end to end.
//!
//! ```text
//! markform <path.form.md>              parse + print an inspect summary
//! markform --fill <path.form.md>       run the fill harness against a
//!                                      sibling <path>.answers.json
//! ```
//!
//! Argument parsing, interactive menus, and daemon integration are out of
//! scope here; this binary exists only to give the workspace a runnable
//! entry point over `markform-core`.

use std::path::{Path, PathBuf};
use std::process;

use markform_core::harness::{fill_form, FillConfig, MockAgent};
use markform_core::{coerce_input, parse_form, structure_summary, InputContext};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let result = match args.get(1).map(String::as_str) {
        Some("--fill") => match args.get(2) {
            Some(path) => run_fill(Path::new(path)),
            None => Err("markform --fill <path.form.md>: missing path".to_string()),
        },
        Some(path) if !path.starts_with('-') => run_inspect(Path::new(path)),
        _ => Err("usage: markform <path.form.md> | markform --fill <path.form.md>".to_string()),
    };

    if let Err(message) = result {
        eprintln!("markform: {}", message);
        process::exit(1);
    }
}

fn run_inspect(path: &Path) -> Result<(), String> {
    let form = load_form(path)?;
    let structure = structure_summary(&form);
    let issues = markform_core::inspect_issues(&form);

    println!(
        "{} — {} group(s), {} field(s) ({} required, {} completed)",
        path.display(),
        structure.group_count,
        structure.field_count,
        structure.required_count,
        structure.completed_count,
    );
    if issues.is_empty() {
        println!("no outstanding issues");
    } else {
        println!("{} issue(s):", issues.len());
        for issue in &issues {
            println!("  [{:?}] {}: {}", issue.priority, issue.reference, issue.message);
        }
    }
    Ok(())
}

fn run_fill(path: &Path) -> Result<(), String> {
    let form = load_form(path)?;
    let answers_path = answers_path_for(path);
    let input = load_answers(&answers_path)?;
    let (patches, errors) = coerce_input(&form, &input);
    for err in &errors {
        eprintln!("markform: coercion error for '{}': {:?}", err.field_id, err.kind);
    }

    let mut agent = MockAgent::with_batches(vec![patches]);
    let config = FillConfig::default();
    let result = fill_form(&form, &mut agent, &config);

    println!("fill status: {:?}", result.status);
    println!("turns run: {}", result.turns.len());
    if !result.warnings.is_empty() {
        println!("{} warning(s)", result.warnings.len());
    }

    let rendered = markform_core::serialize_form(&result.new_form);
    print!("{}", rendered);
    Ok(())
}

fn load_form(path: &Path) -> Result<markform_core::ParsedForm, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("reading '{}': {}", path.display(), e))?;
    parse_form(&text).map_err(|e| format!("parsing '{}': {}", path.display(), e))
}

fn load_answers(path: &Path) -> Result<InputContext, String> {
    if !path.exists() {
        return Ok(InputContext::new());
    }
    let text = std::fs::read_to_string(path).map_err(|e| format!("reading '{}': {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("parsing '{}': {}", path.display(), e))
}

fn answers_path_for(form_path: &Path) -> PathBuf {
    let stem = form_path.to_string_lossy();
    let stem = stem.strip_suffix(".form.md").unwrap_or(&stem);
    PathBuf::from(format!("{}.answers.json", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_path_replaces_form_suffix() {
        let path = answers_path_for(Path::new("/tmp/onboarding.form.md"));
        assert_eq!(path, PathBuf::from("/tmp/onboarding.answers.json"));
    }

    #[test]
    fn missing_answers_file_yields_empty_context() {
        let ctx = load_answers(Path::new("/nonexistent/path.answers.json")).unwrap();
        assert!(ctx.is_empty());
    }
}

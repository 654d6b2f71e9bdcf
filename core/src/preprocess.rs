//! L0 — syntax preprocessor (spec §4.1).
//!
//! Transparently rewrites HTML-comment tag syntax to canonical Markdoc
//! braces, skipping fenced code blocks and inline code spans. The state
//! machine that tracks fence/inline-code regions mirrors the delimiter
//! bookkeeping in the teacher's frontmatter extraction
//! (`skill/parse.rs::extract_frontmatter`), generalized from "find one
//! YAML fence" to "track fence state across every line".
//!
//! This stage never fails: ambiguous output (unbalanced markers) surfaces
//! later as an L1/L2 `ParseError` when the rewritten text fails to parse
//! as Markdoc (spec §4.1, "Fails with").

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::model::SyntaxStyle;

fn comment_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?x)
            <!--\s*f:(?P<scname>[A-Za-z][A-Za-z0-9_-]*)(?P<scattrs>(?:(?!-->).)*?)/-->
            |<!--\s*/f:(?P<clname>[A-Za-z][A-Za-z0-9_-]*)\s*-->
            |<!--\s*f:(?P<opname>[A-Za-z][A-Za-z0-9_-]*)(?P<opattrs>(?:(?!-->).)*?)-->
            |<!--\s*\#(?P<idid>[A-Za-z][A-Za-z0-9_-]*)\s*-->
            |<!--\s*\.(?P<clsname>[A-Za-z][A-Za-z0-9_-]*)\s*-->
            "#,
        )
        .expect("static preprocessor regex is valid")
    })
}

/// Run the preprocessor. Returns the Markdoc-brace text and which style the
/// input was actually written in (so the serializer can round-trip it).
pub fn preprocess(input: &str) -> (String, SyntaxStyle) {
    let mut out_lines: Vec<String> = Vec::new();
    let mut changed = false;
    let mut fence: Option<(char, usize)> = None;

    for line in input.split('\n') {
        if let Some((fch, flen)) = fence {
            out_lines.push(line.to_string());
            if let Some((ch2, len2)) = fence_open(line) {
                if ch2 == fch && len2 >= flen && fence_close_is_bare(line, len2) {
                    fence = None;
                }
            }
            continue;
        }

        if let Some((ch, len)) = fence_open(line) {
            fence = Some((ch, len));
            out_lines.push(line.to_string());
            continue;
        }

        let spans = code_spans(line);
        let (new_line, line_changed) = transform_line(line, &spans);
        changed |= line_changed;
        out_lines.push(new_line);
    }

    let style = if changed {
        SyntaxStyle::HtmlComment
    } else {
        SyntaxStyle::Markdoc
    };
    (out_lines.join("\n"), style)
}

pub(crate) fn fence_open(line: &str) -> Option<(char, usize)> {
    let indent = line.len() - line.trim_start().len();
    if indent > 3 {
        return None;
    }
    let trimmed = line.trim_start();
    let ch = trimmed.chars().next()?;
    if ch != '`' && ch != '~' {
        return None;
    }
    let run_len = trimmed.chars().take_while(|&c| c == ch).count();
    if run_len < 3 {
        return None;
    }
    if ch == '`' && trimmed[run_len..].contains('`') {
        // backtick info strings may not contain a backtick (CommonMark).
        return None;
    }
    Some((ch, run_len))
}

pub(crate) fn fence_close_is_bare(line: &str, run_len: usize) -> bool {
    let trimmed = line.trim_start();
    trimmed[run_len..].trim().is_empty()
}

fn code_spans(line: &str) -> Vec<(usize, usize)> {
    let bytes = line.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let mut j = i;
            while j < bytes.len() && bytes[j] == b'`' {
                j += 1;
            }
            let run_len = j - i;
            let mut k = j;
            let mut found = None;
            while k < bytes.len() {
                if bytes[k] == b'`' {
                    let close_start = k;
                    let mut m = k;
                    while m < bytes.len() && bytes[m] == b'`' {
                        m += 1;
                    }
                    if m - close_start == run_len {
                        found = Some(m);
                        break;
                    }
                    k = m;
                } else {
                    k += 1;
                }
            }
            match found {
                Some(end) => {
                    spans.push((i, end));
                    i = end;
                }
                None => i = j,
            }
        } else {
            i += 1;
        }
    }
    spans
}

fn overlaps(spans: &[(usize, usize)], range: std::ops::Range<usize>) -> bool {
    spans.iter().any(|&(s, e)| range.start < e && s < range.end)
}

fn transform_line(line: &str, spans: &[(usize, usize)]) -> (String, bool) {
    let mut changed = false;
    let out = comment_pattern().replace_all(line, |caps: &Captures| {
        let whole = caps.get(0).unwrap();
        if overlaps(spans, whole.range()) {
            return whole.as_str().to_string();
        }
        changed = true;
        if let Some(name) = caps.name("scname") {
            let attrs = caps.name("scattrs").map(|m| m.as_str().trim()).unwrap_or("");
            if attrs.is_empty() {
                format!("{{% {} /%}}", name.as_str())
            } else {
                format!("{{% {} {} /%}}", name.as_str(), attrs)
            }
        } else if let Some(name) = caps.name("clname") {
            format!("{{% /{} %}}", name.as_str())
        } else if let Some(name) = caps.name("opname") {
            let attrs = caps.name("opattrs").map(|m| m.as_str().trim()).unwrap_or("");
            if attrs.is_empty() {
                format!("{{% {} %}}", name.as_str())
            } else {
                format!("{{% {} {} %}}", name.as_str(), attrs)
            }
        } else if let Some(id) = caps.name("idid") {
            format!("{{% #{} %}}", id.as_str())
        } else if let Some(cls) = caps.name("clsname") {
            format!("{{% .{} %}}", cls.as_str())
        } else {
            whole.as_str().to_string()
        }
    });
    (out.into_owned(), changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_opening_tag() {
        let (out, style) = preprocess(r#"<!-- f:field kind="string" id="name" -->"#);
        assert_eq!(out, r#"{% field kind="string" id="name" %}"#);
        assert_eq!(style, SyntaxStyle::HtmlComment);
    }

    #[test]
    fn rewrites_closing_tag() {
        let (out, _) = preprocess("<!-- /f:field -->");
        assert_eq!(out, "{% /field %}");
    }

    #[test]
    fn rewrites_self_closing_tag() {
        let (out, _) = preprocess(r#"<!-- f:option id="a" label="A" /-->"#);
        assert_eq!(out, r#"{% option id="a" label="A" /%}"#);
    }

    #[test]
    fn rewrites_id_and_class_annotations() {
        let (out, _) = preprocess("<!-- #intro -->\n<!-- .highlight -->");
        assert_eq!(out, "{% #intro %}\n{% .highlight %}");
    }

    #[test]
    fn skips_fenced_code_block() {
        let input = "```\n<!-- f:field kind=\"string\" id=\"x\" -->\n```";
        let (out, style) = preprocess(input);
        assert_eq!(out, input);
        assert_eq!(style, SyntaxStyle::Markdoc);
    }

    #[test]
    fn skips_inline_code_span() {
        let input = "Use `<!-- f:field -->` literally.";
        let (out, style) = preprocess(input);
        assert_eq!(out, input);
        assert_eq!(style, SyntaxStyle::Markdoc);
    }

    #[test]
    fn plain_markdoc_stays_markdoc_style() {
        let input = "{% field kind=\"string\" id=\"x\" %}\n```value\nhi\n```\n{% /field %}";
        let (out, style) = preprocess(input);
        assert_eq!(out, input);
        assert_eq!(style, SyntaxStyle::Markdoc);
    }

    #[test]
    fn tilde_fence_tracked_like_backtick_fence() {
        let input = "~~~\n<!-- #x -->\n~~~";
        let (out, _) = preprocess(input);
        assert_eq!(out, input);
    }
}

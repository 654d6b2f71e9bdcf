//! Tokenizer for Markdoc brace syntax.

use crate::error::ParseError;
use crate::markdoc::ast::AttrValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    Open {
        name: String,
        attrs: Vec<(String, AttrValue)>,
        line: usize,
    },
    Close {
        name: String,
        line: usize,
    },
    SelfClose {
        name: String,
        attrs: Vec<(String, AttrValue)>,
        line: usize,
    },
}

/// Split `input` into text runs and tag tokens. Annotation tags (`#id`,
/// `.class`) are not part of the form vocabulary and are emitted as `Text`
/// carrying the original `{% ... %}` substring verbatim, so they round-trip
/// through L2/L3 untouched.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let fences = fenced_ranges(input);
    let mut tokens = Vec::new();
    let mut line = 1usize;
    let mut rest = input;
    let mut text_buf = String::new();

    loop {
        match rest.find("{%") {
            None => {
                text_buf.push_str(rest);
                break;
            }
            Some(start) => {
                let (before, after_open) = rest.split_at(start);
                let abs = input.len() - rest.len() + start;
                if in_fenced_range(&fences, abs) {
                    text_buf.push_str(before);
                    text_buf.push_str("{%");
                    line += before.matches('\n').count();
                    rest = &after_open[2..];
                    continue;
                }
                text_buf.push_str(before);
                line += before.matches('\n').count();

                let inner_start = &after_open[2..];
                let close_at = match inner_start.find("%}") {
                    Some(i) => i,
                    None => {
                        return Err(ParseError::UnclosedTag {
                            tag: inner_start.trim().to_string(),
                            line,
                        })
                    }
                };
                let raw = &inner_start[..close_at];
                let consumed_len = 2 + close_at + 2;
                let whole_tag = &after_open[..consumed_len];

                let trimmed = raw.trim();
                if trimmed.starts_with('#') || trimmed.starts_with('.') {
                    text_buf.push_str(whole_tag);
                } else if let Some(name) = trimmed.strip_prefix('/') {
                    flush_text(&mut tokens, &mut text_buf);
                    tokens.push(Token::Close {
                        name: name.trim().to_string(),
                        line,
                    });
                } else if let Some(body) = trimmed.strip_suffix('/') {
                    flush_text(&mut tokens, &mut text_buf);
                    let (name, attrs) = parse_head(body.trim_end(), line)?;
                    tokens.push(Token::SelfClose { name, attrs, line });
                } else {
                    flush_text(&mut tokens, &mut text_buf);
                    let (name, attrs) = parse_head(trimmed, line)?;
                    let open_line = line;
                    line += whole_tag.matches('\n').count();
                    let after_tag = &after_open[consumed_len..];

                    if is_process_false(&attrs) {
                        let (raw, close_line, remainder) =
                            scan_raw_until_close(after_tag, &name, line)?;
                        tokens.push(Token::Open { name: name.clone(), attrs, line: open_line });
                        if !raw.is_empty() {
                            tokens.push(Token::Text(raw.to_string()));
                        }
                        line = close_line;
                        tokens.push(Token::Close { name, line: close_line });
                        rest = remainder;
                        continue;
                    }

                    tokens.push(Token::Open { name, attrs, line: open_line });
                    rest = after_tag;
                    continue;
                }

                line += whole_tag.matches('\n').count();
                rest = &after_open[consumed_len..];
            }
        }
    }
    flush_text(&mut tokens, &mut text_buf);
    Ok(tokens)
}

/// Byte ranges of fenced code blocks (```` ``` ```` / `~~~`), so the tag
/// scanner can skip literal `{%`/`%}` sequences embedded in example code or
/// value fences — mirrors `preprocess::preprocess`'s own fence tracking.
fn fenced_ranges(input: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut fence: Option<(char, usize, usize)> = None;
    let mut offset = 0usize;
    for line in input.split_inclusive('\n') {
        let bare = line.strip_suffix('\n').unwrap_or(line);
        if let Some((fch, flen, start)) = fence {
            if let Some((ch2, len2)) = crate::preprocess::fence_open(bare) {
                if ch2 == fch && len2 >= flen && crate::preprocess::fence_close_is_bare(bare, len2) {
                    ranges.push((start, offset + line.len()));
                    fence = None;
                }
            }
        } else if let Some((ch, len)) = crate::preprocess::fence_open(bare) {
            fence = Some((ch, len, offset));
        }
        offset += line.len();
    }
    if let Some((_, _, start)) = fence {
        ranges.push((start, input.len()));
    }
    ranges
}

fn in_fenced_range(ranges: &[(usize, usize)], pos: usize) -> bool {
    ranges.iter().any(|&(s, e)| pos >= s && pos < e)
}

fn is_process_false(attrs: &[(String, AttrValue)]) -> bool {
    attrs
        .iter()
        .any(|(k, v)| k == "process" && matches!(v, AttrValue::Bool(false)))
}

/// Scan `s` (the text right after a `process=false` tag's opening `%}`) for
/// the literal closing `{% /<name> %}`, without tokenizing anything in
/// between. Returns `(raw_body, close_line, remainder_after_close)`.
fn scan_raw_until_close<'a>(
    s: &'a str,
    name: &str,
    start_line: usize,
) -> Result<(&'a str, usize, &'a str), ParseError> {
    let mut line = start_line;
    let mut search_from = 0usize;
    loop {
        let rel = match s[search_from..].find("{%") {
            Some(i) => search_from + i,
            None => {
                return Err(ParseError::UnclosedTag {
                    tag: name.to_string(),
                    line: start_line,
                })
            }
        };
        let after = &s[rel + 2..];
        let close_at = match after.find("%}") {
            Some(i) => i,
            None => {
                return Err(ParseError::UnclosedTag {
                    tag: name.to_string(),
                    line: start_line,
                })
            }
        };
        let trimmed = after[..close_at].trim();
        let tag_line = line + s[..rel].matches('\n').count();
        if trimmed.strip_prefix('/').map(|n| n.trim()) == Some(name) {
            let body = &s[..rel];
            let remainder = &after[close_at + 2..];
            return Ok((body, tag_line, remainder));
        }
        line = tag_line;
        search_from = rel + 2 + close_at + 2;
    }
}

fn flush_text(tokens: &mut Vec<Token>, buf: &mut String) {
    if !buf.is_empty() {
        tokens.push(Token::Text(std::mem::take(buf)));
    }
}

fn parse_head(s: &str, line: usize) -> Result<(String, Vec<(String, AttrValue)>), ParseError> {
    let mut chars = s.char_indices().peekable();
    let name_start = 0;
    let mut name_end = s.len();
    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            name_end = i;
            break;
        }
        chars.next();
    }
    let name = s[name_start..name_end].to_string();
    if name.is_empty() {
        return Err(ParseError::Other {
            source: None,
            line: Some(line),
            column: None,
            cause: "empty tag name".to_string(),
        });
    }
    let attrs = parse_attrs(s[name_end..].trim(), line)?;
    Ok((name, attrs))
}

fn parse_attrs(s: &str, line: usize) -> Result<Vec<(String, AttrValue)>, ParseError> {
    let mut attrs = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let key_start = i;
        while i < bytes.len() && ((bytes[i] as char).is_alphanumeric() || bytes[i] == b'_') {
            i += 1;
        }
        let key = &s[key_start..i];
        if key.is_empty() {
            return Err(ParseError::Other {
                source: None,
                line: Some(line),
                column: None,
                cause: format!("malformed attribute near {:?}", &s[i..]),
            });
        }
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            // bare attribute shorthand: `required` means `required=true`
            attrs.push((key.to_string(), AttrValue::Bool(true)));
            continue;
        }
        i += 1; // '='
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(ParseError::Other {
                source: None,
                line: Some(line),
                column: None,
                cause: format!("attribute '{}' has no value", key),
            });
        }
        if bytes[i] == b'"' {
            i += 1;
            let val_start = i;
            while i < bytes.len() && bytes[i] != b'"' {
                i += 1;
            }
            if i >= bytes.len() {
                return Err(ParseError::Other {
                    source: None,
                    line: Some(line),
                    column: None,
                    cause: format!("unterminated string value for attribute '{}'", key),
                });
            }
            let val = &s[val_start..i];
            i += 1;
            attrs.push((key.to_string(), AttrValue::Str(val.to_string())));
        } else {
            let val_start = i;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let raw = &s[val_start..i];
            let value = match raw {
                "true" => AttrValue::Bool(true),
                "false" => AttrValue::Bool(false),
                _ => match raw.parse::<f64>() {
                    Ok(n) => AttrValue::Num(n),
                    Err(_) => AttrValue::Str(raw.to_string()),
                },
            };
            attrs.push((key.to_string(), value));
        }
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_open_close_text() {
        let toks = tokenize("{% field id=\"x\" %}hi{% /field %}").unwrap();
        assert_eq!(toks.len(), 3);
        assert!(matches!(&toks[0], Token::Open { name, .. } if name == "field"));
        assert!(matches!(&toks[1], Token::Text(t) if t == "hi"));
        assert!(matches!(&toks[2], Token::Close { name, .. } if name == "field"));
    }

    #[test]
    fn self_closing_and_bool_shorthand_attrs() {
        let toks = tokenize("{% option id=\"a\" label=\"A\" required /%}").unwrap();
        match &toks[0] {
            Token::SelfClose { name, attrs, .. } => {
                assert_eq!(name, "option");
                assert_eq!(attrs[0], ("id".to_string(), AttrValue::Str("a".to_string())));
                assert_eq!(attrs[2], ("required".to_string(), AttrValue::Bool(true)));
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn numeric_and_boolean_attrs() {
        let toks = tokenize("{% field minDone=2 required=true %}").unwrap();
        match &toks[0] {
            Token::Open { attrs, .. } => {
                assert_eq!(attrs[0], ("minDone".to_string(), AttrValue::Num(2.0)));
                assert_eq!(attrs[1], ("required".to_string(), AttrValue::Bool(true)));
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn annotation_stays_in_text_stream() {
        let toks = tokenize("a {% #x %} b").unwrap();
        assert_eq!(toks, vec![Token::Text("a {% #x %} b".to_string())]);
    }

    #[test]
    fn unclosed_tag_errors() {
        let err = tokenize("{% field id=\"x\"").unwrap_err();
        assert!(matches!(err, ParseError::UnclosedTag { .. }));
    }

    #[test]
    fn fenced_code_block_is_not_tokenized() {
        let input = "before\n```value\nliteral {% looks-like-a-tag %} text\n```\nafter";
        let toks = tokenize(input).unwrap();
        assert_eq!(toks, vec![Token::Text(input.to_string())]);
    }

    #[test]
    fn process_false_body_is_not_tokenized() {
        let toks = tokenize(r#"{% description process=false %}see {% field kind="string" %}{% /description %}"#).unwrap();
        assert_eq!(toks.len(), 3);
        assert!(matches!(&toks[0], Token::Open { name, .. } if name == "description"));
        assert!(matches!(&toks[1], Token::Text(t) if t == "see {% field kind=\"string\" %}"));
        assert!(matches!(&toks[2], Token::Close { name, .. } if name == "description"));
    }
}

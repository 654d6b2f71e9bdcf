//! The Markdoc tag tree and the stack-based builder that assembles it from
//! tokens. Mirrors the teacher's frontmatter extraction in that both are a
//! single forward scan with an explicit stack of open delimiters rather
//! than a general-purpose grammar — Markdoc tags never overlap and nest
//! strictly, so that's all this needs.

use crate::error::ParseError;
use crate::markdoc::lexer::Token;

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Bool(bool),
    Num(f64),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            AttrValue::Num(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    pub attrs: Vec<(String, AttrValue)>,
    pub line: usize,
    pub children: Vec<Node>,
}

impl Tag {
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(AttrValue::as_str)
    }

    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.attr(key).and_then(AttrValue::as_bool)
    }

    pub fn attr_num(&self, key: &str) -> Option<f64> {
        self.attr(key).and_then(AttrValue::as_num)
    }

    /// The tag's children flattened to their concatenated raw text —
    /// correct for leaf tags (`description`, `documentation`, `instructions`,
    /// `field`) whose bodies never contain further Markdoc tags.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .map(|n| match n {
                Node::Text(t) => t.as_str(),
                Node::Tag(_) => "",
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Tag(Tag),
}

struct Frame {
    name: String,
    attrs: Vec<(String, AttrValue)>,
    line: usize,
    children: Vec<Node>,
}

/// Build a forest of [`Node`]s from a token stream, matching each `Open`
/// with its `Close` by name via an explicit stack.
pub fn build(tokens: Vec<Token>) -> Result<Vec<Node>, ParseError> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for tok in tokens {
        match tok {
            Token::Text(t) => push_node(&mut stack, &mut root, Node::Text(t)),
            Token::SelfClose { name, attrs, line } => push_node(
                &mut stack,
                &mut root,
                Node::Tag(Tag {
                    name,
                    attrs,
                    line,
                    children: Vec::new(),
                }),
            ),
            Token::Open { name, attrs, line } => stack.push(Frame {
                name,
                attrs,
                line,
                children: Vec::new(),
            }),
            Token::Close { name, line } => {
                let frame = stack.pop().ok_or_else(|| ParseError::UnclosedTag {
                    tag: name.clone(),
                    line,
                })?;
                if frame.name != name {
                    return Err(ParseError::UnclosedTag {
                        tag: frame.name,
                        line: frame.line,
                    });
                }
                push_node(
                    &mut stack,
                    &mut root,
                    Node::Tag(Tag {
                        name: frame.name,
                        attrs: frame.attrs,
                        line: frame.line,
                        children: frame.children,
                    }),
                );
            }
        }
    }

    if let Some(frame) = stack.pop() {
        return Err(ParseError::UnclosedTag {
            tag: frame.name,
            line: frame.line,
        });
    }
    Ok(root)
}

fn push_node(stack: &mut [Frame], root: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(frame) => frame.children.push(node),
        None => root.push(node),
    }
}

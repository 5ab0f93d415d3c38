//! Pattern tree compiler.
//!
//! Walks the markup produced by the lexer and turns every node into a
//! [`PatternNode`], recursing into children and along sibling chains.

use phf::{Map, phf_map};
use regex::Regex;

use crate::document::{Document, MarkupError, NodeId, NodeKind, ReadMode};

use super::ast::{Kind, PatternNode};
use super::lexer::{self, OR, REGEX, SOMETHING, VARIABLE};

/// Errors that can occur while compiling a template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateError {
    UnterminatedOperator { token: String, offset: usize },
    UnexpectedClose { token: String, offset: usize },
    MismatchedClose { expected: String, found: String, offset: usize },
    UnterminatedRegex { offset: usize },
    EmptyRegex { offset: usize },
    InvalidCaptureName { name: String, offset: usize },
    OptionOutsideAlternative { offset: usize },
    MarkerWithContent(&'static str),
    MissingAttribute { marker: &'static str, attribute: &'static str },
    InvalidRegex { expression: String, message: String },
    EmptyTemplate,
    Markup(MarkupError),
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnterminatedOperator { token, offset } => {
                write!(f, "Operator {token} at byte {offset} is never closed")
            }
            Self::UnexpectedClose { token, offset } => {
                write!(f, "Closing operator {token} at byte {offset} has nothing to close")
            }
            Self::MismatchedClose {
                expected,
                found,
                offset,
            } => write!(
                f,
                "Found {found} at byte {offset} while {expected} is still open"
            ),
            Self::UnterminatedRegex { offset } => {
                write!(f, "Regular expression at byte {offset} is missing its closing '/}}'")
            }
            Self::EmptyRegex { offset } => write!(f, "Empty regular expression at byte {offset}"),
            Self::InvalidCaptureName { name, offset } => {
                write!(f, "Invalid capture name {name:?} at byte {offset}")
            }
            Self::OptionOutsideAlternative { offset } => {
                write!(f, "{{or}} at byte {offset} is not inside {{either}}")
            }
            Self::MarkerWithContent(marker) => write!(f, "{marker} cannot have content"),
            Self::MissingAttribute { marker, attribute } => {
                write!(f, "{marker} is missing its {attribute:?} attribute")
            }
            Self::InvalidRegex {
                expression,
                message,
            } => write!(f, "Invalid regular expression /{expression}/: {message}"),
            Self::EmptyTemplate => write!(f, "Template is empty"),
            Self::Markup(err) => write!(f, "Template markup error: {err}"),
        }
    }
}

impl std::error::Error for TemplateError {}

impl From<MarkupError> for TemplateError {
    fn from(err: MarkupError) -> Self {
        Self::Markup(err)
    }
}

/// Reserved element names produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Something,
    But,
    Many,
    Scope,
    Variable,
    Regex,
    Either,
    Or,
}

static MARKERS: Map<&'static str, Marker> = phf_map! {
    "ep-something" => Marker::Something,
    "ep-but" => Marker::But,
    "ep-many" => Marker::Many,
    "ep-scope" => Marker::Scope,
    "ep-variable" => Marker::Variable,
    "ep-regex" => Marker::Regex,
    "ep-either" => Marker::Either,
    "ep-or" => Marker::Or,
};

/// Compile template source (markup with `{...}` operators) into a pattern
/// tree.
pub fn compile(source: &str) -> Result<PatternNode, TemplateError> {
    let markup = lexer::translate(source)?;
    let doc = Document::read(&markup, ReadMode::Strict)?;
    compile_document(&doc)
}

/// Compile an already-read synthetic element tree.
pub fn compile_document(doc: &Document) -> Result<PatternNode, TemplateError> {
    let root = Compiler { doc }.compile_chain(doc.root())?;
    let root = root.ok_or(TemplateError::EmptyTemplate)?;
    warn_ignored_continuations(&root);
    Ok(root)
}

struct Compiler<'a> {
    doc: &'a Document,
}

impl Compiler<'_> {
    /// Compile `first` and all of its following siblings.
    fn compile_chain(&self, first: Option<NodeId>) -> Result<Option<PatternNode>, TemplateError> {
        let nodes: Vec<NodeId> = self.doc.siblings(first).collect();
        let mut chain = None;
        for &id in nodes.iter().rev() {
            chain = Some(self.compile_node(id)?.with_next(chain));
        }
        Ok(chain)
    }

    fn compile_node(&self, id: NodeId) -> Result<PatternNode, TemplateError> {
        let name = match self.doc.kind(id) {
            NodeKind::Text(text) => return Ok(PatternNode::new(Kind::Literal(text.clone()))),
            NodeKind::Element { name, .. } => name.as_str(),
        };
        let children = || self.compile_chain(self.doc.first_child(id));

        let Some(&marker) = MARKERS.get(name) else {
            return Ok(PatternNode::new(Kind::Element(name.to_string())).with_child(children()?));
        };
        let node = match marker {
            Marker::Something => {
                self.expect_empty(id, SOMETHING)?;
                PatternNode::new(Kind::Wildcard)
            }
            Marker::Or => {
                self.expect_empty(id, OR)?;
                PatternNode::new(Kind::AlternativeOption)
            }
            Marker::Regex => {
                self.expect_empty(id, REGEX)?;
                let expression = self.doc.attribute(id, "value").ok_or(
                    TemplateError::MissingAttribute {
                        marker: REGEX,
                        attribute: "value",
                    },
                )?;
                PatternNode::new(Kind::Pattern(compile_regex(expression)?))
            }
            Marker::Variable => {
                let name = self.doc.attribute(id, "name").ok_or(
                    TemplateError::MissingAttribute {
                        marker: VARIABLE,
                        attribute: "name",
                    },
                )?;
                PatternNode::new(Kind::Capture(name.to_string())).with_child(children()?)
            }
            Marker::But => PatternNode::new(Kind::WildcardExcept).with_child(children()?),
            Marker::Many => PatternNode::new(Kind::Repeat).with_child(children()?),
            Marker::Scope => PatternNode::new(Kind::Scope).with_child(children()?),
            Marker::Either => PatternNode::new(Kind::Alternative).with_child(children()?),
        };
        Ok(node)
    }

    fn expect_empty(&self, id: NodeId, marker: &'static str) -> Result<(), TemplateError> {
        match self.doc.first_child(id) {
            Some(_) => Err(TemplateError::MarkerWithContent(marker)),
            None => Ok(()),
        }
    }
}

fn compile_regex(expression: &str) -> Result<Regex, TemplateError> {
    Regex::new(expression).map_err(|err| TemplateError::InvalidRegex {
        expression: expression.to_string(),
        message: err.to_string(),
    })
}

/// Text, regex, scope and capture nodes end their chain; anything written
/// after them at the same level is never matched.
fn warn_ignored_continuations(node: &PatternNode) {
    for current in node.chain() {
        if current.kind.ignores_next()
            && let Some(next) = current.next()
        {
            log::warn!(
                "{} is followed by {}, which will never be matched",
                current.kind,
                next.kind
            );
        }
        if let Some(child) = current.child() {
            warn_ignored_continuations(child);
        }
    }
}

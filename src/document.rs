//! Arena-backed markup tree used for both templates and input documents.
//!
//! Navigation skips text nodes made only of whitespace, so indentation in
//! the source never takes part in matching. The tree itself keeps them.
//!
//! Every non-empty tree is normalized the way an HTML parser would: a
//! fragment is wrapped in `<html>`, and content outside `<head>` is wrapped
//! in `<body>` when no `<body>` was written. A bare `<div></div>` therefore
//! reads the same as `<html><body><div></div></body></html>`.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};

/// Elements that never take children, whether or not they are written
/// self-closed.
const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const HTML: &str = "html";
const HEAD: &str = "head";
const BODY: &str = "body";

/// Index of a node in its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub first_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// Nesting depth; the `<html>` root is at depth 0.
    pub depth: usize,
}

/// How strictly end tags are checked while reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Recover from mismatched and missing end tags, like an HTML parser.
    Lenient,
    /// Reject any unbalanced markup.
    Strict,
}

/// Errors raised while reading markup into a [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupError {
    Syntax { position: usize, message: String },
    UnmatchedEndTag { position: usize, name: String },
    MismatchedEndTag { position: usize, expected: String, found: String },
    UnclosedElement(String),
    UnknownCharset(String),
}

impl std::fmt::Display for MarkupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax { position, message } => {
                write!(f, "Markup syntax error at byte {position}: {message}")
            }
            Self::UnmatchedEndTag { position, name } => {
                write!(f, "End tag </{name}> at byte {position} has no start tag")
            }
            Self::MismatchedEndTag {
                position,
                expected,
                found,
            } => write!(
                f,
                "Expected </{expected}> at byte {position} but found </{found}>"
            ),
            Self::UnclosedElement(name) => write!(f, "Element <{name}> is never closed"),
            Self::UnknownCharset(label) => write!(f, "Unknown character set: {label:?}"),
        }
    }
}

impl std::error::Error for MarkupError {}

/// An ordered tree of element and text nodes, rooted at `<html>` unless
/// the source held nothing but blank text.
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
    first_root: Option<NodeId>,
}

impl Document {
    /// Read an HTML-like document, recovering from sloppy end tags.
    pub fn parse(source: &str) -> Result<Self, MarkupError> {
        Self::read(source, ReadMode::Lenient)
    }

    /// Decode `bytes` using the WHATWG encoding `charset` (UTF-8 when `None`)
    /// and read the result leniently.
    pub fn decode(bytes: &[u8], charset: Option<&str>) -> Result<Self, MarkupError> {
        let encoding = match charset {
            None => encoding_rs::UTF_8,
            Some(label) => encoding_rs::Encoding::for_label(label.trim().as_bytes())
                .ok_or_else(|| MarkupError::UnknownCharset(label.to_string()))?,
        };
        let (text, used, had_errors) = encoding.decode(bytes);
        if had_errors {
            log::warn!("Malformed {} sequences replaced while decoding", used.name());
        }
        Self::parse(&text)
    }

    /// Read markup with the given end-tag policy.
    pub fn read(source: &str, mode: ReadMode) -> Result<Self, MarkupError> {
        let mut reader = Reader::from_str(source);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        let mut builder = Builder::new(mode);
        loop {
            let position = reader.buffer_position() as usize;
            let event = reader.read_event().map_err(|err| MarkupError::Syntax {
                position,
                message: err.to_string(),
            })?;
            match event {
                Event::Start(start) => {
                    let (name, attributes) = element_parts(&start);
                    if is_void(&name) {
                        builder.leaf(NodeKind::Element { name, attributes });
                    } else {
                        builder.open(name, attributes);
                    }
                }
                Event::Empty(start) => {
                    let (name, attributes) = element_parts(&start);
                    builder.leaf(NodeKind::Element { name, attributes });
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).to_lowercase();
                    builder.close(&name, position)?;
                }
                Event::Text(text) => builder.text(&decode_text(&text)),
                Event::CData(data) => builder.text(&String::from_utf8_lossy(&data)),
                Event::Eof => break,
                // Comments, declarations, doctypes and processing instructions
                // never reach the tree.
                _ => {}
            }
        }
        builder.finish()
    }

    /// The `<html>` element, or `None` for an empty document.
    pub fn root(&self) -> Option<NodeId> {
        self.skip_blank(self.first_root)
    }

    /// The first non-blank child of `id`.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.skip_blank(self.node(id).first_child)
    }

    /// The next non-blank sibling of `id`.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.skip_blank(self.node(id).next_sibling)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.node(id).depth
    }

    /// Element name, or `None` for text nodes.
    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { name, .. } => Some(name),
            NodeKind::Text(_) => None,
        }
    }

    /// Text content, or `None` for elements.
    pub fn text_of(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn is_element_named(&self, id: NodeId, tag: &str) -> bool {
        self.name_of(id) == Some(tag)
    }

    /// Iterate `id` and its following non-blank siblings.
    pub fn siblings(&self, id: Option<NodeId>) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(id, |&current| self.next_sibling(current))
    }

    /// Short human-readable label for diagnostics: `<name>` or a quoted
    /// text excerpt.
    pub fn describe(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Element { name, .. } => format!("<{name}>"),
            NodeKind::Text(text) => {
                let excerpt: String = text.trim().chars().take(24).collect();
                format!("{excerpt:?}")
            }
        }
    }

    fn is_blank(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Text(text) if text.trim().is_empty())
    }

    fn skip_blank(&self, mut id: Option<NodeId>) -> Option<NodeId> {
        while let Some(current) = id
            && self.is_blank(current)
        {
            id = self.node(current).next_sibling;
        }
        id
    }
}

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

fn element_parts(start: &BytesStart<'_>) -> (String, Vec<(String, String)>) {
    let name = String::from_utf8_lossy(start.name().as_ref()).to_lowercase();
    let attributes = start
        .html_attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_lowercase();
            let raw = String::from_utf8_lossy(&attr.value);
            (key, decode_entities(&raw).into_owned())
        })
        .collect();
    (name, attributes)
}

fn decode_text(raw: &[u8]) -> String {
    decode_entities(&String::from_utf8_lossy(raw)).into_owned()
}

/// Resolve XML and HTML5 entity references. A reference that cannot be
/// resolved stays as written; the others around it are still decoded.
fn decode_entities(raw: &str) -> Cow<'_, str> {
    if let Ok(text) = unescape_with(raw, resolve_html5_entity) {
        return text;
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let resolved = tail.find(';').and_then(|end| {
            unescape_with(&tail[..=end], resolve_html5_entity)
                .ok()
                .map(|text| (text.into_owned(), end + 1))
        });
        match resolved {
            Some((text, len)) => {
                out.push_str(&text);
                rest = &tail[len..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Incremental tree construction from the reader's event stream.
struct Builder {
    mode: ReadMode,
    nodes: Vec<Node>,
    first_root: Option<NodeId>,
    /// Open elements, innermost last.
    open: Vec<NodeId>,
    /// Last node appended at each open level; index 0 is the top level.
    last_child: Vec<Option<NodeId>>,
}

impl Builder {
    fn new(mode: ReadMode) -> Self {
        Self {
            mode,
            nodes: Vec::new(),
            first_root: None,
            open: Vec::new(),
            last_child: vec![None],
        }
    }

    fn append(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            first_child: None,
            next_sibling: None,
            depth: self.open.len(),
        });
        let level = self.open.len();
        match self.last_child[level] {
            Some(prev) => self.nodes[prev.0].next_sibling = Some(id),
            None => match self.open.last() {
                Some(&parent) => self.nodes[parent.0].first_child = Some(id),
                None => self.first_root = Some(id),
            },
        }
        self.last_child[level] = Some(id);
        id
    }

    fn leaf(&mut self, kind: NodeKind) {
        self.append(kind);
    }

    fn open(&mut self, name: String, attributes: Vec<(String, String)>) {
        let id = self.append(NodeKind::Element { name, attributes });
        self.open.push(id);
        self.last_child.push(None);
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        // Adjacent text events (e.g. text around CDATA) form one node.
        let level = self.open.len();
        if let Some(prev) = self.last_child[level]
            && let NodeKind::Text(existing) = &mut self.nodes[prev.0].kind
        {
            existing.push_str(text);
            return;
        }
        self.append(NodeKind::Text(text.to_string()));
    }

    fn name_of(&self, id: NodeId) -> &str {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => name,
            NodeKind::Text(_) => "",
        }
    }

    fn close(&mut self, name: &str, position: usize) -> Result<(), MarkupError> {
        if is_void(name) {
            return Ok(());
        }
        let Some(index) = self.open.iter().rposition(|&id| self.name_of(id) == name) else {
            return match self.mode {
                ReadMode::Lenient => Ok(()),
                ReadMode::Strict => Err(MarkupError::UnmatchedEndTag {
                    position,
                    name: name.to_string(),
                }),
            };
        };
        if self.mode == ReadMode::Strict && index + 1 != self.open.len() {
            let innermost = self.open[self.open.len() - 1];
            return Err(MarkupError::MismatchedEndTag {
                position,
                expected: self.name_of(innermost).to_string(),
                found: name.to_string(),
            });
        }
        self.open.truncate(index);
        self.last_child.truncate(index + 1);
        Ok(())
    }

    /// Append an element that is not linked into the tree yet.
    fn detached(&mut self, name: &str, depth: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind: NodeKind::Element {
                name: name.to_string(),
                attributes: Vec::new(),
            },
            first_child: None,
            next_sibling: None,
            depth,
        });
        id
    }

    fn non_blank(&self, first: Option<NodeId>) -> Vec<NodeId> {
        std::iter::successors(first, |id| self.nodes[id.0].next_sibling)
            .filter(|id| {
                !matches!(&self.nodes[id.0].kind, NodeKind::Text(text) if text.trim().is_empty())
            })
            .collect()
    }

    /// Push `first`, its following siblings and all their descendants one
    /// level down.
    fn deepen(&mut self, first: Option<NodeId>) {
        let mut pending: Vec<NodeId> = first.into_iter().collect();
        while let Some(id) = pending.pop() {
            let node = &mut self.nodes[id.0];
            node.depth += 1;
            pending.extend(node.first_child);
            pending.extend(node.next_sibling);
        }
    }

    /// Give the tree a single `<html>` root holding a `<body>`.
    fn normalize(&mut self) {
        let top = self.non_blank(self.first_root);
        if top.is_empty() {
            return;
        }
        let html = match top.as_slice() {
            [only] if self.name_of(*only) == HTML => *only,
            _ => {
                self.deepen(self.first_root);
                let html = self.detached(HTML, 0);
                self.nodes[html.0].first_child = self.first_root;
                self.first_root = Some(html);
                html
            }
        };

        let children = self.non_blank(self.nodes[html.0].first_child);
        if children.iter().any(|&id| self.name_of(id) == BODY) {
            return;
        }
        let body = self.detached(BODY, 1);
        match children.first() {
            Some(&head) if self.name_of(head) == HEAD => {
                let rest = self.nodes[head.0].next_sibling;
                self.deepen(rest);
                self.nodes[body.0].first_child = rest;
                self.nodes[head.0].next_sibling = Some(body);
            }
            _ => {
                let rest = self.nodes[html.0].first_child;
                self.deepen(rest);
                self.nodes[body.0].first_child = rest;
                self.nodes[html.0].first_child = Some(body);
            }
        }
    }

    fn finish(mut self) -> Result<Document, MarkupError> {
        if self.mode == ReadMode::Strict
            && let Some(&innermost) = self.open.last()
        {
            return Err(MarkupError::UnclosedElement(
                self.name_of(innermost).to_string(),
            ));
        }
        self.normalize();
        Ok(Document {
            nodes: self.nodes,
            first_root: self.first_root,
        })
    }
}

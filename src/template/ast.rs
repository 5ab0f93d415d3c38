//! Pattern tree types.

use regex::Regex;

/// One compiled template node.
///
/// A node owns its first child and the rest of its sibling chain, so a
/// whole template is a single boxed first-child/next-sibling tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternNode {
    pub kind: Kind,
    pub child: Option<Box<PatternNode>>,
    pub next: Option<Box<PatternNode>>,
}

#[derive(Debug, Clone)]
pub enum Kind {
    /// An element with this tag name.
    Element(String),
    /// A text node with exactly this content.
    Literal(String),
    /// A run of text and line breaks searched with this expression.
    Pattern(Regex),
    /// `{...}`: skip any number of siblings.
    Wildcard,
    /// `{...but}`: skip siblings, failing on any that match the child.
    WildcardExcept,
    /// `{many}`: the child, one or more times.
    Repeat,
    /// `{scope}`: captures in the child land in a fresh frame.
    Scope,
    /// `{$name}`: bind the child's matched text to the name.
    Capture(String),
    /// `{either}`: the first matching branch of the child chain.
    Alternative,
    /// `{or}`: branch separator inside an alternative.
    AlternativeOption,
}

impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Element(a), Self::Element(b)) => a == b,
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            (Self::Capture(a), Self::Capture(b)) => a == b,
            (Self::Wildcard, Self::Wildcard)
            | (Self::WildcardExcept, Self::WildcardExcept)
            | (Self::Repeat, Self::Repeat)
            | (Self::Scope, Self::Scope)
            | (Self::Alternative, Self::Alternative)
            | (Self::AlternativeOption, Self::AlternativeOption) => true,
            _ => false,
        }
    }
}

impl Kind {
    /// Leaf-like kinds never look at their `next` sibling while matching.
    pub fn ignores_next(&self) -> bool {
        matches!(
            self,
            Self::Literal(_) | Self::Pattern(_) | Self::Scope | Self::Capture(_)
        )
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Element(name) => write!(f, "<{name}>"),
            Self::Literal(text) => write!(f, "{text:?}"),
            Self::Pattern(regex) => write!(f, "{{/{}/}}", regex.as_str()),
            Self::Wildcard => write!(f, "{{...}}"),
            Self::WildcardExcept => write!(f, "{{...but}}"),
            Self::Repeat => write!(f, "{{many}}"),
            Self::Scope => write!(f, "{{scope}}"),
            Self::Capture(name) => write!(f, "{{${name}}}"),
            Self::Alternative => write!(f, "{{either}}"),
            Self::AlternativeOption => write!(f, "{{or}}"),
        }
    }
}

impl PatternNode {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            child: None,
            next: None,
        }
    }

    pub fn with_child(mut self, child: Option<PatternNode>) -> Self {
        self.child = child.map(Box::new);
        self
    }

    pub fn with_next(mut self, next: Option<PatternNode>) -> Self {
        self.next = next.map(Box::new);
        self
    }

    pub fn child(&self) -> Option<&PatternNode> {
        self.child.as_deref()
    }

    pub fn next(&self) -> Option<&PatternNode> {
        self.next.as_deref()
    }

    /// Iterate this node and its following siblings.
    pub fn chain(&self) -> impl Iterator<Item = &PatternNode> {
        std::iter::successors(Some(self), |node| node.next())
    }

    /// Every capture name used anywhere in this subtree and its siblings,
    /// in template order, without duplicates.
    pub fn capture_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_capture_names(&mut names);
        names
    }

    fn collect_capture_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        for node in self.chain() {
            if let Kind::Capture(name) = &node.kind
                && !names.contains(&name.as_str())
            {
                names.push(name);
            }
            if let Some(child) = node.child() {
                child.collect_capture_names(names);
            }
        }
    }
}

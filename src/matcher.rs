//! Backtracking matcher: evaluate a pattern tree against a document tree.
//!
//! Every step matches a pattern node, together with the rest of its sibling
//! chain, against a document position and the siblings after it. The answer
//! is three-valued: the pattern and the document ran out together
//! ([`MatchResult::Valid`]), the pattern ran out first
//! ([`MatchResult::Partial`], carrying the first unconsumed node), or the
//! document was rejected ([`MatchResult::Invalid`]). Combinators are built
//! purely out of those three answers; nothing is signalled out of band.

use regex::Regex;

use crate::dispatch::CaptureDispatcher;
use crate::document::{Document, NodeId, NodeKind};
use crate::scope::ScopeStack;
use crate::template::{Kind, PatternNode};

/// Elements that read as a newline inside a regex text run.
const LINE_BREAK: &str = "br";

/// Outcome of one match attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// Pattern and document were both exhausted. Leaf kinds carry the text
    /// they matched.
    Valid(Option<String>),
    /// The pattern was exhausted; matching stopped before this node.
    Partial(NodeId),
    Invalid,
}

impl MatchResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, MatchResult::Valid(_))
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, MatchResult::Partial(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, MatchResult::Invalid)
    }

    /// The first unconsumed node of a partial match.
    pub fn tail(&self) -> Option<NodeId> {
        match self {
            MatchResult::Partial(tail) => Some(*tail),
            _ => None,
        }
    }

    /// Text matched by a leaf, if any.
    pub fn capture(&self) -> Option<&str> {
        match self {
            MatchResult::Valid(text) => text.as_deref(),
            _ => None,
        }
    }
}

/// Everything a top-level match produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub result: MatchResult,
    /// The scope stack as returned from the root of the pattern.
    pub scope: ScopeStack,
    /// The deepest node at which some part of the pattern ran out, useful
    /// for locating where template and document diverged.
    pub deepest_partial: Option<NodeId>,
}

/// Match `pattern` against the whole of `doc`, starting from a fresh scope.
pub fn run(
    pattern: &PatternNode,
    doc: &Document,
    dispatcher: &mut CaptureDispatcher<'_>,
) -> Outcome {
    let mut matcher = Matcher {
        doc,
        dispatcher,
        deepest_partial: None,
    };
    let (result, scope) = matcher.match_node(Some(pattern), doc.root(), ScopeStack::new());
    Outcome {
        result,
        scope,
        deepest_partial: matcher.deepest_partial,
    }
}

type Step = (MatchResult, ScopeStack);

struct Matcher<'d, 'h, 'r> {
    doc: &'d Document,
    dispatcher: &'r mut CaptureDispatcher<'h>,
    deepest_partial: Option<NodeId>,
}

impl Matcher<'_, '_, '_> {
    fn match_node(
        &mut self,
        pattern: Option<&PatternNode>,
        pos: Option<NodeId>,
        scope: ScopeStack,
    ) -> Step {
        let Some(node) = pattern else {
            return match pos {
                None => (MatchResult::Valid(None), scope),
                Some(tail) => {
                    self.note_partial(tail);
                    (MatchResult::Partial(tail), scope)
                }
            };
        };
        match &node.kind {
            Kind::Element(tag) => self.element(node, tag, pos, scope),
            Kind::Literal(text) => self.literal(text, pos, scope),
            Kind::Pattern(regex) => self.pattern(regex, pos, scope),
            Kind::Wildcard => self.wildcard(node, pos, scope),
            Kind::WildcardExcept => self.wildcard_except(node, pos, scope),
            Kind::Repeat => self.repeat(node, pos, scope),
            Kind::Scope => self.match_node(node.child(), pos, scope.pushed()),
            Kind::Capture(name) => self.capture(node, name, pos, scope),
            Kind::Alternative => self.alternative(node, pos, scope),
            Kind::AlternativeOption => (MatchResult::Valid(None), scope),
        }
    }

    /// Ties go to the later partial, which has got further along the
    /// siblings.
    fn note_partial(&mut self, tail: NodeId) {
        let deeper = match self.deepest_partial {
            Some(current) => self.doc.depth(tail) >= self.doc.depth(current),
            None => true,
        };
        if deeper {
            self.deepest_partial = Some(tail);
        }
    }

    /// Same tag, matching children, then the pattern's siblings against the
    /// document's siblings. Bindings made by the siblings are folded back into
    /// the scope the children produced.
    fn element(
        &mut self,
        node: &PatternNode,
        tag: &str,
        pos: Option<NodeId>,
        scope: ScopeStack,
    ) -> Step {
        let Some(id) = pos.filter(|&id| self.doc.is_element_named(id, tag)) else {
            return (MatchResult::Invalid, scope);
        };
        let (result, mut inner) = self.match_node(node.child(), self.doc.first_child(id), scope);
        if !result.is_valid() {
            return (result, inner);
        }
        let (result, after) = self.match_node(node.next(), self.doc.next_sibling(id), inner.clone());
        inner.merge_innermost(&after);
        (result, inner)
    }

    fn literal(&mut self, text: &str, pos: Option<NodeId>, scope: ScopeStack) -> Step {
        match pos.and_then(|id| self.doc.text_of(id)) {
            Some(content) if content == text => (MatchResult::Valid(Some(content.to_string())), scope),
            _ => (MatchResult::Invalid, scope),
        }
    }

    /// Search the run of text and line breaks starting at `pos`. An absent
    /// position reads as the empty string.
    fn pattern(&mut self, regex: &Regex, pos: Option<NodeId>, scope: ScopeStack) -> Step {
        let text = match pos {
            Some(id) => self.text_run(id),
            None => Some(String::new()),
        };
        match text {
            Some(text) if regex.is_match(&text) => (MatchResult::Valid(Some(text)), scope),
            _ => (MatchResult::Invalid, scope),
        }
    }

    /// Concatenate consecutive text nodes from `start`, with `<br>` read as a
    /// newline. `None` when `start` itself is some other element.
    fn text_run(&self, start: NodeId) -> Option<String> {
        let mut text: Option<String> = None;
        for id in self.doc.siblings(Some(start)) {
            match self.doc.kind(id) {
                NodeKind::Text(content) => text.get_or_insert_with(String::new).push_str(content),
                NodeKind::Element { name, .. } if name == LINE_BREAK => {
                    text.get_or_insert_with(String::new).push('\n')
                }
                NodeKind::Element { .. } => break,
            }
        }
        text
    }

    fn capture(
        &mut self,
        node: &PatternNode,
        name: &str,
        pos: Option<NodeId>,
        scope: ScopeStack,
    ) -> Step {
        let (result, mut scope) = self.match_node(node.child(), pos, scope);
        if let MatchResult::Valid(text) = &result {
            scope.assign(name, text.clone().unwrap_or_default());
            self.dispatcher.dispatch(name, &scope);
        }
        (result, scope)
    }

    /// `{...}`: try the continuation here, else skip one sibling and retry.
    fn wildcard(&mut self, node: &PatternNode, pos: Option<NodeId>, scope: ScopeStack) -> Step {
        let Some(next) = node.next() else {
            return (MatchResult::Valid(None), scope);
        };
        let mut cursor = pos;
        while let Some(id) = cursor {
            let (result, after) = self.match_node(Some(next), Some(id), scope.clone());
            if !result.is_invalid() {
                return (result, after);
            }
            cursor = self.doc.next_sibling(id);
        }
        self.at_end(Some(next), scope)
    }

    /// `{...but}`: like `{...}`, but stop with failure at the first sibling
    /// the child pattern accepts before the continuation has matched.
    fn wildcard_except(
        &mut self,
        node: &PatternNode,
        pos: Option<NodeId>,
        scope: ScopeStack,
    ) -> Step {
        let Some(forbidden) = node.child() else {
            return match node.next() {
                None => (MatchResult::Valid(None), scope),
                Some(next) => self.match_node(Some(next), pos, scope),
            };
        };
        let mut cursor = pos;
        while let Some(id) = cursor {
            // Without a continuation only the end of the siblings can match.
            if let Some(next) = node.next() {
                let (result, after) = self.match_node(Some(next), Some(id), scope.clone());
                if result.is_valid() {
                    return (result, after);
                }
            }
            let (probe, _) = self.match_node(Some(forbidden), Some(id), scope.clone());
            if !probe.is_invalid() {
                return (MatchResult::Invalid, scope);
            }
            cursor = self.doc.next_sibling(id);
        }
        self.at_end(node.next(), scope)
    }

    /// A wildcard that reached the end of its siblings succeeds only if its
    /// continuation accepts the end.
    fn at_end(&mut self, next: Option<&PatternNode>, scope: ScopeStack) -> Step {
        let (result, after) = self.match_node(next, None, scope.clone());
        if result.is_valid() {
            (MatchResult::Valid(None), after)
        } else {
            (MatchResult::Invalid, scope)
        }
    }

    /// `{many}`: run the child over and over, each time in a throwaway frame,
    /// feeding every partial tail into the next round. The continuation then
    /// resumes with the caller's scope.
    fn repeat(&mut self, node: &PatternNode, pos: Option<NodeId>, scope: ScopeStack) -> Step {
        let mut tail = pos;
        let mut matched_once = false;
        let last = loop {
            let (result, _) = self.match_node(node.child(), tail, scope.clone().pushed());
            matched_once |= !result.is_invalid();
            match result {
                // A round that consumes nothing would repeat forever.
                MatchResult::Partial(next) if Some(next) != tail => tail = Some(next),
                other => break other,
            }
        };
        if !matched_once {
            return (MatchResult::Invalid, scope);
        }
        if last.is_valid() {
            // Child and document ended together; whatever follows the
            // repetition must accept the end of the siblings.
            return self.match_node(node.next(), None, scope);
        }
        self.match_node(node.next(), tail, scope)
    }

    /// `{either}`: branches are the stretches of the child chain between
    /// `{or}` separators, tried in order. A winning branch stands for one
    /// element; a last branch that ran out hands its leftovers on.
    fn alternative(&mut self, node: &PatternNode, pos: Option<NodeId>, scope: ScopeStack) -> Step {
        let Some(id) = pos else {
            return (MatchResult::Invalid, scope);
        };
        let mut branch = node.child();
        loop {
            let (result, branch_scope) = self.match_node(branch, Some(id), scope.clone());
            if result.is_valid() {
                return self.match_node(node.next(), self.doc.next_sibling(id), branch_scope);
            }
            let separator = branch.and_then(|first| {
                first
                    .chain()
                    .find(|n| matches!(n.kind, Kind::AlternativeOption))
            });
            match (separator, result) {
                (Some(option), _) => branch = option.next(),
                (None, MatchResult::Partial(tail)) => {
                    return self.match_node(node.next(), Some(tail), branch_scope);
                }
                (None, _) => return (MatchResult::Invalid, scope),
            }
        }
    }
}

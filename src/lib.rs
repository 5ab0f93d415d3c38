//! Structural pattern matching for HTML-like documents.
//!
//! A template is markup annotated with operators. It is compiled once into a
//! pattern tree and can then be matched against any number of documents.
//! Named captures are reported to registered handlers as they resolve.
//!
//! # Example
//!
//! ```rust
//! use markmatch::{CaptureDispatcher, Template};
//!
//! let template = Template::compile(
//!     "<body>
//!        <h1>{$title}{/.*/}{/$title}</h1>
//!        {many}<p>{$para}{/.*/}{/$para}</p>{/many}
//!      </body>",
//! )
//! .unwrap();
//!
//! let mut paragraphs = Vec::new();
//! let mut dispatcher = CaptureDispatcher::new().on("para", |scope| {
//!     paragraphs.push(scope.get("para").unwrap_or_default().to_string());
//! });
//! let run = template
//!     .run_with("<body><h1>Hi</h1><p>one</p><p>two</p></body>", &mut dispatcher)
//!     .unwrap();
//! drop(dispatcher);
//!
//! assert!(run.is_valid());
//! assert_eq!(run.get("title"), Some("Hi"));
//! assert_eq!(paragraphs, ["one", "two"]);
//! ```

mod dispatch;
pub mod document;
pub mod matcher;
mod scope;
pub mod template;

pub use dispatch::{CaptureDispatcher, Handler};
pub use document::{Document, MarkupError, NodeId, NodeKind, ReadMode};
pub use matcher::{MatchResult, Outcome};
pub use scope::ScopeStack;
pub use template::{Kind, PatternNode, TemplateError};

/// A compiled template. Immutable, so one instance can serve any number of
/// runs, from any number of threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pattern: PatternNode,
}

impl Template {
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let pattern = template::compile(source)?;
        log::debug!(
            "Compiled template with captures [{}]",
            pattern.capture_names().join(", ")
        );
        Ok(Self { pattern })
    }

    pub fn from_pattern(pattern: PatternNode) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> &PatternNode {
        &self.pattern
    }

    /// Capture names in template order.
    pub fn capture_names(&self) -> Vec<&str> {
        self.pattern.capture_names()
    }

    /// Match a document given as markup text, without capture handlers.
    pub fn run(&self, source: &str) -> Result<Run, MarkupError> {
        self.run_with(source, &mut CaptureDispatcher::new())
    }

    pub fn run_with(
        &self,
        source: &str,
        dispatcher: &mut CaptureDispatcher<'_>,
    ) -> Result<Run, MarkupError> {
        let document = Document::parse(source)?;
        Ok(self.finish(document, dispatcher))
    }

    /// Match raw bytes, decoded with the WHATWG encoding label `charset`
    /// (UTF-8 when `None`).
    pub fn run_bytes(
        &self,
        bytes: &[u8],
        charset: Option<&str>,
        dispatcher: &mut CaptureDispatcher<'_>,
    ) -> Result<Run, MarkupError> {
        let document = Document::decode(bytes, charset)?;
        Ok(self.finish(document, dispatcher))
    }

    /// Match an already-parsed document.
    pub fn run_document(
        &self,
        document: &Document,
        dispatcher: &mut CaptureDispatcher<'_>,
    ) -> Outcome {
        let outcome = matcher::run(&self.pattern, document, dispatcher);
        log::debug!(
            "Match finished: {:?}, scope {}",
            outcome.result,
            outcome.scope
        );
        outcome
    }

    fn finish(&self, document: Document, dispatcher: &mut CaptureDispatcher<'_>) -> Run {
        let outcome = self.run_document(&document, dispatcher);
        Run { document, outcome }
    }
}

/// A finished match together with the document it ran against, so that
/// node ids in the outcome stay meaningful.
#[derive(Debug, Clone)]
pub struct Run {
    pub document: Document,
    pub outcome: Outcome,
}

impl Run {
    pub fn result(&self) -> &MatchResult {
        &self.outcome.result
    }

    pub fn is_valid(&self) -> bool {
        self.outcome.result.is_valid()
    }

    pub fn is_partial(&self) -> bool {
        self.outcome.result.is_partial()
    }

    pub fn scope(&self) -> &ScopeStack {
        &self.outcome.scope
    }

    /// Look a capture up in the returned scope.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.outcome.scope.get(name)
    }

    /// Element name of the partial tail, if the result is partial and the
    /// tail is an element.
    pub fn tail_name(&self) -> Option<&str> {
        self.outcome
            .result
            .tail()
            .and_then(|tail| self.document.name_of(tail))
    }

    /// One-line summary: `valid`, `partial at <node>` or `invalid`, with the
    /// deepest point of divergence when it differs from the tail.
    pub fn verdict(&self) -> String {
        let mut verdict = match &self.outcome.result {
            MatchResult::Valid(_) => return "valid".to_string(),
            MatchResult::Partial(tail) => format!("partial at {}", self.document.describe(*tail)),
            MatchResult::Invalid => "invalid".to_string(),
        };
        if let Some(deepest) = self.outcome.deepest_partial
            && self.outcome.result.tail() != Some(deepest)
        {
            verdict.push_str(&format!(
                " (template ran out before {})",
                self.document.describe(deepest)
            ));
        }
        verdict
    }
}

#[cfg(test)]
mod tests;

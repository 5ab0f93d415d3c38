//! Capture dispatcher: named callbacks fired as captures resolve.

use std::collections::HashMap;

use crate::scope::ScopeStack;

/// A capture consumer. It sees the scope stack as it stands right after the
/// capture was bound.
pub type Handler<'a> = Box<dyn FnMut(&ScopeStack) + 'a>;

/// Maps capture names to handlers.
///
/// Handlers run synchronously, in the middle of matching, each time the
/// capture of that name succeeds. This is the only way to observe captures
/// made inside `{many}`, whose bindings are gone once matching finishes.
///
/// ```rust
/// use markmatch::{CaptureDispatcher, Template};
///
/// let template = Template::compile("<ul>{many}<li>{$item}{/.+/}{/$item}</li>{/many}</ul>").unwrap();
/// let mut items = Vec::new();
/// let mut dispatcher = CaptureDispatcher::new().on("item", |scope| {
///     items.push(scope.get("item").unwrap_or_default().to_string());
/// });
/// let run = template.run_with("<ul><li>one</li><li>two</li></ul>", &mut dispatcher).unwrap();
/// drop(dispatcher);
///
/// assert!(run.is_valid());
/// assert_eq!(items, ["one", "two"]);
/// ```
#[derive(Default)]
pub struct CaptureDispatcher<'a> {
    handlers: HashMap<String, Handler<'a>>,
}

impl<'a> CaptureDispatcher<'a> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Builder form of [`register`](Self::register).
    pub fn on(mut self, name: &str, handler: impl FnMut(&ScopeStack) + 'a) -> Self {
        self.register(name, handler);
        self
    }

    /// Install `handler` for `name`, replacing any previous one.
    pub fn register(&mut self, name: &str, handler: impl FnMut(&ScopeStack) + 'a) {
        self.handlers.insert(name.to_string(), Box::new(handler));
    }

    pub fn handles(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `name`, if any. Returns whether one ran.
    pub fn dispatch(&mut self, name: &str, scope: &ScopeStack) -> bool {
        match self.handlers.get_mut(name) {
            Some(handler) => {
                log::trace!("Dispatching capture {name:?}");
                handler(scope);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for CaptureDispatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CaptureDispatcher")
            .field("handlers", &names)
            .finish()
    }
}

//! Nested capture frames.
//!
//! Frames are shared between clones until one side writes, so speculative
//! branches can fork the stack cheaply without ever observing each other's
//! bindings.

use std::collections::HashMap;
use std::rc::Rc;

use itertools::Itertools;

type Frame = HashMap<String, String>;

/// A stack of capture frames; lookups walk from the innermost frame outward.
///
/// There is always at least one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeStack {
    frames: Vec<Rc<Frame>>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    /// A stack holding a single empty frame.
    pub fn new() -> Self {
        Self {
            frames: vec![Rc::new(Frame::new())],
        }
    }

    /// Push an empty innermost frame.
    pub fn push(&mut self) {
        self.frames.push(Rc::new(Frame::new()));
    }

    /// Consuming form of [`push`](Self::push).
    pub fn pushed(mut self) -> Self {
        self.push();
        self
    }

    /// Bind `name` in the innermost frame.
    pub fn assign(&mut self, name: &str, value: impl Into<String>) {
        Rc::make_mut(self.innermost_mut()).insert(name.to_string(), value.into());
    }

    /// Look `name` up, innermost frame first.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .map(String::as_str)
    }

    /// Copy every binding of `other`'s innermost frame into this stack's
    /// innermost frame, overwriting on conflict.
    pub fn merge_innermost(&mut self, other: &ScopeStack) {
        let source = other.innermost();
        if source.is_empty() || Rc::ptr_eq(source, self.innermost()) {
            return;
        }
        let target = Rc::make_mut(self.innermost_mut());
        for (name, value) in source.iter() {
            target.insert(name.clone(), value.clone());
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Bindings visible from the innermost frame, sorted by name.
    pub fn visible(&self) -> Vec<(&str, &str)> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for frame in self.frames.iter().rev() {
            for (name, value) in frame.iter() {
                seen.entry(name.as_str()).or_insert(value.as_str());
            }
        }
        seen.into_iter().sorted().collect()
    }

    fn innermost(&self) -> &Rc<Frame> {
        // `new` seeds one frame and nothing ever pops.
        &self.frames[self.frames.len() - 1]
    }

    fn innermost_mut(&mut self) -> &mut Rc<Frame> {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

impl std::fmt::Display for ScopeStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut frames = self.frames.iter().map(|frame| {
            let bindings = frame
                .iter()
                .sorted()
                .map(|(name, value)| format!("{name}={value:?}"))
                .join(", ");
            format!("{{{bindings}}}")
        });
        write!(f, "[{}]", frames.join(" "))
    }
}

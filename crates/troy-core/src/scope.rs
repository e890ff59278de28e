//! Scope matching.
//!
//! Decides whether an event belongs to the activation a session observes.
//! The observed activation is the one running the target code at exactly
//! one level below the stack depth recorded when the session started:
//!
//! ```text
//! depth  base        base + 1            base + 2 ..
//!        (caller)    target  <- own      anything  <- nested
//!                    other   <- unrelated
//! ```

use serde::Serialize;
use troy_runtime::{Activation, CodeId, FrameId};

/// Classification of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeVerdict {
    /// The observed activation itself.
    OwnScope,
    /// Something called from inside the observed activation, including
    /// recursive activations of the target.
    NestedIgnore,
    /// Anything else: callers, or a different activation at the target depth.
    UnrelatedIgnore,
}

#[derive(Debug, Clone)]
pub struct ScopeMatcher {
    target: CodeId,
    target_depth: usize,
    latched: Option<FrameId>,
}

impl ScopeMatcher {
    /// Matcher for `target` invoked on top of a stack `base_depth` deep.
    pub fn new(target: CodeId, base_depth: usize) -> Self {
        Self {
            target,
            target_depth: base_depth + 1,
            latched: None,
        }
    }

    pub fn target(&self) -> CodeId {
        self.target
    }

    /// Depth the observed activation runs at.
    pub fn target_depth(&self) -> usize {
        self.target_depth
    }

    /// The observed activation, once its first event has been seen.
    pub fn latched(&self) -> Option<FrameId> {
        self.latched
    }

    /// Classify an event's activation.
    ///
    /// The first own-scope activation is latched; a later activation of the
    /// same code at the same depth is a completed sibling and is unrelated.
    pub fn classify(&mut self, activation: &Activation<'_>) -> ScopeVerdict {
        let depth = activation.depth();
        if depth > self.target_depth {
            return ScopeVerdict::NestedIgnore;
        }
        if depth < self.target_depth || activation.code() != self.target {
            return ScopeVerdict::UnrelatedIgnore;
        }
        match self.latched {
            None => {
                self.latched = Some(activation.frame_id());
                ScopeVerdict::OwnScope
            }
            Some(frame) if frame == activation.frame_id() => ScopeVerdict::OwnScope,
            Some(_) => ScopeVerdict::UnrelatedIgnore,
        }
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;

    fn at(frame: u64, code: usize, depth: usize, locals: &IndexMap<String, troy_runtime::Value>) -> Activation<'_> {
        Activation::new(FrameId::new(frame), CodeId::new(code), "f", depth, 1, locals)
    }

    #[test]
    fn test_own_scope_at_target_depth() {
        let locals = IndexMap::new();
        let mut matcher = ScopeMatcher::new(CodeId::new(0), 2);
        assert_eq!(matcher.target_depth(), 3);
        assert_eq!(matcher.classify(&at(7, 0, 3, &locals)), ScopeVerdict::OwnScope);
        assert_eq!(matcher.latched(), Some(FrameId::new(7)));
        assert_eq!(matcher.classify(&at(7, 0, 3, &locals)), ScopeVerdict::OwnScope);
    }

    #[test]
    fn test_deeper_events_are_nested() {
        let locals = IndexMap::new();
        let mut matcher = ScopeMatcher::new(CodeId::new(0), 0);
        matcher.classify(&at(1, 0, 1, &locals));
        assert_eq!(matcher.classify(&at(2, 0, 2, &locals)), ScopeVerdict::NestedIgnore);
        assert_eq!(matcher.classify(&at(3, 5, 4, &locals)), ScopeVerdict::NestedIgnore);
    }

    #[test]
    fn test_shallower_and_other_code_are_unrelated() {
        let locals = IndexMap::new();
        let mut matcher = ScopeMatcher::new(CodeId::new(0), 1);
        assert_eq!(matcher.classify(&at(1, 0, 1, &locals)), ScopeVerdict::UnrelatedIgnore);
        assert_eq!(matcher.classify(&at(2, 3, 2, &locals)), ScopeVerdict::UnrelatedIgnore);
        assert_eq!(matcher.latched(), None);
    }

    #[test]
    fn test_sibling_activation_is_unrelated() {
        let locals = IndexMap::new();
        let mut matcher = ScopeMatcher::new(CodeId::new(0), 0);
        assert_eq!(matcher.classify(&at(1, 0, 1, &locals)), ScopeVerdict::OwnScope);
        assert_eq!(matcher.classify(&at(9, 0, 1, &locals)), ScopeVerdict::UnrelatedIgnore);
    }
}

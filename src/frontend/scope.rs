use std::collections::HashMap;

/// Stack of name to storage frames, innermost last. A name bound in any
/// frame counts as taken, so shadowing is rejected by callers through
/// `lookup` rather than by `bind`.
#[derive(Debug)]
pub struct ScopeStack<L> {
    frames: Vec<HashMap<String, L>>,
}

impl<L> Default for ScopeStack<L> {
    fn default() -> Self {
        Self { frames: vec![] }
    }
}

impl<L> ScopeStack<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        assert!(!self.frames.is_empty(), "pop on an empty scope stack");

        self.frames.pop();
    }

    /// Binds into the innermost frame without checking for conflicts.
    pub fn bind(&mut self, name: impl Into<String>, location: L) {
        if self.frames.is_empty() {
            self.push_frame();
        }

        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), location);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&L> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_innermost_first() {
        let mut scope = ScopeStack::new();

        scope.push_frame();
        scope.bind("x", 1);
        scope.bind("y", 2);
        scope.push_frame();
        scope.bind("x", 3);

        assert_eq!(scope.lookup("x"), Some(&3));
        assert_eq!(scope.lookup("y"), Some(&2));
        assert_eq!(scope.lookup("z"), None);
        assert_eq!(scope.depth(), 2);
    }

    #[test]
    fn test_pop_discards_bindings() {
        let mut scope = ScopeStack::new();

        scope.push_frame();
        scope.bind("outer", 1);
        scope.push_frame();
        scope.bind("inner", 2);
        scope.pop_frame();

        assert_eq!(scope.lookup("inner"), None);
        assert_eq!(scope.lookup("outer"), Some(&1));
        assert_eq!(scope.depth(), 1);
    }
}

use smallvec::SmallVec;

/// Push/pop stack for one piece of nested graphics state.
///
/// `push` and `pop` return `Some(new_current)` exactly when the materialized
/// top actually changed by value; the caller forwards that value to the
/// backend. `None` means the transition was elided as redundant. One generic
/// implementation guards every stacked state kind instead of N hand-written
/// copies of the same diff logic.
pub struct StateStack<T: Clone + PartialEq> {
    stack: SmallVec<[T; 8]>,
}

impl<T: Clone + PartialEq> StateStack<T> {
    pub fn new() -> Self {
        Self {
            stack: SmallVec::new(),
        }
    }

    pub fn push(&mut self, value: T) -> Option<&T> {
        let changed = self.stack.last() != Some(&value);
        self.stack.push(value);
        if changed { self.stack.last() } else { None }
    }

    pub fn pop(&mut self) -> Option<&T> {
        let popped = self
            .stack
            .pop()
            .unwrap_or_else(|| panic!("pop on empty graphics state stack"));
        match self.stack.last() {
            Some(top) if *top != popped => self.stack.last(),
            _ => None,
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.stack.last()
    }

    /// Empties the stack at frame start.
    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl<T: Clone + PartialEq> Default for StateStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

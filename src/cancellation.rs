//! Cooperative cancellation handle for in-flight lookup work.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cloneable cancellation flag shared between a workflow and its worker.
///
/// Cancellation is cooperative: the worker checks the scope at well-defined
/// points and abandons its result without side effects once the scope has
/// fired. Replacing the scope held by a workflow cancels the previous
/// attempt while leaving the new one untouched.
#[derive(Debug, Clone, Default)]
pub struct CancellationScope {
    cancelled: Arc<AtomicBool>,
}

impl CancellationScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_cancellation() {
        let scope = CancellationScope::new();
        let observer = scope.clone();
        assert!(!observer.is_cancelled());

        scope.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn fresh_scope_is_independent_of_cancelled_one() {
        let old = CancellationScope::new();
        old.cancel();

        let fresh = CancellationScope::new();
        assert!(!fresh.is_cancelled());
        assert!(old.is_cancelled());
    }
}

//! Re-entrancy guard for applying remote commands.
//!
//! While a peer's command is being applied to the local display, the
//! application's "local state changed" path must not mirror that change
//! back out, or two paired devices would echo it forever. The guard is
//! scoped: it covers exactly the callback invocation on the current thread
//! and is released on drop, even if the callback panics.

use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

/// Tracks which threads are currently applying a remote command.
#[derive(Debug, Default)]
pub struct ApplyGuard {
    active: Mutex<Vec<ThreadId>>,
}

impl ApplyGuard {
    /// Create an inactive guard.
    pub fn new() -> Self {
        Self::default()
    }

    fn active(&self) -> MutexGuard<'_, Vec<ThreadId>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark the current thread as applying a remote command until the
    /// returned value is dropped. Nests.
    pub fn enter(&self) -> RemoteApplyGuard<'_> {
        self.active().push(thread::current().id());
        RemoteApplyGuard { owner: self }
    }

    /// Whether the current thread is inside [`enter`](Self::enter).
    pub fn is_active(&self) -> bool {
        let id = thread::current().id();
        self.active().contains(&id)
    }
}

/// Scope of one remote command application.
#[derive(Debug)]
#[must_use = "the guard is released as soon as it is dropped"]
pub struct RemoteApplyGuard<'a> {
    owner: &'a ApplyGuard,
}

impl Drop for RemoteApplyGuard<'_> {
    fn drop(&mut self) {
        let id = thread::current().id();
        let mut active = self.owner.active();
        if let Some(pos) = active.iter().position(|t| *t == id) {
            active.swap_remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn active_only_within_scope() {
        let guard = ApplyGuard::new();
        assert!(!guard.is_active());
        {
            let _scope = guard.enter();
            assert!(guard.is_active());
        }
        assert!(!guard.is_active());
    }

    #[test]
    fn nested_scopes() {
        let guard = ApplyGuard::new();
        let outer = guard.enter();
        {
            let _inner = guard.enter();
            assert!(guard.is_active());
        }
        assert!(guard.is_active());
        drop(outer);
        assert!(!guard.is_active());
    }

    #[test]
    fn does_not_leak_to_other_threads() {
        let guard = Arc::new(ApplyGuard::new());
        let _scope = guard.enter();

        let other = Arc::clone(&guard);
        let seen = std::thread::spawn(move || other.is_active()).join().unwrap();

        assert!(!seen);
        assert!(guard.is_active());
    }

    #[test]
    fn released_on_panic() {
        let guard = Arc::new(ApplyGuard::new());
        let inner = Arc::clone(&guard);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = inner.enter();
            panic!("renderer failed");
        }));
        assert!(result.is_err());
        assert!(!guard.is_active());
    }
}

//! Activation tokens guarding against superseded async results.

use parking_lot::RwLock;

/// Identifies one query activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivationToken(pub u64);

/// Monotonic activation counter.
///
/// Advancing takes the write lock, so once [`advance`](Self::advance)
/// returns no closure passed to [`run_if_current`](Self::run_if_current)
/// with an older token is running or will run.
#[derive(Debug, Default)]
pub struct ActivationGuard {
    current: RwLock<u64>,
}

impl ActivationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate every outstanding token and return a fresh one.
    pub fn advance(&self) -> ActivationToken {
        let mut current = self.current.write();
        *current += 1;
        ActivationToken(*current)
    }

    pub fn current(&self) -> ActivationToken {
        ActivationToken(*self.current.read())
    }

    pub fn is_current(&self, token: ActivationToken) -> bool {
        *self.current.read() == token.0
    }

    /// Run `f` only while `token` is current. Returns `None` (dropping `f`
    /// unrun) for a stale token.
    pub fn run_if_current<R>(&self, token: ActivationToken, f: impl FnOnce() -> R) -> Option<R> {
        let current = self.current.read();
        if *current != token.0 {
            return None;
        }
        Some(f())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_invalidates() {
        let guard = ActivationGuard::new();
        let first = guard.advance();
        assert!(guard.is_current(first));

        let second = guard.advance();
        assert!(!guard.is_current(first));
        assert!(guard.is_current(second));
        assert_eq!(guard.current(), second);
    }

    #[test]
    fn test_run_if_current() {
        let guard = ActivationGuard::new();
        let stale = guard.advance();
        let fresh = guard.advance();

        assert_eq!(guard.run_if_current(fresh, || 7), Some(7));

        let mut ran = false;
        assert_eq!(guard.run_if_current(stale, || ran = true), None);
        assert!(!ran);
    }
}

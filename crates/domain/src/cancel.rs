use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-writer, many-reader cancellation flag for one in-flight turn.
///
/// Edge-triggered: once set, it stays set for the lifetime of this token —
/// callers get a fresh token per turn rather than resetting an existing one,
/// so there is no race between "cancel the old turn" and "start the new
/// one".
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn cancel_is_visible_across_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        a.cancel();
        assert!(b.is_cancelled());
    }
}

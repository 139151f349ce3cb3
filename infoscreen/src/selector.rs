//! Page selection state machine
//!
//! ```text
//!            advance                       advance (no-op)
//!   [i, unlocked] ──▶ [(i+1) mod N, unlocked]    [i, locked] ──┐
//!         │  ▲                                      ▲   │      │
//!    lock │  │ unlock                               │   └──────┘
//!         ▼  │                                      │
//!   [i, locked] ────────────────────────────────────┘
//! ```

use std::sync::{Mutex, MutexGuard};

use log::debug;

#[derive(Debug)]
struct State {
    index: usize,
    locked: bool,
}

/// Shared page index with a lock bit
#[derive(Debug)]
pub struct PageSelector {
    count: usize,
    state: Mutex<State>,
}

impl PageSelector {
    /// Selector over `count` pages, starting at page 0 unlocked
    pub fn new(count: usize) -> Self {
        Self {
            count: count.max(1),
            state: Mutex::new(State {
                index: 0,
                locked: false,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn current(&self) -> usize {
        self.lock_state().index
    }

    /// Move to the next page unless locked; returns the resulting index
    pub fn advance(&self) -> usize {
        let mut state = self.lock_state();
        if !state.locked {
            state.index = (state.index + 1) % self.count;
            debug!("Page advanced to {}", state.index);
        }
        state.index
    }

    pub fn lock(&self) {
        self.lock_state().locked = true;
    }

    pub fn unlock(&self) {
        self.lock_state().locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.lock_state().locked
    }

    /// Force page 0; applies even when locked
    pub fn reset(&self) {
        self.lock_state().index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_initial_state() {
        let selector = PageSelector::new(4);
        assert_eq!(selector.current(), 0);
        assert!(!selector.is_locked());
    }

    #[test]
    fn test_advance_wraps() {
        let selector = PageSelector::new(3);
        assert_eq!(selector.advance(), 1);
        assert_eq!(selector.advance(), 2);
        assert_eq!(selector.advance(), 0);
    }

    #[test]
    fn test_locked_advance_is_noop() {
        let selector = PageSelector::new(3);
        selector.advance();
        selector.lock();
        assert_eq!(selector.advance(), 1);
        assert_eq!(selector.current(), 1);
        selector.unlock();
        assert_eq!(selector.advance(), 2);
    }

    #[test]
    fn test_reset_overrides_lock() {
        let selector = PageSelector::new(5);
        selector.advance();
        selector.advance();
        selector.lock();
        selector.reset();
        assert_eq!(selector.current(), 0);
        assert!(selector.is_locked());
    }

    #[test]
    fn test_concurrent_advances_return_to_start() {
        let selector = Arc::new(PageSelector::new(8));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let s = Arc::clone(&selector);
                thread::spawn(move || {
                    for _ in 0..8 {
                        s.advance();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // 32 advances over 8 pages
        assert_eq!(selector.current(), 0);
    }

    #[test]
    fn test_zero_pages_clamped() {
        let selector = PageSelector::new(0);
        assert_eq!(selector.count(), 1);
        assert_eq!(selector.advance(), 0);
    }
}

//! Page context currency. Every mount and teardown starts a new generation;
//! work begun under an older generation must not mutate page state when its
//! awaited call finally returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct PageGeneration {
    current: Arc<AtomicU64>,
}

impl PageGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating every outstanding token.
    pub fn advance(&self) -> ContextToken {
        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        ContextToken {
            current: self.current.clone(),
            generation,
        }
    }

    /// Token for the generation in effect right now.
    pub fn token(&self) -> ContextToken {
        ContextToken {
            current: self.current.clone(),
            generation: self.current.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextToken {
    current: Arc<AtomicU64>,
    generation: u64,
}

impl ContextToken {
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_invalidates_older_tokens() {
        let generation = PageGeneration::new();
        let first = generation.advance();
        assert!(first.is_current());

        let snapshot = generation.token();
        assert_eq!(snapshot.generation(), first.generation());

        let second = generation.advance();
        assert!(!first.is_current());
        assert!(!snapshot.is_current());
        assert!(second.is_current());
    }
}

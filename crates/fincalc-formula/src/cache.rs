//! Parse cache
//!
//! Maps formula text to its parsed tree so unchanged formulas are not
//! re-tokenized on every recalculation. The cache is an ordinary value: the
//! caller creates it, shares it (it is `Send + Sync`) and drops it. Nothing
//! in this crate keeps a process-wide cache.

use crate::ast::FormulaExpr;
use crate::error::FormulaResult;
use crate::options::ParseLimits;
use crate::parser::parse_formula;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

type Slot = Arc<OnceCell<FormulaResult<Arc<FormulaExpr>>>>;

/// Concurrent read-through cache of parsed formulas
///
/// Each distinct formula is parsed at most once, even when many threads ask
/// for it at the same time: the first caller fills the slot and the others
/// wait for it. Parse failures are cached as well, since parsing is pure.
#[derive(Debug, Default)]
pub struct ParseCache {
    entries: DashMap<(ParseLimits, String), Slot>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ParseCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `formula`, reusing an earlier result for the same text and limits
    pub fn get_or_parse(
        &self,
        formula: &str,
        limits: ParseLimits,
    ) -> FormulaResult<Arc<FormulaExpr>> {
        // Clone the slot out so the shard lock is not held while parsing
        let slot = self
            .entries
            .entry((limits, formula.to_string()))
            .or_default()
            .clone();

        let mut parsed_here = false;
        let result = slot.get_or_init(|| {
            parsed_here = true;
            parse_formula(formula, limits).map(Arc::new)
        });

        if parsed_here {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(formula, "parse cache miss");
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(formula, "parse cache hit");
        }

        result.clone()
    }

    /// Lookups answered from the cache
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that had to parse
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of cached formulas
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached entry and reset the counters
    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormulaError;

    #[test]
    fn test_miss_then_hit() {
        let cache = ParseCache::new();
        let limits = ParseLimits::default();

        let first = cache.get_or_parse("=A1+1", limits).unwrap();
        assert_eq!((cache.hits(), cache.misses()), (0, 1));

        let second = cache.get_or_parse("=A1+1", limits).unwrap();
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_errors_are_cached() {
        let cache = ParseCache::new();
        let limits = ParseLimits::default();

        let first = cache.get_or_parse("=FOO(1)", limits);
        let second = cache.get_or_parse("=FOO(1)", limits);
        assert_eq!(first, Err(FormulaError::UnknownFunction("FOO".into())));
        assert_eq!(first, second);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
    }

    #[test]
    fn test_limits_are_part_of_the_key() {
        let cache = ParseCache::new();
        let formula = "=((((1))))";
        let tight = ParseLimits {
            max_nesting_depth: 2,
            ..Default::default()
        };

        assert!(cache.get_or_parse(formula, ParseLimits::default()).is_ok());
        assert!(matches!(
            cache.get_or_parse(formula, tight),
            Err(FormulaError::LimitExceeded(_))
        ));
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_text_is_not_normalized() {
        // Leading whitespace shifts error offsets, so it must not share a slot
        let cache = ParseCache::new();
        let limits = ParseLimits::default();
        assert_eq!(
            cache.get_or_parse("=1+", limits),
            Err(FormulaError::syntax(3, "unexpected end of formula"))
        );
        assert_eq!(
            cache.get_or_parse("  =1+", limits),
            Err(FormulaError::syntax(5, "unexpected end of formula"))
        );
    }

    #[test]
    fn test_concurrent_lookups_parse_once() {
        let cache = ParseCache::new();
        let limits = ParseLimits::default();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        cache.get_or_parse("=SUM(A1:A10) * 2", limits).unwrap();
                    }
                });
            }
        });

        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 799);
    }

    #[test]
    fn test_clear() {
        let cache = ParseCache::new();
        cache.get_or_parse("=1", ParseLimits::default()).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.misses(), 0);
    }
}

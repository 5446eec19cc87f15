//! Lookup statistics.

use std::fmt;

/// Counters describing how lookups were resolved.
///
/// Each [`CacheManager`](crate::CacheManager) owns one set of counters for
/// its lifetime; callers only ever see copies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Lookups served from the cache.
    pub loaded: u64,
    /// Artifacts written to the cache, whether compiled here or supplied.
    pub compiled: u64,
    /// Misses reported without compiling.
    pub ignored: u64,
}

impl Statistics {
    /// Total number of lookups and stores recorded.
    pub fn total(&self) -> u64 {
        self.loaded + self.compiled + self.ignored
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loaded: {}, compiled: {}, ignored: {}",
            self.loaded, self.compiled, self.ignored
        )
    }
}

//! CacheBudget — byte accounting for a worker's region cache.
//!
//! The scheduler decides placement from declared region sizes; the worker
//! keeps its own tally of what it actually holds so that drift between the
//! two shows up in the logs.

/// Per-worker cache budget.
#[derive(Debug, Clone)]
pub struct CacheBudget {
    /// Maximum bytes of topology this worker should hold.
    limit: u64,
    /// Bytes charged so far.
    used: u64,
}

impl CacheBudget {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Charge a newly cached region.
    ///
    /// Returns `false` when the charge takes the worker over its limit. The
    /// region is still accounted for; the caller decides what to drop.
    pub fn charge(&mut self, region: &str, bytes: u64) -> bool {
        let current = self.used;
        self.used = self.used.saturating_add(bytes);
        if self.used > self.limit {
            tracing::warn!(
                region,
                current,
                desired = self.used,
                limit = self.limit,
                "worker cache over budget"
            );
            false
        } else {
            true
        }
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }
}

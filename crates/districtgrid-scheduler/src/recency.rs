//! Least-recently-used ordering of worker indices.
//!
//! Each touch stamps a worker with a fresh tick. The ordered map from tick
//! to worker gives the least and most recent worker in `O(log n)`, and the
//! per-worker tick lets a touch drop the old stamp without a scan.

use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct RecencyQueue {
    by_tick: BTreeMap<u64, usize>,
    ticks: Vec<u64>,
    next_tick: u64,
}

impl RecencyQueue {
    /// Queue over workers `0..count`, touched in index order so that
    /// worker 0 starts out least recent.
    pub fn new(count: usize) -> Self {
        let mut queue = Self {
            by_tick: BTreeMap::new(),
            ticks: vec![0; count],
            next_tick: 0,
        };
        for worker in 0..count {
            queue.stamp(worker);
        }
        queue
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Mark `worker` as the most recently used. Out-of-range indices are
    /// ignored.
    pub fn touch(&mut self, worker: usize) {
        let Some(&tick) = self.ticks.get(worker) else {
            return;
        };
        self.by_tick.remove(&tick);
        self.stamp(worker);
    }

    pub fn least_recent(&self) -> Option<usize> {
        self.by_tick.values().next().copied()
    }

    pub fn most_recent(&self) -> Option<usize> {
        self.by_tick.values().next_back().copied()
    }

    /// Workers from most to least recent.
    pub fn order(&self) -> Vec<usize> {
        self.by_tick.values().rev().copied().collect()
    }

    fn stamp(&mut self, worker: usize) {
        let tick = self.next_tick;
        self.next_tick += 1;
        self.ticks[worker] = tick;
        self.by_tick.insert(tick, worker);
    }
}

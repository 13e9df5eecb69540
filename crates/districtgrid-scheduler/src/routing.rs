//! Choosing a worker for a region task.
//!
//! Routing prefers, in order:
//! - **Affinity**: an idle worker that already holds (or reserves) the region
//! - **Best fit**: while the region is on fewer than `max_per_region`
//!   workers, the worker left with the least headroom after adding the
//!   region, among idle workers first and then busy ones
//! - **Eviction**: the least recently used worker, whose cache will be
//!   recreated when the region does not fit
//! - **Queueing**: once the region is at its cap, the worker that most
//!   recently took it

use crate::state::PoolState;

/// Which rule picked the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteReason {
    Affinity,
    BestFitIdle,
    BestFitBusy,
    LeastRecent,
    MostRecentAffine,
    Fallback,
}

impl RouteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Affinity => "affinity",
            Self::BestFitIdle => "best-fit-idle",
            Self::BestFitBusy => "best-fit-busy",
            Self::LeastRecent => "least-recent",
            Self::MostRecentAffine => "most-recent-affine",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub worker: usize,
    pub reason: RouteReason,
}

/// Limits routing works within.
#[derive(Debug, Clone, Copy)]
pub struct RoutingLimits {
    /// Per-worker cache budget in bytes.
    pub max_worker_cache_size: u64,
    /// How many workers may hold or reserve one region.
    pub max_per_region: usize,
}

impl RoutingLimits {
    /// Half the workers, rounded up, may hold any one region.
    pub fn new(num_workers: usize, max_worker_cache_size: u64) -> Self {
        Self {
            max_worker_cache_size,
            max_per_region: num_workers.div_ceil(2),
        }
    }
}

/// Pick a worker for a task on `region` whose topology takes `size` bytes.
///
/// Pure: the caller applies the reservation and recency update.
pub fn route(state: &PoolState, region: &str, size: u64, limits: &RoutingLimits) -> Route {
    let assigned = state.assigned(region);
    if let Some(&worker) = assigned.iter().find(|&&w| state.is_idle(w)) {
        return Route {
            worker,
            reason: RouteReason::Affinity,
        };
    }

    if assigned.len() < limits.max_per_region {
        let available: Vec<usize> = (0..state.num_workers())
            .filter(|&w| !state.holds(region, w))
            .collect();
        let idle = available.iter().copied().filter(|&w| state.is_idle(w));

        let picked = best_fit(state, idle, size, limits.max_worker_cache_size)
            .map(|w| (w, RouteReason::BestFitIdle))
            .or_else(|| {
                best_fit(state, available.iter().copied(), size, limits.max_worker_cache_size)
                    .map(|w| (w, RouteReason::BestFitBusy))
            })
            .or_else(|| {
                state
                    .recency
                    .least_recent()
                    .map(|w| (w, RouteReason::LeastRecent))
            });
        if let Some((worker, reason)) = picked {
            return Route { worker, reason };
        }
    } else if let Some(&worker) = assigned.first() {
        return Route {
            worker,
            reason: RouteReason::MostRecentAffine,
        };
    }

    Route {
        worker: 0,
        reason: RouteReason::Fallback,
    }
}

/// The fitting worker with the least headroom left; ties go to the lowest
/// index.
fn best_fit(
    state: &PoolState,
    workers: impl Iterator<Item = usize>,
    size: u64,
    max: u64,
) -> Option<usize> {
    workers
        .filter(|&w| state.will_fit(w, size, max))
        .min_by_key(|&w| (max.saturating_sub(state.projected(w) + size), w))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u64 = 100;

    fn test_limits(workers: usize) -> RoutingLimits {
        RoutingLimits::new(workers, MAX)
    }

    #[test]
    fn max_per_region_rounds_up() {
        assert_eq!(RoutingLimits::new(1, MAX).max_per_region, 1);
        assert_eq!(RoutingLimits::new(3, MAX).max_per_region, 2);
        assert_eq!(RoutingLimits::new(4, MAX).max_per_region, 2);
    }

    #[test]
    fn idle_affine_worker_wins() {
        let mut state = PoolState::new(3);
        state.commit("r", 2, 10);
        let route = route(&state, "r", 10, &test_limits(3));
        assert_eq!(route.worker, 2);
        assert_eq!(route.reason, RouteReason::Affinity);
    }

    #[test]
    fn committed_affinity_beats_pending() {
        let mut state = PoolState::new(3);
        state.reserve("r", 0, 10);
        state.commit("r", 1, 10);
        assert_eq!(route(&state, "r", 10, &test_limits(3)).worker, 1);
    }

    #[test]
    fn fresh_pool_starts_at_worker_zero() {
        let state = PoolState::new(3);
        let route = route(&state, "r", 10, &test_limits(3));
        assert_eq!(route.worker, 0);
        assert_eq!(route.reason, RouteReason::BestFitIdle);
    }

    #[test]
    fn best_fit_prefers_the_fullest_worker() {
        let mut state = PoolState::new(3);
        state.commit("a", 0, 20);
        state.commit("b", 1, 70);
        state.commit("c", 2, 95);
        // Worker 2 cannot take 10 more; worker 1 ends up fullest.
        assert_eq!(route(&state, "r", 10, &test_limits(3)).worker, 1);
    }

    #[test]
    fn pending_bytes_count_towards_fit() {
        let mut state = PoolState::new(2);
        state.commit("a", 0, 50);
        state.reserve("b", 0, 45);
        let route = route(&state, "r", 10, &test_limits(2));
        assert_eq!(route.worker, 1);
    }

    #[test]
    fn busy_affine_worker_spills_to_idle_one() {
        let mut state = PoolState::new(3);
        state.commit("r", 0, 10);
        state.in_flight[0] = 1;
        let route = route(&state, "r", 10, &test_limits(3));
        assert_eq!(route.worker, 1);
        assert_eq!(route.reason, RouteReason::BestFitIdle);
    }

    #[test]
    fn busy_workers_used_when_no_idle_one_fits() {
        let mut state = PoolState::new(3);
        state.commit("big", 1, 95);
        state.in_flight[0] = 1;
        state.in_flight[2] = 2;
        state.commit("a", 2, 30);
        let route = route(&state, "r", 10, &test_limits(3));
        assert_eq!(route.worker, 2);
        assert_eq!(route.reason, RouteReason::BestFitBusy);
    }

    #[test]
    fn nothing_fits_picks_least_recent() {
        let mut state = PoolState::new(3);
        for w in 0..3 {
            state.commit(&format!("r{w}"), w, 99);
            state.recency.touch(w);
        }
        state.recency.touch(0);
        let route = route(&state, "small", 1, &test_limits(3));
        assert_eq!(route.worker, 1);
        assert_eq!(route.reason, RouteReason::LeastRecent);
    }

    #[test]
    fn region_at_cap_queues_on_most_recent_worker() {
        let mut state = PoolState::new(3);
        state.commit("r", 0, 10);
        state.commit("r", 1, 10);
        state.in_flight[0] = 1;
        state.in_flight[1] = 1;
        let route = route(&state, "r", 10, &test_limits(3));
        assert_eq!(route.worker, 1);
        assert_eq!(route.reason, RouteReason::MostRecentAffine);
    }

    #[test]
    fn empty_pool_falls_back_to_zero() {
        let state = PoolState::new(0);
        let limits = RoutingLimits {
            max_worker_cache_size: MAX,
            max_per_region: 1,
        };
        let route = route(&state, "r", 1, &limits);
        assert_eq!(route.worker, 0);
        assert_eq!(route.reason, RouteReason::Fallback);
    }
}

//! Host and container memory detection for sizing worker caches.

use std::path::Path;

use tracing::debug;

use crate::units::format_bytes;

/// Fraction of usable memory set aside for topology caches.
const CACHE_FRACTION: f64 = 0.4;
/// Held back from the cache for request handling and topology parsing.
const CACHE_RESERVE: u64 = 3 * 1024 * 1024 * 1024;

const CGROUP_V2_LIMIT: &str = "/sys/fs/cgroup/memory.max";
const CGROUP_V1_LIMIT: &str = "/sys/fs/cgroup/memory/memory.limit_in_bytes";
const MEMINFO: &str = "/proc/meminfo";

/// Memory visible to this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimits {
    pub host_bytes: Option<u64>,
    pub cgroup_bytes: Option<u64>,
}

impl MemoryLimits {
    /// Read limits from `/proc` and the cgroup filesystem.
    pub fn detect() -> Self {
        let limits = Self {
            host_bytes: read_meminfo_total(Path::new(MEMINFO)),
            cgroup_bytes: read_cgroup_limit(Path::new(CGROUP_V2_LIMIT))
                .or_else(|| read_cgroup_limit(Path::new(CGROUP_V1_LIMIT))),
        };
        debug!(
            host = %limits.host_bytes.map(format_bytes).unwrap_or_else(|| "unknown".into()),
            cgroup = %limits.cgroup_bytes.map(format_bytes).unwrap_or_else(|| "none".into()),
            "detected memory limits"
        );
        limits
    }

    /// The smaller of host and container memory.
    pub fn effective(&self) -> Option<u64> {
        match (self.host_bytes, self.cgroup_bytes) {
            (Some(h), Some(c)) => Some(h.min(c)),
            (h, c) => h.or(c),
        }
    }

    /// Total bytes all workers may spend on cached topology.
    pub fn cache_size(&self) -> u64 {
        cache_size_for(self.effective().unwrap_or(0))
    }
}

/// `0.4 * total - 3 GiB`, floored at zero.
pub fn cache_size_for(total_bytes: u64) -> u64 {
    ((total_bytes as f64 * CACHE_FRACTION) as u64).saturating_sub(CACHE_RESERVE)
}

/// Per-worker share of the cache, rounded up.
pub fn max_worker_cache_size(cache_size: u64, num_workers: usize) -> u64 {
    cache_size.div_ceil(num_workers.max(1) as u64)
}

fn read_cgroup_limit(path: &Path) -> Option<u64> {
    let content = std::fs::read_to_string(path).ok()?;
    // cgroup v2 reports "max" when unlimited.
    content.trim().parse::<u64>().ok()
}

fn read_meminfo_total(path: &Path) -> Option<u64> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_meminfo_total(&content)
}

fn parse_meminfo_total(content: &str) -> Option<u64> {
    let line = content.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kib: u64 = line
        .trim_start_matches("MemTotal:")
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse()
        .ok()?;
    Some(kib * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn cache_size_targets() {
        // 15 GiB usable leaves 3 GiB of cache.
        assert_eq!(cache_size_for(15 * GIB), 3 * GIB);
        assert_eq!(cache_size_for(4 * GIB), 0);
    }

    #[test]
    fn worker_share_rounds_up() {
        assert_eq!(max_worker_cache_size(10, 3), 4);
        assert_eq!(max_worker_cache_size(9, 3), 3);
        assert_eq!(max_worker_cache_size(9, 0), 9);
    }

    #[test]
    fn effective_prefers_smaller_limit() {
        let limits = MemoryLimits {
            host_bytes: Some(32 * GIB),
            cgroup_bytes: Some(16 * GIB),
        };
        assert_eq!(limits.effective(), Some(16 * GIB));
        let unlimited = MemoryLimits {
            host_bytes: Some(8 * GIB),
            cgroup_bytes: None,
        };
        assert_eq!(unlimited.effective(), Some(8 * GIB));
    }

    #[test]
    fn parses_meminfo() {
        let meminfo = "MemTotal:       16303412 kB\nMemFree:         1234 kB\n";
        assert_eq!(parse_meminfo_total(meminfo), Some(16303412 * 1024));
        assert_eq!(parse_meminfo_total("MemFree: 1 kB"), None);
    }

    #[test]
    fn unlimited_cgroup_reads_as_none() {
        let dir = std::env::temp_dir().join(format!("districtgrid-cgroup-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("memory.max");
        std::fs::write(&path, "max\n").unwrap();
        assert_eq!(read_cgroup_limit(&path), None);
        std::fs::write(&path, "4294967296\n").unwrap();
        assert_eq!(read_cgroup_limit(&path), Some(4 * GIB));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

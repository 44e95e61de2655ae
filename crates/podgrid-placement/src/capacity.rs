//! Deployable counts for unpinned requests.

use podgrid_resources::NodeInfo;

/// How many instances needing `memory` bytes and `quota` units of shared
/// CPU fit on `info`, capped at `max`.
///
/// A zero request in a dimension does not constrain that dimension.
pub fn share_capacity(info: &NodeInfo, memory: i64, quota: i64, max: usize) -> usize {
    let by_memory = if memory > 0 {
        fits(info.mem_cap, memory)
    } else {
        max
    };
    let by_cpu = if quota > 0 {
        fits(info.share_quota(), quota)
    } else {
        max
    };
    by_memory.min(by_cpu).min(max)
}

/// Whole multiples of `unit` in `available`; negative availability fits nothing.
pub(crate) fn fits(available: i64, unit: i64) -> usize {
    usize::try_from(available.max(0) / unit).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgrid_resources::{CpuMap, QUOTA_BASE};

    fn info(mem_cap: i64, cores: usize, cpu_used: i64) -> NodeInfo {
        NodeInfo {
            name: "n1".to_string(),
            cpu_map: (0..cores).map(|c| (c.to_string(), QUOTA_BASE)).collect::<CpuMap>(),
            mem_cap,
            cpu_used,
            ..Default::default()
        }
    }

    #[test]
    fn memory_bounds_capacity() {
        assert_eq!(share_capacity(&info(1024, 4, 0), 256, 0, 100), 4);
    }

    #[test]
    fn shared_quota_bounds_capacity() {
        // 2 cores minus half a core used = 1.5 cores = 3 × 0.5.
        assert_eq!(share_capacity(&info(1 << 20, 2, 5_000), 1, 5_000, 100), 3);
    }

    #[test]
    fn tighter_dimension_wins() {
        assert_eq!(share_capacity(&info(1024, 1, 0), 256, 5_000, 100), 2);
    }

    #[test]
    fn zero_request_is_capped_by_max() {
        assert_eq!(share_capacity(&info(1024, 1, 0), 0, 0, 16), 16);
    }

    #[test]
    fn overdrawn_node_fits_nothing() {
        assert_eq!(share_capacity(&info(-10, 1, 0), 256, 0, 100), 0);
        assert_eq!(share_capacity(&info(1024, 1, 20_000), 0, 1, 100), 0);
    }
}

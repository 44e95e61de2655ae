//! NUMA-aware search for pinned core combinations.
//!
//! A request for `q` cores becomes ⌊q⌋ whole cores plus, when `q` has a
//! fractional part, one more core carrying that fragment. Combinations are
//! carved one after another from a working copy of the node's availability,
//! so a set of combinations never promises more quota than the node has.
//! Quota held by unpinned workloads (`cpu_used`) is not tied to any core,
//! so it caps the number of combinations as a whole: together they never
//! exceed [`NodeInfo::share_quota`].
//!
//! Each NUMA domain is searched on its own first, keeping a workload's
//! cores and memory local. Only when no domain can host a single
//! combination is the node searched as one pool.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use podgrid_resources::{CpuMap, NodeInfo, QUOTA_BASE};

use crate::capacity::fits;

/// Cores grouped by NUMA domain; `None` holds cores without topology.
type Domains = BTreeMap<Option<String>, Vec<String>>;

/// Core combinations for `quota` units and `memory` bytes per instance on
/// `info`, at most `max` of them.
pub fn core_plans(info: &NodeInfo, quota: i64, memory: i64, max: usize) -> Vec<CpuMap> {
    if quota <= 0 {
        return Vec::new();
    }

    let by_memory = if memory > 0 {
        fits(info.mem_cap, memory)
    } else {
        max
    };
    let limit = by_memory.min(fits(info.share_quota(), quota)).min(max);
    if limit == 0 {
        return Vec::new();
    }

    let domains = domains(info);
    let mut plans = Vec::new();
    let mut available = info.cpu_map.clone();

    for (domain, cores) in &domains {
        let mut room = domain
            .as_ref()
            .filter(|_| memory > 0)
            .and_then(|d| info.numa_memory.get(d))
            .map_or(usize::MAX, |&m| fits(m, memory));

        while plans.len() < limit && room > 0 {
            let Some(plan) = carve(&mut available, cores, quota) else {
                break;
            };
            plans.push(plan);
            room -= 1;
        }
    }

    if plans.is_empty() && domains.len() > 1 {
        let mut available = info.cpu_map.clone();
        let all: Vec<String> = domains.into_values().flatten().collect();
        let all = sorted(all);
        while plans.len() < limit {
            let Some(plan) = carve(&mut available, &all, quota) else {
                break;
            };
            plans.push(plan);
        }
    }

    plans
}

fn domains(info: &NodeInfo) -> Domains {
    let mut domains = Domains::new();
    for core in info.cpu_map.keys() {
        domains
            .entry(info.numa.get(core).cloned())
            .or_default()
            .push(core.clone());
    }
    domains
        .into_iter()
        .map(|(domain, cores)| (domain, sorted(cores)))
        .collect()
}

/// Order cores numerically where possible ("2" before "10").
fn sorted(mut cores: Vec<String>) -> Vec<String> {
    cores.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
    cores
}

/// Take one combination from `cores`, deducting it from `available`.
fn carve(available: &mut CpuMap, cores: &[String], quota: i64) -> Option<CpuMap> {
    let whole = usize::try_from(quota / QUOTA_BASE).ok()?;
    let fragment = quota % QUOTA_BASE;

    let mut plan = CpuMap::new();
    for core in cores {
        if plan.len() == whole {
            break;
        }
        if available.get(core).is_some_and(|&q| q >= QUOTA_BASE) {
            plan.insert(core.clone(), QUOTA_BASE);
        }
    }
    if plan.len() < whole {
        return None;
    }

    if fragment > 0 {
        // Best fit: the least remaining quota that still holds the fragment.
        let core = cores
            .iter()
            .filter(|c| !plan.contains_key(*c))
            .filter_map(|c| available.get(c).map(|&q| (q, c)))
            .filter(|&(q, _)| q >= fragment)
            .min_by_key(|&(q, _)| q)
            .map(|(_, c)| c.clone())?;
        plan.insert(core, fragment);
    }

    for (core, quota) in &plan {
        if let Some(q) = available.get_mut(core) {
            *q -= quota;
        }
    }
    Some(plan)
}

//! Request validation.
//!
//! [`make_request`] is the only way to obtain a [`ResourceRequest`], so every
//! request reaching selection has already passed these checks:
//! - memory request/limit are non-negative
//! - CPU quota request/limit are finite and non-negative
//! - CPU binding carries a quota of at least one quota unit
//!
//! A request above its limit is accepted. Limits are enforced by whoever
//! runs the workload, not at admission.

use crate::error::{ResourceError, ResourceResult};
use crate::types::{QUOTA_BASE, ResourceOptions, ResourceType};

/// A validated, immutable resource request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceRequest {
    cpu_quota_request: f64,
    cpu_quota_limit: f64,
    cpu_bind: bool,
    memory_request: i64,
    memory_limit: i64,
}

/// Validate raw options into a [`ResourceRequest`].
pub fn make_request(options: ResourceOptions) -> ResourceResult<ResourceRequest> {
    if options.memory_request < 0 || options.memory_limit < 0 {
        return Err(ResourceError::InvalidResource(format!(
            "memory request {} and limit {} must not be negative",
            options.memory_request, options.memory_limit
        )));
    }

    if !valid_quota(options.cpu_quota_request) || !valid_quota(options.cpu_quota_limit) {
        return Err(ResourceError::InvalidResource(format!(
            "cpu quota request {} and limit {} must be finite and not negative",
            options.cpu_quota_request, options.cpu_quota_limit
        )));
    }

    if options.cpu_bind && to_units(options.cpu_quota_request) <= 0 {
        return Err(ResourceError::InvalidResource(format!(
            "cpu bind requires a cpu quota request of at least {}, got {}",
            1.0 / QUOTA_BASE as f64,
            options.cpu_quota_request
        )));
    }

    Ok(ResourceRequest {
        cpu_quota_request: options.cpu_quota_request,
        cpu_quota_limit: options.cpu_quota_limit,
        cpu_bind: options.cpu_bind,
        memory_request: options.memory_request,
        memory_limit: options.memory_limit,
    })
}

fn valid_quota(quota: f64) -> bool {
    quota.is_finite() && quota >= 0.0
}

fn to_units(quota: f64) -> i64 {
    (quota * QUOTA_BASE as f64).round() as i64
}

impl ResourceRequest {
    /// Resource dimensions this request manages.
    ///
    /// Always `CPU | MEMORY`; `CPU_BIND` is added when cores must be pinned.
    pub fn resource_type(&self) -> ResourceType {
        let mut t = ResourceType::CPU | ResourceType::MEMORY;
        if self.cpu_bind {
            t |= ResourceType::CPU_BIND;
        }
        t
    }

    pub fn cpu_quota_request(&self) -> f64 {
        self.cpu_quota_request
    }

    pub fn cpu_quota_limit(&self) -> f64 {
        self.cpu_quota_limit
    }

    pub fn cpu_bind(&self) -> bool {
        self.cpu_bind
    }

    pub fn memory_request(&self) -> i64 {
        self.memory_request
    }

    pub fn memory_limit(&self) -> i64 {
        self.memory_limit
    }

    /// CPU quota request in quota units, rounded to the nearest unit.
    pub fn quota_units(&self) -> i64 {
        to_units(self.cpu_quota_request)
    }
}

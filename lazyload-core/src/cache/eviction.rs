#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    Expired,
    OverQuota,
}

#[derive(Debug, Clone)]
pub struct CacheEntryInfo {
    /// Key inside the cacache index.
    pub index_key: String,
    pub size_bytes: u64,
    pub written_ms: u64,
    pub expires_ms: u64,
}

#[derive(Debug, Clone)]
pub struct PlannedEviction {
    pub index_key: String,
    pub size_bytes: u64,
    pub reason: EvictionReason,
}

#[derive(Debug, Default)]
pub struct EvictionPlan {
    pub planned: Vec<PlannedEviction>,
    pub total_bytes_before: u64,
    pub total_bytes_after: u64,
    pub removed_expired: usize,
    pub removed_quota: usize,
}

/// Expired entries go first; then the oldest writes until the store fits in
/// `max_bytes`. A `max_bytes` of `0` disables the quota pass.
pub fn plan_evictions(
    mut entries: Vec<CacheEntryInfo>,
    now_ms: u64,
    max_bytes: u64,
) -> EvictionPlan {
    let mut plan = EvictionPlan::default();

    let mut total_bytes: u64 = entries.iter().map(|e| e.size_bytes).sum();
    plan.total_bytes_before = total_bytes;

    let mut kept: Vec<CacheEntryInfo> = Vec::with_capacity(entries.len());
    for e in entries.drain(..) {
        if e.expires_ms <= now_ms {
            total_bytes = total_bytes.saturating_sub(e.size_bytes);
            plan.planned.push(PlannedEviction {
                index_key: e.index_key,
                size_bytes: e.size_bytes,
                reason: EvictionReason::Expired,
            });
            plan.removed_expired += 1;
        } else {
            kept.push(e);
        }
    }

    if max_bytes > 0 && total_bytes > max_bytes {
        kept.sort_by_key(|e| e.written_ms);
        for e in kept {
            if total_bytes <= max_bytes {
                break;
            }
            total_bytes = total_bytes.saturating_sub(e.size_bytes);
            plan.planned.push(PlannedEviction {
                index_key: e.index_key,
                size_bytes: e.size_bytes,
                reason: EvictionReason::OverQuota,
            });
            plan.removed_quota += 1;
        }
    }

    plan.total_bytes_after = total_bytes;
    plan
}

//! Per-unit speed budget.
//!
//! A download has one global byte-per-second ceiling. Units with an explicit
//! override keep it verbatim; the rest split whatever the overrides leave.
//! The split is computed once when the download starts and never adapts to
//! observed throughput.

/// A limit of 0 means "unlimited".
pub const UNLIMITED: u64 = 0;

/// Computes the throttle rate for each of `unit_count` units.
///
/// `overrides[i]` applies to unit `i`; entries past `unit_count` are ignored.
/// Non-overridden units receive `ceil(remaining / remaining_units)` where
/// `remaining = global_limit - sum(overrides)`. When the global limit is
/// unlimited, when nothing is left to split, or when every unit is
/// overridden, non-overridden units get [`UNLIMITED`].
pub fn allocate_speed_limits(
    global_limit: u64,
    overrides: &[Option<u64>],
    unit_count: usize,
) -> Vec<u64> {
    let explicit: Vec<Option<u64>> = (0..unit_count)
        .map(|i| overrides.get(i).copied().flatten())
        .collect();

    let overridden = explicit.iter().filter(|o| o.is_some()).count();
    let reserved: u128 = explicit.iter().flatten().map(|&v| v as u128).sum();
    let remaining_units = (unit_count - overridden) as u128;

    let share = if global_limit == UNLIMITED || remaining_units == 0 {
        UNLIMITED
    } else {
        let remaining = (global_limit as u128).saturating_sub(reserved);
        if remaining == 0 {
            UNLIMITED
        } else {
            let per_unit = remaining.div_ceil(remaining_units);
            u64::try_from(per_unit).unwrap_or(u64::MAX)
        }
    };

    explicit
        .into_iter()
        .map(|o| o.unwrap_or(share))
        .collect()
}

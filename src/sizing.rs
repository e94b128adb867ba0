//! Sizing policy: how many buckets a given capacity needs, and the fill
//! thresholds that decide when expansion or shrink becomes due.

use crate::bucket::{BUCKET_DIVISOR, BUCKET_FACTOR, ELEMENTS_PER_BUCKET};

/// Soft ceiling: crossing this triggers expansion when the process-wide
/// policy allows it. Hard ceiling: crossing this forces expansion even
/// under `ResizePolicy::Avoid`.
pub const MAX_FILL_PERCENT_SOFT: usize = 77;
pub const MAX_FILL_PERCENT_HARD: usize = 90;

/// Soft floor: crossing below this makes the table shrink-eligible. Hard
/// floor: crossing below this forces a shrink even under `Avoid`.
pub const MIN_FILL_PERCENT_SOFT: usize = 13;
pub const MIN_FILL_PERCENT_HARD: usize = 3;

#[inline]
fn ceil_div(a: usize, b: usize) -> Option<usize> {
    Some(a.checked_add(b - 1)? / b)
}

/// Total element capacity of a table with `2^exp` buckets.
#[inline]
pub(crate) fn capacity_for_exp(exp: u32) -> usize {
    (1usize << exp) * ELEMENTS_PER_BUCKET
}

/// The bucket-count exponent needed to hold `min_capacity` elements at or
/// under the soft fill ceiling, by the same shape of formula the sizing
/// policy names: round `min_capacity * BUCKET_FACTOR / BUCKET_DIVISOR` up
/// to a bucket count, then up again to the next power of two.
///
/// Returns `None` if `min_capacity` is large enough that the required
/// bucket count or byte capacity would overflow `usize` — the caller
/// should treat that the same as `spec.md` §4.4's "return 0 ... if
/// capacity overflows", i.e. refuse the resize rather than panic.
pub(crate) fn next_bucket_exp(min_capacity: usize) -> Option<u32> {
    if min_capacity == 0 {
        return Some(0);
    }
    let scaled = min_capacity.checked_mul(BUCKET_FACTOR)?;
    let min_buckets = ceil_div(scaled, BUCKET_DIVISOR)?.max(1);
    let exp = usize::BITS - (min_buckets - 1).leading_zeros();
    if exp >= usize::BITS {
        return None;
    }
    (1usize << exp).checked_mul(ELEMENTS_PER_BUCKET)?;
    Some(exp)
}

/// Percentage fill of a table with `used` elements and `2^exp` buckets.
/// `used` may exceed the reported "soft" capacity in the short window
/// before a rehash completes; this just reports the raw ratio.
#[inline]
pub(crate) fn fill_percent(used: usize, exp: u32) -> usize {
    let capacity = capacity_for_exp(exp);
    if capacity == 0 {
        return 0;
    }
    used.saturating_mul(100) / capacity
}

/// Process-wide gate on whether expansion/shrink may proceed under soft
/// thresholds. `Forbid` still allows a hard-threshold resize: a table that
/// is actually out of room has no alternative to growing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ResizePolicy {
    /// Expand/shrink as soon as soft thresholds are crossed.
    Allow = 0,
    /// Defer expand/shrink past soft thresholds; still resize at hard
    /// thresholds.
    Avoid = 1,
    /// Never resize proactively, even past hard thresholds. `Forbid` is
    /// meant for short, carefully bounded windows (e.g. around a fork,
    /// to keep the bucket arrays copy-on-write-friendly). It cannot make
    /// `add`/`replace` infallible, though: if every bucket in the table
    /// is genuinely full (the degenerate case the everfull bit exists to
    /// detect), an insert still forces a one-off expansion, since there
    /// is no other slot to put the new element in.
    Forbid = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResizeUrgency {
    None,
    Soft,
    Hard,
}

pub(crate) fn expand_urgency(used: usize, exp: u32) -> ResizeUrgency {
    let pct = fill_percent(used, exp);
    if pct >= MAX_FILL_PERCENT_HARD {
        ResizeUrgency::Hard
    } else if pct >= MAX_FILL_PERCENT_SOFT {
        ResizeUrgency::Soft
    } else {
        ResizeUrgency::None
    }
}

pub(crate) fn shrink_urgency(used: usize, exp: u32) -> ResizeUrgency {
    if exp == 0 {
        return ResizeUrgency::None;
    }
    let pct = fill_percent(used, exp);
    if pct <= MIN_FILL_PERCENT_HARD {
        ResizeUrgency::Hard
    } else if pct <= MIN_FILL_PERCENT_SOFT {
        ResizeUrgency::Soft
    } else {
        ResizeUrgency::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_bucket_exp_covers_minimum_capacity() {
        for cap in 0..500 {
            let exp = next_bucket_exp(cap).unwrap();
            assert!(capacity_for_exp(exp) * BUCKET_DIVISOR >= cap * BUCKET_FACTOR || cap == 0);
        }
    }

    #[test]
    fn next_bucket_exp_is_monotonic() {
        let mut prev = next_bucket_exp(0).unwrap();
        for cap in 1..2000 {
            let exp = next_bucket_exp(cap).unwrap();
            assert!(exp >= prev);
            prev = exp;
        }
    }

    #[test]
    fn next_bucket_exp_rejects_overflowing_capacity() {
        assert_eq!(next_bucket_exp(usize::MAX), None);
    }

    #[test]
    fn fill_percent_zero_capacity_is_zero() {
        assert_eq!(fill_percent(0, 0), 0);
    }

    #[test]
    fn expand_urgency_thresholds() {
        let exp = 4; // 16 buckets * ELEMENTS_PER_BUCKET capacity
        let capacity = capacity_for_exp(exp);
        let soft_used = capacity * MAX_FILL_PERCENT_SOFT / 100;
        assert_eq!(expand_urgency(soft_used, exp), ResizeUrgency::Soft);
        let hard_used = capacity * MAX_FILL_PERCENT_HARD / 100;
        assert_eq!(expand_urgency(hard_used, exp), ResizeUrgency::Hard);
    }
}

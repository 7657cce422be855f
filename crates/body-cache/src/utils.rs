//! Helpers shared by the pool and the caches.

/// Ratio of hits over all lookups, `0.0` before the first lookup.
#[allow(clippy::cast_precision_loss, reason = "counters far below 2^52 in practice")]
pub(crate) fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 { 0.0 } else { hits as f64 / total as f64 }
}

#[cfg(test)]
mod tests {
    use super::hit_rate;

    #[test]
    fn no_samples_is_zero() {
        let rate = hit_rate(0, 0);
        assert!(!rate.is_nan());
        assert!(rate.abs() < f64::EPSILON);
    }

    #[test]
    fn ratio_of_hits() {
        assert!((hit_rate(3, 1) - 0.75).abs() < f64::EPSILON);
        assert!((hit_rate(0, 5)).abs() < f64::EPSILON);
    }
}

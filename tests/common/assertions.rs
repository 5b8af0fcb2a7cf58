//! Custom test assertions

use std::collections::HashMap;

/// Assert every observed share is within `tolerance` of its expected share
pub fn assert_distribution(counts: &HashMap<String, usize>, expected: &HashMap<String, f64>, tolerance: f64) {
    let total: usize = counts.values().sum();
    assert!(total > 0, "Expected at least one observation");

    for (key, share) in expected {
        let observed = *counts.get(key).unwrap_or(&0) as f64 / total as f64;
        assert!(
            (observed - share).abs() <= tolerance,
            "Share of {} was {:.3}, expected {:.3} +/- {:.3}",
            key,
            observed,
            share,
            tolerance
        );
    }
}

//! Weight balancer: converts a traffic fraction into per-task weights.
//!
//! The old group is held at the baseline weight (100) and the new group's
//! weight is solved so that
//!
//! ```text
//! new_count * new_weight / (new_count * new_weight + old_count * 100) == fraction
//! ```
//!
//! which gives `new_weight = fraction * old_count * 100 / ((1 - fraction) * new_count)`.
//! The ratio degenerates at the boundaries, so `fraction == 0` and
//! `fraction == 1` are answered directly.

use serde::{Deserialize, Serialize};
use shoal_state::BASELINE_WEIGHT;

use crate::error::{CanaryError, CanaryResult};

/// Weights to apply to the new and old version groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weights {
    pub new_weight: u32,
    pub old_weight: u32,
}

/// Reject fractions outside `[0, 1]` (NaN included).
pub fn validate_fraction(fraction: f64) -> CanaryResult<()> {
    if (0.0..=1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(CanaryError::InvalidArgument(format!(
            "traffic fraction must be within [0, 1], got {fraction}"
        )))
    }
}

/// Compute the weight pair for `fraction` of traffic going to the new group.
///
/// Stateless: previously assigned weights play no part in the result.
pub fn compute_weight(new_count: u32, old_count: u32, fraction: f64) -> CanaryResult<Weights> {
    if new_count == 0 || old_count == 0 {
        return Err(CanaryError::InvalidArgument(format!(
            "cannot balance against an empty group (new={new_count}, old={old_count})"
        )));
    }
    validate_fraction(fraction)?;

    if fraction == 0.0 {
        return Ok(Weights {
            new_weight: 0,
            old_weight: BASELINE_WEIGHT,
        });
    }
    if fraction == 1.0 {
        return Ok(Weights {
            new_weight: BASELINE_WEIGHT,
            old_weight: 0,
        });
    }

    let raw = fraction * f64::from(old_count) * f64::from(BASELINE_WEIGHT)
        / ((1.0 - fraction) * f64::from(new_count));
    // Round half up; raw is strictly positive here.
    let rounded = (raw + 0.5).floor();
    if !rounded.is_finite() || rounded > f64::from(u32::MAX) {
        return Err(CanaryError::InvalidArgument(format!(
            "fraction {fraction} yields a weight beyond the representable range"
        )));
    }

    Ok(Weights {
        new_weight: rounded as u32,
        old_weight: BASELINE_WEIGHT,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn half_split_three_against_two() {
        let w = compute_weight(3, 2, 0.5).unwrap();
        assert_eq!(w, Weights { new_weight: 67, old_weight: 100 });
    }

    #[test]
    fn eighty_percent_three_against_two() {
        let w = compute_weight(3, 2, 0.8).unwrap();
        assert_eq!(w, Weights { new_weight: 267, old_weight: 100 });
    }

    #[test]
    fn boundaries_ignore_counts() {
        for (n, o) in [(1, 1), (3, 2), (1, 999), (500, 1)] {
            assert_eq!(
                compute_weight(n, o, 0.0).unwrap(),
                Weights { new_weight: 0, old_weight: 100 }
            );
            assert_eq!(
                compute_weight(n, o, 1.0).unwrap(),
                Weights { new_weight: 100, old_weight: 0 }
            );
        }
    }

    #[test]
    fn exact_half_rounds_up() {
        // 0.5 * 1 * 100 / (0.5 * 8) = 12.5
        assert_eq!(compute_weight(8, 1, 0.5).unwrap().new_weight, 13);
    }

    #[test]
    fn empty_group_is_invalid() {
        assert!(matches!(
            compute_weight(0, 2, 0.5),
            Err(CanaryError::InvalidArgument(_))
        ));
        assert!(matches!(
            compute_weight(2, 0, 0.0),
            Err(CanaryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn out_of_range_fraction_is_invalid() {
        for f in [-0.1, 1.01, f64::NAN, f64::INFINITY] {
            assert!(compute_weight(1, 1, f).is_err(), "fraction {f} accepted");
        }
    }

    #[test]
    fn overflowing_weight_is_rejected() {
        let f = 1.0 - 1e-12;
        assert!(matches!(
            compute_weight(1, 1_000_000, f),
            Err(CanaryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn idempotent() {
        let a = compute_weight(7, 4, 0.35).unwrap();
        let b = compute_weight(7, 4, 0.35).unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn interior_fractions_match_formula(
            new_count in 1u32..200,
            old_count in 1u32..200,
            fraction in 0.001f64..0.999,
        ) {
            let w = compute_weight(new_count, old_count, fraction).unwrap();
            prop_assert_eq!(w.old_weight, 100);

            let exact = fraction * f64::from(old_count) * 100.0
                / ((1.0 - fraction) * f64::from(new_count));
            prop_assert!((f64::from(w.new_weight) - exact).abs() <= 0.5 + 1e-9);
        }
    }
}

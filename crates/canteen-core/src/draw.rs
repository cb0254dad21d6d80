//! # Draw Selection
//!
//! Uniform selection of one ticket out of the eligible set.
//!
//! ```text
//!   eligible = status != cancelled AND NOT is_winner, insertion order
//!
//!   [ t0 ][ t1 ][ t2 ] ... [ tN-1 ]
//!                 ▲
//!                 r = uniform in [0, N)
//! ```
//!
//! The database layer counts the eligible set and fetches the `r`-th row;
//! this module only picks `r`. The RNG is supplied by the caller so tests
//! can seed it.

use rand::Rng;

use crate::error::{CoreError, CoreResult};

/// Picks a uniformly random index in `[0, eligible)`.
///
/// ## Errors
/// `NoEligibleTickets` when `eligible == 0`.
///
/// ## Example
/// ```rust
/// use canteen_core::draw::pick_index;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut rng = StdRng::seed_from_u64(1);
/// let r = pick_index(&mut rng, 10).unwrap();
/// assert!(r < 10);
/// assert!(pick_index(&mut rng, 0).is_err());
/// ```
pub fn pick_index<R: Rng + ?Sized>(rng: &mut R, eligible: u64) -> CoreResult<u64> {
    if eligible == 0 {
        return Err(CoreError::NoEligibleTickets);
    }

    Ok(rng.gen_range(0..eligible))
}

/// Pearson chi-square statistic of observed counts against a uniform
/// expectation. Used to check draw fairness.
pub fn chi_square_uniform(observed: &[u64]) -> f64 {
    let total: u64 = observed.iter().sum();
    if observed.is_empty() || total == 0 {
        return 0.0;
    }

    let expected = total as f64 / observed.len() as f64;
    observed
        .iter()
        .map(|&count| {
            let diff = count as f64 - expected;
            diff * diff / expected
        })
        .sum()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Critical value of chi-square with 9 degrees of freedom at p = 0.001.
    const CHI_SQUARE_DF9_P001: f64 = 27.877;

    #[test]
    fn test_zero_eligible_fails() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            pick_index(&mut rng, 0),
            Err(CoreError::NoEligibleTickets)
        ));
    }

    #[test]
    fn test_single_eligible_always_zero() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(pick_index(&mut rng, 1).unwrap(), 0);
        }
    }

    #[test]
    fn test_fairness_over_ten_thousand_draws() {
        let mut rng = StdRng::seed_from_u64(20240116);
        let mut counts = [0u64; 10];

        for _ in 0..10_000 {
            let r = pick_index(&mut rng, 10).unwrap();
            counts[r as usize] += 1;
        }

        for (ticket, &count) in counts.iter().enumerate() {
            assert!(
                (850..=1150).contains(&count),
                "ticket {ticket} selected {count} times"
            );
        }

        let chi2 = chi_square_uniform(&counts);
        assert!(chi2 < CHI_SQUARE_DF9_P001, "chi-square {chi2}");
    }

    #[test]
    fn test_chi_square_detects_bias() {
        let biased = [5_000, 556, 556, 556, 556, 556, 556, 556, 556, 552];
        assert!(chi_square_uniform(&biased) > CHI_SQUARE_DF9_P001);
        assert_eq!(chi_square_uniform(&[100, 100, 100]), 0.0);
        assert_eq!(chi_square_uniform(&[]), 0.0);
    }
}

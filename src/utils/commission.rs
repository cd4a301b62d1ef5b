//! Commission ledger arithmetic.
//!
//! Everything here is pure: callers load a [`Commission`], run it through
//! these functions and write the returned value back as a whole record.

use serde::Deserialize;

use crate::models::referrals::{Commission, ReferralSummary};

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient commission balance: available {available}, requested {requested}")]
    InsufficientBalance { available: u64, requested: u64 },
}

/// Flat commission paid per referral at each tier.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct CommissionRates {
    pub direct: u64,
    pub level2: u64,
    pub level3: u64,
}

impl Default for CommissionRates {
    fn default() -> Self {
        CommissionRates {
            direct: 3000,
            level2: 300,
            level3: 150,
        }
    }
}

/// Sum of all three levels, missing levels counted as zero.
pub fn total_commission(commission: &Commission) -> u64 {
    commission
        .levels()
        .iter()
        .fold(0u64, |acc, level| acc.saturating_add(*level))
}

/// Deducts `amount` from the commission proportionally to each level's share
/// of the total.
///
/// Each level loses `round(level * amount / total)`, computed exactly and
/// rounded half up. Because the three shares are rounded independently, the
/// sum of the deductions may differ from `amount` by at most one unit per
/// level.
///
/// A zero total with a zero amount is a no-op. The function is stateless:
/// calling it again on its own output deducts again.
pub fn deduct(commission: &Commission, amount: u64) -> Result<Commission, LedgerError> {
    let total = total_commission(commission);
    if total < amount {
        return Err(LedgerError::InsufficientBalance {
            available: total,
            requested: amount,
        });
    }

    if total == 0 {
        return Ok(*commission);
    }

    let [level1, level2, level3] = commission
        .levels()
        .map(|level| level.saturating_sub(proportional_share(level, amount, total)));

    Ok(Commission::new(level1, level2, level3))
}

// round_half_up(level * amount / total); requires total > 0 and amount <= total.
fn proportional_share(level: u64, amount: u64, total: u64) -> u64 {
    let product = level as u128 * amount as u128;
    let total = total as u128;
    let quotient = product / total;
    let remainder = product % total;

    let rounded = if remainder * 2 >= total {
        quotient + 1
    } else {
        quotient
    };

    // amount <= total keeps the share within level, so this never truncates.
    rounded as u64
}

/// Estimates referral counts per tier from the current balance.
///
/// Counts are `floor(level / rate)`, which assumes every referral paid exactly
/// the flat rate. Deductions shrink the balance without removing referrals,
/// so after any withdrawal these figures under-count the referral history.
pub fn summarize(commission: &Commission, rates: &CommissionRates) -> ReferralSummary {
    let [level1, level2, level3] = commission.levels();

    let level1_referrals = level1.checked_div(rates.direct).unwrap_or(0);
    let level2_referrals = level2.checked_div(rates.level2).unwrap_or(0);
    let level3_referrals = level3.checked_div(rates.level3).unwrap_or(0);

    ReferralSummary {
        total_commission: total_commission(commission),
        commission_breakdown: *commission,
        level1_referrals,
        level2_referrals,
        level3_referrals,
        total_referrals: level1_referrals
            .saturating_add(level2_referrals)
            .saturating_add(level3_referrals),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn deducted(before: &Commission, after: &Commission) -> u64 {
        before
            .levels()
            .iter()
            .zip(after.levels().iter())
            .map(|(b, a)| b - a)
            .sum()
    }

    #[test]
    fn total_treats_missing_levels_as_zero() {
        let commission = Commission {
            level1: Some(3000),
            level2: None,
            level3: None,
        };
        assert_eq!(total_commission(&commission), 3000);
        assert_eq!(total_commission(&Commission::default()), 0);
    }

    #[test]
    fn deducts_ten_percent_from_each_level() {
        let commission = Commission::new(3000, 300, 150);
        let result = deduct(&commission, 345).unwrap();
        assert_eq!(result, Commission::new(2700, 270, 135));
    }

    #[test]
    fn empty_balance_is_insufficient() {
        let commission = Commission::new(0, 0, 0);
        assert_eq!(
            deduct(&commission, 100),
            Err(LedgerError::InsufficientBalance {
                available: 0,
                requested: 100
            })
        );
    }

    #[test]
    fn zero_from_zero_is_a_no_op() {
        let commission = Commission::default();
        assert_eq!(deduct(&commission, 0), Ok(commission));
    }

    #[test]
    fn full_withdrawal_drains_every_level() {
        let commission = Commission::new(1234, 77, 9);
        let result = deduct(&commission, 1320).unwrap();
        assert_eq!(result, Commission::new(0, 0, 0));
    }

    #[test]
    fn missing_levels_come_back_as_zero() {
        let commission = Commission {
            level1: Some(3000),
            level2: None,
            level3: None,
        };
        let result = deduct(&commission, 1000).unwrap();
        assert_eq!(result, Commission::new(2000, 0, 0));
    }

    #[test]
    fn halves_round_up() {
        // 1 * 3 / 6 = 0.5 for each of level2 and level3.
        let commission = Commission::new(4, 1, 1);
        let result = deduct(&commission, 3).unwrap();
        assert_eq!(result, Commission::new(2, 0, 0));
    }

    #[test]
    fn repeated_deductions_accumulate() {
        let commission = Commission::new(3000, 300, 150);
        let once = deduct(&commission, 345).unwrap();
        let twice = deduct(&once, 345).unwrap();
        assert_eq!(twice, Commission::new(2400, 240, 120));
        assert_eq!(total_commission(&twice), 2760);
    }

    #[test]
    fn summary_counts_referrals_per_tier() {
        let rates = CommissionRates::default();
        let summary = summarize(&Commission::new(6000, 900, 200), &rates);

        assert_eq!(summary.total_commission, 7100);
        assert_eq!(summary.level1_referrals, 2);
        assert_eq!(summary.level2_referrals, 3);
        assert_eq!(summary.level3_referrals, 1);
        assert_eq!(summary.total_referrals, 6);
        assert_eq!(summary.commission_breakdown, Commission::new(6000, 900, 200));
    }

    #[test]
    fn summary_undercounts_after_deduction() {
        let rates = CommissionRates::default();
        let commission = deduct(&Commission::new(3000, 300, 150), 345).unwrap();
        let summary = summarize(&commission, &rates);

        assert_eq!(summary.level1_referrals, 0);
        assert_eq!(summary.level2_referrals, 0);
        assert_eq!(summary.level3_referrals, 0);
    }

    #[test]
    fn summary_with_zero_rate_counts_nothing() {
        let rates = CommissionRates {
            direct: 0,
            level2: 300,
            level3: 150,
        };
        let summary = summarize(&Commission::new(3000, 300, 0), &rates);
        assert_eq!(summary.level1_referrals, 0);
        assert_eq!(summary.total_referrals, 1);
    }

    #[test]
    fn summary_total_saturates_on_huge_balances() {
        let rates = CommissionRates {
            direct: 1,
            level2: 1,
            level3: 1,
        };
        let summary = summarize(&Commission::new(u64::MAX, u64::MAX, 5), &rates);

        assert_eq!(summary.level1_referrals, u64::MAX);
        assert_eq!(summary.total_referrals, u64::MAX);
        assert_eq!(summary.total_commission, u64::MAX);
    }

    fn commission_strategy() -> impl Strategy<Value = Commission> {
        (
            proptest::option::of(0u64..10_000_000),
            proptest::option::of(0u64..10_000_000),
            proptest::option::of(0u64..10_000_000),
        )
            .prop_map(|(level1, level2, level3)| Commission {
                level1,
                level2,
                level3,
            })
    }

    proptest! {
        #[test]
        fn total_is_sum_of_levels(commission in commission_strategy()) {
            let expected = commission.level1.unwrap_or(0)
                + commission.level2.unwrap_or(0)
                + commission.level3.unwrap_or(0);
            prop_assert_eq!(total_commission(&commission), expected);
        }

        #[test]
        fn overdraft_is_rejected(commission in commission_strategy(), extra in 1u64..1_000_000) {
            let total = total_commission(&commission);
            let before = commission;
            let result = deduct(&commission, total + extra);
            let is_insufficient = matches!(result, Err(LedgerError::InsufficientBalance { .. }));
            prop_assert!(is_insufficient);
            prop_assert_eq!(commission, before);
        }

        #[test]
        fn deduction_stays_within_bounds(
            commission in commission_strategy(),
            fraction in 0.0f64..=1.0,
        ) {
            let total = total_commission(&commission);
            prop_assume!(total > 0);
            let amount = ((total as f64) * fraction).floor() as u64;

            let after = deduct(&commission, amount).unwrap();

            for (b, a) in commission.levels().iter().zip(after.levels().iter()) {
                prop_assert!(a <= b);
            }
            let taken = deducted(&commission, &after);
            prop_assert!(taken.abs_diff(amount) <= 2, "taken {} for amount {}", taken, amount);
        }
    }
}

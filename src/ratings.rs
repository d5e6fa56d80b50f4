//! Mean administrator and user ratings of a pod
//!
//! The admin mean keeps (effectively) full precision while the user mean is
//! rounded to two decimals. The asymmetry is long-standing stored behaviour.

use crate::storage::schema::RatingRecord;

const ADMIN_DIGITS: u32 = 22;
const USER_DIGITS: u32 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingSummary {
    pub admin: f64,
    pub user: f64,
}

/// Aggregate all ratings of one pod; an empty group averages to `0`
pub fn aggregate(records: &[RatingRecord]) -> RatingSummary {
    let (admin, user): (Vec<&RatingRecord>, Vec<&RatingRecord>) =
        records.iter().partition(|record| record.is_admin);

    RatingSummary {
        admin: round_to(mean(&admin), ADMIN_DIGITS),
        user: round_to(mean(&user), USER_DIGITS),
    }
}

fn mean(records: &[&RatingRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|record| record.rating).sum::<f64>() / records.len() as f64
}

/// Round half away from zero to `digits` decimals
///
/// An `f64` cannot represent more than 15 decimals reliably, so larger
/// precisions return the value unchanged.
pub fn round_to(value: f64, digits: u32) -> f64 {
    if digits > 15 || !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

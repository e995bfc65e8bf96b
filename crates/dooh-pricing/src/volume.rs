use crate::{NormalizedPeriod, PricingError};
use rust_decimal::Decimal;

/// Total insertions across all screens for the whole period.
///
/// Days: iph × hours × days × screens.
/// Months: iph × hours × business days × months × screens.
///
/// The result is never rounded; fractional months give fractional volume.
pub fn total_insertions(
    insertions_per_hour: u32,
    hours_per_day: u32,
    period: &NormalizedPeriod,
    screens_count: u32,
) -> Result<Decimal, PricingError> {
    if hours_per_day == 0 {
        return Err(PricingError::InvalidPeriod(
            "hours per day must be > 0".to_string(),
        ));
    }
    [
        Decimal::from(insertions_per_hour),
        Decimal::from(hours_per_day),
        Decimal::from(period.days_per_unit),
        period.length,
        Decimal::from(screens_count),
    ]
    .iter()
    .try_fold(Decimal::ONE, |acc, f| acc.checked_mul(*f))
    .ok_or(PricingError::Overflow("total insertions"))
}

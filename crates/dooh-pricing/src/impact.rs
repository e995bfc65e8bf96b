use crate::PricingError;
use rust_decimal::Decimal;

/// Estimated audience impacts: insertions × audience per insertion.
pub fn estimate_impacts(
    total_insertions: Decimal,
    avg_audience_per_insertion: Decimal,
) -> Result<Decimal, PricingError> {
    if avg_audience_per_insertion < Decimal::ZERO {
        return Err(PricingError::InvalidAudience(avg_audience_per_insertion));
    }
    total_insertions
        .checked_mul(avg_audience_per_insertion)
        .ok_or(PricingError::Overflow("impacts"))
}

/// Flat audience per insertion equivalent to a venue audience aggregate.
///
/// `monthly_audience` is the summed monthly audience of the selected screens'
/// venues and `monthly_insertions` the insertions those screens air per
/// month. No insertions means no audience can be attributed, so the
/// result is zero.
pub fn audience_per_insertion_from_venues(
    monthly_audience: Decimal,
    monthly_insertions: Decimal,
) -> Result<Decimal, PricingError> {
    if monthly_audience < Decimal::ZERO {
        return Err(PricingError::InvalidAudience(monthly_audience));
    }
    if monthly_insertions <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    monthly_audience
        .checked_div(monthly_insertions)
        .ok_or(PricingError::Overflow("audience per insertion"))
}

use crate::PricingError;
use dooh_core::{Period, PeriodUnit};
use rust_decimal::Decimal;
use tracing::warn;

/// Campaign period reduced to one accounting unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalizedPeriod {
    /// Length in `unit`s; may be fractional for months.
    pub length: Decimal,
    pub unit: PeriodUnit,
    /// Running days per unit: 1 for days, business days for months.
    pub days_per_unit: u32,
}

/// Select the authoritative period figure. No months/days conversion happens
/// here; the volume calculator expands months with `days_per_unit`.
pub fn normalize_period(period: &Period) -> Result<NormalizedPeriod, PricingError> {
    match *period {
        Period::Days { days } => Ok(NormalizedPeriod {
            length: Decimal::from(days),
            unit: PeriodUnit::Days,
            days_per_unit: 1,
        }),
        Period::Months {
            months,
            business_days_per_month,
        } => {
            if months < Decimal::ZERO {
                warn!(%months, "negative campaign period");
                return Err(PricingError::InvalidPeriod(format!(
                    "months must be >= 0, got {months}"
                )));
            }
            if business_days_per_month == 0 {
                return Err(PricingError::InvalidPeriod(
                    "business days per month must be > 0".to_string(),
                ));
            }
            Ok(NormalizedPeriod {
                length: months,
                unit: PeriodUnit::Months,
                days_per_unit: business_days_per_month,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_pass_through() {
        let p = normalize_period(&Period::Days { days: 30 }).unwrap();
        assert_eq!(p.length, Decimal::from(30));
        assert_eq!(p.unit, PeriodUnit::Days);
        assert_eq!(p.days_per_unit, 1);
    }

    #[test]
    fn months_keep_fraction_and_business_days() {
        let p = normalize_period(&Period::Months {
            months: Decimal::new(25, 1),
            business_days_per_month: 20,
        })
        .unwrap();
        assert_eq!(p.length, Decimal::new(25, 1));
        assert_eq!(p.unit, PeriodUnit::Months);
        assert_eq!(p.days_per_unit, 20);
    }

    #[test]
    fn negative_months_rejected() {
        let err = normalize_period(&Period::Months {
            months: Decimal::new(-1, 0),
            business_days_per_month: 22,
        })
        .unwrap_err();
        assert!(matches!(err, PricingError::InvalidPeriod(_)));
    }

    #[test]
    fn zero_business_days_rejected() {
        assert!(normalize_period(&Period::Months {
            months: Decimal::ONE,
            business_days_per_month: 0,
        })
        .is_err());
    }

    #[test]
    fn zero_length_is_valid() {
        assert!(normalize_period(&Period::Days { days: 0 }).is_ok());
        assert!(normalize_period(&Period::Months {
            months: Decimal::ZERO,
            business_days_per_month: 22,
        })
        .is_ok());
    }
}

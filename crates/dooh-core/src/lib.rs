#![deny(warnings)]

//! Core domain models for DOOH campaign proposals.
//!
//! This crate defines the serializable pricing input consumed by the
//! calculation engine, together with small validation helpers that keep
//! basic invariants (non-zero film lengths, discount bounds, calendar spans).

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Operating hours per day assumed when the proposal does not say otherwise.
pub const DEFAULT_HOURS_PER_DAY: u32 = 10;
/// Business days per month used by month-based accounting.
pub const DEFAULT_BUSINESS_DAYS_PER_MONTH: u32 = 22;

/// Length of an ad film in seconds, e.g. 15s, 30s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FilmDuration(pub u32);

// Price tables arrive keyed by numeric strings ("15", "30s") from JSON and by
// integers from YAML, including inside tagged enums where keys are buffered.
impl<'de> Deserialize<'de> for FilmDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SecsVisitor;

        impl<'de> Visitor<'de> for SecsVisitor {
            type Value = FilmDuration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a film duration in seconds")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FilmDuration, E> {
                u32::try_from(v)
                    .map(FilmDuration)
                    .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FilmDuration, E> {
                u32::try_from(v)
                    .map(FilmDuration)
                    .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FilmDuration, E> {
                v.trim()
                    .trim_end_matches('s')
                    .parse::<u32>()
                    .map(FilmDuration)
                    .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(SecsVisitor)
    }
}

impl FilmDuration {
    /// Build a duration, rejecting zero-second films.
    pub fn new(secs: u32) -> Result<Self, ValidationError> {
        if secs == 0 {
            return Err(ValidationError::ZeroDuration);
        }
        Ok(Self(secs))
    }

    /// Duration in seconds.
    pub fn secs(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FilmDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Site-wide scheduling assumptions, loadable from a YAML file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingDefaults {
    /// Screen operating hours per day (> 0).
    pub hours_per_day: u32,
    /// Business days counted per month in month-based accounting (> 0).
    pub business_days_per_month: u32,
}

impl Default for PricingDefaults {
    fn default() -> Self {
        Self {
            hours_per_day: DEFAULT_HOURS_PER_DAY,
            business_days_per_month: DEFAULT_BUSINESS_DAYS_PER_MONTH,
        }
    }
}

fn default_hours_per_day() -> u32 {
    DEFAULT_HOURS_PER_DAY
}

fn default_business_days_per_month() -> u32 {
    DEFAULT_BUSINESS_DAYS_PER_MONTH
}

/// Accounting unit of a campaign period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodUnit {
    Days,
    Months,
}

/// Campaign length in exactly one accounting unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum Period {
    /// Day-based accounting: every calendar day runs.
    Days { days: u32 },
    /// Month-based accounting; fractional months are allowed.
    Months {
        months: Decimal,
        #[serde(default = "default_business_days_per_month")]
        business_days_per_month: u32,
    },
}

impl Period {
    pub fn unit(&self) -> PeriodUnit {
        match self {
            Period::Days { .. } => PeriodUnit::Days,
            Period::Months { .. } => PeriodUnit::Months,
        }
    }
}

/// Inclusive calendar span chosen in the proposal flow.
///
/// The end never precedes the start, whether built with [`CampaignSpan::new`]
/// or deserialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CampaignSpan {
    start: NaiveDate,
    end: NaiveDate,
}

impl<'de> Deserialize<'de> for CampaignSpan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            start: NaiveDate,
            end: NaiveDate,
        }

        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.start, raw.end).map_err(de::Error::custom)
    }
}

impl CampaignSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::SpanEndsBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days, both ends included.
    pub fn day_count(&self) -> Result<u32, ValidationError> {
        let days = self.end.signed_duration_since(self.start).num_days() + 1;
        u32::try_from(days).map_err(|_| ValidationError::DateOutOfRange)
    }

    /// Day-based period covering the span.
    pub fn to_days(&self) -> Result<Period, ValidationError> {
        Ok(Period::Days {
            days: self.day_count()?,
        })
    }

    /// Month-based period covering the span.
    ///
    /// Whole calendar months are counted from `start`; the remaining days are
    /// expressed as a fraction of the length of the month that follows.
    /// Jan 1 to Jan 31 is exactly one month, Jan 1 to Jan 15 is 15/31.
    pub fn to_months(&self, business_days_per_month: u32) -> Result<Period, ValidationError> {
        let end_exclusive = self
            .end
            .succ_opt()
            .ok_or(ValidationError::DateOutOfRange)?;
        let mut whole: u32 = 0;
        let mut cursor = self.start;
        loop {
            let next = self
                .start
                .checked_add_months(Months::new(whole + 1))
                .ok_or(ValidationError::DateOutOfRange)?;
            if next > end_exclusive {
                break;
            }
            whole += 1;
            cursor = next;
        }
        let remaining = end_exclusive.signed_duration_since(cursor).num_days();
        let mut months = Decimal::from(whole);
        if remaining > 0 {
            let following = cursor
                .checked_add_months(Months::new(1))
                .ok_or(ValidationError::DateOutOfRange)?;
            let month_len = following.signed_duration_since(cursor).num_days();
            months += Decimal::from(remaining) / Decimal::from(month_len);
        }
        Ok(Period::Months {
            months,
            business_days_per_month,
        })
    }
}

/// Commercial product line with its own price table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductLine {
    Avulsa,
    Especial,
}

impl fmt::Display for ProductLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductLine::Avulsa => f.write_str("avulsa"),
            ProductLine::Especial => f.write_str("especial"),
        }
    }
}

/// Which product line(s) a per-insertion proposal is priced with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingVariant {
    Avulsa,
    Especial,
    /// Both lines priced side by side.
    Ambos,
}

impl PricingVariant {
    /// Product lines that must be priced for this variant, in reporting order.
    pub fn product_lines(self) -> &'static [ProductLine] {
        match self {
            PricingVariant::Avulsa => &[ProductLine::Avulsa],
            PricingVariant::Especial => &[ProductLine::Especial],
            PricingVariant::Ambos => &[ProductLine::Avulsa, ProductLine::Especial],
        }
    }
}

impl fmt::Display for PricingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingVariant::Avulsa => f.write_str("avulsa"),
            PricingVariant::Especial => f.write_str("especial"),
            PricingVariant::Ambos => f.write_str("ambos"),
        }
    }
}

/// Per-insertion prices keyed by film duration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceTable(pub BTreeMap<FilmDuration, Decimal>);

impl PriceTable {
    /// Price for `duration`, only when it is defined and strictly positive.
    pub fn price_for(&self, duration: FilmDuration) -> Option<Decimal> {
        self.0
            .get(&duration)
            .copied()
            .filter(|p| *p > Decimal::ZERO)
    }

    /// Active durations with no usable price, in ascending order.
    pub fn missing(&self, durations: &[FilmDuration]) -> Vec<FilmDuration> {
        durations
            .iter()
            .copied()
            .filter(|d| self.price_for(*d).is_none())
            .collect()
    }
}

impl FromIterator<(FilmDuration, Decimal)> for PriceTable {
    fn from_iter<I: IntoIterator<Item = (FilmDuration, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Price tables for both product lines.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionPrices {
    #[serde(default)]
    pub avulsa: PriceTable,
    #[serde(default)]
    pub especial: PriceTable,
}

impl InsertionPrices {
    pub fn table(&self, line: ProductLine) -> &PriceTable {
        match line {
            ProductLine::Avulsa => &self.avulsa,
            ProductLine::Especial => &self.especial,
        }
    }
}

/// Discount overriding a single duration's line item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationDiscount {
    /// Percentage in [0, 100].
    #[serde(default)]
    pub pct: Option<Decimal>,
    /// Fixed amount (>= 0) subtracted after the percentage.
    #[serde(default)]
    pub fixed: Option<Decimal>,
}

impl DurationDiscount {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(pct) = self.pct {
            validate_discount_pct(pct)?;
        }
        if let Some(fixed) = self.fixed {
            validate_discount_fixed(fixed)?;
        }
        Ok(())
    }
}

/// Duration-level discounts for each product line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerDurationDiscounts {
    #[serde(default)]
    pub avulsa: BTreeMap<FilmDuration, DurationDiscount>,
    #[serde(default)]
    pub especial: BTreeMap<FilmDuration, DurationDiscount>,
}

impl PerDurationDiscounts {
    pub fn for_line(&self, line: ProductLine) -> &BTreeMap<FilmDuration, DurationDiscount> {
        match line {
            ProductLine::Avulsa => &self.avulsa,
            ProductLine::Especial => &self.especial,
        }
    }

    pub fn get(&self, line: ProductLine, duration: FilmDuration) -> Option<&DurationDiscount> {
        self.for_line(line).get(&duration)
    }

    pub fn is_empty(&self) -> bool {
        self.avulsa.is_empty() && self.especial.is_empty()
    }

    /// Check every entry of both lines, including durations not in play.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.avulsa
            .values()
            .chain(self.especial.values())
            .try_for_each(DurationDiscount::validate)
    }
}

/// How total insertions are attributed to each active duration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionSplit {
    /// Equal share per duration.
    #[default]
    Even,
    /// Share proportional to the given weight; durations without a weight get none.
    Weighted(BTreeMap<FilmDuration, Decimal>),
}

/// Pricing policy for a proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PricingMode {
    /// Cost per thousand impacts.
    Cpm {
        #[serde(default)]
        cpm_value: Option<Decimal>,
    },
    /// Per-insertion price looked up by duration and product line.
    Insertion {
        variant: PricingVariant,
        #[serde(default)]
        prices: InsertionPrices,
        #[serde(default)]
        discounts: PerDurationDiscounts,
        #[serde(default)]
        split: InsertionSplit,
    },
}

/// Full snapshot of a proposal configuration handed to the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingInput {
    /// Number of selected screens.
    pub screens_count: u32,
    /// Catalog film durations in play.
    #[serde(default)]
    pub film_durations: BTreeSet<FilmDuration>,
    /// Optional non-catalog duration merged into the active set.
    #[serde(default)]
    pub custom_duration: Option<FilmDuration>,
    pub insertions_per_hour: u32,
    #[serde(default = "default_hours_per_day")]
    pub hours_per_day: u32,
    pub period: Period,
    /// Flat audience assumption per insertion (>= 0).
    pub avg_audience_per_insertion: Decimal,
    pub pricing: PricingMode,
    /// Proposal-level percentage in [0, 100].
    #[serde(default)]
    pub discount_pct: Decimal,
    /// Proposal-level fixed discount (>= 0).
    #[serde(default)]
    pub discount_fixed: Decimal,
}

/// Validation errors for proposal domain values.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Film durations must be at least one second.
    #[error("film duration must be > 0 seconds")]
    ZeroDuration,
    /// Campaign end date precedes its start date.
    #[error("campaign ends ({end}) before it starts ({start})")]
    SpanEndsBeforeStart { start: NaiveDate, end: NaiveDate },
    /// Date arithmetic left the supported calendar range.
    #[error("date out of supported range")]
    DateOutOfRange,
    /// Discount percentage outside [0, 100].
    #[error("discount percentage {0} is outside [0, 100]")]
    DiscountPctOutOfRange(Decimal),
    /// Fixed discounts cannot be negative.
    #[error("fixed discount {0} is negative")]
    NegativeDiscount(Decimal),
}

/// Validate a discount percentage.
pub fn validate_discount_pct(pct: Decimal) -> Result<(), ValidationError> {
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(ValidationError::DiscountPctOutOfRange(pct));
    }
    Ok(())
}

/// Validate a fixed discount amount.
pub fn validate_discount_fixed(fixed: Decimal) -> Result<(), ValidationError> {
    if fixed < Decimal::ZERO {
        return Err(ValidationError::NegativeDiscount(fixed));
    }
    Ok(())
}

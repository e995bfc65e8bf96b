use dooh_core::{FilmDuration, PricingVariant, ProductLine, ValidationError};
use std::fmt;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors produced while pricing a proposal.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// Neither catalog nor custom durations yield a usable film length.
    #[error("no usable film duration")]
    InvalidDuration,
    /// Authoritative period length or scheduling assumption is unusable.
    #[error("invalid period: {0}")]
    InvalidPeriod(String),
    /// CPM pricing selected without a CPM value.
    #[error("CPM pricing requires a CPM value")]
    MissingCpmValue,
    #[error("CPM value must be >= 0, got {0}")]
    InvalidCpmValue(Decimal),
    /// Active durations lack a positive price in one or more product lines
    /// of the selected variant. Every gap is listed.
    #[error("missing per-insertion price for {variant}: {}", join_gaps(.gaps))]
    MissingInsertionPrice {
        variant: PricingVariant,
        gaps: Vec<PriceGap>,
    },
    #[error("invalid discount: {0}")]
    InvalidDiscount(String),
    #[error("audience per insertion must be >= 0, got {0}")]
    InvalidAudience(Decimal),
    #[error("invalid insertion split: {0}")]
    InvalidSplit(String),
    /// Decimal range exceeded.
    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

/// Durations without a usable price in one product line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceGap {
    pub line: ProductLine,
    pub durations: Vec<FilmDuration>,
}

impl fmt::Display for PriceGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let durations: Vec<String> = self.durations.iter().map(ToString::to_string).collect();
        write!(f, "{} {}", self.line, durations.join("/"))
    }
}

fn join_gaps(gaps: &[PriceGap]) -> String {
    gaps.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ValidationError> for PricingError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::ZeroDuration => PricingError::InvalidDuration,
            ValidationError::DiscountPctOutOfRange(_) | ValidationError::NegativeDiscount(_) => {
                PricingError::InvalidDiscount(e.to_string())
            }
            ValidationError::SpanEndsBeforeStart { .. } | ValidationError::DateOutOfRange => {
                PricingError::InvalidPeriod(e.to_string())
            }
        }
    }
}

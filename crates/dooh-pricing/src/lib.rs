#![deny(warnings)]

//! Proposal pricing and impact calculation for DOOH campaigns.
//!
//! Every stage is a pure function of its inputs and uses `Decimal`
//! arithmetic, so the live preview, the stored proposal and the exported
//! sheets reproduce the same figures:
//! - Film duration resolution and period normalization
//! - Insertion volume and audience impact estimation
//! - Gross value under CPM or per-insertion price tables
//! - Layered per-duration and proposal-level discounts
//!
//! [`calculate_proposal_metrics`] composes the stages into a [`PricingResult`].

mod discount;
mod durations;
mod error;
mod impact;
mod metrics;
mod period;
mod strategy;
mod volume;

pub use discount::{
    apply_discounts, apply_proposal_discount, discount_line_item, DiscountedLine, NetValue,
};
pub use durations::resolve_durations;
pub use error::{PriceGap, PricingError};
pub use impact::{audience_per_insertion_from_venues, estimate_impacts};
pub use metrics::{calculate_proposal_metrics, DurationLine, PricingResult, VariantBreakdown};
pub use period::{normalize_period, NormalizedPeriod};
pub use strategy::{
    attribute_insertions, compute_gross, cpm_gross, GrossValue, LineGross, LineItem,
};
pub use volume::total_insertions;

use crate::{
    apply_discounts, compute_gross, estimate_impacts, normalize_period, resolve_durations,
    total_insertions, PricingError,
};
use dooh_core::{FilmDuration, PricingInput, PricingMode, ProductLine};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

/// One duration's row in a product line's breakdown.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DurationLine {
    pub duration: FilmDuration,
    pub insertions: Decimal,
    pub unit_price: Decimal,
    pub gross: Decimal,
    /// After the duration-level discount only.
    pub net: Decimal,
}

/// Per product line totals used by summary and export views.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariantBreakdown {
    pub line: ProductLine,
    pub gross: Decimal,
    pub discounted: Decimal,
    pub lines: Vec<DurationLine>,
}

/// Figures for a proposal. Values are unrounded; presentation rounds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PricingResult {
    pub effective_durations: Vec<FilmDuration>,
    pub total_insertions: Decimal,
    pub impacts: Decimal,
    pub gross_value: Decimal,
    /// Gross after duration-level discounts, before the proposal discount.
    pub discounted_gross: Decimal,
    pub net_value: Decimal,
    /// Empty under CPM pricing.
    pub breakdown: Vec<VariantBreakdown>,
}

/// Compute every figure of a proposal from a full input snapshot.
///
/// Stages run in order and the first failure is returned as is. The same
/// input always produces the same result.
pub fn calculate_proposal_metrics(input: &PricingInput) -> Result<PricingResult, PricingError> {
    let effective_durations = resolve_durations(&input.film_durations, input.custom_duration)?;
    let period = normalize_period(&input.period)?;
    let total_insertions = total_insertions(
        input.insertions_per_hour,
        input.hours_per_day,
        &period,
        input.screens_count,
    )?;
    let impacts = estimate_impacts(total_insertions, input.avg_audience_per_insertion)?;
    let gross = compute_gross(&input.pricing, impacts, &effective_durations, total_insertions)?;
    let per_duration = match &input.pricing {
        PricingMode::Insertion { discounts, .. } => Some(discounts),
        PricingMode::Cpm { .. } => None,
    };
    let net = apply_discounts(&gross, input.discount_pct, input.discount_fixed, per_duration)?;

    let breakdown = gross
        .lines
        .iter()
        .zip(&net.lines)
        .map(|(g, n)| VariantBreakdown {
            line: g.line,
            gross: g.gross,
            discounted: n.discounted,
            lines: g
                .items
                .iter()
                .zip(&n.item_nets)
                .map(|(item, net)| DurationLine {
                    duration: item.duration,
                    insertions: item.insertions,
                    unit_price: item.unit_price,
                    gross: item.gross,
                    net: *net,
                })
                .collect(),
        })
        .collect();

    debug!(
        durations = effective_durations.len(),
        %total_insertions,
        %impacts,
        gross = %gross.gross_value,
        net = %net.net_value,
        "proposal metrics"
    );
    Ok(PricingResult {
        effective_durations,
        total_insertions,
        impacts,
        gross_value: gross.gross_value,
        discounted_gross: net.discounted_gross,
        net_value: net.net_value,
        breakdown,
    })
}

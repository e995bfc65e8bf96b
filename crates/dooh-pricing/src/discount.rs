use crate::{GrossValue, PricingError};
use dooh_core::{
    validate_discount_fixed, validate_discount_pct, DurationDiscount, PerDurationDiscounts,
    ProductLine,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

/// A product line after duration-level discounts.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiscountedLine {
    pub line: ProductLine,
    /// Net of each line item, in the same order as `LineGross::items`.
    pub item_nets: Vec<Decimal>,
    pub discounted: Decimal,
}

/// Outcome of the discount cascade.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NetValue {
    pub lines: Vec<DiscountedLine>,
    /// Gross after duration-level discounts, before the proposal discount.
    pub discounted_gross: Decimal,
    pub net_value: Decimal,
}

/// `amount` minus `pct` percent, then minus `fixed`, never below zero.
fn deduct(amount: Decimal, pct: Decimal, fixed: Decimal) -> Result<Decimal, PricingError> {
    let kept = amount
        .checked_mul(Decimal::ONE_HUNDRED - pct)
        .ok_or(PricingError::Overflow("discount"))?
        / Decimal::ONE_HUNDRED;
    Ok((kept - fixed).max(Decimal::ZERO))
}

/// Net of a single line item under its optional duration-level discount.
pub fn discount_line_item(
    gross: Decimal,
    discount: Option<&DurationDiscount>,
) -> Result<Decimal, PricingError> {
    let Some(discount) = discount else {
        return Ok(gross);
    };
    discount.validate()?;
    deduct(
        gross,
        discount.pct.unwrap_or(Decimal::ZERO),
        discount.fixed.unwrap_or(Decimal::ZERO),
    )
}

/// Proposal-level percentage then fixed discount.
pub fn apply_proposal_discount(
    amount: Decimal,
    discount_pct: Decimal,
    discount_fixed: Decimal,
) -> Result<Decimal, PricingError> {
    validate_discount_pct(discount_pct)?;
    validate_discount_fixed(discount_fixed)?;
    deduct(amount, discount_pct, discount_fixed)
}

/// Apply duration-level discounts (when given) to every line item, then the
/// proposal-level discount to their sum. The result lies in `[0, gross]`.
pub fn apply_discounts(
    gross: &GrossValue,
    discount_pct: Decimal,
    discount_fixed: Decimal,
    per_duration: Option<&PerDurationDiscounts>,
) -> Result<NetValue, PricingError> {
    let mut lines = Vec::with_capacity(gross.lines.len());
    let discounted_gross = match per_duration {
        Some(discounts) => {
            // entries for durations or lines not in play are still rejected
            discounts.validate()?;
            let mut total = Decimal::ZERO;
            for line_gross in &gross.lines {
                let mut item_nets = Vec::with_capacity(line_gross.items.len());
                let mut discounted = Decimal::ZERO;
                for item in &line_gross.items {
                    let net = discount_line_item(
                        item.gross,
                        discounts.get(line_gross.line, item.duration),
                    )?;
                    discounted = discounted
                        .checked_add(net)
                        .ok_or(PricingError::Overflow("discounted line"))?;
                    item_nets.push(net);
                }
                total = total
                    .checked_add(discounted)
                    .ok_or(PricingError::Overflow("discounted gross"))?;
                lines.push(DiscountedLine {
                    line: line_gross.line,
                    item_nets,
                    discounted,
                });
            }
            total
        }
        None => {
            for line_gross in &gross.lines {
                lines.push(DiscountedLine {
                    line: line_gross.line,
                    item_nets: line_gross.items.iter().map(|i| i.gross).collect(),
                    discounted: line_gross.gross,
                });
            }
            gross.gross_value
        }
    };
    let net_value = apply_proposal_discount(discounted_gross, discount_pct, discount_fixed)?
        .min(gross.gross_value);
    debug!(gross = %gross.gross_value, %discounted_gross, net = %net_value, "discounts applied");
    Ok(NetValue {
        lines,
        discounted_gross,
        net_value,
    })
}

use crate::{PriceGap, PricingError};
use dooh_core::{
    FilmDuration, InsertionPrices, InsertionSplit, PricingMode, PricingVariant, ProductLine,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

const IMPACTS_PER_CPM: u32 = 1000;

/// One duration's share of a product line's gross value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineItem {
    pub duration: FilmDuration,
    pub insertions: Decimal,
    pub unit_price: Decimal,
    pub gross: Decimal,
}

/// Gross value of one product line, itemised by duration.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineGross {
    pub line: ProductLine,
    pub items: Vec<LineItem>,
    pub gross: Decimal,
}

/// Gross value of a proposal.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GrossValue {
    /// Sum of all product lines (or the CPM figure).
    pub gross_value: Decimal,
    /// Per product line breakdown; empty for CPM pricing.
    pub lines: Vec<LineGross>,
}

/// Gross value under the proposal's pricing policy.
pub fn compute_gross(
    mode: &PricingMode,
    impacts: Decimal,
    durations: &[FilmDuration],
    total_insertions: Decimal,
) -> Result<GrossValue, PricingError> {
    match mode {
        PricingMode::Cpm { cpm_value } => Ok(GrossValue {
            gross_value: cpm_gross(impacts, *cpm_value)?,
            lines: Vec::new(),
        }),
        PricingMode::Insertion {
            variant,
            prices,
            split,
            ..
        } => insertion_gross(*variant, prices, split, durations, total_insertions),
    }
}

/// (impacts / 1000) × CPM.
pub fn cpm_gross(impacts: Decimal, cpm_value: Option<Decimal>) -> Result<Decimal, PricingError> {
    let cpm = cpm_value.ok_or(PricingError::MissingCpmValue)?;
    if cpm < Decimal::ZERO {
        return Err(PricingError::InvalidCpmValue(cpm));
    }
    let gross = (impacts / Decimal::from(IMPACTS_PER_CPM))
        .checked_mul(cpm)
        .ok_or(PricingError::Overflow("CPM gross"))?;
    debug!(%impacts, %cpm, %gross, "cpm gross");
    Ok(gross)
}

/// Split `total_insertions` across the active durations.
pub fn attribute_insertions(
    split: &InsertionSplit,
    durations: &[FilmDuration],
    total_insertions: Decimal,
) -> Result<Vec<(FilmDuration, Decimal)>, PricingError> {
    if durations.is_empty() {
        return Err(PricingError::InvalidDuration);
    }
    match split {
        InsertionSplit::Even => {
            let share = total_insertions / Decimal::from(durations.len());
            Ok(durations.iter().map(|d| (*d, share)).collect())
        }
        InsertionSplit::Weighted(weights) => {
            let mut active = Vec::with_capacity(durations.len());
            let mut sum = Decimal::ZERO;
            for d in durations {
                let w = weights.get(d).copied().unwrap_or(Decimal::ZERO);
                if w < Decimal::ZERO {
                    return Err(PricingError::InvalidSplit(format!(
                        "negative weight {w} for {d}"
                    )));
                }
                sum = sum
                    .checked_add(w)
                    .ok_or(PricingError::Overflow("split weights"))?;
                active.push((*d, w));
            }
            if sum.is_zero() {
                return Err(PricingError::InvalidSplit(
                    "no positive weight for any active duration".to_string(),
                ));
            }
            active
                .into_iter()
                .map(|(d, w)| {
                    total_insertions
                        .checked_mul(w)
                        .map(|v| (d, v / sum))
                        .ok_or(PricingError::Overflow("insertion share"))
                })
                .collect()
        }
    }
}

fn insertion_gross(
    variant: PricingVariant,
    prices: &InsertionPrices,
    split: &InsertionSplit,
    durations: &[FilmDuration],
    total_insertions: Decimal,
) -> Result<GrossValue, PricingError> {
    let product_lines = variant.product_lines();
    // every table is checked before anything is priced
    let gaps: Vec<PriceGap> = product_lines
        .iter()
        .filter_map(|line| {
            let missing = prices.table(*line).missing(durations);
            (!missing.is_empty()).then(|| PriceGap {
                line: *line,
                durations: missing,
            })
        })
        .collect();
    if !gaps.is_empty() {
        warn!(%variant, ?gaps, "per-insertion price table incomplete");
        return Err(PricingError::MissingInsertionPrice { variant, gaps });
    }
    let shares = attribute_insertions(split, durations, total_insertions)?;

    let mut lines = Vec::with_capacity(product_lines.len());
    let mut gross_value = Decimal::ZERO;
    for line in product_lines {
        let table = prices.table(*line);
        let mut items = Vec::with_capacity(shares.len());
        let mut line_gross = Decimal::ZERO;
        for (duration, insertions) in &shares {
            let unit_price = table
                .price_for(*duration)
                .ok_or_else(|| PricingError::MissingInsertionPrice {
                    variant,
                    gaps: vec![PriceGap {
                        line: *line,
                        durations: vec![*duration],
                    }],
                })?;
            let gross = insertions
                .checked_mul(unit_price)
                .ok_or(PricingError::Overflow("line item gross"))?;
            line_gross = line_gross
                .checked_add(gross)
                .ok_or(PricingError::Overflow("line gross"))?;
            items.push(LineItem {
                duration: *duration,
                insertions: *insertions,
                unit_price,
                gross,
            });
        }
        debug!(%line, gross = %line_gross, "insertion gross");
        gross_value = gross_value
            .checked_add(line_gross)
            .ok_or(PricingError::Overflow("gross value"))?;
        lines.push(LineGross {
            line: *line,
            items,
            gross: line_gross,
        });
    }
    Ok(GrossValue { gross_value, lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dooh_core::{PerDurationDiscounts, PriceTable};
    use proptest::prelude::*;

    fn table(entries: &[(u32, Decimal)]) -> PriceTable {
        entries.iter().map(|(d, p)| (FilmDuration(*d), *p)).collect()
    }

    fn insertion_mode(variant: PricingVariant, prices: InsertionPrices) -> PricingMode {
        PricingMode::Insertion {
            variant,
            prices,
            discounts: PerDurationDiscounts::default(),
            split: InsertionSplit::Even,
        }
    }

    fn durations(secs: &[u32]) -> Vec<FilmDuration> {
        secs.iter().copied().map(FilmDuration).collect()
    }

    #[test]
    fn cpm_gross_basic() {
        let g = cpm_gross(Decimal::from(1_800_000), Some(Decimal::from(25))).unwrap();
        assert_eq!(g, Decimal::from(45_000));
    }

    #[test]
    fn cpm_requires_value() {
        let mode = PricingMode::Cpm { cpm_value: None };
        assert_eq!(
            compute_gross(&mode, Decimal::ONE, &durations(&[15]), Decimal::ONE),
            Err(PricingError::MissingCpmValue)
        );
        assert!(matches!(
            cpm_gross(Decimal::ONE, Some(Decimal::new(-1, 0))),
            Err(PricingError::InvalidCpmValue(_))
        ));
    }

    #[test]
    fn avulsa_even_split() {
        let prices = InsertionPrices {
            avulsa: table(&[(15, Decimal::new(39, 2)), (30, Decimal::new(55, 2))]),
            especial: PriceTable::default(),
        };
        let mode = insertion_mode(PricingVariant::Avulsa, prices);
        let g = compute_gross(&mode, Decimal::ZERO, &durations(&[15, 30]), Decimal::from(18_000))
            .unwrap();
        assert_eq!(g.gross_value, Decimal::from(8_460));
        assert_eq!(g.lines.len(), 1);
        assert_eq!(g.lines[0].items[0].insertions, Decimal::from(9_000));
        assert_eq!(g.lines[0].items[1].gross, Decimal::from(4_950));
    }

    #[test]
    fn missing_price_is_never_zero() {
        let prices = InsertionPrices {
            avulsa: table(&[(15, Decimal::new(39, 2)), (30, Decimal::ZERO)]),
            especial: PriceTable::default(),
        };
        let mode = insertion_mode(PricingVariant::Avulsa, prices);
        let err = compute_gross(&mode, Decimal::ZERO, &durations(&[15, 30, 45]), Decimal::ONE)
            .unwrap_err();
        assert_eq!(
            err,
            PricingError::MissingInsertionPrice {
                variant: PricingVariant::Avulsa,
                gaps: vec![PriceGap {
                    line: ProductLine::Avulsa,
                    durations: durations(&[30, 45]),
                }],
            }
        );
    }

    #[test]
    fn ambos_reports_the_incomplete_table() {
        let prices = InsertionPrices {
            avulsa: table(&[(15, Decimal::new(39, 2)), (30, Decimal::new(55, 2))]),
            especial: table(&[(15, Decimal::new(45, 2))]),
        };
        let mode = insertion_mode(PricingVariant::Ambos, prices);
        let err = compute_gross(&mode, Decimal::ZERO, &durations(&[15, 30]), Decimal::ONE)
            .unwrap_err();
        assert_eq!(
            err,
            PricingError::MissingInsertionPrice {
                variant: PricingVariant::Ambos,
                gaps: vec![PriceGap {
                    line: ProductLine::Especial,
                    durations: durations(&[30]),
                }],
            }
        );
    }

    #[test]
    fn ambos_reports_gaps_in_both_tables_at_once() {
        let prices = InsertionPrices {
            avulsa: table(&[(15, Decimal::new(39, 2))]),
            especial: table(&[(45, Decimal::new(45, 2))]),
        };
        let mode = insertion_mode(PricingVariant::Ambos, prices);
        let err = compute_gross(&mode, Decimal::ZERO, &durations(&[15, 30]), Decimal::ONE)
            .unwrap_err();
        assert_eq!(
            err,
            PricingError::MissingInsertionPrice {
                variant: PricingVariant::Ambos,
                gaps: vec![
                    PriceGap {
                        line: ProductLine::Avulsa,
                        durations: durations(&[30]),
                    },
                    PriceGap {
                        line: ProductLine::Especial,
                        durations: durations(&[15, 30]),
                    },
                ],
            }
        );
    }

    #[test]
    fn ambos_sums_both_lines() {
        let prices = InsertionPrices {
            avulsa: table(&[(15, Decimal::new(39, 2)), (30, Decimal::new(55, 2))]),
            especial: table(&[(15, Decimal::new(50, 2)), (30, Decimal::new(70, 2))]),
        };
        let mode = insertion_mode(PricingVariant::Ambos, prices);
        let g = compute_gross(&mode, Decimal::ZERO, &durations(&[15, 30]), Decimal::from(18_000))
            .unwrap();
        assert_eq!(g.lines[0].line, ProductLine::Avulsa);
        assert_eq!(g.lines[0].gross, Decimal::from(8_460));
        assert_eq!(g.lines[1].line, ProductLine::Especial);
        assert_eq!(g.lines[1].gross, Decimal::from(10_800));
        assert_eq!(g.gross_value, Decimal::from(19_260));
    }

    #[test]
    fn weighted_split_ignores_inactive_durations() {
        let weights = [
            (FilmDuration(15), Decimal::from(3)),
            (FilmDuration(30), Decimal::from(1)),
            (FilmDuration(60), Decimal::from(100)),
        ]
        .into_iter()
        .collect();
        let shares = attribute_insertions(
            &InsertionSplit::Weighted(weights),
            &durations(&[15, 30]),
            Decimal::from(1_000),
        )
        .unwrap();
        assert_eq!(
            shares,
            vec![
                (FilmDuration(15), Decimal::from(750)),
                (FilmDuration(30), Decimal::from(250)),
            ]
        );
    }

    #[test]
    fn weighted_split_rejects_bad_weights() {
        let zero = InsertionSplit::Weighted(Default::default());
        assert!(matches!(
            attribute_insertions(&zero, &durations(&[15]), Decimal::ONE),
            Err(PricingError::InvalidSplit(_))
        ));
        let negative = InsertionSplit::Weighted(
            [(FilmDuration(15), Decimal::new(-1, 0))]
                .into_iter()
                .collect(),
        );
        assert!(matches!(
            attribute_insertions(&negative, &durations(&[15]), Decimal::ONE),
            Err(PricingError::InvalidSplit(_))
        ));
    }

    proptest! {
        #[test]
        fn even_split_preserves_total(total in 0i64..10_000_000, n in 1usize..6) {
            let ds: Vec<FilmDuration> = (1..=n as u32).map(|i| FilmDuration(i * 15)).collect();
            let shares = attribute_insertions(&InsertionSplit::Even, &ds, Decimal::from(total)).unwrap();
            let sum: Decimal = shares.iter().map(|(_, s)| *s).sum();
            let diff = (sum - Decimal::from(total)).abs();
            prop_assert!(diff < Decimal::new(1, 15));
        }

        #[test]
        fn cpm_gross_monotonic_in_impacts(impacts in 0i64..1_000_000_000, cents in 0i64..100_000) {
            let cpm = Some(Decimal::new(cents, 2));
            let lo = cpm_gross(Decimal::from(impacts), cpm).unwrap();
            let hi = cpm_gross(Decimal::from(impacts + 1), cpm).unwrap();
            prop_assert!(hi >= lo);
        }
    }
}

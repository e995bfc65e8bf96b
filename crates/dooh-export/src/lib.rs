#![deny(warnings)]

//! Line-item sheets for proposal exports.
//!
//! A sheet carries the raw engine figures together with the formulas a
//! spreadsheet uses to derive gross and net. [`LineItemSheet::evaluate`]
//! recomputes those formulas in floating point the way a spreadsheet would,
//! and [`LineItemSheet::verify`] checks the result against the engine totals.

use dooh_core::{PricingInput, PricingMode, ProductLine};
use dooh_pricing::PricingResult;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Relative tolerance accepted between sheet formulas and engine totals.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Errors produced while building or checking an export sheet.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CPM sheet requested for an input without a CPM value.
    #[error("CPM value missing from proposal input")]
    MissingCpmValue,
    /// A figure cannot be represented as a spreadsheet number.
    #[error("value {0} cannot be represented as a spreadsheet number")]
    NonFinite(Decimal),
    /// Sheet formulas disagree with the engine.
    #[error("{field}: sheet evaluates to {evaluated}, engine reported {expected}")]
    Mismatch {
        field: &'static str,
        expected: f64,
        evaluated: f64,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One duration row of a product line section.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SheetRow {
    pub duration_secs: u32,
    pub insertions: Decimal,
    pub unit_price: Decimal,
    pub discount_pct: Decimal,
    pub discount_fixed: Decimal,
}

/// Rows priced with one product line.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SheetSection {
    pub line: ProductLine,
    pub rows: Vec<SheetRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SheetBody {
    Cpm { impacts: Decimal, cpm_value: Decimal },
    Insertion { sections: Vec<SheetSection> },
}

/// Export view of a priced proposal.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineItemSheet {
    pub body: SheetBody,
    pub discount_pct: Decimal,
    pub discount_fixed: Decimal,
    /// Engine totals the formulas must reproduce.
    pub reported_gross: Decimal,
    pub reported_net: Decimal,
}

/// Totals as a spreadsheet computes them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EvaluatedTotals {
    pub gross: f64,
    pub discounted: f64,
    pub net: f64,
}

fn num(value: Decimal) -> Result<f64, ExportError> {
    value
        .to_f64()
        .filter(|v| v.is_finite())
        .ok_or(ExportError::NonFinite(value))
}

// MAX(0, amount * (100 - pct) / 100 - fixed)
fn deduct(amount: f64, pct: f64, fixed: f64) -> f64 {
    (amount * (100.0 - pct) / 100.0 - fixed).max(0.0)
}

fn close_enough(expected: f64, evaluated: f64, tolerance: f64) -> bool {
    (expected - evaluated).abs() <= tolerance * expected.abs().max(1.0)
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

impl LineItemSheet {
    /// Build the sheet for `result`, computed from `input`.
    pub fn build(input: &PricingInput, result: &PricingResult) -> Result<Self, ExportError> {
        let body = match &input.pricing {
            PricingMode::Cpm { cpm_value } => SheetBody::Cpm {
                impacts: result.impacts,
                cpm_value: cpm_value.ok_or(ExportError::MissingCpmValue)?,
            },
            PricingMode::Insertion { discounts, .. } => SheetBody::Insertion {
                sections: result
                    .breakdown
                    .iter()
                    .map(|b| SheetSection {
                        line: b.line,
                        rows: b
                            .lines
                            .iter()
                            .map(|l| {
                                let discount = discounts.get(b.line, l.duration);
                                SheetRow {
                                    duration_secs: l.duration.secs(),
                                    insertions: l.insertions,
                                    unit_price: l.unit_price,
                                    discount_pct: discount
                                        .and_then(|d| d.pct)
                                        .unwrap_or(Decimal::ZERO),
                                    discount_fixed: discount
                                        .and_then(|d| d.fixed)
                                        .unwrap_or(Decimal::ZERO),
                                }
                            })
                            .collect(),
                    })
                    .collect(),
            },
        };
        Ok(Self {
            body,
            discount_pct: input.discount_pct,
            discount_fixed: input.discount_fixed,
            reported_gross: result.gross_value,
            reported_net: result.net_value,
        })
    }

    /// Evaluate the sheet formulas in floating point.
    pub fn evaluate(&self) -> Result<EvaluatedTotals, ExportError> {
        let (gross, discounted) = match &self.body {
            SheetBody::Cpm { impacts, cpm_value } => {
                let gross = num(*impacts)? / 1000.0 * num(*cpm_value)?;
                (gross, gross)
            }
            SheetBody::Insertion { sections } => {
                let mut gross = 0.0;
                let mut discounted = 0.0;
                for row in sections.iter().flat_map(|s| &s.rows) {
                    let row_gross = num(row.insertions)? * num(row.unit_price)?;
                    gross += row_gross;
                    discounted +=
                        deduct(row_gross, num(row.discount_pct)?, num(row.discount_fixed)?);
                }
                (gross, discounted)
            }
        };
        let net = deduct(
            discounted,
            num(self.discount_pct)?,
            num(self.discount_fixed)?,
        )
        .min(gross);
        Ok(EvaluatedTotals {
            gross,
            discounted,
            net,
        })
    }

    /// Evaluate and compare against the engine totals.
    pub fn verify(&self, tolerance: f64) -> Result<EvaluatedTotals, ExportError> {
        let totals = self.evaluate()?;
        for (field, expected, evaluated) in [
            ("gross", num(self.reported_gross)?, totals.gross),
            ("net", num(self.reported_net)?, totals.net),
        ] {
            if !close_enough(expected, evaluated, tolerance) {
                warn!(field, expected, evaluated, "export sheet disagrees with engine");
                return Err(ExportError::Mismatch {
                    field,
                    expected,
                    evaluated,
                });
            }
        }
        debug!(gross = totals.gross, net = totals.net, "export sheet verified");
        Ok(totals)
    }

    /// Render the sheet as CSV, keeping formulas in the derived cells.
    pub fn to_csv(&self) -> String {
        let mut rows: Vec<Vec<String>> = Vec::new();
        let (gross_cell, discounted_cell) = match &self.body {
            SheetBody::Cpm { impacts, cpm_value } => {
                rows.push(vec!["Metric".into(), "Value".into()]);
                rows.push(vec!["Impacts".into(), impacts.to_string()]);
                rows.push(vec!["CPM".into(), cpm_value.to_string()]);
                rows.push(vec!["Gross".into(), "=B2/1000*B3".into()]);
                ("B4".to_string(), "B4".to_string())
            }
            SheetBody::Insertion { sections } => {
                rows.push(
                    [
                        "Line",
                        "Duration (s)",
                        "Insertions",
                        "Unit price",
                        "Gross",
                        "Discount %",
                        "Discount fixed",
                        "Net",
                    ]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                );
                for section in sections {
                    for row in &section.rows {
                        let r = rows.len() + 1;
                        rows.push(vec![
                            section.line.to_string(),
                            row.duration_secs.to_string(),
                            row.insertions.to_string(),
                            row.unit_price.to_string(),
                            format!("=C{r}*D{r}"),
                            row.discount_pct.to_string(),
                            row.discount_fixed.to_string(),
                            format!("=MAX(0,E{r}*(100-F{r})/100-G{r})"),
                        ]);
                    }
                }
                let last = rows.len();
                let r = last + 1;
                rows.push(vec!["Gross total".into(), format!("=SUM(E2:E{last})")]);
                rows.push(vec!["Discounted".into(), format!("=SUM(H2:H{last})")]);
                (format!("B{r}"), format!("B{}", r + 1))
            }
        };
        let pct_row = rows.len() + 1;
        rows.push(vec!["Discount %".into(), self.discount_pct.to_string()]);
        rows.push(vec!["Discount fixed".into(), self.discount_fixed.to_string()]);
        rows.push(vec![
            "Net".into(),
            format!(
                "=MIN({gross_cell},MAX(0,{discounted_cell}*(100-B{pct_row})/100-B{}))",
                pct_row + 1
            ),
        ]);

        let mut out = String::new();
        for row in rows {
            let line: Vec<String> = row.iter().map(|c| csv_field(c)).collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

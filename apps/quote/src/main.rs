#![deny(warnings)]

//! Headless CLI that prices a DOOH proposal from a YAML or JSON file.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use dooh_core::{CampaignSpan, PeriodUnit, PricingDefaults, PricingInput};
use dooh_export::{LineItemSheet, DEFAULT_TOLERANCE};
use dooh_pricing::{calculate_proposal_metrics, PricingResult};
use serde_yaml::Value;
use std::fmt::Write as _;
use tracing::{info, Subscriber};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Summary,
    Json,
    Csv,
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    input: Option<String>,
    defaults: Option<String>,
    format: Option<String>,
    start: Option<String>,
    end: Option<String>,
    unit: Option<String>,
    version: bool,
}

fn parse_args<I: Iterator<Item = String>>(mut it: I) -> Args {
    let mut args = Args::default();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--input" => args.input = it.next(),
            "--defaults" => args.defaults = it.next(),
            "--format" => args.format = it.next(),
            "--start" => args.start = it.next(),
            "--end" => args.end = it.next(),
            "--unit" => args.unit = it.next(),
            "--version" => args.version = true,
            _ => {}
        }
    }
    args
}

fn output_format(raw: Option<&str>) -> Result<OutputFormat> {
    match raw.unwrap_or("summary") {
        "summary" => Ok(OutputFormat::Summary),
        "json" => Ok(OutputFormat::Json),
        "csv" => Ok(OutputFormat::Csv),
        other => bail!("unknown format {other:?}, expected summary|json|csv"),
    }
}

fn load_defaults(path: Option<&str>) -> Result<PricingDefaults> {
    let Some(path) = path else {
        return Ok(PricingDefaults::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing defaults {path}"))
}

/// Fill scheduling assumptions the proposal file leaves out.
fn fill_defaults(doc: &mut Value, defaults: &PricingDefaults) -> Result<()> {
    let Some(root) = doc.as_mapping_mut() else {
        bail!("proposal input must be a mapping");
    };
    if !root.contains_key("hours_per_day") {
        root.insert(
            "hours_per_day".into(),
            serde_yaml::to_value(defaults.hours_per_day)?,
        );
    }
    if let Some(period) = root.get_mut("period").and_then(Value::as_mapping_mut) {
        let is_months = period.get("unit").and_then(Value::as_str) == Some("months");
        if is_months && !period.contains_key("business_days_per_month") {
            period.insert(
                "business_days_per_month".into(),
                serde_yaml::to_value(defaults.business_days_per_month)?,
            );
        }
    }
    Ok(())
}

/// Replace the proposal period with one derived from calendar dates.
fn apply_span(
    doc: &mut Value,
    start: &str,
    end: &str,
    unit: Option<&str>,
    defaults: &PricingDefaults,
) -> Result<()> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").context("parsing --start")?;
    let end = NaiveDate::parse_from_str(end, "%Y-%m-%d").context("parsing --end")?;
    let span = CampaignSpan::new(start, end)?;
    let unit = match unit.unwrap_or("days") {
        "days" => PeriodUnit::Days,
        "months" => PeriodUnit::Months,
        other => bail!("unknown period unit {other:?}, expected days|months"),
    };
    let period = match unit {
        PeriodUnit::Days => span.to_days()?,
        PeriodUnit::Months => span.to_months(defaults.business_days_per_month)?,
    };
    let Some(root) = doc.as_mapping_mut() else {
        bail!("proposal input must be a mapping");
    };
    root.insert("period".into(), serde_yaml::to_value(period)?);
    Ok(())
}

fn render_summary(result: &PricingResult) -> String {
    let durations: Vec<String> = result
        .effective_durations
        .iter()
        .map(ToString::to_string)
        .collect();
    let mut out = String::new();
    let _ = writeln!(out, "Durations: {}", durations.join(", "));
    let _ = writeln!(out, "Insertions: {}", result.total_insertions.round());
    let _ = writeln!(out, "Impacts: {}", result.impacts.round());
    for variant in &result.breakdown {
        let _ = writeln!(
            out,
            "  [{}] gross {:.2} | discounted {:.2}",
            variant.line,
            variant.gross.round_dp(2),
            variant.discounted.round_dp(2)
        );
        for l in &variant.lines {
            let _ = writeln!(
                out,
                "    {:>4} x {} @ {} = {:.2} (net {:.2})",
                l.duration.to_string(),
                l.insertions.round(),
                l.unit_price,
                l.gross.round_dp(2),
                l.net.round_dp(2)
            );
        }
    }
    let _ = writeln!(out, "Gross: {:.2}", result.gross_value.round_dp(2));
    let _ = writeln!(out, "Net: {:.2}", result.net_value.round_dp(2));
    out
}

fn run(args: &Args) -> Result<String> {
    let format = output_format(args.format.as_deref())?;
    let Some(path) = args.input.as_deref() else {
        bail!("missing --input <proposal.yaml|json>");
    };
    let defaults = load_defaults(args.defaults.as_deref())?;
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let mut doc: Value =
        serde_yaml::from_str(&text).with_context(|| format!("parsing proposal {path}"))?;
    match (args.start.as_deref(), args.end.as_deref()) {
        (Some(start), Some(end)) => {
            apply_span(&mut doc, start, end, args.unit.as_deref(), &defaults)?
        }
        (None, None) => {}
        _ => bail!("--start and --end must be given together"),
    }
    fill_defaults(&mut doc, &defaults)?;
    let input: PricingInput = serde_yaml::from_value(doc).context("invalid proposal input")?;

    let result = calculate_proposal_metrics(&input)?;
    let sheet = LineItemSheet::build(&input, &result)?;
    sheet.verify(DEFAULT_TOLERANCE)?;
    info!(gross = %result.gross_value, net = %result.net_value, "proposal priced");

    Ok(match format {
        OutputFormat::Summary => render_summary(&result),
        OutputFormat::Json => serde_json::to_string_pretty(&result)?,
        OutputFormat::Csv => sheet.to_csv(),
    })
}

/// Stderr logger honouring `filter` as the only level gate.
fn log_subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    log_subscriber(filter).init();

    let args = parse_args(std::env::args().skip(1));
    if args.version {
        println!("quote {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_SHA"));
        return Ok(());
    }
    info!(input = ?args.input, format = ?args.format, "starting quote");
    let out = run(&args)?;
    print!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn args(list: &[&str]) -> Args {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    const PROPOSAL: &str = "
screens_count: 10
film_durations: [15, 30]
insertions_per_hour: 6
period: { unit: months, months: 1 }
avg_audience_per_insertion: 100
pricing:
  mode: insertion
  variant: avulsa
  prices:
    avulsa: { 15: 0.39, 30: 0.55 }
";

    #[test]
    fn parses_flags() {
        let a = args(&["--input", "p.yaml", "--format", "csv", "--version"]);
        assert_eq!(a.input.as_deref(), Some("p.yaml"));
        assert_eq!(output_format(a.format.as_deref()).unwrap(), OutputFormat::Csv);
        assert!(a.version);
        assert!(output_format(Some("pdf")).is_err());
    }

    #[test]
    fn defaults_fill_missing_fields_only() {
        let mut doc: Value = serde_yaml::from_str(PROPOSAL).unwrap();
        let defaults = PricingDefaults {
            hours_per_day: 12,
            business_days_per_month: 20,
        };
        fill_defaults(&mut doc, &defaults).unwrap();
        let input: PricingInput = serde_yaml::from_value(doc).unwrap();
        assert_eq!(input.hours_per_day, 12);
        assert_eq!(
            input.period,
            dooh_core::Period::Months {
                months: Decimal::ONE,
                business_days_per_month: 20
            }
        );

        let with_hours = format!("{PROPOSAL}hours_per_day: 8\n");
        let mut doc: Value = serde_yaml::from_str(&with_hours).unwrap();
        fill_defaults(&mut doc, &defaults).unwrap();
        let input: PricingInput = serde_yaml::from_value(doc).unwrap();
        assert_eq!(input.hours_per_day, 8);
    }

    #[test]
    fn span_overrides_period() {
        let mut doc: Value = serde_yaml::from_str(PROPOSAL).unwrap();
        let defaults = PricingDefaults::default();
        apply_span(&mut doc, "2024-03-01", "2024-03-30", None, &defaults).unwrap();
        fill_defaults(&mut doc, &defaults).unwrap();
        let input: PricingInput = serde_yaml::from_value(doc).unwrap();
        assert_eq!(input.period, dooh_core::Period::Days { days: 30 });
        let result = calculate_proposal_metrics(&input).unwrap();
        assert_eq!(result.total_insertions, Decimal::from(18_000));
        assert_eq!(result.gross_value, Decimal::from(8_460));
    }

    #[test]
    fn span_rejects_malformed_or_reversed_dates() {
        let defaults = PricingDefaults::default();
        let mut doc: Value = serde_yaml::from_str(PROPOSAL).unwrap();
        let err = apply_span(&mut doc, "2024-13-01", "2024-12-31", None, &defaults).unwrap_err();
        assert!(err.to_string().contains("--start"));
        assert!(apply_span(&mut doc, "2024-03-31", "2024-03-01", None, &defaults).is_err());
        assert!(apply_span(&mut doc, "2024-03-01", "2024-03-31", Some("weeks"), &defaults).is_err());
    }

    #[test]
    fn log_filter_controls_engine_debug() {
        let debug = log_subscriber(EnvFilter::new("debug"));
        tracing::subscriber::with_default(debug, || {
            assert!(tracing::enabled!(tracing::Level::DEBUG));
        });
        let info = log_subscriber(EnvFilter::new("info"));
        tracing::subscriber::with_default(info, || {
            assert!(!tracing::enabled!(tracing::Level::DEBUG));
            assert!(tracing::enabled!(tracing::Level::INFO));
        });
    }

    #[test]
    fn bundled_proposals_price_and_verify() {
        for text in [
            include_str!("../proposals/ambos.yaml"),
            include_str!("../proposals/cpm.json"),
        ] {
            let mut doc: Value = serde_yaml::from_str(text).unwrap();
            fill_defaults(&mut doc, &PricingDefaults::default()).unwrap();
            let input: PricingInput = serde_yaml::from_value(doc).unwrap();
            let result = calculate_proposal_metrics(&input).unwrap();
            let sheet = LineItemSheet::build(&input, &result).unwrap();
            sheet.verify(DEFAULT_TOLERANCE).unwrap();
        }
    }

    #[test]
    fn summary_lists_line_items() {
        let mut doc: Value = serde_yaml::from_str(PROPOSAL).unwrap();
        fill_defaults(&mut doc, &PricingDefaults::default()).unwrap();
        let input: PricingInput = serde_yaml::from_value(doc).unwrap();
        let result = calculate_proposal_metrics(&input).unwrap();
        let text = render_summary(&result);
        assert!(text.contains("Durations: 15s, 30s"));
        assert!(text.contains("Insertions: 13200"));
        assert!(text.contains("[avulsa]"));
        assert!(text.contains("Gross: 6204.00"));
    }
}

//! Metric processing: canonical renaming, count coercion, conversion rate and
//! per (country, week) shares.
//!
//! Shares are computed in two phases. The first pass builds an index of group
//! totals keyed by (country, week); the second pass looks each row's totals up.
//! Row order is never changed.

use std::collections::HashMap;

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::TrackerError;
use crate::resolver::{CanonicalField, ColumnMapping};
use crate::schema::{canonical, derived};

const WHITESPACE: &str = " \t\r\n";

/// Full pipeline from a raw table with resolved headers to the enriched table.
pub fn process(raw: &DataFrame, mapping: &ColumnMapping) -> Result<DataFrame, TrackerError> {
    let table = canonicalize(raw, mapping)?;
    enrich(&table)
}

/// Select the mapped source columns under their canonical names.
///
/// Label columns become non-null trimmed strings (missing labels are empty
/// strings, so every row still lands in a group). Count columns are parsed to
/// Float64, with unparsable cells left null for [`enrich`] to zero.
pub fn canonicalize(raw: &DataFrame, mapping: &ColumnMapping) -> Result<DataFrame, TrackerError> {
    let missing = mapping.missing_required();
    if !missing.is_empty() {
        return Err(TrackerError::Schema { missing });
    }
    let source = |field: CanonicalField| mapping.get(field).unwrap_or(field.name());

    let mut exprs = Vec::with_capacity(CanonicalField::ALL.len());
    for name in canonical::LABELS {
        let field = CanonicalField::from_name(name)?;
        exprs.push(
            col(source(field))
                .cast(DataType::String)
                .str()
                .strip_chars(lit(WHITESPACE))
                .fill_null(lit(""))
                .alias(name),
        );
    }
    for name in canonical::COUNTS {
        let field = CanonicalField::from_name(name)?;
        exprs.push(
            col(source(field))
                .cast(DataType::String)
                .str()
                .strip_chars(lit(WHITESPACE))
                .cast(DataType::Float64)
                .alias(name),
        );
    }
    if let Some(header) = mapping.get(CanonicalField::PaymentOption) {
        exprs.push(
            col(header)
                .cast(DataType::String)
                .str()
                .strip_chars(lit(WHITESPACE))
                .alias(canonical::PAYMENT_OPTION),
        );
    }

    let df = raw.clone().lazy().select(exprs).collect()?;
    Ok(df)
}

#[derive(Debug, Default, Clone, Copy)]
struct GroupTotals {
    press_buy: f64,
    converted: f64,
}

/// Coerce counts and append `conversion_rate`, `press_buy_share` and
/// `converted_share` to a canonical table.
pub fn enrich(table: &DataFrame) -> Result<DataFrame, TrackerError> {
    let n = table.height();
    let countries = table.column(canonical::COUNTRY)?.str()?;
    let weeks = table.column(canonical::WEEK)?.str()?;
    let raw_press_buy = table.column(canonical::PRESS_BUY)?.f64()?;
    let raw_converted = table.column(canonical::CONVERTED)?.f64()?;

    let press_buy: Vec<f64> = raw_press_buy.into_iter().map(coerce_count).collect();
    let converted: Vec<f64> = raw_converted.into_iter().map(coerce_count).collect();
    let zeroed = raw_press_buy
        .into_iter()
        .chain(raw_converted.into_iter())
        .filter(|v| !matches!(v, Some(x) if x.is_finite() && *x >= 0.0))
        .count();

    // Phase 1: group totals index
    let mut totals: HashMap<(&str, &str), GroupTotals> = HashMap::new();
    for i in 0..n {
        let key = (countries.get(i).unwrap_or(""), weeks.get(i).unwrap_or(""));
        let group = totals.entry(key).or_default();
        group.press_buy += press_buy[i];
        group.converted += converted[i];
    }

    // Phase 2: per-row lookup
    let mut rates = Vec::with_capacity(n);
    let mut press_buy_shares = Vec::with_capacity(n);
    let mut converted_shares = Vec::with_capacity(n);
    for i in 0..n {
        let key = (countries.get(i).unwrap_or(""), weeks.get(i).unwrap_or(""));
        let group = totals.get(&key).copied().unwrap_or_default();
        rates.push(conversion_rate(press_buy[i], converted[i]));
        press_buy_shares.push(share(press_buy[i], group.press_buy));
        converted_shares.push(share(converted[i], group.converted));
    }

    debug!(zeroed_cells = zeroed, "Coerced count columns");
    info!(rows = n, groups = totals.len(), "Computed metrics");

    let mut columns = canonical::LABELS
        .iter()
        .map(|name| table.column(name).cloned())
        .collect::<PolarsResult<Vec<Column>>>()?;
    for (name, values) in canonical::COUNTS.iter().zip([&press_buy, &converted]) {
        columns.push(Column::new((*name).into(), values.as_slice()));
    }
    if let Ok(option) = table.column(canonical::PAYMENT_OPTION) {
        columns.push(option.clone());
    }
    for (name, values) in derived::ALL
        .iter()
        .zip([&rates, &press_buy_shares, &converted_shares])
    {
        columns.push(Column::new((*name).into(), values.as_slice()));
    }

    Ok(DataFrame::new(columns)?)
}

/// Parsed count or 0. Negative, NaN and infinite values count as unparsable.
pub fn coerce_count(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

/// `converted / press_buy * 100` to 2 decimals, 0 when undefined.
pub fn conversion_rate(press_buy: f64, converted: f64) -> f64 {
    if press_buy <= 0.0 {
        return 0.0;
    }
    finite_or_zero(round2(converted / press_buy * 100.0))
}

/// `value` as a percentage of `total` to 2 decimals, 0 for an empty total.
pub fn share(value: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    finite_or_zero(round2(value / total * 100.0))
}

/// Round half to even at 2 decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

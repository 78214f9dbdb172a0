//! Chart data for the dashboard.
//!
//! Drawing happens in the presentation layer. This module only decides which
//! metrics are charted, how, and extracts one week-keyed series per PSP.

use polars::prelude::*;

use crate::error::TrackerError;
use crate::schema::{canonical, chart_kind, derived, format};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricChart {
    pub column: &'static str,
    pub title: &'static str,
    pub y_axis_title: &'static str,
    /// `format::NUMBER` or `format::PERCENTAGE`
    pub format: &'static str,
    /// `chart_kind::LINE` or `chart_kind::BAR`
    pub kind: &'static str,
}

pub const METRIC_CHARTS: [MetricChart; 5] = [
    MetricChart {
        column: canonical::PRESS_BUY,
        title: "Press Buy Count",
        y_axis_title: "Press Buy Count",
        format: format::NUMBER,
        kind: chart_kind::LINE,
    },
    MetricChart {
        column: canonical::CONVERTED,
        title: "Converted Count",
        y_axis_title: "Converted Count",
        format: format::NUMBER,
        kind: chart_kind::LINE,
    },
    MetricChart {
        column: derived::CONVERSION_RATE,
        title: "Conversion Rate (%)",
        y_axis_title: "Conversion Rate (%)",
        format: format::PERCENTAGE,
        kind: chart_kind::BAR,
    },
    MetricChart {
        column: derived::PRESS_BUY_SHARE,
        title: "Press Buy Share (%)",
        y_axis_title: "Press Buy Share (%)",
        format: format::PERCENTAGE,
        kind: chart_kind::BAR,
    },
    MetricChart {
        column: derived::CONVERTED_SHARE,
        title: "Converted Share (%)",
        y_axis_title: "Converted Share (%)",
        format: format::PERCENTAGE,
        kind: chart_kind::BAR,
    },
];

pub fn metric_chart(column: &str) -> Result<&'static MetricChart, TrackerError> {
    METRIC_CHARTS
        .iter()
        .find(|m| m.column == column)
        .ok_or_else(|| TrackerError::UnknownMetric(column.to_string()))
}

/// One trace: a PSP's values for one metric in one country.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub psp: String,
    pub weeks: Vec<String>,
    pub values: Vec<f64>,
}

/// Series for `metric` in `country`, one per PSP in `psps` order.
/// PSPs without rows in that country are skipped. Points keep table order.
pub fn chart_series(
    df: &DataFrame,
    country: &str,
    psps: &[String],
    metric: &str,
) -> Result<Vec<ChartSeries>, TrackerError> {
    let chart = metric_chart(metric)?;
    let countries = df.column(canonical::COUNTRY)?.str()?;
    let psp_col = df.column(canonical::PSP)?.str()?;
    let weeks = df.column(canonical::WEEK)?.str()?;
    let values = df.column(chart.column)?.f64()?;

    let mut series = Vec::new();
    for psp in psps {
        let mut trace = ChartSeries {
            name: format!("{psp} ({country})"),
            psp: psp.clone(),
            weeks: Vec::new(),
            values: Vec::new(),
        };
        for i in 0..df.height() {
            if countries.get(i) != Some(country) || psp_col.get(i) != Some(psp.as_str()) {
                continue;
            }
            trace.weeks.push(weeks.get(i).unwrap_or("").to_string());
            trace.values.push(values.get(i).unwrap_or(0.0));
        }
        if !trace.weeks.is_empty() {
            series.push(trace);
        }
    }
    Ok(series)
}

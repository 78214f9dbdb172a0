use std::collections::HashSet;

use polars::prelude::*;

use crate::error::TrackerError;
use crate::schema::{canonical, derived};

/// Per (country, psp) totals: summed counts and the mean conversion rate,
/// sorted by country then psp.
pub fn summarize_by_psp(df: &DataFrame) -> Result<DataFrame, TrackerError> {
    let summary = df
        .clone()
        .lazy()
        .group_by([col(canonical::COUNTRY), col(canonical::PSP)])
        .agg([
            col(canonical::PRESS_BUY).sum(),
            col(canonical::CONVERTED).sum(),
            col(derived::CONVERSION_RATE).mean(),
        ])
        .sort_by_exprs(
            [col(canonical::COUNTRY), col(canonical::PSP)],
            SortMultipleOptions::default(),
        )
        .collect()?;
    Ok(summary)
}

/// Headline numbers for a processed table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overview {
    pub rows: usize,
    pub countries: usize,
    pub psps: usize,
    pub weeks: usize,
    pub total_press_buy: f64,
    pub total_converted: f64,
}

pub fn overview(df: &DataFrame) -> Result<Overview, TrackerError> {
    let distinct = |name: &str| -> Result<usize, TrackerError> {
        let values = df.column(name)?.str()?;
        // missing labels are stored as "" and do not count
        Ok(values
            .into_iter()
            .flatten()
            .filter(|v| !v.is_empty())
            .collect::<HashSet<_>>()
            .len())
    };
    let total = |name: &str| -> Result<f64, TrackerError> {
        Ok(df.column(name)?.f64()?.into_iter().flatten().sum())
    };

    Ok(Overview {
        rows: df.height(),
        countries: distinct(canonical::COUNTRY)?,
        psps: distinct(canonical::PSP)?,
        weeks: distinct(canonical::WEEK)?,
        total_press_buy: total(canonical::PRESS_BUY)?,
        total_converted: total(canonical::CONVERTED)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enriched() -> DataFrame {
        df!(
            "country" => ["US", "DE", "US", "US"],
            "psp" => ["Stripe", "Adyen", "PayPal", "Stripe"],
            "week" => ["W1", "W1", "W1", "W2"],
            "press_buy" => [50.0, 10.0, 100.0, 30.0],
            "converted" => [10.0, 5.0, 20.0, 3.0],
            "conversion_rate" => [20.0, 50.0, 20.0, 10.0]
        )
        .unwrap()
    }

    #[test]
    fn summary_groups_by_country_and_psp() {
        let summary = summarize_by_psp(&enriched()).unwrap();
        assert_eq!(summary.height(), 3);

        let psps: Vec<&str> = summary
            .column("psp")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(psps, vec!["Adyen", "PayPal", "Stripe"]);

        let press_buy: Vec<f64> = summary
            .column("press_buy")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(press_buy, vec![10.0, 100.0, 80.0]);

        let rate: Vec<f64> = summary
            .column("conversion_rate")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(rate, vec![50.0, 20.0, 15.0]);
    }

    #[test]
    fn overview_counts_distinct_labels() {
        let o = overview(&enriched()).unwrap();
        assert_eq!(
            o,
            Overview {
                rows: 4,
                countries: 2,
                psps: 3,
                weeks: 2,
                total_press_buy: 190.0,
                total_converted: 38.0,
            }
        );
    }

    #[test]
    fn overview_skips_missing_labels() {
        let df = df!(
            "country" => ["US", "", "US"],
            "psp" => ["Stripe", "Adyen", ""],
            "week" => ["W1", "W1", ""],
            "press_buy" => [1.0, 2.0, 3.0],
            "converted" => [0.0, 1.0, 1.0]
        )
        .unwrap();
        let o = overview(&df).unwrap();
        assert_eq!((o.rows, o.countries, o.psps, o.weeks), (3, 1, 2, 1));
    }
}

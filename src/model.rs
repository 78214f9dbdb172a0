use std::collections::HashSet;
use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::chart::{self, ChartSeries};
use crate::error::TrackerError;
use crate::filter::RecordFilter;
use crate::loader;
use crate::processor;
use crate::resolver::{CanonicalField, ColumnMapping, ColumnResolver};
use crate::schema::{canonical, derived};
use crate::summary::{self, Overview};

/// One row of the enriched table.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub country: String,
    pub psp: String,
    pub week: String,
    pub press_buy: f64,
    pub converted: f64,
    pub payment_option: Option<String>,
    pub conversion_rate: f64,
    pub press_buy_share: f64,
    pub converted_share: f64,
}

/// The processed result of one uploaded file.
///
/// Built once per upload and never mutated; filters and summaries return new
/// tables.
#[derive(Debug, Clone)]
pub struct PspDataset {
    mapping: ColumnMapping,
    data: DataFrame,
}

impl PspDataset {
    pub fn from_path(path: impl AsRef<Path>, resolver: &ColumnResolver) -> Result<Self, TrackerError> {
        let raw = loader::load_table(path)?;
        Self::from_frame(&raw, resolver)
    }

    pub fn from_bytes(
        bytes: Vec<u8>,
        file_name: Option<&str>,
        resolver: &ColumnResolver,
    ) -> Result<Self, TrackerError> {
        let raw = loader::load_table_from_bytes(bytes, file_name)?;
        Self::from_frame(&raw, resolver)
    }

    pub fn from_frame(raw: &DataFrame, resolver: &ColumnResolver) -> Result<Self, TrackerError> {
        let headers = raw.get_column_names_str();
        let mapping = resolver.resolve(&headers)?;
        let data = processor::process(raw, &mapping)?;
        info!(
            rows = data.height(),
            payment_option = mapping.contains(CanonicalField::PaymentOption),
            "Processed dataset"
        );
        Ok(Self { mapping, data })
    }

    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn has_payment_option(&self) -> bool {
        self.data.column(canonical::PAYMENT_OPTION).is_ok()
    }

    pub fn records(&self) -> Result<Vec<EnrichedRecord>, TrackerError> {
        records(&self.data)
    }

    pub fn countries(&self) -> Result<Vec<String>, TrackerError> {
        unique_in_order(&self.data, canonical::COUNTRY)
    }

    pub fn psps(&self) -> Result<Vec<String>, TrackerError> {
        unique_in_order(&self.data, canonical::PSP)
    }

    /// Distinct non-null payment options; empty when the column was not resolved.
    pub fn payment_options(&self) -> Result<Vec<String>, TrackerError> {
        if !self.has_payment_option() {
            return Ok(Vec::new());
        }
        unique_in_order(&self.data, canonical::PAYMENT_OPTION)
    }

    pub fn overview(&self) -> Result<Overview, TrackerError> {
        summary::overview(&self.data)
    }

    pub fn filter(&self, filter: &RecordFilter) -> Result<DataFrame, TrackerError> {
        filter.apply(&self.data)
    }

    /// Per (country, psp) summary of the filtered rows.
    pub fn summary(&self, filter: &RecordFilter) -> Result<DataFrame, TrackerError> {
        summary::summarize_by_psp(&self.filter(filter)?)
    }

    /// Week-keyed series for `metric` in `country` over the filtered rows.
    pub fn chart_series(
        &self,
        filter: &RecordFilter,
        country: &str,
        metric: &str,
    ) -> Result<Vec<ChartSeries>, TrackerError> {
        let psps = match &filter.psps {
            Some(psps) => psps.clone(),
            None => self.psps()?,
        };
        chart::chart_series(&self.filter(filter)?, country, &psps, metric)
    }
}

/// Typed view of an enriched table.
pub fn records(df: &DataFrame) -> Result<Vec<EnrichedRecord>, TrackerError> {
    let countries = df.column(canonical::COUNTRY)?.str()?;
    let psps = df.column(canonical::PSP)?.str()?;
    let weeks = df.column(canonical::WEEK)?.str()?;
    let press_buy = df.column(canonical::PRESS_BUY)?.f64()?;
    let converted = df.column(canonical::CONVERTED)?.f64()?;
    let rates = df.column(derived::CONVERSION_RATE)?.f64()?;
    let press_buy_shares = df.column(derived::PRESS_BUY_SHARE)?.f64()?;
    let converted_shares = df.column(derived::CONVERTED_SHARE)?.f64()?;
    let options = match df.column(canonical::PAYMENT_OPTION) {
        Ok(column) => Some(column.str()?),
        Err(_) => None,
    };

    let text = |v: Option<&str>| v.unwrap_or("").to_string();
    let records = (0..df.height())
        .map(|i| EnrichedRecord {
            country: text(countries.get(i)),
            psp: text(psps.get(i)),
            week: text(weeks.get(i)),
            press_buy: press_buy.get(i).unwrap_or(0.0),
            converted: converted.get(i).unwrap_or(0.0),
            payment_option: options.and_then(|o| o.get(i)).map(str::to_string),
            conversion_rate: rates.get(i).unwrap_or(0.0),
            press_buy_share: press_buy_shares.get(i).unwrap_or(0.0),
            converted_share: converted_shares.get(i).unwrap_or(0.0),
        })
        .collect();
    Ok(records)
}

fn unique_in_order(df: &DataFrame, column: &str) -> Result<Vec<String>, TrackerError> {
    let values = df.column(column)?.str()?;
    let mut seen = HashSet::new();
    Ok(values
        .into_iter()
        .flatten()
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Market,Provider,Week,Press Buy,Conversions,Payment Method
US,PayPal,W1,100,20,card
US,Stripe,W1,50,10,
DE,PayPal,W1,40,4,wallet
US,PayPal,W2,0,5,card
";

    fn dataset() -> PspDataset {
        PspDataset::from_bytes(CSV.as_bytes().to_vec(), Some("psp.csv"), &ColumnResolver::default())
            .unwrap()
    }

    #[test]
    fn builds_records_from_upload() {
        let ds = dataset();
        let records = ds.records().unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(
            records[0],
            EnrichedRecord {
                country: "US".into(),
                psp: "PayPal".into(),
                week: "W1".into(),
                press_buy: 100.0,
                converted: 20.0,
                payment_option: Some("card".into()),
                conversion_rate: 20.0,
                press_buy_share: 66.67,
                converted_share: 66.67,
            }
        );
        assert_eq!(records[1].payment_option, None);
        assert_eq!(records[3].conversion_rate, 0.0);
        assert_eq!(records[3].converted_share, 100.0);
    }

    #[test]
    fn exposes_mapping_and_unique_labels() {
        let ds = dataset();
        assert_eq!(ds.mapping().len(), 6);
        assert_eq!(ds.countries().unwrap(), vec!["US", "DE"]);
        assert_eq!(ds.psps().unwrap(), vec!["PayPal", "Stripe"]);
        assert_eq!(ds.payment_options().unwrap(), vec!["card", "wallet"]);
    }

    #[test]
    fn summary_respects_the_filter() {
        let ds = dataset();
        let summary = ds
            .summary(&RecordFilter::default().countries(["US"]))
            .unwrap();
        assert_eq!(summary.height(), 2);
        let press_buy: Vec<f64> = summary
            .column(canonical::PRESS_BUY)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(press_buy, vec![100.0, 50.0]);
    }

    #[test]
    fn chart_series_defaults_to_all_psps() {
        let ds = dataset();
        let series = ds
            .chart_series(&RecordFilter::default(), "US", derived::CONVERSION_RATE)
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].values, vec![20.0, 0.0]);
        assert_eq!(series[1].name, "Stripe (US)");
    }

    #[test]
    fn overview_totals() {
        let o = dataset().overview().unwrap();
        assert_eq!(o.rows, 4);
        assert_eq!(o.countries, 2);
        assert_eq!(o.weeks, 2);
        assert_eq!(o.total_press_buy, 190.0);
    }
}

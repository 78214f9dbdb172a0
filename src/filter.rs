use polars::prelude::*;

use crate::error::TrackerError;
use crate::schema::canonical;

/// Multi-select filter over an enriched table.
///
/// `countries` and `psps` are membership predicates when set; `None` keeps
/// every row and an empty selection keeps none. A non-empty `payment_options`
/// keeps rows whose option is selected or missing, and is ignored when the
/// table has no payment option column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub countries: Option<Vec<String>>,
    pub psps: Option<Vec<String>>,
    pub payment_options: Vec<String>,
}

impl RecordFilter {
    pub fn countries<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.countries = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn psps<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.psps = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn payment_options<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.payment_options = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame, TrackerError> {
        let mut predicate = lit(true);

        if let Some(countries) = &self.countries {
            predicate = predicate.and(member_of(canonical::COUNTRY, countries));
        }
        if let Some(psps) = &self.psps {
            predicate = predicate.and(member_of(canonical::PSP, psps));
        }
        if !self.payment_options.is_empty() && df.column(canonical::PAYMENT_OPTION).is_ok() {
            predicate = predicate.and(
                member_of(canonical::PAYMENT_OPTION, &self.payment_options)
                    .or(col(canonical::PAYMENT_OPTION).is_null()),
            );
        }

        let filtered = df.clone().lazy().filter(predicate).collect()?;
        Ok(filtered)
    }
}

fn member_of(column: &str, values: &[String]) -> Expr {
    let selected = Series::new(column.into(), values);
    col(column).is_in(lit(selected), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DataFrame {
        df!(
            "country" => ["US", "US", "DE", "DE"],
            "psp" => ["PayPal", "Stripe", "PayPal", "Adyen"],
            "week" => ["W1", "W1", "W1", "W2"],
            "payment_option" => [Some("card"), Some("wallet"), None, Some("card")]
        )
        .unwrap()
    }

    fn psps(df: &DataFrame) -> Vec<String> {
        df.column("psp")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap().to_string())
            .collect()
    }

    #[test]
    fn default_filter_keeps_everything() {
        let out = RecordFilter::default().apply(&table()).unwrap();
        assert_eq!(out.height(), 4);
    }

    #[test]
    fn country_and_psp_selections_intersect() {
        let out = RecordFilter::default()
            .countries(["US", "DE"])
            .psps(["PayPal"])
            .apply(&table())
            .unwrap();
        assert_eq!(psps(&out), vec!["PayPal", "PayPal"]);
    }

    #[test]
    fn empty_selection_keeps_nothing() {
        let out = RecordFilter::default()
            .countries(Vec::<String>::new())
            .apply(&table())
            .unwrap();
        assert_eq!(out.height(), 0);
    }

    #[test]
    fn payment_filter_lets_missing_options_through() {
        let out = RecordFilter::default()
            .payment_options(["card"])
            .apply(&table())
            .unwrap();
        assert_eq!(psps(&out), vec!["PayPal", "PayPal", "Adyen"]);
    }

    #[test]
    fn payment_filter_is_ignored_without_the_column() {
        let df = table().drop("payment_option").unwrap();
        let out = RecordFilter::default()
            .payment_options(["card"])
            .apply(&df)
            .unwrap();
        assert_eq!(out.height(), 4);
    }
}

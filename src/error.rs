use thiserror::Error;

use crate::resolver::CanonicalField;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Failed to load spreadsheet: {0}")]
    Load(String),

    #[error("Could not resolve required columns: {}", join_fields(.missing))]
    Schema { missing: Vec<CanonicalField> },

    #[error("Unknown canonical field: {0}")]
    UnknownField(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<calamine::Error> for TrackerError {
    fn from(err: calamine::Error) -> Self {
        TrackerError::Load(err.to_string())
    }
}

fn join_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_names_every_missing_field() {
        let err = TrackerError::Schema {
            missing: vec![CanonicalField::Country, CanonicalField::Week],
        };
        assert_eq!(
            err.to_string(),
            "Could not resolve required columns: country, week"
        );
    }
}

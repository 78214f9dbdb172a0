//! Header resolution: maps free-form spreadsheet headers onto the canonical
//! schema through a prioritized synonym table.
//!
//! Each canonical field walks its candidates in priority order. A candidate
//! binds on an exact, case-sensitive header match first; failing that, on a
//! case-insensitive substring match in either direction. Among several fuzzy
//! matches the first header in input order wins. That tie-break is
//! deterministic, not a semantic ranking.
//!
//! A header is bound to at most one field. Fields are resolved in table
//! order, so earlier fields claim contested headers first.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, warn};

use crate::error::TrackerError;
use crate::schema::canonical;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    Country,
    Psp,
    Week,
    PressBuy,
    Converted,
    PaymentOption,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::Country,
        CanonicalField::Psp,
        CanonicalField::Week,
        CanonicalField::PressBuy,
        CanonicalField::Converted,
        CanonicalField::PaymentOption,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::Country => canonical::COUNTRY,
            CanonicalField::Psp => canonical::PSP,
            CanonicalField::Week => canonical::WEEK,
            CanonicalField::PressBuy => canonical::PRESS_BUY,
            CanonicalField::Converted => canonical::CONVERTED,
            CanonicalField::PaymentOption => canonical::PAYMENT_OPTION,
        }
    }

    pub fn is_required(self) -> bool {
        !matches!(self, CanonicalField::PaymentOption)
    }

    pub fn from_name(name: &str) -> Result<Self, TrackerError> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| TrackerError::UnknownField(name.to_string()))
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Candidate headers per canonical field, most specific first.
pub const COLUMN_SYNONYMS: &[(CanonicalField, &[&str])] = &[
    (
        CanonicalField::Country,
        &["country", "Country", "COUNTRY", "market", "Market", "MARKET"],
    ),
    (
        CanonicalField::Psp,
        &[
            "psp",
            "PSP",
            "payment service provider",
            "Payment Provider",
            "provider",
            "Provider",
        ],
    ),
    (
        CanonicalField::Week,
        &["week", "Week", "WEEK", "date", "Date", "period", "Period"],
    ),
    (
        CanonicalField::PressBuy,
        &[
            "press buy count",
            "press_buy_count",
            "PressBuyCount",
            "press buy",
            "buys",
            "Buys",
        ],
    ),
    (
        CanonicalField::Converted,
        &[
            "converted count",
            "converted_count",
            "ConvertedCount",
            "converted",
            "conversions",
            "Conversions",
        ],
    ),
    (
        CanonicalField::PaymentOption,
        &[
            "last selected payment option",
            "payment option",
            "payment method",
        ],
    ),
];

/// Resolved bindings, kept in canonical field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    bindings: Vec<(CanonicalField, String)>,
}

impl ColumnMapping {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, header)| header.as_str())
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.get(field).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &str)> {
        self.bindings.iter().map(|(f, h)| (*f, h.as_str()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Required fields with no binding, in canonical order.
    pub fn missing_required(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .filter(|f| f.is_required() && !self.contains(*f))
            .collect()
    }

    fn bind(&mut self, field: CanonicalField, header: String) {
        self.bindings.push((field, header));
        self.bindings.sort_by_key(|(f, _)| *f);
    }
}

/// The synonym table as a configurable value.
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    table: Vec<(CanonicalField, Vec<String>)>,
}

impl Default for ColumnResolver {
    fn default() -> Self {
        let table = COLUMN_SYNONYMS
            .iter()
            .map(|(field, names)| (*field, names.iter().map(|n| n.to_string()).collect()))
            .collect();
        Self { table }
    }
}

impl ColumnResolver {
    /// Prepend candidates for `field`; they take priority over the built-in names.
    pub fn with_synonyms<I, S>(mut self, field: CanonicalField, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extra: Vec<String> = names.into_iter().map(Into::into).collect();
        match self.table.iter_mut().find(|(f, _)| *f == field) {
            Some((_, candidates)) => {
                candidates.splice(0..0, extra);
            }
            None => self.table.push((field, extra)),
        }
        self
    }

    pub fn candidates(&self, field: CanonicalField) -> &[String] {
        self.table
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, c)| c.as_slice())
            .unwrap_or(&[])
    }

    /// Bind every field that can be matched. Never fails.
    pub fn detect<S: AsRef<str>>(&self, headers: &[S]) -> ColumnMapping {
        let headers: Vec<&str> = headers.iter().map(|h| h.as_ref()).collect();
        let mut taken: HashSet<&str> = HashSet::new();
        let mut mapping = ColumnMapping::default();

        for (field, candidates) in &self.table {
            let found = candidates
                .iter()
                .find_map(|candidate| exact_match(candidate, &headers, &taken))
                .or_else(|| {
                    candidates
                        .iter()
                        .find_map(|candidate| fuzzy_match(candidate, &headers, &taken))
                });
            if let Some(header) = found {
                debug!(field = field.name(), header, "Resolved column");
                taken.insert(header);
                mapping.bind(*field, header.to_string());
            }
        }
        mapping
    }

    /// Bind all fields and fail with `TrackerError::Schema` if a required one is missing.
    pub fn resolve<S: AsRef<str>>(&self, headers: &[S]) -> Result<ColumnMapping, TrackerError> {
        let mapping = self.detect(headers);
        let missing = mapping.missing_required();
        if !missing.is_empty() {
            warn!(?missing, "Required columns could not be resolved");
            return Err(TrackerError::Schema { missing });
        }
        Ok(mapping)
    }
}

fn exact_match<'h>(
    candidate: &str,
    headers: &[&'h str],
    taken: &HashSet<&str>,
) -> Option<&'h str> {
    headers
        .iter()
        .copied()
        .filter(|h| !taken.contains(h))
        .find(|h| h.trim() == candidate)
}

fn fuzzy_match<'h>(
    candidate: &str,
    headers: &[&'h str],
    taken: &HashSet<&str>,
) -> Option<&'h str> {
    let needle = candidate.to_lowercase();
    if needle.is_empty() {
        return None;
    }
    headers.iter().copied().filter(|h| !taken.contains(h)).find(|h| {
        let header = h.trim().to_lowercase();
        // an empty header is a substring of everything
        !header.is_empty() && (header.contains(&needle) || needle.contains(&header))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_plain_headers() {
        let h = headers(&["Country", "PSP", "Week", "Press Buy Count", "Converted Count"]);
        let mapping = ColumnResolver::default().resolve(&h).unwrap();

        assert_eq!(mapping.get(CanonicalField::Country), Some("Country"));
        assert_eq!(mapping.get(CanonicalField::Psp), Some("PSP"));
        assert_eq!(mapping.get(CanonicalField::Week), Some("Week"));
        assert_eq!(mapping.get(CanonicalField::PressBuy), Some("Press Buy Count"));
        assert_eq!(mapping.get(CanonicalField::Converted), Some("Converted Count"));
        assert_eq!(mapping.get(CanonicalField::PaymentOption), None);
    }

    #[test]
    fn exact_match_beats_earlier_fuzzy_header() {
        // "Country Code" appears first and would win a fuzzy match.
        let h = headers(&["Country Code", "country", "psp", "week", "buys", "converted"]);
        let mapping = ColumnResolver::default().resolve(&h).unwrap();
        assert_eq!(mapping.get(CanonicalField::Country), Some("country"));
    }

    #[test]
    fn exact_candidate_beats_fuzzy_hit_on_an_earlier_candidate() {
        // lowercase "country" is tried first and is only a fuzzy hit for "Country Code"
        let h = headers(&["Country Code", "Country", "PSP", "Week", "Buys", "Converted"]);
        let mapping = ColumnResolver::default().resolve(&h).unwrap();
        assert_eq!(mapping.get(CanonicalField::Country), Some("Country"));
    }

    #[test]
    fn padded_header_still_matches_exactly() {
        let h = headers(&["Country Code", " Country ", "PSP", "Week", "Buys", "Converted"]);
        let mapping = ColumnResolver::default().resolve(&h).unwrap();
        assert_eq!(mapping.get(CanonicalField::Country), Some(" Country "));
    }

    #[test]
    fn fuzzy_ties_break_on_header_order() {
        let h = headers(&["Market A", "Market B", "psp", "week", "buys", "converted"]);
        let mapping = ColumnResolver::default().resolve(&h).unwrap();
        assert_eq!(mapping.get(CanonicalField::Country), Some("Market A"));
    }

    #[test]
    fn header_can_be_substring_of_candidate() {
        let h = headers(&["Nation", "Provider", "Period", "Press", "Converted"]);
        let mapping = ColumnResolver::default().detect(&h);
        // "press" is contained in "press buy count"
        assert_eq!(mapping.get(CanonicalField::PressBuy), Some("Press"));
        assert_eq!(mapping.get(CanonicalField::Week), Some("Period"));
        assert!(!mapping.contains(CanonicalField::Country));
    }

    #[test]
    fn missing_country_is_a_schema_error() {
        let h = headers(&["Region", "PSP", "Week", "Press Buy Count", "Converted Count"]);
        let err = ColumnResolver::default().resolve(&h).unwrap_err();
        match err {
            TrackerError::Schema { missing } => assert_eq!(missing, vec![CanonicalField::Country]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn payment_option_is_optional_but_detected() {
        let h = headers(&[
            "Country",
            "PSP",
            "Week",
            "Press Buy Count",
            "Converted Count",
            "Last Selected Payment Option",
        ]);
        let mapping = ColumnResolver::default().resolve(&h).unwrap();
        assert_eq!(
            mapping.get(CanonicalField::PaymentOption),
            Some("Last Selected Payment Option")
        );
    }

    #[test]
    fn a_header_binds_only_once() {
        // "count" is a substring of both count candidates.
        let h = headers(&["country", "psp", "week", "count", "conversions"]);
        let mapping = ColumnResolver::default().resolve(&h).unwrap();
        assert_eq!(mapping.get(CanonicalField::PressBuy), Some("count"));
        assert_eq!(mapping.get(CanonicalField::Converted), Some("conversions"));
    }

    #[test]
    fn blank_headers_never_match() {
        let h = headers(&["", "  ", "country", "psp", "week", "buys", "converted"]);
        let mapping = ColumnResolver::default().resolve(&h).unwrap();
        assert_eq!(mapping.get(CanonicalField::Country), Some("country"));
        assert!(mapping.iter().all(|(_, header)| !header.trim().is_empty()));
    }

    #[test]
    fn resolution_is_deterministic() {
        let h = headers(&["Market", "Provider", "Date", "Buys", "Conversions", "payment method"]);
        let resolver = ColumnResolver::default();
        let first = resolver.resolve(&h).unwrap();
        for _ in 0..10 {
            assert_eq!(resolver.resolve(&h).unwrap(), first);
        }
    }

    #[test]
    fn extra_synonyms_take_priority() {
        let h = headers(&["Land", "Country", "psp", "week", "buys", "converted"]);
        let resolver = ColumnResolver::default().with_synonyms(CanonicalField::Country, ["Land"]);
        assert_eq!(resolver.candidates(CanonicalField::Country)[0], "Land");
        let mapping = resolver.resolve(&h).unwrap();
        assert_eq!(mapping.get(CanonicalField::Country), Some("Land"));
    }

    #[test]
    fn field_names_round_trip() {
        for field in CanonicalField::ALL {
            assert_eq!(CanonicalField::from_name(field.name()).unwrap(), field);
        }
        assert!(CanonicalField::from_name("region").is_err());
    }
}

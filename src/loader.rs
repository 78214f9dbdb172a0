//! Spreadsheet loading.
//!
//! Every column comes back as a nullable String column; typing happens later
//! in the processor so a single bad cell can never fail the load.

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use polars::prelude::*;
use tracing::info;

use crate::error::TrackerError;

/// Read the first sheet of a workbook, or a CSV file, as all-string columns.
pub fn load_table(path: impl AsRef<Path>) -> Result<DataFrame, TrackerError> {
    let path = path.as_ref();
    if is_csv(path.to_str()) {
        let df = csv_options()
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| TrackerError::Load(e.to_string()))?;
        return promote_header_row(df);
    }

    let mut workbook = open_workbook_auto(path)?;
    first_sheet(&mut workbook)
}

/// Same as [`load_table`] for uploaded content. `file_name` is only used to
/// recognise CSV uploads; workbook formats are detected from the bytes.
pub fn load_table_from_bytes(
    bytes: Vec<u8>,
    file_name: Option<&str>,
) -> Result<DataFrame, TrackerError> {
    if is_csv(file_name) {
        let df = csv_options()
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(|e| TrackerError::Load(e.to_string()))?;
        return promote_header_row(df);
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    first_sheet(&mut workbook)
}

/// The header line is read as a data row so the reader never renames
/// duplicate headers; [`promote_header_row`] names the columns instead.
fn csv_options() -> CsvReadOptions {
    CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0)) // all columns as String
}

fn is_csv(name: Option<&str>) -> bool {
    name.and_then(|n| Path::new(n).extension())
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn first_sheet<RS: Read + Seek>(workbook: &mut Sheets<RS>) -> Result<DataFrame, TrackerError> {
    let sheet_names = workbook.sheet_names();
    let Some(sheet_name) = sheet_names.first() else {
        return Err(TrackerError::Load("workbook has no sheets".into()));
    };
    let range = workbook.worksheet_range(sheet_name)?;
    let df = range_to_frame(&range)?;
    info!(
        sheet = sheet_name.as_str(),
        rows = df.height(),
        columns = df.width(),
        "Loaded sheet"
    );
    Ok(df)
}

/// Header row + data rows of a sheet range as a DataFrame.
pub fn range_to_frame(range: &Range<Data>) -> Result<DataFrame, TrackerError> {
    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| TrackerError::Load("sheet has no header row".into()))?;

    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| cell_to_string(cell).unwrap_or_default())
        .collect();
    let headers = unique_headers(headers);

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (i, column) in values.iter_mut().enumerate() {
            column.push(row.get(i).and_then(cell_to_string));
        }
    }

    let columns: Vec<Column> = headers
        .iter()
        .zip(&values)
        .map(|(name, vals)| Column::new(name.as_str().into(), vals.as_slice()))
        .collect();

    Ok(DataFrame::new(columns)?)
}

/// Render one cell as text. Empty and error cells are null.
pub fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(format!("{f}")),
        Data::Int(i) => Some(format!("{i}")),
        Data::Bool(b) => Some(format!("{b}")),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) if ts.time() == chrono::NaiveTime::MIN => {
                Some(ts.format("%Y-%m-%d").to_string())
            }
            Some(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Some(format!("{}", dt.as_f64())),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

fn promote_header_row(df: DataFrame) -> Result<DataFrame, TrackerError> {
    if df.height() == 0 {
        return Err(TrackerError::Load("file has no header row".into()));
    }
    let raw = df
        .get_columns()
        .iter()
        .map(|c| Ok(c.str()?.get(0).unwrap_or_default().to_string()))
        .collect::<PolarsResult<Vec<String>>>()?;

    let mut data = df.slice(1, df.height() - 1);
    data.set_column_names(unique_headers(raw).as_slice())?;
    info!(rows = data.height(), columns = data.width(), "Loaded CSV");
    Ok(data)
}

/// Trim header names, name blank ones `Unnamed: <i>` and suffix repeats with `.<n>`.
fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(raw.len());
    for (i, name) in raw.into_iter().enumerate() {
        let name = name.trim();
        let base = if name.is_empty() {
            format!("Unnamed: {i}")
        } else {
            name.to_string()
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        seen.push(candidate);
    }
    seen
}

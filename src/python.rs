//! PyO3 bindings consumed by the dashboard front end.
//!
//! Tables cross the boundary as polars DataFrames via pyo3-polars.

use std::collections::HashMap;
use std::path::PathBuf;

use pyo3::create_exception;
use pyo3::exceptions::{PyException, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyModule};
use pyo3_polars::PyDataFrame;

use crate::chart::{ChartSeries, METRIC_CHARTS};
use crate::error::TrackerError;
use crate::filter::RecordFilter;
use crate::loader;
use crate::model::PspDataset;
use crate::resolver::{CanonicalField, ColumnMapping, ColumnResolver};
use crate::schema;

create_exception!(_core, LoadError, PyException);
create_exception!(_core, SchemaError, PyException);

impl From<TrackerError> for PyErr {
    fn from(err: TrackerError) -> PyErr {
        match err {
            TrackerError::Load(_) => LoadError::new_err(err.to_string()),
            TrackerError::Schema { .. } => SchemaError::new_err(err.to_string()),
            TrackerError::UnknownField(_) | TrackerError::UnknownMetric(_) => {
                PyValueError::new_err(err.to_string())
            }
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

type Synonyms = Option<HashMap<String, Vec<String>>>;

fn build_resolver(synonyms: Synonyms) -> Result<ColumnResolver, TrackerError> {
    let mut resolver = ColumnResolver::default();
    for (field, names) in synonyms.unwrap_or_default() {
        resolver = resolver.with_synonyms(CanonicalField::from_name(&field)?, names);
    }
    Ok(resolver)
}

fn mapping_to_map(mapping: &ColumnMapping) -> HashMap<String, String> {
    mapping
        .iter()
        .map(|(field, header)| (field.name().to_string(), header.to_string()))
        .collect()
}

fn series_to_dict<'py>(py: Python<'py>, series: ChartSeries) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("name", series.name)?;
    dict.set_item("psp", series.psp)?;
    dict.set_item("x", series.weeks)?;
    dict.set_item("y", series.values)?;
    Ok(dict)
}

/// Processed upload. Immutable; every query returns a new DataFrame.
#[pyclass(name = "PspDataset", frozen)]
pub struct PyPspDataset {
    inner: PspDataset,
}

#[pymethods]
impl PyPspDataset {
    /// Load and process a workbook (first sheet) or CSV file.
    ///
    /// `synonyms` maps canonical field names to extra header names that take
    /// priority over the built-in ones, e.g. `{"country": ["Land"]}`.
    #[staticmethod]
    #[pyo3(signature = (path, synonyms=None))]
    fn from_file(path: PathBuf, synonyms: Synonyms) -> PyResult<Self> {
        let resolver = build_resolver(synonyms)?;
        let inner = PspDataset::from_path(path, &resolver)?;
        Ok(Self { inner })
    }

    /// Process uploaded file content. `filename` is used to recognise CSV.
    #[staticmethod]
    #[pyo3(signature = (data, filename=None, synonyms=None))]
    fn from_bytes(data: &[u8], filename: Option<&str>, synonyms: Synonyms) -> PyResult<Self> {
        let resolver = build_resolver(synonyms)?;
        let inner = PspDataset::from_bytes(data.to_vec(), filename, &resolver)?;
        Ok(Self { inner })
    }

    /// Process an already loaded DataFrame.
    #[staticmethod]
    #[pyo3(signature = (df, synonyms=None))]
    fn from_frame(df: PyDataFrame, synonyms: Synonyms) -> PyResult<Self> {
        let resolver = build_resolver(synonyms)?;
        let inner = PspDataset::from_frame(&df.0, &resolver)?;
        Ok(Self { inner })
    }

    #[getter]
    fn data(&self) -> PyDataFrame {
        PyDataFrame(self.inner.data().clone())
    }

    /// Canonical field -> source header.
    #[getter]
    fn columns(&self) -> HashMap<String, String> {
        mapping_to_map(self.inner.mapping())
    }

    #[getter]
    fn has_payment_option(&self) -> bool {
        self.inner.has_payment_option()
    }

    fn countries(&self) -> PyResult<Vec<String>> {
        Ok(self.inner.countries()?)
    }

    fn psps(&self) -> PyResult<Vec<String>> {
        Ok(self.inner.psps()?)
    }

    fn payment_options(&self) -> PyResult<Vec<String>> {
        Ok(self.inner.payment_options()?)
    }

    fn overview<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let o = self.inner.overview()?;
        let dict = PyDict::new(py);
        dict.set_item("rows", o.rows)?;
        dict.set_item("countries", o.countries)?;
        dict.set_item("psps", o.psps)?;
        dict.set_item("weeks", o.weeks)?;
        dict.set_item("total_press_buy", o.total_press_buy)?;
        dict.set_item("total_converted", o.total_converted)?;
        Ok(dict)
    }

    /// Rows matching the selections. `None` means "no filter" for countries
    /// and psps; rows without a payment option always pass.
    #[pyo3(signature = (countries=None, psps=None, payment_options=None))]
    fn filter(
        &self,
        countries: Option<Vec<String>>,
        psps: Option<Vec<String>>,
        payment_options: Option<Vec<String>>,
    ) -> PyResult<PyDataFrame> {
        let filter = RecordFilter {
            countries,
            psps,
            payment_options: payment_options.unwrap_or_default(),
        };
        Ok(PyDataFrame(self.inner.filter(&filter)?))
    }

    /// Per (country, psp) press_buy / converted sums and mean conversion_rate.
    #[pyo3(signature = (countries=None, psps=None, payment_options=None))]
    fn summary(
        &self,
        countries: Option<Vec<String>>,
        psps: Option<Vec<String>>,
        payment_options: Option<Vec<String>>,
    ) -> PyResult<PyDataFrame> {
        let filter = RecordFilter {
            countries,
            psps,
            payment_options: payment_options.unwrap_or_default(),
        };
        Ok(PyDataFrame(self.inner.summary(&filter)?))
    }

    /// One `{"name", "psp", "x", "y"}` dict per PSP with rows in `country`.
    #[pyo3(signature = (country, metric, psps=None, payment_options=None))]
    fn chart_series<'py>(
        &self,
        py: Python<'py>,
        country: &str,
        metric: &str,
        psps: Option<Vec<String>>,
        payment_options: Option<Vec<String>>,
    ) -> PyResult<Vec<Bound<'py, PyDict>>> {
        let filter = RecordFilter {
            countries: None,
            psps,
            payment_options: payment_options.unwrap_or_default(),
        };
        self.inner
            .chart_series(&filter, country, metric)?
            .into_iter()
            .map(|s| series_to_dict(py, s))
            .collect()
    }

    fn __len__(&self) -> usize {
        self.inner.data().height()
    }

    fn __repr__(&self) -> String {
        format!(
            "PspDataset(rows={}, columns={:?})",
            self.inner.data().height(),
            self.inner.data().get_column_names_str()
        )
    }
}

/// Read a workbook's first sheet (or a CSV) with every column as strings.
#[pyfunction]
fn load_table(path: PathBuf) -> PyResult<PyDataFrame> {
    Ok(PyDataFrame(loader::load_table(path)?))
}

/// Resolve headers to canonical fields; raises SchemaError on missing fields.
#[pyfunction]
#[pyo3(signature = (headers, synonyms=None))]
fn resolve_columns(headers: Vec<String>, synonyms: Synonyms) -> PyResult<HashMap<String, String>> {
    let mapping = build_resolver(synonyms)?.resolve(&headers)?;
    Ok(mapping_to_map(&mapping))
}

/// The dashboard charts: column, title, y-axis title, format and kind.
#[pyfunction]
fn metric_charts(py: Python<'_>) -> PyResult<Vec<Bound<'_, PyDict>>> {
    METRIC_CHARTS
        .iter()
        .map(|chart| {
            let dict = PyDict::new(py);
            dict.set_item("column", chart.column)?;
            dict.set_item("title", chart.title)?;
            dict.set_item("yaxis_title", chart.y_axis_title)?;
            dict.set_item("format", chart.format)?;
            dict.set_item("chart_type", chart.kind)?;
            Ok(dict)
        })
        .collect()
}

/// Route Rust tracing output to stderr. Returns False if already installed.
#[pyfunction]
#[pyo3(signature = (level=None))]
fn init_logging(level: Option<&str>) -> bool {
    crate::logging::init_logging(level)
}

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let canonical = PyModule::new(m.py(), "canonical")?;
    canonical.add("COUNTRY", schema::canonical::COUNTRY)?;
    canonical.add("PSP", schema::canonical::PSP)?;
    canonical.add("WEEK", schema::canonical::WEEK)?;
    canonical.add("PRESS_BUY", schema::canonical::PRESS_BUY)?;
    canonical.add("CONVERTED", schema::canonical::CONVERTED)?;
    canonical.add("PAYMENT_OPTION", schema::canonical::PAYMENT_OPTION)?;
    canonical.add("LABELS", schema::canonical::LABELS.to_vec())?;
    canonical.add("COUNTS", schema::canonical::COUNTS.to_vec())?;
    m.add_submodule(&canonical)?;

    let derived = PyModule::new(m.py(), "derived")?;
    for name in schema::derived::ALL {
        derived.add(name.to_uppercase(), name)?;
    }
    m.add_submodule(&derived)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPspDataset>()?;
    m.add_function(wrap_pyfunction!(load_table, m)?)?;
    m.add_function(wrap_pyfunction!(resolve_columns, m)?)?;
    m.add_function(wrap_pyfunction!(metric_charts, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    m.add("LoadError", m.py().get_type::<LoadError>())?;
    m.add("SchemaError", m.py().get_type::<SchemaError>())?;
    add_schema_exports(m)?;
    Ok(())
}

pub mod chart;
pub mod error;
pub mod filter;
pub mod loader;
pub mod logging;
pub mod model;
pub mod processor;
pub mod resolver;
pub mod schema;
pub mod summary;

#[cfg(feature = "python")]
mod python;

pub use error::TrackerError;
pub use filter::RecordFilter;
pub use model::{EnrichedRecord, PspDataset};
pub use resolver::{CanonicalField, ColumnMapping, ColumnResolver};
pub use summary::Overview;

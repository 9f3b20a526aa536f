//! Configuration and data models.

pub mod config;
pub mod record;

pub use config::{BackendKind, LabelConfig};
pub use record::{ExtractionSchema, ProductLabel, StructuredRecord};

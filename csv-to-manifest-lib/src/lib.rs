//! CSV to Manifest Processor Library
//!
//! This library synthesizes load-ready JSON manifests from CSV files based
//! on versioned templates with typed parameter placeholders.

mod config;
mod error;
mod mapping;
mod materialize;
mod processor;
mod progress;
mod schema;
mod template;
mod utils;
mod writer;

pub use config::{AclConfig, LegalConfig, LoadManifest, MappingStep, SchemaSection};
pub use error::{ProcessingMessage, ProcessingOutcome, ProcessingState, ProcessorError};
pub use mapping::{bind, ColumnBinding, HeaderIndex};
pub use materialize::{Materializer, OPTIONAL_PREFIX};
pub use processor::{BatchSummary, Processor};
pub use progress::{MappingSummary, Phase, ProgressReporter, TracingReporter};
pub use schema::{SchemaDocument, SchemaResolver};
pub use template::{load_template, scan_template, ArrayFrame, Occurrence};
pub use writer::ManifestWriter;

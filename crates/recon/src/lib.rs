//! `otd-recon`: purchase-order delivery reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded order lines and receipt events,
//! returns classified lines, orders, timeliness metrics and an association
//! test. Source loading lives in [`load`]; no CLI dependencies.

pub mod aggregate;
pub mod association;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod load;
pub mod metrics;
pub mod model;
pub mod quality;
pub mod resolve;
pub mod rollup;
pub mod stats;

pub use association::{AssociationOutcome, AssociationReport, ContingencyResult};
pub use config::{Dimension, Granularity, PipelineConfig};
pub use engine::run;
pub use error::{InsufficientData, ReconError};
pub use filter::Selection;
pub use load::load_input;
pub use model::{ClassifiedLine, ClassifiedOrder, DelayCategory, PipelineInput, PipelineResult};
pub use quality::DataQualityReport;

//! Ingestion pipeline for sensor readings.
//!
//! - [`Pipeline`] -- the per-message entry point: parse, evaluate, persist,
//!   notify, forward, with every downstream stage fault-isolated and bounded
//!   by a timeout.
//! - [`Dispatcher`] -- pulls messages from a bounded queue and runs the
//!   pipeline with an explicit in-flight limit.

pub mod dispatcher;
pub mod ingest;

pub use dispatcher::{ingest_channel, DispatchSummary, Dispatcher};
pub use ingest::{InboundMessage, IngestError, IngestReport, Pipeline, PipelineConfig, Stage, StageOutcome};

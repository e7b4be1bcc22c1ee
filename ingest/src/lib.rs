//! Ingestion side of Orderhub: schema validation and the pipeline that
//! turns an inbound payload into a durable, cached order.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  Durable feed    │  raw payload, at-least-once
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ SchemaValidator  │  compiled once at startup
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ IngestionPipeline│  parse → persist (write gate) → cache
//! └────┬────────┬────┘
//!      ▼        ▼
//! ┌────────┐ ┌────────┐
//! │ Store  │ │ Cache  │
//! └────────┘ └────────┘
//! ```
//!
//! Every per-message failure is contained inside
//! [`IngestionPipeline::ingest`]; the only thing that escapes is the
//! three-way [`IngestOutcome`], which the feed maps onto its
//! acknowledgement decision.

pub mod pipeline;
pub mod schema;

pub use pipeline::{IngestError, IngestOutcome, IngestionPipeline, WriteGate};
pub use schema::{SchemaError, SchemaValidator, ValidationFailure};

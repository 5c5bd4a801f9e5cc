//! Data layer: ingestion, aggregation, and repository seams.
//!
//! This crate turns raw clinical-activity records into the per-patient
//! aggregates the eligibility rules consume. Snapshot files are read with
//! [`snapshot::load_snapshots`], served through the [`repository`] traits,
//! and reduced by the [`aggregator`] types.

pub mod aggregator;
pub mod repository;
pub mod snapshot;

pub use billing_core as core;

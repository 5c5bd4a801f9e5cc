//! Core domain layer for the clinical billing eligibility engine.
//!
//! Defines the closed enums and value types of the billing data model, the
//! static CPT reference table, and the pure eligibility rule table that turns
//! per-patient aggregates into a billing summary.

pub mod codes;
pub mod error;
pub mod models;
pub mod rules;
pub mod settings;

//! Report generation runtime.
//!
//! Ties the data layer to the eligibility rules: [`service::BillingReportService`]
//! evaluates each enrollment concurrently and [`assembler`] folds the results
//! into the clinic roll-up.

pub mod assembler;
pub mod service;

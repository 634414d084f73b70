//! Core data types for the batch pipeline

pub mod batch;
pub mod record;

//! # promobatch
//!
//! Bulk promo-price extraction from retail product feeds via the OpenAI
//! Batch API.
//!
//! The pipeline turns each product record into a prompt, submits the lot as
//! one asynchronous batch job, polls the job to completion, and reconciles
//! the model's per-item responses back onto the original records to produce
//! a cleaned, deduplicated table.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use promobatch::client::OpenAiClient;
//! use promobatch::tabular::OutputFormat;
//! use promobatch::{Config, Pipeline, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> promobatch::Result<()> {
//!     let config = Config::from_env()?;
//!     let client = OpenAiClient::new(&config.api_key, &config.api_base)?;
//!     let pipeline = Pipeline::new(client, config);
//!
//!     let summary = pipeline
//!         .run(&RunOptions {
//!             input: "input_files/products.json".into(),
//!             output_base: "output/products".into(),
//!             format: OutputFormat::Csv,
//!             prompt_file: None,
//!             limit: 0,
//!         })
//!         .await?;
//!     println!("wrote {} rows", summary.output_rows);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod tabular;
pub mod utils;

pub use config::Config;
pub use pipeline::{Pipeline, RunOptions, RunSummary};
pub use utils::error::{PipelineError, Result};

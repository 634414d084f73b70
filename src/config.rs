//! Runtime configuration
//!
//! Defaults cover the promo-price extraction task; the API key always comes
//! from the environment (`.env` files are honored via dotenvy).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::error::{PipelineError, Result};

/// Default base URL of the remote batch service
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API key for the remote batch service
    #[serde(skip_serializing, default)]
    pub api_key: String,
    /// Base URL of the remote batch service
    pub api_base: String,
    /// Model to run each request against
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling cutoff
    pub top_p: f32,
    /// Per-request completion token cap
    pub max_tokens: u32,
    /// Endpoint path each batch item targets
    pub endpoint: String,
    /// Completion window passed at batch creation
    pub completion_window: String,
    /// Metadata attached to the batch job
    pub metadata: HashMap<String, String>,
    /// Seconds to wait between job status polls
    pub poll_interval_secs: u64,
    /// Default prompt template path (CLI may override)
    pub prompt_template: PathBuf,
    /// Field whose emptiness disqualifies a record from prompting
    pub source_field: String,
    /// Fields projected into each prompt, in order
    pub projected_fields: Vec<String>,
    /// Fields whose string values get `\/` unescaped during cleanup
    pub url_fields: Vec<String>,
    /// Fields coerced from numeric-looking strings to numbers
    pub price_fields: Vec<String>,
    /// Columns dropped from the input before prompting
    pub drop_columns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: "gpt-3.5-turbo-0125".to_string(),
            temperature: 0.2,
            top_p: 0.1,
            max_tokens: 1000,
            endpoint: "/v1/chat/completions".to_string(),
            completion_window: "24h".to_string(),
            metadata: HashMap::from([(
                "description".to_string(),
                "promo price extraction".to_string(),
            )]),
            poll_interval_secs: 30,
            prompt_template: PathBuf::from("prompt.txt"),
            source_field: "promo_description".to_string(),
            projected_fields: vec![
                "id".to_string(),
                "regular_price".to_string(),
                "sale_price".to_string(),
                "promo_description".to_string(),
                "promo_price".to_string(),
                "unit_price".to_string(),
                "upc".to_string(),
            ],
            url_fields: vec![
                "store_logo".to_string(),
                "url".to_string(),
                "image_url".to_string(),
            ],
            price_fields: vec![
                "regular_price".to_string(),
                "sale_price".to_string(),
                "promo_price".to_string(),
                "unit_price".to_string(),
            ],
            drop_columns: vec![
                "coupon_short_description".to_string(),
                "coupon_description".to_string(),
            ],
        }
    }
}

impl Config {
    /// Build a configuration from the environment
    ///
    /// Reads `OPENAI_API_KEY` (required) and `OPENAI_API_BASE` (optional),
    /// loading a `.env` file first when one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| PipelineError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let mut config = Self {
            api_key,
            ..Self::default()
        };
        if let Ok(api_base) = std::env::var("OPENAI_API_BASE") {
            config.api_base = api_base;
        }
        Ok(config)
    }

    /// Wait between job status polls
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

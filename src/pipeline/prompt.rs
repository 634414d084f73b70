//! Prompt construction
//!
//! Projects each keyed record into one batch request. Records whose promo
//! description is blank cannot produce a useful prompt; they are logged and
//! set aside, and the reconciler later passes them through to the output
//! untouched.
//!
//! Correlation design: every request gets a fresh `custom_id`, but the
//! record's own `id` is embedded in the projected payload and the model is
//! instructed to echo it, so responses correlate back to records without a
//! side table.

use serde_json::json;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::core::batch::BatchItem;
use crate::core::record::Record;
use crate::utils::error::{PipelineError, Result};

/// Placeholder the template must contain exactly once
pub const INPUT_PLACEHOLDER: &str = "{INPUT}";

/// System instruction sent with every request
const SYSTEM_PROMPT: &str = "You are an expert at calculating the price details of products. \
    Your expertise in analyzing the promo description and calculation of the price is exceptional.";

/// The requests for one batch plus the keyed snapshot they were built from
#[derive(Debug)]
pub struct PromptBatch {
    /// One request per promptable record
    pub items: Vec<BatchItem>,
    /// Every input record, promptable or not, in original order
    pub snapshot: Vec<Record>,
    /// Ids of records skipped for a blank source field
    pub skipped: Vec<String>,
}

/// Builds batch requests from keyed records and a prompt template
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
    config: Config,
}

impl PromptBuilder {
    /// Load the template from a file and validate its placeholder
    pub fn from_template_file(path: &Path, config: &Config) -> Result<Self> {
        let template = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "cannot read prompt template {}: {e}",
                path.display()
            ))
        })?;
        Self::new(template, config)
    }

    /// Build from an in-memory template
    pub fn new(template: String, config: &Config) -> Result<Self> {
        if !template.contains(INPUT_PLACEHOLDER) {
            return Err(PipelineError::Config(format!(
                "prompt template has no {INPUT_PLACEHOLDER} placeholder"
            )));
        }
        Ok(Self {
            template,
            config: config.clone(),
        })
    }

    /// Build one request per promptable record
    ///
    /// Consumes the record set and returns it as the batch snapshot so the
    /// reconciler works from the exact data that was prompted.
    pub fn build(&self, records: Vec<Record>) -> Result<PromptBatch> {
        let mut items = Vec::with_capacity(records.len());
        let mut skipped = Vec::new();

        for record in &records {
            let id = record.id()?.to_string();
            if record.is_blank(&self.config.source_field) {
                warn!(
                    record_id = %id,
                    field = %self.config.source_field,
                    "no description found for record; it will pass through unprompted"
                );
                skipped.push(id);
                continue;
            }
            items.push(self.render_item(record)?);
        }

        info!(
            prompts = items.len(),
            skipped = skipped.len(),
            "generated batch prompts"
        );
        Ok(PromptBatch {
            items,
            snapshot: records,
            skipped,
        })
    }

    fn render_item(&self, record: &Record) -> Result<BatchItem> {
        // Compact projection of just the fields the task needs, id included
        let projected: Record = self
            .config
            .projected_fields
            .iter()
            .filter_map(|field| {
                record
                    .get(field)
                    .map(|value| (field.clone(), value.clone()))
            })
            .collect();

        let input = serde_json::to_string(&projected)?;
        let content = self.template.replace(INPUT_PLACEHOLDER, &input);

        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": content},
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
        });

        Ok(BatchItem {
            custom_id: Uuid::new_v4().to_string(),
            method: "POST".to_string(),
            url: self.config.endpoint.clone(),
            body,
        })
    }
}

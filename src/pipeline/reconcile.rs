//! Response reconciliation
//!
//! Fetches the completed job's result payload, parses each response item,
//! merges parsed fields back onto the original records by `id`, normalizes
//! known fields, and deduplicates. Per-item problems never abort the run:
//! the affected record passes through unmodified and the problem is logged
//! and counted.

use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, error, info, warn};

use crate::client::BatchService;
use crate::config::Config;
use crate::core::batch::{BatchItemResult, BatchJob};
use crate::core::record::{Record, ID_FIELD};
use crate::utils::error::{PipelineError, Result};

/// Per-item problem counters for the run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Items the service flagged with a per-item error
    pub remote_item_errors: usize,
    /// Items whose response text failed structured parsing
    pub parse_failures: usize,
    /// Parsed items whose id matched no known record
    pub missing_correlations: usize,
    /// Items where cleanup heuristics rewrote the text (audit aid)
    pub cleanup_flagged: usize,
    /// Exact duplicate rows removed from the final table
    pub duplicates_removed: usize,
}

/// Result of reconciliation: the output table plus its problem counters
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// Final deduplicated table, one row per surviving input record
    pub table: Vec<Record>,
    /// Problem counters
    pub stats: ReconcileStats,
}

/// Merges batch responses back onto the original records
pub struct Reconciler<'a> {
    config: &'a Config,
}

/// Result text after heuristic cleanup
struct CleanedText {
    text: String,
    changed: bool,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler over the given configuration
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Fetch the job's result payload and reconcile it with the snapshot
    ///
    /// Transport failure while fetching is fatal; everything after that is
    /// per-item recoverable.
    pub async fn run<S: BatchService + ?Sized>(
        &self,
        service: &S,
        job: &BatchJob,
        snapshot: Vec<Record>,
    ) -> Result<ReconcileOutcome> {
        let output_file_id = job
            .output_file_id
            .as_deref()
            .ok_or_else(|| PipelineError::MissingOutputFile(job.id.clone()))?;
        let payload = service.file_content(output_file_id).await?;
        info!(
            job_id = %job.id,
            bytes = payload.len(),
            "fetched batch result payload"
        );
        Ok(self.reconcile(&payload, snapshot))
    }

    /// Reconcile a raw JSONL result payload with the keyed snapshot
    pub fn reconcile(&self, payload: &[u8], snapshot: Vec<Record>) -> ReconcileOutcome {
        let mut stats = ReconcileStats::default();

        let known_ids: HashSet<String> = snapshot
            .iter()
            .filter_map(|r| r.str_field(ID_FIELD).map(str::to_string))
            .collect();

        let parsed_by_id = self.parse_items(payload, &known_ids, &mut stats);
        let table = merge(snapshot, parsed_by_id);
        let table = self.clean(table);
        let table = dedup(table, &mut stats);

        info!(
            rows = table.len(),
            remote_item_errors = stats.remote_item_errors,
            parse_failures = stats.parse_failures,
            missing_correlations = stats.missing_correlations,
            cleanup_flagged = stats.cleanup_flagged,
            duplicates_removed = stats.duplicates_removed,
            "reconciliation finished"
        );
        ReconcileOutcome { table, stats }
    }

    /// Parse every response line into a record keyed by the original `id`
    fn parse_items(
        &self,
        payload: &[u8],
        known_ids: &HashSet<String>,
        stats: &mut ReconcileStats,
    ) -> HashMap<String, Record> {
        let text = String::from_utf8_lossy(payload);
        let mut parsed_by_id = HashMap::new();

        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let item: BatchItemResult = match serde_json::from_str(line) {
                Ok(item) => item,
                Err(e) => {
                    error!(error = %e, line, "unparseable result line; skipping");
                    stats.parse_failures += 1;
                    continue;
                }
            };

            if let Some(err) = &item.error {
                warn!(
                    custom_id = %item.custom_id,
                    code = err.code.as_deref().unwrap_or("unknown"),
                    message = err.message.as_deref().unwrap_or(""),
                    "service flagged batch item with an error"
                );
                stats.remote_item_errors += 1;
                continue;
            }

            let Some(response) = &item.response else {
                warn!(custom_id = %item.custom_id, "item carries neither response nor error");
                stats.remote_item_errors += 1;
                continue;
            };

            let Some(content) = response
                .body
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
            else {
                warn!(custom_id = %item.custom_id, "response body has no message content");
                stats.parse_failures += 1;
                continue;
            };

            let cleaned = clean_response_text(content);
            if cleaned.changed {
                debug!(
                    custom_id = %item.custom_id,
                    "cleanup heuristics rewrote the response text"
                );
                stats.cleanup_flagged += 1;
            }

            let parsed: Record = match serde_json::from_str(&cleaned.text) {
                Ok(parsed) => parsed,
                Err(e) => {
                    error!(
                        custom_id = %item.custom_id,
                        raw = content,
                        error = %e,
                        "failed to parse response text as JSON"
                    );
                    stats.parse_failures += 1;
                    continue;
                }
            };

            let Some(id) = parsed.str_field(ID_FIELD).map(str::to_string) else {
                warn!(custom_id = %item.custom_id, "parsed response carries no id; discarding");
                stats.missing_correlations += 1;
                continue;
            };
            if !known_ids.contains(&id) {
                warn!(
                    custom_id = %item.custom_id,
                    record_id = %id,
                    "parsed response matches no known record; discarding"
                );
                stats.missing_correlations += 1;
                continue;
            }
            parsed_by_id.insert(id, parsed);
        }

        parsed_by_id
    }

    /// Normalize known URL fields and coerce known price fields
    fn clean(&self, mut table: Vec<Record>) -> Vec<Record> {
        for record in &mut table {
            for field in &self.config.url_fields {
                if let Some(Value::String(s)) = record.get(field) {
                    let unescaped = s.replace("\\/", "/");
                    record.insert(field.clone(), Value::String(unescaped));
                }
            }
            for field in &self.config.price_fields {
                let text = match record.get(field) {
                    Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                    _ => continue,
                };
                match text.parse::<f64>().ok().and_then(Number::from_f64) {
                    Some(number) => {
                        record.insert(field.clone(), Value::Number(number));
                    }
                    None => {
                        debug!(field = %field, value = %text, "price field is not numeric; left as text");
                    }
                }
            }
        }
        table
    }
}

/// Merge parsed records onto the snapshot by `id`; parsed fields win
///
/// Records without a parsed counterpart pass through unchanged, so the
/// output row count tracks the input.
fn merge(snapshot: Vec<Record>, mut parsed_by_id: HashMap<String, Record>) -> Vec<Record> {
    let mut table = Vec::with_capacity(snapshot.len());
    for mut record in snapshot {
        let id = record.str_field(ID_FIELD).map(str::to_string);
        if let Some(parsed) = id.and_then(|id| parsed_by_id.remove(&id)) {
            record.merge_from(parsed);
        }
        table.push(record);
    }
    table
}

/// Remove exact full-row duplicates, first occurrence wins
///
/// The key sorts fields by name first, so rows that are equal as maps are
/// duplicates even when their fields were encountered in different orders.
fn dedup(table: Vec<Record>, stats: &mut ReconcileStats) -> Vec<Record> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(table.len());
    for record in table {
        match dedup_key(&record) {
            Some(key) => {
                if seen.insert(key) {
                    out.push(record);
                } else {
                    stats.duplicates_removed += 1;
                }
            }
            // unserializable rows cannot be compared; keep them
            None => out.push(record),
        }
    }
    out
}

fn dedup_key(record: &Record) -> Option<String> {
    let sorted: BTreeMap<&String, &Value> = record.iter().collect();
    serde_json::to_string(&sorted).ok()
}

/// Strip known non-semantic wrapping from model output before parsing
///
/// This is a documented heuristic tuned to one model's formatting quirks
/// (code fences, smart quotes, literal ellipses), not a guaranteed-correct
/// normalization; items it touches are counted so operators can audit them.
fn clean_response_text(raw: &str) -> CleanedText {
    let mut text = raw.trim().to_string();
    for (from, to) in [
        ("```json", ""),
        ("```", ""),
        ("\u{201c}", "\""),
        ("\u{201d}", "\""),
        ("\u{2018}", "'"),
        ("\u{2019}", "'"),
        ("...", ","),
    ] {
        text = text.replace(from, to);
    }
    text.retain(|c| !c.is_control() || c == '\n' || c == '\t');
    let text = text.trim().to_string();
    CleanedText {
        changed: text != raw.trim(),
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: &[(&str, Value)]) -> Record {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn result_line(custom_id: &str, content: &str) -> String {
        json!({
            "custom_id": custom_id,
            "response": {
                "status_code": 200,
                "body": {"choices": [{"message": {"role": "assistant", "content": content}}]}
            },
            "error": null
        })
        .to_string()
    }

    fn reconcile(payload: &str, snapshot: Vec<Record>) -> ReconcileOutcome {
        let config = Config::default();
        Reconciler::new(&config).reconcile(payload.as_bytes(), snapshot)
    }

    // ==================== Cleanup heuristics ====================

    #[test]
    fn cleanup_strips_code_fences() {
        let cleaned = clean_response_text("```json\n{\"id\": \"1\"}\n```");
        assert_eq!(cleaned.text, "{\"id\": \"1\"}");
        assert!(cleaned.changed);
    }

    #[test]
    fn cleanup_normalizes_smart_quotes_and_ellipses() {
        let cleaned = clean_response_text("{\u{201c}id\u{201d}: \u{201c}1\u{201d}...\"x\": 2}");
        assert_eq!(cleaned.text, "{\"id\": \"1\",\"x\": 2}");
        assert!(cleaned.changed);
    }

    #[test]
    fn cleanup_leaves_plain_json_untouched() {
        let cleaned = clean_response_text("{\"id\": \"1\"}");
        assert_eq!(cleaned.text, "{\"id\": \"1\"}");
        assert!(!cleaned.changed);
    }

    // ==================== Merge and pass-through ====================

    #[test]
    fn merge_precedence_parsed_fields_win() {
        let snapshot = vec![record(&[
            ("id", json!("2")),
            ("sale_price", json!("3.99")),
        ])];
        let payload = result_line("tok", r#"{"id": "2", "sale_price": 3.99, "promo_price": 1.99}"#);

        let outcome = reconcile(&payload, snapshot);

        assert_eq!(
            outcome.table[0],
            record(&[
                ("id", json!("2")),
                ("sale_price", json!(3.99)),
                ("promo_price", json!(1.99)),
            ])
        );
    }

    #[test]
    fn every_input_record_survives_reconciliation() {
        // record 1 was skipped pre-submission (blank description), record 2 prompted
        let snapshot = vec![
            record(&[("id", json!("1")), ("promo_description", json!(""))]),
            record(&[
                ("id", json!("2")),
                ("promo_description", json!("buy 2 get 1 free")),
            ]),
        ];
        let payload = result_line("tok", r#"{"id": "2", "promo_price": 5.0}"#);

        let outcome = reconcile(&payload, snapshot);

        assert_eq!(outcome.table.len(), 2);
        assert_eq!(
            outcome.table[0],
            record(&[("id", json!("1")), ("promo_description", json!(""))])
        );
        assert_eq!(outcome.table[1].get("promo_price"), Some(&json!(5.0)));
    }

    #[test]
    fn malformed_response_text_passes_record_through() {
        let snapshot = vec![record(&[
            ("id", json!("1")),
            ("promo_description", json!("deal")),
        ])];
        let payload = result_line("tok", "this is not json at all");

        let outcome = reconcile(&payload, snapshot.clone());

        assert_eq!(outcome.stats.parse_failures, 1);
        assert_eq!(outcome.table, snapshot);
    }

    #[test]
    fn remote_item_error_is_counted_not_fatal() {
        let snapshot = vec![record(&[("id", json!("1"))])];
        let payload = json!({
            "custom_id": "tok",
            "error": {"code": "server_error", "message": "boom"}
        })
        .to_string();

        let outcome = reconcile(&payload, snapshot.clone());

        assert_eq!(outcome.stats.remote_item_errors, 1);
        assert_eq!(outcome.table, snapshot);
    }

    #[test]
    fn unknown_or_missing_id_is_a_missing_correlation() {
        let snapshot = vec![record(&[("id", json!("1"))])];
        let payload = format!(
            "{}\n{}",
            result_line("tok-1", r#"{"promo_price": 1.0}"#),
            result_line("tok-2", r#"{"id": "nope", "promo_price": 2.0}"#),
        );

        let outcome = reconcile(&payload, snapshot.clone());

        assert_eq!(outcome.stats.missing_correlations, 2);
        assert_eq!(outcome.table, snapshot);
    }

    #[test]
    fn fenced_response_is_flagged_but_still_merged() {
        let snapshot = vec![record(&[("id", json!("1"))])];
        let payload = result_line("tok", "```json\n{\"id\": \"1\", \"promo_price\": 2.5}\n```");

        let outcome = reconcile(&payload, snapshot);

        assert_eq!(outcome.stats.cleanup_flagged, 1);
        assert_eq!(outcome.table[0].get("promo_price"), Some(&json!(2.5)));
    }

    // ==================== Cleaning ====================

    #[test]
    fn url_fields_are_unescaped_and_prices_coerced() {
        let snapshot = vec![record(&[
            ("id", json!("1")),
            ("url", json!("https:\\/\\/shop.example\\/item")),
            ("sale_price", json!("3.99")),
            ("regular_price", json!(4.99)),
            ("promo_price", json!("")),
            ("unit_price", json!("n/a")),
        ])];

        let outcome = reconcile("", snapshot);
        let row = &outcome.table[0];

        assert_eq!(row.get("url"), Some(&json!("https://shop.example/item")));
        // non-empty price text becomes a number
        assert_eq!(row.get("sale_price"), Some(&json!(3.99)));
        // already-numeric and empty values are untouched
        assert_eq!(row.get("regular_price"), Some(&json!(4.99)));
        assert_eq!(row.get("promo_price"), Some(&json!("")));
        // non-numeric text is left as-is
        assert_eq!(row.get("unit_price"), Some(&json!("n/a")));
    }

    // ==================== Deduplication ====================

    #[test]
    fn dedup_removes_exact_duplicates_first_occurrence_wins() {
        let a = record(&[("id", json!("1")), ("name", json!("milk"))]);
        let b = record(&[("id", json!("2")), ("name", json!("eggs"))]);
        let snapshot = vec![a.clone(), b.clone(), a.clone()];

        let outcome = reconcile("", snapshot);

        assert_eq!(outcome.table, vec![a, b]);
        assert_eq!(outcome.stats.duplicates_removed, 1);
    }

    #[test]
    fn dedup_ignores_field_encounter_order() {
        let a = record(&[("id", json!("1")), ("name", json!("milk"))]);
        let a_reordered = record(&[("name", json!("milk")), ("id", json!("1"))]);
        assert_eq!(a, a_reordered);
        let mut stats = ReconcileStats::default();

        let out = dedup(vec![a.clone(), a_reordered], &mut stats);

        assert_eq!(out, vec![a]);
        assert_eq!(stats.duplicates_removed, 1);
    }

    #[test]
    fn dedup_is_idempotent() {
        let a = record(&[("id", json!("1"))]);
        let b = record(&[("id", json!("2"))]);
        let mut stats = ReconcileStats::default();

        let once = dedup(vec![a.clone(), b.clone(), a.clone()], &mut stats);
        let twice = dedup(once.clone(), &mut stats);

        assert_eq!(once, twice);
        assert_eq!(once, vec![a, b]);
    }

    // ==================== Payload envelope ====================

    #[test]
    fn unparseable_result_line_is_skipped() {
        let snapshot = vec![record(&[("id", json!("1"))])];
        let payload = format!(
            "not json\n{}",
            result_line("tok", r#"{"id": "1", "promo_price": 9.99}"#)
        );

        let outcome = reconcile(&payload, snapshot);

        assert_eq!(outcome.stats.parse_failures, 1);
        // the valid line still merged
        assert_eq!(outcome.table[0].get("promo_price"), Some(&json!(9.99)));
    }
}

//! Per-rule outcome accounting for one execution pass.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Success,
    /// The compiled query matched nothing. Not an error: many rules
    /// legitimately match nothing for a given dataset.
    SuccessNoResults,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReportRecord {
    pub row_id: usize,
    pub rule_expression: String,
    pub status: RuleStatus,
    pub error_message: Option<String>,
    pub elapsed_seconds: f64,
    pub rows_returned: usize,
}

/// Aggregate counters plus the ordered per-rule records of one pass.
///
/// Created by the executor at the start of a run, mutated only by it, and
/// handed read-only to the caller for logging/metrics export (it is
/// serde-serializable for exactly that purpose). Never persisted here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub total_rules: usize,
    pub total_success: usize,
    pub total_success_no_results: usize,
    pub total_failed: usize,
    pub total_elapsed_seconds: f64,
    pub records: Vec<ProcessingReportRecord>,
}

impl ProcessingReport {
    pub(crate) fn record(&mut self, record: ProcessingReportRecord) {
        self.total_rules += 1;
        self.total_elapsed_seconds += record.elapsed_seconds;
        match record.status {
            RuleStatus::Success => self.total_success += 1,
            RuleStatus::SuccessNoResults => self.total_success_no_results += 1,
            RuleStatus::Failed => self.total_failed += 1,
        }
        self.records.push(record);
    }
}

//! Print report types
//!
//! One [`PrintAttemptResult`] per (line, copy); the coordinator is the only
//! producer and results are never modified after they are recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::PrinterTarget;

/// Why a ticket was not printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No printer registered for the line's category
    NoTargetConfigured,
    /// Connection refused, unreachable host or timeout
    Unreachable,
    /// Device answered but reported failure
    DeviceRejected,
    /// Any other transport fault
    TransportError,
    /// The order print was canceled before this ticket completed
    Canceled,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::NoTargetConfigured => "no_target_configured",
            FailureKind::Unreachable => "unreachable",
            FailureKind::DeviceRejected => "device_rejected",
            FailureKind::TransportError => "transport_error",
            FailureKind::Canceled => "canceled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrintOutcome {
    Ok,
    Error { kind: FailureKind, message: String },
}

impl PrintOutcome {
    pub fn error(kind: FailureKind, message: impl Into<String>) -> Self {
        PrintOutcome::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, PrintOutcome::Ok)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PrintOutcome::Ok => None,
            PrintOutcome::Error { kind, .. } => Some(*kind),
        }
    }
}

/// Result of printing one copy of one order line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintAttemptResult {
    pub order_id: String,
    /// Position of the line in the order
    pub line_index: usize,
    pub item_id: String,
    pub item_name: String,
    pub category: String,
    /// 1-based
    pub copy_index: u32,
    pub copy_count: u32,
    /// `None` when routing failed
    pub target: Option<PrinterTarget>,
    pub outcome: PrintOutcome,
    /// Dispatch attempts made (0 when nothing was sent)
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

impl PrintAttemptResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Compact status for admin listings, e.g. `[food@10.0.0.5:9100 OK]`
    pub fn status_label(&self) -> String {
        let dest = match &self.target {
            Some(t) => format!("{}@{}", self.category, t),
            None => self.category.clone(),
        };
        let status = match &self.outcome {
            PrintOutcome::Ok => "OK".to_string(),
            PrintOutcome::Error { kind, .. } => format!("ERR {}", kind),
        };
        format!("[{} {}]", dest, status)
    }
}

/// Ordered results of printing one order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintReport {
    order_id: String,
    results: Vec<PrintAttemptResult>,
}

impl PrintReport {
    /// Build a report, ordering results by (line index, copy index)
    pub fn new(order_id: impl Into<String>, mut results: Vec<PrintAttemptResult>) -> Self {
        results.sort_by_key(|r| (r.line_index, r.copy_index));
        Self {
            order_id: order_id.into(),
            results,
        }
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn results(&self) -> &[PrintAttemptResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<PrintAttemptResult> {
        self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Every ticket printed
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(PrintAttemptResult::is_ok)
    }

    pub fn ok_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PrintAttemptResult> {
        self.results.iter().filter(|r| !r.is_ok())
    }

    pub fn count_by_kind(&self) -> BTreeMap<FailureKind, usize> {
        let mut counts = BTreeMap::new();
        for kind in self.results.iter().filter_map(|r| r.outcome.failure_kind()) {
            *counts.entry(kind).or_insert(0) += 1;
        }
        counts
    }

    /// Results for one item id, in copy order
    pub fn results_for_item<'a>(
        &'a self,
        item_id: &'a str,
    ) -> impl Iterator<Item = &'a PrintAttemptResult> + 'a {
        self.results.iter().filter(move |r| r.item_id == item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Protocol;

    fn result(line_index: usize, copy_index: u32, outcome: PrintOutcome) -> PrintAttemptResult {
        PrintAttemptResult {
            order_id: "o1".to_string(),
            line_index,
            item_id: format!("item-{}", line_index),
            item_name: "Chicken Rice".to_string(),
            category: "food".to_string(),
            copy_index,
            copy_count: 2,
            target: Some(PrinterTarget::new("food", "10.0.0.5", 9100, Protocol::RawEscpos)),
            outcome,
            attempts: 1,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_report_orders_results() {
        let report = PrintReport::new(
            "o1",
            vec![
                result(1, 1, PrintOutcome::Ok),
                result(0, 2, PrintOutcome::Ok),
                result(0, 1, PrintOutcome::Ok),
            ],
        );
        let order: Vec<_> = report
            .results()
            .iter()
            .map(|r| (r.line_index, r.copy_index))
            .collect();
        assert_eq!(order, vec![(0, 1), (0, 2), (1, 1)]);
        assert!(report.all_ok());
    }

    #[test]
    fn test_count_by_kind() {
        let report = PrintReport::new(
            "o1",
            vec![
                result(0, 1, PrintOutcome::Ok),
                result(0, 2, PrintOutcome::error(FailureKind::Unreachable, "refused")),
                result(1, 1, PrintOutcome::error(FailureKind::Unreachable, "refused")),
                result(1, 2, PrintOutcome::error(FailureKind::Canceled, "canceled")),
            ],
        );
        let counts = report.count_by_kind();
        assert_eq!(counts.get(&FailureKind::Unreachable), Some(&2));
        assert_eq!(counts.get(&FailureKind::Canceled), Some(&1));
        assert_eq!(report.ok_count(), 1);
        assert_eq!(report.failures().count(), 3);
        assert_eq!(report.results_for_item("item-1").count(), 2);
    }

    #[test]
    fn test_status_label() {
        let ok = result(0, 1, PrintOutcome::Ok);
        assert_eq!(ok.status_label(), "[food@10.0.0.5:9100 OK]");

        let mut missing = result(0, 1, PrintOutcome::error(FailureKind::NoTargetConfigured, "none"));
        missing.target = None;
        assert_eq!(missing.status_label(), "[food ERR no_target_configured]");
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(PrintOutcome::error(FailureKind::DeviceRejected, "cover open"))
            .unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "device_rejected");
        assert_eq!(json["message"], "cover open");

        let ok = serde_json::to_value(PrintOutcome::Ok).unwrap();
        assert_eq!(ok["status"], "ok");
    }
}

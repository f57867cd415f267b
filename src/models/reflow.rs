//! Reflow output model.
//!
//! One reflow pass produces a result per work order (in processing
//! order), a list of non-fatal warnings, and aggregate metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The computed schedule for a single work order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    /// Scheduled order identifier.
    pub work_order_id: String,
    /// Human-readable order number (pass-through).
    pub work_order_number: String,
    /// Original start (UTC).
    pub original_start: DateTime<Utc>,
    /// Original end (UTC).
    pub original_end: DateTime<Utc>,
    /// Newly computed start (UTC).
    pub new_start: DateTime<Utc>,
    /// Newly computed end (UTC).
    pub new_end: DateTime<Utc>,
    /// Whether either endpoint moved.
    pub was_rescheduled: bool,
    /// Whether the order was a fixed maintenance order.
    pub is_fixed: bool,
}

/// Aggregate counters for one reflow pass.
///
/// `processing_time_ms` is the only field permitted to vary between two
/// runs over identical input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflowMetadata {
    /// Number of orders in the input.
    pub total_orders: usize,
    /// Number of results with `was_rescheduled`.
    pub rescheduled_count: usize,
    /// Number of results with `is_fixed`.
    pub fixed_count: usize,
    /// Wall-clock duration of the reflow call.
    pub processing_time_ms: u64,
}

/// Complete output of one reflow pass.
///
/// Results are delivered in processing (topological) order, not input
/// order; consumers needing input-order access should re-index by id
/// via [`result_for`](ReflowOutput::result_for).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflowOutput {
    /// Per-order results in processing order.
    pub results: Vec<OrderResult>,
    /// Non-fatal warnings (delayed orders).
    pub warnings: Vec<String>,
    /// Aggregate counters.
    pub metadata: ReflowMetadata,
}

impl ReflowOutput {
    /// Finds the result for a given work order.
    pub fn result_for(&self, work_order_id: &str) -> Option<&OrderResult> {
        self.results
            .iter()
            .find(|r| r.work_order_id == work_order_id)
    }

    /// Results that were moved from their original interval.
    pub fn rescheduled(&self) -> impl Iterator<Item = &OrderResult> {
        self.results.iter().filter(|r| r.was_rescheduled)
    }

    /// Results pinned by a maintenance order.
    pub fn fixed(&self) -> impl Iterator<Item = &OrderResult> {
        self.results.iter().filter(|r| r.is_fixed)
    }
}

//! Scheduler error kinds.
//!
//! A single fatal error aborts the whole reflow; no per-order errors are
//! produced. Non-fatal conditions (delayed orders) surface as warnings on
//! the output instead.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Fatal errors produced by the scheduling core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// An order references a work center that was not supplied.
    #[error("work order '{work_order_id}' references unknown work center '{work_center_id}'")]
    MissingWorkCenter {
        work_order_id: String,
        work_center_id: String,
    },

    /// An order depends on an order id that was not supplied.
    #[error("work order '{work_order_id}' depends on unknown work order '{missing_dependency_id}'")]
    MissingDependency {
        work_order_id: String,
        missing_dependency_id: String,
    },

    /// The dependency graph contains a cycle. The witness list re-encounters
    /// its first id when read in order.
    #[error("circular dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// The calendar engine exhausted its search horizon without finding
    /// enough working time.
    #[error("no workable slot on work center '{work_center_id}' within {horizon_days} days of {from}")]
    NoWorkableSlot {
        work_center_id: String,
        from: DateTime<Utc>,
        horizon_days: i64,
    },
}

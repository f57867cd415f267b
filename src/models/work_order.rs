//! Work order model.
//!
//! A work order is a unit of production work to be placed on the schedule:
//! a required working duration on a single work center, an original
//! start/end interval, and the set of orders that must finish before it
//! can begin.
//!
//! # Time Representation
//! Start and end instants are UTC. Shift interpretation happens in the
//! scheduler's configured timezone; orders themselves carry no zone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A work order to be scheduled.
///
/// Maintenance orders (`is_maintenance == true`) are immovable: the
/// scheduler keeps their original interval and only records the machine
/// time they occupy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    /// Unique order identifier.
    pub id: String,
    /// Human-readable order number. Never used for scheduling logic.
    pub number: String,
    /// Target work center identifier.
    pub work_center_id: String,
    /// Original scheduled start (UTC).
    pub original_start: DateTime<Utc>,
    /// Original scheduled end (UTC).
    pub original_end: DateTime<Utc>,
    /// Required working duration in whole minutes.
    pub duration_minutes: i64,
    /// Whether this order is a fixed maintenance order.
    pub is_maintenance: bool,
    /// Identifiers of orders that must finish before this one starts.
    /// Declared as a list but treated as a set.
    pub depends_on: Vec<String>,
}

impl WorkOrder {
    /// Creates a new work order with the given identity and original interval.
    pub fn new(
        id: impl Into<String>,
        work_center_id: impl Into<String>,
        original_start: DateTime<Utc>,
        original_end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            number: String::new(),
            work_center_id: work_center_id.into(),
            original_start,
            original_end,
            duration_minutes: 0,
            is_maintenance: false,
            depends_on: Vec::new(),
        }
    }

    /// Sets the human-readable order number.
    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = number.into();
        self
    }

    /// Sets the required working duration (whole minutes).
    pub fn with_duration_minutes(mut self, minutes: i64) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Adds a dependency on another work order.
    pub fn with_dependency(mut self, order_id: impl Into<String>) -> Self {
        self.depends_on.push(order_id.into());
        self
    }

    /// Adds several dependencies at once.
    pub fn with_dependencies(
        mut self,
        order_ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        for id in order_ids {
            self.depends_on.push(id.into());
        }
        self
    }

    /// Marks this order as a fixed maintenance order.
    pub fn as_maintenance(mut self) -> Self {
        self.is_maintenance = true;
        self
    }

    /// Whether this order declares any dependencies.
    pub fn has_dependencies(&self) -> bool {
        !self.depends_on.is_empty()
    }
}

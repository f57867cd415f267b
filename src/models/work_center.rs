//! Work center and availability models.
//!
//! A work center is a machine or resource with a weekly shift calendar
//! and absolute-time maintenance windows.
//!
//! # Precedence
//! Maintenance windows override shifts. An instant is workable iff it
//! falls inside some shift (interpreted in the scheduler's timezone) AND
//! outside every maintenance window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recurring weekly shift.
///
/// Hours are local to the scheduler's configured timezone. When
/// `end_hour < start_hour` the shift wraps past midnight into the next
/// calendar day; `end_hour == start_hour` is a zero-length shift and
/// contributes no working minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDefinition {
    /// Day of week the shift starts on (0 = Sunday .. 6 = Saturday).
    pub day_of_week: u8,
    /// Local hour the shift starts (0..23).
    pub start_hour: u8,
    /// Local hour the shift ends (0..23).
    pub end_hour: u8,
}

impl ShiftDefinition {
    /// Creates a new shift definition.
    pub fn new(day_of_week: u8, start_hour: u8, end_hour: u8) -> Self {
        Self {
            day_of_week,
            start_hour,
            end_hour,
        }
    }

    /// Whether this shift wraps past midnight into the next day.
    #[inline]
    pub fn wraps_midnight(&self) -> bool {
        self.end_hour < self.start_hour
    }

    /// Whether this shift covers zero minutes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end_hour == self.start_hour
    }
}

/// An absolute-time interval `[start, end)` during which a work center
/// cannot run work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    /// Window start (UTC, inclusive).
    pub start: DateTime<Utc>,
    /// Window end (UTC, exclusive).
    pub end: DateTime<Utc>,
    /// Optional reason for display.
    pub reason: Option<String>,
}

impl MaintenanceWindow {
    /// Creates a new maintenance window.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            reason: None,
        }
    }

    /// Attaches a display reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Whether an instant falls within this window.
    #[inline]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }

    /// Whether this window overlaps the interval `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// A machine or resource with a shift calendar.
///
/// A work order runs on exactly one work center. Multiple shifts per day
/// are allowed and are treated as their union; overlapping maintenance
/// windows are likewise unioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkCenter {
    /// Unique work center identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Weekly shift calendar.
    pub shifts: Vec<ShiftDefinition>,
    /// Absolute-time maintenance windows.
    pub maintenance_windows: Vec<MaintenanceWindow>,
}

impl WorkCenter {
    /// Creates a work center with an empty calendar.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            shifts: Vec::new(),
            maintenance_windows: Vec::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a shift to the weekly calendar.
    pub fn with_shift(mut self, day_of_week: u8, start_hour: u8, end_hour: u8) -> Self {
        self.shifts
            .push(ShiftDefinition::new(day_of_week, start_hour, end_hour));
        self
    }

    /// Adds a maintenance window.
    pub fn with_maintenance(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.maintenance_windows
            .push(MaintenanceWindow::new(start, end));
        self
    }

    /// Shifts starting on the given day of week (0 = Sunday).
    pub fn shifts_on(&self, day_of_week: u8) -> impl Iterator<Item = &ShiftDefinition> {
        self.shifts
            .iter()
            .filter(move |s| s.day_of_week == day_of_week)
    }

    /// Whether an instant falls inside any maintenance window.
    pub fn in_maintenance(&self, t: DateTime<Utc>) -> bool {
        self.maintenance_windows.iter().any(|w| w.contains(t))
    }
}

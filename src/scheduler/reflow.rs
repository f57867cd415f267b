//! Deterministic reflow pass.
//!
//! # Algorithm
//!
//! 1. Assert every order's work center is known.
//! 2. Build the dependency graph and sort it topologically.
//! 3. Walk the sorted orders, tracking per-machine availability and
//!    per-order end times.
//! 4. For each order: fix maintenance orders in place; otherwise take the
//!    latest of its constraints, snap it to a valid shift instant, and
//!    walk the required working minutes through the calendar.
//!
//! # Complexity
//! O(V + E) for the graph plus one calendar walk per order.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::calendar;
use crate::error::SchedulerError;
use crate::graph::DependencyGraph;
use crate::models::{OrderResult, ReflowMetadata, ReflowOutput, WorkCenter, WorkOrder};

/// Per-call scheduling configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflowConfig {
    /// Permit a schedule earlier than the original start when upstream
    /// constraints allow it.
    pub allow_earlier_start: bool,
    /// Timezone governing all shift interpretation.
    pub timezone: Tz,
    /// Deterministic stand-in for "now", used only when
    /// `allow_earlier_start` is set and an order has no constraints at
    /// all. Falls back to the wall clock when absent.
    pub fallback_start: Option<DateTime<Utc>>,
}

impl Default for ReflowConfig {
    fn default() -> Self {
        Self {
            allow_earlier_start: false,
            timezone: chrono_tz::UTC,
            fallback_start: None,
        }
    }
}

impl ReflowConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Permits schedules earlier than the original start.
    pub fn with_allow_earlier_start(mut self, allow: bool) -> Self {
        self.allow_earlier_start = allow;
        self
    }

    /// Sets the shift-interpretation timezone.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Pins the "no constraints" fallback to a fixed instant.
    pub fn with_fallback_start(mut self, fallback: DateTime<Utc>) -> Self {
        self.fallback_start = Some(fallback);
        self
    }
}

/// Finite-capacity scheduler over an immutable work-center index.
///
/// A reflow call is a pure function of its arguments: the scheduler
/// holds no state between calls, and concurrent calls may share one
/// instance.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use reflow_scheduler::models::{WorkCenter, WorkOrder};
/// use reflow_scheduler::scheduler::ReflowScheduler;
///
/// // Monday 2024-01-15; shifts 09:00-17:00 on Monday and Tuesday.
/// let wc = WorkCenter::new("wc-1").with_shift(1, 9, 17).with_shift(2, 9, 17);
/// let order = WorkOrder::new(
///     "wo-1",
///     "wc-1",
///     Utc.with_ymd_and_hms(2024, 1, 15, 16, 0, 0).unwrap(),
///     Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap(),
/// )
/// .with_duration_minutes(120);
///
/// let scheduler = ReflowScheduler::new(vec![wc]);
/// let output = scheduler.reflow(&[order]).unwrap();
/// assert_eq!(
///     output.results[0].new_end,
///     Utc.with_ymd_and_hms(2024, 1, 16, 10, 0, 0).unwrap()
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ReflowScheduler {
    work_centers: HashMap<String, WorkCenter>,
    config: ReflowConfig,
}

impl ReflowScheduler {
    /// Creates a scheduler over the given work centers with the default
    /// configuration.
    pub fn new(work_centers: Vec<WorkCenter>) -> Self {
        Self {
            work_centers: work_centers
                .into_iter()
                .map(|wc| (wc.id.clone(), wc))
                .collect(),
            config: ReflowConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: ReflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Recomputes start/end times for every order.
    ///
    /// Results are returned in processing (topological) order. A single
    /// fatal error aborts the whole pass; delayed orders produce
    /// warnings instead.
    pub fn reflow(&self, orders: &[WorkOrder]) -> Result<ReflowOutput, SchedulerError> {
        let started = Instant::now();
        tracing::debug!(order_count = orders.len(), "starting reflow");

        for order in orders {
            if !self.work_centers.contains_key(&order.work_center_id) {
                return Err(SchedulerError::MissingWorkCenter {
                    work_order_id: order.id.clone(),
                    work_center_id: order.work_center_id.clone(),
                });
            }
        }

        let graph = DependencyGraph::build(orders)?;
        let sorted = graph.topological_sort()?;

        let tz = self.config.timezone;
        let mut machine_availability: HashMap<&str, DateTime<Utc>> = HashMap::new();
        let mut order_end: HashMap<&str, DateTime<Utc>> = HashMap::new();
        let mut results = Vec::with_capacity(sorted.len());
        let mut warnings = Vec::new();

        for order in sorted {
            let wc = self.work_centers.get(&order.work_center_id).ok_or_else(|| {
                SchedulerError::MissingWorkCenter {
                    work_order_id: order.id.clone(),
                    work_center_id: order.work_center_id.clone(),
                }
            })?;

            if order.is_maintenance {
                machine_availability
                    .entry(wc.id.as_str())
                    .and_modify(|free| {
                        if order.original_end > *free {
                            *free = order.original_end;
                        }
                    })
                    .or_insert(order.original_end);
                order_end.insert(order.id.as_str(), order.original_end);
                results.push(OrderResult {
                    work_order_id: order.id.clone(),
                    work_order_number: order.number.clone(),
                    original_start: order.original_start,
                    original_end: order.original_end,
                    new_start: order.original_start,
                    new_end: order.original_end,
                    was_rescheduled: false,
                    is_fixed: true,
                });
                continue;
            }

            let mut constraints: Vec<DateTime<Utc>> = Vec::new();
            if !self.config.allow_earlier_start {
                constraints.push(order.original_start);
            }
            if let Some(&free) = machine_availability.get(order.work_center_id.as_str()) {
                constraints.push(free);
            }
            for dep in &order.depends_on {
                // Recorded for every prerequisite: dependencies precede
                // their dependents in topological order.
                if let Some(&end) = order_end.get(dep.as_str()) {
                    constraints.push(end);
                }
            }
            let earliest = constraints
                .into_iter()
                .max()
                .unwrap_or_else(|| self.config.fallback_start.unwrap_or_else(Utc::now));

            let new_start = calendar::find_earliest_valid_start(earliest, wc, tz)?;
            let new_end =
                calendar::calculate_end_date_with_shifts(new_start, order.duration_minutes, wc, tz)?;

            machine_availability.insert(wc.id.as_str(), new_end);
            order_end.insert(order.id.as_str(), new_end);

            if new_start > order.original_start {
                let delay = (new_start - order.original_start).num_minutes();
                tracing::warn!(
                    work_order = %order.number,
                    delay_minutes = delay,
                    "work order delayed"
                );
                warnings.push(format!(
                    "Work order {} delayed by {} minutes",
                    order.number, delay
                ));
            }

            results.push(OrderResult {
                work_order_id: order.id.clone(),
                work_order_number: order.number.clone(),
                original_start: order.original_start,
                original_end: order.original_end,
                new_start,
                new_end,
                was_rescheduled: new_start != order.original_start
                    || new_end != order.original_end,
                is_fixed: false,
            });
        }

        let metadata = ReflowMetadata {
            total_orders: orders.len(),
            rescheduled_count: results.iter().filter(|r| r.was_rescheduled).count(),
            fixed_count: results.iter().filter(|r| r.is_fixed).count(),
            processing_time_ms: started.elapsed().as_millis() as u64,
        };
        tracing::debug!(
            total = metadata.total_orders,
            rescheduled = metadata.rescheduled_count,
            fixed = metadata.fixed_count,
            "reflow completed"
        );

        Ok(ReflowOutput {
            results,
            warnings,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, min, 0).unwrap()
    }

    /// Mon-Fri 09:00-17:00 UTC. 2024-01-15 is a Monday.
    fn weekday_center(id: &str) -> WorkCenter {
        let mut wc = WorkCenter::new(id);
        for dow in 1..=5 {
            wc = wc.with_shift(dow, 9, 17);
        }
        wc
    }

    fn order(id: &str, wc: &str, start: DateTime<Utc>, minutes: i64) -> WorkOrder {
        WorkOrder::new(id, wc, start, start + chrono::Duration::minutes(minutes))
            .with_number(id.to_uppercase())
            .with_duration_minutes(minutes)
    }

    fn scheduler(centers: Vec<WorkCenter>) -> ReflowScheduler {
        ReflowScheduler::new(centers)
    }

    #[test]
    fn test_shift_span() {
        // 120 minutes starting Monday 16:00 spill into Tuesday.
        let orders = vec![order("wo-1", "wc-1", utc(15, 16, 0), 120)];
        let output = scheduler(vec![weekday_center("wc-1")]).reflow(&orders).unwrap();

        let r = output.result_for("wo-1").unwrap();
        assert_eq!(r.new_start, utc(15, 16, 0));
        assert_eq!(r.new_end, utc(16, 10, 0));
        assert!(r.was_rescheduled); // end moved off the original
    }

    #[test]
    fn test_dependency_cascade() {
        // wo-b waits for wo-a to finish.
        let orders = vec![
            order("wo-a", "wc-1", utc(15, 10, 0), 120),
            order("wo-b", "wc-1", utc(15, 11, 0), 60).with_dependency("wo-a"),
        ];
        let output = scheduler(vec![weekday_center("wc-1")]).reflow(&orders).unwrap();

        let a = output.result_for("wo-a").unwrap();
        assert_eq!((a.new_start, a.new_end), (utc(15, 10, 0), utc(15, 12, 0)));
        let b = output.result_for("wo-b").unwrap();
        assert_eq!((b.new_start, b.new_end), (utc(15, 12, 0), utc(15, 13, 0)));
    }

    #[test]
    fn test_chain_across_machines() {
        // The dependency carries across work centers.
        let orders = vec![
            order("wo-a", "wc-1", utc(15, 9, 0), 120),
            order("wo-b", "wc-2", utc(15, 9, 0), 60).with_dependency("wo-a"),
        ];
        let output = scheduler(vec![weekday_center("wc-1"), weekday_center("wc-2")])
            .reflow(&orders)
            .unwrap();

        assert_eq!(output.result_for("wo-b").unwrap().new_start, utc(15, 11, 0));
    }

    #[test]
    fn test_maintenance_window_split() {
        // 3 hours of work around a 2-hour window.
        let wc = weekday_center("wc-1").with_maintenance(utc(15, 11, 0), utc(15, 13, 0));
        let orders = vec![order("wo-1", "wc-1", utc(15, 10, 0), 180)];
        let output = scheduler(vec![wc]).reflow(&orders).unwrap();

        let r = output.result_for("wo-1").unwrap();
        assert_eq!(r.new_start, utc(15, 10, 0));
        assert_eq!(r.new_end, utc(15, 15, 0));
    }

    #[test]
    fn test_same_machine_capacity() {
        // Two independent orders serialize on one machine.
        let orders = vec![
            order("wo-1", "wc-1", utc(15, 9, 0), 60),
            order("wo-2", "wc-1", utc(15, 9, 0), 60),
        ];
        let output = scheduler(vec![weekday_center("wc-1")]).reflow(&orders).unwrap();

        let mut starts: Vec<DateTime<Utc>> =
            output.results.iter().map(|r| r.new_start).collect();
        starts.sort();
        assert_eq!(starts, vec![utc(15, 9, 0), utc(15, 10, 0)]);
    }

    #[test]
    fn test_circular_dependency() {
        let orders = vec![
            order("wo-a", "wc-1", utc(15, 9, 0), 60).with_dependency("wo-c"),
            order("wo-b", "wc-1", utc(15, 9, 0), 60).with_dependency("wo-a"),
            order("wo-c", "wc-1", utc(15, 9, 0), 60).with_dependency("wo-b"),
        ];
        let err = scheduler(vec![weekday_center("wc-1")])
            .reflow(&orders)
            .unwrap_err();
        let SchedulerError::CircularDependency { cycle } = err else {
            panic!("expected CircularDependency, got {err:?}");
        };
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn test_missing_dependency() {
        let orders = vec![order("wo-a", "wc-1", utc(15, 9, 0), 60).with_dependency("wo-missing")];
        let err = scheduler(vec![weekday_center("wc-1")])
            .reflow(&orders)
            .unwrap_err();
        assert_eq!(
            err,
            SchedulerError::MissingDependency {
                work_order_id: "wo-a".into(),
                missing_dependency_id: "wo-missing".into(),
            }
        );
    }

    #[test]
    fn test_missing_work_center() {
        let orders = vec![order("wo-a", "wc-nope", utc(15, 9, 0), 60)];
        let err = scheduler(vec![weekday_center("wc-1")])
            .reflow(&orders)
            .unwrap_err();
        assert_eq!(
            err,
            SchedulerError::MissingWorkCenter {
                work_order_id: "wo-a".into(),
                work_center_id: "wc-nope".into(),
            }
        );
    }

    #[test]
    fn test_start_outside_any_shift() {
        // Sunday start snaps to Monday 09:00 and warns about the delay.
        let orders = vec![order("wo-1", "wc-1", utc(14, 10, 0), 60)];
        let output = scheduler(vec![weekday_center("wc-1")]).reflow(&orders).unwrap();

        let r = output.result_for("wo-1").unwrap();
        assert_eq!(r.new_start, utc(15, 9, 0));
        assert!(r.was_rescheduled);
        assert_eq!(
            output.warnings,
            vec!["Work order WO-1 delayed by 1380 minutes".to_string()]
        );
    }

    #[test]
    fn test_zero_duration() {
        // Snapped start, no span.
        let orders = vec![order("wo-1", "wc-1", utc(14, 10, 0), 0)];
        let output = scheduler(vec![weekday_center("wc-1")]).reflow(&orders).unwrap();

        let r = output.result_for("wo-1").unwrap();
        assert_eq!(r.new_start, utc(15, 9, 0));
        assert_eq!(r.new_end, r.new_start);
    }

    #[test]
    fn test_maintenance_order_is_fixed() {
        // Off-shift, overlapping nothing workable: stays exactly in place.
        let maintenance = order("mx-1", "wc-1", utc(14, 2, 0), 120).as_maintenance();
        let output = scheduler(vec![weekday_center("wc-1")])
            .reflow(&[maintenance])
            .unwrap();

        let r = output.result_for("mx-1").unwrap();
        assert_eq!(r.new_start, utc(14, 2, 0));
        assert_eq!(r.new_end, utc(14, 4, 0));
        assert!(r.is_fixed);
        assert!(!r.was_rescheduled);
        assert_eq!(output.metadata.fixed_count, 1);
    }

    #[test]
    fn test_maintenance_order_blocks_machine() {
        // A fixed order holds the machine until its original end.
        let orders = vec![
            order("mx-1", "wc-1", utc(15, 9, 0), 120).as_maintenance(),
            order("wo-1", "wc-1", utc(15, 9, 0), 60),
        ];
        let output = scheduler(vec![weekday_center("wc-1")]).reflow(&orders).unwrap();

        assert_eq!(output.result_for("wo-1").unwrap().new_start, utc(15, 11, 0));
    }

    #[test]
    fn test_dependent_of_maintenance_order() {
        let orders = vec![
            order("mx-1", "wc-1", utc(15, 9, 0), 60).as_maintenance(),
            order("wo-1", "wc-2", utc(15, 9, 0), 60).with_dependency("mx-1"),
        ];
        let output = scheduler(vec![weekday_center("wc-1"), weekday_center("wc-2")])
            .reflow(&orders)
            .unwrap();

        assert_eq!(output.result_for("wo-1").unwrap().new_start, utc(15, 10, 0));
    }

    #[test]
    fn test_results_in_topological_order() {
        let orders = vec![
            order("wo-c", "wc-1", utc(15, 9, 0), 30).with_dependency("wo-b"),
            order("wo-b", "wc-1", utc(15, 9, 0), 30).with_dependency("wo-a"),
            order("wo-a", "wc-1", utc(15, 9, 0), 30),
        ];
        let output = scheduler(vec![weekday_center("wc-1")]).reflow(&orders).unwrap();

        let ids: Vec<&str> = output.results.iter().map(|r| r.work_order_id.as_str()).collect();
        assert_eq!(ids, vec!["wo-a", "wo-b", "wo-c"]);
    }

    #[test]
    fn test_allow_earlier_start_with_fallback() {
        // No original-start floor, no machine history, no dependencies:
        // the pinned fallback decides, snapped to the next shift.
        let config = ReflowConfig::new()
            .with_allow_earlier_start(true)
            .with_fallback_start(utc(14, 0, 0));
        let orders = vec![order("wo-1", "wc-1", utc(17, 9, 0), 60)];
        let output = scheduler(vec![weekday_center("wc-1")])
            .with_config(config)
            .reflow(&orders)
            .unwrap();

        assert_eq!(output.result_for("wo-1").unwrap().new_start, utc(15, 9, 0));
    }

    #[test]
    fn test_deterministic_across_runs() {
        let wc = weekday_center("wc-1").with_maintenance(utc(15, 11, 0), utc(15, 12, 0));
        let orders = vec![
            order("wo-b", "wc-1", utc(15, 9, 0), 90),
            order("wo-a", "wc-1", utc(15, 9, 0), 45),
            order("wo-c", "wc-1", utc(15, 9, 30), 60).with_dependency("wo-a"),
        ];
        let sched = scheduler(vec![wc]);

        let first = sched.reflow(&orders).unwrap();
        let second = sched.reflow(&orders).unwrap();
        assert_eq!(first.results, second.results);
        assert_eq!(first.warnings, second.warnings);
    }

    #[test]
    fn test_no_overlap_on_same_machine() {
        let orders: Vec<WorkOrder> = (0..5)
            .map(|i| order(&format!("wo-{i}"), "wc-1", utc(15, 9, 0), 45))
            .collect();
        let output = scheduler(vec![weekday_center("wc-1")]).reflow(&orders).unwrap();

        let mut intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = output
            .results
            .iter()
            .map(|r| (r.new_start, r.new_end))
            .collect();
        intervals.sort();
        for pair in intervals.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlap between {pair:?}");
        }
    }

    #[test]
    fn test_metadata_counts() {
        let orders = vec![
            order("mx-1", "wc-1", utc(15, 9, 0), 60).as_maintenance(),
            order("wo-1", "wc-1", utc(15, 9, 0), 60),
            order("wo-2", "wc-1", utc(15, 10, 0), 60),
        ];
        let output = scheduler(vec![weekday_center("wc-1")]).reflow(&orders).unwrap();

        assert_eq!(output.metadata.total_orders, 3);
        assert_eq!(output.metadata.fixed_count, 1);
        // wo-1 is pushed behind the fixed order; wo-2 follows wo-1.
        assert_eq!(output.metadata.rescheduled_count, 2);
    }

    #[test]
    fn test_empty_input() {
        let output = scheduler(vec![weekday_center("wc-1")]).reflow(&[]).unwrap();
        assert!(output.results.is_empty());
        assert!(output.warnings.is_empty());
        assert_eq!(output.metadata.total_orders, 0);
    }
}

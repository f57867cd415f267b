//! Calendar engine: shift and maintenance arithmetic.
//!
//! Pure, stateless functions over an instant, a work center, and a
//! timezone. All shift interpretation happens in the configured timezone;
//! instants crossing the API are UTC.
//!
//! # Working Minutes
//!
//! The duration walker treats each working minute as a token spent only
//! inside shifts and outside maintenance windows; off-shift and
//! maintenance time is pure pass-through. An order's duration is the
//! number of tokens, never the span between its endpoints.
//!
//! # Horizons
//!
//! Searching for a valid start probes at most [`SLOT_SEARCH_DAYS`] of
//! candidate shifts; walking a duration gives up once the cursor moves
//! more than [`WALK_HORIZON_DAYS`] past the original start. Both failures
//! surface as [`SchedulerError::NoWorkableSlot`].

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::SchedulerError;
use crate::models::{MaintenanceWindow, WorkCenter};

/// Probe horizon for locating the next valid start (days).
pub const SLOT_SEARCH_DAYS: i64 = 30;

/// Search horizon for the duration walker (days past the original start).
pub const WALK_HORIZON_DAYS: i64 = 365;

/// A maximal contiguous interval where work can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkableSlot {
    /// Slot start (UTC); inside a shift, outside maintenance.
    pub start: DateTime<Utc>,
    /// Slot end (UTC): the merged shift end, or the first maintenance
    /// window after `start`, whichever comes first.
    pub end: DateTime<Utc>,
    /// Whole minutes between `start` and `end`.
    pub minutes: i64,
}

/// Resolves a local wall-clock hour on a date to a UTC instant.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant;
/// nonexistent local times (DST spring-forward gap) resolve to the first
/// valid time after the gap.
fn local_instant(date: NaiveDate, hour: u32, tz: Tz) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let naive = date.and_time(time);
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt.with_timezone(&Utc);
    }
    tz.from_local_datetime(&(naive + Duration::hours(1)))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Concrete shift intervals starting on the given local date, sorted by
/// start. A wrap-around shift extends into the next calendar day and
/// terminates at its declared end hour even when that day has no shifts
/// of its own. Zero-length shifts contribute nothing.
fn shift_intervals_for_day(
    wc: &WorkCenter,
    date: NaiveDate,
    tz: Tz,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let day_of_week = date.weekday().num_days_from_sunday() as u8;
    let mut intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = wc
        .shifts_on(day_of_week)
        .filter(|shift| !shift.is_empty())
        .map(|shift| {
            let start = local_instant(date, shift.start_hour as u32, tz);
            let end_date = if shift.wraps_midnight() {
                date + Duration::days(1)
            } else {
                date
            };
            (start, local_instant(end_date, shift.end_hour as u32, tz))
        })
        .filter(|(start, end)| end > start)
        .collect();
    intervals.sort_by_key(|(start, _)| *start);
    intervals
}

/// Whether `t` falls inside some shift of `wc` and outside every
/// maintenance window.
pub fn is_within_working_hours(t: DateTime<Utc>, wc: &WorkCenter, tz: Tz) -> bool {
    if wc.in_maintenance(t) {
        return false;
    }
    let local_date = t.with_timezone(&tz).date_naive();
    // The previous local day may contribute a wrap-around shift covering `t`.
    [local_date - Duration::days(1), local_date]
        .into_iter()
        .flat_map(|date| shift_intervals_for_day(wc, date, tz))
        .any(|(start, end)| t >= start && t < end)
}

/// Clips `[start, end)` by each maintenance window in turn.
///
/// A window that fully covers the interval removes it; one clipping the
/// left advances the start; one clipping the right retracts the end; one
/// strictly inside truncates at its start, keeping the left portion.
/// Returns the first non-empty portion, or `None`.
pub fn subtract_maintenance_windows(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    windows: &[MaintenanceWindow],
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let mut a = start;
    let mut b = end;
    for w in windows {
        if a >= b {
            return None;
        }
        if !w.overlaps(a, b) {
            continue;
        }
        if w.start <= a && w.end >= b {
            return None;
        }
        if w.start <= a {
            a = w.end;
        } else {
            b = w.start;
        }
    }
    (a < b).then_some((a, b))
}

/// Locates the smallest workable instant at or after `from`, probing
/// forward through at most [`SLOT_SEARCH_DAYS`] of candidate shifts.
fn probe_valid_start(from: DateTime<Utc>, wc: &WorkCenter, tz: Tz) -> Option<DateTime<Utc>> {
    if is_within_working_hours(from, wc, tz) {
        return Some(from);
    }
    let local_date = from.with_timezone(&tz).date_naive();
    // Offset -1 catches the remainder of a wrap-around shift from the
    // previous local day.
    for offset in -1..=SLOT_SEARCH_DAYS {
        let date = local_date + Duration::days(offset);
        for (start, end) in shift_intervals_for_day(wc, date, tz) {
            let candidate = start.max(from);
            if candidate >= end {
                continue;
            }
            if let Some((valid, _)) =
                subtract_maintenance_windows(candidate, end, &wc.maintenance_windows)
            {
                return Some(valid);
            }
        }
    }
    None
}

/// Returns the smallest instant `>= from` that is inside a shift and
/// outside every maintenance window.
///
/// # Errors
/// [`SchedulerError::NoWorkableSlot`] when [`SLOT_SEARCH_DAYS`] days of
/// candidates are exhausted.
pub fn find_earliest_valid_start(
    from: DateTime<Utc>,
    wc: &WorkCenter,
    tz: Tz,
) -> Result<DateTime<Utc>, SchedulerError> {
    probe_valid_start(from, wc, tz).ok_or_else(|| SchedulerError::NoWorkableSlot {
        work_center_id: wc.id.clone(),
        from,
        horizon_days: SLOT_SEARCH_DAYS,
    })
}

/// End of the contiguous run of shift time containing `start`.
///
/// Shifts that touch or overlap (including across midnight) merge into a
/// single run.
fn merged_shift_end(start: DateTime<Utc>, wc: &WorkCenter, tz: Tz) -> DateTime<Utc> {
    let start_date = start.with_timezone(&tz).date_naive();
    let limit = start_date + Duration::days(WALK_HORIZON_DAYS + 1);
    let mut date = start_date - Duration::days(1);
    let mut end: Option<DateTime<Utc>> = None;
    while date <= limit {
        for (s, e) in shift_intervals_for_day(wc, date, tz) {
            let extends = match end {
                None => s <= start && start < e,
                Some(cur) => s <= cur && e > cur,
            };
            if extends {
                end = Some(e);
            }
        }
        match end {
            // No interval on the start's own or previous day contains it.
            None if date > start_date => return start,
            // No interval on a later day can begin before its local midnight.
            Some(cur) if local_instant(date + Duration::days(1), 0, tz) > cur => return cur,
            _ => {}
        }
        date += Duration::days(1);
    }
    end.unwrap_or(start)
}

/// Returns the next maximal contiguous slot where work can occur, or
/// `None` when no valid start exists within [`SLOT_SEARCH_DAYS`].
pub fn find_next_workable_slot(
    from: DateTime<Utc>,
    wc: &WorkCenter,
    tz: Tz,
) -> Option<WorkableSlot> {
    let start = probe_valid_start(from, wc, tz)?;
    let shift_end = merged_shift_end(start, wc, tz);
    let end = wc
        .maintenance_windows
        .iter()
        .filter(|w| w.start > start)
        .map(|w| w.start)
        .min()
        .map_or(shift_end, |cut| cut.min(shift_end));
    Some(WorkableSlot {
        start,
        end,
        minutes: (end - start).num_minutes(),
    })
}

/// Advances `start` by `duration_minutes` working minutes, hopping
/// across shift gaps and maintenance windows.
///
/// A zero (or negative) duration returns `start` unchanged.
///
/// # Errors
/// [`SchedulerError::NoWorkableSlot`] when the search reaches a slot
/// more than [`WALK_HORIZON_DAYS`] past `start`, or no further slot
/// exists.
pub fn calculate_end_date_with_shifts(
    start: DateTime<Utc>,
    duration_minutes: i64,
    wc: &WorkCenter,
    tz: Tz,
) -> Result<DateTime<Utc>, SchedulerError> {
    if duration_minutes <= 0 {
        return Ok(start);
    }
    let horizon = start + Duration::days(WALK_HORIZON_DAYS);
    let mut remaining = duration_minutes;
    let mut cursor = start;
    loop {
        let slot =
            find_next_workable_slot(cursor, wc, tz).ok_or_else(|| SchedulerError::NoWorkableSlot {
                work_center_id: wc.id.clone(),
                from: cursor,
                horizon_days: SLOT_SEARCH_DAYS,
            })?;
        if slot.start > horizon {
            return Err(SchedulerError::NoWorkableSlot {
                work_center_id: wc.id.clone(),
                from: start,
                horizon_days: WALK_HORIZON_DAYS,
            });
        }
        if slot.minutes >= remaining {
            return Ok(slot.start + Duration::minutes(remaining));
        }
        remaining -= slot.minutes;
        cursor = slot.end;
    }
}

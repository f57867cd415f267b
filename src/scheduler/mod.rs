//! The reflow scheduler core.
//!
//! Drives a topologically ordered list of work orders through the
//! calendar engine while maintaining per-machine availability and
//! per-order end times.
//!
//! # Algorithm
//!
//! A single deterministic greedy pass: validate work centers, sort the
//! dependency graph, then for each order take the latest of its
//! constraints (original start, machine availability, dependency ends),
//! snap it into a shift, and walk the required working minutes forward.
//! Not a makespan optimizer; no backtracking, no alternative machines.

mod reflow;

pub use reflow::{ReflowConfig, ReflowScheduler};

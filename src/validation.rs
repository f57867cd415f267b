//! Dependency pre-flight diagnostics.
//!
//! A non-throwing check over a set of work orders that collects every
//! dependency problem at once: self-dependencies, references to unknown
//! orders, and cycles. Intended for diagnostics ahead of a reflow; the
//! reflow path itself does not call this and fails fast on the first
//! error it encounters.
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4

use std::collections::{HashMap, HashSet};

use crate::models::WorkOrder;

/// Pre-flight result: `Ok(())` or every detected issue.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A dependency diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of dependency diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// An order depends on itself.
    SelfDependency,
    /// An order depends on an order that doesn't exist.
    MissingDependency,
    /// The dependency graph contains a cycle.
    CircularDependency,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Collects all dependency problems in the given orders.
///
/// Checks:
/// 1. No order depends on itself
/// 2. Every dependency references a known order
/// 3. The dependency graph is acyclic
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_dependencies(orders: &[WorkOrder]) -> ValidationResult {
    let mut errors = Vec::new();

    let known: HashSet<&str> = orders.iter().map(|o| o.id.as_str()).collect();

    for order in orders {
        for dep in &order.depends_on {
            if dep == &order.id {
                errors.push(ValidationError::new(
                    ValidationErrorKind::SelfDependency,
                    format!("Work order '{}' depends on itself", order.id),
                ));
            } else if !known.contains(dep.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::MissingDependency,
                    format!(
                        "Work order '{}' depends on unknown work order '{}'",
                        order.id, dep
                    ),
                ));
            }
        }
    }

    if let Some(cycle_err) = detect_cycle(orders) {
        errors.push(cycle_err);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// DFS cycle detection over the prerequisite edges. A back-edge to a
/// node on the current recursion stack means a cycle.
fn detect_cycle(orders: &[WorkOrder]) -> Option<ValidationError> {
    let adj: HashMap<&str, Vec<&str>> = orders
        .iter()
        .map(|o| {
            (
                o.id.as_str(),
                o.depends_on
                    .iter()
                    .filter(|d| d.as_str() != o.id)
                    .map(String::as_str)
                    .collect(),
            )
        })
        .collect();

    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();

    for order in orders {
        let id = order.id.as_str();
        if !visited.contains(id) && has_cycle_dfs(id, &adj, &mut visited, &mut in_stack) {
            return Some(ValidationError::new(
                ValidationErrorKind::CircularDependency,
                format!("Circular dependency detected involving work order '{id}'"),
            ));
        }
    }

    None
}

fn has_cycle_dfs<'a>(
    node: &'a str,
    adj: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    in_stack: &mut HashSet<&'a str>,
) -> bool {
    visited.insert(node);
    in_stack.insert(node);

    if let Some(neighbors) = adj.get(node) {
        for &next in neighbors {
            if in_stack.contains(next) {
                return true; // Back edge
            }
            if !visited.contains(next) && has_cycle_dfs(next, adj, visited, in_stack) {
                return true;
            }
        }
    }

    in_stack.remove(node);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn utc(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, 0, 0).unwrap()
    }

    fn order(id: &str, deps: &[&str]) -> WorkOrder {
        WorkOrder::new(id, "wc-1", utc(9), utc(10))
            .with_duration_minutes(60)
            .with_dependencies(deps.iter().copied())
    }

    #[test]
    fn test_valid_input() {
        let orders = vec![order("wo-a", &[]), order("wo-b", &["wo-a"])];
        assert!(validate_dependencies(&orders).is_ok());
    }

    #[test]
    fn test_self_dependency() {
        let orders = vec![order("wo-a", &["wo-a"])];
        let errors = validate_dependencies(&orders).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::SelfDependency));
    }

    #[test]
    fn test_missing_dependency() {
        let orders = vec![order("wo-a", &["wo-missing"])];
        let errors = validate_dependencies(&orders).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::MissingDependency
                && e.message.contains("wo-missing")));
    }

    #[test]
    fn test_cycle() {
        let orders = vec![
            order("wo-a", &["wo-c"]),
            order("wo-b", &["wo-a"]),
            order("wo-c", &["wo-b"]),
        ];
        let errors = validate_dependencies(&orders).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::CircularDependency));
    }

    #[test]
    fn test_no_cycle_in_chain() {
        let orders = vec![
            order("wo-a", &[]),
            order("wo-b", &["wo-a"]),
            order("wo-c", &["wo-b"]),
        ];
        assert!(validate_dependencies(&orders).is_ok());
    }

    #[test]
    fn test_collects_multiple_errors() {
        let orders = vec![order("wo-a", &["wo-a"]), order("wo-b", &["wo-missing"])];
        let errors = validate_dependencies(&orders).unwrap_err();
        assert!(errors.len() >= 2);
    }
}

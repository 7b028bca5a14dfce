//! Set convergence for relational attributes
//!
//! Relational attributes (group memberships, NIC IP lists) use replace
//! semantics: the declared set is the full target. Convergence issues
//! the minimal add/remove calls from the symmetric difference instead
//! of clearing and recreating.

use std::collections::HashSet;

/// Minimal additions and removals turning an observed set into the
/// desired set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDelta {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl SetDelta {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Compute the symmetric difference between observed and desired sets.
///
/// Order of the returned lists follows the input order (desired for
/// additions, observed for removals) so call sequences stay stable.
pub fn set_delta(observed: &[String], desired: &[String]) -> SetDelta {
    let observed_set: HashSet<&str> = observed.iter().map(String::as_str).collect();
    let desired_set: HashSet<&str> = desired.iter().map(String::as_str).collect();

    let add = desired
        .iter()
        .filter(|d| !observed_set.contains(d.as_str()))
        .cloned()
        .collect();
    let remove = observed
        .iter()
        .filter(|o| !desired_set.contains(o.as_str()))
        .cloned()
        .collect();

    SetDelta { add, remove }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_minimal_convergence() {
        // {A, B} -> {B, C}: exactly one add and one remove
        let delta = set_delta(&ids(&["A", "B"]), &ids(&["B", "C"]));
        assert_eq!(delta.add, ids(&["C"]));
        assert_eq!(delta.remove, ids(&["A"]));
    }

    #[test]
    fn test_equal_sets_are_a_noop() {
        let delta = set_delta(&ids(&["A", "B"]), &ids(&["B", "A"]));
        assert!(delta.is_empty());
    }

    #[test]
    fn test_empty_target_removes_everything() {
        let delta = set_delta(&ids(&["A", "B"]), &[]);
        assert!(delta.add.is_empty());
        assert_eq!(delta.remove, ids(&["A", "B"]));
    }

    #[test]
    fn test_empty_observed_adds_everything() {
        let delta = set_delta(&[], &ids(&["A", "B"]));
        assert_eq!(delta.add, ids(&["A", "B"]));
        assert!(delta.remove.is_empty());
    }
}

//! Unordered-set matching.
//!
//! Exclusive matching looks for a perfect assignment of sub-matchers to
//! distinct elements. The search is a plain backtracking walk over the
//! candidate lists, visiting the most constrained sub-matcher first. Worst
//! case is exponential in the number of sub-matchers (`O(m!)` bindings for
//! `m` sub-matchers that all accept the same elements), which is fine for the
//! handful of entries a handler filter carries. Candidate lists are computed
//! once, so each sub-matcher runs at most once per element.

use serde_json::Value;

use super::Check;

/// Feasible element indices for each check. `None` if any check has none.
fn candidates(checks: &[Check], elements: &[Value]) -> Option<Vec<Vec<usize>>> {
    let mut lists = Vec::with_capacity(checks.len());
    for check in checks {
        let feasible: Vec<usize> = elements
            .iter()
            .enumerate()
            .filter(|&(_, element)| check(element))
            .map(|(index, _)| index)
            .collect();
        if feasible.is_empty() {
            return None;
        }
        lists.push(feasible);
    }
    Some(lists)
}

/// Every check is bound to its own element.
pub(crate) fn exclusive(checks: &[Check], elements: &[Value]) -> bool {
    if elements.len() < checks.len() {
        return false;
    }
    let Some(lists) = candidates(checks, elements) else {
        return false;
    };

    let mut order: Vec<usize> = (0..lists.len()).collect();
    order.sort_by_key(|&index| lists[index].len());

    let mut used = vec![false; elements.len()];
    assign(&order, &lists, &mut used)
}

fn assign(order: &[usize], lists: &[Vec<usize>], used: &mut [bool]) -> bool {
    let Some((&check, rest)) = order.split_first() else {
        return true;
    };
    for &element in &lists[check] {
        if used[element] {
            continue;
        }
        used[element] = true;
        if assign(rest, lists, used) {
            return true;
        }
        used[element] = false;
    }
    false
}

/// Every check is satisfied by some element; elements may be shared.
pub(crate) fn covering(checks: &[Check], elements: &[Value]) -> bool {
    checks
        .iter()
        .all(|check| elements.iter().any(|element| check(element)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn has(key: &'static str) -> Check {
        Arc::new(move |v: &Value| v.get(key).is_some())
    }

    #[test]
    fn reassignment_finds_perfect_binding() {
        let elements = vec![json!({"a": 1}), json!({"a": 1, "b": 1})];
        // "a" is listed first but must yield the dual element to "b".
        assert!(exclusive(&[has("a"), has("b")], &elements));
    }

    #[test]
    fn shared_element_is_not_enough() {
        let elements = vec![json!({"a": 1, "b": 1}), json!({"c": 1})];
        assert!(!exclusive(&[has("a"), has("b")], &elements));
        assert!(covering(&[has("a"), has("b")], &elements));
    }

    #[test]
    fn arity_is_checked_first() {
        let elements = vec![json!({"a": 1, "b": 1, "c": 1}), json!({"a": 1, "b": 1, "c": 1})];
        assert!(!exclusive(&[has("a"), has("b"), has("c")], &elements));
    }

    #[test]
    fn empty_checks_always_match() {
        assert!(exclusive(&[], &[]));
        assert!(covering(&[], &[json!(1)]));
    }
}

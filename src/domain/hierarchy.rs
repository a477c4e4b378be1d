//! Org hierarchy traversal.
//!
//! The manager graph is stored as parent pointers (`employees.manager_id`).
//! Descendant closure runs as a level-batched breadth-first expansion: the
//! caller fetches all children of the current frontier in one batch query
//! per level and feeds them back into [`Traversal`], so the storage call
//! count is bounded by tree depth, not node count. De-duplication by id
//! makes the walk terminate even on a corrupted (cyclic) graph.

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Level-by-level descendant expansion state.
///
/// Drive it with a child-fetch per level:
/// while `frontier()` is non-empty, look up all direct reports of the
/// frontier ids and pass them to `advance`.
pub struct Traversal {
    visited: HashSet<Uuid>,
    members: Vec<Uuid>,
    frontier: Vec<Uuid>,
    depth: u32,
    max_depth: Option<u32>,
}

impl Traversal {
    pub fn new(root: Uuid, max_depth: Option<u32>) -> Self {
        let mut visited = HashSet::new();
        visited.insert(root);
        Self {
            visited,
            members: Vec::new(),
            frontier: vec![root],
            depth: 0,
            max_depth,
        }
    }

    /// Ids whose direct reports should be fetched next, or an empty slice
    /// when the walk is finished.
    pub fn frontier(&self) -> &[Uuid] {
        if self.done() {
            &[]
        } else {
            &self.frontier
        }
    }

    pub fn done(&self) -> bool {
        self.frontier.is_empty() || self.max_depth.is_some_and(|max| self.depth >= max)
    }

    /// Consume one level of children. Already-seen ids are dropped, which
    /// keeps the walk finite even if the stored graph has a cycle.
    pub fn advance(&mut self, children: Vec<Uuid>) {
        let mut next = Vec::new();
        for child in children {
            if self.visited.insert(child) {
                self.members.push(child);
                next.push(child);
            }
        }
        self.frontier = next;
        self.depth += 1;
    }

    /// All descendants collected so far, in breadth-first order. The root
    /// itself is not a member of its own closure.
    pub fn into_members(self) -> Vec<Uuid> {
        self.members
    }
}

/// True when `ancestor` appears on `employee`'s manager chain. Walks parent
/// pointers with a visited set so a corrupted graph cannot loop forever.
pub fn is_ancestor(ancestor: Uuid, employee: Uuid, parents: &HashMap<Uuid, Uuid>) -> bool {
    let mut seen = HashSet::new();
    let mut current = employee;
    while let Some(&manager) = parents.get(&current) {
        if !seen.insert(manager) {
            return false;
        }
        if manager == ancestor {
            return true;
        }
        current = manager;
    }
    false
}

/// Would assigning `new_manager` as `employee`'s manager close a cycle?
/// A cycle forms exactly when the employee is itself, or already an
/// ancestor of, the proposed manager.
pub fn creates_cycle(employee: Uuid, new_manager: Uuid, parents: &HashMap<Uuid, Uuid>) -> bool {
    employee == new_manager || is_ancestor(employee, new_manager, parents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    /// In-memory stand-in for the per-level child-fetch query.
    fn run(children_of: &HashMap<Uuid, Vec<Uuid>>, root: Uuid, max_depth: Option<u32>) -> Vec<Uuid> {
        let mut traversal = Traversal::new(root, max_depth);
        while !traversal.done() {
            let mut level = Vec::new();
            for id in traversal.frontier() {
                if let Some(kids) = children_of.get(id) {
                    level.extend(kids.iter().copied());
                }
            }
            traversal.advance(level);
        }
        traversal.into_members()
    }

    /// Director -> Head1 -> Manager1 -> {Dev1, Dev2}
    fn sample_tree() -> HashMap<Uuid, Vec<Uuid>> {
        let mut tree = HashMap::new();
        tree.insert(id(1), vec![id(2)]); // director -> head1
        tree.insert(id(2), vec![id(3)]); // head1 -> manager1
        tree.insert(id(3), vec![id(4), id(5)]); // manager1 -> dev1, dev2
        tree
    }

    #[test]
    fn bounded_levels() {
        let tree = sample_tree();
        assert_eq!(run(&tree, id(2), Some(1)), vec![id(3)]);
        assert_eq!(run(&tree, id(2), Some(2)), vec![id(3), id(4), id(5)]);
    }

    #[test]
    fn unbounded_equals_union_over_depths() {
        let tree = sample_tree();
        let unbounded = run(&tree, id(1), None);
        let deep = run(&tree, id(1), Some(10));
        assert_eq!(unbounded, deep);
        assert_eq!(unbounded, vec![id(2), id(3), id(4), id(5)]);
    }

    #[test]
    fn bounded_closure_is_monotone_in_depth() {
        let tree = sample_tree();
        for k in 0..5 {
            let smaller = run(&tree, id(1), Some(k));
            let larger = run(&tree, id(1), Some(k + 1));
            assert!(smaller.iter().all(|m| larger.contains(m)), "level {k}");
        }
    }

    #[test]
    fn leaf_has_empty_closure() {
        let tree = sample_tree();
        assert!(run(&tree, id(4), None).is_empty());
    }

    #[test]
    fn zero_levels_yields_nothing() {
        let tree = sample_tree();
        assert!(run(&tree, id(1), Some(0)).is_empty());
    }

    #[test]
    fn cyclic_graph_terminates() {
        let mut tree = HashMap::new();
        tree.insert(id(1), vec![id(2)]);
        tree.insert(id(2), vec![id(1)]);
        assert_eq!(run(&tree, id(1), None), vec![id(2)]);
    }

    #[test]
    fn ancestor_chain() {
        let mut parents = HashMap::new();
        parents.insert(id(4), id(3));
        parents.insert(id(3), id(2));
        parents.insert(id(2), id(1));

        assert!(is_ancestor(id(3), id(4), &parents));
        assert!(is_ancestor(id(1), id(4), &parents));
        assert!(!is_ancestor(id(4), id(1), &parents));
        assert!(!is_ancestor(id(4), id(4), &parents));
    }

    #[test]
    fn ancestor_walk_survives_cycles() {
        let mut parents = HashMap::new();
        parents.insert(id(1), id(2));
        parents.insert(id(2), id(1));
        assert!(!is_ancestor(id(9), id(1), &parents));
    }

    #[test]
    fn cycle_detection_on_reassignment() {
        let mut parents = HashMap::new();
        parents.insert(id(3), id(2));
        parents.insert(id(2), id(1));

        // Employee may not manage itself, nor report to its own subordinate.
        assert!(creates_cycle(id(1), id(1), &parents));
        assert!(creates_cycle(id(1), id(3), &parents));
        assert!(creates_cycle(id(2), id(3), &parents));
        // Moving a leaf under a sibling branch is fine.
        assert!(!creates_cycle(id(3), id(1), &parents));
    }

    /// Two reassignments that are each fine against the starting map close
    /// a cycle together; the second must be validated against a map that
    /// already contains the first. The storage layer guarantees that order
    /// by serializing reassignments and re-reading the map per update.
    #[test]
    fn crossed_reassignments_fail_when_validated_in_sequence() {
        let mut parents = HashMap::new();
        assert!(!creates_cycle(id(1), id(2), &parents));
        assert!(!creates_cycle(id(2), id(1), &parents));

        parents.insert(id(1), id(2));
        assert!(creates_cycle(id(2), id(1), &parents));
    }
}

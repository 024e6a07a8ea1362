//! Read-side category tree.
//!
//! Built from `CategoryRecord`s by a projection; the expense engine consults
//! it to resolve references and to reject cyclic parent assignments before a
//! `ReassignCategoryParent` command is dispatched.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::category::CategoryId;

/// Flat read-model record for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub sort_order: u32,
    pub parent: Option<CategoryId>,
    pub active: bool,
}

/// Parent-linked forest over category records.
///
/// All walks carry a visited set: the write side rejects cycles, but the
/// tree must stay loop-free even over inconsistent input.
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    nodes: HashMap<CategoryId, CategoryRecord>,
}

impl CategoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = CategoryRecord>) -> Self {
        Self {
            nodes: records.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    pub fn insert(&mut self, record: CategoryRecord) {
        self.nodes.insert(record.id, record);
    }

    pub fn remove(&mut self, id: CategoryId) {
        self.nodes.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve a category reference, if it exists.
    pub fn resolve(&self, id: CategoryId) -> Option<&CategoryRecord> {
        self.nodes.get(&id)
    }

    /// Whether `candidate` is a (transitive) descendant of `ancestor`.
    pub fn is_descendant(&self, candidate: CategoryId, ancestor: CategoryId) -> bool {
        if candidate == ancestor {
            return false;
        }
        let mut seen = HashSet::new();
        let mut current = self.nodes.get(&candidate).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            if !seen.insert(id) {
                break;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Ancestors of `id`, root-first. Empty for roots and unknown ids.
    pub fn path(&self, id: CategoryId) -> Vec<CategoryId> {
        let mut ancestors = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(parent) = current {
            if !seen.insert(parent) {
                break;
            }
            ancestors.push(parent);
            current = self.nodes.get(&parent).and_then(|n| n.parent);
        }
        ancestors.reverse();
        ancestors
    }

    /// Whether moving `category` under `new_parent` would create a cycle
    /// (including self-parenting).
    pub fn would_create_cycle(&self, category: CategoryId, new_parent: CategoryId) -> bool {
        category == new_parent || self.is_descendant(new_parent, category)
    }

    /// Direct children of `parent`.
    pub fn children(&self, parent: CategoryId) -> Vec<&CategoryRecord> {
        let mut kids: Vec<&CategoryRecord> = self
            .nodes
            .values()
            .filter(|n| n.parent == Some(parent))
            .collect();
        kids.sort_by(|a, b| (a.sort_order, &a.name).cmp(&(b.sort_order, &b.name)));
        kids
    }

    /// Whether `parent` has any direct children.
    pub fn has_children(&self, parent: CategoryId) -> bool {
        self.nodes.values().any(|n| n.parent == Some(parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubledger_core::AggregateId;

    fn id() -> CategoryId {
        CategoryId::new(AggregateId::new())
    }

    fn record(id: CategoryId, name: &str, parent: Option<CategoryId>) -> CategoryRecord {
        CategoryRecord {
            id,
            name: name.to_string(),
            icon: "folder-outline".to_string(),
            color: "#6366f1".to_string(),
            sort_order: 0,
            parent,
            active: true,
        }
    }

    /// root → office → supplies, root → travel
    fn sample() -> (CategoryTree, CategoryId, CategoryId, CategoryId, CategoryId) {
        let root = id();
        let office = id();
        let supplies = id();
        let travel = id();
        let tree = CategoryTree::from_records(vec![
            record(root, "Operating", None),
            record(office, "Office", Some(root)),
            record(supplies, "Supplies", Some(office)),
            record(travel, "Travel", Some(root)),
        ]);
        (tree, root, office, supplies, travel)
    }

    #[test]
    fn resolve_finds_known_and_misses_unknown() {
        let (tree, root, ..) = sample();
        assert_eq!(tree.resolve(root).map(|r| r.name.as_str()), Some("Operating"));
        assert!(tree.resolve(id()).is_none());
    }

    #[test]
    fn is_descendant_walks_transitively() {
        let (tree, root, office, supplies, travel) = sample();
        assert!(tree.is_descendant(supplies, root));
        assert!(tree.is_descendant(supplies, office));
        assert!(tree.is_descendant(office, root));
        assert!(!tree.is_descendant(root, supplies));
        assert!(!tree.is_descendant(travel, office));
        // A node is not its own descendant.
        assert!(!tree.is_descendant(root, root));
    }

    #[test]
    fn path_is_root_first_ancestors() {
        let (tree, root, office, supplies, _) = sample();
        assert_eq!(tree.path(supplies), vec![root, office]);
        assert_eq!(tree.path(root), Vec::<CategoryId>::new());
    }

    #[test]
    fn would_create_cycle_detects_both_directions() {
        let (tree, root, office, supplies, travel) = sample();
        assert!(tree.would_create_cycle(root, supplies));
        assert!(tree.would_create_cycle(office, office));
        assert!(!tree.would_create_cycle(supplies, travel));
        assert!(!tree.would_create_cycle(travel, root));
    }

    #[test]
    fn walks_terminate_on_corrupt_cycles() {
        // Simulate an inconsistent read model: a ↔ b parent loop.
        let a = id();
        let b = id();
        let tree = CategoryTree::from_records(vec![
            record(a, "A", Some(b)),
            record(b, "B", Some(a)),
        ]);
        assert_eq!(tree.path(a).len(), 2);
        assert!(!tree.is_descendant(a, id()));
    }

    #[test]
    fn children_sorted_by_sort_order_then_name() {
        let root = id();
        let c1 = id();
        let c2 = id();
        let mut r1 = record(c1, "Zeta", Some(root));
        r1.sort_order = 0;
        let mut r2 = record(c2, "Alpha", Some(root));
        r2.sort_order = 0;
        let tree =
            CategoryTree::from_records(vec![record(root, "Root", None), r1, r2]);
        let names: Vec<&str> = tree.children(root).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
        assert!(tree.has_children(root));
        assert!(!tree.has_children(c1));
    }
}

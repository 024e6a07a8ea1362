//! Category tree read model.
//!
//! Maintains one [`CategoryTree`] per hub from category events. The engine
//! uses it to resolve expense category references, to reject cyclic parent
//! reassignments, and to find dependents before a deletion.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use hubledger_categories::{CategoryEvent, CategoryId, CategoryRecord, CategoryTree};
use hubledger_core::HubId;
use hubledger_events::EventEnvelope;

use crate::projections::{CursorAdvance, Cursors, ProjectionError};

pub(crate) const CATEGORY_AGGREGATE_TYPE: &str = "categories.category";

/// Category tree projection.
#[derive(Debug, Default)]
pub struct CategoryTreeProjection {
    trees: RwLock<HashMap<HubId, CategoryTree>>,
    cursors: Cursors,
}

impl CategoryTreeProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a hub's tree (empty tree for unknown hubs).
    pub fn tree(&self, hub_id: HubId) -> CategoryTree {
        self.trees
            .read()
            .ok()
            .and_then(|map| map.get(&hub_id).cloned())
            .unwrap_or_default()
    }

    pub fn resolve(&self, hub_id: HubId, category_id: CategoryId) -> Option<CategoryRecord> {
        self.trees
            .read()
            .ok()
            .and_then(|map| map.get(&hub_id).and_then(|t| t.resolve(category_id).cloned()))
    }

    /// Apply one stored-event envelope into the tree.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != CATEGORY_AGGREGATE_TYPE {
            return Ok(());
        }

        let hub_id = envelope.hub_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(hub_id, aggregate_id, seq)? {
            CursorAdvance::AlreadyApplied => return Ok(()),
            CursorAdvance::Fresh => {}
        }

        let ev: CategoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let mut trees = match self.trees.write() {
            Ok(trees) => trees,
            Err(poisoned) => poisoned.into_inner(),
        };
        let tree = trees.entry(hub_id).or_default();

        match ev {
            CategoryEvent::CategoryDefined(e) => {
                if e.hub_id != hub_id {
                    return Err(ProjectionError::HubIsolation(
                        "event hub_id does not match envelope hub_id".to_string(),
                    ));
                }
                tree.insert(CategoryRecord {
                    id: e.category_id,
                    name: e.name,
                    icon: e.icon,
                    color: e.color,
                    sort_order: e.sort_order,
                    parent: e.parent,
                    active: true,
                });
            }
            CategoryEvent::CategoryUpdated(e) => {
                if let Some(existing) = tree.resolve(e.category_id).cloned() {
                    tree.insert(CategoryRecord {
                        id: e.category_id,
                        name: e.name,
                        icon: e.icon,
                        color: e.color,
                        sort_order: e.sort_order,
                        parent: existing.parent,
                        active: e.active,
                    });
                }
            }
            CategoryEvent::CategoryParentReassigned(e) => {
                if let Some(mut existing) = tree.resolve(e.category_id).cloned() {
                    existing.parent = e.new_parent;
                    tree.insert(existing);
                }
            }
            CategoryEvent::CategoryDeleted(e) => {
                tree.remove(e.category_id);
            }
        }

        self.cursors.commit(hub_id, aggregate_id, seq);
        Ok(())
    }
}

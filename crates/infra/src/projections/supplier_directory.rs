//! Supplier directory read model.
//!
//! The engine validates expense supplier references against this directory:
//! a reference must resolve within the hub and the supplier must still be
//! active.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use hubledger_core::HubId;
use hubledger_events::EventEnvelope;
use hubledger_suppliers::{ContactInfo, SupplierEvent, SupplierId};

use crate::projections::{CursorAdvance, Cursors, ProjectionError};
use crate::read_model::HubStore;

pub(crate) const SUPPLIER_AGGREGATE_TYPE: &str = "suppliers.supplier";

/// Read model: one row per supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRecord {
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    pub tax_id: Option<String>,
    pub active: bool,
}

/// Supplier directory projection.
#[derive(Debug)]
pub struct SupplierDirectoryProjection<S>
where
    S: HubStore<SupplierId, SupplierRecord>,
{
    store: S,
    cursors: Cursors,
}

impl<S> SupplierDirectoryProjection<S>
where
    S: HubStore<SupplierId, SupplierRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, hub_id: HubId, supplier_id: &SupplierId) -> Option<SupplierRecord> {
        self.store.get(hub_id, supplier_id)
    }

    /// All suppliers for a hub, sorted by name.
    pub fn list(&self, hub_id: HubId) -> Vec<SupplierRecord> {
        let mut records = self.store.list(hub_id);
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Apply one stored-event envelope into the directory.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != SUPPLIER_AGGREGATE_TYPE {
            return Ok(());
        }

        let hub_id = envelope.hub_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(hub_id, aggregate_id, seq)? {
            CursorAdvance::AlreadyApplied => return Ok(()),
            CursorAdvance::Fresh => {}
        }

        let ev: SupplierEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            SupplierEvent::SupplierRegistered(e) => {
                if e.hub_id != hub_id {
                    return Err(ProjectionError::HubIsolation(
                        "event hub_id does not match envelope hub_id".to_string(),
                    ));
                }
                self.store.upsert(
                    hub_id,
                    e.supplier_id,
                    SupplierRecord {
                        supplier_id: e.supplier_id,
                        name: e.name,
                        contact: e.contact,
                        tax_id: e.tax_id,
                        active: true,
                    },
                );
            }
            SupplierEvent::SupplierUpdated(e) => {
                if let Some(mut record) = self.store.get(hub_id, &e.supplier_id) {
                    record.name = e.name;
                    record.contact = e.contact;
                    record.tax_id = e.tax_id;
                    self.store.upsert(hub_id, e.supplier_id, record);
                }
            }
            SupplierEvent::SupplierArchived(e) => {
                if let Some(mut record) = self.store.get(hub_id, &e.supplier_id) {
                    record.active = false;
                    self.store.upsert(hub_id, e.supplier_id, record);
                }
            }
        }

        self.cursors.commit(hub_id, aggregate_id, seq);
        Ok(())
    }
}

//! Supplier running totals.
//!
//! `total_spent` and `expense_count` are caches owned exclusively by the
//! expense engine's transition logic: the effect is applied exactly once per
//! expense lifetime when it reaches Approved, reversed and reapplied when an
//! approved/paid expense is financially amended, and never touched for
//! Draft, PendingApproval, or Rejected expenses.

use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use hubledger_core::HubId;
use hubledger_events::EventEnvelope;
use hubledger_expenses::ExpenseEvent;
use hubledger_suppliers::SupplierId;

use crate::projections::{CursorAdvance, Cursors, ProjectionError};
use crate::read_model::HubStore;

pub(crate) const EXPENSE_AGGREGATE_TYPE: &str = "expenses.expense";

/// Read model: per-supplier spend for a hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierSpend {
    pub supplier_id: SupplierId,
    /// Sum of gross totals of Approved/Paid expenses, minor units.
    pub total_spent: u64,
    pub expense_count: u32,
    pub last_expense_date: Option<NaiveDate>,
}

impl SupplierSpend {
    pub fn new(supplier_id: SupplierId) -> Self {
        Self {
            supplier_id,
            total_spent: 0,
            expense_count: 0,
            last_expense_date: None,
        }
    }
}

/// Supplier spend projection: aggregates gross totals per supplier.
///
/// Rebuildable from expense events. Hub-isolated. A single apply lock
/// serializes the read-modify-write per envelope, so concurrent approvals
/// against the same supplier cannot lose an update.
#[derive(Debug)]
pub struct SupplierSpendProjection<S>
where
    S: HubStore<SupplierId, SupplierSpend>,
{
    store: S,
    cursors: Cursors,
    apply_guard: Mutex<()>,
}

impl<S> SupplierSpendProjection<S>
where
    S: HubStore<SupplierId, SupplierSpend>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
            apply_guard: Mutex::new(()),
        }
    }

    /// Get spend for a specific supplier.
    pub fn get(&self, hub_id: HubId, supplier_id: &SupplierId) -> Option<SupplierSpend> {
        self.store.get(hub_id, supplier_id)
    }

    /// List all supplier spend records for a hub.
    pub fn list(&self, hub_id: HubId) -> Vec<SupplierSpend> {
        self.store.list(hub_id)
    }

    /// Apply one stored-event envelope into supplier spend.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != EXPENSE_AGGREGATE_TYPE {
            return Ok(());
        }

        let hub_id = envelope.hub_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let _guard = self
            .apply_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match self.cursors.check(hub_id, aggregate_id, seq)? {
            CursorAdvance::AlreadyApplied => return Ok(()),
            CursorAdvance::Fresh => {}
        }

        let ev: ExpenseEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let event_hub = match &ev {
            ExpenseEvent::ExpenseRecorded(e) => e.hub_id,
            ExpenseEvent::ExpenseSubmitted(e) => e.hub_id,
            ExpenseEvent::ExpenseApproved(e) => e.hub_id,
            ExpenseEvent::ExpenseRejected(e) => e.hub_id,
            ExpenseEvent::ExpensePaid(e) => e.hub_id,
            ExpenseEvent::ExpenseAmended(e) => e.hub_id,
            ExpenseEvent::ExpenseDetailsUpdated(e) => e.hub_id,
        };
        if event_hub != hub_id {
            return Err(ProjectionError::HubIsolation(
                "event hub_id does not match envelope hub_id".to_string(),
            ));
        }

        match ev {
            ExpenseEvent::ExpenseApproved(e) => {
                if let Some(supplier_id) = e.supplier_id {
                    self.credit(hub_id, supplier_id, e.total, Some(e.expense_date));
                }
            }
            ExpenseEvent::ExpenseAmended(e) if e.applies_supplier_effect => {
                if e.previous_supplier_id == e.supplier_id {
                    if let Some(supplier_id) = e.supplier_id {
                        let mut spend = self
                            .store
                            .get(hub_id, &supplier_id)
                            .unwrap_or_else(|| SupplierSpend::new(supplier_id));
                        spend.total_spent = spend
                            .total_spent
                            .saturating_sub(e.previous_total)
                            .saturating_add(e.total);
                        spend.last_expense_date =
                            spend.last_expense_date.max(Some(e.expense_date));
                        self.store.upsert(hub_id, supplier_id, spend);
                    }
                } else {
                    if let Some(previous) = e.previous_supplier_id {
                        self.debit(hub_id, previous, e.previous_total);
                    }
                    if let Some(supplier_id) = e.supplier_id {
                        self.credit(hub_id, supplier_id, e.total, Some(e.expense_date));
                    }
                }
            }
            // Recording, submission, rejection, payment, and detail edits
            // never move supplier totals.
            _ => {}
        }

        self.cursors.commit(hub_id, aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch for every hub in the input.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut hubs = envs.iter().map(|e| e.hub_id()).collect::<Vec<_>>();
            hubs.sort_by_key(|h| *h.as_uuid().as_bytes());
            hubs.dedup();
            for h in hubs {
                self.store.clear_hub(h);
                self.cursors.clear_hub(h);
            }
        }

        envs.sort_by_key(|e| {
            (
                *e.hub_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }

    fn credit(&self, hub_id: HubId, supplier_id: SupplierId, total: u64, date: Option<NaiveDate>) {
        let mut spend = self
            .store
            .get(hub_id, &supplier_id)
            .unwrap_or_else(|| SupplierSpend::new(supplier_id));
        spend.total_spent = spend.total_spent.saturating_add(total);
        spend.expense_count = spend.expense_count.saturating_add(1);
        spend.last_expense_date = spend.last_expense_date.max(date);
        self.store.upsert(hub_id, supplier_id, spend);
    }

    fn debit(&self, hub_id: HubId, supplier_id: SupplierId, total: u64) {
        let mut spend = self
            .store
            .get(hub_id, &supplier_id)
            .unwrap_or_else(|| SupplierSpend::new(supplier_id));
        spend.total_spent = spend.total_spent.saturating_sub(total);
        spend.expense_count = spend.expense_count.saturating_sub(1);
        self.store.upsert(hub_id, supplier_id, spend);
    }
}

//! Flat expense listing read model.
//!
//! Backs list/detail queries, number-uniqueness checks for manually
//! numbered hubs, and the category-deletion dependency check.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use hubledger_categories::CategoryId;
use hubledger_core::{HubId, TaxRate, UserId};
use hubledger_events::EventEnvelope;
use hubledger_expenses::{ExpenseEvent, ExpenseId, ExpenseStatus};
use hubledger_suppliers::SupplierId;

use crate::projections::supplier_spend::EXPENSE_AGGREGATE_TYPE;
use crate::projections::{CursorAdvance, Cursors, ProjectionError};
use crate::read_model::HubStore;

/// Read model: one row per expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub expense_id: ExpenseId,
    pub number: String,
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    pub amount: u64,
    pub tax_rate: TaxRate,
    pub tax_amount: u64,
    pub total: u64,
    pub expense_date: NaiveDate,
    pub status: ExpenseStatus,
    pub receipt_ref: Option<String>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub approved_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Expense index projection.
#[derive(Debug)]
pub struct ExpenseIndexProjection<S>
where
    S: HubStore<ExpenseId, ExpenseRecord>,
{
    store: S,
    cursors: Cursors,
}

impl<S> ExpenseIndexProjection<S>
where
    S: HubStore<ExpenseId, ExpenseRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(&self, hub_id: HubId, expense_id: &ExpenseId) -> Option<ExpenseRecord> {
        self.store.get(hub_id, expense_id)
    }

    /// All expenses for a hub, most recent expense date first.
    pub fn list(&self, hub_id: HubId) -> Vec<ExpenseRecord> {
        let mut records = self.store.list(hub_id);
        records.sort_by(|a, b| {
            (b.expense_date, b.created_at, b.number.clone()).cmp(&(
                a.expense_date,
                a.created_at,
                a.number.clone(),
            ))
        });
        records
    }

    pub fn list_by_status(&self, hub_id: HubId, status: ExpenseStatus) -> Vec<ExpenseRecord> {
        self.list(hub_id)
            .into_iter()
            .filter(|r| r.status == status)
            .collect()
    }

    /// Whether an expense number is already taken within the hub.
    pub fn number_exists(&self, hub_id: HubId, number: &str) -> bool {
        self.store.list(hub_id).iter().any(|r| r.number == number)
    }

    /// Whether any expense still references the category.
    pub fn references_category(&self, hub_id: HubId, category_id: CategoryId) -> bool {
        self.store
            .list(hub_id)
            .iter()
            .any(|r| r.category_id == Some(category_id))
    }

    /// Apply one stored-event envelope into the index.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != EXPENSE_AGGREGATE_TYPE {
            return Ok(());
        }

        let hub_id = envelope.hub_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(hub_id, aggregate_id, seq)? {
            CursorAdvance::AlreadyApplied => return Ok(()),
            CursorAdvance::Fresh => {}
        }

        let ev: ExpenseEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            ExpenseEvent::ExpenseRecorded(e) => {
                if e.hub_id != hub_id {
                    return Err(ProjectionError::HubIsolation(
                        "event hub_id does not match envelope hub_id".to_string(),
                    ));
                }
                let record = ExpenseRecord {
                    expense_id: e.expense_id,
                    number: e.number,
                    supplier_id: e.supplier_id,
                    category_id: e.category_id,
                    amount: e.amount,
                    tax_rate: e.tax_rate,
                    tax_amount: e.tax_amount,
                    total: e.total,
                    expense_date: e.expense_date,
                    status: e.status,
                    receipt_ref: e.receipt_ref,
                    payment_method: None,
                    payment_reference: None,
                    approved_by: None,
                    created_at: e.occurred_at,
                };
                self.store.upsert(hub_id, e.expense_id, record);
            }
            ExpenseEvent::ExpenseSubmitted(e) => {
                self.with_record(hub_id, e.expense_id, |r| {
                    r.status = ExpenseStatus::PendingApproval;
                });
            }
            ExpenseEvent::ExpenseApproved(e) => {
                self.with_record(hub_id, e.expense_id, |r| {
                    r.status = ExpenseStatus::Approved;
                    r.approved_by = e.approved_by;
                });
            }
            ExpenseEvent::ExpenseRejected(e) => {
                self.with_record(hub_id, e.expense_id, |r| {
                    r.status = ExpenseStatus::Rejected;
                });
            }
            ExpenseEvent::ExpensePaid(e) => {
                self.with_record(hub_id, e.expense_id, |r| {
                    r.status = ExpenseStatus::Paid;
                    r.payment_method = e.payment_method.clone();
                    r.payment_reference = e.payment_reference.clone();
                });
            }
            ExpenseEvent::ExpenseAmended(e) => {
                self.with_record(hub_id, e.expense_id, |r| {
                    r.amount = e.amount;
                    r.tax_rate = e.tax_rate;
                    r.tax_amount = e.tax_amount;
                    r.total = e.total;
                    r.supplier_id = e.supplier_id;
                    r.category_id = e.category_id;
                    r.expense_date = e.expense_date;
                    r.receipt_ref = e.receipt_ref.clone();
                    r.payment_method = e.payment_method.clone();
                    r.payment_reference = e.payment_reference.clone();
                });
            }
            ExpenseEvent::ExpenseDetailsUpdated(e) => {
                self.with_record(hub_id, e.expense_id, |r| {
                    r.category_id = e.category_id;
                    r.expense_date = e.expense_date;
                    r.receipt_ref = e.receipt_ref.clone();
                    r.payment_method = e.payment_method.clone();
                    r.payment_reference = e.payment_reference.clone();
                });
            }
        }

        self.cursors.commit(hub_id, aggregate_id, seq);
        Ok(())
    }

    fn with_record(
        &self,
        hub_id: HubId,
        expense_id: ExpenseId,
        update: impl FnOnce(&mut ExpenseRecord),
    ) {
        if let Some(mut record) = self.store.get(hub_id, &expense_id) {
            update(&mut record);
            self.store.upsert(hub_id, expense_id, record);
        }
    }
}

//! Recurring template read model.
//!
//! The scheduler reads its work list from here; the write side stays on the
//! aggregate streams.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use hubledger_categories::CategoryId;
use hubledger_core::{HubId, TaxRate};
use hubledger_events::EventEnvelope;
use hubledger_recurring::{Frequency, RecurringExpenseEvent, RecurringExpenseId};
use hubledger_suppliers::SupplierId;

use crate::projections::{CursorAdvance, Cursors, ProjectionError};
use crate::read_model::HubStore;

pub(crate) const RECURRING_AGGREGATE_TYPE: &str = "recurring.template";

/// Read model: one row per recurring template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringTemplateRecord {
    pub template_id: RecurringExpenseId,
    pub title: String,
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    pub amount: u64,
    pub tax_rate: Option<TaxRate>,
    pub frequency: Frequency,
    pub next_due_date: NaiveDate,
    pub auto_create: bool,
    pub active: bool,
    pub last_generated: Option<NaiveDate>,
}

/// Recurring templates projection.
#[derive(Debug)]
pub struct RecurringTemplatesProjection<S>
where
    S: HubStore<RecurringExpenseId, RecurringTemplateRecord>,
{
    store: S,
    cursors: Cursors,
}

impl<S> RecurringTemplatesProjection<S>
where
    S: HubStore<RecurringExpenseId, RecurringTemplateRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::new(),
        }
    }

    pub fn get(
        &self,
        hub_id: HubId,
        template_id: &RecurringExpenseId,
    ) -> Option<RecurringTemplateRecord> {
        self.store.get(hub_id, template_id)
    }

    /// All templates for a hub, soonest due first.
    pub fn list(&self, hub_id: HubId) -> Vec<RecurringTemplateRecord> {
        let mut records = self.store.list(hub_id);
        records.sort_by_key(|r| (r.next_due_date, r.title.clone()));
        records
    }

    /// Active templates due on or before `as_of`.
    pub fn due(&self, hub_id: HubId, as_of: NaiveDate) -> Vec<RecurringTemplateRecord> {
        self.list(hub_id)
            .into_iter()
            .filter(|r| r.active && r.next_due_date <= as_of)
            .collect()
    }

    /// Apply one stored-event envelope into the template list.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != RECURRING_AGGREGATE_TYPE {
            return Ok(());
        }

        let hub_id = envelope.hub_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(hub_id, aggregate_id, seq)? {
            CursorAdvance::AlreadyApplied => return Ok(()),
            CursorAdvance::Fresh => {}
        }

        let ev: RecurringExpenseEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            RecurringExpenseEvent::RecurringExpenseDefined(e) => {
                if e.hub_id != hub_id {
                    return Err(ProjectionError::HubIsolation(
                        "event hub_id does not match envelope hub_id".to_string(),
                    ));
                }
                self.store.upsert(
                    hub_id,
                    e.template_id,
                    RecurringTemplateRecord {
                        template_id: e.template_id,
                        title: e.title,
                        supplier_id: e.supplier_id,
                        category_id: e.category_id,
                        amount: e.amount,
                        tax_rate: e.tax_rate,
                        frequency: e.frequency,
                        next_due_date: e.next_due_date,
                        auto_create: e.auto_create,
                        active: true,
                        last_generated: None,
                    },
                );
            }
            RecurringExpenseEvent::RecurringExpenseUpdated(e) => {
                if let Some(mut record) = self.store.get(hub_id, &e.template_id) {
                    record.title = e.title;
                    record.supplier_id = e.supplier_id;
                    record.category_id = e.category_id;
                    record.amount = e.amount;
                    record.tax_rate = e.tax_rate;
                    record.frequency = e.frequency;
                    record.next_due_date = e.next_due_date;
                    record.auto_create = e.auto_create;
                    self.store.upsert(hub_id, e.template_id, record);
                }
            }
            RecurringExpenseEvent::RecurringExpenseDeactivated(e) => {
                if let Some(mut record) = self.store.get(hub_id, &e.template_id) {
                    record.active = false;
                    self.store.upsert(hub_id, e.template_id, record);
                }
            }
            RecurringExpenseEvent::RecurringExpenseReactivated(e) => {
                if let Some(mut record) = self.store.get(hub_id, &e.template_id) {
                    record.active = true;
                    self.store.upsert(hub_id, e.template_id, record);
                }
            }
            RecurringExpenseEvent::RecurringExpenseGenerated(e) => {
                if let Some(mut record) = self.store.get(hub_id, &e.template_id) {
                    record.last_generated = Some(e.generated_for);
                    record.next_due_date = e.next_due_date;
                    self.store.upsert(hub_id, e.template_id, record);
                }
            }
        }

        self.cursors.commit(hub_id, aggregate_id, seq);
        Ok(())
    }
}

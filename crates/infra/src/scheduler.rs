//! Recurrence scheduler.
//!
//! An external trigger (cron, job runner) owns the cadence; the scheduler
//! only answers "what must happen now" for one hub. Each due template with
//! `auto_create` produces exactly one expense through the engine's creation
//! contract — the same numbering, policy, and validation as a manual create
//! — and its due date then advances strictly past `as_of` (one catch-up
//! expense per tick, regardless of missed periods).
//!
//! A failed creation leaves the template's due date untouched: the template
//! is skipped this tick, reported, and retried with the same due date on the
//! next tick.

use std::sync::Arc;

use chrono::NaiveDate;

use hubledger_core::{DomainError, HubId};
use hubledger_expenses::ExpenseId;
use hubledger_recurring::RecurringExpenseId;

use crate::engine::{CreateExpenseInput, ExpenseEngine};
use crate::projections::recurring_templates::RecurringTemplateRecord;

/// One expense materialized during a tick.
#[derive(Debug, Clone)]
pub struct GeneratedExpense {
    pub template_id: RecurringExpenseId,
    pub expense_id: ExpenseId,
    pub number: String,
    pub due_date: NaiveDate,
    pub next_due_date: NaiveDate,
}

/// A due template that needs operator confirmation (`auto_create` off).
#[derive(Debug, Clone)]
pub struct DueTemplate {
    pub template_id: RecurringExpenseId,
    pub title: String,
    pub due_date: NaiveDate,
}

/// A template whose generation failed; its due date was not advanced.
#[derive(Debug, Clone)]
pub struct TickFailure {
    pub template_id: RecurringExpenseId,
    pub due_date: NaiveDate,
    pub error: DomainError,
}

/// Everything one tick did (and could not do).
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub generated: Vec<GeneratedExpense>,
    pub awaiting_confirmation: Vec<DueTemplate>,
    pub failures: Vec<TickFailure>,
}

/// Drives recurring-expense generation through the expense engine.
pub struct RecurrenceScheduler {
    engine: Arc<ExpenseEngine>,
}

impl RecurrenceScheduler {
    pub fn new(engine: Arc<ExpenseEngine>) -> Self {
        Self { engine }
    }

    /// Process every template of `hub_id` due on or before `as_of`.
    ///
    /// Idempotent per `as_of`: successful generation advances the due date
    /// past `as_of`, so a second tick with the same date finds nothing due.
    pub fn tick(&self, hub_id: HubId, as_of: NaiveDate) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        for template in self.engine.recurring_templates().due(hub_id, as_of) {
            if !template.auto_create {
                outcome.awaiting_confirmation.push(DueTemplate {
                    template_id: template.template_id,
                    title: template.title.clone(),
                    due_date: template.next_due_date,
                });
                continue;
            }

            match self.generate(hub_id, &template, as_of) {
                Ok(generated) => {
                    tracing::info!(
                        hub = %hub_id,
                        template = %generated.template_id,
                        number = %generated.number,
                        due = %generated.due_date,
                        next_due = %generated.next_due_date,
                        "recurring expense generated"
                    );
                    outcome.generated.push(generated);
                }
                Err(error) => {
                    tracing::warn!(
                        hub = %hub_id,
                        template = %template.template_id,
                        due = %template.next_due_date,
                        %error,
                        "recurring generation failed; due date not advanced"
                    );
                    outcome.failures.push(TickFailure {
                        template_id: template.template_id,
                        due_date: template.next_due_date,
                        error,
                    });
                }
            }
        }

        outcome
    }

    fn generate(
        &self,
        hub_id: HubId,
        template: &RecurringTemplateRecord,
        as_of: NaiveDate,
    ) -> Result<GeneratedExpense, DomainError> {
        let due_date = template.next_due_date;
        let expense = self.engine.create_expense(
            hub_id,
            CreateExpenseInput {
                supplier_id: template.supplier_id,
                category_id: template.category_id,
                amount: template.amount,
                tax_rate: template.tax_rate,
                expense_date: Some(due_date),
                receipt_ref: None,
                number: None,
                as_draft: false,
            },
        )?;

        let next_due_date = template.frequency.next_after(due_date, as_of);
        self.engine.record_generation(
            hub_id,
            template.template_id,
            expense.id_typed(),
            due_date,
            next_due_date,
        )?;

        Ok(GeneratedExpense {
            template_id: template.template_id,
            expense_id: expense.id_typed(),
            number: expense.number().to_string(),
            due_date,
            next_due_date,
        })
    }
}

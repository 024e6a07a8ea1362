//! The expense engine: application-level orchestration of the expense
//! lifecycle.
//!
//! The engine owns what the aggregates cannot decide alone:
//! - settings snapshots (one read per operation, used throughout),
//! - expense number allocation (serialized per hub, sole writer of the
//!   sequence),
//! - reference validation (supplier/category must resolve within the hub),
//! - command dispatch and synchronous projection application.
//!
//! Everything runs against in-memory infrastructure; persistence backends
//! are external collaborators behind the same store traits.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use hubledger_categories::{
    CategoryCommand, CategoryId, CategoryTree, DefineCategory, DeleteCategory, ExpenseCategory,
    ReassignCategoryParent, UpdateCategory,
};
use hubledger_core::{AggregateId, DomainError, DomainResult, HubId, TaxRate, UserId};
use hubledger_expenses::{
    AmendExpense, ApproveExpense, Expense, ExpenseCommand, ExpenseId, ExpenseSettings,
    MarkExpensePaid, RecordExpense, RejectExpense, SubmitExpense,
};
use hubledger_recurring::{
    DeactivateRecurringExpense, DefineRecurringExpense, Frequency, ReactivateRecurringExpense,
    RecordGeneration, RecurringExpense, RecurringExpenseCommand, RecurringExpenseId,
    UpdateRecurringExpense,
};
use hubledger_suppliers::{
    ArchiveSupplier, ContactInfo, RegisterSupplier, Supplier, SupplierCommand, SupplierId,
    UpdateSupplierDetails,
};

use crate::dispatcher::CommandDispatcher;
use crate::event_store::{InMemoryEventStore, StoredEvent};
use crate::projections::category_tree::{CATEGORY_AGGREGATE_TYPE, CategoryTreeProjection};
use crate::projections::expense_index::{ExpenseIndexProjection, ExpenseRecord};
use crate::projections::recurring_templates::{
    RECURRING_AGGREGATE_TYPE, RecurringTemplateRecord, RecurringTemplatesProjection,
};
use crate::projections::supplier_directory::{
    SUPPLIER_AGGREGATE_TYPE, SupplierDirectoryProjection, SupplierRecord,
};
use crate::projections::supplier_spend::{
    EXPENSE_AGGREGATE_TYPE, SupplierSpend, SupplierSpendProjection,
};
use crate::read_model::InMemoryHubStore;
use crate::settings_store::InMemorySettingsStore;

type ExpenseIndex = ExpenseIndexProjection<Arc<InMemoryHubStore<ExpenseId, ExpenseRecord>>>;
type SupplierSpendIndex = SupplierSpendProjection<Arc<InMemoryHubStore<SupplierId, SupplierSpend>>>;
type SupplierDirectory =
    SupplierDirectoryProjection<Arc<InMemoryHubStore<SupplierId, SupplierRecord>>>;
type RecurringTemplates =
    RecurringTemplatesProjection<Arc<InMemoryHubStore<RecurringExpenseId, RecurringTemplateRecord>>>;

/// Input for recording an expense.
#[derive(Debug, Clone, Default)]
pub struct CreateExpenseInput {
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    /// Net amount in minor units; must be positive.
    pub amount: u64,
    /// Per-expense override; None takes the hub's default rate.
    pub tax_rate: Option<TaxRate>,
    /// Defaults to today.
    pub expense_date: Option<NaiveDate>,
    pub receipt_ref: Option<String>,
    /// Only accepted when the hub has auto numbering disabled.
    pub number: Option<String>,
    pub as_draft: bool,
}

/// Input for amending an expense (None fields keep the existing value).
#[derive(Debug, Clone, Default)]
pub struct AmendExpenseInput {
    pub amount: Option<u64>,
    pub tax_rate: Option<TaxRate>,
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    pub expense_date: Option<NaiveDate>,
    pub receipt_ref: Option<String>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
}

/// Input for registering a supplier.
#[derive(Debug, Clone, Default)]
pub struct RegisterSupplierInput {
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub tax_id: Option<String>,
}

/// Input for defining a category.
#[derive(Debug, Clone, Default)]
pub struct DefineCategoryInput {
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub sort_order: u32,
    pub parent: Option<CategoryId>,
}

/// Input for updating a category (None fields keep the existing value).
#[derive(Debug, Clone, Default)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<u32>,
    pub active: Option<bool>,
}

/// Input for defining a recurring template.
#[derive(Debug, Clone)]
pub struct DefineRecurringInput {
    pub title: String,
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    /// Net amount in minor units; must be positive.
    pub amount: u64,
    /// Per-template override; None takes the hub default at generation time.
    pub tax_rate: Option<TaxRate>,
    pub frequency: Frequency,
    pub next_due_date: NaiveDate,
    pub auto_create: bool,
}

/// Input for updating a recurring template (None fields keep the existing
/// value).
#[derive(Debug, Clone, Default)]
pub struct UpdateRecurringInput {
    pub title: Option<String>,
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    pub amount: Option<u64>,
    pub tax_rate: Option<TaxRate>,
    pub frequency: Option<Frequency>,
    pub next_due_date: Option<NaiveDate>,
    pub auto_create: Option<bool>,
}

/// In-memory expense engine over the event-sourced domain crates.
pub struct ExpenseEngine {
    dispatcher: CommandDispatcher<Arc<InMemoryEventStore>>,
    settings: InMemorySettingsStore,
    categories: CategoryTreeProjection,
    suppliers: SupplierDirectory,
    supplier_spend: SupplierSpendIndex,
    expenses: ExpenseIndex,
    recurring: RecurringTemplates,
}

impl Default for ExpenseEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpenseEngine {
    pub fn new() -> Self {
        Self {
            dispatcher: CommandDispatcher::new(Arc::new(InMemoryEventStore::new())),
            settings: InMemorySettingsStore::new(),
            categories: CategoryTreeProjection::new(),
            suppliers: SupplierDirectoryProjection::new(Arc::new(InMemoryHubStore::new())),
            supplier_spend: SupplierSpendProjection::new(Arc::new(InMemoryHubStore::new())),
            expenses: ExpenseIndexProjection::new(Arc::new(InMemoryHubStore::new())),
            recurring: RecurringTemplatesProjection::new(Arc::new(InMemoryHubStore::new())),
        }
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub fn settings(&self, hub_id: HubId) -> ExpenseSettings {
        self.settings.snapshot(hub_id)
    }

    pub fn update_settings(&self, hub_id: HubId, settings: ExpenseSettings) -> DomainResult<()> {
        self.settings.update(hub_id, settings)
    }

    // ------------------------------------------------------------------
    // Expense lifecycle
    // ------------------------------------------------------------------

    /// Record a new expense: resolve the effective tax rate, allocate a
    /// number, evaluate the approval policy against a settings snapshot, and
    /// (when auto-approved) apply the supplier-total effect.
    pub fn create_expense(
        &self,
        hub_id: HubId,
        input: CreateExpenseInput,
    ) -> DomainResult<Expense> {
        if input.amount == 0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        self.ensure_supplier_usable(hub_id, input.supplier_id)?;
        self.ensure_category_usable(hub_id, input.category_id)?;

        let settings = self.settings.snapshot(hub_id);
        let tax_rate = input.tax_rate.unwrap_or(settings.default_tax_rate);
        let number = self.resolve_number(hub_id, &settings, input.number)?;

        let expense_id = ExpenseId::new(AggregateId::new());
        let now = Utc::now();
        let command = ExpenseCommand::RecordExpense(RecordExpense {
            hub_id,
            expense_id,
            number: number.clone(),
            supplier_id: input.supplier_id,
            category_id: input.category_id,
            amount: input.amount,
            tax_rate,
            expense_date: input.expense_date.unwrap_or_else(|| now.date_naive()),
            receipt_ref: input.receipt_ref,
            policy: settings.approval_policy(),
            as_draft: input.as_draft,
            occurred_at: now,
        });

        let stored = self
            .dispatcher
            .dispatch(hub_id, expense_id.0, EXPENSE_AGGREGATE_TYPE, command, |id| {
                Expense::empty(ExpenseId::new(id))
            })
            .map_err(DomainError::from)?;
        self.project(&stored)?;

        let expense = self.get_expense(hub_id, expense_id)?;
        tracing::info!(
            hub = %hub_id,
            number = %expense.number(),
            status = ?expense.status(),
            total = expense.total(),
            "expense recorded"
        );
        Ok(expense)
    }

    /// Promote a draft: the same approval policy evaluation as creation,
    /// against a fresh settings snapshot.
    pub fn submit_expense(&self, hub_id: HubId, expense_id: ExpenseId) -> DomainResult<Expense> {
        let settings = self.settings.snapshot(hub_id);
        let command = ExpenseCommand::SubmitExpense(SubmitExpense {
            hub_id,
            expense_id,
            policy: settings.approval_policy(),
            occurred_at: Utc::now(),
        });
        self.dispatch_expense(hub_id, expense_id, command)
    }

    pub fn approve_expense(
        &self,
        hub_id: HubId,
        expense_id: ExpenseId,
        approved_by: UserId,
    ) -> DomainResult<Expense> {
        let command = ExpenseCommand::ApproveExpense(ApproveExpense {
            hub_id,
            expense_id,
            approved_by,
            occurred_at: Utc::now(),
        });
        self.dispatch_expense(hub_id, expense_id, command)
    }

    pub fn reject_expense(
        &self,
        hub_id: HubId,
        expense_id: ExpenseId,
        rejected_by: UserId,
    ) -> DomainResult<Expense> {
        let command = ExpenseCommand::RejectExpense(RejectExpense {
            hub_id,
            expense_id,
            rejected_by,
            occurred_at: Utc::now(),
        });
        self.dispatch_expense(hub_id, expense_id, command)
    }

    pub fn mark_expense_paid(
        &self,
        hub_id: HubId,
        expense_id: ExpenseId,
        payment_method: Option<String>,
        payment_reference: Option<String>,
    ) -> DomainResult<Expense> {
        let command = ExpenseCommand::MarkExpensePaid(MarkExpensePaid {
            hub_id,
            expense_id,
            payment_method,
            payment_reference,
            occurred_at: Utc::now(),
        });
        self.dispatch_expense(hub_id, expense_id, command)
    }

    pub fn amend_expense(
        &self,
        hub_id: HubId,
        expense_id: ExpenseId,
        input: AmendExpenseInput,
    ) -> DomainResult<Expense> {
        self.ensure_supplier_usable(hub_id, input.supplier_id)?;
        self.ensure_category_usable(hub_id, input.category_id)?;

        let command = ExpenseCommand::AmendExpense(AmendExpense {
            hub_id,
            expense_id,
            amount: input.amount,
            tax_rate: input.tax_rate,
            supplier_id: input.supplier_id,
            category_id: input.category_id,
            expense_date: input.expense_date,
            receipt_ref: input.receipt_ref,
            payment_method: input.payment_method,
            payment_reference: input.payment_reference,
            occurred_at: Utc::now(),
        });
        self.dispatch_expense(hub_id, expense_id, command)
    }

    /// Rehydrate an expense from its stream.
    pub fn get_expense(&self, hub_id: HubId, expense_id: ExpenseId) -> DomainResult<Expense> {
        self.dispatcher
            .load(hub_id, expense_id.0, |id| Expense::empty(ExpenseId::new(id)))
            .map_err(DomainError::from)
    }

    // ------------------------------------------------------------------
    // Suppliers
    // ------------------------------------------------------------------

    pub fn register_supplier(
        &self,
        hub_id: HubId,
        input: RegisterSupplierInput,
    ) -> DomainResult<SupplierId> {
        let supplier_id = SupplierId::new(AggregateId::new());
        let command = SupplierCommand::RegisterSupplier(RegisterSupplier {
            hub_id,
            supplier_id,
            name: input.name,
            contact: input.contact,
            tax_id: input.tax_id,
            occurred_at: Utc::now(),
        });
        let stored = self
            .dispatcher
            .dispatch(hub_id, supplier_id.0, SUPPLIER_AGGREGATE_TYPE, command, |id| {
                Supplier::empty(SupplierId::new(id))
            })
            .map_err(DomainError::from)?;
        self.project(&stored)?;
        Ok(supplier_id)
    }

    pub fn update_supplier(
        &self,
        hub_id: HubId,
        supplier_id: SupplierId,
        name: Option<String>,
        contact: Option<ContactInfo>,
        tax_id: Option<String>,
    ) -> DomainResult<()> {
        let command = SupplierCommand::UpdateSupplierDetails(UpdateSupplierDetails {
            hub_id,
            supplier_id,
            name,
            contact,
            tax_id,
            occurred_at: Utc::now(),
        });
        let stored = self
            .dispatcher
            .dispatch(hub_id, supplier_id.0, SUPPLIER_AGGREGATE_TYPE, command, |id| {
                Supplier::empty(SupplierId::new(id))
            })
            .map_err(DomainError::from)?;
        self.project(&stored)
    }

    pub fn archive_supplier(
        &self,
        hub_id: HubId,
        supplier_id: SupplierId,
        reason: Option<String>,
    ) -> DomainResult<()> {
        let command = SupplierCommand::ArchiveSupplier(ArchiveSupplier {
            hub_id,
            supplier_id,
            reason,
            occurred_at: Utc::now(),
        });
        let stored = self
            .dispatcher
            .dispatch(hub_id, supplier_id.0, SUPPLIER_AGGREGATE_TYPE, command, |id| {
                Supplier::empty(SupplierId::new(id))
            })
            .map_err(DomainError::from)?;
        self.project(&stored)
    }

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    pub fn define_category(
        &self,
        hub_id: HubId,
        input: DefineCategoryInput,
    ) -> DomainResult<CategoryId> {
        if let Some(parent) = input.parent {
            if self.categories.resolve(hub_id, parent).is_none() {
                return Err(DomainError::validation(
                    "parent category does not exist in this hub",
                ));
            }
        }

        let category_id = CategoryId::new(AggregateId::new());
        let command = CategoryCommand::DefineCategory(DefineCategory {
            hub_id,
            category_id,
            name: input.name,
            icon: input.icon,
            color: input.color,
            description: input.description,
            sort_order: input.sort_order,
            parent: input.parent,
            occurred_at: Utc::now(),
        });
        let stored = self.dispatch_category(hub_id, category_id, command)?;
        self.project(&stored)?;
        Ok(category_id)
    }

    pub fn update_category(
        &self,
        hub_id: HubId,
        category_id: CategoryId,
        input: UpdateCategoryInput,
    ) -> DomainResult<()> {
        let command = CategoryCommand::UpdateCategory(UpdateCategory {
            hub_id,
            category_id,
            name: input.name,
            icon: input.icon,
            color: input.color,
            description: input.description,
            sort_order: input.sort_order,
            active: input.active,
            occurred_at: Utc::now(),
        });
        let stored = self.dispatch_category(hub_id, category_id, command)?;
        self.project(&stored)
    }

    /// Move a category under a new parent, rejecting cyclic assignments via
    /// an ancestor check on the current tree.
    pub fn reassign_category_parent(
        &self,
        hub_id: HubId,
        category_id: CategoryId,
        new_parent: Option<CategoryId>,
    ) -> DomainResult<()> {
        let tree = self.categories.tree(hub_id);
        if tree.resolve(category_id).is_none() {
            return Err(DomainError::not_found());
        }
        if let Some(parent) = new_parent {
            if tree.resolve(parent).is_none() {
                return Err(DomainError::validation(
                    "parent category does not exist in this hub",
                ));
            }
            if tree.would_create_cycle(category_id, parent) {
                return Err(DomainError::validation(
                    "reassignment would make the category its own ancestor",
                ));
            }
        }

        let command = CategoryCommand::ReassignCategoryParent(ReassignCategoryParent {
            hub_id,
            category_id,
            new_parent,
            occurred_at: Utc::now(),
        });
        let stored = self.dispatch_category(hub_id, category_id, command)?;
        self.project(&stored)
    }

    /// Delete a category. Refused with `HasDependents` while child
    /// categories or expenses still reference it.
    pub fn delete_category(&self, hub_id: HubId, category_id: CategoryId) -> DomainResult<()> {
        let tree = self.categories.tree(hub_id);
        if tree.resolve(category_id).is_none() {
            return Err(DomainError::not_found());
        }
        if tree.has_children(category_id) {
            return Err(DomainError::has_dependents(
                "category still has child categories",
            ));
        }
        if self.expenses.references_category(hub_id, category_id) {
            return Err(DomainError::has_dependents(
                "expenses still reference this category",
            ));
        }

        let command = CategoryCommand::DeleteCategory(DeleteCategory {
            hub_id,
            category_id,
            occurred_at: Utc::now(),
        });
        let stored = self.dispatch_category(hub_id, category_id, command)?;
        self.project(&stored)
    }

    /// Snapshot of the hub's category tree.
    pub fn category_tree(&self, hub_id: HubId) -> CategoryTree {
        self.categories.tree(hub_id)
    }

    // ------------------------------------------------------------------
    // Recurring templates
    // ------------------------------------------------------------------

    pub fn define_recurring(
        &self,
        hub_id: HubId,
        input: DefineRecurringInput,
    ) -> DomainResult<RecurringExpenseId> {
        self.ensure_supplier_usable(hub_id, input.supplier_id)?;
        self.ensure_category_usable(hub_id, input.category_id)?;

        let template_id = RecurringExpenseId::new(AggregateId::new());
        let command = RecurringExpenseCommand::DefineRecurringExpense(DefineRecurringExpense {
            hub_id,
            template_id,
            title: input.title,
            supplier_id: input.supplier_id,
            category_id: input.category_id,
            amount: input.amount,
            tax_rate: input.tax_rate,
            frequency: input.frequency,
            next_due_date: input.next_due_date,
            auto_create: input.auto_create,
            occurred_at: Utc::now(),
        });
        let stored = self.dispatch_recurring(hub_id, template_id, command)?;
        self.project(&stored)?;
        Ok(template_id)
    }

    pub fn update_recurring(
        &self,
        hub_id: HubId,
        template_id: RecurringExpenseId,
        input: UpdateRecurringInput,
    ) -> DomainResult<()> {
        self.ensure_supplier_usable(hub_id, input.supplier_id)?;
        self.ensure_category_usable(hub_id, input.category_id)?;

        let command = RecurringExpenseCommand::UpdateRecurringExpense(UpdateRecurringExpense {
            hub_id,
            template_id,
            title: input.title,
            supplier_id: input.supplier_id,
            category_id: input.category_id,
            amount: input.amount,
            tax_rate: input.tax_rate,
            frequency: input.frequency,
            next_due_date: input.next_due_date,
            auto_create: input.auto_create,
            occurred_at: Utc::now(),
        });
        let stored = self.dispatch_recurring(hub_id, template_id, command)?;
        self.project(&stored)
    }

    pub fn set_recurring_active(
        &self,
        hub_id: HubId,
        template_id: RecurringExpenseId,
        active: bool,
    ) -> DomainResult<()> {
        let command = if active {
            RecurringExpenseCommand::ReactivateRecurringExpense(ReactivateRecurringExpense {
                hub_id,
                template_id,
                occurred_at: Utc::now(),
            })
        } else {
            RecurringExpenseCommand::DeactivateRecurringExpense(DeactivateRecurringExpense {
                hub_id,
                template_id,
                occurred_at: Utc::now(),
            })
        };
        let stored = self.dispatch_recurring(hub_id, template_id, command)?;
        self.project(&stored)
    }

    /// Advance a template after its expense was created. Only the scheduler
    /// calls this, and only with the due date it actually satisfied.
    pub(crate) fn record_generation(
        &self,
        hub_id: HubId,
        template_id: RecurringExpenseId,
        generated_expense_id: ExpenseId,
        generated_for: NaiveDate,
        next_due_date: NaiveDate,
    ) -> DomainResult<()> {
        let command = RecurringExpenseCommand::RecordGeneration(RecordGeneration {
            hub_id,
            template_id,
            generated_expense_id,
            generated_for,
            next_due_date,
            occurred_at: Utc::now(),
        });
        let stored = self.dispatch_recurring(hub_id, template_id, command)?;
        self.project(&stored)
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn expense_index(&self) -> &ExpenseIndex {
        &self.expenses
    }

    pub fn supplier_directory(&self) -> &SupplierDirectory {
        &self.suppliers
    }

    pub fn supplier_spend(&self, hub_id: HubId, supplier_id: &SupplierId) -> Option<SupplierSpend> {
        self.supplier_spend.get(hub_id, supplier_id)
    }

    pub fn supplier_spend_index(&self) -> &SupplierSpendIndex {
        &self.supplier_spend
    }

    pub fn recurring_templates(&self) -> &RecurringTemplates {
        &self.recurring
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn dispatch_expense(
        &self,
        hub_id: HubId,
        expense_id: ExpenseId,
        command: ExpenseCommand,
    ) -> DomainResult<Expense> {
        let stored = self
            .dispatcher
            .dispatch(hub_id, expense_id.0, EXPENSE_AGGREGATE_TYPE, command, |id| {
                Expense::empty(ExpenseId::new(id))
            })
            .map_err(DomainError::from)?;
        self.project(&stored)?;
        self.get_expense(hub_id, expense_id)
    }

    fn dispatch_category(
        &self,
        hub_id: HubId,
        category_id: CategoryId,
        command: CategoryCommand,
    ) -> DomainResult<Vec<StoredEvent>> {
        self.dispatcher
            .dispatch(hub_id, category_id.0, CATEGORY_AGGREGATE_TYPE, command, |id| {
                ExpenseCategory::empty(CategoryId::new(id))
            })
            .map_err(DomainError::from)
    }

    fn dispatch_recurring(
        &self,
        hub_id: HubId,
        template_id: RecurringExpenseId,
        command: RecurringExpenseCommand,
    ) -> DomainResult<Vec<StoredEvent>> {
        self.dispatcher
            .dispatch(
                hub_id,
                template_id.0,
                RECURRING_AGGREGATE_TYPE,
                command,
                |id| RecurringExpense::empty(RecurringExpenseId::new(id)),
            )
            .map_err(DomainError::from)
    }

    /// Feed committed events to every projection, synchronously.
    fn project(&self, stored: &[StoredEvent]) -> DomainResult<()> {
        for event in stored {
            let envelope = event.to_envelope();
            self.expenses
                .apply_envelope(&envelope)
                .map_err(|e| DomainError::conflict(format!("projection: {e}")))?;
            self.supplier_spend
                .apply_envelope(&envelope)
                .map_err(|e| DomainError::conflict(format!("projection: {e}")))?;
            self.suppliers
                .apply_envelope(&envelope)
                .map_err(|e| DomainError::conflict(format!("projection: {e}")))?;
            self.categories
                .apply_envelope(&envelope)
                .map_err(|e| DomainError::conflict(format!("projection: {e}")))?;
            self.recurring
                .apply_envelope(&envelope)
                .map_err(|e| DomainError::conflict(format!("projection: {e}")))?;
        }
        Ok(())
    }

    fn resolve_number(
        &self,
        hub_id: HubId,
        settings: &ExpenseSettings,
        requested: Option<String>,
    ) -> DomainResult<String> {
        match requested {
            Some(number) => {
                if settings.auto_numbering {
                    return Err(DomainError::validation(
                        "expense numbers are assigned automatically for this hub",
                    ));
                }
                let number = number.trim().to_string();
                if number.is_empty() {
                    return Err(DomainError::validation("expense number cannot be empty"));
                }
                if self.expenses.number_exists(hub_id, &number) {
                    return Err(DomainError::conflict(format!(
                        "expense number {number} is already taken"
                    )));
                }
                Ok(number)
            }
            None => {
                if !settings.auto_numbering {
                    return Err(DomainError::validation(
                        "expense number is required when auto numbering is disabled",
                    ));
                }
                let (number, _seq) = self.settings.allocate_number(hub_id)?;
                Ok(number)
            }
        }
    }

    fn ensure_supplier_usable(
        &self,
        hub_id: HubId,
        supplier_id: Option<SupplierId>,
    ) -> DomainResult<()> {
        let Some(supplier_id) = supplier_id else {
            return Ok(());
        };
        match self.suppliers.get(hub_id, &supplier_id) {
            None => Err(DomainError::validation(
                "supplier does not exist in this hub",
            )),
            Some(record) if !record.active => {
                Err(DomainError::validation("supplier is archived"))
            }
            Some(_) => Ok(()),
        }
    }

    fn ensure_category_usable(
        &self,
        hub_id: HubId,
        category_id: Option<CategoryId>,
    ) -> DomainResult<()> {
        let Some(category_id) = category_id else {
            return Ok(());
        };
        match self.categories.resolve(hub_id, category_id) {
            None => Err(DomainError::validation(
                "category does not exist in this hub",
            )),
            Some(record) if !record.active => {
                Err(DomainError::validation("category is inactive"))
            }
            Some(_) => Ok(()),
        }
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use hubledger_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, HubId, TaxRate, UserId, money,
};
use hubledger_categories::CategoryId;
use hubledger_events::Event;
use hubledger_suppliers::SupplierId;

use crate::settings::ApprovalPolicy;

/// Expense identifier (hub-scoped via `hub_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(pub AggregateId);

impl ExpenseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Expense status lifecycle.
///
/// Edges: `Draft → {PendingApproval, Approved}`,
/// `PendingApproval → {Approved, Rejected}`, `Approved → Paid`.
/// `Rejected` and `Paid` are terminal for status purposes; nothing moves
/// backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Paid,
}

impl ExpenseStatus {
    /// Whether the supplier-total effect has been applied for this status.
    pub fn counts_toward_supplier(&self) -> bool {
        matches!(self, ExpenseStatus::Approved | ExpenseStatus::Paid)
    }
}

/// Aggregate root: Expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    id: ExpenseId,
    hub_id: Option<HubId>,
    number: String,
    supplier_id: Option<SupplierId>,
    category_id: Option<CategoryId>,
    /// Net amount in minor units.
    amount: u64,
    tax_rate: TaxRate,
    /// Derived: `tax_rate` applied to `amount`, rounded to the minor unit.
    tax_amount: u64,
    /// Derived: `amount + tax_amount`. Recomputed together with `tax_amount`,
    /// never settable on its own.
    total: u64,
    expense_date: NaiveDate,
    status: ExpenseStatus,
    payment_method: Option<String>,
    payment_reference: Option<String>,
    receipt_ref: Option<String>,
    created_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    approved_by: Option<UserId>,
    paid_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Expense {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ExpenseId) -> Self {
        Self {
            id,
            hub_id: None,
            number: String::new(),
            supplier_id: None,
            category_id: None,
            amount: 0,
            tax_rate: TaxRate::ZERO,
            tax_amount: 0,
            total: 0,
            expense_date: NaiveDate::default(),
            status: ExpenseStatus::Draft,
            payment_method: None,
            payment_reference: None,
            receipt_ref: None,
            created_at: None,
            approved_at: None,
            approved_by: None,
            paid_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ExpenseId {
        self.id
    }

    pub fn hub_id(&self) -> Option<HubId> {
        self.hub_id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    pub fn tax_amount(&self) -> u64 {
        self.tax_amount
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn expense_date(&self) -> NaiveDate {
        self.expense_date
    }

    pub fn status(&self) -> ExpenseStatus {
        self.status
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    pub fn receipt_ref(&self) -> Option<&str> {
        self.receipt_ref.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }
}

impl AggregateRoot for Expense {
    type Id = ExpenseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordExpense.
///
/// The engine resolves the effective tax rate, assigns the number, and
/// snapshots the approval policy before building this command; the aggregate
/// stays pure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordExpense {
    pub hub_id: HubId,
    pub expense_id: ExpenseId,
    pub number: String,
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    /// Net amount in minor units; must be positive.
    pub amount: u64,
    pub tax_rate: TaxRate,
    pub expense_date: NaiveDate,
    pub receipt_ref: Option<String>,
    pub policy: ApprovalPolicy,
    /// Record as a draft: the approval policy is evaluated at submit time
    /// instead.
    pub as_draft: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitExpense (Draft → PendingApproval/Approved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitExpense {
    pub hub_id: HubId,
    pub expense_id: ExpenseId,
    pub policy: ApprovalPolicy,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveExpense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveExpense {
    pub hub_id: HubId,
    pub expense_id: ExpenseId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectExpense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectExpense {
    pub hub_id: HubId,
    pub expense_id: ExpenseId,
    pub rejected_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkExpensePaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkExpensePaid {
    pub hub_id: HubId,
    pub expense_id: ExpenseId,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AmendExpense (None fields keep the existing value).
///
/// Financial fields (amount, tax rate, supplier) amend freely while the
/// expense is Draft or PendingApproval. Once Approved or Paid, a financial
/// amendment reverses the prior supplier-total contribution and reapplies
/// the new one; the emitted event carries both sides so the projection can
/// do this atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendExpense {
    pub hub_id: HubId,
    pub expense_id: ExpenseId,
    pub amount: Option<u64>,
    pub tax_rate: Option<TaxRate>,
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    pub expense_date: Option<NaiveDate>,
    pub receipt_ref: Option<String>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseCommand {
    RecordExpense(RecordExpense),
    SubmitExpense(SubmitExpense),
    ApproveExpense(ApproveExpense),
    RejectExpense(RejectExpense),
    MarkExpensePaid(MarkExpensePaid),
    AmendExpense(AmendExpense),
}

/// Event: ExpenseRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecorded {
    pub hub_id: HubId,
    pub expense_id: ExpenseId,
    pub number: String,
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    pub amount: u64,
    pub tax_rate: TaxRate,
    pub tax_amount: u64,
    pub total: u64,
    pub expense_date: NaiveDate,
    pub receipt_ref: Option<String>,
    /// `Draft` or `PendingApproval`; auto-approval is a separate
    /// `ExpenseApproved` event in the same batch.
    pub status: ExpenseStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExpenseSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseSubmitted {
    pub hub_id: HubId,
    pub expense_id: ExpenseId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExpenseApproved.
///
/// Carries the supplier reference and gross total so the supplier-spend
/// projection can apply the effect without loading the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseApproved {
    pub hub_id: HubId,
    pub expense_id: ExpenseId,
    pub supplier_id: Option<SupplierId>,
    pub total: u64,
    pub expense_date: NaiveDate,
    /// None for threshold auto-approvals.
    pub approved_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExpenseRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRejected {
    pub hub_id: HubId,
    pub expense_id: ExpenseId,
    pub rejected_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExpensePaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpensePaid {
    pub hub_id: HubId,
    pub expense_id: ExpenseId,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExpenseAmended (financial fields recomputed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseAmended {
    pub hub_id: HubId,
    pub expense_id: ExpenseId,
    pub amount: u64,
    pub tax_rate: TaxRate,
    pub tax_amount: u64,
    pub total: u64,
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    pub expense_date: NaiveDate,
    pub receipt_ref: Option<String>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    /// Supplier contribution to reverse before reapplying, present when the
    /// expense had already counted toward supplier totals.
    pub previous_supplier_id: Option<SupplierId>,
    pub previous_total: u64,
    pub applies_supplier_effect: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExpenseDetailsUpdated (non-financial fields only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDetailsUpdated {
    pub hub_id: HubId,
    pub expense_id: ExpenseId,
    pub category_id: Option<CategoryId>,
    pub expense_date: NaiveDate,
    pub receipt_ref: Option<String>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseEvent {
    ExpenseRecorded(ExpenseRecorded),
    ExpenseSubmitted(ExpenseSubmitted),
    ExpenseApproved(ExpenseApproved),
    ExpenseRejected(ExpenseRejected),
    ExpensePaid(ExpensePaid),
    ExpenseAmended(ExpenseAmended),
    ExpenseDetailsUpdated(ExpenseDetailsUpdated),
}

impl Event for ExpenseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExpenseEvent::ExpenseRecorded(_) => "expenses.expense.recorded",
            ExpenseEvent::ExpenseSubmitted(_) => "expenses.expense.submitted",
            ExpenseEvent::ExpenseApproved(_) => "expenses.expense.approved",
            ExpenseEvent::ExpenseRejected(_) => "expenses.expense.rejected",
            ExpenseEvent::ExpensePaid(_) => "expenses.expense.paid",
            ExpenseEvent::ExpenseAmended(_) => "expenses.expense.amended",
            ExpenseEvent::ExpenseDetailsUpdated(_) => "expenses.expense.details_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ExpenseEvent::ExpenseRecorded(e) => e.occurred_at,
            ExpenseEvent::ExpenseSubmitted(e) => e.occurred_at,
            ExpenseEvent::ExpenseApproved(e) => e.occurred_at,
            ExpenseEvent::ExpenseRejected(e) => e.occurred_at,
            ExpenseEvent::ExpensePaid(e) => e.occurred_at,
            ExpenseEvent::ExpenseAmended(e) => e.occurred_at,
            ExpenseEvent::ExpenseDetailsUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Expense {
    type Command = ExpenseCommand;
    type Event = ExpenseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ExpenseEvent::ExpenseRecorded(e) => {
                self.id = e.expense_id;
                self.hub_id = Some(e.hub_id);
                self.number = e.number.clone();
                self.supplier_id = e.supplier_id;
                self.category_id = e.category_id;
                self.amount = e.amount;
                self.tax_rate = e.tax_rate;
                self.tax_amount = e.tax_amount;
                self.total = e.total;
                self.expense_date = e.expense_date;
                self.receipt_ref = e.receipt_ref.clone();
                self.status = e.status;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            ExpenseEvent::ExpenseSubmitted(_) => {
                self.status = ExpenseStatus::PendingApproval;
            }
            ExpenseEvent::ExpenseApproved(e) => {
                self.status = ExpenseStatus::Approved;
                self.approved_at = Some(e.occurred_at);
                self.approved_by = e.approved_by;
            }
            ExpenseEvent::ExpenseRejected(_) => {
                self.status = ExpenseStatus::Rejected;
            }
            ExpenseEvent::ExpensePaid(e) => {
                self.status = ExpenseStatus::Paid;
                self.payment_method = e.payment_method.clone();
                self.payment_reference = e.payment_reference.clone();
                self.paid_at = Some(e.occurred_at);
            }
            ExpenseEvent::ExpenseAmended(e) => {
                self.amount = e.amount;
                self.tax_rate = e.tax_rate;
                self.tax_amount = e.tax_amount;
                self.total = e.total;
                self.supplier_id = e.supplier_id;
                self.category_id = e.category_id;
                self.expense_date = e.expense_date;
                self.receipt_ref = e.receipt_ref.clone();
                self.payment_method = e.payment_method.clone();
                self.payment_reference = e.payment_reference.clone();
            }
            ExpenseEvent::ExpenseDetailsUpdated(e) => {
                self.category_id = e.category_id;
                self.expense_date = e.expense_date;
                self.receipt_ref = e.receipt_ref.clone();
                self.payment_method = e.payment_method.clone();
                self.payment_reference = e.payment_reference.clone();
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ExpenseCommand::RecordExpense(cmd) => self.handle_record(cmd),
            ExpenseCommand::SubmitExpense(cmd) => self.handle_submit(cmd),
            ExpenseCommand::ApproveExpense(cmd) => self.handle_approve(cmd),
            ExpenseCommand::RejectExpense(cmd) => self.handle_reject(cmd),
            ExpenseCommand::MarkExpensePaid(cmd) => self.handle_mark_paid(cmd),
            ExpenseCommand::AmendExpense(cmd) => self.handle_amend(cmd),
        }
    }
}

impl Expense {
    fn ensure_hub(&self, hub_id: HubId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.hub_id != Some(hub_id) {
            return Err(DomainError::validation("hub mismatch"));
        }
        Ok(())
    }

    fn ensure_expense_id(&self, expense_id: ExpenseId) -> Result<(), DomainError> {
        if self.id != expense_id {
            return Err(DomainError::validation("expense_id mismatch"));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordExpense) -> Result<Vec<ExpenseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("expense already exists"));
        }
        if cmd.amount == 0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        if cmd.number.trim().is_empty() {
            return Err(DomainError::validation("expense number cannot be empty"));
        }

        let tax_amount = cmd.tax_rate.tax_on(cmd.amount);
        let total = money::checked_total(cmd.amount, tax_amount)?;

        let status = if cmd.as_draft {
            ExpenseStatus::Draft
        } else {
            ExpenseStatus::PendingApproval
        };

        let mut events = vec![ExpenseEvent::ExpenseRecorded(ExpenseRecorded {
            hub_id: cmd.hub_id,
            expense_id: cmd.expense_id,
            number: cmd.number.clone(),
            supplier_id: cmd.supplier_id,
            category_id: cmd.category_id,
            amount: cmd.amount,
            tax_rate: cmd.tax_rate,
            tax_amount,
            total,
            expense_date: cmd.expense_date,
            receipt_ref: cmd.receipt_ref.clone(),
            status,
            occurred_at: cmd.occurred_at,
        })];

        if !cmd.as_draft && cmd.policy.auto_approves(total) {
            events.push(ExpenseEvent::ExpenseApproved(ExpenseApproved {
                hub_id: cmd.hub_id,
                expense_id: cmd.expense_id,
                supplier_id: cmd.supplier_id,
                total,
                expense_date: cmd.expense_date,
                approved_by: None,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_submit(&self, cmd: &SubmitExpense) -> Result<Vec<ExpenseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_hub(cmd.hub_id)?;
        self.ensure_expense_id(cmd.expense_id)?;

        if self.status != ExpenseStatus::Draft {
            return Err(DomainError::invalid_transition(
                "only draft expenses can be submitted",
            ));
        }

        let mut events = vec![ExpenseEvent::ExpenseSubmitted(ExpenseSubmitted {
            hub_id: cmd.hub_id,
            expense_id: cmd.expense_id,
            occurred_at: cmd.occurred_at,
        })];

        if cmd.policy.auto_approves(self.total) {
            events.push(ExpenseEvent::ExpenseApproved(ExpenseApproved {
                hub_id: cmd.hub_id,
                expense_id: cmd.expense_id,
                supplier_id: self.supplier_id,
                total: self.total,
                expense_date: self.expense_date,
                approved_by: None,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_approve(&self, cmd: &ApproveExpense) -> Result<Vec<ExpenseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_hub(cmd.hub_id)?;
        self.ensure_expense_id(cmd.expense_id)?;

        if self.status != ExpenseStatus::PendingApproval {
            return Err(DomainError::invalid_transition(
                "only pending expenses can be approved",
            ));
        }

        Ok(vec![ExpenseEvent::ExpenseApproved(ExpenseApproved {
            hub_id: cmd.hub_id,
            expense_id: cmd.expense_id,
            supplier_id: self.supplier_id,
            total: self.total,
            expense_date: self.expense_date,
            approved_by: Some(cmd.approved_by),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectExpense) -> Result<Vec<ExpenseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_hub(cmd.hub_id)?;
        self.ensure_expense_id(cmd.expense_id)?;

        if self.status != ExpenseStatus::PendingApproval {
            return Err(DomainError::invalid_transition(
                "only pending expenses can be rejected",
            ));
        }

        Ok(vec![ExpenseEvent::ExpenseRejected(ExpenseRejected {
            hub_id: cmd.hub_id,
            expense_id: cmd.expense_id,
            rejected_by: cmd.rejected_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_paid(&self, cmd: &MarkExpensePaid) -> Result<Vec<ExpenseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_hub(cmd.hub_id)?;
        self.ensure_expense_id(cmd.expense_id)?;

        if self.status != ExpenseStatus::Approved {
            return Err(DomainError::invalid_transition(
                "only approved expenses can be marked paid",
            ));
        }

        Ok(vec![ExpenseEvent::ExpensePaid(ExpensePaid {
            hub_id: cmd.hub_id,
            expense_id: cmd.expense_id,
            payment_method: cmd.payment_method.clone(),
            payment_reference: cmd.payment_reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_amend(&self, cmd: &AmendExpense) -> Result<Vec<ExpenseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_hub(cmd.hub_id)?;
        self.ensure_expense_id(cmd.expense_id)?;

        if self.status == ExpenseStatus::Rejected {
            return Err(DomainError::invalid_transition(
                "rejected expenses cannot be edited",
            ));
        }

        let new_amount = cmd.amount.unwrap_or(self.amount);
        let new_rate = cmd.tax_rate.unwrap_or(self.tax_rate);
        let new_supplier = cmd.supplier_id.or(self.supplier_id);
        let new_category = cmd.category_id.or(self.category_id);
        let new_date = cmd.expense_date.unwrap_or(self.expense_date);
        let new_receipt = cmd.receipt_ref.clone().or_else(|| self.receipt_ref.clone());
        let new_method = cmd
            .payment_method
            .clone()
            .or_else(|| self.payment_method.clone());
        let new_reference = cmd
            .payment_reference
            .clone()
            .or_else(|| self.payment_reference.clone());

        let financial_change = new_amount != self.amount
            || new_rate != self.tax_rate
            || new_supplier != self.supplier_id;

        if !financial_change {
            return Ok(vec![ExpenseEvent::ExpenseDetailsUpdated(
                ExpenseDetailsUpdated {
                    hub_id: cmd.hub_id,
                    expense_id: cmd.expense_id,
                    category_id: new_category,
                    expense_date: new_date,
                    receipt_ref: new_receipt,
                    payment_method: new_method,
                    payment_reference: new_reference,
                    occurred_at: cmd.occurred_at,
                },
            )]);
        }

        if new_amount == 0 {
            return Err(DomainError::validation("amount must be positive"));
        }

        let tax_amount = new_rate.tax_on(new_amount);
        let total = money::checked_total(new_amount, tax_amount)?;
        let applies_supplier_effect = self.status.counts_toward_supplier();

        Ok(vec![ExpenseEvent::ExpenseAmended(ExpenseAmended {
            hub_id: cmd.hub_id,
            expense_id: cmd.expense_id,
            amount: new_amount,
            tax_rate: new_rate,
            tax_amount,
            total,
            supplier_id: new_supplier,
            category_id: new_category,
            expense_date: new_date,
            receipt_ref: new_receipt,
            payment_method: new_method,
            payment_reference: new_reference,
            previous_supplier_id: self.supplier_id,
            previous_total: self.total,
            applies_supplier_effect,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubledger_core::AggregateId;

    fn test_hub_id() -> HubId {
        HubId::new()
    }

    fn test_expense_id() -> ExpenseId {
        ExpenseId::new(AggregateId::new())
    }

    fn test_supplier_id() -> SupplierId {
        SupplierId::new(AggregateId::new())
    }

    fn test_user_id() -> UserId {
        UserId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn lenient_policy() -> ApprovalPolicy {
        ApprovalPolicy {
            require_approval: false,
            threshold: 0,
        }
    }

    fn strict_policy(threshold: u64) -> ApprovalPolicy {
        ApprovalPolicy {
            require_approval: true,
            threshold,
        }
    }

    fn record_cmd(
        hub_id: HubId,
        expense_id: ExpenseId,
        amount: u64,
        rate_bps: u16,
        policy: ApprovalPolicy,
    ) -> RecordExpense {
        RecordExpense {
            hub_id,
            expense_id,
            number: "EXP-0001".to_string(),
            supplier_id: Some(test_supplier_id()),
            category_id: None,
            amount,
            tax_rate: TaxRate::from_basis_points(rate_bps).unwrap(),
            expense_date: test_date(),
            receipt_ref: None,
            policy,
            as_draft: false,
            occurred_at: test_time(),
        }
    }

    fn apply_all(expense: &mut Expense, events: &[ExpenseEvent]) {
        for event in events {
            expense.apply(event);
        }
    }

    #[test]
    fn record_computes_tax_and_total() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        // 21% of 100.00 → 21.00 tax, 121.00 total
        let cmd = record_cmd(hub_id, expense_id, 10_000, 2100, lenient_policy());
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        apply_all(&mut expense, &events);

        assert_eq!(expense.amount(), 10_000);
        assert_eq!(expense.tax_amount(), 2_100);
        assert_eq!(expense.total(), 12_100);
        assert_eq!(expense.number(), "EXP-0001");
    }

    #[test]
    fn record_rejects_zero_amount() {
        let expense = Expense::empty(test_expense_id());
        let cmd = record_cmd(
            test_hub_id(),
            test_expense_id(),
            0,
            2100,
            lenient_policy(),
        );
        let err = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for zero amount"),
        }
    }

    #[test]
    fn record_without_required_approval_auto_approves() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        let cmd = record_cmd(hub_id, expense_id, 10_000, 0, lenient_policy());
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        assert_eq!(events.len(), 2);
        match &events[1] {
            ExpenseEvent::ExpenseApproved(e) => {
                assert_eq!(e.approved_by, None);
                assert_eq!(e.total, 10_000);
            }
            _ => panic!("Expected auto ExpenseApproved event"),
        }

        apply_all(&mut expense, &events);
        assert_eq!(expense.status(), ExpenseStatus::Approved);
        assert!(expense.approved_at().is_some());
    }

    #[test]
    fn record_at_threshold_auto_approves_inclusively() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        // total 50.00, threshold 50.00 → auto-approved (inclusive comparison)
        let cmd = record_cmd(hub_id, expense_id, 5_000, 0, strict_policy(5_000));
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        apply_all(&mut expense, &events);
        assert_eq!(expense.status(), ExpenseStatus::Approved);
    }

    #[test]
    fn record_above_threshold_stays_pending() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        let cmd = record_cmd(hub_id, expense_id, 50_000, 0, strict_policy(10_000));
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        assert_eq!(events.len(), 1);
        apply_all(&mut expense, &events);
        assert_eq!(expense.status(), ExpenseStatus::PendingApproval);
        assert!(expense.approved_at().is_none());
    }

    #[test]
    fn draft_record_skips_policy_until_submit() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        let mut cmd = record_cmd(hub_id, expense_id, 1_000, 0, lenient_policy());
        cmd.as_draft = true;
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        assert_eq!(events.len(), 1);
        apply_all(&mut expense, &events);
        assert_eq!(expense.status(), ExpenseStatus::Draft);

        // Submission under a lenient policy approves directly.
        let submit = SubmitExpense {
            hub_id,
            expense_id,
            policy: lenient_policy(),
            occurred_at: test_time(),
        };
        let events = expense
            .handle(&ExpenseCommand::SubmitExpense(submit))
            .unwrap();
        assert_eq!(events.len(), 2);
        apply_all(&mut expense, &events);
        assert_eq!(expense.status(), ExpenseStatus::Approved);
    }

    #[test]
    fn submit_above_threshold_moves_to_pending() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        let mut cmd = record_cmd(hub_id, expense_id, 50_000, 0, strict_policy(100));
        cmd.as_draft = true;
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        apply_all(&mut expense, &events);

        let submit = SubmitExpense {
            hub_id,
            expense_id,
            policy: strict_policy(100),
            occurred_at: test_time(),
        };
        let events = expense
            .handle(&ExpenseCommand::SubmitExpense(submit))
            .unwrap();
        assert_eq!(events.len(), 1);
        apply_all(&mut expense, &events);
        assert_eq!(expense.status(), ExpenseStatus::PendingApproval);
    }

    #[test]
    fn approve_from_pending_records_approver() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let approver = test_user_id();
        let mut expense = Expense::empty(expense_id);

        let cmd = record_cmd(hub_id, expense_id, 50_000, 0, strict_policy(10_000));
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        apply_all(&mut expense, &events);

        let approve = ApproveExpense {
            hub_id,
            expense_id,
            approved_by: approver,
            occurred_at: test_time(),
        };
        let events = expense
            .handle(&ExpenseCommand::ApproveExpense(approve))
            .unwrap();
        match &events[0] {
            ExpenseEvent::ExpenseApproved(e) => {
                assert_eq!(e.approved_by, Some(approver));
                assert_eq!(e.total, 50_000);
            }
            _ => panic!("Expected ExpenseApproved event"),
        }
        apply_all(&mut expense, &events);
        assert_eq!(expense.status(), ExpenseStatus::Approved);
        assert_eq!(expense.approved_by(), Some(approver));
    }

    #[test]
    fn approve_outside_pending_is_invalid_transition() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        // Auto-approved on record.
        let cmd = record_cmd(hub_id, expense_id, 1_000, 0, lenient_policy());
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        apply_all(&mut expense, &events);
        assert_eq!(expense.status(), ExpenseStatus::Approved);

        let approve = ApproveExpense {
            hub_id,
            expense_id,
            approved_by: test_user_id(),
            occurred_at: test_time(),
        };
        let err = expense
            .handle(&ExpenseCommand::ApproveExpense(approve))
            .unwrap_err();
        match err {
            DomainError::InvalidTransition(_) => {}
            _ => panic!("Expected InvalidTransition approving an approved expense"),
        }
    }

    #[test]
    fn reject_then_approve_fails_and_state_is_unchanged() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        let cmd = record_cmd(hub_id, expense_id, 50_000, 0, strict_policy(100));
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        apply_all(&mut expense, &events);

        let reject = RejectExpense {
            hub_id,
            expense_id,
            rejected_by: test_user_id(),
            occurred_at: test_time(),
        };
        let events = expense
            .handle(&ExpenseCommand::RejectExpense(reject))
            .unwrap();
        apply_all(&mut expense, &events);
        assert_eq!(expense.status(), ExpenseStatus::Rejected);

        let version_before = expense.version();
        let approve = ApproveExpense {
            hub_id,
            expense_id,
            approved_by: test_user_id(),
            occurred_at: test_time(),
        };
        let err = expense
            .handle(&ExpenseCommand::ApproveExpense(approve))
            .unwrap_err();
        match err {
            DomainError::InvalidTransition(_) => {}
            _ => panic!("Expected InvalidTransition approving a rejected expense"),
        }
        assert_eq!(expense.version(), version_before);
        assert_eq!(expense.status(), ExpenseStatus::Rejected);
    }

    #[test]
    fn mark_paid_requires_approved() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        let cmd = record_cmd(hub_id, expense_id, 50_000, 0, strict_policy(100));
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        apply_all(&mut expense, &events);

        let pay = MarkExpensePaid {
            hub_id,
            expense_id,
            payment_method: Some("card".to_string()),
            payment_reference: None,
            occurred_at: test_time(),
        };
        let err = expense
            .handle(&ExpenseCommand::MarkExpensePaid(pay.clone()))
            .unwrap_err();
        match err {
            DomainError::InvalidTransition(_) => {}
            _ => panic!("Expected InvalidTransition paying a pending expense"),
        }

        let approve = ApproveExpense {
            hub_id,
            expense_id,
            approved_by: test_user_id(),
            occurred_at: test_time(),
        };
        let events = expense
            .handle(&ExpenseCommand::ApproveExpense(approve))
            .unwrap();
        apply_all(&mut expense, &events);

        let events = expense
            .handle(&ExpenseCommand::MarkExpensePaid(pay))
            .unwrap();
        apply_all(&mut expense, &events);
        assert_eq!(expense.status(), ExpenseStatus::Paid);
        assert_eq!(expense.payment_method(), Some("card"));
        assert!(expense.paid_at().is_some());
    }

    #[test]
    fn paid_is_terminal_for_status_commands() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        let cmd = record_cmd(hub_id, expense_id, 1_000, 0, lenient_policy());
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        apply_all(&mut expense, &events);

        let pay = MarkExpensePaid {
            hub_id,
            expense_id,
            payment_method: None,
            payment_reference: None,
            occurred_at: test_time(),
        };
        let events = expense
            .handle(&ExpenseCommand::MarkExpensePaid(pay.clone()))
            .unwrap();
        apply_all(&mut expense, &events);
        assert_eq!(expense.status(), ExpenseStatus::Paid);

        // Paying again or approving are both illegal.
        assert!(matches!(
            expense
                .handle(&ExpenseCommand::MarkExpensePaid(pay))
                .unwrap_err(),
            DomainError::InvalidTransition(_)
        ));
        let approve = ApproveExpense {
            hub_id,
            expense_id,
            approved_by: test_user_id(),
            occurred_at: test_time(),
        };
        assert!(matches!(
            expense
                .handle(&ExpenseCommand::ApproveExpense(approve))
                .unwrap_err(),
            DomainError::InvalidTransition(_)
        ));
    }

    #[test]
    fn amend_pending_recomputes_without_supplier_effect() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        let cmd = record_cmd(hub_id, expense_id, 50_000, 2100, strict_policy(100));
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        apply_all(&mut expense, &events);

        let amend = AmendExpense {
            hub_id,
            expense_id,
            amount: Some(20_000),
            tax_rate: None,
            supplier_id: None,
            category_id: None,
            expense_date: None,
            receipt_ref: None,
            payment_method: None,
            payment_reference: None,
            occurred_at: test_time(),
        };
        let events = expense
            .handle(&ExpenseCommand::AmendExpense(amend))
            .unwrap();
        match &events[0] {
            ExpenseEvent::ExpenseAmended(e) => {
                assert_eq!(e.amount, 20_000);
                assert_eq!(e.tax_amount, 4_200);
                assert_eq!(e.total, 24_200);
                assert!(!e.applies_supplier_effect);
            }
            _ => panic!("Expected ExpenseAmended event"),
        }
        apply_all(&mut expense, &events);
        assert_eq!(expense.total(), 24_200);
        assert_eq!(expense.status(), ExpenseStatus::PendingApproval);
    }

    #[test]
    fn amend_approved_carries_reversal_data() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let supplier = test_supplier_id();
        let mut expense = Expense::empty(expense_id);

        let mut cmd = record_cmd(hub_id, expense_id, 10_000, 0, lenient_policy());
        cmd.supplier_id = Some(supplier);
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        apply_all(&mut expense, &events);
        assert_eq!(expense.status(), ExpenseStatus::Approved);

        let amend = AmendExpense {
            hub_id,
            expense_id,
            amount: Some(30_000),
            tax_rate: None,
            supplier_id: None,
            category_id: None,
            expense_date: None,
            receipt_ref: None,
            payment_method: None,
            payment_reference: None,
            occurred_at: test_time(),
        };
        let events = expense
            .handle(&ExpenseCommand::AmendExpense(amend))
            .unwrap();
        match &events[0] {
            ExpenseEvent::ExpenseAmended(e) => {
                assert!(e.applies_supplier_effect);
                assert_eq!(e.previous_supplier_id, Some(supplier));
                assert_eq!(e.previous_total, 10_000);
                assert_eq!(e.total, 30_000);
            }
            _ => panic!("Expected ExpenseAmended event"),
        }
    }

    #[test]
    fn amend_with_only_details_emits_details_updated() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        let cmd = record_cmd(hub_id, expense_id, 10_000, 0, lenient_policy());
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        apply_all(&mut expense, &events);

        let amend = AmendExpense {
            hub_id,
            expense_id,
            amount: None,
            tax_rate: None,
            supplier_id: None,
            category_id: None,
            expense_date: None,
            receipt_ref: Some("receipts/2024/0001.jpg".to_string()),
            payment_method: None,
            payment_reference: None,
            occurred_at: test_time(),
        };
        let events = expense
            .handle(&ExpenseCommand::AmendExpense(amend))
            .unwrap();
        match &events[0] {
            ExpenseEvent::ExpenseDetailsUpdated(e) => {
                assert_eq!(e.receipt_ref.as_deref(), Some("receipts/2024/0001.jpg"));
            }
            _ => panic!("Expected ExpenseDetailsUpdated event"),
        }
        apply_all(&mut expense, &events);
        assert_eq!(expense.receipt_ref(), Some("receipts/2024/0001.jpg"));
        // Totals untouched by a details-only amendment.
        assert_eq!(expense.total(), 10_000);
    }

    #[test]
    fn amend_rejected_is_invalid_transition() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        let cmd = record_cmd(hub_id, expense_id, 50_000, 0, strict_policy(100));
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        apply_all(&mut expense, &events);
        let reject = RejectExpense {
            hub_id,
            expense_id,
            rejected_by: test_user_id(),
            occurred_at: test_time(),
        };
        let events = expense
            .handle(&ExpenseCommand::RejectExpense(reject))
            .unwrap();
        apply_all(&mut expense, &events);

        let amend = AmendExpense {
            hub_id,
            expense_id,
            amount: Some(1),
            tax_rate: None,
            supplier_id: None,
            category_id: None,
            expense_date: None,
            receipt_ref: None,
            payment_method: None,
            payment_reference: None,
            occurred_at: test_time(),
        };
        assert!(matches!(
            expense
                .handle(&ExpenseCommand::AmendExpense(amend))
                .unwrap_err(),
            DomainError::InvalidTransition(_)
        ));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let hub_id = test_hub_id();
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);

        let cmd = record_cmd(hub_id, expense_id, 50_000, 0, strict_policy(100));
        let events = expense
            .handle(&ExpenseCommand::RecordExpense(cmd))
            .unwrap();
        apply_all(&mut expense, &events);

        let approve = ApproveExpense {
            hub_id,
            expense_id,
            approved_by: test_user_id(),
            occurred_at: test_time(),
        };
        let before = expense.clone();
        let events1 = expense
            .handle(&ExpenseCommand::ApproveExpense(approve.clone()))
            .unwrap();
        let events2 = expense
            .handle(&ExpenseCommand::ApproveExpense(approve))
            .unwrap();
        assert_eq!(expense, before);
        assert_eq!(events1, events2);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: tax and total always satisfy the derivation rule,
            /// at every observed state.
            #[test]
            fn totals_follow_derivation_rule(
                amount in 1u64..=10_000_000_000,
                bps in 0u16..=10_000,
                new_amount in 1u64..=10_000_000_000,
                new_bps in 0u16..=10_000,
            ) {
                let hub_id = test_hub_id();
                let expense_id = test_expense_id();
                let mut expense = Expense::empty(expense_id);

                let cmd = record_cmd(hub_id, expense_id, amount, bps, strict_policy(0));
                let events = expense.handle(&ExpenseCommand::RecordExpense(cmd)).unwrap();
                apply_all(&mut expense, &events);

                prop_assert_eq!(expense.tax_amount(), expense.tax_rate().tax_on(expense.amount()));
                prop_assert_eq!(expense.total(), expense.amount() + expense.tax_amount());

                let amend = AmendExpense {
                    hub_id,
                    expense_id,
                    amount: Some(new_amount),
                    tax_rate: Some(TaxRate::from_basis_points(new_bps).unwrap()),
                    supplier_id: None,
                    category_id: None,
                    expense_date: None,
                    receipt_ref: None,
                    payment_method: None,
                    payment_reference: None,
                    occurred_at: test_time(),
                };
                let events = expense.handle(&ExpenseCommand::AmendExpense(amend)).unwrap();
                apply_all(&mut expense, &events);

                prop_assert_eq!(expense.tax_amount(), expense.tax_rate().tax_on(expense.amount()));
                prop_assert_eq!(expense.total(), expense.amount() + expense.tax_amount());
            }

            /// Property: initial status is exactly determined by the policy
            /// and the gross total.
            #[test]
            fn initial_status_matches_policy(
                amount in 1u64..=1_000_000,
                threshold in 0u64..=2_000_000,
                require_approval in proptest::bool::ANY,
            ) {
                let hub_id = test_hub_id();
                let expense_id = test_expense_id();
                let mut expense = Expense::empty(expense_id);
                let policy = ApprovalPolicy { require_approval, threshold };

                let cmd = record_cmd(hub_id, expense_id, amount, 0, policy);
                let events = expense.handle(&ExpenseCommand::RecordExpense(cmd)).unwrap();
                apply_all(&mut expense, &events);

                let expected = if !require_approval || amount <= threshold {
                    ExpenseStatus::Approved
                } else {
                    ExpenseStatus::PendingApproval
                };
                prop_assert_eq!(expense.status(), expected);
            }
        }
    }
}

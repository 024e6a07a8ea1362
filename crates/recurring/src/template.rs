use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use hubledger_categories::CategoryId;
use hubledger_core::{Aggregate, AggregateId, AggregateRoot, DomainError, HubId, TaxRate};
use hubledger_events::Event;
use hubledger_expenses::ExpenseId;
use hubledger_suppliers::SupplierId;

/// Recurring template identifier (hub-scoped via `hub_id` fields in
/// events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecurringExpenseId(pub AggregateId);

impl RecurringExpenseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for RecurringExpenseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Generation cadence for a recurring template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    /// One period forward, clamping day-of-month to the target month's length
    /// (Jan 31 + monthly → Feb 28/29; Feb 29 + yearly → Feb 28 off leap years).
    pub fn advance(&self, from: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Weekly => from + Duration::days(7),
            Frequency::Monthly => shift_months(from, 1),
            Frequency::Quarterly => shift_months(from, 3),
            Frequency::Yearly => shift_months(from, 12),
        }
    }

    /// Advance at least once, then until strictly past `as_of`. Used for
    /// catch-up after missed ticks: one generated expense, the due date
    /// lands in the future.
    pub fn next_after(&self, from: NaiveDate, as_of: NaiveDate) -> NaiveDate {
        let mut next = self.advance(from);
        while next <= as_of {
            next = self.advance(next);
        }
        next
    }
}

impl core::fmt::Display for Frequency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        };
        f.write_str(label)
    }
}

fn shift_months(date: NaiveDate, months: i32) -> NaiveDate {
    let mut year = date.year();
    let mut month = date.month() as i32 + months;
    while month > 12 {
        month -= 12;
        year += 1;
    }
    while month < 1 {
        month += 12;
        year -= 1;
    }
    let month = month as u32;
    let day = date.day().min(days_in_month(year, month));
    // Year/month/day are normalized above; construction cannot fail.
    NaiveDate::from_ymd_opt(year, month, day).expect("normalized calendar date")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_of_next =
        NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("normalized calendar date");
    (first_of_next - Duration::days(1)).day()
}

/// Aggregate root: RecurringExpense.
///
/// Template fields mirror the creatable parts of an expense (no status).
/// `next_due_date` only moves through `RecordGeneration`, and only after the
/// expense engine created the materialized expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringExpense {
    id: RecurringExpenseId,
    hub_id: Option<HubId>,
    title: String,
    supplier_id: Option<SupplierId>,
    category_id: Option<CategoryId>,
    /// Net amount in minor units.
    amount: u64,
    /// Per-template override; None means the hub default applies at
    /// generation time.
    tax_rate: Option<TaxRate>,
    frequency: Frequency,
    next_due_date: NaiveDate,
    auto_create: bool,
    active: bool,
    last_generated: Option<NaiveDate>,
    version: u64,
    created: bool,
}

impl RecurringExpense {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: RecurringExpenseId) -> Self {
        Self {
            id,
            hub_id: None,
            title: String::new(),
            supplier_id: None,
            category_id: None,
            amount: 0,
            tax_rate: None,
            frequency: Frequency::Monthly,
            next_due_date: NaiveDate::default(),
            auto_create: false,
            active: true,
            last_generated: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RecurringExpenseId {
        self.id
    }

    pub fn hub_id(&self) -> Option<HubId> {
        self.hub_id
    }

    pub fn title(&self) -> &str {
        &self.title
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

    pub fn tax_rate(&self) -> Option<TaxRate> {
        self.tax_rate
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn next_due_date(&self) -> NaiveDate {
        self.next_due_date
    }

    pub fn auto_create(&self) -> bool {
        self.auto_create
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn last_generated(&self) -> Option<NaiveDate> {
        self.last_generated
    }

    /// Whether this template should be considered on a tick for `as_of`.
    pub fn is_due(&self, as_of: NaiveDate) -> bool {
        self.active && self.next_due_date <= as_of
    }
}

impl AggregateRoot for RecurringExpense {
    type Id = RecurringExpenseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: DefineRecurringExpense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefineRecurringExpense {
    pub hub_id: HubId,
    pub template_id: RecurringExpenseId,
    pub title: String,
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    pub amount: u64,
    pub tax_rate: Option<TaxRate>,
    pub frequency: Frequency,
    pub next_due_date: NaiveDate,
    pub auto_create: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateRecurringExpense (None fields keep the existing value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecurringExpense {
    pub hub_id: HubId,
    pub template_id: RecurringExpenseId,
    pub title: Option<String>,
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    pub amount: Option<u64>,
    pub tax_rate: Option<TaxRate>,
    pub frequency: Option<Frequency>,
    pub next_due_date: Option<NaiveDate>,
    pub auto_create: Option<bool>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeactivateRecurringExpense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateRecurringExpense {
    pub hub_id: HubId,
    pub template_id: RecurringExpenseId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReactivateRecurringExpense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateRecurringExpense {
    pub hub_id: HubId,
    pub template_id: RecurringExpenseId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordGeneration.
///
/// Issued by the scheduler after the expense engine successfully created
/// the materialized expense; this is the only way `next_due_date` advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordGeneration {
    pub hub_id: HubId,
    pub template_id: RecurringExpenseId,
    pub generated_expense_id: ExpenseId,
    /// The due date this generation satisfies; must equal the template's
    /// current `next_due_date` (idempotency guard).
    pub generated_for: NaiveDate,
    /// The advanced due date; must be strictly after `generated_for`.
    pub next_due_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurringExpenseCommand {
    DefineRecurringExpense(DefineRecurringExpense),
    UpdateRecurringExpense(UpdateRecurringExpense),
    DeactivateRecurringExpense(DeactivateRecurringExpense),
    ReactivateRecurringExpense(ReactivateRecurringExpense),
    RecordGeneration(RecordGeneration),
}

/// Event: RecurringExpenseDefined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringExpenseDefined {
    pub hub_id: HubId,
    pub template_id: RecurringExpenseId,
    pub title: String,
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    pub amount: u64,
    pub tax_rate: Option<TaxRate>,
    pub frequency: Frequency,
    pub next_due_date: NaiveDate,
    pub auto_create: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RecurringExpenseUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringExpenseUpdated {
    pub hub_id: HubId,
    pub template_id: RecurringExpenseId,
    pub title: String,
    pub supplier_id: Option<SupplierId>,
    pub category_id: Option<CategoryId>,
    pub amount: u64,
    pub tax_rate: Option<TaxRate>,
    pub frequency: Frequency,
    pub next_due_date: NaiveDate,
    pub auto_create: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RecurringExpenseDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringExpenseDeactivated {
    pub hub_id: HubId,
    pub template_id: RecurringExpenseId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RecurringExpenseReactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringExpenseReactivated {
    pub hub_id: HubId,
    pub template_id: RecurringExpenseId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RecurringExpenseGenerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringExpenseGenerated {
    pub hub_id: HubId,
    pub template_id: RecurringExpenseId,
    pub generated_expense_id: ExpenseId,
    pub generated_for: NaiveDate,
    pub next_due_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurringExpenseEvent {
    RecurringExpenseDefined(RecurringExpenseDefined),
    RecurringExpenseUpdated(RecurringExpenseUpdated),
    RecurringExpenseDeactivated(RecurringExpenseDeactivated),
    RecurringExpenseReactivated(RecurringExpenseReactivated),
    RecurringExpenseGenerated(RecurringExpenseGenerated),
}

impl Event for RecurringExpenseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RecurringExpenseEvent::RecurringExpenseDefined(_) => "recurring.template.defined",
            RecurringExpenseEvent::RecurringExpenseUpdated(_) => "recurring.template.updated",
            RecurringExpenseEvent::RecurringExpenseDeactivated(_) => {
                "recurring.template.deactivated"
            }
            RecurringExpenseEvent::RecurringExpenseReactivated(_) => {
                "recurring.template.reactivated"
            }
            RecurringExpenseEvent::RecurringExpenseGenerated(_) => "recurring.template.generated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RecurringExpenseEvent::RecurringExpenseDefined(e) => e.occurred_at,
            RecurringExpenseEvent::RecurringExpenseUpdated(e) => e.occurred_at,
            RecurringExpenseEvent::RecurringExpenseDeactivated(e) => e.occurred_at,
            RecurringExpenseEvent::RecurringExpenseReactivated(e) => e.occurred_at,
            RecurringExpenseEvent::RecurringExpenseGenerated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for RecurringExpense {
    type Command = RecurringExpenseCommand;
    type Event = RecurringExpenseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RecurringExpenseEvent::RecurringExpenseDefined(e) => {
                self.id = e.template_id;
                self.hub_id = Some(e.hub_id);
                self.title = e.title.clone();
                self.supplier_id = e.supplier_id;
                self.category_id = e.category_id;
                self.amount = e.amount;
                self.tax_rate = e.tax_rate;
                self.frequency = e.frequency;
                self.next_due_date = e.next_due_date;
                self.auto_create = e.auto_create;
                self.active = true;
                self.last_generated = None;
                self.created = true;
            }
            RecurringExpenseEvent::RecurringExpenseUpdated(e) => {
                self.title = e.title.clone();
                self.supplier_id = e.supplier_id;
                self.category_id = e.category_id;
                self.amount = e.amount;
                self.tax_rate = e.tax_rate;
                self.frequency = e.frequency;
                self.next_due_date = e.next_due_date;
                self.auto_create = e.auto_create;
            }
            RecurringExpenseEvent::RecurringExpenseDeactivated(_) => {
                self.active = false;
            }
            RecurringExpenseEvent::RecurringExpenseReactivated(_) => {
                self.active = true;
            }
            RecurringExpenseEvent::RecurringExpenseGenerated(e) => {
                self.last_generated = Some(e.generated_for);
                self.next_due_date = e.next_due_date;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RecurringExpenseCommand::DefineRecurringExpense(cmd) => self.handle_define(cmd),
            RecurringExpenseCommand::UpdateRecurringExpense(cmd) => self.handle_update(cmd),
            RecurringExpenseCommand::DeactivateRecurringExpense(cmd) => self.handle_deactivate(cmd),
            RecurringExpenseCommand::ReactivateRecurringExpense(cmd) => self.handle_reactivate(cmd),
            RecurringExpenseCommand::RecordGeneration(cmd) => self.handle_generation(cmd),
        }
    }
}

impl RecurringExpense {
    fn ensure_hub(&self, hub_id: HubId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.hub_id != Some(hub_id) {
            return Err(DomainError::validation("hub mismatch"));
        }
        Ok(())
    }

    fn ensure_template_id(&self, template_id: RecurringExpenseId) -> Result<(), DomainError> {
        if self.id != template_id {
            return Err(DomainError::validation("template_id mismatch"));
        }
        Ok(())
    }

    fn handle_define(
        &self,
        cmd: &DefineRecurringExpense,
    ) -> Result<Vec<RecurringExpenseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("recurring expense already exists"));
        }
        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if cmd.amount == 0 {
            return Err(DomainError::validation("amount must be positive"));
        }

        Ok(vec![RecurringExpenseEvent::RecurringExpenseDefined(
            RecurringExpenseDefined {
                hub_id: cmd.hub_id,
                template_id: cmd.template_id,
                title: cmd.title.clone(),
                supplier_id: cmd.supplier_id,
                category_id: cmd.category_id,
                amount: cmd.amount,
                tax_rate: cmd.tax_rate,
                frequency: cmd.frequency,
                next_due_date: cmd.next_due_date,
                auto_create: cmd.auto_create,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_update(
        &self,
        cmd: &UpdateRecurringExpense,
    ) -> Result<Vec<RecurringExpenseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_hub(cmd.hub_id)?;
        self.ensure_template_id(cmd.template_id)?;

        let new_title = cmd.title.clone().unwrap_or_else(|| self.title.clone());
        if new_title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        let new_amount = cmd.amount.unwrap_or(self.amount);
        if new_amount == 0 {
            return Err(DomainError::validation("amount must be positive"));
        }

        Ok(vec![RecurringExpenseEvent::RecurringExpenseUpdated(
            RecurringExpenseUpdated {
                hub_id: cmd.hub_id,
                template_id: cmd.template_id,
                title: new_title,
                supplier_id: cmd.supplier_id.or(self.supplier_id),
                category_id: cmd.category_id.or(self.category_id),
                amount: new_amount,
                tax_rate: cmd.tax_rate.or(self.tax_rate),
                frequency: cmd.frequency.unwrap_or(self.frequency),
                next_due_date: cmd.next_due_date.unwrap_or(self.next_due_date),
                auto_create: cmd.auto_create.unwrap_or(self.auto_create),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_deactivate(
        &self,
        cmd: &DeactivateRecurringExpense,
    ) -> Result<Vec<RecurringExpenseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_hub(cmd.hub_id)?;
        self.ensure_template_id(cmd.template_id)?;

        if !self.active {
            return Err(DomainError::conflict("recurring expense is already inactive"));
        }

        Ok(vec![RecurringExpenseEvent::RecurringExpenseDeactivated(
            RecurringExpenseDeactivated {
                hub_id: cmd.hub_id,
                template_id: cmd.template_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_reactivate(
        &self,
        cmd: &ReactivateRecurringExpense,
    ) -> Result<Vec<RecurringExpenseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_hub(cmd.hub_id)?;
        self.ensure_template_id(cmd.template_id)?;

        if self.active {
            return Err(DomainError::conflict("recurring expense is already active"));
        }

        Ok(vec![RecurringExpenseEvent::RecurringExpenseReactivated(
            RecurringExpenseReactivated {
                hub_id: cmd.hub_id,
                template_id: cmd.template_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_generation(
        &self,
        cmd: &RecordGeneration,
    ) -> Result<Vec<RecurringExpenseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_hub(cmd.hub_id)?;
        self.ensure_template_id(cmd.template_id)?;

        if !self.active {
            return Err(DomainError::invalid_transition(
                "inactive templates do not generate expenses",
            ));
        }
        if cmd.generated_for != self.next_due_date {
            return Err(DomainError::conflict(format!(
                "generation targets {} but the template is due {}",
                cmd.generated_for, self.next_due_date
            )));
        }
        if cmd.next_due_date <= cmd.generated_for {
            return Err(DomainError::validation(
                "next due date must move strictly forward",
            ));
        }

        Ok(vec![RecurringExpenseEvent::RecurringExpenseGenerated(
            RecurringExpenseGenerated {
                hub_id: cmd.hub_id,
                template_id: cmd.template_id,
                generated_expense_id: cmd.generated_expense_id,
                generated_for: cmd.generated_for,
                next_due_date: cmd.next_due_date,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubledger_core::AggregateId;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_hub_id() -> HubId {
        HubId::new()
    }

    fn test_template_id() -> RecurringExpenseId {
        RecurringExpenseId::new(AggregateId::new())
    }

    fn test_expense_id() -> ExpenseId {
        ExpenseId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn defined(
        hub_id: HubId,
        template_id: RecurringExpenseId,
        next_due: NaiveDate,
        auto_create: bool,
    ) -> RecurringExpense {
        let mut template = RecurringExpense::empty(template_id);
        let cmd = DefineRecurringExpense {
            hub_id,
            template_id,
            title: "Office rent".to_string(),
            supplier_id: None,
            category_id: None,
            amount: 80_000,
            tax_rate: None,
            frequency: Frequency::Monthly,
            next_due_date: next_due,
            auto_create,
            occurred_at: test_time(),
        };
        let events = template
            .handle(&RecurringExpenseCommand::DefineRecurringExpense(cmd))
            .unwrap();
        template.apply(&events[0]);
        template
    }

    #[test]
    fn weekly_advance_adds_seven_days() {
        assert_eq!(
            Frequency::Weekly.advance(ymd(2024, 1, 29)),
            ymd(2024, 2, 5)
        );
    }

    #[test]
    fn monthly_advance_clamps_to_month_length() {
        assert_eq!(
            Frequency::Monthly.advance(ymd(2024, 1, 31)),
            ymd(2024, 2, 29)
        );
        assert_eq!(
            Frequency::Monthly.advance(ymd(2023, 1, 31)),
            ymd(2023, 2, 28)
        );
        assert_eq!(
            Frequency::Monthly.advance(ymd(2024, 3, 31)),
            ymd(2024, 4, 30)
        );
        assert_eq!(
            Frequency::Monthly.advance(ymd(2024, 12, 15)),
            ymd(2025, 1, 15)
        );
    }

    #[test]
    fn quarterly_advance_clamps_across_year_end() {
        assert_eq!(
            Frequency::Quarterly.advance(ymd(2024, 11, 30)),
            ymd(2025, 2, 28)
        );
        assert_eq!(
            Frequency::Quarterly.advance(ymd(2024, 5, 31)),
            ymd(2024, 8, 31)
        );
    }

    #[test]
    fn yearly_advance_clamps_leap_day() {
        assert_eq!(
            Frequency::Yearly.advance(ymd(2024, 2, 29)),
            ymd(2025, 2, 28)
        );
        assert_eq!(
            Frequency::Yearly.advance(ymd(2023, 6, 15)),
            ymd(2024, 6, 15)
        );
    }

    #[test]
    fn next_after_skips_missed_periods() {
        // Scheduler was down for three months; one advance call lands in the
        // future relative to as_of.
        let next = Frequency::Monthly.next_after(ymd(2024, 1, 31), ymd(2024, 4, 15));
        assert_eq!(next, ymd(2024, 4, 30));
    }

    #[test]
    fn define_rejects_zero_amount_and_blank_title() {
        let template = RecurringExpense::empty(test_template_id());
        let mut cmd = DefineRecurringExpense {
            hub_id: test_hub_id(),
            template_id: test_template_id(),
            title: "Hosting".to_string(),
            supplier_id: None,
            category_id: None,
            amount: 0,
            tax_rate: None,
            frequency: Frequency::Monthly,
            next_due_date: ymd(2024, 1, 1),
            auto_create: true,
            occurred_at: test_time(),
        };
        assert!(
            template
                .handle(&RecurringExpenseCommand::DefineRecurringExpense(cmd.clone()))
                .is_err()
        );
        cmd.amount = 1_000;
        cmd.title = "  ".to_string();
        assert!(
            template
                .handle(&RecurringExpenseCommand::DefineRecurringExpense(cmd))
                .is_err()
        );
    }

    #[test]
    fn is_due_respects_active_flag_and_date() {
        let hub_id = test_hub_id();
        let template_id = test_template_id();
        let mut template = defined(hub_id, template_id, ymd(2024, 2, 1), true);

        assert!(template.is_due(ymd(2024, 2, 1)));
        assert!(template.is_due(ymd(2024, 3, 1)));
        assert!(!template.is_due(ymd(2024, 1, 31)));

        let cmd = DeactivateRecurringExpense {
            hub_id,
            template_id,
            occurred_at: test_time(),
        };
        let events = template
            .handle(&RecurringExpenseCommand::DeactivateRecurringExpense(cmd))
            .unwrap();
        template.apply(&events[0]);
        assert!(!template.is_due(ymd(2024, 3, 1)));
    }

    #[test]
    fn record_generation_advances_due_date_once() {
        let hub_id = test_hub_id();
        let template_id = test_template_id();
        let mut template = defined(hub_id, template_id, ymd(2024, 1, 31), true);

        let cmd = RecordGeneration {
            hub_id,
            template_id,
            generated_expense_id: test_expense_id(),
            generated_for: ymd(2024, 1, 31),
            next_due_date: ymd(2024, 2, 29),
            occurred_at: test_time(),
        };
        let events = template
            .handle(&RecurringExpenseCommand::RecordGeneration(cmd.clone()))
            .unwrap();
        template.apply(&events[0]);

        assert_eq!(template.next_due_date(), ymd(2024, 2, 29));
        assert_eq!(template.last_generated(), Some(ymd(2024, 1, 31)));

        // Replaying the same generation now conflicts: the due date moved.
        let err = template
            .handle(&RecurringExpenseCommand::RecordGeneration(cmd))
            .unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict replaying a completed generation"),
        }
    }

    #[test]
    fn record_generation_requires_forward_motion() {
        let hub_id = test_hub_id();
        let template_id = test_template_id();
        let template = defined(hub_id, template_id, ymd(2024, 1, 31), true);

        let cmd = RecordGeneration {
            hub_id,
            template_id,
            generated_expense_id: test_expense_id(),
            generated_for: ymd(2024, 1, 31),
            next_due_date: ymd(2024, 1, 31),
            occurred_at: test_time(),
        };
        assert!(matches!(
            template
                .handle(&RecurringExpenseCommand::RecordGeneration(cmd))
                .unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn record_generation_rejected_for_inactive_template() {
        let hub_id = test_hub_id();
        let template_id = test_template_id();
        let mut template = defined(hub_id, template_id, ymd(2024, 1, 31), true);

        let cmd = DeactivateRecurringExpense {
            hub_id,
            template_id,
            occurred_at: test_time(),
        };
        let events = template
            .handle(&RecurringExpenseCommand::DeactivateRecurringExpense(cmd))
            .unwrap();
        template.apply(&events[0]);

        let generate = RecordGeneration {
            hub_id,
            template_id,
            generated_expense_id: test_expense_id(),
            generated_for: ymd(2024, 1, 31),
            next_due_date: ymd(2024, 2, 29),
            occurred_at: test_time(),
        };
        assert!(matches!(
            template
                .handle(&RecurringExpenseCommand::RecordGeneration(generate))
                .unwrap_err(),
            DomainError::InvalidTransition(_)
        ));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_frequency() -> impl Strategy<Value = Frequency> {
            prop_oneof![
                Just(Frequency::Weekly),
                Just(Frequency::Monthly),
                Just(Frequency::Quarterly),
                Just(Frequency::Yearly),
            ]
        }

        proptest! {
            /// Property: advancing always moves strictly forward and keeps a
            /// valid calendar date.
            #[test]
            fn advance_is_strictly_increasing(
                days in 0i64..=20_000,
                frequency in arb_frequency(),
            ) {
                let from = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
                    + Duration::days(days);
                let next = frequency.advance(from);
                prop_assert!(next > from);
            }

            /// Property: next_after lands strictly past as_of in one call.
            #[test]
            fn next_after_lands_past_as_of(
                days in 0i64..=10_000,
                gap in 0i64..=2_000,
                frequency in arb_frequency(),
            ) {
                let from = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
                    + Duration::days(days);
                let as_of = from + Duration::days(gap);
                let next = frequency.next_after(from, as_of);
                prop_assert!(next > as_of);
            }
        }
    }
}

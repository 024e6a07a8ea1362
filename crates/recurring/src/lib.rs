//! `hubledger-recurring` — recurring expense templates.
//!
//! Templates describe an expense to materialize on a schedule. The scheduler
//! in `hubledger-infra` asks which templates are due and drives generation
//! through the expense engine's creation contract.

pub mod template;

pub use template::{
    DeactivateRecurringExpense, DefineRecurringExpense, Frequency, ReactivateRecurringExpense,
    RecordGeneration, RecurringExpense, RecurringExpenseCommand, RecurringExpenseEvent,
    RecurringExpenseId, UpdateRecurringExpense,
};

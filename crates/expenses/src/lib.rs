//! `hubledger-expenses` — the expense lifecycle core.
//!
//! Owns the expense entity, its status state machine, tax/total computation,
//! and the per-hub settings (approval policy, default tax rate, numbering).

pub mod expense;
pub mod settings;

pub use expense::{
    AmendExpense, ApproveExpense, Expense, ExpenseCommand, ExpenseEvent, ExpenseId, ExpenseStatus,
    MarkExpensePaid, RecordExpense, RejectExpense, SubmitExpense,
};
pub use settings::{ApprovalPolicy, ExpenseSettings, compose_number};

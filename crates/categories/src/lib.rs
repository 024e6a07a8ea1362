//! `hubledger-categories` — hierarchical expense classification.
//!
//! The aggregate owns a single category's lifecycle; [`tree::CategoryTree`]
//! is the read-side view the expense engine consults to resolve references
//! and to reject cyclic parent assignments.

pub mod category;
pub mod tree;

pub use category::{
    CategoryCommand, CategoryEvent, CategoryId, DefineCategory, DeleteCategory, ExpenseCategory,
    ReassignCategoryParent, UpdateCategory,
};
pub use tree::{CategoryRecord, CategoryTree};

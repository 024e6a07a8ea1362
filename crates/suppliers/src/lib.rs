//! `hubledger-suppliers` — supplier/vendor master data.
//!
//! Running spend totals are NOT part of this aggregate: they are a read
//! model owned by the expense engine's transition logic (see
//! `hubledger-infra`'s supplier spend projection).

pub mod supplier;

pub use supplier::{
    ArchiveSupplier, ContactInfo, RegisterSupplier, Supplier, SupplierCommand, SupplierEvent,
    SupplierId, SupplierStatus, UpdateSupplierDetails,
};

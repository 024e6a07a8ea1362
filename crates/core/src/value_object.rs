//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two instances
/// with the same attributes are the same value. `TaxRate` and `Currency` are
/// value objects; an `Expense` is an entity (same id = same record, even as
/// its fields change).
///
/// To "modify" a value object, construct a new one. The trait only requires
/// `Clone + PartialEq + Debug` so values stay cheap to copy, comparable, and
/// loggable.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

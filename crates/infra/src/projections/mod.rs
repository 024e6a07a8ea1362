//! Synchronous read-model projections.
//!
//! Each projection consumes stored-event envelopes, keeps a per-stream
//! cursor for idempotent application, and writes into a disposable
//! [`crate::read_model::HubStore`]. The engine feeds every committed event
//! to every projection; projections filter by aggregate type.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use hubledger_core::{AggregateId, HubId};

pub mod category_tree;
pub mod expense_index;
pub mod recurring_templates;
pub mod supplier_directory;
pub mod supplier_spend;

pub use category_tree::CategoryTreeProjection;
pub use expense_index::{ExpenseIndexProjection, ExpenseRecord};
pub use recurring_templates::{RecurringTemplateRecord, RecurringTemplatesProjection};
pub use supplier_directory::{SupplierDirectoryProjection, SupplierRecord};
pub use supplier_spend::{SupplierSpend, SupplierSpendProjection};

/// Projection application error.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("hub isolation violation: {0}")]
    HubIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Outcome of a cursor check for one envelope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum CursorAdvance {
    /// Sequence already applied; skip the envelope (idempotent re-delivery).
    AlreadyApplied,
    /// Next expected sequence; apply and commit.
    Fresh,
}

/// Per-(hub, aggregate) sequence cursors shared by all projections.
#[derive(Debug, Default)]
pub(crate) struct Cursors {
    inner: RwLock<HashMap<(HubId, AggregateId), u64>>,
}

impl Cursors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn check(
        &self,
        hub_id: HubId,
        aggregate_id: AggregateId,
        sequence_number: u64,
    ) -> Result<CursorAdvance, ProjectionError> {
        let last = match self.inner.read() {
            Ok(map) => *map.get(&(hub_id, aggregate_id)).unwrap_or(&0),
            Err(_) => 0,
        };

        if sequence_number == 0 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }
        if sequence_number <= last {
            return Ok(CursorAdvance::AlreadyApplied);
        }
        if sequence_number != last + 1 && last != 0 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }
        Ok(CursorAdvance::Fresh)
    }

    pub(crate) fn commit(&self, hub_id: HubId, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((hub_id, aggregate_id), sequence_number);
        }
    }

    pub(crate) fn clear_hub(&self, hub_id: HubId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(h, _), _| *h != hub_id);
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hubledger_core::{Aggregate, AggregateId, AggregateRoot, DomainError, HubId};
use hubledger_events::Event;

/// Supplier identifier (hub-scoped via `hub_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub AggregateId);

impl SupplierId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Supplier status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplierStatus {
    Active,
    Archived,
}

/// Contact information for a supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

/// Aggregate root: Supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supplier {
    id: SupplierId,
    hub_id: Option<HubId>,
    name: String,
    contact: ContactInfo,
    tax_id: Option<String>,
    status: SupplierStatus,
    version: u64,
    created: bool,
}

impl Supplier {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SupplierId) -> Self {
        Self {
            id,
            hub_id: None,
            name: String::new(),
            contact: ContactInfo::default(),
            tax_id: None,
            status: SupplierStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SupplierId {
        self.id
    }

    pub fn hub_id(&self) -> Option<HubId> {
        self.hub_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn tax_id(&self) -> Option<&str> {
        self.tax_id.as_deref()
    }

    pub fn status(&self) -> SupplierStatus {
        self.status
    }

    /// Invariant helper: archived suppliers cannot be referenced by new expenses.
    pub fn can_be_referenced(&self) -> bool {
        self.status == SupplierStatus::Active
    }
}

impl AggregateRoot for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterSupplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSupplier {
    pub hub_id: HubId,
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub tax_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateSupplierDetails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSupplierDetails {
    pub hub_id: HubId,
    pub supplier_id: SupplierId,
    /// Optional new name (if None, keep existing).
    pub name: Option<String>,
    /// Optional new contact info (if None, keep existing).
    pub contact: Option<ContactInfo>,
    /// Optional new tax id (if None, keep existing).
    pub tax_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveSupplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSupplier {
    pub hub_id: HubId,
    pub supplier_id: SupplierId,
    /// Optional human-readable reason for archiving.
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierCommand {
    RegisterSupplier(RegisterSupplier),
    UpdateSupplierDetails(UpdateSupplierDetails),
    ArchiveSupplier(ArchiveSupplier),
}

/// Event: SupplierRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRegistered {
    pub hub_id: HubId,
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    pub tax_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SupplierUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierUpdated {
    pub hub_id: HubId,
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    pub tax_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SupplierArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierArchived {
    pub hub_id: HubId,
    pub supplier_id: SupplierId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierEvent {
    SupplierRegistered(SupplierRegistered),
    SupplierUpdated(SupplierUpdated),
    SupplierArchived(SupplierArchived),
}

impl Event for SupplierEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplierEvent::SupplierRegistered(_) => "suppliers.supplier.registered",
            SupplierEvent::SupplierUpdated(_) => "suppliers.supplier.updated",
            SupplierEvent::SupplierArchived(_) => "suppliers.supplier.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SupplierEvent::SupplierRegistered(e) => e.occurred_at,
            SupplierEvent::SupplierUpdated(e) => e.occurred_at,
            SupplierEvent::SupplierArchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Supplier {
    type Command = SupplierCommand;
    type Event = SupplierEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplierEvent::SupplierRegistered(e) => {
                self.id = e.supplier_id;
                self.hub_id = Some(e.hub_id);
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.tax_id = e.tax_id.clone();
                self.status = SupplierStatus::Active;
                self.created = true;
            }
            SupplierEvent::SupplierUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.tax_id = e.tax_id.clone();
            }
            SupplierEvent::SupplierArchived(_) => {
                self.status = SupplierStatus::Archived;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SupplierCommand::RegisterSupplier(cmd) => self.handle_register(cmd),
            SupplierCommand::UpdateSupplierDetails(cmd) => self.handle_update(cmd),
            SupplierCommand::ArchiveSupplier(cmd) => self.handle_archive(cmd),
        }
    }
}

impl Supplier {
    fn ensure_hub(&self, hub_id: HubId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.hub_id != Some(hub_id) {
            return Err(DomainError::validation("hub mismatch"));
        }
        Ok(())
    }

    fn ensure_supplier_id(&self, supplier_id: SupplierId) -> Result<(), DomainError> {
        if self.id != supplier_id {
            return Err(DomainError::validation("supplier_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterSupplier) -> Result<Vec<SupplierEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("supplier already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let contact = cmd.contact.clone().unwrap_or_default();

        Ok(vec![SupplierEvent::SupplierRegistered(SupplierRegistered {
            hub_id: cmd.hub_id,
            supplier_id: cmd.supplier_id,
            name: cmd.name.clone(),
            contact,
            tax_id: cmd.tax_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(
        &self,
        cmd: &UpdateSupplierDetails,
    ) -> Result<Vec<SupplierEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_hub(cmd.hub_id)?;
        self.ensure_supplier_id(cmd.supplier_id)?;

        let new_name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if new_name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let new_contact = cmd.contact.clone().unwrap_or_else(|| self.contact.clone());
        let new_tax_id = cmd.tax_id.clone().or_else(|| self.tax_id.clone());

        Ok(vec![SupplierEvent::SupplierUpdated(SupplierUpdated {
            hub_id: cmd.hub_id,
            supplier_id: cmd.supplier_id,
            name: new_name,
            contact: new_contact,
            tax_id: new_tax_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveSupplier) -> Result<Vec<SupplierEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_hub(cmd.hub_id)?;
        self.ensure_supplier_id(cmd.supplier_id)?;

        if self.status == SupplierStatus::Archived {
            return Err(DomainError::conflict("supplier is already archived"));
        }

        Ok(vec![SupplierEvent::SupplierArchived(SupplierArchived {
            hub_id: cmd.hub_id,
            supplier_id: cmd.supplier_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

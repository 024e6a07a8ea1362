use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hubledger_core::{Aggregate, AggregateId, AggregateRoot, DomainError, HubId};
use hubledger_events::Event;

/// Category identifier (hub-scoped via `hub_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub AggregateId);

impl CategoryId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: ExpenseCategory.
///
/// Parent acyclicity cannot be decided here (a single aggregate does not see
/// its siblings); the engine validates reassignments against the
/// [`crate::tree::CategoryTree`] before dispatching `ReassignCategoryParent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseCategory {
    id: CategoryId,
    hub_id: Option<HubId>,
    name: String,
    icon: String,
    color: String,
    description: String,
    sort_order: u32,
    parent: Option<CategoryId>,
    active: bool,
    deleted: bool,
    version: u64,
    created: bool,
}

impl ExpenseCategory {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CategoryId) -> Self {
        Self {
            id,
            hub_id: None,
            name: String::new(),
            icon: String::new(),
            color: String::new(),
            description: String::new(),
            sort_order: 0,
            parent: None,
            active: true,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CategoryId {
        self.id
    }

    pub fn hub_id(&self) -> Option<HubId> {
        self.hub_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn sort_order(&self) -> u32 {
        self.sort_order
    }

    pub fn parent(&self) -> Option<CategoryId> {
        self.parent
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl AggregateRoot for ExpenseCategory {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: DefineCategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefineCategory {
    pub hub_id: HubId,
    pub category_id: CategoryId,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub sort_order: u32,
    pub parent: Option<CategoryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateCategory (None fields keep the existing value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCategory {
    pub hub_id: HubId,
    pub category_id: CategoryId,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<u32>,
    pub active: Option<bool>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReassignCategoryParent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignCategoryParent {
    pub hub_id: HubId,
    pub category_id: CategoryId,
    /// `None` promotes the category to a root.
    pub new_parent: Option<CategoryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteCategory.
///
/// The engine refuses this with `HasDependents` while children or expenses
/// still reference the category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCategory {
    pub hub_id: HubId,
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryCommand {
    DefineCategory(DefineCategory),
    UpdateCategory(UpdateCategory),
    ReassignCategoryParent(ReassignCategoryParent),
    DeleteCategory(DeleteCategory),
}

/// Event: CategoryDefined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefined {
    pub hub_id: HubId,
    pub category_id: CategoryId,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub description: String,
    pub sort_order: u32,
    pub parent: Option<CategoryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CategoryUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdated {
    pub hub_id: HubId,
    pub category_id: CategoryId,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub description: String,
    pub sort_order: u32,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CategoryParentReassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryParentReassigned {
    pub hub_id: HubId,
    pub category_id: CategoryId,
    pub new_parent: Option<CategoryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CategoryDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDeleted {
    pub hub_id: HubId,
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryEvent {
    CategoryDefined(CategoryDefined),
    CategoryUpdated(CategoryUpdated),
    CategoryParentReassigned(CategoryParentReassigned),
    CategoryDeleted(CategoryDeleted),
}

impl Event for CategoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CategoryEvent::CategoryDefined(_) => "categories.category.defined",
            CategoryEvent::CategoryUpdated(_) => "categories.category.updated",
            CategoryEvent::CategoryParentReassigned(_) => "categories.category.parent_reassigned",
            CategoryEvent::CategoryDeleted(_) => "categories.category.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CategoryEvent::CategoryDefined(e) => e.occurred_at,
            CategoryEvent::CategoryUpdated(e) => e.occurred_at,
            CategoryEvent::CategoryParentReassigned(e) => e.occurred_at,
            CategoryEvent::CategoryDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ExpenseCategory {
    type Command = CategoryCommand;
    type Event = CategoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CategoryEvent::CategoryDefined(e) => {
                self.id = e.category_id;
                self.hub_id = Some(e.hub_id);
                self.name = e.name.clone();
                self.icon = e.icon.clone();
                self.color = e.color.clone();
                self.description = e.description.clone();
                self.sort_order = e.sort_order;
                self.parent = e.parent;
                self.active = true;
                self.deleted = false;
                self.created = true;
            }
            CategoryEvent::CategoryUpdated(e) => {
                self.name = e.name.clone();
                self.icon = e.icon.clone();
                self.color = e.color.clone();
                self.description = e.description.clone();
                self.sort_order = e.sort_order;
                self.active = e.active;
            }
            CategoryEvent::CategoryParentReassigned(e) => {
                self.parent = e.new_parent;
            }
            CategoryEvent::CategoryDeleted(_) => {
                self.deleted = true;
                self.active = false;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CategoryCommand::DefineCategory(cmd) => self.handle_define(cmd),
            CategoryCommand::UpdateCategory(cmd) => self.handle_update(cmd),
            CategoryCommand::ReassignCategoryParent(cmd) => self.handle_reassign(cmd),
            CategoryCommand::DeleteCategory(cmd) => self.handle_delete(cmd),
        }
    }
}

impl ExpenseCategory {
    fn ensure_hub(&self, hub_id: HubId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.hub_id != Some(hub_id) {
            return Err(DomainError::validation("hub mismatch"));
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_define(&self, cmd: &DefineCategory) -> Result<Vec<CategoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("category already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.parent == Some(cmd.category_id) {
            return Err(DomainError::validation("category cannot be its own parent"));
        }

        Ok(vec![CategoryEvent::CategoryDefined(CategoryDefined {
            hub_id: cmd.hub_id,
            category_id: cmd.category_id,
            name: cmd.name.clone(),
            icon: cmd
                .icon
                .clone()
                .unwrap_or_else(|| "folder-outline".to_string()),
            color: cmd.color.clone().unwrap_or_else(|| "#6366f1".to_string()),
            description: cmd.description.clone().unwrap_or_default(),
            sort_order: cmd.sort_order,
            parent: cmd.parent,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateCategory) -> Result<Vec<CategoryEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_hub(cmd.hub_id)?;

        let new_name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if new_name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![CategoryEvent::CategoryUpdated(CategoryUpdated {
            hub_id: cmd.hub_id,
            category_id: cmd.category_id,
            name: new_name,
            icon: cmd.icon.clone().unwrap_or_else(|| self.icon.clone()),
            color: cmd.color.clone().unwrap_or_else(|| self.color.clone()),
            description: cmd
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            sort_order: cmd.sort_order.unwrap_or(self.sort_order),
            active: cmd.active.unwrap_or(self.active),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reassign(
        &self,
        cmd: &ReassignCategoryParent,
    ) -> Result<Vec<CategoryEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_hub(cmd.hub_id)?;

        if cmd.new_parent == Some(cmd.category_id) {
            return Err(DomainError::validation("category cannot be its own parent"));
        }

        Ok(vec![CategoryEvent::CategoryParentReassigned(
            CategoryParentReassigned {
                hub_id: cmd.hub_id,
                category_id: cmd.category_id,
                new_parent: cmd.new_parent,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_delete(&self, cmd: &DeleteCategory) -> Result<Vec<CategoryEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_hub(cmd.hub_id)?;

        Ok(vec![CategoryEvent::CategoryDeleted(CategoryDeleted {
            hub_id: cmd.hub_id,
            category_id: cmd.category_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

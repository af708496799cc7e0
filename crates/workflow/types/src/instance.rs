//! Workflow instances: running executions of workflow definitions
//!
//! An Instance owns its Details. A Detail records that the instance is or
//! was in a state, pointing at the reference object present at that
//! moment. Details are never removed; leaving a state only clears
//! `is_current`, so the detail list doubles as the instance's history.

use crate::{ObjectRef, StateId, TransitionId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifiers ──────────────────────────────────────────────────────

/// Index of an instance in the instance store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub usize);

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// Index of a detail within its instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DetailId(pub usize);

impl std::fmt::Display for DetailId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "detail#{}", self.0)
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// Lifecycle of an instance: `Active` until success or failure
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    #[default]
    Active,
    Succeeded,
    Failed,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

// ── Detail ───────────────────────────────────────────────────────────

/// Presence of an instance in one state
#[derive(Clone, Debug, Serialize)]
pub struct Detail {
    pub id: DetailId,
    pub state: StateId,
    pub state_name: String,
    pub object: ObjectRef,
    pub is_current: bool,
    /// Transition that created this detail; `None` for initial details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<TransitionId>,
    pub entered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_at: Option<DateTime<Utc>>,
}

// ── Instance ─────────────────────────────────────────────────────────

/// One execution of a workflow
#[derive(Clone, Debug, Serialize)]
pub struct Instance {
    pub id: InstanceId,
    pub workflow: WorkflowId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<InstanceId>,
    /// Domain object this execution is about, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<ObjectRef>,
    pub status: InstanceStatus,
    pub details: Vec<Detail>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Instance {
    pub fn new(id: InstanceId, workflow: WorkflowId) -> Self {
        let now = Utc::now();
        Self {
            id,
            workflow,
            name: None,
            parent: None,
            owner: None,
            status: InstanceStatus::Active,
            details: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_parent(mut self, parent: InstanceId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_owner(mut self, owner: ObjectRef) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Record entry into a state and return the new current detail
    pub fn enter(
        &mut self,
        state: StateId,
        state_name: impl Into<String>,
        object: ObjectRef,
        via: Option<TransitionId>,
    ) -> DetailId {
        let now = Utc::now();
        let id = DetailId(self.details.len());
        self.details.push(Detail {
            id,
            state,
            state_name: state_name.into(),
            object,
            is_current: true,
            via,
            entered_at: now,
            left_at: None,
        });
        self.updated_at = now;
        id
    }

    /// Clear `is_current` on a detail; false if it was not current
    pub fn leave(&mut self, detail: DetailId) -> bool {
        match self.details.get_mut(detail.0) {
            Some(d) if d.is_current => {
                let now = Utc::now();
                d.is_current = false;
                d.left_at = Some(now);
                self.updated_at = now;
                true
            }
            _ => false,
        }
    }

    pub fn succeed(&mut self) {
        self.finish(InstanceStatus::Succeeded);
    }

    pub fn fail(&mut self) {
        self.finish(InstanceStatus::Failed);
    }

    fn finish(&mut self, status: InstanceStatus) {
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    // ── Query methods ────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.status == InstanceStatus::Active
    }

    pub fn succeeded(&self) -> bool {
        self.status == InstanceStatus::Succeeded
    }

    pub fn failed(&self) -> bool {
        self.status == InstanceStatus::Failed
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn detail(&self, id: DetailId) -> Option<&Detail> {
        self.details.get(id.0)
    }

    /// Current details in creation order
    pub fn current_details(&self) -> impl Iterator<Item = &Detail> {
        self.details.iter().filter(|d| d.is_current)
    }

    pub fn current_count(&self) -> usize {
        self.current_details().count()
    }

    pub fn is_current_in(&self, state: StateId) -> bool {
        self.current_details().any(|d| d.state == state)
    }

    /// Names of the states the instance is currently in
    pub fn current_state_names(&self) -> Vec<&str> {
        self.current_details().map(|d| d.state_name.as_str()).collect()
    }
}

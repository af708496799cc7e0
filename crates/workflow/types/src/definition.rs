//! Workflow definitions: named, versioned sets of states and transitions
//!
//! Definitions live in the catalog arena and refer to each other by
//! index. A workflow owns its states and transitions; once sealed it
//! can no longer change.

use crate::TransitionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifiers ──────────────────────────────────────────────────────

/// Index of a workflow in the catalog arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId(pub usize);

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wf#{}", self.0)
    }
}

/// Index of a state in the catalog arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub usize);

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "state#{}", self.0)
    }
}

// ── Workflow ─────────────────────────────────────────────────────────

/// A named, versioned workflow
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub version: u32,
    /// Only one version per name may be active
    pub active: bool,
    /// A sealed workflow rejects new states and transitions
    pub sealed: bool,
    /// States in declaration order
    pub states: Vec<StateId>,
    /// Transitions in declaration order
    pub transitions: Vec<TransitionId>,
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(id: WorkflowId, name: impl Into<String>, version: u32) -> Self {
        Self {
            id,
            name: name.into(),
            version,
            active: true,
            sealed: false,
            states: Vec::new(),
            transitions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }
}

// ── State ────────────────────────────────────────────────────────────

/// Entry and terminal markers of a state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFlags {
    pub initial: bool,
    pub success: bool,
    pub failure: bool,
}

impl StateFlags {
    pub const NONE: Self = Self {
        initial: false,
        success: false,
        failure: false,
    };

    pub fn initial() -> Self {
        Self {
            initial: true,
            ..Self::NONE
        }
    }

    pub fn success() -> Self {
        Self {
            success: true,
            ..Self::NONE
        }
    }

    pub fn failure() -> Self {
        Self {
            failure: true,
            ..Self::NONE
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.success || self.failure
    }
}

/// A named position within a workflow
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub workflow: WorkflowId,
    pub name: String,
    /// Type name of the reference objects attached to this state
    pub ref_type: String,
    pub flags: StateFlags,
    /// Outgoing transitions in declaration order
    pub outgoing: Vec<TransitionId>,
    /// Incoming transitions in declaration order
    pub incoming: Vec<TransitionId>,
}

impl State {
    pub fn new(
        id: StateId,
        workflow: WorkflowId,
        name: impl Into<String>,
        ref_type: impl Into<String>,
        flags: StateFlags,
    ) -> Self {
        Self {
            id,
            workflow,
            name: name.into(),
            ref_type: ref_type.into(),
            flags,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }

    pub fn is_initial(&self) -> bool {
        self.flags.initial
    }

    pub fn is_success(&self) -> bool {
        self.flags.success
    }

    pub fn is_failure(&self) -> bool {
        self.flags.failure
    }
}

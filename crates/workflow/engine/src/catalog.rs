//! Catalog: the arena of workflow definitions
//!
//! Workflows, states and transitions are allocated here and addressed by
//! stable indices. The catalog enforces the definition-time rules: one
//! active version per name, endpoints within one workflow, one kind per
//! token, and uniform split conditions. A sealed workflow no longer
//! changes.

use std::collections::HashMap;
use workflow_types::{
    Expression, NewTransition, State, StateFlags, StateId, Transition, TransitionId,
    TransitionKind, Workflow, WorkflowError, WorkflowId, WorkflowResult,
};

/// Arena of workflow definitions
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    workflows: Vec<Workflow>,
    states: Vec<State>,
    transitions: Vec<Transition>,
    /// Index by name → all versions in registration order
    by_name: HashMap<String, Vec<WorkflowId>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register a new, active workflow version
    pub fn register_workflow(
        &mut self,
        name: impl Into<String>,
        version: u32,
    ) -> WorkflowResult<WorkflowId> {
        let name = name.into();
        if self.active_by_name(&name).is_some() {
            return Err(WorkflowError::DuplicateName(name));
        }

        let id = WorkflowId(self.workflows.len());
        self.workflows.push(Workflow::new(id, name.clone(), version));
        self.by_name.entry(name.clone()).or_default().push(id);

        tracing::info!(workflow = %id, name = %name, version, "Workflow registered");
        Ok(id)
    }

    /// Add a state to an open workflow
    pub fn add_state(
        &mut self,
        workflow: WorkflowId,
        name: impl Into<String>,
        ref_type: impl Into<String>,
        flags: StateFlags,
    ) -> WorkflowResult<StateId> {
        let name = name.into();
        self.ensure_open(workflow)?;
        if flags.success && flags.failure {
            return Err(WorkflowError::ConflictingFlags(name));
        }
        if self.find_state(workflow, &name).is_some() {
            return Err(WorkflowError::DuplicateState { workflow, name });
        }

        let id = StateId(self.states.len());
        self.states
            .push(State::new(id, workflow, name, ref_type, flags));
        self.workflow_mut(workflow)?.states.push(id);

        tracing::debug!(workflow = %workflow, state = %id, "State added");
        Ok(id)
    }

    /// Add a transition between two states of an open workflow
    pub fn add_transition(
        &mut self,
        workflow: WorkflowId,
        request: NewTransition,
    ) -> WorkflowResult<TransitionId> {
        self.ensure_open(workflow)?;
        for endpoint in [request.from, request.to] {
            let state = self.state(endpoint)?;
            if state.workflow != workflow {
                return Err(WorkflowError::ForeignState {
                    workflow,
                    state: endpoint,
                });
            }
        }
        if self
            .transitions_of(workflow)?
            .iter()
            .any(|t| t.name == request.name)
        {
            return Err(WorkflowError::DuplicateTransition {
                workflow,
                name: request.name,
            });
        }

        let condition = match request.condition.as_deref() {
            Some(source) => Some(Expression::parse(source)?),
            None => None,
        };
        let token = request.token().to_string();
        self.check_token(workflow, &token, request.kind, condition.as_ref())?;

        let id = TransitionId(self.transitions.len());
        self.transitions.push(Transition {
            id,
            workflow,
            name: request.name,
            from: request.from,
            to: request.to,
            kind: request.kind,
            condition,
            token,
        });
        self.states[request.from.0].outgoing.push(id);
        self.states[request.to.0].incoming.push(id);
        self.workflow_mut(workflow)?.transitions.push(id);

        tracing::debug!(workflow = %workflow, transition = %id, kind = %request.kind, "Transition added");
        Ok(id)
    }

    /// One kind per token; split branches share their condition
    fn check_token(
        &self,
        workflow: WorkflowId,
        token: &str,
        kind: TransitionKind,
        condition: Option<&Expression>,
    ) -> WorkflowResult<()> {
        let siblings = self.token_transitions(workflow, token)?;
        let Some(first) = siblings.first() else {
            return Ok(());
        };
        if first.kind != kind {
            return Err(WorkflowError::TokenKindMixed {
                token: token.to_string(),
                first: first.kind,
                second: kind,
            });
        }
        if kind == TransitionKind::Split && first.condition.as_ref() != condition {
            return Err(WorkflowError::SplitCondition {
                token: token.to_string(),
            });
        }
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Deactivate a workflow so another version of its name may be active
    pub fn retire(&mut self, workflow: WorkflowId) -> WorkflowResult<()> {
        let wf = self.workflow_mut(workflow)?;
        wf.active = false;
        tracing::info!(workflow = %workflow, name = %wf.name, "Workflow retired");
        Ok(())
    }

    /// Reactivate a retired workflow
    pub fn activate(&mut self, workflow: WorkflowId) -> WorkflowResult<()> {
        let name = self.workflow(workflow)?.name.clone();
        if let Some(active) = self.active_by_name(&name) {
            if active.id == workflow {
                return Ok(());
            }
            return Err(WorkflowError::DuplicateName(name));
        }
        self.workflow_mut(workflow)?.active = true;
        tracing::info!(workflow = %workflow, name = %name, "Workflow activated");
        Ok(())
    }

    /// Freeze a workflow's states and transitions
    pub fn seal(&mut self, workflow: WorkflowId) -> WorkflowResult<()> {
        let wf = self.workflow_mut(workflow)?;
        if !wf.sealed {
            wf.sealed = true;
            tracing::debug!(workflow = %workflow, "Workflow sealed");
        }
        Ok(())
    }

    fn ensure_open(&self, workflow: WorkflowId) -> WorkflowResult<()> {
        if self.workflow(workflow)?.sealed {
            return Err(WorkflowError::WorkflowSealed(workflow));
        }
        Ok(())
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn workflow(&self, id: WorkflowId) -> WorkflowResult<&Workflow> {
        self.workflows
            .get(id.0)
            .ok_or(WorkflowError::WorkflowNotFound(id))
    }

    fn workflow_mut(&mut self, id: WorkflowId) -> WorkflowResult<&mut Workflow> {
        self.workflows
            .get_mut(id.0)
            .ok_or(WorkflowError::WorkflowNotFound(id))
    }

    pub fn state(&self, id: StateId) -> WorkflowResult<&State> {
        self.states.get(id.0).ok_or(WorkflowError::StateNotFound(id))
    }

    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions.get(id.0)
    }

    /// The active version of a name
    pub fn active_by_name(&self, name: &str) -> Option<&Workflow> {
        self.versions(name).into_iter().find(|wf| wf.active)
    }

    /// All versions of a name in registration order
    pub fn versions(&self, name: &str) -> Vec<&Workflow> {
        self.by_name
            .get(name)
            .map(|ids| ids.iter().filter_map(|id| self.workflows.get(id.0)).collect())
            .unwrap_or_default()
    }

    pub fn list(&self) -> Vec<&Workflow> {
        self.workflows.iter().collect()
    }

    pub fn workflow_count(&self) -> usize {
        self.workflows.len()
    }

    fn find_state(&self, workflow: WorkflowId, name: &str) -> Option<&State> {
        self.workflows.get(workflow.0).and_then(|wf| {
            wf.states
                .iter()
                .map(|id| &self.states[id.0])
                .find(|s| s.name == name)
        })
    }

    pub fn state_by_name(&self, workflow: WorkflowId, name: &str) -> WorkflowResult<&State> {
        self.workflow(workflow)?;
        self.find_state(workflow, name)
            .ok_or_else(|| WorkflowError::UnknownState {
                workflow,
                name: name.to_string(),
            })
    }

    /// States in declaration order
    pub fn states_of(&self, workflow: WorkflowId) -> WorkflowResult<Vec<&State>> {
        let wf = self.workflow(workflow)?;
        Ok(wf.states.iter().map(|id| &self.states[id.0]).collect())
    }

    /// Transitions in declaration order
    pub fn transitions_of(&self, workflow: WorkflowId) -> WorkflowResult<Vec<&Transition>> {
        let wf = self.workflow(workflow)?;
        Ok(wf
            .transitions
            .iter()
            .map(|id| &self.transitions[id.0])
            .collect())
    }

    pub fn initial_states(&self, workflow: WorkflowId) -> WorkflowResult<Vec<&State>> {
        Ok(self
            .states_of(workflow)?
            .into_iter()
            .filter(|s| s.is_initial())
            .collect())
    }

    /// Outgoing transitions of a state in declaration order
    pub fn outgoing(&self, state: StateId) -> WorkflowResult<Vec<&Transition>> {
        let state = self.state(state)?;
        Ok(state
            .outgoing
            .iter()
            .map(|id| &self.transitions[id.0])
            .collect())
    }

    /// Transitions of a workflow sharing a token
    pub fn token_transitions(
        &self,
        workflow: WorkflowId,
        token: &str,
    ) -> WorkflowResult<Vec<&Transition>> {
        Ok(self
            .transitions_of(workflow)?
            .into_iter()
            .filter(|t| t.token == token)
            .collect())
    }
}

//! Error types for the workflow layer

use crate::{InstanceId, ObjectId, StateId, WorkflowId};

/// Error raised by a caller-supplied condition callable
pub type ConditionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in workflow operations
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Another active workflow is named '{0}'")]
    DuplicateName(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("State not found: {0}")]
    StateNotFound(StateId),

    #[error("Workflow instance not found: {0}")]
    InstanceNotFound(InstanceId),

    #[error("Workflow {workflow} has no state named '{name}'")]
    UnknownState { workflow: WorkflowId, name: String },

    #[error("State '{name}' already exists in workflow {workflow}")]
    DuplicateState { workflow: WorkflowId, name: String },

    #[error("Transition '{name}' already exists in workflow {workflow}")]
    DuplicateTransition { workflow: WorkflowId, name: String },

    #[error("State {state} does not belong to workflow {workflow}")]
    ForeignState { workflow: WorkflowId, state: StateId },

    #[error("State '{0}' cannot be both a success and a failure state")]
    ConflictingFlags(String),

    #[error("Workflow {0} is sealed; its states and transitions can no longer change")]
    WorkflowSealed(WorkflowId),

    #[error("Workflow {0} is not active")]
    InactiveWorkflow(WorkflowId),

    #[error("Workflow {0} has no initial state")]
    NoInitialState(WorkflowId),

    #[error("No object supplied for initial state '{state}' (expected a '{ref_type}')")]
    MissingInitial { state: String, ref_type: String },

    #[error("Transitions with token '{token}' mix kinds {first} and {second}")]
    TokenKindMixed {
        token: String,
        first: crate::TransitionKind,
        second: crate::TransitionKind,
    },

    #[error("Sequence '{token}' must have exactly one transition to process, found {found}")]
    SequenceArity { token: String, found: usize },

    #[error("Split '{token}' must have at least two transitions to process, found {found}")]
    SplitArity { token: String, found: usize },

    #[error("Synch '{token}' must have at least two transitions to process, found {found}")]
    SynchArity { token: String, found: usize },

    #[error("Merge '{token}' must have at least one transition to process")]
    MergeArity { token: String },

    #[error("Split '{token}' must leave a single source state")]
    SplitSource { token: String },

    #[error("Synch '{token}' must enter a single destination state")]
    SynchTarget { token: String },

    #[error("Choice '{token}' must leave a single source state")]
    ChoiceSource { token: String },

    #[error("Split '{token}' branches must share one condition")]
    SplitCondition { token: String },

    #[error("Synch into '{state}' needs a caller-supplied reference object")]
    SynchMissingObject { state: String },

    #[error("Instance {0} would reach success and failure in the same step")]
    Inconsistency(InstanceId),

    #[error("Invalid transition kind: '{0}'")]
    InvalidKind(String),

    #[error("Invalid condition '{expression}': {message}")]
    InvalidCondition { expression: String, message: String },

    #[error("Reference object {0} has been released by its owner")]
    ObjectReleased(ObjectId),

    #[error("Condition callable failed: {0}")]
    ConditionFailed(#[source] ConditionError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WorkflowError {
    /// Errors the step engine raises for a malformed firing.
    ///
    /// These abort the step and fail the instance. Callable errors and
    /// released objects only abort the step.
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            Self::TokenKindMixed { .. }
                | Self::SequenceArity { .. }
                | Self::SplitArity { .. }
                | Self::SynchArity { .. }
                | Self::MergeArity { .. }
                | Self::SplitSource { .. }
                | Self::SynchTarget { .. }
                | Self::ChoiceSource { .. }
                | Self::SynchMissingObject { .. }
                | Self::Inconsistency(_)
        )
    }
}

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_violation_classification() {
        let arity = WorkflowError::SequenceArity {
            token: "t".into(),
            found: 2,
        };
        assert!(arity.is_rule_violation());
        assert!(WorkflowError::Inconsistency(InstanceId(0)).is_rule_violation());

        let released = WorkflowError::ObjectReleased(ObjectId::new("doc-1"));
        assert!(!released.is_rule_violation());

        let callable = WorkflowError::ConditionFailed("boom".into());
        assert!(!callable.is_rule_violation());
        assert_eq!(callable.to_string(), "Condition callable failed: boom");
    }
}

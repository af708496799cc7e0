//! Loader error types

use workflow_types::WorkflowError;

/// Errors that can occur while importing a workflow description
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Invalid workflow description: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Transition '{transition}' of workflow '{workflow}' names unknown state '{state}'")]
    UnknownState {
        workflow: String,
        transition: String,
        state: String,
    },

    #[error("Transition '{transition}' needs at least one from and one to state")]
    EmptyEndpoints { transition: String },

    #[error("Transition '{transition}' lists state '{state}' more than once")]
    DuplicateEndpoint { transition: String, state: String },

    #[error("Invalid kind '{kind}' on transition '{transition}'")]
    InvalidKind { transition: String, kind: String },

    #[error("Transition '{transition}' has no condition for state '{state}'")]
    MissingCondition { transition: String, state: String },

    #[error("Split '{transition}' branches must share one condition")]
    SplitCondition { transition: String },

    #[error("Conditions of '{transition}' cannot be keyed by one state each")]
    Unexportable { transition: String },

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Result type alias for loader operations
pub type LoaderResult<T> = Result<T, LoaderError>;

//! Workflow execution engine
//!
//! The engine steps workflow instances through token-grouped transitions.
//! Each step inspects the instance's current details, buckets their
//! outgoing transitions by token and fires every bucket by the rule of its
//! kind (sequence, split, synch, choice or merge).
//!
//! # Architecture
//!
//! The [`WorkflowRuntime`] composes specialized components:
//!
//! - [`Catalog`]: Arena of workflows, states and transitions
//! - [`InstanceStore`]: Creates and holds instances and their details
//! - [`ConditionEvaluator`]: Evaluates declarative and callable conditions
//! - [`StepEngine`]: Applies the firing rules, atomically per step
//! - [`EngineConfig`]: Violation, retirement, sealing and identity policy
//!
//! # Example
//!
//! ```rust
//! use workflow_engine::WorkflowRuntime;
//! use workflow_types::*;
//!
//! let mut runtime = WorkflowRuntime::new();
//! let wf = runtime.register_workflow("Document Review", 1).unwrap();
//! let draft = runtime.add_state(wf, "draft", "Document", StateFlags::initial()).unwrap();
//! let done = runtime.add_state(wf, "done", "Document", StateFlags::success()).unwrap();
//! runtime
//!     .add_transition(wf, NewTransition::sequence("approve", draft, done).with_condition("approved"))
//!     .unwrap();
//!
//! let document = Record::new("Document").with("approved", true).shared();
//! let mut objects = ObjectMap::new();
//! objects.insert("draft".to_string(), document.clone());
//! let id = runtime.init_instance(wf, &objects).unwrap();
//!
//! assert!(runtime.advance(id).unwrap());
//! assert!(runtime.instance(id).unwrap().succeeded());
//! ```

#![deny(unsafe_code)]

pub mod catalog;
pub mod condition_evaluator;
pub mod config;
pub mod instance_store;
pub mod runtime;
pub mod step_engine;

// Re-export main types
pub use catalog::Catalog;
pub use condition_evaluator::ConditionEvaluator;
pub use config::{EngineConfig, IdentityScheme};
pub use instance_store::{InstanceStore, NewInstance};
pub use runtime::WorkflowRuntime;
pub use step_engine::{FiredBucket, StepEngine, StepReport};

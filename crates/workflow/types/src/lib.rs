//! Workflow domain types
//!
//! A workflow is a set of states joined by transitions. Transitions that
//! share a **token** fire together, and their common **kind** decides how:
//! sequence, split, synch, choice or merge.
//!
//! # Key Concepts
//!
//! - **Workflow / State / Transition**: catalog records addressed by
//!   stable arena indices ([`WorkflowId`], [`StateId`], [`TransitionId`]).
//! - **Expression**: the declarative condition attached to a transition,
//!   parsed once and evaluated against a reference object's attributes.
//! - **Instance / Detail**: one execution of a workflow and its per-state
//!   records. A detail points weakly at the caller's domain object.
//! - **DomainObject**: the capability a reference object must offer
//!   (identity, type name, attributes).
//! - **FireDecision**: the answer of a caller-supplied condition callable.
//!
//! # Design Principles
//!
//! 1. The workflow core never owns domain objects.
//! 2. Details are history; leaving a state never deletes one.
//! 3. Rule violations are typed errors, falseness of a condition is not.

#![deny(unsafe_code)]

mod decision;
mod definition;
mod errors;
mod expression;
mod instance;
mod object;
mod transition;

pub use decision::*;
pub use definition::*;
pub use errors::*;
pub use expression::*;
pub use instance::*;
pub use object::*;
pub use transition::*;

//! Workflow loader
//!
//! Reads declarative workflow descriptions and registers them in a
//! [`Catalog`](workflow_engine::Catalog), and writes catalog workflows back
//! out in the same shape.
//!
//! # Architecture
//!
//! - **description**: serde types of the description format
//! - **importer**: pair expansion, per-kind condition lookup, all-or-nothing
//!   registration
//! - **exporter**: regrouping of transitions by token
//!
//! # Example
//!
//! ```
//! use workflow_engine::Catalog;
//! use workflow_loader::{export_workflow, import_json};
//!
//! let mut catalog = Catalog::new();
//! let ids = import_json(
//!     &mut catalog,
//!     r#"{
//!         "Review": {
//!             "states": [
//!                 { "name": "draft", "model": "Doc", "is_initial_state": true },
//!                 { "name": "done", "model": "Doc", "is_success_state": true }
//!             ],
//!             "transitions": {
//!                 "finish": { "from_state": "draft", "to_state": "done" }
//!             }
//!         }
//!     }"#,
//! )
//! .unwrap();
//!
//! let decl = export_workflow(&catalog, ids[0]).unwrap();
//! assert_eq!(decl.states.len(), 2);
//! ```

#![deny(unsafe_code)]

pub mod description;
pub mod errors;
pub mod exporter;
pub mod importer;

pub use description::{
    ConditionDecl, Definition, OneOrMany, OrderedMap, StateDecl, TransitionDecl, WorkflowDecl,
};
pub use errors::{LoaderError, LoaderResult};
pub use exporter::{export_definition, export_workflow};
pub use importer::{import_definition, import_json, import_value};

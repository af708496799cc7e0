//! Workflow runtime: the main entry point for the workflow engine
//!
//! The runtime composes the catalog, the instance store and the step
//! engine under one configuration. It:
//! 1. Registers workflows and their states and transitions
//! 2. Creates instances, sealing their workflow when configured
//! 3. Steps instances with caller-supplied objects, filters and conditions

use crate::{Catalog, EngineConfig, InstanceStore, NewInstance, StepEngine, StepReport};
use std::sync::Arc;
use workflow_types::*;

/// The workflow runtime
#[derive(Clone, Debug)]
pub struct WorkflowRuntime {
    config: EngineConfig,
    catalog: Catalog,
    instances: InstanceStore,
    engine: StepEngine,
    identities: Arc<dyn IdentityProvider>,
}

impl WorkflowRuntime {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            engine: StepEngine::new(&config),
            identities: config.identity.provider(),
            catalog: Catalog::new(),
            instances: InstanceStore::new(),
            config,
        }
    }

    /// Replace the identity provider chosen by the configuration
    pub fn with_identities(mut self, identities: Arc<dyn IdentityProvider>) -> Self {
        self.identities = identities;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn instances(&self) -> &InstanceStore {
        &self.instances
    }

    pub fn identities(&self) -> &dyn IdentityProvider {
        self.identities.as_ref()
    }

    // ── Definition Management ────────────────────────────────────────

    pub fn register_workflow(
        &mut self,
        name: impl Into<String>,
        version: u32,
    ) -> WorkflowResult<WorkflowId> {
        self.catalog.register_workflow(name, version)
    }

    pub fn add_state(
        &mut self,
        workflow: WorkflowId,
        name: impl Into<String>,
        ref_type: impl Into<String>,
        flags: StateFlags,
    ) -> WorkflowResult<StateId> {
        self.catalog.add_state(workflow, name, ref_type, flags)
    }

    pub fn add_transition(
        &mut self,
        workflow: WorkflowId,
        request: NewTransition,
    ) -> WorkflowResult<TransitionId> {
        self.catalog.add_transition(workflow, request)
    }

    // ── Instance Lifecycle ───────────────────────────────────────────

    /// Create an instance from initial-state objects
    pub fn init_instance(
        &mut self,
        workflow: WorkflowId,
        objects: &ObjectMap,
    ) -> WorkflowResult<InstanceId> {
        self.init_instance_with(workflow, objects, NewInstance::new())
    }

    pub fn init_instance_with(
        &mut self,
        workflow: WorkflowId,
        objects: &ObjectMap,
        options: NewInstance,
    ) -> WorkflowResult<InstanceId> {
        let id = self.instances.init_instance_with(
            &self.catalog,
            self.identities.as_ref(),
            workflow,
            objects,
            options,
        )?;
        if self.config.seal_on_first_instance {
            self.catalog.seal(workflow)?;
        }
        Ok(id)
    }

    pub fn instance(&self, id: InstanceId) -> WorkflowResult<&Instance> {
        self.instances.get(id)
    }

    pub fn current_details(&self, id: InstanceId) -> WorkflowResult<Vec<&Detail>> {
        self.instances.current_details(id)
    }

    pub fn relatives(&self, id: InstanceId) -> WorkflowResult<Vec<&Instance>> {
        self.instances.relatives(id)
    }

    // ── Stepping ─────────────────────────────────────────────────────

    /// Step an instance; true if at least one bucket fired
    ///
    /// `objects` maps destination state names to the reference objects the
    /// new details should point at.
    pub fn step(
        &mut self,
        id: InstanceId,
        objects: &ObjectMap,
        filter: Option<&StateFilter>,
        condition: Option<&mut dyn ConditionFn>,
    ) -> WorkflowResult<bool> {
        self.step_report(id, objects, filter, condition)
            .map(|report| report.fired())
    }

    pub fn step_report(
        &mut self,
        id: InstanceId,
        objects: &ObjectMap,
        filter: Option<&StateFilter>,
        condition: Option<&mut dyn ConditionFn>,
    ) -> WorkflowResult<StepReport> {
        let instance = self.instances.get_mut(id)?;
        self.engine.run(
            &self.catalog,
            self.identities.as_ref(),
            instance,
            objects,
            filter,
            condition,
        )
    }

    /// Step with declarative conditions only and no new objects
    pub fn advance(&mut self, id: InstanceId) -> WorkflowResult<bool> {
        self.step(id, &ObjectMap::new(), None, None)
    }
}

impl Default for WorkflowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_runtime() -> (WorkflowRuntime, WorkflowId, StateId, StateId) {
        let config = EngineConfig::default().with_identity(crate::IdentityScheme::Sequential);
        let mut runtime = WorkflowRuntime::with_config(config);
        let wf = runtime.register_workflow("Review", 1).unwrap();
        let draft = runtime
            .add_state(wf, "draft", "Doc", StateFlags::initial())
            .unwrap();
        let done = runtime
            .add_state(wf, "done", "Doc", StateFlags::success())
            .unwrap();
        runtime
            .add_transition(
                wf,
                NewTransition::sequence("finish", draft, done).with_condition("status = 'ok'"),
            )
            .unwrap();
        (runtime, wf, draft, done)
    }

    #[test]
    fn test_first_instance_seals_workflow() {
        let (mut runtime, wf, draft, _) = review_runtime();
        let doc: SharedObject = Record::new("Doc").shared();
        let objects = ObjectMap::from([("draft".to_string(), doc)]);

        runtime.init_instance(wf, &objects).unwrap();
        assert!(runtime.catalog().workflow(wf).unwrap().sealed);
        assert!(matches!(
            runtime.add_transition(wf, NewTransition::sequence("again", draft, draft)),
            Err(WorkflowError::WorkflowSealed(_))
        ));
    }

    #[test]
    fn test_sealing_can_be_disabled() {
        let mut runtime =
            WorkflowRuntime::with_config(EngineConfig::default().with_seal_on_first_instance(false));
        let wf = runtime.register_workflow("Open", 1).unwrap();
        runtime
            .add_state(wf, "start", "Doc", StateFlags::initial())
            .unwrap();
        let doc: SharedObject = Record::new("Doc").shared();
        runtime
            .init_instance(wf, &ObjectMap::from([("start".to_string(), doc)]))
            .unwrap();
        assert!(runtime
            .add_state(wf, "later", "Doc", StateFlags::NONE)
            .is_ok());
    }

    #[test]
    fn test_advance_follows_declarative_condition() {
        let (mut runtime, wf, _, done) = review_runtime();
        let doc = Record::new("Doc").with("status", "pending").shared();
        let object: SharedObject = doc.clone();
        let id = runtime
            .init_instance(wf, &ObjectMap::from([("draft".to_string(), object)]))
            .unwrap();

        assert!(!runtime.advance(id).unwrap());
        doc.set("status", "ok");
        assert!(runtime.advance(id).unwrap());

        let instance = runtime.instance(id).unwrap();
        assert!(instance.succeeded());
        assert!(instance.is_current_in(done));
        assert_eq!(instance.details[0].object.id.as_str(), "doc-1");
    }

    #[test]
    fn test_step_unknown_instance() {
        let (mut runtime, _, _, _) = review_runtime();
        assert!(matches!(
            runtime.advance(InstanceId(5)),
            Err(WorkflowError::InstanceNotFound(_))
        ));
    }
}

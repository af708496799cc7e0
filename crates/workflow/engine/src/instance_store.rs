//! Instance store: running and finished workflow instances
//!
//! Instances are created here from an active workflow and a mapping of
//! initial-state names to reference objects. The store also exposes the
//! parent/child tree that nested instances form.

use crate::Catalog;
use workflow_types::{
    Detail, IdentityProvider, Instance, InstanceId, ObjectMap, ObjectRef, SharedObject,
    WorkflowError, WorkflowId, WorkflowResult,
};

/// Options for a new instance
#[derive(Clone, Default)]
pub struct NewInstance {
    pub name: Option<String>,
    pub parent: Option<InstanceId>,
    /// Domain object the instance is about
    pub owner: Option<SharedObject>,
}

impl NewInstance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn child_of(mut self, parent: InstanceId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn owned_by(mut self, owner: SharedObject) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Store of workflow instances
#[derive(Clone, Debug, Default)]
pub struct InstanceStore {
    instances: Vec<Instance>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an instance with one current detail per initial state
    pub fn init_instance(
        &mut self,
        catalog: &Catalog,
        identities: &dyn IdentityProvider,
        workflow: WorkflowId,
        objects: &ObjectMap,
    ) -> WorkflowResult<InstanceId> {
        self.init_instance_with(catalog, identities, workflow, objects, NewInstance::new())
    }

    pub fn init_instance_with(
        &mut self,
        catalog: &Catalog,
        identities: &dyn IdentityProvider,
        workflow: WorkflowId,
        objects: &ObjectMap,
        options: NewInstance,
    ) -> WorkflowResult<InstanceId> {
        if !catalog.workflow(workflow)?.active {
            return Err(WorkflowError::InactiveWorkflow(workflow));
        }
        if let Some(parent) = options.parent {
            self.get(parent)?;
        }
        let initial = catalog.initial_states(workflow)?;
        if initial.is_empty() {
            return Err(WorkflowError::NoInitialState(workflow));
        }

        // Every initial object must be present before any identity is assigned
        let mut entries = Vec::with_capacity(initial.len());
        for state in &initial {
            let object = objects
                .get(&state.name)
                .ok_or_else(|| WorkflowError::MissingInitial {
                    state: state.name.clone(),
                    ref_type: state.ref_type.clone(),
                })?;
            entries.push((*state, object));
        }

        let id = InstanceId(self.instances.len());
        let mut instance = Instance::new(id, workflow);
        instance.name = options.name;
        instance.parent = options.parent;
        if let Some(owner) = &options.owner {
            instance.owner = Some(ObjectRef::identify(owner, identities));
        }
        for (state, object) in entries {
            let reference = ObjectRef::identify(object, identities);
            instance.enter(state.id, state.name.clone(), reference, None);
        }

        tracing::info!(
            instance = %id,
            workflow = %workflow,
            current = instance.current_count(),
            "Workflow instance created"
        );
        self.instances.push(instance);
        Ok(id)
    }

    pub fn get(&self, id: InstanceId) -> WorkflowResult<&Instance> {
        self.instances
            .get(id.0)
            .ok_or(WorkflowError::InstanceNotFound(id))
    }

    pub fn get_mut(&mut self, id: InstanceId) -> WorkflowResult<&mut Instance> {
        self.instances
            .get_mut(id.0)
            .ok_or(WorkflowError::InstanceNotFound(id))
    }

    /// Current details in creation order
    pub fn current_details(&self, id: InstanceId) -> WorkflowResult<Vec<&Detail>> {
        Ok(self.get(id)?.current_details().collect())
    }

    /// Direct children in creation order
    pub fn children(&self, id: InstanceId) -> WorkflowResult<Vec<&Instance>> {
        self.get(id)?;
        Ok(self
            .instances
            .iter()
            .filter(|i| i.parent == Some(id))
            .collect())
    }

    /// Parent, then siblings, then children; each group in creation order
    pub fn relatives(&self, id: InstanceId) -> WorkflowResult<Vec<&Instance>> {
        let instance = self.get(id)?;
        let mut relatives = Vec::new();
        if let Some(parent) = instance.parent {
            relatives.push(self.get(parent)?);
            relatives.extend(
                self.instances
                    .iter()
                    .filter(|i| i.parent == Some(parent) && i.id != id),
            );
        }
        relatives.extend(self.children(id)?);
        Ok(relatives)
    }

    pub fn list(&self) -> Vec<&Instance> {
        self.instances.iter().collect()
    }

    pub fn count(&self) -> usize {
        self.instances.len()
    }

    pub fn active_count(&self) -> usize {
        self.instances.iter().filter(|i| i.is_active()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_types::{DomainObject, Record, SequentialIdentity, StateFlags};

    fn setup() -> (Catalog, WorkflowId) {
        let mut catalog = Catalog::new();
        let wf = catalog.register_workflow("Intake", 1).unwrap();
        catalog
            .add_state(wf, "form", "Form", StateFlags::initial())
            .unwrap();
        catalog
            .add_state(wf, "photo", "Photo", StateFlags::initial())
            .unwrap();
        catalog
            .add_state(wf, "done", "Form", StateFlags::success())
            .unwrap();
        (catalog, wf)
    }

    fn objects(names: &[&str]) -> (ObjectMap, Vec<SharedObject>) {
        let mut map = ObjectMap::new();
        let mut keep = Vec::new();
        for name in names {
            let object: SharedObject = Record::new("Form").shared();
            map.insert(name.to_string(), object.clone());
            keep.push(object);
        }
        (map, keep)
    }

    #[test]
    fn test_init_creates_initial_details() {
        let (catalog, wf) = setup();
        let identities = SequentialIdentity::new();
        let (map, keep) = objects(&["form", "photo"]);
        let mut store = InstanceStore::new();

        let id = store.init_instance(&catalog, &identities, wf, &map).unwrap();
        let current = store.current_details(id).unwrap();
        assert_eq!(current.len(), 2);
        assert_eq!(current[0].state_name, "form");
        assert_eq!(current[1].state_name, "photo");
        assert!(current.iter().all(|d| d.is_current && d.via.is_none()));

        // objects were given identities on the way in
        assert!(keep.iter().all(|o| o.identity().is_some()));
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_missing_initial_object() {
        let (catalog, wf) = setup();
        let identities = SequentialIdentity::new();
        let (map, keep) = objects(&["form"]);
        let mut store = InstanceStore::new();

        let result = store.init_instance(&catalog, &identities, wf, &map);
        assert!(matches!(
            result,
            Err(WorkflowError::MissingInitial { ref state, ref ref_type })
                if state == "photo" && ref_type == "Photo"
        ));
        assert_eq!(store.count(), 0);
        assert!(keep[0].identity().is_none());
    }

    #[test]
    fn test_inactive_and_empty_workflows() {
        let (mut catalog, wf) = setup();
        let identities = SequentialIdentity::new();
        let (map, _keep) = objects(&["form", "photo"]);
        let mut store = InstanceStore::new();

        catalog.retire(wf).unwrap();
        assert!(matches!(
            store.init_instance(&catalog, &identities, wf, &map),
            Err(WorkflowError::InactiveWorkflow(_))
        ));

        let empty = catalog.register_workflow("Empty", 1).unwrap();
        assert!(matches!(
            store.init_instance(&catalog, &identities, empty, &map),
            Err(WorkflowError::NoInitialState(_))
        ));
    }

    #[test]
    fn test_instance_tree() {
        let (catalog, wf) = setup();
        let identities = SequentialIdentity::new();
        let (map, _keep) = objects(&["form", "photo"]);
        let mut store = InstanceStore::new();

        let root = store
            .init_instance_with(&catalog, &identities, wf, &map, NewInstance::new().named("root"))
            .unwrap();
        let child = |name: &str| NewInstance::new().named(name).child_of(root);
        let a = store
            .init_instance_with(&catalog, &identities, wf, &map, child("a"))
            .unwrap();
        let b = store
            .init_instance_with(&catalog, &identities, wf, &map, child("b"))
            .unwrap();
        let grandchild = store
            .init_instance_with(
                &catalog,
                &identities,
                wf,
                &map,
                NewInstance::new().child_of(a),
            )
            .unwrap();

        let ids = |list: Vec<&Instance>| list.iter().map(|i| i.id).collect::<Vec<_>>();
        assert_eq!(ids(store.children(root).unwrap()), vec![a, b]);
        assert_eq!(ids(store.relatives(a).unwrap()), vec![root, b, grandchild]);
        assert_eq!(ids(store.relatives(root).unwrap()), vec![a, b]);
        assert_eq!(store.get(a).unwrap().name.as_deref(), Some("a"));

        assert!(matches!(
            store.init_instance_with(
                &catalog,
                &identities,
                wf,
                &map,
                NewInstance::new().child_of(InstanceId(99)),
            ),
            Err(WorkflowError::InstanceNotFound(_))
        ));
    }

    #[test]
    fn test_owner_reference() {
        let (catalog, wf) = setup();
        let identities = SequentialIdentity::new();
        let (map, _keep) = objects(&["form", "photo"]);
        let owner: SharedObject = Record::new("Customer").shared();
        let mut store = InstanceStore::new();

        let id = store
            .init_instance_with(
                &catalog,
                &identities,
                wf,
                &map,
                NewInstance::new().owned_by(owner.clone()),
            )
            .unwrap();
        let instance = store.get(id).unwrap();
        assert_eq!(
            instance.owner.as_ref().map(|o| o.type_name.as_str()),
            Some("Customer")
        );
        assert!(owner.identity().is_some());
    }
}

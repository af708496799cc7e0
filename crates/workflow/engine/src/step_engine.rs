//! Step engine: advances an instance by firing token buckets
//!
//! A step looks at every detail current when it starts, gathers the
//! outgoing transitions of their states and buckets them by token. Each
//! bucket is fired by the rule of its kind:
//!
//! - **sequence**: exactly one pair, one destination
//! - **split**: one source detail, every destination at once
//! - **synch**: several sources join into one destination, which needs a
//!   caller-supplied reference object
//! - **choice**: one source detail, the selected destination only
//! - **merge**: any sources, the first destination whose condition holds
//!
//! A step is atomic. On error the instance is restored to its state before
//! the step; rule violations then fail the instance.

use crate::{Catalog, ConditionEvaluator, EngineConfig};
use std::collections::{HashMap, HashSet};
use workflow_types::{
    Condition, ConditionFn, DecisionContext, DetailId, FireDecision, IdentityProvider, Instance,
    ObjectMap, ObjectRef, State, StateFilter, Transition, TransitionId, TransitionKind,
    WorkflowError, WorkflowResult,
};

// ── Step report ──────────────────────────────────────────────────────

/// What one fired bucket changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FiredBucket {
    pub token: String,
    pub kind: TransitionKind,
    /// Source details that stopped being current
    pub left: Vec<DetailId>,
    /// Details created for the destinations
    pub entered: Vec<DetailId>,
}

/// Outcome of a step
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub buckets: Vec<FiredBucket>,
}

impl StepReport {
    /// True if at least one bucket fired
    pub fn fired(&self) -> bool {
        !self.buckets.is_empty()
    }
}

// ── Buckets ──────────────────────────────────────────────────────────

/// A transition leaving one current detail
struct Pair<'c> {
    transition: &'c Transition,
    to: &'c State,
    detail: DetailId,
}

/// Pairs sharing a token, in catalog order
struct Bucket<'c> {
    token: &'c str,
    pairs: Vec<Pair<'c>>,
    sources: Vec<String>,
    destinations: Vec<String>,
    objects: Vec<ObjectRef>,
}

impl<'c> Bucket<'c> {
    fn new(token: &'c str) -> Self {
        Self {
            token,
            pairs: Vec::new(),
            sources: Vec::new(),
            destinations: Vec::new(),
            objects: Vec::new(),
        }
    }

    fn first_transition(&self) -> Option<TransitionId> {
        self.pairs.first().map(|p| p.transition.id)
    }

    /// The kind every pair shares
    fn kind(&self) -> WorkflowResult<TransitionKind> {
        let Some(first) = self.pairs.first().map(|p| p.transition.kind) else {
            return Err(WorkflowError::MergeArity {
                token: self.token.to_string(),
            });
        };
        match self.pairs.iter().find(|p| p.transition.kind != first) {
            Some(other) => Err(WorkflowError::TokenKindMixed {
                token: self.token.to_string(),
                first,
                second: other.transition.kind,
            }),
            None => Ok(first),
        }
    }

    fn context<'a>(&'a self, instance: &'a Instance, kind: TransitionKind) -> DecisionContext<'a> {
        DecisionContext {
            instance,
            token: self.token,
            kind,
            sources: &self.sources,
            destinations: &self.destinations,
            objects: &self.objects,
        }
    }

    /// Source details in pair order, without repeats
    fn source_details(&self) -> Vec<DetailId> {
        let mut seen = HashSet::new();
        self.pairs
            .iter()
            .map(|p| p.detail)
            .filter(|d| seen.insert(*d))
            .collect()
    }

    fn single_source(&self) -> bool {
        self.source_details().len() == 1
    }
}

/// Detail to create when a bucket fires
struct Entry<'c> {
    state: &'c State,
    object: ObjectRef,
    via: TransitionId,
}

struct Firing<'c> {
    leave: Vec<DetailId>,
    enter: Vec<Entry<'c>>,
}

/// Inputs shared by every bucket of a step
struct StepInput<'a> {
    catalog: &'a Catalog,
    identities: &'a dyn IdentityProvider,
    objects: &'a ObjectMap,
}

#[derive(Default)]
struct Reached {
    success: bool,
    failure: bool,
}

// ── Step engine ──────────────────────────────────────────────────────

/// Fires the transitions of workflow instances
#[derive(Clone, Debug)]
pub struct StepEngine {
    evaluator: ConditionEvaluator,
    fail_on_violation: bool,
    retire_on_terminal: bool,
}

impl StepEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            evaluator: ConditionEvaluator::new(),
            fail_on_violation: config.fail_on_violation,
            retire_on_terminal: config.retire_on_terminal,
        }
    }

    /// Advance an instance; true if at least one bucket fired
    pub fn step(
        &self,
        catalog: &Catalog,
        identities: &dyn IdentityProvider,
        instance: &mut Instance,
        objects: &ObjectMap,
        filter: Option<&StateFilter>,
        condition: Option<&mut dyn ConditionFn>,
    ) -> WorkflowResult<bool> {
        self.run(catalog, identities, instance, objects, filter, condition)
            .map(|report| report.fired())
    }

    /// Advance an instance and report what every fired bucket changed
    pub fn run(
        &self,
        catalog: &Catalog,
        identities: &dyn IdentityProvider,
        instance: &mut Instance,
        objects: &ObjectMap,
        filter: Option<&StateFilter>,
        condition: Option<&mut dyn ConditionFn>,
    ) -> WorkflowResult<StepReport> {
        if instance.is_terminal() {
            tracing::trace!(instance = %instance.id, "Step on terminal instance ignored");
            return Ok(StepReport::default());
        }

        let input = StepInput {
            catalog,
            identities,
            objects,
        };
        let snapshot = instance.clone();
        match self.fire_buckets(&input, instance, filter, condition) {
            Ok(report) => Ok(report),
            Err(err) => {
                *instance = snapshot;
                if self.fail_on_violation && err.is_rule_violation() {
                    instance.fail();
                    if self.retire_on_terminal {
                        retire_non_terminal(catalog, instance);
                    }
                    tracing::warn!(instance = %instance.id, error = %err, "Step aborted, instance failed");
                } else {
                    tracing::debug!(instance = %instance.id, error = %err, "Step aborted");
                }
                Err(err)
            }
        }
    }

    fn fire_buckets(
        &self,
        input: &StepInput<'_>,
        instance: &mut Instance,
        filter: Option<&StateFilter>,
        mut condition: Option<&mut dyn ConditionFn>,
    ) -> WorkflowResult<StepReport> {
        let buckets = collect_buckets(input.catalog, instance)?;
        let mut report = StepReport::default();
        let mut reached = Reached::default();

        for bucket in &buckets {
            if let Some(filter) = filter {
                if !filter.admits(bucket.sources.iter().map(String::as_str)) {
                    tracing::trace!(token = bucket.token, "Bucket filtered out");
                    continue;
                }
            }
            let consumed = bucket
                .pairs
                .iter()
                .any(|p| !instance.detail(p.detail).is_some_and(|d| d.is_current));
            if consumed {
                tracing::trace!(token = bucket.token, "Bucket source already left this step");
                continue;
            }

            let kind = bucket.kind()?;
            let callable = condition.as_deref_mut();
            let firing = match kind {
                TransitionKind::Sequence => self.sequence(input, instance, bucket, callable)?,
                TransitionKind::Split => self.split(input, instance, bucket, callable)?,
                TransitionKind::Synch => self.synch(input, instance, bucket, callable)?,
                TransitionKind::Choice => self.choice(input, instance, bucket, callable)?,
                TransitionKind::Merge => self.merge(input, instance, bucket, callable)?,
            };
            let Some(firing) = firing else {
                tracing::debug!(instance = %instance.id, token = bucket.token, kind = %kind, "Bucket did not fire");
                continue;
            };

            let fired = apply(instance, bucket.token, kind, firing, &mut reached);
            if reached.success && reached.failure {
                return Err(WorkflowError::Inconsistency(instance.id));
            }
            tracing::debug!(
                instance = %instance.id,
                token = bucket.token,
                kind = %kind,
                left = fired.left.len(),
                entered = fired.entered.len(),
                "Bucket fired"
            );
            report.buckets.push(fired);
        }

        if reached.success {
            instance.succeed();
            tracing::info!(instance = %instance.id, "Workflow instance succeeded");
        } else if reached.failure {
            instance.fail();
            tracing::info!(instance = %instance.id, "Workflow instance failed");
        }
        if instance.is_terminal() && self.retire_on_terminal {
            retire_non_terminal(input.catalog, instance);
        }
        Ok(report)
    }

    // ── Firing rules ─────────────────────────────────────────────────

    fn sequence<'c>(
        &self,
        input: &StepInput<'_>,
        instance: &Instance,
        bucket: &Bucket<'c>,
        callable: Option<&mut (dyn ConditionFn + '_)>,
    ) -> WorkflowResult<Option<Firing<'c>>> {
        if bucket.pairs.len() != 1 {
            return Err(WorkflowError::SequenceArity {
                token: bucket.token.to_string(),
                found: bucket.pairs.len(),
            });
        }
        let pair = &bucket.pairs[0];
        let ctx = bucket.context(instance, TransitionKind::Sequence);
        // an unconditional hop fires whatever the callable would answer
        let gated = pair
            .transition
            .condition
            .as_ref()
            .is_some_and(|expr| !expr.is_trivial());
        let condition = match callable {
            Some(callable) if gated => Condition::Callable(callable),
            _ => Condition::Expression(pair.transition.condition.as_ref()),
        };
        let proceed = match self.evaluator.evaluate(condition, &ctx, &bucket.objects[0])? {
            FireDecision::All => true,
            FireDecision::Only(name) => name == pair.to.name,
            FireDecision::Subset(_) | FireDecision::Veto => false,
        };
        if !proceed {
            return Ok(None);
        }

        let object = destination_object(input, pair.to, &bucket.objects[0])?;
        Ok(Some(Firing {
            leave: vec![pair.detail],
            enter: vec![Entry {
                state: pair.to,
                object,
                via: pair.transition.id,
            }],
        }))
    }

    fn split<'c>(
        &self,
        input: &StepInput<'_>,
        instance: &Instance,
        bucket: &Bucket<'c>,
        callable: Option<&mut (dyn ConditionFn + '_)>,
    ) -> WorkflowResult<Option<Firing<'c>>> {
        if bucket.pairs.len() < 2 {
            return Err(WorkflowError::SplitArity {
                token: bucket.token.to_string(),
                found: bucket.pairs.len(),
            });
        }
        if !bucket.single_source() {
            return Err(WorkflowError::SplitSource {
                token: bucket.token.to_string(),
            });
        }

        let ctx = bucket.context(instance, TransitionKind::Split);
        let mut seen = HashSet::new();
        let branches: Vec<&Pair<'c>> = bucket
            .pairs
            .iter()
            .filter(|p| seen.insert(p.to.id))
            .collect();
        let proceed = match self.decide_all(bucket, &ctx, callable)? {
            FireDecision::All => true,
            FireDecision::Subset(names) => {
                let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
                let declared: HashSet<&str> = branches.iter().map(|p| p.to.name.as_str()).collect();
                wanted == declared
            }
            FireDecision::Only(_) | FireDecision::Veto => false,
        };
        if !proceed {
            return Ok(None);
        }

        let source = &bucket.objects[0];
        let mut enter = Vec::with_capacity(branches.len());
        for pair in branches {
            enter.push(Entry {
                state: pair.to,
                object: destination_object(input, pair.to, source)?,
                via: pair.transition.id,
            });
        }
        Ok(Some(Firing {
            leave: bucket.source_details(),
            enter,
        }))
    }

    fn synch<'c>(
        &self,
        input: &StepInput<'_>,
        instance: &Instance,
        bucket: &Bucket<'c>,
        callable: Option<&mut (dyn ConditionFn + '_)>,
    ) -> WorkflowResult<Option<Firing<'c>>> {
        if bucket.pairs.len() < 2 {
            return Err(WorkflowError::SynchArity {
                token: bucket.token.to_string(),
                found: bucket.pairs.len(),
            });
        }
        let first = &bucket.pairs[0];
        if bucket.pairs.iter().any(|p| p.to.id != first.to.id) {
            return Err(WorkflowError::SynchTarget {
                token: bucket.token.to_string(),
            });
        }

        let ctx = bucket.context(instance, TransitionKind::Synch);
        let proceed = match self.decide_all(bucket, &ctx, callable)? {
            FireDecision::All => true,
            FireDecision::Only(name) => name == first.to.name,
            FireDecision::Subset(_) | FireDecision::Veto => false,
        };
        if !proceed {
            return Ok(None);
        }

        // Several sources, so the joined object must come from the caller
        let object = input.objects.get(&first.to.name).ok_or_else(|| {
            WorkflowError::SynchMissingObject {
                state: first.to.name.clone(),
            }
        })?;
        Ok(Some(Firing {
            leave: bucket.source_details(),
            enter: vec![Entry {
                state: first.to,
                object: ObjectRef::identify(object, input.identities),
                via: first.transition.id,
            }],
        }))
    }

    fn choice<'c>(
        &self,
        input: &StepInput<'_>,
        instance: &Instance,
        bucket: &Bucket<'c>,
        callable: Option<&mut (dyn ConditionFn + '_)>,
    ) -> WorkflowResult<Option<Firing<'c>>> {
        if !bucket.single_source() {
            return Err(WorkflowError::ChoiceSource {
                token: bucket.token.to_string(),
            });
        }

        let ctx = bucket.context(instance, TransitionKind::Choice);
        let chosen = match callable {
            Some(callable) => {
                let decision = self.evaluator.evaluate(
                    Condition::Callable(callable),
                    &ctx,
                    &bucket.objects[0],
                )?;
                match decision {
                    FireDecision::Only(name) => bucket.pairs.iter().position(|p| p.to.name == name),
                    FireDecision::All | FireDecision::Subset(_) | FireDecision::Veto => None,
                }
            }
            None => self.first_holding(bucket, &ctx)?,
        };
        let Some(index) = chosen else {
            return Ok(None);
        };

        let pair = &bucket.pairs[index];
        let object = destination_object(input, pair.to, &bucket.objects[index])?;
        Ok(Some(Firing {
            leave: vec![pair.detail],
            enter: vec![Entry {
                state: pair.to,
                object,
                via: pair.transition.id,
            }],
        }))
    }

    fn merge<'c>(
        &self,
        input: &StepInput<'_>,
        instance: &Instance,
        bucket: &Bucket<'c>,
        callable: Option<&mut (dyn ConditionFn + '_)>,
    ) -> WorkflowResult<Option<Firing<'c>>> {
        let Some(first) = bucket.pairs.first() else {
            return Err(WorkflowError::MergeArity {
                token: bucket.token.to_string(),
            });
        };

        let ctx = bucket.context(instance, TransitionKind::Merge);
        let chosen = match callable {
            Some(callable) => {
                let decision = self.evaluator.evaluate(
                    Condition::Callable(callable),
                    &ctx,
                    &bucket.objects[0],
                )?;
                match decision {
                    FireDecision::All => Some(0),
                    FireDecision::Only(name) if name == first.to.name => Some(0),
                    _ => None,
                }
            }
            None => self.first_holding(bucket, &ctx)?,
        };
        let Some(index) = chosen else {
            return Ok(None);
        };

        let pair = &bucket.pairs[index];
        let object = destination_object(input, pair.to, &bucket.objects[index])?;
        Ok(Some(Firing {
            leave: bucket.source_details(),
            enter: vec![Entry {
                state: pair.to,
                object,
                via: pair.transition.id,
            }],
        }))
    }

    // ── Decisions ────────────────────────────────────────────────────

    /// The callable's answer, or `All` when every pair's condition holds
    fn decide_all(
        &self,
        bucket: &Bucket<'_>,
        ctx: &DecisionContext<'_>,
        callable: Option<&mut (dyn ConditionFn + '_)>,
    ) -> WorkflowResult<FireDecision> {
        if let Some(callable) = callable {
            return self
                .evaluator
                .evaluate(Condition::Callable(callable), ctx, &bucket.objects[0]);
        }
        for (pair, object) in bucket.pairs.iter().zip(&bucket.objects) {
            let condition = Condition::Expression(pair.transition.condition.as_ref());
            if self.evaluator.evaluate(condition, ctx, object)?.is_veto() {
                return Ok(FireDecision::Veto);
            }
        }
        Ok(FireDecision::All)
    }

    /// Index of the first pair whose condition holds
    fn first_holding(
        &self,
        bucket: &Bucket<'_>,
        ctx: &DecisionContext<'_>,
    ) -> WorkflowResult<Option<usize>> {
        for (index, (pair, object)) in bucket.pairs.iter().zip(&bucket.objects).enumerate() {
            let condition = Condition::Expression(pair.transition.condition.as_ref());
            if !self.evaluator.evaluate(condition, ctx, object)?.is_veto() {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }
}

/// Buckets of the details current at step start, in declaration order
fn collect_buckets<'c>(catalog: &'c Catalog, instance: &Instance) -> WorkflowResult<Vec<Bucket<'c>>> {
    let mut buckets: Vec<Bucket<'c>> = Vec::new();
    let mut by_token: HashMap<&'c str, usize> = HashMap::new();

    for detail in instance.current_details() {
        let from = catalog.state(detail.state)?;
        if from.workflow != instance.workflow {
            return Err(WorkflowError::ForeignState {
                workflow: instance.workflow,
                state: detail.state,
            });
        }
        for transition in catalog.outgoing(detail.state)? {
            let to = catalog.state(transition.to)?;
            let slot = *by_token.entry(transition.token.as_str()).or_insert_with(|| {
                buckets.push(Bucket::new(&transition.token));
                buckets.len() - 1
            });
            buckets[slot].pairs.push(Pair {
                transition,
                to,
                detail: detail.id,
            });
        }
    }

    for bucket in &mut buckets {
        bucket.pairs.sort_by_key(|p| (p.transition.id, p.detail));
        for pair in &bucket.pairs {
            let detail = instance
                .detail(pair.detail)
                .ok_or(WorkflowError::InstanceNotFound(instance.id))?;
            bucket.sources.push(detail.state_name.clone());
            bucket.destinations.push(pair.to.name.clone());
            bucket.objects.push(detail.object.clone());
        }
    }
    buckets.sort_by_key(|b| b.first_transition());

    tracing::trace!(instance = %instance.id, buckets = buckets.len(), "Buckets collected");
    Ok(buckets)
}

/// Caller-supplied object for the destination, else the source's
fn destination_object(
    input: &StepInput<'_>,
    to: &State,
    source: &ObjectRef,
) -> WorkflowResult<ObjectRef> {
    match input.objects.get(&to.name) {
        Some(object) => Ok(ObjectRef::identify(object, input.identities)),
        None if source.is_released() => Err(WorkflowError::ObjectReleased(source.id.clone())),
        None => Ok(source.clone()),
    }
}

fn apply(
    instance: &mut Instance,
    token: &str,
    kind: TransitionKind,
    firing: Firing<'_>,
    reached: &mut Reached,
) -> FiredBucket {
    let left = firing
        .leave
        .into_iter()
        .filter(|detail| instance.leave(*detail))
        .collect();
    let entered = firing
        .enter
        .into_iter()
        .map(|entry| {
            reached.success |= entry.state.is_success();
            reached.failure |= entry.state.is_failure();
            instance.enter(
                entry.state.id,
                entry.state.name.clone(),
                entry.object,
                Some(entry.via),
            )
        })
        .collect();
    FiredBucket {
        token: token.to_string(),
        kind,
        left,
        entered,
    }
}

/// Leave every current detail that is not on a terminal state
fn retire_non_terminal(catalog: &Catalog, instance: &mut Instance) {
    let stale: Vec<DetailId> = instance
        .current_details()
        .filter(|d| {
            catalog
                .state(d.state)
                .map_or(true, |s| !s.flags.is_terminal())
        })
        .map(|d| d.id)
        .collect();
    for detail in stale {
        instance.leave(detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_types::{
        condition_fn, NewTransition, Record, SequentialIdentity, SharedObject, StateFlags,
        StateId, WorkflowId,
    };

    struct Fixture {
        catalog: Catalog,
        wf: WorkflowId,
        identities: SequentialIdentity,
        object: SharedObject,
    }

    impl Fixture {
        fn new() -> Self {
            let mut catalog = Catalog::new();
            let wf = catalog.register_workflow("Unit", 1).unwrap();
            Self {
                catalog,
                wf,
                identities: SequentialIdentity::new(),
                object: Record::new("Doc").with("name", "go").shared(),
            }
        }

        fn state(&mut self, name: &str, flags: StateFlags) -> StateId {
            self.catalog.add_state(self.wf, name, "Doc", flags).unwrap()
        }

        fn instance(&self, states: &[StateId]) -> Instance {
            let mut instance = Instance::new(workflow_types::InstanceId(0), self.wf);
            for state in states {
                let name = self.catalog.state(*state).unwrap().name.clone();
                let reference = ObjectRef::identify(&self.object, &self.identities);
                instance.enter(*state, name, reference, None);
            }
            instance
        }

        fn run(
            &self,
            engine: &StepEngine,
            instance: &mut Instance,
            condition: Option<&mut dyn ConditionFn>,
        ) -> WorkflowResult<StepReport> {
            engine.run(
                &self.catalog,
                &self.identities,
                instance,
                &ObjectMap::new(),
                None,
                condition,
            )
        }
    }

    fn engine() -> StepEngine {
        StepEngine::new(&EngineConfig::default())
    }

    #[test]
    fn test_buckets_follow_declaration_order() {
        let mut fx = Fixture::new();
        let a = fx.state("a", StateFlags::initial());
        let b = fx.state("b", StateFlags::NONE);
        let x = fx.state("x", StateFlags::NONE);
        let y = fx.state("y", StateFlags::NONE);
        fx.catalog
            .add_transition(fx.wf, NewTransition::sequence("first", a, x))
            .unwrap();
        fx.catalog
            .add_transition(fx.wf, NewTransition::sequence("second", b, y))
            .unwrap();

        // b's detail is created before a's, declaration order still wins
        let mut instance = fx.instance(&[b, a]);
        let report = fx.run(&engine(), &mut instance, None).unwrap();
        let tokens: Vec<&str> = report.buckets.iter().map(|b| b.token.as_str()).collect();
        assert_eq!(tokens, vec!["first", "second"]);
        assert_eq!(instance.current_state_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_left_source_skips_later_bucket() {
        let mut fx = Fixture::new();
        let a = fx.state("a", StateFlags::initial());
        let b = fx.state("b", StateFlags::NONE);
        let c = fx.state("c", StateFlags::NONE);
        fx.catalog
            .add_transition(fx.wf, NewTransition::sequence("to_b", a, b))
            .unwrap();
        fx.catalog
            .add_transition(fx.wf, NewTransition::sequence("to_c", a, c))
            .unwrap();

        let mut instance = fx.instance(&[a]);
        let report = fx.run(&engine(), &mut instance, None).unwrap();
        assert_eq!(report.buckets.len(), 1);
        assert_eq!(instance.current_state_names(), vec!["b"]);
    }

    #[test]
    fn test_new_details_wait_for_next_step() {
        let mut fx = Fixture::new();
        let a = fx.state("a", StateFlags::initial());
        let b = fx.state("b", StateFlags::NONE);
        let c = fx.state("c", StateFlags::NONE);
        fx.catalog
            .add_transition(fx.wf, NewTransition::sequence("ab", a, b))
            .unwrap();
        fx.catalog
            .add_transition(fx.wf, NewTransition::sequence("bc", b, c))
            .unwrap();

        let mut instance = fx.instance(&[a]);
        fx.run(&engine(), &mut instance, None).unwrap();
        assert_eq!(instance.current_state_names(), vec!["b"]);
        fx.run(&engine(), &mut instance, None).unwrap();
        assert_eq!(instance.current_state_names(), vec!["c"]);
    }

    #[test]
    fn test_callable_error_rolls_back_without_failing() {
        let mut fx = Fixture::new();
        let a = fx.state("a", StateFlags::initial());
        let b = fx.state("b", StateFlags::NONE);
        let c = fx.state("c", StateFlags::NONE);
        let d = fx.state("d", StateFlags::NONE);
        fx.catalog
            .add_transition(fx.wf, NewTransition::sequence("ab", a, b).with_condition("x = 1"))
            .unwrap();
        fx.catalog
            .add_transition(fx.wf, NewTransition::sequence("cd", c, d).with_condition("x = 1"))
            .unwrap();

        let mut instance = fx.instance(&[a, c]);
        let mut calls = 0;
        let mut callable = condition_fn(|_| {
            calls += 1;
            if calls == 1 {
                Ok(FireDecision::All)
            } else {
                Err("abort".into())
            }
        });
        let result = fx.run(&engine(), &mut instance, Some(&mut callable));

        assert!(matches!(result, Err(WorkflowError::ConditionFailed(_))));
        assert!(instance.is_active());
        assert_eq!(instance.current_state_names(), vec!["a", "c"]);
        assert_eq!(instance.details.len(), 2);
    }

    #[test]
    fn test_violation_can_leave_instance_active() {
        let mut fx = Fixture::new();
        let a = fx.state("a", StateFlags::initial());
        let b = fx.state("b", StateFlags::NONE);
        let c = fx.state("c", StateFlags::NONE);
        for (name, to) in [("s1", b), ("s2", c)] {
            fx.catalog
                .add_transition(
                    fx.wf,
                    NewTransition::sequence(name, a, to).with_token("shared"),
                )
                .unwrap();
        }

        let lenient = StepEngine::new(&EngineConfig::default().with_fail_on_violation(false));
        let mut instance = fx.instance(&[a]);
        let result = fx.run(&lenient, &mut instance, None);
        assert!(matches!(
            result,
            Err(WorkflowError::SequenceArity { found: 2, .. })
        ));
        assert!(instance.is_active());

        let result = fx.run(&engine(), &mut instance, None);
        assert!(result.is_err());
        assert!(instance.failed());
        assert_eq!(instance.current_count(), 0);
    }

    #[test]
    fn test_inconsistent_terminals_abort() {
        let mut fx = Fixture::new();
        let a = fx.state("a", StateFlags::initial());
        let ok = fx.state("ok", StateFlags::success());
        let bad = fx.state("bad", StateFlags::failure());
        for (name, to) in [("won", ok), ("lost", bad)] {
            fx.catalog
                .add_transition(
                    fx.wf,
                    NewTransition::new(name, a, to, TransitionKind::Split).with_token("both"),
                )
                .unwrap();
        }

        let mut instance = fx.instance(&[a]);
        let result = fx.run(&engine(), &mut instance, None);
        assert!(matches!(result, Err(WorkflowError::Inconsistency(_))));
        assert!(instance.failed());
        assert!(!instance.succeeded());
        assert_eq!(instance.details.len(), 1);
    }
}

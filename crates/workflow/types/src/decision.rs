//! Firing decisions: conditions, callables and source-state filters
//!
//! A bucket of transitions is gated either by the declarative
//! [`Expression`]s attached to its transitions or by a caller-supplied
//! [`ConditionFn`]. A callable answers with a [`FireDecision`] that the
//! step engine interprets per transition kind.

use crate::{ConditionError, Expression, Instance, ObjectRef, TransitionKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Answer of a condition callable
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FireDecision {
    /// Proceed along the default destinations
    All,
    /// Proceed only towards the named destination
    Only(String),
    /// Split only: proceed if the names are exactly the split destinations
    Subset(Vec<String>),
    /// Do not proceed
    Veto,
}

impl FireDecision {
    pub fn only(state: impl Into<String>) -> Self {
        Self::Only(state.into())
    }

    pub fn subset<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Subset(states.into_iter().map(Into::into).collect())
    }

    pub fn is_veto(&self) -> bool {
        matches!(self, Self::Veto)
    }
}

impl From<bool> for FireDecision {
    fn from(proceed: bool) -> Self {
        if proceed {
            Self::All
        } else {
            Self::Veto
        }
    }
}

/// What a condition callable sees of the bucket being fired
#[derive(Debug)]
pub struct DecisionContext<'a> {
    pub instance: &'a Instance,
    pub token: &'a str,
    pub kind: TransitionKind,
    /// Source state names, one per transition
    pub sources: &'a [String],
    /// Destination state names, one per transition
    pub destinations: &'a [String],
    /// Reference objects of the source details, one per transition
    pub objects: &'a [ObjectRef],
}

impl DecisionContext<'_> {
    /// Distinct destination names in transition order
    pub fn distinct_destinations(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.destinations
            .iter()
            .map(String::as_str)
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

/// A caller-supplied condition
pub trait ConditionFn {
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<FireDecision, ConditionError>;
}

/// A fixed decision, whatever the bucket
impl ConditionFn for FireDecision {
    fn decide(&mut self, _ctx: &DecisionContext<'_>) -> Result<FireDecision, ConditionError> {
        Ok(self.clone())
    }
}

/// Adapter turning a closure into a [`ConditionFn`]
pub struct FnCondition<F>(F);

impl<F> ConditionFn for FnCondition<F>
where
    F: FnMut(&DecisionContext<'_>) -> Result<FireDecision, ConditionError>,
{
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<FireDecision, ConditionError> {
        (self.0)(ctx)
    }
}

pub fn condition_fn<F>(f: F) -> FnCondition<F>
where
    F: FnMut(&DecisionContext<'_>) -> Result<FireDecision, ConditionError>,
{
    FnCondition(f)
}

/// The gate of one firing, dispatched on by the condition evaluator
pub enum Condition<'a> {
    /// The transition's own expression; `None` always holds
    Expression(Option<&'a Expression>),
    Callable(&'a mut dyn ConditionFn),
}

// ── Source-state filter ──────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPolicy {
    /// Fire a bucket when at least one source is allowed
    #[default]
    AnyOf,
    /// Fire a bucket only when every source is allowed
    AllOf,
}

/// Restricts a step to buckets leaving the allowed states
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFilter {
    pub states: HashSet<String>,
    pub policy: FilterPolicy,
}

impl StateFilter {
    pub fn new<I, S>(states: I, policy: FilterPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            states: states.into_iter().map(Into::into).collect(),
            policy,
        }
    }

    pub fn any_of<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(states, FilterPolicy::AnyOf)
    }

    pub fn all_of<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(states, FilterPolicy::AllOf)
    }

    /// Whether a bucket with these source names may fire
    pub fn admits<'s>(&self, mut sources: impl Iterator<Item = &'s str>) -> bool {
        match self.policy {
            FilterPolicy::AnyOf => sources.any(|s| self.states.contains(s)),
            FilterPolicy::AllOf => sources.all(|s| self.states.contains(s)),
        }
    }
}

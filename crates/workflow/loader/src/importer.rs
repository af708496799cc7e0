//! Importer: expands descriptions into catalog records
//!
//! Every transition group expands into one transition per from/to pair,
//! named `<token>__<from>_to_<to>` and sharing the group's token. The
//! condition of a pair depends on the kind:
//!
//! - **split**: one condition for every pair
//! - **synch**: keyed by the source state
//! - **choice**: keyed by the destination state
//! - **sequence / merge**: keyed by the destination state, else by the
//!   source state
//!
//! An import is all or nothing: the description is checked first, then
//! registered into a staged copy that replaces the caller's catalog
//! only once every record was accepted.

use crate::description::{ConditionDecl, Definition, StateDecl, TransitionDecl, WorkflowDecl};
use crate::errors::{LoaderError, LoaderResult};
use std::collections::{HashMap, HashSet};
use workflow_engine::Catalog;
use workflow_types::{NewTransition, StateFlags, StateId, TransitionKind, WorkflowId};

/// One expanded transition
#[derive(Clone, Debug, PartialEq)]
struct PairPlan {
    name: String,
    from: String,
    to: String,
    condition: Option<String>,
}

/// Endpoint of a pair whose name keys a per-state condition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KeyedBy {
    Source,
    Destination,
}

impl KeyedBy {
    pub(crate) fn pick<'a>(self, from: &'a str, to: &'a str) -> &'a str {
        match self {
            KeyedBy::Source => from,
            KeyedBy::Destination => to,
        }
    }
}

/// Keys tried, in order, when looking up the condition of one pair
pub(crate) fn lookup_order(kind: TransitionKind) -> &'static [KeyedBy] {
    match kind {
        TransitionKind::Synch => &[KeyedBy::Source],
        TransitionKind::Split | TransitionKind::Choice => &[KeyedBy::Destination],
        TransitionKind::Merge | TransitionKind::Sequence => {
            &[KeyedBy::Destination, KeyedBy::Source]
        }
    }
}

#[derive(Clone, Debug)]
struct GroupPlan {
    token: String,
    kind: TransitionKind,
    pairs: Vec<PairPlan>,
}

/// Import every workflow of a JSON description
pub fn import_json(catalog: &mut Catalog, json: &str) -> LoaderResult<Vec<WorkflowId>> {
    let definition: Definition = serde_json::from_str(json)?;
    import_definition(catalog, &definition)
}

pub fn import_value(
    catalog: &mut Catalog,
    value: serde_json::Value,
) -> LoaderResult<Vec<WorkflowId>> {
    let definition: Definition = serde_json::from_value(value)?;
    import_definition(catalog, &definition)
}

/// Import a parsed definition; ids are returned in declaration order
pub fn import_definition(
    catalog: &mut Catalog,
    definition: &Definition,
) -> LoaderResult<Vec<WorkflowId>> {
    let plans = definition
        .iter()
        .map(|(name, decl)| -> LoaderResult<_> { Ok((name, decl, plan_groups(name, decl)?)) })
        .collect::<LoaderResult<Vec<_>>>()?;

    let mut staged = catalog.clone();
    let mut ids = Vec::with_capacity(plans.len());
    for (name, decl, groups) in plans {
        ids.push(register(&mut staged, name, decl, &groups)?);
    }
    *catalog = staged;
    Ok(ids)
}

fn register(
    catalog: &mut Catalog,
    name: &str,
    decl: &WorkflowDecl,
    groups: &[GroupPlan],
) -> LoaderResult<WorkflowId> {
    let workflow = catalog.register_workflow(name, decl.version)?;

    let mut states: HashMap<&str, StateId> = HashMap::new();
    for state in &decl.states {
        let id = catalog.add_state(
            workflow,
            state.name.as_str(),
            state.ref_type.as_str(),
            flags(state),
        )?;
        states.insert(state.name.as_str(), id);
    }

    let mut count = 0;
    for group in groups {
        for pair in &group.pairs {
            let from = state_id(&states, name, &group.token, &pair.from)?;
            let to = state_id(&states, name, &group.token, &pair.to)?;
            let mut request = NewTransition::new(pair.name.as_str(), from, to, group.kind)
                .with_token(group.token.as_str());
            if let Some(condition) = &pair.condition {
                request = request.with_condition(condition.as_str());
            }
            catalog.add_transition(workflow, request)?;
            count += 1;
        }
    }

    tracing::info!(
        workflow = %workflow,
        name = %name,
        states = decl.states.len(),
        transitions = count,
        tokens = groups.len(),
        "Workflow imported"
    );
    Ok(workflow)
}

fn flags(state: &StateDecl) -> StateFlags {
    StateFlags {
        initial: state.initial,
        success: state.success,
        failure: state.failure,
    }
}

fn state_id(
    states: &HashMap<&str, StateId>,
    workflow: &str,
    transition: &str,
    name: &str,
) -> LoaderResult<StateId> {
    states
        .get(name)
        .copied()
        .ok_or_else(|| LoaderError::UnknownState {
            workflow: workflow.to_string(),
            transition: transition.to_string(),
            state: name.to_string(),
        })
}

// ── Planning ─────────────────────────────────────────────────────────

fn plan_groups(workflow: &str, decl: &WorkflowDecl) -> LoaderResult<Vec<GroupPlan>> {
    let known: HashSet<&str> = decl.states.iter().map(|s| s.name.as_str()).collect();
    decl.transitions
        .iter()
        .map(|(token, transition)| plan_group(workflow, &known, token, transition))
        .collect()
}

fn plan_group(
    workflow: &str,
    known: &HashSet<&str>,
    token: &str,
    decl: &TransitionDecl,
) -> LoaderResult<GroupPlan> {
    let kind: TransitionKind = decl.kind.parse().map_err(|_| LoaderError::InvalidKind {
        transition: token.to_string(),
        kind: decl.kind.clone(),
    })?;

    let from = endpoints(token, decl.from.names())?;
    let to = endpoints(token, decl.to.names())?;
    if let Some(unknown) = from.iter().chain(&to).find(|name| !known.contains(*name)) {
        return Err(LoaderError::UnknownState {
            workflow: workflow.to_string(),
            transition: token.to_string(),
            state: unknown.to_string(),
        });
    }

    if kind == TransitionKind::Split {
        if let Some(ConditionDecl::PerState(per_state)) = &decl.condition {
            let mut texts = per_state.values().map(|c| c.trim());
            let first = texts.next();
            if texts.any(|c| Some(c) != first) {
                return Err(LoaderError::SplitCondition {
                    transition: token.to_string(),
                });
            }
        }
    }

    let mut pairs = Vec::with_capacity(from.len() * to.len());
    for f in &from {
        for t in &to {
            pairs.push(PairPlan {
                name: format!("{}__{}_to_{}", token, f, t),
                from: f.to_string(),
                to: t.to_string(),
                condition: pair_condition(token, kind, decl.condition.as_ref(), f, t)?,
            });
        }
    }
    Ok(GroupPlan {
        token: token.to_string(),
        kind,
        pairs,
    })
}

fn endpoints<'a>(token: &str, names: Vec<&'a str>) -> LoaderResult<Vec<&'a str>> {
    if names.is_empty() {
        return Err(LoaderError::EmptyEndpoints {
            transition: token.to_string(),
        });
    }
    let mut seen = HashSet::new();
    if let Some(repeated) = names.iter().find(|name| !seen.insert(**name)) {
        return Err(LoaderError::DuplicateEndpoint {
            transition: token.to_string(),
            state: repeated.to_string(),
        });
    }
    Ok(names)
}

fn pair_condition(
    token: &str,
    kind: TransitionKind,
    condition: Option<&ConditionDecl>,
    from: &str,
    to: &str,
) -> LoaderResult<Option<String>> {
    let per_state = match condition {
        None => return Ok(None),
        Some(ConditionDecl::Single(text)) => return Ok(Some(text.clone())),
        Some(ConditionDecl::PerState(per_state)) => per_state,
    };

    if kind == TransitionKind::Split {
        // uniformity was checked; any entry will do
        return Ok(per_state.values().next().cloned());
    }
    let keys: Vec<&str> = lookup_order(kind)
        .iter()
        .map(|by| by.pick(from, to))
        .collect();
    keys.iter()
        .find_map(|key| per_state.get(key))
        .cloned()
        .map(Some)
        .ok_or_else(|| LoaderError::MissingCondition {
            transition: token.to_string(),
            state: keys[0].to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use workflow_types::WorkflowError;

    fn three_states() -> serde_json::Value {
        json!([
            { "name": "a", "model": "Doc", "is_initial_state": true },
            { "name": "b", "model": "Doc" },
            { "name": "c", "model": "Doc", "is_success_state": true }
        ])
    }

    #[test]
    fn test_product_expansion() {
        let mut catalog = Catalog::new();
        let ids = import_value(
            &mut catalog,
            json!({
                "W": {
                    "states": three_states(),
                    "transitions": {
                        "fan": { "from_state": ["a", "b"], "to_state": ["b", "c"], "type": "merge",
                                 "condition": { "b": "x = 1", "c": "x = 2" } }
                    }
                }
            }),
        )
        .unwrap();

        let transitions = catalog.transitions_of(ids[0]).unwrap();
        let names: Vec<&str> = transitions.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["fan__a_to_b", "fan__a_to_c", "fan__b_to_b", "fan__b_to_c"]
        );
        assert!(transitions.iter().all(|t| t.token == "fan"));
        assert_eq!(transitions[1].condition_text(), "x = 2");
        assert_eq!(transitions[2].condition_text(), "x = 1");
    }

    #[test]
    fn test_condition_lookup_by_kind() {
        let mut catalog = Catalog::new();
        let ids = import_value(
            &mut catalog,
            json!({
                "W": {
                    "states": three_states(),
                    "transitions": {
                        "join": { "from_state": ["a", "b"], "to_state": "c", "type": "synch",
                                  "condition": { "a": "x = 'a'", "b": "x = 'b'" } },
                        "fold": { "from_state": ["a", "b"], "to_state": "c", "type": "merge",
                                  "condition": { "a": "y = 'a'", "b": "y = 'b'" } }
                    }
                }
            }),
        )
        .unwrap();

        let texts: Vec<&str> = catalog
            .transitions_of(ids[0])
            .unwrap()
            .iter()
            .map(|t| t.condition_text())
            .collect();
        assert_eq!(texts, vec!["x = 'a'", "x = 'b'", "y = 'a'", "y = 'b'"]);
    }

    #[test]
    fn test_choice_needs_condition_per_destination() {
        let mut catalog = Catalog::new();
        let result = import_value(
            &mut catalog,
            json!({
                "W": {
                    "states": three_states(),
                    "transitions": {
                        "pick": { "from_state": "a", "to_state": ["b", "c"], "type": "choice",
                                  "condition": { "b": "x = 1" } }
                    }
                }
            }),
        );
        assert!(matches!(
            result,
            Err(LoaderError::MissingCondition { ref state, .. }) if state == "c"
        ));
        assert_eq!(catalog.workflow_count(), 0);
    }

    #[test]
    fn test_split_conditions_must_agree() {
        let mut catalog = Catalog::new();
        let uneven = json!({
            "W": {
                "states": three_states(),
                "transitions": {
                    "fork": { "from_state": "a", "to_state": ["b", "c"], "type": "split",
                              "condition": { "b": "x = 1", "c": "x = 2" } }
                }
            }
        });
        assert!(matches!(
            import_value(&mut catalog, uneven),
            Err(LoaderError::SplitCondition { .. })
        ));

        let even = json!({
            "W": {
                "states": three_states(),
                "transitions": {
                    "fork": { "from_state": "a", "to_state": ["b", "c"], "type": "split",
                              "condition": { "b": "x = 1", "c": "x = 1" } }
                }
            }
        });
        let ids = import_value(&mut catalog, even).unwrap();
        assert_eq!(catalog.token_transitions(ids[0], "fork").unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_kind_and_unknown_state() {
        let mut catalog = Catalog::new();
        let bad_kind = json!({
            "W": { "states": three_states(),
                   "transitions": { "t": { "from_state": "a", "to_state": "b", "type": "loop" } } }
        });
        assert!(matches!(
            import_value(&mut catalog, bad_kind),
            Err(LoaderError::InvalidKind { ref kind, .. }) if kind == "loop"
        ));

        let unknown = json!({
            "W": { "states": three_states(),
                   "transitions": { "t": { "from_state": "a", "to_state": "zz" } } }
        });
        assert!(matches!(
            import_value(&mut catalog, unknown),
            Err(LoaderError::UnknownState { ref state, .. }) if state == "zz"
        ));

        let empty = json!({
            "W": { "states": three_states(),
                   "transitions": { "t": { "from_state": [], "to_state": "b" } } }
        });
        assert!(matches!(
            import_value(&mut catalog, empty),
            Err(LoaderError::EmptyEndpoints { .. })
        ));
    }

    #[test]
    fn test_failed_import_leaves_catalog_unchanged() {
        let mut catalog = Catalog::new();
        // the second workflow has a condition the catalog cannot parse
        let result = import_value(
            &mut catalog,
            json!({
                "Good": { "states": three_states(),
                          "transitions": { "t": { "from_state": "a", "to_state": "c" } } },
                "Bad": { "states": three_states(),
                         "transitions": { "t": { "from_state": "a", "to_state": "c", "condition": "x = = 1" } } }
            }),
        );
        assert!(matches!(
            result,
            Err(LoaderError::Workflow(WorkflowError::InvalidCondition { .. }))
        ));
        assert_eq!(catalog.workflow_count(), 0);
        assert!(catalog.active_by_name("Good").is_none());
    }

    #[test]
    fn test_version_and_duplicate_name() {
        let mut catalog = Catalog::new();
        let description = json!({
            "W": { "version": 3, "states": three_states(), "transitions": {} }
        });
        let ids = import_value(&mut catalog, description.clone()).unwrap();
        assert_eq!(catalog.workflow(ids[0]).unwrap().version, 3);

        assert!(matches!(
            import_value(&mut catalog, description),
            Err(LoaderError::Workflow(WorkflowError::DuplicateName(_)))
        ));
        assert_eq!(catalog.workflow_count(), 1);
    }

    #[test]
    fn test_malformed_json() {
        let mut catalog = Catalog::new();
        assert!(matches!(
            import_json(&mut catalog, "{ not json"),
            Err(LoaderError::Parse(_))
        ));
    }
}

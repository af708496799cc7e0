//! Exporter: regroups catalog records into descriptions
//!
//! Transitions sharing a token become one group again. A group whose pairs
//! all carry the same condition exports it once; otherwise conditions are
//! keyed the way the importer reads them back. Merges are keyed by
//! destination state unless a destination carries several conditions, in
//! which case they are keyed by source state.

use crate::description::{
    ConditionDecl, Definition, OrderedMap, StateDecl, TransitionDecl, WorkflowDecl,
};
use crate::errors::{LoaderError, LoaderResult};
use crate::importer::lookup_order;
use workflow_engine::Catalog;
use workflow_types::{Transition, TransitionKind, WorkflowId};

/// Describe one workflow of the catalog
pub fn export_workflow(catalog: &Catalog, workflow: WorkflowId) -> LoaderResult<WorkflowDecl> {
    let wf = catalog.workflow(workflow)?;
    let states = catalog
        .states_of(workflow)?
        .into_iter()
        .map(|state| StateDecl {
            name: state.name.clone(),
            ref_type: state.ref_type.clone(),
            initial: state.flags.initial,
            success: state.flags.success,
            failure: state.flags.failure,
        })
        .collect();

    // Token → pairs, in order of each token's first transition
    let mut groups: OrderedMap<Vec<&Transition>> = OrderedMap::new();
    for transition in catalog.transitions_of(workflow)? {
        match groups.get_mut(&transition.token) {
            Some(pairs) => pairs.push(transition),
            None => groups.insert(transition.token.as_str(), vec![transition]),
        }
    }

    let mut transitions = OrderedMap::new();
    for (token, pairs) in groups.iter() {
        transitions.insert(token, group_decl(catalog, pairs)?);
    }

    Ok(WorkflowDecl {
        version: wf.version,
        states,
        transitions,
    })
}

/// Describe every active workflow, in registration order
pub fn export_definition(catalog: &Catalog) -> LoaderResult<Definition> {
    let mut definition = Definition::new();
    for wf in catalog.list().into_iter().filter(|wf| wf.active) {
        definition.insert(wf.name.as_str(), export_workflow(catalog, wf.id)?);
    }
    Ok(definition)
}

fn group_decl(catalog: &Catalog, pairs: &[&Transition]) -> LoaderResult<TransitionDecl> {
    let kind = pairs.first().map_or(TransitionKind::Sequence, |t| t.kind);
    let token = pairs.first().map_or("", |t| t.token.as_str());
    let mut from: Vec<String> = Vec::new();
    let mut to: Vec<String> = Vec::new();
    let mut named: Vec<(&str, &str, &str)> = Vec::with_capacity(pairs.len());
    for transition in pairs {
        let source = catalog.state(transition.from)?.name.as_str();
        let destination = catalog.state(transition.to)?.name.as_str();
        if !from.iter().any(|name| name == source) {
            from.push(source.to_string());
        }
        if !to.iter().any(|name| name == destination) {
            to.push(destination.to_string());
        }
        named.push((source, destination, transition.condition_text()));
    }

    let first = named.first().map_or("", |(_, _, condition)| *condition);
    let condition = if named.iter().all(|(_, _, condition)| *condition == first) {
        (!first.is_empty()).then(|| ConditionDecl::Single(first.to_string()))
    } else {
        Some(ConditionDecl::PerState(keyed_conditions(token, kind, &named)?))
    };

    Ok(TransitionDecl {
        from: from.into(),
        to: to.into(),
        kind: kind.as_str().to_string(),
        condition,
    })
}

/// Key per-pair conditions so the importer's lookup yields each one back
///
/// Each keying the importer understands is tried in its lookup order. A
/// keying is kept when no key carries two conditions and every pair finds
/// its own condition first.
fn keyed_conditions(
    token: &str,
    kind: TransitionKind,
    named: &[(&str, &str, &str)],
) -> LoaderResult<OrderedMap<String>> {
    let order = lookup_order(kind);
    for by in order {
        let mut keyed: OrderedMap<String> = OrderedMap::new();
        let consistent = named.iter().all(|&(from, to, condition)| {
            let key = by.pick(from, to);
            match keyed.get(key) {
                Some(existing) => existing.as_str() == condition,
                None => {
                    keyed.insert(key, condition.to_string());
                    true
                }
            }
        });
        let reproduced = consistent
            && named.iter().all(|&(from, to, condition)| {
                order
                    .iter()
                    .find_map(|k| keyed.get(k.pick(from, to)))
                    .map(String::as_str)
                    == Some(condition)
            });
        if reproduced {
            return Ok(keyed);
        }
    }
    Err(LoaderError::Unexportable {
        transition: token.to_string(),
    })
}

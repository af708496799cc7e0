//! Transitions: directed, token-grouped edges between states
//!
//! Transitions sharing a token are evaluated together and must share a
//! kind. The kind decides how the group fires.

use crate::{Expression, StateId, WorkflowError, WorkflowId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Index of a transition in the catalog arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionId(pub usize);

impl std::fmt::Display for TransitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transition#{}", self.0)
    }
}

/// How a group of transitions sharing a token fires
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    /// One source, one destination
    Sequence,
    /// Parallel split: one source, every destination at once
    Split,
    /// Synchronization: every source joins into one destination
    Synch,
    /// Exclusive choice: one source, exactly one of the destinations
    Choice,
    /// Simple merge: any source leads into the destination
    Merge,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 5] = [
        Self::Sequence,
        Self::Split,
        Self::Synch,
        Self::Choice,
        Self::Merge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Split => "split",
            Self::Synch => "synch",
            Self::Choice => "choice",
            Self::Merge => "merge",
        }
    }
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequence" => Ok(Self::Sequence),
            "split" => Ok(Self::Split),
            "synch" => Ok(Self::Synch),
            "choice" => Ok(Self::Choice),
            "merge" => Ok(Self::Merge),
            _ => Err(WorkflowError::InvalidKind(s.to_string())),
        }
    }
}

/// A transition registered in the catalog
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub workflow: WorkflowId,
    pub name: String,
    pub from: StateId,
    pub to: StateId,
    pub kind: TransitionKind,
    /// Declarative gate; `None` always holds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expression>,
    pub token: String,
}

impl Transition {
    /// Condition source text, empty when unconditional
    pub fn condition_text(&self) -> &str {
        self.condition
            .as_ref()
            .map(Expression::source)
            .unwrap_or("")
    }
}

/// Request to add a transition to a workflow
#[derive(Clone, Debug)]
pub struct NewTransition {
    pub name: String,
    pub from: StateId,
    pub to: StateId,
    pub kind: TransitionKind,
    pub condition: Option<String>,
    /// Defaults to the transition name
    pub token: Option<String>,
}

impl NewTransition {
    pub fn new(name: impl Into<String>, from: StateId, to: StateId, kind: TransitionKind) -> Self {
        Self {
            name: name.into(),
            from,
            to,
            kind,
            condition: None,
            token: None,
        }
    }

    pub fn sequence(name: impl Into<String>, from: StateId, to: StateId) -> Self {
        Self::new(name, from, to, TransitionKind::Sequence)
    }

    /// Blank conditions are treated as unconditional
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        let condition = condition.into();
        self.condition = if condition.trim().is_empty() {
            None
        } else {
            Some(condition)
        };
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> &str {
        self.token.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_and_display() {
        for kind in TransitionKind::ALL {
            assert_eq!(kind.as_str().parse::<TransitionKind>().unwrap(), kind);
        }
        assert_eq!(
            " Split ".parse::<TransitionKind>().unwrap(),
            TransitionKind::Split
        );
        assert!(matches!(
            "fork".parse::<TransitionKind>(),
            Err(WorkflowError::InvalidKind(k)) if k == "fork"
        ));
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&TransitionKind::Synch).unwrap();
        assert_eq!(json, "\"synch\"");
        let back: TransitionKind = serde_json::from_str("\"choice\"").unwrap();
        assert_eq!(back, TransitionKind::Choice);
    }

    #[test]
    fn test_new_transition_defaults() {
        let t = NewTransition::sequence("approve", StateId(0), StateId(1));
        assert_eq!(t.kind, TransitionKind::Sequence);
        assert_eq!(t.token(), "approve");
        assert!(t.condition.is_none());

        let t = t.with_token("grp").with_condition("   ");
        assert_eq!(t.token(), "grp");
        assert!(t.condition.is_none());

        let t = t.with_condition("status = 'ok'");
        assert_eq!(t.condition.as_deref(), Some("status = 'ok'"));
    }
}

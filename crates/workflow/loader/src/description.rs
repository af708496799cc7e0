//! Description: the declarative shape of workflow definitions
//!
//! A definition maps workflow names to their states and transitions:
//!
//! ```json
//! {
//!   "Review": {
//!     "states": [
//!       { "name": "draft", "model": "Doc", "is_initial_state": true },
//!       { "name": "done", "model": "Doc", "is_success_state": true }
//!     ],
//!     "transitions": {
//!       "finish": { "from_state": "draft", "to_state": "done", "condition": "status = 'ok'" }
//!     }
//!   }
//! }
//! ```
//!
//! Transition keys become tokens. Workflows and transitions keep the order
//! in which they were written.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// Map that keeps insertion order and rejects duplicate keys when parsed
#[derive(Clone, Debug, PartialEq)]
pub struct OrderedMap<T>(Vec<(String, T)>);

impl<T> OrderedMap<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert or replace; a replaced entry keeps its position
    pub fn insert(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.0.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for OrderedMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<T: Serialize> Serialize for OrderedMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<T> {
    type Value = OrderedMap<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map with unique keys")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries: Vec<(String, T)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, T>()? {
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(serde::de::Error::custom(format!("duplicate key '{}'", key)));
            }
            entries.push((key, value));
        }
        Ok(OrderedMap(entries))
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

// ── Description types ────────────────────────────────────────────────

/// Workflow name → workflow description
pub type Definition = OrderedMap<WorkflowDecl>;

fn default_version() -> u32 {
    1
}

fn default_kind() -> String {
    "sequence".to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One workflow
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDecl {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub states: Vec<StateDecl>,
    /// Token → transition group
    #[serde(default)]
    pub transitions: OrderedMap<TransitionDecl>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateDecl {
    pub name: String,
    /// Type name of the reference objects
    #[serde(rename = "model", alias = "ref_type", default)]
    pub ref_type: String,
    #[serde(
        rename = "is_initial_state",
        alias = "initial",
        default,
        skip_serializing_if = "is_false"
    )]
    pub initial: bool,
    #[serde(
        rename = "is_success_state",
        alias = "success",
        default,
        skip_serializing_if = "is_false"
    )]
    pub success: bool,
    #[serde(
        rename = "is_fail_state",
        alias = "failure",
        default,
        skip_serializing_if = "is_false"
    )]
    pub failure: bool,
}

/// A single state name or a list of them
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::One(name) => vec![name.as_str()],
            Self::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(mut names: Vec<String>) -> Self {
        if names.len() == 1 {
            Self::One(names.remove(0))
        } else {
            Self::Many(names)
        }
    }
}

/// Condition text shared by every pair, or keyed by state name
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionDecl {
    Single(String),
    PerState(OrderedMap<String>),
}

/// A transition group; lists of states expand into every from/to pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionDecl {
    #[serde(rename = "from_state", alias = "from")]
    pub from: OneOrMany,
    #[serde(rename = "to_state", alias = "to")]
    pub to: OneOrMany,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionDecl>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_aliases() {
        let decl: WorkflowDecl = serde_json::from_str(
            r#"{
                "states": [
                    { "name": "a", "model": "Doc", "initial": true },
                    { "name": "b", "ref_type": "Doc", "is_fail_state": true }
                ],
                "transitions": {
                    "go": { "from": "a", "to": ["b"] }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(decl.version, 1);
        assert!(decl.states[0].initial);
        assert!(decl.states[1].failure);
        assert_eq!(decl.states[1].ref_type, "Doc");
        let go = decl.transitions.get("go").unwrap();
        assert_eq!(go.kind, "sequence");
        assert_eq!(go.from.names(), vec!["a"]);
        assert_eq!(go.to, OneOrMany::Many(vec!["b".into()]));
        assert!(go.condition.is_none());
    }

    #[test]
    fn test_order_is_preserved() {
        let map: OrderedMap<u32> = serde_json::from_str(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"z":1,"a":2,"m":3}"#);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let result: Result<OrderedMap<u32>, _> = serde_json::from_str(r#"{"a": 1, "a": 2}"#);
        assert!(result.unwrap_err().to_string().contains("duplicate key 'a'"));
    }

    #[test]
    fn test_condition_shapes() {
        let single: ConditionDecl = serde_json::from_str(r#""x = 1""#).unwrap();
        assert_eq!(single, ConditionDecl::Single("x = 1".into()));

        let keyed: ConditionDecl = serde_json::from_str(r#"{"b": "x = 2", "a": "x = 1"}"#).unwrap();
        let ConditionDecl::PerState(map) = keyed else {
            panic!("expected per-state conditions");
        };
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(map.get("a").map(String::as_str), Some("x = 1"));
    }

    #[test]
    fn test_state_flags_serialize_only_when_set() {
        let state = StateDecl {
            name: "a".into(),
            ref_type: "Doc".into(),
            initial: true,
            success: false,
            failure: false,
        };
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            r#"{"name":"a","model":"Doc","is_initial_state":true}"#
        );
    }
}

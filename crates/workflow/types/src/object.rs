//! Reference objects: the domain data a workflow moves between states
//!
//! The workflow core never owns domain objects. Callers hand them in as
//! [`SharedObject`]s; details keep only a weak [`ObjectRef`] plus the
//! object's identity. An object without an identity is given one by an
//! [`IdentityProvider`] before any detail refers to it.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Identity of a domain object
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Attribute values ─────────────────────────────────────────────────

/// Value of a domain-object attribute as seen by conditions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view; text is parsed when it looks like a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Null | Self::Bool(_) => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Text(s) => {
                let s = s.trim();
                !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
            }
        }
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

// ── Domain object capability ─────────────────────────────────────────

/// What the workflow core needs from a domain object
pub trait DomainObject: Send + Sync {
    /// `None` until the object has been given an identity
    fn identity(&self) -> Option<ObjectId>;

    fn assign_identity(&self, id: ObjectId);

    /// Matched against [`State::ref_type`](crate::State::ref_type)
    fn type_name(&self) -> &str;

    /// Attribute lookup for declarative conditions
    fn attribute(&self, name: &str) -> Option<AttrValue>;
}

/// A caller-owned domain object
pub type SharedObject = Arc<dyn DomainObject>;

/// Next-state (or initial-state) name to reference object
pub type ObjectMap = HashMap<String, SharedObject>;

/// Issues identities for objects that have none
pub trait IdentityProvider: std::fmt::Debug + Send + Sync {
    fn next_identity(&self, type_name: &str) -> ObjectId;
}

/// Random v4 UUID identities
#[derive(Clone, Debug, Default)]
pub struct UuidIdentity;

impl IdentityProvider for UuidIdentity {
    fn next_identity(&self, _type_name: &str) -> ObjectId {
        ObjectId(uuid::Uuid::new_v4().to_string())
    }
}

/// Deterministic `<type>-<n>` identities
#[derive(Debug, Default)]
pub struct SequentialIdentity {
    next: AtomicU64,
}

impl SequentialIdentity {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityProvider for SequentialIdentity {
    fn next_identity(&self, type_name: &str) -> ObjectId {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        ObjectId(format!("{}-{}", type_name.to_ascii_lowercase(), n))
    }
}

// ── Weak reference held by details ───────────────────────────────────

/// A detail's reference to a caller-owned object
#[derive(Clone, Debug, Serialize)]
pub struct ObjectRef {
    pub id: ObjectId,
    pub type_name: String,
    #[serde(skip)]
    handle: Weak<dyn DomainObject>,
}

impl ObjectRef {
    /// Reference an object, assigning it an identity first if it has none
    pub fn identify(object: &SharedObject, identities: &dyn IdentityProvider) -> Self {
        let id = match object.identity() {
            Some(id) => id,
            None => {
                let id = identities.next_identity(object.type_name());
                object.assign_identity(id.clone());
                tracing::trace!(object = %id, type_name = object.type_name(), "Identity assigned");
                id
            }
        };
        Self {
            id,
            type_name: object.type_name().to_string(),
            handle: Arc::downgrade(object),
        }
    }

    /// The object, if its owner still holds it
    pub fn upgrade(&self) -> Option<SharedObject> {
        self.handle.upgrade()
    }

    pub fn is_released(&self) -> bool {
        self.handle.strong_count() == 0
    }

    /// Whether this reference points at `object`
    pub fn refers_to(&self, object: &SharedObject) -> bool {
        object.identity().as_ref() == Some(&self.id)
    }
}

// ── Attribute-bag object ─────────────────────────────────────────────

/// A general-purpose domain object backed by an attribute map
#[derive(Debug)]
pub struct Record {
    type_name: String,
    identity: RwLock<Option<ObjectId>>,
    fields: RwLock<HashMap<String, AttrValue>>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            identity: RwLock::new(None),
            fields: RwLock::new(HashMap::new()),
        }
    }

    pub fn with(self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.fields.write().insert(key.into(), value.into());
        self
    }

    pub fn with_identity(self, id: ObjectId) -> Self {
        *self.identity.write() = Some(id);
        self
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.fields.write().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<AttrValue> {
        self.fields.read().get(key).cloned()
    }

    pub fn shared(self) -> Arc<Record> {
        Arc::new(self)
    }
}

impl DomainObject for Record {
    fn identity(&self) -> Option<ObjectId> {
        self.identity.read().clone()
    }

    fn assign_identity(&self, id: ObjectId) {
        *self.identity.write() = Some(id);
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn attribute(&self, name: &str) -> Option<AttrValue> {
        self.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_assigns_once() {
        let identities = SequentialIdentity::new();
        let record = Record::new("Document").shared();
        let object: SharedObject = record.clone();

        let first = ObjectRef::identify(&object, &identities);
        assert_eq!(first.id, ObjectId::new("document-1"));
        assert_eq!(record.identity(), Some(ObjectId::new("document-1")));

        let second = ObjectRef::identify(&object, &identities);
        assert_eq!(second.id, first.id);
        assert!(second.refers_to(&object));
    }

    #[test]
    fn test_identify_keeps_existing_identity() {
        let object: SharedObject = Record::new("Doc")
            .with_identity(ObjectId::new("doc-42"))
            .shared();
        let reference = ObjectRef::identify(&object, &UuidIdentity);
        assert_eq!(reference.id.as_str(), "doc-42");
        assert_eq!(reference.type_name, "Doc");
    }

    #[test]
    fn test_weak_reference_release() {
        let object: SharedObject = Record::new("Doc").shared();
        let reference = ObjectRef::identify(&object, &UuidIdentity);
        assert!(reference.upgrade().is_some());

        drop(object);
        assert!(reference.is_released());
        assert!(reference.upgrade().is_none());
    }

    #[test]
    fn test_record_attributes() {
        let record = Record::new("Order").with("status", "open").with("total", 12);
        assert_eq!(record.attribute("status"), Some(AttrValue::Text("open".into())));

        record.set("status", "paid");
        assert_eq!(record.get("status"), Some(AttrValue::Text("paid".into())));
        assert_eq!(record.attribute("missing"), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(!AttrValue::Null.is_truthy());
        assert!(AttrValue::Int(3).is_truthy());
        assert!(!AttrValue::Float(0.0).is_truthy());
        assert!(AttrValue::from("yes").is_truthy());
        assert!(!AttrValue::from("False").is_truthy());
        assert!(!AttrValue::from("").is_truthy());
    }

    #[test]
    fn test_numeric_view() {
        assert_eq!(AttrValue::from("12.5").as_f64(), Some(12.5));
        assert_eq!(AttrValue::Int(4).as_f64(), Some(4.0));
        assert_eq!(AttrValue::from("abc").as_f64(), None);
        assert_eq!(AttrValue::Bool(true).as_f64(), None);
    }
}

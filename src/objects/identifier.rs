use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one added object. Uniqueness is the caller's convention; it is
/// not checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for ObjectId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// Produces the identifier for an object being added.
pub trait IdentifierStrategy<T> {
    fn identify(&mut self, object: &T) -> ObjectId;
}

impl<T, F> IdentifierStrategy<T> for F
where
    F: FnMut(&T) -> ObjectId,
{
    fn identify(&mut self, object: &T) -> ObjectId {
        self(object)
    }
}

/// `0`, `1`, `2`, ...
#[derive(Debug, Clone, Default)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }
}

impl<T> IdentifierStrategy<T> for SequentialIds {
    fn identify(&mut self, _object: &T) -> ObjectId {
        let id = ObjectId::from(self.next);
        self.next += 1;
        id
    }
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl<T> IdentifierStrategy<T> for UuidIds {
    fn identify(&mut self, _object: &T) -> ObjectId {
        ObjectId(uuid::Uuid::new_v4().to_string())
    }
}

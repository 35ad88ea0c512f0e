//! ShardId - Cheap-to-clone shard identifier
//!
//! Uses Arc<str> internally for O(1) clone operations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Shard identifier with cheap cloning.
///
/// Internally uses `Arc<str>` so cloning only increments a reference count
/// instead of allocating new memory. Shard ids are minted once when the
/// stream is described and then cloned onto every record, batch, and log
/// line, so this matters on the hot path.
///
/// # Examples
/// ```
/// use contracts::ShardId;
///
/// let id: ShardId = "shardId-000000000000".into();
/// let id2 = id.clone();  // O(1) - just increments ref count
/// assert_eq!(id, id2);
/// assert_eq!(id.as_str(), "shardId-000000000000");
/// ```
#[derive(Clone, Default)]
pub struct ShardId(Arc<str>);

impl ShardId {
    /// Create a new ShardId from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Shard id in the canonical `shardId-NNNNNNNNNNNN` form for index `n`.
    pub fn from_index(n: usize) -> Self {
        Self(Arc::from(format!("shardId-{n:012}").as_str()))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Deref to &str for easy string operations
impl Deref for ShardId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ShardId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ShardId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Conversions
impl From<&str> for ShardId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ShardId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<Arc<str>> for ShardId {
    #[inline]
    fn from(s: Arc<str>) -> Self {
        Self(s)
    }
}

// Display and Debug
impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShardId({:?})", self.0)
    }
}

// Equality - can compare with &str, String, etc.
impl PartialEq for ShardId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Fast path: same Arc pointer
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for ShardId {}

impl PartialEq<str> for ShardId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for ShardId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl PartialEq<String> for ShardId {
    #[inline]
    fn eq(&self, other: &String) -> bool {
        self.0.as_ref() == other
    }
}

// Hash - same as str hash for HashMap compatibility
impl Hash for ShardId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

// Serde support
impl Serialize for ShardId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ShardId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_clone_is_cheap() {
        let id1: ShardId = "shardId-000000000007".into();
        let id2 = id1.clone();

        // Both should point to same underlying data (Arc clone is O(1))
        assert_eq!(id1.as_str().as_ptr(), id2.as_str().as_ptr());
    }

    #[test]
    fn test_from_index() {
        assert_eq!(ShardId::from_index(0), "shardId-000000000000");
        assert_eq!(ShardId::from_index(42), "shardId-000000000042");
    }

    #[test]
    fn test_equality() {
        let id: ShardId = "shardId-000000000001".into();
        assert_eq!(id, "shardId-000000000001");
        assert_eq!(id, String::from("shardId-000000000001"));
        assert_eq!(id, ShardId::from("shardId-000000000001"));
    }

    #[test]
    fn test_hashmap_key() {
        let mut map: HashMap<ShardId, i32> = HashMap::new();
        map.insert("shardId-000000000000".into(), 1);
        map.insert("shardId-000000000001".into(), 2);

        // Can lookup with &str
        assert_eq!(map.get("shardId-000000000000"), Some(&1));
        assert_eq!(map.get("shardId-000000000001"), Some(&2));
    }

    #[test]
    fn test_serde() {
        let id: ShardId = "shardId-000000000003".into();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"shardId-000000000003\"");

        let parsed: ShardId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}

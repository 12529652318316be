//! Key, value and lookup-result types shared by every index layer.
//!
//! Keys are totally ordered unsigned integers and values are opaque payloads.
//! The benchmark wire format reserves two large values as sentinels;
//! [`LookupResult`] is the typed rendition every layer answers with, and
//! [`LookupResult::from_sentinel`] adapts collaborators that still speak the
//! raw convention.

/// Key type indexed by every layer.
pub type Key = u64;

/// Opaque payload stored alongside each key.
pub type Value = u64;

/// Wire sentinel meaning "no layer holds this key".
pub const NOT_FOUND: Value = Value::MAX;

/// Wire sentinel meaning "this layer cannot answer definitively; ask the
/// next one".
pub const OVERFLOW: Value = Value::MAX - 1;

/// A key-value pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Record {
    pub key: Key,
    pub value: Value,
}

impl Record {
    pub const fn new(key: Key, value: Value) -> Self {
        Self { key, value }
    }
}

/// Outcome of an equality lookup against a single layer.
///
/// Both miss variants mean "consult the next layer"; they are distinguished
/// only so collaborators that genuinely cannot answer (as opposed to knowing
/// the key is absent) can say so.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupResult {
    /// The layer holds the key with this payload.
    Found(Value),
    /// The layer definitively does not hold the key.
    NotFound,
    /// The layer cannot answer; the caller must fall through.
    Overflow,
}

impl LookupResult {
    /// True when the caller should consult the next layer.
    pub const fn is_miss(&self) -> bool {
        matches!(self, Self::NotFound | Self::Overflow)
    }

    /// Collapse to the payload, treating both miss variants as `None`.
    pub const fn value(&self) -> Option<Value> {
        match self {
            Self::Found(v) => Some(*v),
            _ => None,
        }
    }

    /// Decode a raw wire value, mapping the reserved sentinels.
    pub const fn from_sentinel(raw: Value) -> Self {
        match raw {
            NOT_FOUND => Self::NotFound,
            OVERFLOW => Self::Overflow,
            v => Self::Found(v),
        }
    }

}

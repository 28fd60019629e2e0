//! Ordered header metadata attached to calls.
//!
//! [`Metadata`] is an ordered multi-map from [`MetadataKey`] to one or more
//! [`MetadataValue`]s. Keys ending in [`BINARY_SUFFIX`] carry binary values;
//! all other keys carry printable ASCII values. Once a map has been handed to
//! a listener it is treated as read-only: listeners receive it by value and
//! nothing in this crate mutates a delivered map.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use bytes::Bytes;
use thiserror::Error;

/// Suffix marking a key whose values are binary.
pub const BINARY_SUFFIX: &str = "-bin";

/// Errors raised while building metadata.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// The key is empty, reserved, or contains characters outside `[0-9a-z_.-]`.
    #[error("invalid metadata key {0:?}")]
    InvalidKey(String),
    /// An ASCII value contained a non-printable character.
    #[error("invalid value for metadata key {key:?}")]
    InvalidValue {
        /// Key the value was destined for.
        key: String,
    },
    /// A binary value was given to an ASCII key or vice versa.
    #[error("metadata key {key:?} expects a {expected} value")]
    ValueKindMismatch {
        /// Key the value was destined for.
        key: String,
        /// Kind of value the key accepts.
        expected: &'static str,
    },
}

/// Validated, lower-case metadata key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetadataKey(String);

impl MetadataKey {
    /// Parse and normalise a key.
    ///
    /// Upper-case ASCII letters are folded to lower case. Keys beginning with
    /// `:` are reserved for the transport and rejected.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::InvalidKey`] when the key is empty, reserved,
    /// or contains characters outside `[0-9a-z_.-]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use callframe::metadata::MetadataKey;
    ///
    /// let key = MetadataKey::new("X-Trace-Id").expect("valid key");
    /// assert_eq!(key.as_str(), "x-trace-id");
    /// assert!(!key.is_binary());
    /// ```
    pub fn new(name: impl AsRef<str>) -> Result<Self, MetadataError> {
        let name = name.as_ref();
        let normalised = name.to_ascii_lowercase();
        let valid = !normalised.is_empty()
            && normalised.bytes().all(|b| {
                b.is_ascii_digit() || b.is_ascii_lowercase() || matches!(b, b'_' | b'.' | b'-')
            });
        if !valid {
            return Err(MetadataError::InvalidKey(name.to_owned()));
        }
        Ok(Self(normalised))
    }

    /// Return the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }

    /// Returns `true` if the key carries binary values.
    #[must_use]
    pub fn is_binary(&self) -> bool { self.0.ends_with(BINARY_SUFFIX) }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<&str> for MetadataKey {
    type Error = MetadataError;

    fn try_from(value: &str) -> Result<Self, Self::Error> { Self::new(value) }
}

/// A single metadata value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetadataValue {
    /// Printable ASCII text.
    Ascii(String),
    /// Arbitrary bytes, only valid under a `-bin` key.
    Binary(Bytes),
}

impl MetadataValue {
    /// Return the value as text if it is ASCII.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Ascii(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Return the value as bytes, whichever kind it is.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Ascii(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self { Self::Ascii(value.to_owned()) }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self { Self::Ascii(value) }
}

impl From<Bytes> for MetadataValue {
    fn from(value: Bytes) -> Self { Self::Binary(value) }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascii(text) => f.write_str(text),
            Self::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// Ordered multi-map of header names to values.
///
/// Entries iterate in insertion order. Equality compares the values stored
/// under each key, in order, and ignores how entries for different keys were
/// interleaved.
///
/// ```
/// use callframe::metadata::Metadata;
///
/// let mut headers = Metadata::new();
/// headers.insert_ascii("a", "1").expect("valid header");
/// headers.insert_ascii("a", "2").expect("valid header");
/// assert_eq!(headers.get("a").and_then(|v| v.as_str()), Some("2"));
/// assert_eq!(headers.get_all("a").count(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Metadata {
    entries: Vec<(MetadataKey, MetadataValue)>,
}

impl Metadata {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Build a map from ASCII key/value pairs.
    ///
    /// # Errors
    ///
    /// Returns the first [`MetadataError`] raised by an invalid pair.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, MetadataError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut metadata = Self::new();
        for (key, value) in pairs {
            metadata.insert_ascii(key, value)?;
        }
        Ok(metadata)
    }

    /// Append `value` under `key`, keeping earlier values.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::ValueKindMismatch`] when the value kind does
    /// not match the key, or [`MetadataError::InvalidValue`] for ASCII values
    /// containing non-printable characters.
    pub fn insert(&mut self, key: MetadataKey, value: MetadataValue) -> Result<(), MetadataError> {
        match (&value, key.is_binary()) {
            (MetadataValue::Ascii(text), false) => {
                if !text.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
                    return Err(MetadataError::InvalidValue {
                        key: key.as_str().to_owned(),
                    });
                }
            }
            (MetadataValue::Binary(_), true) => {}
            _ => {
                return Err(MetadataError::ValueKindMismatch {
                    key: key.as_str().to_owned(),
                    expected: if key.is_binary() { "binary" } else { "ascii" },
                });
            }
        }
        self.entries.push((key, value));
        Ok(())
    }

    /// Append `value` under `key`; another name for [`Metadata::insert`].
    ///
    /// # Errors
    ///
    /// See [`Metadata::insert`].
    pub fn put(&mut self, key: MetadataKey, value: MetadataValue) -> Result<(), MetadataError> {
        self.insert(key, value)
    }

    /// Parse `key` and append an ASCII `value`.
    ///
    /// # Errors
    ///
    /// See [`MetadataKey::new`] and [`Metadata::insert`].
    pub fn insert_ascii(&mut self, key: &str, value: &str) -> Result<(), MetadataError> {
        self.insert(MetadataKey::new(key)?, MetadataValue::from(value))
    }

    /// Parse `key` and append a binary `value`.
    ///
    /// # Errors
    ///
    /// See [`MetadataKey::new`] and [`Metadata::insert`].
    pub fn insert_bin(&mut self, key: &str, value: impl Into<Bytes>) -> Result<(), MetadataError> {
        self.insert(MetadataKey::new(key)?, MetadataValue::Binary(value.into()))
    }

    /// Return the last value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k.as_str().eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Iterate every value stored under `key`, oldest first.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a MetadataValue> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.as_str().eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Returns `true` if at least one value is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool { self.get(key).is_some() }

    /// Remove the first occurrence of `value` under `key`.
    ///
    /// Returns `true` if a value was removed.
    pub fn remove(&mut self, key: &str, value: &MetadataValue) -> bool {
        let position = self
            .entries
            .iter()
            .position(|(k, v)| k.as_str().eq_ignore_ascii_case(key) && v == value);
        position.map(|index| self.entries.remove(index)).is_some()
    }

    /// Remove and return every value stored under `key`.
    pub fn remove_all(&mut self, key: &str) -> Vec<MetadataValue> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|(k, _)| k.as_str().eq_ignore_ascii_case(key));
        self.entries = kept;
        removed.into_iter().map(|(_, v)| v).collect()
    }

    /// Drop every value stored under `key` without returning them.
    pub fn discard_all(&mut self, key: &str) {
        self.entries.retain(|(k, _)| !k.as_str().eq_ignore_ascii_case(key));
    }

    /// Append every entry of `other`, preserving its order.
    pub fn merge(&mut self, other: &Metadata) { self.entries.extend(other.entries.iter().cloned()); }

    /// Distinct keys in first-insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<&MetadataKey> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for (key, _) in &self.entries {
            if seen.insert(key.as_str()) {
                keys.push(key);
            }
        }
        keys
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Returns `true` if no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Values per key, each list in insertion order.
    fn grouped(&self) -> HashMap<&str, Vec<&MetadataValue>> {
        let mut groups: HashMap<&str, Vec<&MetadataValue>> = HashMap::new();
        for (key, value) in &self.entries {
            groups.entry(key.as_str()).or_default().push(value);
        }
        groups
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&MetadataKey, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl PartialEq for Metadata {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.grouped() == other.grouped()
    }
}

impl Eq for Metadata {}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (key, value)) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("")]
    #[case(":path")]
    #[case("bad key")]
    #[case("über")]
    fn rejects_invalid_keys(#[case] key: &str) {
        assert!(matches!(MetadataKey::new(key), Err(MetadataError::InvalidKey(_))));
    }

    #[test]
    fn binary_values_require_binary_keys() {
        let mut headers = Metadata::new();
        let err = headers
            .insert_bin("trace", Bytes::from_static(b"\x00\x01"))
            .expect_err("binary value on ascii key");
        assert_eq!(
            err,
            MetadataError::ValueKindMismatch {
                key: "trace".into(),
                expected: "ascii",
            }
        );
        headers
            .insert_bin("trace-bin", Bytes::from_static(b"\x00\x01"))
            .expect("binary key accepts bytes");
        assert!(headers.insert_ascii("trace-bin", "text").is_err());
    }

    #[test]
    fn ascii_values_must_be_printable() {
        let mut headers = Metadata::new();
        assert!(matches!(
            headers.insert_ascii("a", "line\nbreak"),
            Err(MetadataError::InvalidValue { .. })
        ));
    }

    #[test]
    fn keeps_multiple_values_in_order() {
        let mut headers = Metadata::from_pairs([("a", "1"), ("b", "x"), ("A", "2")]).expect("valid");
        let values: Vec<_> = headers.get_all("a").filter_map(MetadataValue::as_str).collect();
        assert_eq!(values, ["1", "2"]);
        assert_eq!(headers.keys().len(), 2);

        assert!(headers.remove("a", &MetadataValue::from("1")));
        assert_eq!(headers.get("a").and_then(MetadataValue::as_str), Some("2"));

        let removed = headers.remove_all("a");
        assert_eq!(removed, vec![MetadataValue::from("2")]);
        assert!(!headers.contains_key("a"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn equality_ignores_interleaving_between_keys() {
        let left = Metadata::from_pairs([("a", "1"), ("b", "2")]).expect("valid");
        let right = Metadata::from_pairs([("b", "2"), ("a", "1")]).expect("valid");
        assert_eq!(left, right);

        let reordered = Metadata::from_pairs([("a", "2"), ("a", "1")]).expect("valid");
        let original = Metadata::from_pairs([("a", "1"), ("a", "2")]).expect("valid");
        assert_ne!(reordered, original);
    }

    #[test]
    fn merge_appends_entries() {
        let mut headers = Metadata::from_pairs([("a", "1")]).expect("valid");
        let extra = Metadata::from_pairs([("x-trace-id", "abc")]).expect("valid");
        headers.merge(&extra);
        assert_eq!(headers.to_string(), "{a: 1, x-trace-id: abc}");
    }

    #[test]
    fn put_appends_like_insert() {
        let mut headers = Metadata::from_pairs([("a", "1")]).expect("valid");
        let key = MetadataKey::new("A").expect("valid key");
        headers.put(key.clone(), MetadataValue::from("2")).expect("put");
        assert_eq!(headers.to_string(), "{a: 1, a: 2}");
        assert!(headers.put(key, MetadataValue::Binary(Bytes::from_static(b"x"))).is_err());
    }

    #[test]
    fn keys_and_equality_scale_with_many_headers() {
        let names: Vec<String> = (0..500).map(|i| format!("k{i}")).collect();
        let mut forward = Metadata::new();
        let mut backward = Metadata::new();
        for name in &names {
            forward.insert_ascii(name, "v").expect("valid");
            forward.insert_ascii(name, "w").expect("valid");
        }
        for name in names.iter().rev() {
            backward.insert_ascii(name, "v").expect("valid");
            backward.insert_ascii(name, "w").expect("valid");
        }
        let keys: Vec<&str> = forward.keys().into_iter().map(MetadataKey::as_str).collect();
        assert_eq!(keys.len(), 500);
        assert_eq!(keys.first(), Some(&"k0"));
        assert_eq!(keys.last(), Some(&"k499"));
        assert_eq!(forward, backward);

        backward.insert_ascii("k0", "x").expect("valid");
        forward.insert_ascii("k1", "x").expect("valid");
        assert_ne!(forward, backward);
    }
}

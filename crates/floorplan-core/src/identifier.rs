//! Component identifiers backed by a global string interner.
//!
//! Detected components are referred to by short textual ids (`C1`, `M3`, ...)
//! in every stage of the compiler. [`Id`] interns those strings once so that
//! graph nodes, orientation maps and documents can copy and hash them cheaply.

use std::{
    cmp::Ordering,
    fmt,
    sync::{Mutex, MutexGuard, OnceLock},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner for identifier storage.
///
/// # Thread Safety
///
/// This uses `Mutex` for thread-safe access to the string interner, so
/// independent compilations running on different threads share it safely.
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn interner() -> MutexGuard<'static, DefaultStringInterner> {
    INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        .expect("Failed to acquire interner lock")
}

/// Interned component identifier.
///
/// Equality and hashing use the interned symbol. Ordering compares the
/// underlying strings, so sorting by `Id` is lexicographic and stable across
/// runs regardless of interning order.
///
/// # Examples
///
/// ```
/// use floorplan_core::identifier::Id;
///
/// let conveyor = Id::new("C1");
/// let machine = Id::new("M1");
///
/// assert_eq!(conveyor, "C1");
/// assert!(conveyor < machine);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(DefaultSymbol);

impl Id {
    /// Creates an `Id` from &str.
    ///
    /// # Examples
    ///
    /// ```
    /// use floorplan_core::identifier::Id;
    ///
    /// let source = Id::new("L1");
    /// let sink = Id::new("U1");
    /// assert_ne!(source, sink);
    /// ```
    pub fn new(name: &str) -> Self {
        Self(interner().get_or_intern(name))
    }

    /// Returns the first character of the identifier, if any.
    ///
    /// Upstream detectors encode the component kind in this prefix.
    pub fn prefix(&self) -> Option<char> {
        let interner = interner();
        interner
            .resolve(self.0)
            .expect("Symbol should exist in interner")
            .chars()
            .next()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interner = interner();
        let str_value = interner
            .resolve(self.0)
            .expect("Symbol should exist in interner");
        write!(f, "{}", str_value)
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0 == other.0 {
            return Ordering::Equal;
        }
        let interner = interner();
        let lhs = interner
            .resolve(self.0)
            .expect("Symbol should exist in interner");
        let rhs = interner
            .resolve(other.0)
            .expect("Symbol should exist in interner");
        lhs.cmp(rhs)
    }
}

impl From<&str> for Id {
    /// Creates an `Id` from a string slice
    ///
    /// # Examples
    ///
    /// ```
    /// use floorplan_core::identifier::Id;
    ///
    /// let id: Id = "D1".into();
    /// assert_eq!(id, "D1");
    /// ```
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        let interner = interner();
        let self_str = interner
            .resolve(self.0)
            .expect("Symbol should exist in interner");
        self_str == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::new(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let id1 = Id::new("C1");
        let id2 = Id::new("C1");
        let id3 = Id::new("C2");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
        assert_eq!(id1, "C1");
    }

    #[test]
    fn test_display_trait() {
        let id = Id::new("display_test");
        assert_eq!(format!("{}", id), "display_test");
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        // Intern in reverse order so symbol order disagrees with text order.
        let z = Id::new("zz_order");
        let a = Id::new("aa_order");

        let mut ids = vec![z, a];
        ids.sort();

        assert_eq!(ids, vec![a, z]);
        assert_eq!(a.cmp(&a), Ordering::Equal);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(Id::new("M12").prefix(), Some('M'));
        assert_eq!(Id::new("").prefix(), None);
    }

    #[test]
    fn test_hash_and_eq() {
        use std::collections::HashMap;

        let id1 = Id::new("key1");
        let id2 = Id::new("key1");
        let id3 = Id::new("key2");

        let mut map = HashMap::new();
        map.insert(id1, "value1");
        map.insert(id3, "value2");

        assert_eq!(map.get(&id2), Some(&"value1"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_partial_eq_str_ref() {
        let id = Id::new("Conveyor");
        let name = String::from("Conveyor");

        assert!(id == name.as_str());
        assert!(id != "Machine");
    }
}

//! Entity reference.

use std::fmt;
use std::sync::Arc;

/// Opaque, stable identity of an entity.
///
/// A reference is the only key used to address an entity across the
/// storage boundary. It is immutable and cheap to clone.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityReference(Arc<str>);

impl EntityReference {
    /// Creates a reference from an identity string.
    #[must_use]
    pub fn new(identity: impl AsRef<str>) -> Self {
        Self(Arc::from(identity.as_ref()))
    }

    /// Parses a reference, rejecting blank identities.
    #[must_use]
    pub fn parse(identity: &str) -> Option<Self> {
        if identity.trim().is_empty() {
            None
        } else {
            Some(Self::new(identity))
        }
    }

    /// Returns the identity string.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.0
    }

    /// Returns the identity as bytes (used as the storage key).
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityReference({})", self.0)
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityReference {
    fn from(identity: &str) -> Self {
        Self::new(identity)
    }
}

impl From<String> for EntityReference {
    fn from(identity: String) -> Self {
        Self(Arc::from(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_identity() {
        let r = EntityReference::new("order/42");
        assert_eq!(r.to_string(), "order/42");
        assert_eq!(format!("{r:?}"), "EntityReference(order/42)");
    }

    #[test]
    fn parse_rejects_blank() {
        assert!(EntityReference::parse("").is_none());
        assert!(EntityReference::parse("   ").is_none());
        assert_eq!(
            EntityReference::parse("a").map(|r| r.identity().to_string()),
            Some("a".to_string())
        );
    }

    #[test]
    fn clones_compare_equal() {
        let a = EntityReference::from("x");
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a, EntityReference::from("x".to_string()));
    }
}

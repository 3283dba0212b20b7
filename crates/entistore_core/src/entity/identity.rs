//! Identity generation for new entities.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Produces identities for entities created without one.
pub trait IdentityGenerator: Send + Sync {
    /// Returns a fresh identity for an entity of `entity_type`.
    fn generate(&self, entity_type: &str) -> String;
}

/// Generates random UUID v4 identities.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdentityGenerator;

impl IdentityGenerator for UuidIdentityGenerator {
    fn generate(&self, _entity_type: &str) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Generates `<type>-<n>` identities from a counter. Deterministic, so
/// mostly useful in tests.
#[derive(Debug, Default)]
pub struct SequentialIdentityGenerator {
    next: AtomicU64,
}

impl SequentialIdentityGenerator {
    /// Creates a generator starting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityGenerator for SequentialIdentityGenerator {
    fn generate(&self, entity_type: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{n}", entity_type.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uuid_identities_are_unique() {
        let generator = UuidIdentityGenerator;
        let ids: HashSet<String> = (0..100).map(|_| generator.generate("Person")).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn sequential_identities() {
        let generator = SequentialIdentityGenerator::new();
        assert_eq!(generator.generate("Person"), "person-1");
        assert_eq!(generator.generate("Order"), "order-2");
    }
}

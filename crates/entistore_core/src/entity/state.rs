//! The working copy of one entity.

use super::descriptor::EntityDescriptor;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use entistore_codec::Value;
use entistore_storage::EntityReference;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle status of an [`EntityState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStatus {
    /// Created in this unit of work, not yet persisted.
    New,
    /// Loaded from the store and not changed.
    Loaded,
    /// Loaded and changed since.
    Updated,
    /// Removed. Terminal.
    Removed,
}

/// Name to reference pairs, kept in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamedReferences {
    entries: Vec<(String, EntityReference)>,
}

impl NamedReferences {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The reference stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntityReference> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    /// Whether `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Stores `reference` under `name`. Replacing keeps the original
    /// position. Returns the previous reference.
    pub fn put(&mut self, name: impl Into<String>, reference: EntityReference) -> Option<EntityReference> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => Some(std::mem::replace(&mut entry.1, reference)),
            None => {
                self.entries.push((name, reference));
                None
            }
        }
    }

    /// Removes `name`, returning its reference.
    pub fn remove(&mut self, name: &str) -> Option<EntityReference> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityReference)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, EntityReference)> for NamedReferences {
    fn from_iter<I: IntoIterator<Item = (String, EntityReference)>>(iter: I) -> Self {
        let mut named = Self::new();
        for (name, reference) in iter {
            named.put(name, reference);
        }
        named
    }
}

/// One entity's identity, version, status and data.
///
/// Every mutator fails with [`CoreError::EntityRemoved`] once the state is
/// removed, and with [`CoreError::InvalidOperation`] for a name the
/// entity's descriptor does not declare. The first successful mutation of
/// a loaded state marks it updated.
///
/// Version and modification time have no setters; they change only when
/// a unit of work commits.
///
/// Two states are equal when their data are equal; status is ignored.
#[derive(Debug, Clone)]
pub struct EntityState {
    reference: EntityReference,
    descriptor: Arc<EntityDescriptor>,
    version: u64,
    last_modified: DateTime<Utc>,
    status: EntityStatus,
    properties: BTreeMap<String, Value>,
    associations: BTreeMap<String, Option<EntityReference>>,
    many_associations: BTreeMap<String, Vec<EntityReference>>,
    named_associations: BTreeMap<String, NamedReferences>,
}

impl EntityState {
    /// Creates a new, never persisted state with descriptor defaults.
    pub fn new(reference: EntityReference, descriptor: Arc<EntityDescriptor>) -> Self {
        Self::with_status(
            reference,
            descriptor,
            0,
            DateTime::<Utc>::default(),
            EntityStatus::New,
        )
    }

    /// Creates a loaded state at the given version, holding descriptor
    /// defaults until data is loaded into it.
    pub(crate) fn loaded(
        reference: EntityReference,
        descriptor: Arc<EntityDescriptor>,
        version: u64,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self::with_status(reference, descriptor, version, last_modified, EntityStatus::Loaded)
    }

    fn with_status(
        reference: EntityReference,
        descriptor: Arc<EntityDescriptor>,
        version: u64,
        last_modified: DateTime<Utc>,
        status: EntityStatus,
    ) -> Self {
        let properties = descriptor
            .properties()
            .iter()
            .map(|p| (p.name().to_string(), p.default_value()))
            .collect();
        let associations = descriptor
            .associations()
            .iter()
            .map(|n| (n.clone(), None))
            .collect();
        let many_associations = descriptor
            .many_associations()
            .iter()
            .map(|n| (n.clone(), Vec::new()))
            .collect();
        let named_associations = descriptor
            .named_associations()
            .iter()
            .map(|n| (n.clone(), NamedReferences::new()))
            .collect();
        Self {
            reference,
            descriptor,
            version,
            last_modified,
            status,
            properties,
            associations,
            many_associations,
            named_associations,
        }
    }

    /// The entity's reference.
    #[must_use]
    pub fn reference(&self) -> &EntityReference {
        &self.reference
    }

    /// The entity's type name.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        self.descriptor.name()
    }

    /// The entity's descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.descriptor
    }

    /// Committed version; 0 if never persisted.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Time of the last commit.
    #[must_use]
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> EntityStatus {
        self.status
    }

    /// Whether this state has a committed version in the store.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    /// Whether the entity may be used as `type_name`.
    #[must_use]
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        self.descriptor.is_assignable_to(type_name)
    }

    /// Gets a property value.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Iterates over all properties by name.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Sets a property value.
    ///
    /// # Errors
    ///
    /// Fails if the state is removed, the property is not declared, or
    /// the value does not fit the property's declared type.
    pub fn set_property(&mut self, name: &str, value: impl Into<Value>) -> CoreResult<()> {
        self.ensure_writable()?;
        let value = value.into();
        if let Some(property) = self.descriptor.property_descriptor(name) {
            if !property.value_type().accepts(&value) {
                return Err(CoreError::invalid_operation(format!(
                    "{}.{name} is {}, not {}",
                    self.descriptor.name(),
                    property.value_type(),
                    value.kind()
                )));
            }
        }
        let slot = self
            .properties
            .get_mut(name)
            .ok_or_else(|| undeclared("property", name, self.descriptor.name()))?;
        *slot = value;
        self.touch();
        Ok(())
    }

    /// Gets the target of a single association.
    #[must_use]
    pub fn association(&self, name: &str) -> Option<&EntityReference> {
        self.associations.get(name).and_then(Option::as_ref)
    }

    /// Iterates over all single associations.
    pub fn associations(&self) -> impl Iterator<Item = (&str, Option<&EntityReference>)> {
        self.associations
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Sets or clears a single association.
    ///
    /// # Errors
    ///
    /// Fails if the state is removed or the association is not declared.
    pub fn set_association(&mut self, name: &str, target: Option<EntityReference>) -> CoreResult<()> {
        self.ensure_writable()?;
        let slot = self
            .associations
            .get_mut(name)
            .ok_or_else(|| undeclared("association", name, self.descriptor.name()))?;
        *slot = target;
        self.touch();
        Ok(())
    }

    /// References of a many-association, in order. Empty when undeclared.
    #[must_use]
    pub fn many_association(&self, name: &str) -> &[EntityReference] {
        self.many_associations
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterates over all many-associations.
    pub fn many_associations(&self) -> impl Iterator<Item = (&str, &[EntityReference])> {
        self.many_associations
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Whether a many-association contains `reference`.
    #[must_use]
    pub fn contains_many_association(&self, name: &str, reference: &EntityReference) -> bool {
        self.many_association(name).contains(reference)
    }

    /// Inserts `reference` at `index`, shifting later references. An index
    /// past the end appends.
    ///
    /// # Errors
    ///
    /// Fails if the state is removed or the association is not declared.
    pub fn add_many_association(
        &mut self,
        name: &str,
        index: usize,
        reference: EntityReference,
    ) -> CoreResult<()> {
        self.ensure_writable()?;
        let list = self
            .many_associations
            .get_mut(name)
            .ok_or_else(|| undeclared("many-association", name, self.descriptor.name()))?;
        list.insert(index.min(list.len()), reference);
        self.touch();
        Ok(())
    }

    /// Removes the first occurrence of `reference`. Returns whether
    /// anything was removed.
    ///
    /// # Errors
    ///
    /// Fails if the state is removed or the association is not declared.
    pub fn remove_many_association(
        &mut self,
        name: &str,
        reference: &EntityReference,
    ) -> CoreResult<bool> {
        self.ensure_writable()?;
        let list = self
            .many_associations
            .get_mut(name)
            .ok_or_else(|| undeclared("many-association", name, self.descriptor.name()))?;
        let Some(pos) = list.iter().position(|r| r == reference) else {
            return Ok(false);
        };
        list.remove(pos);
        self.touch();
        Ok(true)
    }

    /// A named association. `None` when undeclared.
    #[must_use]
    pub fn named_association(&self, name: &str) -> Option<&NamedReferences> {
        self.named_associations.get(name)
    }

    /// Iterates over all named associations.
    pub fn named_associations(&self) -> impl Iterator<Item = (&str, &NamedReferences)> {
        self.named_associations.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Stores `reference` under `key` in a named association.
    ///
    /// # Errors
    ///
    /// Fails if the state is removed or the association is not declared.
    pub fn put_named_association(
        &mut self,
        name: &str,
        key: impl Into<String>,
        reference: EntityReference,
    ) -> CoreResult<()> {
        self.ensure_writable()?;
        let named = self
            .named_associations
            .get_mut(name)
            .ok_or_else(|| undeclared("named association", name, self.descriptor.name()))?;
        named.put(key, reference);
        self.touch();
        Ok(())
    }

    /// Removes `key` from a named association. Returns whether anything
    /// was removed.
    ///
    /// # Errors
    ///
    /// Fails if the state is removed or the association is not declared.
    pub fn remove_named_association(&mut self, name: &str, key: &str) -> CoreResult<bool> {
        self.ensure_writable()?;
        let named = self
            .named_associations
            .get_mut(name)
            .ok_or_else(|| undeclared("named association", name, self.descriptor.name()))?;
        if named.remove(key).is_none() {
            return Ok(false);
        }
        self.touch();
        Ok(true)
    }

    pub(crate) fn mark_removed(&mut self) -> CoreResult<()> {
        self.ensure_writable()?;
        self.status = EntityStatus::Removed;
        Ok(())
    }

    pub(crate) fn load_property(&mut self, name: &str, value: Value) {
        self.properties.insert(name.to_string(), value);
    }

    pub(crate) fn load_association(&mut self, name: &str, target: Option<EntityReference>) {
        self.associations.insert(name.to_string(), target);
    }

    pub(crate) fn load_many_association(&mut self, name: &str, references: Vec<EntityReference>) {
        self.many_associations.insert(name.to_string(), references);
    }

    pub(crate) fn load_named_association(&mut self, name: &str, named: NamedReferences) {
        self.named_associations.insert(name.to_string(), named);
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        if self.status == EntityStatus::Removed {
            return Err(CoreError::EntityRemoved {
                reference: self.reference.clone(),
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        if self.status == EntityStatus::Loaded {
            self.status = EntityStatus::Updated;
        }
    }
}

impl PartialEq for EntityState {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
            && self.descriptor.name() == other.descriptor.name()
            && self.version == other.version
            && self.last_modified == other.last_modified
            && self.properties == other.properties
            && self.associations == other.associations
            && self.many_associations == other.many_associations
            && self.named_associations == other.named_associations
    }
}

fn undeclared(kind: &str, name: &str, entity_type: &str) -> CoreError {
    CoreError::invalid_operation(format!("{entity_type} declares no {kind} '{name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use entistore_codec::ValueType;

    fn descriptor() -> Arc<EntityDescriptor> {
        Arc::new(
            EntityDescriptor::new("Person")
                .property("name", ValueType::Text)
                .association("spouse")
                .many_association("friends")
                .named_association("roles"),
        )
    }

    fn r(id: &str) -> EntityReference {
        EntityReference::new(id)
    }

    fn loaded() -> EntityState {
        EntityState::loaded(r("p1"), descriptor(), 1, Utc::now())
    }

    #[test]
    fn new_state_has_defaults() {
        let state = EntityState::new(r("p1"), descriptor());
        assert_eq!(state.status(), EntityStatus::New);
        assert_eq!(state.version(), 0);
        assert!(!state.is_persisted());
        assert_eq!(state.property("name"), Some(&Value::Text(String::new())));
        assert_eq!(state.association("spouse"), None);
        assert!(state.many_association("friends").is_empty());
        assert!(state.named_association("roles").unwrap().is_empty());
    }

    #[test]
    fn first_mutation_marks_updated() {
        let mut state = loaded();
        assert_eq!(state.status(), EntityStatus::Loaded);
        state.set_property("name", "Alice").unwrap();
        assert_eq!(state.status(), EntityStatus::Updated);
        state.set_property("name", "Bob").unwrap();
        assert_eq!(state.status(), EntityStatus::Updated);
    }

    #[test]
    fn new_state_stays_new_when_mutated() {
        let mut state = EntityState::new(r("p1"), descriptor());
        state.set_property("name", "Alice").unwrap();
        assert_eq!(state.status(), EntityStatus::New);
    }

    #[test]
    fn removed_state_rejects_every_mutation() {
        let mut state = loaded();
        state.mark_removed().unwrap();
        assert!(matches!(
            state.set_property("name", "x"),
            Err(CoreError::EntityRemoved { .. })
        ));
        assert!(state.set_association("spouse", None).is_err());
        assert!(state.add_many_association("friends", 0, r("f")).is_err());
        assert!(state.remove_many_association("friends", &r("f")).is_err());
        assert!(state.put_named_association("roles", "admin", r("x")).is_err());
        assert!(state.remove_named_association("roles", "admin").is_err());
        assert!(state.mark_removed().is_err());
        assert_eq!(state.status(), EntityStatus::Removed);
    }

    #[test]
    fn mistyped_property_is_rejected_on_set() {
        let mut state = loaded();
        let err = state.set_property("name", 42).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
        assert_eq!(state.property("name"), Some(&Value::Text(String::new())));
        assert_eq!(state.status(), EntityStatus::Loaded);

        state.set_property("name", Value::Null).unwrap();
        assert_eq!(state.status(), EntityStatus::Updated);
    }

    #[test]
    fn undeclared_names_are_rejected() {
        let mut state = loaded();
        let err = state.set_property("salary", 10).unwrap_err();
        assert!(err.is_programming_error());
        assert_eq!(state.status(), EntityStatus::Loaded);
    }

    #[test]
    fn many_association_insert_shifts_and_appends() {
        let mut state = loaded();
        state.add_many_association("friends", 0, r("a")).unwrap();
        state.add_many_association("friends", 1, r("c")).unwrap();
        state.add_many_association("friends", 1, r("b")).unwrap();
        state.add_many_association("friends", 99, r("d")).unwrap();
        assert_eq!(state.many_association("friends"), &[r("a"), r("b"), r("c"), r("d")]);
    }

    #[test]
    fn many_association_remove_first_match() {
        let mut state = loaded();
        for id in ["a", "b", "a"] {
            state.add_many_association("friends", usize::MAX, r(id)).unwrap();
        }
        assert!(state.remove_many_association("friends", &r("a")).unwrap());
        assert_eq!(state.many_association("friends"), &[r("b"), r("a")]);
        assert!(state.contains_many_association("friends", &r("a")));
    }

    #[test]
    fn removing_nothing_leaves_status_alone() {
        let mut state = loaded();
        assert!(!state.remove_many_association("friends", &r("zz")).unwrap());
        assert!(!state.remove_named_association("roles", "zz").unwrap());
        assert_eq!(state.status(), EntityStatus::Loaded);
    }

    #[test]
    fn named_association_keeps_insertion_order() {
        let mut state = loaded();
        state.put_named_association("roles", "owner", r("r1")).unwrap();
        state.put_named_association("roles", "admin", r("r2")).unwrap();
        state.put_named_association("roles", "owner", r("r3")).unwrap();
        let entries: Vec<_> = state.named_association("roles").unwrap().iter().collect();
        assert_eq!(entries, vec![("owner", &r("r3")), ("admin", &r("r2"))]);
    }

    #[test]
    fn equality_ignores_status() {
        let a = loaded();
        let mut b = a.clone();
        b.set_property("name", "").unwrap();
        assert_eq!(b.status(), EntityStatus::Updated);
        assert_eq!(a, b);
    }
}

//! Entity type descriptors and the entity model.

use crate::error::{CoreError, CoreResult};
use entistore_codec::{CodecRegistry, Value, ValueType};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A declared property: name, type and default.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    name: String,
    value_type: ValueType,
    default: Option<Value>,
}

impl PropertyDescriptor {
    /// Declares a property that starts at its type's default.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            default: None,
        }
    }

    /// Sets an explicit default value.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Qualified property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    #[must_use]
    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// The value a new entity starts with and an older envelope without
    /// this property decodes to.
    #[must_use]
    pub fn default_value(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| self.value_type.default_value())
    }
}

/// Describes one entity type.
///
/// Built with chained calls, then registered in an [`EntityModel`], which
/// merges in everything inherited from supertypes.
///
/// ```
/// use entistore_codec::ValueType;
/// use entistore_core::EntityDescriptor;
///
/// let person = EntityDescriptor::new("Person")
///     .property("name", ValueType::Text)
///     .association("spouse")
///     .many_association("friends")
///     .named_association("roles");
/// assert!(person.property_descriptor("name").is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    name: String,
    supertypes: Vec<String>,
    properties: Vec<PropertyDescriptor>,
    associations: Vec<String>,
    many_associations: Vec<String>,
    named_associations: Vec<String>,
}

impl EntityDescriptor {
    /// Starts a descriptor for the named type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: Vec::new(),
            properties: Vec::new(),
            associations: Vec::new(),
            many_associations: Vec::new(),
            named_associations: Vec::new(),
        }
    }

    /// Declares a supertype.
    #[must_use]
    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    /// Declares a property.
    #[must_use]
    pub fn property(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.with_property(PropertyDescriptor::new(name, value_type))
    }

    /// Declares a property with an explicit default.
    #[must_use]
    pub fn property_with_default(
        self,
        name: impl Into<String>,
        value_type: ValueType,
        default: impl Into<Value>,
    ) -> Self {
        self.with_property(PropertyDescriptor::new(name, value_type).with_default(default))
    }

    /// Declares a property from a full descriptor. Redeclaring a name
    /// replaces the earlier declaration in place.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        match self.properties.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
        self
    }

    /// Declares a single association.
    #[must_use]
    pub fn association(mut self, name: impl Into<String>) -> Self {
        push_unique(&mut self.associations, name.into());
        self
    }

    /// Declares an ordered many-association.
    #[must_use]
    pub fn many_association(mut self, name: impl Into<String>) -> Self {
        push_unique(&mut self.many_associations, name.into());
        self
    }

    /// Declares a named association.
    #[must_use]
    pub fn named_association(mut self, name: impl Into<String>) -> Self {
        push_unique(&mut self.named_associations, name.into());
        self
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Supertypes. After registration this includes every ancestor.
    #[must_use]
    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    /// Properties in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn property_descriptor(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Single association names.
    #[must_use]
    pub fn associations(&self) -> &[String] {
        &self.associations
    }

    /// Many-association names.
    #[must_use]
    pub fn many_associations(&self) -> &[String] {
        &self.many_associations
    }

    /// Named association names.
    #[must_use]
    pub fn named_associations(&self) -> &[String] {
        &self.named_associations
    }

    /// Whether an entity of this type may be used as `type_name`.
    #[must_use]
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        self.name == type_name || self.supertypes.iter().any(|s| s == type_name)
    }

    fn inherit(&mut self, parent: &EntityDescriptor) {
        for ancestor in std::iter::once(&parent.name).chain(&parent.supertypes) {
            push_unique(&mut self.supertypes, ancestor.clone());
        }
        // Inherited members come first, own declarations override
        let mut properties = parent.properties.clone();
        for own in self.properties.drain(..) {
            match properties.iter_mut().find(|p| p.name == own.name) {
                Some(existing) => *existing = own,
                None => properties.push(own),
            }
        }
        self.properties = properties;
        for name in &parent.associations {
            push_unique(&mut self.associations, name.clone());
        }
        for name in &parent.many_associations {
            push_unique(&mut self.many_associations, name.clone());
        }
        for name in &parent.named_associations {
            push_unique(&mut self.named_associations, name.clone());
        }
    }
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !names.contains(&name) {
        names.push(name);
    }
}

/// The registered entity types plus the codecs their properties use.
///
/// Register custom codecs before the types that use them: defaults of
/// custom-typed properties are taken from their codec at registration.
#[derive(Debug, Clone, Default)]
pub struct EntityModel {
    types: BTreeMap<String, Arc<EntityDescriptor>>,
    codecs: CodecRegistry,
}

impl EntityModel {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the given codec registry for custom types.
    #[must_use]
    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    /// Registers a type and returns `self` for chaining.
    ///
    /// # Errors
    ///
    /// See [`EntityModel::register`].
    pub fn with_type(mut self, descriptor: EntityDescriptor) -> CoreResult<Self> {
        self.register(descriptor)?;
        Ok(self)
    }

    /// Registers a type.
    ///
    /// Supertypes must already be registered. Their properties and
    /// associations are merged into the stored descriptor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the type is already registered and
    /// `UnknownEntityType` if a supertype is not.
    pub fn register(&mut self, mut descriptor: EntityDescriptor) -> CoreResult<()> {
        if self.types.contains_key(&descriptor.name) {
            return Err(CoreError::invalid_operation(format!(
                "entity type '{}' is already registered",
                descriptor.name
            )));
        }

        let parents = std::mem::take(&mut descriptor.supertypes);
        for parent in &parents {
            let parent = self.descriptor(parent)?.clone();
            descriptor.inherit(&parent);
        }

        for property in &mut descriptor.properties {
            if property.default.is_none() {
                property.default = Some(self.codecs.default_for(&property.value_type));
            }
        }

        self.types
            .insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Looks up a registered type.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntityType` if the type is not registered.
    pub fn descriptor(&self, name: &str) -> CoreResult<&Arc<EntityDescriptor>> {
        self.types
            .get(name)
            .ok_or_else(|| CoreError::unknown_entity_type(name))
    }

    /// Whether an entity stored as `stored` may be loaded as `requested`.
    #[must_use]
    pub fn is_assignable(&self, stored: &str, requested: &str) -> bool {
        self.types
            .get(stored)
            .is_some_and(|d| d.is_assignable_to(requested))
    }

    /// Registered type names.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// The codec registry.
    #[must_use]
    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> EntityModel {
        EntityModel::new()
            .with_type(
                EntityDescriptor::new("Party")
                    .property("name", ValueType::Text)
                    .many_association("contacts"),
            )
            .unwrap()
            .with_type(
                EntityDescriptor::new("Person")
                    .extends("Party")
                    .property_with_default("name", ValueType::Text, "anonymous")
                    .property("age", ValueType::Integer),
            )
            .unwrap()
            .with_type(EntityDescriptor::new("Employee").extends("Person"))
            .unwrap()
    }

    #[test]
    fn subtypes_inherit_members() {
        let model = model();
        let employee = model.descriptor("Employee").unwrap();
        let names: Vec<&str> = employee.properties().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["name", "age"]);
        assert_eq!(employee.many_associations(), &["contacts".to_string()]);
    }

    #[test]
    fn own_declaration_overrides_inherited_default() {
        let model = model();
        let person = model.descriptor("Person").unwrap();
        let name = person.property_descriptor("name").unwrap();
        assert_eq!(name.default_value(), Value::from("anonymous"));
    }

    #[test]
    fn assignability_is_transitive() {
        let model = model();
        assert!(model.is_assignable("Employee", "Party"));
        assert!(model.is_assignable("Person", "Person"));
        assert!(!model.is_assignable("Party", "Person"));
        assert!(!model.is_assignable("Ghost", "Party"));
    }

    #[test]
    fn unknown_supertype_is_rejected() {
        let result = EntityModel::new().with_type(EntityDescriptor::new("Cat").extends("Animal"));
        assert!(matches!(result, Err(CoreError::UnknownEntityType { .. })));
    }

    #[test]
    fn duplicate_type_is_rejected() {
        let mut model = model();
        let result = model.register(EntityDescriptor::new("Person"));
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }
}

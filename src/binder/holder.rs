//! Property holders: where the properties being bound live.
//!
//! A holder is an entity, an embeddable nested somewhere below an entity, or
//! the element of a collection. It knows the default table, the attribute
//! path from the owning entity, and the attribute/association overrides that
//! apply to the properties below it.
//!
//! Overrides are kept as precedence-ordered layers keyed by entity-relative
//! path. The outermost declaration wins:
//!
//! 1. overrides declared by enclosing holders (outermost first),
//! 2. overrides on the embedded property itself,
//! 3. class-level overrides of the embeddable or entity,
//! 4. the property's own annotations (handled by the caller).

use std::collections::HashMap;

use crate::metadata::descriptors::{
    AssociationOverride, AttributeOverride, ColumnAnnotation, JoinColumnAnnotation,
    JoinTableAnnotation,
};
use crate::model::TableId;
use crate::naming::{AttributePath, COLLECTION_ELEMENT_MARKER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderKind {
    Entity,
    Component,
    CollectionElement,
}

#[derive(Debug, Clone, Default)]
struct OverrideLayer {
    columns: HashMap<String, Vec<ColumnAnnotation>>,
    join_columns: HashMap<String, Vec<JoinColumnAnnotation>>,
    join_tables: HashMap<String, JoinTableAnnotation>,
}

impl OverrideLayer {
    fn from_declarations(
        base: &AttributePath,
        attributes: &[AttributeOverride],
        associations: &[AssociationOverride],
    ) -> Self {
        let mut layer = OverrideLayer::default();
        for attribute in attributes {
            layer.columns.insert(
                qualify(base, &attribute.name),
                attribute.columns.clone(),
            );
        }
        for association in associations {
            let key = qualify(base, &association.name);
            if !association.join_columns.is_empty() {
                layer
                    .join_columns
                    .insert(key.clone(), association.join_columns.clone());
            }
            if let Some(join_table) = &association.join_table {
                layer.join_tables.insert(key, join_table.clone());
            }
        }
        layer
    }

    fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.join_columns.is_empty() && self.join_tables.is_empty()
    }
}

/// Override keys ignore the collection element marker, so `tags.name`
/// matches the element property of the `tags` collection.
fn qualify(base: &AttributePath, name: &str) -> String {
    let mut parts: Vec<&str> = base.naming_parts();
    parts.extend(name.split('.').filter(|p| !p.is_empty()));
    parts.join(".")
}

fn override_key(path: &AttributePath) -> String {
    path.naming_parts().join(".")
}

#[derive(Debug, Clone)]
pub struct PropertyHolder {
    pub kind: HolderKind,
    pub entity_name: String,
    pub class_name: String,
    /// Path from the owning entity; empty for the entity itself.
    pub path: AttributePath,
    pub table: TableId,
    /// Inside a composite identifier.
    pub in_identifier: bool,
    /// Inside a non-aggregated composite id (`@IdClass` or several `@Id`s).
    pub in_identifier_mapper: bool,
    /// Secondary tables of the owning entity, keyed by lowercase logical name.
    pub secondary_tables: HashMap<String, TableId>,
    layers: Vec<OverrideLayer>,
}

impl PropertyHolder {
    pub fn for_entity(
        entity_name: &str,
        class_name: &str,
        table: TableId,
        attribute_overrides: &[AttributeOverride],
        association_overrides: &[AssociationOverride],
    ) -> Self {
        let path = AttributePath::default();
        let layer = OverrideLayer::from_declarations(&path, attribute_overrides, association_overrides);
        PropertyHolder {
            kind: HolderKind::Entity,
            entity_name: entity_name.to_string(),
            class_name: class_name.to_string(),
            path,
            table,
            in_identifier: false,
            in_identifier_mapper: false,
            secondary_tables: HashMap::new(),
            layers: if layer.is_empty() { Vec::new() } else { vec![layer] },
        }
    }

    /// Holder for an embeddable reached through `property_name`.
    ///
    /// `property_overrides` come from the embedded property, `class_overrides`
    /// from the embeddable class; both rank below this holder's own layers.
    pub fn for_component(
        &self,
        property_name: &str,
        class_name: &str,
        property_overrides: (&[AttributeOverride], &[AssociationOverride]),
        class_overrides: (&[AttributeOverride], &[AssociationOverride]),
    ) -> Self {
        let path = self.path.append(property_name);
        let mut layers = self.layers.clone();
        for (attributes, associations) in [property_overrides, class_overrides] {
            let layer = OverrideLayer::from_declarations(&path, attributes, associations);
            if !layer.is_empty() {
                layers.push(layer);
            }
        }
        PropertyHolder {
            kind: HolderKind::Component,
            entity_name: self.entity_name.clone(),
            class_name: class_name.to_string(),
            path,
            table: self.table,
            in_identifier: self.in_identifier,
            in_identifier_mapper: self.in_identifier_mapper,
            secondary_tables: self.secondary_tables.clone(),
            layers,
        }
    }

    /// Holder for the element of the collection `property_name`, stored in `table`.
    pub fn for_collection_element(
        &self,
        property_name: &str,
        class_name: &str,
        table: TableId,
        property_overrides: (&[AttributeOverride], &[AssociationOverride]),
    ) -> Self {
        let path = self
            .path
            .append(property_name)
            .append(COLLECTION_ELEMENT_MARKER);
        let mut layers = self.layers.clone();
        let layer = OverrideLayer::from_declarations(&path, property_overrides.0, property_overrides.1);
        if !layer.is_empty() {
            layers.push(layer);
        }
        PropertyHolder {
            kind: HolderKind::CollectionElement,
            entity_name: self.entity_name.clone(),
            class_name: class_name.to_string(),
            path,
            table,
            in_identifier: false,
            in_identifier_mapper: false,
            secondary_tables: HashMap::new(),
            layers,
        }
    }

    /// Path of a property declared directly in this holder.
    pub fn property_path(&self, property_name: &str) -> AttributePath {
        self.path.append(property_name)
    }

    /// `Entity.path.to.property`, used in diagnostics.
    pub fn qualified_path(&self, property_name: &str) -> String {
        let path = self.property_path(property_name);
        format!("{}.{}", self.entity_name, path.naming_parts().join("."))
    }

    /// Role of a collection declared in this holder.
    pub fn role(&self, property_name: &str) -> String {
        self.qualified_path(property_name)
    }

    pub fn overridden_columns(&self, path: &AttributePath) -> Option<&[ColumnAnnotation]> {
        let key = override_key(path);
        self.layers
            .iter()
            .find_map(|layer| layer.columns.get(&key))
            .map(Vec::as_slice)
    }

    pub fn overridden_join_columns(&self, path: &AttributePath) -> Option<&[JoinColumnAnnotation]> {
        let key = override_key(path);
        self.layers
            .iter()
            .find_map(|layer| layer.join_columns.get(&key))
            .map(Vec::as_slice)
    }

    pub fn overridden_join_table(&self, path: &AttributePath) -> Option<&JoinTableAnnotation> {
        let key = override_key(path);
        self.layers.iter().find_map(|layer| layer.join_tables.get(&key))
    }

    /// Table a column naming `explicit_table` goes to.
    pub fn table_for(&self, explicit_table: Option<&str>) -> Option<TableId> {
        match explicit_table {
            None => Some(self.table),
            Some(name) if name.trim().is_empty() => Some(self.table),
            Some(name) => self.secondary_tables.get(&name.trim().to_lowercase()).copied(),
        }
    }

    pub fn is_component(&self) -> bool {
        self.kind != HolderKind::Entity
    }
}

use serde::Serialize;

use super::table::TableId;
use super::value::{Property, ValueId};
use crate::metadata::descriptors::InheritanceType;

/// Index of a [`PersistentEntity`] in the collector arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Root,
    SingleTableSubclass,
    JoinedSubclass,
    UnionSubclass,
}

/// A secondary table of an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Join {
    pub table: TableId,
    pub key: Option<ValueId>,
    pub optional: bool,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistentEntity {
    pub entity_name: String,
    pub class_name: String,
    pub superclass: Option<EntityId>,
    pub kind: EntityKind,
    pub strategy: InheritanceType,
    pub table: TableId,
    pub is_abstract: bool,
    pub identifier: Option<ValueId>,
    pub identifier_property: Option<Property>,
    /// Non-aggregated composite id (several `@Id`s or an id class).
    pub identifier_mapper: Option<ValueId>,
    pub embedded_identifier: bool,
    pub version: Option<Property>,
    pub discriminator: Option<ValueId>,
    pub discriminator_value: Option<String>,
    /// Key columns of a joined subclass pointing at the superclass table.
    pub key: Option<ValueId>,
    pub properties: Vec<Property>,
    pub joins: Vec<Join>,
    pub subclasses: Vec<EntityId>,
}

impl PersistentEntity {
    pub fn new(entity_name: &str, class_name: &str, kind: EntityKind, table: TableId) -> Self {
        PersistentEntity {
            entity_name: entity_name.to_string(),
            class_name: class_name.to_string(),
            superclass: None,
            kind,
            strategy: InheritanceType::SingleTable,
            table,
            is_abstract: false,
            identifier: None,
            identifier_property: None,
            identifier_mapper: None,
            embedded_identifier: false,
            version: None,
            discriminator: None,
            discriminator_value: None,
            key: None,
            properties: Vec::new(),
            joins: Vec::new(),
            subclasses: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.kind == EntityKind::Root
    }

    /// Declared property (identifier and version included), not walking superclasses.
    pub fn get_declared_property(&self, name: &str) -> Option<&Property> {
        self.identifier_property
            .iter()
            .chain(self.version.iter())
            .chain(self.properties.iter())
            .find(|p| p.name == name)
    }

    pub fn add_property(&mut self, property: Property) {
        self.properties.push(property);
    }

    pub fn join_for_table(&self, table: TableId) -> Option<&Join> {
        self.joins.iter().find(|j| j.table == table)
    }
}

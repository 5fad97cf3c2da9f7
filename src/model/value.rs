//! Values: the typed bridge between a property and the columns holding it.
//!
//! Every value lives in the collector's arena and is addressed by [`ValueId`].
//! Components hold their member properties inline; collections point at
//! their key/element/index values by id.

use serde::Serialize;
use std::collections::BTreeMap;

use super::table::TableId;
use crate::metadata::descriptors::CollectionShape;
use crate::naming::Identifier;

/// Index of a [`Value`] in the collector arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ValueId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "expression", rename_all = "snake_case")]
pub enum Selectable {
    Column(Identifier),
    Formula(String),
}

impl Selectable {
    pub fn column(&self) -> Option<&Identifier> {
        match self {
            Selectable::Column(name) => Some(name),
            Selectable::Formula(_) => None,
        }
    }
}

/// Identifier generation rule bound to an identifier value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifierGeneratorSpec {
    pub strategy: String,
    pub name: Option<String>,
    pub parameters: BTreeMap<String, String>,
}

impl IdentifierGeneratorSpec {
    pub fn new(strategy: &str) -> Self {
        IdentifierGeneratorSpec {
            strategy: strategy.to_string(),
            name: None,
            parameters: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStyle {
    Join,
    Select,
    Subselect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToOneKind {
    ManyToOne,
    OneToOne,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToOneValue {
    pub association: ToOneKind,
    pub referenced_entity: String,
    /// Target property when the key does not reference the primary key.
    pub referenced_property: Option<String>,
    pub reference_to_primary_key: bool,
    pub fetch: FetchStyle,
    pub lazy: bool,
    /// Many-to-one that is logically one-to-one.
    pub unique: bool,
    /// One-to-one whose key is the owner's primary key.
    pub constrained: bool,
    /// Inverse one-to-one: the owning property on the target.
    pub mapped_by: Option<String>,
    pub foreign_key_name: Option<String>,
    pub cascade_delete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentValue {
    pub class_name: String,
    pub properties: Vec<Property>,
    pub embedded: bool,
    /// Composite identifier (embedded id or identifier mapper).
    pub key: bool,
    pub synthetic: bool,
}

impl ComponentValue {
    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionElementKind {
    Basic,
    Embeddable,
    OneToMany,
    ManyToMany,
    ManyToAny,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionValue {
    pub role: String,
    pub shape: CollectionShape,
    pub owner_entity: String,
    pub element_kind: CollectionElementKind,
    pub element_entity: Option<String>,
    pub key: Option<ValueId>,
    pub element: Option<ValueId>,
    pub index: Option<ValueId>,
    pub identifier: Option<ValueId>,
    pub inverse: bool,
    pub mapped_by: Option<String>,
    /// Owner property the key references when it is not the primary key.
    pub referenced_property: Option<String>,
    pub lazy: bool,
    pub fetch: FetchStyle,
    pub orphan_delete: bool,
    /// Filters on the collection table: the join table of a many-to-many,
    /// otherwise the table holding the elements.
    pub filters: Vec<CollectionFilter>,
    /// Filters on the associated entity table behind a join table.
    pub many_to_many_filters: Vec<CollectionFilter>,
    pub where_clause: Option<String>,
    pub many_to_many_where: Option<String>,
    pub order_by: Option<String>,
    pub many_to_many_order_by: Option<String>,
    /// Set once the key/element wiring has run.
    pub bound: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionFilter {
    pub name: String,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnyValue {
    pub meta_type: String,
    pub id_type: String,
    pub meta_values: BTreeMap<String, String>,
    pub lazy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueKind {
    Basic,
    /// Foreign key columns of a collection, joined subclass or secondary table.
    Key {
        referenced_property: Option<String>,
        cascade_delete: bool,
    },
    ToOne(ToOneValue),
    OneToMany { referenced_entity: String },
    Component(ComponentValue),
    Collection(CollectionValue),
    Any(AnyValue),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Value {
    pub table: TableId,
    pub selectables: Vec<Selectable>,
    pub type_name: Option<String>,
    pub null_value: Option<String>,
    pub generator: Option<IdentifierGeneratorSpec>,
    pub kind: ValueKind,
}

impl Value {
    pub fn new(table: TableId, kind: ValueKind) -> Self {
        Value {
            table,
            selectables: Vec::new(),
            type_name: None,
            null_value: None,
            generator: None,
            kind,
        }
    }

    pub fn basic(table: TableId, type_name: &str) -> Self {
        Value {
            type_name: Some(type_name.to_string()),
            ..Value::new(table, ValueKind::Basic)
        }
    }

    /// Physical columns, formulas excluded.
    pub fn columns(&self) -> Vec<Identifier> {
        self.selectables
            .iter()
            .filter_map(Selectable::column)
            .cloned()
            .collect()
    }

    pub fn column_span(&self) -> usize {
        self.selectables.len()
    }

    pub fn has_formula(&self) -> bool {
        self.selectables
            .iter()
            .any(|s| matches!(s, Selectable::Formula(_)))
    }

    pub fn as_to_one(&self) -> Option<&ToOneValue> {
        match &self.kind {
            ValueKind::ToOne(to_one) => Some(to_one),
            _ => None,
        }
    }

    pub fn as_to_one_mut(&mut self) -> Option<&mut ToOneValue> {
        match &mut self.kind {
            ValueKind::ToOne(to_one) => Some(to_one),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&ComponentValue> {
        match &self.kind {
            ValueKind::Component(component) => Some(component),
            _ => None,
        }
    }

    pub fn as_component_mut(&mut self) -> Option<&mut ComponentValue> {
        match &mut self.kind {
            ValueKind::Component(component) => Some(component),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionValue> {
        match &self.kind {
            ValueKind::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    pub fn as_collection_mut(&mut self) -> Option<&mut CollectionValue> {
        match &mut self.kind {
            ValueKind::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    pub fn is_to_one(&self) -> bool {
        matches!(self.kind, ValueKind::ToOne(_))
    }
}

/// A named attribute of an entity or component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub name: String,
    pub value: ValueId,
    pub insertable: bool,
    pub updatable: bool,
    pub optional: bool,
    pub lazy: bool,
    pub natural_id: bool,
    /// Comma separated cascade styles, `none` when empty.
    pub cascade: String,
    pub synthetic: bool,
    /// Secondary table the property is stored in.
    pub join_table: Option<TableId>,
}

impl Property {
    pub fn new(name: &str, value: ValueId) -> Self {
        Property {
            name: name.to_string(),
            value,
            insertable: true,
            updatable: true,
            optional: true,
            lazy: false,
            natural_id: false,
            cascade: "none".to_string(),
            synthetic: false,
            join_table: None,
        }
    }

    /// Copy sharing the same value, made read-only.
    pub fn shallow_read_only_copy(&self) -> Self {
        Property {
            insertable: false,
            updatable: false,
            natural_id: false,
            synthetic: true,
            ..self.clone()
        }
    }
}

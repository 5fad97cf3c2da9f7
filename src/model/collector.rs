//! The in-progress metadata collector.
//!
//! A single collector owns every table, value and entity produced during a
//! build; binder components address them through [`TableId`], [`ValueId`]
//! and [`EntityId`] handles. Besides the arenas it keeps the registries
//! later passes consult:
//!
//! - **Column bindings**: `(table, logical column)` -> physical column, used
//!   to resolve `referencedColumnName` and unique-constraint column lists.
//! - **Global generators**: identifier generators visible to every entity.
//! - **Filter definitions**: named filters with their default conditions.
//! - **Property references**: `(entity, property)` pairs that foreign keys
//!   point at instead of the primary key; validated once the drain is done.
//! - **Unique key holders**: index/unique directives materialised after the
//!   drain, when every column has its physical name.
//! - **Warnings**: soft problems that do not stop the build.

use serde::Serialize;
use std::collections::HashMap;

use super::entity::{EntityId, PersistentEntity};
use super::table::{Table, TableId};
use super::value::{Property, Value, ValueId};
use crate::binder::errors::{BindingError, BindingResult};
use crate::metadata::descriptors::{FilterDefinition, GeneratorAnnotation};
use crate::naming::Identifier;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyReference {
    pub entity_name: String,
    pub property_name: String,
    pub unique: bool,
}

/// Index or unique-key directive waiting for physical column names.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueKeyHolder {
    pub table: TableId,
    pub name: Option<String>,
    pub logical_columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Default)]
pub struct MetadataCollector {
    tables: Vec<Table>,
    values: Vec<Value>,
    entities: Vec<PersistentEntity>,
    table_index: HashMap<String, TableId>,
    entity_index: HashMap<String, EntityId>,
    class_index: HashMap<String, EntityId>,
    column_bindings: HashMap<(TableId, String), Identifier>,
    physical_to_logical: HashMap<(TableId, String), Identifier>,
    logical_table_names: HashMap<TableId, Identifier>,
    generators: HashMap<String, GeneratorAnnotation>,
    filter_definitions: HashMap<String, FilterDefinition>,
    property_references: Vec<PropertyReference>,
    synthetic_references: HashMap<(String, String), String>,
    unique_key_holders: Vec<UniqueKeyHolder>,
    warnings: Vec<String>,
    in_second_pass: bool,
}

impl MetadataCollector {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- tables -------------------------------------------------------

    /// Register a table, reusing an existing one with the same qualified name.
    pub fn add_table(
        &mut self,
        schema: Option<Identifier>,
        catalog: Option<Identifier>,
        name: Identifier,
        logical_name: Identifier,
        is_abstract: bool,
    ) -> TableId {
        let mut table = Table::new(name);
        table.schema = schema;
        table.catalog = catalog;
        table.is_abstract = is_abstract;
        let key = table.qualified_name().to_lowercase();
        if let Some(existing) = self.table_index.get(&key) {
            return *existing;
        }
        let id = TableId(self.tables.len());
        log::debug!("Registered table '{}'", table.qualified_name());
        self.tables.push(table);
        self.table_index.insert(key, id);
        self.logical_table_names.insert(id, logical_name);
        id
    }

    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    pub fn table_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[id.0]
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn find_table(&self, qualified_name: &str) -> Option<TableId> {
        self.table_index.get(&qualified_name.to_lowercase()).copied()
    }

    pub fn logical_table_name(&self, id: TableId) -> Option<&Identifier> {
        self.logical_table_names.get(&id)
    }

    // ---- column bindings ----------------------------------------------

    pub fn add_column_binding(&mut self, table: TableId, logical: &Identifier, physical: &Identifier) {
        self.column_bindings
            .insert((table, logical.canonical_name()), physical.clone());
        self.physical_to_logical
            .insert((table, physical.canonical_name()), logical.clone());
    }

    /// Physical column for a logical name; a physical name is accepted too.
    pub fn physical_column_name(&self, table: TableId, logical: &Identifier) -> Option<Identifier> {
        let canonical = logical.canonical_name();
        if let Some(physical) = self.column_bindings.get(&(table, canonical.clone())) {
            return Some(physical.clone());
        }
        if self.physical_to_logical.contains_key(&(table, canonical)) {
            return Some(logical.clone());
        }
        None
    }

    pub fn logical_column_name(&self, table: TableId, physical: &Identifier) -> Option<&Identifier> {
        self.physical_to_logical
            .get(&(table, physical.canonical_name()))
    }

    // ---- values -------------------------------------------------------

    pub fn add_value(&mut self, value: Value) -> ValueId {
        let id = ValueId(self.values.len());
        self.values.push(value);
        id
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.0]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.0]
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    // ---- entities -----------------------------------------------------

    pub fn add_entity(&mut self, entity: PersistentEntity) -> BindingResult<EntityId> {
        if self.entity_index.contains_key(&entity.entity_name) {
            return Err(BindingError::annotation(
                &entity.class_name,
                format!("duplicate entity name '{}'", entity.entity_name),
            ));
        }
        let id = EntityId(self.entities.len());
        self.entity_index.insert(entity.entity_name.clone(), id);
        self.class_index.insert(entity.class_name.clone(), id);
        if let Some(parent) = entity.superclass {
            self.entities[parent.0].subclasses.push(id);
        }
        self.entities.push(entity);
        Ok(id)
    }

    pub fn entity(&self, id: EntityId) -> &PersistentEntity {
        &self.entities[id.0]
    }

    pub fn entity_mut(&mut self, id: EntityId) -> &mut PersistentEntity {
        &mut self.entities[id.0]
    }

    pub fn entities(&self) -> &[PersistentEntity] {
        &self.entities
    }

    /// Look an entity up by entity name or class name.
    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        self.entity_index
            .get(name)
            .or_else(|| self.class_index.get(name))
            .copied()
    }

    pub fn root_entity(&self, id: EntityId) -> EntityId {
        let mut current = id;
        while let Some(parent) = self.entities[current.0].superclass {
            current = parent;
        }
        current
    }

    /// Identifier value of the hierarchy the entity belongs to.
    pub fn identifier_value(&self, id: EntityId) -> Option<ValueId> {
        self.entities[self.root_entity(id).0].identifier
    }

    /// Columns identifying a row of the entity's own table.
    ///
    /// Joined subclasses are keyed by their key columns, everything else by
    /// the hierarchy's identifier columns.
    pub fn key_columns(&self, id: EntityId) -> Vec<Identifier> {
        let entity = &self.entities[id.0];
        if let Some(key) = entity.key {
            return self.value(key).columns();
        }
        if let Some(identifier) = entity.identifier {
            return self.value(identifier).columns();
        }
        match entity.superclass {
            Some(parent) => self.key_columns(parent),
            None => Vec::new(),
        }
    }

    /// Property by (possibly dotted) name, walking superclasses, the
    /// identifier and components.
    pub fn find_property(&self, id: EntityId, path: &str) -> Option<&Property> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut property = self.find_top_level_property(id, first)?;
        for segment in segments {
            let component = self.value(property.value).as_component()?;
            property = component.get_property(segment)?;
        }
        Some(property)
    }

    fn find_top_level_property(&self, id: EntityId, name: &str) -> Option<&Property> {
        let mut current = Some(id);
        while let Some(entity_id) = current {
            let entity = &self.entities[entity_id.0];
            if let Some(property) = entity.get_declared_property(name) {
                return Some(property);
            }
            if let Some(mapper) = entity.identifier_mapper {
                if let Some(property) = self
                    .value(mapper)
                    .as_component()
                    .and_then(|c| c.get_property(name))
                {
                    return Some(property);
                }
            }
            current = entity.superclass;
        }
        None
    }

    // ---- generators ---------------------------------------------------

    pub fn add_global_generator(&mut self, generator: GeneratorAnnotation) {
        log::debug!("Registered global identifier generator '{}'", generator.name);
        self.generators.insert(generator.name.clone(), generator);
    }

    pub fn global_generator(&self, name: &str) -> Option<&GeneratorAnnotation> {
        self.generators.get(name)
    }

    // ---- filters ------------------------------------------------------

    pub fn add_filter_definition(&mut self, definition: FilterDefinition) {
        log::debug!("Registered filter definition '{}'", definition.name);
        self.filter_definitions.insert(definition.name.clone(), definition);
    }

    pub fn filter_definition(&self, name: &str) -> Option<&FilterDefinition> {
        self.filter_definitions.get(name)
    }

    // ---- property references ------------------------------------------

    pub fn add_property_reference(&mut self, entity_name: &str, property_name: &str) {
        self.push_property_reference(entity_name, property_name, false);
    }

    pub fn add_unique_property_reference(&mut self, entity_name: &str, property_name: &str) {
        self.push_property_reference(entity_name, property_name, true);
    }

    fn push_property_reference(&mut self, entity_name: &str, property_name: &str, unique: bool) {
        let exists = self.property_references.iter().any(|r| {
            r.entity_name == entity_name && r.property_name == property_name && r.unique == unique
        });
        if !exists {
            self.property_references.push(PropertyReference {
                entity_name: entity_name.to_string(),
                property_name: property_name.to_string(),
                unique,
            });
        }
    }

    pub fn property_references(&self) -> &[PropertyReference] {
        &self.property_references
    }

    /// Remember which synthetic property an association was rewritten to.
    pub fn add_synthetic_reference(&mut self, association_owner: &str, property_name: &str, synthetic: &str) {
        self.synthetic_references.insert(
            (association_owner.to_string(), property_name.to_string()),
            synthetic.to_string(),
        );
    }

    pub fn synthetic_reference(&self, association_owner: &str, property_name: &str) -> Option<&str> {
        self.synthetic_references
            .get(&(association_owner.to_string(), property_name.to_string()))
            .map(String::as_str)
    }

    // ---- unique keys ----------------------------------------------------

    pub fn add_unique_key_holder(&mut self, holder: UniqueKeyHolder) {
        self.unique_key_holders.push(holder);
    }

    pub fn take_unique_key_holders(&mut self) -> Vec<UniqueKeyHolder> {
        std::mem::take(&mut self.unique_key_holders)
    }

    // ---- diagnostics ----------------------------------------------------

    /// Record a soft warning; the build continues.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_in_second_pass(&self) -> bool {
        self.in_second_pass
    }

    pub fn set_in_second_pass(&mut self, in_second_pass: bool) {
        self.in_second_pass = in_second_pass;
    }

    /// Finished model; the collector is consumed.
    pub fn into_model(self) -> MappingModel {
        MappingModel {
            tables: self.tables,
            values: self.values,
            entities: self.entities,
            property_references: self.property_references,
            warnings: self.warnings,
        }
    }
}

/// The resolved structural mapping model produced by a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct MappingModel {
    pub tables: Vec<Table>,
    pub values: Vec<Value>,
    pub entities: Vec<PersistentEntity>,
    pub property_references: Vec<PropertyReference>,
    pub warnings: Vec<String>,
}

impl MappingModel {
    pub fn entity(&self, name: &str) -> Option<&PersistentEntity> {
        self.entities
            .iter()
            .find(|e| e.entity_name == name || e.class_name == name)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        let lower = name.to_lowercase();
        self.tables
            .iter()
            .find(|t| t.name.text().to_lowercase() == lower || t.qualified_name().to_lowercase() == lower)
    }

    pub fn table_of(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.0]
    }

    /// Declared property of an entity, walking superclasses.
    pub fn property(&self, entity_name: &str, property_name: &str) -> Option<&Property> {
        let mut current = self.entity(entity_name);
        while let Some(entity) = current {
            if let Some(property) = entity.get_declared_property(property_name) {
                return Some(property);
            }
            current = entity.superclass.map(|id| &self.entities[id.0]);
        }
        None
    }

    /// Physical columns of a property, formulas excluded.
    pub fn property_columns(&self, entity_name: &str, property_name: &str) -> Vec<String> {
        self.property(entity_name, property_name)
            .map(|p| {
                self.value(p.value)
                    .columns()
                    .iter()
                    .map(|c| c.text().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

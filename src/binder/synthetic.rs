//! Synthetic property references.
//!
//! A foreign key naming `referencedColumnName`s that are not exactly the
//! target's primary key cannot be expressed as "points at the identifier".
//! Instead a read-only composite property mirroring the referenced columns
//! is added to the target entity, and the association is rewritten to
//! reference that property by name:
//!
//! ```text
//! Order.product  --@JoinColumn(referencedColumnName = "sku")-->  Product
//!
//! Product
//! ├── id            (identifier)
//! ├── sku           (basic)
//! └── _Order_product  (synthetic, insertable = updatable = false)
//!     └── sku       (shallow copy of Product.sku)
//! ```

use super::errors::{BindingError, BindingResult};
use super::join_column::JoinColumns;
use super::BuildContext;
use crate::model::{
    ComponentValue, EntityId, MetadataCollector, Property, Selectable, TableId, Value, ValueId,
    ValueKind,
};
use crate::naming::Identifier;

/// How a foreign key's referenced columns relate to the target's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceType {
    /// No `referencedColumnName` was given.
    NoReference,
    /// The referenced columns are exactly the primary key columns.
    PkReference,
    NonPkReference,
}

/// Classify referenced column names (resolved to physical names; `None`
/// where none was given) against the target's identifier columns.
///
/// Order does not matter.
pub fn classify_reference(
    referenced: &[Option<Identifier>],
    identifier_columns: &[Identifier],
) -> ReferenceType {
    let given: Vec<String> = referenced
        .iter()
        .flatten()
        .map(Identifier::canonical_name)
        .collect();
    if given.is_empty() {
        return ReferenceType::NoReference;
    }
    let mut given_sorted = given;
    given_sorted.sort();
    given_sorted.dedup();
    let mut identifier: Vec<String> = identifier_columns
        .iter()
        .map(Identifier::canonical_name)
        .collect();
    identifier.sort();
    identifier.dedup();
    if given_sorted == identifier {
        ReferenceType::PkReference
    } else {
        ReferenceType::NonPkReference
    }
}

/// Referenced columns resolved on the target entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencedColumns {
    pub table: TableId,
    /// Physical names, in join column order.
    pub columns: Vec<Identifier>,
}

/// Entity (or one of its joins) whose table holds a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnOwner {
    entity: EntityId,
    table: TableId,
    join: Option<usize>,
}

/// Find which table of `target` (or of its superclasses) has a column bound
/// under `name`.
fn find_referenced_column_owner(
    collector: &MetadataCollector,
    target: EntityId,
    name: &Identifier,
) -> Option<(ColumnOwner, Identifier)> {
    let mut current = Some(target);
    while let Some(entity_id) = current {
        let entity = collector.entity(entity_id);
        let candidates = std::iter::once((entity.table, None))
            .chain(entity.joins.iter().enumerate().map(|(i, j)| (j.table, Some(i))));
        for (table, join) in candidates {
            if let Some(physical) = collector.physical_column_name(table, name) {
                if collector.table(table).has_column(&physical) {
                    let owner = ColumnOwner {
                        entity: entity_id,
                        table,
                        join,
                    };
                    return Some((owner, physical));
                }
            }
        }
        current = entity.superclass;
    }
    None
}

/// Resolve the `referencedColumnName`s of `join_columns` on `target`.
///
/// `Ok(None)` when no column names a referenced column. A name that does not
/// resolve is reported as recoverable: the column may be bound by a pass
/// that has not run yet.
pub fn resolve_referenced_columns(
    collector: &MetadataCollector,
    join_columns: &JoinColumns,
    target: EntityId,
) -> BindingResult<Option<ReferencedColumns>> {
    let names = join_columns.referenced_names();
    if names.iter().all(Option::is_none) {
        return Ok(None);
    }
    if names.iter().any(Option::is_none) {
        return Err(BindingError::annotation(
            &join_columns.qualified,
            "has a '@JoinColumn' which does not specify the 'referencedColumnName' \
             (when an association has multiple '@JoinColumn's, they must each specify their 'referencedColumnName')",
        ));
    }

    let target_name = &collector.entity(target).entity_name;
    let mut first: Option<(ColumnOwner, Identifier)> = None;
    let mut columns = Vec::with_capacity(names.len());
    for name in names.into_iter().flatten() {
        let Some((owner, physical)) = find_referenced_column_owner(collector, target, &name) else {
            return Err(BindingError::recoverable(
                &join_columns.qualified,
                format!(
                    "a '@JoinColumn' references a column named '{}' which is not mapped by the target entity '{}'",
                    name, target_name
                ),
            ));
        };
        match &first {
            Some((first_owner, first_name)) if first_owner.table != owner.table => {
                return Err(BindingError::annotation(
                    &join_columns.qualified,
                    format!(
                        "the '@JoinColumn's reference columns of different tables mapped by the target entity '{}' ('{}' belongs to a different table to '{}')",
                        target_name, name, first_name
                    ),
                ));
            }
            _ => {}
        }
        if first.is_none() {
            first = Some((owner, name.clone()));
        }
        columns.push(physical);
    }

    let table = first
        .map(|(owner, _)| owner.table)
        .unwrap_or(collector.entity(target).table);
    Ok(Some(ReferencedColumns { table, columns }))
}

/// `_<Entity>_<path>` with dots replaced, `_inverse` for the element side of
/// a many-to-many.
pub fn synthetic_property_name(association_owner: &str, property_path: &str, inverse: bool) -> String {
    let name = format!("_{}_{}", association_owner, property_path).replace('.', "_");
    if inverse {
        format!("{}_inverse", name)
    } else {
        name
    }
}

/// Where a synthetic reference is being created from.
#[derive(Debug, Clone, Copy)]
pub struct AssociationSite<'a> {
    /// Entity declaring the association.
    pub owner_entity: &'a str,
    /// Attribute path of the association inside that entity.
    pub property_path: &'a str,
    /// Diagnostics path.
    pub qualified: &'a str,
    /// Element side of a many-to-many.
    pub inverse: bool,
}

/// Create (or reuse) the synthetic property of `target` covering
/// `referenced`, and rewrite `value` to reference it.
///
/// `value` must be a to-one or a collection. Returns the property name.
pub fn create_synthetic_reference(
    ctx: &mut BuildContext,
    site: AssociationSite<'_>,
    target: EntityId,
    referenced: &ReferencedColumns,
    value: ValueId,
) -> BindingResult<String> {
    let name = synthetic_property_name(site.owner_entity, site.property_path, site.inverse);
    let first = referenced.columns.first().ok_or_else(|| {
        BindingError::assertion("synthetic reference requested without referenced columns")
    })?;
    let (owner, _) = find_referenced_column_owner(&ctx.collector, target, first).ok_or_else(|| {
        BindingError::annotation(
            site.qualified,
            format!(
                "references a column named '{}' which is not mapped by the target entity '{}'",
                first,
                ctx.collector.entity(target).entity_name
            ),
        )
    })?;

    if !has_synthetic_property(&ctx.collector, owner, &name) {
        let members = match_properties(&ctx.collector, owner, &referenced.columns, site.qualified)?;
        let copies: Vec<Property> = members.iter().map(Property::shallow_read_only_copy).collect();

        let mut component = Value::new(
            owner.table,
            ValueKind::Component(ComponentValue {
                class_name: ctx.collector.entity(owner.entity).class_name.clone(),
                properties: copies,
                embedded: true,
                key: false,
                synthetic: true,
            }),
        );
        component.selectables = referenced
            .columns
            .iter()
            .cloned()
            .map(Selectable::Column)
            .collect();
        let component = ctx.collector.add_value(component);

        let mut property = Property::new(&name, component);
        property.insertable = false;
        property.updatable = false;
        property.synthetic = true;

        let entity = ctx.collector.entity_mut(owner.entity);
        entity.add_property(property);
        if let Some(join) = owner.join {
            entity.joins[join].properties.push(name.clone());
        }
        ctx.collector
            .table_mut(owner.table)
            .add_unique_key(None, referenced.columns.clone());
        log::debug!(
            "Created synthetic property '{}.{}' for {}",
            ctx.collector.entity(owner.entity).entity_name,
            name,
            site.qualified
        );
    }

    register_synthetic_property(ctx, site, target, value, &name)?;
    Ok(name)
}

fn has_synthetic_property(collector: &MetadataCollector, owner: ColumnOwner, name: &str) -> bool {
    collector
        .entity(owner.entity)
        .properties
        .iter()
        .any(|p| p.synthetic && p.name == name)
}

fn register_synthetic_property(
    ctx: &mut BuildContext,
    site: AssociationSite<'_>,
    target: EntityId,
    value: ValueId,
    name: &str,
) -> BindingResult<()> {
    let target_name = ctx.collector.entity(target).entity_name.clone();
    let target_value = ctx.collector.value_mut(value);
    match &mut target_value.kind {
        ValueKind::ToOne(to_one) => {
            to_one.referenced_property = Some(name.to_string());
            to_one.reference_to_primary_key = false;
            ctx.collector.add_unique_property_reference(&target_name, name);
        }
        ValueKind::Collection(collection) => {
            collection.referenced_property = Some(name.to_string());
            let key = collection.key;
            if let Some(key) = key {
                if let ValueKind::Key {
                    referenced_property,
                    ..
                } = &mut ctx.collector.value_mut(key).kind
                {
                    *referenced_property = Some(name.to_string());
                }
            }
            // a many-to-many without join table may share the columns
            ctx.collector.add_property_reference(&target_name, name);
        }
        _ => {
            return Err(BindingError::assertion(format!(
                "property reference '{}' on a value that is neither a to-one nor a collection",
                name
            )));
        }
    }
    let association_owner = if site.inverse {
        format!("inverse__{}", site.owner_entity)
    } else {
        site.owner_entity.to_string()
    };
    ctx.collector
        .add_synthetic_reference(&association_owner, site.property_path, name);
    Ok(())
}

/// Single-column properties of `owner` mapped to each column, in column order.
///
/// Candidates are tried as basic and component properties first, then the
/// identifier (or the members of a non-aggregated identifier), then to-one
/// associations.
fn match_properties(
    collector: &MetadataCollector,
    owner: ColumnOwner,
    columns: &[Identifier],
    qualified: &str,
) -> BindingResult<Vec<Property>> {
    let candidates = candidate_properties(collector, owner);
    let mut matched: Vec<Property> = Vec::with_capacity(columns.len());
    for column in columns {
        let wanted = column.canonical_name();
        let found = candidates.iter().find(|property| {
            let value = collector.value(property.value);
            !property.synthetic
                && value.column_span() == 1
                && !value.has_formula()
                && value
                    .columns()
                    .first()
                    .is_some_and(|c| c.canonical_name() == wanted)
        });
        match found {
            Some(property) if matched.iter().any(|m| m.name == property.name) => {
                return Err(BindingError::annotation(
                    qualified,
                    format!(
                        "referenced column '{}' is mapped by target property '{}' which is already referenced",
                        column, property.name
                    ),
                ));
            }
            Some(property) => matched.push((*property).clone()),
            None => {
                return Err(BindingError::annotation(
                    qualified,
                    format!(
                        "referenced column '{}' is not mapped to a single property of the target entity '{}'",
                        column,
                        collector.entity(owner.entity).entity_name
                    ),
                ));
            }
        }
    }
    Ok(matched)
}

fn candidate_properties(collector: &MetadataCollector, owner: ColumnOwner) -> Vec<&Property> {
    let entity = collector.entity(owner.entity);
    if let Some(join) = owner.join {
        let names = &entity.joins[join].properties;
        return entity
            .properties
            .iter()
            .filter(|p| names.contains(&p.name))
            .collect();
    }

    let (to_one, plain): (Vec<&Property>, Vec<&Property>) = entity
        .version
        .iter()
        .chain(entity.properties.iter())
        .partition(|p| collector.value(p.value).is_to_one());

    let mut candidates = plain;
    match (&entity.identifier_property, entity.identifier_mapper) {
        (Some(identifier), _) => candidates.push(identifier),
        (None, Some(mapper)) => {
            if let Some(component) = collector.value(mapper).as_component() {
                candidates.extend(component.properties.iter());
            }
        }
        (None, None) => {}
    }
    candidates.extend(to_one);
    candidates
}

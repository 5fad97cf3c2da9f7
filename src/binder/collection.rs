//! Collection-valued properties.
//!
//! The first pass creates the collection value with its fetch and cascade
//! settings. Key, element, index and identifier columns are wired by a
//! [`CollectionPass`] once both ends of the association are bound:
//!
//! | Mapping                                  | Table               | Key columns                  |
//! |------------------------------------------|---------------------|------------------------------|
//! | `@OneToMany(mappedBy)`                   | target table        | the owning to-one's columns  |
//! | `@OneToMany` + `@JoinColumn`             | target table        | join columns to the owner    |
//! | other `@OneToMany`, `@ManyToMany`, elements | collection table | join columns to the owner    |
//! | `@ManyToMany(mappedBy)`                  | owning side's table | the owning side's element    |
//!
//! The same pass applies filters, `@Where` clauses and ordering. Entity
//! collections behind a join table keep two sets: the plain ones restrict
//! the join table, the `many_to_many_*` ones the associated entity table.

use super::column::{build_columns, check_property_consistency, ColumnDescriptor};
use super::component::{bind_component, embeddable_class};
use super::errors::{BindingError, BindingResult};
use super::generator::{make_id_generator, LocalGenerators};
use super::holder::PropertyHolder;
use super::join_column::{JoinColumnOwner, JoinColumns};
use super::property::{any_columns, cascade_style, fetch_style, BoundProperty, PropertyContext};
use super::second_pass::{SecondPass, SecondPassGroup};
use super::synthetic::{
    classify_reference, create_synthetic_reference, resolve_referenced_columns, AssociationSite,
    ReferenceType, ReferencedColumns,
};
use super::{BuildContext, SourceIndex};
use crate::metadata::descriptors::{
    CollectionShape, FilterAnnotation, GeneratedValueAnnotation, OnDeleteAction,
    PropertyDescriptor,
};
use crate::model::{
    AnyValue, CollectionElementKind, CollectionFilter, CollectionValue, EntityId, FetchStyle,
    ForeignKey,
    MetadataCollector, PrimaryKey, Property, Selectable, TableId, ToOneKind, ToOneValue, Value,
    ValueId, ValueKind,
};
use crate::naming::{Identifier, JoinColumnNature, NamingNature};

/// Bind a collection-valued property.
pub fn bind_collection(
    ctx: &mut BuildContext,
    pctx: &PropertyContext<'_>,
    property: &PropertyDescriptor,
) -> BindingResult<BoundProperty> {
    let holder = pctx.holder;
    let qualified = holder.qualified_path(&property.name);
    let annotations = &property.annotations;

    let shape = match (annotations.collection_id.is_some(), property.collection) {
        (true, _) => CollectionShape::IdBag,
        (false, Some(CollectionShape::IdBag)) => {
            return Err(BindingError::annotation(
                &qualified,
                "an id bag requires '@CollectionId'",
            ))
        }
        (false, Some(shape)) => shape,
        (false, None) => {
            return Err(BindingError::assertion(format!(
                "'{}' bound as a collection but is not collection-valued",
                qualified
            )))
        }
    };
    if holder.in_identifier {
        return Err(BindingError::annotation(
            &qualified,
            "a collection cannot be part of an identifier",
        ));
    }
    let (element_kind, element_type) = classify_element(&ctx.sources, property, &qualified)?;

    let association = annotations
        .one_to_many
        .as_ref()
        .or(annotations.many_to_many.as_ref());
    let mapped_by = association
        .and_then(|a| a.mapped_by.as_deref())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    if mapped_by.is_some() && (!annotations.join_columns.is_empty() || annotations.join_table.is_some()) {
        return Err(BindingError::annotation(
            &qualified,
            "is 'mappedBy' another entity and may not specify the '@JoinColumn' or '@JoinTable'",
        ));
    }

    let fetch = association
        .and_then(|a| a.fetch)
        .or_else(|| annotations.element_collection.as_ref().and_then(|e| e.fetch))
        .or_else(|| annotations.many_to_any.as_ref().and_then(|a| a.fetch));
    let (lazy, fetch) = fetch_style(fetch, annotations.fetch_mode, true, &qualified)?;
    let orphan_removal = association.is_some_and(|a| a.orphan_removal);
    let cascade = cascade_style(
        association.map(|a| a.cascade.as_slice()).unwrap_or_default(),
        &annotations.cascade,
        orphan_removal,
    );

    let is_entity_element = matches!(
        element_kind,
        CollectionElementKind::OneToMany | CollectionElementKind::ManyToMany
    );
    let value = ctx.collector.add_value(Value::new(
        holder.table,
        ValueKind::Collection(CollectionValue {
            role: holder.role(&property.name),
            shape,
            owner_entity: pctx.owner_entity.to_string(),
            element_kind,
            element_entity: is_entity_element.then(|| element_type.clone()),
            key: None,
            element: None,
            index: None,
            identifier: None,
            inverse: mapped_by.is_some(),
            mapped_by: mapped_by.clone(),
            referenced_property: None,
            lazy,
            fetch,
            orphan_delete: orphan_removal,
            filters: Vec::new(),
            many_to_many_filters: Vec::new(),
            where_clause: None,
            many_to_many_where: None,
            order_by: None,
            many_to_many_order_by: None,
            bound: false,
        }),
    ));

    ctx.defer(Box::new(CollectionPass {
        value,
        property: property.clone(),
        holder: holder.clone(),
        owner_entity: pctx.owner_entity.to_string(),
        element_kind,
        element_type,
        shape,
        mapped_by,
        qualified,
    }))?;

    let mut bound = Property::new(&property.name, value);
    bound.lazy = lazy;
    bound.cascade = cascade;
    Ok(BoundProperty {
        property: bound,
        table: holder.table,
    })
}

/// Element kind of a collection and its element type: the entity name for
/// entity elements, the class or type name otherwise.
pub fn classify_element(
    sources: &SourceIndex,
    property: &PropertyDescriptor,
    qualified: &str,
) -> BindingResult<(CollectionElementKind, String)> {
    let annotations = &property.annotations;
    let missing_type = || {
        BindingError::annotation(
            qualified,
            "cannot determine the collection element type (declare 'element_type' or a target)",
        )
    };

    if let Some(association) = annotations.one_to_many.as_ref().or(annotations.many_to_many.as_ref()) {
        let kind = if annotations.one_to_many.is_some() {
            CollectionElementKind::OneToMany
        } else {
            CollectionElementKind::ManyToMany
        };
        let target = association
            .target_entity
            .as_deref()
            .or(property.element_type.as_deref())
            .ok_or_else(missing_type)?;
        return Ok((kind, sources.entity_name_of(target)));
    }
    if annotations.many_to_any.is_some() {
        let element = property.element_type.clone().unwrap_or_else(|| "any".to_string());
        return Ok((CollectionElementKind::ManyToAny, element));
    }

    let element = annotations
        .element_collection
        .as_ref()
        .and_then(|e| e.target_class.as_deref())
        .or(property.element_type.as_deref())
        .ok_or_else(missing_type)?;
    match sources.get(element) {
        Some(class) if sources.is_embeddable(&class.name) => {
            Ok((CollectionElementKind::Embeddable, class.name.clone()))
        }
        Some(class) if class.is_entity() => Err(BindingError::annotation(
            qualified,
            format!(
                "a collection of entity '{}' requires '@OneToMany' or '@ManyToMany'",
                class.entity_name()
            ),
        )),
        _ => Ok((CollectionElementKind::Basic, element.to_string())),
    }
}

/// Referenced table and columns of a key: the resolved explicit columns, or
/// the primary key of `default_table`.
fn referenced_key(
    referenced: &Option<ReferencedColumns>,
    default_table: TableId,
    primary_key: Vec<Identifier>,
) -> (ReferenceType, TableId, Vec<Identifier>) {
    match referenced {
        None => (ReferenceType::NoReference, default_table, primary_key),
        Some(resolved) => {
            let given: Vec<Option<Identifier>> = resolved.columns.iter().cloned().map(Some).collect();
            match classify_reference(&given, &primary_key) {
                ReferenceType::PkReference => {
                    (ReferenceType::PkReference, resolved.table, resolved.columns.clone())
                }
                ReferenceType::NonPkReference => {
                    (ReferenceType::NonPkReference, resolved.table, resolved.columns.clone())
                }
                ReferenceType::NoReference => (ReferenceType::NoReference, default_table, primary_key),
            }
        }
    }
}

fn key_value(
    collector: &mut MetadataCollector,
    table: TableId,
    selectables: Vec<Selectable>,
    cascade_delete: bool,
) -> ValueId {
    let mut key = Value::new(
        table,
        ValueKind::Key {
            referenced_property: None,
            cascade_delete,
        },
    );
    key.selectables = selectables;
    collector.add_value(key)
}

/// How the key and element ended up wired.
struct Wiring {
    table: TableId,
    key: ValueId,
    element: ValueId,
    /// The collection has a table of its own.
    owns_table: bool,
    referenced_property: Option<String>,
}

/// Wires a collection once both ends are bound.
#[derive(Debug)]
pub struct CollectionPass {
    pub value: ValueId,
    pub property: PropertyDescriptor,
    pub holder: PropertyHolder,
    pub owner_entity: String,
    pub element_kind: CollectionElementKind,
    pub element_type: String,
    pub shape: CollectionShape,
    pub mapped_by: Option<String>,
    pub qualified: String,
}

impl CollectionPass {
    fn property_path(&self) -> String {
        self.holder.property_path(&self.property.name).full_path()
    }

    fn cascade_delete(&self) -> bool {
        self.property.annotations.on_delete == Some(OnDeleteAction::Cascade)
    }

    fn require_target(&self, ctx: &BuildContext) -> BindingResult<EntityId> {
        ctx.collector.find_entity(&self.element_type).ok_or_else(|| {
            BindingError::recoverable(
                &self.qualified,
                format!("collection targets an unknown entity '{}'", self.element_type),
            )
        })
    }

    fn require_keys(&self, ctx: &BuildContext, entity: EntityId) -> BindingResult<Vec<Identifier>> {
        let keys = ctx.collector.key_columns(entity);
        if keys.is_empty() {
            return Err(BindingError::recoverable(
                &self.qualified,
                format!(
                    "the identifier of '{}' is not bound yet",
                    ctx.collector.entity(entity).entity_name
                ),
            ));
        }
        Ok(keys)
    }

    fn uses_foreign_key(&self) -> bool {
        let path = self.holder.property_path(&self.property.name);
        let join_columns = self
            .holder
            .overridden_join_columns(&path)
            .unwrap_or(&self.property.annotations.join_columns);
        self.property.annotations.join_table.is_none()
            && self.holder.overridden_join_table(&path).is_none()
            && !join_columns.is_empty()
    }

    fn attach_key(&self, ctx: &mut BuildContext, table: TableId, key: ValueId) {
        let value = ctx.collector.value_mut(self.value);
        value.table = table;
        if let Some(collection) = value.as_collection_mut() {
            collection.key = Some(key);
        }
    }

    fn site<'a>(&'a self, property_path: &'a str, inverse: bool) -> AssociationSite<'a> {
        AssociationSite {
            owner_entity: &self.owner_entity,
            property_path,
            qualified: &self.qualified,
            inverse,
        }
    }

    /// `@OneToMany(mappedBy)`: the key is the owning to-one.
    fn bind_inverse_one_to_many(&self, ctx: &mut BuildContext, mapped_by: &str) -> BindingResult<Wiring> {
        let target = self.require_target(ctx)?;
        let target_name = ctx.collector.entity(target).entity_name.clone();
        let target_table = ctx.collector.entity(target).table;
        let owning = ctx.collector.find_property(target, mapped_by).ok_or_else(|| {
            BindingError::recoverable(
                &self.qualified,
                format!(
                    "'mappedBy' references an unknown target entity property '{}.{}'",
                    target_name, mapped_by
                ),
            )
        })?;
        let owning_value = ctx.collector.value(owning.value);
        let Some(to_one) = owning_value.as_to_one() else {
            return Err(BindingError::annotation(
                &self.qualified,
                format!(
                    "'mappedBy' property '{}.{}' is not a to-one association",
                    target_name, mapped_by
                ),
            ));
        };
        if owning_value.selectables.is_empty() {
            return Err(BindingError::recoverable(
                &self.qualified,
                format!("owning side '{}.{}' is not linked yet", target_name, mapped_by),
            ));
        }
        let referenced_property = (!to_one.reference_to_primary_key)
            .then(|| to_one.referenced_property.clone())
            .flatten();
        let table = owning_value.table;
        let selectables = owning_value.selectables.clone();

        let key = key_value(&mut ctx.collector, table, selectables, self.cascade_delete());
        let element = ctx.collector.add_value(Value::new(
            target_table,
            ValueKind::OneToMany {
                referenced_entity: target_name,
            },
        ));
        Ok(Wiring {
            table,
            key,
            element,
            owns_table: false,
            referenced_property,
        })
    }

    /// `@ManyToMany(mappedBy)`: columns are copied from the owning side.
    fn bind_inverse_many_to_many(&self, ctx: &mut BuildContext, mapped_by: &str) -> BindingResult<Wiring> {
        let target = self.require_target(ctx)?;
        let target_name = ctx.collector.entity(target).entity_name.clone();
        let owning = ctx.collector.find_property(target, mapped_by).ok_or_else(|| {
            BindingError::recoverable(
                &self.qualified,
                format!(
                    "'mappedBy' references an unknown target entity property '{}.{}'",
                    target_name, mapped_by
                ),
            )
        })?;
        let owning_value = ctx.collector.value(owning.value);
        let Some(owning_collection) = owning_value.as_collection() else {
            return Err(BindingError::annotation(
                &self.qualified,
                format!(
                    "'mappedBy' property '{}.{}' is not a collection",
                    target_name, mapped_by
                ),
            ));
        };
        let (Some(owning_key), Some(owning_element), true) = (
            owning_collection.key,
            owning_collection.element,
            owning_collection.bound,
        ) else {
            return Err(BindingError::recoverable(
                &self.qualified,
                format!("owning side '{}.{}' is not bound yet", target_name, mapped_by),
            ));
        };
        let table = owning_value.table;
        let key_selectables = ctx.collector.value(owning_element).selectables.clone();
        let element_selectables = ctx.collector.value(owning_key).selectables.clone();
        let referenced_property = ctx
            .collector
            .value(owning_element)
            .as_to_one()
            .and_then(|t| t.referenced_property.clone());

        let key = key_value(&mut ctx.collector, table, key_selectables, false);
        let mut element = Value::new(
            table,
            ValueKind::ToOne(ToOneValue {
                association: ToOneKind::ManyToOne,
                referenced_entity: target_name,
                referenced_property: None,
                reference_to_primary_key: true,
                fetch: FetchStyle::Join,
                lazy: false,
                unique: false,
                constrained: false,
                mapped_by: None,
                foreign_key_name: None,
                cascade_delete: false,
            }),
        );
        element.selectables = element_selectables;
        let element = ctx.collector.add_value(element);
        Ok(Wiring {
            table,
            key,
            element,
            owns_table: false,
            referenced_property,
        })
    }

    /// Unidirectional `@OneToMany` with `@JoinColumn`: the key lives in the target table.
    fn bind_one_to_many_foreign_key(&self, ctx: &mut BuildContext, owner: EntityId) -> BindingResult<Wiring> {
        let target = self.require_target(ctx)?;
        let owner_keys = self.require_keys(ctx, owner)?;
        let join_columns = JoinColumns::build(
            &ctx.naming,
            &self.holder,
            &self.property.name,
            &self.property.annotations.join_columns,
            None,
            JoinColumnOwner::Entity {
                kind: JoinColumnNature::EntityCollection,
                entity_name: self.owner_entity.clone(),
            },
        )?;
        let referenced = resolve_referenced_columns(&ctx.collector, &join_columns, owner)?;
        let owner_table = ctx.collector.entity(owner).table;
        let (reference_type, referenced_table, referenced_columns) =
            referenced_key(&referenced, owner_table, owner_keys);

        let target_table = ctx.collector.entity(target).table;
        let target_name = ctx.collector.entity(target).entity_name.clone();
        let selectables = join_columns.link(ctx, target_table, referenced_table, &referenced_columns)?;
        let columns: Vec<Identifier> = selectables.iter().filter_map(|s| s.column().cloned()).collect();
        let non_pk = reference_type == ReferenceType::NonPkReference;
        ctx.collector.table_mut(target_table).add_foreign_key(ForeignKey {
            name: join_columns.foreign_key_name(),
            columns,
            referenced_entity: self.owner_entity.clone(),
            referenced_table,
            referenced_columns: if non_pk { referenced_columns } else { Vec::new() },
            cascade_delete: self.cascade_delete(),
        });
        let key = key_value(&mut ctx.collector, target_table, selectables, self.cascade_delete());
        self.attach_key(ctx, target_table, key);

        if let (true, Some(resolved)) = (non_pk, &referenced) {
            let path = self.property_path();
            create_synthetic_reference(ctx, self.site(&path, false), owner, resolved, self.value)?;
        }
        let element = ctx.collector.add_value(Value::new(
            target_table,
            ValueKind::OneToMany {
                referenced_entity: target_name,
            },
        ));
        Ok(Wiring {
            table: target_table,
            key,
            element,
            owns_table: false,
            referenced_property: None,
        })
    }

    /// Naming of the key columns of a collection table.
    fn key_owner(&self, ctx: &BuildContext) -> JoinColumnOwner {
        let entity_collection = JoinColumnOwner::Entity {
            kind: JoinColumnNature::EntityCollection,
            entity_name: self.owner_entity.clone(),
        };
        match self.element_kind {
            CollectionElementKind::Basic
            | CollectionElementKind::Embeddable
            | CollectionElementKind::ManyToAny => JoinColumnOwner::Entity {
                kind: JoinColumnNature::ElementCollection,
                entity_name: self.owner_entity.clone(),
            },
            CollectionElementKind::OneToMany => entity_collection,
            CollectionElementKind::ManyToMany => {
                // named after the inverse side's property when bidirectional
                let inverse = ctx.sources.get(&self.element_type).and_then(|class| {
                    ctx.sources
                        .merged_properties(class)
                        .into_iter()
                        .find(|p| {
                            p.annotations
                                .many_to_many
                                .as_ref()
                                .and_then(|m| m.mapped_by.as_deref())
                                .map(str::trim)
                                == Some(self.property.name.as_str())
                        })
                        .map(|p| p.name)
                });
                match inverse {
                    Some(property) => JoinColumnOwner::MappedBy {
                        entity: self.element_type.clone(),
                        property,
                    },
                    None => entity_collection,
                }
            }
        }
    }

    fn create_collection_table(
        &self,
        ctx: &mut BuildContext,
        owner: EntityId,
        target: Option<EntityId>,
    ) -> TableId {
        let path = self.holder.property_path(&self.property.name);
        let join_table = self
            .holder
            .overridden_join_table(&path)
            .or(self.property.annotations.join_table.as_ref());
        let logical_of = |collector: &MetadataCollector, entity: EntityId| {
            let table = collector.entity(entity).table;
            collector
                .logical_table_name(table)
                .cloned()
                .unwrap_or_else(|| collector.table(table).name.clone())
        };
        let logical = match (
            join_table.and_then(|jt| jt.name.as_deref()).and_then(Identifier::to_identifier),
            target,
        ) {
            (Some(explicit), _) => explicit,
            (None, Some(target)) => ctx.naming.implicit().determine_join_table_name(
                &logical_of(&ctx.collector, owner),
                &logical_of(&ctx.collector, target),
            ),
            (None, None) => ctx
                .naming
                .implicit()
                .determine_collection_table_name(&self.owner_entity, &path),
        };
        let physical = ctx.naming.to_physical_table(&logical);
        let schema = join_table
            .and_then(|jt| jt.schema.clone())
            .or_else(|| ctx.options.default_schema.clone())
            .as_deref()
            .and_then(Identifier::to_identifier);
        let catalog = join_table
            .and_then(|jt| jt.catalog.clone())
            .or_else(|| ctx.options.default_catalog.clone())
            .as_deref()
            .and_then(Identifier::to_identifier);
        ctx.collector.add_table(schema, catalog, physical, logical, false)
    }

    /// Join table or element collection table.
    fn bind_collection_table(&self, ctx: &mut BuildContext, owner: EntityId) -> BindingResult<Wiring> {
        let path = self.holder.property_path(&self.property.name);
        let annotations = &self.property.annotations;
        let join_table = self
            .holder
            .overridden_join_table(&path)
            .or(annotations.join_table.as_ref())
            .cloned();

        let owner_keys = self.require_keys(ctx, owner)?;
        let target = match self.element_kind {
            CollectionElementKind::OneToMany | CollectionElementKind::ManyToMany => {
                let target = self.require_target(ctx)?;
                let keys = self.require_keys(ctx, target)?;
                Some((target, keys))
            }
            _ => None,
        };

        let key_annotations = join_table
            .as_ref()
            .map(|jt| jt.join_columns.clone())
            .filter(|columns| !columns.is_empty())
            .unwrap_or_else(|| annotations.join_columns.clone());
        let mut key_columns = JoinColumns::from_annotations(
            &ctx.naming,
            path.clone(),
            &self.qualified,
            &key_annotations,
            self.key_owner(ctx),
        );
        key_columns.set_nullable(false);
        let key_reference = resolve_referenced_columns(&ctx.collector, &key_columns, owner)?;

        let element_columns = match &target {
            Some((target, _)) => {
                let mut columns = JoinColumns::from_annotations(
                    &ctx.naming,
                    path.clone(),
                    &self.qualified,
                    join_table
                        .as_ref()
                        .map(|jt| jt.inverse_join_columns.as_slice())
                        .unwrap_or_default(),
                    JoinColumnOwner::Entity {
                        kind: JoinColumnNature::Entity,
                        entity_name: ctx.collector.entity(*target).entity_name.clone(),
                    },
                );
                columns.set_nullable(false);
                let reference = resolve_referenced_columns(&ctx.collector, &columns, *target)?;
                Some((columns, reference))
            }
            None => None,
        };

        let table = self.create_collection_table(ctx, owner, target.as_ref().map(|(t, _)| *t));

        // key
        let owner_table = ctx.collector.entity(owner).table;
        let (reference_type, referenced_table, referenced_columns) =
            referenced_key(&key_reference, owner_table, owner_keys);
        let selectables = key_columns.link(ctx, table, referenced_table, &referenced_columns)?;
        let columns: Vec<Identifier> = selectables.iter().filter_map(|s| s.column().cloned()).collect();
        let non_pk = reference_type == ReferenceType::NonPkReference;
        ctx.collector.table_mut(table).add_foreign_key(ForeignKey {
            name: key_columns.foreign_key_name(),
            columns,
            referenced_entity: self.owner_entity.clone(),
            referenced_table,
            referenced_columns: if non_pk { referenced_columns } else { Vec::new() },
            cascade_delete: self.cascade_delete(),
        });
        let key = key_value(&mut ctx.collector, table, selectables, self.cascade_delete());
        self.attach_key(ctx, table, key);
        let property_path = self.property_path();
        if let (true, Some(resolved)) = (non_pk, &key_reference) {
            create_synthetic_reference(ctx, self.site(&property_path, false), owner, resolved, self.value)?;
        }

        // element
        let element = match (target, element_columns) {
            (Some((target, target_keys)), Some((columns, reference))) => {
                let target_table = ctx.collector.entity(target).table;
                let target_name = ctx.collector.entity(target).entity_name.clone();
                let (reference_type, referenced_table, referenced_columns) =
                    referenced_key(&reference, target_table, target_keys);
                let selectables = columns.link(ctx, table, referenced_table, &referenced_columns)?;
                let element_columns: Vec<Identifier> =
                    selectables.iter().filter_map(|s| s.column().cloned()).collect();
                let non_pk = reference_type == ReferenceType::NonPkReference;
                let one_to_many = self.element_kind == CollectionElementKind::OneToMany;
                ctx.collector.table_mut(table).add_foreign_key(ForeignKey {
                    name: columns.foreign_key_name(),
                    columns: element_columns.clone(),
                    referenced_entity: target_name.clone(),
                    referenced_table,
                    referenced_columns: if non_pk { referenced_columns } else { Vec::new() },
                    cascade_delete: false,
                });
                if one_to_many {
                    ctx.collector.table_mut(table).add_unique_key(None, element_columns);
                }
                let mut element = Value::new(
                    table,
                    ValueKind::ToOne(ToOneValue {
                        association: ToOneKind::ManyToOne,
                        referenced_entity: target_name,
                        referenced_property: None,
                        reference_to_primary_key: true,
                        fetch: FetchStyle::Join,
                        lazy: false,
                        unique: one_to_many,
                        constrained: false,
                        mapped_by: None,
                        foreign_key_name: columns.foreign_key_name(),
                        cascade_delete: false,
                    }),
                );
                element.selectables = selectables;
                let element = ctx.collector.add_value(element);
                if let (true, Some(resolved)) = (non_pk, &reference) {
                    create_synthetic_reference(ctx, self.site(&property_path, true), target, resolved, element)?;
                }
                element
            }
            _ => match self.element_kind {
                CollectionElementKind::Embeddable => self.bind_embeddable_element(ctx, table)?,
                CollectionElementKind::ManyToAny => self.bind_any_element(ctx, table)?,
                _ => self.bind_basic_element(ctx, table)?,
            },
        };

        Ok(Wiring {
            table,
            key,
            element,
            owns_table: true,
            referenced_property: None,
        })
    }

    fn bind_basic_element(&self, ctx: &mut BuildContext, table: TableId) -> BindingResult<ValueId> {
        let mut columns = build_columns(&ctx.naming, &self.holder, &self.property, None)?;
        if self.shape == CollectionShape::Set {
            for column in columns.iter_mut().filter(|c| !c.is_formula()) {
                column.nullable = false;
            }
        }
        check_property_consistency(&columns, &self.qualified)?;
        let selectables = columns
            .iter()
            .map(|column| column.bind(&mut ctx.collector, table))
            .collect::<BindingResult<Vec<_>>>()?;
        let mut element = Value::basic(table, &self.element_type);
        element.selectables = selectables;
        Ok(ctx.collector.add_value(element))
    }

    fn bind_embeddable_element(&self, ctx: &mut BuildContext, table: TableId) -> BindingResult<ValueId> {
        let class = embeddable_class(ctx, &self.element_type, &self.qualified)?;
        let annotations = &self.property.annotations;
        let element_holder = self.holder.for_collection_element(
            &self.property.name,
            &class.name,
            table,
            (&annotations.attribute_overrides, &annotations.association_overrides),
        );
        let mut pctx = PropertyContext::new(&element_holder);
        pctx.force_not_null = self.shape == CollectionShape::Set;
        bind_component(ctx, &pctx, &element_holder, &class, false)
    }

    fn bind_any_element(&self, ctx: &mut BuildContext, table: TableId) -> BindingResult<ValueId> {
        let Some(any) = &self.property.annotations.many_to_any else {
            return Err(BindingError::assertion(format!(
                "'{}' bound as '@ManyToAny' without the annotation",
                self.qualified
            )));
        };
        let (_, selectables) = any_columns(
            ctx,
            &self.holder,
            &self.property,
            any.meta_column.as_ref(),
            table,
            true,
        )?;
        let mut element = Value::new(
            table,
            ValueKind::Any(AnyValue {
                meta_type: any.meta_type.clone(),
                id_type: any.id_type.clone(),
                meta_values: any.meta_values.clone(),
                lazy: false,
            }),
        );
        element.selectables = selectables;
        Ok(ctx.collector.add_value(element))
    }

    /// List index or map key column.
    fn bind_index(&self, ctx: &mut BuildContext, table: TableId) -> BindingResult<Option<ValueId>> {
        let path = self.holder.property_path(&self.property.name);
        let annotations = &self.property.annotations;
        let (annotation, default_name, type_name) = match self.shape {
            CollectionShape::List => (
                annotations.order_column.as_ref(),
                ctx.naming.implicit().determine_list_index_column_name(&path),
                "integer".to_string(),
            ),
            CollectionShape::Map => (
                annotations.map_key_column.as_ref(),
                ctx.naming.implicit().determine_map_key_column_name(&path),
                self.property.map_key_type.clone().ok_or_else(|| {
                    BindingError::annotation(&self.qualified, "cannot determine the map key type")
                })?,
            ),
            _ => return Ok(None),
        };
        let mut column = match annotation.filter(|a| a.name.is_some()) {
            Some(annotation) => {
                ColumnDescriptor::from_annotation(&ctx.naming, annotation, &path, &NamingNature::EntityColumn)
            }
            None => ColumnDescriptor::suffixed(&ctx.naming, default_name),
        };
        column.nullable = false;
        if self.shape == CollectionShape::List && column.sql_type.is_none() {
            column.sql_type = Some("integer".to_string());
        }
        let selectable = column.bind(&mut ctx.collector, table)?;
        let mut index = Value::basic(table, &type_name);
        index.selectables = vec![selectable];
        Ok(Some(ctx.collector.add_value(index)))
    }

    /// Surrogate key column of an id bag with its generator.
    fn bind_identifier(&self, ctx: &mut BuildContext, table: TableId) -> BindingResult<Option<ValueId>> {
        let Some(collection_id) = &self.property.annotations.collection_id else {
            return Ok(None);
        };
        let path = self.holder.property_path(&self.property.name);
        let mut column = match collection_id.column.as_ref().filter(|c| c.name.is_some()) {
            Some(annotation) => {
                ColumnDescriptor::from_annotation(&ctx.naming, annotation, &path, &NamingNature::EntityColumn)
            }
            None => ColumnDescriptor::suffixed(&ctx.naming, Identifier::new("id", false)),
        };
        column.nullable = false;
        let selectable = column.bind(&mut ctx.collector, table)?;
        let columns: Vec<Identifier> = selectable.column().cloned().into_iter().collect();
        let table_name = ctx.collector.table(table).name.clone();

        let locals = LocalGenerators::new([self.property.annotations.generators.as_slice()]);
        let generator = if locals.resolve(&collection_id.generator, &ctx.collector).is_some() {
            let generated = GeneratedValueAnnotation {
                strategy: None,
                generator: Some(collection_id.generator.clone()),
            };
            make_id_generator(
                &ctx.collector,
                &ctx.options,
                &ctx.naming,
                &locals,
                Some(&generated),
                &table_name,
                &columns,
                &self.qualified,
            )?
        } else {
            // not a declared generator: the name is the strategy itself
            let mut spec = make_id_generator(
                &ctx.collector,
                &ctx.options,
                &ctx.naming,
                &locals,
                None,
                &table_name,
                &columns,
                &self.qualified,
            )?;
            spec.strategy = collection_id.generator.clone();
            spec
        };

        let mut identifier = Value::basic(table, &collection_id.type_name);
        identifier.selectables = vec![selectable];
        identifier.generator = Some(generator);
        Ok(Some(ctx.collector.add_value(identifier)))
    }

    fn create_primary_key(
        &self,
        ctx: &mut BuildContext,
        table: TableId,
        key: ValueId,
        element: ValueId,
        index: Option<ValueId>,
        identifier: Option<ValueId>,
    ) {
        if ctx.collector.table(table).primary_key.is_some() {
            return;
        }
        let collector = &ctx.collector;
        let mut columns = match (self.shape, index, identifier) {
            (CollectionShape::IdBag, _, Some(identifier)) => collector.value(identifier).columns(),
            (CollectionShape::List | CollectionShape::Map, Some(index), _) => {
                let mut columns = collector.value(key).columns();
                columns.extend(collector.value(index).columns());
                columns
            }
            (CollectionShape::Set, _, _) if !collector.value(element).has_formula() => {
                let mut columns = collector.value(key).columns();
                columns.extend(collector.value(element).columns());
                columns
            }
            _ => return,
        };
        let mut seen = std::collections::HashSet::new();
        columns.retain(|c| seen.insert(c.canonical_name()));
        if columns.is_empty() {
            return;
        }
        ctx.collector.table_mut(table).primary_key = Some(PrimaryKey {
            name: None,
            columns,
        });
    }
}

/// Filters, `@Where` clauses and ordering of a collection.
#[derive(Debug, Default)]
struct Restrictions {
    filters: Vec<CollectionFilter>,
    many_to_many_filters: Vec<CollectionFilter>,
    where_clause: Option<String>,
    many_to_many_where: Option<String>,
    order_by: Option<String>,
    many_to_many_order_by: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `( a ) and ( b )` when both are given, otherwise whichever is.
fn conjunction(first: Option<&str>, second: Option<&str>) -> Option<String> {
    match (first, second) {
        (Some(a), Some(b)) => Some(format!("( {} ) and ( {} )", a, b)),
        (Some(a), None) | (None, Some(a)) => Some(a.to_string()),
        (None, None) => None,
    }
}

/// JPA `@OrderBy` of entity elements; blank orders by the identifier.
fn entity_ordering(fragment: &str, identifier: &str) -> String {
    match fragment.trim() {
        "" => format!("{} asc", identifier),
        "desc" => format!("{} desc", identifier),
        other => other.to_string(),
    }
}

/// JPA `@OrderBy` of basic or embeddable elements.
fn element_ordering(fragment: &str) -> String {
    let fragment = fragment.trim();
    if fragment.is_empty() || fragment.eq_ignore_ascii_case("asc") {
        "$element$ asc".to_string()
    } else if fragment.eq_ignore_ascii_case("desc") {
        "$element$ desc".to_string()
    } else {
        fragment.to_string()
    }
}

impl CollectionPass {
    /// Entity elements reached through a join table.
    fn has_association_table(&self) -> bool {
        match self.element_kind {
            CollectionElementKind::ManyToMany => true,
            CollectionElementKind::OneToMany => self.mapped_by.is_none() && !self.uses_foreign_key(),
            _ => false,
        }
    }

    fn filter(&self, ctx: &BuildContext, filter: &FilterAnnotation) -> BindingResult<CollectionFilter> {
        let condition = non_blank(filter.condition.as_deref())
            .or_else(|| {
                ctx.collector
                    .filter_definition(&filter.name)
                    .and_then(|d| non_blank(d.default_condition.as_deref()))
            })
            .ok_or_else(|| {
                BindingError::annotation(
                    &self.qualified,
                    format!("no filter condition found for filter '{}'", filter.name),
                )
            })?;
        Ok(CollectionFilter {
            name: filter.name.clone(),
            condition: condition.to_string(),
        })
    }

    fn without_join_table(&self, annotation: &str) -> BindingError {
        BindingError::annotation(
            &self.qualified,
            format!("illegal use of '{}' on an association without join table", annotation),
        )
    }

    fn bind_restrictions(&self, ctx: &BuildContext) -> BindingResult<Restrictions> {
        let annotations = &self.property.annotations;
        let join_table = self.has_association_table();
        let entity_elements = matches!(
            self.element_kind,
            CollectionElementKind::OneToMany | CollectionElementKind::ManyToMany
        );
        let mut restrictions = Restrictions::default();

        for filter in &annotations.filters {
            let filter = self.filter(ctx, filter)?;
            if join_table {
                restrictions.many_to_many_filters.push(filter);
            } else {
                restrictions.filters.push(filter);
            }
        }
        if !annotations.filter_join_tables.is_empty() && !join_table {
            return Err(self.without_join_table("@FilterJoinTable"));
        }
        for filter in &annotations.filter_join_tables {
            restrictions.filters.push(self.filter(ctx, filter)?);
        }

        let entity_where = if entity_elements && ctx.options.use_entity_where_clause_for_collections {
            ctx.sources
                .get(&self.element_type)
                .and_then(|class| non_blank(class.where_clause.as_deref()))
        } else {
            None
        };
        let where_clause = conjunction(entity_where, non_blank(annotations.where_clause.as_deref()));
        if join_table {
            restrictions.many_to_many_where = where_clause;
        } else {
            restrictions.where_clause = where_clause;
        }
        if let Some(clause) = non_blank(annotations.where_join_table.as_deref()) {
            if !join_table {
                return Err(self.without_join_table("@WhereJoinTable"));
            }
            restrictions.where_clause = Some(clause.to_string());
        }

        match (annotations.order_by.as_deref(), annotations.sql_order_by.as_deref()) {
            (Some(_), Some(_)) => {
                return Err(BindingError::annotation(
                    &self.qualified,
                    "illegal combination of JPA '@OrderBy' and SQL '@OrderBy'",
                ))
            }
            (None, Some(clause)) => restrictions.order_by = non_blank(Some(clause)).map(str::to_string),
            (Some(fragment), None) if entity_elements => {
                let identifier = ctx
                    .collector
                    .find_entity(&self.element_type)
                    .and_then(|target| ctx.collector.entity(target).identifier_property.as_ref())
                    .map(|property| property.name.clone())
                    .unwrap_or_else(|| "id".to_string());
                let ordering = Some(entity_ordering(fragment, &identifier));
                if join_table {
                    restrictions.many_to_many_order_by = ordering;
                } else {
                    restrictions.order_by = ordering;
                }
            }
            (Some(fragment), None) => restrictions.order_by = Some(element_ordering(fragment)),
            (None, None) => {}
        }
        Ok(restrictions)
    }
}

impl SecondPass for CollectionPass {
    fn group(&self) -> SecondPassGroup {
        SecondPassGroup::Generic
    }

    fn describe(&self) -> String {
        format!("collection {}", self.qualified)
    }

    fn do_second_pass(&self, ctx: &mut BuildContext) -> BindingResult<()> {
        if ctx
            .collector
            .value(self.value)
            .as_collection()
            .is_some_and(|c| c.bound)
        {
            return Ok(());
        }
        let owner = ctx.collector.find_entity(&self.owner_entity).ok_or_else(|| {
            BindingError::assertion(format!("owner entity '{}' is not bound", self.owner_entity))
        })?;

        let wiring = match (self.element_kind, self.mapped_by.as_deref()) {
            (CollectionElementKind::OneToMany, Some(mapped_by)) => {
                self.bind_inverse_one_to_many(ctx, mapped_by)?
            }
            (CollectionElementKind::ManyToMany, Some(mapped_by)) => {
                self.bind_inverse_many_to_many(ctx, mapped_by)?
            }
            (CollectionElementKind::OneToMany, None) if self.uses_foreign_key() => {
                self.bind_one_to_many_foreign_key(ctx, owner)?
            }
            _ => self.bind_collection_table(ctx, owner)?,
        };

        let restrictions = self.bind_restrictions(ctx)?;
        let index = self.bind_index(ctx, wiring.table)?;
        let identifier = self.bind_identifier(ctx, wiring.table)?;
        if wiring.owns_table {
            self.create_primary_key(ctx, wiring.table, wiring.key, wiring.element, index, identifier);
        }

        let value = ctx.collector.value_mut(self.value);
        value.table = wiring.table;
        if let Some(collection) = value.as_collection_mut() {
            collection.key = Some(wiring.key);
            collection.element = Some(wiring.element);
            collection.index = index;
            collection.identifier = identifier;
            if wiring.referenced_property.is_some() {
                collection.referenced_property = wiring.referenced_property;
            }
            collection.filters = restrictions.filters;
            collection.many_to_many_filters = restrictions.many_to_many_filters;
            collection.where_clause = restrictions.where_clause;
            collection.many_to_many_where = restrictions.many_to_many_where;
            collection.order_by = restrictions.order_by;
            collection.many_to_many_order_by = restrictions.many_to_many_order_by;
            collection.bound = true;
        }
        log::debug!(
            "Bound {:?} collection {} ({:?} elements)",
            self.shape,
            self.qualified,
            self.element_kind
        );
        Ok(())
    }
}

//! Property classification and dispatch.
//!
//! Every property is classified once into a [`PropertyKind`], in a fixed
//! priority order, and handed to the binder of that kind. Conflicting
//! annotations are rejected before anything is bound.

use std::collections::BTreeSet;

use super::collection;
use super::column::{bind_columns, build_columns, check_property_consistency, ColumnDescriptor};
use super::component;
use super::errors::{BindingError, BindingResult};
use super::holder::PropertyHolder;
use super::to_one;
use super::{BuildContext, SourceIndex};
use crate::metadata::descriptors::{
    CascadeType, ColumnAnnotation, FetchMode, FetchType, PropertyDescriptor, VendorCascade,
};
use crate::model::{
    AnyValue, FetchStyle, Property, Selectable, TableId, UniqueKeyHolder, Value, ValueId,
    ValueKind,
};
use crate::naming::{Identifier, NamingNature};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Identifier,
    Version,
    ManyToOne,
    OneToOne,
    Any,
    Collection,
    Embedded,
    Basic,
}

/// Classify a property, rejecting contradictory annotations.
pub fn classify(
    sources: &SourceIndex,
    holder: &PropertyHolder,
    property: &PropertyDescriptor,
) -> BindingResult<PropertyKind> {
    let annotations = &property.annotations;
    let qualified = holder.qualified_path(&property.name);

    let collection_annotations = [
        annotations.one_to_many.is_some(),
        annotations.many_to_many.is_some(),
        annotations.element_collection.is_some(),
        annotations.many_to_any.is_some(),
    ]
    .into_iter()
    .filter(|present| *present)
    .count();
    if collection_annotations > 1 {
        return Err(BindingError::annotation(
            &qualified,
            "carries more than one of '@OneToMany', '@ManyToMany', '@ElementCollection' and '@ManyToAny'",
        ));
    }
    if annotations.many_to_one.is_some() && annotations.one_to_one.is_some() {
        return Err(BindingError::annotation(
            &qualified,
            "is annotated both '@ManyToOne' and '@OneToOne'",
        ));
    }
    let is_to_one = annotations.many_to_one.is_some() || annotations.one_to_one.is_some();
    if is_to_one && collection_annotations > 0 {
        return Err(BindingError::annotation(
            &qualified,
            "mixes to-one and collection association annotations",
        ));
    }
    let is_association = is_to_one
        || annotations.one_to_many.is_some()
        || annotations.many_to_many.is_some()
        || annotations.any.is_some()
        || annotations.many_to_any.is_some();
    if is_association && !annotations.columns.is_empty() {
        return Err(BindingError::annotation(
            &qualified,
            "is an association and may not use '@Column' to specify column mappings (use '@JoinColumn' instead)",
        ));
    }
    if collection_annotations > 0 && property.collection.is_none() {
        return Err(BindingError::annotation(
            &qualified,
            "has a collection annotation but is not collection-valued",
        ));
    }

    let kind = if annotations.id || annotations.embedded_id {
        PropertyKind::Identifier
    } else if annotations.version {
        PropertyKind::Version
    } else if annotations.many_to_one.is_some() {
        PropertyKind::ManyToOne
    } else if annotations.one_to_one.is_some() {
        PropertyKind::OneToOne
    } else if annotations.any.is_some() {
        PropertyKind::Any
    } else if collection_annotations > 0 || property.collection.is_some() {
        PropertyKind::Collection
    } else if annotations.embedded || sources.is_embeddable(&property.type_name) {
        PropertyKind::Embedded
    } else {
        PropertyKind::Basic
    };
    Ok(kind)
}

/// Where a property is being bound.
#[derive(Debug, Clone)]
pub struct PropertyContext<'a> {
    pub holder: &'a PropertyHolder,
    /// Entity name owning the holder.
    pub owner_entity: &'a str,
    /// Columns are not null regardless of the annotations (identifiers).
    pub force_not_null: bool,
    /// Enclosing component values, outermost first.
    pub components: Vec<ValueId>,
}

impl<'a> PropertyContext<'a> {
    pub fn new(holder: &'a PropertyHolder) -> Self {
        PropertyContext {
            holder,
            owner_entity: &holder.entity_name,
            force_not_null: false,
            components: Vec::new(),
        }
    }
}

/// A bound property and the table its columns live in.
#[derive(Debug, Clone)]
pub struct BoundProperty {
    pub property: Property,
    pub table: TableId,
}

/// Classify and bind a property; `None` for a transient one.
///
/// Identifier and version properties are bound as basic properties here;
/// the entity binder wires them into their dedicated slots.
pub fn bind_property(
    ctx: &mut BuildContext,
    pctx: &PropertyContext<'_>,
    property: &PropertyDescriptor,
) -> BindingResult<Option<BoundProperty>> {
    if property.annotations.transient {
        log::trace!("Skipping transient property '{}'", pctx.holder.qualified_path(&property.name));
        return Ok(None);
    }
    let kind = classify(&ctx.sources, pctx.holder, property)?;
    bind_property_as(ctx, pctx, property, kind).map(Some)
}

pub fn bind_property_as(
    ctx: &mut BuildContext,
    pctx: &PropertyContext<'_>,
    property: &PropertyDescriptor,
    kind: PropertyKind,
) -> BindingResult<BoundProperty> {
    log::trace!(
        "Binding {:?} property '{}'",
        kind,
        pctx.holder.qualified_path(&property.name)
    );
    let mut bound = match kind {
        PropertyKind::ManyToOne | PropertyKind::OneToOne => {
            to_one::bind_to_one(ctx, pctx, property, kind)?
        }
        PropertyKind::Any => bind_any(ctx, pctx, property)?,
        PropertyKind::Collection => collection::bind_collection(ctx, pctx, property)?,
        PropertyKind::Embedded => component::bind_embedded(ctx, pctx, property)?,
        PropertyKind::Identifier | PropertyKind::Version | PropertyKind::Basic => {
            bind_basic(ctx, pctx, property)?
        }
    };
    bound.property.natural_id = property.annotations.natural_id;
    Ok(bound)
}

/// Bind a single- or multi-column basic property.
pub fn bind_basic(
    ctx: &mut BuildContext,
    pctx: &PropertyContext<'_>,
    property: &PropertyDescriptor,
) -> BindingResult<BoundProperty> {
    let holder = pctx.holder;
    let qualified = holder.qualified_path(&property.name);
    let annotations = &property.annotations;

    let mut columns = build_columns(&ctx.naming, holder, property, None)?;
    if pctx.force_not_null {
        for column in columns.iter_mut().filter(|c| !c.is_formula()) {
            column.nullable = false;
        }
    }
    check_property_consistency(&columns, &qualified)?;
    let (table, selectables) = bind_columns(&mut ctx.collector, holder, &columns, &qualified)?;

    let mut value = Value::basic(table, &property.type_name);
    value.selectables = selectables;
    let value_id = ctx.collector.add_value(value);

    if let Some(index) = &annotations.index {
        let logical_columns: Vec<String> = columns
            .iter()
            .filter_map(|c| c.logical_name.as_ref())
            .map(|name| name.text().to_string())
            .collect();
        if index.immediate {
            let physical = ctx.collector.value(value_id).columns();
            let table_ref = ctx.collector.table_mut(table);
            if index.unique {
                table_ref.add_unique_key(index.name.as_deref(), physical);
            } else {
                table_ref.add_index(index.name.as_deref(), physical);
            }
        } else {
            ctx.collector.add_unique_key_holder(UniqueKeyHolder {
                table,
                name: index.name.clone(),
                logical_columns,
                unique: index.unique,
            });
        }
    }

    let mut bound = Property::new(&property.name, value_id);
    bound.insertable = columns.iter().all(|c| c.insertable) && !columns.iter().any(|c| c.is_formula());
    bound.updatable = columns.iter().all(|c| c.updatable) && !columns.iter().any(|c| c.is_formula());
    bound.optional = !pctx.force_not_null
        && !property.non_null
        && annotations.optional.unwrap_or(true)
        && columns.iter().all(|c| c.nullable);
    bound.lazy = annotations.lazy;
    bound.natural_id = annotations.natural_id;
    Ok(BoundProperty {
        property: bound,
        table,
    })
}

fn bind_any(
    ctx: &mut BuildContext,
    pctx: &PropertyContext<'_>,
    property: &PropertyDescriptor,
) -> BindingResult<BoundProperty> {
    let holder = pctx.holder;
    let qualified = holder.qualified_path(&property.name);
    let Some(any) = &property.annotations.any else {
        return Err(BindingError::assertion(format!(
            "'{}' bound as '@Any' without the annotation",
            qualified
        )));
    };
    let (lazy, _) = fetch_style(any.fetch, property.annotations.fetch_mode, false, &qualified)?;
    let optional = any.optional && !pctx.force_not_null;
    let (table, selectables) = any_columns(ctx, holder, property, any.meta_column.as_ref(), holder.table, !optional)?;

    let mut value = Value::new(
        table,
        ValueKind::Any(AnyValue {
            meta_type: any.meta_type.clone(),
            id_type: any.id_type.clone(),
            meta_values: any.meta_values.clone(),
            lazy,
        }),
    );
    value.selectables = selectables;
    let value_id = ctx.collector.add_value(value);

    let mut bound = Property::new(&property.name, value_id);
    bound.optional = optional;
    bound.lazy = lazy;
    bound.cascade = cascade_style(&[], &property.annotations.cascade, false);
    Ok(BoundProperty {
        property: bound,
        table,
    })
}

/// Discriminator and key columns of an `@Any` / `@ManyToAny` mapping.
///
/// The discriminator comes from the meta column or `<property>_type`; the
/// key from the first join column or `<property>_id`.
pub fn any_columns(
    ctx: &mut BuildContext,
    holder: &PropertyHolder,
    property: &PropertyDescriptor,
    meta_column: Option<&ColumnAnnotation>,
    table: TableId,
    not_null: bool,
) -> BindingResult<(TableId, Vec<Selectable>)> {
    let path = holder.property_path(&property.name);
    let implicit = ctx.naming.implicit();
    let mut discriminator = ColumnDescriptor::suffixed(
        &ctx.naming,
        implicit.determine_any_discriminator_column_name(&path),
    );
    if let Some(annotation) = meta_column.filter(|a| a.name.is_some()) {
        discriminator = ColumnDescriptor::from_annotation(&ctx.naming, annotation, &path, &NamingNature::EntityColumn);
    }
    let mut key = ColumnDescriptor::suffixed(&ctx.naming, implicit.determine_any_key_column_name(&path));
    if let Some(explicit) = property
        .annotations
        .join_columns
        .first()
        .and_then(|jc| jc.name.as_deref())
        .and_then(Identifier::to_identifier)
    {
        key = ColumnDescriptor::suffixed(&ctx.naming, explicit);
    }
    let mut selectables = Vec::with_capacity(2);
    for column in [&mut discriminator, &mut key] {
        if not_null {
            column.nullable = false;
        }
        selectables.push(column.bind(&mut ctx.collector, table)?);
    }
    Ok((table, selectables))
}

/// Cascade style string: JPA types and vendor types merged, `delete-orphan`
/// added for orphan removal. `none` when empty.
pub fn cascade_style(jpa: &[CascadeType], vendor: &[VendorCascade], orphan_removal: bool) -> String {
    let mut styles: BTreeSet<&'static str> = BTreeSet::new();
    for cascade in jpa {
        styles.insert(match cascade {
            CascadeType::All => "all",
            CascadeType::Persist => "persist",
            CascadeType::Merge => "merge",
            CascadeType::Remove => "delete",
            CascadeType::Refresh => "refresh",
            CascadeType::Detach => "evict",
        });
    }
    for cascade in vendor {
        styles.insert(match cascade {
            VendorCascade::All => "all",
            VendorCascade::SaveUpdate => "save-update",
            VendorCascade::Persist => "persist",
            VendorCascade::Merge => "merge",
            VendorCascade::Delete => "delete",
            VendorCascade::Lock => "lock",
            VendorCascade::Replicate => "replicate",
            VendorCascade::Evict | VendorCascade::Detach => "evict",
            VendorCascade::Refresh => "refresh",
            VendorCascade::DeleteOrphan => "delete-orphan",
        });
    }
    if orphan_removal {
        styles.insert("delete-orphan");
    }
    if styles.is_empty() {
        "none".to_string()
    } else {
        styles.into_iter().collect::<Vec<_>>().join(",")
    }
}

/// `(lazy, fetch)` of an association.
///
/// An explicit JPA fetch type wins over the default (eager for to-one,
/// lazy for collections); `@Fetch(JOIN)` always forces eager loading.
/// `@Fetch(SUBSELECT)` is only legal on collections.
pub fn fetch_style(
    fetch: Option<FetchType>,
    mode: Option<FetchMode>,
    is_collection: bool,
    qualified: &str,
) -> BindingResult<(bool, FetchStyle)> {
    let default_lazy = is_collection;
    let lazy = match fetch {
        Some(FetchType::Lazy) => true,
        Some(FetchType::Eager) => false,
        None => default_lazy,
    };
    match mode {
        Some(FetchMode::Join) => Ok((false, FetchStyle::Join)),
        Some(FetchMode::Select) => Ok((lazy, FetchStyle::Select)),
        Some(FetchMode::Subselect) if is_collection => Ok((lazy, FetchStyle::Subselect)),
        Some(FetchMode::Subselect) => Err(BindingError::annotation(
            qualified,
            "'@Fetch(SUBSELECT)' is only allowed on collections",
        )),
        None if lazy => Ok((true, FetchStyle::Select)),
        None if is_collection => Ok((false, FetchStyle::Select)),
        None => Ok((false, FetchStyle::Join)),
    }
}

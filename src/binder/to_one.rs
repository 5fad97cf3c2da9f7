//! Many-to-one and one-to-one associations.
//!
//! The first pass only validates the mapping and creates an unlinked
//! [`ToOneValue`]; the join columns are linked by a [`ToOneForeignKeyPass`]
//! once the target entity and its key are known. Associations that are part
//! of a composite identifier run in the `IdentifierCopy` group, ordered so
//! that the referenced entity's own identifier is resolved first.
//!
//! A one-to-one is kept as such only when it shares the owner's primary key
//! (`@PrimaryKeyJoinColumn`, or join columns naming exactly the owner's
//! identifier columns). Any other one-to-one is bound as a unique
//! many-to-one. The inverse (`mappedBy`) side has no columns at all.

use super::component::refresh_component_selectables;
use super::errors::{BindingError, BindingResult};
use super::join_column::{JoinColumnOwner, JoinColumns};
use super::property::{cascade_style, fetch_style, BoundProperty, PropertyContext, PropertyKind};
use super::second_pass::{KeyDependency, SecondPass, SecondPassGroup};
use super::synthetic::{
    classify_reference, create_synthetic_reference, resolve_referenced_columns, AssociationSite,
    ReferenceType,
};
use super::BuildContext;
use crate::metadata::descriptors::{OnDeleteAction, PropertyDescriptor, ToOneAnnotation};
use crate::model::{
    EntityId, ForeignKey, Property, Selectable, TableId, ToOneKind, ToOneValue, Value, ValueId,
    ValueKind,
};
use crate::naming::{Identifier, JoinColumnNature};

/// Bind a `@ManyToOne` or `@OneToOne` property.
pub fn bind_to_one(
    ctx: &mut BuildContext,
    pctx: &PropertyContext<'_>,
    property: &PropertyDescriptor,
    kind: PropertyKind,
) -> BindingResult<BoundProperty> {
    let holder = pctx.holder;
    let qualified = holder.qualified_path(&property.name);
    let annotations = &property.annotations;
    let is_one_to_one = kind == PropertyKind::OneToOne;
    let association: &ToOneAnnotation = match (&annotations.many_to_one, &annotations.one_to_one) {
        (Some(many_to_one), _) => many_to_one,
        (None, Some(one_to_one)) => one_to_one,
        (None, None) => {
            return Err(BindingError::assertion(format!(
                "'{}' bound as a to-one association without the annotation",
                qualified
            )))
        }
    };

    let target_entity = ctx.sources.entity_name_of(
        association
            .target_entity
            .as_deref()
            .unwrap_or(&property.type_name),
    );
    let (lazy, fetch) = fetch_style(association.fetch, annotations.fetch_mode, false, &qualified)?;
    let optional = association.optional
        && annotations.optional.unwrap_or(true)
        && !property.non_null
        && !pctx.force_not_null;
    let cascade = cascade_style(&association.cascade, &annotations.cascade, association.orphan_removal);
    let cascade_delete = annotations.on_delete == Some(OnDeleteAction::Cascade);
    let mapped_by = association
        .mapped_by
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());

    let mut join_columns = JoinColumns::build(
        &ctx.naming,
        holder,
        &property.name,
        &annotations.join_columns,
        mapped_by,
        JoinColumnOwner::Entity {
            kind: JoinColumnNature::Entity,
            entity_name: holder.entity_name.clone(),
        },
    )?;

    if let Some(mapped_by) = mapped_by {
        if !is_one_to_one {
            return Err(BindingError::annotation(
                &qualified,
                "'mappedBy' is only allowed on '@OneToOne'",
            ));
        }
        if cascade_delete {
            ctx.collector.warn(format!(
                "'@OnDelete' on the inverse side '{}' has no effect",
                qualified
            ));
        }
        let value = Value::new(
            holder.table,
            ValueKind::ToOne(ToOneValue {
                association: ToOneKind::OneToOne,
                referenced_entity: target_entity.clone(),
                referenced_property: Some(mapped_by.to_string()),
                reference_to_primary_key: false,
                fetch,
                lazy,
                unique: true,
                constrained: false,
                mapped_by: Some(mapped_by.to_string()),
                foreign_key_name: None,
                cascade_delete: false,
            }),
        );
        let value = ctx.collector.add_value(value);
        ctx.defer(Box::new(MappedByOneToOnePass {
            value,
            target_entity,
            mapped_by: mapped_by.to_string(),
            qualified: qualified.clone(),
        }))?;
        let mut bound = Property::new(&property.name, value);
        bound.optional = optional;
        bound.lazy = lazy;
        bound.cascade = cascade;
        return Ok(BoundProperty {
            property: bound,
            table: holder.table,
        });
    }

    if !optional {
        join_columns.set_nullable(false);
    }

    let owner = ctx.collector.find_entity(pctx.owner_entity);
    let owner_keys = owner
        .map(|id| ctx.collector.key_columns(id))
        .unwrap_or_default();
    let constrained = is_one_to_one
        && !holder.is_component()
        && (!annotations.primary_key_join_columns.is_empty()
            || names_equal(&join_columns.explicit_names(), &owner_keys));
    if constrained && !annotations.primary_key_join_columns.is_empty() {
        join_columns = JoinColumns::for_primary_key(
            &ctx.naming,
            &qualified,
            &annotations.primary_key_join_columns,
        );
    }
    let unique = is_one_to_one || join_columns.is_unique();
    if association.orphan_removal && !unique && !constrained {
        return Err(BindingError::annotation(
            &qualified,
            "has 'orphanRemoval' but is neither a unique nor a constrained association",
        ));
    }

    let table = holder.table_for(join_columns.explicit_table()).ok_or_else(|| {
        BindingError::annotation(
            &qualified,
            format!(
                "join column table '{}' is not a table of '{}'",
                join_columns.explicit_table().unwrap_or_default(),
                holder.entity_name
            ),
        )
    })?;

    let value = Value::new(
        table,
        ValueKind::ToOne(ToOneValue {
            association: if constrained {
                ToOneKind::OneToOne
            } else {
                ToOneKind::ManyToOne
            },
            referenced_entity: target_entity.clone(),
            referenced_property: None,
            reference_to_primary_key: true,
            fetch,
            lazy,
            unique,
            constrained,
            mapped_by: None,
            foreign_key_name: join_columns.foreign_key_name(),
            cascade_delete,
        }),
    );
    let value = ctx.collector.add_value(value);

    // legacy id aliasing: a to-one mapped onto the identifier columns is read-only
    let aliases_identifier = ctx.options.specj_proprietary_syntax
        && !constrained
        && !holder.in_identifier
        && !owner_keys.is_empty()
        && names_equal(&join_columns.explicit_names(), &owner_keys);

    ctx.defer(Box::new(ToOneForeignKeyPass {
        value,
        join_columns: join_columns.clone(),
        owner_entity: pctx.owner_entity.to_string(),
        property_path: holder.property_path(&property.name).full_path(),
        target_entity,
        table,
        in_primary_key: holder.in_identifier,
        enclosing_components: pctx.components.clone(),
        constrained,
        unique: unique && !constrained,
        cascade_delete,
    }))?;

    let mut bound = Property::new(&property.name, value);
    bound.optional = optional;
    bound.lazy = lazy;
    bound.cascade = cascade;
    bound.insertable = !aliases_identifier && join_columns.columns.iter().all(|c| c.column.insertable);
    bound.updatable = !aliases_identifier && join_columns.columns.iter().all(|c| c.column.updatable);
    bound.natural_id = annotations.natural_id;
    Ok(BoundProperty {
        property: bound,
        table,
    })
}

/// Same column set, ignoring order and case.
fn names_equal(left: &[Identifier], right: &[Identifier]) -> bool {
    if left.is_empty() || left.len() != right.len() {
        return false;
    }
    let mut l: Vec<String> = left.iter().map(Identifier::canonical_name).collect();
    let mut r: Vec<String> = right.iter().map(Identifier::canonical_name).collect();
    l.sort();
    r.sort();
    l == r
}

fn require_target(ctx: &BuildContext, target_entity: &str, qualified: &str) -> BindingResult<EntityId> {
    ctx.collector.find_entity(target_entity).ok_or_else(|| {
        BindingError::recoverable(
            qualified,
            format!("association targets an unknown entity '{}'", target_entity),
        )
    })
}

/// Links the join columns of an owning to-one and creates its foreign key.
#[derive(Debug)]
pub struct ToOneForeignKeyPass {
    pub value: ValueId,
    pub join_columns: JoinColumns,
    pub owner_entity: String,
    pub property_path: String,
    pub target_entity: String,
    pub table: TableId,
    pub in_primary_key: bool,
    pub enclosing_components: Vec<ValueId>,
    pub constrained: bool,
    pub unique: bool,
    pub cascade_delete: bool,
}

impl ToOneForeignKeyPass {
    fn link_constrained(&self, ctx: &mut BuildContext, target: EntityId) -> BindingResult<()> {
        let owner = ctx.collector.find_entity(&self.owner_entity).ok_or_else(|| {
            BindingError::assertion(format!("owner entity '{}' is not bound", self.owner_entity))
        })?;
        let owner_keys = ctx.collector.key_columns(owner);
        let target_keys = ctx.collector.key_columns(target);
        if owner_keys.is_empty() || target_keys.is_empty() {
            return Err(BindingError::recoverable(
                &self.join_columns.qualified,
                "primary key of the association ends is not bound yet",
            ));
        }
        if owner_keys.len() != target_keys.len() {
            return Err(BindingError::annotation(
                &self.join_columns.qualified,
                format!(
                    "shares the primary key of '{}' but the keys have {} and {} column(s)",
                    self.owner_entity,
                    owner_keys.len(),
                    target_keys.len()
                ),
            ));
        }
        let owner_table = ctx.collector.entity(owner).table;
        let target_table = ctx.collector.entity(target).table;
        let target_name = ctx.collector.entity(target).entity_name.clone();
        let value = ctx.collector.value_mut(self.value);
        value.table = owner_table;
        value.selectables = owner_keys
            .iter()
            .cloned()
            .map(Selectable::Column)
            .collect();
        if let Some(to_one) = value.as_to_one_mut() {
            to_one.referenced_entity = target_name.clone();
        }
        ctx.collector.table_mut(owner_table).add_foreign_key(ForeignKey {
            name: self.join_columns.foreign_key_name(),
            columns: owner_keys,
            referenced_entity: target_name,
            referenced_table: target_table,
            referenced_columns: Vec::new(),
            cascade_delete: self.cascade_delete,
        });
        Ok(())
    }
}

impl SecondPass for ToOneForeignKeyPass {
    fn group(&self) -> SecondPassGroup {
        if self.in_primary_key {
            SecondPassGroup::IdentifierCopy
        } else {
            SecondPassGroup::ForeignKey
        }
    }

    fn describe(&self) -> String {
        format!("foreign key of {}", self.join_columns.qualified)
    }

    fn key_dependency(&self) -> Option<KeyDependency> {
        self.in_primary_key.then(|| KeyDependency {
            owner_entity: self.owner_entity.clone(),
            referenced_entity: self.target_entity.clone(),
        })
    }

    fn do_second_pass(&self, ctx: &mut BuildContext) -> BindingResult<()> {
        let qualified = &self.join_columns.qualified;
        let target = require_target(ctx, &self.target_entity, qualified)?;
        if self.constrained {
            return self.link_constrained(ctx, target);
        }

        let target_keys = ctx.collector.key_columns(target);
        if target_keys.is_empty() {
            return Err(BindingError::recoverable(
                qualified,
                format!(
                    "the identifier of '{}' is not bound yet",
                    ctx.collector.entity(target).entity_name
                ),
            ));
        }
        let referenced = resolve_referenced_columns(&ctx.collector, &self.join_columns, target)?;
        let reference_type = match &referenced {
            None => ReferenceType::NoReference,
            Some(resolved) => {
                let given: Vec<Option<Identifier>> =
                    resolved.columns.iter().cloned().map(Some).collect();
                classify_reference(&given, &target_keys)
            }
        };
        let target_table = ctx.collector.entity(target).table;
        let (referenced_table, referenced_columns) = match (&referenced, reference_type) {
            (Some(resolved), ReferenceType::NonPkReference | ReferenceType::PkReference) => {
                (resolved.table, resolved.columns.clone())
            }
            _ => (target_table, target_keys),
        };

        let selectables = self
            .join_columns
            .link(ctx, self.table, referenced_table, &referenced_columns)?;
        let columns: Vec<Identifier> = selectables.iter().filter_map(|s| s.column().cloned()).collect();
        let target_name = ctx.collector.entity(target).entity_name.clone();

        let value = ctx.collector.value_mut(self.value);
        value.selectables = selectables;
        if let Some(to_one) = value.as_to_one_mut() {
            to_one.referenced_entity = target_name.clone();
        }

        let non_pk = reference_type == ReferenceType::NonPkReference;
        ctx.collector.table_mut(self.table).add_foreign_key(ForeignKey {
            name: self.join_columns.foreign_key_name(),
            columns: columns.clone(),
            referenced_entity: target_name,
            referenced_table,
            referenced_columns: if non_pk {
                referenced_columns.clone()
            } else {
                Vec::new()
            },
            cascade_delete: self.cascade_delete,
        });
        if self.unique {
            ctx.collector.table_mut(self.table).add_unique_key(None, columns);
        }

        if let (true, Some(resolved)) = (non_pk, &referenced) {
            create_synthetic_reference(
                ctx,
                AssociationSite {
                    owner_entity: &self.owner_entity,
                    property_path: &self.property_path,
                    qualified,
                    inverse: false,
                },
                target,
                resolved,
                self.value,
            )?;
        }

        for component in self.enclosing_components.iter().rev() {
            refresh_component_selectables(&mut ctx.collector, *component);
        }
        log::debug!("Linked {} ({:?})", qualified, reference_type);
        Ok(())
    }
}

/// Checks the owning side of an inverse one-to-one.
#[derive(Debug)]
pub struct MappedByOneToOnePass {
    pub value: ValueId,
    pub target_entity: String,
    pub mapped_by: String,
    pub qualified: String,
}

impl SecondPass for MappedByOneToOnePass {
    fn group(&self) -> SecondPassGroup {
        SecondPassGroup::Generic
    }

    fn describe(&self) -> String {
        format!("inverse one-to-one {}", self.qualified)
    }

    fn do_second_pass(&self, ctx: &mut BuildContext) -> BindingResult<()> {
        let target = require_target(ctx, &self.target_entity, &self.qualified)?;
        let target_name = ctx.collector.entity(target).entity_name.clone();
        let owning = ctx
            .collector
            .find_property(target, &self.mapped_by)
            .ok_or_else(|| {
                BindingError::recoverable(
                    &self.qualified,
                    format!(
                        "'mappedBy' references an unknown target entity property '{}.{}'",
                        target_name, self.mapped_by
                    ),
                )
            })?;
        if !ctx.collector.value(owning.value).is_to_one() {
            return Err(BindingError::annotation(
                &self.qualified,
                format!(
                    "'mappedBy' property '{}.{}' is not a to-one association",
                    target_name, self.mapped_by
                ),
            ));
        }
        if let Some(to_one) = ctx.collector.value_mut(self.value).as_to_one_mut() {
            to_one.referenced_entity = target_name.clone();
        }
        ctx.collector
            .add_unique_property_reference(&target_name, &self.mapped_by);
        Ok(())
    }
}

//! Entity binding.
//!
//! Per entity class, in order: table (own, shared root table or union
//! table), secondary tables, identifier, version, discriminator, joined
//! subclass key and the remaining properties. Key columns that depend on the
//! superclass or on the identifier being complete are wired in second passes.

use super::column::ColumnDescriptor;
use super::component::{bind_component, embeddable_class, refresh_component_selectables};
use super::errors::{BindingError, BindingResult};
use super::generator::{
    make_id_generator, null_value_for, LocalGenerators, ASSIGNED, PARAM_TARGET_COLUMN,
    PARAM_TARGET_TABLE,
};
use super::holder::PropertyHolder;
use super::inheritance::InheritanceState;
use super::join_column::JoinColumns;
use super::property::{
    bind_basic, bind_property, bind_property_as, classify, PropertyContext, PropertyKind,
};
use super::second_pass::{KeyDependency, SecondPass, SecondPassGroup};
use super::synthetic::resolve_referenced_columns;
use super::BuildContext;
use crate::metadata::descriptors::{
    ClassDescriptor, DiscriminatorType, InheritanceType, OnDeleteAction,
    PrimaryKeyJoinColumnAnnotation, PropertyDescriptor, TableAnnotation,
};
use crate::model::{
    ComponentValue, EntityId, EntityKind, ForeignKey, IdentifierGeneratorSpec, Join,
    PersistentEntity, PrimaryKey, Property, TableId, UniqueKeyHolder, Value, ValueId, ValueKind,
};
use crate::naming::Identifier;

/// Bind one entity class. Its entity superclass must already be bound.
pub fn bind_entity(ctx: &mut BuildContext, class: &ClassDescriptor) -> BindingResult<EntityId> {
    let state = ctx.inheritance.require(&class.name)?.clone();
    let entity_name = class.entity_name();
    log::debug!("Binding entity '{}' ({})", entity_name, class.name);

    let superclass = match &state.super_entity {
        Some(name) => Some(ctx.collector.find_entity(name).ok_or_else(|| {
            BindingError::assertion(format!(
                "superclass '{}' of '{}' is not bound yet",
                name, class.name
            ))
        })?),
        None => None,
    };
    let strategy = state.effective_strategy();
    let kind = match (superclass, strategy) {
        (None, _) => EntityKind::Root,
        (Some(_), InheritanceType::SingleTable) => EntityKind::SingleTableSubclass,
        (Some(_), InheritanceType::Joined) => EntityKind::JoinedSubclass,
        (Some(_), InheritanceType::TablePerClass) => EntityKind::UnionSubclass,
    };

    let table = match (kind, superclass) {
        (EntityKind::SingleTableSubclass, Some(parent)) => {
            if class.table.is_some() {
                ctx.collector.warn(format!(
                    "'@Table' on '{}' is ignored: a SINGLE_TABLE subclass is stored in its root's table",
                    class.name
                ));
            }
            ctx.collector.entity(parent).table
        }
        _ => {
            let is_abstract = class.is_abstract && strategy == InheritanceType::TablePerClass;
            entity_table(ctx, &entity_name, class.table.as_ref(), is_abstract)?
        }
    };

    let mut entity = PersistentEntity::new(&entity_name, &class.name, kind, table);
    entity.superclass = superclass;
    entity.strategy = strategy;
    entity.is_abstract = class.is_abstract;
    let id = ctx.collector.add_entity(entity)?;

    let mut holder = PropertyHolder::for_entity(
        &entity_name,
        &class.name,
        table,
        &class.attribute_overrides,
        &class.association_overrides,
    );
    bind_secondary_tables(ctx, class, id, &mut holder)?;

    let properties = ctx.sources.merged_properties(class);
    if kind == EntityKind::Root {
        bind_identifier(ctx, class, id, &holder, &properties)?;
    } else if let Some(property) = properties.iter().find(|p| p.is_identifier()) {
        return Err(BindingError::annotation(
            holder.qualified_path(&property.name),
            "a subclass entity cannot declare an identifier; it inherits the one of its root",
        ));
    }
    bind_version(ctx, id, &holder, &properties)?;
    bind_discriminator(ctx, class, &state, id)?;

    match kind {
        EntityKind::JoinedSubclass => bind_joined_subclass_key(ctx, class, id)?,
        _ if class.on_delete.is_some() => ctx.collector.warn(format!(
            "'@OnDelete' on '{}' has no effect: it only applies to JOINED subclasses",
            class.name
        )),
        _ => {}
    }

    for property in &properties {
        if property.is_identifier() || property.annotations.version {
            continue;
        }
        let pctx = PropertyContext::new(&holder);
        let Some(bound) = bind_property(ctx, &pctx, property)? else {
            continue;
        };
        let mut bound_property = bound.property;
        let entity = ctx.collector.entity_mut(id);
        if bound.table != entity.table {
            bound_property.join_table = Some(bound.table);
            if let Some(join) = entity.joins.iter_mut().find(|j| j.table == bound.table) {
                join.properties.push(bound_property.name.clone());
            }
        }
        entity.add_property(bound_property);
    }

    ctx.defer(Box::new(CreateKeyPass {
        entity_name: entity_name.clone(),
    }))?;
    log::debug!(
        "Bound entity '{}' as {:?} on table '{}'",
        entity_name,
        kind,
        ctx.collector.table(table).qualified_name()
    );
    Ok(id)
}

fn schema_or_default(explicit: Option<&str>, default: Option<&str>) -> Option<Identifier> {
    explicit.or(default).and_then(Identifier::to_identifier)
}

/// Primary table of an entity with its constraints.
fn entity_table(
    ctx: &mut BuildContext,
    entity_name: &str,
    annotation: Option<&TableAnnotation>,
    is_abstract: bool,
) -> BindingResult<TableId> {
    let logical = ctx
        .naming
        .logical_table_name(annotation.and_then(|t| t.name.as_deref()), entity_name);
    let physical = ctx.naming.to_physical_table(&logical);
    let schema = schema_or_default(
        annotation.and_then(|t| t.schema.as_deref()),
        ctx.options.default_schema.as_deref(),
    );
    let catalog = schema_or_default(
        annotation.and_then(|t| t.catalog.as_deref()),
        ctx.options.default_catalog.as_deref(),
    );
    let table = ctx
        .collector
        .add_table(schema, catalog, physical, logical, is_abstract);

    let Some(annotation) = annotation else {
        return Ok(table);
    };
    for constraint in &annotation.unique_constraints {
        if constraint.columns.is_empty() {
            return Err(BindingError::annotation(
                entity_name,
                "a unique constraint must name at least one column",
            ));
        }
        ctx.collector.add_unique_key_holder(UniqueKeyHolder {
            table,
            name: constraint.name.clone(),
            logical_columns: constraint.columns.clone(),
            unique: true,
        });
    }
    for index in &annotation.indexes {
        ctx.collector.add_unique_key_holder(UniqueKeyHolder {
            table,
            name: index.name.clone(),
            logical_columns: index.columns.clone(),
            unique: index.unique,
        });
    }
    let table_ref = ctx.collector.table_mut(table);
    if let Some(check) = &annotation.check {
        if !table_ref.checks.contains(check) {
            table_ref.checks.push(check.clone());
        }
    }
    if annotation.comment.is_some() {
        table_ref.comment = annotation.comment.clone();
    }
    Ok(table)
}

fn bind_secondary_tables(
    ctx: &mut BuildContext,
    class: &ClassDescriptor,
    id: EntityId,
    holder: &mut PropertyHolder,
) -> BindingResult<()> {
    let entity_name = ctx.collector.entity(id).entity_name.clone();
    for secondary in &class.secondary_tables {
        let logical = Identifier::to_identifier(&secondary.name).ok_or_else(|| {
            BindingError::annotation(&entity_name, "a secondary table must have a name")
        })?;
        let physical = ctx.naming.to_physical_table(&logical);
        let schema = schema_or_default(
            secondary.schema.as_deref(),
            ctx.options.default_schema.as_deref(),
        );
        let catalog = schema_or_default(
            secondary.catalog.as_deref(),
            ctx.options.default_catalog.as_deref(),
        );
        let table = ctx
            .collector
            .add_table(schema, catalog, physical, logical, false);
        if table == holder.table {
            return Err(BindingError::annotation(
                &entity_name,
                format!("secondary table '{}' is the primary table", secondary.name),
            ));
        }

        let entity = ctx.collector.entity_mut(id);
        let join_index = entity.joins.len();
        entity.joins.push(Join {
            table,
            key: None,
            optional: secondary.optional,
            properties: Vec::new(),
        });
        holder
            .secondary_tables
            .insert(secondary.name.trim().to_lowercase(), table);
        ctx.defer(Box::new(SecondaryTablePass {
            entity_name: entity_name.clone(),
            join_index,
            table,
            pk_join_columns: secondary.pk_join_columns.clone(),
        }))?;
    }
    Ok(())
}

/// Whether the identifier is a non-aggregated composite (identifier mapper).
fn uses_identifier_mapper(class: &ClassDescriptor, ids: &[&PropertyDescriptor]) -> bool {
    class.id_class.is_some()
        || ids.iter().filter(|p| p.annotations.id).count() > 1
        || ids.iter().any(|p| {
            p.annotations.id
                && (p.annotations.many_to_one.is_some() || p.annotations.one_to_one.is_some())
        })
}

fn assigned_generator(
    ctx: &BuildContext,
    table: TableId,
    columns: &[Identifier],
) -> IdentifierGeneratorSpec {
    let mut spec = IdentifierGeneratorSpec::new(ASSIGNED);
    spec.parameters.insert(
        PARAM_TARGET_TABLE.to_string(),
        ctx.collector.table(table).name.text().to_string(),
    );
    if let [column] = columns {
        spec.parameters.insert(
            PARAM_TARGET_COLUMN.to_string(),
            column.text().to_string(),
        );
    }
    spec
}

fn bind_identifier(
    ctx: &mut BuildContext,
    class: &ClassDescriptor,
    id: EntityId,
    holder: &PropertyHolder,
    properties: &[PropertyDescriptor],
) -> BindingResult<()> {
    let entity_name = holder.entity_name.clone();
    let ids: Vec<&PropertyDescriptor> = properties.iter().filter(|p| p.is_identifier()).collect();
    if ids.is_empty() {
        return Err(BindingError::annotation(
            &entity_name,
            format!("no identifier specified for entity '{}'", entity_name),
        ));
    }
    let embedded_ids = ids.iter().filter(|p| p.annotations.embedded_id).count();
    if embedded_ids > 0 && ids.len() > 1 {
        return Err(BindingError::annotation(
            &entity_name,
            "'@EmbeddedId' cannot be combined with other identifier properties",
        ));
    }

    if embedded_ids == 1 {
        bind_embedded_identifier(ctx, id, holder, ids[0])
    } else if uses_identifier_mapper(class, &ids) {
        bind_identifier_mapper(ctx, class, id, holder, &ids)
    } else {
        bind_simple_identifier(ctx, class, id, holder, ids[0])
    }
}

fn bind_simple_identifier(
    ctx: &mut BuildContext,
    class: &ClassDescriptor,
    id: EntityId,
    holder: &PropertyHolder,
    property: &PropertyDescriptor,
) -> BindingResult<()> {
    let qualified = holder.qualified_path(&property.name);
    let kind = classify(&ctx.sources, holder, property)?;
    if kind != PropertyKind::Identifier {
        return Err(BindingError::assertion(format!(
            "'{}' is not an identifier property",
            qualified
        )));
    }
    if ctx.sources.is_embeddable(&property.type_name) {
        return Err(BindingError::annotation(
            &qualified,
            "an embeddable identifier must be mapped with '@EmbeddedId' or '@IdClass'",
        ));
    }
    let mut pctx = PropertyContext::new(holder);
    pctx.force_not_null = true;
    let bound = bind_basic(ctx, &pctx, property)?;
    let value_id = bound.property.value;
    let value = ctx.collector.value(value_id);
    if value.has_formula() {
        return Err(BindingError::annotation(
            &qualified,
            "an identifier cannot be mapped to a formula",
        ));
    }
    if bound.table != holder.table {
        return Err(BindingError::annotation(
            &qualified,
            "the identifier must be mapped to the primary table",
        ));
    }
    let columns = value.columns();

    let table_name = ctx.collector.table(holder.table).name.clone();
    let locals = LocalGenerators::new([
        class.generators.as_slice(),
        property.annotations.generators.as_slice(),
    ]);
    let generator = make_id_generator(
        &ctx.collector,
        &ctx.options,
        &ctx.naming,
        &locals,
        property.annotations.generated_value.as_ref(),
        &table_name,
        &columns,
        &qualified,
    )?;

    let value = ctx.collector.value_mut(value_id);
    value.null_value = null_value_for(&generator.strategy).map(str::to_string);
    value.generator = Some(generator);

    let mut identifier = bound.property;
    identifier.optional = false;
    let entity = ctx.collector.entity_mut(id);
    entity.identifier = Some(value_id);
    entity.identifier_property = Some(identifier);
    Ok(())
}

fn bind_embedded_identifier(
    ctx: &mut BuildContext,
    id: EntityId,
    holder: &PropertyHolder,
    property: &PropertyDescriptor,
) -> BindingResult<()> {
    let qualified = holder.qualified_path(&property.name);
    let class = embeddable_class(ctx, &property.type_name, &qualified)?;
    let mut id_holder = holder.clone();
    id_holder.in_identifier = true;
    let annotations = &property.annotations;
    let child = id_holder.for_component(
        &property.name,
        &class.name,
        (&annotations.attribute_overrides, &annotations.association_overrides),
        (&class.attribute_overrides, &class.association_overrides),
    );
    let mut pctx = PropertyContext::new(&id_holder);
    pctx.force_not_null = true;
    let value = bind_component(ctx, &pctx, &child, &class, true)?;

    let columns = ctx.collector.value(value).columns();
    let generator = assigned_generator(ctx, holder.table, &columns);
    let component = ctx.collector.value_mut(value);
    component.null_value = null_value_for(ASSIGNED).map(str::to_string);
    component.generator = Some(generator);

    let mut identifier = Property::new(&property.name, value);
    identifier.optional = false;
    let entity = ctx.collector.entity_mut(id);
    entity.identifier = Some(value);
    entity.identifier_property = Some(identifier);
    log::trace!("Bound embedded identifier '{}'", qualified);
    Ok(())
}

/// Several `@Id`s or an `@IdClass`: the id properties form a virtual
/// component that doubles as the identifier.
fn bind_identifier_mapper(
    ctx: &mut BuildContext,
    class: &ClassDescriptor,
    id: EntityId,
    holder: &PropertyHolder,
    ids: &[&PropertyDescriptor],
) -> BindingResult<()> {
    let entity_name = holder.entity_name.clone();
    if let Some(id_class) = class.id_class.as_deref().and_then(|name| ctx.sources.get(name)) {
        for expected in &id_class.properties {
            if !ids.iter().any(|p| p.name == expected.name) {
                return Err(BindingError::annotation(
                    &entity_name,
                    format!(
                        "'@IdClass' property '{}' of '{}' has no matching '@Id' property",
                        expected.name, id_class.name
                    ),
                ));
            }
        }
    }

    let mapper_class = class.id_class.clone().unwrap_or_else(|| class.name.clone());
    let mut mapper = Value::new(
        holder.table,
        ValueKind::Component(ComponentValue {
            class_name: mapper_class.clone(),
            properties: Vec::new(),
            embedded: false,
            key: true,
            synthetic: false,
        }),
    );
    mapper.type_name = Some(mapper_class);
    let mapper = ctx.collector.add_value(mapper);

    let mut id_holder = holder.clone();
    id_holder.in_identifier = true;
    id_holder.in_identifier_mapper = true;
    let pctx = PropertyContext {
        holder: &id_holder,
        owner_entity: &entity_name,
        force_not_null: true,
        components: vec![mapper],
    };

    let mut members = Vec::with_capacity(ids.len());
    for property in ids {
        let kind = match classify(&ctx.sources, &id_holder, property)? {
            PropertyKind::Identifier if property.annotations.many_to_one.is_some() => {
                PropertyKind::ManyToOne
            }
            PropertyKind::Identifier if property.annotations.one_to_one.is_some() => {
                PropertyKind::OneToOne
            }
            PropertyKind::Identifier if ctx.sources.is_embeddable(&property.type_name) => {
                PropertyKind::Embedded
            }
            PropertyKind::Identifier => PropertyKind::Basic,
            other => other,
        };
        let mut bound = bind_property_as(ctx, &pctx, property, kind)?;
        bound.property.optional = false;
        members.push(bound.property);
    }

    let mut component_columns = Vec::new();
    for member in &members {
        component_columns.extend(ctx.collector.value(member.value).columns());
    }
    let generator = assigned_generator(ctx, holder.table, &component_columns);
    let value = ctx.collector.value_mut(mapper);
    if let Some(component) = value.as_component_mut() {
        component.properties = members;
    }
    value.null_value = null_value_for(ASSIGNED).map(str::to_string);
    value.generator = Some(generator);
    refresh_component_selectables(&mut ctx.collector, mapper);

    let entity = ctx.collector.entity_mut(id);
    entity.identifier = Some(mapper);
    entity.identifier_mapper = Some(mapper);
    entity.embedded_identifier = true;
    log::trace!("Bound identifier mapper of '{}' ({} properties)", entity_name, ids.len());
    Ok(())
}

fn bind_version(
    ctx: &mut BuildContext,
    id: EntityId,
    holder: &PropertyHolder,
    properties: &[PropertyDescriptor],
) -> BindingResult<()> {
    let versions: Vec<&PropertyDescriptor> =
        properties.iter().filter(|p| p.annotations.version).collect();
    let Some(property) = versions.first() else {
        return Ok(());
    };
    let qualified = holder.qualified_path(&property.name);
    if versions.len() > 1 {
        return Err(BindingError::annotation(
            &qualified,
            "an entity may declare only one '@Version' property",
        ));
    }
    if !ctx.collector.entity(id).is_root() {
        return Err(BindingError::annotation(
            &qualified,
            "'@Version' may only be declared by the root of an entity hierarchy",
        ));
    }
    let mut pctx = PropertyContext::new(holder);
    pctx.force_not_null = true;
    let bound = bind_basic(ctx, &pctx, property)?;
    let value = ctx.collector.value(bound.property.value);
    if value.has_formula() || value.column_span() != 1 {
        return Err(BindingError::annotation(
            &qualified,
            "a version must be mapped to exactly one column",
        ));
    }
    let mut version = bound.property;
    version.optional = false;
    ctx.collector.entity_mut(id).version = Some(version);
    Ok(())
}

/// `String.hashCode` of the JVM, the default INTEGER discriminator value.
pub fn jvm_string_hash(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Discriminator value of an entity for the given column type.
pub fn discriminator_value(
    entity_name: &str,
    explicit: Option<&str>,
    discriminator_type: DiscriminatorType,
) -> BindingResult<String> {
    match (discriminator_type, explicit) {
        (DiscriminatorType::String, Some(value)) => Ok(value.to_string()),
        (DiscriminatorType::String, None) => Ok(entity_name.to_string()),
        (DiscriminatorType::Char, Some(value)) if value.chars().count() == 1 => Ok(value.to_string()),
        (DiscriminatorType::Char, Some(value)) => Err(BindingError::annotation(
            entity_name,
            format!("CHAR discriminator value '{}' must be a single character", value),
        )),
        (DiscriminatorType::Char, None) => Ok(entity_name.chars().take(1).collect()),
        (DiscriminatorType::Integer, Some(value)) => value
            .trim()
            .parse::<i32>()
            .map(|v| v.to_string())
            .map_err(|_| {
                BindingError::annotation(
                    entity_name,
                    format!("INTEGER discriminator value '{}' is not a number", value),
                )
            }),
        (DiscriminatorType::Integer, None) => Ok(jvm_string_hash(entity_name).to_string()),
    }
}

fn bind_discriminator(
    ctx: &mut BuildContext,
    class: &ClassDescriptor,
    state: &InheritanceState,
    id: EntityId,
) -> BindingResult<()> {
    let entity_name = ctx.collector.entity(id).entity_name.clone();
    let root = ctx.collector.root_entity(id);

    if root == id {
        let explicit = class.discriminator_column.as_ref();
        let options = &ctx.options;
        let create = match state.effective_strategy() {
            InheritanceType::SingleTable => explicit.is_some() || state.has_siblings,
            InheritanceType::Joined => {
                (explicit.is_some() && !options.ignore_explicit_discriminator_columns_for_joined)
                    || options.implicit_discriminator_columns_for_joined
            }
            InheritanceType::TablePerClass => {
                if explicit.is_some() {
                    ctx.collector.warn(format!(
                        "'@DiscriminatorColumn' on '{}' is ignored for TABLE_PER_CLASS",
                        class.name
                    ));
                }
                false
            }
        };
        if create {
            let annotation = explicit.cloned().unwrap_or_default();
            let table = ctx.collector.entity(id).table;
            let logical = annotation
                .name
                .as_deref()
                .and_then(Identifier::to_identifier)
                .unwrap_or_else(|| ctx.naming.implicit().determine_discriminator_column_name());
            let mut column = ColumnDescriptor::suffixed(&ctx.naming, logical);
            column.nullable = false;
            let type_name = match annotation.discriminator_type {
                DiscriminatorType::String => {
                    column.length = Some(annotation.length);
                    "string"
                }
                DiscriminatorType::Char => {
                    column.length = Some(1);
                    "character"
                }
                DiscriminatorType::Integer => "integer",
            };
            column.sql_type = annotation.column_definition.clone();
            let selectable = column.bind(&mut ctx.collector, table)?;
            let mut value = Value::basic(table, type_name);
            value.selectables = vec![selectable];
            let value = ctx.collector.add_value(value);
            ctx.collector.entity_mut(id).discriminator = Some(value);
            log::trace!("Created discriminator column for '{}'", entity_name);
        }
    }

    if ctx.collector.entity(root).discriminator.is_none() {
        if class.discriminator_value.is_some() && root == id && !state.has_siblings {
            log::debug!("'{}' declares a discriminator value but has no subclasses", class.name);
        }
        return Ok(());
    }
    let root_class = ctx.collector.entity(root).class_name.clone();
    let discriminator_type = ctx
        .sources
        .get(&root_class)
        .and_then(|c| c.discriminator_column.as_ref())
        .map(|d| d.discriminator_type)
        .unwrap_or_default();
    let value = discriminator_value(
        &entity_name,
        class.discriminator_value.as_deref(),
        discriminator_type,
    )?;
    ctx.collector.entity_mut(id).discriminator_value = Some(value);
    Ok(())
}

fn bind_joined_subclass_key(
    ctx: &mut BuildContext,
    class: &ClassDescriptor,
    id: EntityId,
) -> BindingResult<()> {
    let entity = ctx.collector.entity(id);
    let entity_name = entity.entity_name.clone();
    let table = entity.table;
    let parent = entity.superclass.ok_or_else(|| {
        BindingError::assertion(format!("joined subclass '{}' has no superclass", entity_name))
    })?;
    let parent_name = ctx.collector.entity(parent).entity_name.clone();
    let cascade_delete = class.on_delete == Some(OnDeleteAction::Cascade);
    let key = ctx.collector.add_value(Value::new(
        table,
        ValueKind::Key {
            referenced_property: None,
            cascade_delete,
        },
    ));
    ctx.collector.entity_mut(id).key = Some(key);
    ctx.defer(Box::new(JoinedSubclassKeyPass {
        entity_name,
        parent_name,
        key,
        table,
        pk_join_columns: class.primary_key_join_columns.clone(),
        cascade_delete,
    }))
}

/// Links the key of a joined subclass to its superclass table.
#[derive(Debug)]
pub struct JoinedSubclassKeyPass {
    pub entity_name: String,
    pub parent_name: String,
    pub key: ValueId,
    pub table: TableId,
    pub pk_join_columns: Vec<PrimaryKeyJoinColumnAnnotation>,
    pub cascade_delete: bool,
}

impl SecondPass for JoinedSubclassKeyPass {
    fn group(&self) -> SecondPassGroup {
        SecondPassGroup::ForeignKey
    }

    fn describe(&self) -> String {
        format!("joined subclass key of {}", self.entity_name)
    }

    fn key_dependency(&self) -> Option<KeyDependency> {
        Some(KeyDependency {
            owner_entity: self.entity_name.clone(),
            referenced_entity: self.parent_name.clone(),
        })
    }

    fn do_second_pass(&self, ctx: &mut BuildContext) -> BindingResult<()> {
        if !ctx.collector.value(self.key).selectables.is_empty() {
            return Ok(());
        }
        let parent = ctx.collector.find_entity(&self.parent_name).ok_or_else(|| {
            BindingError::assertion(format!("superclass '{}' is not bound", self.parent_name))
        })?;
        let parent_keys = ctx.collector.key_columns(parent);
        if parent_keys.is_empty() {
            return Err(BindingError::recoverable(
                &self.entity_name,
                format!("the key of superclass '{}' is not bound yet", self.parent_name),
            ));
        }
        let parent_table = ctx.collector.entity(parent).table;
        let join_columns =
            JoinColumns::for_primary_key(&ctx.naming, &self.entity_name, &self.pk_join_columns);
        let referenced = match resolve_referenced_columns(&ctx.collector, &join_columns, parent)? {
            Some(resolved) => resolved.columns,
            None => parent_keys,
        };
        let selectables = join_columns.link(ctx, self.table, parent_table, &referenced)?;
        ctx.collector.value_mut(self.key).selectables = selectables;
        let columns = ctx.collector.value(self.key).columns();

        let table = ctx.collector.table_mut(self.table);
        if table.primary_key.is_none() {
            table.primary_key = Some(PrimaryKey {
                name: None,
                columns: columns.clone(),
            });
        }
        table.add_foreign_key(ForeignKey {
            name: join_columns.foreign_key_name(),
            columns,
            referenced_entity: self.parent_name.clone(),
            referenced_table: parent_table,
            referenced_columns: Vec::new(),
            cascade_delete: self.cascade_delete,
        });
        Ok(())
    }
}

/// Links a secondary table to the entity's primary table.
#[derive(Debug)]
pub struct SecondaryTablePass {
    pub entity_name: String,
    pub join_index: usize,
    pub table: TableId,
    pub pk_join_columns: Vec<PrimaryKeyJoinColumnAnnotation>,
}

impl SecondPass for SecondaryTablePass {
    fn group(&self) -> SecondPassGroup {
        SecondPassGroup::SecondaryTable
    }

    fn describe(&self) -> String {
        format!("secondary table #{} of {}", self.join_index, self.entity_name)
    }

    fn do_second_pass(&self, ctx: &mut BuildContext) -> BindingResult<()> {
        let entity = ctx.collector.find_entity(&self.entity_name).ok_or_else(|| {
            BindingError::assertion(format!("entity '{}' is not bound", self.entity_name))
        })?;
        if ctx.collector.entity(entity).joins[self.join_index].key.is_some() {
            return Ok(());
        }
        let keys = ctx.collector.key_columns(entity);
        if keys.is_empty() {
            return Err(BindingError::recoverable(
                &self.entity_name,
                "the identifier is not bound yet",
            ));
        }
        let owner_table = ctx.collector.entity(entity).table;
        let join_columns =
            JoinColumns::for_primary_key(&ctx.naming, &self.entity_name, &self.pk_join_columns);
        let referenced = match resolve_referenced_columns(&ctx.collector, &join_columns, entity)? {
            Some(resolved) => resolved.columns,
            None => keys,
        };
        let selectables = join_columns.link(ctx, self.table, owner_table, &referenced)?;
        let mut key = Value::new(
            self.table,
            ValueKind::Key {
                referenced_property: None,
                cascade_delete: false,
            },
        );
        key.selectables = selectables;
        let columns = key.columns();
        let key = ctx.collector.add_value(key);
        ctx.collector.entity_mut(entity).joins[self.join_index].key = Some(key);

        let table = ctx.collector.table_mut(self.table);
        if table.primary_key.is_none() {
            table.primary_key = Some(PrimaryKey {
                name: None,
                columns: columns.clone(),
            });
        }
        table.add_foreign_key(ForeignKey {
            name: join_columns.foreign_key_name(),
            columns,
            referenced_entity: self.entity_name.clone(),
            referenced_table: owner_table,
            referenced_columns: Vec::new(),
            cascade_delete: false,
        });
        Ok(())
    }
}

/// Primary key, union table columns and natural-id key of an entity table.
#[derive(Debug)]
pub struct CreateKeyPass {
    pub entity_name: String,
}

impl CreateKeyPass {
    /// A union subclass table repeats every column of its superclass table.
    fn copy_union_columns(ctx: &mut BuildContext, entity: EntityId) {
        let Some(parent) = ctx.collector.entity(entity).superclass else {
            return;
        };
        let table = ctx.collector.entity(entity).table;
        let parent_table = ctx.collector.entity(parent).table;
        if table == parent_table {
            return;
        }
        let source = ctx.collector.table(parent_table).clone();
        let bindings: Vec<(Identifier, Identifier)> = source
            .columns
            .iter()
            .filter_map(|column| {
                ctx.collector
                    .logical_column_name(parent_table, &column.name)
                    .map(|logical| (logical.clone(), column.name.clone()))
            })
            .collect();
        for column in source.columns {
            ctx.collector.table_mut(table).add_column(column);
        }
        for (logical, physical) in &bindings {
            ctx.collector.add_column_binding(table, logical, physical);
        }
        for foreign_key in source.foreign_keys {
            ctx.collector.table_mut(table).add_foreign_key(foreign_key);
        }
    }
}

impl SecondPass for CreateKeyPass {
    fn group(&self) -> SecondPassGroup {
        SecondPassGroup::Key
    }

    fn describe(&self) -> String {
        format!("keys of {}", self.entity_name)
    }

    fn do_second_pass(&self, ctx: &mut BuildContext) -> BindingResult<()> {
        let entity = ctx.collector.find_entity(&self.entity_name).ok_or_else(|| {
            BindingError::assertion(format!("entity '{}' is not bound", self.entity_name))
        })?;
        if ctx.collector.entity(entity).kind == EntityKind::UnionSubclass {
            Self::copy_union_columns(ctx, entity);
        }

        let table = ctx.collector.entity(entity).table;
        if ctx.collector.table(table).primary_key.is_none() {
            let columns = ctx.collector.key_columns(entity);
            if columns.is_empty() {
                return Err(BindingError::recoverable(
                    &self.entity_name,
                    "the identifier columns are not bound yet",
                ));
            }
            ctx.collector.table_mut(table).primary_key = Some(PrimaryKey { name: None, columns });
        }

        let natural_id: Vec<Identifier> = ctx
            .collector
            .entity(entity)
            .properties
            .iter()
            .filter(|p| p.natural_id && p.join_table.is_none())
            .flat_map(|p| ctx.collector.value(p.value).columns())
            .collect();
        if !natural_id.is_empty() {
            ctx.collector.table_mut(table).add_unique_key(None, natural_id);
        }
        Ok(())
    }
}

//! Embedded components.
//!
//! A component value is registered before its members so that nested
//! associations can name it as an enclosing component; its selectables are
//! the concatenation of the member selectables and are refreshed whenever a
//! member is linked in a later pass.

use super::errors::{BindingError, BindingResult};
use super::holder::PropertyHolder;
use super::property::{bind_property, BoundProperty, PropertyContext};
use super::BuildContext;
use crate::metadata::descriptors::{ClassDescriptor, ClassKind, PropertyDescriptor};
use crate::model::{ComponentValue, MetadataCollector, Property, Selectable, Value, ValueId, ValueKind};

/// Embeddables nested deeper than this are rejected as cyclic.
const MAX_COMPONENT_DEPTH: usize = 32;

/// Bind an `@Embedded` property (or one whose type is an embeddable).
pub fn bind_embedded(
    ctx: &mut BuildContext,
    pctx: &PropertyContext<'_>,
    property: &PropertyDescriptor,
) -> BindingResult<BoundProperty> {
    let holder = pctx.holder;
    let qualified = holder.qualified_path(&property.name);
    let class = embeddable_class(ctx, &property.type_name, &qualified)?;
    let annotations = &property.annotations;
    let child = holder.for_component(
        &property.name,
        &class.name,
        (&annotations.attribute_overrides, &annotations.association_overrides),
        (&class.attribute_overrides, &class.association_overrides),
    );

    let value = bind_component(ctx, pctx, &child, &class, false)?;

    let members: Vec<Property> = ctx
        .collector
        .value(value)
        .as_component()
        .map(|c| c.properties.clone())
        .unwrap_or_default();
    let mut bound = Property::new(&property.name, value);
    bound.optional = !property.non_null && !pctx.force_not_null;
    bound.insertable = members.iter().any(|p| p.insertable) || members.is_empty();
    bound.updatable = members.iter().any(|p| p.updatable) || members.is_empty();
    Ok(BoundProperty {
        property: bound,
        table: holder.table,
    })
}

/// Look up `type_name` among the embeddable classes of the unit.
pub fn embeddable_class(
    ctx: &BuildContext,
    type_name: &str,
    qualified: &str,
) -> BindingResult<ClassDescriptor> {
    match ctx.sources.get(type_name) {
        Some(class) if class.kind == ClassKind::Embeddable => Ok(class.clone()),
        Some(class) => Err(BindingError::annotation(
            qualified,
            format!("type '{}' is not an '@Embeddable'", class.name),
        )),
        None => Err(BindingError::annotation(
            qualified,
            format!("unknown embeddable type '{}'", type_name),
        )),
    }
}

/// Bind the members of `class` into a new component value in `holder`.
///
/// `holder` is the component's own holder; `pctx` describes where the
/// component itself is declared.
pub fn bind_component(
    ctx: &mut BuildContext,
    pctx: &PropertyContext<'_>,
    holder: &PropertyHolder,
    class: &ClassDescriptor,
    is_key: bool,
) -> BindingResult<ValueId> {
    if holder.path.parts().len() > MAX_COMPONENT_DEPTH {
        return Err(BindingError::annotation(
            format!("{}.{}", holder.entity_name, holder.path),
            format!("embeddable '{}' is nested too deeply (cyclic embedding?)", class.name),
        ));
    }

    let mut component = Value::new(
        holder.table,
        ValueKind::Component(ComponentValue {
            class_name: class.name.clone(),
            properties: Vec::new(),
            embedded: true,
            key: is_key,
            synthetic: false,
        }),
    );
    component.type_name = Some(class.name.clone());
    let value = ctx.collector.add_value(component);

    let mut components = pctx.components.clone();
    components.push(value);
    let member_ctx = PropertyContext {
        holder,
        owner_entity: pctx.owner_entity,
        force_not_null: pctx.force_not_null,
        components,
    };

    let mut members = Vec::new();
    for member in ctx.sources.merged_properties(class) {
        if let Some(bound) = bind_property(ctx, &member_ctx, &member)? {
            members.push(bound.property);
        }
    }
    if members.is_empty() {
        ctx.collector.warn(format!(
            "embeddable '{}' at '{}.{}' has no persistent properties",
            class.name, holder.entity_name, holder.path
        ));
    }
    if let Some(component) = ctx.collector.value_mut(value).as_component_mut() {
        component.properties = members;
    }
    refresh_component_selectables(&mut ctx.collector, value);
    log::trace!(
        "Bound component '{}' at '{}.{}'",
        class.name,
        holder.entity_name,
        holder.path
    );
    Ok(value)
}

/// Recompute a component's selectables from its members.
///
/// Collection members contribute nothing. No-op for non-components.
pub fn refresh_component_selectables(collector: &mut MetadataCollector, id: ValueId) {
    let members: Vec<ValueId> = match collector.value(id).as_component() {
        Some(component) => component.properties.iter().map(|p| p.value).collect(),
        None => return,
    };
    let selectables: Vec<Selectable> = members
        .into_iter()
        .map(|member| collector.value(member))
        .filter(|member| !matches!(member.kind, ValueKind::Collection(_)))
        .flat_map(|member| member.selectables.iter().cloned())
        .collect();
    collector.value_mut(id).selectables = selectables;
}

/// Refresh every non-synthetic component, innermost first.
pub fn refresh_all_components(collector: &mut MetadataCollector) {
    let components: Vec<ValueId> = collector
        .values()
        .iter()
        .enumerate()
        .filter(|(_, value)| matches!(&value.kind, ValueKind::Component(c) if !c.synthetic))
        .map(|(index, _)| ValueId(index))
        .collect();
    for id in components.into_iter().rev() {
        refresh_component_selectables(collector, id);
    }
}

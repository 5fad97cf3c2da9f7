//! # Binder
//!
//! Two-phase conversion of class descriptors into the mapping model.
//!
//! 1. **First pass**: classes are bound superclass-first. Tables, columns and
//!    values that only depend on the class itself are created right away;
//!    anything that needs another entity (association targets, referenced
//!    keys, inverse sides) is queued as a second pass.
//! 2. **Second passes**: the queue is drained group by group once every
//!    entity is registered (see [`second_pass`]).
//! 3. **Finishing**: index/unique-key directives are materialised and every
//!    recorded property reference is checked.
//!
//! All state lives in one [`BuildContext`]; binder components only hold
//! handles into its collector.

pub mod collection;
pub mod column;
pub mod component;
pub mod entity;
pub mod errors;
pub mod generator;
pub mod holder;
pub mod inheritance;
pub mod join_column;
pub mod property;
pub mod second_pass;
pub mod synthetic;
pub mod to_one;

use std::collections::HashMap;

use crate::config::BuildOptions;
use crate::metadata::descriptors::{ClassDescriptor, ClassKind, PropertyDescriptor};
use crate::metadata::MetadataSource;
use crate::model::{MappingModel, MetadataCollector, ValueKind};
use crate::naming::{implicit::unqualify, Identifier, NamingResolver};

pub use errors::{BindingError, BindingResult};
use inheritance::{build_inheritance_states, InheritanceStates};
use second_pass::{SecondPass, SecondPassQueue};

/// Descriptors of the unit being bound, looked up by class or entity name.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    classes: Vec<ClassDescriptor>,
    by_name: HashMap<String, usize>,
    /// Unqualified class names; `None` when ambiguous.
    by_simple_name: HashMap<String, Option<usize>>,
}

impl SourceIndex {
    pub fn new(classes: &[ClassDescriptor]) -> Self {
        let mut by_name = HashMap::new();
        let mut by_simple_name: HashMap<String, Option<usize>> = HashMap::new();
        for (index, class) in classes.iter().enumerate() {
            by_name.insert(class.name.clone(), index);
            if class.is_entity() {
                by_name.entry(class.entity_name()).or_insert(index);
            }
            by_simple_name
                .entry(unqualify(&class.name).to_string())
                .and_modify(|existing| *existing = None)
                .or_insert(Some(index));
        }
        SourceIndex {
            classes: classes.to_vec(),
            by_name,
            by_simple_name,
        }
    }

    /// Class by qualified name, entity name or unambiguous simple name.
    pub fn get(&self, name: &str) -> Option<&ClassDescriptor> {
        self.by_name
            .get(name)
            .copied()
            .or_else(|| self.by_simple_name.get(unqualify(name)).copied().flatten())
            .map(|index| &self.classes[index])
    }

    pub fn is_embeddable(&self, type_name: &str) -> bool {
        self.get(type_name)
            .is_some_and(|c| c.kind == ClassKind::Embeddable)
    }

    /// Entity name of an entity class, the name itself when unknown.
    pub fn entity_name_of(&self, name: &str) -> String {
        match self.get(name) {
            Some(class) if class.is_entity() => class.entity_name(),
            _ => name.to_string(),
        }
    }

    /// Properties of `class` with those of its mapped superclasses merged in.
    ///
    /// Ancestors come first; a redeclared property replaces the inherited one
    /// in place. The walk stops at the first entity ancestor.
    pub fn merged_properties(&self, class: &ClassDescriptor) -> Vec<PropertyDescriptor> {
        let mut chain = vec![class];
        let mut current = class.superclass.as_deref();
        while let Some(name) = current {
            match self.get(name) {
                Some(parent) if parent.kind == ClassKind::MappedSuperclass => {
                    chain.push(parent);
                    current = parent.superclass.as_deref();
                }
                _ => break,
            }
        }

        let mut merged: Vec<PropertyDescriptor> = Vec::new();
        for declaring in chain.into_iter().rev() {
            for property in &declaring.properties {
                match merged.iter_mut().find(|p| p.name == property.name) {
                    Some(existing) => *existing = property.clone(),
                    None => merged.push(property.clone()),
                }
            }
        }
        merged
    }

    pub fn classes(&self) -> &[ClassDescriptor] {
        &self.classes
    }
}

/// Everything one build reads and writes.
#[derive(Debug)]
pub struct BuildContext {
    pub options: BuildOptions,
    pub naming: NamingResolver,
    pub collector: MetadataCollector,
    pub sources: SourceIndex,
    pub inheritance: InheritanceStates,
    pub second_passes: SecondPassQueue,
}

impl BuildContext {
    /// `ordered_classes` must list superclasses before their subclasses.
    pub fn new(options: BuildOptions, ordered_classes: &[ClassDescriptor]) -> Self {
        let naming = options.naming_resolver();
        let mut collector = MetadataCollector::new();
        let inheritance = build_inheritance_states(ordered_classes, &mut collector);
        BuildContext {
            options,
            naming,
            collector,
            sources: SourceIndex::new(ordered_classes),
            inheritance,
            second_passes: SecondPassQueue::default(),
        }
    }

    /// Queue a second pass, or run it right away when already draining.
    ///
    /// A pass run inline that is not ready yet is queued for the next round.
    pub fn defer(&mut self, task: Box<dyn SecondPass>) -> BindingResult<()> {
        if !self.collector.is_in_second_pass() {
            self.second_passes.enqueue(task);
            return Ok(());
        }
        match task.do_second_pass(self) {
            Err(err) if err.is_recoverable() => {
                log::debug!("Inline pass '{}' not ready: {}", task.describe(), err);
                self.second_passes.enqueue(task);
                Ok(())
            }
            other => other,
        }
    }
}

/// Bind a metadata source into a mapping model.
pub fn bind(source: &MetadataSource, options: &BuildOptions) -> BindingResult<MappingModel> {
    let ordered = source.ordered_classes()?;
    let mut ctx = BuildContext::new(options.clone(), &ordered);
    for generator in &source.generators {
        ctx.collector.add_global_generator(generator.clone());
    }
    for definition in &source.filter_definitions {
        ctx.collector.add_filter_definition(definition.clone());
    }
    bind_classes(&mut ctx, &ordered)?;
    finish(ctx)
}

/// First pass over `ordered_classes` followed by the second-pass drain.
pub fn bind_classes(ctx: &mut BuildContext, ordered_classes: &[ClassDescriptor]) -> BindingResult<()> {
    log::info!(
        "Binding {} class descriptor(s) ({} with inheritance state)",
        ordered_classes.len(),
        ctx.inheritance.len()
    );
    for class in ordered_classes {
        if !class.is_entity() {
            log::trace!("Skipping non-entity class '{}'", class.name);
            continue;
        }
        entity::bind_entity(ctx, class)?;
    }
    second_pass::drain(ctx)?;
    component::refresh_all_components(&mut ctx.collector);
    Ok(())
}

/// Materialise deferred keys, validate property references and hand out the model.
pub fn finish(mut ctx: BuildContext) -> BindingResult<MappingModel> {
    materialize_unique_keys(&mut ctx.collector)?;
    validate_property_references(&ctx.collector)?;
    let model = ctx.collector.into_model();
    log::info!(
        "Bound {} entities over {} tables ({} warning(s))",
        model.entities.len(),
        model.tables.len(),
        model.warnings.len()
    );
    Ok(model)
}

fn materialize_unique_keys(collector: &mut MetadataCollector) -> BindingResult<()> {
    for holder in collector.take_unique_key_holders() {
        let table_name = collector.table(holder.table).name.to_string();
        let mut columns = Vec::with_capacity(holder.logical_columns.len());
        for logical in &holder.logical_columns {
            let name = Identifier::parse(logical);
            let physical = collector
                .physical_column_name(holder.table, &name)
                .filter(|physical| collector.table(holder.table).has_column(physical))
                .ok_or_else(|| {
                    BindingError::annotation(
                        &table_name,
                        format!(
                            "unable to create {} on table '{}': column '{}' does not exist",
                            if holder.unique { "unique key" } else { "index" },
                            table_name,
                            logical
                        ),
                    )
                })?;
            columns.push(physical);
        }
        let table = collector.table_mut(holder.table);
        if holder.unique {
            table.add_unique_key(holder.name.as_deref(), columns);
        } else {
            table.add_index(holder.name.as_deref(), columns);
        }
    }
    Ok(())
}

fn validate_property_references(collector: &MetadataCollector) -> BindingResult<()> {
    for reference in collector.property_references() {
        let entity = collector.find_entity(&reference.entity_name).ok_or_else(|| {
            BindingError::annotation(
                &reference.entity_name,
                format!(
                    "property reference '{}' targets an unknown entity",
                    reference.property_name
                ),
            )
        })?;
        let property = collector
            .find_property(entity, &reference.property_name)
            .ok_or_else(|| {
                BindingError::annotation(
                    format!("{}.{}", reference.entity_name, reference.property_name),
                    "referenced property not found",
                )
            })?;
        if reference.unique && matches!(collector.value(property.value).kind, ValueKind::Collection(_)) {
            return Err(BindingError::annotation(
                format!("{}.{}", reference.entity_name, reference.property_name),
                "a unique property reference cannot target a collection",
            ));
        }
    }
    Ok(())
}

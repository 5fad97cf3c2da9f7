//! Identifier generator resolution.
//!
//! `@GeneratedValue` picks a strategy and optionally names a generator. Named
//! generators are looked up in the local scope first (property-level
//! declarations shadow class-level ones) and then among the global
//! generators registered on the collector. Parameters are assembled in
//! layers, later layers overriding earlier ones:
//!
//! 1. `target_table` / `target_column` of the identifier,
//! 2. default schema and catalog from the build options,
//! 3. the named generator's own settings and parameters. Sequence and table
//!    names go through the physical naming strategy.

use std::collections::{BTreeMap, HashMap};

use super::errors::{BindingError, BindingResult};
use crate::config::BuildOptions;
use crate::metadata::descriptors::{
    GeneratedValueAnnotation, GenerationType, GeneratorAnnotation, GeneratorKind,
};
use crate::model::{IdentifierGeneratorSpec, MetadataCollector};
use crate::naming::{Identifier, NamingResolver};

pub const ASSIGNED: &str = "assigned";
pub const IDENTITY: &str = "identity";
pub const SEQUENCE: &str = "enhanced-sequence";
pub const TABLE: &str = "enhanced-table";
pub const NATIVE: &str = "native";

/// Strategies a named generator never replaces.
const NOT_OVERRIDABLE: [&str; 3] = [IDENTITY, "seqhilo", "multiple-hilo-per-table"];

pub const PARAM_TARGET_TABLE: &str = "target_table";
pub const PARAM_TARGET_COLUMN: &str = "target_column";

/// Strategy implied by a `@GeneratedValue` strategy.
pub fn strategy_for(generation: GenerationType) -> &'static str {
    match generation {
        GenerationType::Identity => IDENTITY,
        GenerationType::Sequence => SEQUENCE,
        GenerationType::Table => TABLE,
        GenerationType::Auto => NATIVE,
    }
}

/// Strategy of a declared generator.
pub fn generator_strategy(generator: &GeneratorAnnotation) -> BindingResult<String> {
    match generator.kind {
        GeneratorKind::Sequence => Ok(SEQUENCE.to_string()),
        GeneratorKind::Table => Ok(TABLE.to_string()),
        GeneratorKind::Generic => generator
            .strategy
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                BindingError::annotation(
                    &generator.name,
                    "'@GenericGenerator' must specify a strategy",
                )
            }),
    }
}

/// Parameters contributed by a declared generator.
fn generator_parameters(
    naming: &NamingResolver,
    generator: &GeneratorAnnotation,
) -> BTreeMap<String, String> {
    let mut parameters = BTreeMap::new();
    let physical = |raw: &Option<String>, sequence: bool| {
        raw.as_deref().and_then(Identifier::to_identifier).map(|logical| {
            if sequence {
                naming.to_physical_sequence(&logical).render()
            } else {
                naming.to_physical_table(&logical).render()
            }
        })
    };
    let settings = [
        ("sequence_name", physical(&generator.sequence_name, true)),
        ("table_name", physical(&generator.table, false)),
        ("schema", generator.schema.clone()),
        ("catalog", generator.catalog.clone()),
        ("initial_value", generator.initial_value.map(|v| v.to_string())),
        ("increment_size", generator.allocation_size.map(|v| v.to_string())),
    ];
    for (key, value) in settings {
        if let Some(value) = value {
            parameters.insert(key.to_string(), value);
        }
    }
    parameters.extend(
        generator
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    parameters
}

/// Generators declared on a class and its identifier property.
#[derive(Debug, Clone, Default)]
pub struct LocalGenerators {
    generators: HashMap<String, GeneratorAnnotation>,
}

impl LocalGenerators {
    /// Later declarations shadow earlier ones of the same name.
    pub fn new<'a>(declarations: impl IntoIterator<Item = &'a [GeneratorAnnotation]>) -> Self {
        let mut generators = HashMap::new();
        for scope in declarations {
            for generator in scope {
                generators.insert(generator.name.clone(), generator.clone());
            }
        }
        LocalGenerators { generators }
    }

    pub fn resolve<'a>(
        &'a self,
        name: &str,
        collector: &'a MetadataCollector,
    ) -> Option<&'a GeneratorAnnotation> {
        self.generators
            .get(name)
            .or_else(|| collector.global_generator(name))
    }
}

/// Build the generator spec of an identifier mapped to `columns` on `table`.
#[allow(clippy::too_many_arguments)]
pub fn make_id_generator(
    collector: &MetadataCollector,
    options: &BuildOptions,
    naming: &NamingResolver,
    locals: &LocalGenerators,
    generated: Option<&GeneratedValueAnnotation>,
    table: &Identifier,
    columns: &[Identifier],
    qualified: &str,
) -> BindingResult<IdentifierGeneratorSpec> {
    let derived = match generated {
        None => Some(ASSIGNED),
        Some(annotation) => annotation.strategy.map(strategy_for),
    };
    let mut spec = IdentifierGeneratorSpec::new(derived.unwrap_or(NATIVE));

    spec.parameters
        .insert(PARAM_TARGET_TABLE.to_string(), table.text().to_string());
    if let [column] = columns {
        spec.parameters
            .insert(PARAM_TARGET_COLUMN.to_string(), column.text().to_string());
    }
    if let Some(schema) = &options.default_schema {
        spec.parameters.insert("schema".to_string(), schema.clone());
    }
    if let Some(catalog) = &options.default_catalog {
        spec.parameters.insert("catalog".to_string(), catalog.clone());
    }

    let generator_name = generated
        .and_then(|g| g.generator.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty());
    if let Some(name) = generator_name {
        let generator = locals.resolve(name, collector).ok_or_else(|| {
            BindingError::annotation(
                qualified,
                format!("unknown named generator (@GeneratedValue#generator): '{}'", name),
            )
        })?;
        let named_strategy = generator_strategy(generator)?;
        let avoid_overriding = NOT_OVERRIDABLE.contains(&named_strategy.as_str());
        if derived.is_none() || !avoid_overriding {
            spec.strategy = named_strategy;
        }
        spec.name = Some(name.to_string());
        spec.parameters.extend(generator_parameters(naming, generator));
    }

    log::debug!(
        "Identifier generator of '{}': strategy '{}'{}",
        qualified,
        spec.strategy,
        spec.name
            .as_deref()
            .map(|n| format!(" (generator '{}')", n))
            .unwrap_or_default()
    );
    Ok(spec)
}

/// Null value marking an unsaved instance for the strategy.
pub fn null_value_for(strategy: &str) -> Option<&'static str> {
    (strategy == ASSIGNED).then_some("undefined")
}

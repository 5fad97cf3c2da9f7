//! Column descriptors.
//!
//! A [`ColumnDescriptor`] is built for every column (or formula) of a
//! property, populated from `@Column` annotations, holder overrides or
//! implicit defaults, then bound: binding materialises the physical column
//! on its table and records the `(table, logical name) -> physical name`
//! binding later passes use to resolve referenced columns.

use super::errors::{BindingError, BindingResult};
use super::holder::{HolderKind, PropertyHolder};
use crate::metadata::descriptors::{ColumnAnnotation, ColumnTransformer, PropertyAnnotations, PropertyDescriptor};
use crate::model::{Column, MetadataCollector, Selectable, TableId};
use crate::naming::{AttributePath, Identifier, NamingNature, NamingResolver};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Name before the physical transform; `None` for a formula.
    pub logical_name: Option<Identifier>,
    pub physical_name: Option<Identifier>,
    pub sql_type: Option<String>,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    pub unique: bool,
    pub insertable: bool,
    pub updatable: bool,
    pub default_value: Option<String>,
    pub generated_as: Option<String>,
    pub check_constraint: Option<String>,
    pub comment: Option<String>,
    pub read_expression: Option<String>,
    pub write_expression: Option<String>,
    pub formula: Option<String>,
    /// The name was inferred rather than given.
    pub is_implicit: bool,
    /// Secondary table named by the annotation.
    pub explicit_table: Option<String>,
}

impl ColumnDescriptor {
    pub(crate) fn empty() -> Self {
        ColumnDescriptor {
            logical_name: None,
            physical_name: None,
            sql_type: None,
            length: None,
            precision: None,
            scale: None,
            nullable: true,
            unique: false,
            insertable: true,
            updatable: true,
            default_value: None,
            generated_as: None,
            check_constraint: None,
            comment: None,
            read_expression: None,
            write_expression: None,
            formula: None,
            is_implicit: false,
            explicit_table: None,
        }
    }

    pub fn formula(expression: &str) -> Self {
        ColumnDescriptor {
            formula: Some(expression.to_string()),
            ..Self::empty()
        }
    }

    /// Column with an already physical name (copies made during second passes).
    pub fn physical(name: Identifier) -> Self {
        ColumnDescriptor {
            logical_name: Some(name.clone()),
            physical_name: Some(name),
            ..Self::empty()
        }
    }

    /// Implicitly named column for `path`.
    pub fn implicit(naming: &NamingResolver, path: &AttributePath, nature: &NamingNature<'_>) -> Self {
        let (logical, force_quote) = naming.logical_implicit_name(path, nature);
        let physical = naming.resolve_implicit(path, nature);
        ColumnDescriptor {
            logical_name: Some(logical.quoted_if(force_quote)),
            physical_name: Some(physical),
            is_implicit: true,
            ..Self::empty()
        }
    }

    /// Implicit name with a default suffix (`_ORDER`, `_KEY`, ...); such a
    /// name counts as assigned.
    pub fn suffixed(naming: &NamingResolver, logical: Identifier) -> Self {
        let physical = naming.to_physical_column(&logical);
        ColumnDescriptor {
            logical_name: Some(logical),
            physical_name: Some(physical),
            is_implicit: false,
            ..Self::empty()
        }
    }

    /// Column populated from an explicit annotation.
    pub fn from_annotation(
        naming: &NamingResolver,
        annotation: &ColumnAnnotation,
        path: &AttributePath,
        nature: &NamingNature<'_>,
    ) -> Self {
        let mut column = match annotation.name.as_deref().and_then(Identifier::to_identifier) {
            Some(logical) => ColumnDescriptor {
                physical_name: Some(naming.to_physical_column(&logical)),
                logical_name: Some(logical),
                ..Self::empty()
            },
            None => Self::implicit(naming, path, nature),
        };
        column.sql_type = annotation.column_definition.clone();
        column.length = annotation.length;
        column.precision = annotation.precision;
        column.scale = annotation.scale;
        column.nullable = annotation.nullable;
        column.unique = annotation.unique;
        column.insertable = annotation.insertable;
        column.updatable = annotation.updatable;
        column.comment = annotation.comment.clone();
        column.explicit_table = annotation
            .table
            .clone()
            .filter(|t| !t.trim().is_empty());
        column
    }

    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// Logical name used for transformer matching and diagnostics.
    pub fn display_name(&self) -> String {
        match (&self.logical_name, &self.formula) {
            (Some(name), _) => name.text().to_string(),
            (None, Some(formula)) => format!("formula({})", formula),
            (None, None) => String::new(),
        }
    }

    /// Materialise the column (or formula) on `table` and register its binding.
    pub fn bind(&self, collector: &mut MetadataCollector, table: TableId) -> BindingResult<Selectable> {
        if let Some(formula) = &self.formula {
            return Ok(Selectable::Formula(formula.clone()));
        }
        let (Some(logical), Some(physical)) = (&self.logical_name, &self.physical_name) else {
            return Err(BindingError::assertion(
                "column bound before its name was resolved",
            ));
        };
        let mut column = Column::new(physical.clone());
        column.sql_type = self.sql_type.clone();
        column.length = self.length;
        column.precision = self.precision;
        column.scale = self.scale;
        column.nullable = self.nullable;
        column.unique = self.unique;
        column.default_value = self.default_value.clone();
        column.generated_as = self.generated_as.clone();
        column.check_constraint = self.check_constraint.clone();
        column.comment = self.comment.clone();
        column.read_expression = self.read_expression.clone();
        column.write_expression = self.write_expression.clone();

        log::trace!(
            "Binding column '{}' -> '{}' on table '{}'",
            logical,
            physical,
            collector.table(table).name
        );
        collector.table_mut(table).add_column(column);
        collector.add_column_binding(table, logical, physical);
        Ok(Selectable::Column(physical.clone()))
    }
}

/// Build the column descriptors of a basic (or element) property.
///
/// `implicit_suffix` names the column `<implicit name><suffix>` when no
/// explicit column is given.
pub fn build_columns(
    naming: &NamingResolver,
    holder: &PropertyHolder,
    property: &PropertyDescriptor,
    implicit_suffix: Option<&str>,
) -> BindingResult<Vec<ColumnDescriptor>> {
    let qualified = holder.qualified_path(&property.name);
    let annotations = &property.annotations;

    if let Some(formula) = &annotations.formula {
        if !annotations.columns.is_empty() {
            return Err(BindingError::annotation(
                &qualified,
                "'@Formula' and '@Column' are mutually exclusive",
            ));
        }
        return Ok(vec![ColumnDescriptor::formula(formula)]);
    }

    let path = holder.property_path(&property.name);
    let nature = if holder.kind == HolderKind::CollectionElement || path.is_collection_element() {
        NamingNature::CollectionElementColumn
    } else {
        NamingNature::EntityColumn
    };

    let effective = effective_column_annotations(holder, &path, &annotations.columns, &qualified)?;

    let mut columns = match effective {
        Some(column_annotations) => column_annotations
            .iter()
            .map(|annotation| ColumnDescriptor::from_annotation(naming, annotation, &path, &nature))
            .collect(),
        None => match implicit_suffix {
            Some(suffix) => {
                let base = naming.implicit().determine_basic_column_name(&path);
                vec![ColumnDescriptor::suffixed(
                    naming,
                    Identifier::new(format!("{}{}", base.text(), suffix), base.is_quoted()),
                )]
            }
            None => vec![ColumnDescriptor::implicit(naming, &path, &nature)],
        },
    };

    if property.non_null {
        for column in &mut columns {
            column.nullable = false;
        }
    }

    apply_column_directives(annotations, &mut columns, &qualified)?;
    apply_transformers(&annotations.column_transformers, &mut columns, &qualified)?;
    Ok(columns)
}

/// Explicit annotations, or the holder's override of them.
///
/// An override must have as many columns as the annotation it replaces.
pub fn effective_column_annotations<'a>(
    holder: &'a PropertyHolder,
    path: &AttributePath,
    explicit: &'a [ColumnAnnotation],
    qualified: &str,
) -> BindingResult<Option<&'a [ColumnAnnotation]>> {
    match holder.overridden_columns(path) {
        Some(overridden) => {
            if !explicit.is_empty() && overridden.len() != explicit.len() {
                return Err(BindingError::annotation(
                    qualified,
                    format!(
                        "'@AttributeOverride' specifies {} columns but the property is mapped to {}",
                        overridden.len(),
                        explicit.len()
                    ),
                ));
            }
            Ok(Some(overridden))
        }
        None if explicit.is_empty() => Ok(None),
        None => Ok(Some(explicit)),
    }
}

/// Default value, generated-as and check directives; each is single-column only.
pub fn apply_column_directives(
    annotations: &PropertyAnnotations,
    columns: &mut [ColumnDescriptor],
    qualified: &str,
) -> BindingResult<()> {
    let directives = [
        ("@ColumnDefault", &annotations.column_default),
        ("@GeneratedColumn", &annotations.generated_as),
        ("@Check", &annotations.check),
    ];
    for (directive, value) in directives {
        if value.is_none() {
            continue;
        }
        if columns.len() != 1 {
            return Err(BindingError::annotation(
                qualified,
                format!("'{}' may only be applied to single-column mappings", directive),
            ));
        }
    }

    if let Some(column) = columns.first_mut() {
        if let Some(default) = &annotations.column_default {
            column.default_value = Some(default.clone());
        }
        if let Some(generated) = &annotations.generated_as {
            column.generated_as = Some(generated.clone());
        }
        if let Some(check) = &annotations.check {
            column.check_constraint = Some(check.clone());
        }
    }
    Ok(())
}

/// Attach read/write expressions; an unqualified transformer applies to every column.
pub fn apply_transformers(
    transformers: &[ColumnTransformer],
    columns: &mut [ColumnDescriptor],
    qualified: &str,
) -> BindingResult<()> {
    for transformer in transformers {
        if let Some(write) = &transformer.write {
            let placeholders = write.matches('?').count();
            if placeholders != 1 {
                return Err(BindingError::annotation(
                    qualified,
                    format!(
                        "write expression '{}' must contain exactly one value placeholder ('?'), found {}",
                        write, placeholders
                    ),
                ));
            }
        }

        let target = transformer
            .for_column
            .as_deref()
            .and_then(Identifier::to_identifier);
        let mut matched = false;
        for column in columns.iter_mut() {
            if column.is_formula() {
                continue;
            }
            let applies = match (&target, &column.logical_name) {
                (None, _) => true,
                (Some(target), Some(name)) => target.canonical_name() == name.canonical_name(),
                (Some(_), None) => false,
            };
            if applies {
                matched = true;
                if transformer.read.is_some() {
                    column.read_expression = transformer.read.clone();
                }
                if transformer.write.is_some() {
                    column.write_expression = transformer.write.clone();
                }
            }
        }
        if !matched {
            if let Some(target) = target {
                return Err(BindingError::annotation(
                    qualified,
                    format!("'@ColumnTransformer' refers to unknown column '{}'", target),
                ));
            }
        }
    }
    Ok(())
}

/// Reject a multi-column property whose columns disagree on nullability,
/// insertability, updatability or table.
pub fn check_property_consistency(columns: &[ColumnDescriptor], qualified: &str) -> BindingResult<()> {
    let Some(first) = columns.first() else {
        return Ok(());
    };
    let first_table = first.explicit_table.as_deref().map(str::to_lowercase);
    for column in &columns[1..] {
        if column.nullable != first.nullable {
            return Err(BindingError::annotation(
                qualified,
                "mixes nullable and non-nullable columns",
            ));
        }
        if column.insertable != first.insertable {
            return Err(BindingError::annotation(
                qualified,
                "mixes insertable and non-insertable columns",
            ));
        }
        if column.updatable != first.updatable {
            return Err(BindingError::annotation(
                qualified,
                "mixes updatable and non-updatable columns",
            ));
        }
        if column.explicit_table.as_deref().map(str::to_lowercase) != first_table {
            return Err(BindingError::annotation(
                qualified,
                "maps to columns of different tables",
            ));
        }
    }
    Ok(())
}

/// Resolve the table the columns go to and bind each of them.
pub fn bind_columns(
    collector: &mut MetadataCollector,
    holder: &PropertyHolder,
    columns: &[ColumnDescriptor],
    qualified: &str,
) -> BindingResult<(TableId, Vec<Selectable>)> {
    let explicit_table = columns.iter().find_map(|c| c.explicit_table.as_deref());
    let table = holder.table_for(explicit_table).ok_or_else(|| {
        BindingError::annotation(
            qualified,
            format!(
                "table '{}' is not the primary table or a secondary table of '{}'",
                explicit_table.unwrap_or_default(),
                holder.entity_name
            ),
        )
    })?;
    let selectables = columns
        .iter()
        .map(|column| column.bind(collector, table))
        .collect::<BindingResult<Vec<_>>>()?;
    Ok((table, selectables))
}

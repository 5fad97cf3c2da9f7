//! Join columns.
//!
//! Join columns are built in the first pass from `@JoinColumn` (or
//! `@PrimaryKeyJoinColumn`) annotations, possibly replaced by an enclosing
//! holder's association override, but they can only be *linked* once the
//! referenced key is known. Linking runs inside a second pass: implicit
//! names are derived from the referenced column, SQL types are copied from
//! it, and the columns are bound on the owning table.

use super::column::ColumnDescriptor;
use super::errors::{BindingError, BindingResult};
use super::holder::PropertyHolder;
use super::BuildContext;
use crate::metadata::descriptors::{JoinColumnAnnotation, PrimaryKeyJoinColumnAnnotation};
use crate::model::{Selectable, TableId};
use crate::naming::{AttributePath, Identifier, JoinColumnNature, NamingNature, NamingResolver};

#[derive(Debug, Clone, PartialEq)]
pub struct JoinColumnDescriptor {
    /// Column attributes; the name is only meaningful when `explicit_name` is set.
    pub column: ColumnDescriptor,
    pub explicit_name: Option<Identifier>,
    pub referenced_column_name: Option<Identifier>,
    pub foreign_key_name: Option<String>,
}

impl JoinColumnDescriptor {
    pub fn from_annotation(naming: &NamingResolver, annotation: &JoinColumnAnnotation) -> Self {
        let explicit_name = annotation
            .name
            .as_deref()
            .and_then(Identifier::to_identifier);
        let mut column = match &explicit_name {
            Some(logical) => {
                let mut column = ColumnDescriptor::physical(naming.to_physical_column(logical));
                column.logical_name = Some(logical.clone());
                column
            }
            None => ColumnDescriptor::empty(),
        };
        column.is_implicit = explicit_name.is_none();
        column.sql_type = annotation.column_definition.clone();
        column.nullable = annotation.nullable;
        column.unique = annotation.unique;
        column.insertable = annotation.insertable;
        column.updatable = annotation.updatable;
        column.explicit_table = annotation
            .table
            .clone()
            .filter(|t| !t.trim().is_empty());
        JoinColumnDescriptor {
            column,
            explicit_name,
            referenced_column_name: annotation
                .referenced_column_name
                .as_deref()
                .and_then(Identifier::to_identifier),
            foreign_key_name: annotation.foreign_key_name.clone(),
        }
    }

    fn implicit() -> Self {
        let mut column = ColumnDescriptor::empty();
        column.is_implicit = true;
        JoinColumnDescriptor {
            column,
            explicit_name: None,
            referenced_column_name: None,
            foreign_key_name: None,
        }
    }

    pub fn is_implicit(&self) -> bool {
        self.explicit_name.is_none()
    }
}

/// How implicit names of a join column set are derived.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinColumnOwner {
    /// Owning side: `<attribute>_<referenced column>` or `<entity>_<referenced column>`.
    Entity {
        kind: JoinColumnNature,
        entity_name: String,
    },
    /// Named after the other side's attribute.
    MappedBy { entity: String, property: String },
    /// Same name as the referenced primary key column.
    PrimaryKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinColumns {
    pub columns: Vec<JoinColumnDescriptor>,
    /// Attribute path used for implicit naming.
    pub path: AttributePath,
    /// `Entity.path`, for diagnostics.
    pub qualified: String,
    pub mapped_by: Option<String>,
    pub owner: JoinColumnOwner,
}

impl JoinColumns {
    /// Join columns of an association declared in `holder`.
    ///
    /// An association override of the holder replaces the annotations. No
    /// annotation yields a single implicit column that expands to the width
    /// of the referenced key when linked.
    pub fn build(
        naming: &NamingResolver,
        holder: &PropertyHolder,
        property_name: &str,
        annotations: &[JoinColumnAnnotation],
        mapped_by: Option<&str>,
        owner: JoinColumnOwner,
    ) -> BindingResult<Self> {
        let path = holder.property_path(property_name);
        let qualified = holder.qualified_path(property_name);
        let effective = holder.overridden_join_columns(&path).unwrap_or(annotations);
        let mapped_by = mapped_by.map(str::trim).filter(|m| !m.is_empty());

        if mapped_by.is_some() && !effective.is_empty() {
            return Err(BindingError::annotation(
                &qualified,
                "is 'mappedBy' another entity and may not specify the '@JoinColumn'",
            ));
        }

        Ok(JoinColumns {
            columns: Self::descriptors(naming, effective),
            path,
            qualified,
            mapped_by: mapped_by.map(str::to_string),
            owner,
        })
    }

    /// Join columns from explicit annotations, outside any holder.
    pub fn from_annotations(
        naming: &NamingResolver,
        path: AttributePath,
        qualified: &str,
        annotations: &[JoinColumnAnnotation],
        owner: JoinColumnOwner,
    ) -> Self {
        JoinColumns {
            columns: Self::descriptors(naming, annotations),
            path,
            qualified: qualified.to_string(),
            mapped_by: None,
            owner,
        }
    }

    /// Key columns of a joined subclass or secondary table.
    pub fn for_primary_key(
        naming: &NamingResolver,
        qualified: &str,
        annotations: &[PrimaryKeyJoinColumnAnnotation],
    ) -> Self {
        let converted: Vec<JoinColumnAnnotation> = annotations
            .iter()
            .map(|pk| JoinColumnAnnotation {
                name: pk.name.clone(),
                referenced_column_name: pk.referenced_column_name.clone(),
                column_definition: pk.column_definition.clone(),
                nullable: false,
                ..Default::default()
            })
            .collect();
        let mut columns = Self::from_annotations(
            naming,
            AttributePath::default(),
            qualified,
            &converted,
            JoinColumnOwner::PrimaryKey,
        );
        for descriptor in &mut columns.columns {
            descriptor.column.nullable = false;
        }
        columns
    }

    fn descriptors(
        naming: &NamingResolver,
        annotations: &[JoinColumnAnnotation],
    ) -> Vec<JoinColumnDescriptor> {
        if annotations.is_empty() {
            return vec![JoinColumnDescriptor::implicit()];
        }
        annotations
            .iter()
            .map(|annotation| JoinColumnDescriptor::from_annotation(naming, annotation))
            .collect()
    }

    /// No explicit name nor referenced column anywhere.
    pub fn is_implicit(&self) -> bool {
        self.columns
            .iter()
            .all(|c| c.is_implicit() && c.referenced_column_name.is_none())
    }

    pub fn referenced_names(&self) -> Vec<Option<Identifier>> {
        self.columns
            .iter()
            .map(|c| c.referenced_column_name.clone())
            .collect()
    }

    pub fn explicit_names(&self) -> Vec<Identifier> {
        self.columns
            .iter()
            .filter_map(|c| c.explicit_name.clone())
            .collect()
    }

    pub fn foreign_key_name(&self) -> Option<String> {
        self.columns.iter().find_map(|c| c.foreign_key_name.clone())
    }

    pub fn explicit_table(&self) -> Option<&str> {
        self.columns
            .iter()
            .find_map(|c| c.column.explicit_table.as_deref())
    }

    pub fn set_nullable(&mut self, nullable: bool) {
        for descriptor in &mut self.columns {
            descriptor.column.nullable = nullable;
        }
    }

    pub fn is_unique(&self) -> bool {
        self.columns.iter().any(|c| c.column.unique)
    }

    /// Bind the join columns on `table`, pairing them with `referenced_columns`
    /// (physical names on `referenced_table`) in order.
    ///
    /// Safe to call again for the same association: columns and bindings are
    /// deduplicated by the table.
    pub fn link(
        &self,
        ctx: &mut BuildContext,
        table: TableId,
        referenced_table: TableId,
        referenced_columns: &[Identifier],
    ) -> BindingResult<Vec<Selectable>> {
        let descriptors: Vec<&JoinColumnDescriptor> =
            if self.columns.len() == 1 && self.is_implicit() {
                vec![&self.columns[0]; referenced_columns.len()]
            } else {
                self.columns.iter().collect()
            };

        if descriptors.len() != referenced_columns.len() {
            return Err(BindingError::annotation(
                &self.qualified,
                format!(
                    "declares {} join column(s) but the referenced key has {} column(s)",
                    descriptors.len(),
                    referenced_columns.len()
                ),
            ));
        }

        let referenced_logical_table = ctx
            .collector
            .logical_table_name(referenced_table)
            .cloned()
            .unwrap_or_else(|| ctx.collector.table(referenced_table).name.clone());

        let mut selectables = Vec::with_capacity(descriptors.len());
        for (descriptor, referenced) in descriptors.into_iter().zip(referenced_columns) {
            let referenced_logical = ctx
                .collector
                .logical_column_name(referenced_table, referenced)
                .cloned()
                .unwrap_or_else(|| referenced.clone());

            let mut column = if descriptor.is_implicit() {
                let nature = self.nature(&referenced_logical_table, &referenced_logical);
                let mut implicit = ColumnDescriptor::implicit(&ctx.naming, &self.path, &nature);
                let template = &descriptor.column;
                implicit.sql_type = template.sql_type.clone();
                implicit.nullable = template.nullable;
                implicit.unique = template.unique;
                implicit.insertable = template.insertable;
                implicit.updatable = template.updatable;
                implicit.explicit_table = template.explicit_table.clone();
                implicit
            } else {
                descriptor.column.clone()
            };

            if let Some(source) = ctx.collector.table(referenced_table).get_column(referenced) {
                if column.sql_type.is_none() {
                    column.sql_type = source.sql_type.clone();
                }
                column.length = column.length.or(source.length);
                column.precision = column.precision.or(source.precision);
                column.scale = column.scale.or(source.scale);
            }
            selectables.push(column.bind(&mut ctx.collector, table)?);
        }
        Ok(selectables)
    }

    fn nature<'a>(
        &'a self,
        referenced_table: &'a Identifier,
        referenced_column: &'a Identifier,
    ) -> NamingNature<'a> {
        match &self.owner {
            JoinColumnOwner::Entity { kind, entity_name } => NamingNature::JoinColumn {
                kind: *kind,
                entity_name,
                referenced_table,
                referenced_column,
            },
            JoinColumnOwner::MappedBy { entity, property } => NamingNature::MappedByJoinColumn {
                mapped_by_entity: entity,
                mapped_by_property: property,
                mapped_by_table: referenced_table,
                referenced_column,
            },
            JoinColumnOwner::PrimaryKey => NamingNature::PrimaryKeyJoinColumn {
                referenced_table,
                referenced_column,
            },
        }
    }
}

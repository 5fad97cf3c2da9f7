//! Naming resolution: explicit names through the physical transform, implicit
//! names through the implicit policy and then the physical transform.

use super::identifier::{AttributePath, Identifier, NamingEnvironment};
use super::implicit::{ImplicitNamingStrategy, JoinColumnNature, NamingNature};
use super::physical::PhysicalNamingStrategy;

#[derive(Debug)]
pub struct NamingResolver {
    implicit: Box<dyn ImplicitNamingStrategy>,
    physical: Box<dyn PhysicalNamingStrategy>,
    environment: NamingEnvironment,
}

impl NamingResolver {
    pub fn new(
        implicit: Box<dyn ImplicitNamingStrategy>,
        physical: Box<dyn PhysicalNamingStrategy>,
        environment: NamingEnvironment,
    ) -> Self {
        NamingResolver {
            implicit,
            physical,
            environment,
        }
    }

    pub fn implicit(&self) -> &dyn ImplicitNamingStrategy {
        self.implicit.as_ref()
    }

    /// Resolve an implicit column name for the given structural nature.
    ///
    /// The physical transform is always applied. Quoting is contagious: a
    /// quoted referenced table or column forces the derived name quoted.
    pub fn resolve_implicit(&self, attribute_path: &AttributePath, nature: &NamingNature<'_>) -> Identifier {
        let (logical, force_quote) = self.logical_implicit_name(attribute_path, nature);
        log::trace!(
            "implicit name for '{}' ({:?}) -> '{}'",
            attribute_path,
            nature,
            logical
        );
        self.physical
            .to_physical_column_name(&logical, &self.environment)
            .quoted_if(force_quote)
    }

    /// Logical (pre-physical) implicit name and whether quoting is forced.
    pub fn logical_implicit_name(
        &self,
        attribute_path: &AttributePath,
        nature: &NamingNature<'_>,
    ) -> (Identifier, bool) {
        match nature {
            NamingNature::EntityColumn | NamingNature::CollectionElementColumn => (
                self.implicit.determine_basic_column_name(attribute_path),
                false,
            ),
            NamingNature::JoinColumn {
                kind,
                entity_name,
                referenced_table,
                referenced_column,
            } => (
                self.implicit.determine_join_column_name(
                    *kind,
                    entity_name,
                    attribute_path,
                    referenced_column,
                ),
                referenced_table.is_quoted() || referenced_column.is_quoted(),
            ),
            NamingNature::MappedByJoinColumn {
                mapped_by_entity,
                mapped_by_property,
                mapped_by_table,
                referenced_column,
            } => (
                self.implicit.determine_join_column_name(
                    JoinColumnNature::Entity,
                    mapped_by_entity,
                    &AttributePath::parse(mapped_by_property),
                    referenced_column,
                ),
                mapped_by_table.is_quoted() || referenced_column.is_quoted(),
            ),
            NamingNature::PrimaryKeyJoinColumn {
                referenced_table,
                referenced_column,
            } => (
                self.implicit
                    .determine_primary_key_join_column_name(referenced_table, referenced_column),
                referenced_table.is_quoted() || referenced_column.is_quoted(),
            ),
        }
    }

    /// Physical column name for an already logical identifier.
    pub fn to_physical_column(&self, logical: &Identifier) -> Identifier {
        self.physical
            .to_physical_column_name(logical, &self.environment)
    }

    pub fn to_physical_table(&self, logical: &Identifier) -> Identifier {
        self.physical.to_physical_table_name(logical, &self.environment)
    }

    pub fn to_physical_sequence(&self, logical: &Identifier) -> Identifier {
        self.physical
            .to_physical_sequence_name(logical, &self.environment)
    }

    /// Logical table name: explicit when given, otherwise derived from the entity name.
    pub fn logical_table_name(&self, explicit: Option<&str>, entity_name: &str) -> Identifier {
        explicit
            .and_then(Identifier::to_identifier)
            .unwrap_or_else(|| self.implicit.determine_primary_table_name(entity_name))
    }
}

//! Implicit naming: deriving a logical name from structural context when the
//! mapping does not give one.

use std::fmt;

use super::identifier::{AttributePath, Identifier};

/// Which kind of owning-side join column is being named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinColumnNature {
    /// To-one association, or the element side of a join table.
    Entity,
    /// Key of an element collection table pointing back at the owner.
    ElementCollection,
    /// Key of an entity collection's join table pointing back at the owner.
    EntityCollection,
}

/// Structural context of an implicit name request.
#[derive(Debug, Clone)]
pub enum NamingNature<'a> {
    EntityColumn,
    CollectionElementColumn,
    JoinColumn {
        kind: JoinColumnNature,
        entity_name: &'a str,
        referenced_table: &'a Identifier,
        referenced_column: &'a Identifier,
    },
    /// Inverse side: the name is derived from the owning side's property.
    MappedByJoinColumn {
        mapped_by_entity: &'a str,
        mapped_by_property: &'a str,
        mapped_by_table: &'a Identifier,
        referenced_column: &'a Identifier,
    },
    PrimaryKeyJoinColumn {
        referenced_table: &'a Identifier,
        referenced_column: &'a Identifier,
    },
}

pub trait ImplicitNamingStrategy: fmt::Debug + Send + Sync {
    fn determine_primary_table_name(&self, entity_name: &str) -> Identifier {
        Identifier::parse(unqualify(entity_name))
    }

    /// Join table of an entity collection: `<owner table>_<target table>`.
    fn determine_join_table_name(
        &self,
        owner_table: &Identifier,
        target_table: &Identifier,
    ) -> Identifier {
        Identifier::new(format!("{}_{}", owner_table.text(), target_table.text()), false)
    }

    /// Collection table of an element collection: `<owner entity>_<attribute>`.
    fn determine_collection_table_name(
        &self,
        owner_entity: &str,
        attribute_path: &AttributePath,
    ) -> Identifier {
        Identifier::new(
            format!(
                "{}_{}",
                unqualify(owner_entity),
                self.transform_attribute_path(attribute_path)
            ),
            false,
        )
    }

    fn determine_basic_column_name(&self, attribute_path: &AttributePath) -> Identifier {
        Identifier::new(self.transform_attribute_path(attribute_path), false)
    }

    fn determine_join_column_name(
        &self,
        kind: JoinColumnNature,
        entity_name: &str,
        attribute_path: &AttributePath,
        referenced_column: &Identifier,
    ) -> Identifier {
        let prefix = match kind {
            JoinColumnNature::ElementCollection | JoinColumnNature::EntityCollection => {
                unqualify(entity_name).to_string()
            }
            JoinColumnNature::Entity if attribute_path.is_empty() => {
                unqualify(entity_name).to_string()
            }
            JoinColumnNature::Entity => self.transform_attribute_path(attribute_path),
        };
        Identifier::new(format!("{}_{}", prefix, referenced_column.text()), false)
    }

    fn determine_primary_key_join_column_name(
        &self,
        _referenced_table: &Identifier,
        referenced_column: &Identifier,
    ) -> Identifier {
        Identifier::new(referenced_column.text(), false)
    }

    fn determine_discriminator_column_name(&self) -> Identifier {
        Identifier::new("DTYPE", false)
    }

    fn determine_list_index_column_name(&self, attribute_path: &AttributePath) -> Identifier {
        Identifier::new(
            format!("{}_ORDER", self.transform_attribute_path(attribute_path)),
            false,
        )
    }

    fn determine_map_key_column_name(&self, attribute_path: &AttributePath) -> Identifier {
        Identifier::new(
            format!("{}_KEY", self.transform_attribute_path(attribute_path)),
            false,
        )
    }

    fn determine_any_discriminator_column_name(
        &self,
        attribute_path: &AttributePath,
    ) -> Identifier {
        Identifier::new(
            format!("{}_type", self.transform_attribute_path(attribute_path)),
            false,
        )
    }

    fn determine_any_key_column_name(&self, attribute_path: &AttributePath) -> Identifier {
        Identifier::new(
            format!("{}_id", self.transform_attribute_path(attribute_path)),
            false,
        )
    }

    fn transform_attribute_path(&self, attribute_path: &AttributePath) -> String;
}

/// JPA-compliant naming: columns are named after the attribute alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpaCompliantNaming;

impl ImplicitNamingStrategy for JpaCompliantNaming {
    fn transform_attribute_path(&self, attribute_path: &AttributePath) -> String {
        attribute_path
            .naming_parts()
            .last()
            .map(|s| s.to_string())
            .unwrap_or_default()
    }
}

/// Component-safe naming: the whole attribute path joined with `_`, so two
/// embeddables of the same type do not collide.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComponentPathNaming;

impl ImplicitNamingStrategy for ComponentPathNaming {
    fn transform_attribute_path(&self, attribute_path: &AttributePath) -> String {
        attribute_path.naming_parts().join("_")
    }
}

/// Strip a package qualifier: `com.acme.Order` -> `Order`.
pub fn unqualify(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

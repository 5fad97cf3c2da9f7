//! Physical naming: mapping a logical name to the stored identifier.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use super::identifier::{Identifier, NamingEnvironment};

lazy_static! {
    static ref CAMEL_BOUNDARY: Regex = Regex::new(r"([a-z0-9])([A-Z])").unwrap();
    static ref ACRONYM_BOUNDARY: Regex = Regex::new(r"([A-Z]+)([A-Z][a-z])").unwrap();
}

pub trait PhysicalNamingStrategy: fmt::Debug + Send + Sync {
    fn to_physical_table_name(&self, name: &Identifier, env: &NamingEnvironment) -> Identifier;

    fn to_physical_column_name(&self, name: &Identifier, env: &NamingEnvironment)
        -> Identifier;

    fn to_physical_sequence_name(
        &self,
        name: &Identifier,
        env: &NamingEnvironment,
    ) -> Identifier {
        self.to_physical_table_name(name, env)
    }
}

/// Logical names are stored as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityPhysicalNaming;

impl PhysicalNamingStrategy for IdentityPhysicalNaming {
    fn to_physical_table_name(&self, name: &Identifier, env: &NamingEnvironment) -> Identifier {
        env.normalize(name.clone())
    }

    fn to_physical_column_name(
        &self,
        name: &Identifier,
        env: &NamingEnvironment,
    ) -> Identifier {
        env.normalize(name.clone())
    }
}

/// camelCase and dotted names become lower snake_case; quoted names are left alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnakeCasePhysicalNaming;

impl SnakeCasePhysicalNaming {
    fn apply(&self, name: &Identifier, env: &NamingEnvironment) -> Identifier {
        if name.is_quoted() {
            return name.clone();
        }
        env.normalize(Identifier::new(to_snake_case(name.text()), false))
    }
}

impl PhysicalNamingStrategy for SnakeCasePhysicalNaming {
    fn to_physical_table_name(&self, name: &Identifier, env: &NamingEnvironment) -> Identifier {
        self.apply(name, env)
    }

    fn to_physical_column_name(
        &self,
        name: &Identifier,
        env: &NamingEnvironment,
    ) -> Identifier {
        self.apply(name, env)
    }
}

/// Convert `customerId` / `HTTPStatus` / `line.item` to `customer_id` / `http_status` / `line_item`.
pub fn to_snake_case(name: &str) -> String {
    let dotted = name.replace('.', "_");
    let split = ACRONYM_BOUNDARY.replace_all(&dotted, "${1}_${2}");
    let split = CAMEL_BOUNDARY.replace_all(&split, "${1}_${2}");
    split.to_lowercase()
}

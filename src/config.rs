use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::naming::{
    ComponentPathNaming, IdentityPhysicalNaming, ImplicitNamingStrategy, JpaCompliantNaming,
    NamingEnvironment, NamingResolver, PhysicalNamingStrategy, SnakeCasePhysicalNaming,
};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

#[derive(Error, Debug)]
#[error("unknown naming strategy '{0}'")]
pub struct UnknownStrategy(String);

/// Implicit naming policy selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImplicitNamingKind {
    #[default]
    Jpa,
    ComponentPath,
}

impl FromStr for ImplicitNamingKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpa" | "default" => Ok(ImplicitNamingKind::Jpa),
            "component-path" | "component_path" => Ok(ImplicitNamingKind::ComponentPath),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// Physical naming policy selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhysicalNamingKind {
    #[default]
    Identity,
    SnakeCase,
}

impl FromStr for PhysicalNamingKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "identity" => Ok(PhysicalNamingKind::Identity),
            "snake-case" | "snake_case" => Ok(PhysicalNamingKind::SnakeCase),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// Building-time options with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// How logical names are derived when the mapping gives none
    pub implicit_naming_strategy: ImplicitNamingKind,

    /// How logical names are turned into stored identifiers
    pub physical_naming_strategy: PhysicalNamingKind,

    /// Quote every table and column identifier
    pub globally_quoted_identifiers: bool,

    /// Schema injected into tables and generator parameters that do not name one
    #[validate(length(min = 1, message = "Default schema cannot be empty"))]
    pub default_schema: Option<String>,

    /// Catalog injected into tables and generator parameters that do not name one
    #[validate(length(min = 1, message = "Default catalog cannot be empty"))]
    pub default_catalog: Option<String>,

    /// Create a discriminator column for JOINED hierarchies even without `@DiscriminatorColumn`
    pub implicit_discriminator_columns_for_joined: bool,

    /// Ignore `@DiscriminatorColumn` on JOINED hierarchies
    pub ignore_explicit_discriminator_columns_for_joined: bool,

    /// Legacy id-column aliasing for to-one associations
    pub specj_proprietary_syntax: bool,

    /// Apply an entity's `@Where` to collections of that entity
    pub use_entity_where_clause_for_collections: bool,

    /// Extra drain passes granted to recoverable second-pass failures
    #[validate(range(
        min = 1,
        max = 8,
        message = "Max recovery passes must be between 1 and 8"
    ))]
    pub max_recovery_passes: u8,

    /// Extra reserved words that are always quoted
    #[validate(custom(function = "validate_keywords"))]
    pub keywords: Vec<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            implicit_naming_strategy: ImplicitNamingKind::Jpa,
            physical_naming_strategy: PhysicalNamingKind::Identity,
            globally_quoted_identifiers: false,
            default_schema: None,
            default_catalog: None,
            implicit_discriminator_columns_for_joined: false,
            ignore_explicit_discriminator_columns_for_joined: false,
            specj_proprietary_syntax: false,
            use_entity_where_clause_for_collections: true,
            max_recovery_passes: 1,
            keywords: Vec::new(),
        }
    }
}

impl BuildOptions {
    /// Create options from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let options = Self {
            implicit_naming_strategy: parse_env_var("MAPBIND_IMPLICIT_NAMING", "jpa")?,
            physical_naming_strategy: parse_env_var("MAPBIND_PHYSICAL_NAMING", "identity")?,
            globally_quoted_identifiers: parse_env_var("MAPBIND_GLOBALLY_QUOTED", "false")?,
            default_schema: optional_env_var("MAPBIND_DEFAULT_SCHEMA"),
            default_catalog: optional_env_var("MAPBIND_DEFAULT_CATALOG"),
            implicit_discriminator_columns_for_joined: parse_env_var(
                "MAPBIND_IMPLICIT_DISCRIMINATOR_FOR_JOINED",
                "false",
            )?,
            ignore_explicit_discriminator_columns_for_joined: parse_env_var(
                "MAPBIND_IGNORE_DISCRIMINATOR_FOR_JOINED",
                "false",
            )?,
            specj_proprietary_syntax: parse_env_var("MAPBIND_SPECJ_SYNTAX", "false")?,
            use_entity_where_clause_for_collections: parse_env_var(
                "MAPBIND_ENTITY_WHERE_FOR_COLLECTIONS",
                "true",
            )?,
            max_recovery_passes: parse_env_var("MAPBIND_MAX_RECOVERY_PASSES", "1")?,
            keywords: optional_env_var("MAPBIND_KEYWORDS")
                .map(|list| {
                    list.split(',')
                        .map(|k| k.trim().to_string())
                        .filter(|k| !k.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };

        options.validate()?;
        Ok(options)
    }

    /// Create options from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let options: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        options.validate()?;
        Ok(options)
    }

    /// Naming resolver for the selected strategy pair
    pub fn naming_resolver(&self) -> NamingResolver {
        let implicit: Box<dyn ImplicitNamingStrategy> = match self.implicit_naming_strategy {
            ImplicitNamingKind::Jpa => Box::new(JpaCompliantNaming),
            ImplicitNamingKind::ComponentPath => Box::new(ComponentPathNaming),
        };
        let physical: Box<dyn PhysicalNamingStrategy> = match self.physical_naming_strategy {
            PhysicalNamingKind::Identity => Box::new(IdentityPhysicalNaming),
            PhysicalNamingKind::SnakeCase => Box::new(SnakeCasePhysicalNaming),
        };
        NamingResolver::new(
            implicit,
            physical,
            NamingEnvironment::new(self.globally_quoted_identifiers, &self.keywords),
        )
    }
}

fn validate_keywords(keywords: &[String]) -> Result<(), ValidationError> {
    if keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(ValidationError::new("blank_keyword"));
    }
    Ok(())
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

fn optional_env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

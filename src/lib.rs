//! MapBind - annotation metadata binder for object/relational mappings
//!
//! This crate turns declarative class descriptors into a resolved mapping model through:
//! - Hierarchy ordering and inheritance state resolution
//! - Implicit and physical naming of tables and columns
//! - First-pass binding of entities, identifiers, components and associations
//! - Deferred second passes for foreign keys, keys and collection tables
//! - Synthetic properties for associations referencing non-primary-key columns

pub mod binder;
pub mod config;
pub mod metadata;
pub mod model;
pub mod naming;

pub use binder::bind;
pub use binder::errors::{BindingError, BindingResult};
pub use config::{BuildOptions, ConfigError};
pub use metadata::{ClassDescriptor, MetadataSource, PropertyDescriptor};
pub use model::MappingModel;

//! # Naming
//!
//! Two-stage naming of tables and columns:
//!
//! 1. **Implicit naming** derives a logical name from structural context
//!    (attribute path, referenced table/column, collection role) when the
//!    mapping gives none.
//! 2. **Physical naming** maps every logical name, explicit or implicit, to
//!    the identifier actually stored.
//!
//! Both policies are pluggable; [`NamingResolver`] combines a pair of them
//! with the quoting rules of the target environment.

pub mod identifier;
pub mod implicit;
pub mod physical;
pub mod resolver;

pub use identifier::{AttributePath, Identifier, NamingEnvironment, COLLECTION_ELEMENT_MARKER};
pub use implicit::{
    ComponentPathNaming, ImplicitNamingStrategy, JoinColumnNature, JpaCompliantNaming,
    NamingNature,
};
pub use physical::{IdentityPhysicalNaming, PhysicalNamingStrategy, SnakeCasePhysicalNaming};
pub use resolver::NamingResolver;

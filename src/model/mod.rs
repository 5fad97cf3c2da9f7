//! Output mapping model: tables, values, entities and the collector that
//! owns them while a build is in progress.

pub mod collector;
pub mod entity;
pub mod table;
pub mod value;

pub use collector::{MappingModel, MetadataCollector, PropertyReference, UniqueKeyHolder};
pub use entity::{EntityId, EntityKind, Join, PersistentEntity};
pub use table::{Column, ForeignKey, Index, PrimaryKey, Table, TableId, UniqueKey};
pub use value::{
    AnyValue, CollectionElementKind, CollectionFilter, CollectionValue, ComponentValue, FetchStyle,
    IdentifierGeneratorSpec, Property, Selectable, ToOneKind, ToOneValue, Value, ValueId,
    ValueKind,
};

//! Class and property descriptors with their structural annotations.
//!
//! These are the input of the binder. They mirror what an annotation reader
//! would extract from source classes and are immutable once read. Every
//! annotation field is optional or defaulted so descriptors can be written
//! tersely in YAML:
//!
//! ```yaml
//! classes:
//!   - name: com.acme.Order
//!     properties:
//!       - name: id
//!         type_name: Long
//!         id: true
//!         generated_value: { strategy: IDENTITY }
//!       - name: customer
//!         type_name: com.acme.Customer
//!         many_to_one: {}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::naming::implicit::unqualify;

fn default_true() -> bool {
    true
}

fn default_discriminator_length() -> u32 {
    31
}

fn default_meta_type() -> String {
    "string".to_string()
}

fn default_id_type() -> String {
    "long".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    #[default]
    Entity,
    MappedSuperclass,
    Embeddable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InheritanceType {
    SingleTable,
    Joined,
    TablePerClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    #[default]
    Field,
    Property,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableAnnotation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub unique_constraints: Vec<UniqueConstraintAnnotation>,
    #[serde(default)]
    pub indexes: Vec<IndexAnnotation>,
    #[serde(default)]
    pub check: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniqueConstraintAnnotation {
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexAnnotation {
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryTableAnnotation {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub pk_join_columns: Vec<PrimaryKeyJoinColumnAnnotation>,
    /// Rows in the secondary table may be absent (outer join).
    #[serde(default = "default_true")]
    pub optional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKeyJoinColumnAnnotation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub referenced_column_name: Option<String>,
    #[serde(default)]
    pub column_definition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscriminatorType {
    #[default]
    String,
    Char,
    Integer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscriminatorColumnAnnotation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub discriminator_type: DiscriminatorType,
    #[serde(default = "default_discriminator_length")]
    pub length: u32,
    #[serde(default)]
    pub column_definition: Option<String>,
}

impl Default for DiscriminatorColumnAnnotation {
    fn default() -> Self {
        DiscriminatorColumnAnnotation {
            name: None,
            discriminator_type: DiscriminatorType::String,
            length: default_discriminator_length(),
            column_definition: None,
        }
    }
}

/// `@Column`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnAnnotation {
    #[serde(default)]
    pub name: Option<String>,
    /// Secondary table holding the column; primary table when absent.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub column_definition: Option<String>,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default = "default_true")]
    pub insertable: bool,
    #[serde(default = "default_true")]
    pub updatable: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Default for ColumnAnnotation {
    fn default() -> Self {
        ColumnAnnotation {
            name: None,
            table: None,
            column_definition: None,
            length: None,
            precision: None,
            scale: None,
            nullable: true,
            unique: false,
            insertable: true,
            updatable: true,
            comment: None,
        }
    }
}

impl ColumnAnnotation {
    pub fn named(name: &str) -> Self {
        ColumnAnnotation {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

/// `@JoinColumn`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinColumnAnnotation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub referenced_column_name: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub column_definition: Option<String>,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default = "default_true")]
    pub insertable: bool,
    #[serde(default = "default_true")]
    pub updatable: bool,
    #[serde(default)]
    pub foreign_key_name: Option<String>,
}

impl Default for JoinColumnAnnotation {
    fn default() -> Self {
        JoinColumnAnnotation {
            name: None,
            referenced_column_name: None,
            table: None,
            column_definition: None,
            nullable: true,
            unique: false,
            insertable: true,
            updatable: true,
            foreign_key_name: None,
        }
    }
}

impl JoinColumnAnnotation {
    pub fn referencing(name: Option<&str>, referenced_column_name: &str) -> Self {
        JoinColumnAnnotation {
            name: name.map(str::to_string),
            referenced_column_name: Some(referenced_column_name.to_string()),
            ..Default::default()
        }
    }
}

/// `@JoinTable` / `@CollectionTable`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinTableAnnotation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub join_columns: Vec<JoinColumnAnnotation>,
    #[serde(default)]
    pub inverse_join_columns: Vec<JoinColumnAnnotation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationType {
    #[default]
    Auto,
    Identity,
    Sequence,
    Table,
}

/// `@GeneratedValue`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedValueAnnotation {
    #[serde(default)]
    pub strategy: Option<GenerationType>,
    #[serde(default)]
    pub generator: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    Sequence,
    Table,
    Generic,
}

/// `@SequenceGenerator` / `@TableGenerator` / `@GenericGenerator`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorAnnotation {
    pub name: String,
    pub kind: GeneratorKind,
    /// Strategy of a generic generator; implied by `kind` otherwise.
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub sequence_name: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub initial_value: Option<u32>,
    #[serde(default)]
    pub allocation_size: Option<u32>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CascadeType {
    All,
    Persist,
    Merge,
    Remove,
    Refresh,
    Detach,
}

/// Vendor cascade styles, a superset of the JPA ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VendorCascade {
    All,
    SaveUpdate,
    Persist,
    Merge,
    Delete,
    Lock,
    Replicate,
    Evict,
    Refresh,
    Detach,
    DeleteOrphan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchType {
    Eager,
    Lazy,
}

/// Vendor `@Fetch`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchMode {
    Join,
    Select,
    Subselect,
}

/// `@ManyToOne` / `@OneToOne`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToOneAnnotation {
    #[serde(default)]
    pub target_entity: Option<String>,
    #[serde(default)]
    pub cascade: Vec<CascadeType>,
    #[serde(default)]
    pub fetch: Option<FetchType>,
    #[serde(default = "default_true")]
    pub optional: bool,
    /// Only meaningful on `@OneToOne`.
    #[serde(default)]
    pub mapped_by: Option<String>,
    #[serde(default)]
    pub orphan_removal: bool,
}

impl Default for ToOneAnnotation {
    fn default() -> Self {
        ToOneAnnotation {
            target_entity: None,
            cascade: Vec::new(),
            fetch: None,
            optional: true,
            mapped_by: None,
            orphan_removal: false,
        }
    }
}

/// `@OneToMany` / `@ManyToMany`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionAnnotation {
    #[serde(default)]
    pub target_entity: Option<String>,
    #[serde(default)]
    pub cascade: Vec<CascadeType>,
    #[serde(default)]
    pub fetch: Option<FetchType>,
    #[serde(default)]
    pub mapped_by: Option<String>,
    #[serde(default)]
    pub orphan_removal: bool,
}

/// `@ElementCollection`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementCollectionAnnotation {
    #[serde(default)]
    pub target_class: Option<String>,
    #[serde(default)]
    pub fetch: Option<FetchType>,
}

/// `@Any` / `@ManyToAny`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyAnnotation {
    #[serde(default = "default_meta_type")]
    pub meta_type: String,
    #[serde(default = "default_id_type")]
    pub id_type: String,
    #[serde(default)]
    pub meta_column: Option<ColumnAnnotation>,
    /// Discriminator value -> entity name.
    #[serde(default)]
    pub meta_values: BTreeMap<String, String>,
    #[serde(default)]
    pub fetch: Option<FetchType>,
    #[serde(default = "default_true")]
    pub optional: bool,
}

impl Default for AnyAnnotation {
    fn default() -> Self {
        AnyAnnotation {
            meta_type: default_meta_type(),
            id_type: default_id_type(),
            meta_column: None,
            meta_values: BTreeMap::new(),
            fetch: None,
            optional: true,
        }
    }
}

/// `@AttributeOverride`: `name` is a dotted path relative to the annotated holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeOverride {
    pub name: String,
    pub columns: Vec<ColumnAnnotation>,
}

/// `@AssociationOverride`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationOverride {
    pub name: String,
    #[serde(default)]
    pub join_columns: Vec<JoinColumnAnnotation>,
    #[serde(default)]
    pub join_table: Option<JoinTableAnnotation>,
}

/// `@ColumnTransformer`; without `for_column` it applies to every column of the property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    #[serde(default)]
    pub for_column: Option<String>,
    #[serde(default)]
    pub read: Option<String>,
    #[serde(default)]
    pub write: Option<String>,
}

/// `@CollectionId` for identifier bags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionIdAnnotation {
    #[serde(default)]
    pub column: Option<ColumnAnnotation>,
    pub generator: String,
    #[serde(default = "default_id_type")]
    pub type_name: String,
}

/// `@Filter` / `@FilterJoinTable`. Without a condition the filter
/// definition's default condition applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterAnnotation {
    pub name: String,
    #[serde(default)]
    pub condition: Option<String>,
}

/// `@FilterDef`: a named filter with an optional default condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub name: String,
    #[serde(default)]
    pub default_condition: Option<String>,
}

/// Property-level index or unique-key directive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyDirective {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unique: bool,
    /// Materialize on the table right away instead of after the second passes.
    #[serde(default)]
    pub immediate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnDeleteAction {
    NoAction,
    Cascade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionShape {
    Set,
    Bag,
    List,
    Map,
    IdBag,
}

/// Every structural annotation a property can carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyAnnotations {
    pub id: bool,
    pub embedded_id: bool,
    pub version: bool,
    pub generated_value: Option<GeneratedValueAnnotation>,
    pub generators: Vec<GeneratorAnnotation>,
    pub columns: Vec<ColumnAnnotation>,
    pub formula: Option<String>,
    pub join_columns: Vec<JoinColumnAnnotation>,
    pub primary_key_join_columns: Vec<PrimaryKeyJoinColumnAnnotation>,
    pub join_table: Option<JoinTableAnnotation>,
    pub many_to_one: Option<ToOneAnnotation>,
    pub one_to_one: Option<ToOneAnnotation>,
    pub one_to_many: Option<CollectionAnnotation>,
    pub many_to_many: Option<CollectionAnnotation>,
    pub element_collection: Option<ElementCollectionAnnotation>,
    pub any: Option<AnyAnnotation>,
    pub many_to_any: Option<AnyAnnotation>,
    pub embedded: bool,
    pub attribute_overrides: Vec<AttributeOverride>,
    pub association_overrides: Vec<AssociationOverride>,
    pub cascade: Vec<VendorCascade>,
    pub fetch_mode: Option<FetchMode>,
    pub order_column: Option<ColumnAnnotation>,
    pub map_key_column: Option<ColumnAnnotation>,
    pub collection_id: Option<CollectionIdAnnotation>,
    pub column_default: Option<String>,
    pub generated_as: Option<String>,
    pub check: Option<String>,
    pub column_transformers: Vec<ColumnTransformer>,
    pub index: Option<KeyDirective>,
    pub natural_id: bool,
    pub transient: bool,
    pub lazy: bool,
    pub optional: Option<bool>,
    pub on_delete: Option<OnDeleteAction>,
    pub filters: Vec<FilterAnnotation>,
    pub filter_join_tables: Vec<FilterAnnotation>,
    /// `@Where` on the collection.
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    pub where_join_table: Option<String>,
    /// JPA `@OrderBy`, a property-based fragment.
    pub order_by: Option<String>,
    /// Vendor `@OrderBy`, a raw SQL clause.
    pub sql_order_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    /// Declared type: a basic type name, or the class of an embeddable / associated entity.
    pub type_name: String,
    /// Language-level non-null hint (primitive type or non-null marker).
    #[serde(default)]
    pub non_null: bool,
    #[serde(default)]
    pub collection: Option<CollectionShape>,
    #[serde(default)]
    pub element_type: Option<String>,
    #[serde(default)]
    pub map_key_type: Option<String>,
    #[serde(default, flatten)]
    pub annotations: PropertyAnnotations,
}

impl PropertyDescriptor {
    pub fn new(name: &str, type_name: &str) -> Self {
        PropertyDescriptor {
            name: name.to_string(),
            type_name: type_name.to_string(),
            non_null: false,
            collection: None,
            element_type: None,
            map_key_type: None,
            annotations: PropertyAnnotations::default(),
        }
    }

    pub fn with(mut self, annotations: PropertyAnnotations) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn is_identifier(&self) -> bool {
        self.annotations.id || self.annotations.embedded_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    /// Fully qualified class name.
    pub name: String,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default)]
    pub entity_name: Option<String>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub access: AccessType,
    #[serde(default)]
    pub table: Option<TableAnnotation>,
    #[serde(default)]
    pub secondary_tables: Vec<SecondaryTableAnnotation>,
    #[serde(default)]
    pub inheritance: Option<InheritanceType>,
    #[serde(default)]
    pub discriminator_column: Option<DiscriminatorColumnAnnotation>,
    #[serde(default)]
    pub discriminator_value: Option<String>,
    #[serde(default)]
    pub primary_key_join_columns: Vec<PrimaryKeyJoinColumnAnnotation>,
    #[serde(default)]
    pub id_class: Option<String>,
    #[serde(default)]
    pub attribute_overrides: Vec<AttributeOverride>,
    #[serde(default)]
    pub association_overrides: Vec<AssociationOverride>,
    #[serde(default)]
    pub generators: Vec<GeneratorAnnotation>,
    #[serde(default)]
    pub on_delete: Option<OnDeleteAction>,
    /// `@Where` on the entity; also restricts collections of this entity.
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
}

impl ClassDescriptor {
    pub fn new(name: &str, kind: ClassKind) -> Self {
        ClassDescriptor {
            name: name.to_string(),
            superclass: None,
            kind,
            entity_name: None,
            is_abstract: false,
            access: AccessType::Field,
            table: None,
            secondary_tables: Vec::new(),
            inheritance: None,
            discriminator_column: None,
            discriminator_value: None,
            primary_key_join_columns: Vec::new(),
            id_class: None,
            attribute_overrides: Vec::new(),
            association_overrides: Vec::new(),
            generators: Vec::new(),
            on_delete: None,
            where_clause: None,
            properties: Vec::new(),
        }
    }

    pub fn entity(name: &str) -> Self {
        Self::new(name, ClassKind::Entity)
    }

    pub fn extending(mut self, superclass: &str) -> Self {
        self.superclass = Some(superclass.to_string());
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Entity name: explicit `@Entity(name)` or the unqualified class name.
    pub fn entity_name(&self) -> String {
        self.entity_name
            .clone()
            .unwrap_or_else(|| unqualify(&self.name).to_string())
    }

    pub fn is_entity(&self) -> bool {
        self.kind == ClassKind::Entity
    }

    pub fn get_property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }
}

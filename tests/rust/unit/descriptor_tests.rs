//! Unit tests for descriptor parsing and source loading
//!
//! Descriptors are plain serde structures; these tests pin the YAML/JSON
//! shape accepted by the loader.

#[cfg(test)]
mod descriptor_tests {
    use std::io::Write;

    use mapbind::metadata::descriptors::{
        CollectionShape, GenerationType, GeneratorKind, InheritanceType,
    };
    use mapbind::metadata::order_hierarchically;
    use mapbind::{BindingError, ClassDescriptor, MetadataSource, PropertyDescriptor};

    #[test]
    fn test_class_descriptor_defaults() {
        let yaml = r#"
name: com.acme.Order
properties:
  - name: id
    type_name: Long
    id: true
"#;
        let class: ClassDescriptor = serde_yaml::from_str(yaml).expect("descriptor should parse");
        assert!(class.is_entity());
        assert_eq!(class.entity_name(), "Order");
        assert!(class.superclass.is_none());
        assert!(class.inheritance.is_none());
        assert!(class.table.is_none());

        let id = class.get_property("id").unwrap();
        assert!(id.is_identifier());
        assert!(id.annotations.columns.is_empty());
        assert!(id.collection.is_none());
    }

    #[test]
    fn test_explicit_entity_name() {
        let yaml = r#"
name: com.acme.PurchaseOrder
entity_name: Order
inheritance: JOINED
"#;
        let class: ClassDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(class.entity_name(), "Order");
        assert_eq!(class.inheritance, Some(InheritanceType::Joined));
    }

    #[test]
    fn test_property_annotations_flattened() {
        let yaml = r#"
name: lines
type_name: List
collection: list
element_type: OrderLine
one_to_many:
  mapped_by: order
  orphan_removal: true
order_column:
  name: position
"#;
        let property: PropertyDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(property.collection, Some(CollectionShape::List));
        let one_to_many = property.annotations.one_to_many.as_ref().unwrap();
        assert_eq!(one_to_many.mapped_by.as_deref(), Some("order"));
        assert!(one_to_many.orphan_removal);
        let order_column = property.annotations.order_column.as_ref().unwrap();
        assert_eq!(order_column.name.as_deref(), Some("position"));
        assert!(order_column.nullable);
    }

    #[test]
    fn test_collection_restrictions_parse() {
        let yaml = r#"
name: courses
type_name: Set
collection: set
element_type: Course
many_to_many: {}
filters:
  - name: open
filter_join_tables:
  - name: current
    condition: "term = :term"
where: "level > 1"
order_by: desc
"#;
        let property: PropertyDescriptor = serde_yaml::from_str(yaml).unwrap();
        let annotations = &property.annotations;
        assert_eq!(annotations.filters[0].name, "open");
        assert!(annotations.filters[0].condition.is_none());
        assert_eq!(annotations.filter_join_tables[0].condition.as_deref(), Some("term = :term"));
        assert_eq!(annotations.where_clause.as_deref(), Some("level > 1"));
        assert_eq!(annotations.order_by.as_deref(), Some("desc"));
        assert!(annotations.sql_order_by.is_none());
    }

    #[test]
    fn test_generator_descriptors() {
        let yaml = r#"
name: id
type_name: Long
id: true
generated_value:
  strategy: TABLE
  generator: hilo
generators:
  - name: hilo
    kind: table
    table: id_blocks
    allocation_size: 10
"#;
        let property: PropertyDescriptor = serde_yaml::from_str(yaml).unwrap();
        let generated = property.annotations.generated_value.as_ref().unwrap();
        assert_eq!(generated.strategy, Some(GenerationType::Table));
        let generator = &property.annotations.generators[0];
        assert_eq!(generator.kind, GeneratorKind::Table);
        assert_eq!(generator.table.as_deref(), Some("id_blocks"));
        assert_eq!(generator.allocation_size, Some(10));
    }

    #[test]
    fn test_source_from_json() {
        let json = r#"{
            "classes": [
                {"name": "Tag", "properties": [{"name": "code", "type_name": "String", "id": true}]}
            ]
        }"#;
        let source = MetadataSource::from_json_str(json).expect("json source should load");
        assert_eq!(source.classes.len(), 1);
        assert!(source.generators.is_empty());
        assert!(source.filter_definitions.is_empty());
    }

    #[test]
    fn test_source_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "classes:\n  - name: Tag\n    properties:\n      - name: code\n        type_name: String\n        id: true"
        )
        .unwrap();

        let source = MetadataSource::from_yaml_file(file.path()).expect("file should load");
        assert_eq!(source.classes[0].name, "Tag");
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let err = MetadataSource::from_yaml_file("/nonexistent/mapping.yaml").unwrap_err();
        assert!(matches!(err, BindingError::SourceReadError { .. }));
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        let err = MetadataSource::from_yaml_str("classes: [name: ").unwrap_err();
        assert!(matches!(err, BindingError::SourceParseError { .. }));
    }

    #[test]
    fn test_duplicate_class_rejected() {
        let yaml = "classes:\n  - name: Tag\n  - name: Tag\n";
        let err = MetadataSource::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate class descriptor"));
    }

    #[test]
    fn test_hierarchy_ordering_keeps_unrelated_order() {
        let classes = vec![
            ClassDescriptor::entity("SportsCar").extending("Car"),
            ClassDescriptor::entity("Invoice"),
            ClassDescriptor::entity("Car").extending("Vehicle"),
            ClassDescriptor::entity("Vehicle"),
        ];
        let ordered = order_hierarchically(&classes).unwrap();
        let names: Vec<&str> = ordered.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Vehicle", "Car", "SportsCar", "Invoice"]);
    }

    #[test]
    fn test_hierarchy_cycle_rejected() {
        let classes = vec![
            ClassDescriptor::entity("A").extending("B"),
            ClassDescriptor::entity("B").extending("A"),
        ];
        let err = order_hierarchically(&classes).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }
}

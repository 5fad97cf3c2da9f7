//! Integration tests for inheritance strategies and discriminators

#[cfg(test)]
mod inheritance_tests {
    use mapbind::model::EntityKind;
    use mapbind::naming::Identifier;
    use mapbind::{BindingError, BuildOptions};

    use super::super::{bind_yaml, bind_yaml_with, column_names, foreign_keys_to};

    const SINGLE_TABLE: &str = r#"
classes:
  - name: Car
    superclass: Vehicle
    properties:
      - name: doors
        type_name: int
  - name: Vehicle
    properties:
      - name: id
        type_name: Long
        id: true
      - name: make
        type_name: String
  - name: Truck
    superclass: Vehicle
    properties:
      - name: payload
        type_name: int
"#;

    #[test]
    fn test_single_table_hierarchy_shares_root_table() {
        let model = bind_yaml(SINGLE_TABLE).expect("mapping should bind");

        let vehicle = model.entity("Vehicle").unwrap();
        let car = model.entity("Car").unwrap();
        let truck = model.entity("Truck").unwrap();
        assert_eq!(vehicle.kind, EntityKind::Root);
        assert_eq!(car.kind, EntityKind::SingleTableSubclass);
        assert_eq!(car.table, vehicle.table);
        assert_eq!(truck.table, vehicle.table);
        assert_eq!(vehicle.subclasses.len(), 2);
        assert_eq!(model.tables.len(), 1);

        let table = model.table("Vehicle").unwrap();
        assert!(table.has_column(&Identifier::parse("doors")));
        assert!(table.has_column(&Identifier::parse("payload")));

        let dtype = table
            .get_column(&Identifier::parse("DTYPE"))
            .expect("implicit discriminator column");
        assert!(!dtype.nullable);
        assert_eq!(dtype.length, Some(31));

        assert_eq!(vehicle.discriminator_value.as_deref(), Some("Vehicle"));
        assert_eq!(car.discriminator_value.as_deref(), Some("Car"));
        assert_eq!(truck.discriminator_value.as_deref(), Some("Truck"));
    }

    #[test]
    fn test_root_without_subclasses_has_no_discriminator() {
        let yaml = r#"
classes:
  - name: Vehicle
    properties:
      - name: id
        type_name: Long
        id: true
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");
        let vehicle = model.entity("Vehicle").unwrap();
        assert!(vehicle.discriminator.is_none());
        assert!(vehicle.discriminator_value.is_none());
    }

    #[test]
    fn test_mixing_strategies_warns_and_keeps_root_strategy() {
        let yaml = SINGLE_TABLE.replace(
            "  - name: Car\n    superclass: Vehicle\n",
            "  - name: Car\n    superclass: Vehicle\n    inheritance: JOINED\n",
        );
        let model = bind_yaml(&yaml).expect("mapping should bind");

        assert!(model
            .warnings
            .iter()
            .any(|w| w.contains("Mixing inheritance strategy") && w.contains("Car")));
        let car = model.entity("Car").unwrap();
        assert_eq!(car.kind, EntityKind::SingleTableSubclass);
        assert_eq!(model.tables.len(), 1);
    }

    #[test]
    fn test_integer_and_char_discriminator_values() {
        let yaml = SINGLE_TABLE.replace(
            "  - name: Vehicle\n",
            "  - name: Vehicle\n    discriminator_column:\n      name: kind\n      discriminator_type: INTEGER\n    discriminator_value: \"1\"\n",
        )
        .replace(
            "  - name: Car\n    superclass: Vehicle\n",
            "  - name: Car\n    superclass: Vehicle\n    discriminator_value: \"2\"\n",
        );
        let model = bind_yaml(&yaml).expect("mapping should bind");

        assert!(model.table("Vehicle").unwrap().has_column(&Identifier::parse("kind")));
        assert_eq!(model.entity("Vehicle").unwrap().discriminator_value.as_deref(), Some("1"));
        assert_eq!(model.entity("Car").unwrap().discriminator_value.as_deref(), Some("2"));
        // hashCode of the entity name
        assert_eq!(
            model.entity("Truck").unwrap().discriminator_value.as_deref(),
            Some("81087551")
        );

        let invalid = yaml.replace("discriminator_value: \"2\"", "discriminator_value: two");
        assert!(bind_yaml(&invalid).is_err());
    }

    const JOINED: &str = r#"
classes:
  - name: Vehicle
    inheritance: JOINED
    properties:
      - name: id
        type_name: Long
        id: true
      - name: make
        type_name: String
  - name: Car
    superclass: Vehicle
    properties:
      - name: doors
        type_name: int
"#;

    #[test]
    fn test_joined_subclass_key_references_parent() {
        let model = bind_yaml(JOINED).expect("mapping should bind");

        let car = model.entity("Car").unwrap();
        assert_eq!(car.kind, EntityKind::JoinedSubclass);
        let key = model.value(car.key.expect("joined subclass key"));
        assert_eq!(column_names(&key.columns()), vec!["id"]);

        let table = model.table("Car").unwrap();
        let pk = table.primary_key.as_ref().unwrap();
        assert_eq!(column_names(&pk.columns), vec!["id"]);
        let fks = foreign_keys_to(&model, table, "Vehicle");
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].referenced_entity, "Vehicle");

        // JOINED hierarchies get no discriminator unless asked for
        assert!(model.entity("Vehicle").unwrap().discriminator.is_none());
    }

    #[test]
    fn test_joined_subclass_primary_key_join_column() {
        let yaml = JOINED.replace(
            "    superclass: Vehicle\n",
            "    superclass: Vehicle\n    primary_key_join_columns:\n      - name: car_id\n",
        );
        let model = bind_yaml(&yaml).expect("mapping should bind");
        let car = model.entity("Car").unwrap();
        let key = model.value(car.key.unwrap());
        assert_eq!(column_names(&key.columns()), vec!["car_id"]);
    }

    #[test]
    fn test_joined_implicit_discriminator_option() {
        let options = BuildOptions {
            implicit_discriminator_columns_for_joined: true,
            ..Default::default()
        };
        let model = bind_yaml_with(JOINED, &options).expect("mapping should bind");

        assert!(model.table("Vehicle").unwrap().has_column(&Identifier::parse("DTYPE")));
        assert_eq!(model.entity("Car").unwrap().discriminator_value.as_deref(), Some("Car"));
    }

    #[test]
    fn test_table_per_class_copies_parent_columns() {
        let yaml = r#"
classes:
  - name: Vehicle
    is_abstract: true
    inheritance: TABLE_PER_CLASS
    properties:
      - name: id
        type_name: Long
        id: true
      - name: make
        type_name: String
  - name: Car
    superclass: Vehicle
    properties:
      - name: doors
        type_name: int
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");

        let car = model.entity("Car").unwrap();
        assert_eq!(car.kind, EntityKind::UnionSubclass);
        assert!(model.table("Vehicle").unwrap().is_abstract);

        let table = model.table("Car").unwrap();
        for column in ["id", "make", "doors"] {
            assert!(table.has_column(&Identifier::parse(column)), "missing {}", column);
        }
        assert_eq!(column_names(&table.primary_key.as_ref().unwrap().columns), vec!["id"]);
    }

    #[test]
    fn test_mapped_superclass_properties_are_inherited() {
        let yaml = r#"
classes:
  - name: Customer
    superclass: BaseEntity
    properties:
      - name: name
        type_name: String
  - name: BaseEntity
    kind: mapped_superclass
    properties:
      - name: id
        type_name: Long
        id: true
      - name: createdAt
        type_name: Instant
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");

        assert!(model.entity("BaseEntity").is_none());
        let customer = model.entity("Customer").unwrap();
        assert_eq!(customer.kind, EntityKind::Root);
        let table = model.table("Customer").unwrap();
        for column in ["id", "createdAt", "name"] {
            assert!(table.has_column(&Identifier::parse(column)), "missing {}", column);
        }
    }

    #[test]
    fn test_identifier_on_subclass_rejected() {
        let yaml = JOINED.replace(
            "      - name: doors\n",
            "      - name: carId\n        type_name: Long\n        id: true\n      - name: doors\n",
        );
        let err = bind_yaml(&yaml).unwrap_err();
        assert!(matches!(err, BindingError::Annotation { .. }));
        assert!(err.to_string().contains("Car.carId"));
    }

    #[test]
    fn test_root_without_identifier_rejected() {
        let yaml = r#"
classes:
  - name: Vehicle
    properties:
      - name: make
        type_name: String
"#;
        let err = bind_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("no identifier specified"));
    }
}

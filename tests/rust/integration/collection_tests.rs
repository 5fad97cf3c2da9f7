//! Integration tests for collection binding: inverse keys, join tables and
//! element collections

#[cfg(test)]
mod collection_tests {
    use mapbind::model::{
        CollectionElementKind, CollectionFilter, CollectionValue, MappingModel, ValueKind,
    };
    use mapbind::{BindingError, BuildOptions};

    use super::super::{bind_yaml, bind_yaml_with, column_names, foreign_keys_to};

    fn key_columns(model: &MappingModel, entity: &str, property: &str) -> Vec<String> {
        let property = model.property(entity, property).expect("collection property");
        let collection = model
            .value(property.value)
            .as_collection()
            .expect("collection value");
        let key = collection.key.expect("collection key");
        column_names(&model.value(key).columns())
    }

    fn collection<'a>(model: &'a MappingModel, entity: &str, property: &str) -> &'a CollectionValue {
        let property = model.property(entity, property).expect("collection property");
        model
            .value(property.value)
            .as_collection()
            .expect("collection value")
    }

    fn filter(name: &str, condition: &str) -> CollectionFilter {
        CollectionFilter {
            name: name.to_string(),
            condition: condition.to_string(),
        }
    }

    const CUSTOMER_ORDERS: &str = r#"
classes:
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: orders
        type_name: Set
        collection: set
        element_type: Order
        one_to_many:
          mapped_by: customer
  - name: Order
    properties:
      - name: id
        type_name: Long
        id: true
      - name: customer
        type_name: Customer
        many_to_one: {}
"#;

    #[test]
    fn test_inverse_one_to_many_reuses_owning_columns() {
        let model = bind_yaml(CUSTOMER_ORDERS).expect("mapping should bind");

        assert_eq!(key_columns(&model, "Customer", "orders"), vec!["customer_id"]);
        let orders = model.property("Customer", "orders").unwrap();
        let collection = model.value(orders.value).as_collection().unwrap();
        assert!(collection.inverse);
        assert!(collection.bound);
        assert_eq!(collection.element_kind, CollectionElementKind::OneToMany);
        assert_eq!(collection.element_entity.as_deref(), Some("Order"));
        assert_eq!(collection.role, "Customer.orders");

        // no extra table for the inverse side
        assert_eq!(model.tables.len(), 2);
    }

    #[test]
    fn test_mapped_by_unknown_property_fails() {
        let yaml = CUSTOMER_ORDERS.replace("mapped_by: customer", "mapped_by: buyer");
        let err = bind_yaml(&yaml).unwrap_err();
        assert!(matches!(err, BindingError::Annotation { .. }));
        assert!(err.to_string().contains("buyer"));
    }

    #[test]
    fn test_unidirectional_one_to_many_join_table() {
        let yaml = r#"
classes:
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: orders
        type_name: Set
        collection: set
        element_type: Order
        one_to_many: {}
  - name: Order
    properties:
      - name: id
        type_name: Long
        id: true
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");

        let join_table = model.table("Customer_Order").expect("join table");
        let column_list: Vec<&str> = join_table.columns.iter().map(|c| c.name.text()).collect();
        assert_eq!(column_list, vec!["Customer_id", "orders_id"]);
        assert_eq!(foreign_keys_to(&model, join_table, "Customer").len(), 1);
        assert_eq!(foreign_keys_to(&model, join_table, "Order").len(), 1);
        assert!(join_table
            .unique_keys
            .iter()
            .any(|uk| column_names(&uk.columns) == vec!["orders_id"]));
        let pk = join_table.primary_key.as_ref().expect("set table primary key");
        assert_eq!(column_names(&pk.columns), vec!["Customer_id", "orders_id"]);
    }

    #[test]
    fn test_one_to_many_with_join_column_uses_target_table() {
        let yaml = r#"
classes:
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: orders
        type_name: List
        collection: bag
        element_type: Order
        one_to_many: {}
        join_columns:
          - name: owner_id
  - name: Order
    properties:
      - name: id
        type_name: Long
        id: true
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");

        assert_eq!(key_columns(&model, "Customer", "orders"), vec!["owner_id"]);
        let orders = model.table("Order").unwrap();
        assert!(orders.has_column(&mapbind::naming::Identifier::parse("owner_id")));
        assert_eq!(foreign_keys_to(&model, orders, "Customer").len(), 1);
        assert!(model.table("Customer_Order").is_none());
    }

    const STUDENT_COURSES: &str = r#"
classes:
  - name: Student
    properties:
      - name: id
        type_name: Long
        id: true
      - name: courses
        type_name: Set
        collection: set
        element_type: Course
        many_to_many: {}
  - name: Course
    properties:
      - name: id
        type_name: Long
        id: true
      - name: students
        type_name: Set
        collection: set
        element_type: Student
        many_to_many:
          mapped_by: courses
"#;

    #[test]
    fn test_bidirectional_many_to_many() {
        let model = bind_yaml(STUDENT_COURSES).expect("mapping should bind");

        let join_table = model.table("Student_Course").expect("join table");
        assert!(join_table.has_column(&mapbind::naming::Identifier::parse("students_id")));
        assert!(join_table.has_column(&mapbind::naming::Identifier::parse("courses_id")));
        assert_eq!(key_columns(&model, "Student", "courses"), vec!["students_id"]);
        assert_eq!(key_columns(&model, "Course", "students"), vec!["courses_id"]);

        let students = model.property("Course", "students").unwrap();
        let inverse = model.value(students.value).as_collection().unwrap();
        assert!(inverse.inverse);
        let courses = model.property("Student", "courses").unwrap();
        assert!(!model.value(courses.value).as_collection().unwrap().inverse);
    }

    #[test]
    fn test_mapped_by_with_join_table_rejected() {
        let yaml = STUDENT_COURSES.replace(
            "          mapped_by: courses",
            "          mapped_by: courses\n        join_table:\n          name: enrolment",
        );
        let err = bind_yaml(&yaml).unwrap_err();
        assert!(matches!(err, BindingError::Annotation { .. }));
    }

    #[test]
    fn test_element_collection_of_basics() {
        let yaml = r#"
classes:
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: tags
        type_name: Set
        collection: set
        element_type: String
        element_collection: {}
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");

        let table = model.table("Customer_tags").expect("collection table");
        let column_list: Vec<&str> = table.columns.iter().map(|c| c.name.text()).collect();
        assert_eq!(column_list, vec!["Customer_id", "tags"]);
        assert!(table.columns.iter().all(|c| !c.nullable));
        let pk = table.primary_key.as_ref().unwrap();
        assert_eq!(column_names(&pk.columns), vec!["Customer_id", "tags"]);

        let tags = model.property("Customer", "tags").unwrap();
        let collection = model.value(tags.value).as_collection().unwrap();
        assert_eq!(collection.element_kind, CollectionElementKind::Basic);
        let element = model.value(collection.element.unwrap());
        assert!(matches!(element.kind, ValueKind::Basic));
    }

    #[test]
    fn test_list_and_map_index_columns() {
        let yaml = r#"
classes:
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: phones
        type_name: List
        collection: list
        element_type: String
        element_collection: {}
      - name: preferences
        type_name: Map
        collection: map
        element_type: String
        map_key_type: String
        element_collection: {}
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");

        let phones = model.table("Customer_phones").unwrap();
        let pk = phones.primary_key.as_ref().unwrap();
        assert_eq!(column_names(&pk.columns), vec!["Customer_id", "phones_ORDER"]);

        let preferences = model.table("Customer_preferences").unwrap();
        let pk = preferences.primary_key.as_ref().unwrap();
        assert_eq!(column_names(&pk.columns), vec!["Customer_id", "preferences_KEY"]);
    }

    #[test]
    fn test_map_without_key_type_rejected() {
        let yaml = r#"
classes:
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: preferences
        type_name: Map
        collection: map
        element_type: String
        element_collection: {}
"#;
        let err = bind_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("map key type"));
    }

    #[test]
    fn test_element_collection_of_embeddables() {
        let yaml = r#"
classes:
  - name: Address
    kind: embeddable
    properties:
      - name: street
        type_name: String
      - name: city
        type_name: String
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: addresses
        type_name: List
        collection: bag
        element_type: Address
        element_collection: {}
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");

        let table = model.table("Customer_addresses").unwrap();
        let column_list: Vec<&str> = table.columns.iter().map(|c| c.name.text()).collect();
        assert_eq!(column_list, vec!["Customer_id", "street", "city"]);
        // a bag has no primary key
        assert!(table.primary_key.is_none());
    }

    #[test]
    fn test_id_bag_identifier_column() {
        let yaml = r#"
classes:
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: notes
        type_name: List
        collection: bag
        element_type: String
        element_collection: {}
        collection_id:
          generator: increment
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");

        let table = model.table("Customer_notes").unwrap();
        let pk = table.primary_key.as_ref().unwrap();
        assert_eq!(column_names(&pk.columns), vec!["id"]);

        let notes = model.property("Customer", "notes").unwrap();
        let collection = model.value(notes.value).as_collection().unwrap();
        let identifier = model.value(collection.identifier.expect("id bag identifier"));
        assert_eq!(identifier.generator.as_ref().unwrap().strategy, "increment");
    }

    #[test]
    fn test_entity_element_collection_rejected() {
        let yaml = r#"
classes:
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: orders
        type_name: Set
        collection: set
        element_type: Order
        element_collection: {}
  - name: Order
    properties:
      - name: id
        type_name: Long
        id: true
"#;
        let err = bind_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("'@OneToMany' or '@ManyToMany'"));
    }

    const FILTERED_ORDERS: &str = r#"
filter_definitions:
  - name: recent
    default_condition: "placed_at > :since"
classes:
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: orders
        type_name: Set
        collection: set
        element_type: Order
        one_to_many:
          mapped_by: customer
        filters:
          - name: recent
          - name: large
            condition: "total > 100"
        where: "total > 0"
        order_by: ""
  - name: Order
    where: "archived = 0"
    properties:
      - name: id
        type_name: Long
        id: true
      - name: customer
        type_name: Customer
        many_to_one: {}
"#;

    #[test]
    fn test_one_to_many_filters_and_where() {
        let model = bind_yaml(FILTERED_ORDERS).expect("mapping should bind");

        let orders = collection(&model, "Customer", "orders");
        assert_eq!(
            orders.filters,
            vec![filter("recent", "placed_at > :since"), filter("large", "total > 100")]
        );
        assert!(orders.many_to_many_filters.is_empty());
        assert_eq!(
            orders.where_clause.as_deref(),
            Some("( archived = 0 ) and ( total > 0 )")
        );
        assert!(orders.many_to_many_where.is_none());
        assert_eq!(orders.order_by.as_deref(), Some("id asc"));
    }

    #[test]
    fn test_entity_where_can_be_left_off_collections() {
        let options = BuildOptions {
            use_entity_where_clause_for_collections: false,
            ..Default::default()
        };
        let model = bind_yaml_with(FILTERED_ORDERS, &options).expect("mapping should bind");
        let orders = collection(&model, "Customer", "orders");
        assert_eq!(orders.where_clause.as_deref(), Some("total > 0"));
    }

    #[test]
    fn test_join_table_filter_needs_a_join_table() {
        let yaml = FILTERED_ORDERS.replace(
            "        where: \"total > 0\"\n",
            "        filter_join_tables:\n          - name: large\n",
        );
        let err = bind_yaml(&yaml).unwrap_err();
        assert!(matches!(err, BindingError::Annotation { .. }));
        assert!(err.to_string().contains("'@FilterJoinTable'"));

        let yaml = FILTERED_ORDERS.replace("        where: \"total > 0\"\n", "        where_join_table: \"paid = 1\"\n");
        let err = bind_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("'@WhereJoinTable'"));
    }

    #[test]
    fn test_filter_without_condition_or_definition_fails() {
        let yaml = FILTERED_ORDERS.replace("    default_condition: \"placed_at > :since\"\n", "");
        let err = bind_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("no filter condition found for filter 'recent'"));
        assert_eq!(err.path(), Some("Customer.orders"));
    }

    #[test]
    fn test_many_to_many_restrictions_split_by_table() {
        let yaml = STUDENT_COURSES.replace(
            "        element_type: Course\n        many_to_many: {}\n",
            r#"        element_type: Course
        many_to_many: {}
        filters:
          - name: open
            condition: "seats > 0"
        filter_join_tables:
          - name: current
            condition: "term = :term"
        where: "level > 1"
        where_join_table: "dropped = 0"
        order_by: desc
"#,
        );
        let model = bind_yaml(&yaml).expect("mapping should bind");

        let courses = collection(&model, "Student", "courses");
        assert_eq!(courses.filters, vec![filter("current", "term = :term")]);
        assert_eq!(courses.many_to_many_filters, vec![filter("open", "seats > 0")]);
        assert_eq!(courses.where_clause.as_deref(), Some("dropped = 0"));
        assert_eq!(courses.many_to_many_where.as_deref(), Some("level > 1"));
        assert_eq!(courses.many_to_many_order_by.as_deref(), Some("id desc"));
        assert!(courses.order_by.is_none());
    }

    #[test]
    fn test_element_collection_ordering() {
        let yaml = r#"
classes:
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: nicknames
        type_name: List
        collection: bag
        element_type: String
        element_collection: {}
        order_by: ""
      - name: emails
        type_name: Set
        collection: set
        element_type: String
        element_collection: {}
        sql_order_by: "email desc"
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");
        assert_eq!(
            collection(&model, "Customer", "nicknames").order_by.as_deref(),
            Some("$element$ asc")
        );
        assert_eq!(
            collection(&model, "Customer", "emails").order_by.as_deref(),
            Some("email desc")
        );

        let both = yaml.replace(
            "        sql_order_by: \"email desc\"\n",
            "        sql_order_by: \"email desc\"\n        order_by: email\n",
        );
        let err = bind_yaml(&both).unwrap_err();
        assert!(err.to_string().contains("illegal combination"));
    }
}

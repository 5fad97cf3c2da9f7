//! Integration tests for table level mapping: secondary tables, constraints
//! and naming strategies

#[cfg(test)]
mod table_tests {
    use mapbind::config::{ImplicitNamingKind, PhysicalNamingKind};
    use mapbind::naming::Identifier;
    use mapbind::BuildOptions;

    use super::super::{bind_yaml, bind_yaml_with, column_names, foreign_keys_to};

    #[test]
    fn test_secondary_table_join() {
        let yaml = r#"
classes:
  - name: Customer
    secondary_tables:
      - name: CustomerDetails
    properties:
      - name: id
        type_name: Long
        id: true
      - name: name
        type_name: String
      - name: biography
        type_name: String
        columns:
          - table: CustomerDetails
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");

        let customer = model.entity("Customer").unwrap();
        assert_eq!(customer.joins.len(), 1);
        let join = &customer.joins[0];
        let key = model.value(join.key.expect("secondary table key"));
        assert_eq!(column_names(&key.columns()), vec!["id"]);

        let details = model.table("CustomerDetails").unwrap();
        assert!(details.has_column(&Identifier::parse("biography")));
        assert!(!model.table("Customer").unwrap().has_column(&Identifier::parse("biography")));
        assert_eq!(column_names(&details.primary_key.as_ref().unwrap().columns), vec!["id"]);
        assert_eq!(foreign_keys_to(&model, details, "Customer").len(), 1);

        let biography = model.property("Customer", "biography").unwrap();
        assert_eq!(biography.join_table, Some(join.table));
        assert!(model.property("Customer", "name").unwrap().join_table.is_none());
    }

    #[test]
    fn test_column_in_undeclared_table_rejected() {
        let yaml = r#"
classes:
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: biography
        type_name: String
        columns:
          - table: CustomerDetails
"#;
        let err = bind_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("CustomerDetails"));
    }

    const CONSTRAINED: &str = r#"
classes:
  - name: Customer
    table:
      name: customers
      unique_constraints:
        - name: uk_customer_email
          columns: [email]
      indexes:
        - name: idx_customer_name
          columns: [lastName, firstName]
    properties:
      - name: id
        type_name: Long
        id: true
      - name: email
        type_name: String
      - name: firstName
        type_name: String
      - name: lastName
        type_name: String
"#;

    #[test]
    fn test_table_constraints_and_indexes() {
        let model = bind_yaml(CONSTRAINED).expect("mapping should bind");

        let table = model.table("customers").expect("explicit table name");
        let unique = table
            .unique_keys
            .iter()
            .find(|uk| uk.name == "uk_customer_email")
            .expect("named unique key");
        assert_eq!(column_names(&unique.columns), vec!["email"]);

        let index = table
            .indexes
            .iter()
            .find(|idx| idx.name == "idx_customer_name")
            .expect("named index");
        assert_eq!(column_names(&index.columns), vec!["lastName", "firstName"]);
    }

    #[test]
    fn test_constraint_on_unknown_column_rejected() {
        let yaml = CONSTRAINED.replace("columns: [email]", "columns: [phone]");
        let err = bind_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("unable to create unique key"));
        assert!(err.to_string().contains("phone"));
    }

    const EMBEDDED_ADDRESS: &str = r#"
classes:
  - name: Address
    kind: embeddable
    properties:
      - name: street
        type_name: String
      - name: zipCode
        type_name: String
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: homeAddress
        type_name: Address
        embedded: true
"#;

    #[test]
    fn test_embedded_columns_use_attribute_names() {
        let model = bind_yaml(EMBEDDED_ADDRESS).expect("mapping should bind");
        assert_eq!(
            model.property_columns("Customer", "homeAddress"),
            vec!["street", "zipCode"]
        );
    }

    #[test]
    fn test_component_path_and_snake_case_naming() {
        let options = BuildOptions {
            implicit_naming_strategy: ImplicitNamingKind::ComponentPath,
            physical_naming_strategy: PhysicalNamingKind::SnakeCase,
            ..Default::default()
        };
        let model = bind_yaml_with(EMBEDDED_ADDRESS, &options).expect("mapping should bind");

        let table = model.table("customer").expect("snake case table");
        assert!(table.has_column(&Identifier::parse("home_address_street")));
        assert!(table.has_column(&Identifier::parse("home_address_zip_code")));
    }

    #[test]
    fn test_globally_quoted_identifiers() {
        let options = BuildOptions {
            globally_quoted_identifiers: true,
            ..Default::default()
        };
        let model = bind_yaml_with(EMBEDDED_ADDRESS, &options).expect("mapping should bind");

        let table = model.table("Customer").unwrap();
        assert!(table.name.is_quoted());
        assert!(table.columns.iter().all(|c| c.name.is_quoted()));
    }

    #[test]
    fn test_column_transformer_placeholder_checked() {
        let yaml = r#"
classes:
  - name: Account
    properties:
      - name: id
        type_name: Long
        id: true
      - name: secret
        type_name: String
        column_transformers:
          - read: "decrypt(secret)"
            write: "encrypt(?)"
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");
        let column = model
            .table("Account")
            .unwrap()
            .get_column(&Identifier::parse("secret"))
            .unwrap()
            .clone();
        assert_eq!(column.read_expression.as_deref(), Some("decrypt(secret)"));
        assert_eq!(column.write_expression.as_deref(), Some("encrypt(?)"));

        let invalid = yaml.replace("encrypt(?)", "encrypt(?, ?)");
        let err = bind_yaml(&invalid).unwrap_err();
        assert!(err.to_string().contains("exactly one value placeholder"));
    }
}

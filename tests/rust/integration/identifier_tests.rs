//! Integration tests for identifiers, generators, versions and natural ids

#[cfg(test)]
mod identifier_tests {
    use mapbind::naming::Identifier;

    use super::super::{bind_yaml, column_names, foreign_keys_to};

    const GENERATED: &str = r#"
generators:
  - name: order_seq
    kind: sequence
    sequence_name: ORDER_SEQ
    allocation_size: 50
classes:
  - name: Order
    properties:
      - name: id
        type_name: Long
        id: true
        generated_value:
          strategy: SEQUENCE
          generator: order_seq
  - name: Invoice
    properties:
      - name: id
        type_name: Long
        id: true
        generated_value:
          strategy: IDENTITY
  - name: Tag
    properties:
      - name: code
        type_name: String
        id: true
"#;

    #[test]
    fn test_identifier_generators() {
        let model = bind_yaml(GENERATED).expect("mapping should bind");

        let order = model.entity("Order").unwrap();
        let id = model.value(order.identifier.unwrap());
        let generator = id.generator.as_ref().unwrap();
        assert_eq!(generator.strategy, "enhanced-sequence");
        assert_eq!(generator.name.as_deref(), Some("order_seq"));
        assert_eq!(generator.parameters.get("sequence_name").map(String::as_str), Some("ORDER_SEQ"));
        assert_eq!(generator.parameters.get("increment_size").map(String::as_str), Some("50"));
        assert_eq!(generator.parameters.get("target_table").map(String::as_str), Some("Order"));
        assert_eq!(generator.parameters.get("target_column").map(String::as_str), Some("id"));
        assert!(id.null_value.is_none());

        let invoice = model.entity("Invoice").unwrap();
        let id = model.value(invoice.identifier.unwrap());
        assert_eq!(id.generator.as_ref().unwrap().strategy, "identity");

        let tag = model.entity("Tag").unwrap();
        let id = model.value(tag.identifier.unwrap());
        assert_eq!(id.generator.as_ref().unwrap().strategy, "assigned");
        assert_eq!(id.null_value.as_deref(), Some("undefined"));

        let table = model.table("Tag").unwrap();
        assert_eq!(column_names(&table.primary_key.as_ref().unwrap().columns), vec!["code"]);
        assert!(!table.get_column(&Identifier::parse("code")).unwrap().nullable);
    }

    #[test]
    fn test_class_generator_shadows_global_one() {
        let yaml = GENERATED.replace(
            "  - name: Order\n",
            "  - name: Order\n    generators:\n      - name: order_seq\n        kind: table\n        table: hi_lo\n",
        );
        let model = bind_yaml(&yaml).expect("mapping should bind");
        let order = model.entity("Order").unwrap();
        let generator = model.value(order.identifier.unwrap()).generator.clone().unwrap();
        assert_eq!(generator.strategy, "enhanced-table");
        assert_eq!(generator.parameters.get("table_name").map(String::as_str), Some("hi_lo"));
    }

    #[test]
    fn test_unknown_generator_rejected() {
        let yaml = GENERATED.replace("generator: order_seq", "generator: missing_seq");
        let err = bind_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("unknown named generator"));
        assert!(err.to_string().contains("missing_seq"));
    }

    #[test]
    fn test_formula_identifier_rejected() {
        let yaml = r#"
classes:
  - name: Tag
    properties:
      - name: code
        type_name: String
        id: true
        formula: "upper(name)"
"#;
        let err = bind_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("formula"));
    }

    const ORDER_LINE_ID: &str = r#"
classes:
  - name: OrderLineId
    kind: embeddable
    properties:
      - name: orderNumber
        type_name: int
      - name: line
        type_name: int
"#;

    #[test]
    fn test_embedded_identifier() {
        let yaml = format!(
            "{}{}",
            ORDER_LINE_ID,
            r#"  - name: OrderLine
    properties:
      - name: id
        type_name: OrderLineId
        embedded_id: true
      - name: quantity
        type_name: int
"#
        );
        let model = bind_yaml(&yaml).expect("mapping should bind");

        let line = model.entity("OrderLine").unwrap();
        assert_eq!(line.identifier_property.as_ref().unwrap().name, "id");
        assert!(line.identifier_mapper.is_none());
        let id = model.value(line.identifier.unwrap());
        assert!(id.as_component().unwrap().key);
        assert_eq!(column_names(&id.columns()), vec!["orderNumber", "line"]);

        let table = model.table("OrderLine").unwrap();
        assert_eq!(
            column_names(&table.primary_key.as_ref().unwrap().columns),
            vec!["orderNumber", "line"]
        );
        assert!(!table.get_column(&Identifier::parse("line")).unwrap().nullable);
    }

    #[test]
    fn test_id_class_identifier_mapper() {
        let yaml = format!(
            "{}{}",
            ORDER_LINE_ID,
            r#"  - name: OrderLine
    id_class: OrderLineId
    properties:
      - name: orderNumber
        type_name: int
        id: true
      - name: line
        type_name: int
        id: true
"#
        );
        let model = bind_yaml(&yaml).expect("mapping should bind");

        let line = model.entity("OrderLine").unwrap();
        assert!(line.embedded_identifier);
        assert!(line.identifier_property.is_none());
        let mapper = model.value(line.identifier_mapper.expect("identifier mapper"));
        let members: Vec<&str> = mapper
            .as_component()
            .unwrap()
            .properties
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(members, vec!["orderNumber", "line"]);
        let table = model.table("OrderLine").unwrap();
        assert_eq!(
            column_names(&table.primary_key.as_ref().unwrap().columns),
            vec!["orderNumber", "line"]
        );

        let mismatched = yaml.replace("      - name: line\n        type_name: int\n        id: true\n", "");
        let err = bind_yaml(&mismatched).unwrap_err();
        assert!(err.to_string().contains("no matching '@Id' property"));
    }

    #[test]
    fn test_derived_identifier_through_many_to_one() {
        let yaml = r#"
classes:
  - name: OrderDetail
    properties:
      - name: order
        type_name: Order
        id: true
        many_to_one: {}
      - name: note
        type_name: String
  - name: Order
    properties:
      - name: id
        type_name: Long
        id: true
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");

        let detail = model.entity("OrderDetail").unwrap();
        let mapper = model.value(detail.identifier_mapper.expect("identifier mapper"));
        assert_eq!(column_names(&mapper.columns()), vec!["order_id"]);

        let table = model.table("OrderDetail").unwrap();
        assert_eq!(column_names(&table.primary_key.as_ref().unwrap().columns), vec!["order_id"]);
        assert_eq!(foreign_keys_to(&model, table, "Order").len(), 1);
        assert!(!table.get_column(&Identifier::parse("order_id")).unwrap().nullable);
    }

    #[test]
    fn test_version_property() {
        let yaml = r#"
classes:
  - name: Account
    properties:
      - name: id
        type_name: Long
        id: true
      - name: revision
        type_name: int
        version: true
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");
        let account = model.entity("Account").unwrap();
        let version = account.version.as_ref().expect("version property");
        assert_eq!(version.name, "revision");
        assert!(account.get_declared_property("revision").is_none());
        let table = model.table("Account").unwrap();
        assert!(!table.get_column(&Identifier::parse("revision")).unwrap().nullable);
    }

    #[test]
    fn test_version_on_subclass_rejected() {
        let yaml = r#"
classes:
  - name: Account
    properties:
      - name: id
        type_name: Long
        id: true
  - name: SavingsAccount
    superclass: Account
    properties:
      - name: revision
        type_name: int
        version: true
"#;
        let err = bind_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("SavingsAccount.revision"));
    }

    #[test]
    fn test_natural_id_unique_key() {
        let yaml = r#"
classes:
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: email
        type_name: String
        natural_id: true
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");
        let table = model.table("Customer").unwrap();
        assert!(table
            .unique_keys
            .iter()
            .any(|uk| column_names(&uk.columns) == vec!["email"]));
        assert!(model.property("Customer", "email").unwrap().natural_id);
    }
}

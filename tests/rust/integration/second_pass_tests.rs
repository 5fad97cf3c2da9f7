//! Integration tests for deferred binding: retries, key ordering and
//! declaration-order independence

#[cfg(test)]
mod second_pass_tests {
    use std::collections::BTreeMap;

    use mapbind::{BindingError, BuildOptions, MappingModel};

    use super::super::{bind_yaml, bind_yaml_with, column_names, foreign_keys_to};

    /// `Order.customer` references a column of `Customer` that only exists
    /// once the foreign key pass of `Customer.account` has run.
    const CHAINED_REFERENCE: &str = r#"
classes:
  - name: Order
    properties:
      - name: id
        type_name: Long
        id: true
      - name: customer
        type_name: Customer
        many_to_one: {}
        join_columns:
          - name: customer_account
            referenced_column_name: account_code
  - name: Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: account
        type_name: Account
        many_to_one: {}
        join_columns:
          - name: account_code
            referenced_column_name: code
  - name: Account
    properties:
      - name: id
        type_name: Long
        id: true
      - name: code
        type_name: String
"#;

    #[test]
    fn test_unresolved_reference_recovers_on_retry() {
        let model = bind_yaml(CHAINED_REFERENCE).expect("mapping should bind after a retry");

        let orders = model.table("Order").unwrap();
        let fks = foreign_keys_to(&model, orders, "Customer");
        assert_eq!(fks.len(), 1);
        assert_eq!(column_names(&fks[0].columns), vec!["customer_account"]);
        assert_eq!(column_names(&fks[0].referenced_columns), vec!["account_code"]);

        let customers = model.table("Customer").unwrap();
        let fks = foreign_keys_to(&model, customers, "Account");
        assert_eq!(column_names(&fks[0].referenced_columns), vec!["code"]);

        let association = model.property("Order", "customer").unwrap();
        let to_one = model.value(association.value).as_to_one().unwrap();
        assert!(!to_one.reference_to_primary_key);
        assert_eq!(to_one.referenced_property.as_deref(), Some("_Order_customer"));
    }

    #[test]
    fn test_retry_budget_of_zero_still_runs_one_pass() {
        let options = BuildOptions {
            max_recovery_passes: 0,
            ..Default::default()
        };
        assert!(bind_yaml_with(CHAINED_REFERENCE, &options).is_ok());
    }

    #[test]
    fn test_reference_that_never_resolves_is_fatal() {
        let yaml = CHAINED_REFERENCE.replace(
            "referenced_column_name: account_code",
            "referenced_column_name: account_number",
        );
        let err = bind_yaml(&yaml).unwrap_err();
        assert!(matches!(err, BindingError::Annotation { .. }));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("account_number"));
    }

    #[test]
    fn test_identifier_foreign_key_cycle_detected() {
        let yaml = r#"
classes:
  - name: Husband
    properties:
      - name: wife
        type_name: Wife
        id: true
        many_to_one: {}
  - name: Wife
    properties:
      - name: husband
        type_name: Husband
        id: true
        many_to_one: {}
"#;
        let err = bind_yaml(yaml).unwrap_err();
        match err {
            BindingError::ForeignKeyCircularity { tables } => {
                assert!(tables.contains("Husband"));
                assert!(tables.contains("Wife"));
            }
            other => panic!("expected a circularity error, got {:?}", other),
        }
    }

    #[test]
    fn test_derived_identifiers_resolve_in_dependency_order() {
        let yaml = r#"
classes:
  - name: ShipmentLine
    properties:
      - name: shipment
        type_name: Shipment
        id: true
        many_to_one: {}
  - name: Shipment
    properties:
      - name: order
        type_name: Order
        id: true
        many_to_one: {}
  - name: Order
    properties:
      - name: id
        type_name: Long
        id: true
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");
        assert_eq!(model.property_columns("Shipment", "order"), vec!["order_id"]);
        assert_eq!(
            model.property_columns("ShipmentLine", "shipment"),
            vec!["shipment_order_id"]
        );
        let lines = model.table("ShipmentLine").unwrap();
        assert_eq!(
            column_names(&lines.primary_key.as_ref().unwrap().columns),
            vec!["shipment_order_id"]
        );
    }

    #[test]
    fn test_derived_identifier_waits_for_joined_subclass_key() {
        let yaml = r#"
classes:
  - name: Registration
    properties:
      - name: car
        type_name: Car
        id: true
        many_to_one: {}
      - name: plate
        type_name: String
        id: true
  - name: Vehicle
    inheritance: JOINED
    properties:
      - name: id
        type_name: Long
        id: true
  - name: Car
    superclass: Vehicle
    properties:
      - name: doors
        type_name: int
"#;
        let model = bind_yaml(yaml).expect("derived identifier should bind");

        let registrations = model.table("Registration").unwrap();
        assert_eq!(
            column_names(&registrations.primary_key.as_ref().unwrap().columns),
            vec!["car_id", "plate"]
        );
        let fks = foreign_keys_to(&model, registrations, "Car");
        assert_eq!(fks.len(), 1);
        assert_eq!(column_names(&fks[0].columns), vec!["car_id"]);

        let cars = model.table("Car").unwrap();
        assert_eq!(column_names(&cars.primary_key.as_ref().unwrap().columns), vec!["id"]);
    }

    fn table_layout(model: &MappingModel) -> BTreeMap<String, Vec<String>> {
        model
            .tables
            .iter()
            .map(|table| {
                let mut columns: Vec<String> =
                    table.columns.iter().map(|c| c.name.text().to_string()).collect();
                columns.sort();
                (table.name.text().to_string(), columns)
            })
            .collect()
    }

    #[test]
    fn test_declaration_order_does_not_change_the_schema() {
        let forward = r#"
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
      - name: items
        type_name: Set
        collection: set
        element_type: Product
        many_to_many: {}
  - name: Product
    properties:
      - name: id
        type_name: Long
        id: true
"#;
        let (head, rest) = forward.split_at(forward.find("  - name: Order\n").unwrap());
        let (order, product) = rest.split_at(rest.find("  - name: Product\n").unwrap());
        let customer = head.trim_start_matches("\nclasses:\n");
        let reversed = format!("\nclasses:\n{}{}{}", product, order, customer);

        let first = bind_yaml(forward).expect("mapping should bind");
        let second = bind_yaml(&reversed).expect("reordered mapping should bind");
        assert_eq!(table_layout(&first), table_layout(&second));
        assert!(first.table("Order_Product").is_some());
    }
}

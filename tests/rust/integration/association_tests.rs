//! Integration tests for to-one associations and non-primary-key references

#[cfg(test)]
mod to_one_tests {
    use mapbind::model::ValueKind;
    use mapbind::naming::Identifier;
    use mapbind::BindingError;

    use super::super::{bind_yaml, column_names, foreign_keys_to};

    const ORDER_CUSTOMER: &str = r#"
classes:
  - name: com.acme.Order
    properties:
      - name: id
        type_name: Long
        id: true
      - name: customer
        type_name: com.acme.Customer
        many_to_one: {}
  - name: com.acme.Customer
    properties:
      - name: id
        type_name: Long
        id: true
      - name: name
        type_name: String
"#;

    /// The target is declared after the association; the foreign key is
    /// still resolved in the second pass.
    #[test]
    fn test_many_to_one_default_join_column() {
        let model = bind_yaml(ORDER_CUSTOMER).expect("mapping should bind");

        assert_eq!(model.property_columns("Order", "customer"), vec!["customer_id"]);

        let orders = model.table("Order").expect("Order table");
        let fks = foreign_keys_to(&model, orders, "Customer");
        assert_eq!(fks.len(), 1);
        assert_eq!(column_names(&fks[0].columns), vec!["customer_id"]);
        assert_eq!(fks[0].referenced_entity, "Customer");
        assert!(fks[0].is_referencing_primary_key());

        let column = orders
            .get_column(&Identifier::parse("customer_id"))
            .expect("join column on the owner table");
        assert!(column.nullable);
    }

    #[test]
    fn test_mandatory_many_to_one_is_not_nullable() {
        let yaml = ORDER_CUSTOMER.replace("many_to_one: {}", "many_to_one: { optional: false }");
        let model = bind_yaml(&yaml).expect("mapping should bind");

        let orders = model.table("Order").expect("Order table");
        let column = orders.get_column(&Identifier::parse("customer_id")).unwrap();
        assert!(!column.nullable);
        let property = model.property("Order", "customer").unwrap();
        assert!(!property.optional);
    }

    #[test]
    fn test_explicit_join_column_name() {
        let yaml = ORDER_CUSTOMER.replace(
            "many_to_one: {}",
            "many_to_one: {}\n        join_columns:\n          - name: buyer",
        );
        let model = bind_yaml(&yaml).expect("mapping should bind");
        assert_eq!(model.property_columns("Order", "customer"), vec!["buyer"]);
    }

    const ORDER_PRODUCT: &str = r#"
classes:
  - name: Product
    properties:
      - name: id
        type_name: Long
        id: true
      - name: sku
        type_name: String
  - name: Order
    properties:
      - name: id
        type_name: Long
        id: true
      - name: product
        type_name: Product
        many_to_one: {}
        join_columns:
          - name: product_sku
            referenced_column_name: sku
"#;

    #[test]
    fn test_non_primary_key_reference_creates_synthetic_property() {
        let model = bind_yaml(ORDER_PRODUCT).expect("mapping should bind");

        let product = model.entity("Product").unwrap();
        let synthetic = product
            .properties
            .iter()
            .find(|p| p.synthetic)
            .expect("synthetic property on the referenced entity");
        assert_eq!(synthetic.name, "_Order_product");
        assert!(!synthetic.insertable);
        assert!(!synthetic.updatable);
        assert_eq!(model.property_columns("Product", "_Order_product"), vec!["sku"]);

        let association = model.property("Order", "product").unwrap();
        let to_one = model.value(association.value).as_to_one().unwrap();
        assert_eq!(to_one.referenced_property.as_deref(), Some("_Order_product"));
        assert!(!to_one.reference_to_primary_key);

        let orders = model.table("Order").unwrap();
        let fks = foreign_keys_to(&model, orders, "Product");
        assert_eq!(fks.len(), 1);
        assert_eq!(column_names(&fks[0].referenced_columns), vec!["sku"]);

        let products = model.table("Product").unwrap();
        assert!(products
            .unique_keys
            .iter()
            .any(|uk| column_names(&uk.columns) == vec!["sku"]));
        assert!(model
            .property_references
            .iter()
            .any(|r| r.entity_name == "Product" && r.property_name == "_Order_product" && r.unique));
    }

    #[test]
    fn test_reference_to_unmapped_column_fails() {
        let yaml = ORDER_PRODUCT.replace("referenced_column_name: sku", "referenced_column_name: ean");
        let err = bind_yaml(&yaml).unwrap_err();
        assert!(matches!(err, BindingError::Annotation { .. }));
        assert!(err.to_string().contains("ean"));
    }

    #[test]
    fn test_partial_referenced_column_names_rejected() {
        let yaml = r#"
classes:
  - name: Line
    properties:
      - name: id
        type_name: Long
        id: true
      - name: order
        type_name: Order
        many_to_one: {}
        join_columns:
          - name: order_number
            referenced_column_name: number
          - name: order_year
  - name: Order
    properties:
      - name: number
        type_name: int
        id: true
      - name: year
        type_name: int
        id: true
"#;
        let err = bind_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("referencedColumnName"));
    }

    const PERSON_PASSPORT: &str = r#"
classes:
  - name: Person
    properties:
      - name: id
        type_name: Long
        id: true
      - name: passport
        type_name: Passport
        one_to_one:
          mapped_by: owner
  - name: Passport
    properties:
      - name: id
        type_name: Long
        id: true
      - name: owner
        type_name: Person
        one_to_one: {}
"#;

    #[test]
    fn test_inverse_one_to_one_has_no_columns() {
        let model = bind_yaml(PERSON_PASSPORT).expect("mapping should bind");

        assert!(model.property_columns("Person", "passport").is_empty());
        assert_eq!(model.property_columns("Passport", "owner"), vec!["owner_id"]);

        let passport = model.property("Person", "passport").unwrap();
        let to_one = model.value(passport.value).as_to_one().unwrap();
        assert_eq!(to_one.mapped_by.as_deref(), Some("owner"));
        assert!(model
            .property_references
            .iter()
            .any(|r| r.entity_name == "Passport" && r.property_name == "owner"));
    }

    #[test]
    fn test_mapped_by_unknown_property_fails() {
        let yaml = PERSON_PASSPORT.replace("mapped_by: owner", "mapped_by: holder");
        let err = bind_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("holder"));
    }

    #[test]
    fn test_mapped_by_with_join_column_rejected() {
        let yaml = PERSON_PASSPORT.replace(
            "          mapped_by: owner",
            "          mapped_by: owner\n        join_columns:\n          - name: passport_id",
        );
        let err = bind_yaml(&yaml).unwrap_err();
        assert!(matches!(err, BindingError::Annotation { .. }));
        assert!(err.to_string().contains("mappedBy"));
    }

    #[test]
    fn test_association_with_column_annotation_rejected() {
        let yaml = ORDER_CUSTOMER.replace(
            "many_to_one: {}",
            "many_to_one: {}\n        columns:\n          - name: customer_ref",
        );
        let err = bind_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("@JoinColumn"));
    }

    #[test]
    fn test_any_association_columns() {
        let yaml = r#"
classes:
  - name: Comment
    properties:
      - name: id
        type_name: Long
        id: true
      - name: subject
        type_name: Object
        any:
          meta_values:
            P: Post
            V: Video
"#;
        let model = bind_yaml(yaml).expect("mapping should bind");
        let subject = model.property("Comment", "subject").unwrap();
        let value = model.value(subject.value);
        assert!(matches!(value.kind, ValueKind::Any(_)));
        assert_eq!(
            model.property_columns("Comment", "subject"),
            vec!["subject_type", "subject_id"]
        );
    }
}

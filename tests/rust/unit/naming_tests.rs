//! Unit tests for implicit and physical naming through the resolver

#[cfg(test)]
mod naming_tests {
    use mapbind::config::{ImplicitNamingKind, PhysicalNamingKind};
    use mapbind::naming::{AttributePath, Identifier, JoinColumnNature, NamingNature};
    use mapbind::BuildOptions;
    use test_case::test_case;

    fn options(implicit: ImplicitNamingKind, physical: PhysicalNamingKind) -> BuildOptions {
        BuildOptions {
            implicit_naming_strategy: implicit,
            physical_naming_strategy: physical,
            ..Default::default()
        }
    }

    #[test_case(ImplicitNamingKind::Jpa, PhysicalNamingKind::Identity, "zipCode" ; "jpa identity")]
    #[test_case(ImplicitNamingKind::ComponentPath, PhysicalNamingKind::Identity, "billingAddress_zipCode" ; "component path identity")]
    #[test_case(ImplicitNamingKind::Jpa, PhysicalNamingKind::SnakeCase, "zip_code" ; "jpa snake case")]
    #[test_case(ImplicitNamingKind::ComponentPath, PhysicalNamingKind::SnakeCase, "billing_address_zip_code" ; "component path snake case")]
    fn test_embedded_basic_column(implicit: ImplicitNamingKind, physical: PhysicalNamingKind, expected: &str) {
        let resolver = options(implicit, physical).naming_resolver();
        let path = AttributePath::parse("billingAddress.zipCode");
        let name = resolver.resolve_implicit(&path, &NamingNature::EntityColumn);
        assert_eq!(name.text(), expected);
    }

    #[test]
    fn test_join_column_names() {
        let resolver = BuildOptions::default().naming_resolver();
        let table = Identifier::parse("Customer");
        let column = Identifier::parse("id");

        let to_one = resolver.resolve_implicit(
            &AttributePath::parse("customer"),
            &NamingNature::JoinColumn {
                kind: JoinColumnNature::Entity,
                entity_name: "com.acme.Customer",
                referenced_table: &table,
                referenced_column: &column,
            },
        );
        assert_eq!(to_one.text(), "customer_id");

        let collection_key = resolver.resolve_implicit(
            &AttributePath::parse("tags"),
            &NamingNature::JoinColumn {
                kind: JoinColumnNature::ElementCollection,
                entity_name: "com.acme.Customer",
                referenced_table: &table,
                referenced_column: &column,
            },
        );
        assert_eq!(collection_key.text(), "Customer_id");
    }

    #[test]
    fn test_mapped_by_join_column_uses_owning_property() {
        let resolver = BuildOptions::default().naming_resolver();
        let table = Identifier::parse("Order");
        let column = Identifier::parse("id");
        let name = resolver.resolve_implicit(
            &AttributePath::parse("orders"),
            &NamingNature::MappedByJoinColumn {
                mapped_by_entity: "Order",
                mapped_by_property: "buyer",
                mapped_by_table: &table,
                referenced_column: &column,
            },
        );
        assert_eq!(name.text(), "buyer_id");
    }

    #[test]
    fn test_quoted_reference_forces_quoting() {
        let resolver = BuildOptions::default().naming_resolver();
        let table = Identifier::parse("`Order`");
        let column = Identifier::parse("id");
        let name = resolver.resolve_implicit(
            &AttributePath::parse("order"),
            &NamingNature::JoinColumn {
                kind: JoinColumnNature::Entity,
                entity_name: "Order",
                referenced_table: &table,
                referenced_column: &column,
            },
        );
        assert_eq!(name.text(), "order_id");
        assert!(name.is_quoted());
    }

    #[test]
    fn test_keywords_are_auto_quoted() {
        let options = BuildOptions {
            keywords: vec!["ORDER".to_string()],
            ..Default::default()
        };
        let resolver = options.naming_resolver();
        let table = resolver.to_physical_table(&Identifier::parse("order"));
        assert!(table.is_quoted());
        assert_eq!(table.render(), "`order`");
        assert!(!resolver.to_physical_table(&Identifier::parse("customer")).is_quoted());
    }

    #[test]
    fn test_explicit_names() {
        let resolver = options(ImplicitNamingKind::Jpa, PhysicalNamingKind::SnakeCase).naming_resolver();
        let explicit = |raw: &str| Identifier::to_identifier(raw).map(|n| resolver.to_physical_column(&n));
        assert_eq!(explicit("createdAt").unwrap().text(), "created_at");
        assert!(explicit("   ").is_none());

        let quoted = explicit("\"CreatedAt\"").unwrap();
        assert!(quoted.is_quoted());
        assert_eq!(quoted.text(), "CreatedAt");
    }

    #[test]
    fn test_logical_table_name() {
        let resolver = BuildOptions::default().naming_resolver();
        assert_eq!(resolver.logical_table_name(None, "com.acme.Order").text(), "Order");
        assert_eq!(resolver.logical_table_name(Some("orders"), "com.acme.Order").text(), "orders");
        assert_eq!(resolver.logical_table_name(Some(""), "Order").text(), "Order");
    }
}

//! Unit tests for binding error classification and messages

#[cfg(test)]
mod error_tests {
    use mapbind::binder::entity::{discriminator_value, jvm_string_hash};
    use mapbind::binder::synthetic::synthetic_property_name;
    use mapbind::metadata::descriptors::DiscriminatorType;
    use mapbind::BindingError;

    #[test]
    fn test_annotation_error_names_the_path() {
        let err = BindingError::annotation("Order.customer", "unknown target entity 'Client'");
        assert_eq!(
            err.to_string(),
            "Invalid mapping for 'Order.customer': unknown target entity 'Client'"
        );
        assert_eq!(err.path(), Some("Order.customer"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_recoverable_error_escalates() {
        let err = BindingError::recoverable("Order.customer", "no column 'code' yet");
        assert!(err.is_recoverable());

        let fatal = err.into_fatal();
        assert!(matches!(fatal, BindingError::Annotation { .. }));
        assert_eq!(fatal.path(), Some("Order.customer"));
    }

    #[test]
    fn test_other_errors_have_no_path() {
        let err = BindingError::ForeignKeyCircularity {
            tables: "A, B".to_string(),
        };
        assert!(err.path().is_none());
        assert!(err.to_string().contains("A, B"));
        assert_eq!(err.clone().into_fatal(), err);
    }

    #[test]
    fn test_error_with_context() {
        let err = BindingError::annotation_with_context(
            "Order.lines",
            "unknown target entity 'LineItem'",
            "While binding the collection key",
        );
        assert!(err.to_string().contains("Context: While binding the collection key"));
    }

    #[test]
    fn test_synthetic_property_names() {
        assert_eq!(synthetic_property_name("Order", "product", false), "_Order_product");
        assert_eq!(
            synthetic_property_name("Order", "shipping.address", false),
            "_Order_shipping_address"
        );
        assert_eq!(
            synthetic_property_name("Student", "courses", true),
            "_Student_courses_inverse"
        );
    }

    #[test]
    fn test_discriminator_values() {
        assert_eq!(
            discriminator_value("Car", None, DiscriminatorType::String).unwrap(),
            "Car"
        );
        assert_eq!(
            discriminator_value("Car", None, DiscriminatorType::Integer).unwrap(),
            jvm_string_hash("Car").to_string()
        );
        assert_eq!(
            discriminator_value("Car", Some("7"), DiscriminatorType::Integer).unwrap(),
            "7"
        );
        assert!(discriminator_value("Car", Some("seven"), DiscriminatorType::Integer).is_err());
    }
}

//! Metadata source loading.
//!
//! Descriptor files are YAML or JSON documents with the following structure:
//!
//! ```yaml
//! generators:                # Globally registered identifier generators
//!   - name: order_seq
//!     kind: sequence
//!     sequence_name: ORDER_SEQ
//! filter_definitions:        # Named filters and their default conditions
//!   - name: active
//!     default_condition: "deleted = false"
//! classes:                   # Class descriptors, any order
//!   - name: com.acme.Customer
//!     properties:
//!       - name: id
//!         type_name: Long
//!         id: true
//!   - name: com.acme.Order
//!     properties:
//!       - name: customer
//!         type_name: com.acme.Customer
//!         many_to_one: {}
//! ```
//!
//! Loading only checks that the document is well formed and that class names
//! are unique; everything else is the binder's job.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use super::descriptors::{ClassDescriptor, FilterDefinition, GeneratorAnnotation};
use super::ordering::order_hierarchically;
use crate::binder::errors::{BindingError, BindingResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataSource {
    #[serde(default)]
    pub generators: Vec<GeneratorAnnotation>,
    #[serde(default)]
    pub filter_definitions: Vec<FilterDefinition>,
    #[serde(default)]
    pub classes: Vec<ClassDescriptor>,
}

impl MetadataSource {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> BindingResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| BindingError::SourceReadError {
            error: e.to_string(),
        })?;

        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> BindingResult<Self> {
        let source: Self =
            serde_yaml::from_str(yaml).map_err(|e| BindingError::SourceParseError {
                error: e.to_string(),
            })?;
        source.validate()?;
        Ok(source)
    }

    pub fn from_json_str(json: &str) -> BindingResult<Self> {
        let source: Self =
            serde_json::from_str(json).map_err(|e| BindingError::SourceParseError {
                error: e.to_string(),
            })?;
        source.validate()?;
        Ok(source)
    }

    /// Structural checks that do not need binding.
    pub fn validate(&self) -> BindingResult<()> {
        let mut seen = HashSet::new();
        for class in &self.classes {
            if !seen.insert(class.name.as_str()) {
                return Err(BindingError::annotation(
                    &class.name,
                    "duplicate class descriptor",
                ));
            }
        }

        let mut generator_names = HashSet::new();
        for generator in &self.generators {
            if !generator_names.insert(generator.name.as_str()) {
                return Err(BindingError::annotation(
                    &generator.name,
                    "duplicate global identifier generator",
                ));
            }
        }

        let mut filter_names = HashSet::new();
        for filter in &self.filter_definitions {
            if !filter_names.insert(filter.name.as_str()) {
                return Err(BindingError::annotation(&filter.name, "duplicate filter definition"));
            }
        }

        Ok(())
    }

    /// Classes ordered superclass-first, ready for binding.
    pub fn ordered_classes(&self) -> BindingResult<Vec<ClassDescriptor>> {
        order_hierarchically(&self.classes)
    }
}

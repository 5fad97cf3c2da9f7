//! Integration tests - Bind complete descriptor sets end to end
//!
//! These tests load YAML descriptors the way the CLI does and assert on the
//! resulting mapping model.

mod association_tests;
mod collection_tests;
mod identifier_tests;
mod inheritance_tests;
mod second_pass_tests;
mod table_tests;

use mapbind::model::{ForeignKey, Table};
use mapbind::naming::Identifier;
use mapbind::{bind, BindingResult, BuildOptions, MappingModel, MetadataSource};

/// Bind a YAML descriptor document with default options.
pub fn bind_yaml(yaml: &str) -> BindingResult<MappingModel> {
    bind_yaml_with(yaml, &BuildOptions::default())
}

pub fn bind_yaml_with(yaml: &str, options: &BuildOptions) -> BindingResult<MappingModel> {
    let source = MetadataSource::from_yaml_str(yaml)?;
    bind(&source, options)
}

pub fn column_names(columns: &[Identifier]) -> Vec<String> {
    columns.iter().map(|c| c.text().to_string()).collect()
}

/// Foreign keys of `table` pointing at the table named `referenced`.
pub fn foreign_keys_to<'a>(model: &'a MappingModel, table: &'a Table, referenced: &str) -> Vec<&'a ForeignKey> {
    table
        .foreign_keys
        .iter()
        .filter(|fk| model.table_of(fk.referenced_table).name.text() == referenced)
        .collect()
}

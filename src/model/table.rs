//! Relational side of the mapping model: tables and everything they own.

use serde::Serialize;

use crate::naming::Identifier;

/// Index of a [`Table`] in the collector arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: Identifier,
    pub sql_type: Option<String>,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    pub unique: bool,
    pub default_value: Option<String>,
    pub generated_as: Option<String>,
    pub check_constraint: Option<String>,
    pub comment: Option<String>,
    pub read_expression: Option<String>,
    pub write_expression: Option<String>,
}

impl Column {
    pub fn new(name: Identifier) -> Self {
        Column {
            name,
            sql_type: None,
            length: None,
            precision: None,
            scale: None,
            nullable: true,
            unique: false,
            default_value: None,
            generated_as: None,
            check_constraint: None,
            comment: None,
            read_expression: None,
            write_expression: None,
        }
    }

    pub fn canonical_name(&self) -> String {
        self.name.canonical_name()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrimaryKey {
    pub name: Option<String>,
    pub columns: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKey {
    pub name: Option<String>,
    pub columns: Vec<Identifier>,
    pub referenced_entity: String,
    pub referenced_table: TableId,
    /// Empty when the key references the primary key.
    pub referenced_columns: Vec<Identifier>,
    pub cascade_delete: bool,
}

impl ForeignKey {
    pub fn is_referencing_primary_key(&self) -> bool {
        self.referenced_columns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniqueKey {
    pub name: String,
    pub columns: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub name: Identifier,
    pub schema: Option<Identifier>,
    pub catalog: Option<Identifier>,
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub foreign_keys: Vec<ForeignKey>,
    pub unique_keys: Vec<UniqueKey>,
    pub indexes: Vec<Index>,
    pub checks: Vec<String>,
    pub comment: Option<String>,
    /// Abstract union table of a TABLE_PER_CLASS root.
    pub is_abstract: bool,
}

impl Table {
    pub fn new(name: Identifier) -> Self {
        Table {
            name,
            schema: None,
            catalog: None,
            columns: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            unique_keys: Vec::new(),
            indexes: Vec::new(),
            checks: Vec::new(),
            comment: None,
            is_abstract: false,
        }
    }

    /// Qualified name used for lookups and diagnostics.
    pub fn qualified_name(&self) -> String {
        let mut parts = Vec::new();
        if let Some(catalog) = &self.catalog {
            parts.push(catalog.render());
        }
        if let Some(schema) = &self.schema {
            parts.push(schema.render());
        }
        parts.push(self.name.render());
        parts.join(".")
    }

    pub fn get_column(&self, name: &Identifier) -> Option<&Column> {
        let canonical = name.canonical_name();
        self.columns.iter().find(|c| c.canonical_name() == canonical)
    }

    pub fn get_column_mut(&mut self, name: &Identifier) -> Option<&mut Column> {
        let canonical = name.canonical_name();
        self.columns
            .iter_mut()
            .find(|c| c.canonical_name() == canonical)
    }

    pub fn has_column(&self, name: &Identifier) -> bool {
        self.get_column(name).is_some()
    }

    /// Add a column; a column with the same name is kept and returned instead.
    pub fn add_column(&mut self, column: Column) -> &Column {
        let canonical = column.canonical_name();
        match self
            .columns
            .iter()
            .position(|c| c.canonical_name() == canonical)
        {
            Some(position) => &self.columns[position],
            None => {
                self.columns.push(column);
                &self.columns[self.columns.len() - 1]
            }
        }
    }

    pub fn primary_key_columns(&self) -> &[Identifier] {
        self.primary_key
            .as_ref()
            .map(|pk| pk.columns.as_slice())
            .unwrap_or(&[])
    }

    /// Add a unique key unless one over the same columns already exists.
    pub fn add_unique_key(&mut self, name: Option<&str>, columns: Vec<Identifier>) -> String {
        if let Some(existing) = self
            .unique_keys
            .iter()
            .find(|uk| same_columns(&uk.columns, &columns))
        {
            return existing.name.clone();
        }
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("UK_{}_{}", self.name.text(), self.unique_keys.len() + 1));
        self.unique_keys.push(UniqueKey {
            name: name.clone(),
            columns,
        });
        name
    }

    pub fn add_index(&mut self, name: Option<&str>, columns: Vec<Identifier>) -> String {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("IDX_{}_{}", self.name.text(), self.indexes.len() + 1));
        self.indexes.push(Index {
            name: name.clone(),
            columns,
        });
        name
    }

    /// Add a foreign key unless an identical one is already registered.
    pub fn add_foreign_key(&mut self, foreign_key: ForeignKey) {
        let duplicate = self.foreign_keys.iter().any(|fk| {
            fk.referenced_table == foreign_key.referenced_table
                && same_columns(&fk.columns, &foreign_key.columns)
                && same_columns(&fk.referenced_columns, &foreign_key.referenced_columns)
        });
        if !duplicate {
            self.foreign_keys.push(foreign_key);
        }
    }
}

fn same_columns(left: &[Identifier], right: &[Identifier]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|(l, r)| l.canonical_name() == r.canonical_name())
}

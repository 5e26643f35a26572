//! Catalog data model shared by providers, the collector and the writer.
//!
//! A [`DatabaseCatalog`] is what a provider sees in one database, shaped like
//! the server's own object collections: tables carry their triggers and
//! indexes, everything else is a flat list. The collector turns it into
//! [`CategoryBucket`]s of [`CatalogObject`]s, and the writer consumes those.

use serde::{Deserialize, Serialize};

/// Kind of exported object.
///
/// Each category is written to its own subdirectory of the per-database
/// output directory; see [`ObjectCategory::directory_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectCategory {
    Table,
    View,
    StoredProcedure,
    UserDefinedFunction,
    UserDefinedTableType,
    TableTrigger,
    DatabaseTrigger,
    Index,
}

impl ObjectCategory {
    /// Categories in the order a describe run processes them.
    pub const PROCESSING_ORDER: [ObjectCategory; 8] = [
        ObjectCategory::Table,
        ObjectCategory::TableTrigger,
        ObjectCategory::Index,
        ObjectCategory::View,
        ObjectCategory::StoredProcedure,
        ObjectCategory::DatabaseTrigger,
        ObjectCategory::UserDefinedFunction,
        ObjectCategory::UserDefinedTableType,
    ];

    /// Name of the output subdirectory for this category.
    pub fn directory_name(self) -> &'static str {
        match self {
            ObjectCategory::Table => "Tables",
            ObjectCategory::View => "Views",
            ObjectCategory::StoredProcedure => "StoredProcedures",
            ObjectCategory::UserDefinedFunction => "UserDefinedFunctions",
            ObjectCategory::UserDefinedTableType => "UserDefinedTableType",
            ObjectCategory::TableTrigger => "TableTriggers",
            ObjectCategory::DatabaseTrigger => "DatabaseTriggers",
            ObjectCategory::Index => "TableIndexes",
        }
    }

    /// Element name used in the URN path, mirroring SQL Server's object model.
    pub fn urn_element(self) -> &'static str {
        match self {
            ObjectCategory::Table => "Table",
            ObjectCategory::View => "View",
            ObjectCategory::StoredProcedure => "StoredProcedure",
            ObjectCategory::UserDefinedFunction => "UserDefinedFunction",
            ObjectCategory::UserDefinedTableType => "UserDefinedTableType",
            ObjectCategory::TableTrigger | ObjectCategory::DatabaseTrigger => "Trigger",
            ObjectCategory::Index => "Index",
        }
    }

    /// Whether the schema allow-list applies to this category.
    ///
    /// Indexes are collected for every table and database triggers have no
    /// schema, so neither is filtered.
    pub fn enforces_allow_list(self) -> bool {
        !matches!(self, ObjectCategory::Index | ObjectCategory::DatabaseTrigger)
    }
}

impl std::fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.directory_name())
    }
}

/// Stable identifier that lets the scripting engine re-locate an object
/// without resolving it by name again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Urn {
    pub database: String,
    pub category: ObjectCategory,
    pub schema: Option<String>,
    /// Owning table for indexes and table triggers
    pub parent: Option<String>,
    pub name: String,
    /// Server object id; the owning table's id for indexes and the
    /// `user_type_id` for table types
    pub object_id: i32,
    pub index_id: Option<i32>,
}

impl std::fmt::Display for Urn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Database[@Name='{}']", escape_urn(&self.database))?;
        if let Some(parent) = &self.parent {
            write!(f, "/Table[@Name='{}'", escape_urn(parent))?;
            if let Some(schema) = &self.schema {
                write!(f, " and @Schema='{}'", escape_urn(schema))?;
            }
            f.write_str("]")?;
            return write!(
                f,
                "/{}[@Name='{}']",
                self.category.urn_element(),
                escape_urn(&self.name)
            );
        }
        write!(
            f,
            "/{}[@Name='{}'",
            self.category.urn_element(),
            escape_urn(&self.name)
        )?;
        if let Some(schema) = &self.schema {
            write!(f, " and @Schema='{}'", escape_urn(schema))?;
        }
        f.write_str("]")
    }
}

fn escape_urn(value: &str) -> String {
    value.replace('\'', "''")
}

/// Catalog Object Record: one exportable object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogObject {
    pub name: String,
    pub urn: Urn,
    pub category: ObjectCategory,
}

impl std::fmt::Display for CatalogObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.urn.schema {
            Some(schema) if self.urn.parent.is_none() => write!(f, "{}.{}", schema, self.name),
            _ => f.write_str(&self.name),
        }
    }
}

/// Ordered collection of objects sharing one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBucket {
    pub category: ObjectCategory,
    pub objects: Vec<CatalogObject>,
}

impl CategoryBucket {
    pub fn new(category: ObjectCategory) -> Self {
        Self {
            category,
            objects: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Comma-separated object names, used when logging a failed bucket.
    pub fn describe_contents(&self) -> String {
        self.objects
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Schema-scoped object as reported by a catalog provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub schema: Option<String>,
    pub object_id: i32,
}

impl CatalogEntry {
    pub fn new(schema: Option<&str>, name: impl Into<String>, object_id: i32) -> Self {
        Self {
            name: name.into(),
            schema: schema.map(str::to_string),
            object_id,
        }
    }
}

/// Index nested under a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub index_id: i32,
}

/// Table with its nested trigger and index collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub table: CatalogEntry,
    pub triggers: Vec<CatalogEntry>,
    pub indexes: Vec<IndexEntry>,
}

impl TableEntry {
    pub fn new(table: CatalogEntry) -> Self {
        Self {
            table,
            triggers: Vec::new(),
            indexes: Vec::new(),
        }
    }
}

/// Everything a provider enumerated in one database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCatalog {
    pub name: String,
    pub tables: Vec<TableEntry>,
    pub views: Vec<CatalogEntry>,
    pub procedures: Vec<CatalogEntry>,
    pub functions: Vec<CatalogEntry>,
    pub table_types: Vec<CatalogEntry>,
    pub database_triggers: Vec<CatalogEntry>,
}

impl DatabaseCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

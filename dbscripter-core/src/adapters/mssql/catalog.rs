//! Catalog enumeration from the `sys` views.

use super::{SqlServerSession, get_i32, get_opt_str, get_str};
use crate::Result;
use crate::adapters::CatalogProvider;
use crate::models::{CatalogEntry, DatabaseCatalog, IndexEntry, TableEntry};
use async_trait::async_trait;
use std::collections::HashMap;

const DATABASES_SQL: &str = "SELECT name FROM sys.databases ORDER BY database_id";

const TABLES_SQL: &str = "
    SELECT t.object_id, s.name, t.name
    FROM sys.tables t
    JOIN sys.schemas s ON s.schema_id = t.schema_id
    WHERE (@P1 = 1 OR t.is_ms_shipped = 0)
    ORDER BY s.name, t.name";

const TABLE_TRIGGERS_SQL: &str = "
    SELECT tr.object_id, tr.parent_id, tr.name
    FROM sys.triggers tr
    JOIN sys.tables t ON t.object_id = tr.parent_id
    WHERE tr.parent_class = 1 AND (@P1 = 1 OR tr.is_ms_shipped = 0)
    ORDER BY tr.name";

const INDEXES_SQL: &str = "
    SELECT i.object_id, i.index_id, i.name
    FROM sys.indexes i
    JOIN sys.tables t ON t.object_id = i.object_id
    WHERE i.type > 0 AND i.is_hypothetical = 0 AND i.name IS NOT NULL
      AND (@P1 = 1 OR t.is_ms_shipped = 0)
    ORDER BY i.object_id, i.index_id";

const VIEWS_SQL: &str = "
    SELECT v.object_id, s.name, v.name
    FROM sys.views v
    JOIN sys.schemas s ON s.schema_id = v.schema_id
    WHERE (@P1 = 1 OR v.is_ms_shipped = 0)
    ORDER BY s.name, v.name";

const PROCEDURES_SQL: &str = "
    SELECT p.object_id, s.name, p.name
    FROM sys.procedures p
    JOIN sys.schemas s ON s.schema_id = p.schema_id
    WHERE (@P1 = 1 OR p.is_ms_shipped = 0)
    ORDER BY s.name, p.name";

const FUNCTIONS_SQL: &str = "
    SELECT o.object_id, s.name, o.name
    FROM sys.objects o
    JOIN sys.schemas s ON s.schema_id = o.schema_id
    WHERE o.type IN ('FN', 'IF', 'TF', 'FS', 'FT')
      AND (@P1 = 1 OR o.is_ms_shipped = 0)
    ORDER BY s.name, o.name";

const TABLE_TYPES_SQL: &str = "
    SELECT tt.user_type_id, s.name, tt.name
    FROM sys.table_types tt
    JOIN sys.schemas s ON s.schema_id = tt.schema_id
    WHERE tt.is_user_defined = 1
    ORDER BY s.name, tt.name";

const DATABASE_TRIGGERS_SQL: &str = "
    SELECT tr.object_id, tr.name
    FROM sys.triggers tr
    WHERE tr.parent_class = 0 AND (@P1 = 1 OR tr.is_ms_shipped = 0)
    ORDER BY tr.name";

impl SqlServerSession {
    async fn schema_objects(
        &mut self,
        sql: &str,
        include_system_objects: bool,
        context: &str,
    ) -> Result<Vec<CatalogEntry>> {
        let rows = self.fetch(sql, &[&include_system_objects], context).await?;
        rows.iter()
            .map(|row| -> Result<CatalogEntry> {
                Ok(CatalogEntry {
                    object_id: get_i32(row, 0, context)?,
                    schema: get_opt_str(row, 1, context)?,
                    name: get_str(row, 2, context)?,
                })
            })
            .collect()
    }

    async fn tables(&mut self, include_system_objects: bool) -> Result<Vec<TableEntry>> {
        let mut tables: Vec<TableEntry> = self
            .schema_objects(TABLES_SQL, include_system_objects, "Failed to list tables")
            .await?
            .into_iter()
            .map(TableEntry::new)
            .collect();
        let positions: HashMap<i32, usize> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.table.object_id, i))
            .collect();

        let context = "Failed to list table triggers";
        for row in self.fetch(TABLE_TRIGGERS_SQL, &[&include_system_objects], context).await? {
            let parent_id = get_i32(&row, 1, context)?;
            if let Some(&pos) = positions.get(&parent_id) {
                let schema = tables[pos].table.schema.clone();
                tables[pos].triggers.push(CatalogEntry {
                    object_id: get_i32(&row, 0, context)?,
                    schema,
                    name: get_str(&row, 2, context)?,
                });
            }
        }

        let context = "Failed to list indexes";
        for row in self.fetch(INDEXES_SQL, &[&include_system_objects], context).await? {
            let table_id = get_i32(&row, 0, context)?;
            if let Some(&pos) = positions.get(&table_id) {
                tables[pos].indexes.push(IndexEntry {
                    index_id: get_i32(&row, 1, context)?,
                    name: get_str(&row, 2, context)?,
                });
            }
        }

        Ok(tables)
    }
}

#[async_trait]
impl CatalogProvider for SqlServerSession {
    async fn list_databases(&mut self) -> Result<Vec<String>> {
        let context = "Failed to list databases";
        let rows = self.fetch(DATABASES_SQL, &[], context).await?;
        rows.iter().map(|row| get_str(row, 0, context)).collect()
    }

    async fn load_catalog(
        &mut self,
        database: &str,
        include_system_objects: bool,
    ) -> Result<DatabaseCatalog> {
        self.use_database(database).await?;
        tracing::debug!("Enumerating objects in {}", database);

        let mut catalog = DatabaseCatalog::new(database);
        catalog.tables = self.tables(include_system_objects).await?;
        catalog.views = self
            .schema_objects(VIEWS_SQL, include_system_objects, "Failed to list views")
            .await?;
        catalog.procedures = self
            .schema_objects(PROCEDURES_SQL, include_system_objects, "Failed to list procedures")
            .await?;
        catalog.functions = self
            .schema_objects(FUNCTIONS_SQL, include_system_objects, "Failed to list functions")
            .await?;
        catalog.table_types = self
            .schema_objects(TABLE_TYPES_SQL, include_system_objects, "Failed to list table types")
            .await?;

        let context = "Failed to list database triggers";
        let rows = self
            .fetch(DATABASE_TRIGGERS_SQL, &[&include_system_objects], context)
            .await?;
        catalog.database_triggers = rows
            .iter()
            .map(|row| -> Result<CatalogEntry> {
                Ok(CatalogEntry {
                    object_id: get_i32(row, 0, context)?,
                    schema: None,
                    name: get_str(row, 1, context)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            "{}: {} tables, {} views, {} procedures, {} functions, {} table types, {} database triggers",
            database,
            catalog.tables.len(),
            catalog.views.len(),
            catalog.procedures.len(),
            catalog.functions.len(),
            catalog.table_types.len(),
            catalog.database_triggers.len()
        );
        Ok(catalog)
    }
}

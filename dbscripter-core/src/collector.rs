//! Classifies catalog entries into per-category buckets.
//!
//! Tables, views, procedures, functions and table types are kept only when
//! their schema is on the allow-list. Table triggers follow their parent
//! table's schema. Indexes are taken from every table and database
//! triggers have no schema, so neither is filtered.

use crate::config::SchemaAllowList;
use crate::models::{
    CatalogEntry, CatalogObject, CategoryBucket, DatabaseCatalog, ObjectCategory, TableEntry, Urn,
};

/// Builds [`CategoryBucket`]s from a [`DatabaseCatalog`].
#[derive(Debug, Clone, Default)]
pub struct Collector {
    allow_list: SchemaAllowList,
}

impl Collector {
    pub fn new(allow_list: SchemaAllowList) -> Self {
        Self { allow_list }
    }

    /// Produces one bucket per category, in processing order.
    pub fn collect(&self, catalog: &DatabaseCatalog) -> Vec<CategoryBucket> {
        ObjectCategory::PROCESSING_ORDER
            .iter()
            .map(|&category| self.bucket(catalog, category))
            .collect()
    }

    /// Produces the bucket for a single category.
    pub fn bucket(&self, catalog: &DatabaseCatalog, category: ObjectCategory) -> CategoryBucket {
        let mut bucket = CategoryBucket::new(category);
        let db = catalog.name.as_str();

        match category {
            ObjectCategory::Table => {
                for table in &catalog.tables {
                    self.push_schema_object(&mut bucket, db, &table.table);
                }
            }
            ObjectCategory::TableTrigger => {
                for table in &catalog.tables {
                    if !self.admits(category, table.table.schema.as_deref()) {
                        continue;
                    }
                    for trigger in &table.triggers {
                        bucket.objects.push(nested_object(
                            db,
                            table,
                            category,
                            &trigger.name,
                            trigger.object_id,
                            None,
                        ));
                    }
                }
            }
            ObjectCategory::Index => {
                for table in &catalog.tables {
                    for index in &table.indexes {
                        bucket.objects.push(nested_object(
                            db,
                            table,
                            category,
                            &index.name,
                            table.table.object_id,
                            Some(index.index_id),
                        ));
                    }
                }
            }
            ObjectCategory::View => {
                for view in &catalog.views {
                    self.push_schema_object(&mut bucket, db, view);
                }
            }
            ObjectCategory::StoredProcedure => {
                for procedure in &catalog.procedures {
                    self.push_schema_object(&mut bucket, db, procedure);
                }
            }
            ObjectCategory::UserDefinedFunction => {
                for function in &catalog.functions {
                    self.push_schema_object(&mut bucket, db, function);
                }
            }
            ObjectCategory::UserDefinedTableType => {
                for table_type in &catalog.table_types {
                    self.push_schema_object(&mut bucket, db, table_type);
                }
            }
            ObjectCategory::DatabaseTrigger => {
                for trigger in &catalog.database_triggers {
                    bucket.objects.push(CatalogObject {
                        name: trigger.name.clone(),
                        urn: Urn {
                            database: db.to_string(),
                            category,
                            schema: None,
                            parent: None,
                            name: trigger.name.clone(),
                            object_id: trigger.object_id,
                            index_id: None,
                        },
                        category,
                    });
                }
            }
        }

        tracing::debug!("Collected {} {} objects", bucket.len(), category);
        bucket
    }

    fn admits(&self, category: ObjectCategory, schema: Option<&str>) -> bool {
        !category.enforces_allow_list() || self.allow_list.allows(schema)
    }

    fn push_schema_object(&self, bucket: &mut CategoryBucket, database: &str, entry: &CatalogEntry) {
        if !self.admits(bucket.category, entry.schema.as_deref()) {
            tracing::trace!(
                "Skipping {} {:?}.{}: schema not allowed",
                bucket.category,
                entry.schema,
                entry.name
            );
            return;
        }
        bucket.objects.push(CatalogObject {
            name: entry.name.clone(),
            urn: Urn {
                database: database.to_string(),
                category: bucket.category,
                schema: entry.schema.clone(),
                parent: None,
                name: entry.name.clone(),
                object_id: entry.object_id,
                index_id: None,
            },
            category: bucket.category,
        });
    }
}

fn nested_object(
    database: &str,
    table: &TableEntry,
    category: ObjectCategory,
    name: &str,
    object_id: i32,
    index_id: Option<i32>,
) -> CatalogObject {
    CatalogObject {
        name: name.to_string(),
        urn: Urn {
            database: database.to_string(),
            category,
            schema: table.table.schema.clone(),
            parent: Some(table.table.name.clone()),
            name: name.to_string(),
            object_id,
            index_id,
        },
        category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndexEntry;

    fn catalog() -> DatabaseCatalog {
        let mut orders = TableEntry::new(CatalogEntry::new(Some("dbo"), "Orders", 10));
        orders
            .triggers
            .push(CatalogEntry::new(Some("dbo"), "trg_Orders_Audit", 11));
        orders.indexes.push(IndexEntry {
            name: "PK_Orders".to_string(),
            index_id: 1,
        });

        let mut audit = TableEntry::new(CatalogEntry::new(Some("audit"), "Events", 20));
        audit
            .triggers
            .push(CatalogEntry::new(Some("audit"), "trg_Events", 21));
        audit.indexes.push(IndexEntry {
            name: "IX_Events_At".to_string(),
            index_id: 2,
        });

        DatabaseCatalog {
            name: "sales".to_string(),
            tables: vec![orders, audit],
            views: vec![
                CatalogEntry::new(Some("dbo"), "OrderSummary", 30),
                CatalogEntry::new(Some("report"), "Daily", 31),
            ],
            procedures: vec![CatalogEntry::new(Some("audit"), "usp_Purge", 40)],
            functions: vec![CatalogEntry::new(Some("dbo"), "fn_Total", 50)],
            table_types: vec![CatalogEntry::new(Some("dbo"), "OrderLines", 257)],
            database_triggers: vec![CatalogEntry::new(None, "ddl_Guard", 60)],
        }
    }

    fn names(bucket: &CategoryBucket) -> Vec<&str> {
        bucket.objects.iter().map(|o| o.name.as_str()).collect()
    }

    #[test]
    fn test_collect_returns_buckets_in_processing_order() {
        let buckets = Collector::default().collect(&catalog());
        let order: Vec<_> = buckets.iter().map(|b| b.category).collect();
        assert_eq!(order, ObjectCategory::PROCESSING_ORDER.to_vec());
    }

    #[test]
    fn test_allow_list_filters_schema_objects() {
        let collector = Collector::default();
        let catalog = catalog();

        assert_eq!(
            names(&collector.bucket(&catalog, ObjectCategory::Table)),
            ["Orders"]
        );
        assert_eq!(
            names(&collector.bucket(&catalog, ObjectCategory::View)),
            ["OrderSummary"]
        );
        assert!(
            collector
                .bucket(&catalog, ObjectCategory::StoredProcedure)
                .is_empty()
        );
        assert_eq!(
            names(&collector.bucket(&catalog, ObjectCategory::UserDefinedFunction)),
            ["fn_Total"]
        );
        assert_eq!(
            names(&collector.bucket(&catalog, ObjectCategory::UserDefinedTableType)),
            ["OrderLines"]
        );
    }

    #[test]
    fn test_table_triggers_follow_parent_schema() {
        let bucket = Collector::default().bucket(&catalog(), ObjectCategory::TableTrigger);
        assert_eq!(names(&bucket), ["trg_Orders_Audit"]);

        let urn = &bucket.objects[0].urn;
        assert_eq!(urn.parent.as_deref(), Some("Orders"));
        assert_eq!(urn.object_id, 11);
    }

    #[test]
    fn test_indexes_ignore_allow_list() {
        let bucket = Collector::default().bucket(&catalog(), ObjectCategory::Index);
        assert_eq!(names(&bucket), ["PK_Orders", "IX_Events_At"]);

        let urn = &bucket.objects[1].urn;
        assert_eq!(urn.object_id, 20);
        assert_eq!(urn.index_id, Some(2));
        assert_eq!(urn.schema.as_deref(), Some("audit"));
    }

    #[test]
    fn test_database_triggers_are_separate_category() {
        let bucket = Collector::default().bucket(&catalog(), ObjectCategory::DatabaseTrigger);
        assert_eq!(names(&bucket), ["ddl_Guard"]);
        assert_eq!(bucket.objects[0].category, ObjectCategory::DatabaseTrigger);
        assert!(bucket.objects[0].urn.schema.is_none());
    }

    #[test]
    fn test_wider_allow_list() {
        let collector = Collector::new(SchemaAllowList::new(["dbo", "audit"]));
        let catalog = catalog();
        assert_eq!(
            names(&collector.bucket(&catalog, ObjectCategory::Table)),
            ["Orders", "Events"]
        );
        assert_eq!(
            names(&collector.bucket(&catalog, ObjectCategory::StoredProcedure)),
            ["usp_Purge"]
        );
    }

    #[test]
    fn test_empty_catalog_gives_empty_buckets() {
        let buckets = Collector::default().collect(&DatabaseCatalog::new("empty"));
        assert_eq!(buckets.len(), 8);
        assert!(buckets.iter().all(CategoryBucket::is_empty));
    }
}

//! Per-object metadata loading for the scripting engine.

use super::render::{
    self, ColumnDef, ComputedSpec, DefaultDef, IdentitySpec, IndexColumn, IndexDef, IndexKind,
    ModuleDef, TableDef,
};
use super::{SqlServerSession, get_bool, get_i32, get_opt_bool, get_opt_str, get_str};
use crate::Result;
use crate::adapters::ScriptEngine;
use crate::config::ScriptingOptions;
use crate::error::ScripterError;
use crate::models::{ObjectCategory, Urn};
use async_trait::async_trait;

const COLUMNS_SQL: &str = "
    SELECT c.name, ty.name, SCHEMA_NAME(ty.schema_id), ty.is_user_defined,
           CAST(c.max_length AS INT), CAST(c.precision AS INT), CAST(c.scale AS INT),
           c.is_nullable, c.collation_name,
           CAST(ic.seed_value AS NVARCHAR(64)), CAST(ic.increment_value AS NVARCHAR(64)),
           cc.definition, cc.is_persisted
    FROM sys.columns c
    JOIN sys.types ty ON ty.user_type_id = c.user_type_id
    LEFT JOIN sys.identity_columns ic ON ic.object_id = c.object_id AND ic.column_id = c.column_id
    LEFT JOIN sys.computed_columns cc ON cc.object_id = c.object_id AND cc.column_id = c.column_id
    WHERE c.object_id = @P1
    ORDER BY c.column_id";

const INDEXES_SQL: &str = "
    SELECT i.index_id, i.name, CAST(i.type AS INT), i.is_unique, i.is_primary_key,
           i.is_unique_constraint, i.filter_definition
    FROM sys.indexes i
    WHERE i.object_id = @P1 AND i.type > 0 AND i.is_hypothetical = 0
    ORDER BY i.index_id";

const INDEX_COLUMNS_SQL: &str = "
    SELECT ic.index_id, c.name, ic.is_descending_key, ic.is_included_column
    FROM sys.index_columns ic
    JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
    WHERE ic.object_id = @P1
    ORDER BY ic.index_id, ic.is_included_column, ic.key_ordinal, ic.index_column_id";

const DEFAULTS_SQL: &str = "
    SELECT dc.name, c.name, dc.definition
    FROM sys.default_constraints dc
    JOIN sys.columns c ON c.object_id = dc.parent_object_id AND c.column_id = dc.parent_column_id
    WHERE dc.parent_object_id = @P1
    ORDER BY c.column_id";

const MODULE_SQL: &str = "
    SELECT m.definition, m.uses_ansi_nulls, m.uses_quoted_identifier
    FROM sys.sql_modules m
    WHERE m.object_id = @P1";

const TRIGGER_STATE_SQL: &str = "SELECT is_disabled FROM sys.triggers WHERE object_id = @P1";

const TABLE_TYPE_SQL: &str = "
    SELECT tt.type_table_object_id
    FROM sys.table_types tt
    WHERE tt.user_type_id = @P1";

impl SqlServerSession {
    async fn load_columns(&mut self, object_id: i32) -> Result<Vec<ColumnDef>> {
        let context = "Failed to load columns";
        let rows = self.fetch(COLUMNS_SQL, &[&object_id], context).await?;
        rows.iter()
            .map(|row| -> Result<ColumnDef> {
                let identity = match (get_opt_str(row, 9, context)?, get_opt_str(row, 10, context)?) {
                    (Some(seed), Some(increment)) => Some(IdentitySpec { seed, increment }),
                    _ => None,
                };
                let computed = match get_opt_str(row, 11, context)? {
                    Some(definition) => Some(ComputedSpec {
                        definition,
                        persisted: get_bool(row, 12, context)?,
                    }),
                    None => None,
                };

                Ok(ColumnDef {
                    name: get_str(row, 0, context)?,
                    type_name: get_str(row, 1, context)?,
                    type_schema: get_opt_str(row, 2, context)?,
                    is_user_defined: get_bool(row, 3, context)?,
                    max_length: get_i32(row, 4, context)?,
                    precision: get_i32(row, 5, context)?,
                    scale: get_i32(row, 6, context)?,
                    is_nullable: get_opt_bool(row, 7, context)?.unwrap_or(true),
                    collation: get_opt_str(row, 8, context)?,
                    identity,
                    computed,
                })
            })
            .collect()
    }

    async fn load_indexes(&mut self, object_id: i32) -> Result<Vec<IndexDef>> {
        let context = "Failed to load indexes";
        let rows = self.fetch(INDEXES_SQL, &[&object_id], context).await?;
        let mut indexes = rows
            .iter()
            .map(|row| -> Result<IndexDef> {
                Ok(IndexDef {
                    index_id: get_i32(row, 0, context)?,
                    name: get_opt_str(row, 1, context)?.unwrap_or_default(),
                    kind: IndexKind::from_type_code(get_i32(row, 2, context)?),
                    is_unique: get_bool(row, 3, context)?,
                    is_primary_key: get_bool(row, 4, context)?,
                    is_unique_constraint: get_bool(row, 5, context)?,
                    filter: get_opt_str(row, 6, context)?,
                    columns: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let context = "Failed to load index columns";
        for row in self.fetch(INDEX_COLUMNS_SQL, &[&object_id], context).await? {
            let index_id = get_i32(&row, 0, context)?;
            if let Some(index) = indexes.iter_mut().find(|i| i.index_id == index_id) {
                index.columns.push(IndexColumn {
                    name: get_str(&row, 1, context)?,
                    descending: get_bool(&row, 2, context)?,
                    included: get_bool(&row, 3, context)?,
                });
            }
        }
        Ok(indexes)
    }

    async fn load_defaults(&mut self, object_id: i32) -> Result<Vec<DefaultDef>> {
        let context = "Failed to load default constraints";
        let rows = self.fetch(DEFAULTS_SQL, &[&object_id], context).await?;
        rows.iter()
            .map(|row| -> Result<DefaultDef> {
                Ok(DefaultDef {
                    name: get_str(row, 0, context)?,
                    column: get_str(row, 1, context)?,
                    definition: get_str(row, 2, context)?,
                })
            })
            .collect()
    }

    async fn load_module(&mut self, object_id: i32) -> Result<ModuleDef> {
        let context = "Failed to load module definition";
        let rows = self.fetch(MODULE_SQL, &[&object_id], context).await?;
        let Some(row) = rows.first() else {
            return Ok(ModuleDef {
                definition: None,
                uses_ansi_nulls: true,
                uses_quoted_identifier: true,
            });
        };
        Ok(ModuleDef {
            definition: get_opt_str(row, 0, context)?,
            uses_ansi_nulls: get_opt_bool(row, 1, context)?.unwrap_or(true),
            uses_quoted_identifier: get_opt_bool(row, 2, context)?.unwrap_or(true),
        })
    }

    async fn trigger_disabled(&mut self, object_id: i32) -> Result<bool> {
        let context = "Failed to load trigger state";
        let rows = self.fetch(TRIGGER_STATE_SQL, &[&object_id], context).await?;
        match rows.first() {
            Some(row) => get_bool(row, 0, context),
            None => Ok(false),
        }
    }

    async fn table_statements(&mut self, urn: &Urn, options: &ScriptingOptions) -> Result<Vec<String>> {
        let table = TableDef {
            schema: require_schema(urn)?.to_string(),
            name: urn.name.clone(),
            columns: self.load_columns(urn.object_id).await?,
            indexes: self.load_indexes(urn.object_id).await?,
            defaults: self.load_defaults(urn.object_id).await?,
        };
        if table.columns.is_empty() {
            return Err(ScripterError::scripting(urn.to_string(), "table not found"));
        }
        render::table_statements(&table, options)
    }

    async fn index_statements(&mut self, urn: &Urn, options: &ScriptingOptions) -> Result<Vec<String>> {
        let index_id = urn
            .index_id
            .ok_or_else(|| ScripterError::scripting(urn.to_string(), "index id missing"))?;
        let table = urn
            .parent
            .as_deref()
            .ok_or_else(|| ScripterError::scripting(urn.to_string(), "owning table missing"))?;

        let index = self
            .load_indexes(urn.object_id)
            .await?
            .into_iter()
            .find(|i| i.index_id == index_id)
            .ok_or_else(|| ScripterError::scripting(urn.to_string(), "index not found"))?;

        let sql = render::index_statement(require_schema(urn)?, table, &index, options)?;
        Ok(vec![sql])
    }

    async fn table_type_statements(
        &mut self,
        urn: &Urn,
        options: &ScriptingOptions,
    ) -> Result<Vec<String>> {
        let context = "Failed to load table type";
        let rows = self.fetch(TABLE_TYPE_SQL, &[&urn.object_id], context).await?;
        let type_table_id = match rows.first() {
            Some(row) => get_i32(row, 0, context)?,
            None => return Err(ScripterError::scripting(urn.to_string(), "table type not found")),
        };

        let columns = self.load_columns(type_table_id).await?;
        let indexes = self.load_indexes(type_table_id).await?;
        Ok(vec![render::create_table_type(
            require_schema(urn)?,
            &urn.name,
            &columns,
            &indexes,
            options,
        )])
    }

    async fn module_statements(&mut self, urn: &Urn, options: &ScriptingOptions) -> Result<Vec<String>> {
        let module = self.load_module(urn.object_id).await?;
        let mut statements = render::module_statements(&urn.to_string(), &module)?;

        match urn.category {
            ObjectCategory::TableTrigger => {
                if self.trigger_disabled(urn.object_id).await? {
                    let table = urn.parent.as_deref().ok_or_else(|| {
                        ScripterError::scripting(urn.to_string(), "owning table missing")
                    })?;
                    statements.push(render::disable_table_trigger(
                        require_schema(urn)?,
                        table,
                        &urn.name,
                        options,
                    ));
                }
            }
            ObjectCategory::DatabaseTrigger => {
                let disabled = self.trigger_disabled(urn.object_id).await?;
                statements.push(render::database_trigger_state(&urn.name, disabled));
            }
            _ => {}
        }
        Ok(statements)
    }
}

fn require_schema(urn: &Urn) -> Result<&str> {
    urn.schema
        .as_deref()
        .ok_or_else(|| ScripterError::scripting(urn.to_string(), "schema missing"))
}

/// Header kind label and display name for an object.
fn header_for(urn: &Urn, options: &ScriptingOptions) -> String {
    let (kind, name) = match urn.category {
        ObjectCategory::Table => ("Table", None),
        ObjectCategory::View => ("View", None),
        ObjectCategory::StoredProcedure => ("StoredProcedure", None),
        ObjectCategory::UserDefinedFunction => ("UserDefinedFunction", None),
        ObjectCategory::UserDefinedTableType => ("UserDefinedTableType", None),
        ObjectCategory::TableTrigger => ("Trigger", Some(render::quote_ident(&urn.name))),
        ObjectCategory::DatabaseTrigger => ("DdlTrigger", Some(render::quote_ident(&urn.name))),
        ObjectCategory::Index => ("Index", Some(render::quote_ident(&urn.name))),
    };
    let name = name.unwrap_or_else(|| {
        render::qualified_name(urn.schema.as_deref(), &urn.name, options.schema_qualify)
    });
    render::header(kind, &name)
}

#[async_trait]
impl ScriptEngine for SqlServerSession {
    async fn script_object(&mut self, urn: &Urn, options: &ScriptingOptions) -> Result<Vec<String>> {
        options.validate()?;
        self.use_database(&urn.database).await?;

        let body = match urn.category {
            ObjectCategory::Table => self.table_statements(urn, options).await?,
            ObjectCategory::Index => self.index_statements(urn, options).await?,
            ObjectCategory::UserDefinedTableType => self.table_type_statements(urn, options).await?,
            ObjectCategory::View
            | ObjectCategory::StoredProcedure
            | ObjectCategory::UserDefinedFunction
            | ObjectCategory::TableTrigger
            | ObjectCategory::DatabaseTrigger => self.module_statements(urn, options).await?,
        };

        Ok(render::with_preamble(
            &urn.database,
            Some(header_for(urn, options)),
            body,
            options,
        ))
    }
}

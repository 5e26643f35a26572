//! Pure DDL rendering for SQL Server objects.
//!
//! Nothing in here talks to the server. The session loads catalog rows into
//! the definition structs below and these functions turn them into
//! statements, which keeps the output format testable without a database.

use crate::Result;
use crate::config::ScriptingOptions;
use crate::error::ScripterError;

/// Brackets an identifier, doubling any `]` inside it.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// `[schema].[name]`, or `[name]` when unqualified or schema-less.
pub fn qualified_name(schema: Option<&str>, name: &str, schema_qualify: bool) -> String {
    match schema {
        Some(schema) if schema_qualify => format!("{}.{}", quote_ident(schema), quote_ident(name)),
        _ => quote_ident(name),
    }
}

/// Identity specification of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySpec {
    pub seed: String,
    pub increment: String,
}

/// Computed column expression, as stored in the catalog (parenthesized).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedSpec {
    pub definition: String,
    pub persisted: bool,
}

/// One column of a table or table type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: String,
    /// Schema of a user-defined alias type
    pub type_schema: Option<String>,
    pub is_user_defined: bool,
    /// Storage length in bytes; `-1` for `max`
    pub max_length: i32,
    pub precision: i32,
    pub scale: i32,
    pub is_nullable: bool,
    pub collation: Option<String>,
    pub identity: Option<IdentitySpec>,
    pub computed: Option<ComputedSpec>,
}

impl ColumnDef {
    /// Plain column of a system type; the rest can be set on the result.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            type_schema: None,
            is_user_defined: false,
            max_length: 0,
            precision: 0,
            scale: 0,
            is_nullable: true,
            collation: None,
            identity: None,
            computed: None,
        }
    }
}

/// Column reference inside an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    pub name: String,
    pub descending: bool,
    pub included: bool,
}

/// Physical kind of an index (`sys.indexes.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Clustered,
    Nonclustered,
    Xml,
    Spatial,
    ClusteredColumnstore,
    NonclusteredColumnstore,
    NonclusteredHash,
    Unknown(i32),
}

impl IndexKind {
    pub fn from_type_code(code: i32) -> Self {
        match code {
            1 => Self::Clustered,
            2 => Self::Nonclustered,
            3 => Self::Xml,
            4 => Self::Spatial,
            5 => Self::ClusteredColumnstore,
            6 => Self::NonclusteredColumnstore,
            7 => Self::NonclusteredHash,
            other => Self::Unknown(other),
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Clustered | Self::ClusteredColumnstore => "CLUSTERED",
            _ => "NONCLUSTERED",
        }
    }
}

/// An index or the index behind a key constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub index_id: i32,
    pub kind: IndexKind,
    pub is_unique: bool,
    pub is_primary_key: bool,
    pub is_unique_constraint: bool,
    pub filter: Option<String>,
    pub columns: Vec<IndexColumn>,
}

impl IndexDef {
    pub fn is_constraint(&self) -> bool {
        self.is_primary_key || self.is_unique_constraint
    }

    /// Whether this renderer can produce DDL for the index.
    pub fn is_scriptable(&self) -> bool {
        matches!(
            self.kind,
            IndexKind::Clustered
                | IndexKind::Nonclustered
                | IndexKind::ClusteredColumnstore
                | IndexKind::NonclusteredColumnstore
        )
    }

    fn key_columns(&self) -> impl Iterator<Item = &IndexColumn> {
        self.columns.iter().filter(|c| !c.included)
    }

    fn included_columns(&self) -> impl Iterator<Item = &IndexColumn> {
        self.columns.iter().filter(|c| c.included)
    }
}

/// Default constraint bound to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultDef {
    pub name: String,
    pub column: String,
    pub definition: String,
}

/// Everything needed to script a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<IndexDef>,
    pub defaults: Vec<DefaultDef>,
}

/// Text and settings of a SQL module (view, procedure, function, trigger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDef {
    /// `None` when the server hides the text, e.g. for encrypted modules
    pub definition: Option<String>,
    pub uses_ansi_nulls: bool,
    pub uses_quoted_identifier: bool,
}

fn on_off(flag: bool) -> &'static str {
    if flag { "ON" } else { "OFF" }
}

/// Renders a column's data type the way SQL Server tools print it.
pub fn format_data_type(column: &ColumnDef) -> String {
    if column.is_user_defined {
        return match &column.type_schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&column.type_name)),
            None => quote_ident(&column.type_name),
        };
    }

    let base = quote_ident(&column.type_name);
    match column.type_name.to_lowercase().as_str() {
        "varchar" | "char" | "varbinary" | "binary" => {
            format!("{}({})", base, length_spec(column.max_length))
        }
        "nvarchar" | "nchar" => {
            let length = if column.max_length == -1 {
                -1
            } else {
                column.max_length / 2
            };
            format!("{}({})", base, length_spec(length))
        }
        "decimal" | "numeric" => format!("{}({}, {})", base, column.precision, column.scale),
        "datetime2" | "time" | "datetimeoffset" => format!("{}({})", base, column.scale),
        _ => base,
    }
}

fn length_spec(length: i32) -> String {
    if length == -1 {
        "max".to_string()
    } else {
        length.to_string()
    }
}

/// One column line inside a `CREATE TABLE` or `CREATE TYPE` body.
pub fn column_definition(column: &ColumnDef, options: &ScriptingOptions) -> String {
    let mut line = quote_ident(&column.name);

    if let Some(computed) = &column.computed {
        line.push_str("  AS ");
        line.push_str(&computed.definition);
        if computed.persisted {
            line.push_str(" PERSISTED");
            if !column.is_nullable {
                line.push_str(" NOT NULL");
            }
        }
        return line;
    }

    line.push(' ');
    line.push_str(&format_data_type(column));

    if let Some(identity) = &column.identity {
        line.push_str(&format!(" IDENTITY({},{})", identity.seed, identity.increment));
    }
    if let Some(collation) = &column.collation
        && !options.no_collation
    {
        line.push_str(" COLLATE ");
        line.push_str(collation);
    }
    line.push_str(if column.is_nullable { " NULL" } else { " NOT NULL" });
    line
}

fn key_column_list(index: &IndexDef) -> String {
    index
        .key_columns()
        .map(|c| {
            format!(
                "\t{} {}",
                quote_ident(&c.name),
                if c.descending { "DESC" } else { "ASC" }
            )
        })
        .collect::<Vec<_>>()
        .join(",\n")
}

fn key_constraint_body(index: &IndexDef) -> String {
    let kind = if index.is_primary_key {
        "PRIMARY KEY"
    } else {
        "UNIQUE"
    };
    format!(
        "{} {}\n(\n{}\n)",
        kind,
        index.kind.keyword(),
        key_column_list(index)
    )
}

/// Key constraint clause inside a `CREATE TABLE` body.
fn inline_constraint(index: &IndexDef) -> String {
    format!(
        " CONSTRAINT {} {}",
        quote_ident(&index.name),
        key_constraint_body(index)
    )
}

/// `CREATE TABLE` statement with inline key constraints.
pub fn create_table(table: &TableDef, options: &ScriptingOptions) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("\t{}", column_definition(c, options)))
        .collect();
    lines.extend(
        table
            .indexes
            .iter()
            .filter(|i| i.is_constraint())
            .map(inline_constraint),
    );

    format!(
        "CREATE TABLE {}(\n{}\n)",
        qualified_name(Some(&table.schema), &table.name, options.schema_qualify),
        lines.join(",\n")
    )
}

/// `ALTER TABLE … ADD CONSTRAINT … DEFAULT … FOR …`.
pub fn default_constraint(table: &TableDef, default: &DefaultDef, options: &ScriptingOptions) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} DEFAULT {} FOR {}",
        qualified_name(Some(&table.schema), &table.name, options.schema_qualify),
        quote_ident(&default.name),
        default.definition,
        quote_ident(&default.column)
    )
}

/// Statement that recreates one index on `schema.table`.
///
/// Key-constraint indexes come out as `ALTER TABLE … ADD CONSTRAINT`.
///
/// # Errors
/// Returns an unsupported-object error for XML, spatial, hash and unknown
/// index kinds
pub fn index_statement(
    schema: &str,
    table: &str,
    index: &IndexDef,
    options: &ScriptingOptions,
) -> Result<String> {
    let table_name = qualified_name(Some(schema), table, options.schema_qualify);

    if !index.is_scriptable() {
        return Err(ScripterError::unsupported_object(
            format!("{}.{}", table_name, quote_ident(&index.name)),
            format!("{:?} indexes cannot be scripted", index.kind),
        ));
    }

    if index.is_constraint() {
        return Ok(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {}",
            table_name,
            quote_ident(&index.name),
            key_constraint_body(index)
        ));
    }

    let mut sql = match index.kind {
        IndexKind::ClusteredColumnstore => {
            return Ok(format!(
                "CREATE CLUSTERED COLUMNSTORE INDEX {} ON {}",
                quote_ident(&index.name),
                table_name
            ));
        }
        IndexKind::NonclusteredColumnstore => {
            let columns = index
                .columns
                .iter()
                .map(|c| format!("\t{}", quote_ident(&c.name)))
                .collect::<Vec<_>>()
                .join(",\n");
            format!(
                "CREATE NONCLUSTERED COLUMNSTORE INDEX {} ON {}\n(\n{}\n)",
                quote_ident(&index.name),
                table_name,
                columns
            )
        }
        _ => format!(
            "CREATE {}{} INDEX {} ON {}\n(\n{}\n)",
            if index.is_unique { "UNIQUE " } else { "" },
            index.kind.keyword(),
            quote_ident(&index.name),
            table_name,
            key_column_list(index)
        ),
    };

    let included: Vec<String> = index
        .included_columns()
        .map(|c| quote_ident(&c.name))
        .collect();
    if !included.is_empty() && index.kind != IndexKind::NonclusteredColumnstore {
        sql.push_str(&format!("\nINCLUDE({})", included.join(",")));
    }
    if let Some(filter) = &index.filter {
        sql.push_str(&format!("\nWHERE {}", filter));
    }
    Ok(sql)
}

/// Statements for a full table script.
///
/// Indexes that cannot be scripted are left out while
/// `continue_on_error` is set.
///
/// # Errors
/// Returns the index error when `continue_on_error` is off
pub fn table_statements(table: &TableDef, options: &ScriptingOptions) -> Result<Vec<String>> {
    let mut statements = vec![
        "SET ANSI_NULLS ON".to_string(),
        "SET QUOTED_IDENTIFIER ON".to_string(),
    ];
    if options.ansi_padding {
        statements.push("SET ANSI_PADDING ON".to_string());
    }
    statements.push(create_table(table, options));

    for default in &table.defaults {
        statements.push(default_constraint(table, default, options));
    }

    if options.indexes {
        for index in &table.indexes {
            if index.is_constraint() {
                continue;
            }
            match index_statement(&table.schema, &table.name, index, options) {
                Ok(sql) => statements.push(sql),
                Err(e) if options.continue_on_error => {
                    tracing::debug!("Leaving index out of table script: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(statements)
}

/// `CREATE TYPE … AS TABLE` statement.
pub fn create_table_type(
    schema: &str,
    name: &str,
    columns: &[ColumnDef],
    indexes: &[IndexDef],
    options: &ScriptingOptions,
) -> String {
    let mut lines: Vec<String> = columns
        .iter()
        .map(|c| format!("\t{}", column_definition(c, options)))
        .collect();
    // Table type constraints carry system-generated names, so they stay unnamed
    lines.extend(
        indexes
            .iter()
            .filter(|i| i.is_constraint())
            .map(|i| format!("\t{}", key_constraint_body(i))),
    );

    format!(
        "CREATE TYPE {} AS TABLE(\n{}\n)",
        qualified_name(Some(schema), name, options.schema_qualify),
        lines.join(",\n")
    )
}

/// Settings plus the module text.
///
/// # Errors
/// Returns a scripting error when the definition is not available
pub fn module_statements(object: &str, module: &ModuleDef) -> Result<Vec<String>> {
    let definition = module.definition.as_deref().ok_or_else(|| {
        ScripterError::scripting(object, "definition is not available (encrypted module?)")
    })?;

    Ok(vec![
        format!("SET ANSI_NULLS {}", on_off(module.uses_ansi_nulls)),
        format!("SET QUOTED_IDENTIFIER {}", on_off(module.uses_quoted_identifier)),
        definition.trim().to_string(),
    ])
}

pub fn disable_table_trigger(schema: &str, table: &str, trigger: &str, options: &ScriptingOptions) -> String {
    format!(
        "ALTER TABLE {} DISABLE TRIGGER {}",
        qualified_name(Some(schema), table, options.schema_qualify),
        quote_ident(trigger)
    )
}

pub fn database_trigger_state(trigger: &str, disabled: bool) -> String {
    format!(
        "{} TRIGGER {} ON DATABASE",
        if disabled { "DISABLE" } else { "ENABLE" },
        quote_ident(trigger)
    )
}

/// `/****** Object:  <kind> <name> ******/`
pub fn header(kind: &str, name: &str) -> String {
    format!("/****** Object:  {} {} ******/", kind, name)
}

/// Adds the `USE` statement and header comment the options ask for.
///
/// The header is glued to the first body statement so no batch separator
/// lands between them.
pub fn with_preamble(
    database: &str,
    header_text: Option<String>,
    mut body: Vec<String>,
    options: &ScriptingOptions,
) -> Vec<String> {
    if let Some(header_text) = header_text.filter(|_| options.include_headers) {
        match body.first_mut() {
            Some(first) => *first = format!("{}\n{}", header_text, first),
            None => body.push(header_text),
        }
    }
    if options.include_database_context {
        body.insert(0, format!("USE {}", quote_ident(database)));
    }
    body
}

//! The table catalog: loads the line-oriented `metadata.dbm` schema file,
//! bootstraps every table below the data directory, and routes row
//! operations to the right table.
//!
//! Metadata directives, one per line:
//!
//! ```text
//! # comment
//! table:users
//! column:id:int:primary_key
//! column:name:string:50
//! ```
//!
//! Malformed lines, unknown types and excess columns or tables are
//! reported with warnings and skipped; a table with an INT primary key
//! whose index cannot be opened fails the whole load.

use crate::errors::Error;
use crate::storage::row::Row;
use crate::storage::schema::{
    ColumnType, TableSchema, MAX_TABLES, STRING_DEFAULT, STRING_MAX,
};
use crate::storage::table::Table;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const METADATA_FILE: &str = "metadata.dbm";

/// Schema written on first run when no metadata file exists.
static DEFAULT_METADATA: Lazy<String> = Lazy::new(|| {
    format!(
        "# minisql schema\n\
         table:users\n\
         column:id:int:primary_key\n\
         column:name:string:{}\n\
         \n\
         table:products\n\
         column:prod_id:int:primary_key\n\
         column:description:string:100\n\
         column:price:int\n",
        STRING_DEFAULT
    )
});

/// One open database: the catalog of tables rooted at a data directory,
/// owned for the process lifetime.
pub struct Database {
    pub root: PathBuf,
    tables: HashMap<String, Table>,
}

impl Database {
    /// Open the database rooted at `root`, creating the directory and a
    /// default metadata file when absent, then bootstrapping every table.
    pub fn open(root: &Path) -> Result<Self, Error> {
        std::fs::create_dir_all(root).map_err(|e| Error::io(root, e))?;

        let metadata_path = root.join(METADATA_FILE);
        if !metadata_path.exists() {
            std::fs::write(&metadata_path, DEFAULT_METADATA.as_str())
                .map_err(|e| Error::io(&metadata_path, e))?;
            info!(path = %metadata_path.display(), "Wrote default metadata");
        }

        let text = std::fs::read_to_string(&metadata_path)
            .map_err(|e| Error::io(&metadata_path, e))?;

        // On any table failure the whole load fails; tables opened so far
        // are dropped, closing their index files.
        let mut tables = HashMap::new();
        for schema in parse_metadata(&text) {
            let name = schema.name.clone();
            let table = Table::open(root, schema)?;
            tables.insert(name, table);
        }
        info!(root = %root.display(), tables = tables.len(), "Opened database");

        Ok(Database {
            root: root.to_path_buf(),
            tables,
        })
    }

    pub fn table(&self, name: &str) -> Result<&Table, Error> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::NoSuchTable(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table, Error> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::NoSuchTable(name.to_string()))
    }

    pub fn insert_row(&mut self, table: &str, row: &Row) -> Result<i64, Error> {
        self.table_mut(table)?.insert_row(row)
    }

    pub fn select_row(&mut self, table: &str, key: i32) -> Result<Option<Row>, Error> {
        self.table_mut(table)?.select_row(key)
    }

    pub fn select_scan(&self, table: &str, column: &str, value: &str) -> Result<Vec<Row>, Error> {
        self.table(table)?.select_scan(column, value)
    }

    /// Close every open index handle and clear the registry.
    pub fn close(&mut self) {
        self.tables.clear();
        info!(root = %self.root.display(), "Closed database");
    }
}

/// Parse the metadata text into table schemas, warning about and skipping
/// every entry it cannot use.
fn parse_metadata(text: &str) -> Vec<TableSchema> {
    let mut schemas: Vec<TableSchema> = Vec::new();
    // Columns of a table that was itself skipped are skipped with it.
    let mut skip_table = false;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split(':').collect();
        match parts.as_slice() {
            ["table", name] if !name.is_empty() => {
                if schemas.len() >= MAX_TABLES {
                    warn!(lineno, table = name, "Too many tables, skipping");
                    skip_table = true;
                    continue;
                }
                skip_table = false;
                schemas.push(TableSchema::new(name));
            }
            ["column", rest @ ..] => {
                if skip_table {
                    continue;
                }
                let Some(schema) = schemas.last_mut() else {
                    warn!(lineno, line, "Column before any table, skipping");
                    continue;
                };
                if let Err(e) = parse_column(schema, rest, lineno) {
                    warn!(lineno, line, error = %e, "Skipping column");
                }
            }
            _ => {
                warn!(lineno, line, "Malformed metadata line, skipping");
            }
        }
    }

    schemas
}

/// Parse one `column:` directive body (`name:type[:arg[:flag]]`) and push
/// the column onto the schema.
fn parse_column(schema: &mut TableSchema, parts: &[&str], lineno: usize) -> Result<(), Error> {
    let (name, type_, rest) = match parts {
        [name, type_, rest @ ..] if !name.is_empty() => (*name, *type_, rest),
        _ => return Err(err!(Schema, "Missing column name or type.")),
    };

    let (column_type, mut primary) = match type_ {
        "int" => (ColumnType::Int, rest.first() == Some(&"primary_key")),
        "string" => {
            let size = match rest.first().map(|s| s.parse::<usize>()) {
                Some(Ok(n)) if n > 0 && n <= STRING_MAX => n,
                Some(Ok(n)) if n > STRING_MAX => {
                    warn!(lineno, column = name, size = n, "String size clamped");
                    STRING_MAX
                }
                _ => {
                    warn!(
                        lineno,
                        column = name,
                        "Invalid string size, using default"
                    );
                    STRING_DEFAULT
                }
            };
            (ColumnType::Str(size), rest.get(1) == Some(&"primary_key"))
        }
        other => return Err(err!(Schema, "Unknown column type '{}'.", other)),
    };

    if primary && column_type != ColumnType::Int {
        warn!(
            lineno,
            column = name,
            "Primary key must be INT, downgrading to a plain column"
        );
        primary = false;
    }
    if primary && schema.pk_column.is_some() {
        warn!(
            lineno,
            column = name,
            "Table already has a primary key, ignoring flag"
        );
        primary = false;
    }

    schema.push_column(name, column_type, primary)
}

use std::fmt;
use std::path::PathBuf;

/// Max columns per table.
pub const MAX_COLUMNS: usize = 32;

/// Max tables in the database.
pub const MAX_TABLES: usize = 16;

/// Byte size of an INT column (INT32).
pub const INT_SIZE: usize = 4;

/// Upper bound for a STRING column size; larger declarations are clamped.
pub const STRING_MAX: usize = 2048;

/// Fallback size for a STRING column declared with an invalid size.
pub const STRING_DEFAULT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// 32-bit signed integer, little-endian on disk.
    Int,
    /// Fixed-width string buffer of the given byte size.
    Str(usize),
}

impl ColumnType {
    pub fn size(&self) -> usize {
        match self {
            ColumnType::Int => INT_SIZE,
            ColumnType::Str(len) => *len,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Int => write!(f, "INT"),
            ColumnType::Str(len) => write!(f, "STRING({})", len),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub name: String,
    pub type_: ColumnType,
    /// Size in bytes of the field within a row.
    pub size: usize,
    /// Byte offset of the field within a row.
    pub offset: usize,
    pub is_primary: bool,
}

/// In-memory schema of one table. Column offsets are assigned contiguously
/// in declaration order; `row_size` is the running sum of column sizes.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub columns: heapless::Vec<ColumnDefinition, MAX_COLUMNS>,
    pub row_size: usize,
    /// Index into `columns` of the INT primary key, if the table has one.
    pub pk_column: Option<usize>,
}

impl TableSchema {
    pub fn new(name: &str) -> Self {
        TableSchema {
            name: name.to_string(),
            columns: heapless::Vec::new(),
            row_size: 0,
            pk_column: None,
        }
    }

    /// Append a column, assigning its offset at the current end of the row.
    ///
    /// Fails when the table already holds `MAX_COLUMNS` columns.
    pub fn push_column(
        &mut self,
        name: &str,
        type_: ColumnType,
        is_primary: bool,
    ) -> Result<(), crate::errors::Error> {
        let size = type_.size();
        let column = ColumnDefinition {
            name: name.to_string(),
            type_,
            size,
            offset: self.row_size,
            is_primary,
        };
        if self.columns.push(column).is_err() {
            return Err(err!(
                Schema,
                "Table '{}' exceeds {} columns.",
                self.name,
                MAX_COLUMNS
            ));
        }
        if is_primary {
            self.pk_column = Some(self.columns.len() - 1);
        }
        self.row_size += size;
        Ok(())
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The primary-key column, when one was declared and kept at load time.
    pub fn pk(&self) -> Option<&ColumnDefinition> {
        self.pk_column.map(|i| &self.columns[i])
    }

    /// Path of the table's data file below the database root.
    pub fn data_path(&self, root: &std::path::Path) -> PathBuf {
        root.join(&self.name).join(format!("{}.tbl", self.name))
    }

    /// Path of the table's primary-key index file below the database root.
    pub fn index_path(&self, root: &std::path::Path) -> PathBuf {
        root.join(&self.name).join("pk.idx")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_accumulate_in_declaration_order() {
        let mut schema = TableSchema::new("users");
        schema.push_column("id", ColumnType::Int, true).unwrap();
        schema.push_column("name", ColumnType::Str(50), false).unwrap();
        schema.push_column("age", ColumnType::Int, false).unwrap();

        assert_eq!(schema.columns[0].offset, 0);
        assert_eq!(schema.columns[1].offset, 4);
        assert_eq!(schema.columns[2].offset, 54);
        assert_eq!(schema.row_size, 58);
        assert_eq!(schema.pk().unwrap().name, "id");
    }

    #[test]
    fn test_column_limit() {
        let mut schema = TableSchema::new("wide");
        for i in 0..MAX_COLUMNS {
            schema
                .push_column(&format!("c{}", i), ColumnType::Int, false)
                .unwrap();
        }
        assert!(schema.push_column("overflow", ColumnType::Int, false).is_err());
        assert_eq!(schema.columns.len(), MAX_COLUMNS);
    }
}

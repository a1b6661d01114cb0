//! The row engine: binds one table schema to one append-only data file and
//! one primary-key index, and implements insert, point lookup and scan.
//!
//! Rows are never moved or deleted; a row's byte offset in the data file
//! is its identity and is the payload stored in the index leaves. The data
//! file is opened per operation and closed before returning; only the
//! index file stays open for the table's lifetime.

use super::btree::BTree;
use super::row::{self, Row};
use super::schema::TableSchema;
use crate::errors::Error;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct Table {
    pub schema: TableSchema,
    pub data_path: PathBuf,
    /// The primary-key index; absent when the table has no INT PK.
    pub index: Option<BTree>,
}

impl Table {
    /// Bootstrap one table below the database root: ensure its directory
    /// exists and open the primary-key index when the schema declares one.
    pub fn open(root: &Path, schema: TableSchema) -> Result<Self, Error> {
        let dir = root.join(&schema.name);
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

        let index = match schema.pk() {
            Some(_) => Some(BTree::open(&schema.index_path(root))?),
            None => None,
        };
        let data_path = schema.data_path(root);

        Ok(Table {
            schema,
            data_path,
            index,
        })
    }

    /// Insert a row: reject duplicates by searching the index first, then
    /// append the bytes to the data file and record `(pk, offset)` in the
    /// index. Returns the row's offset.
    ///
    /// The append and the index insert are not atomic; a failure between
    /// them leaves an orphan row in the data file. Accepted.
    pub fn insert_row(&mut self, row: &Row) -> Result<i64, Error> {
        if row.data.len() != self.schema.row_size {
            return Err(err!(
                Schema,
                "Unexpected row size {}. Table '{}' row size is {}.",
                row.data.len(),
                self.schema.name,
                self.schema.row_size
            ));
        }

        let pk = match self.schema.pk() {
            Some(col) => row.get_int(col),
            None => {
                return Err(err!(
                    NoPrimaryKey,
                    "Table '{}' has no primary key index.",
                    self.schema.name
                ))
            }
        };
        let index = self.index.as_mut().ok_or_else(|| {
            err!(
                NoPrimaryKey,
                "Table '{}' has no primary key index.",
                self.schema.name
            )
        })?;

        if index.search(pk)?.is_some() {
            return Err(Error::DuplicateKey(pk));
        }

        let offset = append_row(&self.data_path, &row.data)?;
        index.insert(pk, offset)?;
        debug!(table = %self.schema.name, pk, offset, "Inserted row");

        Ok(offset)
    }

    /// Point lookup by primary key. Returns the row bytes, or `None` when
    /// the key is absent.
    pub fn select_row(&mut self, key: i32) -> Result<Option<Row>, Error> {
        let index = self.index.as_mut().ok_or_else(|| {
            err!(
                NoPrimaryKey,
                "Table '{}' has no primary key index.",
                self.schema.name
            )
        })?;

        let offset = match index.search(key)? {
            Some(offset) => offset,
            None => return Ok(None),
        };

        let mut file = std::fs::File::open(&self.data_path)
            .map_err(|e| Error::io(&self.data_path, e))?;
        file.seek(SeekFrom::Start(offset as u64))
            .map_err(|e| Error::io(&self.data_path, e))?;

        let mut buf = vec![0u8; self.schema.row_size];
        file.read_exact(&mut buf)
            .map_err(|e| Error::io(&self.data_path, e))?;
        debug!(table = %self.schema.name, key, offset, "Selected row");

        Ok(Some(Row::from_bytes(buf)))
    }

    /// Linear scan with an equality filter on one column. A filter that
    /// cannot be parsed to the column's type aborts the scan.
    pub fn select_scan(&self, column: &str, value: &str) -> Result<Vec<Row>, Error> {
        let col = self
            .schema
            .find_column(column)
            .ok_or_else(|| Error::NoSuchColumn(column.to_string()))?;

        // No data file yet means no rows were ever inserted.
        if !self.data_path.exists() {
            return Ok(Vec::new());
        }
        let mut file = std::fs::File::open(&self.data_path)
            .map_err(|e| Error::io(&self.data_path, e))?;
        let len = file
            .metadata()
            .map_err(|e| Error::io(&self.data_path, e))?
            .len();

        let mut rows = Vec::new();
        let mut buf = vec![0u8; self.schema.row_size];
        for _ in 0..len / self.schema.row_size as u64 {
            file.read_exact(&mut buf)
                .map_err(|e| Error::io(&self.data_path, e))?;
            if row::field_matches(col, &buf, value)? {
                rows.push(Row::from_bytes(buf.clone()));
            }
        }
        debug!(
            table = %self.schema.name,
            column,
            matches = rows.len(),
            "Scanned table"
        );
        Ok(rows)
    }
}

/// Append row bytes at the end of the data file; the pre-append length is
/// the new row's offset.
fn append_row(path: &Path, data: &[u8]) -> Result<i64, Error> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;

    let offset = file.metadata().map_err(|e| Error::io(path, e))?.len() as i64;
    file.write_all(data)
        .and_then(|_| file.flush())
        .map_err(|e| Error::io(path, e))?;
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::ColumnType;
    use tempfile::TempDir;

    fn users_table(dir: &TempDir) -> Table {
        let mut schema = TableSchema::new("users");
        schema.push_column("id", ColumnType::Int, true).unwrap();
        schema.push_column("name", ColumnType::Str(50), false).unwrap();
        Table::open(dir.path(), schema).unwrap()
    }

    fn products_table(dir: &TempDir) -> Table {
        let mut schema = TableSchema::new("products");
        schema.push_column("prod_id", ColumnType::Int, true).unwrap();
        schema
            .push_column("description", ColumnType::Str(100), false)
            .unwrap();
        schema.push_column("price", ColumnType::Int, false).unwrap();
        Table::open(dir.path(), schema).unwrap()
    }

    fn user_row(table: &Table, id: i32, name: &str) -> Row {
        let mut row = Row::new(&table.schema);
        row.set_int(&table.schema.columns[0], id);
        row.set_str(&table.schema.columns[1], name);
        row
    }

    #[test]
    fn test_insert_and_select_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut table = users_table(&dir);

        for (id, name) in [(1, "Alice"), (2, "Bob"), (3, "Charlie"), (4, "David"), (5, "Eve")] {
            table.insert_row(&user_row(&table, id, name)).unwrap();
        }

        let row = table.select_row(3).unwrap().unwrap();
        assert_eq!(row.get_int(&table.schema.columns[0]), 3);
        assert_eq!(row.get_str(&table.schema.columns[1]), "Charlie");
        assert_eq!(&row.data[4..12], b"Charlie\0".as_slice());

        assert!(table.select_row(6).unwrap().is_none());
    }

    #[test]
    fn test_selected_row_is_bytewise_identical() {
        let dir = TempDir::new().unwrap();
        let mut table = users_table(&dir);

        let row = user_row(&table, 42, "Zaphod");
        table.insert_row(&row).unwrap();

        let fetched = table.select_row(42).unwrap().unwrap();
        assert_eq!(fetched.data, row.data);
    }

    #[test]
    fn test_duplicate_key_leaves_state_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut table = users_table(&dir);

        let offset = table.insert_row(&user_row(&table, 101, "Alice")).unwrap();
        assert_eq!(offset, 0);

        match table.insert_row(&user_row(&table, 101, "Alice Dup")) {
            Err(Error::DuplicateKey(101)) => {}
            other => panic!("Expected DuplicateKey, got {:?}", other),
        }

        let row = table.select_row(101).unwrap().unwrap();
        assert_eq!(row.get_str(&table.schema.columns[1]), "Alice");
        // The data file still holds exactly one row.
        assert_eq!(
            std::fs::metadata(&table.data_path).unwrap().len(),
            table.schema.row_size as u64
        );
    }

    #[test]
    fn test_scan_with_equality_filters() {
        let dir = TempDir::new().unwrap();
        let mut table = products_table(&dir);

        for (id, desc, price) in [(5001, "Wrench", 20), (5002, "Hammer", 20), (5003, "Saw", 35)] {
            let mut row = Row::new(&table.schema);
            row.set_int(&table.schema.columns[0], id);
            row.set_str(&table.schema.columns[1], desc);
            row.set_int(&table.schema.columns[2], price);
            table.insert_row(&row).unwrap();
        }

        assert_eq!(table.select_scan("price", "20").unwrap().len(), 2);
        assert_eq!(table.select_scan("description", "Wrench").unwrap().len(), 1);
        assert_eq!(table.select_scan("price", "99").unwrap().len(), 0);
    }

    #[test]
    fn test_scan_aborts_on_bad_filter() {
        let dir = TempDir::new().unwrap();
        let mut table = products_table(&dir);

        let mut row = Row::new(&table.schema);
        row.set_int(&table.schema.columns[0], 1);
        table.insert_row(&row).unwrap();

        match table.select_scan("price", "cheap") {
            Err(Error::TypeMismatch(_)) => {}
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
        match table.select_scan("weight", "1") {
            Err(Error::NoSuchColumn(_)) => {}
            other => panic!("Expected NoSuchColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_table_without_pk_rejects_keyed_ops_but_scans() {
        let dir = TempDir::new().unwrap();
        let mut schema = TableSchema::new("notes");
        schema.push_column("body", ColumnType::Str(20), false).unwrap();
        let mut table = Table::open(dir.path(), schema).unwrap();

        let mut row = Row::new(&table.schema);
        row.set_str(&table.schema.columns[0], "hello");

        match table.insert_row(&row) {
            Err(Error::NoPrimaryKey(_)) => {}
            other => panic!("Expected NoPrimaryKey, got {:?}", other),
        }
        match table.select_row(1) {
            Err(Error::NoPrimaryKey(_)) => {}
            other => panic!("Expected NoPrimaryKey, got {:?}", other),
        }
        // Scan still works; there is simply nothing on disk yet.
        assert!(table.select_scan("body", "hello").unwrap().is_empty());
    }
}

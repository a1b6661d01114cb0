//! Fixed-width row encoding.
//!
//! A row is an opaque byte buffer of exactly `row_size` bytes; field `i`
//! occupies `[offset, offset + size)` of its column. INT fields are
//! little-endian INT32. Strings shorter than their column are zero-padded;
//! a string exactly filling its column carries no terminator. Readers
//! tolerate both conventions.

use super::schema::{ColumnDefinition, ColumnType, TableSchema};
use crate::errors::Error;

/// One fixed-width row buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub data: Vec<u8>,
}

impl Row {
    /// A zeroed row sized for the given schema.
    pub fn new(schema: &TableSchema) -> Self {
        Row {
            data: vec![0u8; schema.row_size],
        }
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Row { data }
    }

    /// Parse `value` according to the column's type and copy it into the
    /// buffer at the column's offset.
    pub fn set_field(&mut self, col: &ColumnDefinition, value: &str) -> Result<(), Error> {
        match col.type_ {
            ColumnType::Int => {
                self.set_int(col, parse_int(value)?);
            }
            ColumnType::Str(_) => {
                self.set_str(col, value);
            }
        }
        Ok(())
    }

    pub fn set_int(&mut self, col: &ColumnDefinition, value: i32) {
        self.data[col.offset..col.offset + col.size].copy_from_slice(&value.to_le_bytes());
    }

    /// Copy a string into the field: shorter strings are zero-padded,
    /// longer ones truncated with the last byte forced to null.
    pub fn set_str(&mut self, col: &ColumnDefinition, value: &str) {
        let field = &mut self.data[col.offset..col.offset + col.size];
        let bytes = value.as_bytes();

        if bytes.len() > col.size {
            field.copy_from_slice(&bytes[..col.size]);
            field[col.size - 1] = 0;
        } else {
            // An exactly-filling string carries no terminator.
            field[..bytes.len()].copy_from_slice(bytes);
            field[bytes.len()..].fill(0);
        }
    }

    pub fn get_int(&self, col: &ColumnDefinition) -> i32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[col.offset..col.offset + 4]);
        i32::from_le_bytes(bytes)
    }

    /// The string field up to its null terminator, or the whole field when
    /// it is unterminated.
    pub fn get_str(&self, col: &ColumnDefinition) -> String {
        let field = &self.data[col.offset..col.offset + col.size];
        let trimmed = field.split(|&b| b == 0).next().unwrap_or(&[]);
        String::from_utf8_lossy(trimmed).to_string()
    }

    /// Every field rendered as text, in declaration order.
    pub fn format(&self, schema: &TableSchema) -> Vec<String> {
        schema
            .columns
            .iter()
            .map(|col| match col.type_ {
                ColumnType::Int => self.get_int(col).to_string(),
                ColumnType::Str(_) => self.get_str(col),
            })
            .collect()
    }
}

/// Parse a decimal INT32 literal. Format errors are a `TypeMismatch`;
/// values outside the INT32 range are `OutOfRange`.
pub fn parse_int(value: &str) -> Result<i32, Error> {
    let wide: i64 = value
        .trim()
        .parse()
        .map_err(|_| err!(TypeMismatch, "'{}' is not an integer.", value))?;
    i32::try_from(wide).map_err(|_| err!(OutOfRange, "{} exceeds INT32.", wide))
}

/// Equality test between a raw row's field and a filter literal, used by
/// the table scan.
pub fn field_matches(col: &ColumnDefinition, row: &[u8], filter: &str) -> Result<bool, Error> {
    let field = &row[col.offset..col.offset + col.size];
    match col.type_ {
        ColumnType::Int => {
            let value = parse_int(filter)?;
            Ok(field == value.to_le_bytes())
        }
        ColumnType::Str(size) => {
            let bytes = filter.as_bytes();
            if bytes.len() > size {
                return Ok(false);
            }
            if field[..bytes.len()] != *bytes {
                return Ok(false);
            }
            // A shorter filter only matches a field terminated right there.
            Ok(bytes.len() == size || field[bytes.len()] == 0)
        }
    }
}

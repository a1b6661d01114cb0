//! The command processor: executes parsed statements against a database
//! and returns displayable results. Presentation stays in the REPL; the
//! core only hands back discriminated values.

use crate::database::Database;
use crate::errors::Error;
use crate::sql::{InsertStatement, SelectStatement, SqlCommand, Statement};
use crate::storage::row::{parse_int, Row};
use tracing::info;

pub enum SqlResult {
    Ok {
        affected_rows: usize,
    },
    ResultSet {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Exit,
}

/// Execute a statement.
pub fn execute(db: &mut Database, cmd: SqlCommand) -> Result<SqlResult, Error> {
    info!(sql = %cmd.sql, "Executing statement");
    match cmd.statement {
        Statement::Insert(s) => execute_insert(db, s),
        Statement::Select(s) => execute_select(db, s),
        Statement::Exit => Ok(SqlResult::Exit),
    }
}

fn execute_insert(db: &mut Database, s: InsertStatement) -> Result<SqlResult, Error> {
    let schema = db.table(&s.table)?.schema.clone();
    if s.values.len() != schema.columns.len() {
        return Err(err!(
            Schema,
            "Table '{}' has {} columns but {} values were given.",
            s.table,
            schema.columns.len(),
            s.values.len()
        ));
    }

    let mut row = Row::new(&schema);
    for (col, value) in schema.columns.iter().zip(&s.values) {
        row.set_field(col, value)?;
    }
    db.insert_row(&s.table, &row)?;

    Ok(SqlResult::Ok { affected_rows: 1 })
}

fn execute_select(db: &mut Database, s: SelectStatement) -> Result<SqlResult, Error> {
    let schema = db.table(&s.table)?.schema.clone();

    // Filtering on the primary key is a point lookup through the index;
    // any other column falls back to the linear scan.
    let is_pk = schema.pk().map(|c| c.name == s.column).unwrap_or(false);
    let rows = if is_pk {
        let key = parse_int(&s.value)?;
        match db.select_row(&s.table, key)? {
            Some(row) => vec![row],
            None => Vec::new(),
        }
    } else {
        db.select_scan(&s.table, &s.column, &s.value)?
    };

    Ok(SqlResult::ResultSet {
        columns: schema.columns.iter().map(|c| c.name.clone()).collect(),
        rows: rows.iter().map(|r| r.format(&schema)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql;
    use tempfile::TempDir;

    fn run(db: &mut Database, text: &str) -> Result<SqlResult, Error> {
        execute(db, sql::parse(text.to_string()).unwrap())
    }

    fn result_rows(result: SqlResult) -> Vec<Vec<String>> {
        match result {
            SqlResult::ResultSet { rows, .. } => rows,
            _ => panic!("Expected a result set"),
        }
    }

    #[test]
    fn test_insert_then_select_by_pk() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open(dir.path()).unwrap();

        for stmt in [
            "INSERT INTO users VALUES (1, 'Alice');",
            "INSERT INTO users VALUES (2, 'Bob');",
            "INSERT INTO users VALUES (3, 'Charlie');",
        ] {
            match run(&mut db, stmt).unwrap() {
                SqlResult::Ok { affected_rows } => assert_eq!(affected_rows, 1),
                _ => panic!("Expected an OK result"),
            }
        }

        let rows = result_rows(run(&mut db, "SELECT * FROM users WHERE id = 3;").unwrap());
        assert_eq!(rows, vec![vec!["3".to_string(), "Charlie".to_string()]]);

        let rows = result_rows(run(&mut db, "SELECT * FROM users WHERE id = 6;").unwrap());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open(dir.path()).unwrap();

        run(&mut db, "INSERT INTO users VALUES (101, 'Alice');").unwrap();
        match run(&mut db, "INSERT INTO users VALUES (101, 'Alice Dup');") {
            Err(Error::DuplicateKey(101)) => {}
            _ => panic!("Expected DuplicateKey"),
        }

        let rows = result_rows(run(&mut db, "SELECT * FROM users WHERE id = 101;").unwrap());
        assert_eq!(rows[0][1], "Alice");
    }

    #[test]
    fn test_select_on_other_columns_scans() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open(dir.path()).unwrap();

        run(&mut db, "INSERT INTO products VALUES (5001, 'Wrench', 20);").unwrap();
        run(&mut db, "INSERT INTO products VALUES (5002, 'Hammer', 20);").unwrap();

        let rows = result_rows(run(&mut db, "SELECT * FROM products WHERE price = 20;").unwrap());
        assert_eq!(rows.len(), 2);

        let rows = result_rows(
            run(&mut db, "SELECT * FROM products WHERE description = 'Wrench';").unwrap(),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "5001");
    }

    #[test]
    fn test_value_count_must_match_columns() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open(dir.path()).unwrap();

        match run(&mut db, "INSERT INTO users VALUES (1);") {
            Err(Error::Schema(_)) => {}
            _ => panic!("Expected a schema error"),
        }
    }

    #[test]
    fn test_pk_literal_out_of_range() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open(dir.path()).unwrap();

        match run(&mut db, "SELECT * FROM users WHERE id = 9999999999;") {
            Err(Error::OutOfRange(_)) => {}
            _ => panic!("Expected OutOfRange"),
        }
    }

    #[test]
    fn test_unknown_table() {
        let dir = TempDir::new().unwrap();
        let mut db = Database::open(dir.path()).unwrap();

        match run(&mut db, "INSERT INTO nothere VALUES (1);") {
            Err(Error::NoSuchTable(_)) => {}
            _ => panic!("Expected NoSuchTable"),
        }
    }
}

//! The SQL surface: a small statement parser for the commands the engine
//! accepts.
//!
//! ```text
//! INSERT INTO <table> VALUES (v1, v2, ...);
//! SELECT * FROM <table> WHERE <column> = <literal>;
//! EXIT; / QUIT;
//! ```

use crate::errors;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::VecDeque;

lazy_static! {
    static ref IDENT_REGEX: Regex = Regex::new(r#"^[A-Za-z_][A-Za-z0-9_]*$"#).unwrap();
}

/// A parsed SQL command, keeping the raw text for logging.
pub struct SqlCommand {
    pub statement: Statement,
    pub sql: String,
}

pub enum Statement {
    Insert(InsertStatement),
    Select(SelectStatement),
    Exit,
}

pub struct InsertStatement {
    pub table: String,
    /// Values in column declaration order.
    pub values: Vec<String>,
}

pub struct SelectStatement {
    pub table: String,
    /// The WHERE equality filter: column name and literal.
    pub column: String,
    pub value: String,
}

/// Split a statement on whitespace, keeping parenthesized groups and
/// quoted text together.
fn split_sql(sql: &str) -> Result<VecDeque<String>, errors::Error> {
    let mut result = VecDeque::new();
    let mut current = String::new();
    let mut inside_parens = false;
    let mut inside_text = false;

    for c in sql.chars() {
        match c {
            '\'' => {
                inside_text = !inside_text;
                current.push(c);
            }
            '(' => {
                if !inside_text {
                    if inside_parens {
                        return Err(err!(Syntax, "Wrong opening parentheses."));
                    }
                    inside_parens = true;
                }
                current.push(c);
            }
            ')' => {
                if !inside_text {
                    if !inside_parens {
                        return Err(err!(Syntax, "Wrong enclosing parentheses."));
                    }
                    inside_parens = false;
                }
                current.push(c);
            }
            ' ' if !inside_parens && !inside_text => {
                if !current.is_empty() {
                    result.push_back(current);
                    current = String::new();
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        result.push_back(current);
    }
    if inside_parens {
        return Err(err!(Syntax, "Missing enclosing parentheses."));
    }
    if inside_text {
        return Err(err!(Syntax, "Missing closing quote."));
    }

    Ok(result)
}

fn ident(name: &str) -> Result<String, errors::Error> {
    if IDENT_REGEX.is_match(name) {
        Ok(name.to_string())
    } else {
        Err(err!(
            Syntax,
            "Name '{}' must match the regex {}.",
            name,
            IDENT_REGEX.as_str()
        ))
    }
}

/// Strip surrounding single quotes from a literal, when present.
fn unquote(value: &str) -> String {
    let v = value.trim();
    if v.len() >= 2 && v.starts_with('\'') && v.ends_with('\'') {
        v[1..v.len() - 1].to_string()
    } else {
        v.to_string()
    }
}

fn parse_insert(sql: &mut VecDeque<String>) -> Result<InsertStatement, errors::Error> {
    if sql
        .pop_front()
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("INTO"))
        != Some(true)
    {
        return Err(err!(Syntax, "'INSERT' must be followed by an INTO statement."));
    }

    let table = match sql.pop_front() {
        Some(t) => ident(&t)?,
        None => {
            return Err(err!(Syntax, "'INSERT INTO' must be followed by a table name."));
        }
    };

    if sql
        .pop_front()
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("VALUES"))
        != Some(true)
    {
        return Err(err!(
            Syntax,
            "'INSERT INTO {}' must be followed by a VALUES statement.",
            table
        ));
    }

    let values_sql = match sql.pop_front() {
        Some(t) => t,
        None => {
            return Err(err!(Syntax, "VALUES must be followed by values enclosed in parentheses."));
        }
    };
    if !(values_sql.starts_with('(') && values_sql.ends_with(')')) {
        return Err(err!(Syntax, "Values must be enclosed in parentheses."));
    }

    let values = values_sql[1..values_sql.len() - 1]
        .split(',')
        .map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(err!(Syntax, "Empty value."));
            }
            Ok(unquote(trimmed))
        })
        .collect::<Result<Vec<_>, errors::Error>>()?;

    Ok(InsertStatement { table, values })
}

fn parse_select(sql: &mut VecDeque<String>) -> Result<SelectStatement, errors::Error> {
    if sql.pop_front().as_deref() != Some("*") {
        return Err(err!(Syntax, "'SELECT' must be followed by '*'."));
    }
    if sql
        .pop_front()
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("FROM"))
        != Some(true)
    {
        return Err(err!(Syntax, "'SELECT *' must be followed by a FROM statement."));
    }

    let table = match sql.pop_front() {
        Some(t) => ident(&t)?,
        None => {
            return Err(err!(Syntax, "'SELECT * FROM' must be followed by a table name."));
        }
    };

    if sql
        .pop_front()
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("WHERE"))
        != Some(true)
    {
        return Err(err!(
            Syntax,
            "'SELECT * FROM {}' must be followed by a WHERE equality filter.",
            table
        ));
    }

    // The filter may arrive as 'col = v', 'col= v', or 'col=v'.
    let filter: String = sql.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ");
    let (column, value) = filter
        .split_once('=')
        .ok_or_else(|| err!(Syntax, "WHERE must contain a '<column> = <value>' filter."))?;

    let column = ident(column.trim())?;
    let value = unquote(value);
    if value.is_empty() {
        return Err(err!(Syntax, "Missing filter value."));
    }

    Ok(SelectStatement {
        table,
        column,
        value,
    })
}

/// Parse a statement.
pub fn parse(raw_sql: String) -> Result<SqlCommand, errors::Error> {
    let trimmed = raw_sql.trim();
    let mut sql = split_sql(trimmed.strip_suffix(';').unwrap_or(trimmed))?;

    let first = match sql.pop_front() {
        Some(f) => f,
        None => {
            return Err(err!(Syntax, "Expected at least one element."));
        }
    };

    match first.to_uppercase().as_str() {
        "INSERT" => Ok(SqlCommand {
            statement: Statement::Insert(parse_insert(&mut sql)?),
            sql: raw_sql,
        }),
        "SELECT" => Ok(SqlCommand {
            statement: Statement::Select(parse_select(&mut sql)?),
            sql: raw_sql,
        }),
        "EXIT" | "QUIT" => Ok(SqlCommand {
            statement: Statement::Exit,
            sql: raw_sql,
        }),
        _ => Err(err!(Syntax, "Unrecognized statement.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn test_parse_insert() {
        let cmd = parse("INSERT INTO users VALUES (1, 'Alice Smith');".into()).unwrap();
        match cmd.statement {
            Statement::Insert(s) => {
                assert_eq!(s.table, "users");
                assert_eq!(s.values, vec!["1", "Alice Smith"]);
            }
            _ => panic!("Expected an insert statement"),
        }
    }

    #[test]
    fn test_parse_select_with_filter() {
        for sql in [
            "SELECT * FROM users WHERE id = 3;",
            "select * from users where id=3;",
            "SELECT * FROM users WHERE id =3",
        ] {
            let cmd = parse(sql.into()).unwrap();
            match cmd.statement {
                Statement::Select(s) => {
                    assert_eq!(s.table, "users");
                    assert_eq!(s.column, "id");
                    assert_eq!(s.value, "3");
                }
                _ => panic!("Expected a select statement"),
            }
        }
    }

    #[test]
    fn test_parse_select_quoted_value() {
        let cmd = parse("SELECT * FROM products WHERE description = 'Wrench';".into()).unwrap();
        match cmd.statement {
            Statement::Select(s) => {
                assert_eq!(s.column, "description");
                assert_eq!(s.value, "Wrench");
            }
            _ => panic!("Expected a select statement"),
        }
    }

    #[test]
    fn test_parse_exit() {
        assert!(matches!(
            parse("EXIT;".into()).unwrap().statement,
            Statement::Exit
        ));
        assert!(matches!(
            parse("quit;".into()).unwrap().statement,
            Statement::Exit
        ));
    }

    #[test]
    fn test_syntax_errors() {
        for sql in [
            "",
            "DELETE FROM users;",
            "INSERT users VALUES (1);",
            "INSERT INTO users (1, 'x');",
            "SELECT * FROM users;",
            "SELECT * FROM users WHERE id;",
            "INSERT INTO users VALUES (1, 'unclosed;",
        ] {
            match parse(sql.into()) {
                Err(Error::Syntax(_)) => {}
                _ => panic!("Expected a syntax error for: {}", sql),
            }
        }
    }
}

/// The RAW console module.
use crossterm::{cursor, execute, style, ExecutableCommand};
use std::io::{self, Write};

const NAME: &str = env!("CARGO_PKG_NAME");

pub fn print_prompt() -> io::Result<()> {
    execute!(io::stdout(), cursor::MoveToNextLine(0))?;
    io::stdout()
        .execute(style::SetAttribute(style::Attribute::Bold))?
        .execute(style::Print(format!("{}> ", NAME)))?
        .execute(style::SetAttribute(style::Attribute::Reset))?;
    io::stdout().flush()?;
    Ok(())
}

pub fn print_continue_prompt() -> io::Result<()> {
    execute!(io::stdout(), cursor::MoveToNextLine(0))?;
    io::stdout()
        .execute(style::SetAttribute(style::Attribute::Bold))?
        .execute(style::Print("\n      -> ".to_string()))?
        .execute(style::SetAttribute(style::Attribute::Reset))?;
    io::stdout().flush()?;
    Ok(())
}

pub fn echo(s: String) {
    let _ = io::stdout().execute(style::Print(s));
    let _ = io::stdout().flush();
    let _ = execute!(io::stdout(), cursor::MoveToNextLine(0));
}

pub fn error(s: String) {
    let _ = io::stdout().execute(style::SetForegroundColor(style::Color::Red));
    let _ = io::stdout().execute(style::Print(s));
    let _ = io::stdout().execute(style::ResetColor);
    let _ = io::stdout().flush();
    let _ = execute!(io::stdout(), cursor::MoveToNextLine(0));
}

pub fn echo_lines(s: String) {
    for l in s.lines() {
        let _ = io::stdout().execute(style::Print(format!("{}\n", l)));
        let _ = execute!(io::stdout(), cursor::MoveToNextLine(0));
        let _ = io::stdout().flush();
    }
}

#[macro_export]
macro_rules! echo {
    ($($arg:tt)*) => {
        $crate::console::echo(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::console::error(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! echo_lines {
    ($($arg:tt)*) => {
        $crate::console::echo_lines(format!($($arg)*))
    };
}

/// Build an ASCII table.
pub fn build_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let border = {
        let mut b = String::from("+");
        for w in &widths {
            b.push_str(&"-".repeat(w + 2));
            b.push('+');
        }
        b.push('\n');
        b
    };

    let format_row = |cells: &[String]| {
        let mut line = String::from("|");
        for (i, cell) in cells.iter().enumerate() {
            line.push_str(&format!(" {:<width$} |", cell, width = widths[i]));
        }
        line.push('\n');
        line
    };

    let mut result = String::new();
    result.push_str(&border);
    result.push_str(&format_row(headers));
    result.push_str(&border);
    for row in rows {
        result.push_str(&format_row(row));
    }
    result.push_str(&border);
    result
}

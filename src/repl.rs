//! The REPL (Read-Eval-Print-Loop) module.
use crate::cmdproc::{self, SqlResult};
use crate::console::{self, build_table};
use crate::database::Database;
use crate::{echo, echo_lines, error, errors, sql};
use crossterm::{
    cursor,
    event::{self, KeyCode, KeyEvent, KeyModifiers},
    execute, terminal,
};
use std::io::{self, Write};
use tracing::{info, warn};
use uuid::Uuid;

pub mod history;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

const BANNER: &str = r#"
Commands end with ;. Type 'help' for help, 'exit' to quit.
"#;

const HELP: &str = r#"List of all minisql commands:
Note that SQL statements must end with ';'

INSERT INTO <table> VALUES (v1, v2, ...);
SELECT * FROM <table> WHERE <column> = <value>;
EXIT; / QUIT;

help      (\h) Show this help.
version   (\v) Show the version.
quit      (\q) Quit minisql.
"#;

/// Start the REPL in raw console mode.
pub fn start(db: &mut Database) -> Result<(), errors::Error> {
    terminal::enable_raw_mode()?;
    let result = repl_loop(db);
    terminal::disable_raw_mode()?;
    result
}

fn repl_loop(db: &mut Database) -> Result<(), errors::Error> {
    let session_id = Uuid::new_v4();
    info!(%session_id, "Starting REPL session");

    echo!("Welcome to the {} {} REPL.\n", NAME, VERSION);
    echo_lines!("{}\n", BANNER);

    let history_path = history::history_path();
    let mut history = history::load(&history_path);
    let mut history_index = history.len();

    let mut input = String::new();
    let mut continue_prompt = false;

    loop {
        if !continue_prompt {
            input.clear();
            console::print_prompt()?;
        }
        continue_prompt = false;

        read_input(&mut input, &mut history, &mut history_index)?;

        let line = input.trim().to_string();
        match line.as_str() {
            "" => {}
            "exit" | "quit" | "\\q" => {
                echo!("\nBye\n");
                break;
            }
            "version" | "\\v" => {
                echo!("\n{} version: {}\n", NAME, VERSION);
            }
            "help" | "\\h" | "\\?" | "?" => {
                echo_lines!("\n{}\n", HELP);
            }
            cmd => {
                if cmd.starts_with('\\') {
                    echo!("\nUnrecognized command: {}\n", cmd);
                    echo_lines!("{}\n", HELP);
                    continue;
                }
                if !cmd.ends_with(';') {
                    // An unterminated statement continues on the next line.
                    console::print_continue_prompt()?;
                    input.push(' ');
                    continue_prompt = true;
                    continue;
                }

                if let Err(e) = history::append(&history_path, cmd) {
                    warn!(error = %e, "Failed to save history");
                }
                match sql::parse(cmd.to_string()) {
                    Ok(command) => match cmdproc::execute(db, command) {
                        Ok(SqlResult::Exit) => {
                            echo!("\nBye\n");
                            break;
                        }
                        Ok(SqlResult::Ok { affected_rows }) => {
                            echo!("\nQuery OK, {} row affected\n", affected_rows);
                        }
                        Ok(SqlResult::ResultSet { columns, rows }) => {
                            if rows.is_empty() {
                                echo!("\nEmpty set\n");
                            } else {
                                let count = rows.len();
                                echo_lines!(
                                    "\n{}{} row(s) in set\n",
                                    build_table(&columns, &rows),
                                    count
                                );
                            }
                        }
                        Err(e) => error!("\n{}\n", e),
                    },
                    Err(e) => error!("\n{}\n", e),
                }
            }
        }
    }

    Ok(())
}

fn read_input(
    input: &mut String,
    history: &mut Vec<String>,
    history_index: &mut usize,
) -> io::Result<()> {
    loop {
        if let event::Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        {
            match code {
                KeyCode::Enter => {
                    if !input.trim().is_empty() {
                        history.push(input.clone());
                        *history_index = history.len();
                    }
                    break;
                }
                KeyCode::Up => {
                    if *history_index > 0 {
                        *history_index -= 1;
                        input.clear();
                        input.push_str(history[*history_index].as_str());
                        redraw_line(input)?;
                    }
                }
                KeyCode::Down => {
                    if *history_index < history.len().saturating_sub(1) {
                        *history_index += 1;
                        input.clear();
                        input.push_str(history[*history_index].as_str());
                    } else {
                        *history_index = history.len();
                        input.clear();
                    }
                    redraw_line(input)?;
                }
                KeyCode::Backspace => {
                    if input.pop().is_some() {
                        redraw_line(input)?;
                    }
                }
                KeyCode::Char('c') | KeyCode::Char('d')
                    if modifiers.contains(KeyModifiers::CONTROL) =>
                {
                    let _ = execute!(io::stdout(), cursor::MoveToNextLine(0));
                    echo!("\nBye\n");
                    return Err(io::Error::new(io::ErrorKind::Interrupted, "Ctrl-C"));
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    write!(io::stdout(), "{}", c)?;
                    io::stdout().flush()?;
                }
                _ => {}
            }
        }
    }

    Ok(())
}

/// Clear the line after the prompt and print the current input buffer.
fn redraw_line(input: &str) -> io::Result<()> {
    execute!(
        io::stdout(),
        cursor::MoveToColumn((NAME.len() + 2) as u16),
        terminal::Clear(terminal::ClearType::UntilNewLine)
    )?;
    write!(io::stdout(), "{}", input)?;
    io::stdout().flush()?;
    Ok(())
}

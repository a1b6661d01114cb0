//! Persistent REPL command history, one statement per line in a file in
//! the user's home directory.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

const HISTORY_FILE: &str = ".minisql_history";

/// Path of the history file, falling back to the working directory when
/// no home directory can be determined.
pub fn history_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(HISTORY_FILE)
}

/// Append one executed statement to the history file.
pub fn append(path: &PathBuf, line: &str) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", line.trim())?;
    writer.flush()?;
    Ok(())
}

/// Load the saved history, newest last. A missing or unreadable file is
/// simply an empty history.
pub fn load(path: &PathBuf) -> Vec<String> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return Vec::new(),
    };

    BufReader::new(file)
        .lines()
        .filter_map(|line| {
            line.ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_append_and_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        append(&path, "SELECT * FROM users WHERE id = 1;").unwrap();
        append(&path, "  EXIT;  ").unwrap();

        let history = load(&path);
        assert_eq!(
            history,
            vec!["SELECT * FROM users WHERE id = 1;", "EXIT;"]
        );
    }

    #[test]
    fn test_missing_file_is_empty_history() {
        let path = PathBuf::from("/nonexistent/path/history");
        assert!(load(&path).is_empty());
    }
}

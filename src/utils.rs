use std::io;
use std::path::Path;

/// Delete a file, treating an already missing file as success.
pub fn remove_file_if_exists<P: AsRef<Path>>(path: P) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Map names end up as SQL identifiers and in `name@mapset` strings, so we
/// only take a conservative character set.
pub fn is_legal_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => (),
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

pub mod db {
    use anyhow::Result;
    use rusqlite::{OptionalExtension, Transaction};

    pub fn init_metadata_and_get_version(tx: &Transaction) -> Result<i32> {
        let create_db_metadata_sql = "
        CREATE TABLE IF NOT EXISTS `db_metadata` (
        `key`	TEXT NOT NULL,
        `value`	TEXT,
        PRIMARY KEY(`key`)
        )";
        tx.execute(create_db_metadata_sql, ())?;
        let version_str: Option<String> = tx
            .query_row(
                "SELECT `value` FROM `db_metadata` WHERE key='version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match version_str {
            None => Ok(0),
            Some(s) => Ok(s.parse()?),
        }
    }

    pub fn set_version_in_metadata(tx: &Transaction, version: i32) -> Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO `db_metadata` (key, value) VALUES (?1, ?2)",
            ("version", version.to_string()),
        )?;
        Ok(())
    }

    pub fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_names() {
        assert!(is_legal_name("elevation"));
        assert!(is_legal_name("roads_major.2021"));
        assert!(!is_legal_name(""));
        assert!(!is_legal_name(".hidden"));
        assert!(!is_legal_name("a\"b"));
        assert!(!is_legal_name("with space"));
        assert!(!is_legal_name("map@PERMANENT"));
    }

    #[test]
    fn removing_missing_file_is_not_an_error() {
        let path = std::env::temp_dir().join(format!("mapsight-missing-{}", std::process::id()));
        assert!(!remove_file_if_exists(&path).unwrap());
        std::fs::write(&path, b"x").unwrap();
        assert!(remove_file_if_exists(&path).unwrap());
        assert!(!path.exists());
    }
}

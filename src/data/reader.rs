use std::path::Path;

use csv::{ByteRecord, ReaderBuilder, StringRecord};
use serde::de::DeserializeOwned;

use crate::error::AppResult;
use crate::models::{Interaction, Item, User};

use super::{load_interactions, load_items, load_users, Loaded};

/// Rows read from a dataset file plus the count that did not fit the header
struct RawRows<T> {
    rows: Vec<T>,
    unreadable: usize,
}

/// Decodes a Latin-1 byte record; every byte maps to the code point of the same value.
fn decode_latin1(record: &ByteRecord) -> StringRecord {
    let fields: Vec<String> = record
        .iter()
        .map(|field| field.iter().map(|&b| char::from(b)).collect())
        .collect();
    StringRecord::from(fields)
}

/// Reads a tab-separated, Latin-1 encoded file with a header row.
///
/// Columns are matched by header name, so extra columns are ignored.
fn read_rows<T: DeserializeOwned>(path: &Path) -> AppResult<RawRows<T>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)?;
    let headers = decode_latin1(reader.byte_headers()?);

    let mut rows = Vec::new();
    let mut unreadable = 0;
    for record in reader.byte_records() {
        let record = decode_latin1(&record?);
        match record.deserialize::<T>(Some(&headers)) {
            Ok(row) => rows.push(row),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Unreadable row");
                unreadable += 1;
            }
        }
    }

    Ok(RawRows { rows, unreadable })
}

fn report<T>(kind: &'static str, path: &Path, loaded: &Loaded<T>) {
    if loaded.skipped > 0 {
        tracing::warn!(
            kind,
            path = %path.display(),
            skipped = loaded.skipped,
            "Skipped malformed rows"
        );
    }
    tracing::info!(kind, loaded = loaded.len(), "Loaded records");
}

/// Reads and normalizes `movies.csv`
pub fn read_items(path: &Path) -> AppResult<Loaded<Item>> {
    let raw = read_rows(path)?;
    let mut loaded = load_items(raw.rows);
    loaded.skipped += raw.unreadable;
    report("movies", path, &loaded);
    Ok(loaded)
}

/// Reads and normalizes `users.csv`
pub fn read_users(path: &Path) -> AppResult<Loaded<User>> {
    let raw = read_rows(path)?;
    let mut loaded = load_users(raw.rows);
    loaded.skipped += raw.unreadable;
    report("users", path, &loaded);
    Ok(loaded)
}

/// Reads and normalizes `ratings.csv`
pub fn read_interactions(path: &Path) -> AppResult<Loaded<Interaction>> {
    let raw = read_rows(path)?;
    let mut loaded = load_interactions(raw.rows);
    loaded.skipped += raw.unreadable;
    report("ratings", path, &loaded);
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_read_items_decodes_latin1_and_ignores_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = b"movie_id\ttitle\tgenres\textra\n".to_vec();
        bytes.extend_from_slice(b"1\tToy Story (1995)\tAnimation|Children's|Comedy\tx\n");
        // "Cit\xe9" is Latin-1 for "Cité"
        bytes.extend_from_slice(b"29\tCit\xe9 des enfants perdus (1995)\tAdventure|Sci-Fi\tx\n");
        let path = write_file(&dir, "movies.csv", &bytes);

        let loaded = read_items(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.records[1].title, "Cité des enfants perdus");
        assert_eq!(loaded.records[1].tags, vec!["Adventure", "SciFi"]);
    }

    #[test]
    fn test_read_users_counts_short_rows_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = b"user_id\tgender\tage\toccupation\tzipcode\n1\tF\t1\t10\t48067\n2\tM\n3\tM\tNaN\t7\t55117\n";
        let path = write_file(&dir, "users.csv", bytes);

        let loaded = read_users(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.skipped, 2);
    }

    #[test]
    fn test_read_interactions_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_interactions(&dir.path().join("ratings.csv")).is_err());
    }
}

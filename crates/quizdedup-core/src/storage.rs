use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{QuizError, Result};
use crate::models::QuizRecord;
use crate::normalize::canonicalize_fields;

/// A quiz database as read from disk. `raw` holds the exact bytes read so
/// the backup can be a verbatim copy.
#[derive(Debug, Clone)]
pub struct LoadedDatabase {
    pub path: PathBuf,
    pub raw: Vec<u8>,
    pub records: Vec<QuizRecord>,
}

/// Read and parse a quiz database (a JSON array of objects).
pub fn load(path: &Path) -> Result<LoadedDatabase> {
    if !path.exists() {
        return Err(QuizError::FileNotFound(path.to_path_buf()));
    }
    let raw = fs::read(path)?;
    let records = parse_records(path, &raw)?;
    info!(path = %path.display(), records = records.len(), "database loaded");
    Ok(LoadedDatabase {
        path: path.to_path_buf(),
        raw,
        records,
    })
}

/// Parse records, folding aliased field names into their canonical names.
pub fn parse_records(path: &Path, raw: &[u8]) -> Result<Vec<QuizRecord>> {
    let malformed = |source| QuizError::Malformed {
        path: path.to_path_buf(),
        source,
    };

    let values: Vec<Value> = serde_json::from_slice(raw).map_err(malformed)?;
    let mut records = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        let Value::Object(object) = value else {
            return Err(QuizError::NotAnObject { index });
        };
        let record = QuizRecord::from_object(canonicalize_fields(&object)).map_err(malformed)?;
        records.push(record);
    }

    check_unique_keys(&records)?;
    Ok(records)
}

fn check_unique_keys(records: &[QuizRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let key = record.key_at(idx);
        if !seen.insert(key) {
            return Err(QuizError::DuplicateId(key));
        }
    }
    Ok(())
}

/// Pretty JSON with 2-space indentation; non-ASCII text is written as-is.
/// Records keep the key order they were read with.
pub fn to_pretty_json(records: &[QuizRecord]) -> Result<Vec<u8>> {
    let objects = records
        .iter()
        .map(|record| record.to_object().map(Value::Object))
        .collect::<serde_json::Result<Vec<Value>>>()?;
    let mut bytes = serde_json::to_vec_pretty(&objects)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write `records` over `path` atomically.
pub fn save(path: &Path, records: &[QuizRecord]) -> Result<()> {
    let bytes = to_pretty_json(records)?;
    write_atomic(path, &bytes)?;
    info!(path = %path.display(), records = records.len(), "database saved");
    Ok(())
}

/// Copy the bytes the database was loaded from into `backup`.
pub fn write_backup(backup: &Path, database: &LoadedDatabase) -> Result<()> {
    if same_file(backup, &database.path) {
        return Err(QuizError::BackupPathConflict(backup.to_path_buf()));
    }
    write_atomic(backup, &database.raw).map_err(|source| QuizError::BackupFailed {
        path: backup.to_path_buf(),
        source,
    })?;
    info!(path = %backup.display(), "backup written");
    Ok(())
}

/// Write to a temporary sibling, then rename over the target, so a crash
/// never leaves a partially written file behind.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

//! JSON files in the data directory.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::errors::{Error, Result};

/// Reads `path`, falling back to the default value when the file is missing
/// or cannot be decoded.
pub(crate) fn read_json_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return T::default(),
        Err(err) => {
            warn!("failed to read {}: {err}", path.display());
            return T::default();
        }
    };
    match serde_json::from_slice(&contents) {
        Ok(value) => value,
        Err(err) => {
            warn!("discarding corrupt {}: {err}", path.display());
            T::default()
        }
    }
}

/// Writes `value` to a sibling temp file and renames it over `path`.
pub(crate) fn write_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(Error::io(parent))?;
    }
    let contents = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).map_err(Error::io(&tmp))?;
    fs::rename(&tmp, path).map_err(Error::io(path))?;
    Ok(())
}

pub(crate) fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(Error::io(path)(err)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let value: Vec<i64> = read_json_or_default(&dir.path().join("missing.json"));
        assert!(value.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        let value: Vec<i64> = read_json_or_default(&path);
        assert!(value.is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ids.json");
        write_json(&path, &[1, 2, 3]).unwrap();
        let value: Vec<i64> = read_json_or_default(&path);
        assert_eq!(value, [1, 2, 3]);
        remove_file_if_exists(&path).unwrap();
        remove_file_if_exists(&path).unwrap();
        assert!(!path.exists());
    }
}

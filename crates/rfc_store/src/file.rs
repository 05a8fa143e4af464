//! File-backed parameter store.

use crate::error::{StoreError, StoreResult};
use crate::store::{ConfigStore, Param};
use parking_lot::Mutex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A parameter store persisted as `name=value` lines.
///
/// Blank lines and lines starting with `#` are ignored. Names are
/// trimmed; everything after the first `=` is the value, kept exactly as
/// written. Values may be wrapped in double quotes; the quotes are
/// preserved in [`Param::value`] and stripped by [`ConfigStore::get_value`].
///
/// An optional defaults file with the same format backs every parameter
/// that has no stored value. Reads served from it report
/// [`crate::ReadSource::Default`].
///
/// # Durability
///
/// Each `set` rewrites the whole file through a sibling temporary file
/// and an atomic rename, so a crash leaves either the old or the new
/// contents.
///
/// # Example
///
/// ```no_run
/// use rfc_store::{ConfigStore, IniConfigStore};
/// use std::path::Path;
///
/// let store = IniConfigStore::open(Path::new("/opt/secure/RFC/tr181store.ini")).unwrap();
/// store.set("rfc", "Device.DeviceInfo.Test", "1").unwrap();
/// ```
#[derive(Debug)]
pub struct IniConfigStore {
    path: PathBuf,
    defaults: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl IniConfigStore {
    /// Opens a store at `path`, creating parent directories if needed.
    ///
    /// The file itself is created on the first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            defaults: None,
            write_lock: Mutex::new(()),
        })
    }

    /// Uses `path` as the defaults layer.
    #[must_use]
    pub fn with_defaults(mut self, path: &Path) -> Self {
        self.defaults = Some(path.to_path_buf());
        self
    }

    /// Returns the store file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &[(String, String)]) -> StoreResult<()> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            for (name, value) in entries {
                writeln!(file, "{name}={value}")?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Reads `name=value` lines, returning an empty list for a missing file.
fn read_entries(path: &Path) -> StoreResult<Vec<(String, String)>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim_start();
        if line.trim_end().is_empty() || line.starts_with('#') {
            continue;
        }
        let (name, value) = line.split_once('=').ok_or_else(|| StoreError::Malformed {
            line: idx + 1,
            content: line.to_string(),
        })?;
        entries.push((name.trim_end().to_string(), value.to_string()));
    }
    Ok(entries)
}

fn lookup(entries: &[(String, String)], name: &str) -> Option<String> {
    entries
        .iter()
        .rev()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.clone())
}

impl ConfigStore for IniConfigStore {
    fn get(&self, name: &str) -> StoreResult<Option<Param>> {
        if let Some(v) = lookup(&read_entries(&self.path)?, name) {
            return Ok(Some(Param::stored(v)));
        }
        match &self.defaults {
            Some(defaults) => Ok(lookup(&read_entries(defaults)?, name).map(Param::default_value)),
            None => Ok(None),
        }
    }

    fn set(&self, owner: &str, name: &str, value: &str) -> StoreResult<()> {
        if name.is_empty() || name.trim() != name || name.contains(['=', '\n', '\r']) {
            return Err(StoreError::InvalidParameterName(name.to_string()));
        }
        if value.contains(['\n', '\r']) {
            return Err(StoreError::InvalidValue {
                name: name.to_string(),
                value: value.to_string(),
            });
        }

        let _guard = self.write_lock.lock();
        let mut entries = read_entries(&self.path)?;
        match entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => entries.push((name.to_string(), value.to_string())),
        }
        self.persist(&entries)?;
        debug!(owner, name, value, "parameter stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ReadSource;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn file_missing_store_reads_none() {
        let dir = tempdir().unwrap();
        let store = IniConfigStore::open(&dir.path().join("store.ini")).unwrap();
        assert!(store.get("Device.A").unwrap().is_none());
    }

    #[test]
    fn file_set_and_get() {
        let dir = tempdir().unwrap();
        let store = IniConfigStore::open(&dir.path().join("store.ini")).unwrap();

        store.set("rfc", "Device.A", "1").unwrap();
        store.set("rfc", "Device.B", "hello").unwrap();
        store.set("rfc", "Device.A", "2").unwrap();

        assert_eq!(store.get_value("Device.A").unwrap().as_deref(), Some("2"));
        assert_eq!(store.get_value("Device.B").unwrap().as_deref(), Some("hello"));

        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "Device.A=2\nDevice.B=hello\n");
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.ini");
        {
            let store = IniConfigStore::open(&path).unwrap();
            store.set("rfc", "Device.A", "persisted").unwrap();
        }
        let store = IniConfigStore::open(&path).unwrap();
        assert_eq!(store.get_value("Device.A").unwrap().as_deref(), Some("persisted"));
    }

    #[test]
    fn file_quoted_values_and_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.ini");
        fs::write(&path, "# header\n\nDevice.A=\"quoted value\"\n").unwrap();

        let store = IniConfigStore::open(&path).unwrap();
        let raw = store.get("Device.A").unwrap().unwrap();
        assert_eq!(raw.value, "\"quoted value\"");
        assert_eq!(store.get_value("Device.A").unwrap().as_deref(), Some("quoted value"));
    }

    #[test]
    fn file_defaults_layer() {
        let dir = tempdir().unwrap();
        let defaults = dir.path().join("defaults.ini");
        fs::write(&defaults, "Device.Sel=prod\n").unwrap();

        let store = IniConfigStore::open(&dir.path().join("store.ini"))
            .unwrap()
            .with_defaults(&defaults);

        let p = store.get("Device.Sel").unwrap().unwrap();
        assert_eq!(p.source, ReadSource::Default);

        store.set("rfc", "Device.Sel", "ci").unwrap();
        let p = store.get("Device.Sel").unwrap().unwrap();
        assert_eq!(p.source, ReadSource::Stored);
        assert_eq!(p.value, "ci");
    }

    #[test]
    fn file_malformed_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.ini");
        fs::write(&path, "Device.A=1\ngarbage\n").unwrap();

        let store = IniConfigStore::open(&path).unwrap();
        let err = store.get("Device.A").unwrap_err();
        assert!(matches!(err, StoreError::Malformed { line: 2, .. }));
    }

    #[test]
    fn file_rejects_bad_names() {
        let dir = tempdir().unwrap();
        let store = IniConfigStore::open(&dir.path().join("store.ini")).unwrap();
        assert!(store.set("rfc", "", "1").is_err());
        assert!(store.set("rfc", "a=b", "1").is_err());
        assert!(store.set("rfc", "Device.A", "multi\nline").is_err());
        assert!(store.set("rfc", "Device.A", "carriage\r").is_err());
        assert!(store.set("rfc", " Device.A", "1").is_err());
    }

    #[test]
    fn file_values_keep_surrounding_whitespace() {
        let dir = tempdir().unwrap();
        let store = IniConfigStore::open(&dir.path().join("store.ini")).unwrap();

        store.set("rfc", "Device.Trailing", "value ").unwrap();
        store.set("rfc", "Device.Leading", "  on").unwrap();
        store.set("rfc", "Device.Empty", "").unwrap();

        assert_eq!(store.get_value("Device.Trailing").unwrap().as_deref(), Some("value "));
        assert_eq!(store.get_value("Device.Leading").unwrap().as_deref(), Some("  on"));
        assert_eq!(store.get_value("Device.Empty").unwrap().as_deref(), Some(""));
    }

    #[test]
    fn file_indented_lines_and_crlf() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.ini");
        fs::write(&path, "  # note\r\n  Device.A =1\r\n   \r\nDevice.B=x y\r\n").unwrap();

        let store = IniConfigStore::open(&path).unwrap();
        assert_eq!(store.get_value("Device.A").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get_value("Device.B").unwrap().as_deref(), Some("x y"));
    }

    proptest! {
        #[test]
        fn file_values_round_trip(value in "[ -~]{0,32}") {
            let dir = tempdir().unwrap();
            let store = IniConfigStore::open(&dir.path().join("store.ini")).unwrap();
            store.set("rfc", "Device.Prop.Value", &value).unwrap();
            store.set("rfc", "Device.Prop.Other", "1").unwrap();

            let reopened = IniConfigStore::open(store.path()).unwrap();
            let param = reopened.get("Device.Prop.Value").unwrap().unwrap();
            prop_assert_eq!(param.value, value);
        }
    }
}

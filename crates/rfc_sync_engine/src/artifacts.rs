//! Feature artifacts written next to the store.
//!
//! Layout of the artifact directory:
//!
//! ```text
//! rfcFeature.list      aggregate "instance=true," list, one line
//! rfcVariable.ini      shell exports for every feature
//! .RFC_<name>.ini      shell exports for one feature
//! tr181.list           "TR181: <key> <value>" lines of the last pass
//! .version             firmware version of the last applied manifest
//! bootstrap.ini        keys owned by the bootstrap layer
//! ```

use rfc_sync_protocol::Feature;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const FEATURE_LIST: &str = "rfcFeature.list";
const VARIABLES: &str = "rfcVariable.ini";
const TR181_LIST: &str = "tr181.list";
const VERSION: &str = ".version";
const BOOTSTRAP: &str = "bootstrap.ini";
const FEATURE_FILE_PREFIX: &str = ".RFC_";

/// Reads and writes the artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `dir`. Nothing is created until the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The artifact directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the aggregate feature list.
    pub fn feature_list_path(&self) -> PathBuf {
        self.dir.join(FEATURE_LIST)
    }

    /// Path of the applied-overrides list.
    pub fn tr181_list_path(&self) -> PathBuf {
        self.dir.join(TR181_LIST)
    }

    /// Path of the combined variables file.
    pub fn variables_path(&self) -> PathBuf {
        self.dir.join(VARIABLES)
    }

    /// Path of the per-feature file for `name`.
    pub fn feature_file_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{FEATURE_FILE_PREFIX}{name}.ini"))
    }

    /// Removes every per-feature file and the variables file.
    ///
    /// The feature list is kept; it is replaced once a new one is written.
    pub fn purge_features(&self) -> io::Result<()> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(FEATURE_FILE_PREFIX) || name == VARIABLES {
                debug!(file = %name, "removing feature artifact");
                remove_if_exists(&entry.path())?;
            }
        }
        Ok(())
    }

    /// Removes the aggregate feature list.
    pub fn remove_feature_list(&self) -> io::Result<()> {
        remove_if_exists(&self.feature_list_path())
    }

    /// Removes the applied-overrides list.
    pub fn remove_tr181_list(&self) -> io::Result<()> {
        remove_if_exists(&self.tr181_list_path())
    }

    /// Appends a feature's export lines to its own file.
    pub fn append_feature_file(&self, feature: &Feature) -> io::Result<()> {
        self.append_lines(&self.feature_file_path(&feature.name), &feature.export_lines())
    }

    /// Appends a feature's export lines to the variables file.
    pub fn append_variables(&self, feature: &Feature) -> io::Result<()> {
        self.append_lines(&self.variables_path(), &feature.export_lines())
    }

    /// Replaces the aggregate feature list.
    pub fn write_feature_list(&self, list: &str) -> io::Result<()> {
        self.ensure_dir()?;
        fs::write(self.feature_list_path(), format!("{list}\n"))
    }

    /// First line of the feature list, if present and non-empty.
    pub fn feature_list_head(&self) -> Option<String> {
        let contents = fs::read_to_string(self.feature_list_path()).ok()?;
        contents
            .lines()
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
    }

    /// Records the firmware version of the applied manifest.
    pub fn write_version(&self, firmware_version: &str) -> io::Result<()> {
        self.ensure_dir()?;
        fs::write(self.dir.join(VERSION), format!("{firmware_version}\n"))
    }

    /// Firmware version recorded by the last applied manifest.
    pub fn last_firmware(&self) -> Option<String> {
        let contents = fs::read_to_string(self.dir.join(VERSION)).ok()?;
        contents.lines().next().map(|l| l.trim().to_string())
    }

    /// Appends lines to the applied-overrides list.
    pub fn append_tr181(&self, lines: &[String]) -> io::Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        self.append_lines(&self.tr181_list_path(), lines)
    }

    /// Returns true if `key` is owned by the bootstrap layer.
    pub fn bootstrap_contains(&self, key: &str) -> bool {
        fs::read_to_string(self.dir.join(BOOTSTRAP))
            .map(|contents| contents.contains(key))
            .unwrap_or(false)
    }

    fn append_lines(&self, path: &Path, lines: &[String]) -> io::Result<()> {
        self.ensure_dir()?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for line in lines {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

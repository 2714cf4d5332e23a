//! Environment stamps recorded next to each committed artifact.
//!
//! The stamp is stored as `<artifact>.stamp.json`. It records the tool version
//! and the fingerprint of the environment the artifact was generated in, so
//! that a changed search path or association list forces a rebuild even when
//! no source file changed.

use std::path::{Path, PathBuf};

use loadout_common::{ContentHash, TOOL_VERSION};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::guard::append_suffix;

/// Suffix appended to an artifact's file name to form its stamp path.
const STAMP_SUFFIX: &str = ".stamp.json";

/// The environment an artifact was generated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentStamp {
    /// Tool version that produced the artifact.
    pub tool_version: String,
    /// Fingerprint of the captured environment.
    pub fingerprint: ContentHash,
}

impl EnvironmentStamp {
    /// Creates a stamp for the running tool version.
    pub fn new(fingerprint: ContentHash) -> Self {
        Self {
            tool_version: TOOL_VERSION.to_string(),
            fingerprint,
        }
    }

    /// Returns the stamp path for `artifact`.
    pub fn path_for(artifact: &Path) -> PathBuf {
        append_suffix(artifact, STAMP_SUFFIX)
    }

    /// Loads the stamp for `artifact`, returning `None` if it doesn't exist
    /// or can't be parsed.
    pub fn load(artifact: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(Self::path_for(artifact)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Saves the stamp next to `artifact`.
    pub fn save(&self, artifact: &Path) -> Result<(), CacheError> {
        let path = Self::path_for(artifact);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::io(path, e))
    }

    /// Removes the stamp for `artifact`, if any.
    pub fn remove(artifact: &Path) -> Result<(), CacheError> {
        let path = Self::path_for(artifact);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    /// Returns `true` unless a readable stamp from this tool version records
    /// exactly `fingerprint`.
    pub fn environment_changed(artifact: &Path, fingerprint: ContentHash) -> bool {
        match Self::load(artifact) {
            Some(stamp) => stamp.tool_version != TOOL_VERSION || stamp.fingerprint != fingerprint,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packages.el");
        (dir, path)
    }

    #[test]
    fn stamp_path_appends_suffix() {
        assert_eq!(
            EnvironmentStamp::path_for(Path::new("/c/autoloads.el")),
            PathBuf::from("/c/autoloads.el.stamp.json")
        );
    }

    #[test]
    fn save_and_load() {
        let (_dir, path) = artifact();
        let fp = ContentHash::from_fields(["/opt/lisp", "rust-mode"]);
        EnvironmentStamp::new(fp).save(&path).unwrap();
        let loaded = EnvironmentStamp::load(&path).unwrap();
        assert_eq!(loaded.fingerprint, fp);
        assert_eq!(loaded.tool_version, TOOL_VERSION);
        assert!(!EnvironmentStamp::environment_changed(&path, fp));
    }

    #[test]
    fn missing_stamp_means_changed() {
        let (_dir, path) = artifact();
        assert!(EnvironmentStamp::environment_changed(
            &path,
            ContentHash::from_bytes(b"x")
        ));
    }

    #[test]
    fn different_fingerprint_means_changed() {
        let (_dir, path) = artifact();
        EnvironmentStamp::new(ContentHash::from_bytes(b"old"))
            .save(&path)
            .unwrap();
        assert!(EnvironmentStamp::environment_changed(
            &path,
            ContentHash::from_bytes(b"new")
        ));
    }

    #[test]
    fn other_tool_version_means_changed() {
        let (_dir, path) = artifact();
        let fp = ContentHash::from_bytes(b"env");
        let stamp = EnvironmentStamp {
            tool_version: "0.0.0-old".to_string(),
            fingerprint: fp,
        };
        stamp.save(&path).unwrap();
        assert!(EnvironmentStamp::environment_changed(&path, fp));
    }

    #[test]
    fn corrupt_stamp_means_changed() {
        let (_dir, path) = artifact();
        std::fs::write(EnvironmentStamp::path_for(&path), "not json {{{").unwrap();
        assert!(EnvironmentStamp::load(&path).is_none());
        assert!(EnvironmentStamp::environment_changed(
            &path,
            ContentHash::from_bytes(b"x")
        ));
    }

    #[test]
    fn remove_is_idempotent() {
        let (_dir, path) = artifact();
        EnvironmentStamp::new(ContentHash::from_bytes(b"x"))
            .save(&path)
            .unwrap();
        EnvironmentStamp::remove(&path).unwrap();
        EnvironmentStamp::remove(&path).unwrap();
        assert!(EnvironmentStamp::load(&path).is_none());
    }
}

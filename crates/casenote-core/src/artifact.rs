//! Artifact naming and idempotency predicates.
//!
//! Every stage output lives at a path derived purely from (stage, key):
//! `dir/prefix_KEY.ext`. The mapping is stable across runs, so a re-run
//! after a partial failure finds the same paths and detects completed work.

use std::fmt;
use std::path::{Path, PathBuf};

/// Fixed-width, 1-based item key (`"01"`, `"07"`, `"112"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey(String);

impl ItemKey {
    /// Format a 1-based index as a zero-padded key.
    pub fn from_index(index: usize) -> Self {
        Self(format!("{:02}", index))
    }

    /// Wrap an already-formatted key, e.g. the suffix of a batch result key.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared output artifact for one stage of the pipeline.
///
/// `path()` is the pure (stage, key) -> path function and `is_complete()`
/// the idempotency predicate the runner consults before executing a stage.
#[derive(Debug, Clone)]
pub struct ArtifactSpec {
    dir: PathBuf,
    prefix: String,
    ext: String,
}

impl ArtifactSpec {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str, ext: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.to_string(),
            ext: ext.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for `key`: `dir/prefix_KEY.ext`.
    pub fn path(&self, key: &ItemKey) -> PathBuf {
        self.dir.join(format!("{}_{}.{}", self.prefix, key, self.ext))
    }

    /// Whether the stage already produced its artifact for `key`.
    ///
    /// Presence is the whole check: content staleness is deliberately not
    /// detected, so artifacts from an interrupted run are reused as-is.
    pub fn is_complete(&self, key: &ItemKey) -> bool {
        self.path(key).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formatting() {
        assert_eq!(ItemKey::from_index(1).as_str(), "01");
        assert_eq!(ItemKey::from_index(7).as_str(), "07");
        assert_eq!(ItemKey::from_index(42).as_str(), "42");
        assert_eq!(ItemKey::from_index(112).as_str(), "112");
    }

    #[test]
    fn test_path_derivation_is_stable() {
        let spec = ArtifactSpec::new("outputs", "audio", "mp3");
        let key = ItemKey::from_index(7);
        assert_eq!(spec.path(&key), PathBuf::from("outputs/audio_07.mp3"));
        // Same inputs, same path.
        assert_eq!(spec.path(&key), spec.path(&ItemKey::from_index(7)));
    }

    #[test]
    fn test_is_complete_tracks_existence() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ArtifactSpec::new(dir.path(), "transcript_raw", "json");
        let key = ItemKey::from_index(3);

        assert!(!spec.is_complete(&key));
        std::fs::write(spec.path(&key), b"[]").unwrap();
        assert!(spec.is_complete(&key));
    }
}

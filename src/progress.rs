//! Progress snapshot persistence
//!
//! A session can be paused and resumed: the opened-question sets and
//! the score ledger are written to a JSON snapshot at orderly shutdown
//! and rehydrated on the next start. The file format is an adapter
//! detail; round-tripping is exact in both values and award order.
//! Loading tolerates snapshots written under an older configuration
//! (missing team/round pairs are backfilled when the session resumes),
//! and a missing or corrupt snapshot degrades to a fresh start instead
//! of crashing the session.

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{config::Registry, ledger::Ledger};

/// Errors raised by snapshot persistence
#[derive(Debug, Error)]
pub enum Error {
    /// No snapshot has been written yet
    #[error("no saved progress at {path}")]
    Missing {
        /// Where the snapshot was expected
        path: PathBuf,
    },
    /// The snapshot file could not be read or written
    #[error("failed to access saved progress: {0}")]
    Io(#[from] std::io::Error),
    /// The snapshot file exists but does not parse
    #[error("saved progress is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The persisted state of a paused session
///
/// Everything needed to resume: which questions were opened per round,
/// and the full score ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Opened question numbers per round name
    pub opened_questions: HashMap<String, BTreeSet<u32>>,
    /// The score ledger at the time of the save
    pub scores: Ledger,
}

impl Snapshot {
    /// An empty snapshot for a fresh session under this configuration
    pub fn fresh(registry: &Registry) -> Self {
        Self {
            opened_questions: HashMap::new(),
            scores: Ledger::new(registry),
        }
    }
}

/// Reads and writes progress snapshots at a fixed path
#[derive(Debug, Clone)]
pub struct ProgressStore {
    /// Location of the snapshot file
    path: PathBuf,
}

impl ProgressStore {
    /// Creates a store for the given snapshot path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Where this store keeps its snapshot
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a snapshot exists to resume from
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Writes a snapshot, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be written. Callers
    /// at shutdown should report the failure and carry on; a failed
    /// save must never take the session down.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), Error> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        std::fs::write(&self.path, json)?;
        tracing::info!(path = %self.path.display(), "progress saved");
        Ok(())
    }

    /// Reads the snapshot back
    ///
    /// # Errors
    ///
    /// Returns [`Error::Missing`] when no snapshot exists,
    /// [`Error::Io`] when it cannot be read, and [`Error::Malformed`]
    /// when it does not parse.
    pub fn load(&self) -> Result<Snapshot, Error> {
        if !self.path.exists() {
            return Err(Error::Missing {
                path: self.path.clone(),
            });
        }
        let file = std::fs::File::open(&self.path)?;
        let snapshot = serde_json::from_reader(std::io::BufReader::new(file))?;
        tracing::info!(path = %self.path.display(), "progress loaded");
        Ok(snapshot)
    }

    /// Reads the snapshot, falling back to a fresh one on any failure
    ///
    /// A missing snapshot is expected on first start; an unreadable one
    /// is reported and discarded rather than crashing the session.
    pub fn load_or_fresh(&self, registry: &Registry) -> Snapshot {
        match self.load() {
            Ok(snapshot) => snapshot,
            Err(Error::Missing { .. }) => {
                tracing::debug!(path = %self.path.display(), "no saved progress, starting fresh");
                Snapshot::fresh(registry)
            }
            Err(error) => {
                tracing::warn!(%error, "failed to load saved progress, starting fresh");
                Snapshot::fresh(registry)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RoundConfig, TeamName};
    use std::time::Duration;

    fn create_test_registry() -> Registry {
        Registry::new(
            vec![TeamName::new("Red"), TeamName::new("Blue")],
            vec![
                RoundConfig::new("R1", 10, Duration::from_secs(60)),
                RoundConfig::new("R2", 5, Duration::from_secs(30)),
            ],
        )
        .unwrap()
    }

    fn create_test_snapshot(registry: &Registry) -> Snapshot {
        let mut snapshot = Snapshot::fresh(registry);
        snapshot
            .opened_questions
            .entry("R1".to_owned())
            .or_default()
            .extend([1, 3, 7]);
        snapshot
            .scores
            .award(&TeamName::new("Red"), "R1", 5)
            .unwrap();
        snapshot
            .scores
            .award(&TeamName::new("Red"), "R1", 2)
            .unwrap();
        snapshot
            .scores
            .award(&TeamName::new("Blue"), "R2", 2)
            .unwrap();
        snapshot
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));
        let registry = create_test_registry();
        let snapshot = create_test_snapshot(&registry);

        store.save(&snapshot).unwrap();
        let reloaded = store.load().unwrap();

        assert_eq!(
            reloaded.opened_questions.get("R1"),
            snapshot.opened_questions.get("R1")
        );
        let red = TeamName::new("Red");
        assert_eq!(reloaded.scores.awards_for(&red, "R1"), &[5, 2]);
        assert_eq!(reloaded.scores.total_for(&red), 7);
        assert_eq!(reloaded.scores.total_for(&TeamName::new("Blue")), 2);
    }

    #[test]
    fn test_load_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));

        assert!(!store.exists());
        assert!(matches!(store.load(), Err(Error::Missing { .. })));
    }

    #[test]
    fn test_load_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = ProgressStore::new(path);
        assert!(matches!(store.load(), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_load_or_fresh_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, b"garbage").unwrap();

        let registry = create_test_registry();
        let store = ProgressStore::new(path);
        let snapshot = store.load_or_fresh(&registry);

        assert!(snapshot.opened_questions.is_empty());
        assert_eq!(snapshot.scores.total_for(&TeamName::new("Red")), 0);
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));
        let registry = create_test_registry();

        store.save(&Snapshot::fresh(&registry)).unwrap();
        let snapshot = create_test_snapshot(&registry);
        store.save(&snapshot).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.scores.total_for(&TeamName::new("Red")), 7);
    }
}

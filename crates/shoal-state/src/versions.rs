//! VersionStore: append-only, newest-first version history.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Version, VersionId, VersionSpec, epoch_secs, new_id};

/// Ordered collection of immutable versions for one application.
///
/// Index 0 is always the most recently appended version. Entries are never
/// mutated, reordered or removed once inserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionStore {
    versions: Vec<Version>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a version at the front and return its fresh id.
    pub fn append(&mut self, spec: VersionSpec) -> VersionId {
        let id = new_id("ver");
        self.versions.insert(
            0,
            Version {
                id: id.clone(),
                spec,
                created_at: epoch_secs(),
            },
        );
        debug!(version = %id, total = self.versions.len(), "version appended");
        id
    }

    /// All versions, newest first.
    pub fn list(&self) -> &[Version] {
        &self.versions
    }

    pub fn get(&self, id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// The most recently appended version.
    pub fn latest(&self) -> Option<&Version> {
        self.versions.first()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

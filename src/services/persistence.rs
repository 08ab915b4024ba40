//! Atomic snapshot persistence for the agent registry.
//!
//! The snapshot is a single JSON document mapping agent id to a
//! restorable record. Writes go to `<path>.tmp` and are renamed into
//! place, so a crash mid-save leaves the previous snapshot intact.
//! Load failures never clear a valid in-memory registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::domain::models::{Agent, AgentConfig, StorageConfig};
use crate::domain::ports::{SyndicateError, SyndicateResult};

/// Persisted per-skill state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSkill {
    pub xp: f64,
    pub last_exec: Option<DateTime<Utc>>,
}

/// Persisted form of one agent.
///
/// Kind and state are stored as integer codes; memory is an ordered
/// list of `[key, value]` pairs (LRU first) so reloading reproduces the
/// recency order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedAgent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(rename = "status")]
    pub state: u8,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub config: AgentConfig,
    pub memory: Vec<(String, Value)>,
    /// Raw per-skill entries; malformed entries are skipped on restore
    pub skills: Map<String, Value>,
}

impl PersistedAgent {
    /// Captures an agent's restorable state.
    pub fn capture(agent: &Agent) -> Self {
        let mut skills = Map::new();
        for (name, state) in &agent.skills {
            let entry = PersistedSkill {
                xp: state.xp,
                last_exec: state.last_exec,
            };
            if let Ok(value) = serde_json::to_value(&entry) {
                skills.insert(name.clone(), value);
            }
        }
        Self {
            id: agent.id.clone(),
            name: agent.name.clone(),
            kind: agent.kind.code(),
            state: agent.state.code(),
            created: agent.created,
            updated: agent.updated,
            config: agent.config.clone(),
            memory: agent.memory.entries_lru_first(),
            skills,
        }
    }

    /// Parses the per-skill entries, logging and skipping malformed ones.
    pub fn parsed_skills(&self) -> HashMap<String, PersistedSkill> {
        let mut out = HashMap::new();
        for (name, value) in &self.skills {
            match serde_json::from_value::<PersistedSkill>(value.clone()) {
                Ok(entry) => {
                    out.insert(name.clone(), entry);
                }
                Err(e) => {
                    warn!(skill = %name, error = %e, "malformed persisted skill entry, skipping");
                }
            }
        }
        out
    }
}

/// File-backed snapshot store.
pub struct SnapshotStore {
    path: PathBuf,
    backup_enabled: bool,
    backup_count: u32,
}

impl SnapshotStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            path: PathBuf::from(&config.path),
            backup_enabled: config.backup_enabled,
            backup_count: config.backup_count,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a snapshot file exists at the canonical path.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Writes the snapshot atomically: serialize, write `<path>.tmp`,
    /// rename into place. Concurrent saves are tolerated; the last
    /// rename wins.
    pub fn save(&self, agents: &[PersistedAgent]) -> SyndicateResult<()> {
        let document: HashMap<&str, &PersistedAgent> =
            agents.iter().map(|a| (a.id.as_str(), a)).collect();
        let body = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        if self.backup_enabled && self.exists() {
            self.rotate_backups();
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;

        info!(path = %self.path.display(), agents = agents.len(), "snapshot saved");
        Ok(())
    }

    /// Loads the snapshot. Returns `Ok(None)` when no file exists; a
    /// parse failure is an error the caller must not clear state over.
    pub fn load(&self) -> SyndicateResult<Option<HashMap<String, PersistedAgent>>> {
        if !self.exists() {
            return Ok(None);
        }
        let body = fs::read_to_string(&self.path)?;
        let document: HashMap<String, PersistedAgent> =
            serde_json::from_str(&body).map_err(|e| {
                SyndicateError::Serialization(format!(
                    "snapshot at {} is unreadable: {e}",
                    self.path.display()
                ))
            })?;
        Ok(Some(document))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut os = self.path.clone().into_os_string();
        os.push(".tmp");
        PathBuf::from(os)
    }

    /// Shifts `path.bak.N` backward and copies the current snapshot to
    /// `path.bak.1`. Rotation failures are logged, never fatal.
    fn rotate_backups(&self) {
        let backup = |n: u32| {
            let mut os = self.path.clone().into_os_string();
            os.push(format!(".bak.{n}"));
            PathBuf::from(os)
        };
        for n in (1..self.backup_count).rev() {
            let from = backup(n);
            if from.is_file() {
                if let Err(e) = fs::rename(&from, backup(n + 1)) {
                    warn!(error = %e, "backup rotation failed");
                }
            }
        }
        if self.backup_count > 0 {
            if let Err(e) = fs::copy(&self.path, backup(1)) {
                warn!(error = %e, "backup copy failed");
            }
        }
    }
}

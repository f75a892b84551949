//! Workflow persistence
//!
//! Load/save-by-key contract. Workflows are stored as their JSON document so
//! files exported from the editor and stored values share one format.

use dashmap::DashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use super::Workflow;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Backend(#[from] sled::Error),

    #[error("workflow encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub trait WorkflowStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Workflow>, StoreError>;

    fn save(&self, key: &str, workflow: &Workflow) -> Result<(), StoreError>;

    /// Stored keys in ascending order
    fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Returns whether the key existed
    fn remove(&self, key: &str) -> Result<bool, StoreError>;
}

/// sled-backed store
#[derive(Debug, Clone)]
pub struct SledWorkflowStore {
    db: sled::Db,
}

impl SledWorkflowStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Opened workflow store");
        Ok(Self { db })
    }
}

impl WorkflowStore for SledWorkflowStore {
    fn load(&self, key: &str) -> Result<Option<Workflow>, StoreError> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, key: &str, workflow: &Workflow) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(workflow)?;
        self.db.insert(key.as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        self.db
            .iter()
            .keys()
            .map(|key| Ok(String::from_utf8_lossy(&key?).into_owned()))
            .collect()
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let existed = self.db.remove(key.as_bytes())?.is_some();
        self.db.flush()?;
        Ok(existed)
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryWorkflowStore {
    workflows: DashMap<String, Workflow>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowStore for MemoryWorkflowStore {
    fn load(&self, key: &str) -> Result<Option<Workflow>, StoreError> {
        Ok(self.workflows.get(key).map(|entry| entry.value().clone()))
    }

    fn save(&self, key: &str, workflow: &Workflow) -> Result<(), StoreError> {
        self.workflows.insert(key.to_string(), workflow.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.workflows.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.workflows.remove(key).is_some())
    }
}

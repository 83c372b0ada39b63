use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::RwLock;

use crate::models::ReferenceRecord;

use super::ReferenceRepository;

/// Process-local reference list; contents are lost on exit.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    records: Arc<RwLock<Vec<ReferenceRecord>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ReferenceRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }
}

impl ReferenceRepository for MemoryRepository {
    async fn list(&self) -> Result<Vec<ReferenceRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn append(&self, record: ReferenceRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.iter().any(|existing| existing.id == record.id) {
            bail!("reference {} already exists", record.id);
        }
        records.push(record);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| record.id != id);
        Ok(records.len() != before)
    }
}

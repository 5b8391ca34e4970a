use async_trait::async_trait;
use pinhole_core::error::Result;
use pinhole_core::merge;
use pinhole_core::model::{ClientRecord, DeleteTask, ShortEntry};
use pinhole_core::storage::Storage;
use pinhole_core::tag::Tag;
use tokio::sync::RwLock;

/// In-memory implementation of the storage contract.
///
/// All records live in one ordered collection behind a single
/// reader/writer lock: reads scan linearly under the shared lock,
/// writes and soft deletes take the exclusive lock. The coarse lock is
/// the intended concurrency discipline for this backend, trading
/// throughput for obvious correctness.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<ClientRecord>>,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn write(&self, record: ClientRecord) -> Result<()> {
        let mut records = self.records.write().await;
        merge::merge(&mut records, record)
    }

    async fn read_by_cookie(&self, cookie: &str) -> Result<Option<ClientRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.cookie == cookie).cloned())
    }

    async fn read_by_tag(&self, tag: &Tag) -> Result<Option<ShortEntry>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find_map(|r| r.entry_by_tag(tag))
            .cloned())
    }

    async fn tag_by_url(&self, long_url: &str, cookie: &str) -> Result<Option<Tag>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.cookie == cookie)
            .and_then(|r| r.active_entry(long_url))
            .map(|e| e.tag.clone()))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn apply_delete(&self, task: &DeleteTask) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(record) = records.iter_mut().find(|r| r.cookie == task.cookie) {
            for entry in &mut record.entries {
                if task.tags.contains(&entry.tag) {
                    entry.deleted = true;
                }
            }
        }
        Ok(())
    }
}

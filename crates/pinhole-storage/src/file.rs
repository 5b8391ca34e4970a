use async_trait::async_trait;
use pinhole_core::error::{Result, StorageError};
use pinhole_core::merge;
use pinhole_core::model::{ClientRecord, DeleteTask, ShortEntry};
use pinhole_core::storage::Storage;
use pinhole_core::tag::Tag;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::RwLock;
use tracing::warn;

/// File-backed implementation of the storage contract.
///
/// Records are persisted as newline-delimited JSON, one `ClientRecord`
/// per line. Every write loads the whole file, merges the incoming
/// record, and rewrites every line — O(total records) per write, an
/// accepted limit for the small/dev deployments this backend targets.
/// An internal reader/writer lock keeps the truncate-and-rewrite cycle
/// exclusive: concurrent readers share the lock, so a read can never
/// land inside a half-written file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileStore {
    /// Creates a store over `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and re-merges every record in the file.
    ///
    /// A missing file is an empty store. Duplicate lines for one cookie
    /// collapse through the merge, so a file written by an older process
    /// generation still reads back consistently. Callers must hold the
    /// lock: shared for plain reads, exclusive around a rewrite.
    async fn load(&self) -> Result<Vec<ClientRecord>> {
        let file = match fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::Unavailable(err.to_string())),
        };

        let mut lines = BufReader::new(file).lines();
        let mut records = Vec::new();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
        {
            if line.trim().is_empty() {
                continue;
            }
            let record: ClientRecord = serde_json::from_str(&line).map_err(|e| {
                StorageError::InvalidData(format!("bad record line in {:?}: {e}", self.path))
            })?;
            merge::merge_data(&mut records, record);
        }
        Ok(records)
    }

    /// Truncates the file and rewrites every record, one line each.
    async fn persist(&self, records: &[ClientRecord]) -> Result<()> {
        let mut out = String::new();
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| StorageError::InvalidData(e.to_string()))?;
            out.push_str(&line);
            out.push('\n');
        }
        fs::write(&self.path, out)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl Storage for FileStore {
    async fn write(&self, record: ClientRecord) -> Result<()> {
        let _guard = self.lock.write().await;
        let mut records = self.load().await?;
        merge::merge(&mut records, record)?;
        self.persist(&records).await
    }

    async fn read_by_cookie(&self, cookie: &str) -> Result<Option<ClientRecord>> {
        let _guard = self.lock.read().await;
        let records = self.load().await?;
        Ok(records.into_iter().find(|r| r.cookie == cookie))
    }

    async fn read_by_tag(&self, tag: &Tag) -> Result<Option<ShortEntry>> {
        let _guard = self.lock.read().await;
        let records = self.load().await?;
        Ok(records
            .iter()
            .find_map(|r| r.entry_by_tag(tag))
            .cloned())
    }

    async fn tag_by_url(&self, long_url: &str, cookie: &str) -> Result<Option<Tag>> {
        let _guard = self.lock.read().await;
        let records = self.load().await?;
        Ok(records
            .iter()
            .find(|r| r.cookie == cookie)
            .and_then(|r| r.active_entry(long_url))
            .map(|e| e.tag.clone()))
    }

    async fn ping(&self) -> Result<()> {
        match fs::metadata(&self.path).await {
            Ok(_) => Ok(()),
            // the file appears on first write; a missing file is healthy
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Unavailable(err.to_string())),
        }
    }

    async fn close(&self) -> Result<()> {
        // no handles are held open between operations
        Ok(())
    }

    async fn apply_delete(&self, task: &DeleteTask) -> Result<()> {
        let _guard = self.lock.write().await;
        let mut records = self.load().await?;
        let Some(record) = records.iter_mut().find(|r| r.cookie == task.cookie) else {
            warn!(cookie = %task.cookie, "delete task for unknown cookie");
            return Ok(());
        };
        for entry in &mut record.entries {
            if task.tags.contains(&entry.tag) {
                entry.deleted = true;
            }
        }
        self.persist(&records).await
    }
}

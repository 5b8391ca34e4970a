//! Asynchronous soft-delete pipeline.
//!
//! A distributor task reads [`DeleteTask`]s from a single queue and
//! round-robins them across a fixed set of worker lanes. Each lane is a
//! capacity-1 channel feeding one long-lived worker, so handing a task
//! to a busy lane blocks the distributor — natural backpressure without
//! an unbounded buffer. Round-robin keeps per-lane FIFO ordering of
//! tasks; nothing is promised across lanes.
//!
//! Enqueueing is fire-and-forget: the submitter is told "accepted" as
//! soon as the task is on the queue, so a client polling immediately
//! after a delete may briefly still see the entry as active.

use pinhole_core::model::DeleteTask;
use pinhole_core::storage::Storage;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Default number of worker lanes.
pub const DEFAULT_WORKERS: usize = 10;

/// Handle on a running delete pipeline.
///
/// Dropping the handle without calling
/// [`shutdown_and_drain`](CleanerHandle::shutdown_and_drain) signals
/// shutdown implicitly (the watch sender closes) but does not wait for
/// the workers.
pub struct CleanerHandle {
    shutdown: watch::Sender<bool>,
    distributor: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl CleanerHandle {
    /// Signals shutdown and awaits the distributor and every worker.
    pub async fn shutdown_and_drain(self) {
        let _ = self.shutdown.send(true);
        let _ = self.distributor.await;
        for worker in self.workers {
            let _ = worker.await;
        }
        info!("delete pipeline drained");
    }
}

/// Spawns the delete pipeline over `store`.
///
/// `workers` lanes are created (0 falls back to [`DEFAULT_WORKERS`]).
/// The pipeline runs until `queue` is closed or shutdown is signalled
/// through the returned handle; cancellation is cooperative, checked on
/// every iteration by the distributor and each worker.
pub fn start_cleaner<S: Storage>(
    store: Arc<S>,
    queue: mpsc::Receiver<DeleteTask>,
    workers: usize,
) -> CleanerHandle {
    let workers = if workers == 0 { DEFAULT_WORKERS } else { workers };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut lanes = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);
    for lane in 0..workers {
        // capacity 1: a busy lane pushes back on the distributor
        let (tx, rx) = mpsc::channel::<DeleteTask>(1);
        lanes.push(tx);
        handles.push(tokio::spawn(worker_loop(
            lane,
            Arc::clone(&store),
            rx,
            shutdown_rx.clone(),
        )));
    }

    let distributor = tokio::spawn(distribute(queue, lanes, shutdown_rx));

    CleanerHandle {
        shutdown: shutdown_tx,
        distributor,
        workers: handles,
    }
}

async fn distribute(
    mut queue: mpsc::Receiver<DeleteTask>,
    lanes: Vec<mpsc::Sender<DeleteTask>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut next = 0usize;
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            task = queue.recv() => {
                let Some(task) = task else {
                    debug!("delete queue closed, stopping distributor");
                    break;
                };
                let lane = next % lanes.len();
                next = next.wrapping_add(1);
                if lanes[lane].send(task).await.is_err() {
                    // worker gone; nothing sensible left to do
                    break;
                }
            }
        }
    }
    // dropping the lane senders lets each worker finish its queued task
    // and exit
}

async fn worker_loop<S: Storage>(
    lane: usize,
    store: Arc<S>,
    mut tasks: mpsc::Receiver<DeleteTask>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            task = tasks.recv() => {
                let Some(task) = task else { break };
                match store.apply_delete(&task).await {
                    Ok(()) => {
                        debug!(lane, cookie = %task.cookie, tags = task.tags.len(), "soft delete applied");
                    }
                    Err(err) => {
                        // best effort, at most once: log and drop the task
                        error!(lane, cookie = %task.cookie, %err, "soft delete failed, task dropped");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use async_trait::async_trait;
    use pinhole_core::error::{Result, StorageError};
    use pinhole_core::model::{ClientRecord, ShortEntry};
    use pinhole_core::tag::Tag;
    use std::time::Duration;

    fn record(cookie: &str, tag: &str, url: &str) -> ClientRecord {
        ClientRecord {
            cookie: cookie.to_string(),
            key: format!("key-{cookie}"),
            entries: vec![ShortEntry::new(Tag::new_unchecked(tag), url)],
        }
    }

    async fn wait_until_deleted(store: &MemoryStore, tag: &Tag) -> bool {
        for _ in 0..100 {
            if let Some(entry) = store.read_by_tag(tag).await.unwrap() {
                if entry.deleted {
                    return true;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn two_worker_pipeline_applies_soft_delete() {
        let store = Arc::new(MemoryStore::new());
        store
            .write(record("c1", "aaaaaaaa", "http://example.org"))
            .await
            .unwrap();

        let (tx, rx) = mpsc::channel(16);
        let handle = start_cleaner(Arc::clone(&store), rx, 2);

        tx.send(DeleteTask {
            cookie: "c1".to_string(),
            tags: vec![Tag::new_unchecked("aaaaaaaa")],
        })
        .await
        .unwrap();

        assert!(wait_until_deleted(&store, &Tag::new_unchecked("aaaaaaaa")).await);

        drop(tx);
        handle.shutdown_and_drain().await;
    }

    #[tokio::test]
    async fn unrelated_cookies_unaffected() {
        let store = Arc::new(MemoryStore::new());
        store
            .write(record("c1", "aaaaaaaa", "http://example.org"))
            .await
            .unwrap();
        store
            .write(record("c2", "bbbbbbbb", "http://other.example"))
            .await
            .unwrap();

        let (tx, rx) = mpsc::channel(16);
        let handle = start_cleaner(Arc::clone(&store), rx, 2);

        tx.send(DeleteTask {
            cookie: "c1".to_string(),
            tags: vec![Tag::new_unchecked("aaaaaaaa")],
        })
        .await
        .unwrap();

        assert!(wait_until_deleted(&store, &Tag::new_unchecked("aaaaaaaa")).await);

        let other = store
            .read_by_tag(&Tag::new_unchecked("bbbbbbbb"))
            .await
            .unwrap()
            .unwrap();
        assert!(!other.deleted);

        drop(tx);
        handle.shutdown_and_drain().await;
    }

    #[tokio::test]
    async fn closing_the_queue_drains_the_pipeline() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..8 {
            store
                .write(record(
                    &format!("c{i}"),
                    &format!("tag{i:05}"),
                    &format!("http://example{i}.org"),
                ))
                .await
                .unwrap();
        }

        let (tx, rx) = mpsc::channel(16);
        let handle = start_cleaner(Arc::clone(&store), rx, 3);

        for i in 0..8 {
            tx.send(DeleteTask {
                cookie: format!("c{i}"),
                tags: vec![Tag::new_unchecked(format!("tag{i:05}"))],
            })
            .await
            .unwrap();
        }
        drop(tx);

        for i in 0..8 {
            assert!(wait_until_deleted(&store, &Tag::new_unchecked(format!("tag{i:05}"))).await);
        }

        handle.shutdown_and_drain().await;
    }

    /// A store whose deletes always fail; the pipeline must keep going.
    struct FailingStore(MemoryStore);

    #[async_trait]
    impl Storage for FailingStore {
        async fn write(&self, record: ClientRecord) -> Result<()> {
            self.0.write(record).await
        }
        async fn read_by_cookie(&self, cookie: &str) -> Result<Option<ClientRecord>> {
            self.0.read_by_cookie(cookie).await
        }
        async fn read_by_tag(&self, tag: &Tag) -> Result<Option<ShortEntry>> {
            self.0.read_by_tag(tag).await
        }
        async fn tag_by_url(&self, long_url: &str, cookie: &str) -> Result<Option<Tag>> {
            self.0.tag_by_url(long_url, cookie).await
        }
        async fn ping(&self) -> Result<()> {
            self.0.ping().await
        }
        async fn close(&self) -> Result<()> {
            self.0.close().await
        }
        async fn apply_delete(&self, _task: &DeleteTask) -> Result<()> {
            Err(StorageError::Unavailable("down for maintenance".into()))
        }
    }

    #[tokio::test]
    async fn failed_tasks_are_dropped_not_fatal() {
        let store = Arc::new(FailingStore(MemoryStore::new()));

        let (tx, rx) = mpsc::channel(16);
        let handle = start_cleaner(Arc::clone(&store), rx, 2);

        for i in 0..4 {
            tx.send(DeleteTask {
                cookie: format!("c{i}"),
                tags: vec![Tag::new_unchecked(format!("tag{i:05}"))],
            })
            .await
            .unwrap();
        }
        drop(tx);

        // the pipeline drains despite every task failing
        handle.shutdown_and_drain().await;
    }

    #[tokio::test]
    async fn zero_workers_falls_back_to_default() {
        let store = Arc::new(MemoryStore::new());
        store
            .write(record("c1", "aaaaaaaa", "http://example.org"))
            .await
            .unwrap();

        let (tx, rx) = mpsc::channel(16);
        let handle = start_cleaner(Arc::clone(&store), rx, 0);

        tx.send(DeleteTask {
            cookie: "c1".to_string(),
            tags: vec![Tag::new_unchecked("aaaaaaaa")],
        })
        .await
        .unwrap();

        assert!(wait_until_deleted(&store, &Tag::new_unchecked("aaaaaaaa")).await);

        drop(tx);
        handle.shutdown_and_drain().await;
    }
}

use crate::error::Result;
use crate::model::{ClientRecord, DeleteTask, ShortEntry};
use crate::tag::Tag;
use async_trait::async_trait;

/// The storage contract shared by every backend.
///
/// All backends partition records by the client cookie and enforce the
/// same invariant: a (cookie, URL) pair is unique among non-deleted
/// entries, and a violating write fails with
/// [`DuplicateUrl`](crate::StorageError::DuplicateUrl) without mutating
/// anything. Absence is expressed as `Ok(None)`, never as an error.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Persists `record`, merging it into the client's stored state.
    ///
    /// Must enforce the active-uniqueness invariant atomically: if any
    /// URL of `record` already has an active entry under that cookie the
    /// write fails with `DuplicateUrl` and the caller resolves the
    /// existing tag via [`tag_by_url`](Storage::tag_by_url).
    async fn write(&self, record: ClientRecord) -> Result<()>;

    /// Retrieves the full record for a client cookie.
    async fn read_by_cookie(&self, cookie: &str) -> Result<Option<ClientRecord>>;

    /// Retrieves the entry identified by `tag`, deleted or not.
    async fn read_by_tag(&self, tag: &Tag) -> Result<Option<ShortEntry>>;

    /// Resolves the tag of the active entry for (`long_url`, `cookie`).
    async fn tag_by_url(&self, long_url: &str, cookie: &str) -> Result<Option<Tag>>;

    /// Liveness check.
    async fn ping(&self) -> Result<()>;

    /// Releases resources held by the backend.
    async fn close(&self) -> Result<()>;

    /// Applies one soft-delete task, flipping `deleted` on the named
    /// tags under the task's cookie. Tags the client does not own are
    /// ignored. This is the worker-side operation of the delete
    /// pipeline; callers enqueue [`DeleteTask`]s instead of calling it
    /// directly.
    async fn apply_delete(&self, task: &DeleteTask) -> Result<()>;
}

use crate::file::FileStore;
use crate::memory::MemoryStore;
use crate::postgres::PgStore;
use async_trait::async_trait;
use pinhole_core::error::Result;
use pinhole_core::model::{ClientRecord, DeleteTask, ShortEntry};
use pinhole_core::storage::Storage;
use pinhole_core::tag::Tag;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

fn default_max_connections() -> u32 {
    crate::postgres::DEFAULT_MAX_CONNECTIONS
}

/// Backend selection, decided once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Memory,
    File {
        path: PathBuf,
    },
    Postgres {
        url: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

/// The closed set of storage backends.
///
/// Exactly one variant is constructed at startup from a
/// [`BackendConfig`] and held as an owned dependency by the front-ends;
/// there is no ambient global store.
#[derive(Debug)]
pub enum Backend {
    Memory(MemoryStore),
    File(FileStore),
    Postgres(PgStore),
}

impl Backend {
    /// Builds the backend described by `config`.
    pub async fn open(config: BackendConfig) -> Result<Self> {
        match config {
            BackendConfig::Memory => {
                info!("using in-memory storage backend");
                Ok(Backend::Memory(MemoryStore::new()))
            }
            BackendConfig::File { path } => {
                info!(path = %path.display(), "using file storage backend");
                Ok(Backend::File(FileStore::new(path)))
            }
            BackendConfig::Postgres {
                url,
                max_connections,
            } => {
                info!(max_connections, "using postgres storage backend");
                let store = PgStore::connect_with(&url, max_connections).await?;
                Ok(Backend::Postgres(store))
            }
        }
    }
}

macro_rules! delegate {
    ($self:ident, $store:ident => $body:expr) => {
        match $self {
            Backend::Memory($store) => $body,
            Backend::File($store) => $body,
            Backend::Postgres($store) => $body,
        }
    };
}

#[async_trait]
impl Storage for Backend {
    async fn write(&self, record: ClientRecord) -> Result<()> {
        delegate!(self, store => store.write(record).await)
    }

    async fn read_by_cookie(&self, cookie: &str) -> Result<Option<ClientRecord>> {
        delegate!(self, store => store.read_by_cookie(cookie).await)
    }

    async fn read_by_tag(&self, tag: &Tag) -> Result<Option<ShortEntry>> {
        delegate!(self, store => store.read_by_tag(tag).await)
    }

    async fn tag_by_url(&self, long_url: &str, cookie: &str) -> Result<Option<Tag>> {
        delegate!(self, store => store.tag_by_url(long_url, cookie).await)
    }

    async fn ping(&self) -> Result<()> {
        delegate!(self, store => store.ping().await)
    }

    async fn close(&self) -> Result<()> {
        delegate!(self, store => store.close().await)
    }

    async fn apply_delete(&self, task: &DeleteTask) -> Result<()> {
        delegate!(self, store => store.apply_delete(task).await)
    }
}

//! File-backed document store

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{newest_first, DocumentStore, StoreError, StoreResult};

/// Stores one JSON document per `(table, id)` under a root directory.
///
/// Tables with many rows per owner (e.g. `tasks`) keep a JSON array in
/// the owner's document.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            root: dir.as_ref().to_path_buf(),
        }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the file path for a document
    fn document_path(&self, table: &str, id: &str) -> PathBuf {
        self.root
            .join(path_component(table))
            .join(format!("{}.json", path_component(id)))
    }

    async fn read_document(&self, table: &str, id: &str) -> StoreResult<Option<Value>> {
        let path = self.document_path(table, id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

/// Percent-encode a name so distinct ids never share a file.
/// Dots are escaped too, keeping `.` and `..` inside the root.
fn path_component(name: &str) -> String {
    urlencoding::encode(name).replace('.', "%2E")
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn select_by_id(&self, table: &str, id: &str) -> StoreResult<Value> {
        self.read_document(table, id)
            .await?
            .ok_or_else(|| StoreError::not_found(table, id))
    }

    async fn select_recent(
        &self,
        table: &str,
        owner: &str,
        order_by: &str,
        limit: usize,
    ) -> StoreResult<Vec<Value>> {
        let rows = match self.read_document(table, owner).await? {
            Some(Value::Array(rows)) => rows,
            Some(_) => {
                return Err(StoreError::Backend(format!(
                    "{}/{} is not a row list",
                    table, owner
                )))
            }
            None => Vec::new(),
        };
        Ok(newest_first(rows, order_by, limit))
    }

    async fn upsert(&self, table: &str, id: &str, record: Value) -> StoreResult<()> {
        let path = self.document_path(table, id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so a crash never leaves a truncated document
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(&record)?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Wrote document {}", path.display());
        Ok(())
    }

    async fn delete_by_id(&self, table: &str, id: &str) -> StoreResult<()> {
        let path = self.document_path(table, id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted document {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

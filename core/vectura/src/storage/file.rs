use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use crate::concurrency::run_bounded;
use crate::document::Document;
use crate::error::{VecturaError, VecturaResult};
use crate::storage::traits::Storage;

#[cfg(unix)]
const FILE_MODE: u32 = 0o600;
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// One file per document, `<dir>/<uuid>.json` (spec §4.6/§6). Writes are
/// atomic (write to a temp file, then rename); on unix the file is chmod'd
/// to owner-only read/write and the directory to owner-only rwx when this
/// storage creates it.
pub struct FileStorage {
    dir: PathBuf,
    max_concurrent: usize,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>, max_concurrent: usize) -> Self {
        Self { dir: dir.into(), max_concurrent: max_concurrent.max(1) }
    }

    fn path_for(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn tmp_path_for(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json.tmp"))
    }

    async fn list_json_files(&self) -> VecturaResult<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| VecturaError::load_failed(format!("reading directory {:?}: {e}", self.dir)))?;
        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| VecturaError::load_failed(format!("scanning directory {:?}: {e}", self.dir)))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    async fn load_one(path: &Path) -> Result<Document, String> {
        let bytes = fs::read(path).await.map_err(|e| format!("reading {path:?}: {e}"))?;
        serde_json::from_slice(&bytes).map_err(|e| format!("decoding {path:?}: {e}"))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn prepare(&self) -> VecturaResult<()> {
        let existed = fs::try_exists(&self.dir).await.unwrap_or(false);
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| VecturaError::save_failed(format!("creating storage directory: {e}")))?;

        #[cfg(unix)]
        if !existed {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(DIR_MODE);
            if let Err(e) = fs::set_permissions(&self.dir, perms).await {
                tracing::warn!("failed to set directory mode on {:?}: {e}", self.dir);
            }
        }
        Ok(())
    }

    async fn load_all(&self) -> VecturaResult<Vec<Document>> {
        let paths = self.list_json_files().await?;
        let total = paths.len();

        let (successes, failures) = run_bounded(
            paths,
            self.max_concurrent,
            |_path| None,
            |path| async move { Self::load_one(&path).await },
        )
        .await;

        for failure in &failures {
            tracing::warn!("failed to load document: {}", failure.message);
        }

        if !failures.is_empty() {
            return Err(VecturaError::load_failed(format!(
                "{} of {} document(s) failed to load",
                failures.len(),
                total
            )));
        }

        Ok(successes)
    }

    async fn save(&self, doc: &Document) -> VecturaResult<()> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp_path = self.tmp_path_for(&doc.id);
        let final_path = self.path_for(&doc.id);

        fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| VecturaError::save_failed(format!("writing {tmp_path:?}: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(FILE_MODE);
            if let Err(e) = fs::set_permissions(&tmp_path, perms).await {
                tracing::warn!("failed to set file mode on {:?}: {e}", tmp_path);
            }
        }

        fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| VecturaError::save_failed(format!("renaming into {final_path:?}: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            match fs::metadata(&final_path).await {
                Ok(meta) if meta.permissions().mode() & 0o777 != FILE_MODE => {
                    tracing::warn!(
                        "document file {:?} has mode {:o}, expected {:o}",
                        final_path,
                        meta.permissions().mode() & 0o777,
                        FILE_MODE
                    );
                }
                Err(e) => tracing::warn!("failed to verify mode on {:?}: {e}", final_path),
                _ => {}
            }
        }

        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> VecturaResult<()> {
        let path = self.path_for(id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VecturaError::save_failed(format!("deleting {path:?}: {e}"))),
        }
    }

    async fn count(&self) -> VecturaResult<usize> {
        Ok(self.list_json_files().await?.len())
    }

    async fn save_batch(&self, docs: &[Document]) -> VecturaResult<()> {
        let total = docs.len();
        let docs = docs.to_vec();
        let this_dir = self.dir.clone();
        let max_concurrent = self.max_concurrent;

        let (_successes, failures) = run_bounded(
            docs,
            max_concurrent,
            |doc| Some(doc.id),
            move |doc| {
                let dir = this_dir.clone();
                async move {
                    let storage = FileStorage::new(dir, 1);
                    storage.save(&doc).await.map_err(|e| e.to_string())
                }
            },
        )
        .await;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(crate::concurrency::BatchError { total, failures }.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(text: &str) -> Document {
        Document::new(Uuid::new_v4(), text.to_string(), vec![1.0, 0.0], Utc::now())
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path(), 4);
        storage.prepare().await.unwrap();

        let d = doc("hello");
        storage.save(&d).await.unwrap();

        let all = storage.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, d.id);
        assert_eq!(all[0].text, "hello");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path(), 4);
        storage.prepare().await.unwrap();

        let id = Uuid::new_v4();
        storage.delete(&id).await.unwrap();
        storage.delete(&id).await.unwrap();
    }

    #[tokio::test]
    async fn save_batch_persists_all() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path(), 2);
        storage.prepare().await.unwrap();

        let docs: Vec<Document> = (0..5).map(|i| doc(&format!("doc {i}"))).collect();
        storage.save_batch(&docs).await.unwrap();

        assert_eq!(storage.count().await.unwrap(), 5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_mode_is_owner_read_write_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(tmp.path(), 4);
        storage.prepare().await.unwrap();

        let d = doc("secret");
        storage.save(&d).await.unwrap();

        let meta = std::fs::metadata(storage.path_for(&d.id)).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, FILE_MODE);
    }
}

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use stockhook_core::DeliveryRecord;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::keys;
use crate::traits::{
    BlobPrefix, BlobReceipt, BlobStream, DeleteReport, FileRemoval, RecordStore, StorageError,
    StorageResult,
};

const COPY_BUFFER_SIZE: usize = 64 * 1024;
const MAX_ID_ATTEMPTS: usize = 8;

/// Record store backed by a single local directory
#[derive(Clone, Debug)]
pub struct LocalRecordStore {
    base_path: PathBuf,
}

impl LocalRecordStore {
    /// Open (and create if needed) the data directory.
    ///
    /// Temp files left behind by an interrupted write are removed here; they were
    /// never visible to readers.
    pub async fn open(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;

        let store = LocalRecordStore { base_path };
        let swept = store.sweep_temp_files().await?;
        if swept > 0 {
            tracing::info!(
                data_dir = %store.base_path.display(),
                count = swept,
                "Removed stale temp files"
            );
        }
        Ok(store)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    async fn sweep_temp_files(&self) -> StorageResult<usize> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.ends_with(keys::TEMP_SUFFIX) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "Failed to remove stale temp file");
                }
            }
        }
        Ok(removed)
    }

    /// Pick an identifier no existing file uses and open its blob temp file.
    async fn reserve_blob(&self) -> StorageResult<(String, PathBuf, PathBuf, fs::File)> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = keys::generate_id(Utc::now());
            let blob_path = keys::blob_path(&self.base_path, &id)?;
            let record_path = keys::record_path(&self.base_path, &id)?;
            if fs::try_exists(&blob_path).await? || fs::try_exists(&record_path).await? {
                tracing::debug!(id = %id, "Identifier already in use, regenerating");
                continue;
            }

            let temp_path = keys::temp_path(&blob_path);
            match create_new(&temp_path).await {
                Ok(file) => return Ok((id, blob_path, temp_path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(id = %id, "Identifier already in flight, regenerating");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StorageError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "could not allocate a unique identifier",
        )))
    }

    /// Write `bytes` next to `final_path`, fsync, then rename into place.
    async fn write_atomic(&self, final_path: &Path, bytes: &[u8]) -> StorageResult<()> {
        let temp_path = keys::temp_path(final_path);
        let mut file = create_new(&temp_path).await?;

        let written = async {
            file.write_all(bytes).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, final_path).await
        }
        .await;

        if let Err(e) = written {
            remove_quietly(&temp_path).await;
            return Err(e.into());
        }

        self.sync_dir().await;
        Ok(())
    }

    /// Persist the directory entry of a rename. Not every platform supports this.
    async fn sync_dir(&self) {
        let synced = match fs::File::open(&self.base_path).await {
            Ok(dir) => dir.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = synced {
            tracing::debug!(error = %e, "Directory sync skipped");
        }
    }

    async fn remove(&self, path: &Path) -> FileRemoval {
        match fs::remove_file(path).await {
            Ok(()) => FileRemoval::Removed,
            Err(e) if e.kind() == ErrorKind::NotFound => FileRemoval::Missing,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove file");
                FileRemoval::Failed(e.to_string())
            }
        }
    }
}

async fn create_new(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file");
        }
    }
}

/// Copy exactly `expected_len` bytes, hashing as they are written.
async fn copy_hashed(
    reader: &mut (dyn AsyncRead + Send + Unpin),
    file: &mut fs::File,
    expected_len: u64,
) -> StorageResult<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut received: u64 = 0;

    while received < expected_len {
        let want = (expected_len - received).min(buf.len() as u64) as usize;
        // A sender that disconnects mid-body ends the stream early.
        let n = match reader.read(&mut buf[..want]).await {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => 0,
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            return Err(StorageError::ShortRead {
                expected: expected_len,
                received,
            });
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n]).await?;
        received += n as u64;
    }

    file.sync_all().await?;
    Ok(hex::encode(hasher.finalize()))
}

/// Unsafe identifiers are reported as missing, never as a distinct error.
fn checked_path(
    build: fn(&Path, &str) -> StorageResult<PathBuf>,
    base: &Path,
    id: &str,
) -> StorageResult<PathBuf> {
    build(base, id).map_err(|_| StorageError::NotFound(id.to_string()))
}

fn not_found_or(id: &str, e: std::io::Error) -> StorageError {
    if e.kind() == ErrorKind::NotFound {
        StorageError::NotFound(id.to_string())
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl RecordStore for LocalRecordStore {
    async fn put(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        expected_len: u64,
    ) -> StorageResult<BlobReceipt> {
        let start = std::time::Instant::now();
        let (id, blob_path, temp_path, mut file) = self.reserve_blob().await?;

        let copied = copy_hashed(reader, &mut file, expected_len).await;
        drop(file);
        let sha256 = match copied {
            Ok(sha256) => sha256,
            Err(e) => {
                remove_quietly(&temp_path).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp_path, &blob_path).await {
            remove_quietly(&temp_path).await;
            return Err(e.into());
        }
        self.sync_dir().await;

        tracing::debug!(
            id = %id,
            size_bytes = expected_len,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Blob committed"
        );

        Ok(BlobReceipt {
            id,
            size: expected_len,
            sha256,
        })
    }

    async fn commit_record(&self, record: &DeliveryRecord) -> StorageResult<()> {
        let path = keys::record_path(&self.base_path, &record.id)?;
        keys::validate_id(&record.body_ref)?;

        let mut bytes = serde_json::to_vec_pretty(record).map_err(|e| StorageError::Corrupt {
            id: record.id.clone(),
            reason: e.to_string(),
        })?;
        bytes.push(b'\n');

        self.write_atomic(&path, &bytes).await
    }

    async fn get(&self, id: &str) -> StorageResult<DeliveryRecord> {
        let path = checked_path(keys::record_path, &self.base_path, id)?;
        let bytes = fs::read(&path).await.map_err(|e| not_found_or(id, e))?;

        let record: DeliveryRecord =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        if record.id != id {
            return Err(StorageError::Corrupt {
                id: id.to_string(),
                reason: format!("record names itself {:?}", record.id),
            });
        }
        Ok(record)
    }

    async fn list(&self, limit: Option<usize>) -> StorageResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(keys::id_from_record_file_name) {
                ids.push(id.to_string());
            }
        }

        ids.sort_unstable_by(|a, b| b.cmp(a));
        if let Some(limit) = limit {
            ids.truncate(limit);
        }
        Ok(ids)
    }

    async fn read_blob(&self, blob_ref: &str, max_bytes: u64) -> StorageResult<BlobPrefix> {
        let path = checked_path(keys::blob_path, &self.base_path, blob_ref)?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| not_found_or(blob_ref, e))?;
        let total = file.metadata().await?.len();

        let mut bytes = Vec::with_capacity(total.min(max_bytes) as usize);
        file.take(max_bytes).read_to_end(&mut bytes).await?;

        Ok(BlobPrefix {
            complete: bytes.len() as u64 >= total,
            bytes,
        })
    }

    async fn open_blob(&self, blob_ref: &str) -> StorageResult<BlobStream> {
        let path = checked_path(keys::blob_path, &self.base_path, blob_ref)?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| not_found_or(blob_ref, e))?;
        let len = file.metadata().await?.len();

        Ok(BlobStream {
            len,
            stream: ReaderStream::with_capacity(file, COPY_BUFFER_SIZE).boxed(),
        })
    }

    async fn delete(&self, id: &str) -> StorageResult<DeleteReport> {
        let record_path = keys::record_path(&self.base_path, id)?;

        // The blob name is derivable from the id even when the record is unreadable.
        let blob_ref = match self.get(id).await {
            Ok(record) if keys::is_valid_id(&record.body_ref) => record.body_ref,
            _ => id.to_string(),
        };
        let blob_path = keys::blob_path(&self.base_path, &blob_ref)?;

        // Record first, so no visible record ever points at a removed blob.
        let record = self.remove(&record_path).await;
        let blob = self.remove(&blob_path).await;

        tracing::info!(
            id = %id,
            record = ?record,
            blob = ?blob,
            "Delivery deleted"
        );

        Ok(DeleteReport { record, blob })
    }

    async fn discard_blob(&self, blob_ref: &str) -> StorageResult<FileRemoval> {
        let path = keys::blob_path(&self.base_path, blob_ref)?;
        Ok(self.remove(&path).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use stockhook_core::Preview;
    use tempfile::tempdir;

    fn record_for(receipt: &BlobReceipt) -> DeliveryRecord {
        DeliveryRecord::new(
            receipt.id.clone(),
            Utc::now(),
            "127.0.0.1".to_string(),
            "/webhook".to_string(),
            "text/plain".to_string(),
            "test".to_string(),
            receipt.size,
            receipt.sha256.clone(),
        )
        .with_preview(Preview::Text("hello".to_string()), 5)
    }

    async fn store_delivery(store: &LocalRecordStore, body: &[u8]) -> String {
        let mut reader = body;
        let receipt = store.put(&mut reader, body.len() as u64).await.unwrap();
        store.commit_record(&record_for(&receipt)).await.unwrap();
        receipt.id
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn put_hashes_exact_bytes() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();

        let mut reader: &[u8] = b"hello";
        let receipt = store.put(&mut reader, 5).await.unwrap();

        assert_eq!(receipt.size, 5);
        assert_eq!(
            receipt.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        let on_disk = std::fs::read(dir.path().join(format!("{}.body", receipt.id))).unwrap();
        assert_eq!(on_disk, b"hello");
        // No record yet, so nothing is listed.
        assert!(store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_read_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();

        let mut reader: &[u8] = b"abc";
        let err = store.put(&mut reader, 10).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::ShortRead {
                expected: 10,
                received: 3
            }
        ));
        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn aborted_body_is_a_short_read() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();

        let chunks: Vec<std::io::Result<bytes::Bytes>> = vec![
            Ok(bytes::Bytes::from_static(b"abcd")),
            Err(std::io::Error::new(ErrorKind::UnexpectedEof, "connection reset")),
        ];
        let mut reader = tokio_util::io::StreamReader::new(futures::stream::iter(chunks));
        let err = store.put(&mut reader, 10).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::ShortRead {
                expected: 10,
                received: 4
            }
        ));
        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn other_read_errors_stay_io_errors() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();

        let chunks: Vec<std::io::Result<bytes::Bytes>> =
            vec![Err(std::io::Error::other("disk unplugged"))];
        let mut reader = tokio_util::io::StreamReader::new(futures::stream::iter(chunks));
        let err = store.put(&mut reader, 10).await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn put_stops_at_declared_length() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();

        let mut reader: &[u8] = b"0123456789";
        let receipt = store.put(&mut reader, 4).await.unwrap();
        let prefix = store.read_blob(&receipt.id, 100).await.unwrap();
        assert_eq!(prefix.bytes, b"0123");
        assert!(prefix.complete);
    }

    #[tokio::test]
    async fn committed_record_round_trips() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();
        let id = store_delivery(&store, b"hello").await;

        let record = store.get(&id).await.unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.body_ref, id);
        assert_eq!(record.body_size, 5);
        assert_eq!(record.preview(), Preview::Text("hello".to_string()));
        assert_eq!(
            file_names(dir.path()),
            vec![format!("{}.body", id), format!("{}.json", id)]
        );
    }

    #[tokio::test]
    async fn list_is_newest_first_and_bounded() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();
        for id in [
            "20260101T000002Z-aaaaaaaaaaaa",
            "20260101T000001Z-aaaaaaaaaaaa",
            "20260101T000003Z-aaaaaaaaaaaa",
        ] {
            std::fs::write(dir.path().join(format!("{}.json", id)), b"{}").unwrap();
        }
        std::fs::write(dir.path().join("junk.json.tmp"), b"{}").unwrap();
        std::fs::write(dir.path().join("20260101T000009Z-aaaaaaaaaaaa.body"), b"x").unwrap();

        let ids = store.list(None).await.unwrap();
        assert_eq!(
            ids,
            vec![
                "20260101T000003Z-aaaaaaaaaaaa",
                "20260101T000002Z-aaaaaaaaaaaa",
                "20260101T000001Z-aaaaaaaaaaaa",
            ]
        );
        assert_eq!(store.list(Some(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unsafe_ids_are_not_found() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();

        for id in ["../../etc/passwd", "a/b", "..", ""] {
            assert!(matches!(store.get(id).await, Err(StorageError::NotFound(_))));
            assert!(matches!(
                store.read_blob(id, 10).await,
                Err(StorageError::NotFound(_))
            ));
            assert!(matches!(
                store.open_blob(id).await,
                Err(StorageError::NotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn unreadable_record_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();
        let id = "20260101T000000Z-aaaaaaaaaaaa";
        std::fs::write(dir.path().join(format!("{}.json", id)), b"{ nope").unwrap();

        assert!(matches!(
            store.get(id).await,
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn read_blob_respects_cap() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();
        let id = store_delivery(&store, b"0123456789").await;

        let prefix = store.read_blob(&id, 4).await.unwrap();
        assert_eq!(prefix.bytes, b"0123");
        assert!(!prefix.complete);

        let full = store.read_blob(&id, 10).await.unwrap();
        assert!(full.complete);
    }

    #[tokio::test]
    async fn open_blob_streams_everything() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();
        let body = vec![7u8; COPY_BUFFER_SIZE * 2 + 3];
        let id = store_delivery(&store, &body).await;

        let blob = store.open_blob(&id).await.unwrap();
        assert_eq!(blob.len, body.len() as u64);
        let chunks: Vec<bytes::Bytes> = blob.stream.try_collect().await.unwrap();
        let streamed: Vec<u8> = chunks.concat();
        assert_eq!(streamed, body);
    }

    #[tokio::test]
    async fn delete_tolerates_missing_blob() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();
        let id = store_delivery(&store, b"bye").await;
        std::fs::remove_file(dir.path().join(format!("{}.body", id))).unwrap();

        let report = store.delete(&id).await.unwrap();
        assert_eq!(report.record, FileRemoval::Removed);
        assert_eq!(report.blob, FileRemoval::Missing);
        assert!(file_names(dir.path()).is_empty());
        assert!(matches!(store.get(&id).await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_of_corrupt_record_removes_blob_by_id() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();
        let id = "20260101T000000Z-aaaaaaaaaaaa";
        std::fs::write(dir.path().join(format!("{}.json", id)), b"garbage").unwrap();
        std::fs::write(dir.path().join(format!("{}.body", id)), b"x").unwrap();

        let report = store.delete(id).await.unwrap();
        assert_eq!(report.record, FileRemoval::Removed);
        assert_eq!(report.blob, FileRemoval::Removed);
        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn open_sweeps_temp_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("20260101T000000Z-aaaaaaaaaaaa.body.tmp"), b"x").unwrap();
        std::fs::write(dir.path().join("20260101T000000Z-bbbbbbbbbbbb.json"), b"{}").unwrap();

        LocalRecordStore::open(dir.path()).await.unwrap();
        assert_eq!(
            file_names(dir.path()),
            vec!["20260101T000000Z-bbbbbbbbbbbb.json".to_string()]
        );
    }

    #[tokio::test]
    async fn open_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = LocalRecordStore::open(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.base_path(), nested.as_path());
    }

    #[tokio::test]
    async fn discard_blob_removes_uncommitted_blob() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();
        let mut reader: &[u8] = b"orphan";
        let receipt = store.put(&mut reader, 6).await.unwrap();

        assert_eq!(
            store.discard_blob(&receipt.id).await.unwrap(),
            FileRemoval::Removed
        );
        assert_eq!(
            store.discard_blob(&receipt.id).await.unwrap(),
            FileRemoval::Missing
        );
        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn concurrent_puts_get_distinct_ids() {
        let dir = tempdir().unwrap();
        let store = LocalRecordStore::open(dir.path()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..32u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let body = vec![i; 16];
                let mut reader: &[u8] = &body;
                store.put(&mut reader, 16).await.unwrap().id
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap()));
        }
        assert_eq!(ids.len(), 32);
    }
}

//! Audit storage backends.

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::logger::AuditFilter;
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// Trait for audit storage backends.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Store an audit event.
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError>;

    /// Query stored events. Backends without retention return nothing.
    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError>;
}

/// Console storage (JSON lines on stdout).
#[derive(Debug, Default)]
pub struct ConsoleStorage {
    pretty: bool,
}

impl ConsoleStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Multi-line, indented JSON per event.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

#[async_trait]
impl AuditStorage for ConsoleStorage {
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(&event)?
        } else {
            serde_json::to_string(&event)?
        };
        println!("{}", json);
        Ok(())
    }

    async fn query(&self, _filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(vec![])
    }
}

/// Events kept in a file backend's query index unless configured otherwise.
pub const DEFAULT_INDEX_RETENTION: usize = 1000;

/// File storage (appends JSON lines to a log file).
///
/// The file is opened once; each event is written as a single line under a
/// lock so concurrent requests never interleave within a line. The most
/// recent `retention` events are also indexed in memory for querying; the
/// file itself is the complete record.
pub struct FileStorage {
    path: PathBuf,
    file: Mutex<File>,
    index: RwLock<VecDeque<AuditEvent>>,
    retention: usize,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        Self::with_retention(path, DEFAULT_INDEX_RETENTION)
    }

    /// Keep at most `retention` events in the query index. Zero disables it.
    pub fn with_retention(path: impl AsRef<Path>, retention: usize) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let open_failed = |source| AuditError::OpenFile {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(open_failed)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_failed)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            index: RwLock::new(VecDeque::with_capacity(retention.min(DEFAULT_INDEX_RETENTION))),
            retention,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retention(&self) -> usize {
        self.retention
    }
}

#[async_trait]
impl AuditStorage for FileStorage {
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        {
            let mut file = self
                .file
                .lock()
                .map_err(|_| AuditError::LockPoisoned("file"))?;
            file.write_all(line.as_bytes())?;
            file.flush()?;
        }

        if self.retention > 0 {
            if let Ok(mut index) = self.index.write() {
                while index.len() >= self.retention {
                    index.pop_front();
                }
                index.push_back(event);
            }
        }

        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        let index = self
            .index
            .read()
            .map_err(|_| AuditError::LockPoisoned("index"))?;
        Ok(filter.apply(index.iter()))
    }
}

/// Console and file at once. Queries are served from the file index.
pub struct DualStorage {
    console: ConsoleStorage,
    file: FileStorage,
}

impl DualStorage {
    pub fn new(path: impl AsRef<Path>, pretty: bool, retention: usize) -> Result<Self, AuditError> {
        Ok(Self {
            console: ConsoleStorage { pretty },
            file: FileStorage::with_retention(path, retention)?,
        })
    }
}

#[async_trait]
impl AuditStorage for DualStorage {
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError> {
        let console = self.console.store(event.clone()).await;
        self.file.store(event).await?;
        console
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.file.query(filter).await
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullStorage;

impl NullStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditStorage for NullStorage {
    async fn store(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }

    async fn query(&self, _filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(vec![])
    }
}

/// Keeps events in memory only. Used by tests and embedders that ship
/// events elsewhere themselves.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored event in arrival order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .read()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditStorage for MemoryStorage {
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events
            .write()
            .map_err(|_| AuditError::LockPoisoned("index"))?
            .push(event);
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        let events = self
            .events
            .read()
            .map_err(|_| AuditError::LockPoisoned("index"))?;
        Ok(filter.apply(events.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AuditEventKind, AuditStatus};

    fn event(kind: AuditEventKind) -> AuditEvent {
        AuditEvent::builder(kind, "test").query_signature("SELECT 1").build()
    }

    #[tokio::test]
    async fn test_console_storage() {
        let storage = ConsoleStorage::pretty();
        storage.store(event(AuditEventKind::Normal)).await.unwrap();
        assert!(storage.query(AuditFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_storage_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.log");
        let storage = FileStorage::new(&path).unwrap();

        storage.store(event(AuditEventKind::Normal)).await.unwrap();
        storage
            .store(event(AuditEventKind::AttackRedirect))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: AuditEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.event_type, AuditEventKind::AttackRedirect);
        assert_eq!(second.status, AuditStatus::Ok);
    }

    #[tokio::test]
    async fn test_file_storage_query() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("audit.log")).unwrap();

        storage.store(event(AuditEventKind::Normal)).await.unwrap();
        storage
            .store(event(AuditEventKind::AttackRedirect))
            .await
            .unwrap();

        let results = storage
            .query(AuditFilter {
                event_type: Some(AuditEventKind::AttackRedirect),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].event_type, AuditEventKind::AttackRedirect);
    }

    #[tokio::test]
    async fn test_file_index_keeps_only_recent_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let storage = FileStorage::with_retention(&path, 3).unwrap();

        for i in 0..10 {
            let event = AuditEvent::builder(AuditEventKind::Normal, "test")
                .query_signature(format!("SELECT {}", i))
                .build();
            storage.store(event).await.unwrap();
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 10);
        let indexed: Vec<String> = storage
            .query(AuditFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.query_signature)
            .collect();
        assert_eq!(indexed, vec!["SELECT 9", "SELECT 8", "SELECT 7"]);
    }

    #[tokio::test]
    async fn test_file_index_disabled_with_zero_retention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let storage = FileStorage::with_retention(&path, 0).unwrap();

        storage.store(event(AuditEventKind::AttackRedirect)).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
        assert!(storage.query(AuditFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dual_storage_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let storage = DualStorage::new(&path, false, DEFAULT_INDEX_RETENTION).unwrap();
        storage.store(event(AuditEventKind::Normal)).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
        assert_eq!(storage.query(AuditFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_storage_keeps_order() {
        let storage = MemoryStorage::new();
        storage.store(event(AuditEventKind::Normal)).await.unwrap();
        storage
            .store(event(AuditEventKind::AttackRedirect))
            .await
            .unwrap();
        let kinds: Vec<_> = storage.events().iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![AuditEventKind::Normal, AuditEventKind::AttackRedirect]
        );
    }
}

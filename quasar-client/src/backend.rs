//! Storage media behind the cache store
//!
//! A backend is owned by the store's worker thread and is only ever called
//! from there, one operation at a time. Every backend keeps records in
//! insertion order and never deduplicates.

use crate::error::{Error, Result};
use prost::Message;
use quasar_core::LocalEvent;
use quasar_core::local::{create_gzip_decoder, create_gzip_encoder};
use quasar_core::{read_events_delimited, write_events_delimited};
use rusqlite::{Connection, params};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A medium that can hold an ordered list of stored events
pub trait CacheBackend: Send {
    /// All stored events in insertion order; empty storage is not an error
    fn load(&mut self) -> Result<Vec<LocalEvent>>;

    /// Store `events` after everything already stored
    fn append(&mut self, events: &[LocalEvent]) -> Result<()>;

    /// Remove every stored event; clearing empty storage succeeds
    fn clear(&mut self) -> Result<()>;
}

/// SQLite table of protobuf-encoded records ordered by an autoincrement key
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open (or create) a database file
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(|e| {
            Error::Cache(format!("Failed to open database at {:?}: {}", db_path, e))
        })?;
        Self::with_connection(conn)
    }

    /// A private database that lives as long as the backend
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cached_events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                kind INTEGER NOT NULL,
                author_key TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                record BLOB NOT NULL
            );
            "#,
        )
        .map_err(|e| Error::Cache(format!("Failed to create schema: {}", e)))?;

        Ok(Self { conn })
    }

    /// Number of stored rows
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cached_events", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl CacheBackend for SqliteBackend {
    fn load(&mut self) -> Result<Vec<LocalEvent>> {
        let mut stmt = self
            .conn
            .prepare("SELECT record FROM cached_events ORDER BY seq ASC")?;
        let records = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        records
            .iter()
            .map(|bytes| {
                LocalEvent::decode(bytes.as_slice())
                    .map_err(|e| Error::Core(quasar_core::Error::from(e)))
            })
            .collect()
    }

    fn append(&mut self, events: &[LocalEvent]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO cached_events (id, kind, author_key, created_at, record)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for event in events {
                stmt.execute(params![
                    event.id,
                    event.kind,
                    event.author_key,
                    event.created_at,
                    event.encode_to_vec(),
                ])?;
            }
        }
        tx.commit()?;

        debug!("Appended {} events to SQLite cache", events.len());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let removed = self.conn.execute("DELETE FROM cached_events", [])?;
        debug!("Cleared {} events from SQLite cache", removed);
        Ok(())
    }
}

/// Gzip-compressed, length-delimited protobuf file
///
/// Each append writes one self-contained gzip member to the end of the file,
/// so existing data is never rewritten.
#[derive(Debug, Clone)]
pub struct ArchiveBackend {
    path: PathBuf,
}

impl ArchiveBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheBackend for ArchiveBackend {
    fn load(&mut self) -> Result<Vec<LocalEvent>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let decoder = create_gzip_decoder(BufReader::new(file));
        Ok(read_events_delimited(decoder).collect::<quasar_core::Result<Vec<_>>>()?)
    }

    fn append(&mut self, events: &[LocalEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut encoder = create_gzip_encoder(Vec::new());
        write_events_delimited(&mut encoder, events)?;
        let member = encoder.finish()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        append_member(&mut file, &member)?;

        debug!("Appended {} events to {:?}", events.len(), self.path);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed cache archive {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// A sink whose length can be read and cut back
trait Truncate {
    fn current_len(&self) -> io::Result<u64>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn current_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Write one whole gzip member, or leave the sink at its previous length
fn append_member<W: Write + Truncate>(writer: &mut W, member: &[u8]) -> io::Result<()> {
    let committed = writer.current_len()?;

    let written = writer.write_all(member).and_then(|()| writer.flush());
    if let Err(e) = written {
        if let Err(undo) = writer.truncate_to(committed) {
            warn!(
                "Failed to roll archive back to {} bytes after a partial append: {}",
                committed, undo
            );
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str) -> LocalEvent {
        LocalEvent {
            id: id.to_string(),
            author_key: "ab".repeat(32),
            created_at: 1_700_000_000,
            kind: 1,
            tags: vec![],
            content: format!("content of {}", id),
            signature: "cd".repeat(64),
        }
    }

    fn ids(events: &[LocalEvent]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    fn exercise_append_law(backend: &mut dyn CacheBackend) {
        assert!(backend.load().unwrap().is_empty());

        backend.append(&[record("a1"), record("a2")]).unwrap();
        backend.append(&[record("b1")]).unwrap();
        assert_eq!(ids(&backend.load().unwrap()), vec!["a1", "a2", "b1"]);

        // Duplicates are kept
        backend.append(&[record("a1")]).unwrap();
        assert_eq!(backend.load().unwrap().len(), 4);

        backend.clear().unwrap();
        assert!(backend.load().unwrap().is_empty());
        backend.clear().unwrap();
    }

    #[test]
    fn test_sqlite_in_memory() {
        let mut backend = SqliteBackend::open_in_memory().unwrap();
        exercise_append_law(&mut backend);
        assert_eq!(backend.count().unwrap(), 0);
    }

    #[test]
    fn test_sqlite_file_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");

        SqliteBackend::open(&path)
            .unwrap()
            .append(&[record("x")])
            .unwrap();

        let mut reopened = SqliteBackend::open(&path).unwrap();
        assert_eq!(ids(&reopened.load().unwrap()), vec!["x"]);
    }

    #[test]
    fn test_archive_append_law() {
        let dir = TempDir::new().unwrap();
        let mut backend = ArchiveBackend::new(dir.path().join("nested/cache.pb.gz"));
        exercise_append_law(&mut backend);
        assert!(!backend.path().exists());
    }

    /// Accepts `budget` more bytes, then fails every write
    struct ShortWriter {
        data: Vec<u8>,
        budget: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(ErrorKind::Other, "disk full"));
            }
            let n = buf.len().min(self.budget);
            self.data.extend_from_slice(&buf[..n]);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Truncate for ShortWriter {
        fn current_len(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }
    }

    #[test]
    fn test_failed_append_leaves_previous_members_intact() {
        let mut first = create_gzip_encoder(Vec::new());
        write_events_delimited(&mut first, &[record("kept")]).unwrap();
        let existing = first.finish().unwrap();

        let mut second = create_gzip_encoder(Vec::new());
        write_events_delimited(&mut second, &[record("lost")]).unwrap();
        let member = second.finish().unwrap();

        let mut writer = ShortWriter {
            data: existing.clone(),
            budget: member.len() / 2,
        };
        assert!(append_member(&mut writer, &member).is_err());
        assert_eq!(writer.data, existing);

        let restored: Vec<LocalEvent> = read_events_delimited(create_gzip_decoder(&writer.data[..]))
            .collect::<quasar_core::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(ids(&restored), vec!["kept"]);
    }

    #[test]
    fn test_archive_append_after_existing_member() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.pb.gz");
        let mut backend = ArchiveBackend::new(&path);

        backend.append(&[record("a")]).unwrap();
        let after_first = fs::metadata(&path).unwrap().len();
        backend.append(&[record("b")]).unwrap();

        assert!(fs::metadata(&path).unwrap().len() > after_first);
        assert_eq!(ids(&backend.load().unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn test_archive_with_oversized_record_length_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.pb.gz");

        let mut corrupt = vec![0xff; 8];
        corrupt.push(0x7f);
        let mut encoder = create_gzip_encoder(Vec::new());
        encoder.write_all(&corrupt).unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        assert!(ArchiveBackend::new(&path).load().is_err());
    }

    #[test]
    fn test_archive_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.pb.gz");
        fs::write(&path, b"definitely not gzip").unwrap();

        assert!(ArchiveBackend::new(&path).load().is_err());
    }
}

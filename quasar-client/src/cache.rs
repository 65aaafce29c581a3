//! Local event cache
//!
//! [`CacheStore`] owns a storage backend and a single worker thread. Every
//! operation is queued to that worker and runs to completion, including its
//! completion callback, before the next one starts. Operations issued from
//! any number of threads therefore take effect, and complete, in the order
//! they were issued.
//!
//! [`CacheLoader`] sits on top and speaks [`Event`]s: `save` replaces the
//! cached collection, `load` reads it back.

use crate::backend::{ArchiveBackend, CacheBackend, SqliteBackend};
use crate::error::{Error, Result};
use quasar_core::{Event, LocalEvent};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

type Job = Box<dyn FnOnce(&mut dyn CacheBackend) + Send>;

/// Which medium a [`CacheStore`] persists to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreMode {
    /// Private SQLite database that disappears with the store
    InMemory,
    /// SQLite database file
    Sqlite(PathBuf),
    /// Gzip-compressed protobuf archive file
    Archive(PathBuf),
}

impl StoreMode {
    fn open_backend(&self) -> Result<Box<dyn CacheBackend>> {
        Ok(match self {
            StoreMode::InMemory => Box::new(SqliteBackend::open_in_memory()?),
            StoreMode::Sqlite(path) => Box::new(SqliteBackend::open(path)?),
            StoreMode::Archive(path) => Box::new(ArchiveBackend::new(path.clone())),
        })
    }
}

/// Serialized access to one cache medium
///
/// Dropping the store closes its queue; the worker still runs every job
/// already queued, then exits.
///
/// Outside a tokio runtime the drop waits for the worker to finish. Inside
/// one it hands the join to the runtime's blocking pool and returns at once,
/// so queued completions may still run after the drop.
pub struct CacheStore {
    jobs: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl CacheStore {
    /// Open the medium described by `mode` and start the worker
    pub fn open(mode: StoreMode) -> Result<Self> {
        info!("Opening cache store: {:?}", mode);
        Self::with_backend(mode.open_backend()?)
    }

    /// Start a store over an already opened backend
    pub fn with_backend(mut backend: Box<dyn CacheBackend>) -> Result<Self> {
        let (jobs, queue) = mpsc::channel::<Job>();

        let worker = thread::Builder::new()
            .name("quasar-cache".to_string())
            .spawn(move || {
                debug!("Cache worker started");
                while let Ok(job) = queue.recv() {
                    job(backend.as_mut());
                }
                debug!("Cache worker stopped");
            })?;

        Ok(Self {
            jobs: Some(jobs),
            worker: Some(worker),
        })
    }

    fn submit(&self, job: Job) -> Result<()> {
        self.jobs
            .as_ref()
            .ok_or(Error::StoreClosed)?
            .send(job)
            .map_err(|_| Error::StoreClosed)
    }

    /// Queue a read of every cached event.
    ///
    /// `completion` runs on the worker thread. Returns `Err(StoreClosed)`
    /// without calling `completion` if the worker is gone.
    pub fn retrieve_with<F>(&self, completion: F) -> Result<()>
    where
        F: FnOnce(Result<Vec<LocalEvent>>) + Send + 'static,
    {
        self.submit(Box::new(move |backend| {
            let result = backend.load();
            if let Err(e) = &result {
                error!("Cache retrieve failed: {}", e);
            }
            completion(result);
        }))
    }

    /// Queue an append of `events` after the ones already cached
    pub fn insert_with<F>(&self, events: Vec<LocalEvent>, completion: F) -> Result<()>
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.submit(Box::new(move |backend| {
            let result = backend.append(&events);
            if let Err(e) = &result {
                error!("Cache insert of {} events failed: {}", events.len(), e);
            }
            completion(result);
        }))
    }

    /// Queue removal of every cached event; succeeds on an empty cache
    pub fn delete_cached_events_with<F>(&self, completion: F) -> Result<()>
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        self.submit(Box::new(move |backend| {
            let result = backend.clear();
            if let Err(e) = &result {
                error!("Cache delete failed: {}", e);
            }
            completion(result);
        }))
    }

    pub async fn retrieve(&self) -> Result<Vec<LocalEvent>> {
        let (tx, rx) = oneshot::channel();
        self.retrieve_with(move |result| {
            let _ = tx.send(result);
        })?;
        rx.await.map_err(|_| Error::StoreClosed)?
    }

    pub async fn insert(&self, events: Vec<LocalEvent>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.insert_with(events, move |result| {
            let _ = tx.send(result);
        })?;
        rx.await.map_err(|_| Error::StoreClosed)?
    }

    pub async fn delete_cached_events(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.delete_cached_events_with(move |result| {
            let _ = tx.send(result);
        })?;
        rx.await.map_err(|_| Error::StoreClosed)?
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        self.jobs.take();

        let Some(worker) = self.worker.take() else {
            return;
        };
        if worker.thread().id() == thread::current().id() {
            return;
        }

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || join_worker(worker));
            }
            Err(_) => join_worker(worker),
        }
    }
}

fn join_worker(worker: JoinHandle<()>) {
    if worker.join().is_err() {
        error!("Cache worker panicked");
    }
}

/// Event-level facade over a [`CacheStore`]
pub struct CacheLoader {
    store: CacheStore,
}

impl CacheLoader {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Replace the cached collection with `events`.
    ///
    /// Nothing is inserted if clearing the old collection fails; that error
    /// is returned instead.
    pub async fn save(&self, events: &[Event]) -> Result<()> {
        self.store.delete_cached_events().await?;

        let records: Vec<LocalEvent> = events.iter().map(LocalEvent::from).collect();
        self.store.insert(records).await?;

        debug!("Saved {} events to cache", events.len());
        Ok(())
    }

    /// Every cached event, in the order it was saved
    pub async fn load(&self) -> Result<Vec<Event>> {
        let records = self.store.retrieve().await?;
        let events = records
            .into_iter()
            .map(Event::try_from)
            .collect::<quasar_core::Result<Vec<_>>>()?;
        Ok(events)
    }
}

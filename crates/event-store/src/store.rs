//! JSON-file backed store for events and registrations.
//!
//! The database is cached in memory behind an async `RwLock`, together with
//! the size and modification time of the file it was read from. Other
//! processes (the CLI next to a running server) may rewrite the file at any
//! time, so every operation first compares that stamp with the file on disk
//! and reloads when they differ. Mutations reload, apply and rewrite the file
//! while holding the write lock.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::seed;
use crate::types::{Database, Event, NewRegistration, Registration, Stats};

/// Length of generated registration ids
pub const REGISTRATION_ID_LEN: usize = 12;

/// Outcome of [`EventStore::seed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The store already had events; nothing was written
    Skipped,
    /// This many demo events were inserted
    Seeded(usize),
}

/// Size and modification time of the database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

/// Cached document plus the stamp of the file it matches (`None` when the
/// file did not exist).
#[derive(Debug)]
struct Snapshot {
    db: Database,
    stamp: Option<FileStamp>,
}

/// Shared handle to the on-disk database.
pub struct EventStore {
    path: PathBuf,
    state: RwLock<Snapshot>,
}

impl EventStore {
    /// Open the database at `path`.
    ///
    /// A missing file is not an error: the store starts empty and the file
    /// is created on the first write.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (db, stamp) = read_database(&path).await?;
        if stamp.is_none() {
            info!("No database at {}, starting empty", path.display());
        }

        info!(
            "Opened {} with {} events and {} registrations",
            path.display(),
            db.events.len(),
            db.registrations.len()
        );
        Ok(Self {
            path,
            state: RwLock::new(Snapshot { db, stamp }),
        })
    }

    /// Build a store around an in-memory database (written to `path` on
    /// the first mutation).
    ///
    /// The in-memory copy is kept for as long as nothing exists at `path`.
    pub fn with_database(path: impl Into<PathBuf>, db: Database) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(Snapshot { db, stamp: None }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of all events in stored order.
    pub async fn list_events(&self) -> Vec<Event> {
        self.snapshot().await.db.events.clone()
    }

    pub async fn get_event(&self, id: &str) -> Option<Event> {
        self.snapshot().await.db.find_event(id).cloned()
    }

    /// Validate and persist a registration.
    ///
    /// Returns the stored registration together with the event it is for.
    pub async fn register(
        &self,
        payload: NewRegistration,
        now: DateTime<Utc>,
    ) -> Result<(Registration, Event)> {
        let issues = payload.validate();
        if !issues.is_empty() {
            return Err(StoreError::InvalidRegistration(issues));
        }

        let event_id = payload.event_id.unwrap_or_default();

        let mut state = self.state.write().await;
        self.sync(&mut state).await?;
        let event = state
            .db
            .find_event(&event_id)
            .cloned()
            .ok_or_else(|| StoreError::EventNotFound(event_id.clone()))?;

        let registration = Registration {
            id: generate_id(REGISTRATION_ID_LEN),
            name: payload.name,
            email: payload.email,
            event_id,
            interests: payload.interests,
            created_at_raw: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            ..Default::default()
        };
        state.db.registrations.push(registration.clone());

        if let Err(e) = self.persist(&mut state).await {
            // Keep memory consistent with what is on disk
            state.db.registrations.pop();
            return Err(e);
        }

        debug!(
            "Stored registration {} for event {}",
            registration.id, registration.event_id
        );
        Ok((registration, event))
    }

    /// All registrations, or only those for `event_id`.
    pub async fn registrations(&self, event_id: Option<&str>) -> Vec<Registration> {
        let state = self.snapshot().await;
        match event_id {
            Some(id) => state
                .db
                .registrations
                .iter()
                .filter(|reg| reg.event_id == id)
                .cloned()
                .collect(),
            None => state.db.registrations.clone(),
        }
    }

    pub async fn stats(&self) -> Stats {
        self.snapshot().await.db.stats()
    }

    /// Insert the demo catalogue if the store has no events yet.
    pub async fn seed(&self, now: DateTime<Utc>) -> Result<SeedOutcome> {
        let mut state = self.state.write().await;
        self.sync(&mut state).await?;
        if !state.db.events.is_empty() {
            info!("Seed skipped, {} events already present", state.db.events.len());
            return Ok(SeedOutcome::Skipped);
        }

        state.db.events = seed::demo_events(now);
        let count = state.db.events.len();
        if let Err(e) = self.persist(&mut state).await {
            state.db.events.clear();
            return Err(e);
        }

        info!("Seeded {} events", count);
        Ok(SeedOutcome::Seeded(count))
    }

    /// Read access to a snapshot that matches the file on disk.
    ///
    /// A file that cannot be read or parsed is logged and the cached copy is
    /// served instead.
    async fn snapshot(&self) -> RwLockReadGuard<'_, Snapshot> {
        {
            let state = self.state.read().await;
            match file_stamp(&self.path).await {
                Ok(stamp) if stamp == state.stamp => return state,
                Ok(_) => {}
                Err(e) => {
                    warn!("Serving cached database: {}", e);
                    return state;
                }
            }
        }

        let mut state = self.state.write().await;
        if let Err(e) = self.sync(&mut state).await {
            warn!("Serving cached database: {}", e);
        }
        state.downgrade()
    }

    /// Reload `state` if the file changed since it was last read or written.
    async fn sync(&self, state: &mut Snapshot) -> Result<()> {
        let stamp = file_stamp(&self.path).await?;
        if stamp == state.stamp {
            return Ok(());
        }

        let (db, stamp) = read_database(&self.path).await?;
        debug!(
            "Reloaded {} after an external change ({} events, {} registrations)",
            self.path.display(),
            db.events.len(),
            db.registrations.len()
        );
        *state = Snapshot { db, stamp };
        Ok(())
    }

    /// Write the database next to its final location, then rename over it.
    async fn persist(&self, state: &mut Snapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&state.db).map_err(StoreError::Serialize)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|source| self.io_error(source))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| self.io_error(source))?;

        // Unknown stamp forces a reload on the next access
        state.stamp = file_stamp(&self.path).await.unwrap_or(None);
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

async fn file_stamp(path: &Path) -> Result<Option<FileStamp>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(FileStamp {
            modified: meta.modified().ok(),
            len: meta.len(),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read and parse the file at `path`; a missing file is an empty database.
///
/// The stamp is taken before reading, so a write racing with the read shows
/// up as a changed stamp on the next access.
async fn read_database(path: &Path) -> Result<(Database, Option<FileStamp>)> {
    let stamp = file_stamp(path).await?;
    let db = match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Database::default(),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    Ok((db, stamp))
}

/// Random alphanumeric identifier of `len` characters.
pub fn generate_id(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

//! In-process store: every table behind one `tokio::sync::Mutex`.
//!
//! Used as the test double for the Postgres store and for `serve --in-memory`.
//! Unique rules (email, one active lease per property) are enforced inside the
//! lock. A transaction holds the lock for its whole lifetime and writes to a
//! staging copy; savepoints are snapshots of that copy.

mod leases;
mod properties;
mod users;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leasehold_core::model::{Lease, Property, User};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    LeaseRepository, PropertyRepository, StorageError, StoreHandle, UnitOfWork, UserRepository,
};
use crate::context::RequestContext;

/// Root or transactional handle to the in-memory tables
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Inner,
}

#[derive(Clone)]
enum Inner {
    Root(Arc<Mutex<Tables>>),
    Tx(Arc<MemoryTx>),
}

impl Default for Inner {
    fn default() -> Self {
        Self::Root(Arc::default())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the tables this handle sees.
    pub(crate) async fn with_tables<R, F>(
        &self,
        ctx: &RequestContext,
        f: F,
    ) -> Result<R, StorageError>
    where
        F: FnOnce(&mut Tables) -> R + Send,
        R: Send,
    {
        match &self.inner {
            Inner::Root(root) => {
                let mut tables = ctx.run(root.lock()).await?;
                Ok(f(&mut tables))
            }
            Inner::Tx(tx) => {
                ctx.check()?;
                let mut state = tx.lock();
                if state.root.is_none() {
                    return Err(StorageError::TransactionClosed);
                }
                Ok(f(&mut state.staging))
            }
        }
    }
}

#[async_trait]
impl StoreHandle for MemoryStore {
    fn users(&self) -> Arc<dyn UserRepository> {
        Arc::new(users::MemoryUsers::new(self.clone()))
    }

    fn properties(&self) -> Arc<dyn PropertyRepository> {
        Arc::new(properties::MemoryProperties::new(self.clone()))
    }

    fn leases(&self) -> Arc<dyn LeaseRepository> {
        Arc::new(leases::MemoryLeases::new(self.clone()))
    }

    async fn begin(&self, ctx: &RequestContext) -> Result<Box<dyn UnitOfWork>, StorageError> {
        match &self.inner {
            Inner::Root(root) => {
                let guard = ctx.run(Arc::clone(root).lock_owned()).await?;
                let staging = Tables::clone(&guard);
                let tx = Arc::new(MemoryTx {
                    state: std::sync::Mutex::new(TxState {
                        root: Some(guard),
                        staging,
                        savepoints: Vec::new(),
                    }),
                });
                Ok(Box::new(MemoryUnit {
                    tx,
                    depth: 0,
                    open: true,
                }))
            }
            Inner::Tx(tx) => {
                ctx.check()?;
                let depth = {
                    let mut state = tx.lock();
                    if state.root.is_none() {
                        return Err(StorageError::TransactionClosed);
                    }
                    let snapshot = state.staging.clone();
                    state.savepoints.push(snapshot);
                    state.savepoints.len()
                };
                Ok(Box::new(MemoryUnit {
                    tx: Arc::clone(tx),
                    depth,
                    open: true,
                }))
            }
        }
    }
}

struct MemoryTx {
    state: std::sync::Mutex<TxState>,
}

struct TxState {
    /// Held for the lifetime of the outermost transaction; `None` once finished.
    root: Option<OwnedMutexGuard<Tables>>,
    staging: Tables,
    savepoints: Vec<Tables>,
}

impl MemoryTx {
    fn lock(&self) -> std::sync::MutexGuard<'_, TxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outermost transaction (`depth == 0`) or a savepoint
struct MemoryUnit {
    tx: Arc<MemoryTx>,
    depth: usize,
    open: bool,
}

impl MemoryUnit {
    fn finish(&mut self, commit: bool) -> Result<(), StorageError> {
        if !self.open {
            return Err(StorageError::TransactionClosed);
        }
        self.open = false;

        let mut state = self.tx.lock();
        if state.root.is_none() {
            return Err(StorageError::TransactionClosed);
        }

        if self.depth == 0 {
            let guard = state.root.take();
            let staging = std::mem::take(&mut state.staging);
            state.savepoints.clear();
            if let (true, Some(mut root)) = (commit, guard) {
                *root = staging;
            }
        } else {
            let snapshot = state.savepoints.drain(self.depth - 1..).next();
            if let (false, Some(snapshot)) = (commit, snapshot) {
                state.staging = snapshot;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    fn handle(&self) -> Arc<dyn StoreHandle> {
        Arc::new(MemoryStore {
            inner: Inner::Tx(Arc::clone(&self.tx)),
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let mut unit = self;
        unit.finish(true)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        let mut unit = self;
        unit.finish(false)
    }
}

impl Drop for MemoryUnit {
    fn drop(&mut self) {
        if self.open {
            let _ = self.finish(false);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    pub(crate) users: Table<User>,
    pub(crate) properties: Table<Property>,
    pub(crate) leases: Table<Lease>,
}

pub(crate) trait Record: Clone {
    fn id(&self) -> Uuid;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
}

macro_rules! impl_record {
    ($($ty:ty),*) => {
        $(impl Record for $ty {
            fn id(&self) -> Uuid {
                self.id
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }
        })*
    };
}

impl_record!(User, Property, Lease);

/// Outcome of a guarded replace
pub(crate) enum Replace {
    Done,
    Missing,
    Stale,
}

#[derive(Debug, Clone)]
pub(crate) struct Table<T> {
    rows: HashMap<Uuid, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }
}

impl<T: Record> Table<T> {
    pub(crate) fn get(&self, id: Uuid) -> Option<T> {
        self.rows.get(&id).cloned()
    }

    pub(crate) fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.rows.values().find(|row| pred(row)).cloned()
    }

    pub(crate) fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.rows.values().any(pred)
    }

    pub(crate) fn contains(&self, id: Uuid) -> bool {
        self.rows.contains_key(&id)
    }

    /// Insert a new row; duplicate ids are a storage error, like a primary key.
    pub(crate) fn insert(&mut self, row: T) -> Result<(), StorageError> {
        let id = row.id();
        if self.rows.contains_key(&id) {
            return Err(StorageError::query(format!("duplicate primary key {id}")));
        }
        self.rows.insert(id, row);
        Ok(())
    }

    /// Replace the row with `row.id()` if its `updated_at` equals `expected`.
    pub(crate) fn replace(&mut self, row: &T, expected: DateTime<Utc>) -> Replace {
        match self.rows.get_mut(&row.id()) {
            None => Replace::Missing,
            Some(current) if current.updated_at() != expected => Replace::Stale,
            Some(current) => {
                *current = row.clone();
                Replace::Done
            }
        }
    }

    pub(crate) fn remove(&mut self, id: Uuid) -> bool {
        self.rows.remove(&id).is_some()
    }

    /// Matching rows ordered `created_at DESC, id DESC`, sliced, plus the match count.
    pub(crate) fn page(&self, pred: impl Fn(&T) -> bool, limit: u32, offset: u64) -> (Vec<T>, u64) {
        let mut matches: Vec<&T> = self.rows.values().filter(|row| pred(row)).collect();
        matches.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });

        let total = matches.len() as u64;
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let items = matches
            .into_iter()
            .skip(skip)
            .take(limit as usize)
            .cloned()
            .collect();
        (items, total)
    }
}

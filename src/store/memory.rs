//! In-memory member store.
//!
//! Nothing is persisted; use it in development and tests. Writers are serialized by a single
//! permit taken at the first lock of a transaction, the same way a table-wide lock would behave.
//! Each transaction works on a staged copy that replaces the committed table on commit.

use super::{Member, MemberId, MemberRow, MemberStore, MemberTx, RankRange};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::ops::RangeBounds;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Statement that should fail the next time a transaction reaches it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailPoint {
    InsertRow,
    UpdateRow,
    DeleteRow,
}

#[derive(Clone, Debug, Default)]
struct Table {
    rows: BTreeMap<MemberId, Member>,
    next_id: MemberId,
}

#[derive(Clone)]
pub struct MemoryMemberStore {
    committed: Arc<RwLock<Table>>,
    writer: Arc<Semaphore>,
    lock_timeout: Duration,
    fail_point: Arc<Mutex<Option<FailPoint>>>,
}

impl MemoryMemberStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        MemoryMemberStore {
            committed: Arc::new(RwLock::new(Table {
                rows: BTreeMap::new(),
                next_id: 1,
            })),
            writer: Arc::new(Semaphore::new(1)),
            lock_timeout,
            fail_point: Arc::new(Mutex::new(None)),
        }
    }

    /// Make the next transaction that reaches `point` fail with a storage error.
    pub fn fail_next(&self, point: FailPoint) {
        if let Ok(mut guard) = self.fail_point.lock() {
            *guard = Some(point);
        }
    }

    fn read_committed(&self) -> Result<Table, AppError> {
        self.committed
            .read()
            .map(|t| t.clone())
            .map_err(|_| AppError::Storage("member table lock poisoned".into()))
    }
}

impl Default for MemoryMemberStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemberStore for MemoryMemberStore {
    async fn get_all(&self) -> Result<Vec<Member>, AppError> {
        let table = self.read_committed()?;
        let mut rows: Vec<Member> = table.rows.into_values().collect();
        rows.sort_by_key(|m| (m.rank, m.id));
        Ok(rows)
    }

    async fn get_by_id(&self, id: MemberId) -> Result<Option<Member>, AppError> {
        Ok(self.read_committed()?.rows.remove(&id))
    }

    async fn begin(&self) -> Result<Box<dyn MemberTx>, AppError> {
        Ok(Box::new(MemoryMemberTx {
            store: self.clone(),
            permit: None,
            staged: None,
        }))
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.read_committed().map(|_| ())
    }
}

pub struct MemoryMemberTx {
    store: MemoryMemberStore,
    permit: Option<OwnedSemaphorePermit>,
    staged: Option<Table>,
}

impl MemoryMemberTx {
    /// Take the writer permit (once per transaction) and stage the latest committed table.
    async fn staged(&mut self) -> Result<&mut Table, AppError> {
        if self.permit.is_none() {
            let acquire = self.store.writer.clone().acquire_owned();
            let permit = tokio::time::timeout(self.store.lock_timeout, acquire)
                .await
                .map_err(|_| AppError::LockTimeout)?
                .map_err(|_| AppError::Storage("member store closed".into()))?;
            self.permit = Some(permit);
            self.staged = Some(self.store.read_committed()?);
        }
        self.staged
            .as_mut()
            .ok_or_else(|| AppError::Storage("transaction has no staged table".into()))
    }

    fn check_fail_point(&self, point: FailPoint) -> Result<(), AppError> {
        let mut guard = self
            .store
            .fail_point
            .lock()
            .map_err(|_| AppError::Storage("fail point lock poisoned".into()))?;
        if *guard == Some(point) {
            guard.take();
            return Err(AppError::Storage(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }
}

#[async_trait]
impl MemberTx for MemoryMemberTx {
    async fn lock_row(&mut self, id: MemberId) -> Result<Option<Member>, AppError> {
        Ok(self.staged().await?.rows.get(&id).cloned())
    }

    async fn lock_range(&mut self, range: RankRange) -> Result<u64, AppError> {
        let table = self.staged().await?;
        Ok(table.rows.values().filter(|m| range.contains(&m.rank)).count() as u64)
    }

    async fn max_rank(&mut self) -> Result<i32, AppError> {
        let table = self.staged().await?;
        Ok(table.rows.values().map(|m| m.rank).max().unwrap_or(0).max(0))
    }

    async fn shift(&mut self, range: RankRange, delta: i32) -> Result<u64, AppError> {
        let table = self.staged().await?;
        let now = Utc::now();
        let mut changed = 0;
        for m in table.rows.values_mut().filter(|m| range.contains(&m.rank)) {
            m.rank += delta;
            m.updated_at = now;
            changed += 1;
        }
        Ok(changed)
    }

    async fn insert_row(&mut self, row: &MemberRow) -> Result<MemberId, AppError> {
        self.check_fail_point(FailPoint::InsertRow)?;
        let table = self.staged().await?;
        let id = table.next_id;
        table.next_id += 1;
        let now = Utc::now();
        table.rows.insert(
            id,
            Member {
                id,
                poste: row.poste.clone(),
                nom: row.nom.clone(),
                fonction: row.fonction.clone(),
                photo: row.photo.clone(),
                rank: row.rank,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update_row(&mut self, id: MemberId, row: &MemberRow) -> Result<Option<Member>, AppError> {
        self.check_fail_point(FailPoint::UpdateRow)?;
        let table = self.staged().await?;
        Ok(table.rows.get_mut(&id).map(|m| {
            m.poste = row.poste.clone();
            m.nom = row.nom.clone();
            m.fonction = row.fonction.clone();
            m.photo = row.photo.clone();
            m.rank = row.rank;
            m.updated_at = Utc::now();
            m.clone()
        }))
    }

    async fn delete_row(&mut self, id: MemberId) -> Result<bool, AppError> {
        self.check_fail_point(FailPoint::DeleteRow)?;
        Ok(self.staged().await?.rows.remove(&id).is_some())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), AppError> {
        if let Some(staged) = self.staged.take() {
            let duplicate = {
                let mut seen = std::collections::HashSet::new();
                staged.rows.values().any(|m| m.rank > 0 && !seen.insert(m.rank))
            };
            if duplicate {
                return Err(AppError::Conflict("rank already taken".into()));
            }
            let mut committed = self
                .store
                .committed
                .write()
                .map_err(|_| AppError::Storage("member table lock poisoned".into()))?;
            *committed = staged;
        }
        // permit released on drop
        Ok(())
    }
}

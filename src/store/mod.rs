//! Ordered store for bureau members: the table that owns the `ordre` rank column.
//!
//! Reads go straight to the store. Mutations go through a [`MemberTx`], a scoped transaction that
//! rolls back and releases its connection when dropped without [`MemberTx::commit`].

mod memory;
mod postgres;

pub use memory::{FailPoint, MemoryMemberStore};
pub use postgres::{ensure_database_exists, ensure_member_table, PgMemberStore, MEMBERS_TABLE};

use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::{Bound, RangeBounds};

pub type MemberId = i64;

/// Rank of a member that has not been positioned. Exempt from density.
pub const UNRANKED: i32 = 0;

/// One board member row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Member {
    pub id: MemberId,
    pub poste: String,
    pub nom: String,
    pub fonction: String,
    pub photo: Option<String>,
    #[serde(rename = "ordre")]
    #[sqlx(rename = "ordre")]
    pub rank: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column values written by insert and update. Timestamps and id are owned by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberRow {
    pub poste: String,
    pub nom: String,
    pub fonction: String,
    pub photo: Option<String>,
    pub rank: i32,
}

impl MemberRow {
    pub fn from_member(m: &Member) -> Self {
        MemberRow {
            poste: m.poste.clone(),
            nom: m.nom.clone(),
            fonction: m.fonction.clone(),
            photo: m.photo.clone(),
            rank: m.rank,
        }
    }
}

/// Predicate over the rank column, e.g. `rank >= 3` or `2 < rank <= 5`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankRange {
    pub start: Bound<i32>,
    pub end: Bound<i32>,
}

impl RankRange {
    pub fn new(start: Bound<i32>, end: Bound<i32>) -> Self {
        RankRange { start, end }
    }

    /// `rank >= from`
    pub fn at_least(from: i32) -> Self {
        Self::new(Bound::Included(from), Bound::Unbounded)
    }

    /// `rank > after`
    pub fn above(after: i32) -> Self {
        Self::new(Bound::Excluded(after), Bound::Unbounded)
    }

    /// `after < rank <= to`
    pub fn after_through(after: i32, to: i32) -> Self {
        Self::new(Bound::Excluded(after), Bound::Included(to))
    }

    /// `from <= rank < before`
    pub fn from_until(from: i32, before: i32) -> Self {
        Self::new(Bound::Included(from), Bound::Excluded(before))
    }
}

impl RangeBounds<i32> for RankRange {
    fn start_bound(&self) -> Bound<&i32> {
        self.start.as_ref()
    }

    fn end_bound(&self) -> Bound<&i32> {
        self.end.as_ref()
    }
}

/// Storage backend for members.
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// All members, rank ascending then id ascending. Unranked rows come first.
    async fn get_all(&self) -> Result<Vec<Member>, AppError>;

    async fn get_by_id(&self, id: MemberId) -> Result<Option<Member>, AppError>;

    /// Open a transaction. Dropping the returned handle without committing rolls it back.
    async fn begin(&self) -> Result<Box<dyn MemberTx>, AppError>;

    /// Cheap round trip used by readiness checks.
    async fn ping(&self) -> Result<(), AppError>;
}

/// One open transaction against the member table.
///
/// Lock methods block until overlapping locks held by other transactions are released, bounded by
/// the store's lock timeout ([`AppError::LockTimeout`]).
#[async_trait]
pub trait MemberTx: Send {
    /// Read the row and hold it exclusively until the transaction ends.
    async fn lock_row(&mut self, id: MemberId) -> Result<Option<Member>, AppError>;

    /// Lock every row whose rank lies in `range`. Returns the number of rows locked.
    async fn lock_range(&mut self, range: RankRange) -> Result<u64, AppError>;

    /// Highest rank in the table as seen by this transaction, 0 when nothing is ranked.
    async fn max_rank(&mut self) -> Result<i32, AppError>;

    /// Add `delta` to the rank of every row in `range`. Returns the number of rows changed.
    async fn shift(&mut self, range: RankRange, delta: i32) -> Result<u64, AppError>;

    async fn insert_row(&mut self, row: &MemberRow) -> Result<MemberId, AppError>;

    async fn update_row(&mut self, id: MemberId, row: &MemberRow) -> Result<Option<Member>, AppError>;

    async fn delete_row(&mut self, id: MemberId) -> Result<bool, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

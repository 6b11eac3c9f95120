//! Rank allocation: the lock-then-shift protocol that keeps ranks dense.
//!
//! Every operation locks the affected range, shifts the siblings in it, and returns the rank the
//! caller must write on its own row. The caller applies that row change in the same transaction.

use crate::error::AppError;
use crate::store::{MemberTx, RankRange, UNRANKED};

pub struct RankAllocator;

impl RankAllocator {
    /// Open a slot at `requested` for a new (or newly ranked) row and return the rank to write.
    ///
    /// Ranks past the end are pulled back to `max + 1` so the sequence stays gap-free.
    pub async fn open_slot(tx: &mut dyn MemberTx, requested: i32) -> Result<i32, AppError> {
        if requested <= UNRANKED {
            return Ok(UNRANKED);
        }
        tx.lock_range(RankRange::at_least(requested)).await?;
        let target = requested.min(tx.max_rank().await? + 1);
        let shifted = tx.shift(RankRange::at_least(target), 1).await?;
        tracing::debug!(requested, target, shifted, "opened rank slot");
        Ok(target)
    }

    /// Move a row from `current` to `requested` and return the rank to write.
    ///
    /// A move into rank 0 closes the old slot, a move out of rank 0 opens a new one.
    pub async fn move_rank(tx: &mut dyn MemberTx, current: i32, requested: i32) -> Result<i32, AppError> {
        let requested = requested.max(UNRANKED);
        match (current > UNRANKED, requested > UNRANKED) {
            (false, false) => Ok(UNRANKED),
            (false, true) => Self::open_slot(tx, requested).await,
            (true, false) => {
                Self::close_slot(tx, current).await?;
                Ok(UNRANKED)
            }
            (true, true) if requested > current => {
                tx.lock_range(RankRange::after_through(current, requested)).await?;
                let target = requested.min(tx.max_rank().await?);
                if target <= current {
                    return Ok(current);
                }
                let shifted = tx.shift(RankRange::after_through(current, target), -1).await?;
                tracing::debug!(current, target, shifted, "moved rank down the list");
                Ok(target)
            }
            (true, true) if requested < current => {
                let range = RankRange::from_until(requested, current);
                tx.lock_range(range).await?;
                let shifted = tx.shift(range, 1).await?;
                tracing::debug!(current, target = requested, shifted, "moved rank up the list");
                Ok(requested)
            }
            (true, true) => Ok(current),
        }
    }

    /// Close the slot left by a row leaving rank `current`.
    pub async fn close_slot(tx: &mut dyn MemberTx, current: i32) -> Result<(), AppError> {
        if current <= UNRANKED {
            return Ok(());
        }
        let range = RankRange::above(current);
        tx.lock_range(range).await?;
        let shifted = tx.shift(range, -1).await?;
        tracing::debug!(current, shifted, "closed rank slot");
        Ok(())
    }
}

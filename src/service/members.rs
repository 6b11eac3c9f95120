//! Member operations. Each mutation runs in exactly one store transaction.

use super::rank::RankAllocator;
use super::validation::MemberInput;
use crate::error::AppError;
use crate::store::{Member, MemberId, MemberRow, MemberStore, UNRANKED};
use std::sync::Arc;

#[derive(Clone)]
pub struct MemberService {
    store: Arc<dyn MemberStore>,
}

fn not_found(id: MemberId) -> AppError {
    AppError::NotFound(format!("member {}", id))
}

impl MemberService {
    pub fn new(store: Arc<dyn MemberStore>) -> Self {
        MemberService { store }
    }

    pub fn store(&self) -> &Arc<dyn MemberStore> {
        &self.store
    }

    /// All members, rank ascending. Unranked members come first.
    pub async fn list(&self) -> Result<Vec<Member>, AppError> {
        self.store.get_all().await
    }

    pub async fn get(&self, id: MemberId) -> Result<Member, AppError> {
        self.store.get_by_id(id).await?.ok_or_else(|| not_found(id))
    }

    /// Insert a member at the requested rank (unranked when omitted). Returns the new id.
    pub async fn create(&self, input: MemberInput) -> Result<MemberId, AppError> {
        let identity = input.required_identity()?;
        let photo = input.photo_reference()?;
        let requested = input.requested_rank()?.unwrap_or(UNRANKED);

        let mut tx = self.store.begin().await?;
        let rank = RankAllocator::open_slot(tx.as_mut(), requested).await?;
        let id = tx
            .insert_row(&MemberRow {
                poste: identity.poste,
                nom: identity.nom,
                fonction: identity.fonction,
                photo,
                rank,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(id, rank, requested, "member created");
        Ok(id)
    }

    /// Apply a partial update. The row is locked before its current rank is read.
    pub async fn update(&self, id: MemberId, input: MemberInput) -> Result<Member, AppError> {
        let mut tx = self.store.begin().await?;
        let current = tx.lock_row(id).await?.ok_or_else(|| not_found(id))?;

        let identity = input.identity_update()?;
        let photo = input.photo_reference()?;
        let rank = match input.requested_rank()? {
            Some(requested) if requested != current.rank => {
                RankAllocator::move_rank(tx.as_mut(), current.rank, requested).await?
            }
            _ => current.rank,
        };

        let mut row = MemberRow::from_member(&current);
        if let Some(identity) = identity {
            row.poste = identity.poste;
            row.nom = identity.nom;
            row.fonction = identity.fonction;
        }
        if photo.is_some() {
            row.photo = photo;
        }
        row.rank = rank;

        let updated = tx.update_row(id, &row).await?.ok_or_else(|| not_found(id))?;
        tx.commit().await?;

        tracing::info!(id, from = current.rank, to = rank, "member updated");
        Ok(updated)
    }

    /// Remove a member and close the gap it leaves in the ranking.
    pub async fn delete(&self, id: MemberId) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let current = tx.lock_row(id).await?.ok_or_else(|| not_found(id))?;

        RankAllocator::close_slot(tx.as_mut(), current.rank).await?;
        if !tx.delete_row(id).await? {
            return Err(not_found(id));
        }
        tx.commit().await?;

        tracing::info!(id, rank = current.rank, "member deleted");
        Ok(())
    }
}

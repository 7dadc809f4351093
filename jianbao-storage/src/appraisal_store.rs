//! Appraisal store trait and in-memory implementation.
//!
//! The relational database is the system of record. The production
//! implementation lives in the API crate next to the connection pool; the
//! in-memory one here backs tests and local runs.

use async_trait::async_trait;
use jianbao_core::{
    Appraisal, AppraisalId, AppraisalVerdict, StoreError, UserInfo, UserInfoId,
};
use std::collections::HashMap;
use std::sync::RwLock;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Read and write access to appraisal rows.
///
/// Each write commits on its own; callers run side effects after a write
/// returns `Ok`.
#[async_trait]
pub trait AppraisalStore: Send + Sync {
    /// Check the store is reachable.
    async fn ping(&self) -> StoreResult<()>;

    /// Load one appraisal by id.
    async fn get_appraisal(&self, id: &AppraisalId) -> StoreResult<Option<Appraisal>>;

    /// Persist the mutable fields (status, result, notes, updated_at) of a row.
    async fn save_appraisal(&self, appraisal: &Appraisal) -> StoreResult<()>;

    /// Persist a row and record the verdict that changed it, atomically.
    async fn record_verdict(
        &self,
        appraisal: &Appraisal,
        verdict: &AppraisalVerdict,
    ) -> StoreResult<()>;

    /// Load the owner profile for contact details.
    async fn get_user_info(&self, id: &UserInfoId) -> StoreResult<Option<UserInfo>>;
}

#[derive(Debug, Default)]
struct Tables {
    appraisals: HashMap<AppraisalId, Appraisal>,
    users: HashMap<UserInfoId, UserInfo>,
    verdicts: Vec<AppraisalVerdict>,
}

/// In-memory appraisal store.
#[derive(Debug, Default)]
pub struct InMemoryAppraisalStore {
    tables: RwLock<Tables>,
}

impl InMemoryAppraisalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an appraisal row (intake side).
    pub fn insert_appraisal(&self, appraisal: Appraisal) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        tables.appraisals.insert(appraisal.id.clone(), appraisal);
        Ok(())
    }

    /// Insert or replace a user profile row.
    pub fn insert_user(&self, user: UserInfo) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        tables.users.insert(user.id.clone(), user);
        Ok(())
    }

    /// All verdicts recorded so far, in insertion order.
    pub fn verdicts(&self) -> StoreResult<Vec<AppraisalVerdict>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.verdicts.clone())
    }
}

#[async_trait]
impl AppraisalStore for InMemoryAppraisalStore {
    async fn ping(&self) -> StoreResult<()> {
        self.tables
            .read()
            .map(|_| ())
            .map_err(|_| StoreError::LockPoisoned)
    }

    async fn get_appraisal(&self, id: &AppraisalId) -> StoreResult<Option<Appraisal>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.appraisals.get(id).cloned())
    }

    async fn save_appraisal(&self, appraisal: &Appraisal) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        match tables.appraisals.get_mut(&appraisal.id) {
            Some(row) => {
                *row = appraisal.clone();
                Ok(())
            }
            None => Err(StoreError::AppraisalNotFound {
                id: appraisal.id.to_string(),
            }),
        }
    }

    async fn record_verdict(
        &self,
        appraisal: &Appraisal,
        verdict: &AppraisalVerdict,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        let Some(row) = tables.appraisals.get_mut(&appraisal.id) else {
            return Err(StoreError::AppraisalNotFound {
                id: appraisal.id.to_string(),
            });
        };
        *row = appraisal.clone();
        tables.verdicts.push(verdict.clone());
        Ok(())
    }

    async fn get_user_info(&self, id: &UserInfoId) -> StoreResult<Option<UserInfo>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables.users.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jianbao_core::AppraisalStatus;

    fn row(id: &str) -> Appraisal {
        Appraisal {
            id: AppraisalId::new(id).expect("id"),
            userinfo_id: None,
            title: None,
            status: Some(AppraisalStatus::Pending),
            result: None,
            notes: None,
            updated_at_ms: None,
        }
    }

    #[tokio::test]
    async fn test_save_requires_existing_row() {
        let store = InMemoryAppraisalStore::new();
        let err = store.save_appraisal(&row("missing")).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::AppraisalNotFound {
                id: "missing".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_save_replaces_row() {
        let store = InMemoryAppraisalStore::new();
        store.insert_appraisal(row("a1")).unwrap();
        let mut updated = row("a1");
        updated.status = Some(AppraisalStatus::InReview);
        store.save_appraisal(&updated).await.unwrap();
        let loaded = store
            .get_appraisal(&updated.id)
            .await
            .unwrap()
            .expect("row exists");
        assert_eq!(loaded.status, Some(AppraisalStatus::InReview));
    }
}

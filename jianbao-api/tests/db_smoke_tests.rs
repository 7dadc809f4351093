#![cfg(feature = "db-tests")]
//! Smoke tests against a live PostgreSQL database.
//!
//! Requires the `appraisal`, `appraisal_result` and `userinfo` tables and
//! the `JIANBAO_DB_*` variables pointing at them. Set
//! `JIANBAO_TEST_APPRAISAL_ID` to an existing row to exercise the
//! read/write path.

use jianbao_api::{ApiResult, DbClient, DbConfig};
use jianbao_core::{AppraisalId, AppraisalUpdate};
use jianbao_storage::AppraisalStore;

fn test_db() -> ApiResult<DbClient> {
    DbClient::from_config(&DbConfig::from_env())
}

#[tokio::test]
async fn smoke_test_ping() -> ApiResult<()> {
    let db = test_db()?;
    db.ping().await?;
    Ok(())
}

#[tokio::test]
async fn smoke_test_missing_row() -> ApiResult<()> {
    let db = test_db()?;
    let id = AppraisalId::new("jianbao-smoke-missing-row")?;
    assert!(db.get_appraisal(&id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn smoke_test_rewrite_existing_row() -> ApiResult<()> {
    let Ok(raw) = std::env::var("JIANBAO_TEST_APPRAISAL_ID") else {
        return Ok(());
    };
    let db = test_db()?;
    let id = AppraisalId::new(raw)?;

    let Some(before) = db.get_appraisal(&id).await? else {
        panic!("JIANBAO_TEST_APPRAISAL_ID does not name an existing row");
    };

    // Write the same values back, refreshing only updatedAt.
    let after = AppraisalUpdate::default().apply_to(&before, jianbao_core::now_ms());
    db.save_appraisal(&after).await?;

    let reloaded = db.get_appraisal(&id).await?.expect("row still present");
    assert_eq!(reloaded.status, before.status);
    assert_eq!(reloaded.result, before.result);
    assert_eq!(reloaded.updated_at_ms, after.updated_at_ms);
    Ok(())
}

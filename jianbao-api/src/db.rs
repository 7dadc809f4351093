//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres, and the
//! `AppraisalStore` implementation over the `appraisal`, `appraisal_result`
//! and `userinfo` tables.
//!
//! Status and result columns hold the wire codes ("1".."6" and "1".."4");
//! `updatedAt` holds epoch milliseconds.

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use jianbao_core::{
    Appraisal, AppraisalId, AppraisalResult, AppraisalStatus, AppraisalVerdict, StoreError,
    UserInfo, UserInfoId,
};
use jianbao_storage::{AppraisalStore, StoreResult};
use std::fmt;
use std::time::Duration;
use tokio_postgres::{NoTls, Row};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "jianbao".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("JIANBAO_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("JIANBAO_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("JIANBAO_DB_NAME").unwrap_or_else(|_| "jianbao".to_string()),
            user: std::env::var("JIANBAO_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("JIANBAO_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("JIANBAO_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("JIANBAO_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(self.max_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Database client that wraps a connection pool.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

fn query_failed(err: impl fmt::Display) -> StoreError {
    StoreError::QueryFailed {
        reason: err.to_string(),
    }
}

impl DbClient {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> StoreResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(query_failed)
    }

}

// ============================================================================
// ROW MAPPING
// ============================================================================

const APPRAISAL_COLUMNS: &str =
    r#"_id, userinfo_id, title, appraisal_status, appraisal_result, notes, "updatedAt""#;

fn appraisal_from_row(row: &Row) -> StoreResult<Appraisal> {
    let raw_id: String = row.try_get(0).map_err(query_failed)?;
    let corrupt = |reason: String| StoreError::CorruptRow {
        id: raw_id.clone(),
        reason,
    };

    let id = AppraisalId::new(raw_id.as_str()).map_err(|e| corrupt(e.to_string()))?;
    let userinfo_id: Option<String> = row.try_get(1).map_err(query_failed)?;
    let status: Option<String> = row.try_get(3).map_err(query_failed)?;
    let result: Option<String> = row.try_get(4).map_err(query_failed)?;

    Ok(Appraisal {
        id,
        userinfo_id: userinfo_id
            .filter(|s| !s.trim().is_empty())
            .map(UserInfoId::new)
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?,
        title: row.try_get(2).map_err(query_failed)?,
        status: status
            .filter(|s| !s.trim().is_empty())
            .map(|s| AppraisalStatus::from_code(s.trim()))
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?,
        result: result
            .filter(|s| !s.trim().is_empty())
            .map(|s| AppraisalResult::from_code(s.trim()))
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?,
        notes: row.try_get(5).map_err(query_failed)?,
        updated_at_ms: row.try_get(6).map_err(query_failed)?,
    })
}

async fn update_row(
    client: &(impl tokio_postgres::GenericClient + Sync),
    appraisal: &Appraisal,
) -> StoreResult<()> {
    let status = appraisal.status.map(|s| s.as_code());
    let result = appraisal.result.map(|r| r.as_code());
    let updated = client
        .execute(
            r#"UPDATE appraisal
               SET appraisal_status = $2, appraisal_result = $3, notes = $4, "updatedAt" = $5
               WHERE _id = $1"#,
            &[
                &appraisal.id.as_str(),
                &status,
                &result,
                &appraisal.notes,
                &appraisal.updated_at_ms,
            ],
        )
        .await
        .map_err(|e| StoreError::UpdateFailed {
            id: appraisal.id.to_string(),
            reason: e.to_string(),
        })?;

    if updated == 0 {
        return Err(StoreError::AppraisalNotFound {
            id: appraisal.id.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// APPRAISAL STORE
// ============================================================================

#[async_trait]
impl AppraisalStore for DbClient {
    async fn ping(&self) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await.map_err(query_failed)?;
        Ok(())
    }

    async fn get_appraisal(&self, id: &AppraisalId) -> StoreResult<Option<Appraisal>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM appraisal WHERE _id = $1", APPRAISAL_COLUMNS);
        let row = conn
            .query_opt(sql.as_str(), &[&id.as_str()])
            .await
            .map_err(query_failed)?;
        row.as_ref().map(appraisal_from_row).transpose()
    }

    async fn save_appraisal(&self, appraisal: &Appraisal) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        update_row(&**conn, appraisal).await
    }

    async fn record_verdict(
        &self,
        appraisal: &Appraisal,
        verdict: &AppraisalVerdict,
    ) -> StoreResult<()> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_failed)?;

        update_row(&*tx, appraisal).await?;
        tx.execute(
            r#"INSERT INTO appraisal_result (appraisal_id, result, notes, user_id, created_at)
               VALUES ($1, $2, $3, $4, to_timestamp($5::bigint / 1000.0))"#,
            &[
                &verdict.appraisal_id.as_str(),
                &verdict.result.as_code(),
                &verdict.notes,
                &verdict.appraiser_id,
                &verdict.created_at.timestamp_millis(),
            ],
        )
        .await
        .map_err(query_failed)?;

        tx.commit().await.map_err(query_failed)
    }

    async fn get_user_info(&self, id: &UserInfoId) -> StoreResult<Option<UserInfo>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT _id, phone, nick_name FROM userinfo WHERE _id = $1",
                &[&id.as_str()],
            )
            .await
            .map_err(query_failed)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(UserInfo {
            id: id.clone(),
            phone: row.try_get(1).map_err(query_failed)?,
            nick_name: row.try_get(2).map_err(query_failed)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_default() {
        let config = DbConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "jianbao");
        assert_eq!(config.max_size, 16);
    }

    #[test]
    fn test_create_pool_is_lazy() {
        // Pool creation does not connect.
        let pool = DbConfig::default().create_pool();
        assert!(pool.is_ok());
    }
}

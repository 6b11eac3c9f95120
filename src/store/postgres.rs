//! PostgreSQL member store and table DDL.
//!
//! Postgres has no gap locks: `SELECT ... FOR UPDATE` over an empty rank range locks nothing, so
//! two inserts into the same empty slot would both proceed. Every writing transaction therefore
//! takes a transaction-scoped advisory lock keyed on the table before its first row or range lock.

use super::{Member, MemberId, MemberRow, MemberStore, MemberTx, RankRange};
use crate::error::AppError;
use crate::sql;
use async_trait::async_trait;
use sqlx::{ConnectOptions, PgPool, Postgres, Transaction};
use std::str::FromStr;
use std::time::Duration;

pub const MEMBERS_TABLE: &str = "bureau_members";

/// Create the schema and member table if missing.
///
/// Ranks above zero are unique through a deferred exclusion constraint, so shifts may pass through
/// duplicates mid-transaction but a duplicate can never be committed.
pub async fn ensure_member_table(pool: &PgPool, schema: &str) -> Result<(), AppError> {
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", sql::quoted(schema)))
        .execute(pool)
        .await?;

    let table = sql::qualified_table(schema, MEMBERS_TABLE);
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            poste TEXT NOT NULL,
            nom TEXT NOT NULL,
            fonction TEXT NOT NULL,
            photo TEXT,
            ordre INTEGER NOT NULL DEFAULT 0 CHECK (ordre >= 0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT {}_ordre_excl EXCLUDE USING btree (ordre WITH =)
                WHERE (ordre > 0) DEFERRABLE INITIALLY DEFERRED
        )
        "#,
        table, MEMBERS_TABLE
    );
    sqlx::query(&ddl).execute(pool).await?;
    tracing::info!(table = %table, "member table ready");
    Ok(())
}

#[derive(Clone)]
pub struct PgMemberStore {
    pool: PgPool,
    table: String,
    lock_timeout: Duration,
}

impl PgMemberStore {
    pub fn new(pool: PgPool, schema: &str, lock_timeout: Duration) -> Self {
        PgMemberStore {
            pool,
            table: sql::qualified_table(schema, MEMBERS_TABLE),
            lock_timeout,
        }
    }
}

#[async_trait]
impl MemberStore for PgMemberStore {
    async fn get_all(&self) -> Result<Vec<Member>, AppError> {
        let sql = sql::select_all(&self.table);
        tracing::debug!(sql = %sql, "query");
        let rows = sqlx::query_as::<_, Member>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn get_by_id(&self, id: MemberId) -> Result<Option<Member>, AppError> {
        let sql = sql::select_by_id(&self.table, false);
        tracing::debug!(sql = %sql, id, "query");
        let row = sqlx::query_as::<_, Member>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn begin(&self) -> Result<Box<dyn MemberTx>, AppError> {
        let mut tx = self.pool.begin().await?;
        // SET does not take bind parameters; the value is an integer we format ourselves.
        let set_timeout = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&set_timeout).execute(&mut *tx).await?;
        Ok(Box::new(PgMemberTx {
            tx,
            table: self.table.clone(),
            serialized: false,
        }))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

pub struct PgMemberTx {
    tx: Transaction<'static, Postgres>,
    table: String,
    serialized: bool,
}

impl PgMemberTx {
    /// Take the table's advisory lock once per transaction. Released at commit or rollback.
    async fn serialize_writers(&mut self) -> Result<(), AppError> {
        if self.serialized {
            return Ok(());
        }
        tracing::debug!(table = %self.table, "advisory lock (tx)");
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&self.table)
            .execute(&mut *self.tx)
            .await?;
        self.serialized = true;
        Ok(())
    }
}

#[async_trait]
impl MemberTx for PgMemberTx {
    async fn lock_row(&mut self, id: MemberId) -> Result<Option<Member>, AppError> {
        self.serialize_writers().await?;
        let sql = sql::select_by_id(&self.table, true);
        tracing::debug!(sql = %sql, id, "query (tx)");
        let row = sqlx::query_as::<_, Member>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn lock_range(&mut self, range: RankRange) -> Result<u64, AppError> {
        self.serialize_writers().await?;
        let q = sql::lock_range(&self.table, &range);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(*p);
        }
        let rows = query.fetch_all(&mut *self.tx).await?;
        Ok(rows.len() as u64)
    }

    async fn max_rank(&mut self) -> Result<i32, AppError> {
        self.serialize_writers().await?;
        let sql = sql::max_rank(&self.table);
        tracing::debug!(sql = %sql, "query (tx)");
        let max: i32 = sqlx::query_scalar(&sql).fetch_one(&mut *self.tx).await?;
        Ok(max)
    }

    async fn shift(&mut self, range: RankRange, delta: i32) -> Result<u64, AppError> {
        let q = sql::shift(&self.table, &range, delta);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(*p);
        }
        let result = query.execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn insert_row(&mut self, row: &MemberRow) -> Result<MemberId, AppError> {
        let sql = sql::insert(&self.table);
        tracing::debug!(sql = %sql, rank = row.rank, "query (tx)");
        let id: MemberId = sqlx::query_scalar(&sql)
            .bind(&row.poste)
            .bind(&row.nom)
            .bind(&row.fonction)
            .bind(&row.photo)
            .bind(row.rank)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(id)
    }

    async fn update_row(&mut self, id: MemberId, row: &MemberRow) -> Result<Option<Member>, AppError> {
        let sql = sql::update(&self.table);
        tracing::debug!(sql = %sql, id, rank = row.rank, "query (tx)");
        let member = sqlx::query_as::<_, Member>(&sql)
            .bind(&row.poste)
            .bind(&row.nom)
            .bind(&row.fonction)
            .bind(&row.photo)
            .bind(row.rank)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(member)
    }

    async fn delete_row(&mut self, id: MemberId) -> Result<bool, AppError> {
        let sql = sql::delete(&self.table);
        tracing::debug!(sql = %sql, id, "query (tx)");
        let result = sqlx::query(&sql).bind(id).execute(&mut *self.tx).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(AppError::Db)?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(AppError::Db)?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", sql::quoted(&db_name)))
            .execute(&mut conn)
            .await
            .map_err(AppError::Db)?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url.rfind('/').ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

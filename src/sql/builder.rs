//! Builds parameterized statements for the member table.

use crate::store::RankRange;
use std::ops::Bound;

const RANK_COLUMN: &str = "ordre";

/// Columns returned for every member read, in `Member` field order.
pub const MEMBER_COLUMNS: &str = "id, poste, nom, fonction, photo, ordre, created_at, updated_at";

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<i32>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: i32) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Append ` WHERE <rank predicate>`; an unbounded range matches every row.
    fn push_rank_predicate(&mut self, range: &RankRange) {
        let mut clauses = Vec::with_capacity(2);
        match range.start {
            Bound::Included(v) => {
                let n = self.push_param(v);
                clauses.push(format!("{} >= ${}", RANK_COLUMN, n));
            }
            Bound::Excluded(v) => {
                let n = self.push_param(v);
                clauses.push(format!("{} > ${}", RANK_COLUMN, n));
            }
            Bound::Unbounded => {}
        }
        match range.end {
            Bound::Included(v) => {
                let n = self.push_param(v);
                clauses.push(format!("{} <= ${}", RANK_COLUMN, n));
            }
            Bound::Excluded(v) => {
                let n = self.push_param(v);
                clauses.push(format!("{} < ${}", RANK_COLUMN, n));
            }
            Bound::Unbounded => {}
        }
        if clauses.is_empty() {
            self.sql.push_str(" WHERE TRUE");
        } else {
            self.sql.push_str(" WHERE ");
            self.sql.push_str(&clauses.join(" AND "));
        }
    }
}

pub fn select_all(table: &str) -> String {
    format!("SELECT {} FROM {} ORDER BY {} ASC, id ASC", MEMBER_COLUMNS, table, RANK_COLUMN)
}

/// SELECT one member by id; `for_update` holds the row lock until the transaction ends.
pub fn select_by_id(table: &str, for_update: bool) -> String {
    let mut sql = format!("SELECT {} FROM {} WHERE id = $1", MEMBER_COLUMNS, table);
    if for_update {
        sql.push_str(" FOR UPDATE");
    }
    sql
}

/// Row locks over a rank range. Locks are taken in id order.
pub fn lock_range(table: &str, range: &RankRange) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("SELECT id FROM {}", table);
    q.push_rank_predicate(range);
    q.sql.push_str(" ORDER BY id FOR UPDATE");
    q
}

pub fn max_rank(table: &str) -> String {
    format!("SELECT COALESCE(MAX({}), 0) FROM {}", RANK_COLUMN, table)
}

/// `ordre = ordre + $1` over a rank range. The delta is always the first parameter.
pub fn shift(table: &str, range: &RankRange, delta: i32) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(delta);
    q.sql = format!(
        "UPDATE {} SET {col} = {col} + ${}, updated_at = NOW()",
        table,
        n,
        col = RANK_COLUMN
    );
    q.push_rank_predicate(range);
    q
}

/// INSERT with binds ($1..$5) poste, nom, fonction, photo, ordre. Returns id.
pub fn insert(table: &str) -> String {
    format!(
        "INSERT INTO {} (poste, nom, fonction, photo, {}) VALUES ($1, $2, $3, $4, $5) RETURNING id",
        table, RANK_COLUMN
    )
}

/// UPDATE by id ($6) with binds ($1..$5) poste, nom, fonction, photo, ordre. Returns the row.
pub fn update(table: &str) -> String {
    format!(
        "UPDATE {} SET poste = $1, nom = $2, fonction = $3, photo = $4, {} = $5, updated_at = NOW() WHERE id = $6 RETURNING {}",
        table, RANK_COLUMN, MEMBER_COLUMNS
    )
}

pub fn delete(table: &str) -> String {
    format!("DELETE FROM {} WHERE id = $1", table)
}

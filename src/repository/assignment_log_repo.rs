// ==========================================
// 线索分配引擎 - 分配审计日志仓储
// ==========================================
// 红线: 只追加，不更新不删除
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::assignment_log::AssignmentLog;
use crate::domain::types::AssignmentAction;
use crate::engine::repositories::AssignmentLogStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct AssignmentLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加日志，返回 log_id
    pub fn insert(&self, log: &AssignmentLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO assignment_log (
                log_id, lead_id, action, from_agent_id, to_agent_id,
                rule_id, actor, logged_at, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                log.log_id,
                log.lead_id,
                log.action.as_str(),
                log.from_agent_id,
                log.to_agent_id,
                log.rule_id,
                log.actor,
                format_ts(&log.logged_at),
                log.detail,
            ],
        )?;
        Ok(log.log_id.clone())
    }

    /// 查询线索的分配历史（按时间升序）
    pub fn find_by_lead(&self, lead_id: &str) -> RepositoryResult<Vec<AssignmentLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT log_id, lead_id, action, from_agent_id, to_agent_id,
                   rule_id, actor, logged_at, detail
            FROM assignment_log
            WHERE lead_id = ?1
            ORDER BY logged_at, rowid
            "#,
        )?;
        let logs = stmt
            .query_map(params![lead_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    fn map_row(row: &Row) -> SqliteResult<AssignmentLog> {
        let action: String = row.get(2)?;
        let logged_at: String = row.get(7)?;
        Ok(AssignmentLog {
            log_id: row.get(0)?,
            lead_id: row.get(1)?,
            action: AssignmentAction::from_db_str(&action),
            from_agent_id: row.get(3)?,
            to_agent_id: row.get(4)?,
            rule_id: row.get(5)?,
            actor: row.get(6)?,
            logged_at: parse_ts(&logged_at).unwrap_or(DateTime::<Utc>::MIN_UTC),
            detail: row.get(8)?,
        })
    }
}

impl AssignmentLogStore for AssignmentLogRepository {
    fn append(&self, log: &AssignmentLog) -> RepositoryResult<()> {
        self.insert(log).map(|_| ())
    }
}

// ==========================================
// 线索分配引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 幂等建表（lead / assignment_rule / rotation_cursor / assignment_log / config_kv）
// ==========================================

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 幂等创建全部表结构，并登记 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
          version INTEGER PRIMARY KEY,
          applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
          scope_id TEXT NOT NULL,
          key TEXT NOT NULL,
          value TEXT NOT NULL,
          updated_at TEXT NOT NULL DEFAULT (datetime('now')),
          PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS lead (
          lead_id TEXT PRIMARY KEY,
          name TEXT NOT NULL,
          source TEXT NOT NULL,
          score INTEGER NOT NULL DEFAULT 0,
          stage TEXT NOT NULL,
          status TEXT NOT NULL,
          assigned_agent_id TEXT,
          assigned_at TEXT,
          last_contact_at TEXT,
          converted_at TEXT,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          tags_json TEXT NOT NULL DEFAULT '[]',
          custom_fields_json TEXT NOT NULL DEFAULT '{}'
        );

        CREATE INDEX IF NOT EXISTS idx_lead_assigned
          ON lead(assigned_agent_id, status);

        CREATE TABLE IF NOT EXISTS lead_interaction (
          interaction_id TEXT PRIMARY KEY,
          lead_id TEXT NOT NULL REFERENCES lead(lead_id) ON DELETE CASCADE,
          kind TEXT NOT NULL,
          occurred_at TEXT NOT NULL,
          agent_id TEXT,
          description TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_lead_interaction_lead
          ON lead_interaction(lead_id, occurred_at);

        CREATE TABLE IF NOT EXISTS assignment_rule (
          rule_id TEXT PRIMARY KEY,
          name TEXT NOT NULL,
          priority INTEGER NOT NULL DEFAULT 0,
          enabled INTEGER NOT NULL DEFAULT 1,
          rule_type TEXT NOT NULL,
          config_json TEXT,
          conditions_json TEXT NOT NULL DEFAULT '{}',
          reassign_enabled INTEGER NOT NULL DEFAULT 0,
          no_response_hours INTEGER NOT NULL DEFAULT 24,
          created_at TEXT NOT NULL DEFAULT (datetime('now')),
          updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS rotation_cursor (
          cursor_key TEXT PRIMARY KEY,
          position INTEGER NOT NULL DEFAULT 0,
          updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS assignment_log (
          log_id TEXT PRIMARY KEY,
          lead_id TEXT NOT NULL,
          action TEXT NOT NULL,
          from_agent_id TEXT,
          to_agent_id TEXT NOT NULL,
          rule_id TEXT,
          actor TEXT NOT NULL,
          logged_at TEXT NOT NULL,
          detail TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_assignment_log_lead
          ON assignment_log(lead_id, logged_at);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 时间戳落库格式（RFC3339）
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// 解析落库时间戳；无法解析时返回 None
pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_parse_ts_rejects_garbage() {
        assert!(parse_ts("not-a-date").is_none());
        let now = Utc::now();
        let parsed = parse_ts(&format_ts(&now)).unwrap();
        assert_eq!(parsed.timestamp(), now.timestamp());
    }
}

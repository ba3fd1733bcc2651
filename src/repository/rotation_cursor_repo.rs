// ==========================================
// 线索分配引擎 - 轮转游标数据仓储
// ==========================================
// 职责: rotation_cursor 表读写，实现 RotationCursorStore
// 红线: 整表保存在单个事务内完成
// ==========================================

use crate::db::format_ts;
use crate::engine::repositories::RotationCursorStore;
use crate::engine::rotation::RotationCursors;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct RotationCursorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RotationCursorRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取全部游标
    pub fn load(&self) -> RepositoryResult<RotationCursors> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT cursor_key, position FROM rotation_cursor")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<SqliteResult<Vec<_>>>()?;

        let positions: BTreeMap<String, u64> = rows
            .into_iter()
            .map(|(key, pos)| (key, u64::try_from(pos).unwrap_or(0)))
            .collect();
        Ok(RotationCursors::from_positions(positions))
    }

    /// 保存全部游标（upsert）
    pub fn save(&self, cursors: &RotationCursors) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = format_ts(&Utc::now());

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO rotation_cursor (cursor_key, position, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(cursor_key) DO UPDATE SET
                    position = excluded.position,
                    updated_at = excluded.updated_at
                "#,
            )?;
            for (key, pos) in cursors.positions() {
                // 超出 i64 的游标按 i64::MAX 落库，取模语义不受影响
                let pos = i64::try_from(*pos).unwrap_or(i64::MAX);
                stmt.execute(params![key, pos, now])?;
            }
        }

        tx.commit()?;
        debug!(count = cursors.positions().len(), "轮转游标已保存");
        Ok(())
    }
}

impl RotationCursorStore for RotationCursorRepository {
    fn load_cursors(&self) -> RepositoryResult<RotationCursors> {
        self.load()
    }

    fn save_cursors(&self, cursors: &RotationCursors) -> RepositoryResult<()> {
        self.save(cursors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        let repo = RotationCursorRepository::new(Arc::new(Mutex::new(conn)));

        assert!(repo.load().unwrap().positions().is_empty());

        let agents = vec!["A".to_string(), "B".to_string()];
        let mut cursors = RotationCursors::new();
        cursors.select("R1", &agents);
        cursors.select("R1", &agents);
        cursors.select("R2#source:web", &agents);
        repo.save(&cursors).unwrap();

        cursors.select("R1", &agents);
        repo.save(&cursors).unwrap();

        let loaded = repo.load().unwrap();
        assert_eq!(loaded.position("R1"), 3);
        assert_eq!(loaded.position("R2#source:web"), 1);
    }
}

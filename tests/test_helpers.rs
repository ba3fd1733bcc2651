// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、仓储装配等功能
// ==========================================

#![allow(dead_code)]

use lead_routing::db::{ensure_schema, open_sqlite_connection};
use lead_routing::engine::RoutingRepositories;
use lead_routing::repository::{
    AssignmentLogRepository, LeadRepository, RotationCursorRepository, RuleRepository,
};
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    lead_routing::logging::init_test();
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接
pub fn open_shared_connection(db_path: &str) -> Result<Arc<Mutex<Connection>>, Box<dyn Error>> {
    let conn = open_sqlite_connection(db_path)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 基于共享连接装配全部 SQLite 仓储
pub struct SqliteFixture {
    pub conn: Arc<Mutex<Connection>>,
    pub leads: Arc<LeadRepository>,
    pub rules: Arc<RuleRepository>,
    pub cursors: Arc<RotationCursorRepository>,
    pub logs: Arc<AssignmentLogRepository>,
}

impl SqliteFixture {
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_shared_connection(db_path)?;
        Ok(Self {
            leads: Arc::new(LeadRepository::new(conn.clone())),
            rules: Arc::new(RuleRepository::new(conn.clone())),
            cursors: Arc::new(RotationCursorRepository::new(conn.clone())),
            logs: Arc::new(AssignmentLogRepository::new(conn.clone())),
            conn,
        })
    }

    pub fn repositories(&self) -> RoutingRepositories {
        RoutingRepositories::new(
            self.leads.clone(),
            self.rules.clone(),
            self.cursors.clone(),
            self.logs.clone(),
        )
    }
}

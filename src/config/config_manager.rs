// ==========================================
// 线索分配引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::config_reader::RoutingConfigReader;
use crate::config::routing_config::RoutingConfig;
use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 写入配置值（存在则覆盖）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置值，缺失或格式错误时返回默认值
    fn get_parsed_or<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + std::fmt::Display,
    {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置值格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 在扫描/分配日志中记录当时生效的配置
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::InternalError(e.to_string()))
    }
}

// ==========================================
// RoutingConfigReader Trait 实现
// ==========================================
impl RoutingConfigReader for ConfigManager {
    fn load_routing_config(&self) -> RepositoryResult<RoutingConfig> {
        let defaults = RoutingConfig::default();

        let reset_sla = self.get_parsed_or(
            config_keys::RESET_SLA_ON_ASSIGNMENT,
            defaults.reset_sla_on_assignment,
        )?;

        Ok(RoutingConfig {
            pending_response_hours: self.get_parsed_or(
                config_keys::PENDING_RESPONSE_HOURS,
                defaults.pending_response_hours,
            )?,
            conversion_period_days: self.get_parsed_or(
                config_keys::CONVERSION_PERIOD_DAYS,
                defaults.conversion_period_days,
            )?,
            default_score_threshold: self
                .get_parsed_or(
                    config_keys::DEFAULT_SCORE_THRESHOLD,
                    defaults.default_score_threshold,
                )?
                .min(100),
            count_call_and_sms_as_response: self.get_parsed_or(
                config_keys::COUNT_CALL_AND_SMS_AS_RESPONSE,
                defaults.count_call_and_sms_as_response,
            )?,
            reset_sla_on_assignment: reset_sla,
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 负载快照
    pub const PENDING_RESPONSE_HOURS: &str = "pending_response_hours";
    pub const CONVERSION_PERIOD_DAYS: &str = "conversion_period_days";
    pub const COUNT_CALL_AND_SMS_AS_RESPONSE: &str = "count_call_and_sms_as_response";

    // 策略
    pub const DEFAULT_SCORE_THRESHOLD: &str = "default_score_threshold";

    // 重分配
    pub const RESET_SLA_ON_ASSIGNMENT: &str = "reset_sla_on_assignment";
}

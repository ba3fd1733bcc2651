// ==========================================
// 线索分配引擎 - 分配规则数据仓储
// ==========================================
// 职责: assignment_rule 表 CRUD，实现 RuleStore
// 说明: 策略以 (rule_type, config_json) 两列落库
// 红线: 无法还原的规则行跳过并告警，不阻断整体读取
// 红线: 不保证返回顺序，评估顺序由编排器负责
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::rule::{AssignmentRule, ReassignmentPolicy, RuleConditions, RuleFilter, RuleStrategy};
use crate::engine::error::RoutingError;
use crate::engine::repositories::RuleStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

const RULE_COLUMNS: &str = r#"
    rule_id, name, priority, enabled, rule_type, config_json, conditions_json,
    reassign_enabled, no_response_hours, created_at, updated_at
"#;

struct RuleRow {
    rule_id: String,
    name: String,
    priority: i64,
    enabled: bool,
    rule_type: String,
    config_json: Option<String>,
    conditions_json: String,
    reassign_enabled: bool,
    no_response_hours: i64,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl RuleRow {
    fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            rule_id: row.get(0)?,
            name: row.get(1)?,
            priority: row.get(2)?,
            enabled: row.get(3)?,
            rule_type: row.get(4)?,
            config_json: row.get(5)?,
            conditions_json: row.get(6)?,
            reassign_enabled: row.get(7)?,
            no_response_hours: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_rule(self) -> Result<AssignmentRule, RoutingError> {
        let rule_id = self.rule_id;
        let strategy = RuleStrategy::from_parts(&self.rule_type, self.config_json.as_deref())
            .map_err(|reason| RoutingError::configuration(&rule_id, reason))?;
        let conditions: RuleConditions = serde_json::from_str(&self.conditions_json)
            .map_err(|e| RoutingError::configuration(&rule_id, format!("匹配条件无效: {}", e)))?;
        let no_response_hours = u32::try_from(self.no_response_hours).map_err(|_| {
            RoutingError::configuration(
                &rule_id,
                format!("no_response_hours 无效: {}", self.no_response_hours),
            )
        })?;
        let priority = i32::try_from(self.priority).map_err(|_| {
            RoutingError::configuration(&rule_id, format!("priority 越界: {}", self.priority))
        })?;

        Ok(AssignmentRule {
            rule_id,
            name: self.name,
            priority,
            enabled: self.enabled,
            conditions,
            strategy,
            reassignment: ReassignmentPolicy {
                enabled: self.reassign_enabled,
                no_response_hours,
            },
            created_at: self.created_at.as_deref().and_then(parse_ts),
            updated_at: self.updated_at.as_deref().and_then(parse_ts),
        })
    }
}

// ==========================================
// RuleRepository - 分配规则仓储
// ==========================================
pub struct RuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RuleRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询全部可还原的规则
    pub fn find_all(&self, filter: &RuleFilter) -> RepositoryResult<Vec<AssignmentRule>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM assignment_rule", RULE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], RuleRow::from_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_rule() {
                Ok(rule) if filter.accepts(&rule) => rules.push(rule),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "规则配置无效，已跳过"),
            }
        }
        Ok(rules)
    }

    /// 按 rule_id 查询
    ///
    /// # 错误
    /// - `ValidationError`: 行存在但策略配置无法还原
    pub fn find_by_id(&self, rule_id: &str) -> RepositoryResult<Option<AssignmentRule>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM assignment_rule WHERE rule_id = ?1", RULE_COLUMNS);
        let row = conn
            .query_row(&sql, params![rule_id], RuleRow::from_row)
            .optional()?;

        match row {
            Some(row) => row
                .into_rule()
                .map(Some)
                .map_err(|e| RepositoryError::ValidationError(e.to_string())),
            None => Ok(None),
        }
    }

    /// 新建规则
    ///
    /// # 错误
    /// - `UniqueConstraintViolation`: rule_id 已存在
    pub fn create(&self, rule: &AssignmentRule) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let (rule_type, config_json) = rule.strategy.to_parts()?;
        let conditions_json = serde_json::to_string(&rule.conditions)?;
        let now = format_ts(&Utc::now());

        conn.execute(
            r#"
            INSERT INTO assignment_rule (
                rule_id, name, priority, enabled, rule_type, config_json, conditions_json,
                reassign_enabled, no_response_hours, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            "#,
            params![
                rule.rule_id,
                rule.name,
                rule.priority,
                rule.enabled,
                rule_type.as_str(),
                config_json,
                conditions_json,
                rule.reassignment.enabled,
                rule.reassignment.no_response_hours,
                now,
            ],
        )?;

        info!(rule_id = %rule.rule_id, rule_type = %rule_type, "规则已创建");
        Ok(())
    }

    /// 更新规则（整行覆盖，created_at 保留）
    pub fn update(&self, rule: &AssignmentRule) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let (rule_type, config_json) = rule.strategy.to_parts()?;
        let conditions_json = serde_json::to_string(&rule.conditions)?;

        let rows = conn.execute(
            r#"
            UPDATE assignment_rule
               SET name = ?1, priority = ?2, enabled = ?3, rule_type = ?4,
                   config_json = ?5, conditions_json = ?6,
                   reassign_enabled = ?7, no_response_hours = ?8, updated_at = ?9
             WHERE rule_id = ?10
            "#,
            params![
                rule.name,
                rule.priority,
                rule.enabled,
                rule_type.as_str(),
                config_json,
                conditions_json,
                rule.reassignment.enabled,
                rule.reassignment.no_response_hours,
                format_ts(&Utc::now()),
                rule.rule_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::not_found("AssignmentRule", &rule.rule_id));
        }
        info!(rule_id = %rule.rule_id, "规则已更新");
        Ok(())
    }

    pub fn delete(&self, rule_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM assignment_rule WHERE rule_id = ?1",
            params![rule_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("AssignmentRule", rule_id));
        }
        info!(rule_id = %rule_id, "规则已删除");
        Ok(())
    }
}

impl RuleStore for RuleRepository {
    fn list_rules(&self, filter: &RuleFilter) -> RepositoryResult<Vec<AssignmentRule>> {
        self.find_all(filter)
    }

    fn find_rule(&self, rule_id: &str) -> RepositoryResult<Option<AssignmentRule>> {
        self.find_by_id(rule_id)
    }

    fn create_rule(&self, rule: &AssignmentRule) -> RepositoryResult<()> {
        self.create(rule)
    }

    fn update_rule(&self, rule: &AssignmentRule) -> RepositoryResult<()> {
        self.update(rule)
    }

    fn delete_rule(&self, rule_id: &str) -> RepositoryResult<()> {
        self.delete(rule_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::{RotationConfig, ScoreConfig};

    fn setup_test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn make_rule(rule_id: &str, strategy: RuleStrategy) -> AssignmentRule {
        AssignmentRule {
            rule_id: rule_id.to_string(),
            name: format!("rule {}", rule_id),
            priority: 5,
            enabled: true,
            conditions: RuleConditions {
                sources: Some(vec!["instagram".to_string()]),
                min_score: Some(70),
                ..Default::default()
            },
            strategy,
            reassignment: ReassignmentPolicy {
                enabled: true,
                no_response_hours: 24,
            },
            created_at: None,
            updated_at: None,
        }
    }

    fn rotation(agents: &[&str]) -> RuleStrategy {
        RuleStrategy::Rotation(RotationConfig {
            agent_ids: agents.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn test_create_and_find() {
        let repo = RuleRepository::new(setup_test_db());
        repo.create(&make_rule("R1", rotation(&["A", "B"]))).unwrap();

        let loaded = repo.find_by_id("R1").unwrap().unwrap();
        assert_eq!(loaded.strategy, rotation(&["A", "B"]));
        assert_eq!(loaded.conditions.min_score, Some(70));
        assert!(loaded.reassignment.enabled);
        assert!(loaded.created_at.is_some());
    }

    #[test]
    fn test_manual_rule_has_no_config() {
        let repo = RuleRepository::new(setup_test_db());
        repo.create(&make_rule("M", RuleStrategy::Manual)).unwrap();
        assert_eq!(repo.find_by_id("M").unwrap().unwrap().strategy, RuleStrategy::Manual);
    }

    #[test]
    fn test_update_and_delete_missing_rule() {
        let repo = RuleRepository::new(setup_test_db());
        let rule = make_rule("ghost", RuleStrategy::Manual);
        assert!(matches!(repo.update(&rule), Err(RepositoryError::NotFound { .. })));
        assert!(matches!(repo.delete("ghost"), Err(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_update_overwrites_strategy() {
        let repo = RuleRepository::new(setup_test_db());
        let mut rule = make_rule("R1", rotation(&["A"]));
        repo.create(&rule).unwrap();

        rule.strategy = RuleStrategy::ByScore(ScoreConfig {
            agent_ids: vec!["S".to_string()],
            min_score: Some(80),
        });
        rule.enabled = false;
        repo.update(&rule).unwrap();

        let loaded = repo.find_by_id("R1").unwrap().unwrap();
        assert_eq!(loaded.strategy, rule.strategy);
        assert!(!loaded.enabled);
        assert!(repo.find_all(&RuleFilter::enabled()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_rows_are_skipped() {
        let conn = setup_test_db();
        let repo = RuleRepository::new(conn.clone());
        repo.create(&make_rule("good", rotation(&["A"]))).unwrap();
        {
            let c = conn.lock().unwrap();
            c.execute(
                "INSERT INTO assignment_rule (rule_id, name, rule_type, config_json) \
                 VALUES ('bad_type', 'x', 'lottery', '{}')",
                [],
            )
            .unwrap();
            c.execute(
                "INSERT INTO assignment_rule (rule_id, name, rule_type, config_json) \
                 VALUES ('bad_config', 'y', 'rotation', '{\"agents\": 3}')",
                [],
            )
            .unwrap();
        }

        let rules = repo.find_all(&RuleFilter::all()).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_id, "good");
        assert!(matches!(
            repo.find_by_id("bad_type"),
            Err(RepositoryError::ValidationError(_))
        ));
    }
}

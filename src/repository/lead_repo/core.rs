use crate::db::{ensure_schema, format_ts, open_sqlite_connection};
use crate::domain::lead::{Interaction, Lead, LeadFilter, LeadPatch};
use crate::engine::repositories::LeadStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::debug;

// ==========================================
// LeadRepository - 线索仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct LeadRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LeadRepository {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 打开数据库文件并确保表结构存在
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_schema(&conn)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入线索（含互动记录）
    pub fn insert(&self, lead: &Lead) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let tags_json = serde_json::to_string(&lead.tags)?;
        let custom_fields_json = serde_json::to_string(&lead.custom_fields)?;

        tx.execute(
            r#"
            INSERT INTO lead (
                lead_id, name, source, score, stage, status,
                assigned_agent_id, assigned_at, last_contact_at, converted_at,
                created_at, updated_at, tags_json, custom_fields_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                lead.lead_id,
                lead.name,
                lead.source,
                lead.score as i64,
                lead.stage,
                lead.status.as_str(),
                lead.assigned_agent_id,
                lead.assigned_at.as_ref().map(format_ts),
                lead.last_contact_at.as_ref().map(format_ts),
                lead.converted_at.as_ref().map(format_ts),
                format_ts(&lead.created_at),
                format_ts(&lead.updated_at),
                tags_json,
                custom_fields_json,
            ],
        )?;

        for interaction in &lead.interactions {
            Self::insert_interaction(&tx, &lead.lead_id, interaction)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 追加互动记录，并推进 last_contact_at
    ///
    /// # 错误
    /// - `NotFound`: lead_id 不存在
    pub fn add_interaction(&self, lead_id: &str, interaction: &Interaction) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let occurred_at = format_ts(&interaction.occurred_at);
        let rows = tx.execute(
            r#"
            UPDATE lead
               SET last_contact_at = CASE
                       WHEN last_contact_at IS NULL OR last_contact_at < ?1 THEN ?1
                       ELSE last_contact_at
                   END,
                   updated_at = ?2
             WHERE lead_id = ?3
            "#,
            params![occurred_at, format_ts(&Utc::now()), lead_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Lead", lead_id));
        }

        Self::insert_interaction(&tx, lead_id, interaction)?;
        tx.commit()?;
        Ok(())
    }

    fn insert_interaction(
        conn: &Connection,
        lead_id: &str,
        interaction: &Interaction,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO lead_interaction (
                interaction_id, lead_id, kind, occurred_at, agent_id, description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                interaction.interaction_id,
                lead_id,
                interaction.kind.as_str(),
                format_ts(&interaction.occurred_at),
                interaction.agent_id,
                interaction.description,
            ],
        )?;
        Ok(())
    }

    /// 部分更新线索（乐观校验分配）
    ///
    /// 先比较 expected_agent_id 与当前值，UPDATE 语句再以
    /// `assigned_agent_id IS ?` 兜底，保证读-改-写期间未被改动。
    ///
    /// # 错误
    /// - `NotFound`: lead_id 不存在
    /// - `AssignmentConflict`: 当前分配与 expected_agent_id 不一致
    pub fn update(&self, lead_id: &str, patch: &LeadPatch) -> RepositoryResult<Lead> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut lead = Self::query_lead(&tx, lead_id)?
            .ok_or_else(|| RepositoryError::not_found("Lead", lead_id))?;

        if let Some(expected) = &patch.expected_agent_id {
            if expected != &lead.assigned_agent_id {
                return Err(RepositoryError::AssignmentConflict {
                    lead_id: lead_id.to_string(),
                    expected: expected.clone(),
                    actual: lead.assigned_agent_id.clone(),
                });
            }
        }

        let previous_agent = lead.assigned_agent_id.clone();
        let now = patch.assigned_at.unwrap_or_else(Utc::now);
        patch.apply_to(&mut lead, now);

        let rows = tx.execute(
            r#"
            UPDATE lead
               SET assigned_agent_id = ?1,
                   assigned_at = ?2,
                   status = ?3,
                   stage = ?4,
                   score = ?5,
                   converted_at = ?6,
                   updated_at = ?7
             WHERE lead_id = ?8 AND assigned_agent_id IS ?9
            "#,
            params![
                lead.assigned_agent_id,
                lead.assigned_at.as_ref().map(format_ts),
                lead.status.as_str(),
                lead.stage,
                lead.score as i64,
                lead.converted_at.as_ref().map(format_ts),
                format_ts(&lead.updated_at),
                lead_id,
                previous_agent,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::AssignmentConflict {
                lead_id: lead_id.to_string(),
                expected: previous_agent,
                actual: None,
            });
        }

        tx.commit()?;
        debug!(
            lead_id = %lead_id,
            agent_id = ?lead.assigned_agent_id,
            "线索已更新"
        );
        Ok(lead)
    }
}

impl LeadStore for LeadRepository {
    fn fetch_leads(&self, filter: &LeadFilter) -> RepositoryResult<Vec<Lead>> {
        self.find(filter)
    }

    fn update_lead(&self, lead_id: &str, patch: &LeadPatch) -> RepositoryResult<Lead> {
        self.update(lead_id, patch)
    }
}

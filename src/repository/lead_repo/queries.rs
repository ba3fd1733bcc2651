use super::core::LeadRepository;
use crate::db::parse_ts;
use crate::domain::lead::{Interaction, Lead, LeadFilter};
use crate::domain::types::{InteractionKind, LeadStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::collections::BTreeMap;
use tracing::warn;

const LEAD_COLUMNS: &str = r#"
    lead_id, name, source, score, stage, status,
    assigned_agent_id, assigned_at, last_contact_at, converted_at,
    created_at, updated_at, tags_json, custom_fields_json
"#;

// ==========================================
// LeadRow - 原始行
// ==========================================
struct LeadRow {
    lead_id: String,
    name: String,
    source: String,
    score: i64,
    stage: String,
    status: String,
    assigned_agent_id: Option<String>,
    assigned_at: Option<String>,
    last_contact_at: Option<String>,
    converted_at: Option<String>,
    created_at: String,
    updated_at: String,
    tags_json: String,
    custom_fields_json: String,
}

impl LeadRow {
    fn from_row(row: &Row) -> SqliteResult<Self> {
        Ok(Self {
            lead_id: row.get(0)?,
            name: row.get(1)?,
            source: row.get(2)?,
            score: row.get(3)?,
            stage: row.get(4)?,
            status: row.get(5)?,
            assigned_agent_id: row.get(6)?,
            assigned_at: row.get(7)?,
            last_contact_at: row.get(8)?,
            converted_at: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
            tags_json: row.get(12)?,
            custom_fields_json: row.get(13)?,
        })
    }

    /// 转换为领域实体
    ///
    /// 无法解析的时间戳按最早时刻处理（沉默时长最大化，交由扫描器处理）。
    fn into_lead(self, interactions: Vec<Interaction>) -> Result<Lead, String> {
        let status: LeadStatus = self.status.parse()?;
        let lead_id = self.lead_id;

        let ts = |raw: &str, column: &str| -> DateTime<Utc> {
            parse_ts(raw).unwrap_or_else(|| {
                warn!(lead_id = %lead_id, column, raw, "时间戳无法解析，按最早时刻处理");
                DateTime::<Utc>::MIN_UTC
            })
        };

        let assigned_at = self.assigned_at.as_deref().map(|s| ts(s, "assigned_at"));
        let last_contact_at = self
            .last_contact_at
            .as_deref()
            .map(|s| ts(s, "last_contact_at"));
        let converted_at = self.converted_at.as_deref().map(|s| ts(s, "converted_at"));
        let created_at = ts(&self.created_at, "created_at");
        let updated_at = ts(&self.updated_at, "updated_at");

        let tags: Vec<String> = serde_json::from_str(&self.tags_json).unwrap_or_else(|e| {
            warn!(lead_id = %lead_id, error = %e, "tags_json 无效，按空处理");
            Vec::new()
        });
        let custom_fields: BTreeMap<String, String> =
            serde_json::from_str(&self.custom_fields_json).unwrap_or_else(|e| {
                warn!(lead_id = %lead_id, error = %e, "custom_fields_json 无效，按空处理");
                BTreeMap::new()
            });

        Ok(Lead {
            lead_id,
            name: self.name,
            source: self.source,
            score: self.score.clamp(0, 100) as u8,
            stage: self.stage,
            status,
            assigned_agent_id: self.assigned_agent_id,
            assigned_at,
            last_contact_at,
            converted_at,
            created_at,
            updated_at,
            interactions,
            tags,
            custom_fields,
        })
    }
}

fn push_in(clauses: &mut Vec<String>, args: &mut Vec<String>, column: &str, values: Vec<String>) {
    if values.is_empty() {
        return;
    }
    let placeholders = vec!["?"; values.len()].join(", ");
    clauses.push(format!("{} IN ({})", column, placeholders));
    args.extend(values);
}

impl LeadRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 lead_id 查询
    pub fn find_by_id(&self, lead_id: &str) -> RepositoryResult<Option<Lead>> {
        let conn = self.get_conn()?;
        Self::query_lead(&conn, lead_id)
    }

    /// 按过滤条件查询（按 created_at, lead_id 升序）
    ///
    /// 状态值无法识别的行跳过并告警。
    pub fn find(&self, filter: &LeadFilter) -> RepositoryResult<Vec<Lead>> {
        let conn = self.get_conn()?;

        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();
        push_in(
            &mut clauses,
            &mut args,
            "status",
            filter.statuses.iter().map(|s| s.as_str().to_string()).collect(),
        );
        push_in(&mut clauses, &mut args, "stage", filter.stages.clone());
        push_in(&mut clauses, &mut args, "source", filter.sources.clone());
        push_in(
            &mut clauses,
            &mut args,
            "assigned_agent_id",
            filter.assigned_to.clone(),
        );
        if filter.assigned_only {
            clauses.push("assigned_agent_id IS NOT NULL".to_string());
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {} FROM lead {} ORDER BY created_at, lead_id",
            LEAD_COLUMNS, where_sql
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), LeadRow::from_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        let mut leads = Vec::with_capacity(rows.len());
        for row in rows {
            let interactions = Self::query_interactions(&conn, &row.lead_id)?;
            let lead_id = row.lead_id.clone();
            match row.into_lead(interactions) {
                Ok(lead) if filter.accepts(&lead) => leads.push(lead),
                Ok(_) => {}
                Err(reason) => warn!(lead_id = %lead_id, reason = %reason, "线索行无效，已跳过"),
            }
        }
        Ok(leads)
    }

    pub(super) fn query_lead(conn: &Connection, lead_id: &str) -> RepositoryResult<Option<Lead>> {
        let sql = format!("SELECT {} FROM lead WHERE lead_id = ?1", LEAD_COLUMNS);
        let row = conn
            .query_row(&sql, params![lead_id], LeadRow::from_row)
            .optional()?;

        match row {
            Some(row) => {
                let interactions = Self::query_interactions(conn, lead_id)?;
                row.into_lead(interactions)
                    .map(Some)
                    .map_err(RepositoryError::ValidationError)
            }
            None => Ok(None),
        }
    }

    fn query_interactions(conn: &Connection, lead_id: &str) -> RepositoryResult<Vec<Interaction>> {
        let mut stmt = conn.prepare_cached(
            r#"
            SELECT interaction_id, kind, occurred_at, agent_id, description
            FROM lead_interaction
            WHERE lead_id = ?1
            ORDER BY occurred_at, interaction_id
            "#,
        )?;

        let rows = stmt
            .query_map(params![lead_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .map(|(interaction_id, kind, occurred_at, agent_id, description)| {
                let occurred_at = parse_ts(&occurred_at).unwrap_or_else(|| {
                    warn!(lead_id = %lead_id, interaction_id = %interaction_id, "互动时间无法解析");
                    DateTime::<Utc>::MIN_UTC
                });
                Interaction {
                    interaction_id,
                    kind: InteractionKind::from_db_str(&kind),
                    occurred_at,
                    agent_id,
                    description,
                }
            })
            .collect())
    }
}

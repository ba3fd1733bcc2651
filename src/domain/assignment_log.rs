// ==========================================
// 线索分配引擎 - 分配审计日志
// ==========================================
// 红线: 所有提交的分配/重分配必须留痕
// ==========================================

use crate::domain::types::AssignmentAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentLog {
    pub log_id: String,
    pub lead_id: String,
    pub action: AssignmentAction,
    pub from_agent_id: Option<String>,
    pub to_agent_id: String,
    pub rule_id: Option<String>,
    pub actor: String,
    pub logged_at: DateTime<Utc>,
    pub detail: Option<String>,
}

impl AssignmentLog {
    pub fn new(
        lead_id: &str,
        action: AssignmentAction,
        from_agent_id: Option<String>,
        to_agent_id: &str,
        rule_id: Option<String>,
        actor: &str,
        logged_at: DateTime<Utc>,
    ) -> Self {
        Self {
            log_id: Uuid::new_v4().to_string(),
            lead_id: lead_id.to_string(),
            action,
            from_agent_id,
            to_agent_id: to_agent_id.to_string(),
            rule_id,
            actor: actor.to_string(),
            logged_at,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

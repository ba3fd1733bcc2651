// ==========================================
// 线索分配引擎 - 线索实体
// ==========================================
// 职责: 线索主数据、互动记录、部分更新与查询过滤
// 红线: 同一时刻一条线索至多一个 assigned_agent_id
// ==========================================

use crate::domain::types::{InteractionKind, LeadStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 自定义字段中表示专长方向的键
pub const SPECIALTY_FIELD: &str = "specialty";

// ==========================================
// Interaction - 互动记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub interaction_id: String,
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
    /// 执行该互动的顾问（系统触发时为空）
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ==========================================
// Lead - 线索
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub lead_id: String,
    pub name: String,
    pub source: String,
    /// 线索评分 0-100
    pub score: u8,
    pub stage: String,
    pub status: LeadStatus,
    pub assigned_agent_id: Option<String>,
    /// 最近一次分配时间（首次分配或重分配）
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    pub last_contact_at: Option<DateTime<Utc>>,
    /// 转化时间（status = converted 时有效）
    #[serde(default)]
    pub converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
}

impl Lead {
    /// 是否处于活跃（非终态）状态
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// 已分配且处于活跃状态
    pub fn is_assigned_active(&self) -> bool {
        self.assigned_agent_id.is_some() && self.is_active()
    }

    /// 沉默计时起点: 最近联系时间，从未联系则取创建时间
    pub fn contact_reference(&self) -> DateTime<Utc> {
        self.last_contact_at.unwrap_or(self.created_at)
    }

    /// 专长字段（自定义字段 specialty）
    pub fn specialty(&self) -> Option<&str> {
        self.custom_fields
            .get(SPECIALTY_FIELD)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// 转化时间：缺省时回落到 updated_at
    pub fn conversion_time(&self) -> Option<DateTime<Utc>> {
        if self.status != LeadStatus::Converted {
            return None;
        }
        Some(self.converted_at.unwrap_or(self.updated_at))
    }
}

/// 计算 `from` 到 `now` 经过的小时数
///
/// 未来时间（时钟漂移）按 0 处理。
pub fn elapsed_hours(from: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let delta: Duration = now - from;
    (delta.num_seconds().max(0) as f64) / 3600.0
}

// ==========================================
// LeadPatch - 线索部分更新
// ==========================================
/// 对 assigned_agent_id 的部分更新
///
/// `expected_agent_id` 为 Some 时启用乐观并发校验：
/// 仓储中的当前分配必须与其一致，否则提交失败。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadPatch {
    pub assigned_agent_id: Option<Option<String>>,
    pub expected_agent_id: Option<Option<String>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub status: Option<LeadStatus>,
    pub stage: Option<String>,
    pub score: Option<u8>,
}

impl LeadPatch {
    /// 构造一次分配变更（带乐观校验）
    pub fn reassign(
        expected: Option<String>,
        new_agent_id: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            assigned_agent_id: Some(Some(new_agent_id)),
            expected_agent_id: Some(expected),
            assigned_at: Some(at),
            ..Default::default()
        }
    }

    /// 将 patch 应用到内存快照（仓储实现与扫描器共用）
    pub fn apply_to(&self, lead: &mut Lead, now: DateTime<Utc>) {
        if let Some(agent) = &self.assigned_agent_id {
            lead.assigned_agent_id = agent.clone();
        }
        if let Some(at) = self.assigned_at {
            lead.assigned_at = Some(at);
        }
        if let Some(status) = self.status {
            if status == LeadStatus::Converted && lead.converted_at.is_none() {
                lead.converted_at = Some(now);
            }
            lead.status = status;
        }
        if let Some(stage) = &self.stage {
            lead.stage = stage.clone();
        }
        if let Some(score) = self.score {
            lead.score = score.min(100);
        }
        lead.updated_at = now;
    }
}

// ==========================================
// LeadFilter - 线索查询过滤
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadFilter {
    pub statuses: Vec<LeadStatus>,
    pub stages: Vec<String>,
    pub sources: Vec<String>,
    pub assigned_to: Vec<String>,
    pub assigned_only: bool,
    pub active_only: bool,
}

impl LeadFilter {
    /// 全量
    pub fn all() -> Self {
        Self::default()
    }

    /// 已分配的活跃线索（扫描器输入）
    pub fn assigned_active() -> Self {
        Self {
            assigned_only: true,
            active_only: true,
            ..Default::default()
        }
    }

    pub fn accepts(&self, lead: &Lead) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&lead.status) {
            return false;
        }
        if !self.stages.is_empty() && !self.stages.iter().any(|s| s == &lead.stage) {
            return false;
        }
        if !self.sources.is_empty() && !self.sources.iter().any(|s| s == &lead.source) {
            return false;
        }
        if !self.assigned_to.is_empty() {
            match &lead.assigned_agent_id {
                Some(agent) if self.assigned_to.contains(agent) => {}
                _ => return false,
            }
        }
        if self.assigned_only && lead.assigned_agent_id.is_none() {
            return false;
        }
        if self.active_only && !lead.is_active() {
            return false;
        }
        true
    }
}

// ==========================================
// 线索分配引擎 - 顾问负载快照
// ==========================================
// 红线: 派生数据, 不落库; 每次编排/扫描都从线索集合重新计算
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 单个顾问的负载快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentLoad {
    pub agent_id: String,
    /// 非终态线索数
    pub active_lead_count: u32,
    /// 超过待回复阈值仍未联系的线索数
    pub pending_response_count: u32,
    /// 本统计周期内转化数
    pub converted_this_period: u32,
    /// 平均响应时长（小时），无响应事件时为 0
    pub avg_response_hours: f64,
}

impl AgentLoad {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Default::default()
        }
    }

    /// 转化效率: converted / max(active, 1)
    pub fn conversion_ratio(&self) -> f64 {
        self.converted_this_period as f64 / self.active_lead_count.max(1) as f64
    }
}

/// agent_id → 负载快照
pub type LoadSnapshot = HashMap<String, AgentLoad>;

// ==========================================
// 线索分配引擎 - 引擎层存储接口
// ==========================================
// 职责: 定义引擎/宿主所需的线索存储、规则存储、游标存储接口
// 说明: Engine 层定义 trait，Repository 层实现（依赖倒置）
// 红线: 评估顺序由编排器负责，规则存储不保证顺序
// ==========================================

use crate::domain::assignment_log::AssignmentLog;
use crate::domain::lead::{Lead, LeadFilter, LeadPatch};
use crate::domain::rule::{AssignmentRule, RuleFilter};
use crate::engine::rotation::RotationCursors;
use crate::repository::error::RepositoryResult;
use std::sync::Arc;

/// 线索存储（当前分配状态的唯一可信来源）
pub trait LeadStore: Send + Sync {
    /// 按条件查询线索快照
    fn fetch_leads(&self, filter: &LeadFilter) -> RepositoryResult<Vec<Lead>>;

    /// 部分更新线索
    ///
    /// # 错误
    /// - `NotFound`: lead_id 不存在
    /// - `AssignmentConflict`: patch.expected_agent_id 与当前分配不一致
    fn update_lead(&self, lead_id: &str, patch: &LeadPatch) -> RepositoryResult<Lead>;
}

/// 规则存储（仅 CRUD）
pub trait RuleStore: Send + Sync {
    fn list_rules(&self, filter: &RuleFilter) -> RepositoryResult<Vec<AssignmentRule>>;

    /// 按 ID 查询单条规则
    ///
    /// # 错误
    /// - `ValidationError`: 规则存在但配置无法解析
    fn find_rule(&self, rule_id: &str) -> RepositoryResult<Option<AssignmentRule>>;

    fn create_rule(&self, rule: &AssignmentRule) -> RepositoryResult<()>;

    /// # 错误
    /// - `NotFound`: rule_id 不存在
    fn update_rule(&self, rule: &AssignmentRule) -> RepositoryResult<()>;

    /// # 错误
    /// - `NotFound`: rule_id 不存在
    fn delete_rule(&self, rule_id: &str) -> RepositoryResult<()>;
}

/// 轮转游标存储
pub trait RotationCursorStore: Send + Sync {
    fn load_cursors(&self) -> RepositoryResult<RotationCursors>;

    fn save_cursors(&self, cursors: &RotationCursors) -> RepositoryResult<()>;
}

/// 分配审计日志存储
pub trait AssignmentLogStore: Send + Sync {
    fn append(&self, log: &AssignmentLog) -> RepositoryResult<()>;
}

// ==========================================
// RoutingRepositories - 存储聚合
// ==========================================
/// 路由宿主所需的全部存储，简化依赖注入
#[derive(Clone)]
pub struct RoutingRepositories {
    pub lead_store: Arc<dyn LeadStore>,
    pub rule_store: Arc<dyn RuleStore>,
    pub cursor_store: Arc<dyn RotationCursorStore>,
    pub log_store: Arc<dyn AssignmentLogStore>,
}

impl RoutingRepositories {
    pub fn new(
        lead_store: Arc<dyn LeadStore>,
        rule_store: Arc<dyn RuleStore>,
        cursor_store: Arc<dyn RotationCursorStore>,
        log_store: Arc<dyn AssignmentLogStore>,
    ) -> Self {
        Self {
            lead_store,
            rule_store,
            cursor_store,
            log_store,
        }
    }
}

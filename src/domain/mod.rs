// ==========================================
// 线索分配引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod agent_load;
pub mod assignment_log;
pub mod lead;
pub mod rule;
pub mod types;

// 重导出核心类型
pub use agent_load::{AgentLoad, LoadSnapshot};
pub use assignment_log::AssignmentLog;
pub use lead::{elapsed_hours, Interaction, Lead, LeadFilter, LeadPatch, SPECIALTY_FIELD};
pub use rule::{
    AssignmentRule, LoadConfig, ReassignmentPolicy, RotationConfig, RuleConditions, RuleFilter,
    RuleStrategy, ScoreConfig, SourceConfig, SpecialtyConfig,
};
pub use types::{AssignmentAction, InteractionKind, LeadStatus, RuleType};

// ==========================================
// 线索分配引擎 - 核心库
// ==========================================
// 职责: 销售线索的规则驱动分配与超时重分配
// 技术栈: Rust + SQLite
// 分层: domain → engine → repository / config → api
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分配规则
pub mod engine;

// 配置层 - 路由参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 宿主门面
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AssignmentAction, InteractionKind, LeadStatus, RuleType};

// 领域实体
pub use domain::{
    AgentLoad, AssignmentLog, AssignmentRule, Interaction, Lead, LeadFilter, LeadPatch,
    LoadSnapshot, ReassignmentPolicy, RuleConditions, RuleFilter, RuleStrategy,
};

// 引擎
pub use engine::{
    AssignmentDecision, AssignmentOrchestrator, LoadAggregator, ReassignmentSweeper,
    RotationCursors, RoutingError, RuleMatcher, StrategyResolver, SweepReport,
};

// 配置
pub use config::{ConfigManager, RoutingConfig};

// API
pub use api::{ApiError, ApiResult, RoutingApi};

// ==========================================
// 版本信息
// ==========================================
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

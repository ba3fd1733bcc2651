// ==========================================
// 线索分配引擎 - 引擎层
// ==========================================
// 职责: 负载聚合、规则匹配、策略选择、分配编排、超时重分配
// 红线: Engine 不拼 SQL，不直接做 I/O；提交通过存储 trait 完成
// ==========================================

pub mod error;
pub mod events;
pub mod load_aggregator;
pub mod orchestrator;
pub mod repositories;
pub mod rotation;
pub mod rule_matcher;
pub mod strategy;
pub mod sweeper;

// 重导出核心引擎
pub use error::{RoutingError, RoutingResult};
pub use events::{
    AssignmentEvent, AssignmentEventPublisher, AssignmentEventType, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use load_aggregator::{compute_loads, LoadAggregator};
pub use orchestrator::{
    compare_rules, ordered_enabled_rules, AssignmentDecision, AssignmentOrchestrator,
};
pub use repositories::{
    AssignmentLogStore, LeadStore, RotationCursorStore, RoutingRepositories, RuleStore,
};
pub use rotation::RotationCursors;
pub use rule_matcher::{conditions_match, RuleMatcher};
pub use strategy::{AgentSelector, SelectionContext, StrategyResolver};
pub use sweeper::{Reassignment, ReassignmentSweeper, SweepReport};

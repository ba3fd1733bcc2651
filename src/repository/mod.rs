// ==========================================
// 线索分配引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供引擎存储 trait 的默认实现,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod assignment_log_repo;
pub mod error;
pub mod lead_repo;
pub mod memory_lead_repo;
pub mod rotation_cursor_repo;
pub mod rule_repo;

// 重导出核心仓储
pub use assignment_log_repo::AssignmentLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use lead_repo::LeadRepository;
pub use memory_lead_repo::InMemoryLeadRepository;
pub use rotation_cursor_repo::RotationCursorRepository;
pub use rule_repo::RuleRepository;

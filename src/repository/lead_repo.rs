// ==========================================
// 线索分配引擎 - 线索数据仓储
// ==========================================
// 职责: lead / lead_interaction 表的读写，实现 LeadStore
// 红线: 分配变更必须带乐观校验（expected_agent_id）
// 红线: Repository 不含业务逻辑
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::LeadRepository;

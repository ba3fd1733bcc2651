// ==========================================
// 线索分配引擎 - 配置层
// ==========================================
// 职责: 路由参数管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod config_reader;
pub mod routing_config;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use config_reader::RoutingConfigReader;
pub use routing_config::{
    RoutingConfig, DEFAULT_CONVERSION_PERIOD_DAYS, DEFAULT_PENDING_RESPONSE_HOURS,
    DEFAULT_SCORE_THRESHOLD,
};

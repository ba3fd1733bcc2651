// ==========================================
// 线索分配引擎 - 配置读取 Trait
// ==========================================
// 职责: 定义路由引擎所需的配置读取接口（不包含实现）
// 实现者: ConfigManager（config_kv 表）、RoutingConfig（固定配置）
// ==========================================

use crate::config::routing_config::RoutingConfig;
use crate::repository::error::RepositoryResult;

pub trait RoutingConfigReader: Send + Sync {
    /// 读取当前生效的路由配置
    ///
    /// 缺失或格式错误的配置项回落到默认值
    fn load_routing_config(&self) -> RepositoryResult<RoutingConfig>;
}

impl RoutingConfigReader for RoutingConfig {
    fn load_routing_config(&self) -> RepositoryResult<RoutingConfig> {
        Ok(self.clone())
    }
}

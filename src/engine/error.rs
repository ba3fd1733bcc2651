// ==========================================
// 线索分配引擎 - 引擎层错误类型
// ==========================================
// 分类:
// - Configuration: 规则配置与声明类型不符，跳过该规则并记录日志
// - NotFound: 更新目标不存在，同步抛给调用方
// - Repository: 存储层故障，原样上抛
// 说明: 无候选人不是错误，由 Ok(None) 表达
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("规则配置错误: rule_id={rule_id}, reason={reason}")]
    Configuration { rule_id: String, reason: String },

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error(transparent)]
    Repository(RepositoryError),
}

impl RoutingError {
    pub fn configuration(rule_id: &str, reason: impl Into<String>) -> Self {
        RoutingError::Configuration {
            rule_id: rule_id.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<RepositoryError> for RoutingError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => RoutingError::NotFound { entity, id },
            other => RoutingError::Repository(other),
        }
    }
}

pub type RoutingResult<T> = Result<T, RoutingError>;

// ==========================================
// 线索分配引擎 - API 层
// ==========================================
// 职责: 宿主门面，编排仓储与引擎
// 说明: 仅库接口，不含传输层
// ==========================================

pub mod error;
pub mod routing_api;

pub use error::{ApiError, ApiResult};
pub use routing_api::{RoutingApi, ACTOR_ROUTER, ACTOR_SWEEPER};

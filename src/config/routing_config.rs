// ==========================================
// 线索分配引擎 - 路由配置
// ==========================================
// 存储: config_kv 表 (scope_id='global')
// 缺省值见 Default 实现
// ==========================================

use serde::{Deserialize, Serialize};

/// 默认 by_score 阈值
pub const DEFAULT_SCORE_THRESHOLD: u8 = 75;

/// 默认待回复阈值（小时）
pub const DEFAULT_PENDING_RESPONSE_HOURS: u32 = 24;

/// 默认转化统计周期（天，滚动窗口）
pub const DEFAULT_CONVERSION_PERIOD_DAYS: u32 = 30;

/// 路由引擎运行参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// 负载快照中 pending_response_count 的判定阈值（小时）
    #[serde(default = "default_pending_response_hours")]
    pub pending_response_hours: u32,

    /// converted_this_period 的统计窗口（天，截至当前时刻）
    #[serde(default = "default_conversion_period_days")]
    pub conversion_period_days: u32,

    /// by_score 规则未配置阈值时使用的默认阈值
    #[serde(default = "default_score_threshold")]
    pub default_score_threshold: u8,

    /// 平均响应时长是否统计来电/短信回复
    #[serde(default)]
    pub count_call_and_sms_as_response: bool,

    /// 沉默计时是否从最近一次分配重新开始
    #[serde(default = "default_true")]
    pub reset_sla_on_assignment: bool,
}

fn default_pending_response_hours() -> u32 {
    DEFAULT_PENDING_RESPONSE_HOURS
}

fn default_conversion_period_days() -> u32 {
    DEFAULT_CONVERSION_PERIOD_DAYS
}

fn default_score_threshold() -> u8 {
    DEFAULT_SCORE_THRESHOLD
}

fn default_true() -> bool {
    true
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            pending_response_hours: DEFAULT_PENDING_RESPONSE_HOURS,
            conversion_period_days: DEFAULT_CONVERSION_PERIOD_DAYS,
            default_score_threshold: DEFAULT_SCORE_THRESHOLD,
            count_call_and_sms_as_response: false,
            reset_sla_on_assignment: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: RoutingConfig = serde_json::from_str(r#"{"default_score_threshold": 60}"#).unwrap();
        assert_eq!(cfg.default_score_threshold, 60);
        assert_eq!(cfg.pending_response_hours, 24);
        assert!(cfg.reset_sla_on_assignment);
        assert!(!cfg.count_call_and_sms_as_response);
    }
}

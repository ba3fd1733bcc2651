// ==========================================
// 线索分配引擎 - 分配规则实体
// ==========================================
// 职责: 规则定义、匹配条件、策略配置、重分配策略
// 红线: 策略配置的结构只由规则类型决定（不读取跨类型字段）
// ==========================================

use crate::domain::types::RuleType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// RuleConditions - 匹配条件（逐项可选，AND 关系）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConditions {
    /// 来源白名单
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    /// 评分下限（含）
    #[serde(default)]
    pub min_score: Option<u8>,
    /// 评分上限（含）
    #[serde(default)]
    pub max_score: Option<u8>,
    /// 阶段白名单
    #[serde(default)]
    pub stages: Option<Vec<String>>,
}

impl RuleConditions {
    pub fn is_unconstrained(&self) -> bool {
        self.sources.is_none()
            && self.min_score.is_none()
            && self.max_score.is_none()
            && self.stages.is_none()
    }
}

// ==========================================
// 策略配置（每种规则类型一种结构）
// ==========================================

/// 轮转分配
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotationConfig {
    pub agent_ids: Vec<String>,
}

/// 按负载分配
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadConfig {
    pub agent_ids: Vec<String>,
}

/// 按评分分配
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreConfig {
    pub agent_ids: Vec<String>,
    /// 评分阈值（缺省取 RoutingConfig.default_score_threshold）
    #[serde(default)]
    pub min_score: Option<u8>,
}

/// 按来源分配: 来源 → 顾问列表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub source_agents: BTreeMap<String, Vec<String>>,
}

/// 按专长分配: 专长 → 顾问列表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecialtyConfig {
    pub specialty_agents: BTreeMap<String, Vec<String>>,
}

impl SpecialtyConfig {
    /// 按专长名查找顾问列表（忽略大小写与首尾空白）
    pub fn agents_for(&self, specialty: &str) -> Option<(&str, &[String])> {
        let needle = specialty.trim().to_lowercase();
        self.specialty_agents
            .iter()
            .find(|(k, _)| k.trim().to_lowercase() == needle)
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

// ==========================================
// RuleStrategy - 规则策略（封闭标签联合）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum RuleStrategy {
    Rotation(RotationConfig),
    BySpecialty(SpecialtyConfig),
    ByLoad(LoadConfig),
    ByScore(ScoreConfig),
    BySource(SourceConfig),
    Manual,
}

impl RuleStrategy {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleStrategy::Rotation(_) => RuleType::Rotation,
            RuleStrategy::BySpecialty(_) => RuleType::BySpecialty,
            RuleStrategy::ByLoad(_) => RuleType::ByLoad,
            RuleStrategy::ByScore(_) => RuleType::ByScore,
            RuleStrategy::BySource(_) => RuleType::BySource,
            RuleStrategy::Manual => RuleType::Manual,
        }
    }

    /// 由持久化的 (类型, 配置JSON) 还原策略
    ///
    /// # 错误
    /// - 未知类型
    /// - 配置结构与声明类型不符
    pub fn from_parts(rule_type: &str, config_json: Option<&str>) -> Result<Self, String> {
        let rule_type: RuleType = rule_type.parse()?;
        let raw = config_json.map(str::trim).filter(|s| !s.is_empty());

        fn parse<T: serde::de::DeserializeOwned>(
            rule_type: RuleType,
            raw: Option<&str>,
        ) -> Result<T, String> {
            let raw = raw.ok_or_else(|| format!("规则类型 {} 缺少策略配置", rule_type))?;
            serde_json::from_str(raw)
                .map_err(|e| format!("规则类型 {} 的策略配置无效: {}", rule_type, e))
        }

        Ok(match rule_type {
            RuleType::Rotation => RuleStrategy::Rotation(parse(rule_type, raw)?),
            RuleType::BySpecialty => RuleStrategy::BySpecialty(parse(rule_type, raw)?),
            RuleType::ByLoad => RuleStrategy::ByLoad(parse(rule_type, raw)?),
            RuleType::ByScore => RuleStrategy::ByScore(parse(rule_type, raw)?),
            RuleType::BySource => RuleStrategy::BySource(parse(rule_type, raw)?),
            RuleType::Manual => RuleStrategy::Manual,
        })
    }

    /// 拆分为 (类型, 配置JSON) 用于持久化
    pub fn to_parts(&self) -> Result<(RuleType, Option<String>), serde_json::Error> {
        let json = match self {
            RuleStrategy::Rotation(c) => Some(serde_json::to_string(c)?),
            RuleStrategy::BySpecialty(c) => Some(serde_json::to_string(c)?),
            RuleStrategy::ByLoad(c) => Some(serde_json::to_string(c)?),
            RuleStrategy::ByScore(c) => Some(serde_json::to_string(c)?),
            RuleStrategy::BySource(c) => Some(serde_json::to_string(c)?),
            RuleStrategy::Manual => None,
        };
        Ok((self.rule_type(), json))
    }

    /// 该策略可能返回的全部顾问（去重，保持配置顺序）
    pub fn configured_agents(&self) -> Vec<&str> {
        let lists: Vec<&Vec<String>> = match self {
            RuleStrategy::Rotation(c) => vec![&c.agent_ids],
            RuleStrategy::ByLoad(c) => vec![&c.agent_ids],
            RuleStrategy::ByScore(c) => vec![&c.agent_ids],
            RuleStrategy::BySource(c) => c.source_agents.values().collect(),
            RuleStrategy::BySpecialty(c) => c.specialty_agents.values().collect(),
            RuleStrategy::Manual => Vec::new(),
        };

        let mut out: Vec<&str> = Vec::new();
        for id in lists.into_iter().flatten() {
            if !out.contains(&id.as_str()) {
                out.push(id.as_str());
            }
        }
        out
    }
}

// ==========================================
// ReassignmentPolicy - 超时重分配策略
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReassignmentPolicy {
    pub enabled: bool,
    pub no_response_hours: u32,
}

impl Default for ReassignmentPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            no_response_hours: 24,
        }
    }
}

// ==========================================
// AssignmentRule - 分配规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRule {
    pub rule_id: String,
    pub name: String,
    /// 优先级（降序评估，同级按 rule_id 升序）
    pub priority: i32,
    pub enabled: bool,
    #[serde(default)]
    pub conditions: RuleConditions,
    #[serde(flatten)]
    pub strategy: RuleStrategy,
    #[serde(default)]
    pub reassignment: ReassignmentPolicy,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AssignmentRule {
    pub fn rule_type(&self) -> RuleType {
        self.strategy.rule_type()
    }

    /// 是否参与超时重分配
    pub fn reassignment_enabled(&self) -> bool {
        self.enabled && self.reassignment.enabled
    }

    /// 写入前校验（不校验顾问列表是否为空：空列表在评估期按配置错误跳过）
    pub fn validate(&self) -> Result<(), String> {
        if self.rule_id.trim().is_empty() {
            return Err("rule_id 不能为空".to_string());
        }
        if self.name.trim().is_empty() {
            return Err(format!("规则 {} 的名称不能为空", self.rule_id));
        }
        let c = &self.conditions;
        for (field, v) in [("min_score", c.min_score), ("max_score", c.max_score)] {
            if let Some(v) = v {
                if v > 100 {
                    return Err(format!("{} 超出 0-100 范围: {}", field, v));
                }
            }
        }
        if let (Some(min), Some(max)) = (c.min_score, c.max_score) {
            if min > max {
                return Err(format!("评分区间无效: min={} > max={}", min, max));
            }
        }
        if let RuleStrategy::ByScore(cfg) = &self.strategy {
            if matches!(cfg.min_score, Some(t) if t > 100) {
                return Err("by_score 阈值超出 0-100 范围".to_string());
            }
        }
        if self.reassignment.enabled && self.reassignment.no_response_hours == 0 {
            return Err("no_response_hours 必须大于 0".to_string());
        }
        Ok(())
    }
}

// ==========================================
// RuleFilter - 规则查询过滤
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleFilter {
    pub enabled_only: bool,
    pub reassignment_only: bool,
    pub rule_types: Vec<RuleType>,
}

impl RuleFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn enabled() -> Self {
        Self {
            enabled_only: true,
            ..Default::default()
        }
    }

    pub fn accepts(&self, rule: &AssignmentRule) -> bool {
        if self.enabled_only && !rule.enabled {
            return false;
        }
        if self.reassignment_only && !rule.reassignment.enabled {
            return false;
        }
        if !self.rule_types.is_empty() && !self.rule_types.contains(&rule.rule_type()) {
            return false;
        }
        true
    }
}

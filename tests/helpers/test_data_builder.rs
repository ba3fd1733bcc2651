// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use lead_routing::domain::lead::{Interaction, Lead};
use lead_routing::domain::rule::{
    AssignmentRule, LoadConfig, ReassignmentPolicy, RotationConfig, RuleConditions, RuleStrategy,
    ScoreConfig, SourceConfig, SpecialtyConfig,
};
use lead_routing::domain::types::{InteractionKind, LeadStatus};
use std::collections::BTreeMap;

/// 测试基准时刻
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

pub fn ids(agents: &[&str]) -> Vec<String> {
    agents.iter().map(|s| s.to_string()).collect()
}

// ==========================================
// Lead 构建器
// ==========================================

pub struct LeadBuilder {
    lead: Lead,
}

impl LeadBuilder {
    /// 默认: 来源 web，评分 50，阶段 captacion，状态 new，创建于 t0
    pub fn new(lead_id: &str) -> Self {
        Self {
            lead: Lead {
                lead_id: lead_id.to_string(),
                name: format!("Lead {}", lead_id),
                source: "web".to_string(),
                score: 50,
                stage: "captacion".to_string(),
                status: LeadStatus::New,
                assigned_agent_id: None,
                assigned_at: None,
                last_contact_at: None,
                converted_at: None,
                created_at: t0(),
                updated_at: t0(),
                interactions: Vec::new(),
                tags: Vec::new(),
                custom_fields: BTreeMap::new(),
            },
        }
    }

    pub fn source(mut self, source: &str) -> Self {
        self.lead.source = source.to_string();
        self
    }

    pub fn score(mut self, score: u8) -> Self {
        self.lead.score = score;
        self
    }

    pub fn stage(mut self, stage: &str) -> Self {
        self.lead.stage = stage.to_string();
        self
    }

    pub fn status(mut self, status: LeadStatus) -> Self {
        self.lead.status = status;
        self
    }

    /// 分配给顾问（分配时间 = 创建时间）
    pub fn assigned_to(mut self, agent_id: &str) -> Self {
        self.lead.assigned_agent_id = Some(agent_id.to_string());
        self.lead.assigned_at = Some(self.lead.created_at);
        self
    }

    pub fn assigned_at(mut self, at: DateTime<Utc>) -> Self {
        self.lead.assigned_at = Some(at);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.lead.created_at = at;
        self.lead.updated_at = at;
        self
    }

    /// 创建于 now 之前 hours 小时
    pub fn created_hours_before(self, now: DateTime<Utc>, hours: i64) -> Self {
        self.created_at(now - Duration::hours(hours))
    }

    pub fn last_contact_at(mut self, at: DateTime<Utc>) -> Self {
        self.lead.last_contact_at = Some(at);
        self
    }

    pub fn converted_at(mut self, at: DateTime<Utc>) -> Self {
        self.lead.status = LeadStatus::Converted;
        self.lead.converted_at = Some(at);
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.lead.tags.push(tag.to_string());
        self
    }

    pub fn specialty(mut self, specialty: &str) -> Self {
        self.lead
            .custom_fields
            .insert("specialty".to_string(), specialty.to_string());
        self
    }

    pub fn interaction(mut self, kind: InteractionKind, at: DateTime<Utc>, agent: Option<&str>) -> Self {
        let n = self.lead.interactions.len() + 1;
        self.lead.interactions.push(Interaction {
            interaction_id: format!("{}-i{}", self.lead.lead_id, n),
            kind,
            occurred_at: at,
            agent_id: agent.map(str::to_string),
            description: None,
        });
        self
    }

    pub fn build(self) -> Lead {
        self.lead
    }
}

// ==========================================
// AssignmentRule 构建器
// ==========================================

pub struct RuleBuilder {
    rule: AssignmentRule,
}

impl RuleBuilder {
    fn with_strategy(rule_id: &str, strategy: RuleStrategy) -> Self {
        Self {
            rule: AssignmentRule {
                rule_id: rule_id.to_string(),
                name: rule_id.to_string(),
                priority: 0,
                enabled: true,
                conditions: RuleConditions::default(),
                strategy,
                reassignment: ReassignmentPolicy::default(),
                created_at: None,
                updated_at: None,
            },
        }
    }

    pub fn rotation(rule_id: &str, agents: &[&str]) -> Self {
        Self::with_strategy(
            rule_id,
            RuleStrategy::Rotation(RotationConfig {
                agent_ids: ids(agents),
            }),
        )
    }

    pub fn by_load(rule_id: &str, agents: &[&str]) -> Self {
        Self::with_strategy(
            rule_id,
            RuleStrategy::ByLoad(LoadConfig {
                agent_ids: ids(agents),
            }),
        )
    }

    pub fn by_score(rule_id: &str, threshold: Option<u8>, agents: &[&str]) -> Self {
        Self::with_strategy(
            rule_id,
            RuleStrategy::ByScore(ScoreConfig {
                agent_ids: ids(agents),
                min_score: threshold,
            }),
        )
    }

    pub fn by_source(rule_id: &str, mapping: &[(&str, &[&str])]) -> Self {
        let source_agents = mapping
            .iter()
            .map(|(source, agents)| (source.to_string(), ids(agents)))
            .collect();
        Self::with_strategy(rule_id, RuleStrategy::BySource(SourceConfig { source_agents }))
    }

    pub fn by_specialty(rule_id: &str, mapping: &[(&str, &[&str])]) -> Self {
        let specialty_agents = mapping
            .iter()
            .map(|(specialty, agents)| (specialty.to_string(), ids(agents)))
            .collect();
        Self::with_strategy(
            rule_id,
            RuleStrategy::BySpecialty(SpecialtyConfig { specialty_agents }),
        )
    }

    pub fn manual(rule_id: &str) -> Self {
        Self::with_strategy(rule_id, RuleStrategy::Manual)
    }

    pub fn name(mut self, name: &str) -> Self {
        self.rule.name = name.to_string();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.rule.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.rule.enabled = false;
        self
    }

    pub fn sources(mut self, sources: &[&str]) -> Self {
        self.rule.conditions.sources = Some(ids(sources));
        self
    }

    pub fn stages(mut self, stages: &[&str]) -> Self {
        self.rule.conditions.stages = Some(ids(stages));
        self
    }

    pub fn score_range(mut self, min: Option<u8>, max: Option<u8>) -> Self {
        self.rule.conditions.min_score = min;
        self.rule.conditions.max_score = max;
        self
    }

    pub fn reassign_after(mut self, hours: u32) -> Self {
        self.rule.reassignment = ReassignmentPolicy {
            enabled: true,
            no_response_hours: hours,
        };
        self
    }

    pub fn build(self) -> AssignmentRule {
        self.rule
    }
}

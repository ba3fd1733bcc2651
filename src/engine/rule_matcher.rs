// ==========================================
// 线索分配引擎 - 规则匹配器
// ==========================================
// 规则: 来源白名单 AND 评分区间(含端点) AND 阶段白名单
// 未配置的条件视为不限制; 无条件的规则匹配所有线索
// ==========================================

use crate::domain::lead::Lead;
use crate::domain::rule::{AssignmentRule, RuleConditions};

/// RuleMatcher - 无状态规则匹配器
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleMatcher;

impl RuleMatcher {
    pub fn new() -> Self {
        Self
    }

    /// 判断规则条件是否适用于线索
    pub fn matches(&self, rule: &AssignmentRule, lead: &Lead) -> bool {
        conditions_match(&rule.conditions, lead)
    }
}

/// 条件匹配（纯函数）
pub fn conditions_match(conditions: &RuleConditions, lead: &Lead) -> bool {
    if let Some(sources) = &conditions.sources {
        if !sources.iter().any(|s| s == &lead.source) {
            return false;
        }
    }

    if let Some(min) = conditions.min_score {
        if lead.score < min {
            return false;
        }
    }

    if let Some(max) = conditions.max_score {
        if lead.score > max {
            return false;
        }
    }

    if let Some(stages) = &conditions.stages {
        if !stages.iter().any(|s| s == &lead.stage) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::LeadStatus;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn lead(source: &str, score: u8, stage: &str) -> Lead {
        let now = Utc::now();
        Lead {
            lead_id: "L1".to_string(),
            name: "n".to_string(),
            source: source.to_string(),
            score,
            stage: stage.to_string(),
            status: LeadStatus::New,
            assigned_agent_id: None,
            assigned_at: None,
            last_contact_at: None,
            converted_at: None,
            created_at: now,
            updated_at: now,
            interactions: vec![],
            tags: vec![],
            custom_fields: BTreeMap::new(),
        }
    }

    #[test]
    fn test_empty_conditions_match_everything() {
        let c = RuleConditions::default();
        assert!(conditions_match(&c, &lead("x", 0, "y")));
        assert!(conditions_match(&c, &lead("facebook", 100, "cierre")));
    }

    #[test]
    fn test_score_range_inclusive() {
        let c = RuleConditions {
            min_score: Some(40),
            max_score: Some(60),
            ..Default::default()
        };
        assert!(conditions_match(&c, &lead("x", 40, "y")));
        assert!(conditions_match(&c, &lead("x", 60, "y")));
        assert!(!conditions_match(&c, &lead("x", 39, "y")));
        assert!(!conditions_match(&c, &lead("x", 61, "y")));
    }

    #[test]
    fn test_all_conditions_are_conjunctive() {
        let c = RuleConditions {
            sources: Some(vec!["instagram".to_string(), "tiktok".to_string()]),
            min_score: Some(50),
            max_score: None,
            stages: Some(vec!["interes".to_string()]),
        };
        assert!(conditions_match(&c, &lead("tiktok", 70, "interes")));
        assert!(!conditions_match(&c, &lead("facebook", 70, "interes")));
        assert!(!conditions_match(&c, &lead("tiktok", 20, "interes")));
        assert!(!conditions_match(&c, &lead("tiktok", 70, "cierre")));
    }

    #[test]
    fn test_empty_allow_list_rejects() {
        let c = RuleConditions {
            sources: Some(vec![]),
            ..Default::default()
        };
        assert!(!conditions_match(&c, &lead("instagram", 50, "interes")));
    }
}

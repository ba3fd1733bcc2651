// ==========================================
// 线索分配引擎 - 分配编排器
// ==========================================
// 流程: 过滤启用规则 → 优先级降序(同级按 rule_id 升序) → 逐条匹配
//       → 首个产出候选的规则即终止（低优先级规则不再评估）
// 红线: 不修改线索，持久化由调用方负责
// ==========================================

use crate::config::RoutingConfig;
use crate::domain::agent_load::LoadSnapshot;
use crate::domain::lead::Lead;
use crate::domain::rule::AssignmentRule;
use crate::engine::rotation::RotationCursors;
use crate::engine::rule_matcher::RuleMatcher;
use crate::engine::strategy::StrategyResolver;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

// ==========================================
// AssignmentDecision - 分配结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentDecision {
    pub agent_id: String,
    pub rule_id: String,
    pub rule_name: String,
}

/// 规则评估顺序: priority 降序，同级按 rule_id 升序
pub fn compare_rules(a: &AssignmentRule, b: &AssignmentRule) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.rule_id.cmp(&b.rule_id))
}

/// 过滤启用规则并按评估顺序排列
pub fn ordered_enabled_rules(rules: &[AssignmentRule]) -> Vec<&AssignmentRule> {
    let mut ordered: Vec<&AssignmentRule> = rules.iter().filter(|r| r.enabled).collect();
    ordered.sort_by(|a, b| compare_rules(a, b));
    ordered
}

// ==========================================
// AssignmentOrchestrator - 分配编排器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct AssignmentOrchestrator {
    matcher: RuleMatcher,
    resolver: StrategyResolver,
}

impl AssignmentOrchestrator {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            matcher: RuleMatcher::new(),
            resolver: StrategyResolver::new(config.default_score_threshold),
        }
    }

    /// 为线索选出负责人
    ///
    /// # 返回
    /// - Some(decision): 首个匹配且产出候选的规则给出的结果
    /// - None: 无规则产出候选（待人工分配）
    pub fn assign(
        &self,
        lead: &Lead,
        rules: &[AssignmentRule],
        loads: &LoadSnapshot,
        cursors: &mut RotationCursors,
    ) -> Option<AssignmentDecision> {
        let ordered = ordered_enabled_rules(rules);
        self.assign_ordered(lead, &ordered, loads, cursors)
    }

    /// 仅返回顾问 id 的便捷版本
    pub fn assign_agent(
        &self,
        lead: &Lead,
        rules: &[AssignmentRule],
        loads: &LoadSnapshot,
        cursors: &mut RotationCursors,
    ) -> Option<String> {
        self.assign(lead, rules, loads, cursors).map(|d| d.agent_id)
    }

    /// 按给定顺序评估（调用方已完成过滤与排序）
    pub fn assign_ordered(
        &self,
        lead: &Lead,
        ordered_rules: &[&AssignmentRule],
        loads: &LoadSnapshot,
        cursors: &mut RotationCursors,
    ) -> Option<AssignmentDecision> {
        for rule in ordered_rules {
            if !self.matcher.matches(rule, lead) {
                debug!(
                    lead_id = %lead.lead_id,
                    rule_id = %rule.rule_id,
                    "规则条件不匹配"
                );
                continue;
            }

            if let Some(agent_id) = self.resolver.resolve(rule, lead, loads, cursors) {
                info!(
                    lead_id = %lead.lead_id,
                    rule_id = %rule.rule_id,
                    rule_type = %rule.rule_type(),
                    agent_id = %agent_id,
                    "规则产出候选顾问"
                );
                return Some(AssignmentDecision {
                    agent_id,
                    rule_id: rule.rule_id.clone(),
                    rule_name: rule.name.clone(),
                });
            }

            debug!(
                lead_id = %lead.lead_id,
                rule_id = %rule.rule_id,
                "规则匹配但无候选，继续下一条"
            );
        }

        debug!(lead_id = %lead.lead_id, "无规则产出候选，待人工分配");
        None
    }
}

// ==========================================
// 线索分配引擎 - 策略解析器
// ==========================================
// 职责: 规则命中后，按规则类型选出候选顾问
// 结构: 每种策略配置实现 AgentSelector；RuleStrategy 负责分派
// 红线: 只能返回规则自身配置中的顾问，不得凭空构造
// 说明: 前置条件不满足 → Ok(None)（规则不适用，非错误）
//       配置不完整 → RoutingError::Configuration（调用方记录后视为无候选）
// ==========================================

use crate::config::DEFAULT_SCORE_THRESHOLD;
use crate::domain::agent_load::LoadSnapshot;
use crate::domain::lead::Lead;
use crate::domain::rule::{
    AssignmentRule, LoadConfig, RotationConfig, RuleStrategy, ScoreConfig, SourceConfig,
    SpecialtyConfig,
};
use crate::engine::error::{RoutingError, RoutingResult};
use crate::engine::rotation::RotationCursors;
use tracing::{debug, warn};

// ==========================================
// SelectionContext - 单次选择的输入
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub rule_id: &'a str,
    pub lead: &'a Lead,
    pub loads: &'a LoadSnapshot,
    pub default_score_threshold: u8,
}

impl<'a> SelectionContext<'a> {
    fn active_count(&self, agent_id: &str) -> u32 {
        self.loads
            .get(agent_id)
            .map(|l| l.active_lead_count)
            .unwrap_or(0)
    }

    fn conversion_ratio(&self, agent_id: &str) -> f64 {
        self.loads
            .get(agent_id)
            .map(|l| l.conversion_ratio())
            .unwrap_or(0.0)
    }
}

// ==========================================
// AgentSelector - 策略能力
// ==========================================
pub trait AgentSelector {
    /// 选出候选顾问
    ///
    /// # 返回
    /// - Ok(Some(agent_id)): 选中
    /// - Ok(None): 规则不适用
    /// - Err(Configuration): 配置不完整
    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        cursors: &mut RotationCursors,
    ) -> RoutingResult<Option<String>>;
}

/// 校验顾问列表（非空、无空白 id）
fn require_agents(rule_id: &str, agent_ids: &[String]) -> RoutingResult<()> {
    if agent_ids.is_empty() {
        return Err(RoutingError::configuration(rule_id, "顾问列表为空"));
    }
    if agent_ids.iter().any(|a| a.trim().is_empty()) {
        return Err(RoutingError::configuration(rule_id, "顾问列表包含空 id"));
    }
    Ok(())
}

// ----- rotation -----
impl AgentSelector for RotationConfig {
    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        cursors: &mut RotationCursors,
    ) -> RoutingResult<Option<String>> {
        require_agents(ctx.rule_id, &self.agent_ids)?;
        let key = RotationCursors::rule_key(ctx.rule_id);
        Ok(cursors.select(&key, &self.agent_ids).cloned())
    }
}

// ----- by_load -----
impl AgentSelector for LoadConfig {
    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        _cursors: &mut RotationCursors,
    ) -> RoutingResult<Option<String>> {
        require_agents(ctx.rule_id, &self.agent_ids)?;

        // 严格小于: 同负载时保留列表靠前者
        let mut best: Option<(&String, u32)> = None;
        for agent_id in &self.agent_ids {
            let count = ctx.active_count(agent_id);
            match best {
                Some((_, best_count)) if count >= best_count => {}
                _ => best = Some((agent_id, count)),
            }
        }
        Ok(best.map(|(a, _)| a.clone()))
    }
}

// ----- by_score -----
impl ScoreConfig {
    pub fn threshold(&self, default_threshold: u8) -> u8 {
        self.min_score.unwrap_or(default_threshold)
    }
}

impl AgentSelector for ScoreConfig {
    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        _cursors: &mut RotationCursors,
    ) -> RoutingResult<Option<String>> {
        require_agents(ctx.rule_id, &self.agent_ids)?;

        let threshold = self.threshold(ctx.default_score_threshold);
        if ctx.lead.score < threshold {
            debug!(
                rule_id = ctx.rule_id,
                lead_id = %ctx.lead.lead_id,
                score = ctx.lead.score,
                threshold,
                "评分低于阈值，规则不适用"
            );
            return Ok(None);
        }

        // 转化效率最高者优先; 并列时保留列表靠前者
        let mut best: Option<(&String, f64)> = None;
        for agent_id in &self.agent_ids {
            let ratio = ctx.conversion_ratio(agent_id);
            match best {
                Some((_, best_ratio)) if ratio <= best_ratio => {}
                _ => best = Some((agent_id, ratio)),
            }
        }
        Ok(best.map(|(a, _)| a.clone()))
    }
}

// ----- by_source -----
impl AgentSelector for SourceConfig {
    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        cursors: &mut RotationCursors,
    ) -> RoutingResult<Option<String>> {
        if self.source_agents.is_empty() {
            return Err(RoutingError::configuration(ctx.rule_id, "来源映射为空"));
        }

        let agents = match self.source_agents.get(&ctx.lead.source) {
            Some(list) if !list.is_empty() => list,
            _ => return Ok(None),
        };
        require_agents(ctx.rule_id, agents)?;

        let key = RotationCursors::source_key(ctx.rule_id, &ctx.lead.source);
        Ok(cursors.select(&key, agents).cloned())
    }
}

// ----- by_specialty -----
impl AgentSelector for SpecialtyConfig {
    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        cursors: &mut RotationCursors,
    ) -> RoutingResult<Option<String>> {
        if self.specialty_agents.is_empty() {
            return Err(RoutingError::configuration(ctx.rule_id, "专长映射为空"));
        }

        // 查找顺序: 标签（按顺序）→ 自定义字段 specialty
        let candidates = ctx
            .lead
            .tags
            .iter()
            .map(String::as_str)
            .chain(ctx.lead.specialty());

        for specialty in candidates {
            if let Some((key, agents)) = self.agents_for(specialty) {
                if agents.is_empty() {
                    continue;
                }
                require_agents(ctx.rule_id, agents)?;
                let cursor_key = RotationCursors::specialty_key(ctx.rule_id, key);
                return Ok(cursors.select(&cursor_key, agents).cloned());
            }
        }
        Ok(None)
    }
}

// ----- 分派 -----
impl AgentSelector for RuleStrategy {
    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        cursors: &mut RotationCursors,
    ) -> RoutingResult<Option<String>> {
        match self {
            RuleStrategy::Rotation(cfg) => cfg.select(ctx, cursors),
            RuleStrategy::BySpecialty(cfg) => cfg.select(ctx, cursors),
            RuleStrategy::ByLoad(cfg) => cfg.select(ctx, cursors),
            RuleStrategy::ByScore(cfg) => cfg.select(ctx, cursors),
            RuleStrategy::BySource(cfg) => cfg.select(ctx, cursors),
            // 人工分配: 永不自动产出候选
            RuleStrategy::Manual => Ok(None),
        }
    }
}

// ==========================================
// StrategyResolver - 策略解析器
// ==========================================
#[derive(Debug, Clone)]
pub struct StrategyResolver {
    default_score_threshold: u8,
}

impl Default for StrategyResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SCORE_THRESHOLD)
    }
}

impl StrategyResolver {
    pub fn new(default_score_threshold: u8) -> Self {
        Self {
            default_score_threshold,
        }
    }

    /// 按规则策略选出候选顾问
    ///
    /// 配置错误被记录并视为无候选，不影响其余规则
    pub fn resolve(
        &self,
        rule: &AssignmentRule,
        lead: &Lead,
        loads: &LoadSnapshot,
        cursors: &mut RotationCursors,
    ) -> Option<String> {
        let ctx = SelectionContext {
            rule_id: &rule.rule_id,
            lead,
            loads,
            default_score_threshold: self.default_score_threshold,
        };

        match rule.strategy.select(&ctx, cursors) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(
                    rule_id = %rule.rule_id,
                    rule_type = %rule.rule_type(),
                    lead_id = %lead.lead_id,
                    error = %e,
                    "规则配置错误，跳过该规则"
                );
                None
            }
        }
    }
}

// ==========================================
// 线索分配引擎 - 超时重分配扫描器
// ==========================================
// 流程: 对每条已分配、非终态的线索
//       1) 选出首个适用的重分配规则（启用重分配 + 条件匹配 + 沉默时长达标，按优先级）
//       2) 基于“当前”线索集合重算负载（含本轮已提交的重分配）
//       3) 仅以该规则重跑编排器；结果与现负责人不同则提交
// 红线: 每轮每条线索至多一次分配变更
// 红线: 提交带乐观校验（expected_agent_id），冲突则跳过该线索
// ==========================================

use crate::config::RoutingConfig;
use crate::domain::lead::{elapsed_hours, Lead, LeadPatch};
use crate::domain::rule::AssignmentRule;
use crate::engine::error::RoutingResult;
use crate::engine::load_aggregator::LoadAggregator;
use crate::engine::orchestrator::{ordered_enabled_rules, AssignmentOrchestrator};
use crate::engine::repositories::LeadStore;
use crate::engine::rotation::RotationCursors;
use crate::engine::rule_matcher::RuleMatcher;
use crate::repository::error::RepositoryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

// ==========================================
// SweepReport - 扫描结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub lead_id: String,
    pub from_agent_id: Option<String>,
    pub to_agent_id: String,
    pub rule_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// 有适用规则并被重新评估的线索数
    pub evaluated: usize,
    /// 已提交的重分配数
    pub reassigned: usize,
    /// 因并发冲突被跳过的线索数
    pub conflicts: usize,
    pub changes: Vec<Reassignment>,
}

impl SweepReport {
    pub fn reassignment_count(&self) -> usize {
        self.reassigned
    }
}

// ==========================================
// ReassignmentSweeper - 超时重分配扫描器
// ==========================================
#[derive(Debug, Clone)]
pub struct ReassignmentSweeper {
    aggregator: LoadAggregator,
    orchestrator: AssignmentOrchestrator,
    matcher: RuleMatcher,
    reset_sla_on_assignment: bool,
}

impl Default for ReassignmentSweeper {
    fn default() -> Self {
        Self::new(&RoutingConfig::default())
    }
}

impl ReassignmentSweeper {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            aggregator: LoadAggregator::new(config),
            orchestrator: AssignmentOrchestrator::new(config),
            matcher: RuleMatcher::new(),
            reset_sla_on_assignment: config.reset_sla_on_assignment,
        }
    }

    /// 线索沉默时长（小时）
    ///
    /// 起点: 最近联系时间，从未联系取创建时间；
    /// 开启 reset_sla_on_assignment 时，起点不早于最近一次分配时间。
    pub fn unresponsive_hours(&self, lead: &Lead, now: DateTime<Utc>) -> f64 {
        let mut reference = lead.contact_reference();
        if self.reset_sla_on_assignment {
            if let Some(assigned_at) = lead.assigned_at {
                if assigned_at > reference {
                    reference = assigned_at;
                }
            }
        }
        elapsed_hours(reference, now)
    }

    /// 执行一轮扫描
    ///
    /// # 参数
    /// - leads: 线索快照（一致性快照，扫描中由本函数同步更新）
    /// - rules: 规则快照（顺序无关）
    /// - cursors: 轮转游标（选中即推进）
    /// - store: 提交分配变更的线索存储
    /// - now: 当前时刻
    ///
    /// # 错误
    /// 存储层故障（分配冲突除外）直接上抛
    pub fn sweep<S>(
        &self,
        leads: Vec<Lead>,
        rules: &[AssignmentRule],
        cursors: &mut RotationCursors,
        store: &S,
        now: DateTime<Utc>,
    ) -> RoutingResult<SweepReport>
    where
        S: LeadStore + ?Sized,
    {
        let mut report = SweepReport::default();

        let reassign_rules: Vec<&AssignmentRule> = ordered_enabled_rules(rules)
            .into_iter()
            .filter(|r| r.reassignment.enabled)
            .collect();

        if reassign_rules.is_empty() {
            debug!("无启用重分配的规则，跳过扫描");
            return Ok(report);
        }

        let mut snapshot = leads;
        let mut seen: HashSet<String> = HashSet::new();

        for idx in 0..snapshot.len() {
            let (lead_id, current_agent, rule) = {
                let lead = &snapshot[idx];
                if !lead.is_assigned_active() || !seen.insert(lead.lead_id.clone()) {
                    continue;
                }

                let silent_hours = self.unresponsive_hours(lead, now);
                let rule = reassign_rules.iter().copied().find(|r| {
                    silent_hours >= r.reassignment.no_response_hours as f64
                        && self.matcher.matches(r, lead)
                });

                match rule {
                    Some(rule) => (lead.lead_id.clone(), lead.assigned_agent_id.clone(), rule),
                    None => continue,
                }
            };

            report.evaluated += 1;

            // 负载基于当前快照重算（含本轮已提交的变更）
            let loads = self.aggregator.compute_loads(&snapshot, now);
            // 未提交变更时游标回滚，保证无效扫描不改变任何状态
            let checkpoint = cursors.clone();
            let decision =
                self.orchestrator
                    .assign_ordered(&snapshot[idx], &[rule], &loads, cursors);

            let decision = match decision {
                Some(d) if Some(&d.agent_id) != current_agent.as_ref() => d,
                _ => {
                    debug!(lead_id = %lead_id, rule_id = %rule.rule_id, "负责人不变");
                    *cursors = checkpoint;
                    continue;
                }
            };

            let patch = LeadPatch::reassign(current_agent.clone(), decision.agent_id.clone(), now);
            match store.update_lead(&lead_id, &patch) {
                Ok(_) => {
                    patch.apply_to(&mut snapshot[idx], now);
                    info!(
                        lead_id = %lead_id,
                        rule_id = %rule.rule_id,
                        from = ?current_agent,
                        to = %decision.agent_id,
                        "超时线索已重分配"
                    );
                    report.reassigned += 1;
                    report.changes.push(Reassignment {
                        lead_id,
                        from_agent_id: current_agent,
                        to_agent_id: decision.agent_id,
                        rule_id: rule.rule_id.clone(),
                    });
                }
                Err(RepositoryError::AssignmentConflict {
                    expected, actual, ..
                }) => {
                    warn!(
                        lead_id = %lead_id,
                        expected = ?expected,
                        actual = ?actual,
                        "分配已被并发修改，跳过该线索"
                    );
                    report.conflicts += 1;
                    *cursors = checkpoint;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            evaluated = report.evaluated,
            reassigned = report.reassigned,
            conflicts = report.conflicts,
            "重分配扫描完成"
        );
        Ok(report)
    }
}

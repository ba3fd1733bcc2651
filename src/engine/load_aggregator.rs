// ==========================================
// 线索分配引擎 - 负载聚合器
// ==========================================
// 职责: 由线索集合计算各顾问负载快照
// 红线: 纯函数; 不缓存、不修改线索; 每次调用都重新计算
// 复杂度: O(n) 线索 + O(m) 每条线索的互动记录
// ==========================================

use crate::config::RoutingConfig;
use crate::domain::agent_load::{AgentLoad, LoadSnapshot};
use crate::domain::lead::{elapsed_hours, Lead};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

// ==========================================
// LoadAggregator - 负载聚合器
// ==========================================
#[derive(Debug, Clone)]
pub struct LoadAggregator {
    pending_response_hours: f64,
    conversion_period: Duration,
    include_call_and_sms: bool,
}

impl Default for LoadAggregator {
    fn default() -> Self {
        Self::new(&RoutingConfig::default())
    }
}

impl LoadAggregator {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            pending_response_hours: config.pending_response_hours as f64,
            conversion_period: Duration::days(config.conversion_period_days as i64),
            include_call_and_sms: config.count_call_and_sms_as_response,
        }
    }

    /// 计算负载快照
    ///
    /// 规则:
    /// 1) 已分配且非终态 → active_lead_count +1
    /// 2) 其中距最近联系（从未联系取创建时间）≥ 待回复阈值 → pending_response_count +1
    /// 3) 已转化且转化时间落在统计窗口内 → converted_this_period +1
    /// 4) avg_response_hours = 响应类互动距线索创建的平均小时数（无则 0）
    pub fn compute_loads(&self, leads: &[Lead], now: DateTime<Utc>) -> LoadSnapshot {
        let mut loads: LoadSnapshot = HashMap::new();
        // agent_id → (响应小时累计, 响应次数)
        let mut responses: HashMap<String, (f64, u32)> = HashMap::new();
        let window_start = now - self.conversion_period;

        for lead in leads {
            if let Some(agent_id) = lead.assigned_agent_id.as_deref() {
                let load = loads
                    .entry(agent_id.to_string())
                    .or_insert_with(|| AgentLoad::new(agent_id));

                if lead.is_active() {
                    load.active_lead_count += 1;
                    if elapsed_hours(lead.contact_reference(), now) >= self.pending_response_hours {
                        load.pending_response_count += 1;
                    }
                } else if let Some(converted_at) = lead.conversion_time() {
                    if converted_at >= window_start && converted_at <= now {
                        load.converted_this_period += 1;
                    }
                }
            }

            for interaction in &lead.interactions {
                if !interaction.kind.counts_as_response(self.include_call_and_sms) {
                    continue;
                }
                let agent_id = match interaction
                    .agent_id
                    .as_deref()
                    .or(lead.assigned_agent_id.as_deref())
                {
                    Some(a) => a,
                    None => continue,
                };
                let hours = elapsed_hours(lead.created_at, interaction.occurred_at);
                let acc = responses.entry(agent_id.to_string()).or_insert((0.0, 0));
                acc.0 += hours;
                acc.1 += 1;
            }
        }

        for (agent_id, (total, count)) in responses {
            let load = loads
                .entry(agent_id.clone())
                .or_insert_with(|| AgentLoad::new(agent_id));
            if count > 0 {
                load.avg_response_hours = total / count as f64;
            }
        }

        loads
    }
}

/// 便捷入口: 使用默认配置计算负载快照
pub fn compute_loads(leads: &[Lead], now: DateTime<Utc>) -> LoadSnapshot {
    LoadAggregator::default().compute_loads(leads, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lead::Interaction;
    use crate::domain::types::{InteractionKind, LeadStatus};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    fn lead(id: &str, agent: Option<&str>, status: LeadStatus, created_hours_ago: i64) -> Lead {
        let created = now() - Duration::hours(created_hours_ago);
        Lead {
            lead_id: id.to_string(),
            name: id.to_string(),
            source: "instagram".to_string(),
            score: 50,
            stage: "captacion".to_string(),
            status,
            assigned_agent_id: agent.map(|s| s.to_string()),
            assigned_at: None,
            last_contact_at: None,
            converted_at: None,
            created_at: created,
            updated_at: created,
            interactions: vec![],
            tags: vec![],
            custom_fields: BTreeMap::new(),
        }
    }

    #[test]
    fn test_active_and_pending_counts() {
        let mut fresh = lead("L1", Some("A"), LeadStatus::Contacted, 48);
        fresh.last_contact_at = Some(now() - Duration::hours(2));
        let stale = lead("L2", Some("A"), LeadStatus::New, 30);
        let lost = lead("L3", Some("A"), LeadStatus::Lost, 100);
        let unassigned = lead("L4", None, LeadStatus::New, 100);

        let loads = compute_loads(&[fresh, stale, lost, unassigned], now());
        let a = loads.get("A").unwrap();
        assert_eq!(a.active_lead_count, 2);
        assert_eq!(a.pending_response_count, 1);
        assert_eq!(a.converted_this_period, 0);
        assert_eq!(loads.len(), 1);
    }

    #[test]
    fn test_pending_threshold_is_inclusive() {
        let exactly = lead("L1", Some("A"), LeadStatus::New, 24);
        let loads = compute_loads(&[exactly], now());
        assert_eq!(loads["A"].pending_response_count, 1);
    }

    #[test]
    fn test_converted_within_period_only() {
        let mut recent = lead("L1", Some("B"), LeadStatus::Converted, 500);
        recent.converted_at = Some(now() - Duration::days(3));
        let mut old = lead("L2", Some("B"), LeadStatus::Converted, 2000);
        old.converted_at = Some(now() - Duration::days(45));

        let loads = compute_loads(&[recent, old], now());
        let b = &loads["B"];
        assert_eq!(b.converted_this_period, 1);
        assert_eq!(b.active_lead_count, 0);
    }

    #[test]
    fn test_avg_response_hours() {
        let mut l = lead("L1", Some("A"), LeadStatus::Contacted, 20);
        let created = l.created_at;
        l.interactions = vec![
            Interaction {
                interaction_id: "i1".to_string(),
                kind: InteractionKind::WhatsappReplied,
                occurred_at: created + Duration::hours(2),
                agent_id: None,
                description: None,
            },
            Interaction {
                interaction_id: "i2".to_string(),
                kind: InteractionKind::EmailOpened,
                occurred_at: created + Duration::hours(4),
                agent_id: None,
                description: None,
            },
            Interaction {
                interaction_id: "i3".to_string(),
                kind: InteractionKind::CallReceived,
                occurred_at: created + Duration::hours(10),
                agent_id: None,
                description: None,
            },
        ];

        let loads = compute_loads(std::slice::from_ref(&l), now());
        assert!((loads["A"].avg_response_hours - 3.0).abs() < 1e-9);

        let cfg = RoutingConfig {
            count_call_and_sms_as_response: true,
            ..Default::default()
        };
        let loads = LoadAggregator::new(&cfg).compute_loads(&[l], now());
        assert!((loads["A"].avg_response_hours - 16.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_responses_means_zero_average() {
        let l = lead("L1", Some("A"), LeadStatus::New, 1);
        let loads = compute_loads(&[l], now());
        assert_eq!(loads["A"].avg_response_hours, 0.0);
    }

    #[test]
    fn test_deterministic() {
        let leads = vec![
            lead("L1", Some("A"), LeadStatus::New, 30),
            lead("L2", Some("B"), LeadStatus::New, 3),
        ];
        assert_eq!(compute_loads(&leads, now()), compute_loads(&leads, now()));
    }
}

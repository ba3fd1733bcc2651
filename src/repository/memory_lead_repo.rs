// ==========================================
// 线索分配引擎 - 内存线索仓储
// ==========================================
// 职责: LeadStore 的内存实现，供嵌入式宿主与测试使用
// 红线: 与 SQLite 实现保持相同的乐观校验语义
// ==========================================

use crate::domain::lead::{Lead, LeadFilter, LeadPatch};
use crate::engine::repositories::LeadStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};

/// 内存线索仓储（保持插入顺序）
#[derive(Debug, Default)]
pub struct InMemoryLeadRepository {
    leads: Mutex<Vec<Lead>>,
}

impl InMemoryLeadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leads(leads: Vec<Lead>) -> Self {
        Self {
            leads: Mutex::new(leads),
        }
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Vec<Lead>>> {
        self.leads
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入或整体替换
    pub fn upsert(&self, lead: Lead) -> RepositoryResult<()> {
        let mut leads = self.lock()?;
        match leads.iter_mut().find(|l| l.lead_id == lead.lead_id) {
            Some(existing) => *existing = lead,
            None => leads.push(lead),
        }
        Ok(())
    }

    pub fn find_by_id(&self, lead_id: &str) -> RepositoryResult<Option<Lead>> {
        Ok(self.lock()?.iter().find(|l| l.lead_id == lead_id).cloned())
    }
}

impl LeadStore for InMemoryLeadRepository {
    fn fetch_leads(&self, filter: &LeadFilter) -> RepositoryResult<Vec<Lead>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|l| filter.accepts(l))
            .cloned()
            .collect())
    }

    fn update_lead(&self, lead_id: &str, patch: &LeadPatch) -> RepositoryResult<Lead> {
        let mut leads = self.lock()?;
        let lead = leads
            .iter_mut()
            .find(|l| l.lead_id == lead_id)
            .ok_or_else(|| RepositoryError::not_found("Lead", lead_id))?;

        if let Some(expected) = &patch.expected_agent_id {
            if expected != &lead.assigned_agent_id {
                return Err(RepositoryError::AssignmentConflict {
                    lead_id: lead_id.to_string(),
                    expected: expected.clone(),
                    actual: lead.assigned_agent_id.clone(),
                });
            }
        }

        patch.apply_to(lead, patch.assigned_at.unwrap_or_else(Utc::now));
        Ok(lead.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::LeadStatus;
    use std::collections::BTreeMap;

    fn lead(id: &str, agent: Option<&str>) -> Lead {
        let now = Utc::now();
        Lead {
            lead_id: id.to_string(),
            name: id.to_string(),
            source: "web".to_string(),
            score: 10,
            stage: "captacion".to_string(),
            status: LeadStatus::New,
            assigned_agent_id: agent.map(str::to_string),
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
    fn test_update_checks_expected_agent() {
        let store = InMemoryLeadRepository::with_leads(vec![lead("L1", Some("A"))]);

        let stale = LeadPatch::reassign(None, "B".to_string(), Utc::now());
        assert!(matches!(
            store.update_lead("L1", &stale),
            Err(RepositoryError::AssignmentConflict { .. })
        ));

        let ok = LeadPatch::reassign(Some("A".to_string()), "B".to_string(), Utc::now());
        let updated = store.update_lead("L1", &ok).unwrap();
        assert_eq!(updated.assigned_agent_id.as_deref(), Some("B"));
        assert!(matches!(
            store.update_lead("L9", &ok),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_upsert_keeps_order() {
        let store = InMemoryLeadRepository::new();
        store.upsert(lead("L1", None)).unwrap();
        store.upsert(lead("L2", None)).unwrap();
        store.upsert(lead("L1", Some("A"))).unwrap();
        let ids: Vec<String> = store
            .fetch_leads(&LeadFilter::all())
            .unwrap()
            .into_iter()
            .map(|l| l.lead_id)
            .collect();
        assert_eq!(ids, vec!["L1", "L2"]);
    }
}

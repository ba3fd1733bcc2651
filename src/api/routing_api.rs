// ==========================================
// 线索分配引擎 - 路由 API（宿主门面）
// ==========================================
// 职责: 加载快照 → 调用引擎 → 乐观提交 → 保存游标 → 审计日志 → 发布事件
// 红线: 扫描在进程内串行执行（sweep_lock）
// 红线: 游标读-改-写与线索提交在同一把锁内完成（cursor_lock）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, RoutingConfig, RoutingConfigReader};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::agent_load::AgentLoad;
use crate::domain::assignment_log::AssignmentLog;
use crate::domain::lead::{LeadFilter, LeadPatch};
use crate::domain::rule::{AssignmentRule, RuleFilter};
use crate::domain::types::AssignmentAction;
use crate::engine::events::{AssignmentEvent, AssignmentEventPublisher, OptionalEventPublisher};
use crate::engine::load_aggregator::LoadAggregator;
use crate::engine::orchestrator::{AssignmentDecision, AssignmentOrchestrator};
use crate::engine::repositories::RoutingRepositories;
use crate::engine::rotation::RotationCursors;
use crate::engine::sweeper::{ReassignmentSweeper, SweepReport};
use crate::repository::{
    AssignmentLogRepository, LeadRepository, RotationCursorRepository, RuleRepository,
};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// 自动分配写入审计日志时使用的操作人
pub const ACTOR_ROUTER: &str = "router";
/// 超时重分配写入审计日志时使用的操作人
pub const ACTOR_SWEEPER: &str = "sweeper";

// ==========================================
// RoutingApi - 路由 API
// ==========================================
pub struct RoutingApi {
    repos: RoutingRepositories,
    config_reader: Arc<dyn RoutingConfigReader>,
    events: OptionalEventPublisher,
    sweep_lock: Mutex<()>,
    cursor_lock: Mutex<()>,
}

impl RoutingApi {
    pub fn new(repos: RoutingRepositories, config_reader: Arc<dyn RoutingConfigReader>) -> Self {
        Self {
            repos,
            config_reader,
            events: OptionalEventPublisher::none(),
            sweep_lock: Mutex::new(()),
            cursor_lock: Mutex::new(()),
        }
    }

    /// 打开 SQLite 数据库并以默认仓储装配
    pub fn open(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        ensure_schema(&conn).map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        let conn = Arc::new(Mutex::new(conn));

        let repos = RoutingRepositories::new(
            Arc::new(LeadRepository::new(conn.clone())),
            Arc::new(RuleRepository::new(conn.clone())),
            Arc::new(RotationCursorRepository::new(conn.clone())),
            Arc::new(AssignmentLogRepository::new(conn.clone())),
        );
        let config_reader = Arc::new(ConfigManager::from_connection(conn));
        Ok(Self::new(repos, config_reader))
    }

    /// 注入事件发布者
    pub fn with_event_publisher(mut self, publisher: Arc<dyn AssignmentEventPublisher>) -> Self {
        self.events = OptionalEventPublisher::with_publisher(publisher);
        self
    }

    pub fn repositories(&self) -> &RoutingRepositories {
        &self.repos
    }

    fn load_config(&self) -> ApiResult<RoutingConfig> {
        Ok(self.config_reader.load_routing_config()?)
    }

    fn acquire<'a>(lock: &'a Mutex<()>, name: &str) -> ApiResult<MutexGuard<'a, ()>> {
        lock.lock()
            .map_err(|e| ApiError::Internal(format!("{}获取失败: {}", name, e)))
    }

    fn save_cursors_if_dirty(&self, cursors: &mut RotationCursors) -> ApiResult<()> {
        if cursors.is_dirty() {
            self.repos.cursor_store.save_cursors(cursors)?;
            cursors.mark_clean();
        }
        Ok(())
    }

    fn append_log(&self, log: AssignmentLog) {
        if let Err(e) = self.repos.log_store.append(&log) {
            warn!(lead_id = %log.lead_id, error = %e, "分配审计日志写入失败");
        }
    }

    // ==========================================
    // 分配
    // ==========================================

    /// 为单条线索执行规则分配
    ///
    /// # 返回
    /// - Ok(Some(decision)): 规则产出的负责人（与现负责人不同则已提交，相同则不提交也不推进游标）
    /// - Ok(None): 无规则产出候选，或线索已处于终态
    ///
    /// # 错误
    /// - `NotFound`: lead_id 不存在
    /// - `Conflict`: 提交时分配已被并发修改
    pub fn assign_lead(
        &self,
        lead_id: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<Option<AssignmentDecision>> {
        let config = self.load_config()?;
        let _guard = Self::acquire(&self.cursor_lock, "游标锁")?;

        let leads = self.repos.lead_store.fetch_leads(&LeadFilter::all())?;
        let lead = leads
            .iter()
            .find(|l| l.lead_id == lead_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("Lead(id={})不存在", lead_id)))?;

        if !lead.is_active() {
            info!(lead_id = %lead_id, status = %lead.status, "线索已处于终态，跳过分配");
            return Ok(None);
        }

        let rules = self.repos.rule_store.list_rules(&RuleFilter::enabled())?;
        let mut cursors = self.repos.cursor_store.load_cursors()?;
        let loads = LoadAggregator::new(&config).compute_loads(&leads, now);

        let decision = match AssignmentOrchestrator::new(&config).assign(
            &lead,
            &rules,
            &loads,
            &mut cursors,
        ) {
            Some(d) => d,
            None => return Ok(None),
        };

        let previous = lead.assigned_agent_id.clone();
        // 负责人不变: 不提交，游标推进一并丢弃
        if previous.as_deref() == Some(decision.agent_id.as_str()) {
            return Ok(Some(decision));
        }

        let patch = LeadPatch::reassign(previous.clone(), decision.agent_id.clone(), now);
        self.repos.lead_store.update_lead(lead_id, &patch)?;
        self.save_cursors_if_dirty(&mut cursors)?;

        let action = if previous.is_some() {
            AssignmentAction::Reassign
        } else {
            AssignmentAction::Assign
        };
        self.append_log(
            AssignmentLog::new(
                lead_id,
                action,
                previous.clone(),
                &decision.agent_id,
                Some(decision.rule_id.clone()),
                ACTOR_ROUTER,
                now,
            )
            .with_detail(format!("rule={}", decision.rule_name)),
        );
        let event = match action {
            AssignmentAction::Reassign => AssignmentEvent::reassigned(
                lead_id,
                previous,
                &decision.agent_id,
                Some(decision.rule_id.clone()),
                now,
            ),
            AssignmentAction::Assign => AssignmentEvent::assigned(
                lead_id,
                previous,
                &decision.agent_id,
                Some(decision.rule_id.clone()),
                now,
            ),
        };
        self.events.publish(event);

        info!(
            lead_id = %lead_id,
            agent_id = %decision.agent_id,
            rule_id = %decision.rule_id,
            "线索已分配"
        );
        Ok(Some(decision))
    }

    // ==========================================
    // 超时重分配
    // ==========================================

    /// 执行一轮超时重分配扫描
    pub fn run_sweep(&self, now: DateTime<Utc>) -> ApiResult<SweepReport> {
        let _sweep = Self::acquire(&self.sweep_lock, "扫描锁")?;
        let config = self.load_config()?;
        let _guard = Self::acquire(&self.cursor_lock, "游标锁")?;

        let leads = self.repos.lead_store.fetch_leads(&LeadFilter::all())?;
        let rules = self.repos.rule_store.list_rules(&RuleFilter::enabled())?;
        let mut cursors = self.repos.cursor_store.load_cursors()?;

        let report = ReassignmentSweeper::new(&config).sweep(
            leads,
            &rules,
            &mut cursors,
            self.repos.lead_store.as_ref(),
            now,
        )?;
        self.save_cursors_if_dirty(&mut cursors)?;

        for change in &report.changes {
            self.append_log(
                AssignmentLog::new(
                    &change.lead_id,
                    AssignmentAction::Reassign,
                    change.from_agent_id.clone(),
                    &change.to_agent_id,
                    Some(change.rule_id.clone()),
                    ACTOR_SWEEPER,
                    now,
                )
                .with_detail("no response"),
            );
            self.events.publish(AssignmentEvent::reassigned(
                &change.lead_id,
                change.from_agent_id.clone(),
                &change.to_agent_id,
                Some(change.rule_id.clone()),
                now,
            ));
        }

        Ok(report)
    }

    // ==========================================
    // 负载查询
    // ==========================================

    /// 当前全部顾问负载（按 agent_id 升序）
    pub fn agent_loads(&self, now: DateTime<Utc>) -> ApiResult<Vec<AgentLoad>> {
        let config = self.load_config()?;
        let leads = self.repos.lead_store.fetch_leads(&LeadFilter::all())?;
        let mut loads: Vec<AgentLoad> = LoadAggregator::new(&config)
            .compute_loads(&leads, now)
            .into_values()
            .collect();
        loads.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        Ok(loads)
    }

    // ==========================================
    // 规则管理
    // ==========================================

    pub fn list_rules(&self, filter: &RuleFilter) -> ApiResult<Vec<AssignmentRule>> {
        Ok(self.repos.rule_store.list_rules(filter)?)
    }

    pub fn get_rule(&self, rule_id: &str) -> ApiResult<AssignmentRule> {
        self.repos
            .rule_store
            .find_rule(rule_id)?
            .ok_or_else(|| ApiError::NotFound(format!("AssignmentRule(id={})不存在", rule_id)))
    }

    pub fn create_rule(&self, rule: &AssignmentRule) -> ApiResult<()> {
        rule.validate().map_err(ApiError::InvalidInput)?;
        self.repos.rule_store.create_rule(rule)?;
        Ok(())
    }

    pub fn update_rule(&self, rule: &AssignmentRule) -> ApiResult<()> {
        rule.validate().map_err(ApiError::InvalidInput)?;
        self.repos.rule_store.update_rule(rule)?;
        Ok(())
    }

    pub fn delete_rule(&self, rule_id: &str) -> ApiResult<()> {
        self.repos.rule_store.delete_rule(rule_id)?;
        Ok(())
    }
}

// ==========================================
// 线索分配引擎 - 分配事件发布
// ==========================================
// 职责: 定义分配事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，宿主（通知/消息队列）实现适配器
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 分配事件类型
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentEventType {
    /// 首次分配
    LeadAssigned,
    /// 超时重分配
    LeadReassigned,
}

impl AssignmentEventType {
    pub fn as_str(&self) -> &str {
        match self {
            AssignmentEventType::LeadAssigned => "LeadAssigned",
            AssignmentEventType::LeadReassigned => "LeadReassigned",
        }
    }
}

/// 分配事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentEvent {
    pub lead_id: String,
    pub event_type: AssignmentEventType,
    pub from_agent_id: Option<String>,
    pub to_agent_id: String,
    pub rule_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AssignmentEvent {
    pub fn assigned(
        lead_id: &str,
        from_agent_id: Option<String>,
        to_agent_id: &str,
        rule_id: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            lead_id: lead_id.to_string(),
            event_type: AssignmentEventType::LeadAssigned,
            from_agent_id,
            to_agent_id: to_agent_id.to_string(),
            rule_id,
            occurred_at,
        }
    }

    pub fn reassigned(
        lead_id: &str,
        from_agent_id: Option<String>,
        to_agent_id: &str,
        rule_id: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: AssignmentEventType::LeadReassigned,
            ..Self::assigned(lead_id, from_agent_id, to_agent_id, rule_id, occurred_at)
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 分配事件发布者
///
/// 发布失败不回滚已提交的分配，由调用方记录日志
pub trait AssignmentEventPublisher: Send + Sync {
    fn publish(&self, event: AssignmentEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl AssignmentEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: AssignmentEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - lead_id={}, event_type={}",
            event.lead_id,
            event.event_type.as_str()
        );
        Ok(())
    }
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn AssignmentEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn AssignmentEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件；失败只记录告警
    pub fn publish(&self, event: AssignmentEvent) {
        if let Some(publisher) = &self.inner {
            let lead_id = event.lead_id.clone();
            if let Err(e) = publisher.publish(event) {
                tracing::warn!(lead_id = %lead_id, error = %e, "分配事件发布失败");
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<AssignmentEvent>>,
    }

    impl AssignmentEventPublisher for Recorder {
        fn publish(&self, event: AssignmentEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[test]
    fn test_reassigned_event_type() {
        let e = AssignmentEvent::reassigned("L1", Some("A".into()), "B", None, Utc::now());
        assert_eq!(e.event_type, AssignmentEventType::LeadReassigned);
        assert_eq!(e.to_agent_id, "B");
    }

    #[test]
    fn test_optional_publisher_forwards() {
        let recorder = Arc::new(Recorder::default());
        let publisher = OptionalEventPublisher::with_publisher(recorder.clone());
        assert!(publisher.is_configured());
        publisher.publish(AssignmentEvent::assigned("L1", None, "A", None, Utc::now()));
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_optional_publisher_none_is_silent() {
        let publisher = OptionalEventPublisher::none();
        assert!(!publisher.is_configured());
        publisher.publish(AssignmentEvent::assigned("L1", None, "A", None, Utc::now()));
    }
}

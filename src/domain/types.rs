// ==========================================
// 线索分配引擎 - 领域类型定义
// ==========================================
// 职责: 线索状态、互动类型、规则类型等封闭枚举
// 序列化格式: snake_case (与数据库/规则配置一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 线索状态 (Lead Status)
// ==========================================
// 红线: Converted / Lost 为终态, 其余均为活跃子状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,              // 新线索
    Contacted,        // 已联系
    Qualified,        // 已确认意向
    Nurturing,        // 培育中
    MeetingScheduled, // 已约见
    Negotiation,      // 谈判中
    Converted,        // 已转化
    Lost,             // 已流失
}

impl LeadStatus {
    /// 是否为终态（已转化/已流失）
    pub fn is_terminal(&self) -> bool {
        matches!(self, LeadStatus::Converted | LeadStatus::Lost)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Nurturing => "nurturing",
            LeadStatus::MeetingScheduled => "meeting_scheduled",
            LeadStatus::Negotiation => "negotiation",
            LeadStatus::Converted => "converted",
            LeadStatus::Lost => "lost",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(LeadStatus::New),
            "contacted" => Ok(LeadStatus::Contacted),
            "qualified" => Ok(LeadStatus::Qualified),
            "nurturing" => Ok(LeadStatus::Nurturing),
            "meeting_scheduled" => Ok(LeadStatus::MeetingScheduled),
            "negotiation" => Ok(LeadStatus::Negotiation),
            "converted" => Ok(LeadStatus::Converted),
            "lost" => Ok(LeadStatus::Lost),
            other => Err(format!("未知线索状态: {}", other)),
        }
    }
}

// ==========================================
// 互动类型 (Interaction Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    WhatsappSent,
    WhatsappReplied,
    EmailSent,
    EmailOpened,
    EmailClicked,
    CallMade,
    CallReceived,
    SmsSent,
    SmsReplied,
    MeetingCompleted,
    ProposalSent,
    VisitCenter,
    SocialMediaInteraction,
    Other,
}

impl InteractionKind {
    /// 是否计入平均响应时长
    ///
    /// 默认只统计 replied / opened 两类；
    /// `include_call_and_sms` 打开后，来电与短信回复也计入。
    pub fn counts_as_response(&self, include_call_and_sms: bool) -> bool {
        match self {
            InteractionKind::WhatsappReplied | InteractionKind::EmailOpened => true,
            InteractionKind::CallReceived | InteractionKind::SmsReplied => include_call_and_sms,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::WhatsappSent => "whatsapp_sent",
            InteractionKind::WhatsappReplied => "whatsapp_replied",
            InteractionKind::EmailSent => "email_sent",
            InteractionKind::EmailOpened => "email_opened",
            InteractionKind::EmailClicked => "email_clicked",
            InteractionKind::CallMade => "call_made",
            InteractionKind::CallReceived => "call_received",
            InteractionKind::SmsSent => "sms_sent",
            InteractionKind::SmsReplied => "sms_replied",
            InteractionKind::MeetingCompleted => "meeting_completed",
            InteractionKind::ProposalSent => "proposal_sent",
            InteractionKind::VisitCenter => "visit_center",
            InteractionKind::SocialMediaInteraction => "social_media_interaction",
            InteractionKind::Other => "other",
        }
    }

    /// 从数据库字符串解析（未知值归为 Other）
    pub fn from_db_str(s: &str) -> Self {
        match s.trim() {
            "whatsapp_sent" => InteractionKind::WhatsappSent,
            "whatsapp_replied" => InteractionKind::WhatsappReplied,
            "email_sent" => InteractionKind::EmailSent,
            "email_opened" => InteractionKind::EmailOpened,
            "email_clicked" => InteractionKind::EmailClicked,
            "call_made" => InteractionKind::CallMade,
            "call_received" => InteractionKind::CallReceived,
            "sms_sent" => InteractionKind::SmsSent,
            "sms_replied" => InteractionKind::SmsReplied,
            "meeting_completed" => InteractionKind::MeetingCompleted,
            "proposal_sent" => InteractionKind::ProposalSent,
            "visit_center" => InteractionKind::VisitCenter,
            "social_media_interaction" => InteractionKind::SocialMediaInteraction,
            _ => InteractionKind::Other,
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 规则类型 (Rule Type)
// ==========================================
// 封闭集合: 新增类型 = 新增一个变体 + 一个策略实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Rotation,
    BySpecialty,
    ByLoad,
    ByScore,
    BySource,
    Manual,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Rotation => "rotation",
            RuleType::BySpecialty => "by_specialty",
            RuleType::ByLoad => "by_load",
            RuleType::ByScore => "by_score",
            RuleType::BySource => "by_source",
            RuleType::Manual => "manual",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rotation" | "round_robin" => Ok(RuleType::Rotation),
            "by_specialty" | "by-specialty" => Ok(RuleType::BySpecialty),
            "by_load" | "by-load" => Ok(RuleType::ByLoad),
            "by_score" | "by-score" => Ok(RuleType::ByScore),
            "by_source" | "by-source" => Ok(RuleType::BySource),
            "manual" => Ok(RuleType::Manual),
            other => Err(format!("未知规则类型: {}", other)),
        }
    }
}

// ==========================================
// 分配动作 (Assignment Action)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentAction {
    Assign,   // 首次分配
    Reassign, // 超时重分配
}

impl AssignmentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentAction::Assign => "ASSIGN",
            AssignmentAction::Reassign => "REASSIGN",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "REASSIGN" => AssignmentAction::Reassign,
            _ => AssignmentAction::Assign,
        }
    }
}

impl fmt::Display for AssignmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

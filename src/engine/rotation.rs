// ==========================================
// 线索分配引擎 - 轮转游标
// ==========================================
// 红线: 游标显式持久化, 每次成功选中推进且仅推进一次
// 红线: 不从系统时间推导游标（不公平、不可重放）
// 键: rule_id | rule_id#source:<src> | rule_id#specialty:<name>
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 轮转游标集合（由宿主加载、引擎推进、宿主保存）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationCursors {
    positions: BTreeMap<String, u64>,
    #[serde(skip)]
    dirty: bool,
}

impl RotationCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positions(positions: BTreeMap<String, u64>) -> Self {
        Self {
            positions,
            dirty: false,
        }
    }

    /// 规则级游标键
    pub fn rule_key(rule_id: &str) -> String {
        rule_id.to_string()
    }

    /// 来源分组游标键
    pub fn source_key(rule_id: &str, source: &str) -> String {
        format!("{}#source:{}", rule_id, source)
    }

    /// 专长分组游标键
    pub fn specialty_key(rule_id: &str, specialty: &str) -> String {
        format!("{}#specialty:{}", rule_id, specialty.trim().to_lowercase())
    }

    pub fn position(&self, key: &str) -> u64 {
        self.positions.get(key).copied().unwrap_or(0)
    }

    /// 按游标从列表中选出一个并推进游标
    ///
    /// 列表为空时不推进，返回 None
    pub fn select<'a>(&mut self, key: &str, agent_ids: &'a [String]) -> Option<&'a String> {
        if agent_ids.is_empty() {
            return None;
        }
        let pos = self.position(key);
        let picked = &agent_ids[(pos % agent_ids.len() as u64) as usize];
        self.positions.insert(key.to_string(), pos.wrapping_add(1));
        self.dirty = true;
        Some(picked)
    }

    /// 自上次保存后是否有推进
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn positions(&self) -> &BTreeMap<String, u64> {
        &self.positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents() -> Vec<String> {
        vec!["A".to_string(), "B".to_string(), "C".to_string()]
    }

    #[test]
    fn test_select_cycles_in_order() {
        let mut cursors = RotationCursors::new();
        let list = agents();
        let picked: Vec<&str> = (0..6)
            .map(|_| cursors.select("r1", &list).unwrap().as_str())
            .collect();
        assert_eq!(picked, vec!["A", "B", "C", "A", "B", "C"]);
        assert_eq!(cursors.position("r1"), 6);
        assert!(cursors.is_dirty());
    }

    #[test]
    fn test_empty_list_does_not_advance() {
        let mut cursors = RotationCursors::new();
        assert!(cursors.select("r1", &[]).is_none());
        assert_eq!(cursors.position("r1"), 0);
        assert!(!cursors.is_dirty());
    }

    #[test]
    fn test_keys_are_independent() {
        let mut cursors = RotationCursors::new();
        let list = agents();
        cursors.select(&RotationCursors::source_key("r1", "instagram"), &list);
        assert_eq!(cursors.position(&RotationCursors::rule_key("r1")), 0);
        assert_eq!(
            RotationCursors::specialty_key("r1", " Yoga "),
            "r1#specialty:yoga"
        );
    }

    #[test]
    fn test_restored_positions_resume() {
        let mut map = BTreeMap::new();
        map.insert("r1".to_string(), 4);
        let mut cursors = RotationCursors::from_positions(map);
        assert_eq!(cursors.select("r1", &agents()).unwrap(), "B");
    }
}

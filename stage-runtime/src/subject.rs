//! # Subject 模块
//!
//! 持有效果的运行时实体（角色、敌人）。
//! 引擎只关心它当前附加了哪些效果；其余属性属于 Host。

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::database::EffectId;

/// 效果持有者
///
/// `applied` 按附加顺序排列，不含重复。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    #[serde(default)]
    pub applied: Vec<EffectId>,
}

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            applied: Vec::new(),
        }
    }

    /// 是否持有某效果
    pub fn has(&self, effect: EffectId) -> bool {
        self.applied.contains(&effect)
    }

    /// 附加效果（已持有时无变化），返回是否新增
    pub fn insert(&mut self, effect: EffectId) -> bool {
        if self.has(effect) {
            return false;
        }
        self.applied.push(effect);
        true
    }

    /// 移除效果，返回是否确实移除
    pub fn remove(&mut self, effect: EffectId) -> bool {
        let before = self.applied.len();
        self.applied.retain(|&e| e != effect);
        self.applied.len() != before
    }

    /// 按顺序执行一组指令
    pub fn execute(&mut self, commands: &[Command]) {
        for command in commands {
            match command {
                Command::RemoveEffect { effect, .. } => {
                    self.remove(*effect);
                }
                Command::AddEffect { effect } => {
                    self.insert(*effect);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RemovalCause;

    #[test]
    fn test_set_semantics() {
        let mut subject = Subject::new("Eric");
        assert!(subject.insert(EffectId(1)));
        assert!(!subject.insert(EffectId(1)));
        assert!(subject.insert(EffectId(2)));
        assert_eq!(subject.applied, vec![EffectId(1), EffectId(2)]);
        assert!(subject.remove(EffectId(1)));
        assert!(!subject.remove(EffectId(1)));
    }

    #[test]
    fn test_execute_in_order() {
        let mut subject = Subject::new("Slime");
        subject.insert(EffectId(4));
        subject.execute(&[
            Command::remove(EffectId(4), RemovalCause::Replaced),
            Command::add(EffectId(5)),
        ]);
        assert_eq!(subject.applied, vec![EffectId(5)]);
    }

    #[test]
    fn test_deserialize_without_applied() {
        let subject: Subject = serde_json::from_str(r#"{ "name": "Natalie" }"#).unwrap();
        assert!(subject.applied.is_empty());
    }
}

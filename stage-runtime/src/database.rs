//! # Database 模块
//!
//! 载入期的数据模型：效果记录（状态）、技能/物品的效果列表、各类带特性的实体。
//!
//! ## 设计原则
//!
//! - 所有类型都可从 JSON 反序列化，缺省字段取默认值
//! - 载入管线拥有并改写 `Database`，运行期只读
//! - 数值字段在构造处钳制，不在使用处重复校验

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::LoadError;
use crate::registry::StageTable;

/// 效果 ID
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EffectId(pub u32);

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EffectId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// 特性/效果代码
pub mod codes {
    /// 特性：状态有效度（包含型）
    pub const STATE_RATE: u16 = 13;
    /// 特性：状态无效化（包含型）
    pub const STATE_RESIST: u16 = 14;
    /// 特性：攻击时附加状态（叠加型）
    pub const ATTACK_STATE: u16 = 32;
    /// 使用效果：附加状态
    pub const ADD_STATE: u16 = 21;
}

/// 行动限制
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub enum Restriction {
    /// 无
    #[default]
    None,
    /// 攻击敌人
    AttackEnemy,
    /// 攻击任意目标
    AttackAnyone,
    /// 攻击同伴
    AttackAlly,
    /// 无法行动
    CannotAct,
}

impl Restriction {
    /// 钳制到 0-4 后转换
    pub fn from_clamped(value: i64) -> Self {
        match value.clamp(0, 4) {
            0 => Self::None,
            1 => Self::AttackEnemy,
            2 => Self::AttackAnyone,
            3 => Self::AttackAlly,
            _ => Self::CannotAct,
        }
    }
}

impl From<i64> for Restriction {
    fn from(value: i64) -> Self {
        Self::from_clamped(value)
    }
}

impl From<Restriction> for u8 {
    fn from(value: Restriction) -> Self {
        value as u8
    }
}

/// 自动解除时机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub enum AutoRemovalTiming {
    /// 不自动解除
    #[default]
    None,
    /// 行动结束时
    ActionEnd,
    /// 回合结束时
    TurnEnd,
}

impl AutoRemovalTiming {
    /// 钳制到 0-2 后转换
    pub fn from_clamped(value: i64) -> Self {
        match value.clamp(0, 2) {
            0 => Self::None,
            1 => Self::ActionEnd,
            _ => Self::TurnEnd,
        }
    }
}

impl From<i64> for AutoRemovalTiming {
    fn from(value: i64) -> Self {
        Self::from_clamped(value)
    }
}

impl From<AutoRemovalTiming> for u8 {
    fn from(value: AutoRemovalTiming) -> Self {
        value as u8
    }
}

/// 持续回合范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnRange {
    pub min: u32,
    pub max: u32,
}

/// 解除条件
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalRules {
    /// 战斗结束时解除
    pub remove_at_battle_end: bool,
    /// 受到行动限制时解除
    pub remove_by_restriction: bool,
    /// 自动解除时机
    pub auto_removal_timing: AutoRemovalTiming,
    /// 自动解除的回合范围
    pub turn_range: TurnRange,
    /// 受伤解除概率（0 表示禁用）
    pub damage_removal_chance: u8,
    /// 行走解除步数（0 表示禁用）
    pub walk_removal_steps: u32,
}

/// 状态消息
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    /// 我方陷入状态时
    pub actor_afflicted: String,
    /// 敌方陷入状态时
    pub enemy_afflicted: String,
    /// 状态持续时
    pub persists: String,
    /// 状态解除时
    pub removed: String,
}

impl Messages {
    /// 按 1-based 序号取可变引用（msg1..msg4）
    pub fn slot_mut(&mut self, slot: u8) -> Option<&mut String> {
        match slot {
            1 => Some(&mut self.actor_afflicted),
            2 => Some(&mut self.enemy_afflicted),
            3 => Some(&mut self.persists),
            4 => Some(&mut self.removed),
            _ => None,
        }
    }
}

/// 特性（数值分量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub code: u16,
    #[serde(default)]
    pub data_id: u32,
    #[serde(default)]
    pub value: f64,
}

impl Feature {
    pub fn new(code: u16, data_id: u32, value: f64) -> Self {
        Self {
            code,
            data_id,
            value,
        }
    }
}

/// 效果记录（状态）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectRecord {
    pub id: EffectId,
    pub name: String,
    pub icon_index: u32,
    /// 备注文本（载入后已去除指令）
    pub note: String,
    pub restriction: Restriction,
    /// 优先级（0-100）
    pub priority: u8,
    pub removal: RemovalRules,
    pub messages: Messages,
    pub features: Vec<Feature>,
}

impl EffectRecord {
    /// 创建只有 ID 和名称的记录
    pub fn new(id: impl Into<EffectId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// 复制简单属性到一条新记录（不含特性）
    pub fn clone_attributes(&self, id: EffectId) -> Self {
        Self {
            id,
            name: self.name.clone(),
            icon_index: self.icon_index,
            note: self.note.clone(),
            restriction: self.restriction,
            priority: self.priority,
            removal: self.removal.clone(),
            messages: self.messages.clone(),
            features: Vec::new(),
        }
    }
}

/// 使用效果（技能/物品的效果列表条目）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEffect {
    pub code: u16,
    #[serde(default)]
    pub data_id: u32,
    #[serde(default)]
    pub value1: f64,
    #[serde(default)]
    pub value2: f64,
}

impl ActionEffect {
    /// 创建附加状态效果
    pub fn add_state(state: EffectId, value1: f64) -> Self {
        Self {
            code: codes::ADD_STATE,
            data_id: state.0,
            value1,
            value2: 0.0,
        }
    }
}

/// 技能/物品
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsableItem {
    pub id: u32,
    pub name: String,
    pub effects: Vec<ActionEffect>,
}

/// 带特性的实体（角色、职业、武器、护甲、敌人）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureBearer {
    pub id: u32,
    pub name: String,
    pub features: Vec<Feature>,
}

/// 完整数据库
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub states: Vec<EffectRecord>,
    pub skills: Vec<UsableItem>,
    pub items: Vec<UsableItem>,
    pub actors: Vec<FeatureBearer>,
    pub classes: Vec<FeatureBearer>,
    pub weapons: Vec<FeatureBearer>,
    pub armors: Vec<FeatureBearer>,
    pub enemies: Vec<FeatureBearer>,
    /// 声明式阶段表（可选，先于备注标签登记）
    pub stages: StageTable,
}

impl Database {
    /// 从 JSON 文本解析
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        let database: Self = serde_json::from_str(text).map_err(|e| LoadError::InvalidJson {
            message: e.to_string(),
        })?;
        database.check_unique_ids()?;
        Ok(database)
    }

    /// 检查各类记录 ID 唯一
    pub fn check_unique_ids(&self) -> Result<(), LoadError> {
        check_unique("states", self.states.iter().map(|s| s.id.0))?;
        check_unique("skills", self.skills.iter().map(|s| s.id))?;
        check_unique("items", self.items.iter().map(|s| s.id))?;
        for (kind, bearers) in self.bearer_groups() {
            check_unique(kind, bearers.iter().map(|b| b.id))?;
        }
        Ok(())
    }

    /// 按 ID 查找状态
    pub fn state(&self, id: EffectId) -> Option<&EffectRecord> {
        self.states.iter().find(|s| s.id == id)
    }

    /// 下一个可用的状态 ID；ID 已用尽时为 `None`
    pub fn next_state_id(&self) -> Option<EffectId> {
        let max = self.states.iter().map(|s| s.id.0).max().unwrap_or(0);
        max.checked_add(1).map(EffectId)
    }

    /// 非状态类的特性实体分组
    fn bearer_groups(&self) -> [(&'static str, &[FeatureBearer]); 5] {
        [
            ("actors", &self.actors),
            ("classes", &self.classes),
            ("weapons", &self.weapons),
            ("armors", &self.armors),
            ("enemies", &self.enemies),
        ]
    }

    /// 非状态类特性实体的可变分组
    pub(crate) fn bearer_groups_mut(&mut self) -> [&mut Vec<FeatureBearer>; 5] {
        [
            &mut self.actors,
            &mut self.classes,
            &mut self.weapons,
            &mut self.armors,
            &mut self.enemies,
        ]
    }
}

fn check_unique(kind: &str, ids: impl Iterator<Item = u32>) -> Result<(), LoadError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(LoadError::DuplicateId {
                kind: kind.to_string(),
                id,
            });
        }
    }
    Ok(())
}

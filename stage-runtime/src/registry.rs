//! # Registry 模块
//!
//! 阶段注册表：阶段名 → 有序轨道（带标签的效果 ID 序列）。
//!
//! ## 生命周期
//!
//! ```text
//! 阶段表 / 备注标签 → RegistryBuilder（可变，按位置填槽）
//!                         │ build()
//!                         ▼
//!                   StageRegistry（只读，载入后不再修改）
//! ```
//!
//! 每个阶段的前两条轨道相互作用（相互抵消），其余轨道独立推进。

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::marker::PhantomData;

use crate::database::EffectId;
use crate::diagnostic::{Diagnostic, DiagnosticResult};

/// 单条轨道允许的最大位置（1-based）
pub const MAX_STAGE_POSITION: usize = 256;

/// 常用轨道标签
pub mod labels {
    pub const POSITIVE: &str = "pos";
    pub const NEGATIVE: &str = "neg";
    pub const NEUTRAL: &str = "neu";
}

//=============================================================================
// 声明式阶段表
//=============================================================================

/// 保持键顺序的映射
///
/// 轨道的先后顺序决定哪两条轨道相互作用，因此 JSON 对象的键顺序必须保留。
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.0.push((key.into(), value));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            entries.push((key, value));
        }
        Ok(OrderedMap(entries))
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// 声明式阶段表：`阶段名 -> { 轨道标签: [效果 ID, ...] }`
pub type StageTable = OrderedMap<OrderedMap<Vec<EffectId>>>;

//=============================================================================
// 只读注册表
//=============================================================================

/// 轨道
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    label: String,
    effects: Vec<EffectId>,
}

impl Track {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn effects(&self) -> &[EffectId] {
        &self.effects
    }

    pub fn get(&self, index: usize) -> Option<EffectId> {
        self.effects.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// 最后一个索引（空轨道为 None）
    pub fn last_index(&self) -> Option<usize> {
        self.effects.len().checked_sub(1)
    }

    /// 效果在轨道中的索引
    pub fn position_of(&self, effect: EffectId) -> Option<usize> {
        self.effects.iter().position(|&e| e == effect)
    }
}

/// 阶段定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDefinition {
    name: String,
    abbreviation: Option<String>,
    tracks: Vec<Track>,
}

impl StageDefinition {
    /// 注册表中的阶段名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Abbr_Name` 设置的显示名
    pub fn abbreviation(&self) -> Option<&str> {
        self.abbreviation.as_deref()
    }

    /// 显示用名称：有缩写用缩写，否则用阶段名
    pub fn display_name(&self) -> &str {
        self.abbreviation.as_deref().unwrap_or(&self.name)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// 按标签查找轨道
    pub fn track_by_label(&self, label: &str) -> Option<(usize, &Track)> {
        self.tracks
            .iter()
            .enumerate()
            .find(|(_, t)| t.label == label)
    }

    /// 相互作用的对侧轨道
    ///
    /// 只有前两条轨道相互作用；第三条及之后的轨道没有对侧。
    pub fn opposite_of(&self, track: usize) -> Option<usize> {
        if self.tracks.len() < 2 {
            return None;
        }
        match track {
            0 => Some(1),
            1 => Some(0),
            _ => None,
        }
    }
}

/// 效果在注册表中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    /// 阶段下标
    pub stage: usize,
    /// 轨道下标
    pub track: usize,
    /// 轨道内索引（0 = 最弱）
    pub index: usize,
}

/// 阶段注册表（只读）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageRegistry {
    stages: Vec<StageDefinition>,
    by_name: HashMap<String, usize>,
    by_effect: HashMap<EffectId, Placement>,
}

impl StageRegistry {
    /// 直接从声明式阶段表构建
    pub fn from_table(table: &StageTable) -> (Self, DiagnosticResult) {
        let mut builder = RegistryBuilder::new();
        builder.add_table(table);
        builder.build()
    }

    /// 查找效果所属的阶段/轨道/索引
    ///
    /// 同一效果被登记多次时，以第一次登记为准。
    pub fn locate(&self, effect: EffectId) -> Option<Placement> {
        self.by_effect.get(&effect).copied()
    }

    /// 效果是否属于任何阶段
    pub fn contains(&self, effect: EffectId) -> bool {
        self.by_effect.contains_key(&effect)
    }

    pub fn stage(&self, index: usize) -> Option<&StageDefinition> {
        self.stages.get(index)
    }

    /// 按名称查找阶段
    pub fn stage_by_name(&self, name: &str) -> Option<(usize, &StageDefinition)> {
        let index = *self.by_name.get(name)?;
        Some((index, &self.stages[index]))
    }

    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// 位置对应的阶段与轨道
    pub fn resolve(&self, placement: Placement) -> Option<(&StageDefinition, &Track)> {
        let stage = self.stages.get(placement.stage)?;
        let track = stage.tracks.get(placement.track)?;
        Some((stage, track))
    }

    /// 文本形式导出整张表，每个阶段一行
    ///
    /// ```text
    /// ATK => pos: [20, 19, 25], neg: [13, 10, 34]
    /// PSN (Venom) => neg: [4, 41, 42]
    /// ```
    pub fn dump(&self) -> String {
        self.stages
            .iter()
            .map(|stage| {
                let tracks = stage
                    .tracks
                    .iter()
                    .map(|t| {
                        let ids: Vec<String> = t.effects.iter().map(|e| e.to_string()).collect();
                        format!("{}: [{}]", t.label, ids.join(", "))
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                match &stage.abbreviation {
                    Some(abbr) => format!("{} ({}) => {}", stage.name, abbr, tracks),
                    None => format!("{} => {}", stage.name, tracks),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

//=============================================================================
// 构建器
//=============================================================================

/// 写入槽位的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWrite {
    /// 写入空槽
    Filled,
    /// 覆盖了已有效果
    Replaced(EffectId),
    /// 位置为 0 或超过 [`MAX_STAGE_POSITION`]
    OutOfRange,
}

#[derive(Debug, Clone)]
struct TrackSlots {
    label: String,
    slots: Vec<Option<EffectId>>,
}

#[derive(Debug, Clone)]
struct StageSlots {
    name: String,
    abbreviation: Option<String>,
    tracks: Vec<TrackSlots>,
}

/// 注册表构建器
///
/// 载入期使用；按 1-based 位置填槽，允许空洞，`build` 时压缩。
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    stages: Vec<StageSlots>,
    by_name: HashMap<String, usize>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记整张声明式阶段表
    pub fn add_table(&mut self, table: &StageTable) -> DiagnosticResult {
        let mut result = DiagnosticResult::new();
        for (stage, tracks) in table.iter() {
            for (label, effects) in tracks.iter() {
                self.ensure_track(stage, label);
                for (offset, &effect) in effects.iter().enumerate() {
                    if let SlotWrite::OutOfRange = self.register(stage, label, offset + 1, effect) {
                        result.push(Diagnostic::warn(
                            "stages table",
                            format!("阶段 '{}' 轨道 '{}' 超过最大长度，已截断", stage, label),
                        ));
                        break;
                    }
                }
            }
        }
        result
    }

    /// 在 `stage`/`label` 的第 `position` 位（1-based）登记效果
    ///
    /// 阶段与轨道在第一次引用时创建。
    pub fn register(
        &mut self,
        stage: &str,
        label: &str,
        position: usize,
        effect: EffectId,
    ) -> SlotWrite {
        if position == 0 || position > MAX_STAGE_POSITION {
            return SlotWrite::OutOfRange;
        }
        let track = self.ensure_track(stage, label);
        if track.slots.len() < position {
            track.slots.resize(position, None);
        }
        match track.slots[position - 1].replace(effect) {
            Some(previous) if previous != effect => SlotWrite::Replaced(previous),
            _ => SlotWrite::Filled,
        }
    }

    /// 读取某个槽位
    pub fn slot(&self, stage: &str, label: &str, position: usize) -> Option<EffectId> {
        let stage = &self.stages[*self.by_name.get(stage)?];
        let track = stage.tracks.iter().find(|t| t.label == label)?;
        track.slots.get(position.checked_sub(1)?).copied().flatten()
    }

    /// 设置阶段显示名，阶段不存在时返回 false
    pub fn set_abbreviation(&mut self, stage: &str, abbreviation: impl Into<String>) -> bool {
        match self.by_name.get(stage) {
            Some(&index) => {
                self.stages[index].abbreviation = Some(abbreviation.into());
                true
            }
            None => false,
        }
    }

    fn ensure_track(&mut self, stage: &str, label: &str) -> &mut TrackSlots {
        let index = match self.by_name.get(stage) {
            Some(&index) => index,
            None => {
                self.stages.push(StageSlots {
                    name: stage.to_string(),
                    abbreviation: None,
                    tracks: Vec::new(),
                });
                let index = self.stages.len() - 1;
                self.by_name.insert(stage.to_string(), index);
                index
            }
        };
        let tracks = &mut self.stages[index].tracks;
        let track_index = match tracks.iter().position(|t| t.label == label) {
            Some(i) => i,
            None => {
                tracks.push(TrackSlots {
                    label: label.to_string(),
                    slots: Vec::new(),
                });
                tracks.len() - 1
            }
        };
        &mut tracks[track_index]
    }

    /// 冻结为只读注册表
    ///
    /// - 轨道中的空槽被压缩（警告）
    /// - 同一效果登记在多个位置时，以第一次出现为准（错误）
    pub fn build(self) -> (StageRegistry, DiagnosticResult) {
        let mut result = DiagnosticResult::new();
        let mut stages = Vec::with_capacity(self.stages.len());
        let mut by_effect = HashMap::new();

        for (stage_index, stage) in self.stages.into_iter().enumerate() {
            let source = format!("stage {}", stage.name);
            let mut tracks = Vec::with_capacity(stage.tracks.len());

            for (track_index, track) in stage.tracks.into_iter().enumerate() {
                let gaps: Vec<usize> = track
                    .slots
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.is_none())
                    .map(|(i, _)| i + 1)
                    .collect();
                if !gaps.is_empty() {
                    result.push(
                        Diagnostic::warn(
                            &source,
                            format!("轨道 '{}' 存在空位，已压缩", track.label),
                        )
                        .with_detail(format!("空位: {:?}", gaps)),
                    );
                }

                let effects: Vec<EffectId> = track.slots.into_iter().flatten().collect();
                for (index, &effect) in effects.iter().enumerate() {
                    let placement = Placement {
                        stage: stage_index,
                        track: track_index,
                        index,
                    };
                    match by_effect.entry(effect) {
                        Entry::Vacant(slot) => {
                            slot.insert(placement);
                        }
                        Entry::Occupied(_) => {
                            result.push(Diagnostic::error(
                                &source,
                                format!(
                                    "效果 {} 被重复登记（轨道 '{}'），以第一次登记为准",
                                    effect, track.label
                                ),
                            ));
                        }
                    }
                }

                tracks.push(Track {
                    label: track.label,
                    effects,
                });
            }

            stages.push(StageDefinition {
                name: stage.name,
                abbreviation: stage.abbreviation,
                tracks,
            });
        }

        let registry = StageRegistry {
            stages,
            by_name: self.by_name,
            by_effect,
        };
        (registry, result)
    }
}

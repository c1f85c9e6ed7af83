//! # Display 模块
//!
//! 为 Host 的状态图标叠加层提供数据：阶段序号、阶段名与色调。
//! 绘制本身由 Host 完成。

use serde::{Deserialize, Serialize};

use crate::database::EffectId;
use crate::registry::{StageRegistry, labels};
use crate::subject::Subject;

/// 色调分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Positive,
    Negative,
    Neutral,
}

impl Tone {
    /// 由轨道标签决定：`pos`/`neg` 以外都视为中性
    pub fn from_label(label: &str) -> Self {
        match label {
            labels::POSITIVE => Self::Positive,
            labels::NEGATIVE => Self::Negative,
            _ => Self::Neutral,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_text() -> Option<String> {
    Some("max".to_string())
}

/// 显示选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions {
    /// 显示阶段序号
    #[serde(default = "default_true")]
    pub show_number: bool,
    /// 显示阶段名
    #[serde(default = "default_true")]
    pub show_name: bool,
    /// 最高阶段显示的文字（None 时显示序号）
    #[serde(default = "default_max_text")]
    pub max_text: Option<String>,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            show_number: true,
            show_name: true,
            max_text: default_max_text(),
        }
    }
}

/// 单个阶段效果的显示数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDisplay {
    pub effect: EffectId,
    /// 注册表中的阶段名
    pub stage: String,
    /// 显示名（缩写优先）
    pub label: String,
    /// 带符号等级；独立轨道为正数
    pub level: i64,
    /// 阶段序号（从 1 开始）
    pub stage_number: usize,
    pub is_max: bool,
    pub tone: Tone,
    pub track_len: usize,
}

impl StageDisplay {
    /// 序号文字；轨道少于两个效果时不显示
    pub fn number_text(&self, options: &DisplayOptions) -> Option<String> {
        if !options.show_number || self.track_len < 2 {
            return None;
        }
        match (&options.max_text, self.is_max) {
            (Some(text), true) => Some(text.clone()),
            _ => Some(self.stage_number.to_string()),
        }
    }

    pub fn name_text(&self, options: &DisplayOptions) -> Option<String> {
        options.show_name.then(|| self.label.clone())
    }
}

/// 查询持有者所有阶段效果的显示数据（按附加顺序）
pub fn query_stage_display(registry: &StageRegistry, subject: &Subject) -> Vec<StageDisplay> {
    subject
        .applied
        .iter()
        .filter_map(|&effect| {
            let placement = registry.locate(effect)?;
            let (stage, track) = registry.resolve(placement)?;
            let stage_number = placement.index + 1;
            let level = match placement.track {
                1 if stage.opposite_of(1).is_some() => -(stage_number as i64),
                _ => stage_number as i64,
            };
            Some(StageDisplay {
                effect,
                stage: stage.name().to_string(),
                label: stage.display_name().to_string(),
                level,
                stage_number,
                is_max: Some(placement.index) == track.last_index(),
                tone: Tone::from_label(track.label()),
                track_len: track.len(),
            })
        })
        .collect()
}

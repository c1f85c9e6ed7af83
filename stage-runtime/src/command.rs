//! # Command 模块
//!
//! 定义转换引擎向 Host 发出的指令。
//! 引擎只改写 [`Subject`](crate::subject::Subject) 的效果集合，
//! 弹窗、日志、动画等副作用由 Host 根据 Command 决定。
//!
//! ## 设计原则
//!
//! - **声明式**：Command 描述"发生了什么"，不描述"怎么表现"
//! - **有序**：同一次转换中移除总在附加之前
//! - **引擎无关**：不包含任何宿主类型

use serde::{Deserialize, Serialize};

use crate::database::EffectId;

/// 移除原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalCause {
    /// 阶段推进/回退中被替换（Host 通常不显示解除提示）
    Replaced,
    /// 与对侧轨道相互抵消
    Cancelled,
    /// 显式移除调用
    Purged,
}

/// 引擎指令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// 移除效果
    RemoveEffect { effect: EffectId, cause: RemovalCause },
    /// 附加效果
    AddEffect { effect: EffectId },
}

impl Command {
    pub fn remove(effect: EffectId, cause: RemovalCause) -> Self {
        Self::RemoveEffect { effect, cause }
    }

    pub fn add(effect: EffectId) -> Self {
        Self::AddEffect { effect }
    }

    /// 指令涉及的效果
    pub fn effect(&self) -> EffectId {
        match self {
            Self::RemoveEffect { effect, .. } | Self::AddEffect { effect } => *effect,
        }
    }

    /// Host 是否应当显示解除提示
    pub fn announces_removal(&self) -> bool {
        matches!(
            self,
            Self::RemoveEffect {
                cause: RemovalCause::Cancelled | RemovalCause::Purged,
                ..
            }
        )
    }
}

//! # AST 模块
//!
//! 备注指令的类型定义。
//!
//! ## 指令一览
//!
//! ```text
//! <Stage: ATK, pos, 1>                   登记当前记录
//! <Index: 2, 3, Copy: 1, Take: 2>        从当前记录派生新记录
//! <Adj_State: 2, name: "Bad Poison">     调整某一位置的记录字段
//! <Adj_Note, 2> ... </Adj_Note>          多行备注调整
//! <Abbr_Name: Venom>                     阶段显示名
//! ```

use crate::database::{AutoRemovalTiming, Restriction, TurnRange};

/// 指令
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// 把当前记录登记到 `stage`/`label` 的第 `position` 位
    Stage {
        stage: String,
        label: String,
        position: usize,
    },

    /// 派生新记录
    ///
    /// 每个 `positions` 条目派生一条子记录；`copy`/`take` 为父记录特性的 1-based 序号。
    Derive {
        positions: Vec<usize>,
        copy: Vec<usize>,
        take: Vec<usize>,
    },

    /// 调整某一位置记录的字段
    Adjust { position: usize, field: AdjustField },

    /// 阶段显示名
    AbbrName { name: String },
}

impl Directive {
    /// 指令关键字（用于诊断）
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Stage { .. } => "Stage",
            Self::Derive { .. } => "Index",
            Self::Adjust { .. } => "Adj_State",
            Self::AbbrName { .. } => "Abbr_Name",
        }
    }
}

/// 可调整的字段（值已钳制）
#[derive(Debug, Clone, PartialEq)]
pub enum AdjustField {
    Name(String),
    Icon(u32),
    Note(String),
    Restrict(Restriction),
    /// 0-100
    Priority(u8),
    RemoveAtEnd(bool),
    RemoveOnRestriction(bool),
    RemoveAuto(AutoRemovalTiming),
    RemoveTurn(TurnRange),
    /// 0 表示禁用
    RemoveByDamage(u8),
    /// 0 表示禁用
    RemoveByWalk(u32),
    /// msg1..msg4
    Message(u8, String),
}

/// 带行号的指令
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedDirective {
    pub directive: Directive,
    /// 备注中的起始行号（从 1 开始）
    pub line: usize,
}

//! # Error 模块
//!
//! 定义 stage-runtime 中使用的错误类型。
//!
//! 载入阶段的大部分问题不是错误而是诊断（见 [`crate::diagnostic`]），
//! 这里只保留真正需要调用方处理的情况。

use thiserror::Error;

/// 指令解析错误
///
/// 单条标签解析失败时产生。解析器会把它降级为警告并跳过该指令。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectiveError {
    /// 无效的标签格式
    #[error("第 {line} 行：无效的标签 - {message}")]
    InvalidTag { line: usize, message: String },

    /// 缺少必需参数
    #[error("第 {line} 行：指令 '{directive}' 缺少参数 '{param}'")]
    MissingParameter {
        line: usize,
        directive: String,
        param: String,
    },

    /// 无效的参数值
    #[error("第 {line} 行：参数 '{param}' 的值无效 - {message}")]
    InvalidParameter {
        line: usize,
        param: String,
        message: String,
    },

    /// 多行块未闭合
    #[error("第 {line} 行：'{directive}' 块未闭合")]
    UnclosedBlock { line: usize, directive: String },
}

impl DirectiveError {
    /// 出错的行号（从 1 开始）
    pub fn line(&self) -> usize {
        match self {
            Self::InvalidTag { line, .. }
            | Self::MissingParameter { line, .. }
            | Self::InvalidParameter { line, .. }
            | Self::UnclosedBlock { line, .. } => *line,
        }
    }
}

/// 载入错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// 数据库 JSON 无法解析
    #[error("数据库 JSON 无效: {message}")]
    InvalidJson { message: String },

    /// 同一类记录中出现重复 ID
    #[error("{kind} 中存在重复 ID {id}")]
    DuplicateId { kind: String, id: u32 },
}

/// 运行时错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    /// 阶段未找到
    #[error("阶段 '{stage}' 未找到")]
    UnknownStage { stage: String },

    /// 阶段中没有该轨道
    #[error("阶段 '{stage}' 中没有轨道 '{label}'")]
    UnknownTrack { stage: String, label: String },
}

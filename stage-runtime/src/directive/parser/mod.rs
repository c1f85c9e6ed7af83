//! # Parser 模块
//!
//! 两阶段备注解析器实现（手写，无 regex 依赖）。
//!
//! ## 架构
//!
//! ```text
//! 备注文本 → [阶段1: 片段识别] → Vec<Segment> → [阶段2: 片段解析] → Vec<LocatedDirective>
//!                   │
//!                   └─ 字节区间 → 剥离后的备注
//! ```
//!
//! ## 设计原则
//!
//! - 使用手写的字符串解析函数，避免正则表达式
//! - 容错解析：无效标签记录警告并跳过，但仍从备注中剥离
//! - 不认识的标签原样保留
//!
//! ## 模块结构
//!
//! - `helpers`: 辅助解析函数
//! - `phase1`: 片段识别
//! - `phase2`: 片段解析

mod helpers;
mod phase1;
mod phase2;

#[cfg(test)]
mod tests;

use crate::directive::ast::LocatedDirective;
use crate::error::DirectiveError;

use phase1::recognize_segments;
use phase2::parse_segment;

pub use helpers::{parse_bool, starts_with_ignore_case, unquote};
pub use phase2::parse_field;

/// 解析结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedNote {
    /// 剥离指令后的备注
    pub note: String,
    /// 按出现顺序排列的指令
    pub directives: Vec<LocatedDirective>,
    /// 被跳过的无效指令
    pub warnings: Vec<DirectiveError>,
}

/// 解析一条备注
///
/// # 参数
///
/// - `text`: 原始备注文本
///
/// # 返回
///
/// 指令列表、警告，以及剥离全部指令标签（包括无效标签）后的备注。
/// 备注中没有任何指令标签时，原样返回。
pub fn parse_note(text: &str) -> ParsedNote {
    let segments = recognize_segments(text);
    if segments.is_empty() {
        return ParsedNote {
            note: text.to_string(),
            ..ParsedNote::default()
        };
    }

    let mut directives = Vec::new();
    let mut warnings = Vec::new();
    for segment in &segments {
        match parse_segment(segment) {
            Ok(directive) => directives.push(LocatedDirective {
                directive,
                line: segment.line(),
            }),
            Err(e) => warnings.push(e),
        }
    }

    let spans: Vec<_> = segments.iter().map(|s| s.span()).collect();
    ParsedNote {
        note: helpers::strip_spans(text, &spans),
        directives,
        warnings,
    }
}

//! # Directive 模块
//!
//! 效果记录备注中的阶段指令：定义、解析与剥离。
//!
//! ## 模块结构
//!
//! - [`ast`]：指令类型定义
//! - [`parser`]：两阶段备注解析器实现

pub mod ast;
pub mod parser;

pub use ast::*;
pub use parser::{ParsedNote, parse_note};

//! # Runtime 模块
//!
//! 阶段转换的运行期部分：转换引擎与面向 Host 的脚本调用。
//!
//! ## 模块结构
//!
//! - [`engine`]：核心转换引擎
//! - [`calls`]：按持有者封装的脚本调用

pub mod calls;
pub mod engine;

pub use calls::{ScriptCall, ScriptCalls};
pub use engine::TransitionEngine;

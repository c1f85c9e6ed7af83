//! # Stage Runtime
//!
//! 阶段效果（状态分级）的核心运行时库。
//!
//! ## 架构概述
//!
//! `stage-runtime` 是纯逻辑核心，不依赖任何 IO。
//! 载入期改写数据库并冻结注册表；运行期通过 **命令驱动模式** 与宿主层（Host）通信：
//!
//! ```text
//! Host                               Runtime
//!   │                                   │
//!   │──── Database (JSON) ─────────────►│ load()
//!   │◄─── StageData { database, registry, diagnostics }
//!   │                                   │
//!   │──── apply(subject, effect) ──────►│ TransitionEngine
//!   │◄─── Vec<Command> ─────────────────│
//!   │                                   │
//! ```
//!
//! ## 核心类型
//!
//! - [`StageRegistry`]：阶段名 → 有序轨道，载入后只读
//! - [`TransitionEngine`]：附加/移除效果时的阶段转换
//! - [`Command`]：Runtime 向 Host 发出的指令
//! - [`Subject`]：效果持有者
//! - [`DiagnosticResult`]：载入期的非致命问题
//!
//! ## 使用示例
//!
//! ```ignore
//! use stage_runtime::{Subject, TransitionEngine, load_json};
//!
//! let data = load_json(&text)?;
//! data.diagnostics.emit();
//!
//! let engine = TransitionEngine::new(&data.registry);
//! let mut hero = Subject::new("Eric");
//! for cmd in engine.apply(&mut hero, EffectId(20)) {
//!     host.execute(cmd);
//! }
//! ```
//!
//! ## 模块结构
//!
//! - [`database`]：数据模型
//! - [`registry`]：阶段注册表与构建器
//! - [`directive`]：备注指令（AST 和 Parser）
//! - [`declaration`]：把指令应用到数据库
//! - [`collapse`]：合并重复条目
//! - [`loader`]：载入管线
//! - [`runtime`]：转换引擎与脚本调用
//! - [`display`]：图标叠加层查询
//! - [`diagnostic`]：载入期诊断
//! - [`error`]：错误类型定义

pub mod collapse;
pub mod command;
pub mod database;
pub mod declaration;
pub mod diagnostic;
pub mod directive;
pub mod display;
pub mod error;
pub mod loader;
pub mod registry;
pub mod runtime;
pub mod subject;

// 重导出核心类型
pub use collapse::{MAGNITUDE_CAP, collapse_database};
pub use command::{Command, RemovalCause};
pub use database::{
    ActionEffect, Database, EffectId, EffectRecord, Feature, FeatureBearer, UsableItem,
};
pub use declaration::DeclarationParser;
pub use diagnostic::{Diagnostic, DiagnosticLevel, DiagnosticResult, analyze_registry};
pub use directive::{Directive, ParsedNote, parse_note};
pub use display::{DisplayOptions, StageDisplay, Tone, query_stage_display};
pub use error::{DirectiveError, LoadError, StageError};
pub use loader::{StageData, load, load_json};
pub use registry::{
    Placement, RegistryBuilder, StageDefinition, StageRegistry, StageTable, Track,
};
pub use runtime::{ScriptCall, ScriptCalls, TransitionEngine};
pub use subject::Subject;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        // 验证所有公共类型都可以正常使用
        let _cmd = Command::add(EffectId(1));
        let _subject = Subject::new("Eric");
        let _options = DisplayOptions::default();
        let _call = ScriptCall::PurgeStates;

        let data = load(Database::default());
        assert!(data.registry.is_empty());
        let _engine = TransitionEngine::new(&data.registry);
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StageRegistry>();
        assert_send_sync::<StageData>();
    }
}

//! # Loader 模块
//!
//! 载入管线：
//!
//! ```text
//! Database ─► 阶段表登记 ─► 备注声明 ─► 冻结注册表 ─► 合并重复条目 ─► 注册表分析
//! ```
//!
//! 管线消耗输入数据库并返回新的数据库；对同一份源数据重复载入，结果完全相同。

use crate::collapse::collapse_database;
use crate::database::Database;
use crate::declaration::DeclarationParser;
use crate::diagnostic::{DiagnosticResult, analyze_registry};
use crate::error::LoadError;
use crate::registry::{RegistryBuilder, StageRegistry};

/// 载入结果
#[derive(Debug, Clone, PartialEq)]
pub struct StageData {
    /// 改写后的数据库（含派生记录、已剥离的备注、已合并的条目）
    pub database: Database,
    /// 冻结的注册表
    pub registry: StageRegistry,
    /// 载入期诊断
    pub diagnostics: DiagnosticResult,
}

/// 执行完整载入管线
pub fn load(mut database: Database) -> StageData {
    let source_states = database.states.len();

    let mut builder = RegistryBuilder::new();
    let mut diagnostics = builder.add_table(&database.stages);
    diagnostics.merge(DeclarationParser::new(&mut database, &mut builder).run());

    let (registry, build_diagnostics) = builder.build();
    diagnostics.merge(build_diagnostics);

    let collapsed = collapse_database(&registry, &mut database);
    diagnostics.merge(analyze_registry(&registry));

    tracing::info!(
        stages = registry.len(),
        derived = database.states.len() - source_states,
        collapsed,
        warnings = diagnostics.warn_count(),
        errors = diagnostics.error_count(),
        "stage data loaded"
    );

    StageData {
        database,
        registry,
        diagnostics,
    }
}

/// 从 JSON 文本载入
pub fn load_json(text: &str) -> Result<StageData, LoadError> {
    Database::from_json(text).map(load)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::EffectId;

    const SOURCE: &str = r#"{
        "states": [
            { "id": 1, "name": "Poison", "note": "<Stage: PSN, neg, 1>\n<Index: 2, Copy: 1>" ,
              "features": [{ "code": 22, "data_id": 7, "value": -0.1 }] },
            { "id": 5, "name": "Guard Up", "note": "" }
        ],
        "skills": [
            { "id": 1, "effects": [
                { "code": 21, "data_id": 1, "value1": 1.0 },
                { "code": 21, "data_id": 1, "value1": 1.0 }
            ] }
        ],
        "stages": { "DEF": { "pos": [5] } }
    }"#;

    #[test]
    fn test_load_pipeline() {
        let data = load_json(SOURCE).unwrap();

        assert_eq!(data.registry.len(), 2);
        assert_eq!(data.registry.stage(0).unwrap().name(), "DEF");
        assert_eq!(data.database.next_state_id(), Some(EffectId(7)));
        let child = data.database.state(EffectId(6)).unwrap();
        assert_eq!(child.name, "Poison");
        assert_eq!(child.features.len(), 1);
        assert_eq!(data.database.skills[0].effects.len(), 1);
        assert_eq!(data.database.skills[0].effects[0].data_id, 6);
        assert!(!data.diagnostics.has_errors());
    }

    #[test]
    fn test_load_is_idempotent() {
        let first = load_json(SOURCE).unwrap();
        let second = load_json(SOURCE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        assert!(load_json(r#"{ "states": 3 }"#).is_err());
    }
}

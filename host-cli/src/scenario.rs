//! # Scenario 模块
//!
//! 脚本战斗场景：一组持有者和按回合排列的脚本调用。
//!
//! ```json
//! {
//!   "seed": 7,
//!   "subjects": [{ "name": "Eric" }, { "name": "Slime", "applied": [4] }],
//!   "rounds": [
//!     { "subject": "Eric", "calls": [{ "call": "add_state", "effect": 1 }] }
//!   ]
//! }
//! ```

use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use stage_runtime::{
    Command, Database, DisplayOptions, EffectId, ScriptCall, ScriptCalls, StageData, Subject,
    TransitionEngine, query_stage_display,
};
use std::path::Path;

/// 单个回合：对某个持有者依次执行的调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub subject: String,
    #[serde(default)]
    pub calls: Vec<ScriptCall>,
}

/// 场景文件
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// 随机种子（概率阶段用）
    pub seed: Option<u64>,
    pub subjects: Vec<Subject>,
    pub rounds: Vec<Round>,
}

impl Scenario {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取场景文件 {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("场景文件无效 {}", path.display()))
    }
}

/// 执行场景，返回逐行输出
///
/// 持有者在场景结束后的状态留在 `scenario.subjects` 中。
pub fn simulate(
    data: &StageData,
    scenario: &mut Scenario,
    options: &DisplayOptions,
    seed_override: Option<u64>,
) -> anyhow::Result<Vec<String>> {
    let seed = seed_override.or(scenario.seed).unwrap_or(0);
    let mut rng = StdRng::seed_from_u64(seed);
    let engine = TransitionEngine::new(&data.registry);
    let mut lines = Vec::new();

    tracing::info!(seed, rounds = scenario.rounds.len(), "simulation started");

    for (number, round) in scenario.rounds.iter().enumerate() {
        let subject = scenario
            .subjects
            .iter_mut()
            .find(|s| s.name == round.subject)
            .with_context(|| format!("第 {} 回合：未知的持有者 '{}'", number + 1, round.subject))?;

        lines.push(format!("== 回合 {}: {} ==", number + 1, subject.name));
        let mut calls = ScriptCalls::new(engine, subject, &mut rng);
        for call in &round.calls {
            let commands = calls
                .dispatch(call)
                .with_context(|| format!("第 {} 回合：调用 {:?} 失败", number + 1, call))?;
            if commands.is_empty() {
                lines.push("  (无变化)".to_string());
            }
            for command in &commands {
                lines.push(format!("  {}", describe(&data.database, command)));
            }
        }
        lines.push(format!("  持有: {}", overlay(data, calls.subject(), options)));
    }

    Ok(lines)
}

fn state_name(database: &Database, effect: EffectId) -> String {
    database
        .state(effect)
        .map(|record| record.name.clone())
        .unwrap_or_else(|| format!("#{}", effect))
}

/// 一条指令的可读描述；需要提示时附带解除消息
fn describe(database: &Database, command: &Command) -> String {
    let name = state_name(database, command.effect());
    match command {
        Command::AddEffect { effect } => format!("+ {} ({})", name, effect),
        Command::RemoveEffect { effect, cause } => {
            let message = database
                .state(*effect)
                .map(|record| record.messages.removed.as_str())
                .filter(|text| command.announces_removal() && !text.is_empty());
            match message {
                Some(text) => format!("- {} ({}) [{:?}] {}", name, effect, cause, text),
                None => format!("- {} ({}) [{:?}]", name, effect, cause),
            }
        }
    }
}

/// 持有者当前效果的叠加层文字
fn overlay(data: &StageData, subject: &Subject, options: &DisplayOptions) -> String {
    let staged = query_stage_display(&data.registry, subject);
    let parts: Vec<String> = subject
        .applied
        .iter()
        .map(|&effect| {
            let name = state_name(&data.database, effect);
            let Some(display) = staged.iter().find(|d| d.effect == effect) else {
                return name;
            };
            let badge: Vec<String> = [display.name_text(options), display.number_text(options)]
                .into_iter()
                .flatten()
                .collect();
            if badge.is_empty() {
                name
            } else {
                format!("{} <{}>", name, badge.join(" "))
            }
        })
        .collect();

    if parts.is_empty() {
        "(无)".to_string()
    } else {
        parts.join(", ")
    }
}

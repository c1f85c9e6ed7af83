//! # Calls 模块
//!
//! 面向 Host 的脚本调用，每次调用作用于一个持有者。
//!
//! ```text
//! purge_states()                       移除全部阶段效果
//! neg_removal() / pos_removal() / neu_removal()
//! type_removal(label)                  按轨道标签移除
//! state_removal(stage, label)          移除某阶段某轨道
//! stage(stage, label, step_count, chance)
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::engine::TransitionEngine;
use crate::command::Command;
use crate::database::EffectId;
use crate::error::StageError;
use crate::registry::labels;
use crate::subject::Subject;

fn default_step_count() -> usize {
    1
}

fn default_chance() -> u32 {
    100
}

/// 可序列化的脚本调用（供场景文件、事件脚本使用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ScriptCall {
    /// 附加效果（代替 Host 的原始附加）
    AddState { effect: EffectId },
    PurgeStates,
    NegRemoval,
    PosRemoval,
    NeuRemoval,
    TypeRemoval {
        label: String,
    },
    StateRemoval {
        stage: String,
        label: String,
    },
    Stage {
        stage: String,
        label: String,
        #[serde(default = "default_step_count")]
        step_count: usize,
        #[serde(default = "default_chance")]
        chance: u32,
    },
}

/// 绑定到单个持有者的脚本调用
pub struct ScriptCalls<'a, R: Rng> {
    engine: TransitionEngine<'a>,
    subject: &'a mut Subject,
    rng: &'a mut R,
}

impl<'a, R: Rng> ScriptCalls<'a, R> {
    pub fn new(engine: TransitionEngine<'a>, subject: &'a mut Subject, rng: &'a mut R) -> Self {
        Self {
            engine,
            subject,
            rng,
        }
    }

    pub fn subject(&self) -> &Subject {
        self.subject
    }

    pub fn add_state(&mut self, effect: EffectId) -> Vec<Command> {
        self.engine.apply(self.subject, effect)
    }

    pub fn purge_states(&mut self) -> Vec<Command> {
        self.engine.purge_all(self.subject)
    }

    pub fn neg_removal(&mut self) -> Vec<Command> {
        self.type_removal(labels::NEGATIVE)
    }

    pub fn pos_removal(&mut self) -> Vec<Command> {
        self.type_removal(labels::POSITIVE)
    }

    pub fn neu_removal(&mut self) -> Vec<Command> {
        self.type_removal(labels::NEUTRAL)
    }

    pub fn type_removal(&mut self, label: &str) -> Vec<Command> {
        self.engine.remove_by_track_label(self.subject, label)
    }

    pub fn state_removal(&mut self, stage: &str, label: &str) -> Result<Vec<Command>, StageError> {
        self.engine.remove_in_stage(self.subject, stage, label)
    }

    pub fn stage(
        &mut self,
        stage: &str,
        label: &str,
        step_count: usize,
        chance: u32,
    ) -> Result<Vec<Command>, StageError> {
        self.engine
            .stage(self.subject, stage, label, step_count, chance, &mut *self.rng)
    }

    /// 执行一条可序列化的调用
    pub fn dispatch(&mut self, call: &ScriptCall) -> Result<Vec<Command>, StageError> {
        match call {
            ScriptCall::AddState { effect } => Ok(self.add_state(*effect)),
            ScriptCall::PurgeStates => Ok(self.purge_states()),
            ScriptCall::NegRemoval => Ok(self.neg_removal()),
            ScriptCall::PosRemoval => Ok(self.pos_removal()),
            ScriptCall::NeuRemoval => Ok(self.neu_removal()),
            ScriptCall::TypeRemoval { label } => Ok(self.type_removal(label)),
            ScriptCall::StateRemoval { stage, label } => self.state_removal(stage, label),
            ScriptCall::Stage {
                stage,
                label,
                step_count,
                chance,
            } => self.stage(stage, label, *step_count, *chance),
        }
    }
}

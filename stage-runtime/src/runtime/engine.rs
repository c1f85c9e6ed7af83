//! # Engine 模块
//!
//! 阶段转换引擎。
//!
//! ## 执行模型
//!
//! ```text
//! apply(subject, effect) -> Vec<Command>
//! ```
//!
//! 1. 在注册表中定位效果（阶段、轨道、索引）
//! 2. 计算幅度 `m = index + step_count`
//! 3. 根据持有者在同一阶段中已持有的效果决定结果
//! 4. 改写持有者的效果集合，并返回对应的 Command（移除在前，附加在后）
//!
//! ## 相互作用的轨道
//!
//! 以对侧持有索引 `j` 计算新等级 `L = m - (j + 1)`：
//!
//! | L | 结果 |
//! |---|---|
//! | 0 | 抵消：只移除对侧效果 |
//! | > 0 | 移除对侧，附加本轨道 `min(L-1, last)` |
//! | < 0 | 移除对侧，附加对侧轨道 `-L-1` |

use rand::Rng;

use crate::command::{Command, RemovalCause};
use crate::database::EffectId;
use crate::error::StageError;
use crate::registry::{Placement, StageRegistry};
use crate::subject::Subject;

/// 阶段转换引擎
///
/// 只读借用注册表；所有状态都在 [`Subject`] 上。
///
/// # 使用示例
///
/// ```ignore
/// let data = stage_runtime::load_json(text)?;
/// let engine = TransitionEngine::new(&data.registry);
///
/// let commands = engine.apply(&mut subject, EffectId(20));
/// for cmd in commands {
///     host.execute(cmd);
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TransitionEngine<'r> {
    registry: &'r StageRegistry,
}

impl<'r> TransitionEngine<'r> {
    pub fn new(registry: &'r StageRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r StageRegistry {
        self.registry
    }

    /// 附加一个效果（一步）
    pub fn apply(&self, subject: &mut Subject, effect: EffectId) -> Vec<Command> {
        self.apply_steps(subject, effect, 1)
    }

    /// 附加一个效果，推进 `step_count` 步
    ///
    /// 不属于任何阶段的效果直接附加。
    pub fn apply_steps(
        &self,
        subject: &mut Subject,
        effect: EffectId,
        step_count: usize,
    ) -> Vec<Command> {
        let Some(placement) = self.registry.locate(effect) else {
            tracing::debug!(subject = %subject.name, effect = %effect, "plain add");
            let commands = vec![Command::add(effect)];
            subject.execute(&commands);
            return commands;
        };

        let magnitude = placement.index.saturating_add(step_count);
        self.transition(subject, placement.stage, placement.track, magnitude)
    }

    /// 按名称推进某一阶段的某条轨道
    ///
    /// 先掷 `0..100`，小于 `chance` 才执行；幅度为 `step_count`。
    pub fn stage(
        &self,
        subject: &mut Subject,
        stage: &str,
        label: &str,
        step_count: usize,
        chance: u32,
        rng: &mut impl Rng,
    ) -> Result<Vec<Command>, StageError> {
        let (stage_index, track_index) = self.resolve_track(stage, label)?;

        let roll: u32 = rng.random_range(0..100);
        if roll >= chance {
            tracing::debug!(subject = %subject.name, stage, label, roll, chance, "stage roll failed");
            return Ok(Vec::new());
        }
        Ok(self.transition(subject, stage_index, track_index, step_count))
    }

    /// 移除全部阶段效果
    pub fn purge_all(&self, subject: &mut Subject) -> Vec<Command> {
        self.remove_where(subject, |_| true)
    }

    /// 移除所有阶段中标签为 `label` 的轨道上的效果
    pub fn remove_by_track_label(&self, subject: &mut Subject, label: &str) -> Vec<Command> {
        self.remove_where(subject, |placement| {
            self.registry
                .resolve(placement)
                .is_some_and(|(_, track)| track.label() == label)
        })
    }

    /// 移除某一阶段某条轨道上的效果
    pub fn remove_in_stage(
        &self,
        subject: &mut Subject,
        stage: &str,
        label: &str,
    ) -> Result<Vec<Command>, StageError> {
        let (stage_index, track_index) = self.resolve_track(stage, label)?;
        Ok(self.remove_where(subject, |placement| {
            placement.stage == stage_index && placement.track == track_index
        }))
    }

    /// 相互作用轨道上的带符号等级
    ///
    /// `+k` 为第一条轨道索引 `k-1`，`-k` 为第二条轨道索引 `k-1`，`0` 为都未持有。
    pub fn level(&self, subject: &Subject, stage: &str) -> Result<i64, StageError> {
        let (stage_index, _) = self
            .registry
            .stage_by_name(stage)
            .ok_or_else(|| StageError::UnknownStage {
                stage: stage.to_string(),
            })?;

        let level = |track: usize| {
            self.strongest_held(subject, stage_index, track)
                .map(|(index, _)| index as i64 + 1)
        };
        Ok(match (level(0), level(1)) {
            (Some(k), _) => k,
            (None, Some(k)) => -k,
            (None, None) => 0,
        })
    }

    /// 某条轨道上持有效果的索引（独立轨道用）
    pub fn track_index(
        &self,
        subject: &Subject,
        stage: &str,
        label: &str,
    ) -> Result<Option<usize>, StageError> {
        let (stage_index, track_index) = self.resolve_track(stage, label)?;
        Ok(self
            .strongest_held(subject, stage_index, track_index)
            .map(|(index, _)| index))
    }

    // =========================================================================
    // 内部实现
    // =========================================================================

    fn resolve_track(&self, stage: &str, label: &str) -> Result<(usize, usize), StageError> {
        let (stage_index, definition) =
            self.registry
                .stage_by_name(stage)
                .ok_or_else(|| StageError::UnknownStage {
                    stage: stage.to_string(),
                })?;
        let (track_index, _) =
            definition
                .track_by_label(label)
                .ok_or_else(|| StageError::UnknownTrack {
                    stage: stage.to_string(),
                    label: label.to_string(),
                })?;
        Ok((stage_index, track_index))
    }

    /// 持有者在某条轨道上持有的全部效果 `(索引, 效果)`
    fn held_on(&self, subject: &Subject, stage: usize, track: usize) -> Vec<(usize, EffectId)> {
        subject
            .applied
            .iter()
            .filter_map(|&effect| {
                let placement = self.registry.locate(effect)?;
                (placement.stage == stage && placement.track == track)
                    .then_some((placement.index, effect))
            })
            .collect()
    }

    fn strongest_held(
        &self,
        subject: &Subject,
        stage: usize,
        track: usize,
    ) -> Option<(usize, EffectId)> {
        self.held_on(subject, stage, track)
            .into_iter()
            .max_by_key(|(index, _)| *index)
    }

    /// 核心转换
    fn transition(
        &self,
        subject: &mut Subject,
        stage: usize,
        track: usize,
        magnitude: usize,
    ) -> Vec<Command> {
        let Some(definition) = self.registry.stage(stage) else {
            return Vec::new();
        };
        let Some(incoming) = definition.track(track) else {
            return Vec::new();
        };
        let Some(last) = incoming.last_index() else {
            return Vec::new();
        };
        if magnitude == 0 {
            return Vec::new();
        }
        // 超过两条轨道长度之和的幅度结果相同
        let opposite_len = definition
            .opposite_of(track)
            .and_then(|opposite| definition.track(opposite))
            .map_or(0, |t| t.len());
        let magnitude = magnitude.min(last + opposite_len + 1);

        let held_same = self.held_on(subject, stage, track);
        let opposite = definition.opposite_of(track).and_then(|opposite| {
            let held = self.held_on(subject, stage, opposite);
            (!held.is_empty()).then_some((opposite, held))
        });

        let mut commands = Vec::new();

        if let Some((opposite, held_opposite)) = opposite {
            let j = held_opposite.iter().map(|(index, _)| *index).max().unwrap_or(0);
            let level = magnitude as i64 - (j as i64 + 1);
            let cause = if level == 0 {
                RemovalCause::Cancelled
            } else {
                RemovalCause::Replaced
            };

            for &(_, effect) in &held_opposite {
                commands.push(Command::remove(effect, cause));
            }
            for &(_, effect) in &held_same {
                commands.push(Command::remove(effect, RemovalCause::Replaced));
            }

            if level > 0 {
                let index = (level as usize - 1).min(last);
                commands.extend(incoming.get(index).map(Command::add));
            } else if level < 0 {
                let index = (-level - 1) as usize;
                commands.extend(
                    definition
                        .track(opposite)
                        .and_then(|t| t.get(index))
                        .map(Command::add),
                );
            }
            tracing::debug!(
                subject = %subject.name,
                stage = definition.name(),
                held = j,
                magnitude,
                level,
                "cross-track transition"
            );
        } else if let Some(&(i, _)) = held_same.iter().max_by_key(|(index, _)| *index) {
            if i == last {
                // 已在最高阶段：只清理多余的持有
                for &(index, effect) in &held_same {
                    if index != i {
                        commands.push(Command::remove(effect, RemovalCause::Replaced));
                    }
                }
            } else {
                for &(_, effect) in &held_same {
                    commands.push(Command::remove(effect, RemovalCause::Replaced));
                }
                commands.extend(
                    incoming
                        .get(i.saturating_add(magnitude).min(last))
                        .map(Command::add),
                );
            }
            tracing::debug!(
                subject = %subject.name,
                stage = definition.name(),
                held = i,
                magnitude,
                "same-track transition"
            );
        } else {
            commands.extend(incoming.get((magnitude - 1).min(last)).map(Command::add));
            tracing::debug!(
                subject = %subject.name,
                stage = definition.name(),
                magnitude,
                "fresh transition"
            );
        }

        subject.execute(&commands);
        commands
    }

    fn remove_where(
        &self,
        subject: &mut Subject,
        matches: impl Fn(Placement) -> bool,
    ) -> Vec<Command> {
        let commands: Vec<Command> = subject
            .applied
            .iter()
            .filter(|&&effect| self.registry.locate(effect).is_some_and(&matches))
            .map(|&effect| Command::remove(effect, RemovalCause::Purged))
            .collect();
        subject.execute(&commands);
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const A: [EffectId; 3] = [EffectId(1), EffectId(2), EffectId(3)];
    const B: [EffectId; 3] = [EffectId(11), EffectId(12), EffectId(13)];

    /// ATK: pos = A, neg = B, bob = [21, 22]
    fn registry() -> StageRegistry {
        let mut builder = RegistryBuilder::new();
        for i in 0..3 {
            builder.register("ATK", "pos", i + 1, A[i]);
            builder.register("ATK", "neg", i + 1, B[i]);
        }
        builder.register("ATK", "bob", 1, EffectId(21));
        builder.register("ATK", "bob", 2, EffectId(22));
        builder.register("PSN", "neg", 1, EffectId(31));
        builder.register("PSN", "neg", 2, EffectId(32));
        builder.build().0
    }

    fn holding(effects: &[EffectId]) -> Subject {
        Subject {
            name: "Eric".to_string(),
            applied: effects.to_vec(),
        }
    }

    #[test]
    fn test_progress_to_last_then_noop() {
        let registry = registry();
        let engine = TransitionEngine::new(&registry);
        let mut subject = holding(&[]);

        assert_eq!(engine.apply(&mut subject, A[0]), vec![Command::add(A[0])]);
        assert_eq!(
            engine.apply(&mut subject, A[0]),
            vec![
                Command::remove(A[0], RemovalCause::Replaced),
                Command::add(A[1])
            ]
        );
        engine.apply(&mut subject, A[0]);
        assert_eq!(subject.applied, vec![A[2]]);

        assert!(engine.apply(&mut subject, A[0]).is_empty());
        assert_eq!(subject.applied, vec![A[2]]);
    }

    #[test]
    fn test_cancel_and_cross() {
        let registry = registry();
        let engine = TransitionEngine::new(&registry);
        let mut subject = holding(&[A[1]]);

        engine.apply(&mut subject, B[0]);
        assert_eq!(subject.applied, vec![A[0]]);

        assert_eq!(
            engine.apply(&mut subject, B[0]),
            vec![Command::remove(A[0], RemovalCause::Cancelled)]
        );
        assert!(subject.applied.is_empty());

        engine.apply(&mut subject, B[0]);
        assert_eq!(subject.applied, vec![B[0]]);
    }

    #[test]
    fn test_strong_incoming_overshoots() {
        let registry = registry();
        let engine = TransitionEngine::new(&registry);
        // 持有 A0，附加 B2：m = 3，L = 3 - 1 = 2 → B1
        let mut subject = holding(&[A[0]]);
        engine.apply(&mut subject, B[2]);
        assert_eq!(subject.applied, vec![B[1]]);

        // 持有 A2，附加 B1：m = 2，L = 2 - 3 = -1 → A0
        let mut subject = holding(&[A[2]]);
        engine.apply(&mut subject, B[1]);
        assert_eq!(subject.applied, vec![A[0]]);
    }

    #[test]
    fn test_fresh_and_same_track_use_magnitude() {
        let registry = registry();
        let engine = TransitionEngine::new(&registry);

        let mut subject = holding(&[]);
        engine.apply(&mut subject, A[1]);
        assert_eq!(subject.applied, vec![A[1]]);

        // 持有 A1，附加 A1：m = 2 → min(1 + 2, 2) = A2
        engine.apply(&mut subject, A[1]);
        assert_eq!(subject.applied, vec![A[2]]);

        let mut subject = holding(&[]);
        engine.apply_steps(&mut subject, A[0], 5);
        assert_eq!(subject.applied, vec![A[2]]);

        assert!(engine.apply_steps(&mut holding(&[]), A[0], 0).is_empty());
    }

    #[test]
    fn test_huge_step_count_saturates() {
        let registry = registry();
        let engine = TransitionEngine::new(&registry);

        let mut subject = holding(&[A[1]]);
        engine.apply_steps(&mut subject, A[1], usize::MAX);
        assert_eq!(subject.applied, vec![A[2]]);

        // 正向推进压过对侧
        let mut rng = StdRng::seed_from_u64(1);
        let mut subject = holding(&[B[0]]);
        assert_eq!(
            engine
                .stage(&mut subject, "ATK", "pos", usize::MAX, 100, &mut rng)
                .unwrap(),
            vec![
                Command::remove(B[0], RemovalCause::Replaced),
                Command::add(A[2])
            ]
        );

        let mut subject = holding(&[]);
        engine.apply_steps(&mut subject, EffectId(21), usize::MAX);
        assert_eq!(subject.applied, vec![EffectId(22)]);
    }

    #[test]
    fn test_extra_held_effects_are_removed() {
        let registry = registry();
        let engine = TransitionEngine::new(&registry);
        let mut subject = holding(&[A[0], B[1], B[0]]);

        engine.apply(&mut subject, A[0]);
        // 对侧最强为 B1：L = 1 - 2 = -1 → B0，A0 与 B1 都被移除
        assert_eq!(subject.applied, vec![B[0]]);
    }

    #[test]
    fn test_independent_track() {
        let registry = registry();
        let engine = TransitionEngine::new(&registry);
        let mut subject = holding(&[A[1]]);

        engine.apply(&mut subject, EffectId(21));
        assert_eq!(subject.applied, vec![A[1], EffectId(21)]);
        engine.apply(&mut subject, EffectId(21));
        assert_eq!(subject.applied, vec![A[1], EffectId(22)]);
        assert_eq!(engine.track_index(&subject, "ATK", "bob"), Ok(Some(1)));
    }

    #[test]
    fn test_unknown_effect_plain_add() {
        let registry = registry();
        let engine = TransitionEngine::new(&registry);
        let mut subject = holding(&[]);

        assert_eq!(
            engine.apply(&mut subject, EffectId(99)),
            vec![Command::add(EffectId(99))]
        );
        assert_eq!(subject.applied, vec![EffectId(99)]);
    }

    #[test]
    fn test_level() {
        let registry = registry();
        let engine = TransitionEngine::new(&registry);

        assert_eq!(engine.level(&holding(&[A[2]]), "ATK"), Ok(3));
        assert_eq!(engine.level(&holding(&[B[0]]), "ATK"), Ok(-1));
        assert_eq!(engine.level(&holding(&[EffectId(21)]), "ATK"), Ok(0));
        assert!(matches!(
            engine.level(&holding(&[]), "NOPE"),
            Err(StageError::UnknownStage { .. })
        ));
    }

    #[test]
    fn test_removals() {
        let registry = registry();
        let engine = TransitionEngine::new(&registry);
        let mut subject = holding(&[A[0], EffectId(31), EffectId(99)]);

        assert_eq!(
            engine.remove_by_track_label(&mut subject, "neg"),
            vec![Command::remove(EffectId(31), RemovalCause::Purged)]
        );
        assert!(
            engine
                .remove_in_stage(&mut subject, "ATK", "neg")
                .unwrap()
                .is_empty()
        );
        assert!(matches!(
            engine.remove_in_stage(&mut subject, "ATK", "zzz"),
            Err(StageError::UnknownTrack { .. })
        ));

        engine.purge_all(&mut subject);
        assert_eq!(subject.applied, vec![EffectId(99)]);
        assert!(engine.purge_all(&mut subject).is_empty());
    }

    #[test]
    fn test_stage_with_chance() {
        let registry = registry();
        let engine = TransitionEngine::new(&registry);
        let mut rng = StdRng::seed_from_u64(7);
        let mut subject = holding(&[]);

        assert!(
            engine
                .stage(&mut subject, "ATK", "pos", 1, 0, &mut rng)
                .unwrap()
                .is_empty()
        );
        engine
            .stage(&mut subject, "ATK", "pos", 2, 100, &mut rng)
            .unwrap();
        assert_eq!(subject.applied, vec![A[1]]);

        assert!(matches!(
            engine.stage(&mut subject, "SPD", "pos", 1, 100, &mut rng),
            Err(StageError::UnknownStage { .. })
        ));
    }
}

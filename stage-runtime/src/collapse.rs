//! # Collapse 模块
//!
//! 载入期重写：同一条列表里重复引用同一效果的条目合并为「跳到更高阶段」。
//!
//! ## 类别
//!
//! | 列表 | 代码 | 方式 |
//! |---|---|---|
//! | 技能/物品使用效果 | 21 | 叠加型 |
//! | 特性 | 13, 14 | 包含型 |
//! | 特性 | 32 | 叠加型 |
//!
//! - 叠加型：一条替换条目，指向 `track[min(i+n-1, last)]`
//! - 包含型：位置 `i+1 ..= i+n-1` 各一条（钳制到 `last`，去重）
//!
//! 数值取 `n` 个原值的平均值，上限 [`MAGNITUDE_CAP`]，保留两位小数。

use crate::database::{ActionEffect, Database, EffectId, Feature, codes};
use crate::registry::StageRegistry;

/// 合并后数值的上限
pub const MAGNITUDE_CAP: f64 = 1.0;

/// 合并方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapseMode {
    /// 合并为一条
    Additive,
    /// 逐阶段展开
    Inclusive,
}

/// 特性代码对应的合并方式（不可合并的代码返回 None）
pub fn feature_mode(code: u16) -> Option<CollapseMode> {
    match code {
        codes::STATE_RATE | codes::STATE_RESIST => Some(CollapseMode::Inclusive),
        codes::ATTACK_STATE => Some(CollapseMode::Additive),
        _ => None,
    }
}

const FEATURE_CODES: [u16; 3] = [codes::STATE_RATE, codes::STATE_RESIST, codes::ATTACK_STATE];

/// 平均、封顶、保留两位小数
pub fn capped_mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return 0.0;
    }
    let mean = (sum / count as f64).min(MAGNITUDE_CAP);
    (mean * 100.0).round() / 100.0
}

/// 可合并的条目
trait StagedEntry: Clone {
    fn target(&self) -> EffectId;

    /// 由一组重复条目合成指向 `target` 的新条目
    fn merged(group: &[&Self], target: EffectId) -> Self;
}

impl StagedEntry for Feature {
    fn target(&self) -> EffectId {
        EffectId(self.data_id)
    }

    fn merged(group: &[&Self], target: EffectId) -> Self {
        Feature::new(
            group[0].code,
            target.0,
            capped_mean(group.iter().map(|f| f.value)),
        )
    }
}

impl StagedEntry for ActionEffect {
    fn target(&self) -> EffectId {
        EffectId(self.data_id)
    }

    fn merged(group: &[&Self], target: EffectId) -> Self {
        ActionEffect {
            code: group[0].code,
            data_id: target.0,
            value1: capped_mean(group.iter().map(|e| e.value1)),
            value2: capped_mean(group.iter().map(|e| e.value2)),
        }
    }
}

/// 合并一条列表中满足 `belongs` 的条目，返回被合并的目标数
fn collapse_entries<T: StagedEntry>(
    registry: &StageRegistry,
    entries: &mut Vec<T>,
    belongs: impl Fn(&T) -> bool,
    mode: CollapseMode,
) -> usize {
    // 按首次出现顺序分组
    let mut groups: Vec<(EffectId, Vec<usize>)> = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        if !belongs(entry) {
            continue;
        }
        let target = entry.target();
        match groups.iter_mut().find(|(t, _)| *t == target) {
            Some((_, indices)) => indices.push(index),
            None => groups.push((target, vec![index])),
        }
    }

    let mut removed = vec![false; entries.len()];
    let mut replacements = Vec::new();
    let mut collapsed = 0;

    for (target, indices) in groups {
        let n = indices.len();
        if n < 2 {
            continue;
        }
        let Some(placement) = registry.locate(target) else {
            continue;
        };
        let Some((_, track)) = registry.resolve(placement) else {
            continue;
        };
        let i = placement.index;
        let last = track.len() - 1;

        let positions: Vec<usize> = match mode {
            CollapseMode::Additive => vec![(i + n - 1).min(last)],
            CollapseMode::Inclusive => {
                let mut positions: Vec<usize> =
                    (i + 1..=i + n - 1).map(|p| p.min(last)).collect();
                positions.dedup();
                positions
            }
        };

        let group: Vec<&T> = indices.iter().map(|&k| &entries[k]).collect();
        for position in positions {
            if let Some(effect) = track.get(position) {
                replacements.push(T::merged(&group, effect));
            }
        }
        for &k in &indices {
            removed[k] = true;
        }
        collapsed += 1;
        tracing::debug!(effect = %target, count = n, ?mode, "collapsed repeated entries");
    }

    if collapsed > 0 {
        let mut index = 0;
        entries.retain(|_| {
            let keep = !removed[index];
            index += 1;
            keep
        });
        entries.extend(replacements);
    }
    collapsed
}

/// 合并一条特性列表（代码 13/14/32，各自独立）
pub fn collapse_features(registry: &StageRegistry, features: &mut Vec<Feature>) -> usize {
    FEATURE_CODES
        .iter()
        .filter_map(|&code| feature_mode(code).map(|mode| (code, mode)))
        .map(|(code, mode)| collapse_entries(registry, features, |f| f.code == code, mode))
        .sum()
}

/// 合并一条使用效果列表（代码 21，叠加型）
pub fn collapse_action_effects(registry: &StageRegistry, effects: &mut Vec<ActionEffect>) -> usize {
    collapse_entries(
        registry,
        effects,
        |e| e.code == codes::ADD_STATE,
        CollapseMode::Additive,
    )
}

/// 对整个数据库执行合并，返回被合并的目标总数
pub fn collapse_database(registry: &StageRegistry, database: &mut Database) -> usize {
    let mut total = 0;
    for usable in database.skills.iter_mut().chain(database.items.iter_mut()) {
        total += collapse_action_effects(registry, &mut usable.effects);
    }
    for group in database.bearer_groups_mut() {
        for bearer in group.iter_mut() {
            total += collapse_features(registry, &mut bearer.features);
        }
    }
    for state in database.states.iter_mut() {
        total += collapse_features(registry, &mut state.features);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;

    /// ATK: pos [1, 2, 3], neg [11, 12, 13]
    fn registry() -> StageRegistry {
        let mut builder = RegistryBuilder::new();
        for (position, id) in [1, 2, 3].into_iter().enumerate() {
            builder.register("ATK", "pos", position + 1, EffectId(id));
            builder.register("ATK", "neg", position + 1, EffectId(id + 10));
        }
        builder.build().0
    }

    #[test]
    fn test_capped_mean() {
        assert_eq!(capped_mean([0.3, 0.4, 0.5]), 0.4);
        assert_eq!(capped_mean([1.0, 2.0]), 1.0);
        assert_eq!(capped_mean([0.331, 0.333]), 0.33);
        assert_eq!(capped_mean([]), 0.0);
    }

    #[test]
    fn test_additive_action_effects() {
        let mut effects = vec![
            ActionEffect::add_state(EffectId(1), 0.3),
            ActionEffect {
                code: 11,
                data_id: 0,
                value1: 50.0,
                value2: 0.0,
            },
            ActionEffect::add_state(EffectId(1), 0.4),
            ActionEffect::add_state(EffectId(1), 0.5),
        ];
        assert_eq!(collapse_action_effects(&registry(), &mut effects), 1);

        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0].code, 11);
        assert_eq!(effects[1], ActionEffect::add_state(EffectId(3), 0.4));
    }

    #[test]
    fn test_additive_clamps_to_last() {
        let mut effects = vec![
            ActionEffect::add_state(EffectId(2), 1.0),
            ActionEffect::add_state(EffectId(2), 1.0),
            ActionEffect::add_state(EffectId(2), 1.0),
        ];
        collapse_action_effects(&registry(), &mut effects);
        assert_eq!(effects, vec![ActionEffect::add_state(EffectId(3), 1.0)]);
    }

    #[test]
    fn test_inclusive_two_entries() {
        let mut features = vec![
            Feature::new(codes::STATE_RATE, 1, 0.5),
            Feature::new(codes::STATE_RATE, 1, 0.7),
        ];
        collapse_features(&registry(), &mut features);
        assert_eq!(features, vec![Feature::new(codes::STATE_RATE, 2, 0.6)]);
    }

    #[test]
    fn test_inclusive_expands_and_dedups() {
        let mut features = vec![
            Feature::new(codes::STATE_RESIST, 12, 1.0),
            Feature::new(codes::STATE_RESIST, 12, 1.0),
            Feature::new(codes::STATE_RESIST, 12, 1.0),
        ];
        collapse_features(&registry(), &mut features);
        // i = 1, n = 3 → 位置 2, 3 → 钳制后只剩 2
        assert_eq!(features, vec![Feature::new(codes::STATE_RESIST, 13, 1.0)]);

        let mut at_last = vec![
            Feature::new(codes::STATE_RATE, 3, 0.2),
            Feature::new(codes::STATE_RATE, 3, 0.2),
        ];
        collapse_features(&registry(), &mut at_last);
        assert_eq!(at_last, vec![Feature::new(codes::STATE_RATE, 3, 0.2)]);
    }

    #[test]
    fn test_categories_are_independent() {
        let mut features = vec![
            Feature::new(codes::STATE_RATE, 1, 0.5),
            Feature::new(codes::ATTACK_STATE, 1, 0.5),
            Feature::new(codes::STATE_RATE, 1, 0.5),
            Feature::new(22, 1, 0.5),
            Feature::new(22, 1, 0.5),
        ];
        collapse_features(&registry(), &mut features);
        assert_eq!(
            features,
            vec![
                Feature::new(codes::ATTACK_STATE, 1, 0.5),
                Feature::new(22, 1, 0.5),
                Feature::new(22, 1, 0.5),
                Feature::new(codes::STATE_RATE, 2, 0.5),
            ]
        );
    }

    #[test]
    fn test_unknown_targets_untouched() {
        let mut effects = vec![
            ActionEffect::add_state(EffectId(99), 0.5),
            ActionEffect::add_state(EffectId(99), 0.5),
        ];
        assert_eq!(collapse_action_effects(&registry(), &mut effects), 0);
        assert_eq!(effects.len(), 2);
    }

    #[test]
    fn test_collapse_database() {
        let mut db = Database {
            skills: vec![crate::database::UsableItem {
                id: 1,
                name: "Double Up".to_string(),
                effects: vec![
                    ActionEffect::add_state(EffectId(1), 1.0),
                    ActionEffect::add_state(EffectId(1), 1.0),
                ],
            }],
            weapons: vec![crate::database::FeatureBearer {
                id: 1,
                name: "Venom Blade".to_string(),
                features: vec![
                    Feature::new(codes::ATTACK_STATE, 11, 0.2),
                    Feature::new(codes::ATTACK_STATE, 11, 0.4),
                ],
            }],
            ..Database::default()
        };
        assert_eq!(collapse_database(&registry(), &mut db), 2);
        assert_eq!(db.skills[0].effects[0].data_id, 2);
        assert_eq!(
            db.weapons[0].features,
            vec![Feature::new(codes::ATTACK_STATE, 12, 0.3)]
        );
    }
}

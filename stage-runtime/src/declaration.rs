//! # Declaration 模块
//!
//! 把备注指令应用到数据库：登记阶段、派生子记录、调整字段、剥离备注。
//!
//! ## 执行顺序
//!
//! 所有记录按 ID 顺序经过四个全局阶段：
//!
//! ```text
//! A. 解析备注、剥离指令、登记 Stage / Abbr_Name
//! B. 执行 Index/Copy/Take（派生子记录）
//! C. 执行 Adj_State / Adj_Note
//! D. 压缩父记录的特性槽位
//! ```
//!
//! 因此单条记录内始终是「登记 → 派生 → 调整 → 剥离」，
//! 调整也可以指向其他记录登记的位置。
//!
//! ## 容错
//!
//! 任何问题都降级为诊断并跳过该指令，从不中断载入。

use std::collections::BTreeMap;

use crate::database::{Database, EffectId, EffectRecord, Feature};
use crate::diagnostic::{Diagnostic, DiagnosticResult};
use crate::directive::{AdjustField, Directive, parse_note};
use crate::registry::{RegistryBuilder, SlotWrite};

/// 最近一条 `Stage` 指令的目标
#[derive(Debug, Clone)]
struct StageRef {
    stage: String,
    label: String,
}

#[derive(Debug, Clone)]
struct PendingDerive {
    parent: EffectId,
    target: StageRef,
    positions: Vec<usize>,
    copy: Vec<usize>,
    take: Vec<usize>,
    line: usize,
}

#[derive(Debug, Clone)]
struct PendingAdjust {
    source: EffectId,
    target: StageRef,
    position: usize,
    field: AdjustField,
    line: usize,
}

/// 声明解析器
///
/// 一次性使用：`run` 消耗自身。
pub struct DeclarationParser<'a> {
    database: &'a mut Database,
    builder: &'a mut RegistryBuilder,
    diagnostics: DiagnosticResult,
    derives: Vec<PendingDerive>,
    adjusts: Vec<PendingAdjust>,
    /// 被派生过的父记录的特性槽位（`take` 之后留空，阶段 D 压缩）
    feature_slots: BTreeMap<EffectId, Vec<Option<Feature>>>,
}

fn source_of(id: EffectId) -> String {
    format!("state {}", id)
}

impl<'a> DeclarationParser<'a> {
    pub fn new(database: &'a mut Database, builder: &'a mut RegistryBuilder) -> Self {
        Self {
            database,
            builder,
            diagnostics: DiagnosticResult::new(),
            derives: Vec::new(),
            adjusts: Vec::new(),
            feature_slots: BTreeMap::new(),
        }
    }

    /// 执行全部四个阶段
    pub fn run(mut self) -> DiagnosticResult {
        let order = self.id_order();
        for index in order {
            self.declare_record(index);
        }

        let derives = std::mem::take(&mut self.derives);
        let derived_count = derives.len();
        for derive in derives {
            self.derive(derive);
        }

        let adjusts = std::mem::take(&mut self.adjusts);
        let adjusted_count = adjusts.len();
        for adjust in adjusts {
            self.adjust(adjust);
        }

        self.compact_feature_slots();

        tracing::debug!(
            derives = derived_count,
            adjusts = adjusted_count,
            states = self.database.states.len(),
            "declarations applied"
        );
        self.diagnostics
    }

    /// 按记录 ID 排序的下标
    fn id_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.database.states.len()).collect();
        order.sort_by_key(|&i| self.database.states[i].id);
        order
    }

    fn warn(&mut self, id: EffectId, line: usize, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warn(source_of(id), message).with_line(line));
    }

    // =========================================================================
    // 阶段 A
    // =========================================================================

    fn declare_record(&mut self, index: usize) {
        let record = &mut self.database.states[index];
        let id = record.id;
        let parsed = parse_note(&record.note);
        record.note = parsed.note;

        for warning in parsed.warnings {
            tracing::warn!(state = %id, "跳过无效指令: {}", warning);
            self.diagnostics.push(
                Diagnostic::warn(source_of(id), warning.to_string()).with_line(warning.line()),
            );
        }

        let mut current: Option<StageRef> = None;
        for located in parsed.directives {
            let line = located.line;
            match located.directive {
                Directive::Stage {
                    stage,
                    label,
                    position,
                } => {
                    self.register(id, &stage, &label, position, id, line);
                    current = Some(StageRef { stage, label });
                }
                directive => {
                    let Some(target) = current.clone() else {
                        tracing::warn!(state = %id, line, "{} 之前没有 Stage 指令", directive.keyword());
                        self.warn(
                            id,
                            line,
                            format!("'{}' 之前没有 Stage 指令，已忽略", directive.keyword()),
                        );
                        continue;
                    };
                    self.defer(id, target, directive, line);
                }
            }
        }
    }

    fn defer(&mut self, id: EffectId, target: StageRef, directive: Directive, line: usize) {
        match directive {
            Directive::AbbrName { name } => {
                self.builder.set_abbreviation(&target.stage, name);
            }
            Directive::Derive {
                positions,
                copy,
                take,
            } => self.derives.push(PendingDerive {
                parent: id,
                target,
                positions,
                copy,
                take,
                line,
            }),
            Directive::Adjust { position, field } => self.adjusts.push(PendingAdjust {
                source: id,
                target,
                position,
                field,
                line,
            }),
            Directive::Stage { .. } => {}
        }
    }

    fn register(
        &mut self,
        source: EffectId,
        stage: &str,
        label: &str,
        position: usize,
        effect: EffectId,
        line: usize,
    ) {
        match self.builder.register(stage, label, position, effect) {
            SlotWrite::Filled => {}
            SlotWrite::Replaced(previous) => self.warn(
                source,
                line,
                format!(
                    "阶段 '{}' 轨道 '{}' 第 {} 位的效果 {} 被 {} 覆盖",
                    stage, label, position, previous, effect
                ),
            ),
            SlotWrite::OutOfRange => self.warn(
                source,
                line,
                format!("位置 {} 超出范围，效果 {} 未登记", position, effect),
            ),
        }
    }

    // =========================================================================
    // 阶段 B
    // =========================================================================

    fn derive(&mut self, derive: PendingDerive) {
        let PendingDerive {
            parent,
            target,
            positions,
            copy,
            take,
            line,
        } = derive;

        let Some(template) = self.database.state(parent).map(|r| r.clone_attributes(parent))
        else {
            return;
        };

        let slots = self.feature_slots.entry(parent).or_insert_with(|| {
            self.database
                .states
                .iter_mut()
                .find(|s| s.id == parent)
                .map(|s| std::mem::take(&mut s.features).into_iter().map(Some).collect())
                .unwrap_or_default()
        });

        let mut inherited = Vec::new();
        let mut problems = Vec::new();
        for &c in &copy {
            if c == 0 {
                continue;
            }
            match slots.get(c - 1) {
                Some(Some(feature)) => inherited.push(feature.clone()),
                Some(None) => problems.push(format!("Copy: 特性 {} 已被取走", c)),
                None => problems.push(format!("Copy: 特性序号 {} 超出范围", c)),
            }
        }
        for &t in &take {
            if t == 0 {
                continue;
            }
            match slots.get_mut(t - 1).map(Option::take) {
                Some(Some(feature)) => inherited.push(feature),
                Some(None) => problems.push(format!("Take: 特性 {} 已被取走", t)),
                None => problems.push(format!("Take: 特性序号 {} 超出范围", t)),
            }
        }
        for problem in problems {
            self.warn(parent, line, problem);
        }

        for position in positions {
            if position == 0 {
                self.warn(parent, line, "Index: 位置从 1 开始，已忽略 0");
                continue;
            }
            let Some(id) = self.database.next_state_id() else {
                self.warn(
                    parent,
                    line,
                    format!("Index: 状态 ID 已用尽，第 {} 位未派生", position),
                );
                continue;
            };
            let child = EffectRecord {
                features: inherited.clone(),
                ..template.clone_attributes(id)
            };
            self.database.states.push(child);
            self.register(parent, &target.stage, &target.label, position, id, line);
            tracing::debug!(parent = %parent, child = %id, position, "derived state");
        }
    }

    // =========================================================================
    // 阶段 C
    // =========================================================================

    fn adjust(&mut self, adjust: PendingAdjust) {
        let PendingAdjust {
            source,
            target,
            position,
            field,
            line,
        } = adjust;

        let Some(effect) = self.builder.slot(&target.stage, &target.label, position) else {
            self.warn(
                source,
                line,
                format!(
                    "阶段 '{}' 轨道 '{}' 第 {} 位没有效果，调整已忽略",
                    target.stage, target.label, position
                ),
            );
            return;
        };
        let Some(record) = self.database.states.iter_mut().find(|s| s.id == effect) else {
            self.warn(source, line, format!("效果 {} 没有对应的记录", effect));
            return;
        };
        apply_field(record, field);
    }

    // =========================================================================
    // 阶段 D
    // =========================================================================

    fn compact_feature_slots(&mut self) {
        for (id, slots) in std::mem::take(&mut self.feature_slots) {
            if let Some(record) = self.database.states.iter_mut().find(|s| s.id == id) {
                record.features = slots.into_iter().flatten().collect();
            }
        }
    }
}

/// 把字段调整写入记录
pub fn apply_field(record: &mut EffectRecord, field: AdjustField) {
    let removal = &mut record.removal;
    match field {
        AdjustField::Name(name) => record.name = name,
        AdjustField::Icon(icon) => record.icon_index = icon,
        AdjustField::Note(note) => record.note = note,
        AdjustField::Restrict(restriction) => record.restriction = restriction,
        AdjustField::Priority(priority) => record.priority = priority,
        AdjustField::RemoveAtEnd(flag) => removal.remove_at_battle_end = flag,
        AdjustField::RemoveOnRestriction(flag) => removal.remove_by_restriction = flag,
        AdjustField::RemoveAuto(timing) => removal.auto_removal_timing = timing,
        AdjustField::RemoveTurn(range) => removal.turn_range = range,
        AdjustField::RemoveByDamage(chance) => removal.damage_removal_chance = chance,
        AdjustField::RemoveByWalk(steps) => removal.walk_removal_steps = steps,
        AdjustField::Message(slot, text) => {
            if let Some(message) = record.messages.slot_mut(slot) {
                *message = text;
            }
        }
    }
}

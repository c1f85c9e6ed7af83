//! # 阶段 2：片段解析
//!
//! 将阶段 1 的片段转换为类型化的 [`Directive`]。

use super::helpers::{
    expect_separator, parse_bool, parse_int, parse_position, strip_label, unquote,
};
use super::phase1::{Keyword, Segment};
use crate::database::{AutoRemovalTiming, Restriction, TurnRange};
use crate::directive::ast::{AdjustField, Directive};
use crate::error::DirectiveError;

/// 解析单个片段
pub fn parse_segment(segment: &Segment) -> Result<Directive, DirectiveError> {
    match segment {
        Segment::Tag {
            keyword,
            body,
            line,
            ..
        } => parse_tag(*keyword, body, *line),
        Segment::NoteBlock {
            header,
            content,
            line,
            ..
        } => parse_note_block(header, content, *line),
        Segment::Unclosed { keyword, line, .. } => Err(DirectiveError::UnclosedBlock {
            line: *line,
            directive: keyword.name().to_string(),
        }),
    }
}

fn parse_tag(keyword: Keyword, body: &str, line: usize) -> Result<Directive, DirectiveError> {
    match keyword {
        Keyword::Stage => parse_stage(expect_separator(body, ':', line, "Stage")?, line),
        Keyword::Index => parse_derive(expect_separator(body, ':', line, "Index")?, line),
        Keyword::AdjState => {
            parse_adjust(expect_separator(body, ':', line, "Adj_State")?, line)
        }
        Keyword::AbbrName => {
            let name = unquote(expect_separator(body, ':', line, "Abbr_Name")?);
            if name.is_empty() {
                return Err(missing(line, "Abbr_Name", "name"));
            }
            Ok(Directive::AbbrName {
                name: name.to_string(),
            })
        }
        Keyword::AdjNote => Err(DirectiveError::UnclosedBlock {
            line,
            directive: keyword.name().to_string(),
        }),
        Keyword::AdjNoteEnd => Err(DirectiveError::InvalidTag {
            line,
            message: "多余的 </Adj_Note>".to_string(),
        }),
    }
}

fn missing(line: usize, directive: &str, param: &str) -> DirectiveError {
    DirectiveError::MissingParameter {
        line,
        directive: directive.to_string(),
        param: param.to_string(),
    }
}

/// `<Stage: name, label, position>`
///
/// 阶段名可能含逗号，因此从右侧切分。
fn parse_stage(args: &str, line: usize) -> Result<Directive, DirectiveError> {
    let mut parts = args.rsplitn(3, ',');
    let position = parts.next().map(str::trim).unwrap_or_default();
    let label = parts.next().map(str::trim).unwrap_or_default();
    let stage = parts.next().map(str::trim).unwrap_or_default();

    if stage.is_empty() {
        return Err(missing(line, "Stage", "stage"));
    }
    if label.is_empty() {
        return Err(missing(line, "Stage", "label"));
    }
    if position.is_empty() {
        return Err(missing(line, "Stage", "position"));
    }

    Ok(Directive::Stage {
        stage: stage.to_string(),
        label: label.to_string(),
        position: parse_position(position, line, "position")?,
    })
}

/// `<Index: p..., Copy: c..., Take: t...>`
fn parse_derive(args: &str, line: usize) -> Result<Directive, DirectiveError> {
    #[derive(Clone, Copy)]
    enum List {
        Positions,
        Copy,
        Take,
    }

    let mut positions = Vec::new();
    let mut copy = Vec::new();
    let mut take = Vec::new();
    let mut current = List::Positions;

    for token in args.split(',') {
        let mut value = token.trim();
        if let Some(rest) = strip_label(value, "copy") {
            current = List::Copy;
            value = rest;
        } else if let Some(rest) = strip_label(value, "take") {
            current = List::Take;
            value = rest;
        }
        if value.is_empty() {
            continue;
        }

        let (param, target) = match current {
            List::Positions => ("Index", &mut positions),
            List::Copy => ("Copy", &mut copy),
            List::Take => ("Take", &mut take),
        };
        let number = value
            .parse::<usize>()
            .map_err(|_| DirectiveError::InvalidParameter {
                line,
                param: param.to_string(),
                message: format!("'{}' 不是序号", value),
            })?;
        target.push(number);
    }

    if positions.is_empty() {
        return Err(missing(line, "Index", "position"));
    }

    Ok(Directive::Derive {
        positions,
        copy,
        take,
    })
}

/// `<Adj_State: p, field: value>`
fn parse_adjust(args: &str, line: usize) -> Result<Directive, DirectiveError> {
    let (position, rest) = args
        .split_once(',')
        .ok_or_else(|| missing(line, "Adj_State", "field"))?;
    let position = parse_position(position, line, "position")?;
    let (key, value) = rest
        .split_once(':')
        .ok_or_else(|| missing(line, "Adj_State", "value"))?;

    Ok(Directive::Adjust {
        position,
        field: parse_field(key, value, line)?,
    })
}

/// `<Adj_Note, p>` 块
fn parse_note_block(header: &str, content: &str, line: usize) -> Result<Directive, DirectiveError> {
    let position = expect_separator(header, ',', line, "Adj_Note")?;
    Ok(Directive::Adjust {
        position: parse_position(position, line, "position")?,
        field: AdjustField::Note(content.trim_matches(['\n', '\r']).to_string()),
    })
}

/// 解析字段键值
///
/// 键大小写不敏感，接受 `removeAtEnd?` 与 `remove_end?` 两种写法，末尾 `?` 可省略。
pub fn parse_field(key: &str, value: &str, line: usize) -> Result<AdjustField, DirectiveError> {
    let raw_key = key.trim();
    let normalized = raw_key.trim_end_matches('?').to_ascii_lowercase();
    let int = |param: &str| parse_int(value, line, param);

    let field = match normalized.as_str() {
        "name" => AdjustField::Name(unquote(value).to_string()),
        "icon" => AdjustField::Icon(int("icon")?.clamp(0, u32::MAX as i64) as u32),
        "note" => AdjustField::Note(value.trim().to_string()),
        "restrict" => AdjustField::Restrict(Restriction::from_clamped(int("restrict")?)),
        "priority" => AdjustField::Priority(int("priority")?.clamp(0, 100) as u8),
        "removeatend" | "remove_end" => AdjustField::RemoveAtEnd(parse_bool(value)),
        "removeonrestriction" | "remove_restrict" => {
            AdjustField::RemoveOnRestriction(parse_bool(value))
        }
        "removeauto" | "remove_auto" => {
            AdjustField::RemoveAuto(AutoRemovalTiming::from_clamped(int("remove_auto")?))
        }
        "removeturn" | "remove_turn" => AdjustField::RemoveTurn(parse_turn_range(value, line)?),
        "removebydamage" | "remove_dmg" => {
            AdjustField::RemoveByDamage(int("remove_dmg")?.clamp(0, 100) as u8)
        }
        "removebywalk" | "remove_walk" => {
            AdjustField::RemoveByWalk(int("remove_walk")?.clamp(0, u32::MAX as i64) as u32)
        }
        "msg1" | "msg2" | "msg3" | "msg4" => {
            let slot = normalized.as_bytes()[3] - b'0';
            AdjustField::Message(slot, unquote(value).to_string())
        }
        _ => {
            return Err(DirectiveError::InvalidParameter {
                line,
                param: raw_key.to_string(),
                message: "未知字段".to_string(),
            });
        }
    };
    Ok(field)
}

/// `min, max`；只给一个值时两端相同
fn parse_turn_range(value: &str, line: usize) -> Result<TurnRange, DirectiveError> {
    let to_turns = |s: &str| {
        parse_int(s, line, "remove_turn").map(|v| v.clamp(0, u32::MAX as i64) as u32)
    };
    let (min, max) = match value.split_once(',') {
        Some((min, max)) => (to_turns(min)?, to_turns(max)?),
        None => {
            let turns = to_turns(value)?;
            (turns, turns)
        }
    };
    Ok(TurnRange { min, max })
}

//! # Parser 测试

use super::helpers::{find_ignore_case, line_at, strip_label, strip_spans};
use super::phase1::{Keyword, Segment, recognize_segments};
use super::*;
use crate::database::{AutoRemovalTiming, Restriction, TurnRange};
use crate::directive::ast::{AdjustField, Directive};
use crate::error::DirectiveError;

fn directives(text: &str) -> Vec<Directive> {
    parse_note(text)
        .directives
        .into_iter()
        .map(|d| d.directive)
        .collect()
}

// -------------------------------------------------------------------------
// 辅助函数测试
// -------------------------------------------------------------------------

#[test]
fn test_unquote() {
    assert_eq!(unquote(r#" "Bad Poison" "#), "Bad Poison");
    assert_eq!(unquote("'x'"), "x");
    assert_eq!(unquote("\"unbalanced"), "\"unbalanced");
    assert_eq!(unquote("\""), "\"");
    assert_eq!(unquote("plain"), "plain");
}

#[test]
fn test_parse_bool() {
    assert!(parse_bool("true"));
    assert!(parse_bool(" TRUE "));
    assert!(parse_bool("1"));
    assert!(!parse_bool("yes"));
    assert!(!parse_bool("0"));
    assert!(!parse_bool("false"));
}

#[test]
fn test_strip_label() {
    assert_eq!(strip_label("Copy: 1", "copy"), Some("1"));
    assert_eq!(strip_label("Take 2", "take"), Some("2"));
    assert_eq!(strip_label("take:", "take"), Some(""));
    assert_eq!(strip_label("Taken: 2", "take"), None);
    assert_eq!(strip_label("3", "copy"), None);
}

#[test]
fn test_find_ignore_case_and_line_at() {
    assert_eq!(find_ignore_case("ab</ADJ_NOTE>", "</adj_note>"), Some(2));
    assert_eq!(line_at("a\nb\nc", 0), 1);
    assert_eq!(line_at("a\nb\nc", 4), 3);
}

#[test]
fn test_strip_spans_removes_blank_lines() {
    let text = "<A>\n\nkeep me\n<B>\r\n  \nand me";
    let spans = vec![0..3, 13..16];
    assert_eq!(strip_spans(text, &spans), "keep me\nand me");
}

// -------------------------------------------------------------------------
// 阶段 1 测试
// -------------------------------------------------------------------------

#[test]
fn test_recognize_ignores_foreign_tags() {
    let segments = recognize_segments("<Custom Tag: 5>\n<Stages: x>\n1 < 2");
    assert!(segments.is_empty());
}

#[test]
fn test_recognize_tag_and_block() {
    let text = "<stage: ATK, pos, 1>\n<Adj_Note, 2>\nline one\nline two\n</ADJ_NOTE>";
    let segments = recognize_segments(text);
    assert_eq!(segments.len(), 2);

    match &segments[0] {
        Segment::Tag {
            keyword,
            body,
            line,
            span,
        } => {
            assert_eq!(*keyword, Keyword::Stage);
            assert_eq!(body, ": ATK, pos, 1");
            assert_eq!(*line, 1);
            assert_eq!(span.clone(), 0..20);
        }
        other => panic!("unexpected segment: {:?}", other),
    }
    match &segments[1] {
        Segment::NoteBlock {
            header,
            content,
            line,
            span,
        } => {
            assert_eq!(header, ", 2");
            assert_eq!(content, "\nline one\nline two\n");
            assert_eq!(*line, 2);
            assert_eq!(span.end, text.len());
        }
        other => panic!("unexpected segment: {:?}", other),
    }
}

#[test]
fn test_recognize_unclosed() {
    let segments = recognize_segments("<Stage: ATK, pos, 1\n<Adj_Note, 2>\nnever closed");
    assert!(matches!(
        segments[0],
        Segment::Unclosed {
            keyword: Keyword::Stage,
            line: 1,
            ..
        }
    ));
    assert!(matches!(
        segments[1],
        Segment::Unclosed {
            keyword: Keyword::AdjNote,
            line: 2,
            ..
        }
    ));
}

// -------------------------------------------------------------------------
// 指令解析测试
// -------------------------------------------------------------------------

#[test]
fn test_parse_stage() {
    assert_eq!(
        directives("<Stage: ATK, pos, 3>"),
        vec![Directive::Stage {
            stage: "ATK".to_string(),
            label: "pos".to_string(),
            position: 3,
        }]
    );
    // 阶段名含逗号
    assert_eq!(
        directives("<STAGE: Slow, Heavy, neg, 1>"),
        vec![Directive::Stage {
            stage: "Slow, Heavy".to_string(),
            label: "neg".to_string(),
            position: 1,
        }]
    );
}

#[test]
fn test_parse_stage_errors() {
    let parsed = parse_note("<Stage: ATK, pos, 0>\n<Stage: ATK, pos>\n<Stage ATK>");
    assert!(parsed.directives.is_empty());
    assert_eq!(parsed.warnings.len(), 3);
    assert!(matches!(
        parsed.warnings[0],
        DirectiveError::InvalidParameter { line: 1, .. }
    ));
    assert!(matches!(
        parsed.warnings[2],
        DirectiveError::InvalidTag { line: 3, .. }
    ));
    assert_eq!(parsed.note, "");
}

#[test]
fn test_parse_derive() {
    assert_eq!(
        directives("<Index: 2, 3, Copy: 1, 4, Take: 2>"),
        vec![Directive::Derive {
            positions: vec![2, 3],
            copy: vec![1, 4],
            take: vec![2],
        }]
    );
    // Copy/Take 可省略，`Take 2` 的写法也接受
    assert_eq!(
        directives("<Index: 5>\n<index: 2, Copy: 0, Take 2>"),
        vec![
            Directive::Derive {
                positions: vec![5],
                copy: vec![],
                take: vec![],
            },
            Directive::Derive {
                positions: vec![2],
                copy: vec![0],
                take: vec![2],
            },
        ]
    );
}

#[test]
fn test_parse_derive_errors() {
    let parsed = parse_note("<Index: Copy: 1>\n<Index: 2, Copy: x>");
    assert_eq!(parsed.warnings.len(), 2);
    assert!(matches!(
        &parsed.warnings[0],
        DirectiveError::MissingParameter { line: 1, .. }
    ));
    assert!(matches!(
        &parsed.warnings[1],
        DirectiveError::InvalidParameter { line: 2, param, .. } if param == "Copy"
    ));
}

#[test]
fn test_parse_adjust_fields() {
    let text = r#"<Adj_State: 2, name: "Bad Poison">
<Adj_State: 2, icon: 17>
<Adj_State: 2, restrict: 9>
<Adj_State: 2, priority: -5>
<Adj_State: 2, removeAtEnd?: 1>
<Adj_State: 2, remove_restrict?: yes>
<Adj_State: 2, REMOVE_AUTO: 2>
<Adj_State: 2, removeTurn: 3, 5>
<Adj_State: 2, remove_dmg?: 250>
<Adj_State: 2, removeByWalk: 0>
<Adj_State: 2, msg3: %1 is still poisoned, badly.>"#;

    let fields: Vec<AdjustField> = directives(text)
        .into_iter()
        .map(|d| match d {
            Directive::Adjust { position: 2, field } => field,
            other => panic!("unexpected directive: {:?}", other),
        })
        .collect();

    assert_eq!(
        fields,
        vec![
            AdjustField::Name("Bad Poison".to_string()),
            AdjustField::Icon(17),
            AdjustField::Restrict(Restriction::CannotAct),
            AdjustField::Priority(0),
            AdjustField::RemoveAtEnd(true),
            AdjustField::RemoveOnRestriction(false),
            AdjustField::RemoveAuto(AutoRemovalTiming::TurnEnd),
            AdjustField::RemoveTurn(TurnRange { min: 3, max: 5 }),
            AdjustField::RemoveByDamage(100),
            AdjustField::RemoveByWalk(0),
            AdjustField::Message(3, "%1 is still poisoned, badly.".to_string()),
        ]
    );
}

#[test]
fn test_parse_adjust_unknown_field() {
    let parsed = parse_note("<Adj_State: 2, colour: red>\nplain text");
    assert!(parsed.directives.is_empty());
    assert!(matches!(
        &parsed.warnings[0],
        DirectiveError::InvalidParameter { param, .. } if param == "colour"
    ));
    assert_eq!(parsed.note, "plain text");
}

#[test]
fn test_parse_note_block() {
    let text = "<Adj_Note, 2>\n<Custom: 1>\nsecond line\n</Adj_Note>";
    assert_eq!(
        directives(text),
        vec![Directive::Adjust {
            position: 2,
            field: AdjustField::Note("<Custom: 1>\nsecond line".to_string()),
        }]
    );
}

#[test]
fn test_parse_abbr_name() {
    assert_eq!(
        directives("<Abbr_Name: Venom>"),
        vec![Directive::AbbrName {
            name: "Venom".to_string()
        }]
    );
    assert_eq!(parse_note("<Abbr_Name: >").warnings.len(), 1);
}

#[test]
fn test_stray_block_end() {
    let parsed = parse_note("text\n</Adj_Note>");
    assert!(matches!(
        parsed.warnings[0],
        DirectiveError::InvalidTag { line: 2, .. }
    ));
    assert_eq!(parsed.note, "text");
}

// -------------------------------------------------------------------------
// 完整备注测试
// -------------------------------------------------------------------------

#[test]
fn test_parse_full_note() {
    let note = r#"<Stage: PSN, neg, 1>
<Abbr_Name: Venom>
<Index: 2, Copy: 0, Take: 2>
<Adj_State: 2, name: "Bad Poison">
<Adj_Note, 2>
<Slip: 10%>
</Adj_Note>
<Slip: 5%>

Poison damages each turn."#;

    let parsed = parse_note(note);
    assert!(parsed.warnings.is_empty());
    assert_eq!(parsed.directives.len(), 5);
    assert_eq!(
        parsed.directives.iter().map(|d| d.line).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
    assert_eq!(parsed.note, "<Slip: 5%>\nPoison damages each turn.");
}

#[test]
fn test_note_without_directives_untouched() {
    let note = "\n<Slip: 5%>\n\n  spaced  \n";
    let parsed = parse_note(note);
    assert_eq!(parsed.note, note);
    assert!(parsed.directives.is_empty());
}

#[test]
fn test_parse_is_idempotent_on_stripped_note() {
    let first = parse_note("<Stage: ATK, pos, 1>\nkeep\n<Adj_State: 2, icon: 3>");
    let second = parse_note(&first.note);
    assert_eq!(second.note, first.note);
    assert!(second.directives.is_empty());
}

#[test]
fn test_parse_field_direct() {
    assert_eq!(
        parse_field("Remove_Turn?", "4", 1).unwrap(),
        AdjustField::RemoveTurn(TurnRange { min: 4, max: 4 })
    );
    assert!(parse_field("icon", "abc", 7).is_err());
}

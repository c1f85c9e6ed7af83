//! # 阶段 1：片段识别
//!
//! 在备注文本中找出属于阶段指令的标签片段（单行 `<...>` 标签与
//! `<Adj_Note, p> ... </Adj_Note>` 块），记录其字节区间与行号。
//! 不认识的标签不产生片段，保留在备注中。

use std::ops::Range;

use super::helpers::{find_ignore_case, line_at, starts_with_ignore_case};

const NOTE_BLOCK_END: &str = "</adj_note>";

/// 指令关键字
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Stage,
    Index,
    AdjState,
    AdjNote,
    /// `</Adj_Note>`
    AdjNoteEnd,
    AbbrName,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        const TABLE: [(&str, Keyword); 5] = [
            ("stage", Keyword::Stage),
            ("index", Keyword::Index),
            ("adj_state", Keyword::AdjState),
            ("adj_note", Keyword::AdjNote),
            ("abbr_name", Keyword::AbbrName),
        ];
        TABLE
            .iter()
            .find(|(name, _)| ident.eq_ignore_ascii_case(name))
            .map(|(_, kw)| *kw)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Stage => "Stage",
            Self::Index => "Index",
            Self::AdjState => "Adj_State",
            Self::AdjNote => "Adj_Note",
            Self::AdjNoteEnd => "/Adj_Note",
            Self::AbbrName => "Abbr_Name",
        }
    }
}

/// 片段（阶段 1 输出）
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// 单行标签；`body` 为关键字之后、`>` 之前的部分
    Tag {
        keyword: Keyword,
        body: String,
        line: usize,
        span: Range<usize>,
    },
    /// `<Adj_Note, p>` 块
    NoteBlock {
        header: String,
        content: String,
        line: usize,
        span: Range<usize>,
    },
    /// 缺少 `>` 的标签，或缺少 `</Adj_Note>` 的块
    Unclosed {
        keyword: Keyword,
        line: usize,
        span: Range<usize>,
    },
}

impl Segment {
    /// 起始行号
    pub fn line(&self) -> usize {
        match self {
            Segment::Tag { line, .. }
            | Segment::NoteBlock { line, .. }
            | Segment::Unclosed { line, .. } => *line,
        }
    }

    /// 需要从备注中剥离的字节区间
    pub fn span(&self) -> Range<usize> {
        match self {
            Segment::Tag { span, .. }
            | Segment::NoteBlock { span, .. }
            | Segment::Unclosed { span, .. } => span.clone(),
        }
    }
}

/// 读取 `<` 之后的关键字，返回关键字与其字节长度
fn read_keyword(rest: &str) -> Option<(Keyword, usize)> {
    if starts_with_ignore_case(rest, "/adj_note") {
        let len = "/adj_note".len();
        return rest[len..]
            .trim_start()
            .starts_with('>')
            .then_some((Keyword::AdjNoteEnd, len));
    }

    let ident_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let keyword = Keyword::from_ident(&rest[..ident_len])?;

    match rest[ident_len..].chars().next() {
        Some(':' | ',' | '>') => Some((keyword, ident_len)),
        Some(c) if c.is_whitespace() => Some((keyword, ident_len)),
        _ => None,
    }
}

/// 识别备注中的指令片段（按出现顺序）
pub fn recognize_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('<') {
        let start = cursor + offset;
        let rest = &text[start + 1..];

        let Some((keyword, ident_len)) = read_keyword(rest) else {
            cursor = start + 1;
            continue;
        };
        let line = line_at(text, start);

        // 标签必须在同一行内闭合
        let line_end = rest.find('\n').unwrap_or(rest.len());
        let Some(close) = rest[..line_end].find('>') else {
            segments.push(Segment::Unclosed {
                keyword,
                line,
                span: start..start,
            });
            cursor = start + 1;
            continue;
        };
        let tag_end = start + 1 + close + 1;
        let body = rest[ident_len..close].to_string();

        if keyword != Keyword::AdjNote {
            segments.push(Segment::Tag {
                keyword,
                body,
                line,
                span: start..tag_end,
            });
            cursor = tag_end;
            continue;
        }

        match find_ignore_case(&text[tag_end..], NOTE_BLOCK_END) {
            Some(relative) => {
                let content_end = tag_end + relative;
                let end = content_end + NOTE_BLOCK_END.len();
                segments.push(Segment::NoteBlock {
                    header: body,
                    content: text[tag_end..content_end].to_string(),
                    line,
                    span: start..end,
                });
                cursor = end;
            }
            None => {
                segments.push(Segment::Unclosed {
                    keyword,
                    line,
                    span: start..tag_end,
                });
                cursor = tag_end;
            }
        }
    }

    segments
}

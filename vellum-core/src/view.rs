//! Text renderings of diff output for terminals and logs.

use serde::{Deserialize, Serialize};

use crate::diff::{DiffSegment, SegmentKind, TokenChange, TokenKind};

/// Unified listing: `"  "` unchanged, `"- "` removed, `"+ "` added.
///
/// A modified segment is rendered as its removal followed by its addition.
pub fn render_unified(segments: &[DiffSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        let old = segment.old_text.as_deref().unwrap_or("");
        let new = segment.new_text.as_deref().unwrap_or("");
        match segment.kind {
            SegmentKind::Unchanged => push_line(&mut out, "  ", old),
            SegmentKind::Removed => push_line(&mut out, "- ", old),
            SegmentKind::Added => push_line(&mut out, "+ ", new),
            SegmentKind::Modified => {
                push_line(&mut out, "- ", old);
                push_line(&mut out, "+ ", new);
            }
        }
    }
    out
}

fn push_line(out: &mut String, prefix: &str, text: &str) {
    out.push_str(prefix);
    out.push_str(text);
    out.push('\n');
}

/// One cell of a side-by-side row: line number and text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub line: usize,
    pub text: String,
}

/// One row of a two-column view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideBySideRow {
    pub kind: SegmentKind,
    pub left: Option<Cell>,
    pub right: Option<Cell>,
}

/// Lay segments out as rows with the original on the left.
pub fn side_by_side(segments: &[DiffSegment]) -> Vec<SideBySideRow> {
    segments
        .iter()
        .map(|s| SideBySideRow {
            kind: s.kind,
            left: cell(s.old_line, s.old_text.as_deref()),
            right: cell(s.new_line, s.new_text.as_deref()),
        })
        .collect()
}

fn cell(line: Option<usize>, text: Option<&str>) -> Option<Cell> {
    Some(Cell {
        line: line?,
        text: text?.to_string(),
    })
}

/// Format rows as two fixed-width columns separated by a change marker.
pub fn render_side_by_side(rows: &[SideBySideRow], width: usize) -> String {
    let mut out = String::new();
    for row in rows {
        let marker = match row.kind {
            SegmentKind::Unchanged => ' ',
            SegmentKind::Added => '>',
            SegmentKind::Removed => '<',
            SegmentKind::Modified => '|',
        };
        let left = format_cell(row.left.as_ref(), width);
        let right = format_cell(row.right.as_ref(), width);
        out.push_str(format!("{left} {marker} {right}").trim_end());
        out.push('\n');
    }
    out
}

fn format_cell(cell: Option<&Cell>, width: usize) -> String {
    match cell {
        Some(cell) => {
            let text: String = cell.text.chars().take(width).collect();
            format!("{:>4} {:<width$}", cell.line, text)
        }
        None => format!("{:>4} {:<width$}", "", ""),
    }
}

/// Word-diff style rendering: `[-removed-]` and `{+inserted+}`.
pub fn render_inline(changes: &[TokenChange]) -> String {
    let mut out = String::new();
    for change in changes {
        match change.kind {
            TokenKind::Same => out.push_str(&change.token),
            TokenKind::Del => {
                out.push_str("[-");
                out.push_str(&change.token);
                out.push_str("-]");
            }
            TokenKind::Ins => {
                out.push_str("{+");
                out.push_str(&change.token);
                out.push_str("+}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{diff_lines, diff_tokens};

    #[test]
    fn test_unified_listing() {
        let segments = diff_lines("A\nB\nC", "A\nX\nC\nD");
        assert_eq!(render_unified(&segments), "  A\n- B\n+ X\n  C\n+ D\n");
    }

    #[test]
    fn test_unified_empty() {
        assert_eq!(render_unified(&[]), "");
    }

    #[test]
    fn test_side_by_side_rows() {
        let rows = side_by_side(&diff_lines("A\nB", "A\nB\nC"));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].kind, SegmentKind::Added);
        assert!(rows[2].left.is_none());
        assert_eq!(rows[2].right, Some(Cell { line: 3, text: "C".into() }));
        assert_eq!(rows[0].left, rows[0].right);
    }

    #[test]
    fn test_side_by_side_render_markers() {
        let rows = side_by_side(&diff_lines("keep\nold", "keep\nnew"));
        let rendered = render_side_by_side(&rows, 6);
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "   1 keep        1 keep");
        assert_eq!(lines[1], "   2 old    |    2 new");
    }

    #[test]
    fn test_inline_word_diff() {
        let changes = diff_tokens("the cat sat", "the dog sat");
        assert_eq!(render_inline(&changes), "the [-cat-]{+dog+} sat");
    }
}

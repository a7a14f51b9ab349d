//! Heuristic text diffing.
//!
//! Two variants are provided:
//!
//! - [`diff_tokens`]: whitespace-token diff for short free-form text,
//!   using a greedy walk with a bounded lookahead window.
//! - [`diff_lines`]: newline-delimited diff for full documents, using a
//!   first-occurrence alignment that pairs otherwise unmatched lines as
//!   [`SegmentKind::Modified`].
//!
//! Neither variant computes a minimal edit script. Output is stable for a
//! given input pair and both functions are total: every input, including
//! empty strings, produces a valid result.
//!
//! ```text
//! "A\nB\nC" ──┐
//!             ├── diff_lines ──► [= A] [~ B→X] [= C]
//! "A\nX\nC" ──┘
//! ```

mod line;
mod token;

use serde::{Deserialize, Serialize};

pub use line::diff_lines;
pub use token::{diff_tokens, tokenize, LOOKAHEAD_WINDOW};

/// Classification of a line-level segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Unchanged,
    Added,
    Removed,
    /// Two differing lines paired because neither reappears later on the
    /// other side.
    Modified,
}

/// One classified line of a line-level comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSegment {
    pub kind: SegmentKind,
    /// Original-side line. Present for `Unchanged`, `Removed` and `Modified`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_text: Option<String>,
    /// Revised-side line. Present for `Unchanged`, `Added` and `Modified`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_text: Option<String>,
    /// Display counter shared by both sides, one per emitted segment.
    pub line_number: usize,
    /// 1-based line on the original side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_line: Option<usize>,
    /// 1-based line on the revised side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_line: Option<usize>,
}

impl DiffSegment {
    /// Whether this segment represents a change of any kind.
    pub fn is_change(&self) -> bool {
        self.kind != SegmentKind::Unchanged
    }
}

/// Classification of a token-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Same,
    Ins,
    Del,
}

/// One token of a token-level comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenChange {
    pub token: String,
    pub kind: TokenKind,
}

impl TokenChange {
    pub fn same(token: impl Into<String>) -> Self {
        Self { token: token.into(), kind: TokenKind::Same }
    }

    pub fn ins(token: impl Into<String>) -> Self {
        Self { token: token.into(), kind: TokenKind::Ins }
    }

    pub fn del(token: impl Into<String>) -> Self {
        Self { token: token.into(), kind: TokenKind::Del }
    }

    /// Token as seen on the left (original) side.
    pub fn old_token(&self) -> Option<&str> {
        match self.kind {
            TokenKind::Same | TokenKind::Del => Some(&self.token),
            TokenKind::Ins => None,
        }
    }

    /// Token as seen on the right (revised) side.
    pub fn new_token(&self) -> Option<&str> {
        match self.kind {
            TokenKind::Same | TokenKind::Ins => Some(&self.token),
            TokenKind::Del => None,
        }
    }
}

/// Rebuild the original input from line segments.
pub fn reconstruct_old(segments: &[DiffSegment]) -> String {
    join_side(segments.iter().filter_map(|s| s.old_text.as_deref()))
}

/// Rebuild the revised input from line segments.
pub fn reconstruct_new(segments: &[DiffSegment]) -> String {
    join_side(segments.iter().filter_map(|s| s.new_text.as_deref()))
}

fn join_side<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    lines.collect::<Vec<_>>().join("\n")
}

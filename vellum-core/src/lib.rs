//! # vellum-core: document comparison engine
//!
//! Pure, synchronous building blocks for comparing versions of compliance
//! documents and keeping asynchronous loads in order.
//!
//! ## Modules
//!
//! - [`diff`]: token-level and line-level heuristic diffs
//! - [`compare`]: statistics, similarity, impact and change summaries
//! - [`view`]: unified, side-by-side and inline renderings
//! - [`sequence`]: latest-request-wins guard for stale responses

pub mod diff;
pub mod compare;
pub mod view;
pub mod sequence;

// Re-exports for convenience
pub use diff::{
    diff_lines, diff_tokens, reconstruct_new, reconstruct_old, tokenize,
    DiffSegment, SegmentKind, TokenChange, TokenKind, LOOKAHEAD_WINDOW,
};
pub use compare::{
    analyze_compliance, assess_impact, change_ratio, similarity, summarize, AssessedChange,
    ChangeMagnitude, Comparison, ComplianceImpact, DiffStats, Framework, ImpactLevel,
    TokenStats,
};
pub use view::{render_inline, render_side_by_side, render_unified, side_by_side, Cell, SideBySideRow};
pub use sequence::{Latest, RequestSequencer, Ticket};

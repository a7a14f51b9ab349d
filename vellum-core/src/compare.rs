//! Version comparison analysis built on top of the line diff.
//!
//! Adds the summary figures shown next to a comparison: change counts,
//! a coarse similarity score with its magnitude bucket, and per-segment
//! impact and wording for compliance reviewers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use similar::TextDiff;

use crate::diff::{diff_lines, DiffSegment, SegmentKind, TokenChange, TokenKind};

/// Keywords whose presence in a change marks it as critical.
const CRITICAL_KEYWORDS: &[&str] = &[
    "shall",
    "must",
    "required",
    "mandatory",
    "compliance",
    "regulation",
    "legal",
    "penalty",
    "violation",
    "audit",
    "security",
    "privacy",
    "confidential",
    "restricted",
];

/// Keywords whose presence in a change marks it as high impact.
const HIGH_IMPACT_KEYWORDS: &[&str] = &[
    "policy",
    "procedure",
    "process",
    "control",
    "standard",
    "responsibility",
    "authority",
    "approval",
    "review",
];

/// Segment counts for a line comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub additions: usize,
    pub deletions: usize,
    pub modifications: usize,
    pub unchanged: usize,
    pub total_changes: usize,
}

impl DiffStats {
    pub fn from_segments(segments: &[DiffSegment]) -> Self {
        let mut stats = Self::default();
        for segment in segments {
            match segment.kind {
                SegmentKind::Added => stats.additions += 1,
                SegmentKind::Removed => stats.deletions += 1,
                SegmentKind::Modified => stats.modifications += 1,
                SegmentKind::Unchanged => stats.unchanged += 1,
            }
        }
        stats.total_changes = stats.additions + stats.deletions + stats.modifications;
        stats
    }

    pub fn is_identical(&self) -> bool {
        self.total_changes == 0
    }
}

/// Token counts for a token comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStats {
    pub same: usize,
    pub inserted: usize,
    pub deleted: usize,
}

impl TokenStats {
    pub fn from_changes(changes: &[TokenChange]) -> Self {
        let mut stats = Self::default();
        for change in changes {
            match change.kind {
                TokenKind::Same => stats.same += 1,
                TokenKind::Ins => stats.inserted += 1,
                TokenKind::Del => stats.deleted += 1,
            }
        }
        stats
    }

    pub fn is_identical(&self) -> bool {
        self.inserted == 0 && self.deleted == 0
    }
}

/// Jaccard index over the sets of lowercase characters of both texts.
///
/// Cheap and order-insensitive: it measures vocabulary overlap, not edit
/// distance. Two empty texts are fully similar; one empty text is not
/// similar at all.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let set_a: HashSet<char> = a.chars().flat_map(char::to_lowercase).collect();
    let set_b: HashSet<char> = b.chars().flat_map(char::to_lowercase).collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Character-level match ratio `2·M / T` of two texts.
///
/// `M` is the number of characters in matching blocks of a character diff
/// and `T` the total character count of both inputs. Two empty texts score
/// 1.0.
pub fn change_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    f64::from(TextDiff::from_chars(a, b).ratio())
}

/// Coarse bucket for how much a document changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeMagnitude {
    Minor,
    Moderate,
    Major,
}

impl ChangeMagnitude {
    pub fn from_similarity(similarity: f64) -> Self {
        if similarity > 0.9 {
            Self::Minor
        } else if similarity > 0.7 {
            Self::Moderate
        } else {
            Self::Major
        }
    }
}

/// How much a single change matters to a compliance reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Grade a segment by the keywords it touches, falling back to its kind.
pub fn assess_impact(segment: &DiffSegment) -> ImpactLevel {
    let old = segment.old_text.as_deref().unwrap_or("");
    let new = segment.new_text.as_deref().unwrap_or("");

    if segment.kind == SegmentKind::Unchanged {
        return ImpactLevel::Low;
    }

    let combined = format!("{old} {new}").to_lowercase();
    if CRITICAL_KEYWORDS.iter().any(|k| combined.contains(k)) {
        return ImpactLevel::Critical;
    }
    if HIGH_IMPACT_KEYWORDS.iter().any(|k| combined.contains(k)) {
        return ImpactLevel::High;
    }

    match segment.kind {
        SegmentKind::Removed => ImpactLevel::High,
        SegmentKind::Added => ImpactLevel::Medium,
        SegmentKind::Modified => {
            let ratio = change_ratio(old, new);
            if ratio < 0.3 {
                ImpactLevel::High
            } else if ratio < 0.7 {
                ImpactLevel::Medium
            } else {
                ImpactLevel::Low
            }
        }
        SegmentKind::Unchanged => ImpactLevel::Low,
    }
}

/// One-line human description of a segment.
pub fn summarize(segment: &DiffSegment) -> String {
    let words = |text: &Option<String>| text.as_deref().map_or(0, |t| t.split_whitespace().count());

    match segment.kind {
        SegmentKind::Added => format!("Added {} words of new content", words(&segment.new_text)),
        SegmentKind::Removed => format!("Deleted {} words of content", words(&segment.old_text)),
        SegmentKind::Modified => {
            let old_words = words(&segment.old_text);
            let new_words = words(&segment.new_text);
            if new_words > old_words {
                format!("Modified content, added {} words", new_words - old_words)
            } else if new_words < old_words {
                format!("Modified content, removed {} words", old_words - new_words)
            } else {
                format!("Modified {old_words} words of content")
            }
        }
        SegmentKind::Unchanged => "No change".to_string(),
    }
}

/// Compliance framework a change may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Framework {
    #[serde(rename = "GDPR")]
    Gdpr,
    #[serde(rename = "SOX")]
    Sox,
    #[serde(rename = "HIPAA")]
    Hipaa,
    #[serde(rename = "ISO27001")]
    Iso27001,
    #[serde(rename = "PCI DSS")]
    PciDss,
}

impl Framework {
    pub const ALL: [Framework; 5] = [
        Framework::Gdpr,
        Framework::Sox,
        Framework::Hipaa,
        Framework::Iso27001,
        Framework::PciDss,
    ];

    /// Lowercase phrases that signal the framework.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Framework::Gdpr => &[
                "gdpr",
                "data protection",
                "personal data",
                "privacy",
                "consent",
                "data subject",
            ],
            Framework::Sox => &[
                "sox",
                "sarbanes",
                "financial",
                "internal control",
                "audit",
                "financial reporting",
            ],
            Framework::Hipaa => &[
                "hipaa",
                "health",
                "medical",
                "patient",
                "phi",
                "protected health information",
            ],
            Framework::Iso27001 => &[
                "iso27001",
                "information security",
                "security management",
                "risk management",
            ],
            Framework::PciDss => &["pci", "payment card", "cardholder", "payment data", "card data"],
        }
    }
}

/// Frameworks affected by a change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceImpact {
    pub affected_frameworks: Vec<Framework>,
    pub requires_review: bool,
}

/// Match both sides of a change against the framework keyword table.
///
/// Matching is a plain lowercase substring search, so short keywords such as
/// `phi` also hit inside longer words.
pub fn analyze_compliance(old: &str, new: &str) -> ComplianceImpact {
    let combined = format!("{old} {new}").to_lowercase();
    let affected_frameworks: Vec<Framework> = Framework::ALL
        .into_iter()
        .filter(|f| f.keywords().iter().any(|k| combined.contains(k)))
        .collect();
    ComplianceImpact {
        requires_review: !affected_frameworks.is_empty(),
        affected_frameworks,
    }
}

/// A changed segment annotated for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessedChange {
    pub segment: DiffSegment,
    pub impact: ImpactLevel,
    pub summary: String,
    pub compliance: ComplianceImpact,
}

/// Full comparison of two document versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub segments: Vec<DiffSegment>,
    pub stats: DiffStats,
    pub similarity: f64,
    pub magnitude: ChangeMagnitude,
}

impl Comparison {
    pub fn new(old: &str, new: &str) -> Self {
        let segments = diff_lines(old, new);
        let stats = DiffStats::from_segments(&segments);
        let similarity = similarity(old, new);
        log::debug!(
            "Compared {} → {} bytes: {} changes, similarity {:.2}",
            old.len(),
            new.len(),
            stats.total_changes,
            similarity
        );
        Self {
            segments,
            stats,
            similarity,
            magnitude: ChangeMagnitude::from_similarity(similarity),
        }
    }

    /// Changed segments with impact and summary, most severe first.
    ///
    /// Ties keep document order.
    pub fn assessed_changes(&self) -> Vec<AssessedChange> {
        let mut changes: Vec<AssessedChange> = self
            .segments
            .iter()
            .filter(|s| s.is_change())
            .map(|s| AssessedChange {
                segment: s.clone(),
                impact: assess_impact(s),
                summary: summarize(s),
                compliance: analyze_compliance(
                    s.old_text.as_deref().unwrap_or(""),
                    s.new_text.as_deref().unwrap_or(""),
                ),
            })
            .collect();
        changes.sort_by(|a, b| b.impact.cmp(&a.impact));
        changes
    }

    /// Percentage form of [`Comparison::similarity`], rounded to two places.
    pub fn similarity_percentage(&self) -> f64 {
        (self.similarity * 10_000.0).round() / 100.0
    }
}

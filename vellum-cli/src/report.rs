//! Output of the `compare` command.

use clap::ValueEnum;
use serde::Serialize;
use vellum_core::{
    change_ratio, diff_tokens, render_inline, render_side_by_side, render_unified, side_by_side,
    AssessedChange, Comparison, TokenChange, TokenStats,
};

/// Output format for `compare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Unified,
    SideBySide,
    Json,
}

/// Options for one comparison.
#[derive(Debug, Clone, Copy)]
pub struct CompareOptions {
    pub tokens: bool,
    pub format: OutputFormat,
    pub stats: bool,
    /// Text column width for side-by-side output.
    pub width: usize,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            tokens: false,
            format: OutputFormat::Unified,
            stats: false,
            width: 40,
        }
    }
}

/// Rendered comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub body: String,
    pub identical: bool,
}

#[derive(Serialize)]
struct LineReport<'a> {
    #[serde(flatten)]
    comparison: &'a Comparison,
    changes: Vec<AssessedChange>,
}

#[derive(Serialize)]
struct TokenReport<'a> {
    changes: &'a [TokenChange],
    stats: TokenStats,
    ratio: f64,
}

/// Compare two texts and render the result.
pub fn build(old: &str, new: &str, options: &CompareOptions) -> anyhow::Result<Report> {
    if options.tokens {
        token_report(old, new, options)
    } else {
        line_report(old, new, options)
    }
}

fn line_report(old: &str, new: &str, options: &CompareOptions) -> anyhow::Result<Report> {
    let comparison = Comparison::new(old, new);
    let identical = comparison.stats.is_identical();

    let mut body = match options.format {
        OutputFormat::Unified => render_unified(&comparison.segments),
        OutputFormat::SideBySide => {
            render_side_by_side(&side_by_side(&comparison.segments), options.width)
        }
        OutputFormat::Json => {
            let report = LineReport {
                changes: comparison.assessed_changes(),
                comparison: &comparison,
            };
            let mut json = serde_json::to_string_pretty(&report)?;
            json.push('\n');
            json
        }
    };

    if options.stats && options.format != OutputFormat::Json {
        let stats = &comparison.stats;
        body.push_str(&format!(
            "\n{} added, {} removed, {} modified, {} unchanged; similarity {:.2}% ({:?})\n",
            stats.additions,
            stats.deletions,
            stats.modifications,
            stats.unchanged,
            comparison.similarity_percentage(),
            comparison.magnitude,
        ));
        for change in comparison.assessed_changes() {
            body.push_str(&format!("  [{:?}] {}\n", change.impact, change.summary));
        }
    }

    Ok(Report { body, identical })
}

fn token_report(old: &str, new: &str, options: &CompareOptions) -> anyhow::Result<Report> {
    let changes = diff_tokens(old, new);
    let stats = TokenStats::from_changes(&changes);
    let identical = stats.is_identical();

    let mut body = match options.format {
        OutputFormat::Json => {
            let report = TokenReport {
                changes: &changes,
                stats,
                ratio: change_ratio(old, new),
            };
            let mut json = serde_json::to_string_pretty(&report)?;
            json.push('\n');
            json
        }
        OutputFormat::Unified | OutputFormat::SideBySide => {
            let mut inline = render_inline(&changes);
            inline.push('\n');
            inline
        }
    };

    if options.stats && options.format != OutputFormat::Json {
        body.push_str(&format!(
            "\n{} same, {} inserted, {} deleted; ratio {:.2}\n",
            stats.same,
            stats.inserted,
            stats.deleted,
            change_ratio(old, new),
        ));
    }

    Ok(Report { body, identical })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_report() {
        let report = build("A\nB\nC", "A\nX\nC", &CompareOptions::default()).unwrap();
        assert!(!report.identical);
        assert_eq!(report.body, "  A\n- B\n+ X\n  C\n");
    }

    #[test]
    fn test_identical_inputs() {
        let report = build("same\ntext", "same\ntext", &CompareOptions::default()).unwrap();
        assert!(report.identical);

        let options = CompareOptions { tokens: true, ..CompareOptions::default() };
        let report = build("same text", "same text", &options).unwrap();
        assert!(report.identical);
        assert_eq!(report.body, "same text\n");
    }

    #[test]
    fn test_token_inline_report() {
        let options = CompareOptions { tokens: true, ..CompareOptions::default() };
        let report = build("the cat sat", "the dog sat", &options).unwrap();
        assert!(!report.identical);
        assert!(report.body.contains("[-cat-]"));
        assert!(report.body.contains("{+dog+}"));
    }

    #[test]
    fn test_json_line_report() {
        let options = CompareOptions { format: OutputFormat::Json, ..CompareOptions::default() };
        let report = build("keep\nold", "keep\nnew", &options).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report.body).unwrap();

        assert_eq!(value["stats"]["total_changes"], 1);
        assert_eq!(value["segments"][0]["kind"], "unchanged");
        assert_eq!(value["changes"].as_array().unwrap().len(), 1);
        assert!(value["similarity"].is_number());
    }

    #[test]
    fn test_json_report_flags_compliance_frameworks() {
        let options = CompareOptions { format: OutputFormat::Json, ..CompareOptions::default() };
        let report = build(
            "Scope",
            "Scope
Personal data is encrypted at rest",
            &options,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&report.body).unwrap();
        let compliance = &value["changes"][0]["compliance"];
        assert_eq!(compliance["affected_frameworks"], serde_json::json!(["GDPR"]));
        assert_eq!(compliance["requires_review"], true);
    }

    #[test]
    fn test_json_token_report() {
        let options = CompareOptions {
            tokens: true,
            format: OutputFormat::Json,
            ..CompareOptions::default()
        };
        let report = build("a b", "a c", &options).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report.body).unwrap();
        assert_eq!(value["stats"]["same"], 2);
        assert_eq!(value["stats"]["inserted"], 1);
        assert_eq!(value["stats"]["deleted"], 1);
    }

    #[test]
    fn test_stats_footer() {
        let options = CompareOptions { stats: true, ..CompareOptions::default() };
        let report = build("Records are kept", "Records are kept\nApproval required", &options)
            .unwrap();
        assert!(report.body.contains("1 added, 0 removed, 0 modified, 1 unchanged"));
        assert!(report.body.contains("[High] Added 2 words of new content"));
    }

    #[test]
    fn test_side_by_side_report() {
        let options = CompareOptions {
            format: OutputFormat::SideBySide,
            width: 6,
            ..CompareOptions::default()
        };
        let report = build("keep\nold", "keep\nnew", &options).unwrap();
        let lines: Vec<_> = report.body.lines().collect();
        assert_eq!(lines[0], "   1 keep        1 keep");
        assert_eq!(lines[1], "   2 old    |    2 new");
    }
}

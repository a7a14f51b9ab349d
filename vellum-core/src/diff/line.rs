use super::{DiffSegment, SegmentKind};

/// Line diff using first-occurrence alignment.
///
/// At each mismatch the engine looks for the current old line further down
/// the new side (`m1`) and the current new line further down the old side
/// (`m2`). The nearer reappearance (compared by absolute index, ties going to
/// `m2`) decides whether the gap is a run of additions or removals. When
/// neither line reappears the two are paired as one `Modified` segment.
///
/// An empty string has no lines. Worst case is O(n²) because of the scans.
pub fn diff_lines(old: &str, new: &str) -> Vec<DiffSegment> {
    let lines1 = split_lines(old);
    let lines2 = split_lines(new);
    let mut out = Builder::with_capacity(lines1.len().max(lines2.len()));

    let (mut i, mut j) = (0, 0);
    loop {
        if i >= lines1.len() {
            for line in &lines2[j..] {
                out.added(line);
            }
            break;
        }
        if j >= lines2.len() {
            for line in &lines1[i..] {
                out.removed(line);
            }
            break;
        }

        if lines1[i] == lines2[j] {
            out.unchanged(lines1[i]);
            i += 1;
            j += 1;
            continue;
        }

        let m1 = position_from(&lines2, j, lines1[i]);
        let m2 = position_from(&lines1, i, lines2[j]);

        match (m1, m2) {
            (Some(m1), m2) if m2.map_or(true, |m2| m1 < m2) => {
                for line in &lines2[j..m1] {
                    out.added(line);
                }
                j = m1;
            }
            (_, Some(m2)) => {
                for line in &lines1[i..m2] {
                    out.removed(line);
                }
                i = m2;
            }
            _ => {
                out.modified(lines1[i], lines2[j]);
                i += 1;
                j += 1;
            }
        }
    }

    out.finish()
}

fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.split('\n').collect()
    }
}

fn position_from(haystack: &[&str], from: usize, needle: &str) -> Option<usize> {
    haystack[from..]
        .iter()
        .position(|line| *line == needle)
        .map(|offset| from + offset)
}

/// Accumulates segments while tracking the shared display counter and the
/// per-side line positions.
struct Builder {
    segments: Vec<DiffSegment>,
    old_line: usize,
    new_line: usize,
}

impl Builder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            segments: Vec::with_capacity(capacity),
            old_line: 0,
            new_line: 0,
        }
    }

    fn push(&mut self, kind: SegmentKind, old_text: Option<&str>, new_text: Option<&str>) {
        let old_line = old_text.map(|_| {
            self.old_line += 1;
            self.old_line
        });
        let new_line = new_text.map(|_| {
            self.new_line += 1;
            self.new_line
        });
        let line_number = self.segments.len() + 1;
        self.segments.push(DiffSegment {
            kind,
            old_text: old_text.map(str::to_owned),
            new_text: new_text.map(str::to_owned),
            line_number,
            old_line,
            new_line,
        });
    }

    fn unchanged(&mut self, line: &str) {
        self.push(SegmentKind::Unchanged, Some(line), Some(line));
    }

    fn added(&mut self, line: &str) {
        self.push(SegmentKind::Added, None, Some(line));
    }

    fn removed(&mut self, line: &str) {
        self.push(SegmentKind::Removed, Some(line), None);
    }

    fn modified(&mut self, old: &str, new: &str) {
        self.push(SegmentKind::Modified, Some(old), Some(new));
    }

    fn finish(self) -> Vec<DiffSegment> {
        self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{reconstruct_new, reconstruct_old};

    fn kinds(segments: &[DiffSegment]) -> Vec<SegmentKind> {
        segments.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn test_modified_line_between_unchanged() {
        let segments = diff_lines("A\nB\nC", "A\nX\nC");
        assert_eq!(
            kinds(&segments),
            vec![SegmentKind::Unchanged, SegmentKind::Modified, SegmentKind::Unchanged]
        );
        assert_eq!(segments[1].old_text.as_deref(), Some("B"));
        assert_eq!(segments[1].new_text.as_deref(), Some("X"));
        assert_eq!(segments[2].old_text.as_deref(), Some("C"));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(diff_lines("", "").is_empty());

        let added = diff_lines("", "abc");
        assert_eq!(kinds(&added), vec![SegmentKind::Added]);
        assert_eq!(added[0].new_text.as_deref(), Some("abc"));

        let removed = diff_lines("abc", "");
        assert_eq!(kinds(&removed), vec![SegmentKind::Removed]);
        assert_eq!(removed[0].old_text.as_deref(), Some("abc"));
    }

    #[test]
    fn test_inserted_block_is_added() {
        let segments = diff_lines("A\nB", "A\nX\nY\nB");
        assert_eq!(
            kinds(&segments),
            vec![
                SegmentKind::Unchanged,
                SegmentKind::Added,
                SegmentKind::Added,
                SegmentKind::Unchanged,
            ]
        );
    }

    #[test]
    fn test_deleted_block_is_removed() {
        let segments = diff_lines("A\nX\nY\nB", "A\nB");
        assert_eq!(
            kinds(&segments),
            vec![
                SegmentKind::Unchanged,
                SegmentKind::Removed,
                SegmentKind::Removed,
                SegmentKind::Unchanged,
            ]
        );
    }

    #[test]
    fn test_swapped_lines_prefer_removal_on_tie() {
        // m1 == m2 == 1, so the removal branch wins.
        let segments = diff_lines("A\nB", "B\nA");
        assert_eq!(
            kinds(&segments),
            vec![SegmentKind::Removed, SegmentKind::Unchanged, SegmentKind::Added]
        );
        assert_eq!(segments[0].old_text.as_deref(), Some("A"));
        assert_eq!(segments[2].new_text.as_deref(), Some("A"));
    }

    #[test]
    fn test_unrelated_lines_pair_as_modified() {
        let segments = diff_lines("alpha\nbeta", "gamma\ndelta");
        assert_eq!(kinds(&segments), vec![SegmentKind::Modified, SegmentKind::Modified]);
    }

    #[test]
    fn test_line_numbers_and_side_positions() {
        let segments = diff_lines("A\nB\nC", "A\nC\nD");
        // A unchanged, B removed, C unchanged, D added
        assert_eq!(
            kinds(&segments),
            vec![
                SegmentKind::Unchanged,
                SegmentKind::Removed,
                SegmentKind::Unchanged,
                SegmentKind::Added,
            ]
        );
        let numbers: Vec<_> = segments.iter().map(|s| s.line_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        let old: Vec<_> = segments.iter().map(|s| s.old_line).collect();
        assert_eq!(old, vec![Some(1), Some(2), Some(3), None]);
        let new: Vec<_> = segments.iter().map(|s| s.new_line).collect();
        assert_eq!(new, vec![Some(1), None, Some(2), Some(3)]);
    }

    #[test]
    fn test_trailing_newline_is_preserved() {
        let old = "A\nB\n";
        let new = "A\nB";
        let segments = diff_lines(old, new);
        assert_eq!(reconstruct_old(&segments), old);
        assert_eq!(reconstruct_new(&segments), new);
    }

    #[test]
    fn test_whitespace_only_inputs() {
        let segments = diff_lines("   ", "\n\n");
        assert_eq!(reconstruct_old(&segments), "   ");
        assert_eq!(reconstruct_new(&segments), "\n\n");
    }

    #[test]
    fn test_repeated_lines_totality() {
        let old = "x\ny\nx\ny\nz";
        let new = "y\nx\nz\nx";
        let segments = diff_lines(old, new);
        assert_eq!(reconstruct_old(&segments), old);
        assert_eq!(reconstruct_new(&segments), new);
    }
}

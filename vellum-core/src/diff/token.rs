use super::TokenChange;

/// How many tokens past the right cursor are searched for the current
/// left token before it is declared deleted.
pub const LOOKAHEAD_WINDOW: usize = 10;

/// Split `text` into alternating word and whitespace-run tokens.
///
/// Concatenating the returned tokens yields `text` exactly. No empty tokens
/// are produced, so an empty input yields an empty vector.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;

    for (idx, ch) in text.char_indices() {
        let space = ch.is_whitespace();
        match in_space {
            Some(prev) if prev != space => {
                tokens.push(&text[start..idx]);
                start = idx;
            }
            _ => {}
        }
        in_space = Some(space);
    }

    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

/// Greedy token diff with a bounded lookahead.
///
/// When the current tokens differ, the left token is searched for in the
/// next [`LOOKAHEAD_WINDOW`] right tokens (starting one past the right
/// cursor). A hit means the right token was inserted; a miss means the left
/// token was deleted. Runs in O(n·w).
pub fn diff_tokens(left: &str, right: &str) -> Vec<TokenChange> {
    let left = tokenize(left);
    let right = tokenize(right);
    let mut out = Vec::with_capacity(left.len().max(right.len()));

    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if left[i] == right[j] {
            out.push(TokenChange::same(left[i]));
            i += 1;
            j += 1;
        } else if found_ahead(&right, j, left[i]) {
            out.push(TokenChange::ins(right[j]));
            j += 1;
        } else {
            out.push(TokenChange::del(left[i]));
            i += 1;
        }
    }

    out.extend(left[i..].iter().map(|t| TokenChange::del(*t)));
    out.extend(right[j..].iter().map(|t| TokenChange::ins(*t)));
    out
}

fn found_ahead(right: &[&str], j: usize, needle: &str) -> bool {
    let from = (j + 1).min(right.len());
    let to = (from + LOOKAHEAD_WINDOW).min(right.len());
    right[from..to].contains(&needle)
}

//! Application Name Normalization
//!
//! Turns a raw line from the name list into the query string sent to the
//! store search:
//! - Case variations: HALF-LIFE vs Half-Life vs half-life
//! - Punctuation: "Half-Life 2: Episode One" -> "halflife 2 episode one"
//! - Whitespace: tabs and runs of spaces collapse to a single space
//!
//! Normalization never fails. A name made only of punctuation normalizes to
//! the empty string, which the resolver treats as not found.

/// Normalize a raw application name into a search query.
///
/// The result contains only lowercase alphanumeric characters and single
/// spaces, with no leading or trailing space.
pub fn normalize(raw: &str) -> String {
    let mut query = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() {
            pending_space = !query.is_empty();
        } else if c.is_alphanumeric() {
            if pending_space {
                query.push(' ');
                pending_space = false;
            }
            query.push(c);
        }
    }

    query
}

/// Number of whitespace separated tokens in a query.
pub fn token_count(query: &str) -> usize {
    query.split_whitespace().count()
}

/// Drop the last token of a query.
///
/// Returns `None` when nothing would be left, i.e. the query has at most one
/// token.
pub fn truncate_last_token(query: &str) -> Option<String> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    if tokens.len() <= 1 {
        return None;
    }
    Some(tokens[..tokens.len() - 1].join(" "))
}

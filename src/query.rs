//! Character-level validation of AFLUX matchbook strings.
//!
//! The validator does not parse the query language. It runs three
//! independent checks on the raw string: whitespace presence, an operator
//! allowlist over the punctuation characters, and a keyword allowlist over
//! the alphabetic characters.

use tracing::debug;

use crate::constants::{AFLOW_KEYWORDS, AFLOW_OPERATORS};

/// Returns true when a matchbook (or keyword) string passes all three
/// syntax checks.
///
/// 1. The string contains at least one whitespace character. This is the
///    literal behavior of the validator as deployed; real AFLUX matchbooks
///    usually contain no whitespace, so the check looks inverted. It is
///    preserved as-is rather than silently corrected.
/// 2. Every punctuation character belongs to [`AFLOW_OPERATORS`].
/// 3. After deleting every [`AFLOW_KEYWORDS`] entry from the string's
///    alphabetic residue (as substrings, in list order), no alphabetic
///    characters remain.
pub(crate) fn is_query_valid(query: &str) -> bool {
    let has_whitespace = query.chars().any(char::is_whitespace);
    if !has_whitespace {
        debug!(query, "query rejected: no whitespace character");
    }

    let operators_ok = query
        .chars()
        .filter(char::is_ascii_punctuation)
        .all(|c| AFLOW_OPERATORS.contains(c));
    if !operators_ok {
        debug!(query, "query rejected: disallowed operator");
    }

    let residue = unknown_alphabetic_residue(query);
    let keywords_ok = residue.is_empty();
    if !keywords_ok {
        debug!(query, residue = %residue, "query rejected: unknown keyword");
    }

    has_whitespace && operators_ok && keywords_ok
}

/// Concatenates the alphabetic characters of `query` and strips every
/// known keyword token, returning whatever alphabetic text is left over.
fn unknown_alphabetic_residue(query: &str) -> String {
    let mut residue: String = query.chars().filter(|c| c.is_alphabetic()).collect();
    for keyword in AFLOW_KEYWORDS {
        if residue.contains(keyword) {
            residue = residue.replace(keyword, "");
        }
    }
    residue
}

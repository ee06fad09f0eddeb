//! Fixed configuration constants for the AFLUX API.
//!
//! These values mirror what the AFLOW server publishes at
//! <https://aflow.org/documentation/>: the server origin, the AFLUX entry
//! point, and the character-level syntax the query validator accepts.

/// AFLOW server origin.
pub const AFLOW_SERVER: &str = "https://aflow.org";

/// AFLUX API path segment, including the `?` that starts the matchbook.
pub const AFLOW_API: &str = "/API/aflux/?";

/// Default page number. Page 0 asks the server for all results at once.
pub const AFLOW_DEFAULT_PAGING: i64 = 0;

/// URL schemes the retry policy is willing to act on.
pub const HTTP_PROTOCOLS: &[&str] = &["http", "https"];

/// HTTP status codes eligible for automatic retry.
pub const HTTP_STATUS_FORCELIST: &[u16] = &[429, 500, 502, 503, 504];

/// Punctuation characters allowed in a matchbook.
///
/// Covers the AFLUX operators (`,` AND, `:` OR, `!` NOT, `*` loose match,
/// `'` string quote, `()` grouping, `$` directive marker, comparison
/// operators) plus `_`, `.`, `-` and `+` as they occur inside keyword names
/// and numeric literals.
pub const AFLOW_OPERATORS: &str = "!$'()*+,-.:<=>_";

/// Alphabetic keyword tokens recognized by the matchbook validator.
///
/// The validator strips these from the alphabetic residue of a query as
/// substrings, in list order, so compound names must precede the shorter
/// tokens they contain (`nspecies` before `species`, `formation` before
/// `format`).
pub const AFLOW_KEYWORDS: &[&str] = &[
    "nspecies",
    "species",
    "natoms",
    "auid",
    "aurl",
    "compound",
    "prototype",
    "catalog",
    "Egap",
    "energy",
    "enthalpy",
    "entropy",
    "formation",
    "stoichiometry",
    "density",
    "volume",
    "cell",
    "atom",
    "spacegroup",
    "relax",
    "orig",
    "geometry",
    "positions",
    "cartesian",
    "fractional",
    "forces",
    "kpoints",
    "pressure",
    "spin",
    "type",
    "help",
    "paging",
    "format",
    "json",
    "schema",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_order_strips_compound_names_first() {
        // "nspecies" must be deleted before "species" gets a chance to
        // leave a stray "n" behind; same for "formation"/"format".
        let nspecies = AFLOW_KEYWORDS.iter().position(|k| *k == "nspecies");
        let species = AFLOW_KEYWORDS.iter().position(|k| *k == "species");
        assert!(nspecies < species);

        let formation = AFLOW_KEYWORDS.iter().position(|k| *k == "formation");
        let format = AFLOW_KEYWORDS.iter().position(|k| *k == "format");
        assert!(formation < format);
    }

    #[test]
    fn test_operators_are_ascii_punctuation() {
        assert!(AFLOW_OPERATORS.chars().all(|c| c.is_ascii_punctuation()));
    }

    #[test]
    fn test_base_url_parts() {
        assert!(AFLOW_SERVER.starts_with("https://"));
        assert!(AFLOW_API.ends_with('?'));
    }
}

//! Per-entry resource helpers.
//!
//! AFLUX query results reference further resources through an `aurl`
//! locator (`host:path/to/entry`). The helpers here turn that locator into
//! a plain HTTP URL, patch legacy CONTCAR structure files, and split
//! semicolon-delimited property strings. The client never mutates the
//! caller's entry maps; everything here reads from borrowed data.

use serde_json::Value;

use crate::error::AfluxError;

/// A JSON-shaped value returned by the AFLUX API. No fixed schema is
/// enforced beyond the optional keys specific helper operations read.
pub type AfluxResponse = Value;

/// One material record produced by an AFLUX query.
///
/// Must carry an `aurl` string for per-entry fetches; structure patching
/// additionally needs a `species` array of strings.
pub type Entry = serde_json::Map<String, Value>;

/// Index of the line a VASP POSCAR/CONTCAR reserves for species names.
/// The legacy VASP4 format omits it and puts the atom counts there.
const SPECIES_LINE_INDEX: usize = 5;

/// Extracts the required `aurl` field from an entry.
pub(crate) fn entry_aurl(entry: &Entry) -> Result<&str, AfluxError> {
    entry
        .get("aurl")
        .and_then(Value::as_str)
        .ok_or_else(|| AfluxError::invalid_argument("entry is missing the 'aurl' key"))
}

/// Builds a direct (non-AFLUX) URL from an `aurl` locator.
///
/// The colon separating host from path is replaced by a slash and the
/// given suffix is appended, e.g.
/// `aflowlib.duke.edu:AFLOWDATA/x` + `/CONTCAR.relax` →
/// `http://aflowlib.duke.edu/AFLOWDATA/x/CONTCAR.relax`.
pub(crate) fn direct_url(aurl: &str, suffix: &str) -> String {
    format!("http://{}{}", aurl.replace(':', "/"), suffix)
}

/// Patches a CONTCAR body that is in the legacy VASP4 format.
///
/// VASP4 files omit the species-name line, so the line at index 5 holds
/// the atom counts and starts with a digit. When that is the case, a
/// species line synthesized from the entry's `species` array is inserted
/// at that index. Modern files, and bodies too short to carry a line 5,
/// are returned unchanged.
pub(crate) fn patch_species_line(poscar: &str, entry: &Entry) -> Result<String, AfluxError> {
    let mut lines: Vec<&str> = poscar.split('\n').collect();

    let needs_species = lines
        .get(SPECIES_LINE_INDEX)
        .and_then(|line| line.trim().chars().next())
        .is_some_and(|c| c.is_ascii_digit());
    if !needs_species {
        return Ok(poscar.to_string());
    }

    let species_line = species_names(entry)?.join(" ");
    lines.insert(SPECIES_LINE_INDEX, &species_line);
    Ok(lines.join("\n"))
}

/// Reads the `species` array of an entry as string slices.
fn species_names(entry: &Entry) -> Result<Vec<&str>, AfluxError> {
    let values = entry
        .get("species")
        .and_then(Value::as_array)
        .ok_or_else(|| AfluxError::invalid_argument("entry is missing the 'species' array"))?;

    values
        .iter()
        .map(|v| {
            v.as_str().ok_or_else(|| {
                AfluxError::invalid_argument("entry 'species' array holds a non-string value")
            })
        })
        .collect()
}

/// Splits a raw property response into its value strings.
///
/// The body is trimmed and split on `;`; each piece is returned verbatim,
/// surrounding spaces included.
pub(crate) fn split_property(body: &str) -> Vec<String> {
    body.trim().split(';').map(str::to_string).collect()
}

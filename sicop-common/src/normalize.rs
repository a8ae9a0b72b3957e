//! Comuna name normalization
//!
//! Every join or lookup keyed by locality goes through [`normalize_comuna`]:
//! dataset loading, the curated segment table, and each incoming query.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical key for a free-text comuna name.
///
/// Decomposes (NFKD) and drops combining marks, lower-cases, then trims
/// surrounding whitespace, so "Ñuñoa " and "nunoa" collapse to the same key.
/// Lower-casing can produce characters that are not yet decomposed, so the
/// fold runs on both sides of it.
///
/// # Examples
///
/// ```
/// use sicop_common::normalize::normalize_comuna;
///
/// assert_eq!(normalize_comuna("  Ñuñoa "), "nunoa");
/// assert_eq!(normalize_comuna("Peñalolén"), "penalolen");
/// ```
pub fn normalize_comuna(name: &str) -> String {
    let lowered = strip_marks(name).to_lowercase();
    strip_marks(&lowered).trim().to_string()
}

fn strip_marks(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

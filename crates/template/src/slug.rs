//! Section keys derived from titles

use draftforge_common::errors::{AppError, Result};
use regex_lite::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

fn punctuation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_\s-]").expect("valid pattern"))
}

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s_-]+").expect("valid pattern"))
}

/// Decompose, drop non-ASCII, strip punctuation, lowercase and join words
/// with `_`. "Budget Final" becomes `budget_final`, "Étude préalable"
/// becomes `etude_prealable`.
pub fn slugify(title: &str) -> Result<String> {
    let ascii: String = title.nfkd().filter(char::is_ascii).collect();
    let cleaned = punctuation().replace_all(&ascii, "");
    let lowered = cleaned.trim().to_lowercase();
    let slug = separators().replace_all(&lowered, "_").into_owned();

    if slug.is_empty() || slug == "_" {
        return Err(AppError::validation(
            "titre",
            format!("title '{}' yields an empty section key", title),
        ));
    }
    Ok(slug)
}

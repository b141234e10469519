//! Pure field normalizers used by the source adapters and the deduplicator.
//!
//! Everything in this module is side-effect free and testable without a
//! network. The similarity threshold and title-length floor are part of the
//! dedup contract; changing them changes which records merge.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Titles shorter than this (after normalization) never match by similarity
pub const MIN_TITLE_MATCH_LEN: usize = 10;

/// Dice bigram similarity must exceed this for a title-tier merge
pub const TITLE_SIMILARITY_THRESHOLD: f64 = 0.90;

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}").expect("year regex"))
}

/// Extract the publication year from a free-text date string.
///
/// Takes the first 4-digit run found anywhere in the string, so both
/// `"2021 Mar 4"` and `"Spring 1998"` resolve.
pub fn extract_year(date: &str) -> Option<i32> {
    year_re()
        .find(date)
        .and_then(|m| m.as_str().parse::<i32>().ok())
}

/// Normalize a DOI for identity comparison: strip resolver prefixes and
/// case-fold to lowercase.
pub fn normalize_doi(doi: &str) -> String {
    let mut doi = doi.trim().to_lowercase();
    for prefix in ["https://doi.org/", "http://doi.org/", "doi.org/", "doi:"] {
        if let Some(rest) = doi.strip_prefix(prefix) {
            doi = rest.trim_start().to_string();
        }
    }
    doi
}

/// Normalize a title for comparison: drop punctuation, collapse whitespace,
/// lowercase.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity between two normalized titles in [0, 1].
///
/// Substring containment is treated as an exact match; otherwise the
/// Sørensen-Dice bigram coefficient decides.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.contains(b) || b.contains(a) {
        return 1.0;
    }
    strsim::sorensen_dice(a, b)
}

/// Whether two normalized titles resolve to the same paper.
pub fn titles_match(a: &str, b: &str) -> bool {
    if a.len() < MIN_TITLE_MATCH_LEN || b.len() < MIN_TITLE_MATCH_LEN {
        return false;
    }
    title_similarity(a, b) > TITLE_SIMILARITY_THRESHOLD
}

/// Rebuild abstract text from a word -> position-list inverted index
/// (the shape OpenAlex serves).
///
/// All (position, word) pairs are collected, sorted ascending by position,
/// and joined with single spaces. `{"the":[0,2],"cat":[1]}` becomes
/// `"the cat the"`.
pub fn reconstruct_abstract(index: &HashMap<String, Vec<u32>>) -> Option<String> {
    let mut positioned: Vec<(u32, &str)> = Vec::new();
    for (word, positions) in index {
        for &pos in positions {
            positioned.push((pos, word.as_str()));
        }
    }
    if positioned.is_empty() {
        return None;
    }
    positioned.sort_by_key(|&(pos, _)| pos);
    Some(
        positioned
            .iter()
            .map(|&(_, word)| word)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

//! Description enrichment.
//!
//! Builds the single string that gets embedded for an album. With a wiki
//! summary available the description carries the release year, the
//! album's own genre tags, and the summary; without one it falls back to a
//! template built from the tag being swept.

use std::sync::OnceLock;

use regex::Regex;

use crate::source::{AlbumCandidate, AlbumDetails};

/// Only the first few tags are kept; Last.fm's tail is mostly noise.
pub const MAX_GENRES: usize = 7;

/// Everything from the first link onwards is cut from summaries.
const LINK_MARKER: &str = "<a href";

fn year_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").ok())
        .as_ref()
}

/// Find a four-digit year between 1900 and 2099 in a free-form date.
pub fn extract_year(published: &str) -> Option<&str> {
    year_pattern()?.find(published).map(|m| m.as_str())
}

/// Cut a summary at its first link and trim what is left.
pub fn strip_links(summary: &str) -> &str {
    let end = summary.find(LINK_MARKER).unwrap_or(summary.len());
    summary[..end].trim()
}

/// Build the embedding input for `candidate`, found while sweeping `tag`.
///
/// The candidate must have a complete natural key; the result is never
/// empty.
pub fn build_description(tag: &str, candidate: &AlbumCandidate, details: Option<&AlbumDetails>) -> String {
    debug_assert!(
        candidate.has_natural_key(),
        "descriptions need an artist and a title"
    );

    let artist = &candidate.artist;
    let title = &candidate.title;

    let summary = details.map(|d| strip_links(&d.summary)).unwrap_or_default();
    match details {
        Some(details) if !summary.is_empty() => {
            let genres = details
                .tags
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .take(MAX_GENRES)
                .collect::<Vec<_>>()
                .join(", ");
            let era = extract_year(&details.published)
                .map(|year| format!("Released in {year}. "))
                .unwrap_or_default();

            format!("{artist} - {title}. {era}Genres and styles: {genres}. {summary}")
                .trim()
                .to_string()
        }
        _ => fallback_description(tag, artist, title),
    }
}

fn fallback_description(tag: &str, artist: &str, title: &str) -> String {
    format!(
        "{artist} - {title}. Music style and genre: {tag}. A {tag} album with {tag} vibes and influences."
    )
}

//! Parsing of the managed tool's tabular listing output.
//!
//! The listing is a human-oriented table, redrawn in place with carriage
//! returns while the tool shows progress. All column heuristics live here so
//! the state machine never touches raw text.

use crate::artifact::ArtifactState;

/// Version cells that mean "the tool does not know".
const VERSION_PLACEHOLDERS: &[&str] = &["Unknown", "<", ">"];

/// Header cell naming the upgrade column.
const AVAILABLE_HEADER: &str = "Available";

/// Lines of `text` with in-place progress redraws resolved.
fn visible_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(|line| match line.rfind('\r') {
        Some(idx) => &line[idx + 1..],
        None => line,
    })
}

/// Find the first row with a token exactly equal to `id`.
///
/// Returns the row and the index of the id token within it.
fn find_row<'a>(text: &'a str, id: &str) -> Option<(&'a str, usize)> {
    visible_lines(text).find_map(|line| {
        line.split_whitespace()
            .position(|token| token == id)
            .map(|pos| (line, pos))
    })
}

/// Read the installed state of `id` from a successful listing.
///
/// Only call this for output of a listing that the tool reported as
/// successful: a missing row then means the output was unparseable, not that
/// the artifact is absent.
#[must_use]
pub fn parse_listing_row(text: &str, id: &str) -> ArtifactState {
    let Some((row, pos)) = find_row(text, id) else {
        return ArtifactState::PresentUnknownVersion;
    };

    match row.split_whitespace().nth(pos + 1) {
        Some(token) if !VERSION_PLACEHOLDERS.contains(&token) => {
            ArtifactState::PresentVersion(token.to_string())
        }
        _ => ArtifactState::PresentUnknownVersion,
    }
}

/// Read the upgrade version offered for `id`, if the listing has one.
///
/// Uses the character column of the `Available` header cell. Returns `None`
/// when the table has no such column, the cell is empty, or the row does not
/// line up with the header.
#[must_use]
pub fn parse_available_version(text: &str, id: &str) -> Option<String> {
    let header = visible_lines(text).find(|line| {
        let mut tokens = line.split_whitespace();
        tokens.any(|t| t == "Id") && line.split_whitespace().any(|t| t == AVAILABLE_HEADER)
    })?;
    let column = header
        .char_indices()
        .find(|(idx, _)| header[*idx..].starts_with(AVAILABLE_HEADER))
        .map(|(idx, _)| header[..idx].chars().count())?;

    let (row, _) = find_row(text, id)?;
    let chars: Vec<char> = row.chars().collect();

    let starts_cell = column == 0 || chars.get(column - 1).is_some_and(|c| c.is_whitespace());
    let first = *chars.get(column)?;
    if !starts_cell || first.is_whitespace() {
        return None;
    }

    let cell: String = chars[column..]
        .iter()
        .take_while(|c| !c.is_whitespace())
        .collect();
    Some(cell)
}

//! Flat summary assembly from extracted fragments.

use webforage_core::Fragment;

/// Leading fragments that feed the summary.
pub const SUMMARY_FRAGMENTS: usize = 3;

/// Visible separator between fragment texts.
pub const SUMMARY_SEPARATOR: &str = "\n\n---\n\n";

/// First [`SUMMARY_FRAGMENTS`] fragment texts joined with
/// [`SUMMARY_SEPARATOR`]. An empty fragment list yields an empty summary.
pub fn compose_summary(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .take(SUMMARY_FRAGMENTS)
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(SUMMARY_SEPARATOR)
}

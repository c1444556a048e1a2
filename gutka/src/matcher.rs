//! Edit-distance matching of a saved text snippet to a line of a shabad.
//!
//! Legacy bookmark files remember the line a user was reading only by its text.
//! After re-fetching the canonical shabad, the remembered line is the candidate with
//! the smallest Levenshtein distance to that text.

use gurbani::shabad::Line;
use strsim::levenshtein;

use crate::{Result, error::BackupError};

/// Index of the candidate whose primary text is closest to `target`.
///
/// Distances are counted in characters, so multi-byte Gurmukhi letters count once.
/// Among equal distances the lowest index wins. Fails with `NoCandidates` when
/// `candidates` is empty.
pub fn best_match_index(candidates: &[Line], target: &str) -> Result<usize> {
    let target = target.trim();
    candidates
        .iter()
        .enumerate()
        .map(|(index, line)| (levenshtein(line.gurmukhi.trim(), target), index))
        .min()
        .map(|(_, index)| index)
        .ok_or(BackupError::NoCandidates)
}

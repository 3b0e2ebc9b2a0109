//! Burst reassembly helpers
//!
//! A burst is whatever one read plus its delayed follow-up read returned. It
//! normally holds one GLL, one GGA and one VTG sentence, possibly with NUL
//! padding from a fixed-size read buffer and a partial sentence at either end.

use crate::error::TrakError;
use crate::parser::sentence::{decode_sentence, FieldUpdate};
use crate::types::Fix;
use log::{debug, trace};

/// Raw text collected for one burst
#[derive(Debug, Default, Clone)]
pub struct BurstBuffer {
    text: String,
}

impl BurstBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from a read, dropping NUL padding
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let chunk = String::from_utf8_lossy(bytes);
        self.text.extend(chunk.chars().filter(|&c| c != '\0'));
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

/// Strip NUL padding and trailing line endings
pub fn clean_burst(raw: &str) -> String {
    raw.replace('\0', "")
        .trim_end_matches(&['\r', '\n'][..])
        .to_string()
}

/// Split cleaned burst text into candidate sentences
///
/// Lines that do not start with `$` are leftovers of a sentence cut by the
/// previous read and are not candidates.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| line.starts_with('$'))
        .collect()
}

/// Result of folding every sentence of a burst into one fix
#[derive(Debug, Default)]
pub struct BurstDecode {
    /// Composite fix, not yet time-stamped
    pub fix: Fix,
    pub candidates: usize,
    pub decoded: usize,
    pub has_position: bool,
    pub failures: Vec<TrakError>,
}

impl BurstDecode {
    /// Sentences failed and none of the rest gave us a position
    pub fn is_decode_failure(&self) -> bool {
        !self.has_position && !self.failures.is_empty()
    }

    pub fn failure_summary(&self) -> String {
        match self.failures.first() {
            Some(first) => format!(
                "{} of {} sentences failed to decode, first: {}",
                self.failures.len(),
                self.candidates,
                first
            ),
            None => "no position sentence in burst".to_string(),
        }
    }
}

/// Decode every candidate sentence of a burst, later sentences overwrite earlier ones
pub fn decode_burst(raw: &str) -> BurstDecode {
    let cleaned = clean_burst(raw);
    let mut result = BurstDecode::default();

    for sentence in split_sentences(&cleaned) {
        result.candidates += 1;
        match decode_sentence(sentence) {
            Ok(Some(update)) => {
                trace!("decoded {:?}", update);
                if matches!(update, FieldUpdate::Position { .. }) {
                    result.has_position = true;
                }
                update.apply(&mut result.fix);
                result.decoded += 1;
            }
            Ok(None) => {
                result.decoded += 1;
            }
            Err(e) => {
                debug!("skipping sentence: {}", e);
                result.failures.push(e);
            }
        }
    }

    result
}

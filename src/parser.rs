use std::collections::BTreeMap;

use crate::config::ChordKey;

/// Strip a root token down to a note name: letters A-G plus `#`/`b`
/// accidentals, with a leading lowercase note letter capitalised.
/// `" eb,"` becomes `"Eb"`, `"F#4"` becomes `"F#"`.
pub fn clean_root_token(token: &str) -> String {
    let kept: String = token
        .chars()
        .filter(|c| matches!(c, 'A'..='G' | 'a'..='g' | '#' | 'b'))
        .collect();
    let mut chars = kept.chars();
    match chars.next() {
        Some(first @ 'a'..='g') => first.to_ascii_uppercase().to_string() + chars.as_str(),
        _ => kept,
    }
}

/// Parse a free-text root list against the note table.
///
/// Tokens are split on commas and whitespace, cleaned, and kept only when the
/// table knows them; duplicates keep their first position. An empty result
/// means nothing usable was typed, and callers fall back to default roots.
pub fn parse_root_list(text: &str, note_to_semitone: &BTreeMap<String, i32>) -> Vec<String> {
    let mut roots: Vec<String> = Vec::new();
    for token in text.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        let cleaned = clean_root_token(token);
        if note_to_semitone.contains_key(&cleaned) && !roots.contains(&cleaned) {
            roots.push(cleaned);
        }
    }
    roots
}

/// Parse a `section/chord` selection
pub fn parse_chord_key(text: &str) -> Option<ChordKey> {
    let (section, chord) = text.trim().split_once('/')?;
    let (section, chord) = (section.trim(), chord.trim());
    if section.is_empty() || chord.is_empty() || chord.contains('/') {
        return None;
    }
    Some(ChordKey::new(section, chord))
}

/// Parse an inversion index typed by the user
pub fn parse_inversion(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

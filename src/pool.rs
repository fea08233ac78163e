//! Which chords and roots are currently eligible for exercises.
//!
//! [`Selection`] holds the on/off switches (section, chord, inversion) and
//! the typed root list. [`TemplatePool`] combines it with the read-only
//! configuration to answer "what can I draw from right now".

use std::collections::{HashMap, HashSet};

use crate::config::{ChordConfig, ChordKey};
use crate::parser::parse_root_list;

/// A chord type eligible for generation, with its enabled inversions
#[derive(Debug, Clone, PartialEq)]
pub struct ChordTemplate {
    pub key: ChordKey,
    pub label: String,
    pub symbol: String,
    pub intervals: Vec<u8>,
    pub inversions: Vec<u32>,
}

/// Enabled flags for sections, chords and inversions, plus the root list text
#[derive(Debug, Clone, Default)]
pub struct Selection {
    sections: HashMap<String, bool>,
    chords: HashSet<ChordKey>,
    inversions: HashSet<(String, u32)>,
    pub root_text: String,
}

impl Selection {
    /// Start from the configuration's default flags and its default roots
    pub fn from_defaults(config: &ChordConfig) -> Self {
        let mut selection = Selection {
            root_text: config.roots.join(", "),
            ..Default::default()
        };
        for section in &config.sections {
            selection.sections.insert(section.id.clone(), section.enabled);
            for chord in section.chords.iter().filter(|c| c.default_enabled) {
                selection.chords.insert(ChordKey::new(&section.id, &chord.id));
            }
            for inv in section.inversions.iter().filter(|i| i.default_enabled) {
                selection.inversions.insert((section.id.clone(), inv.id));
            }
        }
        selection
    }

    pub fn section_enabled(&self, section_id: &str) -> bool {
        self.sections.get(section_id).copied().unwrap_or(true)
    }

    pub fn chord_enabled(&self, key: &ChordKey) -> bool {
        self.chords.contains(key)
    }

    pub fn inversion_enabled(&self, section_id: &str, inversion: u32) -> bool {
        self.inversions.contains(&(section_id.to_string(), inversion))
    }

    /// Master switch: turning a section on or off flips all of its chords and
    /// inversions with it. Returns false for an unknown section.
    pub fn set_section(&mut self, config: &ChordConfig, section_id: &str, on: bool) -> bool {
        let Some(section) = config.section(section_id) else {
            return false;
        };
        self.sections.insert(section.id.clone(), on);
        for chord in &section.chords {
            let key = ChordKey::new(&section.id, &chord.id);
            if on {
                self.chords.insert(key);
            } else {
                self.chords.remove(&key);
            }
        }
        for inv in &section.inversions {
            let entry = (section.id.clone(), inv.id);
            if on {
                self.inversions.insert(entry);
            } else {
                self.inversions.remove(&entry);
            }
        }
        true
    }

    /// Returns false when the chord is not in the configuration
    pub fn set_chord(&mut self, config: &ChordConfig, key: &ChordKey, on: bool) -> bool {
        if config.chord(key).is_none() {
            return false;
        }
        if on {
            self.chords.insert(key.clone());
        } else {
            self.chords.remove(key);
        }
        true
    }

    /// Returns false when the section does not define that inversion
    pub fn set_inversion(
        &mut self,
        config: &ChordConfig,
        section_id: &str,
        inversion: u32,
        on: bool,
    ) -> bool {
        if !config.has_inversion(section_id, inversion) {
            return false;
        }
        let entry = (section_id.to_string(), inversion);
        if on {
            self.inversions.insert(entry);
        } else {
            self.inversions.remove(&entry);
        }
        true
    }
}

/// Read-only view over the configuration filtered by a selection
pub struct TemplatePool<'a> {
    config: &'a ChordConfig,
    selection: &'a Selection,
}

impl<'a> TemplatePool<'a> {
    pub fn new(config: &'a ChordConfig, selection: &'a Selection) -> Self {
        Self { config, selection }
    }

    /// Enabled chords of enabled sections, in configuration order, each
    /// carrying its section's enabled inversions
    pub fn enabled_templates(&self) -> Vec<ChordTemplate> {
        let mut templates = Vec::new();
        for section in &self.config.sections {
            if !self.selection.section_enabled(&section.id) {
                continue;
            }
            let inversions: Vec<u32> = section
                .inversions
                .iter()
                .map(|inv| inv.id)
                .filter(|&id| self.selection.inversion_enabled(&section.id, id))
                .collect();

            for chord in &section.chords {
                let key = ChordKey::new(&section.id, &chord.id);
                if !self.selection.chord_enabled(&key) {
                    continue;
                }
                templates.push(ChordTemplate {
                    key,
                    label: chord.label.clone(),
                    symbol: chord.symbol.clone(),
                    intervals: chord.intervals.clone(),
                    inversions: inversions.clone(),
                });
            }
        }
        templates
    }

    /// Roots parsed from the selection's text, or the default roots when the
    /// text yields nothing usable
    pub fn enabled_roots(&self) -> Vec<String> {
        let parsed = parse_root_list(&self.selection.root_text, &self.config.note_to_semitone);
        if parsed.is_empty() {
            self.config.roots.clone()
        } else {
            parsed
        }
    }
}

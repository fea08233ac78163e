//! The chord configuration document.
//!
//! A JSON file lists the default roots, the note-name to semitone table and
//! the chord sections with their chords and inversions. The engine only ever
//! reads it; enabled/disabled state lives in [`crate::pool::Selection`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::EarError;
use crate::note::PitchClass;

const BUILTIN: &str = include_str!("../config/chords.json");

fn enabled_by_default() -> bool {
    true
}

/// Composite identity of a chord template: its section plus its id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChordKey {
    pub section_id: String,
    pub chord_id: String,
}

impl ChordKey {
    pub fn new(section_id: impl Into<String>, chord_id: impl Into<String>) -> Self {
        Self {
            section_id: section_id.into(),
            chord_id: chord_id.into(),
        }
    }
}

impl fmt::Display for ChordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.section_id, self.chord_id)
    }
}

/// One concrete chord: root name, template, inversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordSpec {
    pub root: String,
    pub key: ChordKey,
    pub inversion: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordDef {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub symbol: String,
    pub intervals: Vec<u8>,
    #[serde(default = "enabled_by_default")]
    pub default_enabled: bool,
}

impl ChordDef {
    /// `Label (symbol)`, or just the label when there is no symbol
    pub fn display_name(&self) -> String {
        if self.symbol.is_empty() {
            self.label.clone()
        } else {
            format!("{} ({})", self.label, self.symbol)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InversionDef {
    pub id: u32,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub short: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub default_enabled: bool,
}

impl InversionDef {
    pub fn display_name(&self) -> String {
        self.label
            .clone()
            .or_else(|| self.short.clone())
            .unwrap_or_else(|| format!("Inversion {}", self.id))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub chords: Vec<ChordDef>,
    #[serde(default)]
    pub inversions: Vec<InversionDef>,
}

impl Section {
    pub fn chord(&self, chord_id: &str) -> Option<&ChordDef> {
        self.chords.iter().find(|c| c.id == chord_id)
    }
}

/// The full chord library
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordConfig {
    pub roots: Vec<String>,
    pub note_to_semitone: BTreeMap<String, i32>,
    pub sections: Vec<Section>,
}

impl ChordConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, EarError> {
        let text = fs::read_to_string(path).map_err(|source| EarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        info!(
            path = %path.display(),
            sections = config.sections.len(),
            "loaded chord configuration"
        );
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, EarError> {
        let config: ChordConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// The configuration shipped with the binary
    pub fn builtin() -> Result<Self, EarError> {
        Self::from_json(BUILTIN)
    }

    fn validate(&self) -> Result<(), EarError> {
        let mut section_ids = HashSet::new();
        for section in &self.sections {
            if !section_ids.insert(section.id.as_str()) {
                return Err(EarError::InvalidConfig(format!(
                    "duplicate section id '{}'",
                    section.id
                )));
            }
            let mut chord_ids = HashSet::new();
            for chord in &section.chords {
                let key = ChordKey::new(&section.id, &chord.id);
                if !chord_ids.insert(chord.id.as_str()) {
                    return Err(EarError::InvalidConfig(format!("duplicate chord '{}'", key)));
                }
                if !chord.intervals.contains(&0) {
                    return Err(EarError::InvalidConfig(format!(
                        "chord '{}' has no root (interval 0)",
                        key
                    )));
                }
                let distinct: HashSet<u8> = chord.intervals.iter().copied().collect();
                if distinct.len() != chord.intervals.len() {
                    return Err(EarError::InvalidConfig(format!(
                        "chord '{}' repeats an interval",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    /// Pitch class of a note name, if the table knows it
    pub fn pitch_class(&self, name: &str) -> Option<PitchClass> {
        self.note_to_semitone.get(name).map(|&s| PitchClass::new(s))
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    pub fn chord(&self, key: &ChordKey) -> Option<&ChordDef> {
        self.section(&key.section_id)?.chord(&key.chord_id)
    }

    /// Whether the section lists an inversion with this id
    pub fn has_inversion(&self, section_id: &str, inversion: u32) -> bool {
        self.section(section_id)
            .is_some_and(|s| s.inversions.iter().any(|i| i.id == inversion))
    }

    /// Every inversion id defined by any section, first definition wins
    pub fn inversion_defs(&self) -> Vec<&InversionDef> {
        let mut by_id: BTreeMap<u32, &InversionDef> = BTreeMap::new();
        for inv in self.sections.iter().flat_map(|s| &s.inversions) {
            by_id.entry(inv.id).or_insert(inv);
        }
        by_id.into_values().collect()
    }

    pub fn inversion_label(&self, id: u32) -> String {
        self.sections
            .iter()
            .flat_map(|s| &s.inversions)
            .find(|inv| inv.id == id)
            .map(InversionDef::display_name)
            .unwrap_or_else(|| format!("Inversion {}", id))
    }

    /// Pitches of a spec, or None when its chord or root is unknown
    pub fn voice_spec(&self, spec: &ChordSpec) -> Option<Vec<i32>> {
        let chord = self.chord(&spec.key)?;
        let root = self.pitch_class(&spec.root)?;
        Some(crate::note::voice(root, &chord.intervals, spec.inversion))
    }

    /// Human-readable name of a spec, e.g. `Ebm [1st inversion]`
    pub fn format_label(&self, spec: &ChordSpec) -> String {
        let chord = self.chord(&spec.key);
        let root = if spec.root.is_empty() { "?" } else { spec.root.as_str() };
        let core = match chord {
            Some(c) if !c.symbol.is_empty() => format!("{}{}", root, c.symbol),
            Some(c) => format!("{} ({})", root, c.label),
            None => format!("{} (Chord)", root),
        };
        format!("{} [{}]", core, self.inversion_label(spec.inversion))
    }
}

//! Grading of user guesses.
//!
//! A guess is correct when it names the chord exactly, or when the true chord
//! is a symmetric pitch-class set (augmented triad, diminished seventh, ...)
//! and the guess spells the same set from another root or inversion. Grading
//! never fails: anything that cannot be understood is simply wrong.

use tracing::debug;

use crate::config::{ChordConfig, ChordSpec};
use crate::note::{PitchClass, pitch_classes};
use crate::parser::{clean_root_token, parse_chord_key, parse_inversion};

/// One slot's answer as typed; an empty field means "not answered yet"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guess {
    pub root: String,
    pub chord: String,
    pub inversion: String,
}

impl Guess {
    /// Fields are trimmed and the root is normalised to a note name (`eb`
    /// becomes `Eb`). A root with no note letters is kept as typed so it
    /// still counts as an answer.
    pub fn new(root: &str, chord: &str, inversion: &str) -> Self {
        let cleaned = clean_root_token(root);
        Self {
            root: if cleaned.is_empty() {
                root.trim().to_string()
            } else {
                cleaned
            },
            chord: chord.trim().to_string(),
            inversion: inversion.trim().to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.root.is_empty() && !self.chord.is_empty() && !self.inversion.is_empty()
    }

    /// The spec this guess names, if every field parses
    pub fn to_spec(&self) -> Option<ChordSpec> {
        Some(ChordSpec {
            root: self.root.clone(),
            key: parse_chord_key(&self.chord)?,
            inversion: parse_inversion(&self.inversion)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Unanswered,
    Correct,
    Wrong,
}

/// Outcome of grading a whole exercise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub verdicts: Vec<Verdict>,
    pub attempted: usize,
    pub correct: usize,
    pub unanswered: usize,
    /// Label of the true chord for every wrong slot, in slot order
    pub misses: Vec<String>,
}

impl Report {
    /// Every slot answered and correct
    pub fn all_correct(&self) -> bool {
        self.correct == self.verdicts.len()
    }

    pub fn status_line(&self) -> String {
        if self.attempted == 0 {
            "No answers filled in yet.".to_string()
        } else if self.unanswered > 0 {
            format!(
                "You scored {}/{} on filled answers. {} unanswered.",
                self.correct, self.attempted, self.unanswered
            )
        } else {
            format!("You scored {}/{}.", self.correct, self.attempted)
        }
    }
}

/// True when at least three distinct pitch classes divide the octave evenly
pub fn is_symmetric_pitch_class_set(pcs: &[PitchClass]) -> bool {
    let mut uniq: Vec<i32> = pcs.iter().map(|pc| pc.semitone()).collect();
    uniq.sort_unstable();
    uniq.dedup();
    if uniq.len() < 3 {
        return false;
    }

    let wrap = uniq[0] + 12 - uniq[uniq.len() - 1];
    uniq.windows(2).all(|w| w[1] - w[0] == wrap)
}

/// Same pitch classes under a different name, accepted only for symmetric
/// true chords
fn symmetric_match(config: &ChordConfig, truth: &ChordSpec, guess: &ChordSpec) -> bool {
    let (Some(truth_notes), Some(guess_notes)) =
        (config.voice_spec(truth), config.voice_spec(guess))
    else {
        return false;
    };
    let truth_pcs = pitch_classes(&truth_notes);
    let guess_pcs = pitch_classes(&guess_notes);

    truth_pcs.len() == guess_pcs.len()
        && is_symmetric_pitch_class_set(&truth_pcs)
        && truth_pcs.iter().all(|pc| guess_pcs.contains(pc))
}

/// Grade a complete guess against the true chord. An inversion the guessed
/// chord's section does not define is wrong.
pub fn is_correct(config: &ChordConfig, truth: &ChordSpec, guess: &Guess) -> bool {
    let Some(named) = guess
        .to_spec()
        .filter(|s| config.has_inversion(&s.key.section_id, s.inversion))
    else {
        return false;
    };
    named == *truth || symmetric_match(config, truth, &named)
}

/// Grade every slot of an exercise. Missing trailing guesses count as
/// unanswered.
pub fn evaluate(config: &ChordConfig, sequence: &[ChordSpec], guesses: &[Guess]) -> Report {
    let mut report = Report {
        verdicts: Vec::with_capacity(sequence.len()),
        attempted: 0,
        correct: 0,
        unanswered: 0,
        misses: Vec::new(),
    };

    for (i, truth) in sequence.iter().enumerate() {
        let verdict = match guesses.get(i) {
            Some(guess) if guess.is_complete() => {
                report.attempted += 1;
                if is_correct(config, truth, guess) {
                    report.correct += 1;
                    Verdict::Correct
                } else {
                    report.misses.push(config.format_label(truth));
                    Verdict::Wrong
                }
            }
            _ => {
                report.unanswered += 1;
                Verdict::Unanswered
            }
        };
        report.verdicts.push(verdict);
    }

    debug!(
        attempted = report.attempted,
        correct = report.correct,
        unanswered = report.unanswered,
        "graded exercise"
    );
    report
}

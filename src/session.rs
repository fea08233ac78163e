//! Session state: the current exercise, the answers typed so far and the
//! running score.
//!
//! Misses from an exercise are held back as "pending" and only folded into
//! the session tally when the next exercise begins, so re-evaluating the same
//! exercise after fixing answers does not lose the record of what went wrong.

use std::collections::HashMap;

use rand::Rng;
use tracing::debug;

use crate::config::{ChordConfig, ChordSpec};
use crate::error::EarError;
use crate::exercise::{Exercise, generate};
use crate::grader::{Guess, Report, Verdict, evaluate};
use crate::pool::TemplatePool;

/// Labels shown in the miss summary
const MISS_SUMMARY_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub correct: usize,
    pub attempts: usize,
    pub exercises: usize,
    pub missed: HashMap<String, usize>,
}

impl SessionStats {
    pub fn summary(&self) -> String {
        format!(
            "Session: {} correct / {} attempts | Exercises: {}",
            self.correct, self.attempts, self.exercises
        )
    }

    /// Most-missed labels first, at most ten of them
    pub fn top_misses(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> = self
            .missed
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(label, count)| (label.as_str(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.truncate(MISS_SUMMARY_LIMIT);
        entries
    }

    pub fn misses_line(&self) -> String {
        let top = self.top_misses();
        if top.is_empty() {
            return " | Misses: —".to_string();
        }
        let listed: Vec<String> = top
            .iter()
            .map(|(label, count)| format!("{}×{}", label, count))
            .collect();
        format!(" | Misses: {}", listed.join(", "))
    }
}

#[derive(Debug, Default)]
pub struct Session {
    exercise: Option<Exercise>,
    guesses: Vec<Guess>,
    verdicts: Vec<Verdict>,
    last_report: Option<Report>,
    pending_misses: HashMap<String, usize>,
    pub stats: SessionStats,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exercise(&self) -> Option<&Exercise> {
        self.exercise.as_ref()
    }

    pub fn guesses(&self) -> &[Guess] {
        &self.guesses
    }

    /// Verdict per slot from the last evaluation; edited slots read as
    /// unanswered until evaluated again
    pub fn verdicts(&self) -> &[Verdict] {
        &self.verdicts
    }

    /// Reference chord followed by the sequence, for full playback
    pub fn progression(&self) -> Vec<ChordSpec> {
        match &self.exercise {
            Some(ex) => std::iter::once(&ex.reference)
                .chain(&ex.sequence)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    fn finalize_misses(&mut self) {
        for (label, count) in self.pending_misses.drain() {
            *self.stats.missed.entry(label).or_insert(0) += count;
        }
    }

    /// Begin a new exercise, replacing any current one.
    ///
    /// Pending misses are folded into the stats first. If generation refuses,
    /// the current exercise and its answers stay as they were.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        pool: &TemplatePool<'_>,
        n: usize,
        rng: &mut R,
    ) -> Result<&Exercise, EarError> {
        self.finalize_misses();
        let exercise = generate(pool, n, rng)?;

        let slots = exercise.sequence.len();
        self.guesses = vec![Guess::default(); slots];
        self.verdicts = vec![Verdict::Unanswered; slots];
        self.last_report = None;
        self.stats.exercises += 1;
        debug!(exercise = self.stats.exercises, slots, "exercise started");
        Ok(self.exercise.insert(exercise))
    }

    /// Whether the last evaluation had every slot correct
    pub fn can_advance(&self) -> bool {
        self.last_report.as_ref().is_some_and(Report::all_correct)
    }

    /// Move on to a new exercise; only allowed once everything is correct
    pub fn next<R: Rng + ?Sized>(
        &mut self,
        pool: &TemplatePool<'_>,
        n: usize,
        rng: &mut R,
    ) -> Result<&Exercise, EarError> {
        if self.exercise.is_none() {
            return Err(EarError::NoExercise);
        }
        if !self.can_advance() {
            return Err(EarError::ExerciseNotFinished);
        }
        self.start(pool, n, rng)
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut Guess, EarError> {
        if self.exercise.is_none() {
            return Err(EarError::NoExercise);
        }
        let len = self.guesses.len();
        self.guesses
            .get_mut(slot)
            .ok_or(EarError::SlotOutOfRange { slot, len })
    }

    /// Record an answer for a slot (0-based). Editing a slot clears its
    /// verdict and locks the next exercise until re-evaluated.
    pub fn set_guess(&mut self, slot: usize, guess: Guess) -> Result<(), EarError> {
        *self.slot_mut(slot)? = guess;
        self.verdicts[slot] = Verdict::Unanswered;
        self.last_report = None;
        Ok(())
    }

    pub fn clear_guess(&mut self, slot: usize) -> Result<(), EarError> {
        self.set_guess(slot, Guess::default())
    }

    /// Grade the current answers and add the result to the session score
    pub fn evaluate(&mut self, config: &ChordConfig) -> Result<&Report, EarError> {
        let exercise = self.exercise.as_ref().ok_or(EarError::NoExercise)?;
        let report = evaluate(config, &exercise.sequence, &self.guesses);

        self.stats.attempts += report.attempted;
        self.stats.correct += report.correct;
        for label in &report.misses {
            *self.pending_misses.entry(label.clone()).or_insert(0) += 1;
        }
        self.verdicts = report.verdicts.clone();
        Ok(self.last_report.insert(report))
    }

    /// Zero the score and forget pending misses; the exercise stays
    pub fn reset_stats(&mut self) {
        self.stats = SessionStats::default();
        self.pending_misses.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Selection;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Answer that names the chord exactly
    fn exact(spec: &ChordSpec) -> Guess {
        Guess::new(&spec.root, &spec.key.to_string(), &spec.inversion.to_string())
    }

    /// Answer that is certainly wrong: a root no table knows
    fn wrong(spec: &ChordSpec) -> Guess {
        Guess::new("H", &spec.key.to_string(), "0")
    }

    fn setup() -> (ChordConfig, Selection, StdRng) {
        let config = ChordConfig::builtin().unwrap();
        let selection = Selection::from_defaults(&config);
        (config, selection, StdRng::seed_from_u64(11))
    }

    #[test]
    fn test_start_creates_blank_slots() {
        let (config, selection, mut rng) = setup();
        let pool = TemplatePool::new(&config, &selection);
        let mut session = Session::new();
        session.start(&pool, 5, &mut rng).unwrap();

        assert_eq!(session.exercise().unwrap().sequence.len(), 5);
        assert_eq!(session.guesses().len(), 5);
        assert!(session.guesses().iter().all(|g| !g.is_complete()));
        assert_eq!(session.stats.exercises, 1);
        assert_eq!(session.progression().len(), 6);
    }

    #[test]
    fn test_evaluate_updates_stats() {
        let (config, selection, mut rng) = setup();
        let pool = TemplatePool::new(&config, &selection);
        let mut session = Session::new();
        let sequence = session.start(&pool, 3, &mut rng).unwrap().sequence.clone();

        session.set_guess(0, exact(&sequence[0])).unwrap();
        session.set_guess(1, wrong(&sequence[1])).unwrap();
        let report = session.evaluate(&config).unwrap().clone();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.correct, 1);
        assert_eq!(session.stats.attempts, 2);
        assert_eq!(session.stats.correct, 1);
        assert_eq!(
            session.verdicts(),
            &[Verdict::Correct, Verdict::Wrong, Verdict::Unanswered]
        );
        // misses wait for the next exercise
        assert!(session.stats.missed.is_empty());
        assert_eq!(session.pending_misses.values().sum::<usize>(), 1);
    }

    #[test]
    fn test_next_requires_all_correct() {
        let (config, selection, mut rng) = setup();
        let pool = TemplatePool::new(&config, &selection);
        let mut session = Session::new();
        assert!(matches!(
            session.next(&pool, 2, &mut rng),
            Err(EarError::NoExercise)
        ));

        let sequence = session.start(&pool, 2, &mut rng).unwrap().sequence.clone();
        session.set_guess(0, wrong(&sequence[0])).unwrap();
        session.evaluate(&config).unwrap();
        assert!(matches!(
            session.next(&pool, 2, &mut rng),
            Err(EarError::ExerciseNotFinished)
        ));

        session.set_guess(0, exact(&sequence[0])).unwrap();
        session.set_guess(1, exact(&sequence[1])).unwrap();
        session.evaluate(&config).unwrap();
        assert!(session.can_advance());

        // editing after a perfect evaluation locks it again
        session.clear_guess(1).unwrap();
        assert!(!session.can_advance());
        session.set_guess(1, exact(&sequence[1])).unwrap();
        session.evaluate(&config).unwrap();

        session.next(&pool, 2, &mut rng).unwrap();
        assert_eq!(session.stats.exercises, 2);
        assert_eq!(session.stats.attempts, 1 + 2 + 2);
        // the first attempt's miss was finalized exactly once
        assert_eq!(session.stats.missed.values().sum::<usize>(), 1);
        assert!(session.pending_misses.is_empty());
        assert!(session.guesses().iter().all(|g| *g == Guess::default()));
    }

    #[test]
    fn test_refused_start_keeps_exercise() {
        let (config, mut selection, mut rng) = setup();
        let mut session = Session::new();
        {
            let pool = TemplatePool::new(&config, &selection);
            session.start(&pool, 2, &mut rng).unwrap();
        }
        let before = session.exercise().cloned();

        selection.set_section(&config, "triads", false);
        let pool = TemplatePool::new(&config, &selection);
        assert!(matches!(
            session.start(&pool, 2, &mut rng),
            Err(EarError::NoTemplates)
        ));
        assert_eq!(session.exercise().cloned(), before);
        assert_eq!(session.stats.exercises, 1);
    }

    #[test]
    fn test_slot_errors() {
        let (config, selection, mut rng) = setup();
        let mut session = Session::new();
        assert!(matches!(
            session.set_guess(0, Guess::default()),
            Err(EarError::NoExercise)
        ));
        assert!(matches!(session.evaluate(&config), Err(EarError::NoExercise)));

        let pool = TemplatePool::new(&config, &selection);
        session.start(&pool, 2, &mut rng).unwrap();
        assert!(matches!(
            session.set_guess(2, Guess::default()),
            Err(EarError::SlotOutOfRange { slot: 2, len: 2 })
        ));
    }

    #[test]
    fn test_reset_stats() {
        let (config, selection, mut rng) = setup();
        let pool = TemplatePool::new(&config, &selection);
        let mut session = Session::new();
        let sequence = session.start(&pool, 1, &mut rng).unwrap().sequence.clone();
        session.set_guess(0, wrong(&sequence[0])).unwrap();
        session.evaluate(&config).unwrap();

        session.reset_stats();
        assert_eq!(session.stats, SessionStats::default());
        assert!(session.pending_misses.is_empty());
        assert!(session.exercise().is_some());
    }

    #[test]
    fn test_summary_lines() {
        let mut stats = SessionStats {
            correct: 3,
            attempts: 5,
            exercises: 2,
            ..Default::default()
        };
        assert_eq!(
            stats.summary(),
            "Session: 3 correct / 5 attempts | Exercises: 2"
        );
        assert_eq!(stats.misses_line(), " | Misses: —");

        stats.missed.insert("C+ [Root position]".into(), 1);
        stats.missed.insert("Dm [1st inversion]".into(), 3);
        stats.missed.insert("E (Major) [Root position]".into(), 0);
        assert_eq!(
            stats.misses_line(),
            " | Misses: Dm [1st inversion]×3, C+ [Root position]×1"
        );
    }

    #[test]
    fn test_top_misses_limited() {
        let mut stats = SessionStats::default();
        for i in 0..15 {
            stats.missed.insert(format!("chord {:02}", i), i + 1);
        }
        let top = stats.top_misses();
        assert_eq!(top.len(), 10);
        assert_eq!(top[0], ("chord 14", 15));
    }
}

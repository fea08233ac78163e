use std::io::{self, BufRead, Write};

use clap::ValueEnum;
use crossterm::style::Stylize;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::warn;

use crate::config::{ChordConfig, ChordKey, ChordSpec};
use crate::error::EarError;
use crate::exercise::clamp_chord_count;
use crate::grader::{Guess, Verdict};
use crate::parser::{parse_chord_key, parse_inversion};
use crate::pool::{Selection, TemplatePool};
use crate::scheduler::{self, MAX_BPM, MIN_BPM};
use crate::session::Session;
use crate::synth::{ChordHandle, Direction, Scheduler};
use crate::tone::Tone;

/// Options the drill starts with; all can be changed from the prompt
#[derive(Debug, Clone)]
pub struct DrillSettings {
    pub chords: usize,
    pub bpm: u32,
    pub tone: Tone,
    pub roots: Option<String>,
    pub auto_play: bool,
    pub seed: Option<u64>,
}

/// Which chord a playback command refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Reference,
    /// 0-based slot
    Slot(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Next,
    Hear(Target),
    Stop,
    Arp(Target, Direction),
    All,
    Guess { slot: usize, guess: Guess },
    Clear(usize),
    Eval,
    Show,
    Stats,
    Reset,
    Sections,
    Section { id: String, on: bool },
    Chord { key: String, on: bool },
    Inversion { section: String, id: u32, on: bool },
    Roots(String),
    Tempo(u32),
    Tone(Tone),
    Count(usize),
    Help,
    Quit,
}

const HELP: &str = "\
commands:
  start                      new exercise
  next                       next exercise (after a perfect evaluation)
  hear <n|ref>               play chord n (or the reference) as a block
  arp <n|ref> [down]         play chord n arpeggiated
  stop                       cut off the last chord played with hear
  all                        play the reference and every chord in turn
  guess <n> <root> <section/chord> <inversion>
  clear <n>                  forget the answer for chord n
  eval                       grade the filled-in answers
  show                       print the exercise and answers
  stats | reset              session score / zero it
  sections                   list chord sections and what is enabled
  enable|disable section <id>
  enable|disable chord <section/chord>
  enable|disable inv <section> <id>
  roots <list>               e.g. roots C, Eb, F#
  tempo <bpm> | tone <t> | count <n>
  help | quit";

/// 1-based slot number typed by the user
fn parse_slot(token: Option<&str>) -> Result<usize, String> {
    let token = token.ok_or("missing chord number")?;
    match token.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("'{}' is not a chord number", token)),
    }
}

fn parse_target(token: Option<&str>) -> Result<Target, String> {
    match token {
        Some("ref") | Some("r") => Ok(Target::Reference),
        other => parse_slot(other).map(Target::Slot),
    }
}

/// Parse one line of drill input
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err(String::new());
    };
    let cmd = match head {
        "start" | "s" => Command::Start,
        "next" | "n" => Command::Next,
        "hear" | "h" => Command::Hear(parse_target(words.next())?),
        "stop" => Command::Stop,
        "arp" | "a" => {
            let target = parse_target(words.next())?;
            let direction = match words.next() {
                Some("down") => Direction::Down,
                Some("up") | None => Direction::Up,
                Some(other) => return Err(format!("unknown direction '{}'", other)),
            };
            Command::Arp(target, direction)
        }
        "all" => Command::All,
        "guess" | "g" => {
            let slot = parse_slot(words.next())?;
            let rest: Vec<&str> = words.by_ref().collect();
            let [root, chord, inversion] = rest.as_slice() else {
                return Err("usage: guess <n> <root> <section/chord> <inversion>".into());
            };
            Command::Guess {
                slot,
                guess: Guess::new(root, chord, inversion),
            }
        }
        "clear" => Command::Clear(parse_slot(words.next())?),
        "eval" | "e" => Command::Eval,
        "show" => Command::Show,
        "stats" => Command::Stats,
        "reset" => Command::Reset,
        "sections" => Command::Sections,
        "enable" | "disable" => {
            let on = head == "enable";
            match (words.next(), words.next(), words.next()) {
                (Some("section"), Some(id), None) => Command::Section { id: id.into(), on },
                (Some("chord"), Some(key), None) => Command::Chord { key: key.into(), on },
                (Some("inv"), Some(section), Some(id)) => Command::Inversion {
                    section: section.into(),
                    id: parse_inversion(id).ok_or(format!("'{}' is not an inversion", id))?,
                    on,
                },
                _ => return Err(format!("usage: {} section|chord|inv ...", head)),
            }
        }
        "roots" => Command::Roots(words.collect::<Vec<_>>().join(" ")),
        "tempo" => {
            let bpm = words
                .next()
                .and_then(|w| w.parse::<u32>().ok())
                .ok_or("usage: tempo <bpm>")?;
            Command::Tempo(bpm.clamp(MIN_BPM, MAX_BPM))
        }
        "tone" => {
            let name = words.next().ok_or("usage: tone <name>")?;
            let tone =
                Tone::from_str(name, true).map_err(|_| format!("unknown tone '{}'", name))?;
            Command::Tone(tone)
        }
        "count" => {
            let n = words
                .next()
                .and_then(|w| w.parse::<usize>().ok())
                .ok_or("usage: count <n>")?;
            Command::Count(clamp_chord_count(n))
        }
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{}' (try help)", other)),
    };
    Ok(cmd)
}

/// Print every section with its chords and inversions, marking what the
/// selection enables
pub fn print_catalog(config: &ChordConfig, selection: &Selection) {
    let mark = |on: bool| if on { "[x]" } else { "[ ]" };
    for section in &config.sections {
        let on = selection.section_enabled(&section.id);
        println!("{} {} ({})", mark(on), section.label.as_str().bold(), section.id);
        if !section.description.is_empty() {
            println!("    {}", section.description.as_str().dark_grey());
        }
        for chord in &section.chords {
            let key = ChordKey::new(&section.id, &chord.id);
            println!(
                "    {} {:<22} {:<18} {:?}",
                mark(selection.chord_enabled(&key)),
                key.to_string(),
                chord.display_name(),
                chord.intervals
            );
        }
        let inversions: Vec<String> = section
            .inversions
            .iter()
            .map(|inv| {
                format!(
                    "{} {}={}",
                    mark(selection.inversion_enabled(&section.id, inv.id)),
                    inv.id,
                    inv.display_name()
                )
            })
            .collect();
        if !inversions.is_empty() {
            println!("    inversions: {}", inversions.join("  "));
        }
    }
}

/// What the next exercise can draw from under the current selection
pub fn print_eligible(pool: &TemplatePool<'_>) {
    println!("{} {}", "roots:".bold(), pool.enabled_roots().join(" "));
    let templates = pool.enabled_templates();
    if templates.is_empty() {
        println!("{}", "no chord types enabled".yellow());
    }
    for template in &templates {
        let name = if template.symbol.is_empty() {
            template.label.clone()
        } else {
            format!("{} ({})", template.label, template.symbol)
        };
        let inversions: Vec<String> = template.inversions.iter().map(u32::to_string).collect();
        println!(
            "  {:<22} {:<18} {:?} inv {}",
            template.key.to_string(),
            name,
            template.intervals,
            if inversions.is_empty() { "0".to_string() } else { inversions.join(",") }
        );
    }
}

/// Parts of a guess the catalog does not know; such a guess is still
/// recorded and grades as wrong
fn guess_notes(config: &ChordConfig, guess: &Guess) -> Vec<String> {
    let mut notes = Vec::new();
    if config.pitch_class(&guess.root).is_none() {
        notes.push(format!("no root '{}' in the catalog", guess.root));
    }
    match parse_chord_key(&guess.chord) {
        Some(key) if config.chord(&key).is_none() => {
            notes.push(format!("no chord '{}' in the catalog", key));
        }
        Some(key) => {
            let defined = parse_inversion(&guess.inversion)
                .is_some_and(|id| config.has_inversion(&key.section_id, id));
            if !defined {
                notes.push(format!(
                    "section '{}' has no inversion '{}'",
                    key.section_id, guess.inversion
                ));
            }
        }
        None => notes.push(format!("'{}' is not section/chord", guess.chord)),
    }
    notes
}

struct Drill {
    config: ChordConfig,
    selection: Selection,
    session: Session,
    settings: DrillSettings,
    rng: StdRng,
    last_hear: Option<ChordHandle>,
}

impl Drill {
    fn pool(&self) -> TemplatePool<'_> {
        TemplatePool::new(&self.config, &self.selection)
    }

    fn spec(&self, target: Target) -> Result<&ChordSpec, EarError> {
        let exercise = self.session.exercise().ok_or(EarError::NoExercise)?;
        match target {
            Target::Reference => Ok(&exercise.reference),
            Target::Slot(i) => exercise.sequence.get(i).ok_or(EarError::SlotOutOfRange {
                slot: i,
                len: exercise.sequence.len(),
            }),
        }
    }

    fn play_all(&self) -> Result<(), EarError> {
        let specs = self.session.progression();
        if specs.is_empty() {
            return Err(EarError::NoExercise);
        }
        let audio = Scheduler::global()?;
        scheduler::play_progression(
            audio,
            &self.config,
            &specs,
            self.settings.bpm,
            self.settings.tone,
        );
        Ok(())
    }

    fn show(&self) {
        let Some(exercise) = self.session.exercise() else {
            println!("No exercise yet. Type `start`.");
            return;
        };
        println!(
            "  {:<4} {}",
            "ref",
            self.config.format_label(&exercise.reference).cyan()
        );
        let verdicts = self.session.verdicts();
        for (i, guess) in self.session.guesses().iter().enumerate() {
            let answer = if guess == &Guess::default() {
                "(no answer)".to_string()
            } else {
                let field = |s: &str| if s.is_empty() { "?".to_string() } else { s.to_string() };
                format!(
                    "{} {} {}",
                    field(&guess.root),
                    field(&guess.chord),
                    field(&guess.inversion)
                )
            };
            let line = format!("  {:<4} {}", format!("{}.", i + 1), answer);
            match verdicts.get(i) {
                Some(Verdict::Correct) => println!("{}", line.green()),
                Some(Verdict::Wrong) => println!("{}", line.red()),
                _ => println!("{}", line),
            }
        }
    }

    fn print_stats(&self) {
        println!(
            "{}{}",
            self.session.stats.summary(),
            self.session.stats.misses_line()
        );
    }

    fn start(&mut self, advance: bool) -> Result<(), EarError> {
        let n = self.settings.chords;
        let pool = TemplatePool::new(&self.config, &self.selection);
        if advance {
            self.session.next(&pool, n, &mut self.rng)?;
        } else {
            self.session.start(&pool, n, &mut self.rng)?;
        }
        println!("{}", if advance { "New exercise ready." } else { "Exercise ready." });
        self.show();
        if self.settings.auto_play {
            if let Err(e) = self.play_all() {
                println!("{}", e.to_string().yellow());
            }
        }
        Ok(())
    }

    /// Run one command; returns false when the drill should end
    fn execute(&mut self, cmd: Command) -> Result<bool, EarError> {
        match cmd {
            Command::Start => self.start(false)?,
            Command::Next => self.start(true)?,
            Command::Hear(target) => {
                let spec = self.spec(target)?;
                let audio = Scheduler::global()?;
                let handle = scheduler::hear(audio, &self.config, spec, self.settings.tone);
                if target == Target::Reference {
                    println!("Played reference: {}", self.config.format_label(spec));
                }
                self.last_hear = handle;
            }
            Command::Stop => {
                if let Some(handle) = self.last_hear.take() {
                    handle.stop();
                }
            }
            Command::Arp(target, direction) => {
                let spec = self.spec(target)?;
                let audio = Scheduler::global()?;
                scheduler::arpeggiate(
                    audio,
                    &self.config,
                    spec,
                    self.settings.bpm,
                    self.settings.tone,
                    direction,
                );
                if target == Target::Reference {
                    println!("Arpeggiated reference: {}", self.config.format_label(spec));
                }
            }
            Command::All => self.play_all()?,
            Command::Guess { slot, guess } => {
                for note in guess_notes(&self.config, &guess) {
                    println!("{}", format!("note: {}", note).yellow());
                }
                self.session.set_guess(slot, guess)?;
            }
            Command::Clear(slot) => self.session.clear_guess(slot)?,
            Command::Eval => {
                let report = self.session.evaluate(&self.config)?;
                let status = report.status_line();
                let perfect = report.all_correct();
                self.show();
                println!("{}", status.bold());
                self.print_stats();
                if perfect {
                    println!("{}", "All correct. Type `next` for a new exercise.".green());
                }
            }
            Command::Show => self.show(),
            Command::Stats => self.print_stats(),
            Command::Reset => {
                self.session.reset_stats();
                self.print_stats();
            }
            Command::Sections => {
                print_catalog(&self.config, &self.selection);
                println!();
                print_eligible(&self.pool());
            }
            Command::Section { id, on } => {
                if !self.selection.set_section(&self.config, &id, on) {
                    println!("no section '{}'", id);
                }
            }
            Command::Chord { key, on } => {
                let known = parse_chord_key(&key)
                    .is_some_and(|k| self.selection.set_chord(&self.config, &k, on));
                if !known {
                    println!("no chord '{}' (use section/chord)", key);
                }
            }
            Command::Inversion { section, id, on } => {
                if !self.selection.set_inversion(&self.config, &section, id, on) {
                    println!("section '{}' has no inversion {}", section, id);
                }
            }
            Command::Roots(text) => {
                self.selection.root_text = text;
                println!("roots: {}", self.pool().enabled_roots().join(", "));
            }
            Command::Tempo(bpm) => {
                self.settings.bpm = bpm;
                println!("tempo: {} BPM", bpm);
            }
            Command::Tone(tone) => {
                self.settings.tone = tone;
                println!("tone: {:?}", tone);
            }
            Command::Count(n) => {
                self.settings.chords = n;
                println!("chords per exercise: {}", n);
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }
}

/// Run the interactive drill until `quit` or end of input
pub fn run(config: ChordConfig, settings: DrillSettings) -> Result<(), String> {
    let mut selection = Selection::from_defaults(&config);
    if let Some(roots) = &settings.roots {
        selection.root_text = roots.clone();
    }
    let rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut drill = Drill {
        config,
        selection,
        session: Session::new(),
        settings,
        rng,
        last_hear: None,
    };

    println!("{}", "chordear - chord ear training".bold());
    println!("Type `start` to begin, `help` for commands.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush().map_err(|e| format!("writing prompt: {}", e))?;

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| format!("reading input: {}", e))?;
        if read == 0 {
            println!();
            break;
        }

        let cmd = match parse_command(&line) {
            Ok(cmd) => cmd,
            Err(msg) if msg.is_empty() => continue,
            Err(msg) => {
                println!("{}", msg.yellow());
                continue;
            }
        };
        match drill.execute(cmd) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e @ EarError::Audio(_)) => {
                warn!("playback unavailable: {}", e);
                println!("{}", e.to_string().red());
            }
            Err(e) => println!("{}", e.to_string().yellow()),
        }
    }

    drill.print_stats();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_guess() {
        assert_eq!(
            parse_command("guess 2 Eb triads/min 1"),
            Ok(Command::Guess {
                slot: 1,
                guess: Guess::new("Eb", "triads/min", "1"),
            })
        );
        assert!(parse_command("guess 2 Eb triads/min").is_err());
        assert!(parse_command("guess 0 C triads/maj 0").is_err());
    }

    #[test]
    fn test_lowercase_guess_root_graded_correct() {
        let Ok(Command::Guess { guess, .. }) = parse_command("guess 1 c triads/maj 0") else {
            panic!("guess did not parse");
        };
        assert_eq!(guess.root, "C");

        let config = ChordConfig::builtin().unwrap();
        assert!(guess_notes(&config, &guess).is_empty());
        let truth = ChordSpec {
            root: "C".into(),
            key: ChordKey::new("triads", "maj"),
            inversion: 0,
        };
        assert!(crate::grader::is_correct(&config, &truth, &guess));
    }

    #[test]
    fn test_guess_notes_flag_unknown_parts() {
        let config = ChordConfig::builtin().unwrap();
        let notes = guess_notes(&config, &Guess::new("H", "triads/maj", "0"));
        assert_eq!(notes, vec!["no root 'H' in the catalog"]);
        let notes = guess_notes(&config, &Guess::new("C", "triads/zzz", "0"));
        assert_eq!(notes, vec!["no chord 'triads/zzz' in the catalog"]);
        let notes = guess_notes(&config, &Guess::new("C", "triads/maj", "4294967295"));
        assert_eq!(notes, vec!["section 'triads' has no inversion '4294967295'"]);
        assert_eq!(guess_notes(&config, &Guess::new("C", "maj", "0")).len(), 1);
    }

    #[test]
    fn test_parse_playback() {
        assert_eq!(parse_command("hear ref"), Ok(Command::Hear(Target::Reference)));
        assert_eq!(parse_command("h 3"), Ok(Command::Hear(Target::Slot(2))));
        assert_eq!(
            parse_command("arp 1 down"),
            Ok(Command::Arp(Target::Slot(0), Direction::Down))
        );
        assert_eq!(
            parse_command("arp r"),
            Ok(Command::Arp(Target::Reference, Direction::Up))
        );
        assert!(parse_command("arp 1 sideways").is_err());
    }

    #[test]
    fn test_parse_settings() {
        assert_eq!(parse_command("tempo 500"), Ok(Command::Tempo(240)));
        assert_eq!(parse_command("tone piano"), Ok(Command::Tone(Tone::Piano)));
        assert_eq!(parse_command("count 99"), Ok(Command::Count(16)));
        assert_eq!(
            parse_command("roots C,  Eb F#"),
            Ok(Command::Roots("C, Eb F#".into()))
        );
        assert!(parse_command("tone kazoo").is_err());
    }

    #[test]
    fn test_parse_switches() {
        assert_eq!(
            parse_command("enable section sevenths"),
            Ok(Command::Section {
                id: "sevenths".into(),
                on: true
            })
        );
        assert_eq!(
            parse_command("disable inv triads 2"),
            Ok(Command::Inversion {
                section: "triads".into(),
                id: 2,
                on: false
            })
        );
        assert!(parse_command("enable inv triads x").is_err());
        assert!(parse_command("enable").is_err());
    }

    #[test]
    fn test_parse_blank_and_unknown() {
        assert_eq!(parse_command("   "), Err(String::new()));
        assert!(parse_command("dance").unwrap_err().contains("unknown command"));
        assert_eq!(parse_command("q"), Ok(Command::Quit));
        assert_eq!(parse_command("stop"), Ok(Command::Stop));
    }

    #[test]
    fn test_drill_round_trip_without_audio() {
        let config = ChordConfig::builtin().unwrap();
        let selection = Selection::from_defaults(&config);
        let mut drill = Drill {
            config,
            selection,
            session: Session::new(),
            settings: DrillSettings {
                chords: 2,
                bpm: 90,
                tone: Tone::Triangle,
                roots: None,
                auto_play: false,
                seed: Some(5),
            },
            rng: StdRng::seed_from_u64(5),
            last_hear: None,
        };

        assert!(matches!(drill.execute(Command::Next), Err(EarError::NoExercise)));
        assert!(drill.execute(Command::Start).unwrap());
        let sequence = drill.session.exercise().unwrap().sequence.clone();
        for (slot, spec) in sequence.iter().enumerate() {
            let guess = Guess::new(&spec.root, &spec.key.to_string(), &spec.inversion.to_string());
            drill.execute(Command::Guess { slot, guess }).unwrap();
        }
        drill.execute(Command::Eval).unwrap();
        assert!(drill.session.can_advance());
        drill.execute(Command::Next).unwrap();
        assert_eq!(drill.session.stats.exercises, 2);
        assert!(drill.execute(Command::Stop).unwrap());
        assert!(!drill.execute(Command::Quit).unwrap());
    }
}

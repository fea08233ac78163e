mod config;
mod error;
mod exercise;
mod grader;
mod note;
mod parser;
mod pool;
mod repl;
mod scheduler;
mod session;
mod synth;
mod tone;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use config::{ChordConfig, ChordSpec};
use exercise::DEFAULT_CHORDS;
use pool::Selection;
use scheduler::DEFAULT_BPM;
use synth::{Direction, Scheduler};
use tone::Tone;

/// Extra wait after playback so the release tail is not cut off
const PLAYBACK_TAIL: f64 = 0.3;

#[derive(Parser)]
#[command(name = "chordear", about = "Chord ear training in the terminal")]
#[command(version)]
struct Cli {
    /// Chord catalog (JSON); the built-in one is used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive drill: hear chords, name them, get graded
    Drill {
        /// Chords per exercise (1-16)
        #[arg(long, default_value_t = DEFAULT_CHORDS)]
        chords: usize,

        #[arg(long, default_value_t = DEFAULT_BPM)]
        tempo: u32,

        #[arg(long, value_enum, default_value_t = Tone::Triangle)]
        tone: Tone,

        /// Roots to draw from, e.g. "C, Eb, F#"
        #[arg(long)]
        roots: Option<String>,

        /// Play the whole progression whenever a new exercise starts
        #[arg(long)]
        auto_play: bool,

        /// Seed for reproducible exercises
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the chord catalog and what is enabled by default
    List,

    /// Print the MIDI pitches of a chord
    Voice {
        /// Root note, e.g. Eb
        root: String,

        /// Chord as section/chord, e.g. triads/min
        chord: String,

        #[arg(long, default_value_t = 0)]
        inversion: u32,
    },

    /// Play a single chord through the speakers
    Play {
        root: String,

        /// Chord as section/chord, e.g. sevenths/dom7
        chord: String,

        #[arg(long, default_value_t = 0)]
        inversion: u32,

        /// Arpeggiate instead of a block chord
        #[arg(long)]
        arp: bool,

        /// Arpeggiate downwards
        #[arg(long, requires = "arp")]
        down: bool,

        #[arg(long, default_value_t = DEFAULT_BPM)]
        tempo: u32,

        #[arg(long, value_enum, default_value_t = Tone::Triangle)]
        tone: Tone,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    match cli.command {
        Command::Drill {
            chords,
            tempo,
            tone,
            roots,
            auto_play,
            seed,
        } => {
            let settings = repl::DrillSettings {
                chords: exercise::clamp_chord_count(chords),
                bpm: tempo.clamp(scheduler::MIN_BPM, scheduler::MAX_BPM),
                tone,
                roots,
                auto_play,
                seed,
            };
            if let Err(e) = repl::run(config, settings) {
                eprintln!("Drill error: {}", e);
                std::process::exit(1);
            }
        }
        Command::List => {
            let selection = Selection::from_defaults(&config);
            println!("Roots: {}", config.roots.join(" "));
            let inversions: Vec<String> = config
                .inversion_defs()
                .iter()
                .map(|inv| format!("{}={}", inv.id, inv.display_name()))
                .collect();
            println!("Inversions: {}", inversions.join(", "));
            println!();
            repl::print_catalog(&config, &selection);
        }
        Command::Voice {
            root,
            chord,
            inversion,
        } => {
            let spec = resolve_spec(&config, &root, &chord, inversion);
            let pitches = config.voice_spec(&spec).unwrap_or_default();
            let names: Vec<String> = pitches.iter().map(|&p| note::pitch_name(p)).collect();
            println!("{}", config.format_label(&spec));
            println!("  MIDI:  {:?}", pitches);
            let classes: Vec<i32> = note::pitch_classes(&pitches)
                .iter()
                .map(|pc| pc.semitone())
                .collect();
            println!("  Notes: {}", names.join(" "));
            println!("  Pitch classes: {:?}", classes);
        }
        Command::Play {
            root,
            chord,
            inversion,
            arp,
            down,
            tempo,
            tone,
        } => {
            let spec = resolve_spec(&config, &root, &chord, inversion);
            let audio = Scheduler::global().unwrap_or_else(|e| {
                eprintln!("Playback error: {}", e);
                std::process::exit(1);
            });
            println!("Playing {}", config.format_label(&spec));

            let seconds = if arp {
                let direction = if down { Direction::Down } else { Direction::Up };
                scheduler::arpeggiate(audio, &config, &spec, tempo, tone, direction)
            } else {
                scheduler::hear(audio, &config, &spec, tone).map(|_| scheduler::HEAR_SECONDS)
            };
            if let Some(seconds) = seconds {
                thread::sleep(Duration::from_secs_f64(
                    seconds + synth::LOOKAHEAD + PLAYBACK_TAIL,
                ));
            }
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> ChordConfig {
    let loaded = match path {
        Some(path) => ChordConfig::load(path),
        None => ChordConfig::builtin(),
    };
    loaded.unwrap_or_else(|e| {
        eprintln!("Config error: {}", e);
        std::process::exit(1);
    })
}

/// Build a spec from command-line words, exiting on anything that does not
/// name a real root, chord and inversion
fn resolve_spec(config: &ChordConfig, root: &str, chord: &str, inversion: u32) -> ChordSpec {
    let root = parser::clean_root_token(root);
    if config.pitch_class(&root).is_none() {
        eprintln!("Unknown root '{}'", root);
        std::process::exit(1);
    }
    let Some(key) = parser::parse_chord_key(chord).filter(|k| config.chord(k).is_some()) else {
        eprintln!("Unknown chord '{}' (try `chordear list`)", chord);
        std::process::exit(1);
    };
    if !config.has_inversion(&key.section_id, inversion) {
        eprintln!("Section '{}' has no inversion {}", key.section_id, inversion);
        std::process::exit(1);
    }
    ChordSpec {
        root,
        key,
        inversion,
    }
}

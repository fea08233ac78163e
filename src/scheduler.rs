//! Turns chord specs and a tempo into timed playback on the audio clock.

use crate::config::{ChordConfig, ChordSpec};
use crate::synth::{ArpeggioOptions, ChordHandle, ChordOptions, Direction, Scheduler};
use crate::tone::Tone;

pub const DEFAULT_BPM: u32 = 90;
pub const MIN_BPM: u32 = 30;
pub const MAX_BPM: u32 = 240;

/// Beats each chord lasts in arpeggios and full progressions
const BEATS_PER_CHORD: f64 = 2.0;
/// Length of a single "hear" block chord, in seconds
pub const HEAR_SECONDS: f64 = 1.0;
/// Gain for previewing a single chord
const PREVIEW_GAIN: f64 = 0.3;
const PROGRESSION_GAIN: f64 = 0.27;
/// Delay before the first chord of a progression
const PROGRESSION_LEAD: f64 = 0.12;

/// Seconds per beat; 0 means the default tempo, anything else is clamped
/// to 30..=240 BPM
pub fn beat_seconds(bpm: u32) -> f64 {
    let bpm = if bpm == 0 { DEFAULT_BPM } else { bpm.clamp(MIN_BPM, MAX_BPM) };
    60.0 / bpm as f64
}

pub fn chord_seconds(bpm: u32) -> f64 {
    BEATS_PER_CHORD * beat_seconds(bpm)
}

/// One chord of a progression, relative to the progression's start
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledChord {
    pub offset: f64,
    pub duration: f64,
    pub pitches: Vec<i32>,
}

/// Lay chords end to end, two beats each. Specs whose chord or root cannot be
/// resolved are left out and take no time.
pub fn build_progression(
    config: &ChordConfig,
    specs: &[ChordSpec],
    bpm: u32,
) -> Vec<ScheduledChord> {
    let duration = chord_seconds(bpm);
    let mut offset = 0.0;
    let mut timeline = Vec::with_capacity(specs.len());
    for spec in specs {
        let Some(pitches) = config.voice_spec(spec) else {
            continue;
        };
        timeline.push(ScheduledChord {
            offset,
            duration,
            pitches,
        });
        offset += duration;
    }
    timeline
}

/// Block chord preview, one second long
pub fn hear(
    scheduler: &Scheduler,
    config: &ChordConfig,
    spec: &ChordSpec,
    tone: Tone,
) -> Option<ChordHandle> {
    let pitches = config.voice_spec(spec)?;
    Some(scheduler.play_chord(
        &pitches,
        HEAR_SECONDS,
        ChordOptions {
            start_time: None,
            gain: PREVIEW_GAIN,
            tone,
        },
    ))
}

/// Upward arpeggio over two beats; returns its length in seconds
pub fn arpeggiate(
    scheduler: &Scheduler,
    config: &ChordConfig,
    spec: &ChordSpec,
    bpm: u32,
    tone: Tone,
    direction: Direction,
) -> Option<f64> {
    let pitches = config.voice_spec(spec)?;
    let total = chord_seconds(bpm);
    scheduler.play_arpeggio(
        &pitches,
        total,
        ArpeggioOptions {
            start_time: None,
            gain: PREVIEW_GAIN,
            tone,
            direction,
        },
    );
    Some(total)
}

/// Play specs back to back; returns the seconds until the last chord ends
pub fn play_progression(
    scheduler: &Scheduler,
    config: &ChordConfig,
    specs: &[ChordSpec],
    bpm: u32,
    tone: Tone,
) -> f64 {
    let start = scheduler.now() + PROGRESSION_LEAD;
    let timeline = build_progression(config, specs, bpm);
    for chord in &timeline {
        scheduler.play_chord(
            &chord.pitches,
            chord.duration,
            ChordOptions {
                start_time: Some(start + chord.offset),
                gain: PROGRESSION_GAIN,
                tone,
            },
        );
    }
    let length = timeline.last().map(|c| c.offset + c.duration).unwrap_or(0.0);
    PROGRESSION_LEAD + length
}
